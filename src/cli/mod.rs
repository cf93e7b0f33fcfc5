//! Command line interface of the `fqtools` binary
//!
//! The binary parses a [`Cli`], initializes logging at [`Cli::log_level`], and
//! calls [`Commands::execute`].

mod filter;
mod stat;

pub use filter::{CompressionArg, FilterCommand, TrimKeepArg, TrimModeArg};
pub use stat::StatCommand;

use clap::{Args, Parser, Subcommand};

use crate::io::{DEFAULT_COMPRESSION_BUFFER_BYTES, DEFAULT_READ_CHUNK_BYTES};
use crate::processing::DEFAULT_QUALITY_OFFSET;
use crate::{ProcessingConfig, ProcessingConfigBuilder, Result, DEFAULT_BATCH_CAPACITY_BYTES};

const BYTES_PER_GB: usize = 1024 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "fqtools", version, about = "Streaming FASTQ filtering and statistics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log debug messages
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}
impl Cli {
    /// Default log filter implied by the verbosity flags
    #[must_use]
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Filter and trim reads into a new FASTQ file
    Filter(FilterCommand),
    /// Write per-position quality and base composition statistics
    Stat(StatCommand),
}
impl Commands {
    pub fn execute(&self) -> Result<()> {
        match self {
            Self::Filter(cmd) => cmd.try_execute().map(|_| ()),
            Self::Stat(cmd) => cmd.try_execute().map(|_| ()),
        }
    }
}

/// Threading, batching, and encoding flags shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct RuntimeArgs {
    /// Worker threads (0 = one per logical CPU)
    #[arg(short = 't', long, default_value_t = 1)]
    pub threads: usize,

    /// Bytes pulled from the input per read call
    #[arg(long, default_value_t = DEFAULT_READ_CHUNK_BYTES)]
    pub read_chunk_bytes: usize,

    /// Byte capacity of one batch buffer
    #[arg(long, default_value_t = DEFAULT_BATCH_CAPACITY_BYTES)]
    pub batch_capacity_bytes: usize,

    /// Internal decompressor buffer size
    #[arg(long, default_value_t = DEFAULT_COMPRESSION_BUFFER_BYTES)]
    pub zlib_buffer_bytes: usize,

    /// Batches allowed in flight (0 = twice the thread count)
    #[arg(long, default_value_t = 0)]
    pub max_in_flight: usize,

    /// Memory budget for in-flight batches in GiB (0 = unlimited)
    #[arg(long, default_value_t = 10)]
    pub memory_limit_gb: usize,

    /// ASCII offset of the quality scores (33 or 64)
    #[arg(long, default_value_t = DEFAULT_QUALITY_OFFSET)]
    pub quality_encoding: u8,
}
impl RuntimeArgs {
    /// Starts a configuration from these flags
    #[must_use]
    pub fn config_builder(&self, batch_size: usize) -> ProcessingConfigBuilder {
        ProcessingConfig::builder()
            .thread_count(self.threads)
            .batch_size(batch_size)
            .read_chunk_bytes(self.read_chunk_bytes)
            .batch_capacity_bytes(self.batch_capacity_bytes)
            .compression_buffer_bytes(self.zlib_buffer_bytes)
            .max_in_flight_batches(self.max_in_flight)
            .memory_limit_bytes(self.memory_limit_gb.saturating_mul(BYTES_PER_GB))
            .quality_offset(self.quality_encoding)
    }
}
