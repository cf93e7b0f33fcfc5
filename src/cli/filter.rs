use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, ValueEnum};

use super::RuntimeArgs;
use crate::error::ValidationError;
use crate::io::{CompressionMode, DEFAULT_OUTPUT_BUFFER_BYTES};
use crate::processing::{
    validate_quality_offset, AdapterTrimmer, FilterChain, LengthTrimPolicy, LengthTrimmer,
    MaxLengthPredicate, MaxNRatioPredicate, MinLengthPredicate, MinQualityPredicate,
    ProcessingPipeline, ProcessingStatistics, QualityTrimmer, TrimMode,
    DEFAULT_ADAPTER_MAX_MISMATCHES, DEFAULT_ADAPTER_MIN_OVERLAP,
};
use crate::{ProcessingConfig, Result, DEFAULT_BATCH_SIZE};

/// Output compression choices
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionArg {
    /// Pick by output suffix
    Auto,
    None,
    Gzip,
    Zstd,
}
impl From<CompressionArg> for CompressionMode {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::Auto => Self::Auto,
            CompressionArg::None => Self::None,
            CompressionArg::Gzip => Self::Gzip,
            CompressionArg::Zstd => Self::Zstd,
        }
    }
}

/// Ends scanned by the quality trimmer
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimModeArg {
    Both,
    Five,
    Three,
}
impl From<TrimModeArg> for TrimMode {
    fn from(arg: TrimModeArg) -> Self {
        match arg {
            TrimModeArg::Both => Self::Both,
            TrimModeArg::Five => Self::FivePrime,
            TrimModeArg::Three => Self::ThreePrime,
        }
    }
}

/// Bases kept by the length trimmer
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimKeepArg {
    /// Keep the first N bases
    Start,
    /// Keep the last N bases
    End,
}
impl From<TrimKeepArg> for LengthTrimPolicy {
    fn from(arg: TrimKeepArg) -> Self {
        match arg {
            TrimKeepArg::Start => Self::KeepFromStart,
            TrimKeepArg::End => Self::KeepFromEnd,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct FilterCommand {
    /// Input FASTQ (plain, gzip, or zstd)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,

    /// Output FASTQ
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    #[command(flatten)]
    pub runtime: RuntimeArgs,

    /// Records per batch
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Uncompressed output block size
    #[arg(long, default_value_t = DEFAULT_OUTPUT_BUFFER_BYTES)]
    pub writer_buffer_bytes: usize,

    /// Output compression
    #[arg(long, value_enum, default_value_t = CompressionArg::Auto)]
    pub compression: CompressionArg,

    /// Output compression level (format default if unset)
    #[arg(long)]
    pub compression_level: Option<i32>,

    /// Drop reads with a lower mean quality
    #[arg(long)]
    pub min_quality: Option<f64>,

    /// Drop reads shorter than this
    #[arg(long)]
    pub min_length: Option<usize>,

    /// Drop reads longer than this
    #[arg(long)]
    pub max_length: Option<usize>,

    /// Drop reads with a larger fraction of N bases
    #[arg(long)]
    pub max_n_ratio: Option<f64>,

    /// Trim bases below this quality from the read ends
    #[arg(long)]
    pub trim_quality: Option<f64>,

    /// Read ends scanned by quality trimming
    #[arg(long, value_enum, default_value_t = TrimModeArg::Both)]
    pub trim_mode: TrimModeArg,

    /// Drop reads shorter than this after quality trimming
    #[arg(long, default_value_t = 1)]
    pub trim_min_length: usize,

    /// Trim reads to at most this many bases
    #[arg(long)]
    pub trim_length: Option<usize>,

    /// Which bases length trimming keeps
    #[arg(long, value_enum, default_value_t = TrimKeepArg::Start)]
    pub trim_keep: TrimKeepArg,

    /// Adapter sequence to trim (repeatable)
    #[arg(long = "adapter")]
    pub adapters: Vec<String>,

    /// Minimum overlap of a partial 3' adapter match
    #[arg(long, default_value_t = DEFAULT_ADAPTER_MIN_OVERLAP)]
    pub adapter_min_overlap: usize,

    /// Mismatches allowed in a partial 3' adapter match
    #[arg(long, default_value_t = DEFAULT_ADAPTER_MAX_MISMATCHES)]
    pub adapter_max_mismatches: usize,
}
impl FilterCommand {
    pub fn config(&self) -> Result<ProcessingConfig> {
        validate_quality_offset(self.runtime.quality_encoding)?;
        let mut builder = self
            .runtime
            .config_builder(self.batch_size)
            .writer_buffer_bytes(self.writer_buffer_bytes)
            .output_compression(self.compression.into());
        if let Some(level) = self.compression_level {
            builder = builder.compression_level(level);
        }
        builder.build()
    }

    /// Builds the predicates and mutators selected on the command line
    ///
    /// Predicates are registered as quality, length, then N ratio; mutators as
    /// quality trimming, length trimming, then adapter trimming.
    pub fn chain(&self) -> Result<FilterChain> {
        let offset = self.runtime.quality_encoding;
        if let (Some(min), Some(max)) = (self.min_length, self.max_length) {
            if min > max {
                return Err(ValidationError::InvertedLengthBounds { min, max }.into());
            }
        }

        let mut chain = FilterChain::new();
        if let Some(threshold) = self.min_quality {
            chain.add_predicate(Arc::new(MinQualityPredicate::new(threshold, offset)?));
        }
        if let Some(min) = self.min_length {
            chain.add_predicate(Arc::new(MinLengthPredicate::new(min)));
        }
        if let Some(max) = self.max_length {
            chain.add_predicate(Arc::new(MaxLengthPredicate::new(max)));
        }
        if let Some(ratio) = self.max_n_ratio {
            chain.add_predicate(Arc::new(MaxNRatioPredicate::new(ratio)?));
        }

        if let Some(threshold) = self.trim_quality {
            let trimmer = QualityTrimmer::new(threshold, self.trim_mode.into(), offset)?
                .with_min_length(self.trim_min_length);
            chain.add_mutator(Arc::new(trimmer));
        }
        if let Some(length) = self.trim_length {
            chain.add_mutator(Arc::new(LengthTrimmer::new(length, self.trim_keep.into())?));
        }
        if !self.adapters.is_empty() {
            chain.add_mutator(Arc::new(AdapterTrimmer::with_params(
                &self.adapters,
                self.adapter_min_overlap,
                self.adapter_max_mismatches,
            )?));
        }
        Ok(chain)
    }

    /// Run the filter subcommand
    pub fn try_execute(&self) -> Result<ProcessingStatistics> {
        let config = self.config()?;
        let chain = self.chain()?;
        let mut pipeline = ProcessingPipeline::builder()
            .input(self.input.clone())
            .output(self.output.clone())
            .config(config)
            .chain(chain)
            .build()?;
        pipeline.run()
    }
}
