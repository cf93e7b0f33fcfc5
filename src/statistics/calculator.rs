use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{write_report, FqStatisticResult, StatisticWorker};
use crate::error::{ConfigError, FileError};
use crate::io::ChunkedReader;
use crate::parallel::{OrderedPipeline, OrderedSink};
use crate::{ProcessingConfig, RecordBatch, Result};

/// Default records per batch for statistics runs
pub const DEFAULT_STAT_BATCH_SIZE: usize = 50_000;

/// Inputs of a statistics run
#[derive(Debug, Clone)]
pub struct StatisticOptions {
    /// FASTQ file to summarize (plain, gzip, or zstd)
    pub input: PathBuf,
    /// Destination of the tab-delimited report
    pub output: PathBuf,
    /// Threading, batching, and quality encoding
    pub config: ProcessingConfig,
}
impl StatisticOptions {
    /// Options with the default configuration and a statistics-sized batch
    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(input: I, output: O) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            config: ProcessingConfig {
                batch_size: DEFAULT_STAT_BATCH_SIZE,
                ..ProcessingConfig::default()
            },
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: ProcessingConfig) -> Self {
        self.config = config;
        self
    }
}

/// Summarizes a FASTQ file into a statistics report
///
/// Per-batch distributions are computed on the worker threads and merged in input
/// order on the calling thread.
///
/// # Examples
///
/// ```rust,no_run
/// use fqtools::statistics::{StatisticCalculator, StatisticOptions};
///
/// let calculator = StatisticCalculator::new(StatisticOptions::new("reads.fq.gz", "reads.stat"));
/// let result = calculator.run()?;
/// println!("{} reads, {} bases", result.read_count, result.total_bases);
/// # Ok::<(), fqtools::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct StatisticCalculator {
    options: StatisticOptions,
}
impl StatisticCalculator {
    #[must_use]
    pub fn new(options: StatisticOptions) -> Self {
        Self { options }
    }

    #[must_use]
    pub fn options(&self) -> &StatisticOptions {
        &self.options
    }

    /// Computes the statistics of the input and writes the report
    ///
    /// An input without reads yields an empty report file and a warning.
    pub fn run(&self) -> Result<FqStatisticResult> {
        let StatisticOptions {
            input,
            output,
            config,
        } = &self.options;
        if input.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath("input").into());
        }
        if output.as_os_str().is_empty() {
            return Err(ConfigError::MissingPath("output").into());
        }
        config.validate()?;
        let start = Instant::now();

        let worker = StatisticWorker::new(config.quality_offset)?;
        let mut reader = ChunkedReader::open(input, config.reader_options())?;
        let engine = OrderedPipeline::new(config);
        log::info!(
            "Computing statistics for {} ({} threads, {} in-flight batches)",
            input.display(),
            engine.threads(),
            engine.tokens()
        );

        let mut sink = MergeSink::default();
        let n_batches = engine.run(&mut reader, worker, &mut sink)?;
        let result = sink.result;
        log::debug!(
            "Merged {} batches: {} reads, {} bases in {:.2?}",
            n_batches,
            result.read_count,
            result.total_bases,
            start.elapsed()
        );

        self.write(&result)?;
        Ok(result)
    }

    fn write(&self, result: &FqStatisticResult) -> Result<()> {
        let path = &self.options.output;
        let file = File::create(path).map_err(|source| FileError::CreateOutput {
            path: path.clone(),
            source,
        })?;
        if result.read_count == 0 {
            log::warn!("No reads found in {}", self.options.input.display());
            return Ok(());
        }
        let mut writer = BufWriter::new(file);
        write_report(
            &mut writer,
            result,
            &file_name(&self.options.input),
            self.options.config.quality_offset,
        )?;
        writer.flush()?;
        log::info!("Statistics report saved to {}", path.display());
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Drain stage of a statistics run
#[derive(Default)]
struct MergeSink {
    result: FqStatisticResult,
}
impl OrderedSink<FqStatisticResult> for MergeSink {
    fn drain(&mut self, _batch: &RecordBatch, output: FqStatisticResult) -> Result<()> {
        self.result += output;
        Ok(())
    }
}
