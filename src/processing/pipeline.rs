use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use super::{FilterChain, ProcessingStatistics, ReadMutator, ReadPredicate};
use crate::error::{ConfigError, ProcessingError};
use crate::io::{ChunkedReader, FastqWriter};
use crate::parallel::{OrderedPipeline, OrderedSink};
use crate::{ProcessingConfig, RecordBatch, Result};

/// Lifecycle of a [`ProcessingPipeline`]
///
/// A pipeline runs at most once: `Idle -> Running -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}
impl PipelineState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}
impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters one FASTQ file into another
///
/// Records are read in batches, passed through a [`FilterChain`] on the worker
/// threads, and written in input order. Output is byte-identical for every thread
/// count.
///
/// # Examples
///
/// ```rust,no_run
/// use fqtools::processing::{MinQualityPredicate, ProcessingPipeline, QualityTrimmer, TrimMode};
/// use fqtools::ProcessingConfig;
///
/// let config = ProcessingConfig::builder().thread_count(4).build()?;
/// let mut pipeline = ProcessingPipeline::builder()
///     .input("reads.fastq.gz")
///     .output("filtered.fastq.gz")
///     .config(config)
///     .predicate(MinQualityPredicate::new(20.0, 33)?)
///     .mutator(QualityTrimmer::new(20.0, TrimMode::Both, 33)?)
///     .build()?;
/// let stats = pipeline.run()?;
/// println!("{stats}");
/// # Ok::<(), fqtools::Error>(())
/// ```
pub struct ProcessingPipeline {
    input: PathBuf,
    output: PathBuf,
    config: ProcessingConfig,
    chain: FilterChain,
    state: PipelineState,
}
impl ProcessingPipeline {
    /// Creates a pipeline with an empty filter chain
    pub fn new<I, O>(input: I, output: O, config: ProcessingConfig) -> Self
    where
        I: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        Self {
            input: input.into(),
            output: output.into(),
            config,
            chain: FilterChain::new(),
            state: PipelineState::Idle,
        }
    }

    #[must_use]
    pub fn builder() -> ProcessingPipelineBuilder {
        ProcessingPipelineBuilder::default()
    }

    pub fn add_predicate<P: ReadPredicate + 'static>(&mut self, predicate: P) {
        self.chain.add_predicate(Arc::new(predicate));
    }

    pub fn add_mutator<M: ReadMutator + 'static>(&mut self, mutator: M) {
        self.chain.add_mutator(Arc::new(mutator));
    }

    #[must_use]
    pub fn chain(&self) -> &FilterChain {
        &self.chain
    }

    #[must_use]
    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Runs the pipeline to completion
    ///
    /// On failure the output file is left as written so far and must be treated as
    /// invalid.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessingError::AlreadyRun`] if called a second time, otherwise
    /// the first error raised by any stage.
    pub fn run(&mut self) -> Result<ProcessingStatistics> {
        if self.state != PipelineState::Idle {
            return Err(ProcessingError::AlreadyRun(self.state.as_str()).into());
        }
        self.state = PipelineState::Running;
        match self.execute() {
            Ok(stats) => {
                self.state = PipelineState::Completed;
                Ok(stats)
            }
            Err(e) => {
                self.state = PipelineState::Failed;
                log::error!("Processing {} failed: {e}", self.input.display());
                Err(e)
            }
        }
    }

    fn execute(&self) -> Result<ProcessingStatistics> {
        self.config.validate()?;
        let start = Instant::now();

        let mut reader = ChunkedReader::open(&self.input, self.config.reader_options())?;
        let writer = FastqWriter::create(&self.output, self.config.writer_options())?;
        let engine = OrderedPipeline::new(&self.config);
        log::info!(
            "Filtering {} -> {} ({} threads, {} in-flight batches, {} predicates, {} mutators)",
            self.input.display(),
            self.output.display(),
            engine.threads(),
            engine.tokens(),
            self.chain.predicates().len(),
            self.chain.mutators().len()
        );

        let mut sink = WriterSink::new(writer);
        engine.run(&mut reader, self.chain.clone(), &mut sink)?;
        sink.writer.finish()?;

        let mut stats = sink.stats;
        stats.elapsed = start.elapsed();
        self.chain.log_counters();
        log::info!("{stats}");
        Ok(stats)
    }
}

/// Drain stage of a filtering run: writes batches and sums their counters
struct WriterSink<W: Write> {
    writer: FastqWriter<W>,
    stats: ProcessingStatistics,
}
impl<W: Write> WriterSink<W> {
    fn new(writer: FastqWriter<W>) -> Self {
        Self {
            writer,
            stats: ProcessingStatistics::default(),
        }
    }
}
impl<W: Write> OrderedSink<ProcessingStatistics> for WriterSink<W> {
    fn drain(&mut self, batch: &RecordBatch, mut output: ProcessingStatistics) -> Result<()> {
        let before = self.writer.total_uncompressed_bytes();
        self.writer.write_batch(batch)?;
        output.output_bytes = self.writer.total_uncompressed_bytes() - before;
        self.stats += output;
        Ok(())
    }
}

/// Builder for [`ProcessingPipeline`]
///
/// Input and output paths are required; the configuration defaults to
/// [`ProcessingConfig::default`].
#[derive(Default)]
pub struct ProcessingPipelineBuilder {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<ProcessingConfig>,
    chain: FilterChain,
}
impl ProcessingPipelineBuilder {
    #[must_use]
    pub fn input<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.input = Some(path.into());
        self
    }

    #[must_use]
    pub fn output<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.output = Some(path.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: ProcessingConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Appends a predicate to the chain
    #[must_use]
    pub fn predicate<P: ReadPredicate + 'static>(mut self, predicate: P) -> Self {
        self.chain = self.chain.with_predicate(predicate);
        self
    }

    /// Appends a mutator to the chain
    #[must_use]
    pub fn mutator<M: ReadMutator + 'static>(mut self, mutator: M) -> Self {
        self.chain = self.chain.with_mutator(mutator);
        self
    }

    /// Replaces the whole chain
    #[must_use]
    pub fn chain(mut self, chain: FilterChain) -> Self {
        self.chain = chain;
        self
    }

    pub fn build(self) -> Result<ProcessingPipeline> {
        let input = self.input.ok_or(ConfigError::MissingPath("input"))?;
        let output = self.output.ok_or(ConfigError::MissingPath("output"))?;
        let config = self.config.unwrap_or_default();
        config.validate()?;
        Ok(ProcessingPipeline {
            input,
            output,
            config,
            chain: self.chain,
            state: PipelineState::Idle,
        })
    }
}
