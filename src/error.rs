use std::path::PathBuf;

/// Custom Result type for fqtools operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the fqtools library, encompassing all possible error cases
/// that can occur while reading, transforming, writing, or summarizing FASTQ data.
#[derive(thiserror::Error, Debug)]
#[error(transparent)]
pub enum Error {
    /// Standard I/O errors from the Rust standard library
    IoError(#[from] std::io::Error),
    /// Errors opening or creating a file, carrying the offending path
    FileError(#[from] FileError),
    /// Malformed FASTQ structure
    FormatError(#[from] FormatError),
    /// Misconfigured predicates or mutators
    ValidationError(#[from] ValidationError),
    /// Failures inside a pipeline stage
    ProcessingError(#[from] ProcessingError),
    /// Capacity limits exceeded without making progress
    ResourceError(#[from] ResourceError),
    /// Invalid run configuration
    ConfigError(#[from] ConfigError),
    /// Generic errors that can occur in user supplied processors
    AnyhowError(#[from] anyhow::Error),
}

/// Broad classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Io,
    Format,
    Validation,
    Processing,
    Resource,
    Configuration,
}

/// How serious an [`Error`] is for the current run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Error {
    /// Returns the category this error belongs to
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::IoError(_) | Self::FileError(_) => ErrorCategory::Io,
            Self::FormatError(_) => ErrorCategory::Format,
            Self::ValidationError(_) => ErrorCategory::Validation,
            Self::ProcessingError(_) | Self::AnyhowError(_) => ErrorCategory::Processing,
            Self::ResourceError(_) => ErrorCategory::Resource,
            Self::ConfigError(_) => ErrorCategory::Configuration,
        }
    }

    /// Returns the severity of this error
    ///
    /// I/O and resource exhaustion are critical: the run cannot continue and the
    /// output must be considered invalid. Everything else is a plain error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Io | ErrorCategory::Resource => ErrorSeverity::Critical,
            _ => ErrorSeverity::Error,
        }
    }

    /// Whether a caller could reasonably retry after fixing its input or configuration
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.severity() < ErrorSeverity::Critical
    }
}

/// Errors raised while opening or creating files
#[derive(thiserror::Error, Debug)]
pub enum FileError {
    /// The input file could not be opened
    #[error("Failed to open input file {path}: {source}")]
    OpenInput {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The output file could not be created
    #[error("Failed to create output file {path}: {source}")]
    CreateOutput {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Errors describing malformed FASTQ input
#[derive(thiserror::Error, Debug)]
pub enum FormatError {
    /// A record header did not start with `@`
    ///
    /// # Fields
    /// * `offset` - Byte offset within the decoded input stream
    /// * `found` - The byte found instead
    #[error("Expected '@' at start of record (byte {offset}), found {found:?}")]
    MissingHeaderMarker { offset: usize, found: char },

    /// The separator line did not start with `+`
    #[error("Expected '+' separator line (byte {offset}), found {found:?}")]
    MissingSeparator { offset: usize, found: char },

    /// Sequence and quality lines differ in length
    #[error("Sequence length ({seq}) does not match quality length ({qual}) for record {id}")]
    LengthMismatch { id: String, seq: usize, qual: usize },

    /// The stream ended inside a record
    #[error("Truncated record at end of input (byte {offset})")]
    TruncatedRecord { offset: usize },
}

/// Errors raised when a predicate or mutator is constructed with invalid parameters
#[derive(thiserror::Error, Debug)]
pub enum ValidationError {
    #[error("Unsupported quality encoding offset: {0} (expected 33 or 64)")]
    InvalidQualityOffset(u8),

    #[error("Maximum N ratio must lie within [0, 1], got {0}")]
    InvalidNRatio(f64),

    #[error("Quality threshold must be finite and non-negative, got {0}")]
    InvalidQualityThreshold(f64),

    #[error("Trim length must be greater than zero")]
    ZeroTrimLength,

    #[error("Adapter trimming requires at least one non-empty adapter")]
    EmptyAdapter,

    #[error("Adapter minimum overlap must be greater than zero")]
    ZeroAdapterOverlap,

    #[error("Minimum length ({min}) exceeds maximum length ({max})")]
    InvertedLengthBounds { min: usize, max: usize },
}

/// Errors raised while a pipeline is running
#[derive(thiserror::Error, Debug)]
pub enum ProcessingError {
    /// A pipeline can only run once
    #[error("Pipeline has already been run (state: {0})")]
    AlreadyRun(&'static str),

    /// A worker thread panicked
    #[error("Worker thread panicked during {0} stage")]
    WorkerPanic(&'static str),

    /// A stage hung up before the run finished
    #[error("Pipeline channel closed unexpectedly in {0} stage")]
    Disconnected(&'static str),
}

/// Errors signalling that configured capacities are too small for the input
#[derive(thiserror::Error, Debug)]
pub enum ResourceError {
    /// The batch buffer filled up before a single complete record was found
    #[error("Batch capacity too small: {capacity} bytes buffered without a complete record")]
    BatchCapacityTooSmall { capacity: usize },
}

/// Errors describing an invalid run configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Configuration value `{0}` must be greater than zero")]
    ZeroValue(&'static str),

    #[error("Missing required path: {0}")]
    MissingPath(&'static str),
}
