//! Run configuration
//!
//! A [`ProcessingConfig`] is assembled once by the caller (normally the CLI) and
//! passed by reference into the pipeline and the statistics calculator.

use crate::error::ConfigError;
use crate::io::{
    CompressionMode, ReaderOptions, WriterOptions, DEFAULT_COMPRESSION_BUFFER_BYTES,
    DEFAULT_OUTPUT_BUFFER_BYTES, DEFAULT_READ_CHUNK_BYTES,
};
use crate::processing::DEFAULT_QUALITY_OFFSET;
use crate::Result;

/// Default number of records per batch
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// Default byte capacity of one batch buffer
pub const DEFAULT_BATCH_CAPACITY_BYTES: usize = 4 * 1024 * 1024;

/// Share of the memory limit that may be spent on in-flight batches, in tenths
const MEMORY_SHARE_TENTHS: usize = 7;

/// Immutable per-run parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingConfig {
    /// Worker threads (0 = one per logical CPU)
    pub thread_count: usize,
    /// Maximum records per batch
    pub batch_size: usize,
    /// Bytes pulled per read from the input stream
    pub read_chunk_bytes: usize,
    /// Internal decompressor buffer size
    pub compression_buffer_bytes: usize,
    /// Byte ceiling of one batch buffer
    pub batch_capacity_bytes: usize,
    /// Uncompressed output block size
    pub writer_buffer_bytes: usize,
    /// Requested in-flight batches (0 = derive from thread count)
    pub max_in_flight_batches: usize,
    /// Memory budget for in-flight batches (0 = unlimited)
    pub memory_limit_bytes: usize,
    /// ASCII offset of quality scores
    pub quality_offset: u8,
    /// Output compression selection
    pub output_compression: CompressionMode,
    /// Output compression level (format default when `None`)
    pub compression_level: Option<i32>,
}
impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            thread_count: 1,
            batch_size: DEFAULT_BATCH_SIZE,
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            compression_buffer_bytes: DEFAULT_COMPRESSION_BUFFER_BYTES,
            batch_capacity_bytes: DEFAULT_BATCH_CAPACITY_BYTES,
            writer_buffer_bytes: DEFAULT_OUTPUT_BUFFER_BYTES,
            max_in_flight_batches: 0,
            memory_limit_bytes: 0,
            quality_offset: DEFAULT_QUALITY_OFFSET,
            output_compression: CompressionMode::Auto,
            compression_level: None,
        }
    }
}
impl ProcessingConfig {
    #[must_use]
    pub fn builder() -> ProcessingConfigBuilder {
        ProcessingConfigBuilder::default()
    }

    /// Checks that every size is positive
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("batch_size", self.batch_size),
            ("read_chunk_bytes", self.read_chunk_bytes),
            ("compression_buffer_bytes", self.compression_buffer_bytes),
            ("batch_capacity_bytes", self.batch_capacity_bytes),
            ("writer_buffer_bytes", self.writer_buffer_bytes),
        ];
        for (name, value) in sizes {
            if value == 0 {
                return Err(ConfigError::ZeroValue(name).into());
            }
        }
        Ok(())
    }

    /// Number of worker threads after resolving the 0 sentinel
    #[must_use]
    pub fn resolved_threads(&self) -> usize {
        if self.thread_count == 0 {
            num_cpus::get()
        } else {
            self.thread_count
        }
    }

    /// Number of batches allowed in flight at once
    ///
    /// `max(max_in_flight_batches, threads * 2)`, lowered to fit 70% of the memory
    /// limit when one is set, and never below 1.
    #[must_use]
    pub fn token_budget(&self) -> usize {
        let mut tokens = self
            .max_in_flight_batches
            .max(self.resolved_threads() * 2);
        if self.memory_limit_bytes > 0 && self.batch_capacity_bytes > 0 {
            let limit = self.memory_limit_bytes;
            // floor(limit * 7 / 10) without overflowing
            let share = limit / 10 * MEMORY_SHARE_TENTHS + limit % 10 * MEMORY_SHARE_TENTHS / 10;
            let cap = share / self.batch_capacity_bytes;
            if cap > 0 {
                tokens = tokens.min(cap);
            }
        }
        tokens.max(1)
    }

    #[must_use]
    pub fn reader_options(&self) -> ReaderOptions {
        ReaderOptions {
            read_chunk_bytes: self.read_chunk_bytes,
            compression_buffer_bytes: self.compression_buffer_bytes,
            max_buffer_bytes: self.batch_capacity_bytes,
        }
    }

    #[must_use]
    pub fn writer_options(&self) -> WriterOptions {
        WriterOptions {
            output_buffer_bytes: self.writer_buffer_bytes,
            compression: self.output_compression,
            level: self.compression_level,
        }
    }
}

/// Builder for [`ProcessingConfig`]
///
/// Unset fields fall back to [`ProcessingConfig::default`].
///
/// ```rust
/// use fqtools::ProcessingConfig;
///
/// let config = ProcessingConfig::builder()
///     .thread_count(4)
///     .batch_size(5_000)
///     .build()
///     .unwrap();
/// assert_eq!(config.token_budget(), 8);
/// ```
#[derive(Debug, Default, Clone)]
pub struct ProcessingConfigBuilder {
    thread_count: Option<usize>,
    batch_size: Option<usize>,
    read_chunk_bytes: Option<usize>,
    compression_buffer_bytes: Option<usize>,
    batch_capacity_bytes: Option<usize>,
    writer_buffer_bytes: Option<usize>,
    max_in_flight_batches: Option<usize>,
    memory_limit_bytes: Option<usize>,
    quality_offset: Option<u8>,
    output_compression: Option<CompressionMode>,
    compression_level: Option<i32>,
}
impl ProcessingConfigBuilder {
    #[must_use]
    pub fn thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = Some(thread_count);
        self
    }

    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    #[must_use]
    pub fn read_chunk_bytes(mut self, bytes: usize) -> Self {
        self.read_chunk_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn compression_buffer_bytes(mut self, bytes: usize) -> Self {
        self.compression_buffer_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn batch_capacity_bytes(mut self, bytes: usize) -> Self {
        self.batch_capacity_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn writer_buffer_bytes(mut self, bytes: usize) -> Self {
        self.writer_buffer_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn max_in_flight_batches(mut self, batches: usize) -> Self {
        self.max_in_flight_batches = Some(batches);
        self
    }

    #[must_use]
    pub fn memory_limit_bytes(mut self, bytes: usize) -> Self {
        self.memory_limit_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn quality_offset(mut self, offset: u8) -> Self {
        self.quality_offset = Some(offset);
        self
    }

    #[must_use]
    pub fn output_compression(mut self, mode: CompressionMode) -> Self {
        self.output_compression = Some(mode);
        self
    }

    #[must_use]
    pub fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = Some(level);
        self
    }

    /// Builds and validates the configuration
    pub fn build(self) -> Result<ProcessingConfig> {
        let defaults = ProcessingConfig::default();
        let config = ProcessingConfig {
            thread_count: self.thread_count.unwrap_or(defaults.thread_count),
            batch_size: self.batch_size.unwrap_or(defaults.batch_size),
            read_chunk_bytes: self.read_chunk_bytes.unwrap_or(defaults.read_chunk_bytes),
            compression_buffer_bytes: self
                .compression_buffer_bytes
                .unwrap_or(defaults.compression_buffer_bytes),
            batch_capacity_bytes: self
                .batch_capacity_bytes
                .unwrap_or(defaults.batch_capacity_bytes),
            writer_buffer_bytes: self
                .writer_buffer_bytes
                .unwrap_or(defaults.writer_buffer_bytes),
            max_in_flight_batches: self
                .max_in_flight_batches
                .unwrap_or(defaults.max_in_flight_batches),
            memory_limit_bytes: self
                .memory_limit_bytes
                .unwrap_or(defaults.memory_limit_bytes),
            quality_offset: self.quality_offset.unwrap_or(defaults.quality_offset),
            output_compression: self
                .output_compression
                .unwrap_or(defaults.output_compression),
            compression_level: self.compression_level.or(defaults.compression_level),
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_token_budget_from_threads() -> Result<()> {
        let config = ProcessingConfig::builder().thread_count(3).build()?;
        assert_eq!(config.token_budget(), 6);

        let config = ProcessingConfig::builder()
            .thread_count(3)
            .max_in_flight_batches(10)
            .build()?;
        assert_eq!(config.token_budget(), 10);
        Ok(())
    }

    #[test]
    fn test_token_budget_memory_cap() -> Result<()> {
        // 70% of 10 MiB fits one 4 MiB batch
        let config = ProcessingConfig::builder()
            .thread_count(4)
            .batch_capacity_bytes(4 * 1024 * 1024)
            .memory_limit_bytes(10 * 1024 * 1024)
            .build()?;
        assert_eq!(config.token_budget(), 1);

        // A limit too small for a single batch leaves the budget alone
        let config = ProcessingConfig::builder()
            .thread_count(2)
            .batch_capacity_bytes(4 * 1024 * 1024)
            .memory_limit_bytes(1024)
            .build()?;
        assert_eq!(config.token_budget(), 4);
        Ok(())
    }

    #[test]
    fn test_token_budget_memory_cap_rounds_once() {
        // 14 * 7 / 10 = 9 bytes, room for one 9 byte batch
        let config = ProcessingConfig {
            thread_count: 4,
            batch_capacity_bytes: 9,
            memory_limit_bytes: 14,
            ..ProcessingConfig::default()
        };
        assert_eq!(config.token_budget(), 1);

        let config = ProcessingConfig {
            thread_count: 8,
            batch_capacity_bytes: 7,
            memory_limit_bytes: usize::MAX,
            ..ProcessingConfig::default()
        };
        assert_eq!(config.token_budget(), 16);
    }

    #[test]
    fn test_zero_sizes_rejected() {
        let err = ProcessingConfig::builder().batch_size(0).build().unwrap_err();
        assert!(matches!(err, Error::ConfigError(ConfigError::ZeroValue("batch_size"))));
    }

    #[test]
    fn test_derived_options() {
        let config = ProcessingConfig {
            batch_capacity_bytes: 1234,
            writer_buffer_bytes: 99,
            ..ProcessingConfig::default()
        };
        assert_eq!(config.reader_options().max_buffer_bytes, 1234);
        assert_eq!(config.writer_options().output_buffer_bytes, 99);
    }
}
