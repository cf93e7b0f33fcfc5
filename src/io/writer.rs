//! Buffered FASTQ writer with optional gzip or zstd output
//!
//! Records are serialized into an uncompressed block buffer. When the next record
//! would overflow the block, the block is flushed: written as-is for plain output,
//! or encoded as one independent gzip member / zstd frame for compressed output.
//! Concatenated members and frames are valid streams for any standard decoder.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use zstd::stream::write::Encoder as ZstdEncoder;

use super::{Compression, CompressionMode};
use crate::error::FileError;
use crate::record::FastqRecord;
use crate::{RecordBatch, Result};

/// Default size of the uncompressed block buffer
pub const DEFAULT_OUTPUT_BUFFER_BYTES: usize = 128 * 1024;

/// Default gzip compression level
pub const DEFAULT_GZIP_LEVEL: u32 = 6;

/// Default zstd compression level
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Extra room reserved when a single record outgrows the block buffer
const OVERSIZE_SLACK: usize = 4096;

/// Tuning knobs for a [`FastqWriter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriterOptions {
    /// Size of the uncompressed block buffer
    pub output_buffer_bytes: usize,
    /// How the output compression is chosen
    pub compression: CompressionMode,
    /// Compression level (format default when `None`)
    pub level: Option<i32>,
}
impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            output_buffer_bytes: DEFAULT_OUTPUT_BUFFER_BYTES,
            compression: CompressionMode::Auto,
            level: None,
        }
    }
}

/// Serialized size of a record, including all four line terminators
fn record_byte_size<R: FastqRecord>(record: &R) -> usize {
    let comment = record.comment();
    let comment_len = if comment.is_empty() {
        0
    } else {
        comment.len() + 1
    };
    // '@' + id + comment + '\n' + seq + '\n' + "+\n" + qual + '\n'
    1 + record.id().len() + comment_len + 1 + record.seq().len() + 1 + 2 + record.qual().len() + 1
}

/// Writer for FASTQ files
///
/// Use [`FastqWriter::create`] to write to a path (compression picked from the
/// [`WriterOptions`] and the path suffix) or [`FastqWriter::new`] for any [`Write`].
///
/// The writer flushes on drop, but errors are only logged there. Call
/// [`FastqWriter::finish`] to observe them.
///
/// ```rust,no_run
/// use fqtools::{FastqWriter, OwnedRecord, WriterOptions};
///
/// let mut writer = FastqWriter::create("out.fq.gz", WriterOptions::default()).unwrap();
/// writer.write_record(&OwnedRecord::new("r1", "", "ACGT", "IIII")).unwrap();
/// writer.finish().unwrap();
/// ```
pub struct FastqWriter<W: Write> {
    /// Inner Writer
    inner: W,

    /// Output format
    compression: Compression,

    /// Compression level (format default when `None`)
    level: Option<i32>,

    /// Current block capacity
    capacity: usize,

    /// Uncompressed buffer
    ubuf: Vec<u8>,

    /// Compressed buffer
    zbuf: Vec<u8>,

    /// Serialized FASTQ bytes accepted so far
    total_uncompressed: u64,

    /// Bytes handed to the inner writer so far
    total_written: u64,
}

impl FastqWriter<File> {
    /// Creates (or truncates) `path` and returns a writer for it
    pub fn create<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let path = path.as_ref();
        let compression = options.compression.resolve(path);
        let file = File::create(path).map_err(|source| FileError::CreateOutput {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!(
            "Writing {} output to {}",
            compression.name(),
            path.display()
        );
        Ok(Self::new(file, compression, &options))
    }
}

impl<W: Write> FastqWriter<W> {
    pub fn new(inner: W, compression: Compression, options: &WriterOptions) -> Self {
        let capacity = options.output_buffer_bytes.max(1);
        Self {
            inner,
            compression,
            level: options.level,
            capacity,
            ubuf: Vec::with_capacity(capacity),
            zbuf: if compression.is_compressed() {
                Vec::with_capacity(capacity)
            } else {
                Vec::new()
            },
            total_uncompressed: 0,
            total_written: 0,
        }
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Serialized (uncompressed) FASTQ bytes written so far
    #[must_use]
    pub fn total_uncompressed_bytes(&self) -> u64 {
        self.total_uncompressed
    }

    /// Bytes handed to the underlying writer so far (compressed size for compressed output)
    #[must_use]
    pub fn total_written_bytes(&self) -> u64 {
        self.total_written
    }

    /// Current block buffer capacity
    #[must_use]
    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Appends one record
    ///
    /// A record larger than the block buffer grows the buffer (and the compression
    /// scratch space) instead of failing.
    pub fn write_record<R: FastqRecord>(&mut self, record: &R) -> Result<()> {
        let size = record_byte_size(record);
        if !self.ubuf.is_empty() && self.ubuf.len() + size > self.capacity {
            self.flush_block()?;
        }
        if size > self.capacity {
            self.grow(size);
        }

        let buf = &mut self.ubuf;
        buf.push(b'@');
        buf.extend_from_slice(record.id());
        if !record.comment().is_empty() {
            buf.push(b' ');
            buf.extend_from_slice(record.comment());
        }
        buf.push(b'\n');
        buf.extend_from_slice(record.seq());
        buf.extend_from_slice(b"\n+\n");
        buf.extend_from_slice(record.qual());
        buf.push(b'\n');

        self.total_uncompressed += size as u64;
        Ok(())
    }

    /// Appends every non-empty record of a batch, returning how many were written
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<usize> {
        let mut n_written = 0;
        for record in batch.iter().filter(|r| !r.is_empty()) {
            self.write_record(&record)?;
            n_written += 1;
        }
        Ok(n_written)
    }

    /// Writes the pending block and flushes the inner writer
    pub fn flush(&mut self) -> Result<()> {
        self.flush_block()?;
        self.inner.flush()?;
        Ok(())
    }

    /// Finishes writing; equivalent to [`FastqWriter::flush`] but meant as the final call
    pub fn finish(&mut self) -> Result<()> {
        self.flush()
    }

    fn grow(&mut self, needed: usize) {
        let capacity = (self.capacity * 2).max(needed + OVERSIZE_SLACK);
        log::debug!(
            "Growing writer buffer from {} to {} bytes for an oversized record",
            self.capacity,
            capacity
        );
        self.capacity = capacity;
        self.ubuf.reserve(capacity - self.ubuf.len());
        if self.compression.is_compressed() {
            self.zbuf.reserve(capacity.saturating_sub(self.zbuf.capacity()));
        }
    }

    fn flush_block(&mut self) -> Result<()> {
        // Skip if the block is empty
        if self.ubuf.is_empty() {
            return Ok(());
        }
        match self.compression {
            Compression::None => {
                self.inner.write_all(&self.ubuf)?;
                self.total_written += self.ubuf.len() as u64;
            }
            Compression::Gzip => {
                self.zbuf.clear();
                let level = self
                    .level
                    .map_or(DEFAULT_GZIP_LEVEL, |l| l.clamp(0, 9).unsigned_abs());
                let mut encoder =
                    GzEncoder::new(&mut self.zbuf, flate2::Compression::new(level));
                encoder.write_all(&self.ubuf)?;
                encoder.finish()?;
                self.write_compressed()?;
            }
            Compression::Zstd => {
                self.zbuf.clear();
                let level = self.level.unwrap_or(DEFAULT_ZSTD_LEVEL);
                let mut encoder = ZstdEncoder::new(&mut self.zbuf, level)?;
                encoder.write_all(&self.ubuf)?;
                encoder.finish()?;
                self.write_compressed()?;
            }
        }
        self.ubuf.clear();
        Ok(())
    }

    fn write_compressed(&mut self) -> Result<()> {
        self.inner.write_all(&self.zbuf)?;
        self.total_written += self.zbuf.len() as u64;
        self.zbuf.clear();
        Ok(())
    }
}

impl<W: Write> Drop for FastqWriter<W> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::warn!("FastqWriter: failed to flush on drop: {e}");
        }
    }
}
