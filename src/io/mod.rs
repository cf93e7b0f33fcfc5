//! FASTQ input and output
//!
//! * [`ChunkedReader`] turns a raw, gzip, or zstd byte stream into [`RecordBatch`](crate::RecordBatch)es
//! * [`FastqWriter`] serializes records back to FASTQ text with optional compression

mod compression;
mod reader;
mod writer;

pub use compression::{Compression, CompressionMode, GZIP_MAGIC, ZSTD_MAGIC};
pub use reader::{
    ChunkedReader, FileReader, ReaderOptions, DEFAULT_COMPRESSION_BUFFER_BYTES,
    DEFAULT_READ_CHUNK_BYTES,
};
pub use writer::{
    FastqWriter, WriterOptions, DEFAULT_GZIP_LEVEL, DEFAULT_OUTPUT_BUFFER_BYTES,
    DEFAULT_ZSTD_LEVEL,
};
