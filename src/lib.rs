//! Streaming FASTQ filtering and statistics
//!
//! Records are read in bounded batches ([`RecordBatch`]) that own one contiguous
//! byte buffer and index each record by offset. Batches flow through an ordered
//! three-stage pipeline (read, transform in parallel, write or aggregate) with a
//! fixed number of batches in flight, so memory stays bounded for inputs of any size.
//!
//! * [`processing`] filters and trims records into a new FASTQ file
//! * [`statistics`] summarizes per-position quality and base composition

mod batch;
mod config;
mod error;
mod pool;
mod record;

pub mod cli;
pub mod io;
pub mod parallel;
pub mod processing;
pub mod statistics;

pub use batch::{RecordBatch, RecordBatchIter};
pub use config::{
    ProcessingConfig, ProcessingConfigBuilder, DEFAULT_BATCH_CAPACITY_BYTES, DEFAULT_BATCH_SIZE,
};
pub use error::{
    ConfigError, Error, ErrorCategory, ErrorSeverity, FileError, FormatError, ProcessingError,
    ResourceError, Result, ValidationError,
};
pub use io::{ChunkedReader, FastqWriter, ReaderOptions, WriterOptions};
pub use parallel::{OrderedPipeline, OrderedSink, ParallelProcessor};
pub use pool::{BatchPool, PooledBatch};
pub use record::{FastqRecord, OwnedRecord, RecordMut, RecordSpans, RefRecord, Span};

#[cfg(test)]
mod testing {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_fastq_round_trip() -> Result<()> {
        let records = vec![
            OwnedRecord::new("r1", "lane=1", "ACGTACGT", "IIIIIIII"),
            OwnedRecord::new("r2", "", "NNNN", "!!!!"),
            OwnedRecord::new("r3", "x y z", "A", "5"),
        ];

        let mut writer = FastqWriter::new(
            Vec::new(),
            io::Compression::None,
            &WriterOptions::default(),
        );
        for record in &records {
            writer.write_record(record)?;
        }
        writer.finish()?;

        let data = writer.get_ref().clone();
        let mut reader = ChunkedReader::new(Cursor::new(data), ReaderOptions::default());
        let mut batch = RecordBatch::default();
        assert!(reader.fill_batch(&mut batch, 0)?);

        let parsed: Vec<_> = batch.iter().map(|r| r.to_owned()).collect();
        assert_eq!(parsed, records);
        assert!(!reader.fill_batch(&mut batch, 0)?);
        Ok(())
    }

    #[test]
    fn test_single_record_defaults() -> Result<()> {
        let mut reader = ChunkedReader::new(
            Cursor::new(b"@r1\nACGT\n+\nIIII\n".to_vec()),
            ReaderOptions::default(),
        );
        let mut batch = RecordBatch::default();
        assert!(reader.fill_batch(&mut batch, DEFAULT_BATCH_SIZE)?);
        assert_eq!(batch.len(), 1);

        let record = batch.get(0).expect("one record");
        assert_eq!(record.id(), b"r1");
        assert_eq!(record.seq(), b"ACGT");
        assert_eq!(record.qual(), b"IIII");
        assert_eq!(record.mean_quality(33), Some(40.0));
        Ok(())
    }
}
