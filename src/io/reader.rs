//! Chunked, boundary-safe FASTQ reader
//!
//! The [`ChunkedReader`] pulls raw (or transparently decompressed) bytes into a
//! [`RecordBatch`] buffer and indexes every complete 4-line record it finds.
//! Bytes belonging to a record that straddles the end of the buffer are carried
//! over to the next call, so parsing never depends on where a read happened to end.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use memchr::memchr;

use super::Compression;
use crate::error::{FileError, FormatError, ResourceError};
use crate::record::{RecordSpans, Span};
use crate::{RecordBatch, Result};

/// Bytes pulled from the underlying stream per read call
pub const DEFAULT_READ_CHUNK_BYTES: usize = 1024 * 1024;

/// Internal buffer handed to the decompressor
pub const DEFAULT_COMPRESSION_BUFFER_BYTES: usize = 128 * 1024;

/// Initial guess of the serialized size of one record
const INITIAL_RECORD_ESTIMATE: usize = 512;

/// Tuning knobs for a [`ChunkedReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderOptions {
    /// Bytes requested from the underlying stream per read
    pub read_chunk_bytes: usize,
    /// Size of the buffer sitting between the file and a decompressor
    pub compression_buffer_bytes: usize,
    /// Hard ceiling on bytes held in one batch (0 = unbounded)
    pub max_buffer_bytes: usize,
}
impl Default for ReaderOptions {
    fn default() -> Self {
        Self {
            read_chunk_bytes: DEFAULT_READ_CHUNK_BYTES,
            compression_buffer_bytes: DEFAULT_COMPRESSION_BUFFER_BYTES,
            max_buffer_bytes: 0,
        }
    }
}

/// A reader over a file whose compression was detected at open time
pub type FileReader = ChunkedReader<Box<dyn Read + Send>>;

/// Streaming FASTQ reader producing [`RecordBatch`]es
///
/// # Examples
///
/// ```rust
/// use fqtools::{ChunkedReader, FastqRecord, RecordBatch, ReaderOptions};
///
/// let data: &[u8] = b"@r1\nACGT\n+\nIIII\n";
/// let mut reader = ChunkedReader::new(data, ReaderOptions::default());
/// let mut batch = RecordBatch::default();
/// while reader.fill_batch(&mut batch, 1024).unwrap() {
///     for record in batch.iter() {
///         assert_eq!(record.id(), b"r1");
///     }
/// }
/// ```
pub struct ChunkedReader<R: Read> {
    /// Inner (possibly decompressing) stream
    inner: R,

    options: ReaderOptions,

    /// Format detected when the reader was opened
    compression: Compression,

    /// Unparsed bytes carried over from the previous batch
    remainder: Vec<u8>,

    /// Whether the inner stream is exhausted
    eof: bool,

    /// Records handed out so far
    records_read: usize,

    /// Decoded bytes handed out so far
    bytes_consumed: usize,

    /// Running estimate of bytes per record, used to size reads
    record_estimate: usize,
}

impl ChunkedReader<Box<dyn Read + Send>> {
    /// Opens a FASTQ file, detecting gzip or zstd compression from its leading bytes
    ///
    /// The detection happens exactly once; the remaining stream is routed through
    /// the matching decoder (or read raw) for the lifetime of the reader.
    ///
    /// # Errors
    ///
    /// Returns [`FileError::OpenInput`] if the file cannot be opened and an I/O error
    /// if sniffing or decoder setup fails.
    pub fn open<P: AsRef<Path>>(path: P, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|source| FileError::OpenInput {
            path: path.to_path_buf(),
            source,
        })?;

        // Sniff the magic bytes and rewind
        let mut head = Vec::with_capacity(4);
        file.by_ref().take(4).read_to_end(&mut head)?;
        file.seek(SeekFrom::Start(0))?;
        let compression = Compression::sniff(&head);

        let capacity = options.compression_buffer_bytes.max(1);
        let inner: Box<dyn Read + Send> = match compression {
            Compression::Gzip => Box::new(MultiGzDecoder::new(BufReader::with_capacity(
                capacity, file,
            ))),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::with_buffer(
                BufReader::with_capacity(capacity, file),
            )?),
            Compression::None => Box::new(file),
        };
        log::debug!(
            "Opened {} as {} input",
            path.display(),
            compression.name()
        );

        let mut reader = Self::new(inner, options);
        reader.compression = compression;
        Ok(reader)
    }
}

impl<R: Read> ChunkedReader<R> {
    /// Wraps an already decoded byte stream
    pub fn new(inner: R, options: ReaderOptions) -> Self {
        Self {
            inner,
            options,
            compression: Compression::None,
            remainder: Vec::new(),
            eof: false,
            records_read: 0,
            bytes_consumed: 0,
            record_estimate: INITIAL_RECORD_ESTIMATE,
        }
    }

    #[must_use]
    pub fn compression(&self) -> Compression {
        self.compression
    }

    #[must_use]
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Total number of records produced so far
    #[must_use]
    pub fn records_read(&self) -> usize {
        self.records_read
    }

    /// Total number of decoded bytes handed out in batches so far
    #[must_use]
    pub fn bytes_consumed(&self) -> usize {
        self.bytes_consumed
    }

    /// Fills `batch` with the next complete records of the stream
    ///
    /// The batch is cleared, the remainder of the previous call is copied to the
    /// front of its buffer, and chunks are read until enough bytes for `max_records`
    /// records (or one more chunk if `max_records` is 0) are buffered. Complete records
    /// are then indexed; any trailing partial record is carried to the next call.
    ///
    /// # Parameters
    ///
    /// * `batch` - The batch to fill
    /// * `max_records` - Upper bound on records placed in the batch (0 = no bound)
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The batch holds at least one record
    /// * `Ok(false)` - The stream is exhausted
    ///
    /// # Errors
    ///
    /// * [`FormatError`] if a record is malformed or truncated
    /// * [`ResourceError::BatchCapacityTooSmall`] if `max_buffer_bytes` is reached
    ///   without a single complete record
    /// * Any I/O or decompression error from the inner stream
    pub fn fill_batch(&mut self, batch: &mut RecordBatch, max_records: usize) -> Result<bool> {
        // Clear the batch and seed it with the carried remainder
        batch.clear();
        batch.set_first_index(self.records_read);
        if max_records > 0 {
            batch.reserve_records(max_records);
        }
        let (buffer, records) = batch.parts_mut();
        buffer.extend_from_slice(&self.remainder);
        self.remainder.clear();

        let mut target = self.initial_target(buffer.len(), max_records);
        loop {
            // Read more data
            self.read_until(buffer, target)?;
            if buffer.is_empty() {
                return Ok(false);
            }

            let consumed = parse_records(buffer, self.eof, max_records, self.bytes_consumed, records)?;
            if !records.is_empty() {
                // Carry trailing bytes over to the next call
                self.remainder.extend_from_slice(&buffer[consumed..]);
                buffer.truncate(consumed);

                self.records_read += records.len();
                self.bytes_consumed += consumed;
                self.record_estimate = (consumed / records.len()).max(1);
                log::trace!(
                    "Filled batch with {} records ({} bytes, {} carried)",
                    records.len(),
                    consumed,
                    self.remainder.len()
                );
                return Ok(true);
            }

            if self.eof {
                // Only blank lines may trail the last record
                return match buffer.iter().position(|b| !matches!(b, b'\n' | b'\r')) {
                    None => {
                        self.bytes_consumed += buffer.len();
                        buffer.clear();
                        Ok(false)
                    }
                    Some(pos) => Err(FormatError::TruncatedRecord {
                        offset: self.bytes_consumed + pos,
                    }
                    .into()),
                };
            }

            let ceiling = self.options.max_buffer_bytes;
            if ceiling > 0 && buffer.len() >= ceiling {
                return Err(ResourceError::BatchCapacityTooSmall { capacity: ceiling }.into());
            }

            // No complete record yet: pull at least one more chunk
            target = self.cap(buffer.len() + self.chunk_size());
        }
    }

    fn chunk_size(&self) -> usize {
        self.options.read_chunk_bytes.max(1)
    }

    fn cap(&self, target: usize) -> usize {
        match self.options.max_buffer_bytes {
            0 => target,
            ceiling => target.min(ceiling),
        }
    }

    /// Number of buffered bytes to aim for before parsing
    fn initial_target(&self, buffered: usize, max_records: usize) -> usize {
        let wanted = if max_records > 0 {
            max_records
                .saturating_add(1)
                .saturating_mul(self.record_estimate)
        } else {
            buffered + self.chunk_size()
        };
        self.cap(wanted.max(buffered))
    }

    /// Reads chunks into `buffer` until it holds `target` bytes or the stream ends
    fn read_until(&mut self, buffer: &mut Vec<u8>, target: usize) -> Result<()> {
        while buffer.len() < target && !self.eof {
            let start = buffer.len();
            let chunk = self.chunk_size().min(target - start);
            buffer.resize(start + chunk, 0);
            match self.inner.read(&mut buffer[start..]) {
                Ok(0) => {
                    buffer.truncate(start);
                    self.eof = true;
                }
                Ok(n) => buffer.truncate(start + n),
                Err(e) if e.kind() == ErrorKind::Interrupted => buffer.truncate(start),
                Err(e) => {
                    buffer.truncate(start);
                    return Err(e.into());
                }
            }
        }
        Ok(())
    }
}

/// One line of the buffer, without its terminator
#[derive(Debug, Clone, Copy)]
struct Line {
    start: usize,
    /// End of the content (a trailing `\r` is excluded)
    end: usize,
    /// Start of the following line
    next: usize,
}

/// Finds the line starting at `start`
///
/// The final line may lack a terminator only when `at_eof` is set.
fn next_line(buffer: &[u8], start: usize, at_eof: bool) -> Option<Line> {
    let (mut end, next) = match memchr(b'\n', &buffer[start..]) {
        Some(i) => (start + i, start + i + 1),
        None if at_eof => (buffer.len(), buffer.len()),
        None => return None,
    };
    if end > start && buffer[end - 1] == b'\r' {
        end -= 1;
    }
    Some(Line { start, end, next })
}

/// Splits the header line into id and comment spans at the first space or tab
fn split_header(buffer: &[u8], header: Line) -> (Span, Span) {
    let content = header.start + 1;
    let line = &buffer[content..header.end];
    match line.iter().position(|&b| b == b' ' || b == b'\t') {
        Some(i) => (
            Span::new(content, i),
            Span::new(content + i + 1, line.len() - i - 1),
        ),
        None => (Span::new(content, line.len()), Span::new(header.end, 0)),
    }
}

/// Indexes complete records in `buffer`, returning the number of bytes they cover
///
/// `base` is the stream offset of `buffer[0]` and is only used for error reporting.
fn parse_records(
    buffer: &[u8],
    at_eof: bool,
    max_records: usize,
    base: usize,
    records: &mut Vec<RecordSpans>,
) -> Result<usize> {
    let mut pos = 0;
    let mut consumed = 0;
    while max_records == 0 || records.len() < max_records {
        // Skip blank lines between records
        while pos < buffer.len() && matches!(buffer[pos], b'\n' | b'\r') {
            pos += 1;
        }
        if pos >= buffer.len() {
            break;
        }
        if buffer[pos] != b'@' {
            return Err(FormatError::MissingHeaderMarker {
                offset: base + pos,
                found: char::from(buffer[pos]),
            }
            .into());
        }

        let Some(header) = next_line(buffer, pos, false) else {
            break;
        };
        let Some(seq) = next_line(buffer, header.next, false) else {
            break;
        };
        if seq.next >= buffer.len() {
            break;
        }
        if buffer[seq.next] != b'+' {
            return Err(FormatError::MissingSeparator {
                offset: base + seq.next,
                found: char::from(buffer[seq.next]),
            }
            .into());
        }
        let Some(plus) = next_line(buffer, seq.next, false) else {
            break;
        };
        let Some(qual) = next_line(buffer, plus.next, at_eof) else {
            break;
        };

        let seq_len = seq.end - seq.start;
        let qual_len = qual.end - qual.start;
        let (id, comment) = split_header(buffer, header);
        if seq_len != qual_len {
            return Err(FormatError::LengthMismatch {
                id: String::from_utf8_lossy(id.slice(buffer)).into_owned(),
                seq: seq_len,
                qual: qual_len,
            }
            .into());
        }

        let ordinal = records.len();
        records.push(RecordSpans {
            id,
            comment,
            seq: Span::new(seq.start, seq_len),
            plus: Span::new(plus.start + 1, plus.end - plus.start - 1),
            qual: Span::new(qual.start, qual_len),
            ordinal,
        });
        pos = qual.next;
        consumed = pos;
    }
    Ok(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FastqRecord, OwnedRecord};
    use crate::Error;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use std::io::{Cursor, Write};

    fn read_all(data: &[u8], options: ReaderOptions, max_records: usize) -> Result<Vec<OwnedRecord>> {
        let mut reader = ChunkedReader::new(Cursor::new(data.to_vec()), options);
        let mut batch = RecordBatch::default();
        let mut records = Vec::new();
        while reader.fill_batch(&mut batch, max_records)? {
            records.extend(batch.iter().map(|r| r.to_owned()));
        }
        Ok(records)
    }

    fn small_chunks(read_chunk_bytes: usize) -> ReaderOptions {
        ReaderOptions {
            read_chunk_bytes,
            ..ReaderOptions::default()
        }
    }

    fn random_fastq(rng: &mut SmallRng, n: usize) -> (Vec<u8>, Vec<OwnedRecord>) {
        let mut data = Vec::new();
        let mut records = Vec::new();
        for i in 0..n {
            let len = rng.random_range(1..120);
            let seq: Vec<u8> = (0..len).map(|_| b"ACGTN"[rng.random_range(0..5)]).collect();
            let qual: Vec<u8> = (0..len).map(|_| rng.random_range(33..75)).collect();
            let id = format!("read{i}").into_bytes();
            let comment = if i % 3 == 0 {
                b"1:N:0:ACGT".to_vec()
            } else {
                Vec::new()
            };
            data.push(b'@');
            data.extend_from_slice(&id);
            if !comment.is_empty() {
                data.push(b' ');
                data.extend_from_slice(&comment);
            }
            data.push(b'\n');
            data.extend_from_slice(&seq);
            data.extend_from_slice(b"\n+\n");
            data.extend_from_slice(&qual);
            data.push(b'\n');
            records.push(OwnedRecord {
                id,
                comment,
                seq,
                qual,
            });
        }
        (data, records)
    }

    #[test]
    fn test_single_record() -> Result<()> {
        let records = read_all(b"@r1\nACGT\n+\nIIII\n", ReaderOptions::default(), 0)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, b"r1");
        assert_eq!(records[0].seq, b"ACGT");
        assert_eq!(records[0].qual, b"IIII");
        Ok(())
    }

    #[test]
    fn test_comment_split_and_plus_line() -> Result<()> {
        let data = b"@r1 1:N:0\tx\nACGT\n+r1\nIIII\n";
        let mut reader = ChunkedReader::new(&data[..], ReaderOptions::default());
        let mut batch = RecordBatch::default();
        assert!(reader.fill_batch(&mut batch, 0)?);
        let record = batch.get(0).expect("one record");
        assert_eq!(record.id(), b"r1");
        assert_eq!(record.comment(), b"1:N:0\tx");
        assert_eq!(record.plus(), b"r1");
        Ok(())
    }

    #[test]
    fn test_crlf_and_missing_final_newline() -> Result<()> {
        let records = read_all(
            b"@r1\r\nACGT\r\n+\r\nIIII\r\n@r2\r\nGG\r\n+\r\n##",
            small_chunks(3),
            0,
        )?;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].seq, b"ACGT");
        assert_eq!(records[0].qual, b"IIII");
        assert_eq!(records[1].id, b"r2");
        assert_eq!(records[1].qual, b"##");
        Ok(())
    }

    #[test]
    fn test_empty_input_and_blank_lines() -> Result<()> {
        assert!(read_all(b"", ReaderOptions::default(), 0)?.is_empty());
        let records = read_all(b"\n@r1\nA\n+\nI\n\n\n", ReaderOptions::default(), 0)?;
        assert_eq!(records.len(), 1);
        Ok(())
    }

    #[test]
    fn test_max_records_splits_batches() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(7);
        let (data, expected) = random_fastq(&mut rng, 25);
        let mut reader = ChunkedReader::new(Cursor::new(data), ReaderOptions::default());
        let mut batch = RecordBatch::default();
        let mut sizes = Vec::new();
        let mut first_indices = Vec::new();
        while reader.fill_batch(&mut batch, 10)? {
            sizes.push(batch.len());
            first_indices.push(batch.first_index());
        }
        assert_eq!(sizes, vec![10, 10, 5]);
        assert_eq!(first_indices, vec![0, 10, 20]);
        assert_eq!(reader.records_read(), expected.len());
        Ok(())
    }

    #[test]
    fn test_result_independent_of_chunk_size() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(42);
        let (data, expected) = random_fastq(&mut rng, 200);
        for chunk in [1, 2, 3, 7, 64, 511, 4096, data.len(), data.len() + 1] {
            for max_records in [0, 1, 13] {
                let records = read_all(&data, small_chunks(chunk), max_records)?;
                assert_eq!(records, expected, "chunk={chunk} max_records={max_records}");
            }
        }
        Ok(())
    }

    #[test]
    fn test_missing_header_marker() {
        let err = read_all(b"r1\nACGT\n+\nIIII\n", ReaderOptions::default(), 0).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::MissingHeaderMarker { offset: 0, found: 'r' })
        ));
    }

    #[test]
    fn test_missing_separator() {
        let err = read_all(b"@r1\nACGT\n-\nIIII\n", ReaderOptions::default(), 0).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::MissingSeparator { offset: 9, .. })
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let err = read_all(b"@r1\nACGT\n+\nIII\n", ReaderOptions::default(), 0).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::LengthMismatch { seq: 4, qual: 3, .. })
        ));
    }

    #[test]
    fn test_truncated_record() {
        let err = read_all(b"@r1\nACGT\n+\nIIII\n@r2\nAC", small_chunks(4), 0).unwrap_err();
        assert!(matches!(
            err,
            Error::FormatError(FormatError::TruncatedRecord { offset: 16 })
        ));
    }

    #[test]
    fn test_batch_capacity_too_small() {
        let options = ReaderOptions {
            read_chunk_bytes: 4,
            max_buffer_bytes: 8,
            ..ReaderOptions::default()
        };
        let err = read_all(b"@r1\nACGTACGT\n+\nIIIIIIII\n", options, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::ResourceError(ResourceError::BatchCapacityTooSmall { capacity: 8 })
        ));
    }

    #[test]
    fn test_open_plain_gzip_and_zstd() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(3);
        let (data, expected) = random_fastq(&mut rng, 50);
        let dir = tempfile::tempdir()?;

        let plain = dir.path().join("reads.fq");
        std::fs::write(&plain, &data)?;

        // Compressed files deliberately carry no suffix: detection is by content
        let gz = dir.path().join("reads.bin");
        let mut encoder =
            flate2::write::GzEncoder::new(File::create(&gz)?, flate2::Compression::default());
        encoder.write_all(&data[..data.len() / 2])?;
        encoder.finish()?;
        // A second member must be read as well
        let mut encoder = flate2::write::GzEncoder::new(
            std::fs::OpenOptions::new().append(true).open(&gz)?,
            flate2::Compression::fast(),
        );
        encoder.write_all(&data[data.len() / 2..])?;
        encoder.finish()?;

        let zst = dir.path().join("reads.z");
        std::fs::write(&zst, zstd::encode_all(&data[..], 3)?)?;

        for (path, compression) in [
            (&plain, Compression::None),
            (&gz, Compression::Gzip),
            (&zst, Compression::Zstd),
        ] {
            let mut reader = ChunkedReader::open(path, small_chunks(97))?;
            assert_eq!(reader.compression(), compression);
            let mut batch = RecordBatch::default();
            let mut records = Vec::new();
            while reader.fill_batch(&mut batch, 16)? {
                records.extend(batch.iter().map(|r| r.to_owned()));
            }
            assert_eq!(records, expected);
        }
        Ok(())
    }

    #[test]
    fn test_open_missing_file() {
        let err = ChunkedReader::open("/definitely/not/here.fq", ReaderOptions::default())
            .err()
            .expect("open must fail");
        assert!(matches!(err, Error::FileError(FileError::OpenInput { .. })));
    }
}
