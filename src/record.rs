//! Record views into a [`RecordBatch`](crate::RecordBatch) buffer
//!
//! Records never own their bytes. The parser stores each field as a [`Span`]
//! (offset and length into the batch buffer) and the accessors hand out slices
//! whose lifetime is tied to a borrow of the batch.

/// Common accessors shared by every FASTQ record representation
pub trait FastqRecord {
    /// Returns the read identifier (without the leading `@`)
    fn id(&self) -> &[u8];

    /// Returns the free-text comment following the identifier, if any
    fn comment(&self) -> &[u8];

    /// Returns the nucleotide sequence
    fn seq(&self) -> &[u8];

    /// Returns the encoded quality string
    fn qual(&self) -> &[u8];

    /// Number of bases in the record
    fn len(&self) -> usize {
        self.seq().len()
    }

    /// A record without bases is logically filtered out
    fn is_empty(&self) -> bool {
        self.seq().is_empty()
    }

    /// Mean Phred score of the record, `None` if there are no quality values
    fn mean_quality(&self, offset: u8) -> Option<f64> {
        let qual = self.qual();
        if qual.is_empty() {
            return None;
        }
        let sum: i64 = qual
            .iter()
            .map(|&q| i64::from(q) - i64::from(offset))
            .sum();
        Some(sum as f64 / qual.len() as f64)
    }

    /// Number of ambiguous (`N`/`n`) bases
    fn n_count(&self) -> usize {
        self.seq().iter().filter(|&&b| b == b'N' || b == b'n').count()
    }
}

/// A `(start, len)` window into a batch buffer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub len: usize,
}
impl Span {
    #[must_use]
    pub fn new(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Resolves the span against its buffer
    #[must_use]
    pub fn slice<'a>(&self, buffer: &'a [u8]) -> &'a [u8] {
        &buffer[self.start..self.end()]
    }

    /// Narrows the span to the sub-window `[from, to)` relative to its current start
    fn narrow(&mut self, from: usize, to: usize) {
        debug_assert!(from <= to && to <= self.len);
        self.start += from;
        self.len = to - from;
    }
}

/// Positions of every field of one record within its batch buffer
///
/// The parser guarantees `seq.len == qual.len` and that all spans lie inside
/// the buffer they were parsed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordSpans {
    pub id: Span,
    pub comment: Span,
    pub seq: Span,
    pub plus: Span,
    pub qual: Span,
    /// Position of the record in its batch as parsed, kept when earlier records are dropped
    pub ordinal: usize,
}

/// A borrowed, read-only view of one record in a batch
#[derive(Debug, Clone, Copy)]
pub struct RefRecord<'a> {
    /// Global index of this record within the input stream
    index: usize,
    buffer: &'a [u8],
    spans: &'a RecordSpans,
}
impl<'a> RefRecord<'a> {
    #[must_use]
    pub fn new(index: usize, buffer: &'a [u8], spans: &'a RecordSpans) -> Self {
        Self {
            index,
            buffer,
            spans,
        }
    }

    /// Position of the record in the input stream (0-based)
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Content of the separator line after the `+`
    #[must_use]
    pub fn plus(&self) -> &'a [u8] {
        self.spans.plus.slice(self.buffer)
    }

    #[must_use]
    pub fn spans(&self) -> &'a RecordSpans {
        self.spans
    }

    /// Copies the record out of its batch
    #[must_use]
    pub fn to_owned(&self) -> OwnedRecord {
        OwnedRecord {
            id: self.id().to_vec(),
            comment: self.comment().to_vec(),
            seq: self.seq().to_vec(),
            qual: self.qual().to_vec(),
        }
    }
}
impl FastqRecord for RefRecord<'_> {
    fn id(&self) -> &[u8] {
        self.spans.id.slice(self.buffer)
    }
    fn comment(&self) -> &[u8] {
        self.spans.comment.slice(self.buffer)
    }
    fn seq(&self) -> &[u8] {
        self.spans.seq.slice(self.buffer)
    }
    fn qual(&self) -> &[u8] {
        self.spans.qual.slice(self.buffer)
    }
}

/// A trimmable view of one record in a batch
///
/// Mutations only ever shrink the sequence and quality windows, so the underlying
/// buffer is never written to. Sequence and quality are always trimmed together.
#[derive(Debug)]
pub struct RecordMut<'a> {
    buffer: &'a [u8],
    spans: &'a mut RecordSpans,
}
impl<'a> RecordMut<'a> {
    #[must_use]
    pub fn new(buffer: &'a [u8], spans: &'a mut RecordSpans) -> Self {
        Self { buffer, spans }
    }

    /// Keeps the bases in `[start, end)` and discards the rest
    ///
    /// Out of range bounds are clamped to the current length.
    pub fn trim(&mut self, start: usize, end: usize) {
        let len = self.spans.seq.len;
        let end = end.min(len);
        let start = start.min(end);
        self.spans.seq.narrow(start, end);
        self.spans.qual.narrow(start, end);
    }

    /// Keeps the first `len` bases
    pub fn truncate(&mut self, len: usize) {
        self.trim(0, len);
    }

    /// Drops the first `n` bases
    pub fn trim_front(&mut self, n: usize) {
        self.trim(n, self.spans.seq.len);
    }

    /// Empties the record, marking it as filtered
    pub fn clear(&mut self) {
        self.trim(0, 0);
    }
}
impl FastqRecord for RecordMut<'_> {
    fn id(&self) -> &[u8] {
        self.spans.id.slice(self.buffer)
    }
    fn comment(&self) -> &[u8] {
        self.spans.comment.slice(self.buffer)
    }
    fn seq(&self) -> &[u8] {
        self.spans.seq.slice(self.buffer)
    }
    fn qual(&self) -> &[u8] {
        self.spans.qual.slice(self.buffer)
    }
}

/// An owned FASTQ record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnedRecord {
    pub id: Vec<u8>,
    pub comment: Vec<u8>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}
impl OwnedRecord {
    pub fn new(
        id: impl Into<Vec<u8>>,
        comment: impl Into<Vec<u8>>,
        seq: impl Into<Vec<u8>>,
        qual: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            id: id.into(),
            comment: comment.into(),
            seq: seq.into(),
            qual: qual.into(),
        }
    }
}
impl FastqRecord for OwnedRecord {
    fn id(&self) -> &[u8] {
        &self.id
    }
    fn comment(&self) -> &[u8] {
        &self.comment
    }
    fn seq(&self) -> &[u8] {
        &self.seq
    }
    fn qual(&self) -> &[u8] {
        &self.qual
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans_for(buffer: &[u8]) -> RecordSpans {
        // "@r1\nACGTACGT\n+\n!!!!IIII\n"
        assert_eq!(buffer.len(), 24);
        RecordSpans {
            id: Span::new(1, 2),
            comment: Span::new(3, 0),
            seq: Span::new(4, 8),
            plus: Span::new(14, 0),
            qual: Span::new(15, 8),
            ordinal: 0,
        }
    }

    #[test]
    fn test_ref_record_accessors() {
        let buffer = b"@r1\nACGTACGT\n+\n!!!!IIII\n";
        let spans = spans_for(buffer);
        let record = RefRecord::new(7, buffer, &spans);
        assert_eq!(record.index(), 7);
        assert_eq!(record.id(), b"r1");
        assert!(record.comment().is_empty());
        assert_eq!(record.seq(), b"ACGTACGT");
        assert_eq!(record.qual(), b"!!!!IIII");
        assert_eq!(record.mean_quality(33), Some(20.0));
    }

    #[test]
    fn test_record_mut_trims_both_fields() {
        let buffer = b"@r1\nACGTACGT\n+\n!!!!IIII\n";
        let mut spans = spans_for(buffer);
        {
            let mut record = RecordMut::new(buffer, &mut spans);
            record.trim_front(4);
            assert_eq!(record.seq(), b"ACGT");
            assert_eq!(record.qual(), b"IIII");
            record.truncate(2);
            assert_eq!(record.seq(), b"AC");
            assert_eq!(record.qual(), b"II");
            record.trim(5, 10);
            assert!(record.is_empty());
        }
        assert_eq!(spans.seq.len, spans.qual.len);
    }

    #[test]
    fn test_owned_record_statistics() {
        let record = OwnedRecord::new("r", "", "ANNn", "!!!!");
        assert_eq!(record.n_count(), 3);
        assert_eq!(record.mean_quality(33), Some(0.0));
        assert_eq!(OwnedRecord::default().mean_quality(33), None);
    }
}
