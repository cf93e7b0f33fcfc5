use crate::record::{FastqRecord, OwnedRecord, RecordMut, RecordSpans, RefRecord, Span};

/// A container for a group of FASTQ records backed by one byte buffer
///
/// The `RecordBatch` owns a single contiguous buffer holding the raw FASTQ text
/// and an ordered list of [`RecordSpans`] indexing into it. Record views handed
/// out by [`RecordBatch::iter`] and [`RecordBatch::get`] borrow the batch, so they
/// cannot outlive a `clear` or a refill.
///
/// Batches are meant to be reused: a reader clears and refills the same batch many
/// times, and the buffer keeps its allocation across cycles.
///
/// # Examples
///
/// ```rust
/// use fqtools::{FastqRecord, RecordBatch};
///
/// let mut batch = RecordBatch::default();
/// batch.push(b"r1", b"", b"ACGT", b"IIII");
/// for record in batch.iter() {
///     assert_eq!(record.seq(), b"ACGT");
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    /// Raw FASTQ bytes
    buffer: Vec<u8>,

    /// Record positions, in file order
    records: Vec<RecordSpans>,

    /// Global index of the first record in the batch
    index: usize,
}
impl RecordBatch {
    /// Creates an empty batch with pre-reserved space
    ///
    /// # Parameters
    ///
    /// * `capacity_bytes` - Bytes to reserve for the raw buffer
    /// * `capacity_records` - Number of record slots to reserve
    #[must_use]
    pub fn with_capacity(capacity_bytes: usize, capacity_records: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity_bytes),
            records: Vec::with_capacity(capacity_records),
            index: 0,
        }
    }

    /// Returns the number of records in this batch, including emptied ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of records that still hold at least one base
    #[must_use]
    pub fn live_len(&self) -> usize {
        self.records.iter().filter(|r| !r.seq.is_empty()).count()
    }

    /// Global index of the first record in the batch
    #[must_use]
    pub fn first_index(&self) -> usize {
        self.index
    }

    /// Raw bytes backing the batch
    #[must_use]
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Reserved buffer size in bytes
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    /// Returns a view of the record at `idx`
    #[must_use]
    pub fn get(&self, idx: usize) -> Option<RefRecord<'_>> {
        self.records
            .get(idx)
            .map(|spans| RefRecord::new(self.index + spans.ordinal, &self.buffer, spans))
    }

    /// Returns an iterator over the records in this batch
    #[must_use]
    pub fn iter(&self) -> RecordBatchIter<'_> {
        RecordBatchIter::new(self)
    }

    /// Clears all records and bytes, keeping the allocations
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.records.clear();
        self.index = 0;
    }

    /// Appends an owned copy of a record to the batch
    ///
    /// The record is serialized into the buffer exactly as a reader would have
    /// found it, so batches built by hand behave like parsed ones.
    pub fn push(&mut self, id: &[u8], comment: &[u8], seq: &[u8], qual: &[u8]) {
        debug_assert_eq!(seq.len(), qual.len());
        let buf = &mut self.buffer;

        buf.push(b'@');
        let id_span = Span::new(buf.len(), id.len());
        buf.extend_from_slice(id);
        let comment_span = if comment.is_empty() {
            Span::new(buf.len(), 0)
        } else {
            buf.push(b' ');
            let span = Span::new(buf.len(), comment.len());
            buf.extend_from_slice(comment);
            span
        };
        buf.push(b'\n');

        let seq_span = Span::new(buf.len(), seq.len());
        buf.extend_from_slice(seq);
        buf.extend_from_slice(b"\n+");
        let plus_span = Span::new(buf.len(), 0);
        buf.push(b'\n');

        let qual_span = Span::new(buf.len(), qual.len());
        buf.extend_from_slice(qual);
        buf.push(b'\n');

        let ordinal = self.records.len();
        self.records.push(RecordSpans {
            id: id_span,
            comment: comment_span,
            seq: seq_span,
            plus: plus_span,
            qual: qual_span,
            ordinal,
        });
    }

    /// Appends any record implementing [`FastqRecord`]
    pub fn push_record<R: FastqRecord>(&mut self, record: &R) {
        self.push(record.id(), record.comment(), record.seq(), record.qual());
    }

    /// Builds a batch from owned records
    #[must_use]
    pub fn from_records(records: &[OwnedRecord]) -> Self {
        let mut batch = Self::default();
        records.iter().for_each(|r| batch.push_record(r));
        batch
    }

    /// Applies `f` to every record and keeps only those for which it returns `true`
    ///
    /// `f` receives the record's stream index. Records that come out of `f` empty
    /// are dropped as well. Survivors keep their relative order and stream index.
    pub fn retain_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(usize, &mut RecordMut<'_>) -> bool,
    {
        let buffer = self.buffer.as_slice();
        let first = self.index;
        self.records.retain_mut(|spans| {
            let index = first + spans.ordinal;
            let mut record = RecordMut::new(buffer, spans);
            f(index, &mut record) && !record.is_empty()
        });
    }

    /// Split access to the buffer and the record index for the parser
    pub(crate) fn parts_mut(&mut self) -> (&mut Vec<u8>, &mut Vec<RecordSpans>) {
        (&mut self.buffer, &mut self.records)
    }

    pub(crate) fn set_first_index(&mut self, index: usize) {
        self.index = index;
    }

    pub(crate) fn reserve_records(&mut self, additional: usize) {
        self.records.reserve(additional);
    }
}

/// Iterator over the records of a [`RecordBatch`]
pub struct RecordBatchIter<'a> {
    batch: &'a RecordBatch,
    /// Record position in the batch
    rpos: usize,
}
impl<'a> RecordBatchIter<'a> {
    #[must_use]
    pub fn new(batch: &'a RecordBatch) -> Self {
        Self { batch, rpos: 0 }
    }
}
impl<'a> Iterator for RecordBatchIter<'a> {
    type Item = RefRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let spans = self.batch.records.get(self.rpos)?;
        let record = RefRecord::new(self.batch.index + spans.ordinal, &self.batch.buffer, spans);
        self.rpos += 1;
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.batch.records.len() - self.rpos;
        (remaining, Some(remaining))
    }
}
impl ExactSizeIterator for RecordBatchIter<'_> {}

impl<'a> IntoIterator for &'a RecordBatch {
    type Item = RefRecord<'a>;
    type IntoIter = RecordBatchIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_iterate() {
        let mut batch = RecordBatch::with_capacity(1024, 4);
        batch.push(b"r1", b"lane=1", b"ACGT", b"IIII");
        batch.push(b"r2", b"", b"GG", b"##");

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.buffer(), b"@r1 lane=1\nACGT\n+\nIIII\n@r2\nGG\n+\n##\n");

        let records: Vec<_> = batch.iter().collect();
        assert_eq!(records[0].id(), b"r1");
        assert_eq!(records[0].comment(), b"lane=1");
        assert_eq!(records[1].seq(), b"GG");
        assert_eq!(records[1].index(), 1);
        assert!(batch.get(2).is_none());
    }

    #[test]
    fn test_clear_keeps_allocation() {
        let mut batch = RecordBatch::with_capacity(1024, 4);
        batch.push(b"r1", b"", b"ACGT", b"IIII");
        let capacity = batch.capacity();
        batch.clear();
        assert!(batch.is_empty());
        assert!(batch.buffer().is_empty());
        assert_eq!(batch.capacity(), capacity);
    }

    #[test]
    fn test_retain_mut_drops_emptied_records() {
        let mut batch = RecordBatch::from_records(&[
            OwnedRecord::new("a", "", "ACGT", "IIII"),
            OwnedRecord::new("b", "", "CCCC", "IIII"),
            OwnedRecord::new("c", "", "TTTT", "IIII"),
        ]);
        batch.retain_mut(|idx, record| {
            match idx {
                0 => record.truncate(2),
                1 => record.clear(),
                _ => {}
            }
            true
        });
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.get(0).map(|r| r.seq().to_vec()), Some(b"AC".to_vec()));
        assert_eq!(batch.get(1).map(|r| r.id().to_vec()), Some(b"c".to_vec()));
    }

    #[test]
    fn test_retain_mut_keeps_stream_index() {
        let mut batch = RecordBatch::from_records(&[
            OwnedRecord::new("a", "", "A", "I"),
            OwnedRecord::new("b", "", "CC", "II"),
            OwnedRecord::new("c", "", "G", "I"),
            OwnedRecord::new("d", "", "TT", "II"),
        ]);
        batch.set_first_index(100);
        let mut seen = Vec::new();
        batch.retain_mut(|idx, record| {
            seen.push(idx);
            record.len() >= 2
        });
        assert_eq!(seen, [100, 101, 102, 103]);

        let kept: Vec<_> = batch.iter().map(|r| (r.id().to_vec(), r.index())).collect();
        assert_eq!(kept, [(b"b".to_vec(), 101), (b"d".to_vec(), 103)]);
        assert_eq!(batch.get(1).map(|r| r.index()), Some(103));
    }
}
