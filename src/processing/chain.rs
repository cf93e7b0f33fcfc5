use std::sync::Arc;

use super::{ProcessingStatistics, ReadMutator, ReadPredicate};
use crate::parallel::ParallelProcessor;
use crate::{FastqRecord, RecordBatch, Result};

/// Ordered predicates followed by ordered mutators
///
/// A record survives only if every predicate accepts it. Predicates run in
/// registration order and stop at the first rejection. Mutators then run in
/// registration order on the survivors; a record they trim to nothing is dropped.
///
/// Cloning a chain is cheap: the predicates and mutators are shared, which is how
/// every worker thread gets its own handle.
///
/// # Examples
///
/// ```rust
/// use fqtools::processing::{FilterChain, MinLengthPredicate};
/// use fqtools::{OwnedRecord, RecordBatch};
///
/// let chain = FilterChain::new().with_predicate(MinLengthPredicate::new(4));
/// let mut batch = RecordBatch::from_records(&[
///     OwnedRecord::new("r1", "", "ACGT", "IIII"),
///     OwnedRecord::new("r2", "", "AC", "II"),
/// ]);
/// let stats = chain.apply(&mut batch);
/// assert_eq!(stats.passed_reads, 1);
/// assert_eq!(batch.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct FilterChain {
    predicates: Vec<Arc<dyn ReadPredicate>>,
    mutators: Vec<Arc<dyn ReadMutator>>,
}
impl FilterChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a predicate
    #[must_use]
    pub fn with_predicate<P: ReadPredicate + 'static>(mut self, predicate: P) -> Self {
        self.add_predicate(Arc::new(predicate));
        self
    }

    /// Appends a mutator
    #[must_use]
    pub fn with_mutator<M: ReadMutator + 'static>(mut self, mutator: M) -> Self {
        self.add_mutator(Arc::new(mutator));
        self
    }

    pub fn add_predicate(&mut self, predicate: Arc<dyn ReadPredicate>) {
        self.predicates.push(predicate);
    }

    pub fn add_mutator(&mut self, mutator: Arc<dyn ReadMutator>) {
        self.mutators.push(mutator);
    }

    #[must_use]
    pub fn predicates(&self) -> &[Arc<dyn ReadPredicate>] {
        &self.predicates
    }

    #[must_use]
    pub fn mutators(&self) -> &[Arc<dyn ReadMutator>] {
        &self.mutators
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.mutators.is_empty()
    }

    /// Returns `true` if every predicate accepts the record
    pub fn evaluate(&self, record: &dyn FastqRecord) -> bool {
        self.predicates.iter().all(|p| p.evaluate(record))
    }

    /// Filters and trims a batch in place, returning the batch's counters
    ///
    /// Surviving records keep their relative order.
    pub fn apply(&self, batch: &mut RecordBatch) -> ProcessingStatistics {
        let mut stats = ProcessingStatistics {
            input_bytes: batch.buffer().len() as u64,
            ..ProcessingStatistics::default()
        };
        batch.retain_mut(|_, record| {
            stats.total_reads += 1;
            if !self.evaluate(&*record) {
                stats.filtered_reads += 1;
                return false;
            }

            let mut modified = false;
            for mutator in &self.mutators {
                modified |= mutator.mutate(record);
            }
            if record.is_empty() {
                stats.filtered_reads += 1;
                return false;
            }

            stats.passed_reads += 1;
            if modified {
                stats.modified_reads += 1;
            }
            true
        });
        stats
    }

    /// Logs per-predicate and per-mutator counters
    pub fn log_counters(&self) {
        for predicate in &self.predicates {
            let counters = predicate.counters();
            log::debug!(
                "{}: passed {}/{} ({})",
                predicate.name(),
                counters.passed(),
                counters.evaluated(),
                predicate.description()
            );
        }
        for mutator in &self.mutators {
            let counters = mutator.counters();
            log::debug!(
                "{}: trimmed {}/{} records, {} bases removed ({})",
                mutator.name(),
                counters.records_trimmed(),
                counters.records_processed(),
                counters.bases_removed(),
                mutator.description()
            );
        }
    }
}

impl ParallelProcessor for FilterChain {
    type Output = ProcessingStatistics;

    fn process_batch(&mut self, batch: &mut RecordBatch) -> Result<Self::Output> {
        Ok(self.apply(batch))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{
        LengthTrimPolicy, LengthTrimmer, MaxNRatioPredicate, MinLengthPredicate,
        MinQualityPredicate, QualityTrimmer, TrimMode,
    };
    use crate::OwnedRecord;
    use rand::rngs::SmallRng;
    use rand::seq::SliceRandom;
    use rand::{Rng, SeedableRng};

    fn random_batch(rng: &mut SmallRng, n: usize) -> RecordBatch {
        let records: Vec<_> = (0..n)
            .map(|i| {
                let len = rng.random_range(1..40);
                let seq: Vec<u8> = (0..len).map(|_| b"ACGTN"[rng.random_range(0..5)]).collect();
                let qual: Vec<u8> = (0..len).map(|_| rng.random_range(33..74)).collect();
                OwnedRecord::new(format!("r{i}"), "", seq, qual)
            })
            .collect();
        RecordBatch::from_records(&records)
    }

    fn surviving_ids(batch: &RecordBatch) -> Vec<Vec<u8>> {
        batch.iter().map(|r| r.id().to_vec()).collect()
    }

    #[test]
    fn test_predicate_order_does_not_change_outcome() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(7);
        let template = random_batch(&mut rng, 500);

        let mut predicates: Vec<Arc<dyn ReadPredicate>> = vec![
            Arc::new(MinQualityPredicate::new(20.0, 33)?),
            Arc::new(MinLengthPredicate::new(10)),
            Arc::new(MaxNRatioPredicate::new(0.2)?),
        ];

        let mut expected = None;
        for _ in 0..6 {
            predicates.shuffle(&mut rng);
            let mut chain = FilterChain::new();
            for p in &predicates {
                chain.add_predicate(Arc::clone(p));
            }
            let mut batch = template.clone();
            let stats = chain.apply(&mut batch);
            assert_eq!(stats.total_reads, 500);
            assert_eq!(stats.passed_reads + stats.filtered_reads, 500);

            let ids = surviving_ids(&batch);
            match &expected {
                None => expected = Some(ids),
                Some(prev) => assert_eq!(prev, &ids),
            }
        }
        Ok(())
    }

    #[test]
    fn test_pass_iff_all_predicates_pass() -> Result<()> {
        let mut rng = SmallRng::seed_from_u64(3);
        let template = random_batch(&mut rng, 300);
        let quality = MinQualityPredicate::new(25.0, 33)?;
        let length = MinLengthPredicate::new(15);

        let expected: Vec<_> = template
            .iter()
            .filter(|r| quality.evaluate(r) && length.evaluate(r))
            .map(|r| r.id().to_vec())
            .collect();

        let chain = FilterChain::new()
            .with_predicate(MinQualityPredicate::new(25.0, 33)?)
            .with_predicate(MinLengthPredicate::new(15));
        let mut batch = template.clone();
        chain.apply(&mut batch);
        assert_eq!(surviving_ids(&batch), expected);
        Ok(())
    }

    #[test]
    fn test_short_circuit() -> Result<()> {
        let first = Arc::new(MinLengthPredicate::new(100));
        let second = Arc::new(MinQualityPredicate::new(0.0, 33)?);
        let mut chain = FilterChain::new();
        chain.add_predicate(first.clone());
        chain.add_predicate(second.clone());

        let mut batch = RecordBatch::from_records(&[OwnedRecord::new("r", "", "ACGT", "IIII")]);
        chain.apply(&mut batch);
        assert!(batch.is_empty());
        assert_eq!(first.counters().evaluated(), 1);
        assert_eq!(second.counters().evaluated(), 0);
        Ok(())
    }

    #[test]
    fn test_mutators_only_see_survivors() -> Result<()> {
        let trimmer = Arc::new(LengthTrimmer::new(3, LengthTrimPolicy::KeepFromStart)?);
        let mut chain = FilterChain::new().with_predicate(MinLengthPredicate::new(5));
        chain.add_mutator(trimmer.clone());

        let mut batch = RecordBatch::from_records(&[
            OwnedRecord::new("short", "", "ACGT", "IIII"),
            OwnedRecord::new("long", "", "ACGTAC", "IIIIII"),
        ]);
        let stats = chain.apply(&mut batch);
        assert_eq!(trimmer.counters().records_processed(), 1);
        assert_eq!(stats.passed_reads, 1);
        assert_eq!(stats.modified_reads, 1);
        assert_eq!(stats.filtered_reads, 1);
        assert_eq!(batch.get(0).map(|r| r.seq().to_vec()), Some(b"ACG".to_vec()));
        Ok(())
    }

    #[test]
    fn test_trimmed_to_empty_is_filtered() -> Result<()> {
        let chain = FilterChain::new().with_mutator(QualityTrimmer::new(30.0, TrimMode::Both, 33)?);
        let mut batch = RecordBatch::from_records(&[
            OwnedRecord::new("bad", "", "ACGT", "!!!!"),
            OwnedRecord::new("good", "", "ACGT", "IIII"),
        ]);
        let stats = chain.apply(&mut batch);
        assert_eq!(stats.filtered_reads, 1);
        assert_eq!(stats.passed_reads, 1);
        assert_eq!(stats.modified_reads, 0);
        assert_eq!(surviving_ids(&batch), vec![b"good".to_vec()]);
        Ok(())
    }
}
