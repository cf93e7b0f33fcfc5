use std::ops::AddAssign;

/// Number of quality bins; Phred scores are clamped into `[0, MAX_QUAL)`
pub const MAX_QUAL: usize = 42;

/// Number of base bins: `A`, `C`, `G`, `T`, and everything else
pub const BASE_BINS: usize = 5;

/// Bin index of the catch-all base symbol
pub const OTHER_BASE: usize = 4;

/// Quality histogram of one read position
pub type QualityRow = [u64; MAX_QUAL];

/// Base histogram of one read position
pub type BaseRow = [u64; BASE_BINS];

/// Maps a nucleotide to its base bin (case-insensitive, anything unknown is [`OTHER_BASE`])
#[inline]
#[must_use]
pub fn base_bin(base: u8) -> usize {
    match base {
        b'A' | b'a' => 0,
        b'C' | b'c' => 1,
        b'G' | b'g' => 2,
        b'T' | b't' => 3,
        _ => OTHER_BASE,
    }
}

/// Per-position quality and base distributions of a set of reads
///
/// Results computed on separate batches are combined with `+=`. For positions
/// covered by both operands the tables are summed; positions only the longer
/// operand reaches are copied from it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FqStatisticResult {
    /// Reads seen
    pub read_count: u64,
    /// Bases seen
    pub total_bases: u64,
    /// Longest read seen
    pub max_read_length: usize,
    /// `[position][quality]` counts
    pos_quality: Vec<QualityRow>,
    /// `[position][base bin]` counts
    pos_base: Vec<BaseRow>,
}
impl FqStatisticResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts for one read
    ///
    /// Quality values are decoded with `offset` and clamped into `[0, MAX_QUAL)`.
    pub fn add_read(&mut self, seq: &[u8], qual: &[u8], offset: u8) {
        self.read_count += 1;
        self.total_bases += seq.len() as u64;
        if seq.len() > self.max_read_length {
            self.max_read_length = seq.len();
            self.ensure_rows(seq.len());
        }
        for (pos, (&base, &q)) in seq.iter().zip(qual).enumerate() {
            let q = usize::from(q.saturating_sub(offset)).min(MAX_QUAL - 1);
            self.pos_quality[pos][q] += 1;
            self.pos_base[pos][base_bin(base)] += 1;
        }
    }

    fn ensure_rows(&mut self, len: usize) {
        if self.pos_quality.len() < len {
            self.pos_quality.resize(len, [0; MAX_QUAL]);
            self.pos_base.resize(len, [0; BASE_BINS]);
        }
    }

    /// Number of position rows held (never less than `max_read_length`)
    #[must_use]
    pub fn positions(&self) -> usize {
        self.pos_quality.len()
    }

    /// Quality histogram at a 0-based position
    #[must_use]
    pub fn quality_row(&self, pos: usize) -> Option<&QualityRow> {
        self.pos_quality.get(pos)
    }

    /// Base histogram at a 0-based position
    #[must_use]
    pub fn base_row(&self, pos: usize) -> Option<&BaseRow> {
        self.pos_base.get(pos)
    }

    /// Bases with quality at least `threshold` across all positions
    #[must_use]
    pub fn bases_at_or_above(&self, threshold: usize) -> u64 {
        self.pos_quality
            .iter()
            .flat_map(|row| row.iter().skip(threshold))
            .sum()
    }

    /// Total count per base bin across all positions
    #[must_use]
    pub fn base_totals(&self) -> BaseRow {
        let mut totals = [0; BASE_BINS];
        for row in &self.pos_base {
            for (total, count) in totals.iter_mut().zip(row) {
                *total += count;
            }
        }
        totals
    }
}

impl AddAssign<&FqStatisticResult> for FqStatisticResult {
    fn add_assign(&mut self, other: &FqStatisticResult) {
        self.read_count += other.read_count;
        self.total_bases += other.total_bases;
        self.max_read_length = self.max_read_length.max(other.max_read_length);

        // Sum the overlapping prefix
        let shared = self.pos_quality.len().min(other.pos_quality.len());
        for (mine, theirs) in self.pos_quality.iter_mut().zip(&other.pos_quality) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a += b;
            }
        }
        for (mine, theirs) in self.pos_base.iter_mut().zip(&other.pos_base) {
            for (a, b) in mine.iter_mut().zip(theirs) {
                *a += b;
            }
        }

        // Copy the rows only the other operand reaches
        self.pos_quality
            .extend_from_slice(&other.pos_quality[shared..]);
        self.pos_base.extend_from_slice(&other.pos_base[shared..]);
    }
}

impl AddAssign for FqStatisticResult {
    fn add_assign(&mut self, other: FqStatisticResult) {
        *self += &other;
    }
}
