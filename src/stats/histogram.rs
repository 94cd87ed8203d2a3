//! Fixed-size logarithmic latency histogram
//!
//! Values are recorded in microseconds. Below 32µs every value has its own
//! bucket; above that each power of two is split into 32 sub-buckets, which
//! bounds the relative error of a reported percentile to about 3%. Exact
//! min, max and sum are tracked alongside.

use std::time::Duration;

const SUB_BUCKET_BITS: u32 = 5;
const SUB_BUCKETS: usize = 1 << SUB_BUCKET_BITS;
const MAX_EXPONENT: u32 = 40;

/// Number of buckets, fixed for every histogram
pub const BUCKET_COUNT: usize = SUB_BUCKETS + (MAX_EXPONENT - SUB_BUCKET_BITS) as usize * SUB_BUCKETS;

/// Largest value tracked precisely (about 12.7 days); larger values saturate
pub const MAX_TRACKABLE_MICROS: u64 = (1 << MAX_EXPONENT) - 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatencyHistogram {
    buckets: Box<[u64]>,
    count: u64,
    sum_micros: u128,
    min_micros: u64,
    max_micros: u64,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            buckets: vec![0; BUCKET_COUNT].into_boxed_slice(),
            count: 0,
            sum_micros: 0,
            min_micros: u64::MAX,
            max_micros: 0,
        }
    }

    fn bucket_index(micros: u64) -> usize {
        let value = micros.min(MAX_TRACKABLE_MICROS);
        if value < SUB_BUCKETS as u64 {
            return value as usize;
        }
        let msb = 63 - value.leading_zeros();
        let shift = msb - SUB_BUCKET_BITS;
        let sub = ((value >> shift) as usize) & (SUB_BUCKETS - 1);
        SUB_BUCKETS + shift as usize * SUB_BUCKETS + sub
    }

    /// Midpoint of the value range covered by bucket `index`
    fn bucket_value(index: usize) -> u64 {
        if index < SUB_BUCKETS {
            return index as u64;
        }
        let k = index - SUB_BUCKETS;
        let shift = (k / SUB_BUCKETS) as u32;
        let sub = (k % SUB_BUCKETS) as u64;
        let msb = shift + SUB_BUCKET_BITS;
        let low = (1u64 << msb) | (sub << shift);
        let width = 1u64 << shift;
        low + width / 2
    }

    pub fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.buckets[Self::bucket_index(micros)] += 1;
        self.count += 1;
        self.sum_micros += u128::from(micros);
        self.min_micros = self.min_micros.min(micros);
        self.max_micros = self.max_micros.max(micros);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn min(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| Duration::from_micros(self.min_micros))
    }

    pub fn max(&self) -> Option<Duration> {
        (!self.is_empty()).then(|| Duration::from_micros(self.max_micros))
    }

    pub fn mean(&self) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        let mean = self.sum_micros / u128::from(self.count);
        Some(Duration::from_micros(u64::try_from(mean).unwrap_or(u64::MAX)))
    }

    /// Value at percentile `p` (0-100), clamped to the observed range
    pub fn percentile(&self, p: f64) -> Option<Duration> {
        if self.is_empty() {
            return None;
        }
        let p = p.clamp(0.0, 100.0);
        let rank = ((p / 100.0) * self.count as f64).ceil().max(1.0) as u64;

        let mut seen = 0u64;
        for (index, &n) in self.buckets.iter().enumerate() {
            seen += n;
            if seen >= rank {
                let value = Self::bucket_value(index).clamp(self.min_micros, self.max_micros);
                return Some(Duration::from_micros(value));
            }
        }
        self.max()
    }

    /// Fold another histogram into this one
    pub fn merge(&mut self, other: &LatencyHistogram) {
        for (mine, theirs) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            *mine += theirs;
        }
        self.count += other.count;
        self.sum_micros += other.sum_micros;
        self.min_micros = self.min_micros.min(other.min_micros);
        self.max_micros = self.max_micros.max(other.max_micros);
    }
}
