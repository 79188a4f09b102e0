use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

use itertools::{Itertools, MinMaxResult};
use serde::Serialize;

use crate::chemistry::constants::{BUCKET_EPSILON, MAX_HISTOGRAM_BUCKETS};
use crate::errors::{Error, Result};
use crate::msms::model::IonMatch;

/// Quantity a histogram is built from.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HistogramValue {
    /// Count of matches by signed mass difference (experimental - theoretic).
    Difference,
    /// Count of matches by theoretic ion mass.
    Mass,
    /// Average signed mass difference, bucketed by theoretic ion mass.
    AverageError,
}

impl HistogramValue {
    pub fn name(&self) -> &'static str {
        match self {
            HistogramValue::Difference => "difference",
            HistogramValue::Mass => "mass",
            HistogramValue::AverageError => "average-error",
        }
    }
}

impl fmt::Display for HistogramValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HistogramValue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        [HistogramValue::Difference, HistogramValue::Mass, HistogramValue::AverageError]
            .into_iter()
            .find(|value| value.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown histogram value '{}'", s))
    }
}

/// Fixed-width histogram over a contiguous range of bucket indices.
///
/// Bucket `i` covers `[i * step, (i + 1) * step)`.
#[derive(Clone, PartialEq, Debug)]
pub struct Histogram<T> {
    step: f64,
    bins: BTreeMap<i64, T>,
}

/// Index of the bucket holding `value`; `step` must be finite and positive.
pub fn bucket_index(value: f64, step: f64) -> i64 {
    (value / step + BUCKET_EPSILON).floor() as i64
}

fn check_step(step: f64) -> Result<()> {
    if !step.is_finite() || step <= 0.0 {
        return Err(Error::HistogramStep { step, reason: "must be a finite positive number" });
    }
    Ok(())
}

impl<T: Clone> Histogram<T> {
    /// Fills every missing index between the lowest and highest key.
    fn densified(step: f64, mut bins: BTreeMap<i64, T>, gap: T) -> Result<Self> {
        if let MinMaxResult::MinMax(&low, &high) = bins.keys().minmax() {
            if high as i128 - low as i128 >= MAX_HISTOGRAM_BUCKETS as i128 {
                return Err(Error::HistogramStep { step, reason: "too small for the range of values" });
            }
            for idx in low..=high {
                bins.entry(idx).or_insert_with(|| gap.clone());
            }
        }
        Ok(Histogram { step, bins })
    }
}

impl<T> Histogram<T> {
    pub fn step(&self) -> f64 {
        self.step
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bucket_key(&self, idx: i64) -> f64 {
        idx as f64 / self.step.recip()
    }

    /// `(bucket key, value)` pairs in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &T)> + '_ {
        self.bins.iter().map(move |(&idx, value)| (self.bucket_key(idx), value))
    }
}

/// Counts values per bucket; gap buckets hold `0`. Non-finite values are ignored.
pub fn count_histogram<I>(values: I, step: f64) -> Result<Histogram<usize>>
where
    I: IntoIterator<Item = f64>,
{
    check_step(step)?;
    let mut bins = BTreeMap::new();
    for value in values.into_iter().filter(|value| value.is_finite()) {
        *bins.entry(bucket_index(value, step)).or_insert(0) += 1;
    }
    Histogram::densified(step, bins, 0)
}

/// Averages `value` per bucket of `key`; gap buckets hold `None`. Pairs with
/// a non-finite member are ignored.
pub fn average_histogram<I>(pairs: I, step: f64) -> Result<Histogram<Option<f64>>>
where
    I: IntoIterator<Item = (f64, f64)>,
{
    check_step(step)?;
    let finite = pairs.into_iter().filter(|(key, value)| key.is_finite() && value.is_finite());
    let sums: BTreeMap<i64, (f64, usize)> = finite.fold(BTreeMap::new(), |mut sums, (key, value)| {
        let entry = sums.entry(bucket_index(key, step)).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
        sums
    });

    let bins = sums
        .into_iter()
        .map(|(idx, (sum, n))| (idx, Some(sum / n as f64)))
        .collect();
    Histogram::densified(step, bins, None)
}

#[derive(Serialize)]
struct HistogramRow<T> {
    bucket: f64,
    value: T,
}

impl<T: Serialize> Histogram<T> {
    /// Writes the histogram as tab-separated `bucket`/`value` rows.
    pub fn write_tsv<W: Write>(&self, out: W) -> Result<()> {
        let mut writer = csv::WriterBuilder::new().delimiter(b'\t').from_writer(out);
        for (bucket, value) in self.iter() {
            writer.serialize(HistogramRow { bucket, value })?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Match statistics of the requested kind, as a histogram of plain numbers.
pub enum MatchHistogram {
    Count(Histogram<usize>),
    Average(Histogram<Option<f64>>),
}

impl MatchHistogram {
    pub fn from_matches<'m, I>(matches: I, value: HistogramValue, step: f64) -> Result<Self>
    where
        I: IntoIterator<Item = &'m IonMatch>,
    {
        let matches = matches.into_iter();
        let histogram = match value {
            HistogramValue::Difference => {
                MatchHistogram::Count(count_histogram(matches.map(IonMatch::mass_difference), step)?)
            }
            HistogramValue::Mass => MatchHistogram::Count(count_histogram(matches.map(|m| m.ion.mass), step)?),
            HistogramValue::AverageError => MatchHistogram::Average(average_histogram(
                matches.map(|m| (m.ion.mass, m.mass_difference())),
                step,
            )?),
        };
        Ok(histogram)
    }

    pub fn len(&self) -> usize {
        match self {
            MatchHistogram::Count(histogram) => histogram.len(),
            MatchHistogram::Average(histogram) => histogram.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn write_tsv<W: Write>(&self, out: W) -> Result<()> {
        match self {
            MatchHistogram::Count(histogram) => histogram.write_tsv(out),
            MatchHistogram::Average(histogram) => histogram.write_tsv(out),
        }
    }
}
