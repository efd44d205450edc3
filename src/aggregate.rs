use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use polars::prelude::{Column, DataFrame, NamedFrom, Series as PolarsSeries};

use crate::error::VitalsError;
use crate::loader::VitalReading;
use crate::schema::{group_by, summary};

/// Normalized-time granularity used to bucket readings (1% of surgery progress).
pub const BIN_WIDTH: f64 = 0.01;

// ── Group keys ──────────────────────────────────────────────────────────────

/// Value of the active grouping attribute for one reading.
///
/// An absent or blank cell is kept as its own group rather than merged into
/// a present value. Numeric codes compare by value, so `"1"`, `"1.0"` and
/// `"01"` land in the same group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(Option<String>);

impl GroupKey {
    pub fn new(raw: Option<&str>) -> Self {
        Self(
            raw.map(str::trim)
                .filter(|s| !s.is_empty())
                .map(canonical_code),
        )
    }

    pub fn missing() -> Self {
        Self(None)
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn is_missing(&self) -> bool {
        self.0.is_none()
    }

    /// Text used in legends and tooltips.
    pub fn label(&self) -> &str {
        self.0.as_deref().unwrap_or("(missing)")
    }
}

fn canonical_code(cell: &str) -> String {
    match cell.parse::<f64>() {
        // -0 and 0 are one code
        Ok(v) if v == 0.0 => "0".to_string(),
        Ok(v) if v.is_finite() => v.to_string(),
        _ => cell.to_string(),
    }
}

impl From<&str> for GroupKey {
    fn from(raw: &str) -> Self {
        Self::new(Some(raw))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Grouping dimension a chart is split by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupBy {
    SurgeryType,
    EmergencyStatus,
}

impl GroupBy {
    pub const ALL: [GroupBy; 2] = [GroupBy::SurgeryType, GroupBy::EmergencyStatus];

    pub fn column(self) -> &'static str {
        match self {
            GroupBy::SurgeryType => group_by::OPTYPE,
            GroupBy::EmergencyStatus => group_by::EMOP,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GroupBy::SurgeryType => "Surgery Type",
            GroupBy::EmergencyStatus => "Emergency Status",
        }
    }

    pub fn key_of(self, reading: &VitalReading) -> &GroupKey {
        match self {
            GroupBy::SurgeryType => &reading.optype,
            GroupBy::EmergencyStatus => &reading.emop,
        }
    }
}

impl FromStr for GroupBy {
    type Err = VitalsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            group_by::OPTYPE => Ok(GroupBy::SurgeryType),
            group_by::EMOP => Ok(GroupBy::EmergencyStatus),
            other => Err(VitalsError::InvalidData(format!(
                "Invalid group_by: '{}'. Must be '{}' or '{}'",
                other,
                group_by::OPTYPE,
                group_by::EMOP
            ))),
        }
    }
}

// ── Aggregated output ───────────────────────────────────────────────────────

/// Mean and spread of all readings of one group that fall into one bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub norm_time: f64,
    pub mean: f64,
    /// Sample standard deviation; `None` for single-reading bins.
    pub sd: Option<f64>,
    pub count: usize,
    /// First contributing value in input order.
    pub first_value: f64,
}

impl Bucket {
    /// Standard deviation as used for axis ranges.
    pub fn sd_or_zero(&self) -> f64 {
        self.sd.unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: GroupKey,
    pub buckets: Vec<Bucket>,
}

impl Series {
    pub fn reading_count(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }
}

/// Running sum plus Welford moments for one (group, bin) cell.
#[derive(Debug, Clone, Copy)]
struct CellStats {
    count: usize,
    sum: f64,
    running_mean: f64,
    m2: f64,
    first: f64,
}

impl CellStats {
    fn new(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            running_mean: value,
            m2: 0.0,
            first: value,
        }
    }

    fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        let delta = value - self.running_mean;
        self.running_mean += delta / self.count as f64;
        self.m2 += delta * (value - self.running_mean);
    }

    fn into_bucket(self, bin: i64) -> Bucket {
        let sd = (self.count > 1).then(|| (self.m2 / (self.count - 1) as f64).sqrt());
        Bucket {
            norm_time: bin as f64 * BIN_WIDTH,
            mean: self.sum / self.count as f64,
            sd,
            count: self.count,
            first_value: self.first,
        }
    }
}

/// Bin index with half-up rounding, so 0.5 steps land in the upper bin for
/// negative inputs too.
fn bin_index(norm_time: f64) -> i64 {
    (norm_time / BIN_WIDTH + 0.5).floor() as i64
}

/// Group the readings of one vital sign and reduce each normalized-time bin
/// to mean and standard deviation.
///
/// Series come out in first-seen order of their group key; buckets within a
/// series are ascending by bin time. An unknown signal yields no series.
pub fn aggregate<'a, I>(readings: I, signal: &str, group_by: GroupBy) -> Vec<Series>
where
    I: IntoIterator<Item = &'a VitalReading>,
{
    let mut order: Vec<GroupKey> = Vec::new();
    let mut cells: HashMap<GroupKey, BTreeMap<i64, CellStats>> = HashMap::new();

    for reading in readings.into_iter().filter(|r| r.signal == signal) {
        let key = group_by.key_of(reading);
        if !cells.contains_key(key) {
            order.push(key.clone());
        }
        cells
            .entry(key.clone())
            .or_default()
            .entry(bin_index(reading.norm_time))
            .and_modify(|cell| cell.push(reading.value))
            .or_insert_with(|| CellStats::new(reading.value));
    }

    order
        .into_iter()
        .filter_map(|key| {
            let bins = cells.remove(&key)?;
            Some(Series {
                key,
                buckets: bins
                    .into_iter()
                    .map(|(bin, cell)| cell.into_bucket(bin))
                    .collect(),
            })
        })
        .collect()
}

/// Vertical extent `[min(mean - sd), max(mean + sd)]` over every bucket, with
/// single-reading buckets contributing no spread.
pub fn value_range<'a, I>(series: I) -> Option<(f64, f64)>
where
    I: IntoIterator<Item = &'a Series>,
{
    series
        .into_iter()
        .flat_map(|s| s.buckets.iter())
        .fold(None, |acc, b| {
            let lo = b.mean - b.sd_or_zero();
            let hi = b.mean + b.sd_or_zero();
            Some(match acc {
                None => (lo, hi),
                Some((min, max)) => (f64::min(min, lo), f64::max(max, hi)),
            })
        })
}

/// Flatten aggregated series into one row per bucket.
pub fn summary_frame(series: &[Series]) -> Result<DataFrame, VitalsError> {
    let rows: usize = series.iter().map(|s| s.buckets.len()).sum();
    let mut keys: Vec<Option<String>> = Vec::with_capacity(rows);
    let mut times: Vec<f64> = Vec::with_capacity(rows);
    let mut means: Vec<f64> = Vec::with_capacity(rows);
    let mut sds: Vec<Option<f64>> = Vec::with_capacity(rows);
    let mut counts: Vec<i64> = Vec::with_capacity(rows);

    for s in series {
        for b in &s.buckets {
            keys.push(s.key.as_str().map(str::to_string));
            times.push(b.norm_time);
            means.push(b.mean);
            sds.push(b.sd);
            counts.push(b.count as i64);
        }
    }

    let columns: Vec<Column> = vec![
        PolarsSeries::new(summary::GROUP_KEY.into(), keys).into(),
        PolarsSeries::new(summary::NORM_TIME.into(), times).into(),
        PolarsSeries::new(summary::MEAN.into(), means).into(),
        PolarsSeries::new(summary::SD.into(), sds).into(),
        PolarsSeries::new(summary::COUNT.into(), counts).into(),
    ];
    Ok(DataFrame::new(columns)?)
}
