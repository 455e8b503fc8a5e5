//! Time bucketing of transaction rows into regular, optionally grouped series.

use crate::error::{Result, SalescastError};
use crate::frequency::{AxisKind, DateLabel, Frequency, TimeAxis};
use crate::imputation::{apply_fill, FillValue};
use crate::table::Table;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// An ordered list of column names. Built from a bare name or a list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnList(Vec<String>);

impl ColumnList {
    pub fn names(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ColumnList {
    fn from(name: &str) -> Self {
        ColumnList(vec![name.to_string()])
    }
}

impl From<String> for ColumnList {
    fn from(name: String) -> Self {
        ColumnList(vec![name])
    }
}

impl From<Vec<String>> for ColumnList {
    fn from(names: Vec<String>) -> Self {
        ColumnList(names)
    }
}

impl From<Vec<&str>> for ColumnList {
    fn from(names: Vec<&str>) -> Self {
        ColumnList(names.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for ColumnList {
    fn from(names: &[&str]) -> Self {
        ColumnList(names.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ColumnList {
    fn from(names: [&str; N]) -> Self {
        ColumnList(names.iter().map(|s| s.to_string()).collect())
    }
}

impl From<Option<&str>> for ColumnList {
    fn from(name: Option<&str>) -> Self {
        name.map(ColumnList::from).unwrap_or_default()
    }
}

/// Aggregation applied to every value column within a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Aggregation {
    #[default]
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    First,
    Last,
    /// Sample standard deviation.
    Std,
}

impl FromStr for Aggregation {
    type Err = SalescastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "mean" | "avg" | "average" => Ok(Aggregation::Mean),
            "median" => Ok(Aggregation::Median),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "count" | "size" => Ok(Aggregation::Count),
            "first" => Ok(Aggregation::First),
            "last" => Ok(Aggregation::Last),
            "std" | "stddev" => Ok(Aggregation::Std),
            _ => Err(SalescastError::invalid_param(
                "aggregation",
                s,
                "unknown aggregation function",
            )),
        }
    }
}

impl Aggregation {
    /// Reduce one bucket. An empty bucket has no value.
    pub fn apply(&self, values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        match self {
            Aggregation::Sum => Some(values.iter().sum()),
            Aggregation::Mean => Some(values.iter().sum::<f64>() / n),
            Aggregation::Median => {
                let mut sorted = values.to_vec();
                sorted.sort_by(|a, b| a.total_cmp(b));
                let mid = sorted.len() / 2;
                if sorted.len() % 2 == 0 {
                    Some((sorted[mid - 1] + sorted[mid]) / 2.0)
                } else {
                    Some(sorted[mid])
                }
            }
            Aggregation::Min => values.iter().copied().reduce(f64::min),
            Aggregation::Max => values.iter().copied().reduce(f64::max),
            Aggregation::Count => Some(n),
            Aggregation::First => values.first().copied(),
            Aggregation::Last => values.last().copied(),
            Aggregation::Std => {
                if values.len() < 2 {
                    return None;
                }
                let mean = values.iter().sum::<f64>() / n;
                let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
                Some(var.sqrt())
            }
        }
    }
}

/// Identity of one series: the values of the grouping columns, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(Vec<String>);

impl GroupKey {
    pub fn new(parts: Vec<String>) -> Self {
        GroupKey(parts)
    }

    /// The key of an ungrouped series.
    pub fn empty() -> Self {
        GroupKey(Vec::new())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for GroupKey {
    fn from(part: &str) -> Self {
        GroupKey(vec![part.to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for GroupKey {
    fn from(parts: [&str; N]) -> Self {
        GroupKey(parts.iter().map(|s| s.to_string()).collect())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("/"))
    }
}

/// One bucketed numeric series.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub key: GroupKey,
    pub value_column: String,
    pub values: Vec<Option<f64>>,
}

impl Series {
    /// Human readable name, `value_column` or `value_column/key`.
    pub fn label(&self) -> String {
        if self.key.is_empty() {
            self.value_column.clone()
        } else {
            format!("{}/{}", self.value_column, self.key)
        }
    }
}

/// Wide form: one shared time axis, one series per (value column, group).
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    date_column: String,
    group_columns: Vec<String>,
    axis: TimeAxis,
    series: Vec<Series>,
}

impl WideTable {
    /// Assemble a wide table; every series must match the axis length.
    pub fn new(
        date_column: impl Into<String>,
        group_columns: Vec<String>,
        axis: TimeAxis,
        series: Vec<Series>,
    ) -> Result<Self> {
        for s in &series {
            if s.values.len() != axis.len() {
                return Err(SalescastError::InvalidInput(format!(
                    "Series {} has {} values but the axis has {} buckets",
                    s.label(),
                    s.values.len(),
                    axis.len()
                )));
            }
            if s.key.parts().len() != group_columns.len() {
                return Err(SalescastError::InvalidInput(format!(
                    "Series {} has {} key fields but the table has {} group columns",
                    s.label(),
                    s.key.parts().len(),
                    group_columns.len()
                )));
            }
        }
        Ok(Self {
            date_column: date_column.into(),
            group_columns,
            axis,
            series,
        })
    }

    /// A table holding one unlabelled series.
    pub fn from_values(
        date_column: impl Into<String>,
        axis: TimeAxis,
        value_column: impl Into<String>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        let series = Series {
            key: GroupKey::empty(),
            value_column: value_column.into(),
            values,
        };
        Self::new(date_column, Vec::new(), axis, vec![series])
    }

    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn group_columns(&self) -> &[String] {
        &self.group_columns
    }

    pub fn axis(&self) -> &TimeAxis {
        &self.axis
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    pub fn n_series(&self) -> usize {
        self.series.len()
    }

    pub fn dates(&self) -> Vec<DateLabel> {
        self.axis.labels()
    }

    pub fn find(&self, value_column: &str, key: &GroupKey) -> Option<&Series> {
        self.series
            .iter()
            .find(|s| s.value_column == value_column && s.key == *key)
    }
}

/// One (date, group) row of the long form.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub key: GroupKey,
    pub date: DateLabel,
    /// One cell per value column, in value column order.
    pub values: Vec<Option<f64>>,
}

/// Long form: one row per (date, group), each group on its own contiguous grid.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTable {
    pub date_column: String,
    pub group_columns: Vec<String>,
    pub value_columns: Vec<String>,
    pub rows: Vec<LongRow>,
}

impl LongTable {
    /// Rows of one group, in date order.
    pub fn rows_for<'a>(&'a self, key: &'a GroupKey) -> impl Iterator<Item = &'a LongRow> + 'a {
        self.rows.iter().filter(move |r| r.key == *key)
    }
}

/// Output of [`summarize`].
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryTable {
    Wide(WideTable),
    Long(LongTable),
}

impl SummaryTable {
    pub fn is_wide(&self) -> bool {
        matches!(self, SummaryTable::Wide(_))
    }

    pub fn as_wide(&self) -> Option<&WideTable> {
        match self {
            SummaryTable::Wide(w) => Some(w),
            SummaryTable::Long(_) => None,
        }
    }

    pub fn as_long(&self) -> Option<&LongTable> {
        match self {
            SummaryTable::Long(l) => Some(l),
            SummaryTable::Wide(_) => None,
        }
    }

    /// The wide table, or an error for long output.
    pub fn into_wide(self) -> Result<WideTable> {
        match self {
            SummaryTable::Wide(w) => Ok(w),
            SummaryTable::Long(_) => Err(SalescastError::InvalidInput(
                "expected a wide summary table".to_string(),
            )),
        }
    }
}

/// Options for [`summarize`].
#[derive(Debug, Clone, PartialEq)]
pub struct SummarizeOptions {
    /// Column holding the transaction date (timestamp or parseable text)
    pub date_column: String,
    /// Numeric columns to aggregate
    pub value_columns: ColumnList,
    /// Grouping columns, empty for a single partition
    pub group_columns: ColumnList,
    /// Bucket frequency
    pub frequency: Frequency,
    /// Aggregation applied to every value column
    pub aggregation: Aggregation,
    /// Instants or periods on the output axis
    pub axis_kind: AxisKind,
    /// Pivot groups into separate series
    pub wide: bool,
    /// Replacement for buckets without observations
    pub fill: FillValue,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            date_column: String::new(),
            value_columns: ColumnList::default(),
            group_columns: ColumnList::default(),
            frequency: Frequency::Daily,
            aggregation: Aggregation::Sum,
            axis_kind: AxisKind::Timestamp,
            wide: true,
            fill: FillValue::default(),
        }
    }
}

impl SummarizeOptions {
    pub fn new(date_column: impl Into<String>, value_columns: impl Into<ColumnList>) -> Self {
        Self {
            date_column: date_column.into(),
            value_columns: value_columns.into(),
            ..Default::default()
        }
    }

    pub fn with_groups(mut self, groups: impl Into<ColumnList>) -> Self {
        self.group_columns = groups.into();
        self
    }

    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_aggregation(mut self, aggregation: Aggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_axis_kind(mut self, kind: AxisKind) -> Self {
        self.axis_kind = kind;
        self
    }

    pub fn with_wide(mut self, wide: bool) -> Self {
        self.wide = wide;
        self
    }

    pub fn with_fill(mut self, fill: impl Into<FillValue>) -> Self {
        self.fill = fill.into();
        self
    }
}

/// Bucket `values` of one partition onto `axis` and reduce each bucket.
fn bucket_values(
    axis: &TimeAxis,
    rows: &[usize],
    dates: &[Option<NaiveDateTime>],
    values: &[Option<f64>],
    aggregation: Aggregation,
    fill: FillValue,
) -> Vec<Option<f64>> {
    let mut buckets: Vec<Vec<f64>> = vec![Vec::new(); axis.len()];
    for &row in rows {
        let (Some(date), Some(value)) = (dates[row], values[row]) else {
            continue;
        };
        if let Some(pos) = axis.position(date) {
            buckets[pos].push(value);
        }
    }
    let mut out: Vec<Option<f64>> = buckets.iter().map(|b| aggregation.apply(b)).collect();
    apply_fill(&mut out, fill);
    out
}

fn date_range(rows: &[usize], dates: &[Option<NaiveDateTime>]) -> Option<(NaiveDateTime, NaiveDateTime)> {
    rows.iter()
        .filter_map(|&r| dates[r])
        .fold(None, |acc, d| match acc {
            None => Some((d, d)),
            Some((lo, hi)) => Some((lo.min(d), hi.max(d))),
        })
}

/// Bucket a transaction table into regular time series.
///
/// Rows are indexed by `date_column`, partitioned by `group_columns`,
/// bucketed at `frequency` and reduced with `aggregation`. Wide output puts
/// every (value column, group) on one axis spanning the observed date range;
/// long output gives each group its own contiguous range. Buckets without
/// observations receive `fill`. The input table is not modified.
pub fn summarize(data: &Table, options: &SummarizeOptions) -> Result<SummaryTable> {
    if options.value_columns.is_empty() {
        return Err(SalescastError::invalid_param(
            "value_columns",
            "[]",
            "at least one value column is required",
        ));
    }

    let dates = data.timestamps(&options.date_column)?;
    let value_cols: Vec<&[Option<f64>]> = options
        .value_columns
        .names()
        .iter()
        .map(|name| data.floats(name))
        .collect::<Result<_>>()?;
    let group_cols = options
        .group_columns
        .names()
        .iter()
        .map(|name| data.require(name))
        .collect::<Result<Vec<_>>>()?;

    let mut partitions: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
    let mut dropped = 0usize;
    for (row, date) in dates.iter().enumerate() {
        if date.is_none() {
            dropped += 1;
            continue;
        }
        let key = GroupKey(group_cols.iter().map(|c| c.key_at(row)).collect());
        partitions.entry(key).or_default().push(row);
    }
    if dropped > 0 {
        debug!(dropped, column = %options.date_column, "dropped rows without a date");
    }

    let group_columns = options.group_columns.names().to_vec();
    let value_names = options.value_columns.names();

    if options.wide {
        let all_rows: Vec<usize> = partitions.values().flatten().copied().collect();
        let axis = match date_range(&all_rows, &dates) {
            Some((lo, hi)) => {
                TimeAxis::spanning(options.frequency, options.axis_kind, lo, hi)?
            }
            None => TimeAxis::new(
                options.frequency,
                options.axis_kind,
                NaiveDateTime::default(),
                0,
            ),
        };

        let mut series = Vec::with_capacity(value_names.len() * partitions.len().max(1));
        for (name, values) in value_names.iter().zip(&value_cols) {
            if partitions.is_empty() && group_columns.is_empty() {
                series.push(Series {
                    key: GroupKey::empty(),
                    value_column: name.clone(),
                    values: Vec::new(),
                });
            }
            for (key, rows) in &partitions {
                series.push(Series {
                    key: key.clone(),
                    value_column: name.clone(),
                    values: bucket_values(
                        &axis,
                        rows,
                        &dates,
                        values,
                        options.aggregation,
                        options.fill,
                    ),
                });
            }
        }

        debug!(
            rows = data.n_rows(),
            groups = partitions.len(),
            series = series.len(),
            buckets = axis.len(),
            frequency = %options.frequency,
            "summarized by time (wide)"
        );

        return Ok(SummaryTable::Wide(WideTable {
            date_column: options.date_column.clone(),
            group_columns,
            axis,
            series,
        }));
    }

    let mut rows_out = Vec::new();
    for (key, rows) in &partitions {
        let Some((lo, hi)) = date_range(rows, &dates) else {
            continue;
        };
        let axis = TimeAxis::spanning(options.frequency, options.axis_kind, lo, hi)?;
        let columns: Vec<Vec<Option<f64>>> = value_cols
            .iter()
            .map(|values| {
                bucket_values(&axis, rows, &dates, values, options.aggregation, options.fill)
            })
            .collect();
        for (i, date) in axis.labels().into_iter().enumerate() {
            rows_out.push(LongRow {
                key: key.clone(),
                date,
                values: columns.iter().map(|c| c[i]).collect(),
            });
        }
    }

    debug!(
        rows = data.n_rows(),
        groups = partitions.len(),
        output_rows = rows_out.len(),
        frequency = %options.frequency,
        "summarized by time (long)"
    );

    Ok(SummaryTable::Long(LongTable {
        date_column: options.date_column.clone(),
        group_columns,
        value_columns: value_names.to_vec(),
        rows: rows_out,
    }))
}
