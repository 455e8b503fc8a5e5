//! Long-format plotting data for faceted forecast charts.

use crate::aggregate::GroupKey;
use crate::forecast::{ForecastRecord, ForecastTable};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::fmt;
use tracing::debug;

/// Which measure a plot row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variable {
    Value,
    Prediction,
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Value => write!(f, "value"),
            Variable::Prediction => write!(f, "prediction"),
        }
    }
}

/// One chart panel: a series of one group.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Facet {
    pub key: GroupKey,
    pub series: String,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.key.is_empty() {
            write!(f, "{}", self.series)
        } else {
            write!(f, "{}", self.key)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlotRow {
    pub facet: Facet,
    pub date: NaiveDateTime,
    pub variable: Variable,
    pub value: f64,
    pub ci_lo: Option<f64>,
    pub ci_hi: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ForecastPlotData {
    /// Panels ordered by mean plotted value, largest first
    pub facets: Vec<Facet>,
    /// Rows grouped by facet in `facets` order
    pub rows: Vec<PlotRow>,
}

impl ForecastPlotData {
    pub fn rows_for<'a>(&'a self, facet: &'a Facet) -> impl Iterator<Item = &'a PlotRow> + 'a {
        self.rows.iter().filter(move |r| r.facet == *facet)
    }
}

fn melt(record: &ForecastRecord) -> impl Iterator<Item = PlotRow> + '_ {
    let facet = Facet {
        key: record.key.clone(),
        series: record.series.clone(),
    };
    let date = record.date.to_timestamp();
    [
        (Variable::Value, record.value),
        (Variable::Prediction, record.prediction),
    ]
    .into_iter()
    .filter_map(move |(variable, value)| {
        value.map(|value| PlotRow {
            facet: facet.clone(),
            date,
            variable,
            value,
            ci_lo: record.ci_lo,
            ci_hi: record.ci_hi,
        })
    })
}

/// Melt a forecast table into one row per plotted point.
///
/// Period dates become their start timestamp. Missing measures are dropped.
pub fn prepare_forecast_plot(table: &ForecastTable) -> ForecastPlotData {
    let rows: Vec<PlotRow> = table.records().iter().flat_map(|r| melt(r)).collect();

    // (facet, sum, count) in first-seen order
    let mut stats: Vec<(Facet, f64, usize)> = Vec::new();
    for row in &rows {
        match stats.iter_mut().find(|(f, _, _)| *f == row.facet) {
            Some((_, sum, count)) => {
                *sum += row.value;
                *count += 1;
            }
            None => stats.push((row.facet.clone(), row.value, 1)),
        }
    }
    let mut means: Vec<(Facet, f64)> = stats
        .into_iter()
        .map(|(facet, sum, count)| (facet, sum / count as f64))
        .collect();
    means.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    let facets: Vec<Facet> = means.into_iter().map(|(facet, _)| facet).collect();

    let mut ordered = Vec::with_capacity(rows.len());
    for facet in &facets {
        ordered.extend(rows.iter().filter(|r| r.facet == *facet).cloned());
    }

    debug!(facets = facets.len(), rows = ordered.len(), "prepared forecast plot data");
    ForecastPlotData {
        facets,
        rows: ordered,
    }
}
