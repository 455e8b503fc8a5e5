//! Time bucketing and batch forecasting for transaction-level sales data.
//!
//! This crate turns order-line tables into regular per-group time series
//! ([`summarize`]) and forecasts every series with automatic ARIMA
//! ([`forecast_all`]).

pub mod aggregate;
pub mod collect;
pub mod error;
pub mod export;
pub mod forecast;
pub mod frequency;
pub mod imputation;
pub mod plot;
pub mod table;

// Re-exports for convenience
pub use aggregate::{
    summarize, Aggregation, ColumnList, GroupKey, LongRow, LongTable, Series, SummarizeOptions,
    SummaryTable, WideTable,
};
pub use collect::{collect_data, COLLECTED_COLUMNS};
pub use error::{Result, SalescastError};
pub use forecast::{
    forecast_all, forecast_series, ArimaOptions, FailurePolicy, ForecastConfig, ForecastRecord,
    ForecastTable, SeriesFailure, SeriesForecast, SeriesModel,
};
pub use frequency::{AxisKind, DateLabel, Frequency, Period, TimeAxis};
pub use imputation::FillValue;
pub use plot::{prepare_forecast_plot, Facet, ForecastPlotData, PlotRow, Variable};
pub use table::{Column, Table};
