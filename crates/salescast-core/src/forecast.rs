//! Batch forecasting wrapping the anofox-forecast AutoARIMA model.
//!
//! Every series of a [`WideTable`] is fitted independently with automatic
//! (seasonal) ARIMA order selection, forecast `horizon` buckets ahead with a
//! `1 - alpha` prediction interval, and stacked back into one long table.

use crate::aggregate::{GroupKey, Series, WideTable};
use crate::error::{Result, SalescastError};
use crate::frequency::DateLabel;
use crate::imputation::fill_nulls_interpolate;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::str::FromStr;

use anofox_forecast::core::TimeSeriesBuilder;
use anofox_forecast::models::arima::{AutoARIMA, AutoARIMAConfig};
use anofox_forecast::models::baseline::{Naive, RandomWalkWithDrift};
use anofox_forecast::ForecastError;
use anofox_forecast::prelude::Forecaster;
use statrs::distribution::{ContinuousCDF, Normal};
use tracing::{debug, info, warn};

/// Fewest observations the automatic order search accepts.
pub const MIN_AUTO_ARIMA_OBS: usize = 10;

/// Seasonal cycles required before seasonal terms are searched.
pub const MIN_SEASONAL_CYCLES: usize = 3;

/// Search bounds for the automatic ARIMA order selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArimaOptions {
    /// Maximum non-seasonal AR order
    pub max_p: usize,
    /// Maximum non-seasonal differencing
    pub max_d: usize,
    /// Maximum non-seasonal MA order
    pub max_q: usize,
    /// Maximum seasonal AR order
    pub max_seasonal_p: usize,
    /// Maximum seasonal differencing
    pub max_seasonal_d: usize,
    /// Maximum seasonal MA order
    pub max_seasonal_q: usize,
    /// Stepwise search (false = exhaustive)
    pub stepwise: bool,
}

impl Default for ArimaOptions {
    fn default() -> Self {
        Self {
            max_p: 5,
            max_d: 2,
            max_q: 5,
            max_seasonal_p: 2,
            max_seasonal_d: 1,
            max_seasonal_q: 2,
            stepwise: true,
        }
    }
}

impl ArimaOptions {
    /// Names accepted by [`ArimaOptions::set`].
    pub const KEYS: [&'static str; 7] = [
        "max_p",
        "max_d",
        "max_q",
        "max_seasonal_p",
        "max_seasonal_d",
        "max_seasonal_q",
        "stepwise",
    ];

    /// Set one option by name. Unknown names and unparseable values are rejected.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parse_order = |v: &str| {
            v.trim().parse::<usize>().map_err(|_| {
                SalescastError::invalid_param(key, v, "expected a non-negative integer")
            })
        };
        match key {
            "max_p" => self.max_p = parse_order(value)?,
            "max_d" => self.max_d = parse_order(value)?,
            "max_q" => self.max_q = parse_order(value)?,
            "max_seasonal_p" | "max_P" => self.max_seasonal_p = parse_order(value)?,
            "max_seasonal_d" | "max_D" => self.max_seasonal_d = parse_order(value)?,
            "max_seasonal_q" | "max_Q" => self.max_seasonal_q = parse_order(value)?,
            "stepwise" => {
                self.stepwise = value.trim().parse::<bool>().map_err(|_| {
                    SalescastError::invalid_param(key, value, "expected true or false")
                })?
            }
            _ => {
                return Err(SalescastError::invalid_param(
                    key,
                    value,
                    format!("unknown model option, expected one of {:?}", Self::KEYS),
                ))
            }
        }
        Ok(())
    }

    /// Build options from `(key, value)` pairs on top of the defaults.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Self::default();
        for (key, value) in pairs {
            options.set(key, value)?;
        }
        Ok(options)
    }

    fn to_config(&self, seasonal_period: usize) -> AutoARIMAConfig {
        let config = AutoARIMAConfig::default()
            .with_max_orders(self.max_p, self.max_d, self.max_q)
            .with_seasonal_orders(
                self.max_seasonal_p,
                self.max_seasonal_d,
                self.max_seasonal_q,
            )
            .with_seasonal_period(seasonal_period);
        if self.stepwise {
            config
        } else {
            config.exhaustive()
        }
    }
}

/// What a failed series does to the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// The first failure aborts the batch; no partial results.
    #[default]
    Abort,
    /// Failures are recorded per series and the remaining series complete.
    Isolate,
}

impl FromStr for FailurePolicy {
    type Err = SalescastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "abort" | "raise" => Ok(FailurePolicy::Abort),
            "isolate" | "skip" => Ok(FailurePolicy::Isolate),
            _ => Err(SalescastError::invalid_param(
                "failure_policy",
                s,
                "expected 'abort' or 'isolate'",
            )),
        }
    }
}

/// Options for [`forecast_all`].
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastConfig {
    /// Number of future buckets to forecast
    pub horizon: usize,
    /// Buckets per seasonal cycle (1 = non-seasonal)
    pub seasonal_period: usize,
    /// Significance level; intervals cover `1 - alpha`
    pub alpha: f64,
    /// Log model selection details at debug instead of info
    pub suppress_warnings: bool,
    /// AutoARIMA search bounds
    pub model: ArimaOptions,
    /// Behaviour when one series fails to fit
    pub failure_policy: FailurePolicy,
    /// Fit series on the rayon pool
    pub parallel: bool,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            horizon: 12,
            seasonal_period: 1,
            alpha: 0.05,
            suppress_warnings: true,
            model: ArimaOptions::default(),
            failure_policy: FailurePolicy::Abort,
            parallel: false,
        }
    }
}

impl ForecastConfig {
    pub fn new(horizon: usize, seasonal_period: usize) -> Self {
        Self {
            horizon,
            seasonal_period,
            ..Default::default()
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_model(mut self, model: ArimaOptions) -> Self {
        self.model = model;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_suppress_warnings(mut self, suppress: bool) -> Self {
        self.suppress_warnings = suppress;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.horizon == 0 {
            return Err(SalescastError::invalid_param(
                "horizon",
                self.horizon,
                "must be a positive integer",
            ));
        }
        if self.seasonal_period == 0 {
            return Err(SalescastError::invalid_param(
                "seasonal_period",
                self.seasonal_period,
                "must be a positive integer",
            ));
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(SalescastError::invalid_param(
                "alpha",
                self.alpha,
                "must be between 0 and 1 (exclusive)",
            ));
        }
        Ok(())
    }
}

/// One output row: a history observation or a forecast step.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub key: GroupKey,
    /// Value column the series was aggregated from
    pub series: String,
    pub date: DateLabel,
    pub value: Option<f64>,
    pub prediction: Option<f64>,
    pub ci_lo: Option<f64>,
    pub ci_hi: Option<f64>,
}

impl ForecastRecord {
    pub fn is_forecast(&self) -> bool {
        self.prediction.is_some()
    }
}

/// The model chosen for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesModel {
    pub key: GroupKey,
    pub series: String,
    pub model_name: String,
}

/// A series that could not be forecast under [`FailurePolicy::Isolate`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFailure {
    pub key: GroupKey,
    pub series: String,
    pub error: SalescastError,
}

/// Stacked history and forecasts of every series.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    date_column: String,
    group_columns: Vec<String>,
    records: Vec<ForecastRecord>,
    models: Vec<SeriesModel>,
    failures: Vec<SeriesFailure>,
}

impl ForecastTable {
    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn group_columns(&self) -> &[String] {
        &self.group_columns
    }

    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    pub fn models(&self) -> &[SeriesModel] {
        &self.models
    }

    pub fn failures(&self) -> &[SeriesFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct group keys, in output order.
    pub fn keys(&self) -> Vec<&GroupKey> {
        let mut keys: Vec<&GroupKey> = Vec::new();
        for record in &self.records {
            if !keys.contains(&&record.key) {
                keys.push(&record.key);
            }
        }
        keys
    }

    /// Rows of one group, in output order.
    pub fn records_for<'a>(
        &'a self,
        key: &'a GroupKey,
    ) -> impl Iterator<Item = &'a ForecastRecord> + 'a {
        self.records.iter().filter(move |r| r.key == *key)
    }
}

/// Point forecast and interval for one series.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesForecast {
    pub point: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
    pub model_name: String,
}

fn normal_quantile(p: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| SalescastError::ComputationError(format!("Normal distribution: {}", e)))?;
    Ok(normal.inverse_cdf(p))
}

/// Residual standard error from whatever residuals are finite.
fn residual_sigma(residuals: Option<&[f64]>, values: &[f64]) -> f64 {
    let finite: Vec<f64> = residuals
        .unwrap_or(&[])
        .iter()
        .copied()
        .filter(|r| r.is_finite())
        .collect();
    if !finite.is_empty() {
        return (finite.iter().map(|r| r * r).sum::<f64>() / finite.len() as f64).sqrt();
    }
    // Spread of first differences
    let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    if diffs.is_empty() {
        return 0.0;
    }
    let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
    (diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / diffs.len() as f64).sqrt()
}

fn model_name(model: &AutoARIMA) -> String {
    match model.selected_full_order() {
        Some(o) if o.is_seasonal() => format!(
            "SARIMA({},{},{})({},{},{})[{}]",
            o.p, o.d, o.q, o.cap_p, o.cap_d, o.cap_q, o.s
        ),
        Some(o) => format!("ARIMA({},{},{})", o.p, o.d, o.q),
        None => model.name().to_string(),
    }
}

/// Whether every value equals the first one.
fn is_constant(values: &[f64]) -> bool {
    let first = values.first().copied().unwrap_or_default();
    let tolerance = 1e-12 * first.abs().max(1.0);
    values.iter().all(|v| (v - first).abs() <= tolerance)
}

fn fit_error(label: &str, e: ForecastError) -> SalescastError {
    SalescastError::ModelFit {
        series: label.to_string(),
        reason: e.to_string(),
    }
}

/// Fit, predict and collect intervals from any forecaster.
fn run_model<M: Forecaster>(
    model: &mut M,
    label: &str,
    timestamps: &[DateTime<Utc>],
    values: &[f64],
    horizon: usize,
    alpha: f64,
) -> std::result::Result<SeriesForecast, ForecastError> {
    let time_series = TimeSeriesBuilder::new()
        .timestamps(timestamps.to_vec())
        .values(values.to_vec())
        .build()?;
    model.fit(&time_series)?;
    let forecast = model.predict_with_intervals(horizon, 1.0 - alpha)?;

    let point = forecast.point().first().cloned().unwrap_or_default();
    let lower = forecast
        .lower()
        .and_then(|l| l.first())
        .cloned()
        .unwrap_or_default();
    let upper = forecast
        .upper()
        .and_then(|u| u.first())
        .cloned()
        .unwrap_or_default();

    debug!(series = label, model = model.name(), "model fitted");

    Ok(SeriesForecast {
        point,
        lower,
        upper,
        model_name: model.name().to_string(),
    })
}

/// Make the interval usable: derive it when the model gave none, then order it
/// around the point forecast.
fn finalize_intervals(
    mut forecast: SeriesForecast,
    residuals: Option<&[f64]>,
    values: &[f64],
    alpha: f64,
) -> Result<SeriesForecast> {
    let horizon = forecast.point.len();
    let usable = |b: &[f64]| b.len() == horizon && b.iter().all(|v| v.is_finite());
    if !usable(&forecast.lower) || !usable(&forecast.upper) {
        let z = normal_quantile(1.0 - alpha / 2.0)?;
        let sigma = residual_sigma(residuals, values);
        forecast.lower = Vec::with_capacity(horizon);
        forecast.upper = Vec::with_capacity(horizon);
        for (h, p) in forecast.point.iter().enumerate() {
            let se = sigma * ((h + 1) as f64).sqrt();
            forecast.lower.push(p - z * se);
            forecast.upper.push(p + z * se);
        }
    }

    for ((p, lo), hi) in forecast
        .point
        .iter()
        .zip(forecast.lower.iter_mut())
        .zip(forecast.upper.iter_mut())
    {
        let (a, b) = (*lo, *hi);
        *lo = a.min(b).min(*p);
        *hi = a.max(b).max(*p);
    }
    Ok(forecast)
}

/// Fit a baseline model without order search.
fn fit_baseline<M: Forecaster>(
    mut model: M,
    label: &str,
    timestamps: &[DateTime<Utc>],
    values: &[f64],
    config: &ForecastConfig,
) -> Result<SeriesForecast> {
    let forecast = run_model(
        &mut model,
        label,
        timestamps,
        values,
        config.horizon,
        config.alpha,
    )
    .map_err(|e| fit_error(label, e))?;
    finalize_intervals(forecast, model.residuals(), values, config.alpha)
}

/// Forecast a single series with automatic ARIMA selection.
///
/// `dates` are the bucket instants of `values`. Missing values are
/// interpolated for fitting. Constant histories get a naive forecast.
/// Histories too short for the seasonal search drop the seasonal terms;
/// histories too short for the automatic search use a random walk with drift.
pub fn forecast_series(
    label: &str,
    dates: &[NaiveDateTime],
    values: &[Option<f64>],
    config: &ForecastConfig,
) -> Result<SeriesForecast> {
    config.validate()?;
    if dates.len() != values.len() {
        return Err(SalescastError::InvalidInput(format!(
            "Series {} has {} values but {} dates",
            label,
            values.len(),
            dates.len()
        )));
    }

    let observed = values.iter().filter(|v| v.is_some()).count();
    if observed < 2 {
        return Err(SalescastError::InsufficientData {
            needed: 2,
            got: observed,
        });
    }
    let clean = fill_nulls_interpolate(values);
    let n = clean.len();
    let timestamps: Vec<DateTime<Utc>> = dates.iter().map(|d| d.and_utc()).collect();

    let notice = |message: &str| {
        if config.suppress_warnings {
            debug!(series = label, observations = n, "{}", message);
        } else {
            warn!(series = label, observations = n, "{}", message);
        }
    };

    if is_constant(&clean) {
        notice("constant history; using naive forecast");
        return fit_baseline(Naive::new(), label, &timestamps, &clean, config);
    }

    let requested = config.seasonal_period;
    let period = if requested > 1 && n < MIN_SEASONAL_CYCLES * requested {
        notice("history shorter than three seasonal cycles; searching non-seasonal models");
        0
    } else if requested > 1 {
        requested
    } else {
        0
    };

    let drift = || fit_baseline(RandomWalkWithDrift::new(), label, &timestamps, &clean, config);

    if n < MIN_AUTO_ARIMA_OBS {
        notice("history too short for automatic order selection; using random walk with drift");
        return drift();
    }

    let mut model = AutoARIMA::with_config(config.model.to_config(period));
    let outcome = run_model(
        &mut model,
        label,
        &timestamps,
        &clean,
        config.horizon,
        config.alpha,
    );
    let forecast = match outcome {
        Ok(forecast) => forecast,
        Err(ForecastError::InsufficientData { needed, got, .. }) => {
            notice(&format!(
                "order search needs {} observations, got {}; using random walk with drift",
                needed, got
            ));
            return drift();
        }
        Err(e) => return Err(fit_error(label, e)),
    };

    let forecast = SeriesForecast {
        model_name: model_name(&model),
        ..forecast
    };
    if config.suppress_warnings {
        debug!(series = label, model = %forecast.model_name, "selected model");
    } else {
        info!(series = label, model = %forecast.model_name, "selected model");
    }

    if forecast.point.len() != config.horizon {
        return Err(SalescastError::ModelFit {
            series: label.to_string(),
            reason: format!(
                "model returned {} predictions for horizon {}",
                forecast.point.len(),
                config.horizon
            ),
        });
    }

    finalize_intervals(forecast, model.residuals(), &clean, config.alpha)
}

#[cfg(feature = "parallel")]
fn fit_parallel<F>(series: &[Series], fit: F) -> Vec<Result<SeriesForecast>>
where
    F: Fn((usize, &Series)) -> Result<SeriesForecast> + Sync + Send,
{
    use rayon::prelude::*;
    series.par_iter().enumerate().map(fit).collect()
}

#[cfg(not(feature = "parallel"))]
fn fit_parallel<F>(series: &[Series], fit: F) -> Vec<Result<SeriesForecast>>
where
    F: Fn((usize, &Series)) -> Result<SeriesForecast> + Sync + Send,
{
    debug!("built without the parallel feature; fitting sequentially");
    series.iter().enumerate().map(fit).collect()
}

/// Forecast every series of a wide table and stack the results.
///
/// Output per series: its history rows (value set) followed by `horizon`
/// forecast rows (prediction and interval set), series in input order.
pub fn forecast_all(data: &WideTable, config: &ForecastConfig) -> Result<ForecastTable> {
    config.validate()?;
    if data.n_series() == 0 {
        return Err(SalescastError::InvalidInput(
            "table has no series to forecast".to_string(),
        ));
    }
    if data.axis().is_empty() {
        return Err(SalescastError::InvalidInput(
            "table has an empty time axis".to_string(),
        ));
    }

    let total = data.n_series();
    let instants = data.axis().buckets();
    let fit = |(index, series): (usize, &Series)| {
        let label = series.label();
        debug!(series = %label, index = index + 1, total, "fitting series");
        forecast_series(&label, &instants, &series.values, config)
    };

    let outcomes: Vec<Result<SeriesForecast>> = if config.parallel {
        fit_parallel(data.series(), fit)
    } else {
        let mut outcomes = Vec::with_capacity(total);
        for item in data.series().iter().enumerate() {
            let outcome = fit(item);
            let stop = outcome.is_err() && config.failure_policy == FailurePolicy::Abort;
            outcomes.push(outcome);
            if stop {
                break;
            }
        }
        outcomes
    };

    let history = data.axis().len();
    let dates = data.axis().extended(config.horizon).labels();

    let mut records = Vec::with_capacity(total * (history + config.horizon));
    let mut models = Vec::with_capacity(total);
    let mut failures = Vec::new();

    for (series, outcome) in data.series().iter().zip(outcomes) {
        let forecast = match outcome {
            Ok(forecast) => forecast,
            Err(error) => {
                if config.failure_policy == FailurePolicy::Abort {
                    return Err(error);
                }
                warn!(series = %series.label(), error = %error, "series failed; continuing");
                failures.push(SeriesFailure {
                    key: series.key.clone(),
                    series: series.value_column.clone(),
                    error,
                });
                continue;
            }
        };

        for (date, value) in dates.iter().zip(&series.values) {
            records.push(ForecastRecord {
                key: series.key.clone(),
                series: series.value_column.clone(),
                date: *date,
                value: *value,
                prediction: None,
                ci_lo: None,
                ci_hi: None,
            });
        }
        let steps = forecast
            .point
            .iter()
            .zip(&forecast.lower)
            .zip(&forecast.upper);
        for (date, ((p, lo), hi)) in dates.iter().skip(history).zip(steps) {
            records.push(ForecastRecord {
                key: series.key.clone(),
                series: series.value_column.clone(),
                date: *date,
                value: None,
                prediction: Some(*p),
                ci_lo: Some(*lo),
                ci_hi: Some(*hi),
            });
        }
        models.push(SeriesModel {
            key: series.key.clone(),
            series: series.value_column.clone(),
            model_name: forecast.model_name,
        });
    }

    info!(
        series = total,
        forecast = models.len(),
        failed = failures.len(),
        horizon = config.horizon,
        "forecast batch complete"
    );

    Ok(ForecastTable {
        date_column: data.date_column().to_string(),
        group_columns: data.group_columns().to_vec(),
        records,
        models,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frequency::{AxisKind, Frequency, TimeAxis};
    use chrono::NaiveDate;

    fn monthly_axis(len: usize) -> TimeAxis {
        let start = NaiveDate::from_ymd_opt(2020, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        TimeAxis::new(Frequency::MonthStart, AxisKind::Timestamp, start, len)
    }

    fn seasonal_values(n: usize) -> Vec<Option<f64>> {
        (0..n)
            .map(|i| {
                let trend = 100.0 + 2.0 * i as f64;
                let season = 15.0 * (2.0 * std::f64::consts::PI * i as f64 / 12.0).sin();
                let noise = ((i * 7 + 3) % 11) as f64 * 0.5 - 2.5;
                Some(trend + season + noise)
            })
            .collect()
    }

    #[test]
    fn test_config_validation() {
        assert!(ForecastConfig::new(3, 12).validate().is_ok());
        assert!(matches!(
            ForecastConfig::new(0, 12).validate(),
            Err(SalescastError::InvalidParameter { .. })
        ));
        assert!(ForecastConfig::new(3, 0).validate().is_err());
        assert!(ForecastConfig::new(3, 1).with_alpha(0.0).validate().is_err());
        assert!(ForecastConfig::new(3, 1).with_alpha(1.0).validate().is_err());
        assert!(ForecastConfig::new(3, 1)
            .with_alpha(f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_arima_options_set() {
        let mut opts = ArimaOptions::default();
        opts.set("max_p", "2").unwrap();
        opts.set("stepwise", "false").unwrap();
        assert_eq!(opts.max_p, 2);
        assert!(!opts.stepwise);

        let err = opts.set("information_criterion", "bic").unwrap_err();
        assert!(matches!(err, SalescastError::InvalidParameter { .. }));
        assert!(opts.set("max_q", "-1").is_err());

        let opts = ArimaOptions::from_pairs([("max_d", "1"), ("max_P", "1")]).unwrap();
        assert_eq!(opts.max_d, 1);
        assert_eq!(opts.max_seasonal_p, 1);
        assert!(ArimaOptions::from_pairs([("trace", "true")]).is_err());
    }

    #[test]
    fn test_failure_policy_from_str() {
        assert_eq!("Isolate".parse::<FailurePolicy>().unwrap(), FailurePolicy::Isolate);
        assert_eq!("abort".parse::<FailurePolicy>().unwrap(), FailurePolicy::Abort);
        assert!("retry".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_finalize_intervals_orders_bounds() {
        let forecast = SeriesForecast {
            point: vec![10.0, 11.0],
            lower: vec![12.0, 9.0],
            upper: vec![8.0, 13.0],
            model_name: "test".into(),
        };
        let out = finalize_intervals(forecast, None, &[1.0, 2.0], 0.05).unwrap();
        assert_eq!(out.lower, vec![8.0, 9.0]);
        assert_eq!(out.upper, vec![12.0, 13.0]);
    }

    #[test]
    fn test_finalize_intervals_derives_missing_bounds() {
        let forecast = SeriesForecast {
            point: vec![10.0, 10.0],
            lower: vec![],
            upper: vec![],
            model_name: "test".into(),
        };
        let residuals = [1.0, -1.0, 1.0, -1.0];
        let out = finalize_intervals(forecast, Some(&residuals[..]), &[], 0.05).unwrap();
        let z = normal_quantile(0.975).unwrap();
        approx::assert_relative_eq!(out.upper[0] - 10.0, z, epsilon = 1e-9);
        approx::assert_relative_eq!(out.upper[1] - 10.0, z * 2f64.sqrt(), epsilon = 1e-9);
        assert!(out.lower[1] < out.lower[0]);
    }

    #[test]
    fn test_residual_sigma_ignores_nan() {
        let sigma = residual_sigma(Some(&[f64::NAN, 2.0, -2.0][..]), &[]);
        approx::assert_relative_eq!(sigma, 2.0, epsilon = 1e-12);
        // Falls back to first differences
        let sigma = residual_sigma(None, &[1.0, 2.0, 3.0]);
        approx::assert_relative_eq!(sigma, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_forecast_series_short_history_uses_drift() {
        let values = vec![Some(100.0), Some(110.0), Some(120.0), Some(130.0)];
        let dates = monthly_axis(values.len()).buckets();
        let out = forecast_series("y", &dates, &values, &ForecastConfig::new(2, 12)).unwrap();
        assert_eq!(out.point.len(), 2);
        assert_eq!(out.model_name, "RandomWalkWithDrift");
        approx::assert_relative_eq!(out.point[0], 140.0, epsilon = 1e-9);
        approx::assert_relative_eq!(out.point[1], 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_forecast_series_insufficient_data() {
        let dates = monthly_axis(2).buckets();
        let err = forecast_series("y", &dates, &[Some(1.0), None], &ForecastConfig::new(2, 1))
            .unwrap_err();
        assert_eq!(err, SalescastError::InsufficientData { needed: 2, got: 1 });
    }

    #[test]
    fn test_forecast_series_rejects_misaligned_dates() {
        let dates = monthly_axis(3).buckets();
        let err = forecast_series("y", &dates, &[Some(1.0), Some(2.0)], &ForecastConfig::new(2, 1))
            .unwrap_err();
        assert!(matches!(err, SalescastError::InvalidInput(_)));
    }

    #[test]
    fn test_forecast_series_constant_history_uses_naive() {
        let config = ForecastConfig::new(3, 12).with_suppress_warnings(true);
        for level in [0.0, 250.0] {
            let values = vec![Some(level); 24];
            let dates = monthly_axis(values.len()).buckets();
            let out = forecast_series("flat", &dates, &values, &config).unwrap();
            assert_eq!(out.model_name, "Naive");
            assert_eq!(out.point.len(), 3);
            for ((p, lo), hi) in out.point.iter().zip(&out.lower).zip(&out.upper) {
                approx::assert_relative_eq!(*p, level, epsilon = 1e-9);
                assert!(lo <= p && p <= hi);
            }
        }
    }

    #[test]
    fn test_forecast_series_auto_arima() {
        let values = seasonal_values(48);
        let dates = monthly_axis(values.len()).buckets();
        let out = forecast_series("y", &dates, &values, &ForecastConfig::new(6, 12)).unwrap();
        assert_eq!(out.point.len(), 6);
        assert!(out.model_name.contains("ARIMA"));
        for ((p, lo), hi) in out.point.iter().zip(&out.lower).zip(&out.upper) {
            assert!(p.is_finite());
            assert!(lo <= p && p <= hi);
        }
    }

    #[test]
    fn test_forecast_all_row_layout() {
        let table = WideTable::from_values(
            "order_date",
            monthly_axis(4),
            "total_price",
            vec![Some(100.0), Some(110.0), Some(120.0), Some(130.0)],
        )
        .unwrap();
        let result = forecast_all(&table, &ForecastConfig::new(2, 1)).unwrap();
        let records = result.records();
        assert_eq!(records.len(), 6);
        for r in &records[..4] {
            assert!(r.value.is_some() && r.prediction.is_none());
            assert!(r.ci_lo.is_none() && r.ci_hi.is_none());
        }
        for r in &records[4..] {
            assert!(r.value.is_none() && r.prediction.is_some());
            assert!(r.ci_lo.unwrap() <= r.prediction.unwrap());
            assert!(r.prediction.unwrap() <= r.ci_hi.unwrap());
        }
        assert_eq!(records[4].date.to_string(), "2020-05-01");
        assert_eq!(result.models().len(), 1);
    }

    #[test]
    fn test_forecast_all_fits_arima_on_axis_dates() {
        let table =
            WideTable::from_values("order_date", monthly_axis(12), "total_price", seasonal_values(12))
                .unwrap();
        let result = forecast_all(&table, &ForecastConfig::new(3, 1));
        assert!(result.is_ok(), "{:?}", result.err());
        let result = result.unwrap();
        assert_eq!(result.len(), 15);
        assert!(result.models()[0].model_name.contains("ARIMA"));
    }

    #[test]
    fn test_forecast_all_rejects_bad_input() {
        let empty = WideTable::new("d", vec![], monthly_axis(3), vec![]).unwrap();
        assert!(matches!(
            forecast_all(&empty, &ForecastConfig::new(2, 1)),
            Err(SalescastError::InvalidInput(_))
        ));

        let table =
            WideTable::from_values("d", monthly_axis(3), "y", vec![Some(1.0); 3]).unwrap();
        assert!(matches!(
            forecast_all(&table, &ForecastConfig::new(0, 1)),
            Err(SalescastError::InvalidParameter { .. })
        ));
    }
}
