//! End-to-end tests: order lines -> time buckets -> batch forecasts.

use std::collections::BTreeSet;

use salescast_core::{
    collect_data, forecast_all, summarize, Column, FailurePolicy, FillValue, ForecastConfig,
    Frequency, GroupKey, SalescastError, SummarizeOptions, Table,
};

// ── Synthetic data generators ──────────────────────────────────────────

/// Order lines as `(date, category, total_price)`.
fn orders(rows: &[(&str, &str, f64)]) -> Table {
    Table::new()
        .with_column(
            "order_date",
            Column::Text(rows.iter().map(|r| Some(r.0.to_string())).collect()),
        )
        .unwrap()
        .with_column(
            "category_1",
            Column::Text(rows.iter().map(|r| Some(r.1.to_string())).collect()),
        )
        .unwrap()
        .with_column(
            "total_price",
            Column::Float(rows.iter().map(|r| Some(r.2)).collect()),
        )
        .unwrap()
}

fn two_group_orders() -> Table {
    orders(&[
        ("2011-01-07", "A", 100.0),
        ("2011-01-19", "B", 40.0),
        ("2011-02-03", "A", 120.0),
        ("2011-02-11", "B", 42.0),
        ("2011-02-25", "A", 5.0),
        ("2011-03-09", "B", 47.0),
        ("2011-03-15", "A", 130.0),
        ("2011-04-01", "A", 150.0),
        ("2011-04-21", "B", 51.0),
    ])
}

/// One order line per group and month, starting January 2011.
fn monthly_orders(months: usize, level: impl Fn(&str, usize) -> f64) -> Table {
    let mut dates = Vec::new();
    let mut groups = Vec::new();
    let mut prices = Vec::new();
    for group in ["Mountain", "Road"] {
        for m in 0..months {
            dates.push(Some(format!("{}-{:02}-15", 2011 + m / 12, m % 12 + 1)));
            groups.push(Some(group.to_string()));
            prices.push(Some(level(group, m)));
        }
    }
    Table::new()
        .with_column("order_date", Column::Text(dates))
        .unwrap()
        .with_column("category_1", Column::Text(groups))
        .unwrap()
        .with_column("total_price", Column::Float(prices))
        .unwrap()
}

fn seasonal_level(group: &str, m: usize) -> f64 {
    let base = if group == "Mountain" { 500.0 } else { 200.0 };
    let season = 80.0 * (2.0 * std::f64::consts::PI * m as f64 / 12.0).sin();
    base + 3.0 * m as f64 + season + ((m * 7 + 3) % 11) as f64
}

fn monthly_by_category() -> SummarizeOptions {
    SummarizeOptions::new("order_date", "total_price")
        .with_groups("category_1")
        .with_frequency(Frequency::MonthStart)
}

// ── Scenarios ──────────────────────────────────────────────────────────

#[test]
fn single_series_history_then_forecast() {
    let data = orders(&[
        ("2020-01-15", "A", 100.0),
        ("2020-02-15", "A", 110.0),
        ("2020-03-15", "A", 120.0),
        ("2020-04-15", "A", 130.0),
    ]);
    let options = SummarizeOptions::new("order_date", "total_price")
        .with_frequency(Frequency::MonthStart);
    let wide = summarize(&data, &options).unwrap().into_wide().unwrap();
    let result = forecast_all(&wide, &ForecastConfig::new(2, 12)).unwrap();

    let records = result.records();
    assert_eq!(records.len(), 6);
    assert!(records[..4]
        .iter()
        .all(|r| r.value.is_some() && r.prediction.is_none()));
    assert!(records[4..]
        .iter()
        .all(|r| r.value.is_none() && r.prediction.is_some()));
    assert_eq!(records[5].date.to_string(), "2020-06-01");
}

#[test]
fn two_groups_forecast_separately() {
    let wide = summarize(&two_group_orders(), &monthly_by_category())
        .unwrap()
        .into_wide()
        .unwrap();
    assert_eq!(wide.n_series(), 2);

    let result = forecast_all(&wide, &ForecastConfig::new(3, 1)).unwrap();
    let keys: BTreeSet<String> = result.keys().iter().map(|k| k.to_string()).collect();
    assert_eq!(keys, BTreeSet::from(["A".to_string(), "B".to_string()]));

    for key in ["A", "B"] {
        let key = GroupKey::from(key);
        let rows: Vec<_> = result.records_for(&key).collect();
        assert_eq!(rows.len(), 7);
        assert_eq!(rows.iter().filter(|r| r.is_forecast()).count(), 3);
    }

    let json = result.to_json_value().unwrap();
    let groups: BTreeSet<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|row| row["category_1"].as_str())
        .collect();
    assert_eq!(groups, BTreeSet::from(["A", "B"]));
}

#[test]
fn bare_value_column_matches_single_element_list() {
    let data = two_group_orders();
    let bare = summarize(&data, &monthly_by_category()).unwrap();
    let listed = summarize(
        &data,
        &SummarizeOptions::new("order_date", vec!["total_price"])
            .with_groups(vec!["category_1"])
            .with_frequency(Frequency::MonthStart),
    )
    .unwrap();
    assert_eq!(bare, listed);
}

#[test]
fn summarize_is_idempotent() {
    let data = two_group_orders();
    let options = monthly_by_category();
    let first = summarize(&data, &options).unwrap();
    let second = summarize(&data, &options).unwrap();
    assert_eq!(first, second);
}

#[test]
fn wide_series_count_is_groups_times_values() {
    let mut data = two_group_orders();
    let quantity: Vec<Option<f64>> = (0..data.n_rows()).map(|i| Some(i as f64)).collect();
    data.insert("quantity", Column::Float(quantity)).unwrap();

    let options = SummarizeOptions::new("order_date", ["total_price", "quantity"])
        .with_groups("category_1")
        .with_frequency(Frequency::MonthStart);
    let wide = summarize(&data, &options).unwrap().into_wide().unwrap();
    assert_eq!(wide.n_series(), 4);
}

#[test]
fn intervals_bracket_predictions_for_any_alpha() {
    let wide = summarize(&two_group_orders(), &monthly_by_category())
        .unwrap()
        .into_wide()
        .unwrap();
    for alpha in [0.01, 0.05, 0.2, 0.5, 0.9] {
        let config = ForecastConfig::new(4, 1).with_alpha(alpha);
        let result = forecast_all(&wide, &config).unwrap();
        for r in result.records().iter().filter(|r| r.is_forecast()) {
            let (lo, p, hi) = (r.ci_lo.unwrap(), r.prediction.unwrap(), r.ci_hi.unwrap());
            assert!(lo <= p && p <= hi, "alpha {}: {} <= {} <= {}", alpha, lo, p, hi);
        }
    }
}

#[test]
fn seasonal_groups_select_arima_models() {
    let months = 48;
    let wide = summarize(&monthly_orders(months, seasonal_level), &monthly_by_category())
        .unwrap()
        .into_wide()
        .unwrap();
    assert_eq!(wide.axis().len(), months);

    let horizon = 12;
    let result = forecast_all(&wide, &ForecastConfig::new(horizon, 12)).unwrap();
    assert_eq!(result.models().len(), 2);
    for model in result.models() {
        assert!(model.model_name.contains("ARIMA"), "{}", model.model_name);
    }
    for key in ["Mountain", "Road"] {
        let group_key = GroupKey::from(key);
        let rows: Vec<_> = result.records_for(&group_key).collect();
        assert_eq!(rows.len(), months + horizon);
        for r in rows.iter().filter(|r| r.is_forecast()) {
            let (lo, p, hi) = (r.ci_lo.unwrap(), r.prediction.unwrap(), r.ci_hi.unwrap());
            assert!(p.is_finite());
            assert!(lo <= p && p <= hi, "{}: {} <= {} <= {}", key, lo, p, hi);
        }
    }
}

#[test]
fn zero_sales_group_does_not_abort_the_batch() {
    let level = |group: &str, m: usize| if group == "Road" { 0.0 } else { seasonal_level(group, m) };
    let wide = summarize(&monthly_orders(36, level), &monthly_by_category())
        .unwrap()
        .into_wide()
        .unwrap();

    let config = ForecastConfig::new(6, 12).with_suppress_warnings(true);
    let result = forecast_all(&wide, &config).unwrap();
    assert!(result.failures().is_empty());

    let road = result
        .models()
        .iter()
        .find(|m| m.key == GroupKey::from("Road"))
        .unwrap();
    assert_eq!(road.model_name, "Naive");
    let road_key = GroupKey::from("Road");
    let flat: Vec<_> = result
        .records_for(&road_key)
        .filter(|r| r.is_forecast())
        .collect();
    assert_eq!(flat.len(), 6);
    assert!(flat.iter().all(|r| r.prediction == Some(0.0)));
}

#[test]
fn failure_policy_controls_partial_results() {
    let mut rows = vec![("2011-01-02", "C", 9.0)];
    rows.extend([
        ("2011-01-07", "A", 100.0),
        ("2011-02-03", "A", 120.0),
        ("2011-03-15", "A", 130.0),
        ("2011-04-01", "A", 150.0),
    ]);
    let options = monthly_by_category().with_fill(FillValue::Missing);
    let wide = summarize(&orders(&rows), &options)
        .unwrap()
        .into_wide()
        .unwrap();

    let err = forecast_all(&wide, &ForecastConfig::new(2, 1)).unwrap_err();
    assert_eq!(err, SalescastError::InsufficientData { needed: 2, got: 1 });

    let config = ForecastConfig::new(2, 1).with_failure_policy(FailurePolicy::Isolate);
    let result = forecast_all(&wide, &config).unwrap();
    assert_eq!(result.failures().len(), 1);
    assert_eq!(result.failures()[0].key, GroupKey::from("C"));
    assert_eq!(result.len(), 6);
    assert_eq!(result.models().len(), 1);
}

#[test]
fn parallel_matches_sequential() {
    let wide = summarize(&two_group_orders(), &monthly_by_category())
        .unwrap()
        .into_wide()
        .unwrap();
    let sequential = forecast_all(&wide, &ForecastConfig::new(3, 1)).unwrap();
    let parallel = forecast_all(&wide, &ForecastConfig::new(3, 1).with_parallel(true)).unwrap();
    assert_eq!(sequential, parallel);
}

#[test]
fn collected_orders_feed_the_forecaster() {
    let floats = |v: &[f64]| Column::Float(v.iter().map(|x| Some(*x)).collect());
    let text = |v: &[&str]| Column::Text(v.iter().map(|s| Some(s.to_string())).collect());

    let orderlines = Table::new()
        .with_column("order.id", floats(&[1.0, 2.0, 3.0, 4.0]))
        .unwrap()
        .with_column("order.line", floats(&[1.0, 1.0, 1.0, 1.0]))
        .unwrap()
        .with_column(
            "order.date",
            text(&["2011-01-07", "2011-02-10", "2011-03-03", "2011-04-20"]),
        )
        .unwrap()
        .with_column("customer.id", floats(&[1.0, 1.0, 1.0, 1.0]))
        .unwrap()
        .with_column("product.id", floats(&[7.0, 7.0, 7.0, 7.0]))
        .unwrap()
        .with_column("quantity", floats(&[1.0, 2.0, 3.0, 4.0]))
        .unwrap();
    let bikes = Table::new()
        .with_column("bike.id", floats(&[7.0]))
        .unwrap()
        .with_column("model", text(&["Synapse Hi-Mod"]))
        .unwrap()
        .with_column("description", text(&["Road - Endurance Road - Carbon"]))
        .unwrap()
        .with_column("price", floats(&[1000.0]))
        .unwrap();
    let bikeshops = Table::new()
        .with_column("bikeshop.id", floats(&[1.0]))
        .unwrap()
        .with_column("bikeshop.name", text(&["Pittsburgh Mountain Machines"]))
        .unwrap()
        .with_column("location", text(&["Pittsburgh, PA"]))
        .unwrap();

    let data = collect_data(&orderlines, &bikes, &bikeshops).unwrap();
    let options = SummarizeOptions::new("order_date", "total_price")
        .with_groups("category_1")
        .with_frequency(Frequency::QuarterStart);
    let wide = summarize(&data, &options).unwrap().into_wide().unwrap();
    assert_eq!(wide.series()[0].values, vec![Some(6000.0), Some(4000.0)]);

    let result = forecast_all(&wide, &ForecastConfig::new(2, 4)).unwrap();
    assert_eq!(result.len(), 4);
    assert_eq!(result.group_columns(), &["category_1".to_string()]);
}
