//! Missing value handling for aggregated buckets and model inputs.

/// What to put in buckets that received no observations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FillValue {
    /// Replace missing buckets with a constant.
    Value(f64),
    /// Leave missing buckets as missing.
    Missing,
}

impl Default for FillValue {
    fn default() -> Self {
        FillValue::Value(0.0)
    }
}

impl From<f64> for FillValue {
    fn from(value: f64) -> Self {
        FillValue::Value(value)
    }
}

impl From<Option<f64>> for FillValue {
    fn from(value: Option<f64>) -> Self {
        value.map(FillValue::Value).unwrap_or(FillValue::Missing)
    }
}

/// Apply a fill policy to every missing cell.
pub fn apply_fill(values: &mut [Option<f64>], fill: FillValue) {
    if let FillValue::Value(v) = fill {
        for cell in values.iter_mut().filter(|c| c.is_none()) {
            *cell = Some(v);
        }
    }
}

/// Fill NULL values with linear interpolation.
///
/// Leading and trailing NULLs take the nearest observed value. An all-NULL
/// input yields all NaN.
pub fn fill_nulls_interpolate(values: &[Option<f64>]) -> Vec<f64> {
    if values.is_empty() {
        return vec![];
    }

    let mut result: Vec<f64> = vec![f64::NAN; values.len()];

    let (first, last) = match (
        values.iter().position(|v| v.is_some()),
        values.iter().rposition(|v| v.is_some()),
    ) {
        (Some(first), Some(last)) => (first, last),
        _ => return result,
    };

    let mut prev_idx = first;
    let mut prev_val = match values[first] {
        Some(v) => v,
        None => return result,
    };

    for item in result.iter_mut().take(first + 1) {
        *item = prev_val;
    }

    for i in (first + 1)..=last {
        if let Some(v) = values[i] {
            let gap = i - prev_idx;
            if gap > 1 {
                let slope = (v - prev_val) / gap as f64;
                for j in 1..gap {
                    result[prev_idx + j] = prev_val + slope * j as f64;
                }
            }
            result[i] = v;
            prev_idx = i;
            prev_val = v;
        }
    }

    for item in result.iter_mut().skip(last + 1) {
        *item = prev_val;
    }

    result
}
