//! JSON export of forecast tables.

use crate::error::{Result, SalescastError};
use crate::forecast::{ForecastRecord, ForecastTable};
use serde_json::{Map, Value};

fn number(v: Option<f64>) -> Value {
    v.map(Value::from).unwrap_or(Value::Null)
}

impl ForecastTable {
    fn record_to_json(&self, record: &ForecastRecord) -> Result<Value> {
        let mut object = Map::new();
        for (name, part) in self.group_columns().iter().zip(record.key.parts()) {
            object.insert(name.clone(), Value::String(part.clone()));
        }
        object.insert("series".to_string(), Value::String(record.series.clone()));
        let date = serde_json::to_value(record.date)
            .map_err(|e| SalescastError::ComputationError(format!("date serialization: {}", e)))?;
        object.insert(self.date_column().to_string(), date);
        object.insert("value".to_string(), number(record.value));
        object.insert("prediction".to_string(), number(record.prediction));
        object.insert("ci_lo".to_string(), number(record.ci_lo));
        object.insert("ci_hi".to_string(), number(record.ci_hi));
        Ok(Value::Object(object))
    }

    /// Records as a JSON array, group fields flattened by column name.
    pub fn to_json_value(&self) -> Result<Value> {
        self.records()
            .iter()
            .map(|r| self.record_to_json(r))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array)
    }

    pub fn to_json(&self) -> Result<String> {
        let value = self.to_json_value()?;
        serde_json::to_string(&value)
            .map_err(|e| SalescastError::ComputationError(format!("JSON export: {}", e)))
    }
}
