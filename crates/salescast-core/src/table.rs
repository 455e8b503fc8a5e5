//! A small owned columnar table used as the tabular feed.

use crate::error::{Result, SalescastError};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

/// One typed column. Every cell may be missing.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Timestamp(Vec<Option<NaiveDateTime>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Timestamp(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Column::Timestamp(_) => "timestamp",
            Column::Float(_) => "float",
            Column::Text(_) => "text",
        }
    }

    /// Cell rendered as a grouping key component; missing cells become `""`.
    pub fn key_at(&self, row: usize) -> String {
        match self {
            Column::Timestamp(v) => v[row].map(|d| d.to_string()).unwrap_or_default(),
            Column::Float(v) => v[row].map(|x| x.to_string()).unwrap_or_default(),
            Column::Text(v) => v[row].clone().unwrap_or_default(),
        }
    }

    fn take(&self, rows: &[Option<usize>]) -> Column {
        match self {
            Column::Timestamp(v) => {
                Column::Timestamp(rows.iter().map(|r| r.and_then(|i| v[i])).collect())
            }
            Column::Float(v) => Column::Float(rows.iter().map(|r| r.and_then(|i| v[i])).collect()),
            Column::Text(v) => {
                Column::Text(rows.iter().map(|r| r.and_then(|i| v[i].clone())).collect())
            }
        }
    }
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Parse a date or datetime string in one of the accepted layouts.
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// An ordered collection of equally long named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    names: Vec<String>,
    columns: Vec<Column>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, replacing any existing column of the same name.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        self.insert(name, column)?;
        Ok(self)
    }

    /// Insert or replace a column in place.
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<()> {
        let name = name.into();
        if let Some(first) = self.columns.first() {
            if first.len() != column.len() {
                return Err(SalescastError::InvalidInput(format!(
                    "Column '{}' has {} rows but table has {}",
                    name,
                    column.len(),
                    first.len()
                )));
            }
        }
        match self.names.iter().position(|n| *n == name) {
            Some(i) => self.columns[i] = column,
            None => {
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(())
    }

    pub fn n_rows(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| &self.columns[i])
    }

    /// Look up a column, failing with [`SalescastError::MissingColumn`].
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name)
            .ok_or_else(|| SalescastError::MissingColumn(name.to_string()))
    }

    /// Float cells of a numeric column.
    pub fn floats(&self, name: &str) -> Result<&[Option<f64>]> {
        match self.require(name)? {
            Column::Float(v) => Ok(v),
            other => Err(SalescastError::TypeMismatch {
                column: name.to_string(),
                expected: "float".into(),
                found: other.type_name().into(),
            }),
        }
    }

    /// Text cells of a string column.
    pub fn texts(&self, name: &str) -> Result<&[Option<String>]> {
        match self.require(name)? {
            Column::Text(v) => Ok(v),
            other => Err(SalescastError::TypeMismatch {
                column: name.to_string(),
                expected: "text".into(),
                found: other.type_name().into(),
            }),
        }
    }

    /// Timestamp view of a column, coercing text cells.
    ///
    /// A text cell that is present but unparseable, or a non-temporal column,
    /// is a [`SalescastError::TypeMismatch`].
    pub fn timestamps(&self, name: &str) -> Result<Vec<Option<NaiveDateTime>>> {
        let mismatch = |found: &str| SalescastError::TypeMismatch {
            column: name.to_string(),
            expected: "timestamp".into(),
            found: found.to_string(),
        };
        match self.require(name)? {
            Column::Timestamp(v) => Ok(v.clone()),
            Column::Text(v) => v
                .iter()
                .map(|cell| match cell {
                    None => Ok(None),
                    Some(s) => parse_datetime(s)
                        .map(Some)
                        .ok_or_else(|| mismatch(&format!("text ('{}')", s))),
                })
                .collect(),
            other => Err(mismatch(other.type_name())),
        }
    }

    /// A new table holding only `names`, in that order.
    pub fn select(&self, names: &[&str]) -> Result<Table> {
        let mut out = Table::new();
        for name in names {
            out.insert(*name, self.require(name)?.clone())?;
        }
        Ok(out)
    }

    /// Rename every column through `f`.
    pub fn rename_with(mut self, f: impl Fn(&str) -> String) -> Self {
        self.names = self.names.iter().map(|n| f(n)).collect();
        self
    }

    /// Left join on `left_on = right_on`.
    ///
    /// Keeps every left row in order; the first matching right row wins and
    /// unmatched rows get missing right-hand cells. Right columns whose name
    /// already exists on the left are skipped.
    pub fn left_join(&self, right: &Table, left_on: &str, right_on: &str) -> Result<Table> {
        let left_key = self.require(left_on)?;
        let right_key = right.require(right_on)?;

        let mut index: HashMap<String, usize> = HashMap::new();
        for row in 0..right.n_rows() {
            index.entry(right_key.key_at(row)).or_insert(row);
        }

        let matches: Vec<Option<usize>> = (0..self.n_rows())
            .map(|row| index.get(&left_key.key_at(row)).copied())
            .collect();

        let mut out = self.clone();
        for (name, column) in right.names.iter().zip(&right.columns) {
            if out.column(name).is_none() {
                out.insert(name.clone(), column.take(&matches))?;
            }
        }
        Ok(out)
    }
}
