//! Offset frequencies, calendar bucket arithmetic and regular time axes.

use crate::error::{Result, SalescastError};
use chrono::{Datelike, Duration, Months, NaiveDateTime, NaiveTime, Timelike, Weekday};
use std::fmt;
use std::str::FromStr;

/// A regular bucketing interval, parsed from a pandas-style offset string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Frequency {
    Hourly,
    #[default]
    Daily,
    /// Weeks ending on the given weekday (`W` = `W-SUN`).
    Weekly(Weekday),
    MonthStart,
    MonthEnd,
    QuarterStart,
    QuarterEnd,
    YearStart,
    YearEnd,
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_ascii_uppercase().as_str() {
        "MON" => Some(Weekday::Mon),
        "TUE" => Some(Weekday::Tue),
        "WED" => Some(Weekday::Wed),
        "THU" => Some(Weekday::Thu),
        "FRI" => Some(Weekday::Fri),
        "SAT" => Some(Weekday::Sat),
        "SUN" => Some(Weekday::Sun),
        _ => None,
    }
}

impl FromStr for Frequency {
    type Err = SalescastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "H" => return Ok(Frequency::Hourly),
            "D" => return Ok(Frequency::Daily),
            "W" => return Ok(Frequency::Weekly(Weekday::Sun)),
            "MS" => return Ok(Frequency::MonthStart),
            "M" | "ME" => return Ok(Frequency::MonthEnd),
            "QS" => return Ok(Frequency::QuarterStart),
            "Q" | "QE" => return Ok(Frequency::QuarterEnd),
            "YS" | "AS" => return Ok(Frequency::YearStart),
            "Y" | "A" | "YE" => return Ok(Frequency::YearEnd),
            _ => {}
        }

        let lower = s.trim().to_lowercase();
        if let Some(day) = lower.strip_prefix("w-") {
            return parse_weekday(day)
                .map(Frequency::Weekly)
                .ok_or_else(|| SalescastError::InvalidFrequency(s.to_string()));
        }

        match lower.as_str() {
            "h" | "hour" | "hourly" => Ok(Frequency::Hourly),
            "d" | "day" | "daily" => Ok(Frequency::Daily),
            "w" | "week" | "weekly" => Ok(Frequency::Weekly(Weekday::Sun)),
            "ms" | "month_start" => Ok(Frequency::MonthStart),
            "m" | "me" | "month" | "monthly" | "month_end" => Ok(Frequency::MonthEnd),
            "qs" | "quarter_start" => Ok(Frequency::QuarterStart),
            "q" | "qe" | "quarter" | "quarterly" | "quarter_end" => Ok(Frequency::QuarterEnd),
            "ys" | "as" | "year_start" => Ok(Frequency::YearStart),
            "y" | "a" | "ye" | "year" | "yearly" | "annual" | "year_end" => {
                Ok(Frequency::YearEnd)
            }
            _ => Err(SalescastError::InvalidFrequency(s.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::Hourly => write!(f, "H"),
            Frequency::Daily => write!(f, "D"),
            Frequency::Weekly(day) => write!(f, "W-{}", day.to_string().to_uppercase()),
            Frequency::MonthStart => write!(f, "MS"),
            Frequency::MonthEnd => write!(f, "M"),
            Frequency::QuarterStart => write!(f, "QS"),
            Frequency::QuarterEnd => write!(f, "Q"),
            Frequency::YearStart => write!(f, "YS"),
            Frequency::YearEnd => write!(f, "Y"),
        }
    }
}

fn midnight(dt: NaiveDateTime) -> NaiveDateTime {
    dt.date().and_time(NaiveTime::MIN)
}

fn month_index(dt: NaiveDateTime) -> i64 {
    dt.year() as i64 * 12 + dt.month0() as i64
}

impl Frequency {
    /// Calendar months per bucket, `None` for fixed-length frequencies.
    fn months(&self) -> Option<u32> {
        match self {
            Frequency::MonthStart | Frequency::MonthEnd => Some(1),
            Frequency::QuarterStart | Frequency::QuarterEnd => Some(3),
            Frequency::YearStart | Frequency::YearEnd => Some(12),
            _ => None,
        }
    }

    /// Whether timestamp labels sit on the last day of the bucket.
    pub fn is_end_anchored(&self) -> bool {
        matches!(
            self,
            Frequency::Weekly(_) | Frequency::MonthEnd | Frequency::QuarterEnd | Frequency::YearEnd
        )
    }

    /// Start instant of the bucket containing `dt`.
    pub fn bucket_start(&self, dt: NaiveDateTime) -> NaiveDateTime {
        match self {
            Frequency::Hourly => dt
                .with_minute(0)
                .and_then(|d| d.with_second(0))
                .and_then(|d| d.with_nanosecond(0))
                .unwrap_or(dt),
            Frequency::Daily => midnight(dt),
            Frequency::Weekly(end) => {
                let date = dt.date();
                let until_end = (end.num_days_from_monday() + 7
                    - date.weekday().num_days_from_monday())
                    % 7;
                midnight(dt) + Duration::days(until_end as i64 - 6)
            }
            Frequency::MonthStart | Frequency::MonthEnd => {
                midnight(dt.with_day(1).unwrap_or(dt))
            }
            Frequency::QuarterStart | Frequency::QuarterEnd => {
                let quarter_month = (dt.month0() / 3) * 3 + 1;
                midnight(
                    dt.with_day(1)
                        .and_then(|d| d.with_month(quarter_month))
                        .unwrap_or(dt),
                )
            }
            Frequency::YearStart | Frequency::YearEnd => midnight(
                dt.with_day(1)
                    .and_then(|d| d.with_month(1))
                    .unwrap_or(dt),
            ),
        }
    }

    /// Move a bucket start `steps` buckets forward (or backward when negative).
    pub fn shift(&self, start: NaiveDateTime, steps: i64) -> Option<NaiveDateTime> {
        match self.months() {
            Some(months) => {
                let total = months as i64 * steps;
                let delta = Months::new(u32::try_from(total.unsigned_abs()).ok()?);
                if total >= 0 {
                    start.checked_add_months(delta)
                } else {
                    start.checked_sub_months(delta)
                }
            }
            None => {
                let step = match self {
                    Frequency::Hourly => Duration::try_hours(steps)?,
                    Frequency::Daily => Duration::try_days(steps)?,
                    _ => Duration::try_weeks(steps)?,
                };
                start.checked_add_signed(step)
            }
        }
    }

    /// Number of buckets from bucket start `from` to bucket start `to`.
    pub fn steps_between(&self, from: NaiveDateTime, to: NaiveDateTime) -> i64 {
        match self.months() {
            Some(months) => (month_index(to) - month_index(from)) / months as i64,
            None => match self {
                Frequency::Hourly => (to - from).num_hours(),
                Frequency::Daily => (to - from).num_days(),
                _ => (to - from).num_days() / 7,
            },
        }
    }

    /// Timestamp label of a bucket: its start, or its last day for end-anchored offsets.
    pub fn timestamp_label(&self, start: NaiveDateTime) -> NaiveDateTime {
        if self.is_end_anchored() {
            self.shift(start, 1)
                .map(|next| next - Duration::days(1))
                .unwrap_or(start)
        } else {
            start
        }
    }

    fn format_period(&self, start: NaiveDateTime) -> String {
        match self {
            Frequency::Hourly => start.format("%Y-%m-%d %H:00").to_string(),
            Frequency::Daily => start.format("%Y-%m-%d").to_string(),
            Frequency::Weekly(_) => {
                let end = start + Duration::days(6);
                format!("{}/{}", start.format("%Y-%m-%d"), end.format("%Y-%m-%d"))
            }
            Frequency::MonthStart | Frequency::MonthEnd => start.format("%Y-%m").to_string(),
            Frequency::QuarterStart | Frequency::QuarterEnd => {
                format!("{}Q{}", start.year(), start.month0() / 3 + 1)
            }
            Frequency::YearStart | Frequency::YearEnd => start.format("%Y").to_string(),
        }
    }
}

/// Whether a time axis is made of anchored instants or labelled intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AxisKind {
    #[default]
    Timestamp,
    Period,
}

impl FromStr for AxisKind {
    type Err = SalescastError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "timestamp" | "ts" => Ok(AxisKind::Timestamp),
            "period" => Ok(AxisKind::Period),
            _ => Err(SalescastError::invalid_param(
                "axis_kind",
                s,
                "expected 'timestamp' or 'period'",
            )),
        }
    }
}

/// A labelled interval of a given frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Period {
    start: NaiveDateTime,
    frequency: Frequency,
}

impl Period {
    /// The period of `frequency` that contains `dt`.
    pub fn containing(dt: NaiveDateTime, frequency: Frequency) -> Self {
        Self {
            start: frequency.bucket_start(dt),
            frequency,
        }
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.frequency.format_period(self.start))
    }
}

/// The date of one row on a time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DateLabel {
    Timestamp(NaiveDateTime),
    Period(Period),
}

impl DateLabel {
    pub fn kind(&self) -> AxisKind {
        match self {
            DateLabel::Timestamp(_) => AxisKind::Timestamp,
            DateLabel::Period(_) => AxisKind::Period,
        }
    }

    /// Timestamp view of the label; periods convert to their start instant.
    pub fn to_timestamp(&self) -> NaiveDateTime {
        match self {
            DateLabel::Timestamp(ts) => *ts,
            DateLabel::Period(p) => p.start(),
        }
    }
}

impl fmt::Display for DateLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateLabel::Timestamp(ts) => {
                if ts.time() == NaiveTime::MIN {
                    write!(f, "{}", ts.format("%Y-%m-%d"))
                } else {
                    write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S"))
                }
            }
            DateLabel::Period(p) => write!(f, "{}", p),
        }
    }
}

impl serde::Serialize for DateLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A contiguous grid of buckets at one frequency.
///
/// The grid is stored as a first bucket plus a length, so it cannot contain
/// gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeAxis {
    frequency: Frequency,
    kind: AxisKind,
    start: NaiveDateTime,
    len: usize,
}

impl TimeAxis {
    /// Build an axis of `len` buckets beginning at the bucket containing `start`.
    pub fn new(frequency: Frequency, kind: AxisKind, start: NaiveDateTime, len: usize) -> Self {
        Self {
            frequency,
            kind,
            start: frequency.bucket_start(start),
            len,
        }
    }

    /// Smallest axis covering both `first` and `last`.
    pub fn spanning(
        frequency: Frequency,
        kind: AxisKind,
        first: NaiveDateTime,
        last: NaiveDateTime,
    ) -> Result<Self> {
        let (lo, hi) = if first <= last {
            (first, last)
        } else {
            (last, first)
        };
        let start = frequency.bucket_start(lo);
        let steps = frequency.steps_between(start, frequency.bucket_start(hi));
        let len = usize::try_from(steps + 1).map_err(|_| {
            SalescastError::ComputationError(format!(
                "Cannot span {} to {} at frequency {}",
                lo, hi, frequency
            ))
        })?;
        Ok(Self {
            frequency,
            kind,
            start,
            len,
        })
    }

    pub fn frequency(&self) -> Frequency {
        self.frequency
    }

    pub fn kind(&self) -> AxisKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Start instant of the `index`-th bucket.
    pub fn bucket(&self, index: usize) -> Option<NaiveDateTime> {
        if index >= self.len {
            return None;
        }
        self.frequency.shift(self.start, index as i64)
    }

    /// All bucket start instants, in order.
    pub fn buckets(&self) -> Vec<NaiveDateTime> {
        (0..self.len).map_while(|i| self.bucket(i)).collect()
    }

    /// Position of the bucket containing `dt`, if it lies on the axis.
    pub fn position(&self, dt: NaiveDateTime) -> Option<usize> {
        let steps = self
            .frequency
            .steps_between(self.start, self.frequency.bucket_start(dt));
        usize::try_from(steps).ok().filter(|&i| i < self.len)
    }

    fn label_for(&self, start: NaiveDateTime) -> DateLabel {
        match self.kind {
            AxisKind::Timestamp => DateLabel::Timestamp(self.frequency.timestamp_label(start)),
            AxisKind::Period => DateLabel::Period(Period::containing(start, self.frequency)),
        }
    }

    pub fn label(&self, index: usize) -> Option<DateLabel> {
        self.bucket(index).map(|start| self.label_for(start))
    }

    pub fn labels(&self) -> Vec<DateLabel> {
        self.buckets()
            .into_iter()
            .map(|start| self.label_for(start))
            .collect()
    }

    /// The same grid continued `extra` buckets past its end.
    pub fn extended(&self, extra: usize) -> Self {
        Self {
            len: self.len + extra,
            ..*self
        }
    }
}
