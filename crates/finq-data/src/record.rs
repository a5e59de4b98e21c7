//! Provider-agnostic records
//!
//! Adapters are the only code that sees provider payloads; everything they
//! hand back is a [`NormalizedRecord`] built from the closed [`FieldValue`]
//! vocabulary below.

use crate::key::ProviderFamily;
use cached::CanExpire;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// One dated observation in a series; `value` is `None` when the provider
/// reported the period without a number
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

impl Point {
    pub fn new(date: NaiveDate, value: Option<f64>) -> Self {
        Self {
            date,
            value: value.filter(|v| v.is_finite()),
        }
    }
}

/// Normalized field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    Number(f64),
    Integer(i64),
    Text(String),
    Date(NaiveDate),
    List(Vec<String>),
    /// Points in ascending date order
    Series(Vec<Point>),
    /// The provider did not supply this field
    Absent,
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Number(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(v) => f.write_str(&format_number(*v)),
            FieldValue::Integer(v) => write!(f, "{v}"),
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            FieldValue::List(items) => f.write_str(&items.join("; ")),
            FieldValue::Series(points) => {
                let rendered: Vec<String> = points.iter().map(format_point).collect();
                f.write_str(&rendered.join(", "))
            },
            FieldValue::Absent => f.write_str("n/a"),
        }
    }
}

pub(crate) fn format_point(point: &Point) -> String {
    match point.value {
        Some(v) => format!("{}={}", point.date.format("%Y-%m-%d"), format_number(v)),
        None => format!("{}=n/a", point.date.format("%Y-%m-%d")),
    }
}

/// Compact, deterministic number formatting
///
/// Large magnitudes get a T/B/M suffix, everything else at most four decimals
/// with trailing zeros removed.
pub fn format_number(value: f64) -> String {
    let abs = value.abs();
    let (scaled, suffix) = if abs >= 1e12 {
        (value / 1e12, "T")
    } else if abs >= 1e9 {
        (value / 1e9, "B")
    } else if abs >= 1e6 {
        (value / 1e6, "M")
    } else {
        (value, "")
    };

    let digits = if suffix.is_empty() { 4 } else { 2 };
    let mut text = format!("{scaled:.digits$}");
    if text.contains('.') {
        while text.ends_with('0') {
            text.pop();
        }
        if text.ends_with('.') {
            text.pop();
        }
    }
    if text == "-0" {
        text = "0".to_string();
    }
    text.push_str(suffix);
    text
}

/// One fetched unit, immutable once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    source: ProviderFamily,
    provider: String,
    entity: String,
    fields: BTreeMap<String, FieldValue>,
    fetched_at: DateTime<Utc>,
    ttl_expires_at: DateTime<Utc>,
}

impl NormalizedRecord {
    /// Start building a record fetched now
    pub fn builder(
        source: ProviderFamily,
        provider: impl Into<String>,
        entity: impl Into<String>,
    ) -> RecordBuilder {
        RecordBuilder {
            source,
            provider: provider.into(),
            entity: entity.into(),
            fields: BTreeMap::new(),
            fetched_at: Utc::now(),
        }
    }

    pub fn source(&self) -> ProviderFamily {
        self.source
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn ttl_expires_at(&self) -> DateTime<Utc> {
        self.ttl_expires_at
    }

    /// Copy of this record that expires `ttl` after it was fetched
    pub fn expiring_after(mut self, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        self.ttl_expires_at = self
            .fetched_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.ttl_expires_at
    }

    /// Age relative to `now`, zero if the clock went backwards
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or_default()
    }
}

impl CanExpire for NormalizedRecord {
    fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Builder for [`NormalizedRecord`]
///
/// Every setter takes an `Option` so adapters can pass provider fields
/// straight through; `None` becomes an explicit [`FieldValue::Absent`].
#[derive(Debug)]
pub struct RecordBuilder {
    source: ProviderFamily,
    provider: String,
    entity: String,
    fields: BTreeMap<String, FieldValue>,
    fetched_at: DateTime<Utc>,
}

impl RecordBuilder {
    pub fn fetched_at(mut self, at: DateTime<Utc>) -> Self {
        self.fetched_at = at;
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: FieldValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn absent(self, name: impl Into<String>) -> Self {
        self.field(name, FieldValue::Absent)
    }

    pub fn number(self, name: impl Into<String>, value: Option<f64>) -> Self {
        let value = value
            .filter(|v| v.is_finite())
            .map_or(FieldValue::Absent, FieldValue::Number);
        self.field(name, value)
    }

    pub fn integer(self, name: impl Into<String>, value: Option<i64>) -> Self {
        self.field(name, value.map_or(FieldValue::Absent, FieldValue::Integer))
    }

    pub fn text<S: Into<String>>(self, name: impl Into<String>, value: Option<S>) -> Self {
        let value = value
            .map(Into::<String>::into)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map_or(FieldValue::Absent, FieldValue::Text);
        self.field(name, value)
    }

    pub fn date(self, name: impl Into<String>, value: Option<NaiveDate>) -> Self {
        self.field(name, value.map_or(FieldValue::Absent, FieldValue::Date))
    }

    /// Empty lists are recorded as absent
    pub fn list(self, name: impl Into<String>, items: Vec<String>) -> Self {
        let value = if items.is_empty() {
            FieldValue::Absent
        } else {
            FieldValue::List(items)
        };
        self.field(name, value)
    }

    /// Points are sorted ascending by date; an empty series is absent
    pub fn series(self, name: impl Into<String>, mut points: Vec<Point>) -> Self {
        let value = if points.is_empty() {
            FieldValue::Absent
        } else {
            points.sort_by_key(|p| p.date);
            FieldValue::Series(points)
        };
        self.field(name, value)
    }

    /// Make sure each of `names` exists, inserting `Absent` where missing
    pub fn ensure_fields<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            self.fields
                .entry(name.to_string())
                .or_insert(FieldValue::Absent);
        }
        self
    }

    /// Finish the record; it is born expired until stamped with a TTL
    pub fn build(self) -> NormalizedRecord {
        NormalizedRecord {
            source: self.source,
            provider: self.provider,
            entity: self.entity,
            fields: self.fields,
            fetched_at: self.fetched_at,
            ttl_expires_at: self.fetched_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_missing_values_are_absent() {
        let record = NormalizedRecord::builder(ProviderFamily::Market, "yahoo", "AAPL")
            .number("close", None)
            .number("open", Some(f64::NAN))
            .text("name", Some("   "))
            .list("filings", vec![])
            .series("closes", vec![])
            .build();

        for field in ["close", "open", "name", "filings", "closes"] {
            assert_eq!(record.get(field), Some(&FieldValue::Absent), "{field}");
        }
    }

    #[test]
    fn test_ensure_fields_keeps_existing() {
        let record = NormalizedRecord::builder(ProviderFamily::Macro, "fred", "UNRATE")
            .number("latest_value", Some(4.1))
            .ensure_fields(["latest_value", "units"])
            .build();

        assert_eq!(record.get("latest_value"), Some(&FieldValue::Number(4.1)));
        assert_eq!(record.get("units"), Some(&FieldValue::Absent));
    }

    #[test]
    fn test_series_sorted() {
        let record = NormalizedRecord::builder(ProviderFamily::Macro, "fred", "UNRATE")
            .series(
                "observations",
                vec![
                    Point::new(date(2025, 3, 1), Some(4.2)),
                    Point::new(date(2025, 1, 1), Some(4.0)),
                ],
            )
            .build();

        let Some(FieldValue::Series(points)) = record.get("observations") else {
            panic!("expected series");
        };
        assert_eq!(points[0].date, date(2025, 1, 1));
    }

    #[test]
    fn test_expiry() {
        let fetched = Utc::now() - chrono::Duration::seconds(10);
        let record = NormalizedRecord::builder(ProviderFamily::Macro, "fred", "UNRATE")
            .fetched_at(fetched)
            .build();
        assert!(record.is_expired_at(fetched));

        let record = record.expiring_after(Duration::from_secs(60));
        assert!(!record.is_expired());
        assert!(record.is_expired_at(fetched + chrono::Duration::seconds(60)));
        assert_eq!(
            record.age_at(fetched + chrono::Duration::seconds(5)),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(4.1), "4.1");
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(0.123_456), "0.1235");
        assert_eq!(format_number(391_400_000_000.0), "391.4B");
        assert_eq!(format_number(-2_500_000.0), "-2.5M");
        assert_eq!(format_number(3.2e12), "3.2T");
        assert_eq!(format_number(-0.000_01), "0");
    }

    #[test]
    fn test_display_values() {
        assert_eq!(FieldValue::Absent.to_string(), "n/a");
        assert_eq!(FieldValue::Date(date(2025, 9, 27)).to_string(), "2025-09-27");
        assert_eq!(
            FieldValue::Series(vec![
                Point::new(date(2025, 1, 1), Some(4.0)),
                Point::new(date(2025, 2, 1), None),
            ])
            .to_string(),
            "2025-01-01=4, 2025-02-01=n/a"
        );
    }
}
