use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::models::schedule::{NewDynamicEntry, NewStaticEntry};

/// Static entries have a fixed or fully regular timing; dynamic entries are
/// flexible goals placed around other activities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Day,
    Week,
    Month,
    Year,
    Never,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day => "day",
            Period::Week => "week",
            Period::Month => "month",
            Period::Year => "year",
            Period::Never => "never",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyRelation {
    Before,
    After,
    During,
    NotSameDay,
    SameDay,
    NotSameWeek,
    SameWeek,
    NotSameMonth,
    SameMonth,
}

impl DependencyRelation {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyRelation::Before => "before",
            DependencyRelation::After => "after",
            DependencyRelation::During => "during",
            DependencyRelation::NotSameDay => "not_same_day",
            DependencyRelation::SameDay => "same_day",
            DependencyRelation::NotSameWeek => "not_same_week",
            DependencyRelation::SameWeek => "same_week",
            DependencyRelation::NotSameMonth => "not_same_month",
            DependencyRelation::SameMonth => "same_month",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frequency {
    pub per_period: u32,
    pub period: Period,
}

impl Frequency {
    /// A `never` period describes a one-off, not a recurrence target.
    pub fn is_recurring(&self) -> bool {
        self.period != Period::Never
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    #[serde(rename = "type")]
    pub relation: DependencyRelation,
}

/// One validated, classified entry produced by the interpreter.
///
/// Datetimes are wall-clock values local to the request's reference offset.
/// Serializes to the same field names the model is asked to emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEntryDescriptor {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starting_datetime: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ending_datetime: Option<NaiveDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependency: Option<Dependency>,
}

/// A descriptor mapped onto the persisted entry shape it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum NewEntry {
    Static(NewStaticEntry),
    Dynamic(NewDynamicEntry),
}

impl ParsedEntryDescriptor {
    /// Maps this descriptor onto a persistence write for `user_uid`, keeping the
    /// original input text for context. Wall-clock times are pinned to `offset`.
    ///
    /// `None` when a datetime falls outside the representable range at `offset`
    /// or the frequency count does not fit the column.
    pub fn to_new_entry(
        &self,
        user_uid: &str,
        original_text: &str,
        offset: &FixedOffset,
    ) -> Option<NewEntry> {
        let starting_datetime = self
            .starting_datetime
            .map(|dt| localize(dt, offset).ok_or(()))
            .transpose()
            .ok()?;
        let ending_datetime = self
            .ending_datetime
            .map(|dt| localize(dt, offset).ok_or(()))
            .transpose()
            .ok()?;
        let frequency_per_period = self
            .frequency
            .as_ref()
            .map(|f| i32::try_from(f.per_period))
            .transpose()
            .ok()?;

        match self.kind {
            EntryKind::Static => Some(NewEntry::Static(NewStaticEntry {
                user_uid: user_uid.to_string(),
                original_input_text: Some(original_text.to_string()),
                description: self.description.clone(),
                starting_datetime,
                ending_datetime,
                frequency_per_period,
                frequency_period: self
                    .frequency
                    .as_ref()
                    .map(|f| f.period)
                    .unwrap_or(Period::Never),
            })),
            EntryKind::Dynamic => Some(NewEntry::Dynamic(NewDynamicEntry {
                user_uid: user_uid.to_string(),
                original_input_text: Some(original_text.to_string()),
                description: self.description.clone(),
                starting_datetime,
                ending_datetime,
                frequency_per_period,
                frequency_period: self.frequency.as_ref().map(|f| f.period),
                dependency_name: self.dependency.as_ref().map(|d| d.name.clone()),
                dependency_type: self.dependency.as_ref().map(|d| d.relation),
            })),
        }
    }
}

/// Interprets a wall-clock datetime in `offset` and returns the UTC instant,
/// or `None` when the shift leaves chrono's range.
pub fn localize(naive: NaiveDateTime, offset: &FixedOffset) -> Option<DateTime<Utc>> {
    let shift = chrono::Duration::seconds(i64::from(offset.local_minus_utc()));
    naive
        .checked_sub_signed(shift)
        .map(|utc| Utc.from_utc_datetime(&utc))
}

// ────────────────────────────────────────────────────────────────────────────
// Wire format emitted by the model
// ────────────────────────────────────────────────────────────────────────────

/// Top-level object the model must return: `{ "entries": [...] }`.
#[derive(Debug, Deserialize)]
pub struct RawScheduleResponse {
    pub entries: Vec<RawEntry>,
}

/// An entry as the model wrote it. Datetimes stay strings until validation so a
/// bad value is reported as a schema violation with the field name.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntry {
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub description: String,
    #[serde(default)]
    pub starting_datetime: Option<String>,
    #[serde(default)]
    pub ending_datetime: Option<String>,
    #[serde(default)]
    pub frequency: Option<RawFrequency>,
    #[serde(default)]
    pub dependency: Option<RawDependency>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawFrequency {
    pub per_period: i64,
    pub period: Period,
}

#[derive(Debug, Deserialize)]
pub struct RawDependency {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub relation: DependencyRelation,
}

/// Parses a model-emitted datetime into wall-clock time at `offset`.
///
/// Accepts naive ISO-8601 (`2025-05-19T18:00:00`, with or without seconds or
/// fraction), RFC 3339 with an explicit offset (converted into `offset`), and a
/// bare date, which is taken as midnight.
pub fn parse_model_datetime(value: &str, offset: &FixedOffset) -> Option<NaiveDateTime> {
    let value = value.trim();
    const NAIVE_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    for format in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(offset).naive_local());
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
