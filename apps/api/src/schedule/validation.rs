use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use serde::Deserialize;

use crate::models::schedule::{NewDynamicEntry, NewStaticEntry};
use crate::schedule::models::{DependencyRelation, Period};
use crate::schedule::store::DateWindow;

/// Body of `POST /api/v1/schedule` and `/preview`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpretBody {
    pub text: String,
    /// "Now" for relative phrases; its offset is the caller's wall clock.
    /// Defaults to the server clock in UTC.
    #[serde(default)]
    pub reference_instant: Option<DateTime<FixedOffset>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaticEntryRequest {
    #[serde(default)]
    pub original_input_text: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub starting_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ending_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub frequency_per_period: Option<i32>,
    pub frequency_period: Period,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDynamicEntryRequest {
    #[serde(default)]
    pub original_input_text: Option<String>,
    #[serde(default, alias = "descriptionOfEntry")]
    pub description: String,
    #[serde(default)]
    pub starting_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ending_datetime: Option<DateTime<Utc>>,
    #[serde(default)]
    pub frequency_per_period: Option<i32>,
    #[serde(default)]
    pub frequency_period: Option<Period>,
    #[serde(default)]
    pub dependency_name: Option<String>,
    #[serde(default)]
    pub dependency_type: Option<DependencyRelation>,
}

/// Query string of `GET /api/v1/schedule/entries`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub include_static: Option<bool>,
    pub include_dynamic: Option<bool>,
    pub include_resulting: Option<bool>,
}

pub fn validate_static_entry(
    user_uid: &str,
    req: CreateStaticEntryRequest,
) -> Result<NewStaticEntry, Vec<String>> {
    let mut errors = Vec::new();
    let description = required_description(&req.description, &mut errors);
    check_span(req.starting_datetime, req.ending_datetime, &mut errors);
    check_per_period(req.frequency_per_period, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewStaticEntry {
        user_uid: user_uid.to_string(),
        original_input_text: req.original_input_text,
        description,
        starting_datetime: req.starting_datetime,
        ending_datetime: req.ending_datetime,
        frequency_per_period: req.frequency_per_period,
        frequency_period: req.frequency_period,
    })
}

pub fn validate_dynamic_entry(
    user_uid: &str,
    req: CreateDynamicEntryRequest,
) -> Result<NewDynamicEntry, Vec<String>> {
    let mut errors = Vec::new();
    let description = required_description(&req.description, &mut errors);
    check_span(req.starting_datetime, req.ending_datetime, &mut errors);
    check_per_period(req.frequency_per_period, &mut errors);

    let dependency_name = req
        .dependency_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    if req.dependency_type.is_some() && dependency_name.is_none() {
        errors.push("Dependency name is required when dependency type is specified".to_string());
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewDynamicEntry {
        user_uid: user_uid.to_string(),
        original_input_text: req.original_input_text,
        description,
        starting_datetime: req.starting_datetime,
        ending_datetime: req.ending_datetime,
        frequency_per_period: req.frequency_per_period,
        frequency_period: req.frequency_period,
        dependency_name,
        dependency_type: req.dependency_type,
    })
}

/// Resolves `startDate`/`endDate` into a listing window. Each bound may be an
/// RFC 3339 instant or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_window(query: &ScheduleQuery) -> Result<DateWindow, Vec<String>> {
    let mut errors = Vec::new();
    let start = parse_bound("startDate", query.start_date.as_deref(), &mut errors);
    let end = parse_bound("endDate", query.end_date.as_deref(), &mut errors);

    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            errors.push("startDate must not be after endDate".to_string());
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(DateWindow { start, end })
}

fn parse_bound(
    field: &str,
    value: Option<&str>,
    errors: &mut Vec<String>,
) -> Option<DateTime<Utc>> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    match NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        Some(naive) => Some(Utc.from_utc_datetime(&naive)),
        None => {
            errors.push(format!("{field} '{value}' is not a valid date"));
            None
        }
    }
}

fn required_description(description: &str, errors: &mut Vec<String>) -> String {
    let description = description.trim();
    if description.is_empty() {
        errors.push("Description is required".to_string());
    }
    description.to_string()
}

fn check_span(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    errors: &mut Vec<String>,
) {
    if let (Some(start), Some(end)) = (start, end) {
        if start >= end {
            errors.push("Starting datetime must be before ending datetime".to_string());
        }
    }
}

fn check_per_period(per_period: Option<i32>, errors: &mut Vec<String>) {
    if per_period.is_some_and(|n| n < 1) {
        errors.push("Frequency per period must be at least 1".to_string());
    }
}
