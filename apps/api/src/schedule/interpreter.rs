//! Schedule interpreter: turns free-form activity text into classified entry descriptors.
//!
//! Flow: build_prompt → CompletionService::generate → strip fences → decode →
//!       validate + classify every entry → Vec<ParsedEntryDescriptor>.
//!
//! Stateless: holds only the completion seam and never touches a store. A batch
//! is accepted whole or rejected whole; one invalid entry fails the request.

use std::sync::Arc;

use chrono::{DateTime, Datelike, FixedOffset};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::llm_client::prompts::correction_hint;
use crate::llm_client::{strip_json_fences, CompletionService, LlmError};
use crate::schedule::models::{
    localize, parse_model_datetime, Dependency, EntryKind, Frequency, ParsedEntryDescriptor,
    RawEntry, RawScheduleResponse,
};
use crate::schedule::prompts::SCHEDULE_PARSE_PROMPT;

/// Re-prompts allowed after a schema violation. Undecodable output is never re-prompted.
const MAX_SCHEMA_REPROMPTS: u32 = 1;

/// Input to the interpreter. `reference_instant` is "now" for relative phrases;
/// its offset is the wall-clock zone the model's datetimes are read in.
#[derive(Debug, Clone)]
pub struct ScheduleRequest {
    pub text: String,
    pub reference_instant: DateTime<FixedOffset>,
}

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The completion service failed, or its output could not be decoded as JSON.
    /// `raw` carries the offending completion text when there was one.
    #[error("Upstream model error: {message}")]
    UpstreamModel {
        message: String,
        raw: Option<String>,
    },

    #[error("Schema validation error: {message}")]
    SchemaValidation { message: String, raw: String },

    #[error("Interpretation was cancelled")]
    Cancelled,
}

impl From<LlmError> for InterpretError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::MissingApiKey => InterpretError::Configuration(e.to_string()),
            LlmError::Cancelled => InterpretError::Cancelled,
            other => InterpretError::UpstreamModel {
                message: other.to_string(),
                raw: None,
            },
        }
    }
}

#[derive(Clone)]
pub struct Interpreter {
    completion: Arc<dyn CompletionService>,
}

impl Interpreter {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    /// Interprets `request.text` into schedule entry descriptors.
    ///
    /// Makes one completion call, plus at most one corrective re-prompt when the
    /// output decodes but violates the entry schema.
    pub async fn interpret(
        &self,
        request: &ScheduleRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<ParsedEntryDescriptor>, InterpretError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(InterpretError::Input("text cannot be empty".to_string()));
        }

        let offset = request.reference_instant.offset();
        let base_prompt = build_prompt(text, &request.reference_instant);
        let mut prompt = base_prompt.clone();
        let mut attempt = 0;

        loop {
            let raw = self.completion.generate(&prompt, cancel).await?;

            match parse_response(&raw, offset) {
                Ok(entries) => {
                    info!(
                        "Interpreted {} schedule entries ({} static, {} dynamic)",
                        entries.len(),
                        entries.iter().filter(|e| e.kind == EntryKind::Static).count(),
                        entries.iter().filter(|e| e.kind == EntryKind::Dynamic).count(),
                    );
                    return Ok(entries);
                }
                Err(InterpretError::SchemaValidation { message, raw })
                    if attempt < MAX_SCHEMA_REPROMPTS =>
                {
                    attempt += 1;
                    warn!(
                        "Interpretation attempt {}/{} violated the entry schema: {}; re-prompting",
                        attempt,
                        MAX_SCHEMA_REPROMPTS + 1,
                        message
                    );
                    debug!("Rejected completion: {raw}");
                    prompt = format!("{base_prompt}{}", correction_hint(&message));
                }
                Err(e) => {
                    if let InterpretError::UpstreamModel { raw: Some(raw), .. }
                    | InterpretError::SchemaValidation { raw, .. } = &e
                    {
                        warn!("Rejected completion: {raw}");
                    }
                    return Err(e);
                }
            }
        }
    }
}

/// Builds the interpretation prompt. Pure: identical inputs give identical prompts.
pub fn build_prompt(text: &str, reference_instant: &DateTime<FixedOffset>) -> String {
    SCHEDULE_PARSE_PROMPT
        .replace("{today}", &reference_instant.format("%Y-%m-%d").to_string())
        .replace("{weekday}", &reference_instant.format("%A").to_string())
        .replace(
            "{current_time}",
            &reference_instant.format("%H:%M:%S").to_string(),
        )
        // Last, so user text containing a placeholder is left alone.
        .replace("{text}", text)
}

/// Decodes, validates and classifies one completion.
///
/// Undecodable text → `UpstreamModel`; decodable JSON that breaks the entry
/// schema → `SchemaValidation`. Both carry the raw completion.
pub fn parse_response(
    raw: &str,
    offset: &FixedOffset,
) -> Result<Vec<ParsedEntryDescriptor>, InterpretError> {
    let cleaned = strip_json_fences(raw);

    let value: serde_json::Value =
        serde_json::from_str(cleaned).map_err(|e| InterpretError::UpstreamModel {
            message: format!("completion is not valid JSON: {e}"),
            raw: Some(raw.to_string()),
        })?;

    let response: RawScheduleResponse =
        serde_json::from_value(value).map_err(|e| InterpretError::SchemaValidation {
            message: format!("response does not match the entry schema: {e}"),
            raw: raw.to_string(),
        })?;

    response
        .entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            validate_entry(entry, offset).map_err(|reason| InterpretError::SchemaValidation {
                message: format!("entry {index}: {reason}"),
                raw: raw.to_string(),
            })
        })
        .collect()
}

fn validate_entry(
    entry: RawEntry,
    offset: &FixedOffset,
) -> Result<ParsedEntryDescriptor, String> {
    let description = entry.description.trim();
    if description.is_empty() {
        return Err("description is required".to_string());
    }

    let starting_datetime =
        parse_optional_datetime("startingDatetime", entry.starting_datetime, offset)?;
    let ending_datetime = parse_optional_datetime("endingDatetime", entry.ending_datetime, offset)?;

    match (starting_datetime, ending_datetime) {
        (None, Some(_)) => {
            return Err("endingDatetime given without startingDatetime".to_string());
        }
        (Some(start), Some(end)) if start >= end => {
            return Err("startingDatetime must be before endingDatetime".to_string());
        }
        _ => {}
    }

    let frequency = entry
        .frequency
        .map(|f| {
            let per_period = u32::try_from(f.per_period)
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(|| {
                    format!("frequency.perPeriod must be at least 1, got {}", f.per_period)
                })?;
            if i32::try_from(per_period).is_err() {
                return Err(format!(
                    "frequency.perPeriod must be at most {}, got {}",
                    i32::MAX,
                    f.per_period
                ));
            }
            Ok::<_, String>(Frequency {
                per_period,
                period: f.period,
            })
        })
        .transpose()?;

    let dependency = entry
        .dependency
        .map(|d| {
            let name = d
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| "dependency is missing a name".to_string())?;
            Ok::<_, String>(Dependency {
                name: name.to_string(),
                relation: d.relation,
            })
        })
        .transpose()?;

    let descriptor = ParsedEntryDescriptor {
        kind: entry.kind,
        description: description.to_string(),
        starting_datetime,
        ending_datetime,
        frequency,
        dependency,
    };

    if !has_scheduling_signal(&descriptor) {
        return Err(format!(
            "'{}' has no time, recurring frequency or dependency",
            descriptor.description
        ));
    }

    let stated_kind = descriptor.kind;
    let classified = classify(descriptor);
    if classified.kind != stated_kind {
        debug!(
            "Reclassified '{}' from {:?} to {:?}",
            classified.description, stated_kind, classified.kind
        );
    }
    Ok(classified)
}

/// Calendar years a wall-clock datetime may fall in.
const SUPPORTED_YEARS: std::ops::RangeInclusive<i32> = 1..=9999;

fn parse_optional_datetime(
    field: &str,
    value: Option<String>,
    offset: &FixedOffset,
) -> Result<Option<chrono::NaiveDateTime>, String> {
    let s = match value.as_deref().map(str::trim) {
        None | Some("") => return Ok(None),
        Some(s) => s,
    };
    let parsed = parse_model_datetime(s, offset)
        .ok_or_else(|| format!("{field} '{s}' is not an ISO-8601 datetime"))?;
    if !SUPPORTED_YEARS.contains(&parsed.year()) || localize(parsed, offset).is_none() {
        return Err(format!(
            "{field} '{s}' is outside years {}..={}",
            SUPPORTED_YEARS.start(),
            SUPPORTED_YEARS.end()
        ));
    }
    Ok(Some(parsed))
}

fn has_scheduling_signal(descriptor: &ParsedEntryDescriptor) -> bool {
    descriptor.starting_datetime.is_some()
        || descriptor.ending_datetime.is_some()
        || descriptor.dependency.is_some()
        || descriptor
            .frequency
            .as_ref()
            .is_some_and(Frequency::is_recurring)
}

/// Applies the classification rules regardless of the kind the model chose:
///
/// 1. explicit start + dependency → drop the dependency, `static`
/// 2. dependency, no start → `dynamic`
/// 3. no start, no end, no dependency, recurring frequency → `dynamic`
/// 4. otherwise → `static`
pub fn classify(mut descriptor: ParsedEntryDescriptor) -> ParsedEntryDescriptor {
    let has_start = descriptor.starting_datetime.is_some();
    let has_dependency = descriptor.dependency.is_some();

    descriptor.kind = match (has_start, has_dependency) {
        (true, true) => {
            descriptor.dependency = None;
            EntryKind::Static
        }
        (false, true) => EntryKind::Dynamic,
        (false, false)
            if descriptor.ending_datetime.is_none()
                && descriptor
                    .frequency
                    .as_ref()
                    .is_some_and(Frequency::is_recurring) =>
        {
            EntryKind::Dynamic
        }
        _ => EntryKind::Static,
    };
    descriptor
}
