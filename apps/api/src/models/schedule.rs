use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::schedule::models::{DependencyRelation, Period};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StaticEntryRow {
    pub id: i32,
    pub user_uid: String,
    pub original_input_text: Option<String>,
    pub description: String,
    pub starting_datetime: Option<DateTime<Utc>>,
    pub ending_datetime: Option<DateTime<Utc>>,
    pub frequency_per_period: Option<i32>,
    pub frequency_period: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DynamicEntryRow {
    pub id: i32,
    pub user_uid: String,
    pub original_input_text: Option<String>,
    pub description: String,
    pub starting_datetime: Option<DateTime<Utc>>,
    pub ending_datetime: Option<DateTime<Utc>>,
    pub frequency_per_period: Option<i32>,
    pub frequency_period: Option<String>,
    pub dependency_name: Option<String>,
    pub dependency_type: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// A concrete calendar instance. Read-only: nothing in the service derives these.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResultingEntryRow {
    pub id: i32,
    pub user_uid: String,
    pub origin_static_entry_id: Option<i32>,
    pub origin_dynamic_entry_id: Option<i32>,
    pub description: String,
    pub starting_datetime: DateTime<Utc>,
    pub ending_datetime: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Insert payload for `static_entries`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewStaticEntry {
    pub user_uid: String,
    pub original_input_text: Option<String>,
    pub description: String,
    pub starting_datetime: Option<DateTime<Utc>>,
    pub ending_datetime: Option<DateTime<Utc>>,
    pub frequency_per_period: Option<i32>,
    pub frequency_period: Period,
}

/// Insert payload for `dynamic_entries`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDynamicEntry {
    pub user_uid: String,
    pub original_input_text: Option<String>,
    pub description: String,
    pub starting_datetime: Option<DateTime<Utc>>,
    pub ending_datetime: Option<DateTime<Utc>>,
    pub frequency_per_period: Option<i32>,
    pub frequency_period: Option<Period>,
    pub dependency_name: Option<String>,
    pub dependency_type: Option<DependencyRelation>,
}
