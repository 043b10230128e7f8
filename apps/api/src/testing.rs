//! Test doubles: a scripted completion service, in-memory stores, a fixed-token
//! verifier and a router fixture wired from them.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{response::Response, Router};
use chrono::Utc;
use serde_json::Value;
use sqlx::error::{DatabaseError, ErrorKind};
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthError, IdentityVerifier, VerifiedIdentity};
use crate::config::Config;
use crate::llm_client::{CompletionService, LlmError};
use crate::models::schedule::{
    DynamicEntryRow, NewDynamicEntry, NewStaticEntry, ResultingEntryRow, StaticEntryRow,
};
use crate::models::user::UserRow;
use crate::routes::build_router;
use crate::schedule::interpreter::Interpreter;
use crate::schedule::models::{NewEntry, Period};
use crate::schedule::store::{DateWindow, InsertedEntries, ScheduleStore};
use crate::state::AppState;
use crate::users::store::{NewUser, UserStore, UserStoreError, UserUpdate};

pub const TEST_TOKEN: &str = "test-token";
pub const TEST_UID: &str = "uid-ada";

// ────────────────────────────────────────────────────────────────────────────
// Completion
// ────────────────────────────────────────────────────────────────────────────

/// Replays canned completions in order and records every prompt it receives.
/// Runs out with `EmptyContent`.
pub struct StubCompletion {
    responses: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl StubCompletion {
    pub fn new<const N: usize>(responses: [&str; N]) -> Arc<Self> {
        Self::with_results(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn empty() -> Arc<Self> {
        Self::with_results(Vec::new())
    }

    pub fn with_results(results: Vec<Result<String, LlmError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(results.into()),
            prompts: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
        })
    }

    /// Makes every call wait `delay` (or until cancelled) before answering.
    pub fn with_delay(self: Arc<Self>, delay: Duration) -> Arc<Self> {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionService for StubCompletion {
    async fn generate(
        &self,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<String, LlmError> {
        if cancel.is_cancelled() {
            return Err(LlmError::Cancelled);
        }
        self.prompts.lock().unwrap().push(prompt.to_string());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        let next = self.responses.lock().unwrap().pop_front();
        next.unwrap_or(Err(LlmError::EmptyContent))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Schedule store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct ScheduleTables {
    last_id: i32,
    statics: Vec<StaticEntryRow>,
    dynamics: Vec<DynamicEntryRow>,
    resulting: Vec<ResultingEntryRow>,
}

impl ScheduleTables {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn insert_static(&mut self, entry: &NewStaticEntry) -> StaticEntryRow {
        let now = Utc::now();
        let row = StaticEntryRow {
            id: self.next_id(),
            user_uid: entry.user_uid.clone(),
            original_input_text: entry.original_input_text.clone(),
            description: entry.description.clone(),
            starting_datetime: entry.starting_datetime,
            ending_datetime: entry.ending_datetime,
            frequency_per_period: entry.frequency_per_period,
            frequency_period: entry.frequency_period.as_str().to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.statics.push(row.clone());
        row
    }

    fn insert_dynamic(&mut self, entry: &NewDynamicEntry) -> DynamicEntryRow {
        let now = Utc::now();
        let row = DynamicEntryRow {
            id: self.next_id(),
            user_uid: entry.user_uid.clone(),
            original_input_text: entry.original_input_text.clone(),
            description: entry.description.clone(),
            starting_datetime: entry.starting_datetime,
            ending_datetime: entry.ending_datetime,
            frequency_per_period: entry.frequency_per_period,
            frequency_period: entry.frequency_period.map(|p| p.as_str().to_string()),
            dependency_name: entry.dependency_name.clone(),
            dependency_type: entry.dependency_type.map(|d| d.as_str().to_string()),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        self.dynamics.push(row.clone());
        row
    }
}

/// `ScheduleStore` over plain vectors, with the same windowing and soft-delete
/// rules as the Postgres queries. Writes for a uid missing from `users` fail
/// with a foreign-key violation.
pub struct InMemoryScheduleStore {
    tables: Mutex<ScheduleTables>,
    users: Arc<InMemoryUserStore>,
}

/// Stand-in for Postgres rejecting an entry whose `user_uid` has no profile.
#[derive(Debug)]
struct ForeignKeyViolation {
    message: String,
}

impl fmt::Display for ForeignKeyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ForeignKeyViolation {}

impl DatabaseError for ForeignKeyViolation {
    fn message(&self) -> &str {
        &self.message
    }

    fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
        self
    }

    fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
        self
    }

    fn kind(&self) -> ErrorKind {
        ErrorKind::ForeignKeyViolation
    }

    fn constraint(&self) -> Option<&str> {
        Some("entries_user_uid_fkey")
    }
}

impl InMemoryScheduleStore {
    pub fn new(users: Arc<InMemoryUserStore>) -> Self {
        Self {
            tables: Mutex::new(ScheduleTables::default()),
            users,
        }
    }

    fn ensure_user(&self, user_uid: &str) -> Result<(), sqlx::Error> {
        if self.users.contains(user_uid) {
            return Ok(());
        }
        Err(sqlx::Error::Database(Box::new(ForeignKeyViolation {
            message: format!("user_uid {user_uid} is not present in users"),
        })))
    }

    pub fn static_count(&self) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.statics.iter().filter(|r| r.deleted_at.is_none()).count()
    }

    pub fn dynamic_count(&self) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.dynamics.iter().filter(|r| r.deleted_at.is_none()).count()
    }

    /// Inserts a one-off static entry and returns its id.
    pub fn seed_static(&self, user_uid: &str, description: &str) -> i32 {
        let mut tables = self.tables.lock().unwrap();
        tables
            .insert_static(&NewStaticEntry {
                user_uid: user_uid.to_string(),
                original_input_text: None,
                description: description.to_string(),
                starting_datetime: Some(Utc::now()),
                ending_datetime: None,
                frequency_per_period: None,
                frequency_period: Period::Never,
            })
            .id
    }
}

#[async_trait]
impl ScheduleStore for InMemoryScheduleStore {
    async fn insert_static(&self, entry: &NewStaticEntry) -> Result<StaticEntryRow, sqlx::Error> {
        self.ensure_user(&entry.user_uid)?;
        Ok(self.tables.lock().unwrap().insert_static(entry))
    }

    async fn insert_dynamic(
        &self,
        entry: &NewDynamicEntry,
    ) -> Result<DynamicEntryRow, sqlx::Error> {
        self.ensure_user(&entry.user_uid)?;
        Ok(self.tables.lock().unwrap().insert_dynamic(entry))
    }

    async fn insert_batch(&self, entries: &[NewEntry]) -> Result<InsertedEntries, sqlx::Error> {
        for entry in entries {
            match entry {
                NewEntry::Static(e) => self.ensure_user(&e.user_uid)?,
                NewEntry::Dynamic(e) => self.ensure_user(&e.user_uid)?,
            }
        }
        let mut tables = self.tables.lock().unwrap();
        let mut inserted = InsertedEntries::default();
        for entry in entries {
            match entry {
                NewEntry::Static(e) => inserted.static_entries.push(tables.insert_static(e)),
                NewEntry::Dynamic(e) => inserted.dynamic_entries.push(tables.insert_dynamic(e)),
            }
        }
        Ok(inserted)
    }

    async fn list_static(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<StaticEntryRow>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .statics
            .iter()
            .filter(|r| r.user_uid == user_uid && r.deleted_at.is_none())
            .filter(|r| {
                window.admits(
                    r.starting_datetime,
                    r.ending_datetime,
                    r.frequency_period != Period::Never.as_str(),
                )
            })
            .cloned()
            .collect())
    }

    async fn list_dynamic(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<DynamicEntryRow>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .dynamics
            .iter()
            .filter(|r| r.user_uid == user_uid && r.deleted_at.is_none())
            .filter(|r| {
                let recurring = r
                    .frequency_period
                    .as_deref()
                    .is_some_and(|p| p != Period::Never.as_str());
                window.admits(r.starting_datetime, r.ending_datetime, recurring)
            })
            .cloned()
            .collect())
    }

    async fn list_resulting(
        &self,
        user_uid: &str,
        window: &DateWindow,
    ) -> Result<Vec<ResultingEntryRow>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables
            .resulting
            .iter()
            .filter(|r| r.user_uid == user_uid && r.deleted_at.is_none())
            .filter(|r| window.admits(Some(r.starting_datetime), Some(r.ending_datetime), false))
            .cloned()
            .collect())
    }

    async fn soft_delete_static(&self, user_uid: &str, id: i32) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .statics
            .iter_mut()
            .find(|r| r.id == id && r.user_uid == user_uid && r.deleted_at.is_none());
        Ok(match row {
            Some(row) => {
                row.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        })
    }

    async fn soft_delete_dynamic(&self, user_uid: &str, id: i32) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let row = tables
            .dynamics
            .iter_mut()
            .find(|r| r.id == id && r.user_uid == user_uid && r.deleted_at.is_none());
        Ok(match row {
            Some(row) => {
                row.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// User store
// ────────────────────────────────────────────────────────────────────────────

pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, UserRow>>,
    available: AtomicBool,
}

impl Default for InMemoryUserStore {
    fn default() -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl InMemoryUserStore {
    pub fn contains(&self, uid: &str) -> bool {
        self.users.lock().unwrap().contains_key(uid)
    }

    pub fn seed(&self, uid: &str, email: &str) {
        let row = default_row(uid, email, None);
        self.users.lock().unwrap().insert(uid.to_string(), row);
    }

    /// Makes `ping` fail, as an unreachable database would.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

fn default_row(uid: &str, email: &str, display_name: Option<&str>) -> UserRow {
    let now = Utc::now();
    UserRow {
        uid: uid.to_string(),
        email: email.to_string(),
        display_name: display_name.map(String::from),
        preferences_theme: "dark".to_string(),
        preferences_notifications: true,
        default_duration_minutes: 30,
        created_at: now,
        updated_at: now,
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, uid: &str) -> Result<Option<UserRow>, UserStoreError> {
        Ok(self.users.lock().unwrap().get(uid).cloned())
    }

    async fn create(&self, user: &NewUser) -> Result<UserRow, UserStoreError> {
        let mut users = self.users.lock().unwrap();
        if users.contains_key(&user.uid) {
            return Err(UserStoreError::UidInUse(user.uid.clone()));
        }
        if users.values().any(|u| u.email == user.email) {
            return Err(UserStoreError::EmailInUse(user.email.clone()));
        }
        let row = UserRow {
            display_name: user.display_name.clone(),
            preferences_theme: user.preferences_theme.clone(),
            preferences_notifications: user.preferences_notifications,
            default_duration_minutes: user.default_duration_minutes,
            ..default_row(&user.uid, &user.email, None)
        };
        users.insert(user.uid.clone(), row.clone());
        Ok(row)
    }

    async fn update(&self, uid: &str, update: &UserUpdate) -> Result<UserRow, UserStoreError> {
        let mut users = self.users.lock().unwrap();
        let row = users
            .get_mut(uid)
            .ok_or_else(|| UserStoreError::NotFound(uid.to_string()))?;
        if let Some(name) = &update.display_name {
            row.display_name = Some(name.clone());
        }
        if let Some(theme) = &update.preferences_theme {
            row.preferences_theme = theme.clone();
        }
        if let Some(notifications) = update.preferences_notifications {
            row.preferences_notifications = notifications;
        }
        if let Some(minutes) = update.default_duration_minutes {
            row.default_duration_minutes = minutes;
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn upsert_on_login(
        &self,
        uid: &str,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<UserRow, UserStoreError> {
        let mut users = self.users.lock().unwrap();
        if users.values().any(|u| u.email == email && u.uid != uid) {
            return Err(UserStoreError::EmailInUse(email.to_string()));
        }
        let row = users
            .entry(uid.to_string())
            .or_insert_with(|| default_row(uid, email, display_name));
        row.email = email.to_string();
        if let Some(name) = display_name {
            row.display_name = Some(name.to_string());
        }
        row.updated_at = Utc::now();
        Ok(row.clone())
    }

    async fn delete(&self, uid: &str) -> Result<(), UserStoreError> {
        self.users
            .lock()
            .unwrap()
            .remove(uid)
            .map(|_| ())
            .ok_or_else(|| UserStoreError::NotFound(uid.to_string()))
    }

    async fn ping(&self) -> Result<(), UserStoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(UserStoreError::Database(sqlx::Error::PoolTimedOut))
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Identity
// ────────────────────────────────────────────────────────────────────────────

/// Accepts only `TEST_TOKEN`, as the user `TEST_UID`.
pub struct StubVerifier;

#[async_trait]
impl IdentityVerifier for StubVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, AuthError> {
        if token != TEST_TOKEN {
            return Err(AuthError::InvalidCredential("unknown test token".to_string()));
        }
        Ok(VerifiedIdentity {
            uid: TEST_UID.to_string(),
            email: Some("ada@example.com".to_string()),
            name: Some("Ada".to_string()),
        })
    }

    async fn ping(&self) -> Result<(), AuthError> {
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Router fixture
// ────────────────────────────────────────────────────────────────────────────

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub stub: Arc<StubCompletion>,
    pub schedule: Arc<InMemoryScheduleStore>,
    pub users: Arc<InMemoryUserStore>,
}

impl TestApp {
    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.state.config.llm_timeout = timeout;
        self.router = build_router(self.state.clone());
        self
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/aura_test".to_string(),
        google_api_key: "test-key".to_string(),
        firebase_project_id: "aura-test".to_string(),
        port: 0,
        rust_log: "debug".to_string(),
        llm_timeout: Duration::from_secs(5),
        run_migrations: false,
    }
}

pub fn test_app(stub: Arc<StubCompletion>) -> TestApp {
    let users = Arc::new(InMemoryUserStore::default());
    let schedule = Arc::new(InMemoryScheduleStore::new(users.clone()));
    let state = AppState {
        config: test_config(),
        interpreter: Interpreter::new(stub.clone()),
        schedule_store: schedule.clone(),
        user_store: users.clone(),
        identity: Arc::new(StubVerifier),
    };

    TestApp {
        router: build_router(state.clone()),
        state,
        stub,
        schedule,
        users,
    }
}

pub async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
