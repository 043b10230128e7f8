use std::sync::Arc;

use crate::auth::IdentityVerifier;
use crate::config::Config;
use crate::schedule::interpreter::Interpreter;
use crate::schedule::store::ScheduleStore;
use crate::users::store::UserStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every backend sits behind a trait object so handlers run against in-memory
/// stores in tests.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub interpreter: Interpreter,
    pub schedule_store: Arc<dyn ScheduleStore>,
    pub user_store: Arc<dyn UserStore>,
    pub identity: Arc<dyn IdentityVerifier>,
}
