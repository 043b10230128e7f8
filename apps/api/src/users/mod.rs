//! User profiles keyed by the identity provider's uid.

pub mod handlers;
pub mod store;
pub mod validation;
