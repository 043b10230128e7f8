pub mod handlers;
pub mod interpreter;
pub mod models;
pub mod prompts;
pub mod store;
pub mod validation;
