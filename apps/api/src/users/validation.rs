use serde::Deserialize;

use crate::auth::VerifiedIdentity;
use crate::users::store::{NewUser, UserUpdate};

pub const THEMES: &[&str] = &["light", "dark", "system"];
pub const DEFAULT_THEME: &str = "dark";
pub const DEFAULT_DURATION_MINUTES: i32 = 30;
pub const MAX_DURATION_MINUTES: i32 = 1440;

/// Optional profile fields sent with signup. Anything omitted falls back to the
/// verified token's claims or the account defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub preferences_theme: Option<String>,
    pub preferences_notifications: Option<bool>,
    #[serde(alias = "defaultDurationForScheduling")]
    pub default_duration_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub display_name: Option<String>,
    pub preferences_theme: Option<String>,
    pub preferences_notifications: Option<bool>,
    #[serde(alias = "defaultDurationForScheduling")]
    pub default_duration_minutes: Option<i32>,
}

/// Builds the row to insert for a signup. The token's email wins over the body's.
///
/// Returns every violation found, not just the first.
pub fn validate_signup(
    identity: &VerifiedIdentity,
    req: SignupRequest,
) -> Result<NewUser, Vec<String>> {
    let mut errors = Vec::new();

    let email = identity
        .email
        .clone()
        .or(req.email)
        .map(|e| e.trim().to_string())
        .unwrap_or_default();
    if email.is_empty() {
        errors.push("Email is required".to_string());
    } else if !is_valid_email(&email) {
        errors.push("Valid email is required".to_string());
    }

    check_theme(req.preferences_theme.as_deref(), &mut errors);
    check_duration(req.default_duration_minutes, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(NewUser {
        uid: identity.uid.clone(),
        email,
        display_name: non_blank(req.display_name).or_else(|| identity.name.clone()),
        preferences_theme: req
            .preferences_theme
            .unwrap_or_else(|| DEFAULT_THEME.to_string()),
        preferences_notifications: req.preferences_notifications.unwrap_or(true),
        default_duration_minutes: req
            .default_duration_minutes
            .unwrap_or(DEFAULT_DURATION_MINUTES),
    })
}

pub fn validate_update(req: UpdateUserRequest) -> Result<UserUpdate, Vec<String>> {
    let mut errors = Vec::new();
    check_theme(req.preferences_theme.as_deref(), &mut errors);
    check_duration(req.default_duration_minutes, &mut errors);

    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(UserUpdate {
        display_name: non_blank(req.display_name),
        preferences_theme: req.preferences_theme,
        preferences_notifications: req.preferences_notifications,
        default_duration_minutes: req.default_duration_minutes,
    })
}

fn check_theme(theme: Option<&str>, errors: &mut Vec<String>) {
    if let Some(theme) = theme {
        if !THEMES.contains(&theme) {
            errors.push("Theme must be light, dark, or system".to_string());
        }
    }
}

fn check_duration(minutes: Option<i32>, errors: &mut Vec<String>) {
    if let Some(minutes) = minutes {
        if !(1..=MAX_DURATION_MINUTES).contains(&minutes) {
            errors.push(format!(
                "Default duration must be between 1 and {MAX_DURATION_MINUTES} minutes"
            ));
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and a dot inside the domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}
