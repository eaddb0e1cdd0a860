use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::{
    format_description::well_known::Rfc3339, macros::format_description, Date, OffsetDateTime,
};

use crate::error::{AppError, AppResult};
use crate::users::jwt::Claims;
use crate::users::repo_types::{Gender, SearchingFor};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const CODE_LEN: usize = 6;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn invalid(msg: &str) -> AppError {
    AppError::Validation(msg.to_string())
}

/// Trimmed, non-empty value or `missing`.
fn required(value: Option<String>, missing: &str) -> AppResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| invalid(missing))
}

fn email(value: Option<String>) -> AppResult<String> {
    let email = required(value, "Email is required")?.to_lowercase();
    if !is_valid_email(&email) {
        return Err(invalid("Email must be a valid email address"));
    }
    Ok(email)
}

/// Passwords are taken verbatim; only the length is checked.
fn password(value: Option<String>, label: &str) -> AppResult<String> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{label} is required")))?;
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "{label} must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }
    Ok(value)
}

/// Codes are compared verbatim, so surrounding whitespace counts toward the length.
fn code(value: Option<String>, label: &str) -> AppResult<String> {
    let value = value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::Validation(format!("{label} is required")))?;
    if value.chars().count() != CODE_LEN {
        return Err(AppError::Validation(format!(
            "{label} must be {CODE_LEN} characters long"
        )));
    }
    Ok(value)
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_dob(raw: &str) -> Option<Date> {
    Date::parse(raw, format_description!("[year]-[month]-[day]"))
        .ok()
        .or_else(|| OffsetDateTime::parse(raw, &Rfc3339).ok().map(|t| t.date()))
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub searching_for: Option<String>,
    pub username: Option<String>,
    pub found_at: Option<String>,
    pub prelaunch: Option<bool>,
}

/// Registration input that passed validation.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub dob: Date,
    pub gender: Gender,
    pub city: String,
    pub country: String,
    pub searching_for: SearchingFor,
    pub username: Option<String>,
    pub found_at: Option<String>,
    pub prelaunch: Option<bool>,
}

impl RegisterRequest {
    pub fn validate(self) -> AppResult<Registration> {
        let email = email(self.email)?;
        let password = password(self.password, "Password")?;

        let dob = required(self.dob, "Date of birth is required")?;
        let dob = parse_dob(&dob).ok_or_else(|| invalid("Date of birth must be a valid date"))?;

        let gender = required(self.gender, "Gender is required")?
            .parse::<Gender>()
            .map_err(|_| invalid("Gender must be either male or female"))?;

        let city = required(self.city, "City is required")?;
        let country = required(self.country, "Country is required")?;

        let searching_for = required(self.searching_for, "Searching for is required")?
            .parse::<SearchingFor>()
            .map_err(|_| {
                invalid(
                    "Searching for must be one of sugar_baby, sugar_mommy, \
                     sugar_daddy, or sugar_boy",
                )
            })?;

        Ok(Registration {
            email,
            password,
            dob,
            gender,
            city,
            country,
            searching_for,
            username: optional(self.username),
            found_at: optional(self.found_at),
            prelaunch: self.prelaunch,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginRequest {
    /// Returns `(email, password)`.
    pub fn validate(self) -> AppResult<(String, String)> {
        Ok((email(self.email)?, password(self.password, "Password")?))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyEmailRequest {
    pub verification_code: Option<String>,
}

impl VerifyEmailRequest {
    pub fn validate(self) -> AppResult<String> {
        code(self.verification_code, "Verification code")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

impl ForgotPasswordRequest {
    pub fn validate(self) -> AppResult<String> {
        email(self.email)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub reset_password_code: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub email: String,
    pub code: String,
    pub new_password: String,
}

impl ResetPasswordRequest {
    pub fn validate(self) -> AppResult<PasswordReset> {
        Ok(PasswordReset {
            email: email(self.email)?,
            code: code(self.reset_password_code, "Reset password code")?,
            new_password: password(self.new_password, "New password")?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

impl ChangePasswordRequest {
    /// Returns `(current, new)`.
    pub fn validate(self) -> AppResult<(String, String)> {
        Ok((
            password(self.current_password, "Current password")?,
            password(self.new_password, "New password")?,
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            token: None,
        }
    }

    pub fn with_token(message: impl Into<String>, token: String) -> Self {
        Self {
            message: message.into(),
            token: Some(token),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProtectedResponse {
    pub message: &'static str,
    pub user: Claims,
}
