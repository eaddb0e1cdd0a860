use rand::Rng;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    mailer::CodeKind,
    state::AppState,
    users::{
        dto::{PasswordReset, Registration},
        password::{hash_password, verify_password},
        repo_types::{NewUser, User},
    },
};

const INCORRECT_CREDENTIALS: &str = "Incorrect email or password";

/// Uniform 6-digit one-time code in 100000..=999999.
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Outcome of a successful registration.
#[derive(Debug)]
pub struct Registered {
    pub user: User,
    pub token: String,
    /// `false` when the verification email could not be delivered.
    pub email_sent: bool,
}

/// First free name in `base`, `base1`, `base2`, … where `base` is the local
/// part of `email`.
pub async fn derive_username(state: &AppState, email: &str) -> AppResult<String> {
    let base = email.split('@').next().unwrap_or(email);
    let mut candidate = base.to_string();
    let mut suffix = 1u32;
    while state.store.username_exists(&candidate).await? {
        candidate = format!("{base}{suffix}");
        suffix += 1;
    }
    Ok(candidate)
}

fn issue_token(state: &AppState, user: &User) -> AppResult<String> {
    Ok(state.jwt.sign(user.id, &user.email)?)
}

#[instrument(skip(state, input), fields(email = %input.email))]
pub async fn register_user(state: &AppState, input: Registration) -> AppResult<Registered> {
    if state.store.find_by_email(&input.email).await?.is_some() {
        warn!("email already registered");
        return Err(AppError::Conflict(
            "A user with this email already exists.".into(),
        ));
    }

    let username = match input.username {
        Some(name) => name,
        None => derive_username(state, &input.email).await?,
    };

    let password_hash = hash_password(&input.password).await?;
    let code = generate_code();

    // No user is written unless the place resolves.
    let location = state.geocoder.resolve(&input.city, &input.country).await?;

    let user = state
        .store
        .insert(NewUser {
            email: input.email,
            username,
            password_hash,
            dob: input.dob,
            gender: input.gender,
            location,
            searching_for: input.searching_for,
            found_at: input.found_at,
            prelaunch: input.prelaunch,
            email_verification_code: code.clone(),
        })
        .await?;
    info!(user_id = %user.id, username = %user.username, "user registered");

    let email_sent = match state
        .mailer
        .send_code(
            &user.email,
            &code,
            CodeKind::EmailVerification {
                username: &user.username,
            },
        )
        .await
    {
        Ok(()) => true,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "verification email not sent");
            false
        }
    };

    let token = issue_token(state, &user)?;
    Ok(Registered {
        user,
        token,
        email_sent,
    })
}

#[instrument(skip(state, code))]
pub async fn verify_email(state: &AppState, user_id: Uuid, code: &str) -> AppResult<()> {
    let mut user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if user.email_verification_code.as_deref() != Some(code) {
        warn!("verification code mismatch");
        return Err(AppError::Validation("Invalid verification code".into()));
    }

    user.email_verified = true;
    user.email_verification_code = None;
    state.store.update(&user).await?;
    info!("email verified");
    Ok(())
}

#[instrument(skip(state, password))]
pub async fn login_user(state: &AppState, email: &str, password: &str) -> AppResult<String> {
    let Some(user) = state.store.find_by_email(email).await? else {
        warn!("login unknown email");
        return Err(AppError::InvalidCredentials(INCORRECT_CREDENTIALS.into()));
    };

    if !verify_password(password, &user.password_hash).await? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AppError::InvalidCredentials(INCORRECT_CREDENTIALS.into()));
    }

    // Only callers holding the right password learn the account is unverified.
    if state.config.require_verified_email && !user.email_verified {
        return Err(AppError::Validation(
            "Please verify your email before logging in.".into(),
        ));
    }

    info!(user_id = %user.id, "user logged in");
    issue_token(state, &user)
}

/// Stores a fresh reset code and mails it. The code stays valid even when
/// delivery fails.
#[instrument(skip(state))]
pub async fn forgot_password(state: &AppState, email: &str) -> AppResult<()> {
    let mut user = state
        .store
        .find_by_email(email)
        .await?
        .ok_or_else(|| AppError::NotFound("Email not found".into()))?;

    let code = generate_code();
    user.reset_password_code = Some(code.clone());
    state.store.update(&user).await?;

    if let Err(e) = state
        .mailer
        .send_code(&user.email, &code, CodeKind::PasswordReset)
        .await
    {
        warn!(user_id = %user.id, error = %e, "reset password email not sent");
        return Err(AppError::External(
            "Failed to send reset password email. Please try again later.".into(),
        ));
    }
    info!(user_id = %user.id, "reset password code sent");
    Ok(())
}

#[instrument(skip(state, input), fields(email = %input.email))]
pub async fn reset_password(state: &AppState, input: PasswordReset) -> AppResult<()> {
    let mut user = state
        .store
        .find_by_reset_code(&input.email, &input.code)
        .await?
        .ok_or_else(|| AppError::Validation("Invalid reset password code or email".into()))?;

    user.password_hash = hash_password(&input.new_password).await?;
    user.reset_password_code = None;
    state.store.update(&user).await?;
    info!(user_id = %user.id, "password reset");
    Ok(())
}

#[instrument(skip(state, current, new))]
pub async fn change_password(
    state: &AppState,
    user_id: Uuid,
    current: &str,
    new: &str,
) -> AppResult<()> {
    let mut user = state
        .store
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;

    if !verify_password(current, &user.password_hash).await? {
        warn!("current password mismatch");
        return Err(AppError::Validation("Current password is incorrect".into()));
    }

    user.password_hash = hash_password(new).await?;
    state.store.update(&user).await?;
    info!("password changed");
    Ok(())
}
