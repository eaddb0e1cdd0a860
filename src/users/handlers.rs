use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::{AppJson, AppResult},
    state::AppState,
    users::{
        dto::{
            ChangePasswordRequest, ForgotPasswordRequest, LoginRequest, MessageResponse,
            ProtectedResponse, RegisterRequest, ResetPasswordRequest, VerifyEmailRequest,
        },
        jwt::{token_cookie, AuthUser},
        services,
    },
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-email", post(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/change-password", post(change_password))
        .route("/protected", get(protected))
}

fn cookie_headers(state: &AppState, token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(cookie) = token_cookie(token, state.jwt.ttl) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    headers
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> AppResult<(StatusCode, HeaderMap, Json<MessageResponse>)> {
    let input = payload.validate()?;
    let out = services::register_user(&state, input).await?;

    let message = if out.email_sent {
        "User registered successfully. Please verify your email."
    } else {
        "Registration successful, but failed to send verification email. Please try again later."
    };
    Ok((
        StatusCode::CREATED,
        cookie_headers(&state, &out.token),
        Json(MessageResponse::with_token(message, out.token)),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> AppResult<(HeaderMap, Json<MessageResponse>)> {
    let (email, password) = payload.validate()?;
    let token = services::login_user(&state, &email, &password).await?;
    Ok((
        cookie_headers(&state, &token),
        Json(MessageResponse::with_token("Logged in successfully", token)),
    ))
}

#[instrument(skip(state, payload), fields(user_id = %claims.id))]
pub async fn verify_email(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    AppJson(payload): AppJson<VerifyEmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let code = payload.validate()?;
    services::verify_email(&state, claims.id, &code).await?;
    Ok(Json(MessageResponse::new("Email verified successfully")))
}

#[instrument(skip(state, payload))]
pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ForgotPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let email = payload.validate()?;
    services::forgot_password(&state, &email).await?;
    Ok(Json(MessageResponse::new("Reset password code sent to email")))
}

#[instrument(skip(state, payload))]
pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(payload): AppJson<ResetPasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let input = payload.validate()?;
    services::reset_password(&state, input).await?;
    Ok(Json(MessageResponse::new("Password reset successfully")))
}

#[instrument(skip(state, payload), fields(user_id = %claims.id))]
pub async fn change_password(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    AppJson(payload): AppJson<ChangePasswordRequest>,
) -> AppResult<Json<MessageResponse>> {
    let (current, new) = payload.validate()?;
    services::change_password(&state, claims.id, &current, &new).await?;
    Ok(Json(MessageResponse::new("Password changed successfully")))
}

#[instrument(skip_all, fields(user_id = %claims.id))]
pub async fn protected(AuthUser(claims): AuthUser) -> Json<ProtectedResponse> {
    Json(ProtectedResponse {
        message: "This is a protected route",
        user: claims,
    })
}
