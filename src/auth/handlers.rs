use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    auth::{
        dto::{
            AuthResponse, LoginRequest, MessageResponse, SignupRequest, VerifyResponse,
        },
        extractors::BearerToken,
        services::Issued,
    },
    error::{AppError, AppResult},
    limit,
    state::AppState,
};

pub fn auth_routes(state: &AppState) -> Router<AppState> {
    let limits = &state.limits;
    Router::new()
        .route(
            "/auth/signup",
            post(signup).layer(middleware::from_fn_with_state(
                limits.signup.clone(),
                limit::enforce,
            )),
        )
        .route(
            "/auth/login",
            post(login).layer(middleware::from_fn_with_state(
                limits.login.clone(),
                limit::enforce,
            )),
        )
        .route(
            "/auth/guest",
            post(create_guest).layer(middleware::from_fn_with_state(
                limits.guest.clone(),
                limit::enforce,
            )),
        )
        .route("/auth/logout", post(logout))
        .route("/auth/verify", get(verify))
}

fn auth_response(message: &'static str, issued: Issued) -> Json<AuthResponse> {
    Json(AuthResponse {
        message,
        session_token: issued.token,
        user: issued.user.into(),
    })
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let Json(payload) = payload?;
    let issued = state
        .auth
        .signup(&payload.email, &payload.password, &payload.display_name)
        .await?;
    Ok((
        StatusCode::CREATED,
        auth_response("User created successfully", issued),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> AppResult<Json<AuthResponse>> {
    let Json(payload) = payload?;
    let issued = state.auth.login(&payload.email, &payload.password).await?;
    Ok(auth_response("Login successful", issued))
}

#[instrument(skip(state))]
pub async fn create_guest(
    State(state): State<AppState>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    let issued = state.auth.create_guest().await?;
    Ok((
        StatusCode::CREATED,
        auth_response("Guest session created", issued),
    ))
}

#[instrument(skip(state, token))]
pub async fn logout(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<MessageResponse>> {
    state.auth.logout(token.as_deref()).await?;
    Ok(Json(MessageResponse::new("Logout successful")))
}

#[instrument(skip(state, token))]
pub async fn verify(
    State(state): State<AppState>,
    BearerToken(token): BearerToken,
) -> AppResult<Json<VerifyResponse>> {
    let token = token.ok_or_else(|| AppError::unauthorized("Session token required"))?;
    let user = state
        .auth
        .verify(Some(&token))
        .await
        .ok_or_else(|| AppError::unauthorized("Invalid or expired session"))?;
    Ok(Json(VerifyResponse {
        message: "Session valid",
        user: user.into(),
    }))
}
