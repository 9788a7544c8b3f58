//! Signup, login and push subscription management.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::auth::{bearer_token, hash_password, verify_password, Claims};
use crate::push::PushSubscription;
use crate::user::{lenient_string, NewUser, SignupRequest};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoginRequest {
    #[serde(deserialize_with = "lenient_string")]
    phone: String,
    #[serde(deserialize_with = "lenient_string")]
    password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenResponse {
    token: String,
    vehicle_number: String,
}

/// Resolve the bearer token on a request to its claims.
pub(crate) fn require_user(state: &AppState, headers: &HeaderMap) -> ApiResult<Claims> {
    let Some(token) = bearer_token(headers) else {
        return Err(ApiError::unauthorized("No token, authorization denied"));
    };
    state.tokens.verify(token).map_err(|err| {
        debug!(error = %err, "rejected token");
        ApiError::unauthorized("Token is not valid")
    })
}

pub(crate) async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::from_rejection(&rejection, "Invalid request body"))?;
    let signup = request
        .validate(state.settings.min_password_length)
        .map_err(ApiError::validation)?;

    let phone = signup.phone.clone();
    let vehicle_number = signup.vehicle_number.clone();
    let existing = state
        .db
        .call(move |storage| storage.find_by_phone_or_vehicle(&phone, &vehicle_number))
        .await
        .map_err(|err| ApiError::internal("Database error", &err))?;
    if existing.is_some() {
        return Err(ApiError::bad_request("User already exists"));
    }

    let password = signup.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| ApiError::internal("Error creating user", &err))?
        .map_err(|err| ApiError::internal("Error creating user", &err))?;

    let new_user = NewUser {
        name: signup.name,
        phone: signup.phone,
        vehicle_number: signup.vehicle_number,
        password_hash,
    };
    let vehicle_number = new_user.vehicle_number.clone();
    let id = match state.db.call(move |storage| storage.insert_user(&new_user)).await {
        Ok(id) => id,
        // Lost a race with a concurrent signup
        Err(err) if err.is_user_exists() => {
            return Err(ApiError::bad_request("User already exists"));
        }
        Err(err) => return Err(ApiError::internal("Error creating user", &err)),
    };

    let token = state
        .tokens
        .issue(id, &vehicle_number)
        .map_err(|err| ApiError::internal("Error creating user", &err))?;

    info!(user_id = id, vehicle_number = %vehicle_number, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            token,
            vehicle_number,
        }),
    ))
}

pub(crate) async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<TokenResponse>> {
    let Json(request) =
        payload.map_err(|rejection| ApiError::from_rejection(&rejection, "Invalid request body"))?;

    let phone = request.phone.trim().to_string();
    let user = state
        .db
        .call(move |storage| storage.find_by_phone(&phone))
        .await
        .map_err(|err| ApiError::internal("Database error", &err))?
        .ok_or_else(|| ApiError::unauthorized("Invalid credentials"))?;

    let password = request.password;
    let stored_hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|err| ApiError::internal("Server error", &err))?
        .map_err(|err| ApiError::internal("Server error", &err))?;
    if !matches {
        debug!(user_id = user.id, "password mismatch");
        return Err(ApiError::unauthorized("Invalid credentials"));
    }

    let token = state
        .tokens
        .issue(user.id, &user.vehicle_number)
        .map_err(|err| ApiError::internal("Server error", &err))?;

    info!(user_id = user.id, "user logged in");
    Ok(Json(TokenResponse {
        token,
        vehicle_number: user.vehicle_number,
    }))
}

pub(crate) async fn subscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<PushSubscription>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let claims = require_user(&state, &headers)?;

    let Json(subscription) =
        payload.map_err(|rejection| ApiError::from_rejection(&rejection, "Invalid subscription"))?;
    subscription.validate().map_err(|err| {
        debug!(error = %err, "rejected subscription");
        ApiError::bad_request("Invalid subscription")
    })?;

    let stored = serde_json::to_string(&subscription)
        .map_err(|err| ApiError::internal("Failed to save subscription", &err))?;
    let user_id = claims.id;
    let updated = state
        .db
        .call(move |storage| storage.set_subscription(user_id, &stored))
        .await
        .map_err(|err| ApiError::internal("Failed to save subscription", &err))?;
    if !updated {
        warn!(user_id, "subscription for unknown user");
        return Err(ApiError::not_found("User not found"));
    }

    info!(user_id, "subscription saved");
    Ok(Json(json!({ "message": "Subscription saved" })))
}

pub(crate) async fn unsubscribe(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let claims = require_user(&state, &headers)?;

    let user_id = claims.id;
    state
        .db
        .call(move |storage| storage.clear_subscription(user_id))
        .await
        .map_err(|err| ApiError::internal("Failed to remove subscription", &err))?;

    info!(user_id, "subscription removed");
    Ok(Json(json!({ "message": "Subscription removed" })))
}
