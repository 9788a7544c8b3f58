//! Alert webhook: fan alerts out to the vehicle owner's browser.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::push::{AlertNotification, PushError, PushSubscription};

const SECRET_HEADER: &str = "x-webhook-secret";

/// A well-formed webhook body.
#[derive(Debug)]
struct AlertBatch {
    vehicle_number: String,
    alerts: Vec<Value>,
}

impl AlertBatch {
    fn parse(body: Value) -> Option<Self> {
        let Value::Object(mut body) = body else {
            return None;
        };
        let vehicle_number = body
            .get("vehicle_number")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|vehicle| !vehicle.is_empty())?
            .to_string();
        let Some(Value::Array(alerts)) = body.remove("alerts") else {
            return None;
        };
        Some(Self {
            vehicle_number,
            alerts,
        })
    }
}

fn check_secret(expected: Option<&str>, headers: &HeaderMap) -> ApiResult<()> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(SECRET_HEADER)
        .and_then(|value| value.to_str().ok());
    if provided == Some(expected) {
        Ok(())
    } else {
        Err(ApiError::unauthorized("Invalid webhook secret"))
    }
}

pub(crate) async fn alerts(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    check_secret(state.settings.webhook_secret.as_deref(), &headers)?;

    let Json(body) = payload
        .map_err(|rejection| ApiError::from_rejection(&rejection, "Invalid payload format"))?;
    let batch =
        AlertBatch::parse(body).ok_or_else(|| ApiError::bad_request("Invalid payload format"))?;

    let vehicle_number = batch.vehicle_number.clone();
    let user = state
        .db
        .call(move |storage| storage.find_by_vehicle(&vehicle_number))
        .await
        .map_err(|err| ApiError::internal("Database error", &err))?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let Some(stored) = user.subscription.as_deref() else {
        debug!(vehicle_number = %batch.vehicle_number, "alert for unsubscribed user");
        return Err(ApiError::bad_request("User not subscribed to notifications"));
    };
    let subscription = PushSubscription::from_stored(stored)
        .map_err(|err| ApiError::internal("Invalid subscription format", &err))?;

    let timestamp = chrono::Utc::now().timestamp_millis();
    let payloads = batch
        .alerts
        .iter()
        .map(|alert| {
            AlertNotification::new(
                &state.settings.alert,
                alert.clone(),
                &batch.vehicle_number,
                user.id,
                timestamp,
            )
            .to_payload()
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(|err| ApiError::internal("Failed to send notifications", &err))?;

    let results = join_all(
        payloads
            .iter()
            .map(|payload| state.push.send(&subscription, payload)),
    )
    .await;

    let failures: Vec<&PushError> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    if failures.iter().any(|err| err.is_gone()) {
        let user_id = user.id;
        match state
            .db
            .call(move |storage| storage.clear_subscription(user_id))
            .await
        {
            Ok(_) => info!(user_id, "cleared expired subscription"),
            Err(err) => error!(user_id, error = %err, "failed to clear expired subscription"),
        }
    }

    if let Some(first) = failures.first() {
        warn!(
            vehicle_number = %batch.vehicle_number,
            failed = failures.len(),
            total = results.len(),
            "alert delivery failed"
        );
        return Err(ApiError::internal("Failed to send notifications", first));
    }

    info!(
        vehicle_number = %batch.vehicle_number,
        alert_count = batch.alerts.len(),
        "alerts relayed"
    );
    Ok(Json(json!({
        "message": "Notifications sent successfully",
        "sent_to": batch.vehicle_number,
        "alert_count": batch.alerts.len(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_batch() {
        let batch = AlertBatch::parse(json!({
            "vehicle_number": " KA01AB1234 ",
            "alerts": ["Low fuel", {"code": "TPMS"}]
        }))
        .unwrap();

        assert_eq!(batch.vehicle_number, "KA01AB1234");
        assert_eq!(batch.alerts.len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed_batches() {
        let cases = [
            json!([]),
            json!({"alerts": []}),
            json!({"vehicle_number": "", "alerts": []}),
            json!({"vehicle_number": 42, "alerts": []}),
            json!({"vehicle_number": "KA01"}),
            json!({"vehicle_number": "KA01", "alerts": "Low fuel"}),
        ];
        for case in cases {
            assert!(AlertBatch::parse(case.clone()).is_none(), "{case}");
        }
    }

    #[test]
    fn test_check_secret() {
        let mut headers = HeaderMap::new();
        assert!(check_secret(None, &headers).is_ok());
        assert!(check_secret(Some("hook"), &headers).is_err());

        headers.insert(SECRET_HEADER, HeaderValue::from_static("wrong"));
        assert!(check_secret(Some("hook"), &headers).is_err());

        headers.insert(SECRET_HEADER, HeaderValue::from_static("hook"));
        assert!(check_secret(Some("hook"), &headers).is_ok());
    }
}
