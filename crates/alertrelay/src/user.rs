//! Vehicle owner accounts.
//!
//! This module defines the account record kept in storage and the signup
//! request with its field validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A registered vehicle owner.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    /// Row id assigned by storage.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Phone number, used as the login name.
    pub phone: String,
    /// Vehicle registration number, used to route alerts.
    pub vehicle_number: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// The browser push subscription as JSON, if the owner is subscribed.
    pub subscription: Option<String>,
    /// When the account was created.
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Whether the owner currently has a push subscription.
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("phone", &self.phone)
            .field("vehicle_number", &self.vehicle_number)
            .field("subscribed", &self.is_subscribed())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// A user about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Display name.
    pub name: String,
    /// Phone number.
    pub phone: String,
    /// Vehicle registration number.
    pub vehicle_number: String,
    /// Argon2 PHC string.
    pub password_hash: String,
}

/// Body of `POST /auth/signup`.
///
/// Missing and `null` fields deserialize as empty strings and are reported
/// by [`SignupRequest::validate`]; numbers and booleans are taken in their
/// string form.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct SignupRequest {
    /// Display name.
    #[serde(deserialize_with = "lenient_string")]
    pub name: String,
    /// Phone number.
    #[serde(deserialize_with = "lenient_string")]
    pub phone: String,
    /// Vehicle registration number.
    #[serde(deserialize_with = "lenient_string")]
    pub vehicle_number: String,
    /// Plain-text password.
    #[serde(deserialize_with = "lenient_string")]
    pub password: String,
}

/// Deserialize any JSON scalar as a string.
///
/// `null`, arrays and objects become the empty string.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) => value,
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    })
}

impl std::fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignupRequest")
            .field("name", &self.name)
            .field("phone", &self.phone)
            .field("vehicle_number", &self.vehicle_number)
            .finish_non_exhaustive()
    }
}

/// A signup request that passed validation, with identifying fields trimmed.
#[derive(Clone, PartialEq, Eq)]
pub struct ValidSignup {
    /// Trimmed display name.
    pub name: String,
    /// Trimmed phone number.
    pub phone: String,
    /// Trimmed vehicle number.
    pub vehicle_number: String,
    /// Password exactly as submitted.
    pub password: String,
}

impl std::fmt::Debug for ValidSignup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidSignup")
            .field("name", &self.name)
            .field("phone", &self.phone)
            .field("vehicle_number", &self.vehicle_number)
            .finish_non_exhaustive()
    }
}

/// A single rejected signup field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Name of the offending field.
    pub path: &'static str,
    /// Human-readable message.
    pub msg: String,
}

impl FieldError {
    fn new(path: &'static str, msg: impl Into<String>) -> Self {
        Self {
            path,
            msg: msg.into(),
        }
    }
}

impl SignupRequest {
    /// Validate the request, reporting every failing field in field order.
    ///
    /// # Errors
    ///
    /// Returns the list of field errors if any field is invalid.
    pub fn validate(self, min_password_length: usize) -> Result<ValidSignup, Vec<FieldError>> {
        let name = self.name.trim().to_string();
        let phone = self.phone.trim().to_string();
        let vehicle_number = self.vehicle_number.trim().to_string();

        let mut errors = Vec::new();
        if name.is_empty() {
            errors.push(FieldError::new("name", "Name is required"));
        }
        if phone.is_empty() {
            errors.push(FieldError::new("phone", "Phone number is required"));
        }
        if vehicle_number.is_empty() {
            errors.push(FieldError::new(
                "vehicle_number",
                "Vehicle number is required",
            ));
        }
        if self.password.chars().count() < min_password_length {
            errors.push(FieldError::new(
                "password",
                format!("Password must be at least {min_password_length} characters"),
            ));
        }

        if errors.is_empty() {
            Ok(ValidSignup {
                name,
                phone,
                vehicle_number,
                password: self.password,
            })
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, phone: &str, vehicle: &str, password: &str) -> SignupRequest {
        SignupRequest {
            name: name.to_string(),
            phone: phone.to_string(),
            vehicle_number: vehicle.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn test_deserialize_non_string_fields() {
        let request: SignupRequest = serde_json::from_str(
            r#"{"name": "Asha", "phone": 5550100, "vehicle_number": null, "password": ["x"]}"#,
        )
        .unwrap();

        assert_eq!(request.name, "Asha");
        assert_eq!(request.phone, "5550100");
        assert_eq!(request.vehicle_number, "");
        assert_eq!(request.password, "");

        let errors = request.validate(6).unwrap_err();
        let paths: Vec<&str> = errors.iter().map(|error| error.path).collect();
        assert_eq!(paths, ["vehicle_number", "password"]);
    }

    #[test]
    fn test_deserialize_missing_fields() {
        let request: SignupRequest = serde_json::from_str(r#"{"active": true}"#).unwrap();
        assert_eq!(request.name, "");
        assert_eq!(request.validate(6).unwrap_err().len(), 4);
    }

    #[test]
    fn test_validate_trims_identifying_fields() {
        let valid = request("  Asha ", " 5550100 ", " KA01AB1234 ", " secret ")
            .validate(6)
            .unwrap();

        assert_eq!(valid.name, "Asha");
        assert_eq!(valid.phone, "5550100");
        assert_eq!(valid.vehicle_number, "KA01AB1234");
        // Passwords are taken verbatim
        assert_eq!(valid.password, " secret ");
    }

    #[test]
    fn test_validate_reports_every_field() {
        let errors = request("", "   ", "", "abc").validate(6).unwrap_err();
        let paths: Vec<_> = errors.iter().map(|e| e.path).collect();

        assert_eq!(paths, vec!["name", "phone", "vehicle_number", "password"]);
        assert_eq!(errors[0].msg, "Name is required");
        assert_eq!(errors[3].msg, "Password must be at least 6 characters");
    }

    #[test]
    fn test_validate_password_boundary() {
        assert!(request("A", "1", "V", "123456").validate(6).is_ok());
        assert!(request("A", "1", "V", "12345").validate(6).is_err());
    }

    #[test]
    fn test_validate_counts_characters_not_bytes() {
        // Four characters, twelve bytes
        assert!(request("A", "1", "V", "ééé€").validate(5).is_err());
        assert!(request("A", "1", "V", "ééé€").validate(4).is_ok());
    }

    #[test]
    fn test_signup_request_missing_fields_default_empty() {
        let req: SignupRequest = serde_json::from_str(r#"{"name": "Asha"}"#).unwrap();
        assert_eq!(req.name, "Asha");
        assert!(req.phone.is_empty());

        let errors = req.validate(6).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_debug_never_prints_password() {
        let req = request("A", "1", "V", "hunter22");
        assert!(!format!("{req:?}").contains("hunter22"));

        let valid = req.validate(6).unwrap();
        assert!(!format!("{valid:?}").contains("hunter22"));
    }

    #[test]
    fn test_user_is_subscribed() {
        let mut user = User {
            id: 1,
            name: "Asha".to_string(),
            phone: "5550100".to_string(),
            vehicle_number: "KA01AB1234".to_string(),
            password_hash: "$argon2id$...".to_string(),
            subscription: None,
            created_at: Utc::now(),
        };
        assert!(!user.is_subscribed());

        user.subscription = Some("{}".to_string());
        assert!(user.is_subscribed());
        assert!(!format!("{user:?}").contains("argon2"));
    }

    #[test]
    fn test_field_error_serialize() {
        let json = serde_json::to_value(FieldError::new("name", "Name is required")).unwrap();
        assert_eq!(json["path"], "name");
        assert_eq!(json["msg"], "Name is required");
    }
}
