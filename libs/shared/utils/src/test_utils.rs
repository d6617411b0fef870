use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::{AppConfig, DEFAULT_LATE_CANCELLATION_WINDOW_HOURS};
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub late_cancellation_window_hours: i64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            late_cancellation_window_hours: DEFAULT_LATE_CANCELLATION_WINDOW_HOURS,
        }
    }
}

impl TestConfig {
    pub fn with_supabase_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            late_cancellation_window_hours: self.late_cancellation_window_hours,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn frontline(email: &str) -> Self {
        Self::new(email, "frontline")
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST rows for the tables the appointment cell talks to.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn patient_response(patient_id: &str, email: &str, full_name: &str) -> serde_json::Value {
        json!({
            "id": patient_id,
            "full_name": full_name,
            "email": email,
            "phone_number": "+91-98-0000-0000",
            "appointment_ids": [],
            "created_at": "2025-01-01T09:00:00+05:30",
            "updated_at": "2025-01-01T09:00:00+05:30"
        })
    }

    pub fn doctor_profile_response(
        profile_id: &str,
        doctor_id: &str,
        email: &str,
        full_name: &str,
        specialization: &str,
    ) -> serde_json::Value {
        json!({
            "id": profile_id,
            "doctor_id": doctor_id,
            "full_name": full_name,
            "email": email,
            "specialization": specialization,
            "experience_years": 8,
            "appointment_ids": [],
            "created_at": "2025-01-01T09:00:00+05:30",
            "updated_at": "2025-01-01T09:00:00+05:30"
        })
    }

    /// A freshly scheduled appointment row. Tests mutate the returned value
    /// for other statuses.
    pub fn appointment_response(
        appointment_id: &str,
        patient_id: &str,
        doctor_id: &str,
        doctor_profile_id: &str,
        scheduled_at: &str,
    ) -> serde_json::Value {
        json!({
            "id": appointment_id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "doctor_profile_id": doctor_profile_id,
            "scheduled_at": scheduled_at,
            "appointment_type": "consultation",
            "mode": "in-person",
            "location": "Clinic",
            "status": "scheduled",
            "cancellation": null,
            "created_by": "patient",
            "last_updated_by": null,
            "is_paid": false,
            "payment_method": null,
            "reason_for_visit": null,
            "notes": null,
            "created_at": "2025-01-01T09:00:00+05:30",
            "updated_at": "2025-01-01T09:00:00+05:30"
        })
    }
}
