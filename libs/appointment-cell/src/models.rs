// libs/appointment-cell/src/models.rs
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use shared_models::auth::AuthRole;

pub const DEFAULT_LOCATION: &str = "Clinic";
pub const DEFAULT_CANCELLATION_REASON: &str = "No reason provided.";
pub const MAX_REASON_FOR_VISIT_CHARS: usize = 200;
pub const MAX_NOTES_CHARS: usize = 500;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub doctor_profile_id: Uuid,
    pub scheduled_at: DateTime<FixedOffset>,
    pub appointment_type: AppointmentType,
    pub mode: AppointmentMode,
    pub location: String,
    pub status: AppointmentStatus,
    pub cancellation: Option<CancellationRecord>,
    pub created_by: ActorRole,
    pub last_updated_by: Option<ActorRole>,
    pub is_paid: bool,
    pub payment_method: Option<PaymentMethod>,
    pub reason_for_visit: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl Appointment {
    /// Display-only time of day, derived from the stored instant. The
    /// schedule has exactly one source of truth; this string is never stored.
    pub fn scheduled_time_of_day(&self) -> String {
        self.scheduled_at.format("%I:%M %p").to_string()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    CancelledByPatient,
    CancelledByDoctor,
    CancelledByAdmin,
    NoShow,
}

impl AppointmentStatus {
    /// No transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed
                | AppointmentStatus::CancelledByPatient
                | AppointmentStatus::CancelledByDoctor
                | AppointmentStatus::CancelledByAdmin
                | AppointmentStatus::NoShow
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::CancelledByPatient
                | AppointmentStatus::CancelledByDoctor
                | AppointmentStatus::CancelledByAdmin
        )
    }

    /// The cancelled variant owned by the acting role.
    pub fn cancelled_by(role: ActorRole) -> Self {
        match role {
            ActorRole::Patient => AppointmentStatus::CancelledByPatient,
            ActorRole::Doctor => AppointmentStatus::CancelledByDoctor,
            ActorRole::Admin => AppointmentStatus::CancelledByAdmin,
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::CancelledByPatient => write!(f, "cancelled-by-patient"),
            AppointmentStatus::CancelledByDoctor => write!(f, "cancelled-by-doctor"),
            AppointmentStatus::CancelledByAdmin => write!(f, "cancelled-by-admin"),
            AppointmentStatus::NoShow => write!(f, "no-show"),
        }
    }
}

/// Roles that can own an appointment mutation. Frontline workers
/// authenticate but never mutate appointments, so they are not actors here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    Patient,
    Doctor,
    Admin,
}

impl ActorRole {
    pub fn from_auth(role: AuthRole) -> Option<Self> {
        match role {
            AuthRole::Patient => Some(ActorRole::Patient),
            AuthRole::Doctor => Some(ActorRole::Doctor),
            AuthRole::Admin => Some(ActorRole::Admin),
            AuthRole::Frontline => None,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActorRole::Patient => write!(f, "patient"),
            ActorRole::Doctor => write!(f, "doctor"),
            ActorRole::Admin => write!(f, "admin"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentType {
    Consultation,
    FollowUp,
    CheckUp,
    Emergency,
}

impl fmt::Display for AppointmentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentType::Consultation => write!(f, "consultation"),
            AppointmentType::FollowUp => write!(f, "follow-up"),
            AppointmentType::CheckUp => write!(f, "check-up"),
            AppointmentType::Emergency => write!(f, "emergency"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum AppointmentMode {
    InPerson,
    Online,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Cash,
    Upi,
    Insurance,
}

/// Audit record written atomically with a cancellation transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationRecord {
    pub cancelled_by: ActorRole,
    pub cancelled_at: DateTime<FixedOffset>,
    pub reason: String,
    pub is_late_cancellation: bool,
}

// ==============================================================================
// PARTY RECORDS (patients / doctor_profiles tables)
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientRecord {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub appointment_ids: Vec<Uuid>,
}

/// Denormalized specialization/experience snapshot for a doctor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub full_name: String,
    pub email: String,
    pub specialization: String,
    pub experience_years: i32,
    #[serde(default)]
    pub appointment_ids: Vec<Uuid>,
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    /// Civil date in IST.
    pub appointment_date: NaiveDate,
    /// `HH:MM` with optional ` AM`/` PM` suffix; combined with the date at
    /// the edge into the single stored instant.
    pub appointment_time: String,
    pub appointment_type: AppointmentType,
    pub mode: AppointmentMode,
    pub location: Option<String>,
    pub reason_for_visit: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAppointmentRequest {
    pub appointment_date: Option<NaiveDate>,
    pub appointment_time: Option<String>,
    pub appointment_type: Option<AppointmentType>,
    pub mode: Option<AppointmentMode>,
    pub location: Option<String>,
    pub reason_for_visit: Option<String>,
    pub notes: Option<String>,
    pub is_paid: Option<bool>,
    pub payment_method: Option<PaymentMethod>,
}

impl UpdateAppointmentRequest {
    pub fn reschedules(&self) -> bool {
        self.appointment_date.is_some() || self.appointment_time.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DateRangeQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartySummary {
    pub full_name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfileSummary {
    pub full_name: String,
    pub specialization: String,
}

/// Denormalized row for the privileged list-all view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentSummary {
    pub id: Uuid,
    pub scheduled_at: DateTime<FixedOffset>,
    pub status: AppointmentStatus,
    pub appointment_type: AppointmentType,
    pub mode: AppointmentMode,
    pub location: String,
    pub patient: Option<PartySummary>,
    pub doctor_profile: Option<DoctorProfileSummary>,
}

/// Status counts. Statuses with no appointments are absent from the map;
/// callers treat absence as zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub total: i64,
    pub by_status: HashMap<AppointmentStatus, i64>,
}

/// Outcome of a party-link reconciliation sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub scanned: usize,
    pub repaired_patient_links: usize,
    pub repaired_doctor_links: usize,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Patient not found")]
    PatientNotFound,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Invalid appointment time: {0}")]
    InvalidTime(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Cannot {operation} an appointment that is {current}")]
    InvalidTransition {
        current: AppointmentStatus,
        operation: &'static str,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Appointment saved but linking it to a party failed: {0}")]
    PartyLink(String),

    #[error("Database error: {0}")]
    Database(String),
}
