// libs/appointment-cell/src/services/scheduling.rs
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveTime};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;
use shared_models::auth::{AuthRole, User};
use shared_utils::clock::{Clock, SystemClock};

use crate::models::{
    ActorRole, Appointment, AppointmentError, AppointmentStats, AppointmentStatus,
    AppointmentSummary, CancellationRecord, CreateAppointmentRequest, ReconciliationReport,
    UpdateAppointmentRequest, DEFAULT_CANCELLATION_REASON, DEFAULT_LOCATION,
};
use crate::services::directory::PartyDirectoryService;
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::policy::CancellationPolicy;
use crate::validation;

/// Orchestrates the appointment lifecycle: validated creation, guarded
/// status transitions with their audit records, hard deletion, and the
/// role-scoped read side. Writes go through PostgREST; there is no
/// cross-document transaction, so the create path's party-list pushes can
/// fail after the appointment row exists (surfaced, and repairable via
/// `reconcile_party_links`).
pub struct AppointmentSchedulingService {
    supabase: Arc<SupabaseClient>,
    directory: PartyDirectoryService,
    lifecycle: AppointmentLifecycleService,
    policy: CancellationPolicy,
    clock: Arc<dyn Clock>,
}

#[derive(Debug, Deserialize)]
struct StatusRow {
    status: AppointmentStatus,
}

impl AppointmentSchedulingService {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Same service with a caller-supplied clock. Tests pin time with this.
    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));

        Self {
            directory: PartyDirectoryService::new(Arc::clone(&supabase)),
            lifecycle: AppointmentLifecycleService::new(),
            policy: CancellationPolicy::from_config(config),
            supabase,
            clock,
        }
    }

    // ==========================================================================
    // WRITE SIDE
    // ==========================================================================

    pub async fn create_appointment(
        &self,
        request: CreateAppointmentRequest,
        created_by: ActorRole,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Creating appointment for patient {} with doctor {}",
            request.patient_id, request.doctor_id
        );

        let now = self.clock.now();

        let time_of_day = validation::parse_appointment_time(&request.appointment_time)?;
        let scheduled_at = validation::combine_ist(request.appointment_date, time_of_day)?;
        validation::ensure_future(scheduled_at, now)?;
        validation::validate_reason_for_visit(request.reason_for_visit.as_deref())?;

        // Both parties must resolve before anything is written.
        let patient = self
            .directory
            .get_patient(request.patient_id, auth_token)
            .await?;
        let profile = self
            .directory
            .get_doctor_profile(request.doctor_id, auth_token)
            .await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: patient.id,
            doctor_id: request.doctor_id,
            doctor_profile_id: profile.id,
            scheduled_at,
            appointment_type: request.appointment_type,
            mode: request.mode,
            location: request
                .location
                .unwrap_or_else(|| DEFAULT_LOCATION.to_string()),
            status: AppointmentStatus::Scheduled,
            cancellation: None,
            created_by,
            last_updated_by: None,
            is_paid: false,
            payment_method: request.payment_method,
            reason_for_visit: request.reason_for_visit,
            notes: None,
            created_at: now,
            updated_at: now,
        };

        let body = serde_json::to_value(&appointment)
            .map_err(|e| AppointmentError::Database(e.to_string()))?;
        let rows: Vec<Appointment> = self
            .supabase
            .write_returning(Method::POST, "/rest/v1/appointments", Some(auth_token), body)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;
        let created = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Database("Insert returned no rows".to_string()))?;

        // Secondary writes; a failure here leaves the appointment unlinked
        // and must reach the caller.
        self.directory
            .link_appointment(&patient, &profile, created.id, auth_token)
            .await?;

        info!("Appointment {} created", created.id);
        Ok(created)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    /// Generic field patch. Validators re-run; rescheduling keeps the
    /// future-date invariant, so a move into the past is rejected.
    pub async fn update_appointment(
        &self,
        appointment_id: Uuid,
        request: UpdateAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment {}", appointment_id);

        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let role = self.actor_for(user)?;
        self.ensure_involved(&appointment, user, role, "update")?;

        let now = self.clock.now();
        let mut patch = Map::new();

        if request.reschedules() {
            let date = request
                .appointment_date
                .unwrap_or_else(|| appointment.scheduled_at.date_naive());
            let time = match &request.appointment_time {
                Some(raw) => validation::parse_appointment_time(raw)?,
                None => appointment.scheduled_at.time(),
            };
            let scheduled_at = validation::combine_ist(date, time)?;
            validation::ensure_future(scheduled_at, now)?;
            patch.insert("scheduled_at".to_string(), json!(scheduled_at));
        }

        validation::validate_reason_for_visit(request.reason_for_visit.as_deref())?;
        validation::validate_notes(request.notes.as_deref())?;

        if let Some(appointment_type) = request.appointment_type {
            patch.insert("appointment_type".to_string(), json!(appointment_type));
        }
        if let Some(mode) = request.mode {
            patch.insert("mode".to_string(), json!(mode));
        }
        if let Some(location) = request.location {
            patch.insert("location".to_string(), json!(location));
        }
        if let Some(reason) = request.reason_for_visit {
            patch.insert("reason_for_visit".to_string(), json!(reason));
        }
        if let Some(notes) = request.notes {
            patch.insert("notes".to_string(), json!(notes));
        }
        if let Some(is_paid) = request.is_paid {
            patch.insert("is_paid".to_string(), json!(is_paid));
        }
        if let Some(payment_method) = request.payment_method {
            patch.insert("payment_method".to_string(), json!(payment_method));
        }

        self.persist_patch(appointment.id, patch, role, now, auth_token)
            .await
    }

    pub async fn confirm_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let role = self.actor_for(user)?;
        self.ensure_clinician(&appointment, user, role, "confirm")?;
        self.lifecycle.ensure_confirmable(&appointment.status)?;

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(AppointmentStatus::Confirmed));

        let updated = self
            .persist_patch(appointment.id, patch, role, self.clock.now(), auth_token)
            .await?;
        info!("Appointment {} confirmed by {}", appointment_id, role);
        Ok(updated)
    }

    pub async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let role = self.actor_for(user)?;
        self.ensure_involved(&appointment, user, role, "cancel")?;

        let new_status = self.lifecycle.ensure_cancellable(&appointment.status, role)?;

        let now = self.clock.now();
        let is_late = self.policy.is_late(appointment.scheduled_at, now);
        let record = CancellationRecord {
            cancelled_by: role,
            cancelled_at: now,
            reason: reason
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CANCELLATION_REASON.to_string()),
            is_late_cancellation: is_late,
        };

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(new_status));
        patch.insert("cancellation".to_string(), json!(record));

        let updated = self
            .persist_patch(appointment.id, patch, role, now, auth_token)
            .await?;
        info!(
            "Appointment {} cancelled by {} (late: {})",
            appointment_id, role, is_late
        );
        Ok(updated)
    }

    pub async fn complete_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        notes: Option<String>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let role = self.actor_for(user)?;
        self.ensure_clinician(&appointment, user, role, "complete")?;
        self.lifecycle.ensure_completable(&appointment.status)?;
        validation::validate_notes(notes.as_deref())?;

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(AppointmentStatus::Completed));
        if let Some(notes) = notes {
            patch.insert("notes".to_string(), json!(notes));
        }

        let updated = self
            .persist_patch(appointment.id, patch, role, self.clock.now(), auth_token)
            .await?;
        info!("Appointment {} completed by {}", appointment_id, role);
        Ok(updated)
    }

    pub async fn mark_no_show(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let role = self.actor_for(user)?;
        self.ensure_clinician(&appointment, user, role, "mark as no-show")?;
        self.lifecycle.ensure_no_show_allowed(&appointment.status)?;

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(AppointmentStatus::NoShow));

        self.persist_patch(appointment.id, patch, role, self.clock.now(), auth_token)
            .await
    }

    /// Hard delete. Bypasses the state machine: the record goes away in any
    /// status, and its id is pulled from both parties' lists.
    pub async fn delete_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        let role = self.actor_for(user)?;
        match role {
            ActorRole::Admin => {}
            ActorRole::Doctor if appointment.doctor_id.to_string() == user.id => {}
            _ => {
                return Err(AppointmentError::Forbidden(
                    "Only an admin or the appointment's doctor can delete it".to_string(),
                ))
            }
        }

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        let _: Vec<Appointment> = self
            .supabase
            .request_with_headers(Method::DELETE, &path, Some(auth_token), None, Some(headers))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        self.directory
            .unlink_appointment(
                appointment.patient_id,
                appointment.doctor_profile_id,
                appointment_id,
                auth_token,
            )
            .await?;

        info!("Appointment {} deleted by {}", appointment_id, role);
        Ok(())
    }

    pub async fn reconcile_party_links(
        &self,
        auth_token: &str,
    ) -> Result<ReconciliationReport, AppointmentError> {
        let rows: Vec<Appointment> = self
            .supabase
            .request(
                Method::GET,
                "/rest/v1/appointments?order=created_at.asc",
                Some(auth_token),
                None,
            )
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        self.directory
            .reconcile_party_links(&rows, auth_token)
            .await
    }

    // ==========================================================================
    // READ SIDE
    // ==========================================================================

    /// Unscoped denormalized listing. Access control (admin/doctor only) is
    /// the caller's responsibility, not this component's.
    pub async fn list_all(
        &self,
        auth_token: &str,
    ) -> Result<Vec<AppointmentSummary>, AppointmentError> {
        let path = "/rest/v1/appointments?select=id,scheduled_at,status,appointment_type,mode,\
                    location,patient:patients(full_name,email),\
                    doctor_profile:doctor_profiles(full_name,specialization)\
                    &order=scheduled_at.desc";
        self.supabase
            .request(Method::GET, path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))
    }

    pub async fn upcoming_for(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let scope = self.owner_scope(user)?;
        let now = encode_instant(self.clock.now());
        let path = format!(
            "/rest/v1/appointments?{}&scheduled_at=gte.{}&order=scheduled_at.asc",
            scope, now
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))
    }

    pub async fn past_for(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let scope = self.owner_scope(user)?;
        let now = encode_instant(self.clock.now());
        let path = format!(
            "/rest/v1/appointments?{}&scheduled_at=lt.{}&order=scheduled_at.desc",
            scope, now
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))
    }

    /// Civil-date range, both endpoints inclusive: the window closes at the
    /// midnight after `end_date`, so the whole end day is in.
    pub async fn in_date_range(
        &self,
        user: &User,
        start_date: chrono::NaiveDate,
        end_date: chrono::NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        if end_date < start_date {
            return Err(AppointmentError::Validation(
                "end_date must not precede start_date".to_string(),
            ));
        }

        let scope = match user.auth_role() {
            Some(AuthRole::Admin) => String::new(),
            _ => format!("{}&", self.owner_scope(user)?),
        };

        let window_start = validation::start_of_civil_day(start_date)?;
        let day_after_end = end_date.succ_opt().ok_or_else(|| {
            AppointmentError::Validation("end_date is out of range".to_string())
        })?;
        let window_end = validation::combine_ist(day_after_end, NaiveTime::MIN)?;

        let path = format!(
            "/rest/v1/appointments?{}scheduled_at=gte.{}&scheduled_at=lt.{}&order=scheduled_at.asc",
            scope,
            encode_instant(window_start),
            encode_instant(window_end)
        );
        self.supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))
    }

    /// Status counts: doctor-scoped for doctors, unscoped for admins.
    pub async fn stats_for(
        &self,
        user: &User,
        auth_token: &str,
    ) -> Result<AppointmentStats, AppointmentError> {
        let scope = match user.auth_role() {
            Some(AuthRole::Admin) => String::new(),
            Some(AuthRole::Doctor) => format!("&doctor_id=eq.{}", user.id),
            _ => {
                return Err(AppointmentError::Forbidden(
                    "Only doctors and admins can view appointment statistics".to_string(),
                ))
            }
        };

        let path = format!("/rest/v1/appointments?select=status{}", scope);
        let rows: Vec<StatusRow> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        let mut by_status: HashMap<AppointmentStatus, i64> = HashMap::new();
        for row in &rows {
            *by_status.entry(row.status).or_insert(0) += 1;
        }

        Ok(AppointmentStats {
            total: rows.len() as i64,
            by_status,
        })
    }

    // ==========================================================================
    // HELPERS
    // ==========================================================================

    fn actor_for(&self, user: &User) -> Result<ActorRole, AppointmentError> {
        user.auth_role()
            .and_then(ActorRole::from_auth)
            .ok_or_else(|| {
                AppointmentError::Forbidden(
                    "Caller role cannot act on appointments".to_string(),
                )
            })
    }

    /// Patients and doctors may touch only their own appointments; admins
    /// may touch any.
    fn ensure_involved(
        &self,
        appointment: &Appointment,
        user: &User,
        role: ActorRole,
        operation: &str,
    ) -> Result<(), AppointmentError> {
        let allowed = match role {
            ActorRole::Admin => true,
            ActorRole::Patient => appointment.patient_id.to_string() == user.id,
            ActorRole::Doctor => appointment.doctor_id.to_string() == user.id,
        };

        if !allowed {
            return Err(AppointmentError::Forbidden(format!(
                "Not authorized to {} this appointment",
                operation
            )));
        }
        Ok(())
    }

    /// Confirm/complete/no-show are clinician operations: the appointment's
    /// own doctor, or an admin.
    fn ensure_clinician(
        &self,
        appointment: &Appointment,
        user: &User,
        role: ActorRole,
        operation: &str,
    ) -> Result<(), AppointmentError> {
        let allowed = match role {
            ActorRole::Admin => true,
            ActorRole::Doctor => appointment.doctor_id.to_string() == user.id,
            ActorRole::Patient => false,
        };

        if !allowed {
            return Err(AppointmentError::Forbidden(format!(
                "Only the appointment's doctor or an admin can {} it",
                operation
            )));
        }
        Ok(())
    }

    fn owner_scope(&self, user: &User) -> Result<String, AppointmentError> {
        match user.auth_role() {
            Some(AuthRole::Patient) => Ok(format!("patient_id=eq.{}", user.id)),
            Some(AuthRole::Doctor) => Ok(format!("doctor_id=eq.{}", user.id)),
            _ => Err(AppointmentError::Forbidden(
                "Only patients and doctors have an appointment view of their own".to_string(),
            )),
        }
    }

    /// Every mutation stamps `updated_at` and `last_updated_by` alongside
    /// the changed fields, in one PATCH.
    async fn persist_patch(
        &self,
        appointment_id: Uuid,
        mut patch: Map<String, Value>,
        role: ActorRole,
        now: DateTime<FixedOffset>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        patch.insert("last_updated_by".to_string(), json!(role));
        patch.insert("updated_at".to_string(), json!(now));

        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .write_returning(Method::PATCH, &path, Some(auth_token), Value::Object(patch))
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }
}

fn encode_instant(instant: DateTime<FixedOffset>) -> String {
    urlencoding::encode(&instant.to_rfc3339()).into_owned()
}
