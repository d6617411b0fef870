// libs/appointment-cell/src/services/directory.rs
use std::sync::Arc;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentError, DoctorProfile, PatientRecord, ReconciliationReport,
};

/// Resolves the party records an appointment references and keeps their
/// appointment-id lists in step with the appointments table. The lists are
/// secondary writes with no shared transaction boundary; failures surface as
/// `PartyLink` so callers see the consistency gap instead of a silent drop.
pub struct PartyDirectoryService {
    supabase: Arc<SupabaseClient>,
}

impl PartyDirectoryService {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    pub async fn get_patient(
        &self,
        patient_id: Uuid,
        auth_token: &str,
    ) -> Result<PatientRecord, AppointmentError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<PatientRecord> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(AppointmentError::PatientNotFound)
    }

    /// Profile looked up by the doctor user it belongs to.
    pub async fn get_doctor_profile(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorProfile, AppointmentError> {
        let path = format!("/rest/v1/doctor_profiles?doctor_id=eq.{}", doctor_id);
        let rows: Vec<DoctorProfile> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(AppointmentError::DoctorNotFound)
    }

    async fn get_doctor_profile_by_id(
        &self,
        profile_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorProfile, AppointmentError> {
        let path = format!("/rest/v1/doctor_profiles?id=eq.{}", profile_id);
        let rows: Vec<DoctorProfile> = self
            .supabase
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| AppointmentError::Database(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(AppointmentError::DoctorNotFound)
    }

    /// Push the new appointment onto both parties' lists.
    pub async fn link_appointment(
        &self,
        patient: &PatientRecord,
        profile: &DoctorProfile,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        debug!(
            "Linking appointment {} to patient {} and doctor profile {}",
            appointment_id, patient.id, profile.id
        );

        let mut patient_ids = patient.appointment_ids.clone();
        if !patient_ids.contains(&appointment_id) {
            patient_ids.push(appointment_id);
        }
        self.write_patient_links(patient.id, &patient_ids, auth_token)
            .await?;

        let mut doctor_ids = profile.appointment_ids.clone();
        if !doctor_ids.contains(&appointment_id) {
            doctor_ids.push(appointment_id);
        }
        self.write_doctor_links(profile.id, &doctor_ids, auth_token)
            .await
    }

    /// Pull a deleted appointment out of both parties' lists.
    pub async fn unlink_appointment(
        &self,
        patient_id: Uuid,
        doctor_profile_id: Uuid,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let patient = self.get_patient(patient_id, auth_token).await?;
        let remaining: Vec<Uuid> = patient
            .appointment_ids
            .iter()
            .copied()
            .filter(|id| *id != appointment_id)
            .collect();
        self.write_patient_links(patient.id, &remaining, auth_token)
            .await?;

        let profile = self
            .get_doctor_profile_by_id(doctor_profile_id, auth_token)
            .await?;
        let remaining: Vec<Uuid> = profile
            .appointment_ids
            .iter()
            .copied()
            .filter(|id| *id != appointment_id)
            .collect();
        self.write_doctor_links(profile.id, &remaining, auth_token)
            .await
    }

    /// Repair sweep for the non-transactional create path: any appointment
    /// missing from a party's list is re-linked.
    pub async fn reconcile_party_links(
        &self,
        appointments: &[Appointment],
        auth_token: &str,
    ) -> Result<ReconciliationReport, AppointmentError> {
        let mut report = ReconciliationReport::default();

        for appointment in appointments {
            report.scanned += 1;

            match self.get_patient(appointment.patient_id, auth_token).await {
                Ok(patient) => {
                    if !patient.appointment_ids.contains(&appointment.id) {
                        let mut ids = patient.appointment_ids.clone();
                        ids.push(appointment.id);
                        self.write_patient_links(patient.id, &ids, auth_token).await?;
                        report.repaired_patient_links += 1;
                    }
                }
                Err(AppointmentError::PatientNotFound) => {
                    warn!(
                        "Appointment {} references missing patient {}",
                        appointment.id, appointment.patient_id
                    );
                }
                Err(e) => return Err(e),
            }

            match self
                .get_doctor_profile_by_id(appointment.doctor_profile_id, auth_token)
                .await
            {
                Ok(profile) => {
                    if !profile.appointment_ids.contains(&appointment.id) {
                        let mut ids = profile.appointment_ids.clone();
                        ids.push(appointment.id);
                        self.write_doctor_links(profile.id, &ids, auth_token).await?;
                        report.repaired_doctor_links += 1;
                    }
                }
                Err(AppointmentError::DoctorNotFound) => {
                    warn!(
                        "Appointment {} references missing doctor profile {}",
                        appointment.id, appointment.doctor_profile_id
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    async fn write_patient_links(
        &self,
        patient_id: Uuid,
        appointment_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let _: Vec<Value> = self
            .supabase
            .write_returning(
                Method::PATCH,
                &path,
                Some(auth_token),
                json!({ "appointment_ids": appointment_ids }),
            )
            .await
            .map_err(|e| AppointmentError::PartyLink(e.to_string()))?;
        Ok(())
    }

    async fn write_doctor_links(
        &self,
        profile_id: Uuid,
        appointment_ids: &[Uuid],
        auth_token: &str,
    ) -> Result<(), AppointmentError> {
        let path = format!("/rest/v1/doctor_profiles?id=eq.{}", profile_id);
        let _: Vec<Value> = self
            .supabase
            .write_returning(
                Method::PATCH,
                &path,
                Some(auth_token),
                json!({ "appointment_ids": appointment_ids }),
            )
            .await
            .map_err(|e| AppointmentError::PartyLink(e.to_string()))?;
        Ok(())
    }
}
