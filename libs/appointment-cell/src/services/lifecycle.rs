// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::models::{ActorRole, AppointmentError, AppointmentStatus};

/// Pure transition rules for the appointment status machine. Persistence
/// lives in the scheduling service; everything here is a total function over
/// statuses so it can be tested without any storage.
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// All statuses legally reachable from the current one.
    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Completed,
                AppointmentStatus::CancelledByPatient,
                AppointmentStatus::CancelledByDoctor,
                AppointmentStatus::CancelledByAdmin,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::CancelledByPatient,
                AppointmentStatus::CancelledByDoctor,
                AppointmentStatus::CancelledByAdmin,
                AppointmentStatus::NoShow,
            ],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed
            | AppointmentStatus::CancelledByPatient
            | AppointmentStatus::CancelledByDoctor
            | AppointmentStatus::CancelledByAdmin
            | AppointmentStatus::NoShow => vec![],
        }
    }

    pub fn validate_transition(
        &self,
        current: &AppointmentStatus,
        new_status: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition {} -> {}", current, new_status);

        if !self.valid_transitions(current).contains(new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current, new_status);
            return Err(AppointmentError::InvalidTransition {
                current: *current,
                operation: "transition",
            });
        }

        Ok(())
    }

    /// Cancellation is allowed from any non-terminal status; the target is
    /// the cancelled variant owned by the acting role.
    pub fn ensure_cancellable(
        &self,
        current: &AppointmentStatus,
        role: ActorRole,
    ) -> Result<AppointmentStatus, AppointmentError> {
        if current.is_terminal() {
            warn!("Cancel attempted while appointment is {}", current);
            return Err(AppointmentError::InvalidTransition {
                current: *current,
                operation: "cancel",
            });
        }
        Ok(AppointmentStatus::cancelled_by(role))
    }

    /// Confirmation is legal from exactly `scheduled` - re-confirming a
    /// confirmed appointment is rejected.
    pub fn ensure_confirmable(&self, current: &AppointmentStatus) -> Result<(), AppointmentError> {
        if *current != AppointmentStatus::Scheduled {
            warn!("Confirm attempted while appointment is {}", current);
            return Err(AppointmentError::InvalidTransition {
                current: *current,
                operation: "confirm",
            });
        }
        Ok(())
    }

    pub fn ensure_completable(&self, current: &AppointmentStatus) -> Result<(), AppointmentError> {
        if current.is_terminal() {
            warn!("Complete attempted while appointment is {}", current);
            return Err(AppointmentError::InvalidTransition {
                current: *current,
                operation: "complete",
            });
        }
        Ok(())
    }

    /// No-show can only be declared for an appointment that was still
    /// expected to happen.
    pub fn ensure_no_show_allowed(
        &self,
        current: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !matches!(
            current,
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed
        ) {
            warn!("No-show attempted while appointment is {}", current);
            return Err(AppointmentError::InvalidTransition {
                current: *current,
                operation: "mark as no-show",
            });
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}
