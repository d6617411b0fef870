// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::{AuthRole, User};
use shared_models::error::AppError;

use crate::models::{
    ActorRole, AppointmentError, CancelAppointmentRequest, CompleteAppointmentRequest,
    CreateAppointmentRequest, DateRangeQuery, UpdateAppointmentRequest,
};
use crate::services::scheduling::AppointmentSchedulingService;

fn to_app_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound
        | AppointmentError::PatientNotFound
        | AppointmentError::DoctorNotFound => AppError::NotFound(err.to_string()),
        AppointmentError::InvalidTime(_)
        | AppointmentError::Validation(_)
        | AppointmentError::InvalidTransition { .. } => AppError::BadRequest(err.to_string()),
        AppointmentError::Forbidden(msg) => AppError::Forbidden(msg),
        AppointmentError::PartyLink(msg) => AppError::Internal(msg),
        AppointmentError::Database(msg) => AppError::Internal(msg),
    }
}

fn acting_role(user: &User) -> Result<ActorRole, AppError> {
    user.auth_role()
        .and_then(ActorRole::from_auth)
        .ok_or_else(|| AppError::Forbidden("Caller role cannot act on appointments".to_string()))
}

// ==============================================================================
// WRITE HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn create_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CreateAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let token = auth.token();

    let role = acting_role(&user)?;
    // Patients book for themselves; doctors and admins can book for anyone.
    if role == ActorRole::Patient && request.patient_id.to_string() != user.id {
        return Err(AppError::Forbidden(
            "Patients can only book their own appointments".to_string(),
        ));
    }

    let service = AppointmentSchedulingService::new(&state);

    let appointment = service
        .create_appointment(request, role, token)
        .await
        .map_err(to_app_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn update_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointment = service
        .update_appointment(appointment_id, request, &user, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointment = service
        .cancel_appointment(appointment_id, &user, request.reason, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointment = service
        .confirm_appointment(appointment_id, &user, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment confirmed"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointment = service
        .complete_appointment(appointment_id, &user, request.notes, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointment = service
        .mark_no_show(appointment_id, &user, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment marked as no-show"
    })))
}

#[axum::debug_handler]
pub async fn delete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    service
        .delete_appointment(appointment_id, &user, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(Value::Null))
}

#[axum::debug_handler]
pub async fn reconcile_party_links(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !user.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can run reconciliation".to_string(),
        ));
    }

    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let report = service
        .reconcile_party_links(token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "success": true,
        "report": report
    })))
}

// ==============================================================================
// READ HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointment = service
        .get_appointment(appointment_id, token)
        .await
        .map_err(to_app_error)?;

    // Only a party to the appointment, or an admin, can view it
    let is_patient = appointment.patient_id.to_string() == user.id;
    let is_doctor = appointment.doctor_id.to_string() == user.id;
    if !is_patient && !is_doctor && !user.is_admin() {
        return Err(AppError::Forbidden(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    if !matches!(
        user.auth_role(),
        Some(AuthRole::Admin) | Some(AuthRole::Doctor)
    ) {
        return Err(AppError::Forbidden(
            "Only doctors and admins can list all appointments".to_string(),
        ));
    }

    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointments = service.list_all(token).await.map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn upcoming_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointments = service
        .upcoming_for(&user, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn past_appointments(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointments = service
        .past_for(&user, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn appointments_in_range(
    State(state): State<Arc<AppConfig>>,
    Query(range): Query<DateRangeQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let appointments = service
        .in_date_range(&user, range.start_date, range.end_date, token)
        .await
        .map_err(to_app_error)?;

    Ok(Json(json!({
        "appointments": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn appointment_stats(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let service = AppointmentSchedulingService::new(&state);

    let stats = service.stats_for(&user, token).await.map_err(to_app_error)?;

    Ok(Json(json!(stats)))
}
