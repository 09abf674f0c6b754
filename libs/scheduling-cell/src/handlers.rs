// libs/scheduling-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::error::AppError;

use crate::models::{Appointment, ReservationConfirmation, ReservationRequest, SchedulingError};
use crate::services::reservation::ReservationService;

fn map_scheduling_error(e: SchedulingError) -> AppError {
    match e {
        SchedulingError::PatientNotFound
        | SchedulingError::ProviderNotFound
        | SchedulingError::AppointmentNotFound => AppError::NotFound(e.to_string()),

        // Conflicts cover both the validator result and the storage-level
        // race: callers see the same category either way.
        SchedulingError::ProviderAlreadyBooked => AppError::Conflict(e.to_string()),

        SchedulingError::Database(_) => AppError::Database(e.to_string()),

        SchedulingError::OutsideBusinessHours
        | SchedulingError::InsufficientLeadTime
        | SchedulingError::ProviderInactive
        | SchedulingError::PatientInactive
        | SchedulingError::PatientDayTaken
        | SchedulingError::SpecialtyRequired
        | SchedulingError::NoProviderAvailable => AppError::ValidationError(e.to_string()),
    }
}

#[axum::debug_handler]
pub async fn reserve_appointment(
    State(state): State<Arc<AppConfig>>,
    Json(request): Json<ReservationRequest>,
) -> Result<Json<ReservationConfirmation>, AppError> {
    let service = ReservationService::new(&state);

    let confirmation = service.reserve(request).await.map_err(map_scheduling_error)?;

    Ok(Json(confirmation))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let service = ReservationService::new(&state);

    let appointment = service
        .get_appointment(appointment_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
) -> Result<Json<Appointment>, AppError> {
    let service = ReservationService::new(&state);

    let appointment = service
        .cancel_appointment(appointment_id)
        .await
        .map_err(map_scheduling_error)?;

    Ok(Json(appointment))
}
