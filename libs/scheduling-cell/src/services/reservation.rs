// libs/scheduling-cell/src/services/reservation.rs
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::models::{
    Appointment, AppointmentStatus, ReservationConfirmation, ReservationRequest, SchedulingError,
    SchedulingPolicy,
};
use crate::services::gateway::{SchedulingGateway, SupabaseGateway};
use crate::services::rules::RuleSet;
use crate::services::selection::ProviderSelectionService;

/// Orchestrates a reservation end to end: existence checks, the ordered rule
/// set, provider selection and the slot-claim commit, as one all-or-nothing
/// unit. Nothing is written unless every earlier stage passed, and every
/// failure path leaves no partial state behind.
pub struct ReservationService {
    gateway: Arc<dyn SchedulingGateway>,
    rules: RuleSet,
    selection: ProviderSelectionService,
    policy: SchedulingPolicy,
}

impl ReservationService {
    pub fn new(config: &AppConfig) -> Self {
        let supabase = Arc::new(SupabaseClient::new(config));
        Self::with_gateway(Arc::new(SupabaseGateway::new(supabase)))
    }

    pub fn with_gateway(gateway: Arc<dyn SchedulingGateway>) -> Self {
        Self {
            gateway,
            rules: RuleSet::standard(),
            selection: ProviderSelectionService::new(),
            policy: SchedulingPolicy::default(),
        }
    }

    pub async fn reserve(
        &self,
        request: ReservationRequest,
    ) -> Result<ReservationConfirmation, SchedulingError> {
        self.reserve_at(request, Utc::now()).await
    }

    /// `now` is injected so lead-time behavior is testable against a fixed
    /// clock; `reserve` passes the submission instant.
    pub async fn reserve_at(
        &self,
        request: ReservationRequest,
        now: DateTime<Utc>,
    ) -> Result<ReservationConfirmation, SchedulingError> {
        info!(
            "Reserving appointment for patient {} at {} (provider {:?})",
            request.patient_id, request.scheduled_at, request.provider_id
        );

        // Referenced parties must exist before any rule runs; a missing
        // party is a not-found condition, not a rule violation.
        if !self.gateway.patient_exists(request.patient_id).await? {
            return Err(SchedulingError::PatientNotFound);
        }
        if let Some(provider_id) = request.provider_id {
            if !self.gateway.provider_exists(provider_id).await? {
                return Err(SchedulingError::ProviderNotFound);
            }
        }

        self.rules
            .evaluate(&request, now, &self.policy, self.gateway.as_ref())
            .await?;

        let provider_id = self.selection.resolve(&request, self.gateway.as_ref()).await?;

        // Commit under a slot claim. A losing claim means a concurrent
        // booking holds the slot right now.
        if !self.gateway.claim_slot(provider_id, request.scheduled_at).await? {
            info!("Slot claim lost for provider {} at {}", provider_id, request.scheduled_at);
            return Err(SchedulingError::ProviderAlreadyBooked);
        }

        let outcome = self.commit(provider_id, &request).await;

        // The claim is released on every path; a failed release only costs a
        // stale row the storage layer sweeps, so it must not mask the outcome.
        if let Err(e) = self.gateway.release_slot(provider_id, request.scheduled_at).await {
            warn!("Failed to release slot claim for provider {}: {}", provider_id, e);
        }

        let appointment = outcome?;
        info!(
            "Appointment {} reserved for patient {} with provider {}",
            appointment.id, appointment.patient_id, appointment.provider_id
        );

        Ok(ReservationConfirmation::from(&appointment))
    }

    /// Runs under the slot claim: both uniqueness invariants are re-checked
    /// to close the check-then-act window (the provider-slot rule was
    /// skipped entirely for auto-selected providers), then the insert goes
    /// through. A storage uniqueness rejection still surfaces as the
    /// matching conflict violation.
    async fn commit(
        &self,
        provider_id: Uuid,
        request: &ReservationRequest,
    ) -> Result<Appointment, SchedulingError> {
        if self
            .gateway
            .appointment_exists_for_provider_at(provider_id, request.scheduled_at)
            .await?
        {
            return Err(SchedulingError::ProviderAlreadyBooked);
        }

        let (day_start, day_end) = self.policy.day_window(request.scheduled_at);
        if self
            .gateway
            .appointment_exists_for_patient_between(request.patient_id, day_start, day_end)
            .await?
        {
            return Err(SchedulingError::PatientDayTaken);
        }

        self.gateway
            .create_appointment(provider_id, request.patient_id, request.scheduled_at)
            .await
    }

    pub async fn get_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        debug!("Fetching appointment {}", appointment_id);
        self.gateway
            .get_appointment(appointment_id)
            .await?
            .ok_or(SchedulingError::AppointmentNotFound)
    }

    /// Scheduled -> Cancelled. Cancelling an already-Cancelled appointment
    /// is idempotent: the stored row comes back unchanged, no write issued.
    pub async fn cancel_appointment(&self, appointment_id: Uuid) -> Result<Appointment, SchedulingError> {
        let appointment = self.get_appointment(appointment_id).await?;

        if appointment.status == AppointmentStatus::Cancelled {
            debug!("Appointment {} already cancelled", appointment_id);
            return Ok(appointment);
        }

        let cancelled = self.gateway.cancel_appointment(appointment_id).await?;
        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }
}
