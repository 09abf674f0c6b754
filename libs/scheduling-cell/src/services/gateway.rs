// libs/scheduling-cell/src/services/gateway.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::supabase::{SupabaseClient, SupabaseError};

use crate::models::{Appointment, AppointmentStatus, Patient, Provider, SchedulingError, Specialty};

/// Narrow storage contract the reservation engine runs against. Everything
/// the coordinator and the rule set need from durable storage goes through
/// here; SQL, schema and migrations live on the other side of it.
#[async_trait]
pub trait SchedulingGateway: Send + Sync {
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError>;
    async fn patient_active(&self, patient_id: Uuid) -> Result<bool, SchedulingError>;

    async fn provider_exists(&self, provider_id: Uuid) -> Result<bool, SchedulingError>;
    async fn provider_active(&self, provider_id: Uuid) -> Result<bool, SchedulingError>;

    /// Whether a Scheduled appointment already holds this exact
    /// (provider, timestamp) slot.
    async fn appointment_exists_for_provider_at(
        &self,
        provider_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<bool, SchedulingError>;

    /// Whether the patient already holds a Scheduled appointment inside
    /// [day_start, day_end].
    async fn appointment_exists_for_patient_between(
        &self,
        patient_id: Uuid,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<bool, SchedulingError>;

    /// Active provider of the specialty with no Scheduled appointment at the
    /// timestamp. Candidates are considered in ascending id order, so the
    /// lowest eligible id wins.
    async fn find_eligible_provider(
        &self,
        specialty: Specialty,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, SchedulingError>;

    async fn create_appointment(
        &self,
        provider_id: Uuid,
        patient_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError>;

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, SchedulingError>;

    /// Transition the appointment to Cancelled. The caller decides whether
    /// the transition is due; storage only applies it.
    async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError>;

    /// Atomically claim the (provider, timestamp) slot for the duration of a
    /// commit. Returns false when another booking currently holds the claim.
    async fn claim_slot(
        &self,
        provider_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<bool, SchedulingError>;

    async fn release_slot(
        &self,
        provider_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), SchedulingError>;
}

// ==============================================================================
// POSTGREST-BACKED IMPLEMENTATION
// ==============================================================================

pub struct SupabaseGateway {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseGateway {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn row_exists(&self, path: &str) -> Result<bool, SchedulingError> {
        let rows: Vec<Value> = self
            .supabase
            .request(Method::GET, path, None)
            .await
            .map_err(storage_error)?;

        Ok(!rows.is_empty())
    }

    fn claim_key(provider_id: Uuid, scheduled_at: DateTime<Utc>) -> String {
        format!("slot_{}_{}", provider_id, scheduled_at.timestamp())
    }
}

fn storage_error(e: SupabaseError) -> SchedulingError {
    SchedulingError::Database(e.to_string())
}

fn encode_timestamp(scheduled_at: DateTime<Utc>) -> String {
    urlencoding::encode(&scheduled_at.to_rfc3339()).into_owned()
}

#[async_trait]
impl SchedulingGateway for SupabaseGateway {
    async fn patient_exists(&self, patient_id: Uuid) -> Result<bool, SchedulingError> {
        self.row_exists(&format!("/rest/v1/patients?id=eq.{}&select=id", patient_id))
            .await
    }

    /// A missing row reads as inactive; the coordinator resolves existence
    /// separately, before any rule runs.
    async fn patient_active(&self, patient_id: Uuid) -> Result<bool, SchedulingError> {
        let path = format!("/rest/v1/patients?id=eq.{}", patient_id);
        let rows: Vec<Patient> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(storage_error)?;

        Ok(rows.first().map(|patient| patient.is_active).unwrap_or(false))
    }

    async fn provider_exists(&self, provider_id: Uuid) -> Result<bool, SchedulingError> {
        self.row_exists(&format!("/rest/v1/providers?id=eq.{}&select=id", provider_id))
            .await
    }

    async fn provider_active(&self, provider_id: Uuid) -> Result<bool, SchedulingError> {
        let path = format!("/rest/v1/providers?id=eq.{}", provider_id);
        let rows: Vec<Provider> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(storage_error)?;

        Ok(rows.first().map(|provider| provider.is_active).unwrap_or(false))
    }

    async fn appointment_exists_for_provider_at(
        &self,
        provider_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<bool, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?provider_id=eq.{}&scheduled_at=eq.{}&status=eq.{}&select=id",
            provider_id,
            encode_timestamp(scheduled_at),
            AppointmentStatus::Scheduled,
        );
        self.row_exists(&path).await
    }

    async fn appointment_exists_for_patient_between(
        &self,
        patient_id: Uuid,
        day_start: DateTime<Utc>,
        day_end: DateTime<Utc>,
    ) -> Result<bool, SchedulingError> {
        let path = format!(
            "/rest/v1/appointments?patient_id=eq.{}&scheduled_at=gte.{}&scheduled_at=lte.{}&status=eq.{}&select=id",
            patient_id,
            encode_timestamp(day_start),
            encode_timestamp(day_end),
            AppointmentStatus::Scheduled,
        );
        self.row_exists(&path).await
    }

    async fn find_eligible_provider(
        &self,
        specialty: Specialty,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>, SchedulingError> {
        debug!("Searching eligible {} provider for {}", specialty, scheduled_at);

        let path = format!(
            "/rest/v1/providers?specialty=eq.{}&is_active=eq.true&order=id.asc",
            specialty,
        );
        let candidates: Vec<Provider> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(storage_error)?;

        for candidate in candidates {
            if !self
                .appointment_exists_for_provider_at(candidate.id, scheduled_at)
                .await?
            {
                return Ok(Some(candidate.id));
            }
        }

        Ok(None)
    }

    async fn create_appointment(
        &self,
        provider_id: Uuid,
        patient_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<Appointment, SchedulingError> {
        let now = Utc::now();
        let appointment_data = json!({
            "id": Uuid::new_v4(),
            "provider_id": provider_id,
            "patient_id": patient_id,
            "scheduled_at": scheduled_at.to_rfc3339(),
            "status": AppointmentStatus::Scheduled,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_prefer(
                Method::POST,
                "/rest/v1/appointments",
                Some(appointment_data),
                Some("return=representation"),
            )
            .await
            .map_err(|e| {
                if e.is_conflict() {
                    // A uniqueness rejection here is a concurrent booking that
                    // slipped past the validators, not an infrastructure fault.
                    // The violated constraint names the invariant.
                    warn!("Storage rejected appointment insert as conflict: {}", e.message());
                    if e.message().contains("patient") {
                        SchedulingError::PatientDayTaken
                    } else {
                        SchedulingError::ProviderAlreadyBooked
                    }
                } else {
                    storage_error(e)
                }
            })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Database("insert returned no representation".to_string()))
    }

    async fn get_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<Appointment>, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .supabase
            .request(Method::GET, &path, None)
            .await
            .map_err(storage_error)?;

        Ok(rows.into_iter().next())
    }

    async fn cancel_appointment(
        &self,
        appointment_id: Uuid,
    ) -> Result<Appointment, SchedulingError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let update = json!({
            "status": AppointmentStatus::Cancelled,
            "updated_at": Utc::now().to_rfc3339(),
        });

        let rows: Vec<Appointment> = self
            .supabase
            .request_with_prefer(Method::PATCH, &path, Some(update), Some("return=representation"))
            .await
            .map_err(storage_error)?;

        rows.into_iter()
            .next()
            .ok_or(SchedulingError::AppointmentNotFound)
    }

    async fn claim_slot(
        &self,
        provider_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<bool, SchedulingError> {
        let claim = json!({
            "claim_key": Self::claim_key(provider_id, scheduled_at),
            "provider_id": provider_id,
            "claimed_at": Utc::now().to_rfc3339(),
        });

        match self
            .supabase
            .execute(Method::POST, "/rest/v1/slot_claims", Some(claim))
            .await
        {
            Ok(()) => {
                debug!("Slot claim acquired for provider {} at {}", provider_id, scheduled_at);
                Ok(true)
            }
            Err(e) if e.is_conflict() => {
                debug!("Slot claim already held for provider {} at {}", provider_id, scheduled_at);
                Ok(false)
            }
            Err(e) => Err(storage_error(e)),
        }
    }

    async fn release_slot(
        &self,
        provider_id: Uuid,
        scheduled_at: DateTime<Utc>,
    ) -> Result<(), SchedulingError> {
        let path = format!(
            "/rest/v1/slot_claims?claim_key=eq.{}",
            Self::claim_key(provider_id, scheduled_at),
        );
        self.supabase
            .execute(Method::DELETE, &path, None)
            .await
            .map_err(storage_error)?;

        debug!("Slot claim released for provider {} at {}", provider_id, scheduled_at);
        Ok(())
    }
}

// ==============================================================================
// IN-MEMORY DOUBLE FOR UNIT TESTS
// ==============================================================================
