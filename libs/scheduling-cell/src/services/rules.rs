// libs/scheduling-cell/src/services/rules.rs
use chrono::{DateTime, Timelike, Utc};
use tracing::debug;

use crate::models::{ReservationRequest, SchedulingError, SchedulingPolicy};
use crate::services::gateway::SchedulingGateway;

/// One business-rule check over a reservation request. The variants are the
/// complete, closed set of rules; `RuleSet::standard` fixes their order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservationRule {
    /// Not on the closed weekday, hour within [opening, closing - duration].
    BusinessHours,
    /// Requested timestamp at least the minimum lead ahead of submission.
    LeadTime,
    /// An explicitly requested provider must be active. Skipped for
    /// auto-selection, where only active candidates are considered.
    ProviderActive,
    PatientActive,
    /// An explicitly requested provider must be free at the exact timestamp.
    /// Skipped for auto-selection, where busy candidates are never picked.
    ProviderSlotFree,
    /// The patient must hold no other Scheduled appointment within the
    /// business-hours window of that day.
    PatientDayFree,
}

impl ReservationRule {
    pub fn name(&self) -> &'static str {
        match self {
            ReservationRule::BusinessHours => "business_hours",
            ReservationRule::LeadTime => "lead_time",
            ReservationRule::ProviderActive => "provider_active",
            ReservationRule::PatientActive => "patient_active",
            ReservationRule::ProviderSlotFree => "provider_slot_free",
            ReservationRule::PatientDayFree => "patient_day_free",
        }
    }

    pub async fn evaluate(
        &self,
        request: &ReservationRequest,
        now: DateTime<Utc>,
        policy: &SchedulingPolicy,
        gateway: &dyn SchedulingGateway,
    ) -> Result<(), SchedulingError> {
        match self {
            ReservationRule::BusinessHours => {
                let hour = request.scheduled_at.hour();
                if policy.is_closed_on(request.scheduled_at)
                    || hour < policy.opening_hour
                    || hour > policy.last_bookable_hour()
                {
                    return Err(SchedulingError::OutsideBusinessHours);
                }
                Ok(())
            }

            ReservationRule::LeadTime => {
                let lead_minutes = (request.scheduled_at - now).num_minutes();
                if lead_minutes < policy.min_lead_minutes {
                    return Err(SchedulingError::InsufficientLeadTime);
                }
                Ok(())
            }

            ReservationRule::ProviderActive => {
                let Some(provider_id) = request.provider_id else {
                    return Ok(());
                };
                if !gateway.provider_active(provider_id).await? {
                    return Err(SchedulingError::ProviderInactive);
                }
                Ok(())
            }

            ReservationRule::PatientActive => {
                if !gateway.patient_active(request.patient_id).await? {
                    return Err(SchedulingError::PatientInactive);
                }
                Ok(())
            }

            ReservationRule::ProviderSlotFree => {
                let Some(provider_id) = request.provider_id else {
                    return Ok(());
                };
                if gateway
                    .appointment_exists_for_provider_at(provider_id, request.scheduled_at)
                    .await?
                {
                    return Err(SchedulingError::ProviderAlreadyBooked);
                }
                Ok(())
            }

            ReservationRule::PatientDayFree => {
                let (day_start, day_end) = policy.day_window(request.scheduled_at);
                if gateway
                    .appointment_exists_for_patient_between(request.patient_id, day_start, day_end)
                    .await?
                {
                    return Err(SchedulingError::PatientDayTaken);
                }
                Ok(())
            }
        }
    }
}

/// Fixed, explicitly ordered rule sequence assembled at startup. Evaluation
/// fails fast: the first violation aborts and is the only one surfaced.
pub struct RuleSet {
    rules: Vec<ReservationRule>,
}

impl RuleSet {
    pub fn standard() -> Self {
        Self {
            rules: vec![
                ReservationRule::BusinessHours,
                ReservationRule::LeadTime,
                ReservationRule::ProviderActive,
                ReservationRule::PatientActive,
                ReservationRule::ProviderSlotFree,
                ReservationRule::PatientDayFree,
            ],
        }
    }

    pub async fn evaluate(
        &self,
        request: &ReservationRequest,
        now: DateTime<Utc>,
        policy: &SchedulingPolicy,
        gateway: &dyn SchedulingGateway,
    ) -> Result<(), SchedulingError> {
        for rule in &self.rules {
            debug!("Evaluating rule {}", rule.name());
            rule.evaluate(request, now, policy, gateway).await?;
        }
        Ok(())
    }
}
