// libs/scheduling-cell/src/services/selection.rs
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::{ReservationRequest, SchedulingError};
use crate::services::gateway::SchedulingGateway;

/// Resolves which provider fulfills a request that already passed the rule
/// set. An explicitly named provider is used as-is; otherwise an eligible
/// candidate of the requested specialty is picked, lowest id first. The
/// deterministic tie-break keeps bookings reproducible under test.
pub struct ProviderSelectionService;

impl ProviderSelectionService {
    pub fn new() -> Self {
        Self
    }

    pub async fn resolve(
        &self,
        request: &ReservationRequest,
        gateway: &dyn SchedulingGateway,
    ) -> Result<Uuid, SchedulingError> {
        if let Some(provider_id) = request.provider_id {
            debug!("Provider {} explicitly requested", provider_id);
            return Ok(provider_id);
        }

        let Some(specialty) = request.specialty else {
            return Err(SchedulingError::SpecialtyRequired);
        };

        match gateway.find_eligible_provider(specialty, request.scheduled_at).await? {
            Some(provider_id) => {
                info!("Selected {} provider {} for {}", specialty, provider_id, request.scheduled_at);
                Ok(provider_id)
            }
            None => {
                info!("No {} provider available at {}", specialty, request.scheduled_at);
                Err(SchedulingError::NoProviderAvailable)
            }
        }
    }
}

impl Default for ProviderSelectionService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{DateTime, TimeZone, Utc};

    use super::*;
    use crate::models::Specialty;
    use crate::services::gateway::testing::InMemoryGateway;

    fn monday_ten() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap()
    }

    fn auto_request(specialty: Option<Specialty>) -> ReservationRequest {
        ReservationRequest {
            provider_id: None,
            patient_id: Uuid::new_v4(),
            scheduled_at: monday_ten(),
            specialty,
        }
    }

    #[tokio::test]
    async fn explicit_provider_is_used_as_is() {
        let gateway = InMemoryGateway::new();
        let provider_id = Uuid::new_v4();
        let mut request = auto_request(None);
        request.provider_id = Some(provider_id);

        let resolved = ProviderSelectionService::new().resolve(&request, &gateway).await.unwrap();
        assert_eq!(resolved, provider_id);
        // Pass-through consults storage for nothing.
        assert_eq!(gateway.queries(), 0);
    }

    #[tokio::test]
    async fn missing_specialty_fails_before_any_storage_query() {
        let gateway = InMemoryGateway::new();
        let request = auto_request(None);

        let result = ProviderSelectionService::new().resolve(&request, &gateway).await;
        assert_matches!(result, Err(SchedulingError::SpecialtyRequired));
        assert_eq!(gateway.queries(), 0);
    }

    #[tokio::test]
    async fn lowest_id_eligible_candidate_wins() {
        let gateway = InMemoryGateway::new();
        let low = Uuid::from_u128(1);
        let high = Uuid::from_u128(2);
        gateway.add_provider(high, Specialty::Cardiology, true);
        gateway.add_provider(low, Specialty::Cardiology, true);

        let request = auto_request(Some(Specialty::Cardiology));
        let resolved = ProviderSelectionService::new().resolve(&request, &gateway).await.unwrap();
        assert_eq!(resolved, low);
    }

    #[tokio::test]
    async fn busy_and_inactive_candidates_are_skipped() {
        let gateway = InMemoryGateway::new();
        let busy = Uuid::from_u128(1);
        let inactive = Uuid::from_u128(2);
        let free = Uuid::from_u128(3);
        gateway.add_provider(busy, Specialty::Cardiology, true);
        gateway.add_provider(inactive, Specialty::Cardiology, false);
        gateway.add_provider(free, Specialty::Cardiology, true);
        gateway.add_appointment(busy, Uuid::new_v4(), monday_ten());

        let request = auto_request(Some(Specialty::Cardiology));
        let resolved = ProviderSelectionService::new().resolve(&request, &gateway).await.unwrap();
        assert_eq!(resolved, free);
    }

    #[tokio::test]
    async fn sole_busy_candidate_means_no_provider_available() {
        let gateway = InMemoryGateway::new();
        let only = Uuid::from_u128(1);
        gateway.add_provider(only, Specialty::Cardiology, true);
        gateway.add_appointment(only, Uuid::new_v4(), monday_ten());

        let request = auto_request(Some(Specialty::Cardiology));
        let result = ProviderSelectionService::new().resolve(&request, &gateway).await;
        assert_matches!(result, Err(SchedulingError::NoProviderAvailable));
    }

    #[tokio::test]
    async fn wrong_specialty_candidates_do_not_count() {
        let gateway = InMemoryGateway::new();
        gateway.add_provider(Uuid::from_u128(1), Specialty::Dermatology, true);

        let request = auto_request(Some(Specialty::Cardiology));
        let result = ProviderSelectionService::new().resolve(&request, &gateway).await;
        assert_matches!(result, Err(SchedulingError::NoProviderAvailable));
    }
}
