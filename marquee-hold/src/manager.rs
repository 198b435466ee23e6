use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info};
use uuid::Uuid;

use marquee_catalog::PricingEngine;
use marquee_core::repository::{HoldRepository, ResourceRepository, TransitionOutcome};
use marquee_core::{
    Clock, HoldError, HoldResult, HoldTransition, ReservationHold, Resource, ResourceCategory,
    ResourceSummary, TimeWindow,
};
use marquee_shared::HoldEvent;

/// Checkout-hold convention: a hold lives 15 minutes unless confirmed.
pub const DEFAULT_HOLD_TTL_SECONDS: u64 = 15 * 60;

#[derive(Debug, Clone)]
pub struct HoldPolicy {
    hold_ttl: Duration,
    currency: String,
}

impl HoldPolicy {
    pub fn new(hold_ttl_seconds: u64, currency: impl Into<String>) -> HoldResult<Self> {
        if hold_ttl_seconds == 0 {
            return Err(HoldError::Internal("hold_ttl_seconds must be positive".to_string()));
        }
        let seconds = i64::try_from(hold_ttl_seconds)
            .map_err(|_| HoldError::Internal(format!("hold_ttl_seconds too large: {}", hold_ttl_seconds)))?;
        Ok(Self {
            hold_ttl: Duration::seconds(seconds),
            currency: currency.into(),
        })
    }

    pub fn hold_ttl(&self) -> Duration {
        self.hold_ttl
    }
}

impl Default for HoldPolicy {
    fn default() -> Self {
        Self {
            hold_ttl: Duration::seconds(DEFAULT_HOLD_TTL_SECONDS as i64),
            currency: "USD".to_string(),
        }
    }
}

/// Grants, confirms, releases and expires holds. The only writer of hold
/// state; every change is announced on the lifecycle channel.
pub struct HoldManager {
    holds: Arc<dyn HoldRepository>,
    resources: Arc<dyn ResourceRepository>,
    pricing: PricingEngine,
    clock: Arc<dyn Clock>,
    policy: HoldPolicy,
    events: broadcast::Sender<HoldEvent>,
}

impl HoldManager {
    pub fn new(
        holds: Arc<dyn HoldRepository>,
        resources: Arc<dyn ResourceRepository>,
        pricing: PricingEngine,
        clock: Arc<dyn Clock>,
        policy: HoldPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            holds,
            resources,
            pricing,
            clock,
            policy,
            events,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HoldEvent> {
        self.events.subscribe()
    }

    pub async fn create_hold(
        &self,
        resource_id: &str,
        window: TimeWindow,
        owner_ref: &str,
    ) -> HoldResult<ReservationHold> {
        let now = self.clock.now();
        let resource = self.require_resource(resource_id).await?;

        if !resource.horizon.contains(&window) {
            return Err(HoldError::InvalidWindow(format!(
                "{} - {} is outside the bookable horizon of {}",
                window.start().to_rfc3339(),
                window.end().to_rfc3339(),
                resource.id
            )));
        }
        if window.end() <= now {
            return Err(HoldError::InvalidWindow(format!(
                "window ended at {}",
                window.end().to_rfc3339()
            )));
        }

        let price_cents = self.pricing.quote(&resource, &window);
        let hold = ReservationHold::new(
            resource.id.clone(),
            owner_ref.to_string(),
            window,
            price_cents,
            self.policy.currency.clone(),
            now,
            self.policy.hold_ttl,
        )?;

        let hold = match self.holds.insert_if_available(hold, now).await {
            Ok(hold) => hold,
            Err(e) => {
                debug!("Hold on {} refused: {}", resource.id, e);
                return Err(e);
            }
        };

        info!(
            "Hold {} granted on {} until {}",
            hold.hold_id,
            hold.resource_id,
            hold.hold_expires_at.to_rfc3339()
        );
        self.publish(&hold, now);
        Ok(hold)
    }

    pub async fn confirm_hold(&self, hold_id: Uuid, owner_ref: &str) -> HoldResult<ReservationHold> {
        let outcome = self
            .transition(hold_id, HoldTransition::Confirm, owner_ref)
            .await?;
        let TransitionOutcome { hold, result, .. } = outcome;
        result.map(|()| {
            info!("Hold {} confirmed on {}", hold.hold_id, hold.resource_id);
            hold
        })
    }

    pub async fn release_hold(&self, hold_id: Uuid, owner_ref: &str) -> HoldResult<()> {
        let outcome = self
            .transition(hold_id, HoldTransition::Release, owner_ref)
            .await?;
        outcome.result?;
        info!("Hold {} released on {}", outcome.hold.hold_id, outcome.hold.resource_id);
        Ok(())
    }

    /// Owner view of a hold, with a lapsed `Held` reported as `Expired`.
    pub async fn get_hold(&self, hold_id: Uuid, owner_ref: &str) -> HoldResult<ReservationHold> {
        let mut hold = self
            .holds
            .get_hold(hold_id)
            .await?
            .ok_or_else(|| HoldError::HoldNotFound(hold_id.to_string()))?;

        if hold.owner_ref != owner_ref {
            return Err(HoldError::HoldNotOwned(hold_id.to_string()));
        }

        hold.state = hold.effective_state(self.clock.now());
        Ok(hold)
    }

    /// Every hold recorded on a resource, for moderation.
    pub async fn list_resource_holds(&self, resource_id: &str) -> HoldResult<Vec<ReservationHold>> {
        self.require_resource(resource_id).await?;

        let now = self.clock.now();
        let mut holds = self.holds.list_for_resource(resource_id).await?;
        for hold in holds.iter_mut() {
            hold.state = hold.effective_state(now);
        }
        holds.sort_by_key(|h| h.window.start());
        Ok(holds)
    }

    /// Catalog listing with availability and a quote for `window`.
    pub async fn list_resources(
        &self,
        category: Option<ResourceCategory>,
        window: &TimeWindow,
    ) -> HoldResult<Vec<ResourceSummary>> {
        let now = self.clock.now();
        let resources = self.resources.list_resources(category).await?;

        let mut summaries = Vec::with_capacity(resources.len());
        for resource in resources {
            if !resource.horizon.contains(window) {
                summaries.push(ResourceSummary::new(&resource, false, None));
                continue;
            }

            let holds = self.holds.list_for_resource(&resource.id).await?;
            let available = !holds.iter().any(|h| h.blocks(window, now));
            let quote = self.pricing.quote(&resource, window);
            summaries.push(ResourceSummary::new(&resource, available, Some(quote)));
        }
        Ok(summaries)
    }

    pub async fn get_resource(&self, resource_id: &str) -> HoldResult<Resource> {
        self.require_resource(resource_id).await
    }

    /// Demotes every lapsed `Held` hold to `Expired`.
    pub async fn sweep_expired(&self) -> HoldResult<usize> {
        let now = self.clock.now();
        let expired = self.holds.expire_stale(now).await?;
        for hold in &expired {
            debug!("Hold {} on {} expired", hold.hold_id, hold.resource_id);
            self.publish(hold, now);
        }
        Ok(expired.len())
    }

    async fn require_resource(&self, resource_id: &str) -> HoldResult<Resource> {
        self.resources
            .get_resource(resource_id)
            .await?
            .ok_or_else(|| HoldError::ResourceNotFound(resource_id.to_string()))
    }

    async fn transition(
        &self,
        hold_id: Uuid,
        transition: HoldTransition,
        owner_ref: &str,
    ) -> HoldResult<TransitionOutcome> {
        let outcome = self
            .holds
            .apply_transition(hold_id, transition, owner_ref, self.clock.as_ref())
            .await?;

        if outcome.changed() {
            self.publish(&outcome.hold, outcome.at);
        }
        if let Err(e) = &outcome.result {
            debug!("{:?} on hold {} refused: {}", transition, hold_id, e);
        }
        Ok(outcome)
    }

    fn publish(&self, hold: &ReservationHold, now: DateTime<Utc>) {
        // Nobody listening is fine.
        let _ = self.events.send(hold.to_event(now));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use marquee_catalog::InMemoryResourceCatalog;
    use marquee_core::{HoldState, ManualClock, PricingPolicy, SeatTier};
    use marquee_shared::HoldEventKind;

    use crate::InMemoryHoldRepository;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, hour, 0, 0).unwrap()
    }

    fn window(from: u32, to: u32) -> TimeWindow {
        TimeWindow::new(at(from), at(to)).unwrap()
    }

    fn lot(id: &str) -> Resource {
        Resource {
            id: id.to_string(),
            name: format!("Lot {}", id),
            location: "North entrance".to_string(),
            category: ResourceCategory::Parking,
            showtime_id: None,
            tier: SeatTier::Standard,
            horizon: window(0, 23),
            pricing: PricingPolicy::Hourly { base_cents: 200, hourly_cents: 200 },
        }
    }

    fn setup() -> (Arc<HoldManager>, ManualClock) {
        let clock = ManualClock::new(at(9));
        let catalog = InMemoryResourceCatalog::with_resources(vec![lot("lot-1"), lot("lot-2")]);
        let manager = HoldManager::new(
            Arc::new(InMemoryHoldRepository::new()),
            Arc::new(catalog),
            PricingEngine::default(),
            Arc::new(clock.clone()),
            HoldPolicy::default(),
        );
        (Arc::new(manager), clock)
    }

    #[tokio::test]
    async fn test_lot_scenario() {
        let (manager, _clock) = setup();

        let first = manager.create_hold("lot-1", window(10, 13), "guest-a").await.unwrap();
        assert_eq!(first.state, HoldState::Held);
        assert_eq!(first.price_cents, 800);
        assert_eq!(first.hold_expires_at, at(9) + Duration::minutes(15));

        let clash = manager.create_hold("lot-1", window(12, 14), "guest-b").await;
        assert!(matches!(clash, Err(HoldError::ResourceUnavailable(_))));

        manager.release_hold(first.hold_id, "guest-a").await.unwrap();

        let retry = manager.create_hold("lot-1", window(12, 14), "guest-b").await.unwrap();
        assert_eq!(retry.state, HoldState::Held);
    }

    #[tokio::test]
    async fn test_confirm_after_expiry_is_expired() {
        let (manager, clock) = setup();
        let hold = manager.create_hold("lot-1", window(10, 13), "guest-a").await.unwrap();

        clock.advance(Duration::minutes(15) + Duration::seconds(1));

        let err = manager.confirm_hold(hold.hold_id, "guest-a").await.unwrap_err();
        assert!(matches!(err, HoldError::HoldExpired(_)));

        let seen = manager.get_hold(hold.hold_id, "guest-a").await.unwrap();
        assert_eq!(seen.state, HoldState::Expired);
    }

    #[tokio::test]
    async fn test_create_then_confirm_keeps_terms() {
        let (manager, clock) = setup();
        let held = manager.create_hold("lot-1", window(10, 13), "guest-a").await.unwrap();

        clock.advance(Duration::minutes(14));
        let confirmed = manager.confirm_hold(held.hold_id, "guest-a").await.unwrap();

        assert_eq!(confirmed.state, HoldState::Confirmed);
        assert_eq!(confirmed.resource_id, held.resource_id);
        assert_eq!(confirmed.window, held.window);
        assert_eq!(confirmed.price_cents, held.price_cents);
        assert_eq!(confirmed.hold_expires_at, held.hold_expires_at);

        // Confirmed holds keep blocking after the hold deadline.
        clock.advance(Duration::hours(1));
        let clash = manager.create_hold("lot-1", window(11, 12), "guest-b").await;
        assert!(matches!(clash, Err(HoldError::ResourceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_wrong_owner_is_refused_without_mutation() {
        let (manager, _clock) = setup();
        let held = manager.create_hold("lot-1", window(10, 13), "guest-a").await.unwrap();

        let err = manager.confirm_hold(held.hold_id, "guest-b").await.unwrap_err();
        assert!(matches!(err, HoldError::HoldNotOwned(_)));
        let err = manager.release_hold(held.hold_id, "guest-b").await.unwrap_err();
        assert!(matches!(err, HoldError::HoldNotOwned(_)));
        let err = manager.get_hold(held.hold_id, "guest-b").await.unwrap_err();
        assert!(matches!(err, HoldError::HoldNotOwned(_)));

        let unchanged = manager.get_hold(held.hold_id, "guest-a").await.unwrap();
        assert_eq!(unchanged, held);
    }

    #[tokio::test]
    async fn test_terminal_states_are_sinks() {
        let (manager, clock) = setup();

        let released = manager.create_hold("lot-1", window(10, 11), "guest-a").await.unwrap();
        manager.release_hold(released.hold_id, "guest-a").await.unwrap();

        let confirmed = manager.create_hold("lot-1", window(11, 12), "guest-a").await.unwrap();
        manager.confirm_hold(confirmed.hold_id, "guest-a").await.unwrap();

        let expired = manager.create_hold("lot-2", window(10, 11), "guest-a").await.unwrap();
        clock.advance(Duration::minutes(20));
        assert_eq!(manager.sweep_expired().await.unwrap(), 1);

        for (id, state) in [
            (released.hold_id, HoldState::Released),
            (confirmed.hold_id, HoldState::Confirmed),
            (expired.hold_id, HoldState::Expired),
        ] {
            assert!(manager.confirm_hold(id, "guest-a").await.is_err());
            assert!(manager.release_hold(id, "guest-a").await.is_err());
            assert_eq!(manager.get_hold(id, "guest-a").await.unwrap().state, state);
        }

        let err = manager.release_hold(released.hold_id, "guest-a").await.unwrap_err();
        assert!(matches!(err, HoldError::HoldAlreadyTerminal(_, HoldState::Released)));
    }

    #[tokio::test]
    async fn test_lapsed_hold_does_not_block_before_sweep() {
        let (manager, clock) = setup();
        let stale = manager.create_hold("lot-1", window(10, 13), "guest-a").await.unwrap();

        clock.advance(Duration::minutes(15));
        let fresh = manager.create_hold("lot-1", window(12, 14), "guest-b").await.unwrap();
        assert_eq!(fresh.state, HoldState::Held);

        // Storage still says Held until the sweep runs.
        let holds = manager.list_resource_holds("lot-1").await.unwrap();
        assert_eq!(holds.len(), 2);
        let stale_view = holds.iter().find(|h| h.hold_id == stale.hold_id).unwrap();
        assert_eq!(stale_view.state, HoldState::Expired);
    }

    #[tokio::test]
    async fn test_window_validation() {
        let (manager, _clock) = setup();

        let outside_horizon = TimeWindow::new(at(22), at(23) + Duration::hours(2)).unwrap();
        let err = manager.create_hold("lot-1", outside_horizon, "guest-a").await.unwrap_err();
        assert!(matches!(err, HoldError::InvalidWindow(_)));

        let already_over = window(7, 8);
        let err = manager.create_hold("lot-1", already_over, "guest-a").await.unwrap_err();
        assert!(matches!(err, HoldError::InvalidWindow(_)));

        let err = manager.create_hold("lot-404", window(10, 11), "guest-a").await.unwrap_err();
        assert_eq!(err, HoldError::ResourceNotFound("lot-404".to_string()));

        let err = manager.confirm_hold(Uuid::new_v4(), "guest-a").await.unwrap_err();
        assert!(matches!(err, HoldError::HoldNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_resources_reports_availability() {
        let (manager, _clock) = setup();
        manager.create_hold("lot-1", window(10, 13), "guest-a").await.unwrap();

        let summaries = manager
            .list_resources(Some(ResourceCategory::Parking), &window(12, 14))
            .await
            .unwrap();
        assert_eq!(summaries.len(), 2);
        assert!(!summaries[0].available);
        assert!(summaries[1].available);
        assert_eq!(summaries[1].quoted_price_cents, Some(600));

        let seats = manager
            .list_resources(Some(ResourceCategory::Seat), &window(12, 14))
            .await
            .unwrap();
        assert!(seats.is_empty());
    }

    #[tokio::test]
    async fn test_lifecycle_events() {
        let (manager, clock) = setup();
        let mut rx = manager.subscribe();

        let a = manager.create_hold("lot-1", window(10, 11), "guest-a").await.unwrap();
        manager.confirm_hold(a.hold_id, "guest-a").await.unwrap();
        let b = manager.create_hold("lot-2", window(10, 11), "guest-a").await.unwrap();
        clock.advance(Duration::minutes(30));
        // Lazily detected on release, persisted and announced once.
        assert!(manager.release_hold(b.hold_id, "guest-a").await.is_err());
        assert_eq!(manager.sweep_expired().await.unwrap(), 0);

        let kinds: Vec<HoldEventKind> = (0..4).map(|_| rx.try_recv().unwrap().kind).collect();
        assert_eq!(
            kinds,
            vec![
                HoldEventKind::Created,
                HoldEventKind::Confirmed,
                HoldEventKind::Created,
                HoldEventKind::Expired,
            ]
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_overlapping_creates_have_one_winner() {
        let (manager, _clock) = setup();

        let mut tasks = Vec::new();
        for i in 0..32u32 {
            let manager = manager.clone();
            tasks.push(tokio::spawn(async move {
                // Every window contains 12:00-13:00, so all pairs overlap.
                let from = 10 + (i % 3);
                let to = 13 + (i % 4);
                manager
                    .create_hold("lot-1", window(from, to), &format!("guest-{}", i))
                    .await
            }));
        }

        let mut granted = 0;
        let mut refused = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(_) => granted += 1,
                Err(HoldError::ResourceUnavailable(_)) => refused += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!(granted, 1);
        assert_eq!(refused, 31);
    }

    #[test]
    fn test_policy_rejects_zero_ttl() {
        assert!(HoldPolicy::new(0, "USD").is_err());
        assert_eq!(HoldPolicy::new(900, "USD").unwrap().hold_ttl(), Duration::minutes(15));
    }
}
