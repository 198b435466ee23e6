use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    Clock, HoldResult, HoldState, HoldTransition, ReservationHold, Resource, ResourceCategory,
};

/// Result of running an owner transition inside a repository's critical
/// section. `result` carries the domain outcome; the hold is returned either
/// way so the caller can see a lazily persisted expiry. `at` is the instant
/// the transition was judged against.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub hold: ReservationHold,
    pub previous: HoldState,
    pub result: HoldResult<()>,
    pub at: DateTime<Utc>,
}

impl TransitionOutcome {
    pub fn apply(
        mut hold: ReservationHold,
        transition: HoldTransition,
        owner_ref: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let previous = hold.state;
        let result = hold.apply(transition, owner_ref, now);
        Self { hold, previous, result, at: now }
    }

    /// Whether the stored row has to be rewritten.
    pub fn changed(&self) -> bool {
        self.previous != self.hold.state
    }
}

/// Storage for holds. The only writer of hold state.
///
/// Implementations must serialize every mutation touching one resource:
/// the overlap check and insert in `insert_if_available` form a single
/// atomic step, and transitions never act on a stale state.
#[async_trait]
pub trait HoldRepository: Send + Sync {
    /// Inserts `hold` unless a live hold on the same resource overlaps its
    /// window, in which case `ResourceUnavailable` is returned.
    async fn insert_if_available(
        &self,
        hold: ReservationHold,
        now: DateTime<Utc>,
    ) -> HoldResult<ReservationHold>;

    async fn get_hold(&self, hold_id: Uuid) -> HoldResult<Option<ReservationHold>>;

    /// `HoldNotFound` for an unknown id; every other domain failure is
    /// reported through `TransitionOutcome::result`.
    ///
    /// `clock` is read only once the hold is locked, so a caller that waited
    /// on the lock is judged at the time it got in.
    async fn apply_transition(
        &self,
        hold_id: Uuid,
        transition: HoldTransition,
        owner_ref: &str,
        clock: &dyn Clock,
    ) -> HoldResult<TransitionOutcome>;

    async fn list_for_resource(&self, resource_id: &str) -> HoldResult<Vec<ReservationHold>>;

    /// Moves every `Held` hold with `hold_expires_at <= now` to `Expired` and
    /// returns the holds that changed.
    async fn expire_stale(&self, now: DateTime<Utc>) -> HoldResult<Vec<ReservationHold>>;
}

/// Read access to the bookable resources.
#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn get_resource(&self, id: &str) -> HoldResult<Option<Resource>>;

    async fn list_resources(
        &self,
        category: Option<ResourceCategory>,
    ) -> HoldResult<Vec<Resource>>;

    async fn upsert_resource(&self, resource: &Resource) -> HoldResult<()>;
}
