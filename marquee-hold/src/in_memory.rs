use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use marquee_core::repository::{HoldRepository, TransitionOutcome};
use marquee_core::{Clock, HoldError, HoldResult, HoldTransition, ReservationHold};

type Ledger = Arc<Mutex<Vec<ReservationHold>>>;

/// Hold storage with one ledger per resource.
///
/// Each ledger sits behind its own mutex, which is the per-resource critical
/// section: creates and transitions on one resource run one at a time, while
/// different resources never wait on each other. The maps are only locked
/// long enough to find a ledger, never across a ledger lock.
pub struct InMemoryHoldRepository {
    ledgers: RwLock<HashMap<String, Ledger>>,
    // hold id -> resource id
    index: RwLock<HashMap<Uuid, String>>,
}

impl InMemoryHoldRepository {
    pub fn new() -> Self {
        Self {
            ledgers: RwLock::new(HashMap::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    async fn ledger(&self, resource_id: &str) -> Ledger {
        if let Some(ledger) = self.ledgers.read().await.get(resource_id) {
            return ledger.clone();
        }
        self.ledgers
            .write()
            .await
            .entry(resource_id.to_string())
            .or_default()
            .clone()
    }

    async fn ledger_for_hold(&self, hold_id: Uuid) -> Option<Ledger> {
        let resource_id = self.index.read().await.get(&hold_id).cloned()?;
        self.ledgers.read().await.get(&resource_id).cloned()
    }
}

impl Default for InMemoryHoldRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HoldRepository for InMemoryHoldRepository {
    async fn insert_if_available(
        &self,
        hold: ReservationHold,
        now: DateTime<Utc>,
    ) -> HoldResult<ReservationHold> {
        let ledger = self.ledger(&hold.resource_id).await;
        let mut holds = ledger.lock().await;

        if let Some(blocking) = holds.iter().find(|h| h.blocks(&hold.window, now)) {
            tracing::debug!(
                "Hold on {} rejected, overlaps {} ({})",
                hold.resource_id,
                blocking.hold_id,
                blocking.state
            );
            return Err(HoldError::ResourceUnavailable(hold.resource_id.clone()));
        }

        self.index
            .write()
            .await
            .insert(hold.hold_id, hold.resource_id.clone());
        holds.push(hold.clone());
        Ok(hold)
    }

    async fn get_hold(&self, hold_id: Uuid) -> HoldResult<Option<ReservationHold>> {
        let Some(ledger) = self.ledger_for_hold(hold_id).await else {
            return Ok(None);
        };
        let holds = ledger.lock().await;
        Ok(holds.iter().find(|h| h.hold_id == hold_id).cloned())
    }

    async fn apply_transition(
        &self,
        hold_id: Uuid,
        transition: HoldTransition,
        owner_ref: &str,
        clock: &dyn Clock,
    ) -> HoldResult<TransitionOutcome> {
        let ledger = self
            .ledger_for_hold(hold_id)
            .await
            .ok_or_else(|| HoldError::HoldNotFound(hold_id.to_string()))?;
        let mut holds = ledger.lock().await;

        let slot = holds
            .iter_mut()
            .find(|h| h.hold_id == hold_id)
            .ok_or_else(|| HoldError::HoldNotFound(hold_id.to_string()))?;

        let outcome = TransitionOutcome::apply(slot.clone(), transition, owner_ref, clock.now());
        if outcome.changed() {
            *slot = outcome.hold.clone();
        }
        Ok(outcome)
    }

    async fn list_for_resource(&self, resource_id: &str) -> HoldResult<Vec<ReservationHold>> {
        let ledger = self.ledgers.read().await.get(resource_id).cloned();
        match ledger {
            Some(ledger) => Ok(ledger.lock().await.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> HoldResult<Vec<ReservationHold>> {
        let ledgers: Vec<Ledger> = self.ledgers.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for ledger in ledgers {
            let mut holds = ledger.lock().await;
            for hold in holds.iter_mut() {
                if hold.expire_if_stale(now) {
                    expired.push(hold.clone());
                }
            }
        }
        Ok(expired)
    }
}
