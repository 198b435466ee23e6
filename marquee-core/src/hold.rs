use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use marquee_shared::{HoldEvent, HoldEventKind};

use crate::{HoldError, HoldResult, TimeWindow};

/// Hold lifecycle. `Held` is the only state with outgoing transitions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldState {
    Held,
    Confirmed,
    Released,
    Expired,
}

impl HoldState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HoldState::Held => "HELD",
            HoldState::Confirmed => "CONFIRMED",
            HoldState::Released => "RELEASED",
            HoldState::Expired => "EXPIRED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "HELD" => Some(HoldState::Held),
            "CONFIRMED" => Some(HoldState::Confirmed),
            "RELEASED" => Some(HoldState::Released),
            "EXPIRED" => Some(HoldState::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, HoldState::Held)
    }
}

impl fmt::Display for HoldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Owner-initiated transitions. Expiry is driven by the clock, not the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldTransition {
    Confirm,
    Release,
}

/// A time-boxed exclusive claim on one resource.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationHold {
    pub hold_id: Uuid,
    pub resource_id: String,
    pub owner_ref: String,
    pub window: TimeWindow,
    pub price_cents: i64,
    pub currency: String,
    pub hold_expires_at: DateTime<Utc>,
    pub state: HoldState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ReservationHold {
    pub fn new(
        resource_id: String,
        owner_ref: String,
        window: TimeWindow,
        price_cents: i64,
        currency: String,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> HoldResult<Self> {
        if ttl <= Duration::zero() {
            return Err(HoldError::Internal(format!(
                "hold ttl must be positive, got {}s",
                ttl.num_seconds()
            )));
        }

        Ok(Self {
            hold_id: Uuid::new_v4(),
            resource_id,
            owner_ref,
            window,
            price_cents,
            currency,
            hold_expires_at: now + ttl,
            state: HoldState::Held,
            created_at: now,
            updated_at: now,
        })
    }

    /// State as observed at `now`: a `Held` hold past its deadline reads as
    /// `Expired` even before the sweep has persisted that.
    pub fn effective_state(&self, now: DateTime<Utc>) -> HoldState {
        match self.state {
            HoldState::Held if now >= self.hold_expires_at => HoldState::Expired,
            state => state,
        }
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        matches!(self.effective_state(now), HoldState::Held | HoldState::Confirmed)
    }

    /// Whether this hold prevents a new hold on `window` at `now`.
    pub fn blocks(&self, window: &TimeWindow, now: DateTime<Utc>) -> bool {
        self.is_live(now) && self.window.overlaps(window)
    }

    /// Persists a lazily detected expiry. Returns true when the state changed.
    pub fn expire_if_stale(&mut self, now: DateTime<Utc>) -> bool {
        if self.state == HoldState::Held && now >= self.hold_expires_at {
            self.state = HoldState::Expired;
            self.updated_at = now;
            return true;
        }
        false
    }

    /// Applies an owner transition.
    ///
    /// The ownership check runs first so a foreign caller never mutates the
    /// hold. A stale `Held` hold is moved to `Expired` before the error is
    /// returned, so callers must persist the hold whenever `state` changed,
    /// even on `Err`.
    pub fn apply(
        &mut self,
        transition: HoldTransition,
        owner_ref: &str,
        now: DateTime<Utc>,
    ) -> HoldResult<()> {
        if self.owner_ref != owner_ref {
            return Err(HoldError::HoldNotOwned(self.hold_id.to_string()));
        }

        self.expire_if_stale(now);

        match (self.state, transition) {
            (HoldState::Held, HoldTransition::Confirm) => {
                self.state = HoldState::Confirmed;
                self.updated_at = now;
                Ok(())
            }
            (HoldState::Held, HoldTransition::Release) => {
                self.state = HoldState::Released;
                self.updated_at = now;
                Ok(())
            }
            (HoldState::Expired, HoldTransition::Confirm) => {
                Err(HoldError::HoldExpired(self.hold_id.to_string()))
            }
            (state, _) => Err(HoldError::HoldAlreadyTerminal(self.hold_id.to_string(), state)),
        }
    }

    pub fn to_event(&self, at: DateTime<Utc>) -> HoldEvent {
        let kind = match self.state {
            HoldState::Held => HoldEventKind::Created,
            HoldState::Confirmed => HoldEventKind::Confirmed,
            HoldState::Released => HoldEventKind::Released,
            HoldState::Expired => HoldEventKind::Expired,
        };

        HoldEvent {
            hold_id: self.hold_id,
            resource_id: self.resource_id.clone(),
            kind,
            window_start: self.window.start(),
            window_end: self.window.end(),
            occurred_at: at.timestamp(),
        }
    }
}
