use serde::{Deserialize, Serialize};

use crate::SeatTier;

/// Booking-level rule for the spin-wheel reward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardPolicy {
    /// Premium seats needed in a single booking to unlock a spin.
    pub premium_seats_for_spin: usize,
}

impl Default for RewardPolicy {
    fn default() -> Self {
        Self { premium_seats_for_spin: 3 }
    }
}

impl RewardPolicy {
    pub fn spin_eligible(&self, seats: &[SeatTier]) -> bool {
        let premium = seats.iter().filter(|tier| **tier == SeatTier::Premium).count();
        self.premium_seats_for_spin > 0 && premium >= self.premium_seats_for_spin
    }
}
