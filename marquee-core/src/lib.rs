pub mod window;
pub mod hold;
pub mod resource;
pub mod repository;
pub mod clock;
pub mod countdown;
pub mod rewards;
pub mod reminder;

pub use window::TimeWindow;
pub use hold::{HoldState, HoldTransition, ReservationHold};
pub use resource::{PricingPolicy, Resource, ResourceCategory, ResourceSummary, SeatTier};
pub use clock::{Clock, ManualClock, SystemClock};

/// Failures surfaced by hold operations.
///
/// Everything except `Internal` is recoverable by the caller: pick another
/// resource or window, or refresh the hold and retry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HoldError {
    #[error("Resource {0} is unavailable for the requested window")]
    ResourceUnavailable(String),
    #[error("Invalid window: {0}")]
    InvalidWindow(String),
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),
    #[error("Hold not found: {0}")]
    HoldNotFound(String),
    #[error("Hold expired: {0}")]
    HoldExpired(String),
    #[error("Hold {0} belongs to another owner")]
    HoldNotOwned(String),
    #[error("Hold {0} is already {1}")]
    HoldAlreadyTerminal(String, HoldState),
    #[error("Internal service error: {0}")]
    Internal(String),
}

impl HoldError {
    /// Stable machine-readable code used on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            HoldError::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            HoldError::InvalidWindow(_) => "INVALID_WINDOW",
            HoldError::ResourceNotFound(_) => "RESOURCE_NOT_FOUND",
            HoldError::HoldNotFound(_) => "HOLD_NOT_FOUND",
            HoldError::HoldExpired(_) => "HOLD_EXPIRED",
            HoldError::HoldNotOwned(_) => "HOLD_NOT_OWNED",
            HoldError::HoldAlreadyTerminal(..) => "HOLD_ALREADY_TERMINAL",
            HoldError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type HoldResult<T> = Result<T, HoldError>;
