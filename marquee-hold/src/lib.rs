pub mod manager;
pub mod in_memory;
pub mod sweeper;

pub use manager::{HoldManager, HoldPolicy};
pub use in_memory::InMemoryHoldRepository;
pub use sweeper::spawn_expiry_sweeper;
