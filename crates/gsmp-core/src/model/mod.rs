//! ACTMC model: a CTMC, its timed events and rewards.

pub mod ctmc;
pub mod event;
pub mod rewards;

pub use ctmc::Actmc;
pub use event::{Event, EventDistribution};
pub use rewards::{ActmcRewards, RewardModel};
