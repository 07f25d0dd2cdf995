//! GSMP potato analysis.
//!
//! For one non-exponential event of an ACTMC, computes the transient
//! behaviour of the underlying CTMC while the event's timer is pending:
//! expected residence times, the distribution right after the event fires,
//! and expected accumulated rewards. An outer GSMP algorithm uses these to
//! replace the event by an equivalent one-shot transition.
//!
//! ```ignore
//! use gsmp_core::model::{Actmc, Event, EventDistribution};
//! use gsmp_core::potato::Potato;
//!
//! let mut actmc = Actmc::new(3);
//! actmc.add_rate(0, 1, 1.0)?;
//! let mut timeout = Event::new("timeout", EventDistribution::Dirac { timeout: 2.0 });
//! timeout.add_to_probability(0, 2, 1.0);
//! actmc.add_event(timeout)?;
//!
//! let event = actmc.event("timeout").unwrap();
//! let mut potato = Potato::new(&actmc, event);
//! potato.set_kappa(1e-10)?;
//! let after = potato.mean_distribution(0)?;
//! ```

pub mod logging;
pub mod model;
pub mod potato;

pub use gsmp_common::{Error, Result};
pub use model::{Actmc, ActmcRewards, Event, EventDistribution, RewardModel};
pub use potato::Potato;
