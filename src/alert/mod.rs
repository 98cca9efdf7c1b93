//! Alert decisions.
//!
//! Each probe role has its own [`AlertState`]; [`AlertPolicy`] owns all
//! of them and decides, sample by sample, when an alert is raised,
//! retried, suppressed or cleared.

pub mod policy;
pub mod state;

pub use policy::{AlertPolicy, Decision};
pub use state::{AlertState, AlertStatus};
