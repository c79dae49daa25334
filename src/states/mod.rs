//! Role state spaces, their state managers, and the statistics accumulator.
//!
//! Each role (regular, flu, hospital employee, hospital patient) has its own enumeration of
//! states. An agent's [`HealthState`] is tagged with its role. A [`StateManager`] per role
//! registers every state with an entry callback and the set of states it may move to; the
//! callbacks for all roles live in [`callbacks`].

pub mod callbacks;
mod health;
mod manager;
mod statistics;

pub use health::{
    Compartment, FluState, HealthState, HospitalEmployeeState, HospitalPatientState,
    RegularState, Role, StateSpace,
};
pub use manager::{Effect, EntryCallback, EntryContext, StateManager};
pub use statistics::{Counter, Counters, Statistics};
