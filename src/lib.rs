//! A discrete-time agent-based model of COVID-19 spread.
//!
//! Agents live in households or retirement homes and spend their days at schools, workplaces and
//! hospitals. Every day each susceptible agent is exposed to the infectious agents it shares a
//! place with, and each agent moves through the state machine of its role:
//! * regular agents, the bulk of the population,
//! * agents with flu-like symptoms, who confound symptom-driven testing,
//! * hospital employees, who work on the staff roster of a hospital,
//! * hospital patients, both non-COVID patients and agents admitted with severe COVID.
//!
//! The central object is the [`Abm`](abm::Abm) driver. It owns the population, the
//! [`places`], the role [`transitions`] engines, the [`contributions`] engine, the [`testing`]
//! pipeline and the [`random`] service, and runs the days of one realization from a
//! [`plan`] queue. The [`runner`] loads [`parameters`] and a [`population`] snapshot and runs
//! ensembles of realizations, each writing its own [`report`]s.
//!
//! A realization is fully determined by its parameters, its population and its seed: every
//! agent draws from its own per-day stream, so results do not depend on the order in which
//! agents are processed.
pub mod abm;
pub mod contributions;
pub mod error;
pub mod execution_stats;
pub mod hashing;
pub mod log;
pub mod numeric;
pub mod parameters;
pub mod places;
pub mod plan;
pub mod population;
pub mod random;
pub mod report;
pub mod runner;
pub mod states;
pub mod testing;
pub mod transitions;

pub use abm::Abm;
pub use error::AbmError;
pub use parameters::Parameters;
pub use population::{AgentId, PopulationSnapshot};
pub use states::{HealthState, Role};
