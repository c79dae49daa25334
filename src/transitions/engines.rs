use log::debug;

use crate::error::{AbmError, Stage};
use crate::parameters::Parameters;
use crate::population::Agent;
use crate::random::Stream;
use crate::states::{
    callbacks, Effect, EntryContext, FluState, HealthState, HospitalEmployeeState,
    HospitalPatientState, RegularState, Role, StateSpace, Statistics,
};
use crate::transitions::{flu, hospital_employee, hospital_patient, regular, TransitionEngine};

/// Runs `$body` with `$engine` bound to the engine of `$state`'s role and `$inner` to the
/// role-specific state.
macro_rules! dispatch {
    ($engines:expr, $state:expr, |$engine:ident, $inner:ident| $body:expr) => {
        match $state {
            HealthState::Regular($inner) => {
                let $engine = &$engines.regular;
                $body
            }
            HealthState::Flu($inner) => {
                let $engine = &$engines.flu;
                $body
            }
            HealthState::HospitalEmployee($inner) => {
                let $engine = &$engines.hospital_employee;
                $body
            }
            HealthState::HospitalPatient($inner) => {
                let $engine = &$engines.hospital_patient;
                $body
            }
        }
    };
}

/// The four role engines. Routes each agent to the engine of its current role and performs
/// state changes, including hand-offs between roles, through the target role's state manager.
pub struct Engines {
    regular: TransitionEngine<RegularState>,
    flu: TransitionEngine<FluState>,
    hospital_employee: TransitionEngine<HospitalEmployeeState>,
    hospital_patient: TransitionEngine<HospitalPatientState>,
}

impl Engines {
    pub fn from_parameters(parameters: &Parameters) -> Result<Engines, AbmError> {
        let mut regular = TransitionEngine::new(regular::table(parameters)?, callbacks::regular())?;
        // Flu onset is chosen by the driver, not by the rule table.
        regular.allow_external(
            RegularState::Susceptible,
            HealthState::Flu(FluState::Symptomatic),
        )?;

        let engines = Engines {
            regular,
            flu: TransitionEngine::new(flu::table(parameters)?, callbacks::flu())?,
            hospital_employee: TransitionEngine::new(
                hospital_employee::table(parameters)?,
                callbacks::hospital_employee(),
            )?,
            hospital_patient: TransitionEngine::new(
                hospital_patient::table(parameters)?,
                callbacks::hospital_patient(),
            )?,
        };
        engines.check_handoffs()?;
        debug!("transition engines built");
        Ok(engines)
    }

    /// Every state a table or external transition leads to must be registered with the state
    /// manager of its role.
    fn check_handoffs(&self) -> Result<(), AbmError> {
        for state in HealthState::all() {
            for target in self.valid_next_states(state)? {
                let registered =
                    dispatch!(self, target, |engine, inner| engine.manager().is_registered(inner));
                if !registered {
                    return Err(AbmError::config(format!(
                        "{state} leads to unregistered state {target}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// The legal next states of `state`, including `state` itself.
    pub fn valid_next_states(&self, state: HealthState) -> Result<Vec<HealthState>, AbmError> {
        dispatch!(self, state, |engine, inner| engine
            .manager()
            .valid_next_states(inner))
    }

    #[must_use]
    pub fn is_valid_transition(&self, from: HealthState, to: HealthState) -> bool {
        dispatch!(self, from, |engine, inner| engine
            .manager()
            .is_valid_transition(inner, to))
    }

    /// Whether the agent's current rules depend on its infection probability.
    #[must_use]
    pub fn needs_exposure(&self, agent: &Agent) -> bool {
        let age = agent.demographics.age;
        dispatch!(self, agent.state, |engine, inner| engine
            .needs_exposure(inner, age))
    }

    /// The agent's next state under its role's rules, or `None` to stay.
    pub fn decide(&self, agent: &Agent, exposure: f64, stream: &mut Stream) -> Option<HealthState> {
        if agent.state.is_terminal() {
            return None;
        }
        dispatch!(self, agent.state, |engine, inner| engine
            .decide(inner, agent, exposure, stream))
    }

    /// Samples the minimum stay of an agent of the given age entering `state`.
    pub fn sample_hold(&self, state: HealthState, age: u32, stream: &mut Stream) -> u32 {
        dispatch!(self, state, |engine, inner| engine
            .sample_hold(inner, age, stream))
    }

    fn enter(&self, state: HealthState, ctx: &mut EntryContext<'_>) -> Result<(), AbmError> {
        dispatch!(self, state, |engine, inner| engine
            .manager()
            .apply_entry(inner, ctx))
    }

    /// Places an agent in its first state: records it in the census and runs the entry
    /// callback with no previous state.
    pub fn initialize(
        &self,
        agent: &mut Agent,
        state: HealthState,
        hold: u32,
        day: u32,
        stats: &mut Statistics,
        effects: &mut Vec<Effect>,
    ) -> Result<(), AbmError> {
        stats.record_entry(None, state)?;
        agent.state = state;
        agent.dwell = 0;
        agent.hold = hold;
        let mut ctx = EntryContext {
            agent,
            previous: None,
            day,
            stats,
            effects,
        };
        self.enter(state, &mut ctx)
    }

    /// Moves an agent to any state of any role without checking that the move is legal. Only
    /// used to set up initial conditions before the first day.
    pub fn reassign(
        &self,
        agent: &mut Agent,
        to: HealthState,
        hold: u32,
        stats: &mut Statistics,
        effects: &mut Vec<Effect>,
    ) -> Result<(), AbmError> {
        let from = agent.state;
        stats.record_entry(Some(from), to)?;
        agent.state = to;
        agent.dwell = 0;
        agent.hold = hold;
        let mut ctx = EntryContext {
            agent,
            previous: Some(from),
            day: 0,
            stats,
            effects,
        };
        self.enter(to, &mut ctx)
    }

    /// Moves an agent to `to`, which must be a legal next state of its current state. Resets
    /// the dwell time, sets the sampled hold and runs the entry callback of `to`.
    pub fn transition(
        &self,
        agent: &mut Agent,
        to: HealthState,
        hold: u32,
        day: u32,
        stats: &mut Statistics,
        effects: &mut Vec<Effect>,
    ) -> Result<(), AbmError> {
        let from = agent.state;
        if from == to {
            agent.dwell += 1;
            return Ok(());
        }
        if !self.is_valid_transition(from, to) {
            return Err(AbmError::data(
                Some(day),
                Stage::Transitions,
                Some(agent.id),
                format!("illegal transition {from} -> {to}"),
            ));
        }
        stats.record_entry(Some(from), to).map_err(|_| {
            AbmError::data(
                Some(day),
                Stage::Statistics,
                Some(agent.id),
                format!("census of {from} would become negative"),
            )
        })?;
        agent.state = to;
        agent.dwell = 0;
        agent.hold = hold;
        let mut ctx = EntryContext {
            agent,
            previous: Some(from),
            day,
            stats,
            effects,
        };
        self.enter(to, &mut ctx)
    }

    /// Whether agents in `state` are processed by the engine of `role`.
    #[must_use]
    pub fn in_pool(state: HealthState, role: Role) -> bool {
        state.role() == role && !state.is_terminal()
    }
}
