use std::collections::{BTreeMap, BTreeSet};

use crate::error::AbmError;
use crate::population::{Agent, AgentId};
use crate::states::{HealthState, StateSpace, Statistics};
use crate::testing::TestReason;

/// Work an entry callback asks the driver to do after the current stage, because it involves
/// other agents, places or random draws.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Effect {
    /// Consider a test for the agent.
    RequestTest { agent: AgentId, reason: TestReason },
    /// Place the agent on a hospital's patient roster.
    Admit { agent: AgentId },
    /// A flu agent recovered; another susceptible should take its place.
    FluRecovered { agent: AgentId },
}

/// What an entry callback may touch: the entering agent, the statistics accumulator and the
/// effect buffer.
pub struct EntryContext<'a> {
    pub agent: &'a mut Agent,
    /// `None` when the agent is placed in its initial state.
    pub previous: Option<HealthState>,
    pub day: u32,
    pub stats: &'a mut Statistics,
    pub effects: &'a mut Vec<Effect>,
}

/// Runs when an agent enters a state. Callbacks are deterministic: no random draws.
pub type EntryCallback = fn(&mut EntryContext<'_>);

struct Registration {
    on_entry: EntryCallback,
    next_states: BTreeSet<HealthState>,
}

/// The registry of one role: which states exist, where each may go next, and what happens on
/// entry.
pub struct StateManager<S: StateSpace> {
    registry: BTreeMap<S, Registration>,
}

impl<S: StateSpace> Default for StateManager<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StateSpace> StateManager<S> {
    #[must_use]
    pub fn new() -> StateManager<S> {
        StateManager {
            registry: BTreeMap::new(),
        }
    }

    /// Registers a state and its entry callback. Staying in the state is always legal.
    pub fn register(&mut self, state: S, on_entry: EntryCallback) -> &mut Self {
        let next_states = BTreeSet::from([state.wrap()]);
        self.registry.insert(
            state,
            Registration {
                on_entry,
                next_states,
            },
        );
        self
    }

    #[must_use]
    pub fn is_registered(&self, state: S) -> bool {
        self.registry.contains_key(&state)
    }

    /// Declares `to` a legal next state of `from`.
    pub fn allow(&mut self, from: S, to: HealthState) -> Result<(), AbmError> {
        let registration = self.registry.get_mut(&from).ok_or_else(|| {
            AbmError::config(format!(
                "transition {} -> {to} leaves an unregistered state",
                from.wrap()
            ))
        })?;
        registration.next_states.insert(to);
        Ok(())
    }

    /// The legal next states of `state`, including `state` itself.
    pub fn valid_next_states(&self, state: S) -> Result<Vec<HealthState>, AbmError> {
        self.registry
            .get(&state)
            .map(|registration| registration.next_states.iter().copied().collect())
            .ok_or_else(|| AbmError::config(format!("state {} is not registered", state.wrap())))
    }

    #[must_use]
    pub fn is_valid_transition(&self, from: S, to: HealthState) -> bool {
        self.registry
            .get(&from)
            .is_some_and(|registration| registration.next_states.contains(&to))
    }

    /// Runs the entry callback of the state the context's agent has just entered.
    pub fn apply_entry(&self, state: S, ctx: &mut EntryContext<'_>) -> Result<(), AbmError> {
        let registration = self.registry.get(&state).ok_or_else(|| {
            AbmError::config(format!("state {} has no entry callback", state.wrap()))
        })?;
        (registration.on_entry)(ctx);
        Ok(())
    }

    /// Fails with the list of `required` states that were never registered.
    pub fn check_registered(&self, required: impl IntoIterator<Item = S>) -> Result<(), AbmError> {
        let missing: BTreeSet<S> = required
            .into_iter()
            .filter(|state| !self.is_registered(*state))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            let names: Vec<String> = missing.iter().map(|s| s.wrap().to_string()).collect();
            Err(AbmError::config(format!(
                "states without an entry callback: {}",
                names.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::{HospitalPatientState, RegularState};

    fn noop(_: &mut EntryContext<'_>) {}

    #[test]
    fn registered_state_may_stay() {
        let mut manager = StateManager::new();
        manager.register(RegularState::Exposed, noop);
        assert_eq!(
            manager.valid_next_states(RegularState::Exposed).unwrap(),
            vec![HealthState::Regular(RegularState::Exposed)]
        );
    }

    #[test]
    fn allowed_transitions_are_valid() {
        let mut manager = StateManager::new();
        manager
            .register(RegularState::Severe, noop)
            .register(RegularState::Deceased, noop);
        let admitted = HealthState::HospitalPatient(HospitalPatientState::Admitted);
        manager.allow(RegularState::Severe, admitted).unwrap();
        assert!(manager.is_valid_transition(RegularState::Severe, admitted));
        assert!(!manager.is_valid_transition(
            RegularState::Severe,
            HealthState::Regular(RegularState::Deceased)
        ));
        assert!(manager
            .allow(RegularState::Mild, admitted)
            .is_err());
    }

    #[test]
    fn missing_registrations_are_reported() {
        let mut manager = StateManager::new();
        manager.register(RegularState::Susceptible, noop);
        let error = manager
            .check_registered([RegularState::Susceptible, RegularState::Exposed])
            .unwrap_err();
        assert!(matches!(error, AbmError::ConfigError(m) if m.contains("regular:exposed")));
        assert!(manager.valid_next_states(RegularState::Exposed).is_err());
    }
}
