//! Rule tables and the generic transition engine.
//!
//! Each role's behaviour is data: a [`RuleTable`] maps a state to rule sets, and a rule set
//! lists candidate next states with their probabilities and minimum dwell times. One
//! [`TransitionEngine`] implementation, monomorphised per role, interprets the tables. The
//! [`Engines`] dispatcher routes a tagged [`HealthState`] to the engine of its role and carries
//! out hand-offs between roles.
//!
//! Dwell arithmetic: `Agent::dwell` counts the daily steps an agent has already stayed in its
//! state. During a step the elapsed time is `dwell + 1`, so an agent entering a state on day
//! `d` may leave it through a candidate with minimum dwell `k` on day `d + k` at the earliest.

mod engines;
pub mod flu;
pub mod hospital_employee;
pub mod hospital_patient;
pub mod regular;

use std::collections::{BTreeMap, BTreeSet};

use log::trace;

pub use engines::Engines;

use crate::error::AbmError;
use crate::numeric::{is_probability, sums_to_at_most_one};
use crate::parameters::Parameters;
use crate::population::Agent;
use crate::random::{Sampler, Stream};
use crate::states::{HealthState, StateManager, StateSpace};

/// The probability of moving to a candidate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Probability {
    Fixed(f64),
    /// The agent's daily infection probability from the contributions engine.
    Exposure,
}

impl Probability {
    fn value(self, exposure: f64) -> f64 {
        match self {
            Probability::Fixed(p) => p,
            Probability::Exposure => exposure,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Candidate {
    /// A state of the same role, or a hand-off into another role's state.
    pub target: HealthState,
    pub probability: Probability,
    pub min_dwell: u32,
}

impl Candidate {
    #[must_use]
    pub fn fixed(target: HealthState, probability: f64, min_dwell: u32) -> Candidate {
        Candidate {
            target,
            probability: Probability::Fixed(probability),
            min_dwell,
        }
    }

    #[must_use]
    pub fn exposure(target: HealthState) -> Candidate {
        Candidate {
            target,
            probability: Probability::Exposure,
            min_dwell: 0,
        }
    }
}

/// Which agents a rule set applies to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Condition {
    Always,
    /// Ages in `min..max`; no upper bound when `max` is `None`.
    AgeBand { min: u32, max: Option<u32> },
}

impl Condition {
    #[must_use]
    pub fn matches(self, age: u32) -> bool {
        match self {
            Condition::Always => true,
            Condition::AgeBand { min, max } => age >= min && max.is_none_or(|max| age < max),
        }
    }
}

#[derive(Clone, Debug)]
pub struct StateRules {
    pub condition: Condition,
    /// Per-agent minimum stay, drawn when an agent enters the state. Without a distribution
    /// only the candidates' minimum dwell times apply.
    pub hold: Option<Sampler>,
    /// Evaluated in order; exposure candidates come first.
    pub candidates: Vec<Candidate>,
}

impl StateRules {
    #[must_use]
    pub fn always(candidates: Vec<Candidate>) -> StateRules {
        StateRules {
            condition: Condition::Always,
            hold: None,
            candidates,
        }
    }

    #[must_use]
    pub fn with_hold(mut self, hold: Option<Sampler>) -> StateRules {
        self.hold = hold;
        self
    }

    fn has_exposure(&self) -> bool {
        self.candidates
            .iter()
            .any(|c| c.probability == Probability::Exposure)
    }
}

/// One rule set per age band of the parameters, built by `rules_for_band(band)`.
pub(crate) fn age_banded(
    parameters: &Parameters,
    mut rules_for_band: impl FnMut(usize) -> StateRules,
) -> Vec<StateRules> {
    let bands = &parameters.age_bands;
    (0..bands.len())
        .map(|band| {
            let mut rules = rules_for_band(band);
            rules.condition = Condition::AgeBand {
                min: bands[band],
                max: bands.get(band + 1).copied(),
            };
            rules
        })
        .collect()
}

/// The transition rules of one role. Immutable once the engines are built.
pub struct RuleTable<S: StateSpace> {
    rules: BTreeMap<S, Vec<StateRules>>,
}

impl<S: StateSpace> Default for RuleTable<S> {
    fn default() -> Self {
        RuleTable {
            rules: BTreeMap::new(),
        }
    }
}

impl<S: StateSpace> RuleTable<S> {
    #[must_use]
    pub fn new() -> RuleTable<S> {
        RuleTable::default()
    }

    /// Appends rule sets for a state. The first whose condition matches an agent applies.
    pub fn add(&mut self, state: S, rules: impl IntoIterator<Item = StateRules>) -> &mut Self {
        self.rules.entry(state).or_default().extend(rules);
        self
    }

    #[must_use]
    pub fn rules_for(&self, state: S, age: u32) -> Option<&StateRules> {
        self.rules
            .get(&state)?
            .iter()
            .find(|rules| rules.condition.matches(age))
    }

    /// Every target any rule set of `state` can lead to.
    #[must_use]
    pub fn targets(&self, state: S) -> BTreeSet<HealthState> {
        self.rules
            .get(&state)
            .into_iter()
            .flatten()
            .flat_map(|rules| rules.candidates.iter().map(|c| c.target))
            .collect()
    }

    pub fn states(&self) -> impl Iterator<Item = S> + '_ {
        self.rules.keys().copied()
    }

    pub fn validate(&self) -> Result<(), AbmError> {
        for (state, rule_sets) in &self.rules {
            let name = state.wrap();
            if state.is_terminal() {
                return Err(AbmError::config(format!(
                    "terminal state {name} has transition rules"
                )));
            }
            for rules in rule_sets {
                if rules.candidates.is_empty() {
                    return Err(AbmError::config(format!(
                        "a rule set of {name} has no candidates"
                    )));
                }
                let mut total = 0.0;
                let mut seen_fixed = false;
                for candidate in &rules.candidates {
                    if candidate.target == name {
                        return Err(AbmError::config(format!(
                            "{name} lists itself as a candidate"
                        )));
                    }
                    match candidate.probability {
                        Probability::Fixed(p) => {
                            if !is_probability(p) {
                                return Err(AbmError::config(format!(
                                    "{name} -> {}: {p} is not a probability",
                                    candidate.target
                                )));
                            }
                            total += p;
                            seen_fixed = true;
                        }
                        Probability::Exposure if seen_fixed => {
                            return Err(AbmError::config(format!(
                                "{name}: exposure candidates must come before fixed ones"
                            )));
                        }
                        Probability::Exposure => {}
                    }
                }
                if !sums_to_at_most_one(total) {
                    return Err(AbmError::config(format!(
                        "probabilities out of {name} sum to {total}"
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A role's rule table plus its state manager.
pub struct TransitionEngine<S: StateSpace> {
    table: RuleTable<S>,
    manager: StateManager<S>,
}

impl<S: StateSpace> TransitionEngine<S> {
    /// Validates the table, checks that every state of the role has an entry callback and
    /// declares the table's transitions legal in the manager.
    pub fn new(table: RuleTable<S>, mut manager: StateManager<S>) -> Result<Self, AbmError> {
        table.validate()?;
        manager.check_registered(S::iter())?;
        let edges: Vec<(S, HealthState)> = table
            .states()
            .flat_map(|state| table.targets(state).into_iter().map(move |to| (state, to)))
            .collect();
        for (from, to) in edges {
            manager.allow(from, to)?;
        }
        Ok(TransitionEngine { table, manager })
    }

    /// Declares a transition that is triggered outside the rule table.
    pub fn allow_external(&mut self, from: S, to: HealthState) -> Result<(), AbmError> {
        self.manager.allow(from, to)
    }

    #[must_use]
    pub fn table(&self) -> &RuleTable<S> {
        &self.table
    }

    #[must_use]
    pub fn manager(&self) -> &StateManager<S> {
        &self.manager
    }

    #[must_use]
    pub fn needs_exposure(&self, state: S, age: u32) -> bool {
        self.table
            .rules_for(state, age)
            .is_some_and(StateRules::has_exposure)
    }

    /// Samples the minimum stay of an agent entering `state`.
    pub fn sample_hold(&self, state: S, age: u32, stream: &mut Stream) -> u32 {
        self.table
            .rules_for(state, age)
            .and_then(|rules| rules.hold.as_ref())
            .map_or(0, |hold| stream.sample_days(hold))
    }

    /// Chooses the agent's next state, or `None` to stay. Takes one draw when at least one
    /// candidate is eligible and none otherwise. Terminal states have no rules and never draw.
    pub fn decide(
        &self,
        state: S,
        agent: &Agent,
        exposure: f64,
        stream: &mut Stream,
    ) -> Option<HealthState> {
        let rules = self.table.rules_for(state, agent.demographics.age)?;
        let elapsed = agent.dwell + 1;
        if elapsed < agent.hold {
            return None;
        }
        let mut eligible = rules
            .candidates
            .iter()
            .filter(|candidate| elapsed >= candidate.min_dwell)
            .peekable();
        eligible.peek()?;

        let draw = stream.uniform();
        let mut cumulative = 0.0;
        for candidate in eligible {
            cumulative += candidate.probability.value(exposure);
            if draw < cumulative {
                trace!(
                    "agent {}: {} -> {} (draw {draw:.4})",
                    agent.id,
                    state.wrap(),
                    candidate.target
                );
                return Some(candidate.target);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::{PlaceId, PlaceKind};
    use crate::population::{AgentId, Demographics};
    use crate::random::{DistributionSpec, RngService, StreamKind};
    use crate::states::{callbacks, HospitalPatientState, RegularState};

    const EXPOSED: HealthState = HealthState::Regular(RegularState::Exposed);
    const MILD: HealthState = HealthState::Regular(RegularState::Mild);
    const RECOVERED: HealthState = HealthState::Regular(RegularState::Recovered);

    fn agent(age: u32, state: RegularState, dwell: u32) -> Agent {
        let demographics = Demographics {
            age,
            x: 0.0,
            y: 0.0,
            student: false,
            works: false,
            residence: PlaceId::new(PlaceKind::Household, 0),
            school: None,
            work: None,
            hospital: None,
            hospital_employee: false,
            non_covid_patient: false,
            infected: false,
        };
        let mut agent = Agent::new(AgentId::new(0), demographics);
        agent.state = state.wrap();
        agent.dwell = dwell;
        agent
    }

    fn engine() -> TransitionEngine<RegularState> {
        let mut table = RuleTable::new();
        table
            .add(
                RegularState::Susceptible,
                [StateRules::always(vec![Candidate::exposure(EXPOSED)])],
            )
            .add(
                RegularState::Exposed,
                [StateRules::always(vec![Candidate::fixed(MILD, 1.0, 3)])],
            )
            .add(
                RegularState::Mild,
                [
                    StateRules {
                        condition: Condition::AgeBand {
                            min: 0,
                            max: Some(60),
                        },
                        hold: None,
                        candidates: vec![Candidate::fixed(RECOVERED, 1.0, 1)],
                    },
                    StateRules::always(vec![Candidate::fixed(RECOVERED, 0.0, 1)]),
                ],
            );
        TransitionEngine::new(table, callbacks::regular()).unwrap()
    }

    #[test]
    fn waits_for_min_dwell() {
        let engine = engine();
        let rng = RngService::new(1);
        let mut stream = rng.substream(StreamKind::Transition, 0, AgentId::new(0));
        let early = agent(30, RegularState::Exposed, 1);
        assert_eq!(
            engine.decide(RegularState::Exposed, &early, 0.0, &mut stream),
            None
        );
        assert_eq!(stream.draws(), 0);
        let due = agent(30, RegularState::Exposed, 2);
        assert_eq!(
            engine.decide(RegularState::Exposed, &due, 0.0, &mut stream),
            Some(MILD)
        );
        assert_eq!(stream.draws(), 1);
    }

    #[test]
    fn hold_delays_eligibility() {
        let engine = engine();
        let rng = RngService::new(1);
        let mut stream = rng.substream(StreamKind::Transition, 0, AgentId::new(0));
        let mut held = agent(30, RegularState::Exposed, 4);
        held.hold = 8;
        assert_eq!(
            engine.decide(RegularState::Exposed, &held, 0.0, &mut stream),
            None
        );
        held.dwell = 7;
        assert_eq!(
            engine.decide(RegularState::Exposed, &held, 0.0, &mut stream),
            Some(MILD)
        );
    }

    #[test]
    fn exposure_probability_drives_infection() {
        let engine = engine();
        let rng = RngService::new(5);
        let susceptible = agent(30, RegularState::Susceptible, 0);
        let mut infected = 0;
        for day in 0..10_000 {
            let mut stream = rng.substream(StreamKind::Transition, day, AgentId::new(0));
            if engine.decide(RegularState::Susceptible, &susceptible, 0.25, &mut stream)
                == Some(EXPOSED)
            {
                infected += 1;
            }
        }
        assert!((2300..2700).contains(&infected), "{infected}");
        let mut stream = rng.substream(StreamKind::Transition, 0, AgentId::new(0));
        assert_eq!(
            engine.decide(RegularState::Susceptible, &susceptible, 0.0, &mut stream),
            None
        );
    }

    #[test]
    fn first_matching_age_band_applies() {
        let engine = engine();
        let rng = RngService::new(2);
        let mut stream = rng.substream(StreamKind::Transition, 0, AgentId::new(0));
        let young = agent(30, RegularState::Mild, 0);
        let old = agent(70, RegularState::Mild, 0);
        assert_eq!(
            engine.decide(RegularState::Mild, &young, 0.0, &mut stream),
            Some(RECOVERED)
        );
        assert_eq!(engine.decide(RegularState::Mild, &old, 0.0, &mut stream), None);
    }

    #[test]
    fn terminal_states_never_draw() {
        let engine = engine();
        let rng = RngService::new(2);
        let mut stream = rng.substream(StreamKind::Transition, 0, AgentId::new(0));
        let recovered = agent(30, RegularState::Recovered, 50);
        assert_eq!(
            engine.decide(RegularState::Recovered, &recovered, 1.0, &mut stream),
            None
        );
        assert_eq!(stream.draws(), 0);
    }

    #[test]
    fn hold_sampling() {
        let mut table = RuleTable::new();
        table.add(
            RegularState::Exposed,
            [StateRules::always(vec![Candidate::fixed(MILD, 1.0, 0)])
                .with_hold(Some(DistributionSpec::Fixed { value: 4.4 }.build().unwrap()))],
        );
        let engine = TransitionEngine::new(table, callbacks::regular()).unwrap();
        let mut rng = RngService::new(0);
        assert_eq!(engine.sample_hold(RegularState::Exposed, 20, &mut rng), 4);
        assert_eq!(engine.sample_hold(RegularState::Mild, 20, &mut rng), 0);
    }

    #[test]
    fn invalid_tables_are_rejected() {
        let mut table = RuleTable::new();
        table.add(
            RegularState::Exposed,
            [StateRules::always(vec![
                Candidate::fixed(MILD, 0.7, 0),
                Candidate::fixed(RECOVERED, 0.4, 0),
            ])],
        );
        assert!(matches!(table.validate(), Err(AbmError::ConfigError(_))));

        let mut table = RuleTable::new();
        table.add(
            RegularState::Deceased,
            [StateRules::always(vec![Candidate::fixed(MILD, 0.1, 0)])],
        );
        assert!(table.validate().is_err());

        let mut table = RuleTable::new();
        table.add(
            RegularState::Susceptible,
            [StateRules::always(vec![
                Candidate::fixed(RECOVERED, 0.1, 0),
                Candidate::exposure(EXPOSED),
            ])],
        );
        assert!(table.validate().is_err());
    }

    #[test]
    fn table_transitions_become_valid_next_states() {
        let engine = engine();
        let next = engine
            .manager()
            .valid_next_states(RegularState::Exposed)
            .unwrap();
        assert_eq!(next, vec![EXPOSED, MILD]);
        assert!(!engine.manager().is_valid_transition(
            RegularState::Exposed,
            HealthState::HospitalPatient(HospitalPatientState::Admitted)
        ));
    }

    #[test]
    fn age_conditions() {
        let band = Condition::AgeBand {
            min: 20,
            max: Some(40),
        };
        assert!(!band.matches(19));
        assert!(band.matches(20));
        assert!(!band.matches(40));
        assert!(Condition::AgeBand { min: 80, max: None }.matches(104));
    }
}
