use std::collections::BTreeMap;

use strum::{Display as StrumDisplay, EnumCount, EnumIter};

use crate::error::{AbmError, Stage};
use crate::population::Agent;
use crate::states::{Compartment, HealthState, Role};

/// Event counters kept both cumulatively and per day.
#[derive(Copy, Clone, Debug, PartialEq, Eq, EnumIter, EnumCount, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum Counter {
    Infections,
    Recoveries,
    Deaths,
    /// Deaths of agents with a positive test on record.
    ConfirmedDeaths,
    Admissions,
    IcuAdmissions,
    Tests,
    Positives,
    Negatives,
    FalsePositives,
    FalseNegatives,
    VoidedTests,
    FluOnsets,
    FluRecoveries,
    Vaccinations,
    Isolations,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Counters {
    values: [u64; Counter::COUNT],
}

impl Counters {
    #[must_use]
    pub fn get(&self, counter: Counter) -> u64 {
        self.values[counter as usize]
    }

    fn increment(&mut self, counter: Counter) {
        self.values[counter as usize] += 1;
    }
}

/// The census of agents per state plus event counters. Passed explicitly to everything that
/// records into it; the census changes only through state entries.
#[derive(Clone, Debug, Default)]
pub struct Statistics {
    census: BTreeMap<HealthState, usize>,
    cumulative: Counters,
    today: Counters,
}

impl Statistics {
    #[must_use]
    pub fn new() -> Statistics {
        Statistics::default()
    }

    /// Moves one agent from `from` (or from nowhere, at initial placement) to `to`.
    pub fn record_entry(
        &mut self,
        from: Option<HealthState>,
        to: HealthState,
    ) -> Result<(), AbmError> {
        if let Some(from) = from {
            match self.census.get_mut(&from) {
                Some(count) if *count > 0 => *count -= 1,
                _ => {
                    return Err(AbmError::data(
                        None,
                        Stage::Statistics,
                        None,
                        format!("census of {from} would become negative"),
                    ))
                }
            }
        }
        *self.census.entry(to).or_insert(0) += 1;
        Ok(())
    }

    pub fn record(&mut self, counter: Counter) {
        self.cumulative.increment(counter);
        self.today.increment(counter);
    }

    /// Resets the daily counters.
    pub fn begin_day(&mut self) {
        self.today = Counters::default();
    }

    #[must_use]
    pub fn cumulative(&self) -> &Counters {
        &self.cumulative
    }

    #[must_use]
    pub fn today(&self) -> &Counters {
        &self.today
    }

    #[must_use]
    pub fn count(&self, state: HealthState) -> usize {
        self.census.get(&state).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn compartment_count(&self, compartment: Compartment) -> usize {
        self.census
            .iter()
            .filter(|(state, _)| state.compartment() == compartment)
            .map(|(_, count)| count)
            .sum()
    }

    #[must_use]
    pub fn role_count(&self, role: Role) -> usize {
        self.census
            .iter()
            .filter(|(state, _)| state.role() == role)
            .map(|(_, count)| count)
            .sum()
    }

    /// Compares the census with a direct tally of agent states and the death counter with the
    /// number of deceased agents.
    pub fn verify(&self, agents: &[Agent], day: u32) -> Result<(), AbmError> {
        let mut tally: BTreeMap<HealthState, usize> = BTreeMap::new();
        for agent in agents {
            *tally.entry(agent.state).or_insert(0) += 1;
        }
        for state in HealthState::all() {
            let expected = tally.get(&state).copied().unwrap_or(0);
            let recorded = self.count(state);
            if expected != recorded {
                return Err(AbmError::data(
                    Some(day),
                    Stage::Statistics,
                    None,
                    format!("census records {recorded} agents in {state}, found {expected}"),
                ));
            }
        }
        let deceased = self.compartment_count(Compartment::Deceased) as u64;
        if deceased != self.cumulative.get(Counter::Deaths) {
            return Err(AbmError::data(
                Some(day),
                Stage::Statistics,
                None,
                format!(
                    "{deceased} deceased agents but {} recorded deaths",
                    self.cumulative.get(Counter::Deaths)
                ),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::states::RegularState;

    const SUSCEPTIBLE: HealthState = HealthState::Regular(RegularState::Susceptible);
    const EXPOSED: HealthState = HealthState::Regular(RegularState::Exposed);

    #[test]
    fn census_follows_entries() {
        let mut stats = Statistics::new();
        stats.record_entry(None, SUSCEPTIBLE).unwrap();
        stats.record_entry(None, SUSCEPTIBLE).unwrap();
        stats.record_entry(Some(SUSCEPTIBLE), EXPOSED).unwrap();
        assert_eq!(stats.count(SUSCEPTIBLE), 1);
        assert_eq!(stats.count(EXPOSED), 1);
        assert_eq!(stats.compartment_count(Compartment::Exposed), 1);
        assert_eq!(stats.role_count(Role::Regular), 2);
    }

    #[test]
    fn leaving_an_empty_state_is_an_error() {
        let mut stats = Statistics::new();
        assert!(matches!(
            stats.record_entry(Some(EXPOSED), SUSCEPTIBLE),
            Err(AbmError::DataError {
                stage: Stage::Statistics,
                ..
            })
        ));
    }

    #[test]
    fn daily_counters_reset() {
        let mut stats = Statistics::new();
        stats.record(Counter::Tests);
        stats.record(Counter::Tests);
        stats.begin_day();
        stats.record(Counter::Positives);
        assert_eq!(stats.today().get(Counter::Tests), 0);
        assert_eq!(stats.today().get(Counter::Positives), 1);
        assert_eq!(stats.cumulative().get(Counter::Tests), 2);
    }
}
