//! The contributions engine: how much infection pressure each place puts on the agents present.
//!
//! Once a day, before transitions, the engine counts occupants and infectious occupants of every
//! roster (the place loads). An agent's exposure is then built from the places it is present
//! at. A place without a staff roster contributes `c × i / n`. At hospitals and retirement
//! homes everyone present gets `c × (i_general + i_staff) / (n_general + n_staff)`, and
//! residents and patients additionally get `c_staff × i_staff / n_staff` from the staff. The
//! contributions of different places are independent risks, so the daily infection probability
//! is `1 − Π(1 − contribution)`.

use crate::error::{AbmError, Stage};
use crate::hashing::HashMap;
use crate::places::{Place, PlaceId, Places, Roster, RosterKind};
use crate::population::Agent;

/// Occupancy counts of one place, taken after the previous day's roster flush.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct PlaceLoad {
    pub occupants: usize,
    pub infectious: usize,
    pub staff: usize,
    pub infectious_staff: usize,
}

/// One place's term in an agent's exposure. Discarded after the daily pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Contribution {
    pub place: PlaceId,
    /// The roster the infectious agents are counted on.
    pub roster: RosterKind,
    pub infectious: usize,
    pub occupants: usize,
    pub coefficient: f64,
    pub value: f64,
}

/// `c × i / max(n, 1)`; zero when the place is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn density_contribution(coefficient: f64, infectious: usize, occupants: usize) -> f64 {
    if occupants == 0 {
        return 0.0;
    }
    coefficient * infectious as f64 / occupants as f64
}

/// Combines independent daily risks: `1 − Π(1 − p)`.
pub fn combine_probabilities(probabilities: impl IntoIterator<Item = f64>) -> f64 {
    1.0 - probabilities
        .into_iter()
        .fold(1.0, |escape, p| escape * (1.0 - p))
}

pub struct ContributionsEngine {
    infectious_after_days: u32,
    vaccine_efficacy: f64,
    loads: HashMap<PlaceId, PlaceLoad>,
}

impl ContributionsEngine {
    #[must_use]
    pub fn new(infectious_after_days: u32, vaccine_efficacy: f64) -> ContributionsEngine {
        ContributionsEngine {
            infectious_after_days,
            vaccine_efficacy,
            loads: HashMap::default(),
        }
    }

    #[must_use]
    pub fn is_infectious(&self, agent: &Agent) -> bool {
        agent
            .state
            .is_infectious(agent.dwell, self.infectious_after_days)
    }

    fn count_infectious(
        &self,
        roster: &Roster,
        agents: &[Agent],
        day: u32,
    ) -> Result<usize, AbmError> {
        let mut infectious = 0;
        for id in roster {
            let agent = agents.get(id.index()).ok_or_else(|| {
                AbmError::data(
                    Some(day),
                    Stage::Contributions,
                    Some(*id),
                    "roster lists an agent outside the population",
                )
            })?;
            if self.is_infectious(agent) {
                infectious += 1;
            }
        }
        Ok(infectious)
    }

    /// Recounts the load of every place.
    pub fn compute_loads(
        &mut self,
        places: &Places,
        agents: &[Agent],
        day: u32,
    ) -> Result<(), AbmError> {
        self.loads.clear();
        for place in places.iter() {
            let load = PlaceLoad {
                occupants: place.occupants().len(),
                infectious: self.count_infectious(place.occupants(), agents, day)?,
                staff: place.staff().len(),
                infectious_staff: self.count_infectious(place.staff(), agents, day)?,
            };
            self.loads.insert(place.id(), load);
        }
        Ok(())
    }

    /// The load of a place as of the last [`compute_loads`](Self::compute_loads).
    pub fn load(&self, place: PlaceId, day: u32) -> Result<PlaceLoad, AbmError> {
        let load = self.loads.get(&place).copied().ok_or_else(|| {
            AbmError::data(
                Some(day),
                Stage::Contributions,
                None,
                format!("no load computed for {place}"),
            )
        })?;
        if load.infectious > load.occupants || load.infectious_staff > load.staff {
            return Err(AbmError::data(
                Some(day),
                Stage::Contributions,
                None,
                format!("{place} has more infectious agents than occupants"),
            ));
        }
        Ok(load)
    }

    fn place_contributions(
        place: &Place,
        roster: RosterKind,
        load: PlaceLoad,
        contributions: &mut Vec<Contribution>,
    ) {
        let id = place.id();
        if !id.kind.has_staff() {
            if load.occupants > 0 {
                let coefficient = place.transmission_coefficient();
                contributions.push(Contribution {
                    place: id,
                    roster: RosterKind::General,
                    infectious: load.infectious,
                    occupants: load.occupants,
                    coefficient,
                    value: density_contribution(coefficient, load.infectious, load.occupants),
                });
            }
            return;
        }

        let occupants = load.occupants + load.staff;
        let infectious = load.infectious + load.infectious_staff;
        if occupants > 0 {
            let coefficient = place.transmission_coefficient();
            contributions.push(Contribution {
                place: id,
                roster,
                infectious,
                occupants,
                coefficient,
                value: density_contribution(coefficient, infectious, occupants),
            });
        }
        if roster == RosterKind::General && load.staff > 0 {
            let coefficient = place.staff_transmission_coefficient();
            contributions.push(Contribution {
                place: id,
                roster: RosterKind::Staff,
                infectious: load.infectious_staff,
                occupants: load.staff,
                coefficient,
                value: density_contribution(coefficient, load.infectious_staff, load.staff),
            });
        }
    }

    /// The contributions of every place the agent is present at today.
    pub fn contributions(
        &self,
        agent: &Agent,
        places: &Places,
        day: u32,
    ) -> Result<Vec<Contribution>, AbmError> {
        let mut contributions = Vec::new();
        for (place_id, roster) in agent.presence() {
            let place = places.get(place_id)?;
            let load = self.load(place_id, day)?;
            Self::place_contributions(place, roster, load, &mut contributions);
        }
        Ok(contributions)
    }

    /// The agent's daily infection probability, reduced by the vaccine efficacy for vaccinated
    /// agents.
    pub fn infection_probability(
        &self,
        agent: &Agent,
        places: &Places,
        day: u32,
    ) -> Result<f64, AbmError> {
        let contributions = self.contributions(agent, places, day)?;
        let probability = combine_probabilities(contributions.iter().map(|c| c.value));
        if agent.vaccinated {
            Ok(probability * (1.0 - self.vaccine_efficacy))
        } else {
            Ok(probability)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::PlaceKind;
    use crate::population::{AgentId, Demographics};
    use crate::states::{HealthState, RegularState};
    use assert_approx_eq::assert_approx_eq;

    fn person(index: usize, residence: PlaceId, state: RegularState) -> Agent {
        let mut agent = Agent::new(
            AgentId::new(index),
            Demographics {
                age: 30,
                x: 0.0,
                y: 0.0,
                student: false,
                works: false,
                residence,
                school: None,
                work: None,
                hospital: None,
                hospital_employee: false,
                non_covid_patient: false,
                infected: false,
            },
        );
        agent.state = HealthState::Regular(state);
        agent
    }

    fn seat(places: &mut Places, agents: &[Agent]) {
        for agent in agents {
            for (place, roster) in agent.presence() {
                let change = crate::places::RosterChange::Add {
                    place,
                    roster,
                    agent: agent.id,
                };
                places.apply(change).unwrap();
            }
        }
    }

    #[test]
    fn household_of_four_with_one_infectious() {
        let mut places = Places::new();
        let home = places.push(PlaceKind::Household, 0.0, 0.0, 0.1, 0.0).unwrap();
        let mut agents: Vec<Agent> = (0..4)
            .map(|i| person(i, home, RegularState::Susceptible))
            .collect();
        agents[0].state = HealthState::Regular(RegularState::Mild);
        seat(&mut places, &agents);

        let mut engine = ContributionsEngine::new(2, 0.0);
        engine.compute_loads(&places, &agents, 0).unwrap();
        for agent in &agents[1..] {
            let contributions = engine.contributions(agent, &places, 0).unwrap();
            assert_eq!(contributions.len(), 1);
            assert_approx_eq!(contributions[0].value, 0.025);
            assert_approx_eq!(
                engine.infection_probability(agent, &places, 0).unwrap(),
                0.025
            );
        }
    }

    #[test]
    fn vaccination_scales_probability() {
        let mut places = Places::new();
        let home = places.push(PlaceKind::Household, 0.0, 0.0, 0.2, 0.0).unwrap();
        let mut agents = vec![
            person(0, home, RegularState::Asymptomatic),
            person(1, home, RegularState::Susceptible),
        ];
        agents[1].vaccinated = true;
        seat(&mut places, &agents);
        let mut engine = ContributionsEngine::new(2, 0.75);
        engine.compute_loads(&places, &agents, 0).unwrap();
        assert_approx_eq!(
            engine.infection_probability(&agents[1], &places, 0).unwrap(),
            0.1 * 0.25
        );
    }

    #[test]
    fn exposed_agents_count_after_latent_period() {
        let mut places = Places::new();
        let home = places.push(PlaceKind::Household, 0.0, 0.0, 0.2, 0.0).unwrap();
        let mut agents = vec![
            person(0, home, RegularState::Exposed),
            person(1, home, RegularState::Susceptible),
        ];
        seat(&mut places, &agents);
        let mut engine = ContributionsEngine::new(2, 0.0);
        engine.compute_loads(&places, &agents, 0).unwrap();
        assert_eq!(engine.load(home, 0).unwrap().infectious, 0);
        agents[0].dwell = 2;
        engine.compute_loads(&places, &agents, 1).unwrap();
        assert_eq!(engine.load(home, 1).unwrap().infectious, 1);
    }

    #[test]
    fn retirement_home_residents_see_staff_twice() {
        let mut places = Places::new();
        let home = places.push(PlaceKind::Household, 0.0, 0.0, 0.1, 0.0).unwrap();
        let rh = places
            .push(PlaceKind::RetirementHome, 0.0, 0.0, 0.2, 0.1)
            .unwrap();
        let mut resident = person(0, rh, RegularState::Susceptible);
        resident.demographics.residence = rh;
        let mut worker = person(1, home, RegularState::Mild);
        worker.demographics.work = Some(rh);
        let mut colleague = person(2, home, RegularState::Susceptible);
        colleague.demographics.work = Some(rh);
        let agents = vec![resident, worker, colleague];
        seat(&mut places, &agents);

        let mut engine = ContributionsEngine::new(2, 0.0);
        engine.compute_loads(&places, &agents, 0).unwrap();
        let load = engine.load(rh, 0).unwrap();
        assert_eq!(
            load,
            PlaceLoad {
                occupants: 1,
                infectious: 0,
                staff: 2,
                infectious_staff: 1
            }
        );

        let resident_terms = engine.contributions(&agents[0], &places, 0).unwrap();
        assert_eq!(resident_terms.len(), 2);
        assert_approx_eq!(resident_terms[0].value, 0.2 / 3.0);
        assert_approx_eq!(resident_terms[1].value, 0.1 / 2.0);
        assert_approx_eq!(
            engine.infection_probability(&agents[0], &places, 0).unwrap(),
            1.0 - (1.0 - 0.2 / 3.0) * (1.0 - 0.05)
        );

        // The colleague also shares a household with the infectious worker
        let colleague_terms = engine.contributions(&agents[2], &places, 0).unwrap();
        assert_eq!(colleague_terms.len(), 2);
        assert_approx_eq!(colleague_terms[1].value, 0.2 / 3.0);
    }

    #[test]
    fn contributions_are_bounded_and_monotone() {
        for occupants in 1..20usize {
            let mut previous = 0.0;
            for infectious in 0..=occupants {
                let value = density_contribution(0.9, infectious, occupants);
                assert!((0.0..1.0).contains(&value));
                assert!(value >= previous);
                previous = value;
            }
        }
        assert_eq!(density_contribution(0.5, 0, 0), 0.0);
        let combined = combine_probabilities([0.5, 0.5, 0.9]);
        assert_approx_eq!(combined, 1.0 - 0.5 * 0.5 * 0.1);
        assert!(combine_probabilities([0.3, 0.2]) >= combine_probabilities([0.3]));
    }

    #[test]
    fn missing_load_is_data_error() {
        let mut places = Places::new();
        let home = places.push(PlaceKind::Household, 0.0, 0.0, 0.1, 0.0).unwrap();
        let agent = person(0, home, RegularState::Susceptible);
        let engine = ContributionsEngine::new(2, 0.0);
        assert!(matches!(
            engine.contributions(&agent, &places, 4),
            Err(AbmError::DataError {
                stage: Stage::Contributions,
                ..
            })
        ));
    }
}
