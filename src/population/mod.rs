//! Agents and the population snapshot they are built from.

mod loader;

use std::fmt::{self, Display};

pub use loader::{PlaceRecord, PopulationRecord, PopulationSnapshot};

use crate::error::{AbmError, Stage};
use crate::places::{PlaceId, PlaceKind, Places, RosterChange, RosterKind};
use crate::states::{HealthState, HospitalEmployeeState, HospitalPatientState, RegularState};
use crate::testing::TestStatus;

/// An agent's 0-based position in the population snapshot. Displayed 1-based, like the
/// identifiers of the input files.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentId(usize);

impl AgentId {
    #[must_use]
    pub fn new(index: usize) -> AgentId {
        AgentId(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 + 1)
    }
}

/// The static description of an agent: who they are and where they belong.
#[derive(Clone, Debug, PartialEq)]
pub struct Demographics {
    pub age: u32,
    pub x: f64,
    pub y: f64,
    pub student: bool,
    pub works: bool,
    /// A household, or a retirement home for its residents.
    pub residence: PlaceId,
    pub school: Option<PlaceId>,
    /// The employer: a workplace, a school or a retirement home. Hospital employment is
    /// recorded in `hospital`.
    pub work: Option<PlaceId>,
    pub hospital: Option<PlaceId>,
    pub hospital_employee: bool,
    pub non_covid_patient: bool,
    pub infected: bool,
}

impl Demographics {
    /// Resolves the 1-based identifiers of a population row against the declared places.
    pub fn from_record(
        record: &PopulationRecord,
        agent: AgentId,
        places: &Places,
    ) -> Result<Demographics, AbmError> {
        let flag = |name: &str, value: u8| -> Result<bool, AbmError> {
            match value {
                0 => Ok(false),
                1 => Ok(true),
                other => Err(load_error(
                    agent,
                    format!("flag '{name}' must be 0 or 1, got {other}"),
                )),
            }
        };
        let resolve = |kind: PlaceKind, id: i64, field: &str| -> Result<PlaceId, AbmError> {
            let count = places.count(kind);
            match usize::try_from(id) {
                Ok(file_id) if file_id >= 1 && file_id <= count => {
                    Ok(PlaceId::new(kind, file_id - 1))
                }
                _ => Err(load_error(
                    agent,
                    format!("{field} {id} is outside the declared range 1..={count} of {kind}s"),
                )),
            }
        };

        let student = flag("student", record.student)?;
        let works = flag("works", record.works)?;
        let non_covid_patient = flag("non_covid_patient", record.non_covid_patient)?;
        let lives_in_retirement_home =
            flag("lives_in_retirement_home", record.lives_in_retirement_home)?;
        let works_at_retirement_home =
            flag("works_at_retirement_home", record.works_at_retirement_home)?;
        let works_at_school = flag("works_at_school", record.works_at_school)?;
        let hospital_employee = flag("hospital_employee", record.hospital_employee)?;
        let infected = flag("infected", record.infected)?;

        if hospital_employee && non_covid_patient {
            return Err(load_error(
                agent,
                "an agent cannot be both a hospital employee and a patient",
            ));
        }

        let residence = if lives_in_retirement_home {
            resolve(PlaceKind::RetirementHome, record.household_id, "household_id")?
        } else {
            resolve(PlaceKind::Household, record.household_id, "household_id")?
        };
        let school = if student {
            Some(resolve(PlaceKind::School, record.school_id, "school_id")?)
        } else {
            None
        };
        let work = if works_at_school {
            Some(resolve(PlaceKind::School, record.work_id, "work_id")?)
        } else if works_at_retirement_home {
            Some(resolve(
                PlaceKind::RetirementHome,
                record.work_id,
                "work_id",
            )?)
        } else if works && !hospital_employee {
            Some(resolve(PlaceKind::Workplace, record.work_id, "work_id")?)
        } else {
            None
        };
        let hospital = if hospital_employee || non_covid_patient {
            Some(resolve(PlaceKind::Hospital, record.hospital_id, "hospital_id")?)
        } else {
            None
        };

        Ok(Demographics {
            age: record.age,
            x: record.x,
            y: record.y,
            student,
            works,
            residence,
            school,
            work,
            hospital,
            hospital_employee,
            non_covid_patient,
            infected,
        })
    }

    /// Writes the demographics back in the population file layout.
    #[must_use]
    pub fn to_record(&self) -> PopulationRecord {
        let file_id = |place: Option<PlaceId>| place.map_or(0, |p| p.file_id() as i64);
        let work_kind = self.work.map(|p| p.kind);
        PopulationRecord {
            student: u8::from(self.student),
            works: u8::from(self.works),
            age: self.age,
            x: self.x,
            y: self.y,
            household_id: self.residence.file_id() as i64,
            non_covid_patient: u8::from(self.non_covid_patient),
            school_id: file_id(self.school),
            lives_in_retirement_home: u8::from(
                self.residence.kind == PlaceKind::RetirementHome,
            ),
            works_at_retirement_home: u8::from(work_kind == Some(PlaceKind::RetirementHome)),
            works_at_school: u8::from(work_kind == Some(PlaceKind::School)),
            work_id: file_id(self.work),
            hospital_employee: u8::from(self.hospital_employee),
            hospital_id: file_id(self.hospital),
            infected: u8::from(self.infected),
        }
    }

    /// The rosters the agent is on when healthy and not isolated.
    #[must_use]
    pub fn usual_presence(&self) -> Vec<(PlaceId, RosterKind)> {
        if self.non_covid_patient {
            return self
                .hospital
                .map(|h| (h, RosterKind::General))
                .into_iter()
                .collect();
        }
        let mut presence = vec![(self.residence, RosterKind::General)];
        if let Some(school) = self.school {
            presence.push((school, RosterKind::General));
        }
        if let Some(work) = self.work {
            let roster = if work.kind.has_staff() {
                RosterKind::Staff
            } else {
                RosterKind::General
            };
            presence.push((work, roster));
        }
        if self.hospital_employee {
            if let Some(hospital) = self.hospital {
                presence.push((hospital, RosterKind::Staff));
            }
        }
        presence
    }

    /// The role-specific susceptible state an agent starts in.
    #[must_use]
    pub fn initial_state(&self) -> HealthState {
        if self.non_covid_patient {
            HealthState::HospitalPatient(HospitalPatientState::Susceptible)
        } else if self.hospital_employee {
            HealthState::HospitalEmployee(HospitalEmployeeState::Susceptible)
        } else {
            HealthState::Regular(RegularState::Susceptible)
        }
    }
}

fn load_error(agent: AgentId, message: impl Into<String>) -> AbmError {
    AbmError::data(None, Stage::Load, Some(agent), message)
}

#[derive(Clone, Debug)]
pub struct Agent {
    pub id: AgentId,
    pub demographics: Demographics,
    pub state: HealthState,
    /// Days spent in the current state.
    pub dwell: u32,
    /// Per-agent minimum stay in the current state, drawn on entry.
    pub hold: u32,
    pub test: TestStatus,
    pub vaccinated: bool,
    /// Last day of home isolation.
    pub isolated_until: Option<u32>,
    pub admitted_to: Option<PlaceId>,
}

impl Agent {
    #[must_use]
    pub fn new(id: AgentId, demographics: Demographics) -> Agent {
        let state = demographics.initial_state();
        Agent {
            id,
            demographics,
            state,
            dwell: 0,
            hold: 0,
            test: TestStatus::NotTested,
            vaccinated: false,
            isolated_until: None,
            admitted_to: None,
        }
    }

    #[must_use]
    pub fn is_isolated(&self) -> bool {
        self.isolated_until.is_some()
    }

    /// The rosters the agent should currently be on, given its state, isolation and admission.
    #[must_use]
    pub fn presence(&self) -> Vec<(PlaceId, RosterKind)> {
        if self.state.is_deceased() {
            return Vec::new();
        }
        if let Some(hospital) = self.admitted_to {
            return vec![(hospital, RosterKind::General)];
        }
        let mut presence = self.demographics.usual_presence();
        if self.is_isolated() && !self.demographics.non_covid_patient {
            let residence = self.demographics.residence;
            presence.retain(|(place, _)| *place == residence);
        }
        presence
    }
}

/// The roster changes that move an agent from one presence to another.
#[must_use]
pub fn presence_changes(
    agent: AgentId,
    before: &[(PlaceId, RosterKind)],
    after: &[(PlaceId, RosterKind)],
) -> Vec<RosterChange> {
    let removed = before
        .iter()
        .filter(|entry| !after.contains(entry))
        .map(|&(place, roster)| RosterChange::Remove {
            place,
            roster,
            agent,
        });
    let added = after
        .iter()
        .filter(|entry| !before.contains(entry))
        .map(|&(place, roster)| RosterChange::Add {
            place,
            roster,
            agent,
        });
    removed.chain(added).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn places() -> Places {
        let mut places = Places::new();
        places.push(PlaceKind::Household, 0.0, 0.0, 0.1, 0.0).unwrap();
        places.push(PlaceKind::School, 0.0, 0.0, 0.05, 0.0).unwrap();
        places.push(PlaceKind::Workplace, 0.0, 0.0, 0.05, 0.0).unwrap();
        places.push(PlaceKind::Hospital, 0.0, 0.0, 0.05, 0.02).unwrap();
        places.push(PlaceKind::RetirementHome, 0.0, 0.0, 0.05, 0.02).unwrap();
        places
    }

    fn worker() -> PopulationRecord {
        PopulationRecord {
            student: 0,
            works: 1,
            age: 40,
            x: 1.0,
            y: 2.0,
            household_id: 1,
            non_covid_patient: 0,
            school_id: 0,
            lives_in_retirement_home: 0,
            works_at_retirement_home: 0,
            works_at_school: 0,
            work_id: 1,
            hospital_employee: 0,
            hospital_id: 0,
            infected: 0,
        }
    }

    #[test]
    fn resolves_one_based_ids() {
        let demographics = Demographics::from_record(&worker(), AgentId::new(0), &places()).unwrap();
        assert_eq!(demographics.residence, PlaceId::new(PlaceKind::Household, 0));
        assert_eq!(demographics.work, Some(PlaceId::new(PlaceKind::Workplace, 0)));
        assert_eq!(demographics.school, None);
        assert_eq!(demographics.to_record(), worker());
    }

    #[test]
    fn out_of_range_id_is_load_error() {
        let mut record = worker();
        record.work_id = 2;
        let error = Demographics::from_record(&record, AgentId::new(6), &places()).unwrap_err();
        assert!(matches!(
            error,
            AbmError::DataError {
                stage: Stage::Load,
                agent: Some(a),
                ..
            } if a == AgentId::new(6)
        ));
        record.work_id = 1;
        record.household_id = 0;
        assert!(Demographics::from_record(&record, AgentId::new(6), &places()).is_err());
    }

    #[test]
    fn bad_flag_is_rejected() {
        let mut record = worker();
        record.student = 2;
        assert!(Demographics::from_record(&record, AgentId::new(0), &places()).is_err());
    }

    #[test]
    fn retirement_home_staff_and_residents() {
        let mut record = worker();
        record.works_at_retirement_home = 1;
        let staff = Demographics::from_record(&record, AgentId::new(0), &places()).unwrap();
        assert_eq!(
            staff.usual_presence(),
            vec![
                (PlaceId::new(PlaceKind::Household, 0), RosterKind::General),
                (PlaceId::new(PlaceKind::RetirementHome, 0), RosterKind::Staff),
            ]
        );

        let mut record = worker();
        record.works = 0;
        record.lives_in_retirement_home = 1;
        let resident = Demographics::from_record(&record, AgentId::new(1), &places()).unwrap();
        assert_eq!(
            resident.usual_presence(),
            vec![(PlaceId::new(PlaceKind::RetirementHome, 0), RosterKind::General)]
        );
    }

    #[test]
    fn hospital_roles() {
        let mut record = worker();
        record.works = 1;
        record.hospital_employee = 1;
        record.hospital_id = 1;
        let employee = Demographics::from_record(&record, AgentId::new(0), &places()).unwrap();
        assert_eq!(employee.work, None);
        assert_eq!(
            employee.initial_state(),
            HealthState::HospitalEmployee(HospitalEmployeeState::Susceptible)
        );
        assert!(employee
            .usual_presence()
            .contains(&(PlaceId::new(PlaceKind::Hospital, 0), RosterKind::Staff)));

        record.non_covid_patient = 1;
        assert!(Demographics::from_record(&record, AgentId::new(0), &places()).is_err());
    }

    #[test]
    fn isolation_keeps_only_the_residence() {
        let mut record = worker();
        record.student = 1;
        record.school_id = 1;
        let demographics = Demographics::from_record(&record, AgentId::new(0), &places()).unwrap();
        let mut agent = Agent::new(AgentId::new(0), demographics);
        assert_eq!(agent.presence().len(), 3);
        agent.isolated_until = Some(14);
        assert_eq!(
            agent.presence(),
            vec![(PlaceId::new(PlaceKind::Household, 0), RosterKind::General)]
        );
        agent.state = HealthState::Regular(RegularState::Deceased);
        assert!(agent.presence().is_empty());
    }

    #[test]
    fn presence_diff() {
        let home = (PlaceId::new(PlaceKind::Household, 0), RosterKind::General);
        let work = (PlaceId::new(PlaceKind::Workplace, 0), RosterKind::General);
        let ward = (PlaceId::new(PlaceKind::Hospital, 0), RosterKind::General);
        let agent = AgentId::new(3);
        let changes = presence_changes(agent, &[home, work], &[ward]);
        assert_eq!(changes.len(), 3);
        assert!(changes.contains(&RosterChange::Remove {
            place: work.0,
            roster: work.1,
            agent
        }));
        assert!(changes.contains(&RosterChange::Add {
            place: ward.0,
            roster: ward.1,
            agent
        }));
        assert!(presence_changes(agent, &[home], &[home]).is_empty());
    }
}
