use std::fmt::{self, Debug, Display};
use std::hash::Hash;

use serde_derive::Serialize;
use strum::{Display as StrumDisplay, EnumIter, IntoEnumIterator};

/// The role an agent currently plays. Each role has its own state space and transition engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Regular,
    Flu,
    HospitalEmployee,
    HospitalPatient,
}

/// The disease compartment of a state, used for reporting and for the infection checks shared
/// by all roles.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum Compartment {
    Susceptible,
    Exposed,
    Infectious,
    Hospitalized,
    Icu,
    Recovered,
    Deceased,
}

impl Compartment {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Compartment::Recovered | Compartment::Deceased)
    }

    /// Whether an agent in this compartment carries the virus.
    #[must_use]
    pub fn is_infected(self) -> bool {
        matches!(
            self,
            Compartment::Exposed
                | Compartment::Infectious
                | Compartment::Hospitalized
                | Compartment::Icu
        )
    }
}

/// A role-specific enumeration of states.
///
/// The generic transition engine and state manager are written against this trait, so each role
/// gets a monomorphised executor.
pub trait StateSpace:
    Copy + Eq + Ord + Hash + Debug + Display + IntoEnumIterator + Send + Sync + 'static
{
    const ROLE: Role;

    fn wrap(self) -> HealthState;

    fn unwrap_from(state: HealthState) -> Option<Self>;

    fn compartment(self) -> Compartment;

    fn is_terminal(self) -> bool {
        self.compartment().is_terminal()
    }
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, StrumDisplay, Serialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum RegularState {
    Susceptible,
    Exposed,
    Asymptomatic,
    /// Symptomatic, recovering at home.
    Mild,
    /// Symptomatic, never hospitalized and dying at home.
    Dying,
    /// Symptomatic and on the way to hospital.
    Severe,
    Recovered,
    Deceased,
}

/// Agents with flu-like symptoms but no COVID infection. They are susceptible to COVID and are
/// tested like symptomatic agents.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, StrumDisplay, Serialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum FluState {
    Symptomatic,
}

#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, StrumDisplay, Serialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum HospitalEmployeeState {
    Susceptible,
    Exposed,
    Asymptomatic,
    Mild,
    Dying,
    Severe,
    Recovered,
    Deceased,
}

/// Hospital patients: agents admitted for other conditions (starting `Susceptible`) and agents
/// admitted with COVID (entering at `Admitted`).
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, StrumDisplay, Serialize,
)]
#[strum(serialize_all = "snake_case")]
pub enum HospitalPatientState {
    Susceptible,
    Exposed,
    Asymptomatic,
    Admitted,
    Icu,
    /// Back on a ward after intensive care.
    Recovering,
    Recovered,
    Deceased,
}

impl StateSpace for RegularState {
    const ROLE: Role = Role::Regular;

    fn wrap(self) -> HealthState {
        HealthState::Regular(self)
    }

    fn unwrap_from(state: HealthState) -> Option<Self> {
        match state {
            HealthState::Regular(s) => Some(s),
            _ => None,
        }
    }

    fn compartment(self) -> Compartment {
        match self {
            RegularState::Susceptible => Compartment::Susceptible,
            RegularState::Exposed => Compartment::Exposed,
            RegularState::Asymptomatic
            | RegularState::Mild
            | RegularState::Dying
            | RegularState::Severe => Compartment::Infectious,
            RegularState::Recovered => Compartment::Recovered,
            RegularState::Deceased => Compartment::Deceased,
        }
    }
}

impl StateSpace for FluState {
    const ROLE: Role = Role::Flu;

    fn wrap(self) -> HealthState {
        HealthState::Flu(self)
    }

    fn unwrap_from(state: HealthState) -> Option<Self> {
        match state {
            HealthState::Flu(s) => Some(s),
            _ => None,
        }
    }

    fn compartment(self) -> Compartment {
        Compartment::Susceptible
    }
}

impl StateSpace for HospitalEmployeeState {
    const ROLE: Role = Role::HospitalEmployee;

    fn wrap(self) -> HealthState {
        HealthState::HospitalEmployee(self)
    }

    fn unwrap_from(state: HealthState) -> Option<Self> {
        match state {
            HealthState::HospitalEmployee(s) => Some(s),
            _ => None,
        }
    }

    fn compartment(self) -> Compartment {
        match self {
            HospitalEmployeeState::Susceptible => Compartment::Susceptible,
            HospitalEmployeeState::Exposed => Compartment::Exposed,
            HospitalEmployeeState::Asymptomatic
            | HospitalEmployeeState::Mild
            | HospitalEmployeeState::Dying
            | HospitalEmployeeState::Severe => Compartment::Infectious,
            HospitalEmployeeState::Recovered => Compartment::Recovered,
            HospitalEmployeeState::Deceased => Compartment::Deceased,
        }
    }
}

impl StateSpace for HospitalPatientState {
    const ROLE: Role = Role::HospitalPatient;

    fn wrap(self) -> HealthState {
        HealthState::HospitalPatient(self)
    }

    fn unwrap_from(state: HealthState) -> Option<Self> {
        match state {
            HealthState::HospitalPatient(s) => Some(s),
            _ => None,
        }
    }

    fn compartment(self) -> Compartment {
        match self {
            HospitalPatientState::Susceptible => Compartment::Susceptible,
            HospitalPatientState::Exposed => Compartment::Exposed,
            HospitalPatientState::Asymptomatic => Compartment::Infectious,
            HospitalPatientState::Admitted | HospitalPatientState::Recovering => {
                Compartment::Hospitalized
            }
            HospitalPatientState::Icu => Compartment::Icu,
            HospitalPatientState::Recovered => Compartment::Recovered,
            HospitalPatientState::Deceased => Compartment::Deceased,
        }
    }
}

/// An agent's state, tagged by role. The tag is the agent's one active role.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HealthState {
    Regular(RegularState),
    Flu(FluState),
    HospitalEmployee(HospitalEmployeeState),
    HospitalPatient(HospitalPatientState),
}

impl HealthState {
    #[must_use]
    pub fn role(self) -> Role {
        match self {
            HealthState::Regular(_) => Role::Regular,
            HealthState::Flu(_) => Role::Flu,
            HealthState::HospitalEmployee(_) => Role::HospitalEmployee,
            HealthState::HospitalPatient(_) => Role::HospitalPatient,
        }
    }

    #[must_use]
    pub fn compartment(self) -> Compartment {
        match self {
            HealthState::Regular(s) => s.compartment(),
            HealthState::Flu(s) => s.compartment(),
            HealthState::HospitalEmployee(s) => s.compartment(),
            HealthState::HospitalPatient(s) => s.compartment(),
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self.compartment().is_terminal()
    }

    #[must_use]
    pub fn is_deceased(self) -> bool {
        self.compartment() == Compartment::Deceased
    }

    /// Only agents that were never infected and have no flu are vaccinated.
    #[must_use]
    pub fn is_vaccine_eligible(self) -> bool {
        self.role() != Role::Flu && self.compartment() == Compartment::Susceptible
    }

    /// Whether an agent in this state, having spent `dwell` days in it, spreads the virus.
    /// Exposed agents become infectious once `infectious_after_days` have passed.
    #[must_use]
    pub fn is_infectious(self, dwell: u32, infectious_after_days: u32) -> bool {
        match self.compartment() {
            Compartment::Exposed => dwell >= infectious_after_days,
            Compartment::Infectious | Compartment::Hospitalized | Compartment::Icu => true,
            _ => false,
        }
    }

    /// The role's entry state for a new infection.
    #[must_use]
    pub fn exposed_for(role: Role) -> HealthState {
        match role {
            Role::Regular | Role::Flu => HealthState::Regular(RegularState::Exposed),
            Role::HospitalEmployee => HealthState::HospitalEmployee(HospitalEmployeeState::Exposed),
            Role::HospitalPatient => HealthState::HospitalPatient(HospitalPatientState::Exposed),
        }
    }

    /// Every state of every role.
    pub fn all() -> impl Iterator<Item = HealthState> {
        RegularState::iter()
            .map(HealthState::Regular)
            .chain(FluState::iter().map(HealthState::Flu))
            .chain(HospitalEmployeeState::iter().map(HealthState::HospitalEmployee))
            .chain(HospitalPatientState::iter().map(HealthState::HospitalPatient))
    }
}

impl Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            HealthState::Regular(s) => write!(f, "{}:{s}", Role::Regular),
            HealthState::Flu(s) => write!(f, "{}:{s}", Role::Flu),
            HealthState::HospitalEmployee(s) => write!(f, "{}:{s}", Role::HospitalEmployee),
            HealthState::HospitalPatient(s) => write!(f, "{}:{s}", Role::HospitalPatient),
        }
    }
}
