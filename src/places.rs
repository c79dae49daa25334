//! Places and their rosters.
//!
//! A place is a household, school, workplace, hospital or retirement home. It holds a general
//! roster (residents, pupils, workers, patients) and, for hospitals and retirement homes, a
//! separate staff roster. Rosters are only changed between daily stages, through
//! [`Places::apply`].

use std::collections::BTreeSet;
use std::fmt::{self, Display};

use serde_derive::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumCount, EnumIter, EnumString, IntoEnumIterator};

use crate::error::{AbmError, Stage};
use crate::population::AgentId;

#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumCount,
    EnumString,
    StrumDisplay,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PlaceKind {
    Household,
    School,
    Workplace,
    Hospital,
    RetirementHome,
}

impl PlaceKind {
    /// Hospitals and retirement homes keep their staff on a separate roster.
    #[must_use]
    pub fn has_staff(self) -> bool {
        matches!(self, PlaceKind::Hospital | PlaceKind::RetirementHome)
    }

    fn slot(self) -> usize {
        self as usize
    }
}

/// Identifies a place by kind and 0-based index. Input files and outputs use 1-based ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaceId {
    pub kind: PlaceKind,
    pub index: usize,
}

impl PlaceId {
    #[must_use]
    pub fn new(kind: PlaceKind, index: usize) -> PlaceId {
        PlaceId { kind, index }
    }

    /// The 1-based id used in input and output files.
    #[must_use]
    pub fn file_id(self) -> usize {
        self.index + 1
    }
}

impl Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.file_id())
    }
}

/// Which of a place's two rosters an agent is on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RosterKind {
    General,
    Staff,
}

/// The agents on one roster of a place, in agent order.
pub type Roster = BTreeSet<AgentId>;

/// A pending roster mutation, applied after the stage that produced it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RosterChange {
    Add {
        place: PlaceId,
        roster: RosterKind,
        agent: AgentId,
    },
    Remove {
        place: PlaceId,
        roster: RosterKind,
        agent: AgentId,
    },
}

#[derive(Clone, Debug)]
pub struct Place {
    id: PlaceId,
    x: f64,
    y: f64,
    coefficient: f64,
    staff_coefficient: f64,
    roster: Roster,
    staff: Roster,
}

fn check_coefficient(kind: PlaceKind, value: f64) -> Result<(), AbmError> {
    if value.is_finite() && (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(AbmError::config(format!(
            "{kind} transmission coefficient {value} is outside [0, 1)"
        )))
    }
}

impl Place {
    pub fn new(
        id: PlaceId,
        x: f64,
        y: f64,
        coefficient: f64,
        staff_coefficient: f64,
    ) -> Result<Place, AbmError> {
        check_coefficient(id.kind, coefficient)?;
        check_coefficient(id.kind, staff_coefficient)?;
        Ok(Place {
            id,
            x,
            y,
            coefficient,
            staff_coefficient,
            roster: Roster::new(),
            staff: Roster::new(),
        })
    }

    #[must_use]
    pub fn id(&self) -> PlaceId {
        self.id
    }

    #[must_use]
    pub fn location(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Adds an agent to the general roster. Adding a present agent is a no-op.
    pub fn add_occupant(&mut self, agent: AgentId) {
        self.roster.insert(agent);
    }

    /// Removes an agent from the general roster. Returns whether the agent was present.
    pub fn remove_occupant(&mut self, agent: AgentId) -> bool {
        self.roster.remove(&agent)
    }

    #[must_use]
    pub fn occupants(&self) -> &Roster {
        &self.roster
    }

    pub fn add_staff(&mut self, agent: AgentId) -> Result<(), AbmError> {
        if !self.id.kind.has_staff() {
            return Err(AbmError::data(
                None,
                Stage::Occupancy,
                Some(agent),
                format!("{} has no staff roster", self.id),
            ));
        }
        self.staff.insert(agent);
        Ok(())
    }

    pub fn remove_staff(&mut self, agent: AgentId) -> bool {
        self.staff.remove(&agent)
    }

    #[must_use]
    pub fn staff(&self) -> &Roster {
        &self.staff
    }

    #[must_use]
    pub fn transmission_coefficient(&self) -> f64 {
        self.coefficient
    }

    /// The coefficient of the additional staff-to-resident term.
    #[must_use]
    pub fn staff_transmission_coefficient(&self) -> f64 {
        self.staff_coefficient
    }

    pub fn set_coefficients(
        &mut self,
        coefficient: f64,
        staff_coefficient: f64,
    ) -> Result<(), AbmError> {
        check_coefficient(self.id.kind, coefficient)?;
        check_coefficient(self.id.kind, staff_coefficient)?;
        self.coefficient = coefficient;
        self.staff_coefficient = staff_coefficient;
        Ok(())
    }
}

/// All places of a realization, stored per kind.
#[derive(Clone, Debug, Default)]
pub struct Places {
    by_kind: [Vec<Place>; PlaceKind::COUNT],
}

impl Places {
    #[must_use]
    pub fn new() -> Places {
        Places::default()
    }

    /// Appends a place of the given kind; its index is the number of places of that kind so far.
    pub fn push(
        &mut self,
        kind: PlaceKind,
        x: f64,
        y: f64,
        coefficient: f64,
        staff_coefficient: f64,
    ) -> Result<PlaceId, AbmError> {
        let places = &mut self.by_kind[kind.slot()];
        let id = PlaceId::new(kind, places.len());
        places.push(Place::new(id, x, y, coefficient, staff_coefficient)?);
        Ok(id)
    }

    #[must_use]
    pub fn count(&self, kind: PlaceKind) -> usize {
        self.by_kind[kind.slot()].len()
    }

    #[must_use]
    pub fn of_kind(&self, kind: PlaceKind) -> &[Place] {
        &self.by_kind[kind.slot()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Place> {
        PlaceKind::iter().flat_map(move |kind| self.of_kind(kind).iter())
    }

    pub fn get(&self, id: PlaceId) -> Result<&Place, AbmError> {
        self.by_kind[id.kind.slot()]
            .get(id.index)
            .ok_or_else(|| out_of_range(id))
    }

    pub fn get_mut(&mut self, id: PlaceId) -> Result<&mut Place, AbmError> {
        self.by_kind[id.kind.slot()]
            .get_mut(id.index)
            .ok_or_else(|| out_of_range(id))
    }

    /// Sets the coefficients of every place of a kind.
    pub fn set_kind_coefficients(
        &mut self,
        kind: PlaceKind,
        coefficient: f64,
        staff_coefficient: f64,
    ) -> Result<(), AbmError> {
        for place in &mut self.by_kind[kind.slot()] {
            place.set_coefficients(coefficient, staff_coefficient)?;
        }
        Ok(())
    }

    pub fn apply(&mut self, change: RosterChange) -> Result<(), AbmError> {
        match change {
            RosterChange::Add {
                place,
                roster: RosterKind::General,
                agent,
            } => self.get_mut(place)?.add_occupant(agent),
            RosterChange::Add {
                place,
                roster: RosterKind::Staff,
                agent,
            } => self.get_mut(place)?.add_staff(agent)?,
            RosterChange::Remove {
                place,
                roster: RosterKind::General,
                agent,
            } => {
                self.get_mut(place)?.remove_occupant(agent);
            }
            RosterChange::Remove {
                place,
                roster: RosterKind::Staff,
                agent,
            } => {
                self.get_mut(place)?.remove_staff(agent);
            }
        }
        Ok(())
    }

    pub fn apply_all(
        &mut self,
        changes: impl IntoIterator<Item = RosterChange>,
    ) -> Result<(), AbmError> {
        for change in changes {
            self.apply(change)?;
        }
        Ok(())
    }
}

fn out_of_range(id: PlaceId) -> AbmError {
    AbmError::data(
        None,
        Stage::Occupancy,
        None,
        format!("{id} is outside the declared range"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn household(places: &mut Places) -> PlaceId {
        places.push(PlaceKind::Household, 0.0, 0.0, 0.1, 0.0).unwrap()
    }

    #[test]
    fn add_and_remove_occupants() {
        let mut places = Places::new();
        let id = household(&mut places);
        let place = places.get_mut(id).unwrap();
        place.add_occupant(AgentId::new(2));
        place.add_occupant(AgentId::new(1));
        place.add_occupant(AgentId::new(1));
        assert_eq!(
            place.occupants().iter().copied().collect::<Vec<_>>(),
            vec![AgentId::new(1), AgentId::new(2)]
        );
        assert!(place.remove_occupant(AgentId::new(1)));
        assert!(!place.remove_occupant(AgentId::new(1)));
        assert_eq!(
            place.occupants().iter().copied().collect::<Vec<_>>(),
            vec![AgentId::new(2)]
        );
    }

    #[test]
    fn large_rosters_stay_in_agent_order() {
        let mut places = Places::new();
        let hospital = places
            .push(PlaceKind::Hospital, 0.0, 0.0, 0.1, 0.1)
            .unwrap();
        let place = places.get_mut(hospital).unwrap();
        for index in (0..50_000).rev() {
            place.add_staff(AgentId::new(index)).unwrap();
            place.add_staff(AgentId::new(index)).unwrap();
        }
        for index in (0..50_000).step_by(2) {
            assert!(place.remove_staff(AgentId::new(index)));
        }
        assert_eq!(place.staff().len(), 25_000);
        assert!(place.staff().iter().map(|id| id.index()).eq((1..50_000).step_by(2)));
    }

    #[test]
    fn coefficient_must_be_below_one() {
        let mut places = Places::new();
        assert!(matches!(
            places.push(PlaceKind::School, 0.0, 0.0, 1.0, 0.0),
            Err(AbmError::ConfigError(_))
        ));
        assert!(places.push(PlaceKind::School, 0.0, 0.0, -0.1, 0.0).is_err());
        let id = household(&mut places);
        assert!(places
            .set_kind_coefficients(PlaceKind::Household, 0.0, 0.0)
            .is_ok());
        assert!(places.get_mut(id).unwrap().set_coefficients(2.0, 0.0).is_err());
    }

    #[test]
    fn staff_roster_only_for_hospitals_and_retirement_homes() {
        let mut places = Places::new();
        let home = household(&mut places);
        let hospital = places
            .push(PlaceKind::Hospital, 1.0, 2.0, 0.2, 0.1)
            .unwrap();
        assert!(places.get_mut(home).unwrap().add_staff(AgentId::new(0)).is_err());
        places
            .apply(RosterChange::Add {
                place: hospital,
                roster: RosterKind::Staff,
                agent: AgentId::new(3),
            })
            .unwrap();
        assert!(places
            .get(hospital)
            .unwrap()
            .staff()
            .iter()
            .eq([AgentId::new(3)].iter()));
        assert!(places.get(hospital).unwrap().occupants().is_empty());
    }

    #[test]
    fn out_of_range_is_data_error() {
        let places = Places::new();
        let missing = PlaceId::new(PlaceKind::Workplace, 4);
        assert!(matches!(
            places.get(missing),
            Err(AbmError::DataError {
                stage: Stage::Occupancy,
                ..
            })
        ));
    }

    #[test]
    fn places_are_indexed_per_kind() {
        let mut places = Places::new();
        household(&mut places);
        let second = household(&mut places);
        let school = places.push(PlaceKind::School, 0.0, 0.0, 0.05, 0.0).unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(school.index, 0);
        assert_eq!(places.count(PlaceKind::Household), 2);
        assert_eq!(places.iter().count(), 3);
        assert_eq!(school.to_string(), "school 1");
    }
}
