//! Reading the population snapshot and the place tables.
//!
//! All files are whitespace-delimited without headers. Rows are tokenized on any run of
//! whitespace and then deserialized by position with `csv`'s serde support.

use std::fs;
use std::path::Path;

use csv::StringRecord;
use log::{debug, info};
use serde::de::DeserializeOwned;
use serde_derive::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::error::{AbmError, Stage};
use crate::places::PlaceKind;

/// One row of the population file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationRecord {
    pub student: u8,
    pub works: u8,
    pub age: u32,
    pub x: f64,
    pub y: f64,
    pub household_id: i64,
    pub non_covid_patient: u8,
    pub school_id: i64,
    pub lives_in_retirement_home: u8,
    pub works_at_retirement_home: u8,
    pub works_at_school: u8,
    pub work_id: i64,
    pub hospital_employee: u8,
    pub hospital_id: i64,
    pub infected: u8,
}

/// One row of a place table. Trailing fields (e.g. a school type) are ignored.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct PlaceRecord {
    pub id: i64,
    pub x: f64,
    pub y: f64,
}

impl PlaceRecord {
    #[must_use]
    pub fn at(id: usize, x: f64, y: f64) -> PlaceRecord {
        PlaceRecord {
            id: id as i64,
            x,
            y,
        }
    }
}

/// The population and place tables of one model input.
#[derive(Clone, Debug, Default)]
pub struct PopulationSnapshot {
    pub agents: Vec<PopulationRecord>,
    pub households: Vec<PlaceRecord>,
    pub schools: Vec<PlaceRecord>,
    pub workplaces: Vec<PlaceRecord>,
    pub hospitals: Vec<PlaceRecord>,
    pub retirement_homes: Vec<PlaceRecord>,
}

pub const POPULATION_FILE: &str = "population.txt";

fn place_file(kind: PlaceKind) -> &'static str {
    match kind {
        PlaceKind::Household => "households.txt",
        PlaceKind::School => "schools.txt",
        PlaceKind::Workplace => "workplaces.txt",
        PlaceKind::Hospital => "hospitals.txt",
        PlaceKind::RetirementHome => "retirement_homes.txt",
    }
}

impl PopulationSnapshot {
    /// Loads `population.txt` and the place tables from a directory. Households are required;
    /// a missing table of any other kind means there are no places of that kind.
    pub fn load(directory: &Path) -> Result<PopulationSnapshot, AbmError> {
        let mut snapshot = PopulationSnapshot {
            agents: read_rows(&directory.join(POPULATION_FILE), 15)?,
            ..PopulationSnapshot::default()
        };
        for kind in PlaceKind::iter() {
            let path = directory.join(place_file(kind));
            if kind != PlaceKind::Household && !path.exists() {
                debug!("no {} table at {}", kind, path.display());
                continue;
            }
            *snapshot.places_mut(kind) = read_rows(&path, 3)?;
        }
        snapshot.check_place_ids()?;
        info!(
            "loaded {} agents and {} places from {}",
            snapshot.agents.len(),
            PlaceKind::iter()
                .map(|kind| snapshot.places(kind).len())
                .sum::<usize>(),
            directory.display()
        );
        Ok(snapshot)
    }

    #[must_use]
    pub fn places(&self, kind: PlaceKind) -> &[PlaceRecord] {
        match kind {
            PlaceKind::Household => &self.households,
            PlaceKind::School => &self.schools,
            PlaceKind::Workplace => &self.workplaces,
            PlaceKind::Hospital => &self.hospitals,
            PlaceKind::RetirementHome => &self.retirement_homes,
        }
    }

    pub fn places_mut(&mut self, kind: PlaceKind) -> &mut Vec<PlaceRecord> {
        match kind {
            PlaceKind::Household => &mut self.households,
            PlaceKind::School => &mut self.schools,
            PlaceKind::Workplace => &mut self.workplaces,
            PlaceKind::Hospital => &mut self.hospitals,
            PlaceKind::RetirementHome => &mut self.retirement_homes,
        }
    }

    /// Row order defines place identifiers, so each row's id must equal its 1-based position.
    pub fn check_place_ids(&self) -> Result<(), AbmError> {
        for kind in PlaceKind::iter() {
            for (row, record) in self.places(kind).iter().enumerate() {
                if record.id != row as i64 + 1 {
                    return Err(AbmError::data(
                        None,
                        Stage::Load,
                        None,
                        format!(
                            "{kind} table row {} declares id {}",
                            row + 1,
                            record.id
                        ),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Reads a whitespace-delimited table. Each non-empty row must have at least `min_fields`
/// tokens; only the first `min_fields` are deserialized.
fn read_rows<T: DeserializeOwned>(path: &Path, min_fields: usize) -> Result<Vec<T>, AbmError> {
    let text = fs::read_to_string(path).map_err(|e| {
        AbmError::IoError(std::io::Error::new(
            e.kind(),
            format!("{}: {e}", path.display()),
        ))
    })?;
    parse_rows(&text, min_fields, path)
}

fn parse_rows<T: DeserializeOwned>(
    text: &str,
    min_fields: usize,
    path: &Path,
) -> Result<Vec<T>, AbmError> {
    let mut rows = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.is_empty() {
            continue;
        }
        if tokens.len() < min_fields {
            return Err(AbmError::ParseError(format!(
                "{}:{}: expected {min_fields} fields, found {}",
                path.display(),
                number + 1,
                tokens.len()
            )));
        }
        let record = StringRecord::from(&tokens[..min_fields]);
        let row: T = record.deserialize(None).map_err(|e| {
            AbmError::ParseError(format!("{}:{}: {e}", path.display(), number + 1))
        })?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn parses_population_rows() {
        let text = "0 1 35 0.5 0.25 1 0 0 0 0 0 2 0 0 1\n\n1  0 8 0.5 0.25 1 0 1 0 0 0 0 0 0 0\n";
        let rows: Vec<PopulationRecord> = parse_rows(text, 15, Path::new("population.txt")).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].age, 35);
        assert_eq!(rows[0].work_id, 2);
        assert_eq!(rows[0].infected, 1);
        assert_eq!(rows[1].student, 1);
        assert_eq!(rows[1].school_id, 1);
    }

    #[test]
    fn short_rows_are_parse_errors() {
        let result: Result<Vec<PopulationRecord>, _> =
            parse_rows("0 1 35\n", 15, Path::new("population.txt"));
        assert!(matches!(result, Err(AbmError::ParseError(m)) if m.contains("population.txt:1")));
    }

    #[test]
    fn bad_tokens_are_parse_errors() {
        let result: Result<Vec<PlaceRecord>, _> =
            parse_rows("1 0.0 north\n", 3, Path::new("schools.txt"));
        assert!(matches!(result, Err(AbmError::ParseError(_))));
    }

    #[test]
    fn place_rows_ignore_extra_fields() {
        let rows: Vec<PlaceRecord> =
            parse_rows("1 0.1 0.2 elementary\n2 0.3 0.4 high\n", 3, Path::new("schools.txt"))
                .unwrap();
        assert_eq!(rows[1], PlaceRecord::at(2, 0.3, 0.4));
    }

    #[test]
    fn load_from_directory() {
        let dir = tempdir().unwrap();
        let mut population = fs::File::create(dir.path().join(POPULATION_FILE)).unwrap();
        writeln!(population, "0 0 70 0.0 0.0 1 0 0 0 0 0 0 0 0 0").unwrap();
        fs::write(dir.path().join("households.txt"), "1 0.0 0.0\n").unwrap();
        let snapshot = PopulationSnapshot::load(dir.path()).unwrap();
        assert_eq!(snapshot.agents.len(), 1);
        assert_eq!(snapshot.households.len(), 1);
        assert!(snapshot.hospitals.is_empty());
    }

    #[test]
    fn missing_households_is_io_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(POPULATION_FILE), "").unwrap();
        assert!(matches!(
            PopulationSnapshot::load(dir.path()),
            Err(AbmError::IoError(_))
        ));
    }

    #[test]
    fn ids_must_follow_row_order() {
        let snapshot = PopulationSnapshot {
            schools: vec![PlaceRecord::at(1, 0.0, 0.0), PlaceRecord::at(3, 0.0, 0.0)],
            ..PopulationSnapshot::default()
        };
        assert!(matches!(
            snapshot.check_place_ids(),
            Err(AbmError::DataError {
                stage: Stage::Load,
                ..
            })
        ));
    }
}
