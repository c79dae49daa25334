//! CSV reports and output files of a realization.
//!
//! A report is a row type. [`Reports::add_report`] opens one CSV file per row type and
//! [`Reports::send_report`] appends a row to the file of its type. Snapshots (agent state dumps)
//! and the parameter echo are written as separate files in the same directory.

use std::any::TypeId;
use std::collections::HashMap;
use std::fs::{create_dir_all, File};
use std::path::{Path, PathBuf};

use csv::Writer;
use log::{debug, trace};
use serde::Serialize;
use serde_derive::Deserialize;

use crate::error::AbmError;
use crate::parameters::Parameters;
use crate::population::Agent;

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;
    // Serializes the data with the correct writer
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), AbmError>;
}

/// Implements [`Report`] for a serializable row type.
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::error::AbmError> {
                writer.serialize(self)?;
                Ok(())
            }
        }
    };
}
pub use define_report;

/// Where and how report files are written.
#[derive(Clone, Debug)]
pub struct ReportOptions {
    pub directory: PathBuf,
    /// Prepended to every file name.
    pub file_prefix: String,
    /// Replace existing files instead of failing.
    pub overwrite: bool,
}

impl ReportOptions {
    #[must_use]
    pub fn new(directory: &Path) -> ReportOptions {
        ReportOptions {
            directory: directory.to_path_buf(),
            file_prefix: String::new(),
            overwrite: false,
        }
    }

    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> ReportOptions {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn file_prefix(mut self, prefix: &str) -> ReportOptions {
        self.file_prefix = prefix.to_string();
        self
    }

    /// The full path of an output file.
    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{}{name}", self.file_prefix))
    }
}

// Creates the output file and its parent directories. Refuses to replace an existing file
// unless the options allow it.
fn create_output(options: &ReportOptions, name: &str) -> Result<File, AbmError> {
    let path = options.path(name);
    if path.exists() && !options.overwrite {
        return Err(AbmError::ReportError(format!(
            "{} already exists; pass --overwrite to replace it",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    trace!("creating {}", path.display());
    Ok(File::create(path)?)
}

pub struct Reports {
    options: ReportOptions,
    file_writers: HashMap<TypeId, Writer<File>>,
}

impl Reports {
    #[must_use]
    pub fn new(options: ReportOptions) -> Reports {
        Reports {
            options,
            file_writers: HashMap::new(),
        }
    }

    #[must_use]
    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Opens `<prefix><short_name>.csv` for rows of type `T`.
    pub fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), AbmError> {
        let file = create_output(&self.options, &format!("{short_name}.csv"))?;
        self.file_writers
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        debug!("added report {short_name}");
        Ok(())
    }

    /// Writes a new row to the file of the report's type.
    pub fn send_report<T: Report>(&mut self, report: &T) -> Result<(), AbmError> {
        let writer = self
            .file_writers
            .get_mut(&Report::type_id(report))
            .ok_or_else(|| AbmError::ReportError("No writer found for the report type".into()))?;
        report.serialize(writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Writes a complete CSV file of rows.
    pub fn write_snapshot<T: Serialize>(&self, name: &str, rows: &[T]) -> Result<(), AbmError> {
        let file = create_output(&self.options, name)?;
        let mut writer = Writer::from_writer(file);
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Echoes the parameters of the run to `parameters.json`.
    pub fn write_parameters(&self, parameters: &Parameters) -> Result<(), AbmError> {
        let file = create_output(&self.options, "parameters.json")?;
        serde_json::to_writer_pretty(file, parameters)?;
        Ok(())
    }
}

/// One row of `daily_counts.csv`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCounts {
    pub day: u32,
    pub susceptible: usize,
    pub exposed: usize,
    pub infected: usize,
    pub hospitalized: usize,
    pub icu: usize,
    pub recovered: usize,
    pub deceased: usize,
    pub flu: usize,
    pub isolated: usize,
    pub new_infections: u64,
    pub tested: u64,
    pub tested_positive: u64,
    pub tested_negative: u64,
    pub false_positive: u64,
    pub false_negative: u64,
    pub cumulative_infections: u64,
    pub cumulative_positive: u64,
    pub rng_draws: u64,
}

define_report!(DailyCounts);

/// One row of an `agents_day_<d>.csv` state dump: the population file fields plus the
/// agent's state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentStateRow {
    pub agent_id: usize,
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
    pub state: String,
    pub dwell: u32,
    pub test_status: String,
    pub isolated: u8,
    pub vaccinated: u8,
}

impl From<&Agent> for AgentStateRow {
    fn from(agent: &Agent) -> Self {
        let record = agent.demographics.to_record();
        AgentStateRow {
            agent_id: agent.id.index() + 1,
            student: record.student,
            works: record.works,
            age: record.age,
            x: record.x,
            y: record.y,
            household_id: record.household_id,
            non_covid_patient: record.non_covid_patient,
            school_id: record.school_id,
            lives_in_retirement_home: record.lives_in_retirement_home,
            works_at_retirement_home: record.works_at_retirement_home,
            works_at_school: record.works_at_school,
            work_id: record.work_id,
            hospital_employee: record.hospital_employee,
            hospital_id: record.hospital_id,
            infected: record.infected,
            state: agent.state.to_string(),
            dwell: agent.dwell,
            test_status: agent.test.label().to_string(),
            isolated: u8::from(agent.is_isolated()),
            vaccinated: u8::from(agent.vaccinated),
        }
    }
}
