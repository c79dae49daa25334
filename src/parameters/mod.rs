//! Model parameters.
//!
//! Parameters are read either from the labelled table format (see [`table`]) or from a JSON
//! document with the field names of [`Parameters`]. Both are validated the same way before a
//! realization is built, so a bad value fails before any random draw.

pub mod table;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::info;
use serde_derive::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, EnumIter, EnumString};

use crate::error::AbmError;
use crate::numeric::{is_probability, sums_to_at_most_one};
use crate::places::PlaceKind;
use crate::random::{DistributionSpec, Sampler};
use crate::testing::TestingChange;
use table::{ParameterTable, TableReader};

/// Mean days from symptom onset to a death outside hospital care.
pub const DEFAULT_TIME_TO_DEATH_DAYS: u32 = 16;

fn default_time_to_death_days() -> u32 {
    DEFAULT_TIME_TO_DEATH_DAYS
}

/// Transmission coefficients per place kind. Staff coefficients apply to the staff of
/// hospitals and retirement homes as seen by residents and patients.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Coefficients {
    pub household: f64,
    pub school: f64,
    pub workplace: f64,
    pub hospital: f64,
    pub hospital_staff: f64,
    pub retirement_home: f64,
    pub retirement_home_staff: f64,
}

impl Coefficients {
    /// The general and staff coefficients of a place kind.
    #[must_use]
    pub fn for_kind(&self, kind: PlaceKind) -> (f64, f64) {
        match kind {
            PlaceKind::Household => (self.household, 0.0),
            PlaceKind::School => (self.school, 0.0),
            PlaceKind::Workplace => (self.workplace, 0.0),
            PlaceKind::Hospital => (self.hospital, self.hospital_staff),
            PlaceKind::RetirementHome => (self.retirement_home, self.retirement_home_staff),
        }
    }
}

/// Groups vaccinated in full when testing starts.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    StrumDisplay,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum VaccinationGroup {
    HospitalEmployees,
    SchoolEmployees,
    RetirementHomeEmployees,
    RetirementHomeResidents,
}

/// From `day` on, the coefficients of every place of `kind` are the base coefficients times
/// `factor`. A factor of zero closes the places.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Intervention {
    pub day: u32,
    pub kind: PlaceKind,
    pub factor: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Parameters {
    pub days: u32,
    /// When non-zero, this many randomly chosen agents are infected at the start instead of
    /// the agents flagged in the population file.
    #[serde(default)]
    pub initially_infected: usize,
    /// Days between agent state dumps; zero disables them.
    #[serde(default)]
    pub state_dump_interval: u32,

    /// Lower bounds of the age bands, starting at 0.
    pub age_bands: Vec<u32>,
    pub infectious_after_days: u32,
    pub latency_days: u32,
    #[serde(default)]
    pub latency_distribution: Option<DistributionSpec>,
    pub asymptomatic_fraction: Vec<f64>,
    pub severe_fraction: Vec<f64>,
    pub recovery_days: u32,
    pub onset_to_hospitalization_days: u32,
    #[serde(default)]
    pub onset_to_hospitalization_distribution: Option<DistributionSpec>,
    pub untreated_death_fraction: f64,
    /// Per age band, the fraction of symptomatic agents who are never hospitalized and die at
    /// home. Empty means nobody does.
    #[serde(default)]
    pub mortality: Vec<f64>,
    #[serde(default = "default_time_to_death_days")]
    pub time_to_death_days: u32,
    #[serde(default)]
    pub time_to_death_distribution: Option<DistributionSpec>,
    pub hospital_stay_days: u32,
    pub icu_fraction: Vec<f64>,
    pub hospital_death_fraction: f64,
    pub icu_days: u32,
    pub icu_death_fraction: f64,
    pub post_icu_days: u32,
    pub flu_fraction: f64,
    pub flu_days: u32,

    pub coefficients: Coefficients,

    pub testing_start_day: u32,
    pub test_sensitivity: f64,
    pub test_specificity: f64,
    pub turnaround_days: u32,
    pub symptomatic_test_fraction: f64,
    pub employee_test_fraction: f64,
    pub flu_test_fraction: f64,
    #[serde(default)]
    pub surveillance_fraction: f64,
    pub isolation_days: u32,
    #[serde(default)]
    pub testing_schedule: Vec<TestingChange>,

    #[serde(default)]
    pub vaccine_efficacy: f64,
    #[serde(default)]
    pub random_vaccinations: usize,
    #[serde(default)]
    pub vaccinated_groups: Vec<VaccinationGroup>,
    #[serde(default)]
    pub interventions: Vec<Intervention>,
}

impl Default for Parameters {
    fn default() -> Self {
        Parameters {
            days: 100,
            initially_infected: 0,
            state_dump_interval: 0,
            age_bands: vec![0, 20, 40, 60, 80],
            infectious_after_days: 2,
            latency_days: 3,
            latency_distribution: None,
            asymptomatic_fraction: vec![0.5, 0.4, 0.3, 0.25, 0.2],
            severe_fraction: vec![0.01, 0.03, 0.08, 0.2, 0.35],
            recovery_days: 10,
            onset_to_hospitalization_days: 6,
            onset_to_hospitalization_distribution: None,
            untreated_death_fraction: 0.05,
            mortality: vec![0.0, 0.0005, 0.002, 0.01, 0.05],
            time_to_death_days: DEFAULT_TIME_TO_DEATH_DAYS,
            time_to_death_distribution: None,
            hospital_stay_days: 8,
            icu_fraction: vec![0.05, 0.1, 0.2, 0.3, 0.35],
            hospital_death_fraction: 0.1,
            icu_days: 10,
            icu_death_fraction: 0.3,
            post_icu_days: 7,
            flu_fraction: 0.0,
            flu_days: 7,
            coefficients: Coefficients {
                household: 0.2,
                school: 0.05,
                workplace: 0.04,
                hospital: 0.02,
                hospital_staff: 0.01,
                retirement_home: 0.05,
                retirement_home_staff: 0.03,
            },
            testing_start_day: 0,
            test_sensitivity: 0.9,
            test_specificity: 0.99,
            turnaround_days: 2,
            symptomatic_test_fraction: 0.5,
            employee_test_fraction: 1.0,
            flu_test_fraction: 0.5,
            surveillance_fraction: 0.0,
            isolation_days: 14,
            testing_schedule: Vec::new(),
            vaccine_efficacy: 0.0,
            random_vaccinations: 0,
            vaccinated_groups: Vec::new(),
            interventions: Vec::new(),
        }
    }
}

fn check_probability(name: &str, value: f64) -> Result<(), AbmError> {
    if is_probability(value) {
        Ok(())
    } else {
        Err(AbmError::config(format!(
            "{name} must be a probability, got {value}"
        )))
    }
}

fn check_coefficient(name: &str, value: f64) -> Result<(), AbmError> {
    if value.is_finite() && (0.0..1.0).contains(&value) {
        Ok(())
    } else {
        Err(AbmError::config(format!(
            "{name} transmission rate must be in [0, 1), got {value}"
        )))
    }
}

fn build_optional(spec: Option<&DistributionSpec>) -> Result<Option<Sampler>, AbmError> {
    spec.map(DistributionSpec::build).transpose()
}

impl Parameters {
    /// Loads parameters from a `.json` document or a labelled table, then validates them.
    pub fn load(path: &Path) -> Result<Parameters, AbmError> {
        let text = fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        let parameters = if is_json {
            serde_json::from_str::<Parameters>(&text)?
        } else {
            Parameters::from_table(&ParameterTable::parse(&text)?)?
        };
        parameters.validate()?;
        info!("loaded parameters from {}", path.display());
        Ok(parameters)
    }

    /// Reads every field from a labelled table. Labels the table holds but that name no field
    /// are configuration errors.
    pub fn from_table(table: &ParameterTable) -> Result<Parameters, AbmError> {
        let mut reader = table.reader();
        let parameters = Parameters {
            days: reader.value("simulation days")?,
            initially_infected: reader.optional_value("initially infected")?.unwrap_or(0),
            state_dump_interval: reader.optional_value("state dump interval")?.unwrap_or(0),
            age_bands: reader.values("age bands")?,
            infectious_after_days: reader.value("time from exposed to infectiousness")?,
            latency_days: reader.value("latency days")?,
            latency_distribution: read_distribution(&mut reader, "latency distribution")?,
            asymptomatic_fraction: reader.values("fraction never symptomatic")?,
            severe_fraction: reader.values("fraction severe")?,
            recovery_days: reader.value("recovery time")?,
            onset_to_hospitalization_days: reader.value("onset to hospitalization")?,
            onset_to_hospitalization_distribution: read_distribution(
                &mut reader,
                "onset to hospitalization distribution",
            )?,
            untreated_death_fraction: reader.value("probability of death before admission")?,
            mortality: if reader.contains("mortality") {
                reader.values("mortality")?
            } else {
                Vec::new()
            },
            time_to_death_days: reader
                .optional_value("time to death")?
                .unwrap_or(DEFAULT_TIME_TO_DEATH_DAYS),
            time_to_death_distribution: read_distribution(
                &mut reader,
                "time to death distribution",
            )?,
            hospital_stay_days: reader.value("hospital stay")?,
            icu_fraction: reader.values("fraction ICU")?,
            hospital_death_fraction: reader.value("probability of death in hospital")?,
            icu_days: reader.value("ICU stay")?,
            icu_death_fraction: reader.value("probability of death in ICU")?,
            post_icu_days: reader.value("post ICU stay")?,
            flu_fraction: reader.value("fraction with flu")?,
            flu_days: reader.value("flu duration")?,
            coefficients: Coefficients {
                household: reader.value("household transmission rate")?,
                school: reader.value("school transmission rate")?,
                workplace: reader.value("workplace transmission rate")?,
                hospital: reader.value("hospital transmission rate")?,
                hospital_staff: reader.value("hospital staff transmission rate")?,
                retirement_home: reader.value("retirement home transmission rate")?,
                retirement_home_staff: reader
                    .value("retirement home staff transmission rate")?,
            },
            testing_start_day: reader.value("start testing")?,
            test_sensitivity: reader.value("test sensitivity")?,
            test_specificity: reader.value("test specificity")?,
            turnaround_days: reader.value("time from test to results")?,
            symptomatic_test_fraction: reader.value("fraction to get tested")?,
            employee_test_fraction: reader.value("fraction of employees to get tested")?,
            flu_test_fraction: reader.value("fraction of flu to get tested")?,
            surveillance_fraction: reader.optional_value("surveillance fraction")?.unwrap_or(0.0),
            isolation_days: reader.value("isolation duration")?,
            testing_schedule: read_testing_schedule(&mut reader)?,
            vaccine_efficacy: reader.optional_value("vaccine efficacy")?.unwrap_or(0.0),
            random_vaccinations: reader.optional_value("random vaccinations")?.unwrap_or(0),
            vaccinated_groups: if reader.contains("vaccinated groups") {
                reader.values("vaccinated groups")?
            } else {
                Vec::new()
            },
            interventions: read_interventions(&mut reader)?,
        };
        reader.finish()?;
        Ok(parameters)
    }

    /// Index of the age band an age falls into.
    #[must_use]
    pub fn age_band(&self, age: u32) -> usize {
        self.age_bands
            .iter()
            .rposition(|&lower| lower <= age)
            .unwrap_or(0)
    }

    /// The latency hold distribution; without one, only `latency_days` applies.
    pub fn latency_sampler(&self) -> Result<Option<Sampler>, AbmError> {
        build_optional(self.latency_distribution.as_ref())
    }

    pub fn onset_to_hospitalization_sampler(&self) -> Result<Option<Sampler>, AbmError> {
        build_optional(self.onset_to_hospitalization_distribution.as_ref())
    }

    pub fn time_to_death_sampler(&self) -> Result<Option<Sampler>, AbmError> {
        build_optional(self.time_to_death_distribution.as_ref())
    }

    /// The fraction of symptomatic agents of an age band who die without hospital care.
    #[must_use]
    pub fn mortality(&self, band: usize) -> f64 {
        self.mortality.get(band).copied().unwrap_or(0.0)
    }

    /// Checks every value against its allowed range.
    pub fn validate(&self) -> Result<(), AbmError> {
        let bands = self.age_bands.len();
        if self.age_bands.first() != Some(&0) {
            return Err(AbmError::config("age bands must start at 0"));
        }
        if self.age_bands.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(AbmError::config("age bands must be strictly increasing"));
        }
        for (name, fractions) in [
            ("fraction never symptomatic", &self.asymptomatic_fraction),
            ("fraction severe", &self.severe_fraction),
            ("fraction ICU", &self.icu_fraction),
        ] {
            if fractions.len() != bands {
                return Err(AbmError::config(format!(
                    "{name} has {} values for {bands} age bands",
                    fractions.len()
                )));
            }
            for &fraction in fractions {
                check_probability(name, fraction)?;
            }
        }
        if !self.mortality.is_empty() && self.mortality.len() != bands {
            return Err(AbmError::config(format!(
                "mortality has {} values for {bands} age bands",
                self.mortality.len()
            )));
        }
        for &fraction in &self.mortality {
            check_probability("mortality", fraction)?;
        }
        for band in 0..bands {
            if !sums_to_at_most_one(self.asymptomatic_fraction[band] + self.severe_fraction[band])
            {
                return Err(AbmError::config(format!(
                    "never-symptomatic and severe fractions of age band {band} exceed 1"
                )));
            }
            if !sums_to_at_most_one(self.icu_fraction[band] + self.hospital_death_fraction) {
                return Err(AbmError::config(format!(
                    "ICU fraction of age band {band} and probability of death in hospital exceed 1"
                )));
            }
        }

        for (name, value) in [
            ("probability of death before admission", self.untreated_death_fraction),
            ("probability of death in hospital", self.hospital_death_fraction),
            ("probability of death in ICU", self.icu_death_fraction),
            ("fraction with flu", self.flu_fraction),
            ("test sensitivity", self.test_sensitivity),
            ("test specificity", self.test_specificity),
            ("fraction to get tested", self.symptomatic_test_fraction),
            ("fraction of employees to get tested", self.employee_test_fraction),
            ("fraction of flu to get tested", self.flu_test_fraction),
            ("surveillance fraction", self.surveillance_fraction),
            ("vaccine efficacy", self.vaccine_efficacy),
        ] {
            check_probability(name, value)?;
        }
        for change in &self.testing_schedule {
            check_probability("scheduled symptomatic fraction", change.symptomatic_fraction)?;
            check_probability("scheduled surveillance fraction", change.surveillance_fraction)?;
        }

        let coefficients = &self.coefficients;
        for (name, value) in [
            ("household", coefficients.household),
            ("school", coefficients.school),
            ("workplace", coefficients.workplace),
            ("hospital", coefficients.hospital),
            ("hospital staff", coefficients.hospital_staff),
            ("retirement home", coefficients.retirement_home),
            ("retirement home staff", coefficients.retirement_home_staff),
        ] {
            check_coefficient(name, value)?;
        }
        for intervention in &self.interventions {
            if !intervention.factor.is_finite() || intervention.factor < 0.0 {
                return Err(AbmError::config(format!(
                    "intervention on day {} has invalid factor {}",
                    intervention.day, intervention.factor
                )));
            }
            let (general, staff) = coefficients.for_kind(intervention.kind);
            check_coefficient(
                &format!("{} (after intervention on day {})", intervention.kind, intervention.day),
                general * intervention.factor,
            )?;
            check_coefficient(
                &format!(
                    "{} staff (after intervention on day {})",
                    intervention.kind, intervention.day
                ),
                staff * intervention.factor,
            )?;
        }

        self.latency_sampler()?;
        self.onset_to_hospitalization_sampler()?;
        self.time_to_death_sampler()?;
        Ok(())
    }
}

fn read_distribution(
    reader: &mut TableReader<'_>,
    label: &str,
) -> Result<Option<DistributionSpec>, AbmError> {
    match reader.optional_rows(label) {
        None => Ok(None),
        Some([row]) => DistributionSpec::from_tokens(row).map(Some),
        Some(_) => Err(AbmError::config(format!(
            "parameter '{label}' must be a single line"
        ))),
    }
}

fn parse_field<T: FromStr>(label: &str, token: &str) -> Result<T, AbmError> {
    token
        .parse::<T>()
        .map_err(|_| AbmError::ParseError(format!("parameter '{label}': cannot parse '{token}'")))
}

fn read_testing_schedule(reader: &mut TableReader<'_>) -> Result<Vec<TestingChange>, AbmError> {
    const LABEL: &str = "testing schedule";
    let Some(rows) = reader.optional_rows(LABEL) else {
        return Ok(Vec::new());
    };
    rows.iter()
        .map(|row| match row.as_slice() {
            [day, symptomatic, surveillance] => Ok(TestingChange {
                day: parse_field(LABEL, day)?,
                symptomatic_fraction: parse_field(LABEL, symptomatic)?,
                surveillance_fraction: parse_field(LABEL, surveillance)?,
            }),
            _ => Err(AbmError::config(format!(
                "'{LABEL}' rows are 'day symptomatic surveillance', got '{}'",
                row.join(" ")
            ))),
        })
        .collect()
}

fn read_interventions(reader: &mut TableReader<'_>) -> Result<Vec<Intervention>, AbmError> {
    const LABEL: &str = "interventions";
    let Some(rows) = reader.optional_rows(LABEL) else {
        return Ok(Vec::new());
    };
    rows.iter()
        .map(|row| match row.as_slice() {
            [day, kind, factor] => Ok(Intervention {
                day: parse_field(LABEL, day)?,
                kind: parse_field(LABEL, kind)?,
                factor: parse_field(LABEL, factor)?,
            }),
            _ => Err(AbmError::config(format!(
                "'{LABEL}' rows are 'day kind factor', got '{}'",
                row.join(" ")
            ))),
        })
        .collect()
}
