//! The testing and diagnosis pipeline.
//!
//! A test is requested when an agent develops symptoms (COVID or flu), is admitted to hospital,
//! or is picked by daily surveillance sampling. Whether a requested test is taken is decided
//! with the reason's probability under the current policy. A taken test stays pending for the
//! turnaround time and then resolves positive or negative according to the test's sensitivity
//! and specificity and the agent's true infection status on the day of the result.
//!
//! The pipeline only decides. Isolation and hospital admission after a positive result are
//! carried out by the driver.

use log::trace;
use serde_derive::{Deserialize, Serialize};
use strum::{Display as StrumDisplay, IntoStaticStr};

use crate::error::{AbmError, Stage};
use crate::parameters::Parameters;
use crate::population::Agent;
use crate::random::Stream;

#[derive(Copy, Clone, Debug, PartialEq, Eq, StrumDisplay)]
#[strum(serialize_all = "snake_case")]
pub enum TestReason {
    Symptomatic,
    /// Symptom onset in a hospital employee, tested with its own probability.
    EmployeeSymptomatic,
    FluSymptoms,
    Admission,
    Surveillance,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum TestStatus {
    #[default]
    NotTested,
    Pending {
        days_left: u32,
        reason: TestReason,
    },
    Positive {
        day: u32,
    },
    Negative {
        day: u32,
    },
}

impl TestStatus {
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, TestStatus::Pending { .. })
    }

    #[must_use]
    pub fn is_positive(&self) -> bool {
        matches!(self, TestStatus::Positive { .. })
    }

    /// Drops a pending test without a result. Returns whether there was one.
    pub fn void(&mut self) -> bool {
        if self.is_pending() {
            *self = TestStatus::NotTested;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        self.into()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TestOutcome {
    TruePositive,
    FalsePositive,
    TrueNegative,
    FalseNegative,
}

impl TestOutcome {
    #[must_use]
    pub fn is_positive(self) -> bool {
        matches!(self, TestOutcome::TruePositive | TestOutcome::FalsePositive)
    }
}

/// A change of the time-varying testing fractions, effective from `day`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestingChange {
    pub day: u32,
    pub symptomatic_fraction: f64,
    pub surveillance_fraction: f64,
}

pub struct TestingPipeline {
    start_day: u32,
    sensitivity: f64,
    specificity: f64,
    turnaround_days: u32,
    symptomatic_fraction: f64,
    employee_fraction: f64,
    flu_fraction: f64,
    surveillance_fraction: f64,
}

impl TestingPipeline {
    #[must_use]
    pub fn new(parameters: &Parameters) -> TestingPipeline {
        TestingPipeline {
            start_day: parameters.testing_start_day,
            sensitivity: parameters.test_sensitivity,
            specificity: parameters.test_specificity,
            turnaround_days: parameters.turnaround_days,
            symptomatic_fraction: parameters.symptomatic_test_fraction,
            employee_fraction: parameters.employee_test_fraction,
            flu_fraction: parameters.flu_test_fraction,
            surveillance_fraction: parameters.surveillance_fraction,
        }
    }

    #[must_use]
    pub fn is_active(&self, day: u32) -> bool {
        day >= self.start_day
    }

    #[must_use]
    pub fn start_day(&self) -> u32 {
        self.start_day
    }

    #[must_use]
    pub fn turnaround_days(&self) -> u32 {
        self.turnaround_days
    }

    pub fn apply_change(&mut self, change: &TestingChange) {
        trace!("testing fractions change on day {}: {change:?}", change.day);
        self.symptomatic_fraction = change.symptomatic_fraction;
        self.surveillance_fraction = change.surveillance_fraction;
    }

    #[must_use]
    pub fn request_probability(&self, reason: TestReason) -> f64 {
        match reason {
            TestReason::Symptomatic => self.symptomatic_fraction,
            TestReason::EmployeeSymptomatic => self.employee_fraction,
            TestReason::FluSymptoms => self.flu_fraction,
            TestReason::Admission => 1.0,
            TestReason::Surveillance => self.surveillance_fraction,
        }
    }

    /// Agents with a pending or positive test, and agents in terminal states, are not tested.
    #[must_use]
    pub fn can_request(agent: &Agent) -> bool {
        !agent.state.is_terminal() && !agent.test.is_pending() && !agent.test.is_positive()
    }

    /// Whether daily surveillance may pick the agent: anyone who can be tested and is not in
    /// hospital.
    #[must_use]
    pub fn is_surveillance_candidate(&self, agent: &Agent) -> bool {
        self.surveillance_fraction > 0.0 && agent.admitted_to.is_none() && Self::can_request(agent)
    }

    /// Decides whether a requested test is taken. Consumes one draw when testing is active and
    /// the agent can be tested. A taken test becomes pending for the turnaround time.
    pub fn consider(
        &self,
        agent: &mut Agent,
        reason: TestReason,
        day: u32,
        stream: &mut Stream,
    ) -> bool {
        if !self.is_active(day) || !Self::can_request(agent) {
            return false;
        }
        if !stream.bernoulli(self.request_probability(reason)) {
            return false;
        }
        trace!("agent {} tested on day {day} ({reason})", agent.id);
        agent.test = TestStatus::Pending {
            days_left: self.turnaround_days,
            reason,
        };
        true
    }

    /// Advances a pending test by one day. Returns true when its result is due.
    pub fn countdown(agent: &mut Agent) -> bool {
        match &mut agent.test {
            TestStatus::Pending { days_left, .. } => {
                *days_left = days_left.saturating_sub(1);
                *days_left == 0
            }
            _ => false,
        }
    }

    /// Resolves a due test against the agent's true infection status.
    pub fn resolve(
        &self,
        agent: &mut Agent,
        day: u32,
        stream: &mut Stream,
    ) -> Result<TestOutcome, AbmError> {
        if !agent.test.is_pending() {
            return Err(AbmError::data(
                Some(day),
                Stage::Testing,
                Some(agent.id),
                "resolving a test that is not pending",
            ));
        }
        if agent.state.is_terminal() {
            return Err(AbmError::data(
                Some(day),
                Stage::Testing,
                Some(agent.id),
                format!("pending test on an agent in terminal state {}", agent.state),
            ));
        }
        let infected = agent.state.compartment().is_infected();
        let outcome = if infected {
            if stream.bernoulli(self.sensitivity) {
                TestOutcome::TruePositive
            } else {
                TestOutcome::FalseNegative
            }
        } else if stream.bernoulli(1.0 - self.specificity) {
            TestOutcome::FalsePositive
        } else {
            TestOutcome::TrueNegative
        };
        agent.test = if outcome.is_positive() {
            TestStatus::Positive { day }
        } else {
            TestStatus::Negative { day }
        };
        trace!("agent {} test result on day {day}: {outcome:?}", agent.id);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::places::{PlaceId, PlaceKind};
    use crate::population::{AgentId, Demographics};
    use crate::random::{RngService, StreamKind};
    use crate::states::{HealthState, RegularState};
    use assert_approx_eq::assert_approx_eq;

    fn agent(state: RegularState) -> Agent {
        let demographics = Demographics {
            age: 30,
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
        agent.state = HealthState::Regular(state);
        agent
    }

    fn pipeline(sensitivity: f64, specificity: f64, turnaround_days: u32) -> TestingPipeline {
        let parameters = Parameters {
            testing_start_day: 2,
            test_sensitivity: sensitivity,
            test_specificity: specificity,
            turnaround_days,
            symptomatic_test_fraction: 1.0,
            ..Parameters::default()
        };
        TestingPipeline::new(&parameters)
    }

    #[test]
    fn requests_wait_for_start_day() {
        let pipeline = pipeline(1.0, 1.0, 1);
        let rng = RngService::new(0);
        let mut stream = rng.substream(StreamKind::Testing, 1, AgentId::new(0));
        let mut a = agent(RegularState::Mild);
        assert!(!pipeline.consider(&mut a, TestReason::Symptomatic, 1, &mut stream));
        assert_eq!(stream.draws(), 0);
        assert!(pipeline.consider(&mut a, TestReason::Symptomatic, 2, &mut stream));
        assert!(matches!(a.test, TestStatus::Pending { days_left: 1, .. }));
        // Already pending
        assert!(!pipeline.consider(&mut a, TestReason::Surveillance, 2, &mut stream));
    }

    #[test]
    fn countdown_then_resolve() {
        let pipeline = pipeline(1.0, 1.0, 2);
        let rng = RngService::new(0);
        let mut stream = rng.substream(StreamKind::Testing, 5, AgentId::new(0));
        let mut a = agent(RegularState::Asymptomatic);
        assert!(pipeline.consider(&mut a, TestReason::Symptomatic, 5, &mut stream));
        assert!(!TestingPipeline::countdown(&mut a));
        assert!(TestingPipeline::countdown(&mut a));
        assert_eq!(
            pipeline.resolve(&mut a, 7, &mut stream).unwrap(),
            TestOutcome::TruePositive
        );
        assert_eq!(a.test, TestStatus::Positive { day: 7 });
        assert!(!TestingPipeline::can_request(&a));
    }

    #[test]
    fn perfect_specificity_never_flags_the_uninfected() {
        let pipeline = pipeline(1.0, 1.0, 0);
        let rng = RngService::new(0);
        let mut a = agent(RegularState::Susceptible);
        for day in 2..200 {
            let mut stream = rng.substream(StreamKind::Testing, day, a.id);
            a.test = TestStatus::NotTested;
            assert!(pipeline.consider(&mut a, TestReason::Symptomatic, day, &mut stream));
            assert_eq!(
                pipeline.resolve(&mut a, day, &mut stream).unwrap(),
                TestOutcome::TrueNegative
            );
        }
    }

    #[test]
    fn sensitivity_in_expectation() {
        let pipeline = pipeline(0.8, 0.9, 0);
        let rng = RngService::new(17);
        let mut infected = agent(RegularState::Mild);
        let mut healthy = agent(RegularState::Susceptible);
        let trials = 20_000u32;
        let mut true_positives = 0;
        let mut false_positives = 0;
        for day in 0..trials {
            let mut stream = rng.substream(StreamKind::Testing, day, infected.id);
            infected.test = TestStatus::Pending {
                days_left: 0,
                reason: TestReason::Symptomatic,
            };
            healthy.test = infected.test;
            if pipeline.resolve(&mut infected, day, &mut stream).unwrap().is_positive() {
                true_positives += 1;
            }
            if pipeline.resolve(&mut healthy, day, &mut stream).unwrap().is_positive() {
                false_positives += 1;
            }
        }
        assert_approx_eq!(f64::from(true_positives) / f64::from(trials), 0.8, 0.02);
        assert_approx_eq!(f64::from(false_positives) / f64::from(trials), 0.1, 0.02);
    }

    #[test]
    fn pending_test_on_terminal_agent_is_data_error() {
        let pipeline = pipeline(1.0, 1.0, 0);
        let rng = RngService::new(0);
        let mut stream = rng.substream(StreamKind::Testing, 3, AgentId::new(0));
        let mut a = agent(RegularState::Deceased);
        a.test = TestStatus::Pending {
            days_left: 0,
            reason: TestReason::Symptomatic,
        };
        assert!(matches!(
            pipeline.resolve(&mut a, 3, &mut stream),
            Err(AbmError::DataError {
                stage: Stage::Testing,
                day: Some(3),
                ..
            })
        ));
    }

    #[test]
    fn void_only_affects_pending_tests() {
        let mut status = TestStatus::Pending {
            days_left: 3,
            reason: TestReason::FluSymptoms,
        };
        assert!(status.void());
        assert_eq!(status, TestStatus::NotTested);
        let mut status = TestStatus::Positive { day: 4 };
        assert!(!status.void());
        assert_eq!(status.label(), "positive");
    }

    #[test]
    fn schedule_changes_fractions() {
        let mut pipeline = pipeline(1.0, 1.0, 0);
        pipeline.apply_change(&TestingChange {
            day: 10,
            symptomatic_fraction: 0.25,
            surveillance_fraction: 0.01,
        });
        assert_approx_eq!(pipeline.request_probability(TestReason::Symptomatic), 0.25);
        assert_approx_eq!(pipeline.request_probability(TestReason::Surveillance), 0.01);
        assert_approx_eq!(pipeline.request_probability(TestReason::Admission), 1.0);
    }
}
