//! The regular role: community members outside the hospital system.

use crate::error::AbmError;
use crate::parameters::Parameters;
use crate::states::{HealthState, HospitalPatientState, RegularState, StateSpace};
use crate::transitions::{age_banded, Candidate, RuleTable, StateRules};

pub(crate) const ADMITTED: HealthState =
    HealthState::HospitalPatient(HospitalPatientState::Admitted);

pub fn table(parameters: &Parameters) -> Result<RuleTable<RegularState>, AbmError> {
    use RegularState::{
        Asymptomatic, Deceased, Dying, Exposed, Mild, Recovered, Severe, Susceptible,
    };

    let latency = parameters.latency_sampler()?;
    let onset = parameters.onset_to_hospitalization_sampler()?;
    let time_to_death = parameters.time_to_death_sampler()?;
    let latency_days = parameters.latency_days;
    let recovery_days = parameters.recovery_days;
    let onset_days = parameters.onset_to_hospitalization_days;
    let untreated_death = parameters.untreated_death_fraction;

    let mut table = RuleTable::new();
    table
        .add(
            Susceptible,
            [StateRules::always(vec![Candidate::exposure(Exposed.wrap())])],
        )
        .add(
            Exposed,
            age_banded(parameters, |band| {
                let asymptomatic = parameters.asymptomatic_fraction[band];
                let severe = parameters.severe_fraction[band];
                let (mild, dying) = symptomatic_at_home(parameters, band);
                StateRules::always(vec![
                    Candidate::fixed(Asymptomatic.wrap(), asymptomatic, latency_days),
                    Candidate::fixed(Mild.wrap(), mild, latency_days),
                    Candidate::fixed(Dying.wrap(), dying, latency_days),
                    Candidate::fixed(Severe.wrap(), severe, latency_days),
                ])
                .with_hold(latency.clone())
            }),
        )
        .add(
            Asymptomatic,
            [StateRules::always(vec![Candidate::fixed(
                Recovered.wrap(),
                1.0,
                recovery_days,
            )])],
        )
        .add(
            Mild,
            [StateRules::always(vec![Candidate::fixed(
                Recovered.wrap(),
                1.0,
                recovery_days,
            )])],
        )
        .add(
            Dying,
            [StateRules::always(vec![Candidate::fixed(
                Deceased.wrap(),
                1.0,
                parameters.time_to_death_days,
            )])
            .with_hold(time_to_death)],
        )
        .add(
            Severe,
            [StateRules::always(vec![
                Candidate::fixed(Deceased.wrap(), untreated_death, onset_days),
                Candidate::fixed(ADMITTED, 1.0 - untreated_death, onset_days),
            ])
            .with_hold(onset)],
        );
    Ok(table)
}

/// Splits the symptomatic agents of an age band who are not severe into those who recover and
/// those who die at home.
pub(crate) fn symptomatic_at_home(parameters: &Parameters, band: usize) -> (f64, f64) {
    let symptomatic = (1.0
        - parameters.asymptomatic_fraction[band]
        - parameters.severe_fraction[band])
        .max(0.0);
    let dying = symptomatic * parameters.mortality(band);
    (symptomatic - dying, dying)
}
