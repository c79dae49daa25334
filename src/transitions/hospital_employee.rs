//! Hospital employees follow the course of the regular role in their own state space, so that
//! they are tested with their own probability and counted separately.

use crate::error::AbmError;
use crate::parameters::Parameters;
use crate::states::{HospitalEmployeeState, StateSpace};
use crate::transitions::regular::{symptomatic_at_home, ADMITTED};
use crate::transitions::{age_banded, Candidate, RuleTable, StateRules};

pub fn table(parameters: &Parameters) -> Result<RuleTable<HospitalEmployeeState>, AbmError> {
    use HospitalEmployeeState::{
        Asymptomatic, Deceased, Dying, Exposed, Mild, Recovered, Severe, Susceptible,
    };

    let latency = parameters.latency_sampler()?;
    let onset = parameters.onset_to_hospitalization_sampler()?;
    let time_to_death = parameters.time_to_death_sampler()?;
    let recovered = |days| StateRules::always(vec![Candidate::fixed(Recovered.wrap(), 1.0, days)]);

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
                let days = parameters.latency_days;
                StateRules::always(vec![
                    Candidate::fixed(Asymptomatic.wrap(), asymptomatic, days),
                    Candidate::fixed(Mild.wrap(), mild, days),
                    Candidate::fixed(Dying.wrap(), dying, days),
                    Candidate::fixed(Severe.wrap(), severe, days),
                ])
                .with_hold(latency.clone())
            }),
        )
        .add(Asymptomatic, [recovered(parameters.recovery_days)])
        .add(Mild, [recovered(parameters.recovery_days)])
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
                Candidate::fixed(
                    Deceased.wrap(),
                    parameters.untreated_death_fraction,
                    parameters.onset_to_hospitalization_days,
                ),
                Candidate::fixed(
                    ADMITTED,
                    1.0 - parameters.untreated_death_fraction,
                    parameters.onset_to_hospitalization_days,
                ),
            ])
            .with_hold(onset)],
        );
    Ok(table)
}
