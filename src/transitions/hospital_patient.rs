//! The hospital patient role: agents admitted for other conditions, and agents admitted with
//! severe COVID from the regular and employee roles.

use crate::error::AbmError;
use crate::parameters::Parameters;
use crate::states::{HospitalPatientState, StateSpace};
use crate::transitions::{age_banded, Candidate, RuleTable, StateRules};

pub fn table(parameters: &Parameters) -> Result<RuleTable<HospitalPatientState>, AbmError> {
    use HospitalPatientState::{
        Admitted, Asymptomatic, Deceased, Exposed, Icu, Recovered, Recovering, Susceptible,
    };

    let latency = parameters.latency_sampler()?;
    let hospital_death = parameters.hospital_death_fraction;
    let icu_death = parameters.icu_death_fraction;

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
                StateRules::always(vec![
                    Candidate::fixed(
                        Asymptomatic.wrap(),
                        asymptomatic,
                        parameters.latency_days,
                    ),
                    Candidate::fixed(
                        Admitted.wrap(),
                        1.0 - asymptomatic,
                        parameters.latency_days,
                    ),
                ])
                .with_hold(latency.clone())
            }),
        )
        .add(
            Asymptomatic,
            [StateRules::always(vec![Candidate::fixed(
                Recovered.wrap(),
                1.0,
                parameters.recovery_days,
            )])],
        )
        .add(
            Admitted,
            age_banded(parameters, |band| {
                let icu = parameters.icu_fraction[band];
                let days = parameters.hospital_stay_days;
                StateRules::always(vec![
                    Candidate::fixed(Icu.wrap(), icu, days),
                    Candidate::fixed(Deceased.wrap(), hospital_death, days),
                    Candidate::fixed(
                        Recovered.wrap(),
                        (1.0 - icu - hospital_death).max(0.0),
                        days,
                    ),
                ])
            }),
        )
        .add(
            Icu,
            [StateRules::always(vec![
                Candidate::fixed(Deceased.wrap(), icu_death, parameters.icu_days),
                Candidate::fixed(Recovering.wrap(), 1.0 - icu_death, parameters.icu_days),
            ])],
        )
        .add(
            Recovering,
            [StateRules::always(vec![Candidate::fixed(
                Recovered.wrap(),
                1.0,
                parameters.post_icu_days,
            )])],
        );
    Ok(table)
}
