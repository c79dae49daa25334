//! The flu role. Flu agents have COVID-like symptoms without COVID. They can still be infected,
//! which returns them to the regular role as exposed; otherwise they return to the regular
//! susceptible state once the flu has run its course.

use crate::error::AbmError;
use crate::parameters::Parameters;
use crate::states::{FluState, HealthState, RegularState};
use crate::transitions::{Candidate, RuleTable, StateRules};

pub fn table(parameters: &Parameters) -> Result<RuleTable<FluState>, AbmError> {
    let mut table = RuleTable::new();
    table.add(
        FluState::Symptomatic,
        [StateRules::always(vec![
            Candidate::exposure(HealthState::Regular(RegularState::Exposed)),
            Candidate::fixed(
                HealthState::Regular(RegularState::Susceptible),
                1.0,
                parameters.flu_days,
            ),
        ])],
    );
    Ok(table)
}
