//! Entry callbacks and the per-role registries built from them.

use crate::states::{
    Counter, Effect, EntryContext, FluState, HospitalEmployeeState, HospitalPatientState,
    RegularState, Role, StateManager,
};
use crate::testing::TestReason;

fn void_pending_test(ctx: &mut EntryContext<'_>) {
    if ctx.agent.test.void() {
        ctx.stats.record(Counter::VoidedTests);
    }
}

fn request_test(ctx: &mut EntryContext<'_>, reason: TestReason) {
    ctx.effects.push(Effect::RequestTest {
        agent: ctx.agent.id,
        reason,
    });
}

fn previous_role(ctx: &EntryContext<'_>) -> Option<Role> {
    ctx.previous.map(|state| state.role())
}

fn on_susceptible(ctx: &mut EntryContext<'_>) {
    if previous_role(ctx) == Some(Role::Flu) {
        ctx.stats.record(Counter::FluRecoveries);
        void_pending_test(ctx);
        ctx.effects.push(Effect::FluRecovered {
            agent: ctx.agent.id,
        });
    }
}

fn on_exposed(ctx: &mut EntryContext<'_>) {
    ctx.stats.record(Counter::Infections);
}

fn on_asymptomatic(_ctx: &mut EntryContext<'_>) {}

fn on_symptomatic(ctx: &mut EntryContext<'_>) {
    request_test(ctx, TestReason::Symptomatic);
}

fn on_employee_symptomatic(ctx: &mut EntryContext<'_>) {
    request_test(ctx, TestReason::EmployeeSymptomatic);
}

fn on_recovered(ctx: &mut EntryContext<'_>) {
    ctx.stats.record(Counter::Recoveries);
    void_pending_test(ctx);
    // Discharged patients go back to their usual places
    ctx.agent.admitted_to = None;
}

fn on_deceased(ctx: &mut EntryContext<'_>) {
    ctx.stats.record(Counter::Deaths);
    if ctx.agent.test.is_positive() {
        ctx.stats.record(Counter::ConfirmedDeaths);
    }
    void_pending_test(ctx);
    ctx.agent.admitted_to = None;
}

fn on_flu_symptomatic(ctx: &mut EntryContext<'_>) {
    ctx.stats.record(Counter::FluOnsets);
    request_test(ctx, TestReason::FluSymptoms);
}

fn on_admitted(ctx: &mut EntryContext<'_>) {
    ctx.stats.record(Counter::Admissions);
    if previous_role(ctx).is_some_and(|role| role != Role::HospitalPatient) {
        ctx.effects.push(Effect::Admit {
            agent: ctx.agent.id,
        });
    }
    request_test(ctx, TestReason::Admission);
}

fn on_icu(ctx: &mut EntryContext<'_>) {
    ctx.stats.record(Counter::IcuAdmissions);
}

fn on_recovering(_ctx: &mut EntryContext<'_>) {}

#[must_use]
pub fn regular() -> StateManager<RegularState> {
    let mut manager = StateManager::new();
    manager
        .register(RegularState::Susceptible, on_susceptible)
        .register(RegularState::Exposed, on_exposed)
        .register(RegularState::Asymptomatic, on_asymptomatic)
        .register(RegularState::Mild, on_symptomatic)
        .register(RegularState::Dying, on_symptomatic)
        .register(RegularState::Severe, on_symptomatic)
        .register(RegularState::Recovered, on_recovered)
        .register(RegularState::Deceased, on_deceased);
    manager
}

#[must_use]
pub fn flu() -> StateManager<FluState> {
    let mut manager = StateManager::new();
    manager.register(FluState::Symptomatic, on_flu_symptomatic);
    manager
}

#[must_use]
pub fn hospital_employee() -> StateManager<HospitalEmployeeState> {
    let mut manager = StateManager::new();
    manager
        .register(HospitalEmployeeState::Susceptible, on_susceptible)
        .register(HospitalEmployeeState::Exposed, on_exposed)
        .register(HospitalEmployeeState::Asymptomatic, on_asymptomatic)
        .register(HospitalEmployeeState::Mild, on_employee_symptomatic)
        .register(HospitalEmployeeState::Dying, on_employee_symptomatic)
        .register(HospitalEmployeeState::Severe, on_employee_symptomatic)
        .register(HospitalEmployeeState::Recovered, on_recovered)
        .register(HospitalEmployeeState::Deceased, on_deceased);
    manager
}

#[must_use]
pub fn hospital_patient() -> StateManager<HospitalPatientState> {
    let mut manager = StateManager::new();
    manager
        .register(HospitalPatientState::Susceptible, on_susceptible)
        .register(HospitalPatientState::Exposed, on_exposed)
        .register(HospitalPatientState::Asymptomatic, on_asymptomatic)
        .register(HospitalPatientState::Admitted, on_admitted)
        .register(HospitalPatientState::Icu, on_icu)
        .register(HospitalPatientState::Recovering, on_recovering)
        .register(HospitalPatientState::Recovered, on_recovered)
        .register(HospitalPatientState::Deceased, on_deceased);
    manager
}
