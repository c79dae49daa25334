//! The simulation driver.
//!
//! An [`Abm`] owns everything a realization needs: agents, places, the role engines, the
//! contributions engine, the testing pipeline, the random service, the statistics accumulator
//! and a plan queue. Every dated event is a plan, so a day runs as
//!
//! 1. interventions, testing policy changes and the start of testing,
//! 2. isolation releases (rosters are restored immediately),
//! 3. the daily step: place loads and exposures, transitions, testing, roster flush,
//!    census check and the daily report,
//! 4. an optional dump of all agent states.
//!
//! Roster changes caused by a stage are collected as presence diffs of the agents it touched
//! and applied when the stage is over, so every agent of a stage sees the same rosters.

use std::collections::BTreeMap;

use log::{debug, info, trace, warn};
use strum::IntoEnumIterator;

use crate::contributions::ContributionsEngine;
use crate::error::{AbmError, Stage};
use crate::hashing::{HashMap, HashSet};
use crate::parameters::{Intervention, Parameters, VaccinationGroup};
use crate::places::{PlaceId, PlaceKind, Places, RosterChange, RosterKind};
use crate::plan::{Id, Queue};
use crate::population::{presence_changes, Agent, AgentId, Demographics, PopulationSnapshot};
use crate::random::{RngService, Stream, StreamKind};
use crate::report::{AgentStateRow, DailyCounts, ReportOptions, Reports};
use crate::states::{
    Compartment, Counter, Effect, FluState, HealthState, HospitalEmployeeState, RegularState,
    Role, Statistics,
};
use crate::testing::{TestOutcome, TestReason, TestingChange, TestingPipeline};
use crate::transitions::regular::ADMITTED;
use crate::transitions::Engines;

#[derive(Clone, Debug, PartialEq)]
enum PlannedEvent {
    Intervention(Intervention),
    TestingChange(TestingChange),
    StartTesting,
    Release(AgentId),
    Step,
    Dump,
}

/// Order of plans scheduled for the same day.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum Phase {
    Interventions,
    Releases,
    Day,
    Dump,
}

pub struct Abm {
    parameters: Parameters,
    agents: Vec<Agent>,
    places: Places,
    engines: Engines,
    contributions: ContributionsEngine,
    testing: TestingPipeline,
    rng: RngService,
    stats: Statistics,
    plans: Queue<PlannedEvent, Phase>,
    releases: HashMap<AgentId, Id>,
    /// Presence of each agent touched by the current stage, as it was before the stage.
    touched: BTreeMap<AgentId, Vec<(PlaceId, RosterKind)>>,
    effects: Vec<Effect>,
    testing_streams: BTreeMap<AgentId, Stream>,
    flu_recovered_today: HashSet<AgentId>,
    reports: Option<Reports>,
    day: u32,
    next_day: u32,
    history: Vec<DailyCounts>,
}

impl Abm {
    /// Builds a realization: validates the parameters, builds the engines, places and agents,
    /// seats everyone on their rosters and seeds the initial infections.
    pub fn new(
        parameters: Parameters,
        snapshot: &PopulationSnapshot,
        seed: u64,
    ) -> Result<Abm, AbmError> {
        parameters.validate()?;
        let engines = Engines::from_parameters(&parameters)?;

        let mut places = Places::new();
        for kind in PlaceKind::iter() {
            let (coefficient, staff_coefficient) = parameters.coefficients.for_kind(kind);
            for record in snapshot.places(kind) {
                places.push(kind, record.x, record.y, coefficient, staff_coefficient)?;
            }
        }
        let agents = snapshot
            .agents
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let id = AgentId::new(index);
                Demographics::from_record(record, id, &places).map(|d| Agent::new(id, d))
            })
            .collect::<Result<Vec<Agent>, AbmError>>()?;
        if parameters.initially_infected > agents.len() {
            return Err(AbmError::config(format!(
                "{} initial infections requested in a population of {}",
                parameters.initially_infected,
                agents.len()
            )));
        }
        if parameters.random_vaccinations > agents.len() {
            return Err(AbmError::config(format!(
                "{} random vaccinations requested in a population of {}",
                parameters.random_vaccinations,
                agents.len()
            )));
        }

        let mut abm = Abm {
            contributions: ContributionsEngine::new(
                parameters.infectious_after_days,
                parameters.vaccine_efficacy,
            ),
            testing: TestingPipeline::new(&parameters),
            parameters,
            agents,
            places,
            engines,
            rng: RngService::new(seed),
            stats: Statistics::new(),
            plans: Queue::new(),
            releases: HashMap::default(),
            touched: BTreeMap::new(),
            effects: Vec::new(),
            testing_streams: BTreeMap::new(),
            flu_recovered_today: HashSet::default(),
            reports: None,
            day: 0,
            next_day: 0,
            history: Vec::new(),
        };
        abm.place_agents()?;
        abm.seed_infections()?;
        abm.schedule();
        info!(
            "realization with seed {seed}: {} agents, {} places, {} days",
            abm.agents.len(),
            abm.places.iter().count(),
            abm.parameters.days
        );
        Ok(abm)
    }

    /// Writes the daily report and dumps under `options.directory`, and echoes the parameters.
    pub fn with_reports(mut self, options: ReportOptions) -> Result<Abm, AbmError> {
        let mut reports = Reports::new(options);
        reports.add_report::<DailyCounts>("daily_counts")?;
        reports.write_parameters(&self.parameters)?;
        self.reports = Some(reports);
        Ok(self)
    }

    fn place_agents(&mut self) -> Result<(), AbmError> {
        for agent in &mut self.agents {
            let state = agent.state;
            self.engines.initialize(
                agent,
                state,
                0,
                0,
                &mut self.stats,
                &mut self.effects,
            )?;
            for (place, roster) in agent.presence() {
                self.places.apply(RosterChange::Add {
                    place,
                    roster,
                    agent: agent.id,
                })?;
            }
        }
        Ok(())
    }

    /// Infects `initially_infected` random agents, or the agents flagged in the population
    /// file when that count is zero.
    fn seed_infections(&mut self) -> Result<(), AbmError> {
        let chosen: Vec<usize> = if self.parameters.initially_infected > 0 {
            self.rng
                .choose_multiple(self.agents.len(), self.parameters.initially_infected)
        } else {
            self.agents
                .iter()
                .filter(|agent| agent.demographics.infected)
                .map(|agent| agent.id.index())
                .collect()
        };
        for index in chosen {
            let agent = &mut self.agents[index];
            let to = HealthState::exposed_for(agent.state.role());
            let hold = self
                .engines
                .sample_hold(to, agent.demographics.age, &mut self.rng);
            self.engines
                .transition(agent, to, hold, 0, &mut self.stats, &mut self.effects)?;
        }
        debug!(
            "seeded {} initial infections",
            self.stats.cumulative().get(Counter::Infections)
        );
        Ok(())
    }

    fn schedule(&mut self) {
        let days = self.parameters.days;
        for intervention in &self.parameters.interventions {
            if intervention.day < days {
                self.plans.add_plan(
                    intervention.day,
                    PlannedEvent::Intervention(intervention.clone()),
                    Phase::Interventions,
                );
            }
        }
        for change in &self.parameters.testing_schedule {
            if change.day < days {
                self.plans.add_plan(
                    change.day,
                    PlannedEvent::TestingChange(change.clone()),
                    Phase::Interventions,
                );
            }
        }
        if self.testing.start_day() < days {
            self.plans.add_plan(
                self.testing.start_day(),
                PlannedEvent::StartTesting,
                Phase::Interventions,
            );
        }
        if days > 0 {
            self.plans.add_plan(0, PlannedEvent::Step, Phase::Day);
            if self.parameters.state_dump_interval > 0 {
                self.plans.add_plan(0, PlannedEvent::Dump, Phase::Dump);
            }
        }
    }

    /// Puts an agent in a given state before the first day, e.g. to start a scenario from a
    /// symptomatic case.
    pub fn set_initial_state(&mut self, agent: AgentId, state: HealthState) -> Result<(), AbmError> {
        if self.next_day > 0 {
            return Err(AbmError::AbmError(
                "initial states can only be set before the first day".to_string(),
            ));
        }
        let index = self.agent_index(agent)?;
        self.touch(agent);
        let hold = self
            .engines
            .sample_hold(state, self.agents[index].demographics.age, &mut self.rng);
        self.engines.reassign(
            &mut self.agents[index],
            state,
            hold,
            &mut self.stats,
            &mut self.effects,
        )?;
        self.flush_rosters()
    }

    /// Runs every remaining day.
    pub fn execute(&mut self) -> Result<(), AbmError> {
        self.run_days(u32::MAX)?;
        info!(
            "realization finished after {} days: {} infections, {} deaths",
            self.next_day,
            self.stats.cumulative().get(Counter::Infections),
            self.stats.cumulative().get(Counter::Deaths)
        );
        Ok(())
    }

    /// Runs the next `days` days, or fewer if the run ends first.
    pub fn run_days(&mut self, days: u32) -> Result<(), AbmError> {
        let until = self.next_day.saturating_add(days);
        while let Some(day) = self.plans.next_day() {
            if day >= until {
                break;
            }
            let Some(plan) = self.plans.get_next_plan() else {
                break;
            };
            self.day = plan.day;
            self.handle(plan.data)?;
        }
        Ok(())
    }

    fn handle(&mut self, event: PlannedEvent) -> Result<(), AbmError> {
        match event {
            PlannedEvent::Intervention(intervention) => self.apply_intervention(&intervention),
            PlannedEvent::TestingChange(change) => {
                self.testing.apply_change(&change);
                Ok(())
            }
            PlannedEvent::StartTesting => self.start_testing(),
            PlannedEvent::Release(agent) => self.release(agent),
            PlannedEvent::Step => {
                self.step()?;
                self.next_day = self.day + 1;
                if self.next_day < self.parameters.days {
                    self.plans
                        .add_plan(self.next_day, PlannedEvent::Step, Phase::Day);
                }
                Ok(())
            }
            PlannedEvent::Dump => {
                self.dump()?;
                let next = self.day + self.parameters.state_dump_interval;
                if next < self.parameters.days {
                    self.plans.add_plan(next, PlannedEvent::Dump, Phase::Dump);
                }
                Ok(())
            }
        }
    }

    fn apply_intervention(&mut self, intervention: &Intervention) -> Result<(), AbmError> {
        let (coefficient, staff_coefficient) =
            self.parameters.coefficients.for_kind(intervention.kind);
        self.places.set_kind_coefficients(
            intervention.kind,
            coefficient * intervention.factor,
            staff_coefficient * intervention.factor,
        )?;
        info!(
            "day {}: {} transmission scaled by {}",
            self.day, intervention.kind, intervention.factor
        );
        Ok(())
    }

    /// Vaccinates the configured groups and random agents, then seeds the flu population.
    fn start_testing(&mut self) -> Result<(), AbmError> {
        info!("day {}: testing starts", self.day);
        self.vaccinate()?;
        self.seed_flu()
    }

    fn vaccinate(&mut self) -> Result<(), AbmError> {
        let groups = self.parameters.vaccinated_groups.clone();
        for agent in &mut self.agents {
            if agent.vaccinated || !agent.state.is_vaccine_eligible() {
                continue;
            }
            if groups.iter().any(|group| in_group(agent, *group)) {
                agent.vaccinated = true;
                self.stats.record(Counter::Vaccinations);
            }
        }

        let requested = self.parameters.random_vaccinations;
        if requested > 0 {
            let eligible: Vec<AgentId> = self
                .agents
                .iter()
                .filter(|agent| !agent.vaccinated && agent.state.is_vaccine_eligible())
                .map(|agent| agent.id)
                .collect();
            if requested > eligible.len() {
                return Err(AbmError::data(
                    Some(self.day),
                    Stage::Testing,
                    None,
                    format!(
                        "{requested} random vaccinations requested but only {} agents are \
                         eligible",
                        eligible.len()
                    ),
                ));
            }
            for index in self.rng.choose_multiple(eligible.len(), requested) {
                self.agents[eligible[index].index()].vaccinated = true;
                self.stats.record(Counter::Vaccinations);
            }
        }
        debug!(
            "{} agents vaccinated",
            self.stats.cumulative().get(Counter::Vaccinations)
        );
        Ok(())
    }

    fn flu_candidates(&self) -> Vec<AgentId> {
        self.agents
            .iter()
            .filter(|agent| {
                agent.state == HealthState::Regular(RegularState::Susceptible)
                    && !agent.vaccinated
                    && !self.flu_recovered_today.contains(&agent.id)
            })
            .map(|agent| agent.id)
            .collect()
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn seed_flu(&mut self) -> Result<(), AbmError> {
        let candidates = self.flu_candidates();
        let count = (self.parameters.flu_fraction * candidates.len() as f64).floor() as usize;
        for index in self.rng.choose_multiple(candidates.len(), count) {
            self.start_flu(candidates[index])?;
        }
        debug!("{count} agents start with flu");
        Ok(())
    }

    fn start_flu(&mut self, agent: AgentId) -> Result<(), AbmError> {
        let index = agent.index();
        self.engines.transition(
            &mut self.agents[index],
            HealthState::Flu(FluState::Symptomatic),
            0,
            self.day,
            &mut self.stats,
            &mut self.effects,
        )
    }

    /// Keeps the flu population constant: a recovered flu agent is replaced by an unvaccinated
    /// susceptible agent that did not just recover from flu.
    fn replace_flu(&mut self, recovered: AgentId) -> Result<(), AbmError> {
        self.flu_recovered_today.insert(recovered);
        let candidates = self.flu_candidates();
        match self.rng.sample_index(candidates.len()) {
            Some(index) => self.start_flu(candidates[index]),
            None => {
                warn!(
                    "day {}: no susceptible agent left to replace flu agent {recovered}",
                    self.day
                );
                Ok(())
            }
        }
    }

    fn release(&mut self, agent: AgentId) -> Result<(), AbmError> {
        let index = self.agent_index(agent)?;
        self.releases.remove(&agent);
        self.touch(agent);
        self.agents[index].isolated_until = None;
        trace!("day {}: agent {agent} leaves isolation", self.day);
        self.flush_rosters()
    }

    fn agent_index(&self, agent: AgentId) -> Result<usize, AbmError> {
        if agent.index() < self.agents.len() {
            Ok(agent.index())
        } else {
            Err(AbmError::data(
                Some(self.day),
                Stage::Occupancy,
                Some(agent),
                "agent outside the population",
            ))
        }
    }

    /// Remembers the agent's presence before the current stage changes it.
    fn touch(&mut self, agent: AgentId) {
        if !self.touched.contains_key(&agent) {
            let presence = self.agents[agent.index()].presence();
            self.touched.insert(agent, presence);
        }
    }

    /// Applies the presence changes of every touched agent.
    fn flush_rosters(&mut self) -> Result<(), AbmError> {
        let touched = std::mem::take(&mut self.touched);
        for (agent, before) in touched {
            let after = self.agents[agent.index()].presence();
            self.places
                .apply_all(presence_changes(agent, &before, &after))
                .map_err(|error| match error {
                    AbmError::DataError { stage, message, .. } => {
                        AbmError::data(Some(self.day), stage, Some(agent), message)
                    }
                    other => other,
                })?;
        }
        Ok(())
    }

    fn step(&mut self) -> Result<(), AbmError> {
        let day = self.day;
        self.flu_recovered_today.clear();
        self.contributions
            .compute_loads(&self.places, &self.agents, day)?;

        // Decisions are taken on the state of the day before any of them is applied.
        let mut decisions = Vec::new();
        let mut streams = Vec::new();
        for agent in &self.agents {
            if agent.state.is_terminal() {
                continue;
            }
            let exposure = if self.engines.needs_exposure(agent) {
                self.contributions
                    .infection_probability(agent, &self.places, day)?
            } else {
                0.0
            };
            let mut stream = self.rng.substream(StreamKind::Transition, day, agent.id);
            let decision = self.engines.decide(agent, exposure, &mut stream).map(|to| {
                let hold = self
                    .engines
                    .sample_hold(to, agent.demographics.age, &mut stream);
                (to, hold)
            });
            decisions.push((agent.id, decision));
            streams.push(stream);
        }
        for stream in &streams {
            self.rng.absorb(stream);
        }

        for (id, decision) in decisions {
            match decision {
                None => self.agents[id.index()].dwell += 1,
                Some((to, hold)) => {
                    self.touch(id);
                    self.engines.transition(
                        &mut self.agents[id.index()],
                        to,
                        hold,
                        day,
                        &mut self.stats,
                        &mut self.effects,
                    )?;
                }
            }
        }

        self.testing_stage()?;
        self.flush_rosters()?;
        self.stats.verify(&self.agents, day)?;

        let counts = self.daily_counts();
        debug!(
            "day {day}: {} exposed, {} infectious, {} hospitalized, {} deceased, {} new infections",
            counts.exposed, counts.infected, counts.hospitalized, counts.deceased, counts.new_infections
        );
        if let Some(reports) = &mut self.reports {
            reports.send_report(&counts)?;
        }
        self.history.push(counts);
        self.stats.begin_day();
        Ok(())
    }

    fn testing_stage(&mut self) -> Result<(), AbmError> {
        // Tests requested on earlier days
        for index in 0..self.agents.len() {
            if self.agents[index].test.is_pending()
                && TestingPipeline::countdown(&mut self.agents[index])
            {
                let id = self.agents[index].id;
                let mut stream = self.testing_stream(id);
                let result = self.resolve_test(id, &mut stream);
                self.testing_streams.insert(id, stream);
                result?;
            }
        }

        self.process_effects()?;

        if self.testing.is_active(self.day) {
            for index in 0..self.agents.len() {
                if self.testing.is_surveillance_candidate(&self.agents[index]) {
                    self.request_test(self.agents[index].id, TestReason::Surveillance)?;
                }
            }
            self.process_effects()?;
        }

        let streams = std::mem::take(&mut self.testing_streams);
        for stream in streams.values() {
            self.rng.absorb(stream);
        }
        Ok(())
    }

    fn testing_stream(&mut self, agent: AgentId) -> Stream {
        match self.testing_streams.remove(&agent) {
            Some(stream) => stream,
            None => self.rng.substream(StreamKind::Testing, self.day, agent),
        }
    }

    fn process_effects(&mut self) -> Result<(), AbmError> {
        while !self.effects.is_empty() {
            let effects = std::mem::take(&mut self.effects);
            for effect in effects {
                match effect {
                    Effect::RequestTest { agent, reason } => self.request_test(agent, reason)?,
                    Effect::Admit { agent } => self.admit(agent)?,
                    Effect::FluRecovered { agent } => self.replace_flu(agent)?,
                }
            }
        }
        Ok(())
    }

    fn request_test(&mut self, agent: AgentId, reason: TestReason) -> Result<(), AbmError> {
        let index = self.agent_index(agent)?;
        if !self.testing.is_active(self.day) || !TestingPipeline::can_request(&self.agents[index])
        {
            return Ok(());
        }
        let mut stream = self.testing_stream(agent);
        let mut result = Ok(());
        if self
            .testing
            .consider(&mut self.agents[index], reason, self.day, &mut stream)
        {
            self.stats.record(Counter::Tests);
            if self.testing.turnaround_days() == 0 {
                result = self.resolve_test(agent, &mut stream);
            }
        }
        self.testing_streams.insert(agent, stream);
        result
    }

    fn resolve_test(&mut self, agent: AgentId, stream: &mut Stream) -> Result<(), AbmError> {
        let index = agent.index();
        let outcome = self
            .testing
            .resolve(&mut self.agents[index], self.day, stream)?;
        match outcome {
            TestOutcome::TruePositive => self.stats.record(Counter::Positives),
            TestOutcome::FalsePositive => {
                self.stats.record(Counter::Positives);
                self.stats.record(Counter::FalsePositives);
            }
            TestOutcome::TrueNegative => self.stats.record(Counter::Negatives),
            TestOutcome::FalseNegative => {
                self.stats.record(Counter::Negatives);
                self.stats.record(Counter::FalseNegatives);
            }
        }
        if !outcome.is_positive() {
            return Ok(());
        }

        self.isolate(agent);
        let state = self.agents[index].state;
        if matches!(
            state,
            HealthState::Regular(RegularState::Severe)
                | HealthState::HospitalEmployee(HospitalEmployeeState::Severe)
        ) {
            debug!("day {}: agent {agent} hospitalized after a positive test", self.day);
            self.touch(agent);
            let hold = self
                .engines
                .sample_hold(ADMITTED, self.agents[index].demographics.age, stream);
            self.engines.transition(
                &mut self.agents[index],
                ADMITTED,
                hold,
                self.day,
                &mut self.stats,
                &mut self.effects,
            )?;
        }
        Ok(())
    }

    /// Sends the agent home for `isolation_days`, replacing any earlier release.
    fn isolate(&mut self, agent: AgentId) {
        let days = self.parameters.isolation_days;
        if days == 0 {
            return;
        }
        self.touch(agent);
        let until = self.day + days;
        self.agents[agent.index()].isolated_until = Some(until);
        if let Some(previous) = self.releases.remove(&agent) {
            self.plans.cancel_plan(&previous);
        }
        let release = self
            .plans
            .add_plan(until + 1, PlannedEvent::Release(agent), Phase::Releases);
        self.releases.insert(agent, release);
        self.stats.record(Counter::Isolations);
        trace!("day {}: agent {agent} isolated until day {until}", self.day);
    }

    /// Puts the agent on the patient roster of its own hospital, or of a random one.
    fn admit(&mut self, agent: AgentId) -> Result<(), AbmError> {
        let index = self.agent_index(agent)?;
        if self.agents[index].state.is_terminal() {
            return Ok(());
        }
        let hospital = match self.agents[index].demographics.hospital {
            Some(hospital) => Some(hospital),
            None => self
                .rng
                .sample_index(self.places.count(PlaceKind::Hospital))
                .map(|i| PlaceId::new(PlaceKind::Hospital, i)),
        };
        match hospital {
            Some(hospital) => {
                self.touch(agent);
                self.agents[index].admitted_to = Some(hospital);
                trace!("day {}: agent {agent} admitted to {hospital}", self.day);
            }
            None => warn!(
                "day {}: no hospital to admit agent {agent}; the agent stays home",
                self.day
            ),
        }
        Ok(())
    }

    fn daily_counts(&mut self) -> DailyCounts {
        let stats = &self.stats;
        let today = stats.today();
        let cumulative = stats.cumulative();
        let flu = stats.role_count(Role::Flu);
        DailyCounts {
            day: self.day,
            susceptible: stats.compartment_count(Compartment::Susceptible) - flu,
            exposed: stats.compartment_count(Compartment::Exposed),
            infected: stats.compartment_count(Compartment::Infectious),
            hospitalized: stats.compartment_count(Compartment::Hospitalized),
            icu: stats.compartment_count(Compartment::Icu),
            recovered: stats.compartment_count(Compartment::Recovered),
            deceased: stats.compartment_count(Compartment::Deceased),
            flu,
            isolated: self.agents.iter().filter(|a| a.is_isolated()).count(),
            new_infections: today.get(Counter::Infections),
            tested: today.get(Counter::Tests),
            tested_positive: today.get(Counter::Positives),
            tested_negative: today.get(Counter::Negatives),
            false_positive: today.get(Counter::FalsePositives),
            false_negative: today.get(Counter::FalseNegatives),
            cumulative_infections: cumulative.get(Counter::Infections),
            cumulative_positive: cumulative.get(Counter::Positives),
            rng_draws: self.rng.take_draws(),
        }
    }

    fn dump(&self) -> Result<(), AbmError> {
        let Some(reports) = &self.reports else {
            return Ok(());
        };
        let rows: Vec<AgentStateRow> = self.agents.iter().map(AgentStateRow::from).collect();
        reports.write_snapshot(&format!("agents_day_{}.csv", self.day), &rows)?;
        debug!("day {}: dumped {} agent states", self.day, rows.len());
        Ok(())
    }

    #[must_use]
    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[must_use]
    pub fn agent(&self, agent: AgentId) -> Option<&Agent> {
        self.agents.get(agent.index())
    }

    #[must_use]
    pub fn places(&self) -> &Places {
        &self.places
    }

    #[must_use]
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    #[must_use]
    pub fn contributions(&self) -> &ContributionsEngine {
        &self.contributions
    }

    /// One row per completed day.
    #[must_use]
    pub fn history(&self) -> &[DailyCounts] {
        &self.history
    }

    /// The next day to run.
    #[must_use]
    pub fn next_day(&self) -> u32 {
        self.next_day
    }

    /// Agents the engine of `role` processes: agents of that role in non-terminal states.
    #[must_use]
    pub fn candidate_pool(&self, role: Role) -> Vec<AgentId> {
        self.agents
            .iter()
            .filter(|agent| Engines::in_pool(agent.state, role))
            .map(|agent| agent.id)
            .collect()
    }

    /// The current daily infection probability of an agent, from the loads of the last day
    /// run.
    pub fn infection_probability(&self, agent: AgentId) -> Result<f64, AbmError> {
        let index = self.agent_index(agent)?;
        self.contributions
            .infection_probability(&self.agents[index], &self.places, self.day)
    }
}

fn in_group(agent: &Agent, group: VaccinationGroup) -> bool {
    let demographics = &agent.demographics;
    let works_at = |kind: PlaceKind| demographics.work.is_some_and(|work| work.kind == kind);
    match group {
        VaccinationGroup::HospitalEmployees => demographics.hospital_employee,
        VaccinationGroup::SchoolEmployees => works_at(PlaceKind::School),
        VaccinationGroup::RetirementHomeEmployees => works_at(PlaceKind::RetirementHome),
        VaccinationGroup::RetirementHomeResidents => {
            demographics.residence.kind == PlaceKind::RetirementHome
        }
    }
}
