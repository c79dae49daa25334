//! Command line arguments and the execution of realizations.
//!
//! A run loads the parameters and the population once and executes one or more realizations.
//! Realization `i` uses seed `random_seed + i`; an ensemble writes each realization to its own
//! `realization_<i>` subdirectory and runs them on a scoped pool of worker threads.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::thread;

use clap::{Args, Command, FromArgMatches as _};
use log::info;

use crate::abm::Abm;
use crate::error::AbmError;
use crate::execution_stats::{
    completion_line, log_execution_statistics, ExecutionProfilingCollector, ExecutionStatistics,
};
use crate::log::set_log_level_from_str;
use crate::parameters::Parameters;
use crate::population::PopulationSnapshot;
use crate::report::{DailyCounts, ReportOptions};

/// Default cli arguments
#[derive(Args, Clone, Debug)]
pub struct BaseArgs {
    /// Random seed of the first realization
    #[arg(short, long, default_value = "0")]
    pub random_seed: u64,

    /// Parameter file: a labelled table, or JSON if the name ends in `.json`
    #[arg(short, long)]
    pub parameters: PathBuf,

    /// Directory holding population.txt and the place tables
    #[arg(short, long)]
    pub input_dir: PathBuf,

    /// Directory for reports
    #[arg(short, long, default_value = "output")]
    pub output_dir: PathBuf,

    /// Number of realizations
    #[arg(short = 'n', long, default_value = "1")]
    pub realizations: usize,

    /// Worker threads for an ensemble. Defaults to the available parallelism.
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Overrides the number of simulated days
    #[arg(long)]
    pub days: Option<u32>,

    /// Replace existing output files
    #[arg(long)]
    pub overwrite: bool,

    /// Log level: off, error, warn, info, debug or trace
    #[arg(long, default_value = "off")]
    pub log_level: String,
}

impl BaseArgs {
    /// Arguments for a run with default options.
    #[must_use]
    pub fn new(parameters: &Path, input_dir: &Path, output_dir: &Path) -> BaseArgs {
        BaseArgs {
            random_seed: 0,
            parameters: parameters.to_path_buf(),
            input_dir: input_dir.to_path_buf(),
            output_dir: output_dir.to_path_buf(),
            realizations: 1,
            threads: None,
            days: None,
            overwrite: false,
            log_level: "off".to_string(),
        }
    }

    /// The output directory of realization `index`.
    #[must_use]
    pub fn realization_dir(&self, index: usize) -> PathBuf {
        if self.realizations > 1 {
            self.output_dir.join(format!("realization_{index:03}"))
        } else {
            self.output_dir.clone()
        }
    }
}

/// What a completed realization leaves behind.
#[derive(Clone, Debug)]
pub struct RealizationSummary {
    pub index: usize,
    pub seed: u64,
    pub output_dir: PathBuf,
    /// The report row of the last day, if any day ran.
    pub last_day: Option<DailyCounts>,
    pub statistics: ExecutionStatistics,
}

fn create_cli() -> Command {
    let cli = Command::new("covid-abm")
        .about("Agent-based model of COVID-19 spread across households, schools, workplaces, hospitals and retirement homes");
    BaseArgs::augment_args(cli)
}

/// Parses the command line and runs every requested realization.
///
/// # Errors
/// Returns an error if argument parsing, loading the inputs or any realization fails
pub fn run_with_args() -> Result<Vec<RealizationSummary>, Box<dyn std::error::Error>> {
    let matches = create_cli().get_matches();
    let args = BaseArgs::from_arg_matches(&matches)?;
    Ok(run(&args)?)
}

/// Loads the inputs once and runs `args.realizations` realizations.
pub fn run(args: &BaseArgs) -> Result<Vec<RealizationSummary>, AbmError> {
    set_log_level_from_str(&args.log_level)?;
    if args.realizations == 0 {
        return Err(AbmError::config("at least one realization is required"));
    }

    let mut parameters = Parameters::load(&args.parameters)?;
    if let Some(days) = args.days {
        parameters.days = days;
    }
    let snapshot = PopulationSnapshot::load(&args.input_dir)?;

    let threads = args
        .threads
        .unwrap_or_else(|| thread::available_parallelism().map_or(1, NonZeroUsize::get))
        .clamp(1, args.realizations);
    info!(
        "running {} realization(s) on {threads} thread(s)",
        args.realizations
    );

    if threads == 1 {
        return (0..args.realizations)
            .map(|index| run_realization(args, &parameters, &snapshot, index))
            .collect();
    }

    let mut results: Vec<(usize, Result<RealizationSummary, AbmError>)> =
        thread::scope(|scope| {
            let workers: Vec<_> = (0..threads)
                .map(|worker| {
                    let parameters = &parameters;
                    let snapshot = &snapshot;
                    scope.spawn(move || {
                        (worker..args.realizations)
                            .step_by(threads)
                            .map(|index| {
                                (index, run_realization(args, parameters, snapshot, index))
                            })
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            workers
                .into_iter()
                .flat_map(|worker| {
                    worker.join().unwrap_or_else(|_| {
                        vec![(
                            usize::MAX,
                            Err(AbmError::AbmError("a realization worker panicked".into())),
                        )]
                    })
                })
                .collect()
        });
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}

/// Runs realization `index` to completion and writes its reports.
pub fn run_realization(
    args: &BaseArgs,
    parameters: &Parameters,
    snapshot: &PopulationSnapshot,
    index: usize,
) -> Result<RealizationSummary, AbmError> {
    let seed = args.random_seed.wrapping_add(index as u64);
    let output_dir = args.realization_dir(index);
    let mut collector = ExecutionProfilingCollector::new();

    let options = ReportOptions::new(&output_dir).overwrite(args.overwrite);
    let mut abm = Abm::new(parameters.clone(), snapshot, seed)?.with_reports(options)?;
    for _ in 0..parameters.days {
        abm.run_days(1)?;
        collector.refresh();
    }

    let statistics = collector.compute_final_statistics(abm.agents().len());
    log_execution_statistics(&statistics);
    println!(
        "{}",
        completion_line(&format!("realization {index} (seed {seed})"), &statistics)
    );
    Ok(RealizationSummary {
        index,
        seed,
        output_dir,
        last_day: abm.history().last().cloned(),
        statistics,
    })
}
