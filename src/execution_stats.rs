// Loss of precision is allowable in this module's use cases.
#![allow(clippy::cast_precision_loss)]

use std::time::{Duration, Instant};

use bytesize::ByteSize;
use humantime::format_duration;
use log::{debug, error, info};
use serde_derive::Serialize;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// How frequently we update the max memory used value.
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Resource use of a realization. If the population is empty the per agent statistics are zero,
/// as they are meaningless.
#[derive(Clone, Debug, Serialize)]
pub struct ExecutionStatistics {
    pub max_memory_usage: u64,
    pub cpu_time: Duration,
    pub wall_time: Duration,

    // Per agent stats
    pub population: usize,
    pub cpu_time_per_agent: Duration,
    pub wall_time_per_agent: Duration,
    pub memory_per_agent: u64,
}

pub struct ExecutionProfilingCollector {
    /// Start time, used to compute the elapsed wall time of the realization
    start_time: Instant,
    /// The last time memory was polled, so callers can call `refresh` every day.
    last_refresh: Instant,
    /// Accumulated CPU time of the process in CPU-milliseconds at the start
    start_cpu_time: u64,
    /// The maximum amount of real memory used by the process, polled during execution.
    max_memory_usage: u64,
    system: System,
    /// `None` on platforms where the process cannot be inspected
    process_id: Option<Pid>,
}

impl Default for ExecutionProfilingCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionProfilingCollector {
    #[must_use]
    pub fn new() -> ExecutionProfilingCollector {
        let process_id = sysinfo::get_current_pid().ok();
        let now = Instant::now();

        let mut collector = ExecutionProfilingCollector {
            start_time: now,
            last_refresh: now,
            start_cpu_time: 0,
            max_memory_usage: 0,
            system: System::new(),
            process_id,
        };
        if let Some(process_id) = process_id {
            debug!("Process ID: {process_id}");
            collector.update_system_info(ProcessRefreshKind::nothing().with_cpu().with_memory());
            if let Some(process) = collector.system.process(process_id) {
                collector.max_memory_usage = process.memory();
                collector.start_cpu_time = process.accumulated_cpu_time();
            }
        }
        collector
    }

    /// Polls memory usage if at least `REFRESH_INTERVAL` has passed since the previous poll.
    #[inline]
    pub fn refresh(&mut self) {
        if self.last_refresh.elapsed() >= REFRESH_INTERVAL {
            self.poll_memory();
            self.last_refresh = Instant::now();
        }
    }

    fn poll_memory(&mut self) {
        if let Some(pid) = self.process_id {
            self.update_system_info(ProcessRefreshKind::nothing().with_memory());
            if let Some(process) = self.system.process(pid) {
                self.max_memory_usage = self.max_memory_usage.max(process.memory());
            }
        }
    }

    /// Accumulated CPU time of the process in CPU-milliseconds since the start.
    pub fn cpu_time(&mut self) -> u64 {
        let Some(pid) = self.process_id else {
            return 0;
        };
        self.update_system_info(ProcessRefreshKind::nothing().with_cpu());
        self.system
            .process(pid)
            .map_or(0, |process| {
                process
                    .accumulated_cpu_time()
                    .saturating_sub(self.start_cpu_time)
            })
    }

    #[inline]
    fn update_system_info(&mut self, process_refresh_kind: ProcessRefreshKind) {
        if let Some(pid) = self.process_id {
            if self.system.refresh_processes_specifics(
                ProcessesToUpdate::Some(&[pid]),
                true,
                process_refresh_kind,
            ) < 1
            {
                error!("could not refresh process statistics");
            }
        }
    }

    /// Computes the final summary statistics
    pub fn compute_final_statistics(&mut self, population: usize) -> ExecutionStatistics {
        let mut cpu_time_millis = 0;

        if let Some(pid) = self.process_id {
            self.update_system_info(ProcessRefreshKind::nothing().with_cpu().with_memory());
            if let Some(process) = self.system.process(pid) {
                self.max_memory_usage = self.max_memory_usage.max(process.memory());
                cpu_time_millis = process
                    .accumulated_cpu_time()
                    .saturating_sub(self.start_cpu_time);
            }
        }

        let cpu_time = Duration::from_millis(cpu_time_millis);
        let wall_time = self.start_time.elapsed();

        let (cpu_time_per_agent, wall_time_per_agent, memory_per_agent) = if population > 0 {
            (
                Duration::from_secs_f64(cpu_time_millis as f64 / population as f64 / 1000.0),
                Duration::from_secs_f64(wall_time.as_secs_f64() / population as f64),
                self.max_memory_usage / population as u64,
            )
        } else {
            (Duration::ZERO, Duration::ZERO, 0)
        };

        ExecutionStatistics {
            max_memory_usage: self.max_memory_usage,
            cpu_time,
            wall_time,
            population,
            cpu_time_per_agent,
            wall_time_per_agent,
            memory_per_agent,
        }
    }
}

/// The line printed when a realization completes.
#[must_use]
pub fn completion_line(label: &str, stats: &ExecutionStatistics) -> String {
    format!(
        "{label} complete: {} agents in {}",
        stats.population,
        format_duration(round_to_millis(stats.wall_time))
    )
}

fn round_to_millis(duration: Duration) -> Duration {
    Duration::from_millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
}

/// Logs execution statistics at info level.
///
/// Use `ExecutionProfilingCollector::compute_final_statistics()` to construct `ExecutionStatistics`.
pub fn log_execution_statistics(stats: &ExecutionStatistics) {
    info!("Execution complete.");
    if stats.max_memory_usage == 0 {
        info!("Memory and CPU statistics are not available on your platform.");
    } else {
        info!("Max memory usage: {}", ByteSize::b(stats.max_memory_usage));
        info!("CPU time: {}", format_duration(stats.cpu_time));
    }
    info!("Wall time: {}", format_duration(stats.wall_time));

    if stats.population > 0 {
        info!("Population: {}", stats.population);
        if stats.max_memory_usage > 0 {
            info!("Memory per agent: {}", ByteSize::b(stats.memory_per_agent));
            info!(
                "CPU time per agent: {}",
                format_duration(stats.cpu_time_per_agent)
            );
        }
        info!(
            "Wall time per agent: {}",
            format_duration(stats.wall_time_per_agent)
        );
    }
}

#[cfg(test)]
mod tests {
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn collector_initialization() {
        let collector = ExecutionProfilingCollector::new();
        assert!(collector.max_memory_usage > 0);
    }

    #[test]
    fn refresh_respects_interval() {
        let mut collector = ExecutionProfilingCollector::new();
        let before = collector.max_memory_usage;

        collector.refresh();
        assert_eq!(before, collector.max_memory_usage);

        thread::sleep(Duration::from_secs(2));
        collector.refresh();
        assert!(collector.max_memory_usage >= before);
    }

    #[test]
    fn final_statistics_structure() {
        let mut collector = ExecutionProfilingCollector::new();

        thread::sleep(Duration::from_millis(100));
        let stats = collector.compute_final_statistics(10);

        assert!(stats.max_memory_usage > 0);
        assert!(stats.wall_time > Duration::ZERO);
        assert_eq!(stats.population, 10);
    }

    #[test]
    fn zero_population_results() {
        let mut collector = ExecutionProfilingCollector::new();
        let stats = collector.compute_final_statistics(0);

        assert_eq!(stats.population, 0);
        assert_eq!(stats.cpu_time_per_agent, Duration::ZERO);
        assert_eq!(stats.wall_time_per_agent, Duration::ZERO);
        assert_eq!(stats.memory_per_agent, 0);
    }

    #[test]
    fn cpu_time_increases_over_time() {
        let mut collector = ExecutionProfilingCollector::new();

        let start = Instant::now();
        while start.elapsed().as_millis() < 30u128 {
            std::hint::black_box(0);
        }
        let cpu_time_1 = collector.cpu_time();

        let start = Instant::now();
        while start.elapsed().as_millis() < 50u128 {
            std::hint::black_box(0);
        }
        let cpu_time_2 = collector.cpu_time();
        assert!(cpu_time_2 > cpu_time_1);
    }

    #[test]
    fn completion_line_names_the_run() {
        let stats = ExecutionStatistics {
            max_memory_usage: 0,
            cpu_time: Duration::ZERO,
            wall_time: Duration::from_millis(1500),
            population: 42,
            cpu_time_per_agent: Duration::ZERO,
            wall_time_per_agent: Duration::ZERO,
            memory_per_agent: 0,
        };
        assert_eq!(
            completion_line("realization 3", &stats),
            "realization 3 complete: 42 agents in 1s 500ms"
        );
    }
}
