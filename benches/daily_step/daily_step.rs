use std::path::Path;

use criterion::{criterion_group, criterion_main, Criterion};
use covid_abm::parameters::Parameters;
use covid_abm::population::PopulationSnapshot;
use covid_abm::Abm;

static SEED: u64 = 123;
static DAYS: u32 = 60;

fn load() -> (Parameters, PopulationSnapshot) {
    let mut parameters = Parameters::load(Path::new("tests/data/parameters.txt"))
        .expect("failed to load parameters");
    parameters.days = DAYS;
    let population =
        PopulationSnapshot::load(Path::new("tests/data/town")).expect("failed to load population");
    (parameters, population)
}

fn full_run(parameters: &Parameters, population: &PopulationSnapshot) -> Abm {
    let mut abm = Abm::new(parameters.clone(), population, SEED).expect("failed to build model");
    abm.execute().expect("run failed");
    abm
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let (parameters, population) = load();
    c.bench_function("full run", |bencher| {
        bencher.iter_with_large_drop(|| full_run(&parameters, &population));
    });
    c.bench_function("single day", |bencher| {
        bencher.iter_batched(
            || Abm::new(parameters.clone(), &population, SEED).expect("failed to build model"),
            |mut abm| {
                abm.run_days(1).expect("day failed");
                abm
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(daily_step_benches, criterion_benchmark);
criterion_main!(daily_step_benches);
