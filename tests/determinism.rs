use std::fs;
use std::path::Path;

use covid_abm::runner::{run, BaseArgs};
use tempfile::tempdir;

fn outputs(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut files: Vec<(String, Vec<u8>)> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let path = entry.unwrap().path();
            (
                path.file_name().unwrap().to_string_lossy().into_owned(),
                fs::read(&path).unwrap(),
            )
        })
        .collect();
    files.sort();
    files
}

fn run_once(output: &Path, seed: u64, parameters: &str) -> Vec<(String, Vec<u8>)> {
    let mut args = BaseArgs::new(
        Path::new(parameters),
        Path::new("tests/data/town"),
        output,
    );
    args.random_seed = seed;
    run(&args).unwrap();
    outputs(output)
}

#[test]
fn same_seed_gives_identical_outputs() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let a = run_once(first.path(), 17, "tests/data/parameters.txt");
    let b = run_once(second.path(), 17, "tests/data/parameters.txt");

    let names: Vec<&str> = a.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "agents_day_0.csv",
            "agents_day_10.csv",
            "agents_day_20.csv",
            "agents_day_30.csv",
            "daily_counts.csv",
            "parameters.json"
        ]
    );
    assert_eq!(a, b);
}

#[test]
fn table_and_json_parameters_agree() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let a = run_once(first.path(), 5, "tests/data/parameters.txt");
    let b = run_once(second.path(), 5, "tests/data/parameters.json");
    assert_eq!(a, b);
}

#[test]
fn different_seeds_draw_differently() {
    let first = tempdir().unwrap();
    let second = tempdir().unwrap();
    let a = run_once(first.path(), 1, "tests/data/parameters.txt");
    let b = run_once(second.path(), 2, "tests/data/parameters.txt");
    let counts = |files: &[(String, Vec<u8>)]| {
        files
            .iter()
            .find(|(name, _)| name == "daily_counts.csv")
            .map(|(_, bytes)| bytes.clone())
            .unwrap()
    };
    assert_ne!(counts(&a), counts(&b));
}
