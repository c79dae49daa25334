use anyhow::anyhow;
use covid_abm::runner::run_with_args;

fn main() -> anyhow::Result<()> {
    let summaries = run_with_args().map_err(|error| anyhow!("{error}"))?;
    if summaries.len() > 1 {
        println!("{} realizations complete", summaries.len());
    }
    Ok(())
}
