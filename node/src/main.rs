use std::{env, fs::File};

use anyhow::{Context, Result, bail};
use log::info;

use bsp::{MemorySource, RecordSource, TrainingConfig, train_local};

fn main() -> Result<()> {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (Some(config_path), Some(data_path)) = (args.next(), args.next()) else {
        bail!("usage: node <config.json> <data.csv>");
    };

    let config: TrainingConfig = serde_json::from_reader(
        File::open(&config_path).with_context(|| format!("cannot open {config_path}"))?,
    )
    .with_context(|| format!("cannot parse {config_path}"))?;
    config.validate()?;

    let mut source = MemorySource::from_csv(&data_path)
        .with_context(|| format!("cannot load training data from {data_path}"))?;
    let mut instances = Vec::with_capacity(source.len());
    while let Some(instance) = source.read_next() {
        instances.push(instance);
    }
    info!(
        "loaded {} training instances from {data_path}",
        instances.len()
    );

    let report = train_local(&config, &instances)?;
    info!(
        supersteps = report.supersteps, converged = report.converged;
        "model written to {}", config.model_path
    );
    Ok(())
}
