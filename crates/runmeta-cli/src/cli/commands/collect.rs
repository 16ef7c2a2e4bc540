use anyhow::Context;
use tracing::info;

use super::common;
use crate::cli::args::CollectArgs;
use crate::exit_codes;

pub fn run(args: CollectArgs) -> anyhow::Result<i32> {
    let config = common::config_from_args(&args.meta);
    config.validate()?;
    let program = common::program_from_args(&args.meta, &args.args);
    let meta = common::build_meta(&args.meta, config, program)?;

    meta.write().context("failed to write run metadata")?;
    info!(path = %meta.path().display(), "metadata written");

    if args.json {
        println!("{}", serde_json::to_string_pretty(meta.probe_reports())?);
    } else {
        for report in meta.probe_reports() {
            println!("{:<10} {}", report.probe.as_str(), report.outcome);
        }
    }
    Ok(exit_codes::SUCCESS)
}
