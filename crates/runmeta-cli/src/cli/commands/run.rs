use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::Context;
use runmeta_core::{Meta, RunState};
use tracing::{info, warn};

use super::common;
use crate::cli::args::RunArgs;
use crate::exit_codes;

enum ChildExit {
    Exited(ExitStatus),
    Interrupted,
}

pub async fn run(args: RunArgs) -> anyhow::Result<i32> {
    let mut config = common::config_from_args(&args.meta);
    if let Some(secs) = args.heartbeat_secs {
        let tick = config.heartbeat_tick();
        config = config.with_heartbeat(Duration::from_secs(secs), tick);
    }
    config.validate()?;

    let cmd_name = &args.command[0];
    let cmd_args = &args.command[1..];

    let mut program = common::program_from_args(&args.meta, cmd_args).with_executable(cmd_name);
    if program.program.is_none() {
        if let Some(script) = entry_point(cmd_args) {
            program = program.with_program(script);
        }
    }

    let mut meta = common::build_meta(&args.meta, config, program)?;
    meta.start()?;
    // Visible before the first heartbeat.
    if let Err(e) = meta.write() {
        warn!(error = %e, "initial metadata write failed");
    }

    let exit = supervise(cmd_name, cmd_args).await;
    record_exit(&meta, &exit);
    meta.shutdown().await.context("heartbeat did not stop cleanly")?;
    info!(path = %meta.path().display(), "metadata final");

    match exit? {
        ChildExit::Exited(status) => match status.code() {
            Some(code) => Ok(code),
            None => {
                eprintln!("runmeta: child terminated by signal");
                Ok(exit_codes::COMMAND_FAILED)
            }
        },
        ChildExit::Interrupted => Ok(exit_codes::COMMAND_FAILED),
    }
}

/// First argument naming an existing file: the script an interpreter runs.
fn entry_point(cmd_args: &[String]) -> Option<&str> {
    cmd_args
        .iter()
        .map(String::as_str)
        .filter(|arg| !arg.starts_with('-'))
        .find(|arg| Path::new(arg).is_file())
}

fn record_exit(meta: &Meta, exit: &anyhow::Result<ChildExit>) {
    match exit {
        Ok(ChildExit::Exited(status)) => {
            let state = match status.code() {
                Some(0) => RunState::Finished,
                Some(_) => RunState::Failed,
                None => RunState::Killed,
            };
            meta.set_state(state);
            if let Some(code) = status.code() {
                meta.set_exit_code(code);
            }
        }
        Ok(ChildExit::Interrupted) => meta.set_state(RunState::Killed),
        Err(_) => meta.set_state(RunState::Failed),
    }
}

/// Run the command to completion, or until Ctrl-C.
async fn supervise(cmd_name: &str, cmd_args: &[String]) -> anyhow::Result<ChildExit> {
    let mut child = tokio::process::Command::new(cmd_name)
        .args(cmd_args)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("failed to spawn {cmd_name}"))?;

    let status = tokio::select! {
        status = child.wait() => Some(status.context("failed to wait for child")?),
        _ = tokio::signal::ctrl_c() => None,
    };

    match status {
        Some(status) => Ok(ChildExit::Exited(status)),
        None => {
            warn!("interrupted, stopping child");
            child.kill().await.context("failed to stop child")?;
            Ok(ChildExit::Interrupted)
        }
    }
}
