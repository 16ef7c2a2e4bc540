use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use runmeta_core::probe::EnvNotebook;
use runmeta_core::{Api, Environment, Meta, MetaConfig, ProgramInfo};

use crate::cli::args::MetaArgs;

/// Environment config with command-line overrides applied on top.
pub fn config_from_args(args: &MetaArgs) -> MetaConfig {
    let mut config = MetaConfig::from_env();
    if let Some(dir) = &args.out_dir {
        config = config.with_out_dir(dir.clone());
    }
    if let Some(host) = &args.host {
        config = config.with_host(host.clone());
    }
    if let Some(username) = &args.username {
        config = config.with_username(username.clone());
    }
    if let Some(docker) = &args.docker {
        config = config.with_docker(docker.clone());
    }
    if args.disable_code {
        config = config.with_disable_code(true);
    }
    config
}

pub fn program_from_args(args: &MetaArgs, argv: &[String]) -> ProgramInfo {
    let mut program = ProgramInfo::default().with_args(argv.iter().cloned());
    if let Some(path) = &args.program {
        program = program.with_program(path.clone());
    }
    if let Some(version) = &args.runtime_version {
        program = program.with_runtime_version(version.clone());
    }
    program
}

/// Create the run directory and collect metadata into it.
pub fn build_meta(
    args: &MetaArgs,
    config: MetaConfig,
    program: ProgramInfo,
) -> anyhow::Result<Meta> {
    let out_dir: PathBuf = config.out_dir().to_path_buf();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create run directory {}", out_dir.display()))?;

    let api = if args.no_git {
        Api::without_vcs()
    } else {
        Api::from_current_dir()
    };
    let env = Environment::local()
        .with_notebook(EnvNotebook)
        .with_program(program);
    Ok(Meta::with_environment(&api, config, Utc::now(), env))
}
