use super::args::*;

pub mod collect;
pub mod common;
pub mod run;
pub mod show;

use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Collect(args) => collect::run(args),
        Command::Run(args) => run::run(args).await,
        Command::Show(args) => show::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
