//! Command dispatch: bridges CLI args -> core bridge calls -> output formatting.

pub mod config_cmd;
pub mod get;
pub mod points;
pub mod run;
pub mod set;

use creskit_core::BridgeConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a controller-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    config: BridgeConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Run(args) => run::handle(config, args, global).await,
        Command::Get(args) => get::handle(config, args, global).await,
        Command::Set(args) => set::handle(config, args, global).await,
        // Config, Points and Completions are handled before dispatch
        Command::Config(_) | Command::Points | Command::Completions(_) => unreachable!(),
    }
}
