use std::path::PathBuf;

use clap::Parser;
use clap_complete::Shell;

use crate::client::commands::script::ScriptOpts;
use crate::client::commands::venv::VenvOpts;
use crate::client::commands::wait::WaitOpts;
use crate::common::env::{SBATCHGEN_MODULE_NAMESPACE, SBATCHGEN_SHELL};
use crate::common::shell::DEFAULT_SHELL;
use crate::module::DEFAULT_MODULE_NAMESPACE;

// Common CLI options
#[derive(Parser)]
pub struct CommonOpts {
    /// Shell used to query modules and to create environments
    #[arg(
        long,
        value_hint = clap::ValueHint::ExecutablePath,
        global = true,
        env = SBATCHGEN_SHELL,
        default_value = DEFAULT_SHELL,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub shell: PathBuf,

    /// Module namespace of the Python interpreter
    #[arg(
        long,
        global = true,
        env = SBATCHGEN_MODULE_NAMESPACE,
        default_value = DEFAULT_MODULE_NAMESPACE,
        help_heading("GLOBAL OPTIONS"),
        hide_short_help(true)
    )]
    pub module_namespace: String,

    /// Enables more detailed log output
    #[arg(long, global = true, help_heading("GLOBAL OPTIONS"))]
    pub debug: bool,
}

// Root CLI options
#[derive(Parser)]
#[command(
    author,
    about,
    version,
    disable_help_subcommand(true),
    help_expected(true)
)]
pub struct RootOptions {
    #[command(flatten)]
    pub common: CommonOpts,

    #[command(subcommand)]
    pub subcmd: SubCommand,
}

#[allow(clippy::large_enum_variant)]
#[derive(Parser)]
pub enum SubCommand {
    /// Generate a submission script, provisioning its Python environment if needed
    Script(ScriptOpts),
    /// Create a Python virtual environment from module-system interpreters
    Venv(VenvOpts),
    /// Block until the user has no jobs left in the Slurm queue
    Wait(WaitOpts),
    /// Generate shell completion script
    GenerateCompletion(GenerateCompletionOpts),
}

#[derive(Parser)]
pub struct GenerateCompletionOpts {
    /// Shell flavour for which the completion script should be generated
    #[arg(value_enum)]
    pub shell: Shell,
}
