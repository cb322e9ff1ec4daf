use std::io;

use clap::{CommandFactory, FromArgMatches};
use clap_complete::generate;

use sbatchgen::client::commands::script::command_script;
use sbatchgen::client::commands::venv::command_venv;
use sbatchgen::client::commands::wait::command_wait;
use sbatchgen::client::globalsettings::GlobalSettings;
use sbatchgen::common::cli::{CommonOpts, GenerateCompletionOpts, RootOptions, SubCommand};
use sbatchgen::common::setup::setup_logging;

fn make_global_settings(opts: CommonOpts) -> GlobalSettings {
    GlobalSettings::new(opts.shell, opts.module_namespace)
}

fn generate_completion(opts: GenerateCompletionOpts) -> anyhow::Result<()> {
    let generator = opts.shell;

    let mut app = RootOptions::command();
    eprintln!("Generating completion file for {generator}...");
    generate(generator, &mut app, "sbatchgen".to_string(), &mut io::stdout());
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> sbatchgen::Result<()> {
    let matches = RootOptions::command().get_matches();
    let top_opts = match RootOptions::from_arg_matches(&matches) {
        Ok(opts) => opts,
        Err(error) => error.exit(),
    };

    setup_logging(top_opts.common.debug);

    let gsettings = make_global_settings(top_opts.common);

    let result = match top_opts.subcmd {
        SubCommand::Script(opts) => command_script(&gsettings, opts),
        SubCommand::Venv(opts) => command_venv(&gsettings, opts),
        SubCommand::Wait(opts) => command_wait(opts).await,
        SubCommand::GenerateCompletion(opts) => generate_completion(opts),
    };

    if let Err(e) = result {
        log::error!("{e:?}");
        std::process::exit(1);
    }

    Ok(())
}
