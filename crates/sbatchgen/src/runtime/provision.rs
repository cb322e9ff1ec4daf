use std::fmt::Write;

use itertools::Itertools;

use crate::common::error::{ProvisionStep, ProvisioningWarning};
use crate::common::shell::{ShellOutput, ShellRunner, check_shell_output, quote, quote_path};
use crate::common::utils::str::pluralize;
use crate::module::{ModuleQuery, load_command};
use crate::runtime::RuntimeEnvironment;

#[derive(Debug, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The environment root was already present, nothing was executed.
    AlreadyExists,
    Created { warnings: Vec<ProvisioningWarning> },
}

#[derive(Debug, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Neither packages nor a manifest were requested.
    Skipped,
    Installed { warning: Option<ProvisioningWarning> },
}

/// Creates environments and installs packages into them.
///
/// Every step is issued as one shell script, because loaded modules and an
/// activated environment do not outlive the shell process. Nothing is rolled
/// back on failure; a partially created root is treated as existing afterwards.
pub struct EnvironmentProvisioner<Q, S> {
    query: Q,
    shell: S,
}

impl<Q: ModuleQuery, S: ShellRunner> EnvironmentProvisioner<Q, S> {
    pub fn new(query: Q, shell: S) -> Self {
        Self { query, shell }
    }

    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn provision(
        &self,
        env: &RuntimeEnvironment,
        verbose: bool,
    ) -> crate::Result<ProvisionOutcome> {
        if env.exists() {
            log::info!("Virtual environment {} already exists", env.root.display());
            return Ok(ProvisionOutcome::AlreadyExists);
        }

        let modules = self.activation_modules(env)?;
        let mut script = String::from("set -e\n");
        if let Some(load) = load_command(modules.iter().map(String::as_str)) {
            writeln!(script, "{load}").unwrap();
        }
        write!(
            script,
            "virtualenv --no-download {} {}",
            quote_path(&env.root),
            env.app_data_flag()
        )
        .unwrap();
        if env.delete_previous {
            script.push_str(" --clear");
        }
        writeln!(script).unwrap();
        writeln!(script, "{}", env.activate_command()).unwrap();
        writeln!(script, "pip install --upgrade pip").unwrap();

        let output = self.shell.run(&script)?;
        echo_output(&output, verbose);
        let warnings = check_shell_output(ProvisionStep::CreateEnvironment, &output)?
            .into_iter()
            .collect();

        log::info!(
            "Virtual environment {} created with Python version {} and {} {}: {}",
            env.root.display(),
            env.version,
            modules.len(),
            pluralize("module", modules.len()),
            modules.join(" ")
        );
        Ok(ProvisionOutcome::Created { warnings })
    }

    pub fn install_packages(
        &self,
        env: &RuntimeEnvironment,
        verbose: bool,
    ) -> crate::Result<InstallOutcome> {
        if env.packages.is_empty() {
            return Ok(InstallOutcome::Skipped);
        }

        let modules = self.activation_modules(env)?;
        let mut script = String::from("set -e\n");
        if let Some(load) = load_command(modules.iter().map(String::as_str)) {
            writeln!(script, "{load}").unwrap();
        }
        writeln!(script, "{}", env.activate_command()).unwrap();
        if let Some(manifest) = &env.packages.manifest {
            writeln!(script, "pip install -r {}", quote_path(manifest)).unwrap();
        }
        if !env.packages.packages.is_empty() {
            let packages = env.packages.packages.iter().map(|p| quote(p)).join(" ");
            writeln!(script, "pip install {packages}").unwrap();
        }

        let output = self.shell.run(&script)?;
        echo_output(&output, verbose);
        let warning = check_shell_output(ProvisionStep::InstallPackages, &output)?;
        log::info!(
            "Installed {} {} into {}",
            env.packages.packages.len(),
            pluralize("package", env.packages.packages.len()),
            env.root.display()
        );
        Ok(InstallOutcome::Installed { warning })
    }

    /// Modules loaded before the environment is created or activated. Prerequisites
    /// that were not resolved together with the version are looked up now.
    fn activation_modules(&self, env: &RuntimeEnvironment) -> crate::Result<Vec<String>> {
        let namespace = self.query.namespace();
        let mut modules: Vec<String> = match env.prerequisites {
            Some(_) => vec![],
            None => self.query.query(env.version.clone())?.prerequisites,
        };
        modules.extend(env.activation_modules(namespace).into_iter().map(String::from));
        Ok(modules)
    }
}

fn echo_output(output: &ShellOutput, verbose: bool) {
    let stdout = output.stdout.trim();
    if verbose && !stdout.is_empty() {
        log::info!("{stdout}");
    }
}
