use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use crate::client::globalsettings::GlobalSettings;
use crate::common::error::ProvisioningWarning;
use crate::common::shell::ShellRunner;
use crate::module::{LmodResolver, ModuleQuery, ResolutionPolicy};
use crate::runtime::provision::{EnvironmentProvisioner, InstallOutcome, ProvisionOutcome};
use crate::runtime::{PackageSpec, RuntimeEnvironment};

#[derive(Parser)]
pub struct VenvOpts {
    /// Root directory of the environment
    #[arg(value_hint = clap::ValueHint::DirPath)]
    pub path: PathBuf,

    /// Requested Python version, a prefix such as `3.10` selects the newest match
    #[arg(long)]
    pub python_version: Option<String>,

    /// What to do when the requested version is not listed by the module system
    #[arg(long, value_enum, default_value_t = ResolutionPolicy::Strict)]
    pub policy: ResolutionPolicy,

    /// Package to install into the environment (can be used multiple times)
    #[arg(long = "package", value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Requirements file installed before the explicit packages
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub requirements: Option<PathBuf>,

    /// Module loaded together with the interpreter (can be used multiple times)
    #[arg(long = "python-module", value_name = "MODULE")]
    pub python_modules: Vec<String>,

    /// Wipe stale state of a previous environment when creating it
    #[arg(long)]
    pub delete_previous: bool,

    /// Install packages even when the environment already exists
    #[arg(long)]
    pub update: bool,

    /// Print the output of provisioning commands
    #[arg(long)]
    pub verbose: bool,
}

impl VenvOpts {
    fn environment<Q: ModuleQuery>(&self, query: &Q) -> anyhow::Result<RuntimeEnvironment> {
        let mut env = RuntimeEnvironment::resolve(
            query,
            self.path.clone(),
            self.python_version.as_deref(),
            self.policy,
        )
        .context("Cannot resolve the Python version")?;
        env.modules = self.python_modules.clone();
        env.packages = PackageSpec {
            packages: self.packages.clone(),
            manifest: self.requirements.clone(),
        };
        env.delete_previous = self.delete_previous;
        Ok(env)
    }
}

pub fn command_venv(gsettings: &GlobalSettings, opts: VenvOpts) -> anyhow::Result<()> {
    let shell = gsettings.shell();
    let provisioner = EnvironmentProvisioner::new(
        LmodResolver::new(&shell, gsettings.module_namespace().to_string()),
        &shell,
    );
    let env = opts.environment(provisioner.query())?;
    provision_environment(&provisioner, &env, opts.update, opts.verbose)
}

pub(crate) fn report_warning(warning: &ProvisioningWarning) {
    log::warn!("{} reported:\n{}", warning.step, warning.stderr.trim_end());
}

/// Creates the environment unless it exists; packages are installed into fresh
/// environments, or into existing ones when `update` is set.
pub fn provision_environment<Q: ModuleQuery, S: ShellRunner>(
    provisioner: &EnvironmentProvisioner<Q, S>,
    env: &RuntimeEnvironment,
    update: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let created = match provisioner.provision(env, verbose)? {
        ProvisionOutcome::AlreadyExists => false,
        ProvisionOutcome::Created { warnings } => {
            warnings.iter().for_each(report_warning);
            true
        }
    };
    if created || update {
        match provisioner.install_packages(env, verbose)? {
            InstallOutcome::Skipped => log::debug!("No packages to install"),
            InstallOutcome::Installed { warning } => warning.iter().for_each(report_warning),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{VenvOpts, provision_environment};
    use crate::common::shell::tests::FakeShell;
    use crate::module::{LmodResolver, RuntimeVersion};
    use crate::runtime::provision::EnvironmentProvisioner;

    const LISTING: &str = "python/3.9.6\npython/3.10.9\n";

    fn parse(args: &[&str]) -> VenvOpts {
        let mut all = vec!["venv"];
        all.extend_from_slice(args);
        VenvOpts::try_parse_from(all).unwrap()
    }

    #[test]
    fn test_environment_from_options() {
        let shell = FakeShell::default().respond("module spider python", LISTING);
        let resolver = LmodResolver::new(&shell, "python".to_string());
        let opts = parse(&[
            "/envs/a",
            "--python-version",
            "3.9",
            "--package",
            "numpy",
            "--package",
            "scipy",
            "--delete-previous",
        ]);
        let env = opts.environment(&resolver).unwrap();
        assert_eq!(env.version, RuntimeVersion::Module("python/3.9.6".to_string()));
        assert_eq!(env.packages.packages, vec!["numpy", "scipy"]);
        assert!(env.delete_previous);
    }

    #[test]
    fn test_existing_environment_is_left_alone() {
        let tmp = tempfile::TempDir::with_prefix("sbatchgen").unwrap();
        let shell = FakeShell::default();
        let provisioner =
            EnvironmentProvisioner::new(LmodResolver::new(&shell, "python".to_string()), &shell);
        let opts = parse(&[tmp.path().to_str().unwrap(), "--package", "numpy"]);
        let env = opts.environment(provisioner.query()).unwrap();
        provision_environment(&provisioner, &env, false, false).unwrap();
        assert_eq!(shell.calls(), 0);
    }

    #[test]
    fn test_update_installs_into_existing_environment() {
        let tmp = tempfile::TempDir::with_prefix("sbatchgen").unwrap();
        let shell = FakeShell::default();
        let provisioner =
            EnvironmentProvisioner::new(LmodResolver::new(&shell, "python".to_string()), &shell);
        let opts = parse(&[tmp.path().to_str().unwrap(), "--package", "numpy"]);
        let env = opts.environment(provisioner.query()).unwrap();
        provision_environment(&provisioner, &env, true, false).unwrap();
        assert_eq!(shell.calls(), 1);
        assert!(shell.script(0).contains("pip install numpy"));
    }
}
