use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;

use crate::client::commands::venv::report_warning;
use crate::client::globalsettings::GlobalSettings;
use crate::client::jobfile::{ArrayDef, JobDef};
use crate::common::env::{SBATCHGEN_ACCOUNT, SBATCHGEN_MAIL_USER};
use crate::common::error::SbatchError;
use crate::common::utils::fs::get_current_dir;
use crate::common::utils::str::is_blank;
use crate::directives::{
    DEFAULT_NAME_SEPARATOR, JobDirectives, JobIdentity, JobResources, MailType,
    NotificationPolicy, SchedulingShape,
};
use crate::module::{LmodResolver, ModuleQuery, ResolutionPolicy};
use crate::runtime::provision::{EnvironmentProvisioner, InstallOutcome, ProvisionOutcome};
use crate::runtime::{PackageSpec, RuntimeEnvironment};
use crate::script::{DEFAULT_INTERPRETER, DEFAULT_SCRIPT_NAME, assemble, write_script};

const DEFAULT_JOB_NAME: &str = "job";

#[derive(Parser)]
pub struct PythonOpts {
    /// Root of the Python virtual environment; turns the job into a Python job
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub venv: Option<PathBuf>,

    /// Requested Python version, a prefix such as `3.10` selects the newest match
    #[arg(long)]
    pub python_version: Option<String>,

    /// What to do when the requested version is not listed by the module system
    #[arg(long, value_enum)]
    pub policy: Option<ResolutionPolicy>,

    /// Package to install into the environment (can be used multiple times)
    #[arg(long = "package", value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Requirements file installed before the explicit packages
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub requirements: Option<PathBuf>,

    /// Module loaded together with the interpreter, e.g. `scipy-stack`
    #[arg(long = "python-module", value_name = "MODULE")]
    pub python_modules: Vec<String>,

    /// Wipe stale state of a previous environment when creating it
    #[arg(long)]
    pub delete_previous: bool,

    /// Print the output of provisioning commands
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Parser)]
pub struct ScriptOpts {
    /// TOML file with the job definition, command line options take precedence
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub job_file: Option<PathBuf>,

    /// Memory request, e.g. `4G`
    #[arg(long)]
    pub mem: Option<String>,

    /// Wall-clock hours
    #[arg(long)]
    pub hours: Option<u32>,

    /// Wall-clock minutes (0-59)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..60))]
    pub minutes: Option<u32>,

    /// Module loaded by the job (can be used multiple times or comma separated)
    #[arg(long = "module", value_name = "MODULE", value_delimiter(','))]
    pub modules: Vec<String>,

    /// Directory that receives the `output` folder with Slurm logs
    #[arg(long, value_hint = clap::ValueHint::DirPath)]
    pub workdir: Option<PathBuf>,

    /// Job name
    #[arg(long)]
    pub name: Option<String>,

    /// Name component; all components are joined and replace the job name
    #[arg(long = "name-part", value_name = "PART")]
    pub name_parts: Vec<String>,

    /// Separator used to join name components
    #[arg(long)]
    pub separator: Option<String>,

    /// Create an array job with runs 1..=N
    #[arg(long, conflicts_with = "array_ids")]
    pub array_count: Option<u32>,

    /// Create an array job with explicit run indices, e.g. `2,5,9`
    #[arg(long, value_delimiter(','))]
    pub array_ids: Vec<u32>,

    /// Number of tasks per node
    #[arg(long)]
    pub ntasks_per_node: Option<u32>,

    /// Account charged for the job
    #[arg(long, env = SBATCHGEN_ACCOUNT)]
    pub account: Option<String>,

    /// Recipient of job notifications
    #[arg(long, env = SBATCHGEN_MAIL_USER)]
    pub mail_user: Option<String>,

    /// Events that trigger a notification, comma separated
    #[arg(long, value_enum, value_delimiter(','), ignore_case(true))]
    pub mail_type: Vec<MailType>,

    #[command(flatten)]
    pub python: PythonOpts,

    /// Do not create the environment or install packages
    #[arg(long)]
    pub no_provision: bool,

    /// Interpreter launch token that receives the unbuffered flag
    #[arg(long, default_value = DEFAULT_INTERPRETER)]
    pub interpreter: String,

    /// File with one command per line, appended after job file commands
    #[arg(long, value_hint = clap::ValueHint::FilePath)]
    pub commands_file: Option<PathBuf>,

    /// Path of the generated script
    #[arg(long, short('o'), default_value = DEFAULT_SCRIPT_NAME)]
    pub output: PathBuf,

    /// Commands executed by the job, one per argument
    #[arg(last = true)]
    pub commands: Vec<String>,
}

fn select<T>(cli: Vec<T>, file: Vec<T>) -> Vec<T> {
    if cli.is_empty() { file } else { cli }
}

fn build_shape(opts: &ScriptOpts, file: Option<ArrayDef>) -> crate::Result<SchedulingShape> {
    if let Some(count) = opts.array_count {
        return SchedulingShape::count(count);
    }
    if !opts.array_ids.is_empty() {
        return SchedulingShape::indices(opts.array_ids.iter().copied());
    }
    match file {
        None => Ok(SchedulingShape::Single),
        Some(ArrayDef::Count(count)) => SchedulingShape::count(count),
        Some(ArrayDef::Indices(indices)) => SchedulingShape::indices(indices),
    }
}

/// Merges command line options over the job file and resolves the interpreter version.
pub fn build_directives<Q: ModuleQuery>(
    opts: &ScriptOpts,
    mut jdef: JobDef,
    query: &Q,
) -> anyhow::Result<JobDirectives> {
    let hours = opts
        .hours
        .or(jdef.hours)
        .ok_or_else(|| anyhow!("Wall-clock hours are missing, use --hours or `hours`"))?;
    let memory = opts.mem.clone().or(jdef.mem.take()).unwrap_or_default();
    if is_blank(&memory) {
        return Err(SbatchError::MissingMemorySpecification.into());
    }
    let resources = JobResources::new(
        memory,
        hours,
        opts.minutes.or(jdef.minutes).unwrap_or(0),
    )?
    .with_tasks_per_node(opts.ntasks_per_node.or(jdef.tasks_per_node));

    let mut identity = JobIdentity::new(
        opts.name
            .clone()
            .or(jdef.name.take())
            .unwrap_or_else(|| DEFAULT_JOB_NAME.to_string()),
    )
    .with_account(opts.account.clone().or(jdef.account.take()));
    identity.components = select(opts.name_parts.clone(), std::mem::take(&mut jdef.name_parts));
    identity.separator = opts
        .separator
        .clone()
        .or(jdef.separator.take())
        .unwrap_or_else(|| DEFAULT_NAME_SEPARATOR.to_string());

    let notification = NotificationPolicy::new(
        opts.mail_user.clone().or(jdef.mail_user.take()),
        select(
            opts.mail_type.clone(),
            jdef.mail_type.take().map(|m| m.into_vec()).unwrap_or_default(),
        ),
    );

    let working_dir = opts
        .workdir
        .clone()
        .or(jdef.working_dir.take())
        .unwrap_or_else(get_current_dir);

    let mut directives = JobDirectives::new(resources, identity, working_dir)
        .with_shape(build_shape(opts, jdef.array.take())?)
        .with_notification(notification)
        .with_modules(select(opts.modules.clone(), std::mem::take(&mut jdef.modules)))
        .with_module_namespace(query.namespace().to_string());

    if let Some(env) = build_runtime(&opts.python, jdef.python.take(), query)? {
        directives = directives.with_runtime(env);
    }
    Ok(directives)
}

fn build_runtime<Q: ModuleQuery>(
    opts: &PythonOpts,
    file: Option<crate::client::jobfile::PythonDef>,
    query: &Q,
) -> anyhow::Result<Option<RuntimeEnvironment>> {
    let file = file.unwrap_or_default();
    let root = match opts.venv.clone() {
        Some(root) => root,
        None if !file.env_path.as_os_str().is_empty() => file.env_path,
        None => return Ok(None),
    };

    let requested = opts.python_version.clone().or(file.version);
    let policy = opts.policy.unwrap_or(file.policy);
    let mut env = RuntimeEnvironment::resolve(query, root, requested.as_deref(), policy)
        .context("Cannot resolve the Python version")?;
    env.modules = select(opts.python_modules.clone(), file.modules);
    env.packages = PackageSpec {
        packages: select(opts.packages.clone(), file.packages),
        manifest: opts.requirements.clone().or(file.requirements),
    };
    env.delete_previous = opts.delete_previous || file.delete_previous;
    Ok(Some(env))
}

fn collect_commands(opts: &ScriptOpts, file_commands: Vec<String>) -> anyhow::Result<Vec<String>> {
    let mut commands = file_commands;
    if let Some(path) = &opts.commands_file {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        commands.extend(
            data.lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| line.to_string()),
        );
    }
    commands.extend(opts.commands.iter().cloned());
    Ok(commands)
}

pub fn command_script(gsettings: &GlobalSettings, opts: ScriptOpts) -> anyhow::Result<()> {
    let mut jdef = match &opts.job_file {
        Some(path) => JobDef::from_path(path)?,
        None => JobDef::default(),
    };
    let commands = collect_commands(&opts, std::mem::take(&mut jdef.commands))?;

    let shell = gsettings.shell();
    let provisioner = EnvironmentProvisioner::new(
        LmodResolver::new(&shell, gsettings.module_namespace().to_string()),
        &shell,
    );
    let directives = build_directives(&opts, jdef, provisioner.query())?;

    if !opts.no_provision {
        // The script is still written, a broken environment can be inspected on disk.
        match directives.provision_runtime(&provisioner, opts.python.verbose) {
            Ok(None) => {}
            Ok(Some((provisioned, installed))) => log_provisioning(provisioned, installed),
            Err(error) => log::error!("Provisioning failed: {error}"),
        }
    }

    let text = directives.render()?;
    let script = assemble(&text, &commands, &opts.interpreter);
    write_script(&opts.output, &script)?;
    log::info!("Submission script written to {}", opts.output.display());
    Ok(())
}

fn log_provisioning(provisioned: ProvisionOutcome, installed: InstallOutcome) {
    if let ProvisionOutcome::Created { warnings } = provisioned {
        warnings.iter().for_each(report_warning);
    }
    if let InstallOutcome::Installed {
        warning: Some(warning),
    } = installed
    {
        report_warning(&warning);
    }
}
