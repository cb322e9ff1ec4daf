//! Structured description of a batch job and its rendering into `#SBATCH` directives.

mod render;

pub use render::{SBATCH_PREFIX, collapse_blank_lines};

use std::fmt;
use std::path::PathBuf;

use itertools::Itertools;
use serde::Deserialize;

use crate::common::error::SbatchError;
use crate::common::shell::ShellRunner;
use crate::module::{DEFAULT_MODULE_NAMESPACE, ModuleQuery};
use crate::runtime::RuntimeEnvironment;
use crate::runtime::provision::{EnvironmentProvisioner, InstallOutcome, ProvisionOutcome};

pub const DEFAULT_NAME_SEPARATOR: &str = "_";

/// Placeholder substituted by Slurm with the job id of a single-run job.
pub const SINGLE_RUN_PLACEHOLDER: &str = "%j";
/// Placeholder substituted by Slurm with `<array job id>_<task index>`.
pub const ARRAY_RUN_PLACEHOLDER: &str = "%A_%a";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResources {
    /// Memory request in the cluster's own syntax (`4G`, `500M`).
    /// Validated when rendering, an empty value is a configuration error.
    pub memory: String,
    pub hours: u32,
    minutes: u32,
    pub tasks_per_node: Option<u32>,
}

impl JobResources {
    pub fn new(memory: impl Into<String>, hours: u32, minutes: u32) -> crate::Result<Self> {
        if minutes > 59 {
            return Err(SbatchError::InvalidMinutes(minutes));
        }
        Ok(Self {
            memory: memory.into(),
            hours,
            minutes,
            tasks_per_node: None,
        })
    }

    pub fn with_tasks_per_node(mut self, tasks: Option<u32>) -> Self {
        self.tasks_per_node = tasks;
        self
    }

    pub fn minutes(&self) -> u32 {
        self.minutes
    }

    /// Wall-clock limit as `H:MM:00`. Hours are never padded.
    pub fn time_limit(&self) -> String {
        format!("{}:{:02}:00", self.hours, self.minutes)
    }
}

/// Runs of an array job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArrayRuns {
    /// Explicit indices, rendered in the supplied order.
    Indices(Vec<u32>),
    /// Contiguous runs `1..=N`.
    Count(u32),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SchedulingShape {
    #[default]
    Single,
    Array(ArrayRuns),
}

impl SchedulingShape {
    /// Array job over explicit indices. Duplicates are dropped, the first occurrence wins.
    pub fn indices(indices: impl IntoIterator<Item = u32>) -> crate::Result<Self> {
        let indices: Vec<u32> = indices.into_iter().unique().collect();
        if indices.is_empty() {
            return Err(SbatchError::EmptyArray);
        }
        Ok(SchedulingShape::Array(ArrayRuns::Indices(indices)))
    }

    pub fn count(count: u32) -> crate::Result<Self> {
        if count == 0 {
            return Err(SbatchError::EmptyArray);
        }
        Ok(SchedulingShape::Array(ArrayRuns::Count(count)))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, SchedulingShape::Array(_))
    }

    pub fn placeholder(&self) -> &'static str {
        match self {
            SchedulingShape::Single => SINGLE_RUN_PLACEHOLDER,
            SchedulingShape::Array(_) => ARRAY_RUN_PLACEHOLDER,
        }
    }

    /// Value of the `--array` directive.
    pub fn array_range(&self) -> Option<String> {
        match self {
            SchedulingShape::Single => None,
            SchedulingShape::Array(ArrayRuns::Count(count)) => Some(format!("1-{count}")),
            SchedulingShape::Array(ArrayRuns::Indices(indices)) => Some(indices.iter().join(",")),
        }
    }
}

#[derive(clap::ValueEnum, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MailType {
    #[value(name = "ALL")]
    #[serde(rename = "ALL")]
    All,
    #[value(name = "BEGIN")]
    #[serde(rename = "BEGIN")]
    Begin,
    #[value(name = "END")]
    #[serde(rename = "END")]
    End,
    #[value(name = "FAIL")]
    #[serde(rename = "FAIL")]
    Fail,
    #[value(name = "REQUEUE")]
    #[serde(rename = "REQUEUE")]
    Requeue,
    #[value(name = "TIME_LIMIT")]
    #[serde(rename = "TIME_LIMIT")]
    TimeLimit,
    #[value(name = "TIME_LIMIT_90")]
    #[serde(rename = "TIME_LIMIT_90")]
    TimeLimit90,
}

impl MailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailType::All => "ALL",
            MailType::Begin => "BEGIN",
            MailType::End => "END",
            MailType::Fail => "FAIL",
            MailType::Requeue => "REQUEUE",
            MailType::TimeLimit => "TIME_LIMIT",
            MailType::TimeLimit90 => "TIME_LIMIT_90",
        }
    }
}

impl fmt::Display for MailType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationPolicy {
    /// Without a recipient, no mail directives are emitted.
    pub recipient: Option<String>,
    events: Vec<MailType>,
}

impl NotificationPolicy {
    /// An empty event list falls back to `FAIL`.
    pub fn new(recipient: Option<String>, events: impl IntoIterator<Item = MailType>) -> Self {
        let mut events: Vec<MailType> = events.into_iter().unique().collect();
        if events.is_empty() {
            events.push(MailType::Fail);
        }
        Self {
            recipient: recipient.filter(|r| !r.trim().is_empty()),
            events,
        }
    }

    pub fn events(&self) -> &[MailType] {
        &self.events
    }
}

impl Default for NotificationPolicy {
    fn default() -> Self {
        Self::new(None, Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobIdentity {
    pub name: String,
    /// When not empty, joined with `separator` and used instead of `name`.
    pub components: Vec<String>,
    pub separator: String,
    pub account: Option<String>,
}

impl JobIdentity {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            components: vec![],
            separator: DEFAULT_NAME_SEPARATOR.to_string(),
            account: None,
        }
    }

    pub fn with_account(mut self, account: Option<String>) -> Self {
        self.account = account.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn effective_name(&self) -> String {
        if self.components.is_empty() {
            self.name.clone()
        } else {
            self.components.join(&self.separator)
        }
    }
}

/// Either a plain shell job or a job running inside a managed Python environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    Base,
    Interpreter(RuntimeEnvironment),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDirectives {
    pub resources: JobResources,
    pub shape: SchedulingShape,
    pub notification: NotificationPolicy,
    pub identity: JobIdentity,
    /// Directory that receives the `output` folder with Slurm logs.
    pub working_dir: PathBuf,
    pub modules: Vec<String>,
    pub kind: JobKind,
    pub module_namespace: String,
}

impl JobDirectives {
    pub fn new(resources: JobResources, identity: JobIdentity, working_dir: PathBuf) -> Self {
        Self {
            resources,
            shape: SchedulingShape::Single,
            notification: NotificationPolicy::default(),
            identity,
            working_dir,
            modules: vec![],
            kind: JobKind::Base,
            module_namespace: DEFAULT_MODULE_NAMESPACE.to_string(),
        }
    }

    pub fn with_shape(mut self, shape: SchedulingShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_notification(mut self, notification: NotificationPolicy) -> Self {
        self.notification = notification;
        self
    }

    pub fn with_modules(mut self, modules: Vec<String>) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_runtime(mut self, env: RuntimeEnvironment) -> Self {
        self.kind = JobKind::Interpreter(env);
        self
    }

    pub fn with_module_namespace(mut self, namespace: String) -> Self {
        self.module_namespace = namespace;
        self
    }

    pub fn runtime(&self) -> Option<&RuntimeEnvironment> {
        match &self.kind {
            JobKind::Base => None,
            JobKind::Interpreter(env) => Some(env),
        }
    }

    /// Creates the environment of an interpreter job and installs its packages.
    /// Returns `None` for jobs without a managed runtime.
    pub fn provision_runtime<Q: ModuleQuery, S: ShellRunner>(
        &self,
        provisioner: &EnvironmentProvisioner<Q, S>,
        verbose: bool,
    ) -> crate::Result<Option<(ProvisionOutcome, InstallOutcome)>> {
        let Some(env) = self.runtime() else {
            return Ok(None);
        };
        let provisioned = provisioner.provision(env, verbose)?;
        let installed = provisioner.install_packages(env, verbose)?;
        Ok(Some((provisioned, installed)))
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ArrayRuns, JobIdentity, JobResources, MailType, NotificationPolicy, SchedulingShape,
    };
    use crate::common::error::SbatchError;

    #[test]
    fn test_time_limit_padding() {
        assert_eq!(JobResources::new("4G", 2, 0).unwrap().time_limit(), "2:00:00");
        assert_eq!(JobResources::new("4G", 2, 45).unwrap().time_limit(), "2:45:00");
        assert_eq!(JobResources::new("4G", 0, 5).unwrap().time_limit(), "0:05:00");
        assert_eq!(JobResources::new("4G", 120, 0).unwrap().time_limit(), "120:00:00");
    }

    #[test]
    fn test_minutes_out_of_range() {
        assert!(matches!(
            JobResources::new("4G", 1, 60),
            Err(SbatchError::InvalidMinutes(60))
        ));
    }

    #[test]
    fn test_array_range() {
        assert_eq!(SchedulingShape::Single.array_range(), None);
        assert_eq!(
            SchedulingShape::count(4).unwrap().array_range().unwrap(),
            "1-4"
        );
        assert_eq!(
            SchedulingShape::indices([2, 5, 9]).unwrap().array_range().unwrap(),
            "2,5,9"
        );
        assert_eq!(
            SchedulingShape::indices([9, 2, 9, 5]).unwrap(),
            SchedulingShape::Array(ArrayRuns::Indices(vec![9, 2, 5]))
        );
    }

    #[test]
    fn test_empty_array_rejected() {
        assert!(matches!(
            SchedulingShape::count(0),
            Err(SbatchError::EmptyArray)
        ));
        assert!(matches!(
            SchedulingShape::indices(Vec::new()),
            Err(SbatchError::EmptyArray)
        ));
    }

    #[test]
    fn test_placeholders() {
        assert_eq!(SchedulingShape::Single.placeholder(), "%j");
        assert_eq!(SchedulingShape::count(2).unwrap().placeholder(), "%A_%a");
    }

    #[test]
    fn test_notification_defaults_to_fail() {
        let policy = NotificationPolicy::default();
        assert_eq!(policy.events(), &[MailType::Fail]);
        assert_eq!(policy.recipient, None);
        let policy = NotificationPolicy::new(
            Some("a@b.c".to_string()),
            [MailType::End, MailType::Fail, MailType::End],
        );
        assert_eq!(policy.events(), &[MailType::End, MailType::Fail]);
    }

    #[test]
    fn test_identity_components() {
        let mut identity = JobIdentity::new("train");
        assert_eq!(identity.effective_name(), "train");
        identity.components = vec!["train".to_string(), "lr".to_string(), "5".to_string()];
        identity.separator = "-".to_string();
        assert_eq!(identity.effective_name(), "train-lr-5");
    }

    #[test]
    fn test_mail_type_names() {
        assert_eq!(MailType::TimeLimit90.to_string(), "TIME_LIMIT_90");
        assert_eq!(MailType::All.as_str(), "ALL");
    }
}
