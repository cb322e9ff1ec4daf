//! Isolated Python environments bound to a module-system interpreter.

pub mod provision;

use std::path::PathBuf;

use crate::common::shell::quote_path;
use crate::module::{ModuleQuery, ResolutionPolicy};

pub use crate::module::RuntimeVersion;

/// Packages installed into an environment.
///
/// The manifest is installed first, so explicit packages can pin or
/// override versions it resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageSpec {
    pub packages: Vec<String>,
    pub manifest: Option<PathBuf>,
}

impl PackageSpec {
    pub fn from_list<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
            manifest: None,
        }
    }

    pub fn from_manifest(manifest: PathBuf) -> Self {
        Self {
            packages: vec![],
            manifest: Some(manifest),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty() && self.manifest.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeEnvironment {
    /// Root directory of the environment. If it exists, the environment is considered provisioned.
    pub root: PathBuf,
    pub version: RuntimeVersion,
    /// Modules that have to be loaded before the interpreter module (e.g. `StdEnv/2020`).
    /// `None` until they were looked up in the module system.
    pub prerequisites: Option<Vec<String>>,
    /// Modules loaded in addition to the interpreter module (e.g. `scipy-stack`).
    pub modules: Vec<String>,
    pub packages: PackageSpec,
    /// Wipe a stale environment state during creation.
    pub delete_previous: bool,
}

impl RuntimeEnvironment {
    pub fn new(root: PathBuf, version: RuntimeVersion) -> Self {
        Self {
            root,
            version,
            prerequisites: None,
            modules: vec![],
            packages: PackageSpec::default(),
            delete_previous: false,
        }
    }

    /// Resolves the requested interpreter version and its prerequisite modules.
    pub fn resolve<Q: ModuleQuery>(
        query: &Q,
        root: PathBuf,
        requested: Option<&str>,
        policy: ResolutionPolicy,
    ) -> crate::Result<Self> {
        let version = query.resolve_with_policy(requested, policy)?;
        let resolved = query.query(version)?;
        Ok(Self::new(root, resolved.version).with_prerequisites(resolved.prerequisites))
    }

    pub fn with_prerequisites(mut self, prerequisites: Vec<String>) -> Self {
        self.prerequisites = Some(prerequisites);
        self
    }

    pub fn exists(&self) -> bool {
        self.root.exists()
    }

    pub fn activate_script(&self) -> PathBuf {
        self.root.join("bin").join("activate")
    }

    pub fn activate_command(&self) -> String {
        format!("source {}", quote_path(&self.activate_script()))
    }

    /// Modules that have to be loaded before the environment is activated:
    /// prerequisites, the interpreter module, then the extra modules.
    pub fn activation_modules<'a>(&'a self, namespace: &'a str) -> Vec<&'a str> {
        self.prerequisites
            .iter()
            .flatten()
            .map(String::as_str)
            .chain(std::iter::once(self.version.module_name(namespace)))
            .chain(self.modules.iter().map(String::as_str))
            .collect()
    }

    /// `virtualenv` renamed `--clear-app-data` to `--reset-app-data` in the releases
    /// shipped with Python 3.10.
    pub fn app_data_flag(&self) -> &'static str {
        match self.version.major_minor() {
            Some(version) if version < (3, 10) => "--clear-app-data",
            _ => "--reset-app-data",
        }
    }
}
