//! Discovery of interpreter versions and their prerequisite modules.
//!
//! The module system is only reachable through its advisory text output,
//! so everything here is a best-effort scrape hidden behind [`ModuleQuery`].
//! A structured backend can replace [`LmodResolver`] without touching
//! rendering or provisioning.

mod spider;

pub use spider::{PREREQUISITE_MARKER, parse_prerequisites, parse_version_lines};

use itertools::Itertools;
use serde::Deserialize;

use crate::common::error::SbatchError;
use crate::common::shell::{ShellRunner, quote};

/// Module namespace of the interpreter managed by this tool.
pub const DEFAULT_MODULE_NAMESPACE: &str = "python";

/// Interpreter version bound to an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeVersion {
    /// Whatever the module system loads for the bare namespace.
    SystemDefault,
    /// Full module name, e.g. `python/3.10.9`.
    Module(String),
}

impl RuntimeVersion {
    /// Builds a version from a request that was not confirmed by the module system.
    pub fn literal(namespace: &str, requested: &str) -> Self {
        let requested = requested.trim();
        if requested.starts_with(&format!("{namespace}/")) {
            RuntimeVersion::Module(requested.to_string())
        } else {
            RuntimeVersion::Module(format!("{namespace}/{requested}"))
        }
    }

    /// Name passed to `module load`.
    pub fn module_name<'a>(&'a self, namespace: &'a str) -> &'a str {
        match self {
            RuntimeVersion::SystemDefault => namespace,
            RuntimeVersion::Module(name) => name,
        }
    }

    /// Numeric part of the module name (`python/3.10.9` -> `3.10.9`).
    pub fn number(&self) -> Option<&str> {
        match self {
            RuntimeVersion::SystemDefault => None,
            RuntimeVersion::Module(name) => Some(name.rsplit('/').next().unwrap_or(name)),
        }
    }

    /// Parsed `(major, minor)` pair, if the version looks numeric.
    pub fn major_minor(&self) -> Option<(u32, u32)> {
        let mut parts = self.number()?.split('.');
        let major = parts.next()?.trim().parse().ok()?;
        let minor = parts
            .next()
            .map(|minor| {
                let digits: String = minor.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().ok()
            })
            .unwrap_or(Some(0))?;
        Some((major, minor))
    }
}

impl std::fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeVersion::SystemDefault => f.write_str("system default"),
            RuntimeVersion::Module(name) => f.write_str(name),
        }
    }
}

/// What to do when a requested version is not listed by the module system.
#[derive(clap::ValueEnum, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Fail with `VersionNotFound`.
    #[default]
    Strict,
    /// Use the requested string as the version.
    Lenient,
}

/// Result of resolving a version together with its prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleQueryResult {
    pub version: RuntimeVersion,
    pub prerequisites: Vec<String>,
}

pub trait ModuleQuery {
    /// Module namespace of the interpreter (`python`).
    fn namespace(&self) -> &str;

    /// Resolves a (possibly partial) version request to a concrete module.
    /// An empty or missing request resolves to [`RuntimeVersion::SystemDefault`].
    fn resolve_version(&self, requested: Option<&str>) -> crate::Result<RuntimeVersion>;

    /// Modules that have to be loaded before `version` can be loaded.
    /// Never fails because of unexpected advisory text, it returns an empty list instead.
    fn resolve_prerequisite_modules(&self, version: &str) -> crate::Result<Vec<String>>;

    fn resolve_with_policy(
        &self,
        requested: Option<&str>,
        policy: ResolutionPolicy,
    ) -> crate::Result<RuntimeVersion> {
        match self.resolve_version(requested) {
            Err(SbatchError::VersionNotFound(version)) if policy == ResolutionPolicy::Lenient => {
                let version = RuntimeVersion::literal(self.namespace(), &version);
                log::warn!("Version was not found in the module listing, using `{version}` as is");
                Ok(version)
            }
            result => result,
        }
    }

    fn query(&self, version: RuntimeVersion) -> crate::Result<ModuleQueryResult> {
        let prerequisites = match &version {
            RuntimeVersion::SystemDefault => vec![],
            RuntimeVersion::Module(name) => self.resolve_prerequisite_modules(name)?,
        };
        Ok(ModuleQueryResult {
            version,
            prerequisites,
        })
    }
}

/// Returns a `module load` line for `modules`, skipping empty names and repeated modules.
pub fn load_command<'a>(modules: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let modules = modules
        .into_iter()
        .map(str::trim)
        .filter(|module| !module.is_empty())
        .unique()
        .map(quote)
        .join(" ");
    if modules.is_empty() {
        None
    } else {
        Some(format!("module load {modules}"))
    }
}

/// Scrapes `module spider` output of an Lmod installation.
pub struct LmodResolver<S> {
    shell: S,
    namespace: String,
}

impl<S: ShellRunner> LmodResolver<S> {
    pub fn new(shell: S, namespace: String) -> Self {
        Self { shell, namespace }
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    fn spider(&self, target: &str) -> crate::Result<String> {
        let output = self.shell.run(&format!("module spider {target}\n"))?;
        if !output.success() {
            log::debug!(
                "`module spider {target}` exited with {:?}: {}",
                output.code,
                output.stderr.trim()
            );
        }
        Ok(output.listing().to_string())
    }
}

impl<S: ShellRunner> ModuleQuery for LmodResolver<S> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn resolve_version(&self, requested: Option<&str>) -> crate::Result<RuntimeVersion> {
        let requested = match requested.map(str::trim) {
            None | Some("") => return Ok(RuntimeVersion::SystemDefault),
            Some(requested) => requested,
        };

        let listing = self.spider(&self.namespace)?;
        let version = parse_version_lines(&listing, &self.namespace, requested)
            .into_iter()
            .max()
            .and_then(|line| line.split_whitespace().next())
            .ok_or_else(|| SbatchError::VersionNotFound(requested.to_string()))?;
        log::debug!("Version request `{requested}` resolved to `{version}`");
        Ok(RuntimeVersion::Module(version.to_string()))
    }

    fn resolve_prerequisite_modules(&self, version: &str) -> crate::Result<Vec<String>> {
        let detail = self.spider(version)?;
        let modules = parse_prerequisites(&detail);
        log::debug!("Prerequisites of `{version}`: {modules:?}");
        Ok(modules)
    }
}
