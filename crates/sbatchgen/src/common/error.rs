use thiserror::Error;

#[derive(Debug, Error)]
pub enum SbatchError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Memory value is empty. You need to specify a memory value.")]
    MissingMemorySpecification,
    #[error("Minutes must be between 0 and 59, got {0}")]
    InvalidMinutes(u32),
    #[error("Array job needs at least one run")]
    EmptyArray,
    #[error("Version {0} was not found in the module system")]
    VersionNotFound(String),
    #[error("Provisioning step `{step}` failed with exit code {code}\nStderr: {stderr}")]
    ProvisioningFailure {
        step: ProvisionStep,
        code: i32,
        stderr: String,
    },
    #[error("Cannot determine the current user, pass it explicitly or set USER")]
    MissingUser,
    #[error("Queue query failed: {0}")]
    QueueQueryFailed(String),
    #[error("Deserialization error: {0}")]
    DeserializationError(String),
    #[error("Error: {0}")]
    GenericError(String),
}

/// Named step of environment provisioning, used in errors and warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionStep {
    CreateEnvironment,
    InstallPackages,
}

impl std::fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProvisionStep::CreateEnvironment => "create environment",
            ProvisionStep::InstallPackages => "install packages",
        };
        f.write_str(name)
    }
}

/// A provisioning step that succeeded but wrote something to its error stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningWarning {
    pub step: ProvisionStep,
    pub stderr: String,
}

impl From<toml::de::Error> for SbatchError {
    fn from(error: toml::de::Error) -> Self {
        Self::DeserializationError(error.to_string())
    }
}
