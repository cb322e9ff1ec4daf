//! TOML job definition files.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::error::SbatchError;
use crate::directives::MailType;
use crate::module::ResolutionPolicy;

#[derive(Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum ArrayDef {
    Count(u32),
    Indices(Vec<u32>),
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(untagged)]
pub enum MailTypeDef {
    Single(MailType),
    Many(Vec<MailType>),
}

impl MailTypeDef {
    pub fn into_vec(self) -> Vec<MailType> {
        match self {
            MailTypeDef::Single(mail_type) => vec![mail_type],
            MailTypeDef::Many(mail_types) => mail_types,
        }
    }
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PythonDef {
    pub env_path: PathBuf,

    pub version: Option<String>,

    #[serde(default)]
    pub policy: ResolutionPolicy,

    #[serde(default)]
    pub packages: Vec<String>,

    pub requirements: Option<PathBuf>,

    #[serde(default)]
    pub modules: Vec<String>,

    #[serde(default)]
    pub delete_previous: bool,
}

#[derive(Deserialize, Debug, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct JobDef {
    pub mem: Option<String>,

    pub hours: Option<u32>,

    pub minutes: Option<u32>,

    pub name: Option<String>,

    #[serde(default)]
    pub name_parts: Vec<String>,

    pub separator: Option<String>,

    pub account: Option<String>,

    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub modules: Vec<String>,

    pub tasks_per_node: Option<u32>,

    pub array: Option<ArrayDef>,

    pub mail_user: Option<String>,

    pub mail_type: Option<MailTypeDef>,

    #[serde(default)]
    pub commands: Vec<String>,

    pub python: Option<PythonDef>,
}

impl JobDef {
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(minutes) = self.minutes {
            if minutes > 59 {
                return Err(SbatchError::InvalidMinutes(minutes));
            }
        }
        match &self.array {
            Some(ArrayDef::Count(0)) => return Err(SbatchError::EmptyArray),
            Some(ArrayDef::Indices(indices)) if indices.is_empty() => {
                return Err(SbatchError::EmptyArray);
            }
            _ => {}
        }
        if let Some(python) = &self.python {
            if python.env_path.as_os_str().is_empty() {
                return Err(SbatchError::DeserializationError(
                    "Attribute 'env_path' of [python] cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }

    pub fn parse(str: &str) -> crate::Result<JobDef> {
        let jdef: JobDef = toml::from_str(str)?;
        jdef.validate()?;
        Ok(jdef)
    }

    pub fn from_path(path: &Path) -> anyhow::Result<JobDef> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {}", path.display(), e))?;
        Ok(JobDef::parse(&data)?)
    }
}
