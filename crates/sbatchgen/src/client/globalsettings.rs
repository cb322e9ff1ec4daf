use std::path::PathBuf;

use crate::common::shell::BashShell;

pub struct GlobalSettings {
    shell: PathBuf,
    module_namespace: String,
}

impl GlobalSettings {
    pub fn new(shell: PathBuf, module_namespace: String) -> Self {
        GlobalSettings {
            shell,
            module_namespace,
        }
    }

    /// Shell used for module queries, environment creation and package installation.
    pub fn shell(&self) -> BashShell {
        BashShell::new(self.shell.clone())
    }

    pub fn module_namespace(&self) -> &str {
        &self.module_namespace
    }
}
