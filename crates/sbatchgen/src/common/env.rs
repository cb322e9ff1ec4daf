macro_rules! create_sbatchgen_env {
    ($name: literal) => {
        concat!("SBATCHGEN_", $name)
    };
}

/// Known environment variables
pub const SBATCHGEN_ACCOUNT: &str = create_sbatchgen_env!("ACCOUNT");
pub const SBATCHGEN_MAIL_USER: &str = create_sbatchgen_env!("MAIL_USER");
pub const SBATCHGEN_SHELL: &str = create_sbatchgen_env!("SHELL");
pub const SBATCHGEN_MODULE_NAMESPACE: &str = create_sbatchgen_env!("MODULE_NAMESPACE");

/// Identity of the user that owns queued jobs, set by the login shell.
pub const USER: &str = "USER";

pub fn current_user() -> Option<String> {
    std::env::var(USER).ok().filter(|user| !user.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::{SBATCHGEN_ACCOUNT, SBATCHGEN_MODULE_NAMESPACE};

    #[test]
    fn test_env_names() {
        assert_eq!(SBATCHGEN_ACCOUNT, "SBATCHGEN_ACCOUNT");
        assert_eq!(SBATCHGEN_MODULE_NAMESPACE, "SBATCHGEN_MODULE_NAMESPACE");
    }
}
