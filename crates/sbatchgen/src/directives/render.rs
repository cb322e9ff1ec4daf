use std::fmt::{Display, Write};

use itertools::Itertools;

use crate::common::error::SbatchError;
use crate::common::shell::quote_path;
use crate::common::utils::fs::absolute_path;
use crate::common::utils::str::is_blank;
use crate::directives::{JobDirectives, JobKind};
use crate::module::load_command;

/// Marker that starts every scheduler directive line.
pub const SBATCH_PREFIX: &str = "#SBATCH";

/// Folder inside the working directory that receives Slurm logs.
const OUTPUT_FOLDER: &str = "output";

/// Collapses runs of newlines into a single newline.
///
/// Optional directives render as empty lines when they do not apply.
pub fn collapse_blank_lines(text: &str) -> String {
    let mut result = text.to_string();
    while result.contains("\n\n") {
        result = result.replace("\n\n", "\n");
    }
    result
}

impl JobDirectives {
    /// Overrides the job name with `components` joined by `separator` and renders the directives.
    /// An empty `components` keeps the configured name.
    pub fn render_named<T: Display>(
        &mut self,
        components: &[T],
        separator: &str,
    ) -> crate::Result<String> {
        if !components.is_empty() {
            self.identity.components = components.iter().map(|c| c.to_string()).collect();
            self.identity.separator = separator.to_string();
        }
        self.render()
    }

    /// Renders the directive preamble followed by the environment setup commands.
    pub fn render(&self) -> crate::Result<String> {
        if is_blank(&self.resources.memory) {
            return Err(SbatchError::MissingMemorySpecification);
        }

        let name = self.identity.effective_name();
        let placeholder = self.shape.placeholder();
        let working_dir = absolute_path(self.working_dir.clone());
        let output_dir = working_dir.join(OUTPUT_FOLDER);
        let directive = |value: String| format!("{SBATCH_PREFIX} {value}");

        let header = [
            "#!/bin/bash".to_string(),
            directive(format!("--time={}", self.resources.time_limit())),
            self.identity
                .account
                .as_ref()
                .map(|account| directive(format!("--account={account}")))
                .unwrap_or_default(),
            directive(format!("--mem={}", self.resources.memory.trim())),
            self.shape
                .array_range()
                .map(|range| directive(format!("--array={range}")))
                .unwrap_or_default(),
            self.resources
                .tasks_per_node
                .map(|tasks| directive(format!("--ntasks-per-node={tasks}")))
                .unwrap_or_default(),
            self.notification
                .recipient
                .as_ref()
                .map(|recipient| directive(format!("--mail-user={recipient}")))
                .unwrap_or_default(),
            self.notification
                .recipient
                .as_ref()
                .map(|_| {
                    directive(format!(
                        "--mail-type={}",
                        self.notification.events().iter().join(",")
                    ))
                })
                .unwrap_or_default(),
            directive(format!(
                "--output={}/slurm_{placeholder}_{name}.out",
                output_dir.display()
            )),
            directive(format!("--job-name={name}_{placeholder}")),
        ]
        .join("\n");

        let mut script = collapse_blank_lines(&header);
        script.push_str("\n\n");
        writeln!(script, "mkdir -p {}", quote_path(&output_dir)).unwrap();

        let namespace = self.module_namespace.as_str();
        let runtime_modules = match &self.kind {
            JobKind::Base => vec![],
            JobKind::Interpreter(env) => env.activation_modules(namespace),
        };
        let modules = self
            .modules
            .iter()
            .map(String::as_str)
            .chain(runtime_modules);
        if let Some(load) = load_command(modules) {
            writeln!(script, "{load}").unwrap();
        }
        if let JobKind::Interpreter(env) = &self.kind {
            writeln!(script, "{}", env.activate_command()).unwrap();
        }
        Ok(script)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::collapse_blank_lines;
    use crate::common::error::SbatchError;
    use crate::directives::{
        JobDirectives, JobIdentity, JobResources, MailType, NotificationPolicy, SchedulingShape,
    };
    use crate::module::RuntimeVersion;
    use crate::runtime::RuntimeEnvironment;

    fn simple_job() -> JobDirectives {
        JobDirectives::new(
            JobResources::new("4G", 2, 0).unwrap(),
            JobIdentity::new("train"),
            PathBuf::from("/home/user/project"),
        )
        .with_modules(vec!["python".to_string()])
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\nb\n\nc"), "a\nb\nc");
        assert_eq!(collapse_blank_lines("a\nb"), "a\nb");
    }

    #[test]
    fn test_render_single_run() {
        let text = simple_job().render().unwrap();
        insta::assert_snapshot!(text, @r###"
#!/bin/bash
#SBATCH --time=2:00:00
#SBATCH --mem=4G
#SBATCH --output=/home/user/project/output/slurm_%j_train.out
#SBATCH --job-name=train_%j

mkdir -p /home/user/project/output
module load python
"###);
    }

    #[test]
    fn test_first_directive_is_time() {
        let text = simple_job().render().unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("#!/bin/bash"));
        assert_eq!(lines.next(), Some("#SBATCH --time=2:00:00"));
        let output = text
            .lines()
            .find(|line| line.starts_with("#SBATCH --output="))
            .unwrap();
        assert!(output.ends_with("_%j_train.out"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let job = simple_job().with_shape(SchedulingShape::indices([2, 5, 9]).unwrap());
        assert_eq!(job.render().unwrap(), job.clone().render().unwrap());
    }

    #[test]
    fn test_empty_memory_fails() {
        for memory in ["", "  "] {
            let mut job = simple_job()
                .with_shape(SchedulingShape::count(3).unwrap())
                .with_notification(NotificationPolicy::new(
                    Some("user@example.org".to_string()),
                    [MailType::All],
                ));
            job.resources.memory = memory.to_string();
            assert!(matches!(
                job.render(),
                Err(SbatchError::MissingMemorySpecification)
            ));
            assert!(matches!(
                job.render_named(&["a", "b"], "_"),
                Err(SbatchError::MissingMemorySpecification)
            ));
        }
    }

    #[test]
    fn test_array_directives() {
        let text = simple_job()
            .with_shape(SchedulingShape::indices([2, 5, 9]).unwrap())
            .render()
            .unwrap();
        assert!(text.contains("#SBATCH --array=2,5,9\n"));
        assert!(text.contains("#SBATCH --job-name=train_%A_%a\n"));
        assert!(text.contains("/output/slurm_%A_%a_train.out\n"));

        let text = simple_job()
            .with_shape(SchedulingShape::count(4).unwrap())
            .render()
            .unwrap();
        assert!(text.contains("#SBATCH --array=1-4\n"));
    }

    #[test]
    fn test_minutes_rendering() {
        let mut job = simple_job();
        job.resources = JobResources::new("4G", 3, 45).unwrap();
        assert!(job.render().unwrap().contains("#SBATCH --time=3:45:00\n"));
    }

    #[test]
    fn test_render_named_overrides_name() {
        let mut job = simple_job();
        let text = job.render_named(&["sim", "lr", "0.1"], "-").unwrap();
        assert!(text.contains("#SBATCH --job-name=sim-lr-0.1_%j\n"));
        assert_eq!(job.identity.effective_name(), "sim-lr-0.1");

        let empty: [&str; 0] = [];
        let text = job.render_named(&empty, "_").unwrap();
        assert!(text.contains("#SBATCH --job-name=sim-lr-0.1_%j\n"));
    }

    #[test]
    fn test_render_full_interpreter_job() {
        let mut env = RuntimeEnvironment::new(
            PathBuf::from("/home/user/envs/sim"),
            RuntimeVersion::Module("python/3.11.5".to_string()),
        );
        env.modules = vec!["scipy-stack".to_string()];
        let mut resources = JobResources::new("16G", 12, 30).unwrap();
        resources.tasks_per_node = Some(4);

        let mut job = JobDirectives::new(
            resources,
            JobIdentity::new("ignored").with_account(Some("def-houghten".to_string())),
            PathBuf::from("/home/user/project"),
        )
        .with_shape(SchedulingShape::indices([2, 5, 9]).unwrap())
        .with_notification(NotificationPolicy::new(
            Some("user@example.org".to_string()),
            [MailType::End, MailType::Fail],
        ))
        .with_modules(vec!["gcc".to_string(), "python/3.11.5".to_string()])
        .with_runtime(env);

        let text = job.render_named(&["sim", "lr", "0.1"], "_").unwrap();
        insta::assert_snapshot!(text, @r###"
#!/bin/bash
#SBATCH --time=12:30:00
#SBATCH --account=def-houghten
#SBATCH --mem=16G
#SBATCH --array=2,5,9
#SBATCH --ntasks-per-node=4
#SBATCH --mail-user=user@example.org
#SBATCH --mail-type=END,FAIL
#SBATCH --output=/home/user/project/output/slurm_%A_%a_sim_lr_0.1.out
#SBATCH --job-name=sim_lr_0.1_%A_%a

mkdir -p /home/user/project/output
module load gcc python/3.11.5 scipy-stack
source /home/user/envs/sim/bin/activate
"###);
    }

    #[test]
    fn test_render_loads_prerequisites_before_interpreter() {
        let env = RuntimeEnvironment::new(
            PathBuf::from("/home/user/envs/sim"),
            RuntimeVersion::Module("python/3.10.9".to_string()),
        )
        .with_prerequisites(vec!["StdEnv/2020".to_string()]);
        let text = JobDirectives::new(
            JobResources::new("4G", 1, 0).unwrap(),
            JobIdentity::new("sim"),
            PathBuf::from("/home/user/project"),
        )
        .with_runtime(env)
        .render()
        .unwrap();
        assert!(text.contains("\nmodule load StdEnv/2020 python/3.10.9\n"));
        assert!(text.ends_with("source /home/user/envs/sim/bin/activate\n"));
    }

    #[test]
    fn test_mail_requires_recipient() {
        let text = simple_job()
            .with_notification(NotificationPolicy::new(None, [MailType::All]))
            .render()
            .unwrap();
        assert!(!text.contains("--mail"));
    }
}
