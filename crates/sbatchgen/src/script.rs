//! Final script assembly: directive preamble plus transformed user commands.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::common::utils::fs::parent_dir;

pub const DEFAULT_SCRIPT_NAME: &str = "sbatch.sh";
pub const DEFAULT_INTERPRETER: &str = "python";

/// Flag that disables stdout/stderr buffering of the interpreter.
const UNBUFFERED_FLAG: &str = "-u";

/// Joins the rendered directives with `commands`, one command per line.
pub fn assemble<S: AsRef<str>>(directives: &str, commands: &[S], interpreter: &str) -> String {
    let mut script = String::with_capacity(directives.len() + 64 * commands.len());
    script.push_str(directives);
    script.push('\n');
    for command in commands {
        script.push_str(&transform_command(command.as_ref(), interpreter));
        script.push('\n');
    }
    script
}

pub fn transform_command(command: &str, interpreter: &str) -> String {
    quote_positional_params(&add_unbuffered_flag(command, interpreter))
}

/// `python script.py` becomes `python -u script.py`.
/// Invocations that already start with a flag are left untouched, since
/// jobs are often killed and buffered output would be lost.
pub fn add_unbuffered_flag(command: &str, interpreter: &str) -> String {
    if let Some(rest) = command
        .strip_prefix(interpreter)
        .and_then(|rest| rest.strip_prefix(' '))
    {
        if rest.chars().next().is_some_and(|c| c != '-') {
            return format!("{interpreter} {UNBUFFERED_FLAG} {rest}");
        }
    }
    command.to_string()
}

/// Wraps positional parameters (`$1`, `$12`) in double quotes so that the
/// job shell neither splits nor globs them.
///
/// Parameters that are already inside double or single quotes are kept as
/// they are and a doubled quote (`""$1""`) is collapsed to `"$1"`.
pub fn quote_positional_params(command: &str) -> String {
    let command = collapse_doubled_quotes(command);
    let chars: Vec<char> = command.chars().collect();
    let mut result = String::with_capacity(command.len() + 8);
    let mut in_double = false;
    let mut in_single = false;
    let mut index = 0;

    while index < chars.len() {
        let c = chars[index];
        match c {
            '\\' if !in_single => {
                result.push(c);
                if let Some(next) = chars.get(index + 1) {
                    result.push(*next);
                    index += 1;
                }
            }
            '"' if !in_single => {
                in_double = !in_double;
                result.push(c);
            }
            '\'' if !in_double => {
                in_single = !in_single;
                result.push(c);
            }
            '$' if !in_double && !in_single => {
                let digits = positional_digits(&chars[index + 1..]);
                if digits == 0 {
                    result.push(c);
                } else {
                    result.push('"');
                    result.extend(&chars[index..=index + digits]);
                    result.push('"');
                    index += digits;
                }
            }
            _ => result.push(c),
        }
        index += 1;
    }
    result
}

fn positional_digits(rest: &[char]) -> usize {
    rest.iter().take_while(|c| c.is_ascii_digit()).count()
}

/// Replaces `""$N""` with `"$N"`.
fn collapse_doubled_quotes(command: &str) -> String {
    let chars: Vec<char> = command.chars().collect();
    let mut result = String::with_capacity(command.len());
    let mut index = 0;
    while index < chars.len() {
        if chars[index..].starts_with(&['"', '"', '$']) {
            let digits = positional_digits(&chars[index + 3..]);
            let end = index + 3 + digits;
            if digits > 0 && chars[end..].starts_with(&['"', '"']) {
                result.push('"');
                result.extend(&chars[index + 2..end]);
                result.push('"');
                index = end + 2;
                continue;
            }
        }
        result.push(chars[index]);
        index += 1;
    }
    result
}

/// Writes `script` to `path`. The content is written to a temporary file next
/// to the target first, so the target never contains a partial script.
pub fn write_script(path: &Path, script: &str) -> crate::Result<()> {
    let mut file = NamedTempFile::new_in(parent_dir(path))?;
    file.write_all(script.as_bytes())?;
    file.flush()?;
    file.persist(path).map_err(|error| error.error)?;
    log::debug!("Script written to {}", path.display());
    Ok(())
}
