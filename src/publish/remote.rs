//! Push seam between the local report store and the remote wiki.
//!
//! The core only produces a valid local tree; getting it onto the wiki
//! (typically a commit and push of a git-backed wiki) is delegated.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, bail};
use shlex::Shlex;

use crate::{ReportError, ReportResult};

/// Something that can publish the local store to the wiki.
pub trait WikiRemote {
    fn describe(&self) -> String;

    /// Push the store rooted at `store_root` with a change message.
    fn push(&self, store_root: &Path, message: &str) -> ReportResult<()>;
}

/// Keeps the store local.
#[derive(Debug, Clone, Default)]
pub struct NoopRemote;

impl WikiRemote for NoopRemote {
    fn describe(&self) -> String {
        "local only".to_string()
    }

    fn push(&self, store_root: &Path, _message: &str) -> ReportResult<()> {
        tracing::debug!(store = %store_root.display(), "no push command configured");
        Ok(())
    }
}

/// Runs a user-supplied command template.
///
/// The template is split with shell quoting rules. An argument that is
/// exactly `{store}` or `{message}` is replaced by the raw value. Inside a
/// longer argument, such as a `sh -c` script, the value is inserted
/// shell-quoted, so placeholders there must not be quoted again. Example:
/// `sh -c "cd {store} && git add -A && git commit -m {message} && git push"`.
///
/// The values are also exported as `REPORT_WIKI_STORE` and
/// `REPORT_WIKI_MESSAGE`.
#[derive(Debug, Clone)]
pub struct CommandRemote {
    pub command_template: String,
}

impl CommandRemote {
    pub fn new(command_template: impl Into<String>) -> Self {
        CommandRemote {
            command_template: command_template.into(),
        }
    }

    fn build_command(&self, store_root: &Path, message: &str) -> anyhow::Result<Command> {
        let mut parts: Vec<String> = Shlex::new(&self.command_template).collect();
        if parts.is_empty() {
            bail!("empty push command template");
        }
        let store = store_root.to_string_lossy();
        for p in &mut parts {
            *p = substitute(p, &store, message)?;
        }
        let mut cmd = Command::new(&parts[0]);
        cmd.args(&parts[1..])
            .current_dir(store_root)
            .env("REPORT_WIKI_STORE", store_root)
            .env("REPORT_WIKI_MESSAGE", message);
        Ok(cmd)
    }

    fn run(&self, store_root: &Path, message: &str) -> anyhow::Result<()> {
        let mut cmd = self.build_command(store_root, message)?;
        let output = cmd
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to spawn push command `{}`", self.command_template))?;
        if !output.status.success() {
            bail!(
                "push command failed: status={} stderr={}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

impl WikiRemote for CommandRemote {
    fn describe(&self) -> String {
        format!("command `{}`", self.command_template)
    }

    fn push(&self, store_root: &Path, message: &str) -> ReportResult<()> {
        tracing::info!(store = %store_root.display(), "pushing report store");
        self.run(store_root, message).map_err(ReportError::from)
    }
}

fn substitute(arg: &str, store: &str, message: &str) -> anyhow::Result<String> {
    match arg {
        "{store}" => return Ok(store.to_string()),
        "{message}" => return Ok(message.to_string()),
        _ => {}
    }
    if !arg.contains("{store}") && !arg.contains("{message}") {
        return Ok(arg.to_string());
    }
    let store = shlex::try_quote(store).context("store path cannot be shell-quoted")?;
    let message = shlex::try_quote(message).context("push message cannot be shell-quoted")?;
    Ok(fill(arg, &[("{store}", &store), ("{message}", &message)]))
}

/// Replace placeholders in one left-to-right pass, so inserted values are
/// never scanned again.
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    loop {
        let next = values
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|i| (i, *key, *value)))
            .min_by_key(|(i, _, _)| *i);
        match next {
            Some((i, key, value)) => {
                out.push_str(&rest[..i]);
                out.push_str(value);
                rest = &rest[i + key.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}

/// Remote for an optional push command.
pub fn remote_for(push_command: Option<&str>) -> Box<dyn WikiRemote> {
    match push_command.map(str::trim).filter(|c| !c.is_empty()) {
        Some(command) => Box::new(CommandRemote::new(command)),
        None => Box::new(NoopRemote),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_placeholders_replaced_per_argument() {
        let remote = CommandRemote::new("git -C {store} commit -m \"{message}\"");
        let cmd = remote
            .build_command(Path::new("/tmp/wiki"), "Publish main #42")
            .unwrap();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(cmd.get_program(), "git");
        assert_eq!(args, vec!["-C", "/tmp/wiki", "commit", "-m", "Publish main #42"]);
    }

    #[test]
    fn test_whole_argument_placeholder_is_not_quoted() {
        let message = "Publish x'; touch pwned; ' run 1";
        let cmd = CommandRemote::new("git commit -m {message}")
            .build_command(Path::new("/tmp/wiki"), message)
            .unwrap();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["commit", "-m", message]);
    }

    #[test]
    fn test_fill_does_not_rescan_values() {
        let out = fill("{a}-{b}", &[("{a}", "{b}"), ("{b}", "x")]);
        assert_eq!(out, "{b}-x");
    }

    #[test]
    fn test_nul_byte_in_embedded_value_is_error() {
        let remote = CommandRemote::new("sh -c \"echo {message}\"");
        assert!(remote.build_command(Path::new("."), "a\0b").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_hostile_message_stays_one_shell_word() {
        let dir = tempfile::tempdir().unwrap();
        let message = "Publish feature/x'; touch pwned; ' run 1 $(touch pwned2) `touch pwned3`";
        CommandRemote::new("sh -c \"printf %s {message} > out.txt\"")
            .push(dir.path(), message)
            .unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("out.txt")).unwrap(), message);
        for name in ["pwned", "pwned2", "pwned3"] {
            assert!(!dir.path().join(name).exists(), "{name} was created");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_values_exported_to_environment() {
        let dir = tempfile::tempdir().unwrap();
        CommandRemote::new("sh -c 'printf %s \"$REPORT_WIKI_MESSAGE\" > env.txt'")
            .push(dir.path(), "it's done")
            .unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("env.txt")).unwrap(), "it's done");
    }

    #[test]
    fn test_empty_template_is_error() {
        assert!(CommandRemote::new("   ").build_command(Path::new("."), "m").is_err());
    }

    #[test]
    fn test_remote_for() {
        assert_eq!(remote_for(None).describe(), "local only");
        assert_eq!(remote_for(Some("  ")).describe(), "local only");
        assert!(remote_for(Some("true")).describe().contains("true"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failing_command_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CommandRemote::new("true").push(dir.path(), "m").is_ok());
        let err = CommandRemote::new("false").push(dir.path(), "m").unwrap_err();
        assert!(err.to_string().contains("push command failed"));
    }
}
