//! External tool invocation with explicit argument vectors

use std::ffi::OsStr;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to execute `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

pub type Result<T> = std::result::Result<T, CommandError>;

/// Run a program and return its stdout, failing on a non-zero exit status.
pub async fn check_output<I, S>(program: &str, args: I, cwd: Option<&Path>) -> Result<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let args: Vec<S> = args.into_iter().collect();
    let command = display_command(program, &args);

    let mut cmd = Command::new(program);
    cmd.args(&args).kill_on_drop(true);
    if let Some(dir) = cwd {
        debug!(cwd = %dir.display(), "In directory");
        cmd.current_dir(dir);
    }
    debug!("$ {}", command);

    let output = cmd.output().await.map_err(|source| CommandError::Spawn {
        command: command.clone(),
        source,
    })?;

    if !output.status.success() {
        return Err(CommandError::Failed {
            command,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run a program for its side effects only
pub async fn check_call<I, S>(program: &str, args: I, cwd: Option<&Path>) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    check_output(program, args, cwd).await.map(|_| ())
}

fn display_command<S: AsRef<OsStr>>(program: &str, args: &[S]) -> String {
    std::iter::once(quote(program))
        .chain(args.iter().map(|arg| quote(&arg.as_ref().to_string_lossy())))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a string for safe use as a single POSIX shell word.
///
/// Words made only of `[A-Za-z0-9_@%+=:,./-]` are returned unchanged.
pub fn quote(word: &str) -> String {
    if word.is_empty() {
        return "''".to_string();
    }

    let safe = word
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_@%+=:,./-".contains(c));
    if safe {
        return word.to_string();
    }

    format!("'{}'", word.replace('\'', r#"'"'"'"#))
}
