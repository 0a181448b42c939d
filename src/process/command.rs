//! Description of the command to spawn

use crate::result::ExpectError;
use portable_pty::CommandBuilder;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

/// Program, arguments, environment and working directory for a spawn.
///
/// Anything not set is inherited from the current process: the environment
/// starts as a copy of ours, and the working directory is ours unless
/// [`Command::cwd`] is given.
#[derive(Debug, Clone)]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,
    env: Vec<(OsString, OsString)>,
    env_remove: Vec<OsString>,
    cwd: Option<PathBuf>,
}

impl Command {
    /// Command running `program` with no arguments
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: Vec::new(),
            env_remove: Vec::new(),
            cwd: None,
        }
    }

    /// Split a command line on whitespace into program and arguments.
    ///
    /// No shell quoting is interpreted; use [`Command::arg`] for arguments
    /// containing spaces.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectError::SpawnError`] if the line is empty.
    pub fn parse(line: &str) -> Result<Self, ExpectError> {
        let mut parts = line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| ExpectError::SpawnError("Empty command".to_string()))?;

        let mut command = Command::new(program);
        command.args(parts);
        Ok(command)
    }

    /// Append one argument
    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Append several arguments
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    /// Set or override an environment variable
    pub fn env(&mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> &mut Self {
        self.env
            .push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Remove an inherited environment variable
    pub fn env_remove(&mut self, key: impl AsRef<OsStr>) -> &mut Self {
        self.env_remove.push(key.as_ref().to_owned());
        self
    }

    /// Working directory of the child
    pub fn cwd(&mut self, dir: impl AsRef<Path>) -> &mut Self {
        self.cwd = Some(dir.as_ref().to_owned());
        self
    }

    /// Program to run
    pub fn program(&self) -> &OsStr {
        &self.program
    }

    /// Arguments, not including the program
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub(crate) fn to_builder(&self) -> CommandBuilder {
        let mut builder = CommandBuilder::new(&self.program);
        builder.args(&self.args);

        for key in &self.env_remove {
            builder.env_remove(key);
        }
        for (key, value) in &self.env {
            builder.env(key, value);
        }
        if let Some(cwd) = &self.cwd {
            builder.cwd(cwd);
        }

        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_splits_whitespace() {
        let command = Command::parse("  sh -c   true ").unwrap();
        assert_eq!(command.program(), "sh");
        assert_eq!(command.get_args(), &["-c", "true"]);
    }

    #[test]
    fn test_parse_empty() {
        assert!(matches!(
            Command::parse("   "),
            Err(ExpectError::SpawnError(_))
        ));
    }

    #[test]
    fn test_builder_carries_env_and_cwd() {
        let mut command = Command::new("env");
        command
            .arg("-0")
            .env("EXPECTRUST_TEST", "1")
            .env_remove("HOME")
            .cwd("/tmp");

        let builder = command.to_builder();
        assert_eq!(builder.get_argv(), &["env", "-0"]);
        assert_eq!(builder.get_env("EXPECTRUST_TEST"), Some(OsStr::new("1")));
        assert_eq!(builder.get_env("HOME"), None);
        assert_eq!(builder.get_cwd(), Some(&OsString::from("/tmp")));
    }
}
