use anyhow::{Result, bail};
use std::collections::HashMap;
use std::env as stdenv;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Mutable, user-level view of the process environment used by the interpreter.
///
/// The environment contains:
/// - `vars`: the variables `set`/`get` operate on and every launched command inherits.
/// - `current_dir`: the working directory launched commands start in.
///
/// It is captured once at startup. From then on the interpreter only changes this copy,
/// and children are spawned with exactly these variables. Names and values are kept as
/// raw OS strings so variables that are not valid Unicode still reach children intact.
#[derive(Debug, Clone)]
pub struct Environment {
    /// Key-value store of environment variables (e.g., PATH, HOME).
    pub vars: HashMap<OsString, OsString>,
    /// The current working directory for command execution.
    pub current_dir: PathBuf,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars_os().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { vars, current_dir }
    }

    /// An environment with no variables, rooted at `current_dir`.
    pub fn empty(current_dir: impl Into<PathBuf>) -> Self {
        Self {
            vars: HashMap::new(),
            current_dir: current_dir.into(),
        }
    }

    /// Get the value of an environment variable.
    pub fn get_var(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    /// Set or override an environment variable.
    ///
    /// Fails when the name is empty or contains `=` or NUL, or when the value contains NUL;
    /// such pairs could never be handed to a child process.
    pub fn set_var(
        &mut self,
        key: impl Into<OsString>,
        val: impl Into<OsString>,
    ) -> Result<()> {
        let key = key.into();
        let val = val.into();
        validate_name(&key)?;
        if val.as_encoded_bytes().contains(&0) {
            bail!("value of {} contains a NUL byte", key.to_string_lossy());
        }
        self.vars.insert(key, val);
        Ok(())
    }

    /// Remove a variable. Removing a variable that is not set is not an error.
    pub fn remove_var(&mut self, key: &str) -> Result<()> {
        let key = OsStr::new(key);
        validate_name(key)?;
        self.vars.remove(key);
        Ok(())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_name(key: &OsStr) -> Result<()> {
    let bytes = key.as_encoded_bytes();
    if bytes.is_empty() {
        bail!("variable name is empty");
    }
    if bytes.contains(&b'=') || bytes.contains(&0) {
        bail!("invalid variable name: {key:?}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use std::env as stdenv;
    use std::ffi::{OsStr, OsString};
    use std::os::unix::ffi::OsStringExt;

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = Environment::empty(stdenv::current_dir().unwrap());

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE").unwrap();

        assert_eq!(env.get_var("KEY"), Some(OsStr::new("VALUE")));
    }

    #[test]
    fn test_env_remove_var() {
        let mut env = Environment::empty(".");
        env.set_var("KEY", "VALUE").unwrap();
        env.remove_var("KEY").unwrap();
        assert_eq!(env.get_var("KEY"), None);

        // removing twice is fine
        assert!(env.remove_var("KEY").is_ok());
    }

    #[test]
    fn test_env_rejects_bad_names() {
        let mut env = Environment::empty(".");
        assert!(env.set_var("", "x").is_err());
        assert!(env.set_var("A=B", "x").is_err());
        assert!(env.set_var("A\0", "x").is_err());
        assert!(env.set_var("A", "x\0y").is_err());
        assert!(env.remove_var("A=B").is_err());
        assert!(env.vars.is_empty());
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
        assert_eq!(env.vars.len(), stdenv::vars_os().count());
    }

    #[test]
    fn test_env_keeps_non_unicode_values() {
        let mut env = Environment::empty(".");
        let raw = OsString::from_vec(vec![b'a', 0xff, 0xfe]);
        env.set_var("RAW", raw.clone()).unwrap();
        assert_eq!(env.get_var("RAW"), Some(raw.as_os_str()));
        assert!(env.set_var("RAW", OsString::from_vec(vec![0xff, 0])).is_err());
    }
}
