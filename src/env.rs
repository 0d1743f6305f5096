use crate::history::CommandHistory;
use std::collections::HashMap;
use std::env as stdenv;
use std::path::PathBuf;

/// Session context owned by the interactive loop.
///
/// The environment contains:
/// - `vars`: a snapshot of the process environment (`PATH`, `HOME`, `HISTFILE`, ...).
/// - `current_dir`: the working directory for command execution.
/// - `should_exit`: set by the `exit` builtin; the loop stops after the current line.
/// - `history`: lines entered so far, with the flush cursor used by `history -a`
///   and by the exit path.
#[derive(Debug, Clone)]
pub struct Environment {
    pub vars: HashMap<String, String>,
    pub current_dir: PathBuf,
    pub should_exit: bool,
    pub history: CommandHistory,
}

impl Environment {
    /// Capture the current process state into a new `Environment` instance.
    pub fn new() -> Self {
        let vars = stdenv::vars().collect();
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            vars,
            current_dir,
            should_exit: false,
            history: CommandHistory::new(),
        }
    }

    /// Get the value of an environment variable.
    ///
    /// Looks up the key in `self.vars` first, falling back to `std::env::var`.
    pub fn get_var(&self, key: &str) -> Option<String> {
        self.vars
            .get(key)
            .cloned()
            .or_else(|| stdenv::var(key).ok())
    }

    /// Set or override an environment variable in `self.vars`.
    pub fn set_var(&mut self, key: impl Into<String>, val: impl Into<String>) {
        self.vars.insert(key.into(), val.into());
    }

    /// Directories searched for executables, as the raw `PATH` value.
    pub fn search_paths(&self) -> String {
        self.get_var("PATH").unwrap_or_default()
    }

    /// File the history is loaded from and flushed to, taken from `HISTFILE`.
    pub fn history_file(&self) -> Option<PathBuf> {
        self.get_var("HISTFILE")
            .filter(|path| !path.is_empty())
            .map(PathBuf::from)
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use crate::env::Environment;
    use crate::history::CommandHistory;
    use std::collections::HashMap;
    use std::env as stdenv;

    fn empty_env() -> Environment {
        Environment {
            vars: HashMap::new(),
            current_dir: stdenv::current_dir().unwrap(),
            should_exit: false,
            history: CommandHistory::new(),
        }
    }

    #[test]
    fn test_env_set_and_get_var() {
        let mut env = empty_env();

        // initially absent
        assert_eq!(env.get_var("SOME_RANDOM_ENV_VAR_12345"), None);

        env.set_var("KEY", "VALUE");

        assert_eq!(env.get_var("KEY"), Some("VALUE".to_string()));
    }

    #[test]
    fn test_env_reads_from_process_env() {
        let env = Environment::new();
        assert!(env.get_var("PATH").is_some());
        assert!(!env.search_paths().is_empty());
    }

    #[test]
    fn test_history_file_from_var() {
        let mut env = empty_env();
        env.set_var("HISTFILE", "");
        assert_eq!(env.history_file(), None);
        env.set_var("HISTFILE", "/tmp/hist");
        assert_eq!(env.history_file(), Some("/tmp/hist".into()));
    }
}
