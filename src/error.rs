use std::io;
use thiserror::Error;

/// Failures that abort the current input line but never the session.
#[derive(Debug, Error)]
pub enum ShellError {
    /// No builtin and no executable on `PATH` matches the name.
    #[error("{0}: command not found")]
    CommandNotFound(String),

    /// A redirection target could not be created (`>`) or opened for appending (`>>`).
    #[error("Error {} file {path}: {source}", open_verb(.append))]
    Redirect {
        path: String,
        append: bool,
        #[source]
        source: io::Error,
    },

    #[error("Error creating pipe: {0}")]
    Pipe(#[source] io::Error),

    #[error("Error starting command {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn open_verb(append: &bool) -> &'static str {
    if *append { "opening" } else { "creating" }
}

impl ShellError {
    /// `command not found` goes to standard output, everything else to standard error.
    pub fn reports_on_stdout(&self) -> bool {
        matches!(self, ShellError::CommandNotFound(_))
    }
}
