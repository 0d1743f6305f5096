use crate::error::ShellError;
use crate::parser::{RedirectKind, Redirects};
use os_pipe::{PipeReader, PipeWriter};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::Path;
use std::process::Stdio;

/// Where a command reads its standard input from.
#[derive(Debug)]
pub enum Input {
    /// The session's own standard input.
    Inherit,
    /// Read end of a pipe fed by the previous pipeline stage.
    Pipe(PipeReader),
}

impl Input {
    /// Convert this input into a [`Stdio`] handle suitable for `std::process::Command`.
    pub fn stdio(self) -> Stdio {
        match self {
            Input::Inherit => Stdio::inherit(),
            Input::Pipe(reader) => reader.into(),
        }
    }

    /// Convert this input into a reader for a builtin running in-process.
    pub fn reader(self) -> Box<dyn Read + Send> {
        match self {
            Input::Inherit => Box::new(io::stdin()),
            Input::Pipe(reader) => Box::new(reader),
        }
    }
}

/// Where a command writes one of its output streams.
#[derive(Debug)]
pub enum Output {
    /// The session's standard output.
    Stdout,
    /// The session's standard error.
    Stderr,
    /// Write end of a pipe read by the next pipeline stage.
    Pipe(PipeWriter),
    /// A redirection target opened for this invocation.
    File(File),
}

impl Output {
    pub fn stdio(self) -> Stdio {
        match self {
            Output::Stdout => Stdio::inherit(),
            Output::Stderr => Stdio::inherit(),
            Output::Pipe(writer) => writer.into(),
            Output::File(file) => file.into(),
        }
    }

    /// Convert this output into a writer; dropping the writer closes a pipe or file.
    pub fn writer(self) -> Box<dyn Write + Send> {
        match self {
            Output::Stdout => Box::new(io::stdout()),
            Output::Stderr => Box::new(io::stderr()),
            Output::Pipe(writer) => Box::new(writer),
            Output::File(file) => Box::new(file),
        }
    }
}

/// The three standard streams assigned to one command.
#[derive(Debug)]
pub struct StageIo {
    pub stdin: Input,
    pub stdout: Output,
    pub stderr: Output,
}

impl StageIo {
    /// Streams of the interactive session itself.
    pub fn inherited() -> Self {
        Self {
            stdin: Input::Inherit,
            stdout: Output::Stdout,
            stderr: Output::Stderr,
        }
    }
}

/// Opens a redirection target: truncating mode creates or empties the file,
/// append mode creates it if absent and writes at the end.
///
/// Relative paths are resolved against `cwd`, the session working directory.
pub fn open_target(path: &str, cwd: &Path, append: bool) -> Result<File, ShellError> {
    let mut options = OpenOptions::new();
    if append {
        options.append(true).create(true);
    } else {
        options.write(true).create(true).truncate(true);
    }
    options.open(cwd.join(path)).map_err(|source| ShellError::Redirect {
        path: path.to_string(),
        append,
        source,
    })
}

/// Opens every target named in `redirects` and returns the resulting
/// `(stdout, stderr)` streams.
///
/// All named files are created; when a stream has both a truncating and an
/// appending target, the truncating one receives the output.
pub fn open_redirects(redirects: &Redirects, cwd: &Path) -> Result<(Output, Output), ShellError> {
    let mut stdout = None;
    let mut stderr = None;
    // Append targets first, so a truncating target on the same stream replaces them.
    for kind in [
        RedirectKind::StdoutAppend,
        RedirectKind::StderrAppend,
        RedirectKind::StdoutTruncate,
        RedirectKind::StderrTruncate,
    ] {
        let Some(path) = redirects.get(kind) else {
            continue;
        };
        let file = open_target(path, cwd, kind.is_append())?;
        let slot = if kind.is_stdout() {
            &mut stdout
        } else {
            &mut stderr
        };
        *slot = Some(file);
    }
    Ok((
        stdout.map_or(Output::Stdout, Output::File),
        stderr.map_or(Output::Stderr, Output::File),
    ))
}
