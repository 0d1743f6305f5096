use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::external::find_executable;
use crate::interpreter::Factory;
use crate::io_adapters::StageIo;
use anyhow::{Result, bail};
use argh::{EarlyExit, FromArgs};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;

/// Names the shell answers itself instead of spawning a program.
pub const BUILTIN_NAMES: [&str; 6] = ["echo", "type", "exit", "pwd", "cd", "history"];

/// Builtins that may run as a stage of a pipeline.
pub const PIPELINE_BUILTINS: [&str; 2] = ["echo", "type"];

pub fn is_builtin(name: &str) -> bool {
    BUILTIN_NAMES.contains(&name)
}

/// Built-in commands known to the shell at compile time.
///
/// Builtins run in-process without spawning a child process. Most of them parse
/// their arguments with [`argh`].
pub(crate) trait BuiltinCommand: Sized + Send + 'static {
    /// Canonical name of the command, e.g. "echo" or "cd".
    fn name() -> &'static str;

    /// Builds the command from its arguments (without the command name).
    fn parse(args: &[&str]) -> Result<Self, EarlyExit>;

    /// Executes the command using provided IO streams and environment.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    /// An `Err` is printed on the command's error stream.
    fn execute(
        self,
        stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(self: Box<Self>, io: StageIo, env: &mut Environment) -> Result<ExitCode> {
        let mut stdin = io.stdin.reader();
        let mut stdout = io.stdout.writer();
        let result = <T as BuiltinCommand>::execute(*self, &mut stdin, &mut stdout, env);
        stdout.flush()?;
        match result {
            Ok(x) => Ok(x),
            // The reader of a pipeline went away; nothing left to report to.
            Err(e) if is_broken_pipe(&e) => Ok(1),
            Err(e) => {
                let mut stderr = io.stderr.writer();
                writeln!(stderr, "{e}")?;
                Ok(1)
            }
        }
    }
}

fn is_broken_pipe(err: &anyhow::Error) -> bool {
    err.downcast_ref::<io::Error>()
        .is_some_and(|e| e.kind() == io::ErrorKind::BrokenPipe)
}

/// Result of `--help` or of arguments `argh` rejected.
struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(self: Box<Self>, io: StageIo, _env: &mut Environment) -> Result<ExitCode> {
        let mut out = if self.is_error {
            io.stderr.writer()
        } else {
            io.stdout.writer()
        };
        writeln!(out, "{}", self.output.trim_end())?;
        Ok(if self.is_error { 1 } else { 0 })
    }
}

/// Stand-in for a builtin that cannot take part in a pipeline.
///
/// Reports the problem on its error stream and produces no output.
pub(crate) struct UnsupportedInPipeline {
    name: String,
}

impl ExecutableCommand for UnsupportedInPipeline {
    fn execute(self: Box<Self>, io: StageIo, _env: &mut Environment) -> Result<ExitCode> {
        let mut stderr = io.stderr.writer();
        writeln!(stderr, "{}: unsupported pipeline builtin", self.name)?;
        Ok(1)
    }
}

impl<T: BuiltinCommand> CommandFactory for Factory<T> {
    fn try_create(
        &self,
        _env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        if name == T::name() {
            Some(match T::parse(args) {
                Ok(cmd) => Box::new(cmd),
                Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                    output,
                    is_error: status.is_err(),
                }),
            })
        } else {
            None
        }
    }
}

/// Builds the payload of a builtin pipeline stage.
pub(crate) fn pipeline_builtin(
    env: &Environment,
    name: &str,
    args: &[&str],
) -> Box<dyn ExecutableCommand> {
    let created = match name {
        "echo" => Factory::<Echo>::default().try_create(env, name, args),
        "type" => Factory::<Type>::default().try_create(env, name, args),
        _ => None,
    };
    created.unwrap_or_else(|| {
        Box::new(UnsupportedInPipeline {
            name: name.to_string(),
        })
    })
}

#[derive(FromArgs)]
/// Print the current working directory to standard output.
pub struct Pwd {}

impl BuiltinCommand for Pwd {
    fn name() -> &'static str {
        "pwd"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        writeln!(stdout, "{}", env.current_dir.to_string_lossy())?;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute, relative to the current directory, or `~`.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let target = match self.target.as_deref() {
            Some(t) if !t.is_empty() && t != "~" => t.to_string(),
            _ => match env.get_var("HOME") {
                Some(home) if !home.is_empty() => home,
                _ => bail!("cd: HOME not set"),
            },
        };

        let new_dir = env.current_dir.join(&target);
        match fs::canonicalize(&new_dir) {
            Ok(canonical) if canonical.is_dir() => {
                env.current_dir = canonical;
                Ok(0)
            }
            _ => bail!("cd: {}: No such file or directory", target),
        }
    }
}

#[derive(FromArgs)]
/// Exit the shell, saving new history entries first.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always exits with status 0.
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        _stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        env.should_exit = true;
        Ok(0)
    }
}

/// Write the arguments to standard output, separated by spaces.
/// By default, a trailing newline is printed; a leading `-n` suppresses it.
///
/// Arguments are taken verbatim, so `echo -x` prints `-x`.
pub struct Echo {
    pub no_newline: bool,
    pub args: Vec<String>,
}

impl BuiltinCommand for Echo {
    fn name() -> &'static str {
        "echo"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        let (no_newline, rest) = match args.split_first() {
            Some((&"-n", rest)) => (true, rest),
            _ => (false, args),
        };
        Ok(Echo {
            no_newline,
            args: rest.iter().map(|arg| arg.to_string()).collect(),
        })
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        _env: &mut Environment,
    ) -> Result<ExitCode> {
        let s = self.args.join(" ");
        if self.no_newline {
            write!(stdout, "{}", s)?;
        } else {
            writeln!(stdout, "{}", s)?;
        }
        Ok(0)
    }
}

#[derive(FromArgs)]
/// Tell whether each name is a shell builtin or an executable on PATH.
pub struct Type {
    #[argh(positional, greedy)]
    /// command names to look up.
    pub names: Vec<String>,
}

impl BuiltinCommand for Type {
    fn name() -> &'static str {
        "type"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        let mut code = 0;
        for name in &self.names {
            if is_builtin(name) {
                writeln!(stdout, "{} is a shell builtin", name)?;
            } else if let Some(path) = find_executable(env, name) {
                writeln!(stdout, "{} is {}", name, path.display())?;
            } else {
                writeln!(stdout, "{}: not found", name)?;
                code = 1;
            }
        }
        Ok(code)
    }
}

#[derive(FromArgs)]
/// Display the command history, or move it from and to files.
pub struct History {
    #[argh(option, short = 'r')]
    /// append the lines of a file to the history.
    pub read: Option<String>,

    #[argh(option, short = 'w')]
    /// write the whole history to a file.
    pub write: Option<String>,

    #[argh(option, short = 'a')]
    /// append entries added since the last save to a file.
    pub append: Option<String>,

    #[argh(positional)]
    /// show only the last N entries.
    pub count: Option<String>,
}

impl History {
    fn resolve(env: &Environment, file: &str) -> PathBuf {
        env.current_dir.join(file)
    }

    fn list(&self, stdout: &mut dyn Write, env: &Environment) -> Result<ExitCode> {
        let entries = env.history.entries();
        let skip = match self.count.as_deref() {
            None => 0,
            Some(count) => match count.parse::<usize>() {
                Ok(n) => entries.len().saturating_sub(n),
                Err(_) => bail!("history: {}: invalid number", count),
            },
        };
        for (i, line) in entries.iter().enumerate().skip(skip) {
            writeln!(stdout, "{}  {}", i + 1, line)?;
        }
        Ok(0)
    }
}

impl BuiltinCommand for History {
    fn name() -> &'static str {
        "history"
    }

    fn parse(args: &[&str]) -> Result<Self, EarlyExit> {
        Self::from_args(&[Self::name()], args)
    }

    fn execute(
        self,
        _stdin: &mut dyn Read,
        stdout: &mut dyn Write,
        env: &mut Environment,
    ) -> Result<ExitCode> {
        if let Some(file) = &self.read {
            let path = Self::resolve(env, file);
            if let Err(e) = env.history.read_file(&path) {
                bail!("history: failed to read {}: {}", file, e);
            }
        } else if let Some(file) = &self.write {
            let path = Self::resolve(env, file);
            if let Err(e) = env.history.write_file(&path) {
                bail!("history: failed to write {}: {}", file, e);
            }
        } else if let Some(file) = &self.append {
            let path = Self::resolve(env, file);
            if let Err(e) = env.history.append_pending(&path) {
                bail!("history: failed to write {}: {}", file, e);
            }
        } else {
            return self.list(stdout, env);
        }
        Ok(0)
    }
}
