use crate::command::{CommandFactory, ExitCode};
use crate::completion::{ShellHelper, build_index};
use crate::env::Environment;
use crate::error::ShellError;
use crate::history::CommandHistory;
use crate::io_adapters::{StageIo, open_redirects};
use crate::lexer::{split_into_words, split_pipeline};
use crate::parser::resolve_redirects;
use crate::pipeline::Pipeline;
use log::{debug, warn};
use rustyline::config::{BellStyle, CompletionType, Config};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;
use std::io;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only support commands defined in this crate: BuiltinCommand and ExternalCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The interactive shell.
///
/// The interpreter maintains an [`Environment`] and a list of [`CommandFactory`] objects
/// that are queried to create commands by name. See [`Default`] for the built-in
/// factories included out of the box.
///
/// Example
/// ```
/// use pipeline_shell::Interpreter;
/// let mut sh = Interpreter::default();
/// let code = sh.execute_line("echo hello world").unwrap();
/// assert_eq!(code, 0);
/// ```
pub struct Interpreter {
    env: Environment,
    commands: Vec<Box<dyn CommandFactory>>,
    prompt: String,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    pub fn new(commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            env: Environment::new(),
            commands,
            prompt: "$ ".to_string(),
        }
    }

    pub fn env(&self) -> &Environment {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    /// Runs one input line: either a single command or a pipeline.
    ///
    /// Errors abort the line only; the caller reports them and reads the next one.
    pub fn execute_line(&mut self, line: &str) -> Result<ExitCode, ShellError> {
        let stages = split_pipeline(line);
        if stages.len() > 1 {
            return self.execute_pipeline(&stages);
        }

        let parsed = resolve_redirects(split_into_words(line));
        let (stdout, stderr) = open_redirects(&parsed.redirects, &self.env.current_dir)?;
        let Some((name, args)) = parsed.args.split_first() else {
            return Ok(0);
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();

        let command = self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(&self.env, name, &args))
            .ok_or_else(|| ShellError::CommandNotFound(name.clone()))?;

        let io = StageIo {
            stdout,
            stderr,
            ..StageIo::inherited()
        };
        command.execute(io, &mut self.env).map_err(into_shell_error)
    }

    fn execute_pipeline(&self, stages: &[String]) -> Result<ExitCode, ShellError> {
        let Some(pipeline) = Pipeline::parse(stages) else {
            debug!("skipping pipeline with an empty stage: {:?}", stages);
            return Ok(0);
        };
        debug!("running pipeline of {} stages", pipeline.stages().len());
        let (stdout, stderr) = open_redirects(pipeline.redirects(), &self.env.current_dir)?;
        pipeline.run(&self.env, stdout, stderr)
    }

    /// Replaces the in-memory history with the contents of `HISTFILE`, if any.
    pub fn load_history(&mut self) {
        let Some(path) = self.env.history_file() else {
            return;
        };
        match CommandHistory::load(&path) {
            Ok(history) => {
                debug!("loaded {} history entries from {}", history.len(), path.display());
                self.env.history = history;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!("cannot read history file {}: {}", path.display(), e),
        }
    }

    /// Appends the lines entered since the last flush to `HISTFILE`.
    pub fn save_history(&mut self) {
        let Some(path) = self.env.history_file() else {
            return;
        };
        if let Err(e) = self.env.history.append_pending(&path) {
            eprintln!("history: failed to write {}: {}", path.display(), e);
        }
    }

    /// Records `line` in the session history. Blank lines are not recorded.
    pub fn remember(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        self.env.history.push(line);
        true
    }

    /// Read-Eval-Print Loop.
    ///
    /// Ends on `exit` or end of input; Ctrl-C only discards the current line.
    /// Every non-blank line goes to the history before it runs.
    pub fn repl(&mut self) -> rustyline::Result<()> {
        self.load_history();

        let config = Config::builder()
            .completion_type(CompletionType::List)
            .bell_style(BellStyle::Audible)
            .auto_add_history(false)
            .build();
        let mut rl: Editor<ShellHelper, DefaultHistory> = Editor::with_config(config)?;
        rl.set_helper(Some(ShellHelper::new(build_index(&self.env))));
        for entry in self.env.history.entries() {
            rl.add_history_entry(entry.as_str())?;
        }

        let result = loop {
            match rl.readline(&self.prompt) {
                Ok(line) => {
                    if self.remember(&line) {
                        rl.add_history_entry(line.as_str())?;
                    }
                    if let Err(e) = self.execute_line(&line) {
                        report(&e);
                    }
                    if self.env.should_exit {
                        break Ok(());
                    }
                }
                Err(ReadlineError::Interrupted) => continue,
                Err(ReadlineError::Eof) => break Ok(()),
                Err(err) => break Err(err),
            }
        };

        self.save_history();
        result
    }
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands:
    /// - built-ins: `pwd`, `cd`, `echo`, `type`, `exit`, `history`
    /// - external command launcher
    fn default() -> Self {
        use crate::builtin::*;
        use crate::external::ExternalCommand;
        Self::new(vec![
            Box::new(Factory::<Pwd>::default()),
            Box::new(Factory::<Cd>::default()),
            Box::new(Factory::<Echo>::default()),
            Box::new(Factory::<Type>::default()),
            Box::new(Factory::<Exit>::default()),
            Box::new(Factory::<History>::default()),
            Box::new(Factory::<ExternalCommand>::default()),
        ])
    }
}

fn into_shell_error(err: anyhow::Error) -> ShellError {
    match err.downcast::<ShellError>() {
        Ok(e) => e,
        Err(e) => ShellError::Io(io::Error::other(e)),
    }
}

/// `command not found` goes to standard output, other errors to standard error.
fn report(err: &ShellError) {
    if err.reports_on_stdout() {
        println!("{err}");
    } else {
        eprintln!("{err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;

    fn shell_in(dir: &Path) -> Interpreter {
        let mut sh = Interpreter::default();
        sh.env_mut().current_dir = fs::canonicalize(dir).unwrap();
        sh
    }

    fn read(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join(name)).unwrap()
    }

    #[test]
    fn test_builtin_with_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        sh.execute_line("echo 'hello   world' > out.txt").unwrap();
        assert_eq!(read(dir.path(), "out.txt"), "hello   world\n");
        sh.execute_line("echo again 1> out.txt").unwrap();
        assert_eq!(read(dir.path(), "out.txt"), "again\n");
    }

    #[test]
    fn test_builtin_error_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        let code = sh.execute_line("cd nowhere 2> err.txt").unwrap();
        assert_eq!(code, 1);
        assert_eq!(read(dir.path(), "err.txt"), "cd: nowhere: No such file or directory\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_external_append() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        sh.execute_line("printf foo >> out.txt").unwrap();
        sh.execute_line("printf foo 1>>out.txt").unwrap();
        assert_eq!(read(dir.path(), "out.txt"), "foofoo");
    }

    #[test]
    #[cfg(unix)]
    fn test_external_stderr_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        let code = sh
            .execute_line("ls /definitely/missing/dir 2> err.txt")
            .unwrap();
        assert_ne!(code, 0);
        assert!(!read(dir.path(), "err.txt").is_empty());
    }

    #[test]
    fn test_unknown_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        let err = sh.execute_line("no_such_command_xyz_42 arg").unwrap_err();
        assert!(err.reports_on_stdout());
        assert_eq!(err.to_string(), "no_such_command_xyz_42: command not found");
    }

    #[test]
    fn test_redirect_into_missing_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        let err = sh.execute_line("echo hi > missing/out.txt").unwrap_err();
        assert!(matches!(err, ShellError::Redirect { .. }));
        assert!(!err.reports_on_stdout());
    }

    #[test]
    fn test_cd_moves_redirect_targets() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        let mut sh = shell_in(dir.path());
        sh.execute_line("cd sub").unwrap();
        sh.execute_line("pwd > out.txt").unwrap();
        let sub = fs::canonicalize(dir.path().join("sub")).unwrap();
        assert_eq!(read(&sub, "out.txt"), format!("{}\n", sub.display()));
    }

    #[test]
    #[cfg(unix)]
    fn test_pipeline_line() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        let code = sh.execute_line("echo abc | tr a b > out.txt").unwrap();
        assert_eq!(code, 0);
        assert_eq!(read(dir.path(), "out.txt"), "bbc\n");
    }

    #[test]
    fn test_blank_line_and_exit() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        assert_eq!(sh.execute_line("   ").unwrap(), 0);
        assert!(!sh.env().should_exit);
        sh.execute_line("exit").unwrap();
        assert!(sh.env().should_exit);
    }

    #[test]
    fn test_blank_lines_stay_out_of_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut sh = shell_in(dir.path());
        assert!(sh.remember("echo a"));
        assert!(!sh.remember(""));
        assert!(!sh.remember(" \t "));
        assert!(sh.remember("  pwd"));
        assert_eq!(sh.env().history.entries(), ["echo a", "  pwd"]);
    }

    #[test]
    fn test_history_round_trip_through_histfile() {
        let dir = tempfile::tempdir().unwrap();
        let histfile = dir.path().join("histfile");
        fs::write(&histfile, "echo old\n\n").unwrap();

        let mut sh = shell_in(dir.path());
        sh.env_mut()
            .set_var("HISTFILE", histfile.to_str().unwrap());
        sh.load_history();
        assert_eq!(sh.env().history.entries(), ["echo old"]);

        sh.env_mut().history.push("echo new");
        sh.save_history();
        sh.save_history();
        assert_eq!(fs::read_to_string(&histfile).unwrap(), "echo old\n\necho new\n");
    }
}
