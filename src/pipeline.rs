//! Execution of `cmd1 | cmd2 | ...` chains.
//!
//! Every stage gets a [`ProcessHandle`]: spawned programs become OS processes,
//! builtins run on a thread of their own. Both talk through the same OS pipes, so
//! either kind can sit at any position of the chain.

use crate::builtin::{self, PIPELINE_BUILTINS};
use crate::command::{ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::external::{ExternalCommand, exit_code, find_executable};
use crate::io_adapters::{Input, Output, StageIo};
use crate::lexer::split_into_words;
use crate::parser::{Redirects, resolve_redirects};
use log::{debug, warn};
use std::io;
use std::process::{Child, Command};
use std::thread::{self, JoinHandle};

/// One command of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    /// `args[0]` is the command name; redirection words are already removed.
    pub args: Vec<String>,
    /// The stage text as typed.
    pub raw: String,
    pub is_builtin: bool,
}

impl StageCommand {
    pub fn new(args: Vec<String>, raw: &str) -> Self {
        let is_builtin = args.first().is_some_and(|name| builtin::is_builtin(name));
        Self {
            args,
            raw: raw.trim().to_string(),
            is_builtin,
        }
    }

    pub fn name(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or_default()
    }

    fn arg_refs(&self) -> Vec<&str> {
        self.args.iter().skip(1).map(String::as_str).collect()
    }
}

/// Two or more stages connected by pipes, plus the redirections of the last stage.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<StageCommand>,
    redirects: Redirects,
}

impl Pipeline {
    /// Builds a pipeline from the stage substrings of one line.
    ///
    /// Returns `None` for fewer than two stages or when a stage has no command
    /// word. Redirections written on intermediate stages are dropped; only the
    /// last stage's targets are kept.
    pub fn parse(parts: &[String]) -> Option<Self> {
        if parts.len() < 2 {
            return None;
        }
        let mut stages = Vec::with_capacity(parts.len());
        let mut redirects = Redirects::default();
        for (i, part) in parts.iter().enumerate() {
            let parsed = resolve_redirects(split_into_words(part));
            if parsed.args.is_empty() {
                return None;
            }
            if i + 1 == parts.len() {
                redirects = parsed.redirects;
            } else if !parsed.redirects.is_empty() {
                debug!("ignoring redirections of intermediate stage {:?}", part);
            }
            stages.push(StageCommand::new(parsed.args, part));
        }
        Some(Self { stages, redirects })
    }

    pub fn stages(&self) -> &[StageCommand] {
        &self.stages
    }

    /// Redirection targets of the last stage.
    pub fn redirects(&self) -> &Redirects {
        &self.redirects
    }

    /// Runs every stage and waits for all of them.
    ///
    /// `stdout` and `stderr` are the final stage's streams (a redirection target or
    /// the session's own). The first stage reads the session's standard input and
    /// intermediate stages write their errors to the session's standard error.
    ///
    /// An unknown command aborts the pipeline before anything is started. Returns
    /// the exit code of the last stage.
    pub fn run(
        self,
        env: &Environment,
        stdout: Output,
        stderr: Output,
    ) -> Result<ExitCode, ShellError> {
        let count = self.stages.len();

        // Pipe i connects stage i to stage i + 1. Read ends are handed over to
        // their stage; the write ends stay here until every stage is started.
        let mut readers = Vec::with_capacity(count - 1);
        let mut writers = Vec::with_capacity(count - 1);
        for _ in 1..count {
            let (reader, writer) = os_pipe::pipe().map_err(ShellError::Pipe)?;
            readers.push(Some(reader));
            writers.push(writer);
        }

        let mut final_stdout = Some(stdout);
        let mut final_stderr = Some(stderr);
        let mut handles = Vec::with_capacity(count);
        for (i, stage) in self.stages.iter().enumerate() {
            let is_last = i + 1 == count;
            let stdin = match i.checked_sub(1).and_then(|prev| readers[prev].take()) {
                Some(reader) => Input::Pipe(reader),
                None => Input::Inherit,
            };
            let (stdout, stderr) = if is_last {
                (
                    final_stdout.take().unwrap_or(Output::Stdout),
                    final_stderr.take().unwrap_or(Output::Stderr),
                )
            } else {
                let writer = writers[i].try_clone().map_err(ShellError::Pipe)?;
                (Output::Pipe(writer), Output::Stderr)
            };
            let io = StageIo {
                stdin,
                stdout,
                stderr,
            };
            // On error every pipe end created so far is dropped with the locals.
            handles.push(ProcessHandle::new(stage, io, env)?);
        }

        let mut started = 0;
        let mut failure = None;
        for handle in handles.iter_mut() {
            if let Err(e) = handle.start() {
                failure = Some(e);
                break;
            }
            started += 1;
        }
        if let Some(e) = failure {
            warn!("pipeline aborted after starting {} of {} stages", started, count);
            handles.truncate(started);
            drop(writers);
            drop(readers);
            for handle in handles.iter_mut() {
                handle.abort();
            }
            return Err(e);
        }

        // Each writer stage holds its own copy; closing ours lets the readers see
        // end-of-file once the writers are done.
        drop(writers);

        let mut status = 0;
        for handle in handles.iter_mut() {
            status = match handle.wait() {
                Ok(code) => code,
                Err(e) => {
                    warn!("waiting for {} failed: {}", handle.name(), e);
                    1
                }
            };
        }

        drop(readers);
        // Redirection files of the last stage were moved into its handle and are
        // closed with it.
        drop(handles);
        debug!("pipeline finished with status {}", status);
        Ok(status)
    }
}

/// A running unit of work inside a pipeline.
enum ProcessHandle {
    External {
        name: String,
        command: Option<Command>,
        child: Option<Child>,
    },
    Builtin {
        name: String,
        job: Option<BuiltinJob>,
        task: Option<JoinHandle<anyhow::Result<ExitCode>>>,
    },
}

/// Everything a builtin stage needs to run on its own thread.
struct BuiltinJob {
    command: Box<dyn ExecutableCommand>,
    io: StageIo,
    env: Environment,
}

impl ProcessHandle {
    fn new(stage: &StageCommand, io: StageIo, env: &Environment) -> Result<Self, ShellError> {
        let name = stage.name().to_string();
        let args = stage.arg_refs();

        if stage.is_builtin {
            if !PIPELINE_BUILTINS.contains(&name.as_str()) {
                debug!("{} cannot run inside a pipeline", name);
            }
            let command = builtin::pipeline_builtin(env, &name, &args);
            return Ok(ProcessHandle::Builtin {
                name,
                job: Some(BuiltinJob {
                    command,
                    io,
                    env: env.clone(),
                }),
                task: None,
            });
        }

        let path =
            find_executable(env, &name).ok_or_else(|| ShellError::CommandNotFound(name.clone()))?;
        let external = ExternalCommand::new(
            name.clone().into(),
            path,
            args.iter().map(|arg| arg.into()).collect(),
        );
        Ok(ProcessHandle::External {
            command: Some(external.command(io, env)),
            name,
            child: None,
        })
    }

    fn name(&self) -> &str {
        match self {
            ProcessHandle::External { name, .. } | ProcessHandle::Builtin { name, .. } => name,
        }
    }

    fn start(&mut self) -> Result<(), ShellError> {
        match self {
            ProcessHandle::External {
                name,
                command,
                child,
            } => {
                let Some(mut cmd) = command.take() else {
                    return Ok(());
                };
                let spawned = cmd.spawn().map_err(|source| ShellError::Spawn {
                    name: name.clone(),
                    source,
                })?;
                debug!("started {} as pid {}", name, spawned.id());
                *child = Some(spawned);
                // Dropping the command closes the parent's copies of the child's streams.
                drop(cmd);
                Ok(())
            }
            ProcessHandle::Builtin { name, job, task } => {
                let Some(BuiltinJob {
                    command,
                    io,
                    mut env,
                }) = job.take()
                else {
                    return Ok(());
                };
                let handle = thread::Builder::new()
                    .name(format!("builtin-{name}"))
                    .spawn(move || command.execute(io, &mut env))
                    .map_err(|source| ShellError::Spawn {
                        name: name.clone(),
                        source,
                    })?;
                debug!("started builtin {}", name);
                *task = Some(handle);
                Ok(())
            }
        }
    }

    fn wait(&mut self) -> Result<ExitCode, ShellError> {
        match self {
            ProcessHandle::External { name, child, .. } => match child.take() {
                Some(mut child) => {
                    let status = child.wait()?;
                    debug!("{} exited with {}", name, status);
                    Ok(exit_code(status))
                }
                None => Ok(0),
            },
            ProcessHandle::Builtin { name, task, .. } => match task.take() {
                Some(handle) => match handle.join() {
                    Ok(Ok(code)) => Ok(code),
                    Ok(Err(e)) => {
                        debug!("builtin {} failed: {}", name, e);
                        Ok(1)
                    }
                    Err(_) => Err(ShellError::Io(io::Error::other(format!(
                        "builtin {name} panicked"
                    )))),
                },
                None => Ok(0),
            },
        }
    }

    /// Stops a started stage after a failed pipeline start and reaps it.
    fn abort(&mut self) {
        if let ProcessHandle::External {
            child: Some(child), ..
        } = self
        {
            let _ = child.kill();
        }
        let _ = self.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io_adapters::open_redirects;
    use crate::lexer::split_pipeline;
    use std::fs;
    use std::path::Path;

    fn parse(line: &str) -> Option<Pipeline> {
        Pipeline::parse(&split_pipeline(line))
    }

    fn run_line(line: &str, dir: &Path) -> Result<ExitCode, ShellError> {
        let mut env = Environment::new();
        env.current_dir = dir.to_path_buf();
        let pipeline = parse(line).expect("pipeline");
        let (stdout, stderr) = open_redirects(pipeline.redirects(), &env.current_dir)?;
        pipeline.run(&env, stdout, stderr)
    }

    fn read(dir: &Path, name: &str) -> String {
        fs::read_to_string(dir.join(name)).unwrap_or_default()
    }

    #[test]
    fn test_parse_stages() {
        let pipeline = parse(r#"echo "a|b" 2>ignored | cat > out.txt"#).unwrap();
        let stages = pipeline.stages();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].args, vec!["echo", "a|b"]);
        assert_eq!(stages[0].raw, r#"echo "a|b" 2>ignored"#);
        assert!(stages[0].is_builtin);
        assert_eq!(stages[1].args, vec!["cat"]);
        assert!(!stages[1].is_builtin);
        assert_eq!(pipeline.redirects().stdout.as_deref(), Some("out.txt"));
        assert_eq!(pipeline.redirects().stderr, None);
    }

    #[test]
    fn test_parse_rejects_single_or_empty_stage() {
        assert!(parse("echo hi").is_none());
        assert!(parse("echo hi | > out.txt").is_none());
        assert!(parse("'' | cat").is_none());
    }

    #[test]
    #[cfg(unix)]
    fn test_builtin_external_builtin_chain() {
        let dir = tempfile::tempdir().unwrap();
        let code = run_line("echo hi | cat | type cat > out.txt", dir.path()).unwrap();
        assert_eq!(code, 0);
        let out = read(dir.path(), "out.txt");
        assert!(out.starts_with("cat is /"), "got {out:?}");
    }

    #[test]
    #[cfg(unix)]
    fn test_data_flows_through_every_pipe() {
        let dir = tempfile::tempdir().unwrap();
        run_line("echo hello | cat | tr a-z A-Z | cat > out.txt", dir.path()).unwrap();
        assert_eq!(read(dir.path(), "out.txt"), "HELLO\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_quoted_pipe_reaches_next_stage() {
        let dir = tempfile::tempdir().unwrap();
        run_line(r#"echo "a|b" | cat >> out.txt"#, dir.path()).unwrap();
        run_line(r#"echo 'c|d' | cat >> out.txt"#, dir.path()).unwrap();
        assert_eq!(read(dir.path(), "out.txt"), "a|b\nc|d\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_external_into_builtin() {
        let dir = tempfile::tempdir().unwrap();
        run_line("printf 'x\\ny\\n' | sort -r | echo done > out.txt", dir.path()).unwrap();
        assert_eq!(read(dir.path(), "out.txt"), "done\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_early_exit_of_reader_does_not_hang() {
        let dir = tempfile::tempdir().unwrap();
        run_line("yes | head -n 2 > out.txt", dir.path()).unwrap();
        assert_eq!(read(dir.path(), "out.txt"), "y\ny\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_unknown_command_aborts_before_start() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_line(
            "echo hi > first.txt | no_such_command_xyz_42 > out.txt",
            dir.path(),
        )
        .unwrap_err();
        assert!(matches!(&err, ShellError::CommandNotFound(name) if name == "no_such_command_xyz_42"));
        assert_eq!(err.to_string(), "no_such_command_xyz_42: command not found");
        assert!(!dir.path().join("first.txt").exists());
        assert_eq!(read(dir.path(), "out.txt"), "");
    }

    #[test]
    #[cfg(unix)]
    fn test_unsupported_builtin_in_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let code = run_line("echo hi | pwd > out.txt 2> err.txt", dir.path()).unwrap();
        assert_eq!(code, 1);
        assert_eq!(read(dir.path(), "out.txt"), "");
        assert_eq!(read(dir.path(), "err.txt"), "pwd: unsupported pipeline builtin\n");
    }

    #[test]
    #[cfg(unix)]
    fn test_last_stage_stderr_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let code = run_line(
            "echo x | ls /definitely/missing/dir 2> err.txt",
            dir.path(),
        )
        .unwrap();
        assert_ne!(code, 0);
        assert!(!read(dir.path(), "err.txt").is_empty());
    }

    #[test]
    #[cfg(unix)]
    fn test_argv0_is_typed_name() {
        let dir = tempfile::tempdir().unwrap();
        run_line("echo | sh -c 'echo $0' > out.txt", dir.path()).unwrap();
        assert_eq!(read(dir.path(), "out.txt"), "sh\n");
    }
}
