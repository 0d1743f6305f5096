use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::env::Environment;
use crate::error::ShellError;
use crate::interpreter::Factory;
use crate::io_adapters::StageIo;
use anyhow::Result;
use log::debug;
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};

/// Command that is not a builtin.
pub struct ExternalCommand {
    /// Name as typed by the user; becomes `argv[0]`.
    name: OsString,
    /// Resolved executable.
    path: PathBuf,
    args: Vec<OsString>,
}

impl ExternalCommand {
    pub fn new(name: OsString, path: PathBuf, args: Vec<OsString>) -> Self {
        Self { name, path, args }
    }

    /// Prepare a [`Command`] wired to `io`, ready to be spawned.
    pub(crate) fn command(&self, io: StageIo, env: &Environment) -> Command {
        let mut cmd = Command::new(&self.path);
        set_arg0(&mut cmd, &self.name);
        cmd.args(&self.args)
            .stdin(io.stdin.stdio())
            .stdout(io.stdout.stdio())
            .stderr(io.stderr.stdio())
            .envs(env.vars.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&env.current_dir);
        cmd
    }
}

impl CommandFactory for Factory<ExternalCommand> {
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>> {
        find_executable(env, name).map(|executable| {
            Box::new(ExternalCommand::new(
                name.into(),
                executable,
                args.iter().map(|x| x.into()).collect(),
            )) as Box<dyn ExecutableCommand>
        })
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(self: Box<Self>, io: StageIo, env: &mut Environment) -> Result<ExitCode> {
        let mut cmd = self.command(io, env);
        let mut child = cmd.spawn().map_err(|source| ShellError::Spawn {
            name: self.name.to_string_lossy().into_owned(),
            source,
        })?;
        // The child owns its copies of the redirected streams now.
        drop(cmd);
        let exit_status = child.wait()?;
        debug!("{:?} exited with {}", self.name, exit_status);
        Ok(exit_code(exit_status))
    }
}

#[cfg(unix)]
fn set_arg0(cmd: &mut Command, name: &OsStr) {
    use std::os::unix::process::CommandExt;
    cmd.arg0(name);
}

#[cfg(not(unix))]
fn set_arg0(_cmd: &mut Command, _name: &OsStr) {}

/// Shell-style exit code of a finished process.
pub(crate) fn exit_code(exit_status: ExitStatus) -> ExitCode {
    match exit_status.code() {
        Some(x) => x,
        None => terminated_by_signal(exit_status),
    }
}

#[cfg(unix)]
fn terminated_by_signal(exit_status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    if let Some(signal) = ExitStatusExt::signal(&exit_status) {
        128 + signal
    } else if ExitStatusExt::core_dumped(&exit_status) {
        255
    } else {
        -1
    }
}

#[cfg(not(unix))]
fn terminated_by_signal(_exit_status: ExitStatus) -> i32 {
    -1
}

/// Resolve a command path the way a typical shell would.
///
/// Behavior:
/// - Absolute path: returns it if it is an executable file.
/// - Relative with multiple components (e.g., `bin/sh`) or `./foo`: returns it if it
///   is an executable file.
/// - Single path component (no separators): search each directory in `search_paths`
///   (PATH) and return the first regular file with execute permission.
/// - Empty path: returns `None`.
///
/// Returns either a borrowed reference to the provided `path` or an owned `PathBuf`
/// when the result is discovered via PATH lookup.
pub fn find_command_path<'a>(search_paths: &OsStr, path: &'a Path) -> Option<Cow<'a, Path>> {
    if path.is_absolute() {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let search_in_current_dir = cfg!(not(unix)) || path.starts_with("./");
    if search_in_current_dir {
        return find_by_path(path).map(Cow::Borrowed);
    }

    let mut components = path.components();
    let first = components.next();
    let second = components.next();
    match (first, second) {
        (None, None) => None,
        (Some(x), None) => find_in_path(search_paths, x.as_os_str()).map(Cow::Owned),
        _ => find_by_path(path).map(Cow::Borrowed),
    }
}

/// Looks `name` up with the session's `PATH`.
pub fn find_executable(env: &Environment, name: &str) -> Option<PathBuf> {
    let search_paths = env.search_paths();
    find_command_path(OsStr::new(&search_paths), Path::new(name)).map(Cow::into_owned)
}

fn find_in_path(search_paths: &OsStr, cmd: &OsStr) -> Option<PathBuf> {
    std::env::split_paths(search_paths)
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(|dir| dir.join(cmd))
        .find(|path| is_executable(path))
}

fn find_by_path(path: &Path) -> Option<&Path> {
    if is_executable(path) { Some(path) } else { None }
}

/// Regular file with at least one execute bit set.
#[cfg(unix)]
pub(crate) fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub(crate) fn is_executable(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}

/// Names of every executable found in the `search_paths` directories, lower-cased
/// and de-duplicated. Unreadable directories are skipped.
pub fn path_executables(search_paths: &OsStr) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for dir in std::env::split_paths(search_paths) {
        if dir.as_os_str().is_empty() {
            continue;
        }
        let Ok(entries) = fs::read_dir(&dir) else {
            debug!("skipping unreadable PATH entry {}", dir.display());
            continue;
        };
        for entry in entries.flatten() {
            if !is_executable(&entry.path()) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_lowercase();
            if !name.is_empty() {
                names.insert(name);
            }
        }
    }
    names
}
