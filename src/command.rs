use crate::env::Environment;
use crate::io_adapters::StageIo;
use anyhow::Result;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
pub type ExitCode = i32;

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
/// Commands are `Send` so a builtin can run on its own thread inside a pipeline.
pub trait ExecutableCommand: Send {
    /// Executes the command with the given streams, consuming them.
    ///
    /// Dropping the streams at the end closes any pipe or file they refer to.
    fn execute(self: Box<Self>, io: StageIo, env: &mut Environment) -> Result<ExitCode>;
}

/// Factory that tries to create a command from a name and its arguments.
///
/// Returns `None` when the factory doesn't recognize the `name`.
/// Implementations can use the environment to resolve executables (e.g., using PATH).
pub trait CommandFactory {
    /// Attempt to create a command instance for the provided name and arguments.
    fn try_create(
        &self,
        env: &Environment,
        name: &str,
        args: &[&str],
    ) -> Option<Box<dyn ExecutableCommand>>;
}
