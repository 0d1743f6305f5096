use argh::FromArgs;
use log::LevelFilter;
use pipeline_shell::Interpreter;
use simplelog::{Config, WriteLogger};
use std::fs::File;

#[derive(FromArgs)]
/// Interactive shell with pipelines, redirections and Tab completion.
struct ShellOptions {
    #[argh(option)]
    /// history file; overrides HISTFILE.
    histfile: Option<String>,

    #[argh(option)]
    /// write debug logs to this file.
    log_file: Option<String>,

    #[argh(switch, short = 'v')]
    /// log at trace level.
    verbose: bool,

    #[argh(option, default = "String::from(\"$ \")")]
    /// prompt printed before every line.
    prompt: String,
}

fn main() -> anyhow::Result<()> {
    let options: ShellOptions = argh::from_env();

    if let Some(path) = &options.log_file {
        let level = if options.verbose {
            LevelFilter::Trace
        } else {
            LevelFilter::Debug
        };
        WriteLogger::init(level, Config::default(), File::create(path)?)?;
    }

    let mut shell = Interpreter::default();
    shell.set_prompt(options.prompt);
    if let Some(histfile) = options.histfile {
        shell.env_mut().set_var("HISTFILE", histfile);
    }
    shell.repl()?;
    Ok(())
}
