//! An interactive shell with pipelines, redirections and command completion.
//!
//! Input lines are split into words by a quote-aware tokenizer, output redirections
//! (`>`, `>>`, `1>`, `1>>`, `2>`, `2>>`) are resolved, and the command runs either as
//! a builtin or as a spawned program. Lines containing unquoted `|` run as a pipeline
//! over OS pipes, where builtins and programs can be mixed freely.
//!
//! The main entry point is [`Interpreter`]. [`completion`] holds the Tab completion
//! logic used by the line editor.

mod builtin;
pub mod command;
pub mod completion;
pub mod env;
pub mod error;
mod external;
pub mod history;
mod interpreter;
pub mod io_adapters;
pub mod lexer;
pub mod parser;
pub mod pipeline;
pub mod trie;

pub use error::ShellError;
pub use interpreter::Interpreter;
