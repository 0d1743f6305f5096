//! Tab completion of command names.
//!
//! [`CompletionController`] holds the decision logic and knows nothing about the
//! terminal; [`ShellHelper`] plugs it into `rustyline`.

use crate::builtin::BUILTIN_NAMES;
use crate::env::Environment;
use crate::external::path_executables;
use crate::trie::Trie;
use log::{debug, trace};
use rustyline::completion::Completer;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use std::cell::RefCell;
use std::ffi::OsStr;
use std::io::{self, Write};

/// What the front end should do after a Tab press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionAction {
    /// Ring the terminal bell and leave the line alone.
    Bell,
    /// Leave the line alone, silently.
    NoOp,
    /// Insert the text at the cursor.
    Insert(String),
    /// Show the candidates, sorted, then redraw the prompt and the line.
    List(Vec<String>),
}

/// Completion state across consecutive Tab presses.
///
/// A first Tab on an ambiguous prefix only rings the bell; a second Tab on the same
/// prefix lists the candidates.
#[derive(Debug)]
pub struct CompletionController {
    index: Trie,
    last_prefix: String,
    tab_pressed: bool,
}

impl CompletionController {
    pub fn new(index: Trie) -> Self {
        Self {
            index,
            last_prefix: String::new(),
            tab_pressed: false,
        }
    }

    /// Decides how to react to Tab with the cursor at byte offset `pos` of `line`.
    ///
    /// Only the first word of the line is completed, and only with the cursor at its
    /// end; anywhere else this is a no-op. A blank line starts a fresh cycle.
    pub fn complete(&mut self, line: &str, pos: usize) -> CompletionAction {
        if line.trim().is_empty() {
            self.last_prefix.clear();
            self.tab_pressed = false;
            return CompletionAction::NoOp;
        }
        let Some(typed) = command_prefix(line, pos) else {
            return CompletionAction::NoOp;
        };
        let prefix = typed.to_lowercase();
        if prefix != self.last_prefix {
            self.tab_pressed = false;
            self.last_prefix = prefix.clone();
        }

        let mut matches = self.index.find_completions(&prefix);
        matches.sort();
        trace!("{} completions for {:?}", matches.len(), prefix);

        if matches.is_empty() {
            self.tab_pressed = false;
            return CompletionAction::Bell;
        }
        if let [only] = matches.as_slice() {
            if *only == prefix {
                return CompletionAction::NoOp;
            }
            self.tab_pressed = false;
            return match only.strip_prefix(prefix.as_str()) {
                Some(rest) => CompletionAction::Insert(format!("{rest} ")),
                None => CompletionAction::NoOp,
            };
        }

        let common = longest_common_prefix(&matches);
        if common.len() > prefix.len() {
            self.tab_pressed = false;
            return CompletionAction::Insert(common[prefix.len()..].to_string());
        }
        if self.tab_pressed {
            self.tab_pressed = false;
            CompletionAction::List(matches)
        } else {
            self.tab_pressed = true;
            CompletionAction::Bell
        }
    }
}

/// The whole first word of `line`, or `None` when there is none or the cursor is
/// not right after it.
fn command_prefix(line: &str, pos: usize) -> Option<&str> {
    let start = line.len() - line.trim_start().len();
    let rest = &line[start..];
    let end = start + rest.find(char::is_whitespace).unwrap_or(rest.len());
    if start == end || pos != end {
        return None;
    }
    Some(&line[start..end])
}

/// Longest prefix shared by every word.
pub fn longest_common_prefix(words: &[String]) -> &str {
    let Some((first, rest)) = words.split_first() else {
        return "";
    };
    let mut end = first.len();
    for word in rest {
        end = first
            .char_indices()
            .zip(word.chars())
            .take_while(|((_, a), b)| a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
            .min(end);
    }
    &first[..end]
}

/// Completion index of the builtin names and every executable on `PATH`.
pub fn build_index(env: &Environment) -> Trie {
    let mut index = Trie::new();
    for name in BUILTIN_NAMES {
        index.insert(name);
    }
    for name in path_executables(OsStr::new(&env.search_paths())) {
        index.insert(&name);
    }
    debug!("completion index holds {} commands", index.len());
    index
}

/// `rustyline` helper rendering [`CompletionAction`]s.
pub struct ShellHelper {
    controller: RefCell<CompletionController>,
}

impl ShellHelper {
    pub fn new(index: Trie) -> Self {
        Self {
            controller: RefCell::new(CompletionController::new(index)),
        }
    }
}

impl Completer for ShellHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let action = self.controller.borrow_mut().complete(line, pos);
        let candidates = match action {
            // No candidates makes the editor ring the bell.
            CompletionAction::Bell => Vec::new(),
            CompletionAction::NoOp => vec![String::new()],
            CompletionAction::Insert(text) => vec![text],
            CompletionAction::List(words) => {
                let mut stdout = io::stdout().lock();
                write!(stdout, "\r\n{}\r\n", words.join("  "))?;
                stdout.flush()?;
                // The editor redraws the prompt and the line below the listing.
                vec![String::new()]
            }
        };
        Ok((pos, candidates))
    }
}

impl Hinter for ShellHelper {
    type Hint = String;
}

impl Highlighter for ShellHelper {}

impl Validator for ShellHelper {}

impl Helper for ShellHelper {}
