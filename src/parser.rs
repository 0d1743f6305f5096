//! Redirection parsing on top of the word list produced by [`crate::lexer`].

use log::trace;

/// Kind of redirection
///
/// Defines which stream is redirected and how the target file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// `>` / `1>`: standard output, the file is created or **truncated**.
    StdoutTruncate,
    /// `>>` / `1>>`: standard output, the file is created if absent and **appended** to.
    StdoutAppend,
    /// `2>`: standard error, truncating.
    StderrTruncate,
    /// `2>>`: standard error, appending.
    StderrAppend,
}

impl RedirectKind {
    /// Operators written as a standalone word followed by the target word.
    fn from_operator(word: &str) -> Option<Self> {
        match word {
            ">" | "1>" => Some(RedirectKind::StdoutTruncate),
            ">>" | "1>>" => Some(RedirectKind::StdoutAppend),
            "2>" => Some(RedirectKind::StderrTruncate),
            "2>>" => Some(RedirectKind::StderrAppend),
            _ => None,
        }
    }

    /// Operators glued to their target (`>>out.txt`), in matching precedence order.
    const GLUED: [(&'static str, RedirectKind); 6] = [
        ("1>>", RedirectKind::StdoutAppend),
        (">>", RedirectKind::StdoutAppend),
        ("1>", RedirectKind::StdoutTruncate),
        (">", RedirectKind::StdoutTruncate),
        ("2>>", RedirectKind::StderrAppend),
        ("2>", RedirectKind::StderrTruncate),
    ];

    fn split_glued(word: &str) -> Option<(Self, &str)> {
        Self::GLUED
            .iter()
            .find_map(|&(op, kind)| word.strip_prefix(op).map(|target| (kind, target)))
    }

    /// True for the kinds that target standard output.
    pub fn is_stdout(self) -> bool {
        matches!(self, RedirectKind::StdoutTruncate | RedirectKind::StdoutAppend)
    }

    /// True for the append kinds.
    pub fn is_append(self) -> bool {
        matches!(self, RedirectKind::StdoutAppend | RedirectKind::StderrAppend)
    }
}

/// Redirection targets of one command: at most one path per [`RedirectKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Redirects {
    pub stdout: Option<String>,
    pub stdout_append: Option<String>,
    pub stderr: Option<String>,
    pub stderr_append: Option<String>,
}

impl Redirects {
    /// Target for `kind`, if any.
    pub fn get(&self, kind: RedirectKind) -> Option<&str> {
        match kind {
            RedirectKind::StdoutTruncate => self.stdout.as_deref(),
            RedirectKind::StdoutAppend => self.stdout_append.as_deref(),
            RedirectKind::StderrTruncate => self.stderr.as_deref(),
            RedirectKind::StderrAppend => self.stderr_append.as_deref(),
        }
    }

    fn set(&mut self, kind: RedirectKind, target: String) {
        let slot = match kind {
            RedirectKind::StdoutTruncate => &mut self.stdout,
            RedirectKind::StdoutAppend => &mut self.stdout_append,
            RedirectKind::StderrTruncate => &mut self.stderr,
            RedirectKind::StderrAppend => &mut self.stderr_append,
        };
        *slot = Some(target);
    }

    pub fn is_empty(&self) -> bool {
        self == &Redirects::default()
    }
}

/// A command with its redirections separated from the real argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// `args[0]` is the command name.
    pub args: Vec<String>,
    pub redirects: Redirects,
}

/// Separates redirection operators from the arguments of a tokenized command.
///
/// The words are scanned from the last one backwards:
/// - a standalone operator (`>`, `1>`, `2>`, `>>`, `1>>`, `2>>`) takes the following
///   word as its target and cuts the argument vector at the operator;
/// - a glued operator (`2>err.txt`) is spliced out on its own, keeping the words
///   around it.
///
/// Every hit overwrites the slot of its kind, so when the same kind shows up more
/// than once the leftmost occurrence is the one that remains.
pub fn resolve_redirects(words: Vec<String>) -> ParsedCommand {
    let mut args = words;
    let mut redirects = Redirects::default();

    for i in (0..args.len()).rev() {
        if let Some(kind) = RedirectKind::from_operator(&args[i]) {
            if i + 1 < args.len() {
                let target = args[i + 1].clone();
                redirects.set(kind, target);
                args.truncate(i);
            }
        } else if let Some((kind, target)) = RedirectKind::split_glued(&args[i]) {
            let target = target.to_string();
            redirects.set(kind, target);
            args.remove(i);
        }
    }

    trace!("resolved args {:?} with redirects {:?}", args, redirects);
    ParsedCommand { args, redirects }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::split_into_words;

    fn parse(line: &str) -> ParsedCommand {
        resolve_redirects(split_into_words(line))
    }

    #[test]
    fn test_no_redirects() {
        let cmd = parse("ls -la /tmp");
        assert_eq!(cmd.args, vec!["ls", "-la", "/tmp"]);
        assert!(cmd.redirects.is_empty());
    }

    #[test]
    fn test_standalone_operators() {
        let cmd = parse("echo hi > out.txt");
        assert_eq!(cmd.args, vec!["echo", "hi"]);
        assert_eq!(cmd.redirects.stdout.as_deref(), Some("out.txt"));

        let cmd = parse("ls nonexistent 2> err.txt");
        assert_eq!(cmd.args, vec!["ls", "nonexistent"]);
        assert_eq!(cmd.redirects.get(RedirectKind::StderrTruncate), Some("err.txt"));

        let cmd = parse("printf foo 1>> out.txt");
        assert_eq!(cmd.args, vec!["printf", "foo"]);
        assert_eq!(cmd.redirects.stdout_append.as_deref(), Some("out.txt"));

        let cmd = parse("cat x 2>> log");
        assert_eq!(cmd.redirects.stderr_append.as_deref(), Some("log"));
    }

    #[test]
    fn test_glued_operators() {
        let cmd = parse("ls nonexistent 2>err.txt");
        assert_eq!(cmd.args, vec!["ls", "nonexistent"]);
        assert_eq!(cmd.redirects.stderr.as_deref(), Some("err.txt"));

        let cmd = parse("echo >>out.txt hello");
        assert_eq!(cmd.args, vec!["echo", "hello"]);
        assert_eq!(cmd.redirects.stdout_append.as_deref(), Some("out.txt"));

        let cmd = parse("echo 1>a.txt");
        assert_eq!(cmd.redirects.stdout.as_deref(), Some("a.txt"));
        assert_eq!(cmd.redirects.stdout_append, None);
    }

    #[test]
    fn test_stdout_and_stderr_together() {
        let cmd = parse("cmd arg > out.txt 2> err.txt");
        assert_eq!(cmd.args, vec!["cmd", "arg"]);
        assert_eq!(cmd.redirects.stdout.as_deref(), Some("out.txt"));
        assert_eq!(cmd.redirects.stderr.as_deref(), Some("err.txt"));
    }

    #[test]
    fn test_leftmost_occurrence_of_a_kind_remains() {
        let cmd = parse("echo a > first > second");
        assert_eq!(cmd.args, vec!["echo", "a"]);
        assert_eq!(cmd.redirects.stdout.as_deref(), Some("first"));
    }

    #[test]
    fn test_standalone_and_glued_of_same_kind() {
        let cmd = parse("cmd >a.txt > b.txt");
        assert_eq!(cmd.args, vec!["cmd"]);
        assert_eq!(
            cmd.redirects,
            Redirects {
                stdout: Some("a.txt".to_string()),
                ..Redirects::default()
            }
        );

        let cmd = parse("cmd 2> e1 2>e2");
        assert_eq!(cmd.args, vec!["cmd"]);
        assert_eq!(
            cmd.redirects,
            Redirects {
                stderr: Some("e1".to_string()),
                ..Redirects::default()
            }
        );
    }

    #[test]
    fn test_glued_stderr_append_between_args() {
        let cmd = parse("cmd x 2>>log.txt y");
        assert_eq!(cmd.args, vec!["cmd", "x", "y"]);
        assert_eq!(
            cmd.redirects,
            Redirects {
                stderr_append: Some("log.txt".to_string()),
                ..Redirects::default()
            }
        );
    }

    #[test]
    fn test_glued_spliced_after_standalone_cut() {
        let cmd = parse("cmd a 2>err.txt b > out.txt");
        assert_eq!(cmd.args, vec!["cmd", "a", "b"]);
        assert_eq!(
            cmd.redirects,
            Redirects {
                stdout: Some("out.txt".to_string()),
                stderr: Some("err.txt".to_string()),
                ..Redirects::default()
            }
        );

        let cmd = parse("cmd >>app.txt 2> err.txt");
        assert_eq!(cmd.args, vec!["cmd"]);
        assert_eq!(
            cmd.redirects,
            Redirects {
                stdout_append: Some("app.txt".to_string()),
                stderr: Some("err.txt".to_string()),
                ..Redirects::default()
            }
        );
    }

    #[test]
    fn test_operator_without_target_is_kept() {
        let cmd = parse("echo >");
        assert_eq!(cmd.args, vec!["echo", ">"]);
        assert!(cmd.redirects.is_empty());
    }

    #[test]
    fn test_quoted_target() {
        let cmd = parse("echo hi > 'my file.txt'");
        assert_eq!(cmd.redirects.stdout.as_deref(), Some("my file.txt"));
    }

    #[test]
    fn test_kind_helpers() {
        assert!(RedirectKind::StdoutAppend.is_stdout());
        assert!(RedirectKind::StdoutAppend.is_append());
        assert!(!RedirectKind::StderrTruncate.is_stdout());
        assert!(!RedirectKind::StderrTruncate.is_append());
    }
}
