use log::debug;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Lines entered during the session plus a cursor marking how many of them
/// already live in a history file.
#[derive(Debug, Clone, Default)]
pub struct CommandHistory {
    entries: Vec<String>,
    flushed: usize,
}

impl CommandHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a history file written earlier.
    ///
    /// The loaded lines count as already flushed, so they are not written back on exit.
    pub fn load(path: &Path) -> io::Result<Self> {
        let mut history = Self::new();
        history.read_file(path)?;
        history.flushed = history.entries.len();
        Ok(history)
    }

    pub fn push(&mut self, line: impl Into<String>) {
        self.entries.push(line.into());
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries added since the last flush.
    pub fn pending(&self) -> &[String] {
        &self.entries[self.flushed.min(self.entries.len())..]
    }

    /// Appends the non-blank lines of `path` to the in-memory history.
    pub fn read_file(&mut self, path: &Path) -> io::Result<()> {
        let contents = fs::read_to_string(path)?;
        self.entries.extend(
            contents
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(str::to_string),
        );
        Ok(())
    }

    /// Overwrites `path` with the whole history.
    pub fn write_file(&self, path: &Path) -> io::Result<()> {
        fs::write(path, render(&self.entries))
    }

    /// Appends only the entries added since the last flush and advances the cursor.
    pub fn append_pending(&mut self, path: &Path) -> io::Result<()> {
        let pending = self.pending();
        if pending.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;
        file.write_all(render(pending).as_bytes())?;
        debug!("flushed {} history entries to {}", pending.len(), path.display());
        self.flushed = self.entries.len();
        Ok(())
    }
}

fn render(lines: &[String]) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_marks_entries_flushed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");
        fs::write(&path, "ls\n\necho hi\n").unwrap();

        let mut history = CommandHistory::load(&path).unwrap();
        assert_eq!(history.entries(), ["ls", "echo hi"]);
        assert!(history.pending().is_empty());

        history.push("pwd");
        history.append_pending(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "ls\n\necho hi\npwd\n");
    }

    #[test]
    fn test_append_pending_twice_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");

        let mut history = CommandHistory::new();
        history.push("echo a");
        history.push("echo b");
        history.append_pending(&path).unwrap();
        history.append_pending(&path).unwrap();
        history.push("exit");
        history.append_pending(&path).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "echo a\necho b\nexit\n"
        );
    }

    #[test]
    fn test_write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hist");

        let mut history = CommandHistory::new();
        history.push("one");
        history.push("two");
        history.write_file(&path).unwrap();

        let mut other = CommandHistory::new();
        other.push("zero");
        other.read_file(&path).unwrap();
        assert_eq!(other.entries(), ["zero", "one", "two"]);
        assert_eq!(other.len(), 3);
    }
}
