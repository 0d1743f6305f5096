use std::collections::BTreeMap;

/// Prefix tree over known command names.
///
/// Children are created lazily on insertion. Words are stored lower-cased.
#[derive(Debug, Default)]
pub struct Trie {
    children: BTreeMap<char, Trie>,
    is_end: bool,
}

impl Trie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `word` (lower-cased). Inserting the same word twice is a no-op.
    pub fn insert(&mut self, word: &str) {
        let mut node = self;
        for ch in word.to_lowercase().chars() {
            node = node.children.entry(ch).or_default();
        }
        node.is_end = true;
    }

    /// Node reached by walking `prefix`, if every character has a child.
    fn search_with_prefix(&self, prefix: &str) -> Option<&Trie> {
        let mut node = self;
        for ch in prefix.chars() {
            node = node.children.get(&ch)?;
        }
        Some(node)
    }

    /// True if `word` itself was inserted.
    pub fn contains(&self, word: &str) -> bool {
        self.search_with_prefix(word).is_some_and(|node| node.is_end)
    }

    /// All inserted words that start with `prefix`, the prefix itself included when
    /// it was inserted.
    ///
    /// Results come out in traversal order; callers that need a stable listing
    /// sort them.
    pub fn find_completions(&self, prefix: &str) -> Vec<String> {
        let Some(start) = self.search_with_prefix(prefix) else {
            return Vec::new();
        };

        let mut completions = Vec::new();
        let mut stack = vec![(start, prefix.to_string())];
        while let Some((node, word)) = stack.pop() {
            if node.is_end {
                completions.push(word.clone());
            }
            for (ch, child) in node.children.iter().rev() {
                let mut next = word.clone();
                next.push(*ch);
                stack.push((child, next));
            }
        }
        completions
    }

    /// Number of distinct words stored.
    pub fn len(&self) -> usize {
        let own = usize::from(self.is_end);
        own + self.children.values().map(Trie::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
