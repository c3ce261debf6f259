//! Inverted index from lowercased whitespace-split token to the ordered
//! sequence of keys whose value contained that token.

use std::collections::HashMap;

/// Full-text secondary index.
#[derive(Debug, Default)]
pub struct TextIndex {
    postings: HashMap<String, Vec<String>>,
}

impl TextIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// For each token in `text`, append `key` to its posting list.
    /// Duplicates are permitted: if a token repeats in `text`, `key`
    /// appears once per occurrence.
    pub fn add_document(&mut self, key: &str, text: &str) {
        for token in text.split_whitespace() {
            self.postings
                .entry(token.to_lowercase())
                .or_default()
                .push(key.to_string());
        }
    }

    /// For each token in `text`, remove *all* occurrences of `key` from
    /// its posting list, then drop the list once empty. This is
    /// intentionally asymmetric with `add_document`: a key added under a
    /// repeated token leaves one posting removed per distinct token, not
    /// per occurrence.
    pub fn remove_document(&mut self, key: &str, text: &str) {
        for token in text.split_whitespace() {
            let token = token.to_lowercase();
            if let Some(postings) = self.postings.get_mut(&token) {
                postings.retain(|k| k != key);
                if postings.is_empty() {
                    self.postings.remove(&token);
                }
            }
        }
    }

    /// A copy of the posting list for the lowercased `term`.
    pub fn search(&self, term: &str) -> Vec<String> {
        self.postings.get(&term.to_lowercase()).cloned().unwrap_or_default()
    }
}
