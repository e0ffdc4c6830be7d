//! Case-insensitive substring search over indexed text values.
//!
//! Values are folded to lowercase and cut into trigrams. A node can hold
//! many values, and the same value more than once (a tree root holds one
//! name per tip), so every posting counts occurrences and a value stays
//! searchable until its last occurrence is removed.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

const GRAM: usize = 3;

/// Node -> number of occurrences.
type Postings = BTreeMap<NodeId, u32>;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndex {
    /// Folded value -> nodes holding it.
    terms: BTreeMap<String, Postings>,
    /// Trigram -> nodes holding a value that contains it.
    grams: HashMap<String, Postings>,
    /// Node -> folded values it holds, with counts.
    held: HashMap<NodeId, BTreeMap<String, u32>>,
}

fn fold(text: &str) -> String {
    text.to_lowercase()
}

fn trigrams(term: &str) -> BTreeSet<String> {
    let chars: Vec<char> = term.chars().collect();
    chars.windows(GRAM).map(|w| w.iter().collect()).collect()
}

fn bump(postings: &mut Postings, node: NodeId) {
    *postings.entry(node).or_insert(0) += 1;
}

/// Drops one occurrence; true once nothing is left.
fn drop_one(postings: &mut Postings, node: NodeId) -> bool {
    if let Some(count) = postings.get_mut(&node) {
        *count -= 1;
        if *count == 0 {
            postings.remove(&node);
        }
    }
    postings.is_empty()
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one occurrence of `text` on `node`.
    pub fn insert(&mut self, text: &str, node: NodeId) {
        let term = fold(text);
        for gram in trigrams(&term) {
            bump(self.grams.entry(gram).or_default(), node);
        }
        *self.held.entry(node).or_default().entry(term.clone()).or_insert(0) += 1;
        bump(self.terms.entry(term).or_default(), node);
    }

    /// Removes one occurrence of `text` from `node`. Unknown pairs are
    /// ignored.
    pub fn remove(&mut self, text: &str, node: NodeId) {
        let term = fold(text);
        let Some(held) = self.held.get_mut(&node) else {
            return;
        };
        let Some(count) = held.get_mut(&term) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            held.remove(&term);
            if held.is_empty() {
                self.held.remove(&node);
            }
        }

        if let Some(postings) = self.terms.get_mut(&term) {
            if drop_one(postings, node) {
                self.terms.remove(&term);
            }
        }
        for gram in trigrams(&term) {
            if let Some(postings) = self.grams.get_mut(&gram) {
                if drop_one(postings, node) {
                    self.grams.remove(&gram);
                }
            }
        }
    }

    /// Nodes holding a value that contains `query`, in id order.
    pub fn search(&self, query: &str) -> Vec<NodeId> {
        let needle = fold(query);
        let grams = trigrams(&needle);

        // too short for a trigram lookup
        if grams.is_empty() {
            let hits: BTreeSet<NodeId> = self
                .terms
                .iter()
                .filter(|(term, _)| term.contains(&needle))
                .flat_map(|(_, postings)| postings.keys().copied())
                .collect();
            return hits.into_iter().collect();
        }

        let mut lists = Vec::with_capacity(grams.len());
        for gram in &grams {
            match self.grams.get(gram) {
                Some(postings) => lists.push(postings),
                None => return Vec::new(),
            }
        }
        lists.sort_by_key(|postings| postings.len());
        let Some((smallest, rest)) = lists.split_first() else {
            return Vec::new();
        };

        // sharing every trigram does not guarantee a contiguous match
        smallest
            .keys()
            .copied()
            .filter(|node| rest.iter().all(|postings| postings.contains_key(node)))
            .filter(|node| {
                self.held
                    .get(node)
                    .map_or(false, |terms| terms.keys().any(|term| term.contains(&needle)))
            })
            .collect()
    }

    /// Number of distinct folded values.
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}
