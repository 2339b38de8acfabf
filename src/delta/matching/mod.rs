//! Hash-based matchers.
//!
//! A matcher hashes every entity of both sides and pairs entities with
//! equal hashes one to one, in input order: the first unpaired existing
//! entity takes the first unpaired new entity with its hash. Surplus
//! entities on either side stay unmatched.
//!
//! The modification variant pairs on a slot hash that leaves the value
//! out, and reports the pairs whose content actually differs.

pub mod hashes;

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Which version of the record an entity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Existing,
    New,
}

#[derive(Debug)]
pub struct Matcher<T> {
    existing: Vec<T>,
    new: Vec<T>,
    /// (existing index, new index, hash)
    pairs: Vec<(usize, usize, String)>,
    existing_content: Vec<String>,
    new_content: Vec<String>,
}

impl<T> Matcher<T> {
    /// Exact matcher: pairs entities with identical hashes.
    pub fn exact(existing: Vec<T>, new: Vec<T>, hash: impl Fn(&T) -> String) -> Self {
        Self::build(existing, new, &hash, &hash)
    }

    /// Modification matcher: pairs on `slot`, compares on `content`.
    pub fn modification(
        existing: Vec<T>,
        new: Vec<T>,
        slot: impl Fn(&T) -> String,
        content: impl Fn(&T) -> String,
    ) -> Self {
        Self::build(existing, new, &slot, &content)
    }

    fn build(
        existing: Vec<T>,
        new: Vec<T>,
        slot: &dyn Fn(&T) -> String,
        content: &dyn Fn(&T) -> String,
    ) -> Self {
        let mut waiting: IndexMap<String, VecDeque<usize>> = IndexMap::new();
        for (j, entity) in new.iter().enumerate() {
            waiting.entry(slot(entity)).or_default().push_back(j);
        }

        let mut pairs = Vec::new();
        for (i, entity) in existing.iter().enumerate() {
            let hash = slot(entity);
            if let Some(j) = waiting.get_mut(&hash).and_then(VecDeque::pop_front) {
                pairs.push((i, j, hash));
            }
        }

        let existing_content = existing.iter().map(content).collect();
        let new_content = new.iter().map(content).collect();
        Self { existing, new, pairs, existing_content, new_content }
    }

    fn side(&self, side: Side) -> &[T] {
        match side {
            Side::Existing => &self.existing,
            Side::New => &self.new,
        }
    }

    fn paired(&self, side: Side) -> Vec<bool> {
        let mut paired = vec![false; self.side(side).len()];
        for (i, j, _) in &self.pairs {
            match side {
                Side::Existing => paired[*i] = true,
                Side::New => paired[*j] = true,
            }
        }
        paired
    }

    /// Hashes matched on both sides, in pairing order.
    pub fn matches(&self) -> Vec<&str> {
        let hashes: IndexSet<&str> = self.pairs.iter().map(|(_, _, h)| h.as_str()).collect();
        hashes.into_iter().collect()
    }

    /// Matched pairs as (existing, new), in existing input order.
    pub fn pairs(&self) -> impl Iterator<Item = (&T, &T)> {
        self.pairs.iter().map(|(i, j, _)| (&self.existing[*i], &self.new[*j]))
    }

    pub fn matched(&self, side: Side) -> Vec<&T> {
        let paired = self.paired(side);
        self.side(side).iter().zip(paired).filter(|(_, p)| *p).map(|(e, _)| e).collect()
    }

    pub fn non_matched(&self, side: Side) -> Vec<&T> {
        let paired = self.paired(side);
        self.side(side).iter().zip(paired).filter(|(_, p)| !*p).map(|(e, _)| e).collect()
    }

    /// Pairs whose content differs: same slot, changed value.
    pub fn modifications(&self) -> Vec<(&T, &T)> {
        self.pairs
            .iter()
            .filter(|(i, j, _)| self.existing_content[*i] != self.new_content[*j])
            .map(|(i, j, _)| (&self.existing[*i], &self.new[*j]))
            .collect()
    }

    /// Pairs whose content is identical.
    pub fn unchanged(&self) -> Vec<(&T, &T)> {
        self.pairs
            .iter()
            .filter(|(i, j, _)| self.existing_content[*i] == self.new_content[*j])
            .map(|(i, j, _)| (&self.existing[*i], &self.new[*j]))
            .collect()
    }
}

impl<T: Clone> Matcher<T> {
    /// Owned copies of one side's unmatched entities, for the next stage.
    pub fn remainder(&self, side: Side) -> Vec<T> {
        self.non_matched(side).into_iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    struct Item {
        slot: &'static str,
        value: &'static str,
    }

    fn item(slot: &'static str, value: &'static str) -> Item {
        Item { slot, value }
    }

    fn full(i: &Item) -> String {
        format!("{}={}", i.slot, i.value)
    }

    #[test]
    fn test_pairing_with_duplicates() {
        let existing = vec![item("a", "1"), item("a", "1"), item("b", "2")];
        let new = vec![item("a", "1"), item("c", "3")];
        let m = Matcher::exact(existing, new, full);

        assert_eq!(m.matches(), vec!["a=1"]);
        assert_eq!(m.pairs().count(), 1);
        assert_eq!(m.non_matched(Side::Existing), vec![&item("a", "1"), &item("b", "2")]);
        assert_eq!(m.non_matched(Side::New), vec![&item("c", "3")]);
        assert_eq!(m.matched(Side::New), vec![&item("a", "1")]);
    }

    #[test]
    fn test_pairing_is_in_input_order() {
        let existing = vec![item("a", "x"), item("a", "y")];
        let new = vec![item("a", "p"), item("a", "q")];
        let m = Matcher::modification(existing, new, |i| i.slot.to_string(), full);

        let pairs: Vec<(&str, &str)> = m.pairs().map(|(e, n)| (e.value, n.value)).collect();
        assert_eq!(pairs, vec![("x", "p"), ("y", "q")]);
    }

    #[test]
    fn test_modifications_exclude_identical_content() {
        let existing = vec![item("a", "1"), item("b", "2")];
        let new = vec![item("a", "1"), item("b", "9")];
        let m = Matcher::modification(existing, new, |i| i.slot.to_string(), full);

        assert_eq!(m.modifications(), vec![(&item("b", "2"), &item("b", "9"))]);
        assert_eq!(m.unchanged(), vec![(&item("a", "1"), &item("a", "1"))]);
        assert!(m.non_matched(Side::Existing).is_empty());
    }
}
