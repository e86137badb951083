/*
    The action space maps each nonterminal to its legal productions. Every
    action gets a registry index when it is first added, and indices never
    move: new productions are only ever appended.
*/

use std::collections::{BTreeMap, HashMap};

use itertools::Itertools;

use crate::grammar::action::Action;

#[derive(Debug, Clone, Default, PartialEq)]
struct Entry {
    actions: Vec<usize>,
    // The first `global` actions came from the grammar itself
    global: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ActionSpace {
    registry: Vec<Action>,
    indices: HashMap<Action, usize>,
    entries: BTreeMap<String, Entry>,
}

impl ActionSpace {
    pub fn new() -> Self {
        Self::default()
    }

    // Makes `nonterminal` known even if it has no productions yet
    pub fn declare(&mut self, nonterminal: &str) {
        self.entries.entry(nonterminal.to_string()).or_default();
    }

    fn register(&mut self, action: Action) -> (usize, bool) {
        if let Some(&index) = self.indices.get(&action) {
            return (index, false);
        }
        let index = self.registry.len();
        self.registry.push(action.clone());
        self.indices.insert(action, index);
        (index, true)
    }

    // Adds grammar-defined productions. They are only global while nothing
    // has been appended after them.
    pub(crate) fn insert_global(&mut self, nonterminal: &str, actions: impl IntoIterator<Item = Action>) {
        self.declare(nonterminal);
        for action in actions {
            let (index, added) = self.register(action);
            if let Some(entry) = self.entries.get_mut(nonterminal) {
                if added {
                    entry.actions.push(index);
                    if entry.global + 1 == entry.actions.len() {
                        entry.global += 1;
                    }
                }
            }
        }
    }

    // Appends a runtime-discovered production, returning its index. Adding an
    // action that is already present returns the existing index.
    pub fn append(&mut self, action: Action) -> usize {
        let nonterminal = action.nonterminal().to_string();
        let (index, added) = self.register(action);
        if added {
            self.entries.entry(nonterminal).or_default().actions.push(index);
        }
        index
    }

    pub fn contains_nonterminal(&self, nonterminal: &str) -> bool {
        self.entries.contains_key(nonterminal)
    }

    pub fn nonterminals(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, index: usize) -> Option<&Action> {
        self.registry.get(index)
    }

    pub fn index_of(&self, action: &Action) -> Option<usize> {
        self.indices.get(action).copied()
    }

    // Looks an action up by its canonical string
    pub fn resolve(&self, canonical: &str) -> Option<&Action> {
        self.indices.get(canonical).map(|&index| &self.registry[index])
    }

    pub fn contains(&self, action: &Action) -> bool {
        self.indices.contains_key(action)
    }

    fn indexed(&self, indices: &[usize]) -> Vec<(usize, &Action)> {
        indices.iter().map(|&index| (index, &self.registry[index])).collect()
    }

    // Every production of `nonterminal` in index order, or None if the
    // nonterminal is unknown
    pub fn actions_for(&self, nonterminal: &str) -> Option<Vec<&Action>> {
        self.entries
            .get(nonterminal)
            .map(|entry| entry.actions.iter().map(|&index| &self.registry[index]).collect())
    }

    pub fn global_actions(&self, nonterminal: &str) -> Option<Vec<(usize, &Action)>> {
        self.entries.get(nonterminal).map(|entry| self.indexed(&entry.actions[..entry.global]))
    }

    pub fn linked_actions(&self, nonterminal: &str) -> Option<Vec<(usize, &Action)>> {
        self.entries.get(nonterminal).map(|entry| self.indexed(&entry.actions[entry.global..]))
    }

    pub fn is_global(&self, action: &Action) -> bool {
        match (self.index_of(action), self.entries.get(action.nonterminal())) {
            (Some(index), Some(entry)) => entry.actions[..entry.global].contains(&index),
            _ => false,
        }
    }

    pub fn literal_values(&self, nonterminal: &str) -> Vec<&str> {
        self.actions_for(nonterminal)
            .unwrap_or_default()
            .into_iter()
            .filter_map(Action::literal_value)
            .collect()
    }

    // Every action, sorted by canonical string
    pub fn all_actions(&self) -> Vec<&Action> {
        self.registry.iter().sorted().collect()
    }

    // Every action in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Action)> {
        self.registry.iter().enumerate()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.entries
            .iter()
            .map(|(nonterminal, entry)| {
                let actions = entry.actions.iter().map(|&index| self.registry[index].to_string()).collect();
                (nonterminal.clone(), actions)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::action::{Action, Child};
    use proptest::prelude::*;

    fn col(name: &str) -> Action {
        Action::production("col", vec![Child::Terminal(name.to_string())])
    }

    #[test]
    fn globals_then_appended() {
        let mut space = ActionSpace::new();
        space.insert_global("col", vec![col("a"), col("b"), col("a")]);
        space.declare("number");

        assert_eq!(space.len(), 2);
        assert_eq!(space.actions_for("col").unwrap(), vec![&col("a"), &col("b")]);
        assert_eq!(space.actions_for("number").unwrap(), Vec::<&Action>::new());
        assert!(space.actions_for("missing").is_none());

        let three = space.append(Action::number("number", "3"));
        let seven = space.append(Action::number("number", "7"));
        assert_eq!((three, seven), (2, 3));
        assert_eq!(space.append(Action::number("number", "3")), 2);
        assert_eq!(space.literal_values("number"), vec!["3", "7"]);

        let extra = space.append(col("c"));
        assert_eq!(space.global_actions("col").unwrap().len(), 2);
        assert_eq!(space.linked_actions("col").unwrap(), vec![(extra, &col("c"))]);
        assert!(space.is_global(&col("a")));
        assert!(!space.is_global(&col("c")));
    }

    #[test]
    fn lookup_by_canonical_string() {
        let mut space = ActionSpace::new();
        let index = space.append(Action::string("string", "BOSTON"));
        assert_eq!(space.resolve("string -> [\"'BOSTON'\"]"), space.get(index));
        assert!(space.resolve("string -> [\"'DENVER'\"]").is_none());
    }

    #[test]
    fn sorted_view() {
        let mut space = ActionSpace::new();
        space.append(col("b"));
        space.append(col("a"));
        assert_eq!(space.all_actions(), vec![&col("a"), &col("b")]);
        assert_eq!(space.to_map()["col"], vec!["col -> [\"b\"]", "col -> [\"a\"]"]);
    }

    proptest! {
        #[test]
        fn appending_never_moves_existing_actions(
            batches in prop::collection::vec(prop::collection::vec("[0-9]{1,3}", 0..8), 1..6)
        ) {
            let mut space = ActionSpace::new();
            space.insert_global("col", vec![col("a"), col("b")]);

            for batch in batches {
                let before: Vec<Action> = space.iter().map(|(_, action)| action.clone()).collect();
                for value in batch {
                    space.append(Action::number("number", &value));
                }
                for (index, action) in before.iter().enumerate() {
                    prop_assert_eq!(space.get(index), Some(action));
                    prop_assert_eq!(space.index_of(action), Some(index));
                }
            }
        }
    }
}
