/*
    This module tracks an incremental leftmost derivation

    A state holds the nonterminals still waiting to be expanded, top last, and
    the actions taken so far. Each pending nonterminal records whether it is
    open, i.e. only expandable with values discovered at runtime. States are persistent: taking an action returns
    a new state sharing structure with the old one, so any number of
    candidate continuations can be explored from the same point.
*/

use std::collections::HashMap;

use im::{HashMap as ImHashMap, HashSet as ImHashSet, Vector};
use itertools::Itertools;
use log::trace;
use thiserror::Error;

use crate::compiler::action_space::ActionSpace;
use crate::compiler::CompiledGrammar;
use crate::grammar::action::Action;

#[derive(Debug, Error, PartialEq, Clone)]
pub enum DerivationError {
    #[error("`{0}` has no entry in the action space")]
    UnknownNonterminal(String),
    #[error("`{found}` cannot expand `{expected}`")]
    ActionNotApplicable { expected: String, found: String },
    #[error("the derivation is complete, `{0}` has nothing to expand")]
    Complete(String),
}

// What the entity linker knows about a discovered value
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityLink {
    pub entity: usize,
    pub score: f32,
    // Linked actions are grouped by this ordinal, lowest first
    pub entity_type: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkingTable {
    links: HashMap<String, EntityLink>,
}

impl LinkingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: &str, link: EntityLink) {
        self.links.insert(value.to_string(), link);
    }

    pub fn get(&self, value: &str) -> Option<&EntityLink> {
        self.links.get(value)
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinkedAction<'a> {
    pub index: usize,
    pub action: &'a Action,
    // None when the linker has never seen the value
    pub link: Option<EntityLink>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LegalActions<'a> {
    pub global: Vec<(usize, &'a Action)>,
    pub linked: Vec<LinkedAction<'a>>,
    pub context: Vec<Action>,
}

impl<'a> LegalActions<'a> {
    pub fn len(&self) -> usize {
        self.global.len() + self.linked.len() + self.context.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Action> {
        self.global
            .iter()
            .map(|(_, action)| *action)
            .chain(self.linked.iter().map(|linked| linked.action))
            .chain(self.context.iter())
    }

    pub fn contains(&self, action: &Action) -> bool {
        self.iter().any(|legal| legal == action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pending {
    pub nonterminal: String,
    pub open: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DerivationState {
    frontier: Vector<Pending>,
    history: Vector<Action>,
    context: ImHashMap<String, Action>,
    open: ImHashSet<String>,
}

impl DerivationState {
    // A derivation where no nonterminal is treated as open
    pub fn new(start_symbol: &str) -> Self {
        Self::with_open(start_symbol, [])
    }

    pub fn with_open<'s>(start_symbol: &str, open: impl IntoIterator<Item = &'s str>) -> Self {
        let open = open.into_iter().map(str::to_string).collect::<ImHashSet<_>>();
        let start = Pending { nonterminal: start_symbol.to_string(), open: open.contains(start_symbol) };
        DerivationState {
            frontier: Vector::unit(start),
            history: Vector::new(),
            context: ImHashMap::new(),
            open,
        }
    }

    // Starts from the grammar's start symbol, with its string and number
    // nonterminals open
    pub fn for_grammar(compiled: &CompiledGrammar) -> Self {
        let roles = compiled.roles();
        Self::with_open(
            compiled.start_symbol(),
            [roles.string_literal.as_str(), roles.number_literal.as_str()],
        )
    }

    // The nonterminal expanded next
    pub fn top(&self) -> Option<&str> {
        self.frontier.back().map(|pending| pending.nonterminal.as_str())
    }

    // Whether the next expansion has to wait for a discovered value
    pub fn awaits_literal(&self) -> bool {
        self.frontier.back().is_some_and(|pending| pending.open)
    }

    pub fn frontier(&self) -> impl Iterator<Item = &str> {
        self.pending().map(|pending| pending.nonterminal.as_str())
    }

    // The frontier with its open markers, top first
    pub fn pending(&self) -> impl Iterator<Item = &Pending> {
        self.frontier.iter().rev()
    }

    pub fn history(&self) -> &Vector<Action> {
        &self.history
    }

    pub fn is_terminal(&self) -> bool {
        self.frontier.is_empty()
    }

    // Makes `action` available for the rest of this derivation only
    pub fn with_context_action(&self, action: Action) -> Self {
        let mut state = self.clone();
        state.context.insert(action.as_str().to_string(), action);
        state
    }

    pub fn context_action(&self, canonical: &str) -> Option<&Action> {
        self.context.get(canonical)
    }

    fn context_actions_for(&self, nonterminal: &str) -> Vec<Action> {
        self.context
            .values()
            .filter(|action| action.nonterminal() == nonterminal)
            .sorted()
            .cloned()
            .collect()
    }

    pub fn legal_actions<'a>(
        &self,
        space: &'a ActionSpace,
        linking: &LinkingTable,
    ) -> Result<LegalActions<'a>, DerivationError> {
        let top = match self.top() {
            Some(top) => top,
            None => return Ok(LegalActions::default()),
        };
        let context = self.context_actions_for(top);
        let (global, linked) = match (space.global_actions(top), space.linked_actions(top)) {
            (Some(global), Some(linked)) => (global, linked),
            _ if !context.is_empty() => (Vec::new(), Vec::new()),
            _ => return Err(DerivationError::UnknownNonterminal(top.to_string())),
        };

        let linked = linked
            .into_iter()
            .map(|(index, action)| LinkedAction {
                index,
                action,
                link: action.literal_value().and_then(|value| linking.get(value)).copied(),
            })
            .sorted_by_key(|linked| (linked.link.map_or(u32::MAX, |link| link.entity_type), linked.index))
            .collect();

        Ok(LegalActions { global, linked, context })
    }

    // A state that is not finished but can never make progress
    pub fn is_stuck(&self, space: &ActionSpace) -> Result<bool, DerivationError> {
        if self.is_terminal() {
            return Ok(false);
        }
        Ok(self.legal_actions(space, &LinkingTable::new())?.is_empty())
    }

    // Expands the top of the frontier. The production's nonterminal children
    // are pushed right to left so the leftmost one is expanded next.
    pub fn take_action(&self, action: &Action) -> Result<DerivationState, DerivationError> {
        let top = self.top().ok_or_else(|| DerivationError::Complete(action.to_string()))?;
        if action.nonterminal() != top {
            return Err(DerivationError::ActionNotApplicable {
                expected: top.to_string(),
                found: action.to_string(),
            });
        }

        let mut state = self.clone();
        state.frontier.pop_back();
        let open = &self.open;
        state.frontier.extend(action.nonterminal_children().rev().map(|child| Pending {
            nonterminal: child.to_string(),
            open: open.contains(child),
        }));
        state.history.push_back(action.clone());
        trace!("took `{}`, {} pending", action, state.frontier.len());
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile, CompiledGrammar, GrammarConfig, LiteralAugmentation};
    use crate::converter::to_action_sequence;
    use crate::grammar::action::Child;
    use proptest::prelude::*;

    const SELECT: &str = "statement = \"SELECT\" ws col\ncol = \"a\" / \"b\"\nws = ~\"\\s*\"\n";

    const PAIRS: &str = "
        pair  = \"(\" ws item ws \",\" ws item ws \")\"
        item  = number / pair / name
        name  = \"x\" / \"y\"
        number = \"\"
        ws    = ~\"\\s*\"
    ";

    fn numbers(values: &[&str]) -> LiteralAugmentation {
        LiteralAugmentation { numbers: values.iter().map(|v| v.to_string()).collect(), ..Default::default() }
    }

    fn pairs() -> CompiledGrammar {
        compile(PAIRS, None, Some(&numbers(&["3", "7", "12"])), &GrammarConfig::default()).unwrap()
    }

    fn strings<'a>(actions: impl Iterator<Item = &'a Action>) -> Vec<&'a str> {
        actions.map(Action::as_str).collect()
    }

    #[test]
    fn expands_leftmost_first() {
        let compiled = compile(SELECT, None, None, &GrammarConfig::default()).unwrap();
        let space = compiled.actions();
        let linking = LinkingTable::new();

        let state = DerivationState::new("statement");
        let legal = state.legal_actions(space, &linking).unwrap();
        assert_eq!(strings(legal.iter()), vec!["statement -> [\"SELECT\", col]"]);

        let state = state.take_action(legal.global[0].1).unwrap();
        assert_eq!(state.top(), Some("col"));
        let legal = state.legal_actions(space, &linking).unwrap();
        assert_eq!(strings(legal.iter()), vec!["col -> [\"a\"]", "col -> [\"b\"]"]);

        let done = state.take_action(legal.global[1].1).unwrap();
        assert!(done.is_terminal());
        assert!(!done.is_stuck(space).unwrap());
        assert_eq!(done.history().len(), 2);
    }

    #[test]
    fn numbers_keep_insertion_order() {
        let compiled = compile(PAIRS, None, Some(&numbers(&["3", "7"])), &GrammarConfig::default()).unwrap();
        let state = DerivationState::new("number");
        let legal = state.legal_actions(compiled.actions(), &LinkingTable::new()).unwrap();

        assert!(legal.global.is_empty());
        assert_eq!(strings(legal.iter()), vec!["number -> [\"3\"]", "number -> [\"7\"]"]);
        assert!(legal.linked.iter().all(|linked| linked.link.is_none()));
    }

    #[test]
    fn linked_actions_are_grouped_by_entity_type() {
        let compiled = pairs();
        let mut linking = LinkingTable::new();
        linking.insert("12", EntityLink { entity: 0, score: 0.5, entity_type: 0 });
        linking.insert("3", EntityLink { entity: 1, score: 0.9, entity_type: 1 });

        let legal = DerivationState::new("number").legal_actions(compiled.actions(), &linking).unwrap();
        let values = legal.linked.iter().filter_map(|linked| linked.action.literal_value()).collect::<Vec<_>>();
        assert_eq!(values, vec!["12", "3", "7"]);
        assert_eq!(legal.linked[0].link.map(|link| link.score), Some(0.5));
        assert_eq!(legal.linked[2].link, None);
    }

    #[test]
    fn unaugmented_literals_get_stuck() {
        let compiled = compile(PAIRS, None, None, &GrammarConfig::default()).unwrap();
        let state = DerivationState::new("number");
        assert!(state.is_stuck(compiled.actions()).unwrap());
        assert!(!DerivationState::new("name").is_stuck(compiled.actions()).unwrap());
    }

    #[test]
    fn open_nonterminals_are_marked() {
        let compiled = compile(PAIRS, None, None, &GrammarConfig::default()).unwrap();
        let state = DerivationState::for_grammar(&compiled);
        assert_eq!(state.top(), Some("pair"));
        assert!(!state.awaits_literal());

        let pair = state.legal_actions(compiled.actions(), &LinkingTable::new()).unwrap().global[0].1;
        let state = state.take_action(pair).unwrap();
        let number = Action::production("item", vec![Child::Nonterminal("number".to_string())]);
        let state = state.take_action(&number).unwrap();

        assert_eq!(state.top(), Some("number"));
        assert!(state.awaits_literal());
        assert!(state.is_stuck(compiled.actions()).unwrap());
        assert_eq!(
            state.pending().map(|pending| (pending.nonterminal.as_str(), pending.open)).collect::<Vec<_>>(),
            vec![("number", true), ("item", false)]
        );
        assert!(!DerivationState::new("number").awaits_literal());
    }

    #[test]
    fn rejects_inconsistent_requests() {
        let compiled = pairs();
        let state = DerivationState::new("pair");
        let wrong = Action::number("number", "3");

        assert_eq!(
            state.take_action(&wrong),
            Err(DerivationError::ActionNotApplicable {
                expected: "pair".to_string(),
                found: "number -> [\"3\"]".to_string(),
            })
        );
        assert_eq!(
            DerivationState::new("missing").legal_actions(compiled.actions(), &LinkingTable::new()),
            Err(DerivationError::UnknownNonterminal("missing".to_string()))
        );

        let done = DerivationState::new("number").take_action(&wrong).unwrap();
        assert!(matches!(done.take_action(&wrong), Err(DerivationError::Complete(_))));
        assert!(done.legal_actions(compiled.actions(), &LinkingTable::new()).unwrap().is_empty());
    }

    #[test]
    fn context_actions_stay_in_their_episode() {
        let compiled = pairs();
        let binding = Action::production("name", vec![Child::Terminal("z".to_string())]);
        let base = DerivationState::new("name");
        let bound = base.with_context_action(binding.clone());

        let legal = bound.legal_actions(compiled.actions(), &LinkingTable::new()).unwrap();
        assert_eq!(legal.context, vec![binding.clone()]);
        assert!(legal.contains(&binding));
        assert_eq!(bound.context_action("name -> [\"z\"]"), Some(&binding));

        let legal = base.legal_actions(compiled.actions(), &LinkingTable::new()).unwrap();
        assert!(!legal.contains(&binding));
        assert!(bound.take_action(&binding).unwrap().is_terminal());
    }

    #[test]
    fn states_are_isolated() {
        let compiled = pairs();
        let space = compiled.actions();
        let state = DerivationState::new("item");
        let legal = state.legal_actions(space, &LinkingTable::new()).unwrap();
        let (first, second) = (legal.global[0].1, legal.global[1].1);

        let left = state.take_action(first).unwrap();
        let right = state.take_action(second).unwrap();
        assert_eq!(state.top(), Some("item"));
        assert!(state.history().is_empty());
        assert_eq!(left.history().back(), Some(first));
        assert_eq!(right.history().back(), Some(second));
        assert_ne!(left.top(), right.top());
    }

    #[test]
    fn nested_conversion_replays_to_completion() {
        let compiled = pairs();
        let actions = to_action_sequence(&compiled, "(3, (x, 12))").unwrap();

        let mut state = DerivationState::new(compiled.start_symbol());
        for action in &actions {
            assert_eq!(state.top(), Some(action.nonterminal()));
            state = state.take_action(action).unwrap();
        }
        assert!(state.is_terminal());
    }

    fn text_strategy() -> impl Strategy<Value = String> {
        let leaf = prop_oneof![
            Just("3".to_string()),
            Just("7".to_string()),
            Just("12".to_string()),
            Just("x".to_string()),
            Just("y".to_string()),
        ];
        leaf.prop_recursive(4, 16, 2, |inner| {
            (inner.clone(), inner, "[ ]{0,2}").prop_map(|(a, b, pad)| format!("({}{},{} {})", pad, a, pad, b))
        })
    }

    proptest! {
        #[test]
        fn converted_sequences_replay(text in text_strategy()) {
            let compiled = pairs();
            let text = if text.starts_with('(') { text } else { format!("({}, x)", text) };
            let actions = to_action_sequence(&compiled, &text).unwrap();
            let space = compiled.actions();
            let linking = LinkingTable::new();

            let mut state = DerivationState::new(compiled.start_symbol());
            for action in &actions {
                let legal = state.legal_actions(space, &linking).unwrap();
                prop_assert!(legal.contains(action));
                prop_assert_eq!(state.top(), Some(action.nonterminal()));
                state = state.take_action(action).unwrap();
            }
            prop_assert!(state.is_terminal());
        }

        #[test]
        fn legal_actions_expand_the_top(choices in prop::collection::vec(0usize..8, 0..40)) {
            let compiled = pairs();
            let space = compiled.actions();
            let linking = LinkingTable::new();

            let mut state = DerivationState::for_grammar(&compiled);
            for choice in choices {
                let legal = state.legal_actions(space, &linking).unwrap();
                let top = state.top().map(str::to_string);
                for action in legal.iter() {
                    prop_assert_eq!(Some(action.nonterminal()), top.as_deref());
                }
                let candidates: Vec<&Action> = legal.iter().collect();
                if candidates.is_empty() {
                    break;
                }
                state = state.take_action(candidates[choice % candidates.len()]).unwrap();
            }
        }
    }
}
