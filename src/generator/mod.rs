/*
    This module samples random derivations

    The sampler plays the part of a search: at every step it asks the
    derivation state what is legal and picks one of those actions at random.
*/

use log::debug;
use rand::prelude::*;

use crate::compiler::action_space::ActionSpace;
use crate::derivation::{DerivationError, DerivationState, LinkingTable};
use crate::grammar::action::{Action, Child, Rhs};

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Complete,
    // The derivation reached a nonterminal with no legal actions
    Stuck(String),
    // Stuck on an open nonterminal no value has been discovered for yet
    AwaitingLiterals(String),
    BudgetExhausted,
}

#[derive(Debug, Clone)]
pub struct Sample {
    pub state: DerivationState,
    pub outcome: Outcome,
}

impl Sample {
    pub fn actions(&self) -> impl Iterator<Item = &Action> {
        self.state.history().iter()
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == Outcome::Complete
    }

    pub fn text(&self) -> String {
        yielded_text(self.state.history().iter(), self.state.history().front().map(Action::nonterminal))
    }
}

pub fn sample<R: Rng + ?Sized>(
    start: DerivationState,
    space: &ActionSpace,
    linking: &LinkingTable,
    rng: &mut R,
    max_steps: usize,
) -> Result<Sample, DerivationError> {
    let mut state = start;
    for _ in 0..max_steps {
        if state.is_terminal() {
            return Ok(Sample { state, outcome: Outcome::Complete });
        }
        let legal = state.legal_actions(space, linking)?;
        let candidates = legal.iter().collect::<Vec<_>>();
        let action = match candidates.choose(rng) {
            Some(action) => *action,
            None => {
                let top = state.top().unwrap_or_default().to_string();
                debug!("stuck at `{}` after {} steps", top, state.history().len());
                let outcome = if state.awaits_literal() { Outcome::AwaitingLiterals(top) } else { Outcome::Stuck(top) };
                return Ok(Sample { state, outcome });
            }
        };
        state = state.take_action(action)?;
    }

    let outcome = if state.is_terminal() { Outcome::Complete } else { Outcome::BudgetExhausted };
    Ok(Sample { state, outcome })
}

// Rebuilds the text a leftmost action sequence derives, one token per literal.
// Whitespace is not part of any action, so tokens are joined with single
// spaces; nonterminals that were never expanded are written by name.
pub fn yielded_text<'a>(actions: impl IntoIterator<Item = &'a Action>, start: Option<&str>) -> String {
    let mut actions = actions.into_iter();
    let mut tokens = Vec::new();
    let mut pending = start.map(|start| vec![Child::Nonterminal(start.to_string())]).unwrap_or_default();

    while let Some(child) = pending.pop() {
        match child {
            Child::Terminal(text) if text.is_empty() => {}
            Child::Terminal(text) | Child::Pattern(text) => tokens.push(text),
            Child::Nonterminal(name) => match actions.next().map(Action::rhs) {
                Some(Rhs::Production(children)) => pending.extend(children.iter().rev().cloned()),
                Some(Rhs::Number(value)) => tokens.push(value.clone()),
                Some(Rhs::String(value)) => tokens.push(format!("'{}'", value)),
                None => tokens.push(name),
            },
        }
    }
    tokens.join(" ")
}
