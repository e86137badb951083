/*
    This module turns text into the sequence of actions that derives it

    The parse tree is walked in pre-order, which is exactly the order a
    leftmost derivation expands nonterminals in, so the root's action comes
    first and no reordering is needed afterwards.
*/

use log::{trace, warn};

use crate::compiler::open::open_nonterminals;
use crate::compiler::CompiledGrammar;
use crate::grammar::action::{format_action, Action};
use crate::matcher::{Node, ParseError};

pub fn to_action_sequence(compiled: &CompiledGrammar, text: &str) -> Result<Vec<Action>, ParseError> {
    if text.is_empty() {
        return Ok(Vec::new());
    }
    let tree = compiled.matcher().parse(text)?;
    let roles = compiled.roles();
    let open = open_nonterminals(roles);

    let mut actions = Vec::new();
    let mut pending: Vec<&Node> = vec![&tree];
    while let Some(node) = pending.pop() {
        let symbol = match node.symbol() {
            Some(symbol) if *symbol != roles.whitespace => symbol,
            _ => continue,
        };
        let children = node.children.iter().map(Node::as_symbol).collect::<Vec<_>>();
        // Literals come back through the same open nonterminal that added them
        let literal = open
            .iter()
            .find(|nonterminal| nonterminal.symbol() == symbol)
            .and_then(|nonterminal| nonterminal.matched_value(&children).map(|value| nonterminal.action(value)));
        actions.push(literal.unwrap_or_else(|| format_action(symbol, &children, roles)));
        pending.extend(node.children.iter().rev());
    }

    trace!("{} actions for `{}`", actions.len(), text);
    Ok(actions)
}

// Converts every text, keeping going past texts the grammar cannot derive.
// Those come back as None: there is no action sequence to learn from.
pub fn convert_batch<S: AsRef<str>>(compiled: &CompiledGrammar, texts: &[S]) -> Vec<Option<Vec<Action>>> {
    texts
        .iter()
        .map(|text| match to_action_sequence(compiled, text.as_ref()) {
            Ok(actions) => Some(actions),
            Err(error) => {
                warn!("no supervision for `{}`: {}", text.as_ref(), error);
                None
            }
        })
        .collect()
}
