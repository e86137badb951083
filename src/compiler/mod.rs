/*
    This module compiles grammar text into a matcher and its action space

    Compilation happens once per grammar and name tables. Literal values are
    added afterwards with `augment`, which only ever appends to the action
    space, so a compiled grammar can be cloned per session and extended there.
*/

pub mod action_space;
pub mod open;

use std::collections::BTreeMap;
use std::path::PathBuf;

use itertools::Itertools;
use log::debug;
use thiserror::Error;

use crate::error_handling::{self, Location};
use crate::grammar::action::{format_action, Roles};
use crate::grammar::*;
use crate::matcher::Matcher;
use crate::parser::{self, GrammarSyntaxErrors};
use action_space::ActionSpace;
use open::open_nonterminals;

// Container name to member names, e.g. table to columns
pub type NameTables = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq)]
pub struct GrammarConfig {
    // Defaults to the first rule of the grammar
    pub start_symbol: Option<String>,
    pub roles: Roles,
    // Ranges over `container.member` pairs from the name tables
    pub member_rule: String,
    // Ranges over container names
    pub container_rule: String,
    pub wildcard: Option<String>,
    // Numbers every session can use without discovering them
    pub default_numbers: Vec<String>,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        GrammarConfig {
            start_symbol: None,
            roles: Roles::default(),
            member_rule: "col_ref".to_string(),
            container_rule: "table_name".to_string(),
            wildcard: Some("*".to_string()),
            default_numbers: Vec::new(),
        }
    }
}

impl GrammarConfig {
    pub fn sql() -> Self {
        GrammarConfig {
            start_symbol: Some("statement".to_string()),
            default_numbers: vec!["0".to_string(), "1".to_string()],
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AugmentOrder {
    #[default]
    AsGiven,
    // Each batch is sorted before it is appended
    Sorted,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LiteralAugmentation {
    pub strings: Vec<String>,
    pub numbers: Vec<String>,
    pub order: AugmentOrder,
}

impl LiteralAugmentation {
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.numbers.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("invalid grammar:\n{}", .0.iter().join("\n"))]
    Syntax(GrammarSyntaxErrors),
    #[error("start symbol `{0}` is not defined")]
    UnknownStart(String),
    #[error("`{0}` is referenced but never defined")]
    UndefinedNonterminal(String),
    #[error("`{name}` in name table `{container}` cannot be written as a grammar literal")]
    InvalidName { container: String, name: String },
    #[error("`{value}` cannot be written as a literal of `{symbol}`")]
    InvalidLiteral { symbol: String, value: String },
    #[error("`{0}` is not defined, so it cannot take literal values")]
    NotOpen(String),
    #[error("`{0}` may only have literal alternatives")]
    OpenRuleNotLiteral(String),
}

impl From<GrammarSyntaxErrors> for CompileError {
    fn from(errors: GrammarSyntaxErrors) -> Self {
        CompileError::Syntax(errors)
    }
}

impl From<parser::GrammarErrorType> for CompileError {
    fn from(error: parser::GrammarErrorType) -> Self {
        CompileError::Syntax(vec![error_handling::Error::at(Location::default(), error)])
    }
}

// Quotes and backslashes are escaped when the grammar is printed, but line
// breaks and other control characters have no literal spelling
fn writable(text: &str) -> bool {
    !text.is_empty() && !text.chars().any(char::is_control)
}

fn is_placeholder(rewrite: &Rewrite) -> bool {
    match rewrite.as_slice() {
        [alternative] => matches!(alternative.as_slice(), [Symbol::Terminal(text)] if text.is_empty()),
        _ => false,
    }
}

// Orders by the literal contents rather than the printed text, so a literal
// always comes before any literal it is a prefix of
fn contents(alternative: &Alternative) -> Vec<&str> {
    alternative
        .iter()
        .map(|symbol| match symbol {
            Symbol::Terminal(text) | Symbol::Nonterminal(text) => text.as_str(),
            Symbol::Pattern(pattern) => pattern.source.as_str(),
        })
        .collect()
}

fn reverse_sorted(alternatives: Vec<Alternative>) -> Rewrite {
    alternatives
        .into_iter()
        .sorted_by(|a, b| contents(b).cmp(&contents(a)))
        .dedup()
        .collect()
}

// Builds the member and container rules from the name tables. Alternatives
// are sorted in reverse so the rules print the same way every time, and a
// literal that is a prefix of another is always tried after it.
fn name_table_rules(tables: &NameTables, config: &GrammarConfig) -> Result<(Rewrite, Rewrite), CompileError> {
    let ws = Symbol::Nonterminal(config.roles.whitespace.clone());
    let mut members: Vec<Alternative> = config
        .wildcard
        .iter()
        .map(|wildcard| vec![Symbol::Terminal(wildcard.clone())])
        .collect();
    let mut containers = Vec::with_capacity(tables.len());

    for (container, names) in tables {
        if !writable(container) {
            return Err(CompileError::InvalidName { container: container.clone(), name: container.clone() });
        }
        containers.push(vec![Symbol::Terminal(container.clone())]);

        for name in names {
            if !writable(name) {
                return Err(CompileError::InvalidName { container: container.clone(), name: name.clone() });
            }
            members.push(vec![
                Symbol::Terminal(container.clone()),
                ws.clone(),
                Symbol::Terminal(".".to_string()),
                ws.clone(),
                Symbol::Terminal(name.clone()),
            ]);
        }
    }

    Ok((reverse_sorted(members), reverse_sorted(containers)))
}

fn check_references(grammar: &Grammar) -> Result<(), CompileError> {
    let undefined = grammar
        .rules_in_order()
        .flat_map(|(_, rewrite)| rewrite.iter().flatten())
        .find_map(|symbol| match symbol {
            Symbol::Nonterminal(name) if !grammar.contains(name) => Some(name.clone()),
            _ => None,
        });
    match undefined {
        Some(name) => Err(CompileError::UndefinedNonterminal(name)),
        None => Ok(()),
    }
}

#[derive(Debug, Clone)]
pub struct CompiledGrammar {
    config: GrammarConfig,
    matcher: Matcher,
    actions: ActionSpace,
}

pub fn compile(
    base_grammar: &str,
    tables: Option<&NameTables>,
    literals: Option<&LiteralAugmentation>,
    config: &GrammarConfig,
) -> Result<CompiledGrammar, CompileError> {
    compile_grammar(parser::parse_str(base_grammar)?, tables, literals, config)
}

// Syntax errors point at lines of the file
pub fn compile_file(
    path: &PathBuf,
    tables: Option<&NameTables>,
    literals: Option<&LiteralAugmentation>,
    config: &GrammarConfig,
) -> Result<CompiledGrammar, CompileError> {
    compile_grammar(parser::parse_file(path)?, tables, literals, config)
}

fn compile_grammar(
    mut grammar: Grammar,
    tables: Option<&NameTables>,
    literals: Option<&LiteralAugmentation>,
    config: &GrammarConfig,
) -> Result<CompiledGrammar, CompileError> {
    let roles = &config.roles;
    let open = open_nonterminals(roles);

    if let Some(start) = &config.start_symbol {
        if !grammar.contains(start) {
            return Err(CompileError::UnknownStart(start.clone()));
        }
        grammar.start_symbol = start.clone();
    }

    if let Some(tables) = tables {
        let (members, containers) = name_table_rules(tables, config)?;
        debug!(
            "synthesized {} `{}` and {} `{}` alternatives",
            members.len(),
            config.member_rule,
            containers.len(),
            config.container_rule
        );
        grammar.define(&config.member_rule, members);
        grammar.define(&config.container_rule, containers);
    }

    // Placeholder rules have no productions until something fills them in
    let placeholders = grammar
        .rules_in_order()
        .filter(|(_, rewrite)| is_placeholder(rewrite))
        .map(|(symbol, _)| symbol.clone())
        .filter(|symbol| roles.is_open(symbol) || *symbol == config.member_rule || *symbol == config.container_rule)
        .collect_vec();
    for symbol in placeholders {
        grammar.define(&symbol, Rewrite::new());
    }
    check_references(&grammar)?;

    let mut actions = ActionSpace::new();
    let mut initial = LiteralAugmentation::default();
    for (symbol, rewrite) in grammar.rules_in_order() {
        if *symbol == roles.whitespace {
            continue;
        }
        if let Some(nonterminal) = open.iter().find(|candidate| candidate.symbol() == symbol.as_str()) {
            // Literal alternatives already written in the grammar become values
            actions.declare(symbol);
            for alternative in rewrite {
                let value = nonterminal
                    .matched_value(alternative)
                    .ok_or_else(|| CompileError::OpenRuleNotLiteral(symbol.clone()))?;
                if *symbol == roles.string_literal {
                    initial.strings.push(value.to_string());
                } else {
                    initial.numbers.push(value.to_string());
                }
            }
            continue;
        }
        let productions = rewrite.iter().map(|alternative| format_action(symbol, alternative, roles)).sorted().dedup();
        actions.insert_global(symbol, productions);
    }
    debug!("compiled {} rules into {} global actions", grammar.len(), actions.len());

    let mut compiled = CompiledGrammar {
        config: config.clone(),
        matcher: Matcher::new(grammar)?,
        actions,
    };

    if compiled.grammar().contains(&roles.number_literal) {
        initial.numbers.extend(config.default_numbers.iter().cloned());
    }
    compiled.augment(&initial)?;
    if let Some(literals) = literals {
        compiled.augment(literals)?;
    }
    Ok(compiled)
}

impl CompiledGrammar {
    pub fn config(&self) -> &GrammarConfig {
        &self.config
    }

    pub fn roles(&self) -> &Roles {
        &self.config.roles
    }

    pub fn grammar(&self) -> &Grammar {
        self.matcher.grammar()
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn actions(&self) -> &ActionSpace {
        &self.actions
    }

    pub fn start_symbol(&self) -> &str {
        &self.grammar().start_symbol
    }

    // The grammar as text, including every literal added so far
    pub fn grammar_text(&self) -> String {
        self.grammar().to_string()
    }

    // Appends discovered string and number values. Values already present
    // keep their index; the open rules are rebuilt so the new values can be
    // matched as well as enumerated.
    pub fn augment(&mut self, literals: &LiteralAugmentation) -> Result<(), CompileError> {
        if literals.is_empty() {
            return Ok(());
        }

        let open = open_nonterminals(self.roles());
        let batches = [&literals.strings, &literals.numbers];
        for (nonterminal, values) in open.iter().zip(batches) {
            if values.is_empty() {
                continue;
            }
            let symbol = nonterminal.symbol();
            if !self.grammar().contains(symbol) {
                return Err(CompileError::NotOpen(symbol.to_string()));
            }
            if let Some(value) = values.iter().find(|value| !writable(value)) {
                return Err(CompileError::InvalidLiteral { symbol: symbol.to_string(), value: value.clone() });
            }

            let ordered = match literals.order {
                AugmentOrder::AsGiven => values.iter().collect_vec(),
                AugmentOrder::Sorted => values.iter().sorted().collect_vec(),
            };
            let before = self.actions.len();
            for value in ordered {
                self.actions.append(nonterminal.action(value));
            }
            debug!("`{}` gained {} new values", symbol, self.actions.len() - before);
        }

        let mut grammar = self.grammar().clone();
        for nonterminal in &open {
            let symbol = nonterminal.symbol();
            if !grammar.contains(symbol) {
                continue;
            }
            let alternatives = self
                .actions
                .literal_values(symbol)
                .into_iter()
                .map(|value| nonterminal.alternative(value))
                .collect();
            grammar.define(symbol, reverse_sorted(alternatives));
        }
        self.matcher = Matcher::new(grammar)?;
        Ok(())
    }
}
