/*
    This module matches text against a grammar, producing a parse tree

    Choices are ordered: the first alternative that matches wins and is never
    revisited. Rule results are memoized per input offset.
*/

use std::collections::{BTreeSet, HashMap};

use itertools::Itertools;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

use crate::grammar::*;
use crate::parser::GrammarErrorType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Rule(String),
    Terminal(String),
    Pattern(Pattern),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub kind: NodeKind,
    pub start: usize,
    pub end: usize,
    pub children: Vec<Node>,
}

impl Node {
    // The rule this node matched, if it is not an anonymous terminal
    pub fn symbol(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Rule(name) => Some(name),
            _ => None,
        }
    }

    pub fn text<'t>(&self, input: &'t str) -> &'t str {
        &input[self.start..self.end]
    }

    // The grammar symbol this node was matched by
    pub fn as_symbol(&self) -> Symbol {
        match &self.kind {
            NodeKind::Rule(name) => Symbol::Nonterminal(name.clone()),
            NodeKind::Terminal(text) => Symbol::Terminal(text.clone()),
            NodeKind::Pattern(pattern) => Symbol::Pattern(pattern.clone()),
        }
    }
}

#[derive(Debug, Error, PartialEq, Clone)]
#[error("no parse at line {line}, column {column}: expected {}", .expected.iter().join(" or "))]
pub struct ParseError {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
    pub expected: Vec<String>,
}

impl ParseError {
    fn at(text: &str, offset: usize, expected: Vec<String>) -> Self {
        let before = &text[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
        ParseError { offset, line, column, expected }
    }
}

#[derive(Debug, Clone)]
pub struct Matcher {
    grammar: Grammar,
    patterns: HashMap<Pattern, Regex>,
}

fn compile_pattern(pattern: &Pattern) -> Result<Regex, GrammarErrorType> {
    RegexBuilder::new(&format!("^(?:{})", pattern.source))
        .case_insensitive(pattern.case_insensitive)
        .build()
        .map_err(|e| GrammarErrorType::InvalidPattern(e.to_string()))
}

impl Matcher {
    pub fn new(grammar: Grammar) -> Result<Self, GrammarErrorType> {
        let patterns = grammar
            .rules
            .values()
            .flatten()
            .flatten()
            .filter_map(|symbol| match symbol {
                Symbol::Pattern(pattern) => Some(pattern),
                _ => None,
            })
            .unique()
            .map(|pattern| compile_pattern(pattern).map(|regex| (pattern.clone(), regex)))
            .collect::<Result<HashMap<_, _>, _>>()?;

        Ok(Matcher { grammar, patterns })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    // Matches the whole of `text` starting from the grammar's start symbol
    pub fn parse(&self, text: &str) -> Result<Node, ParseError> {
        self.parse_from(&self.grammar.start_symbol, text)
    }

    pub fn parse_from(&self, symbol: &str, text: &str) -> Result<Node, ParseError> {
        let mut run = Run {
            matcher: self,
            text,
            memo: HashMap::new(),
            furthest: 0,
            expected: BTreeSet::new(),
        };

        match run.rule(symbol, 0) {
            Some(node) if node.end == text.len() => Ok(node),
            Some(node) if node.end >= run.furthest => {
                Err(ParseError::at(text, node.end, vec!["end of input".to_string()]))
            }
            _ => {
                let expected = run.expected.into_iter().collect();
                Err(ParseError::at(text, run.furthest, expected))
            }
        }
    }
}

struct Run<'g, 't> {
    matcher: &'g Matcher,
    text: &'t str,
    memo: HashMap<(&'g str, usize), Option<Node>>,
    furthest: usize,
    expected: BTreeSet<String>,
}

impl<'g, 't> Run<'g, 't> {
    fn fail(&mut self, position: usize, symbol: &Symbol) {
        if position > self.furthest {
            self.furthest = position;
            self.expected.clear();
        }
        if position == self.furthest {
            self.expected.insert(symbol.to_string());
        }
    }

    fn rule(&mut self, name: &'g str, position: usize) -> Option<Node> {
        if let Some(result) = self.memo.get(&(name, position)) {
            return result.clone();
        }
        // A left-recursive rule sees this entry and fails instead of looping
        self.memo.insert((name, position), None);

        let matcher = self.matcher;
        let result = matcher.grammar.get(name).and_then(|rewrite| {
            rewrite.iter().find_map(|alternative| {
                self.alternative(alternative, position).map(|(children, end)| Node {
                    kind: NodeKind::Rule(name.to_string()),
                    start: position,
                    end,
                    children,
                })
            })
        });

        self.memo.insert((name, position), result.clone());
        result
    }

    fn alternative(&mut self, alternative: &'g Alternative, start: usize) -> Option<(Vec<Node>, usize)> {
        let mut children = Vec::with_capacity(alternative.len());
        let mut position = start;
        for symbol in alternative {
            let node = self.symbol(symbol, position)?;
            position = node.end;
            children.push(node);
        }
        Some((children, position))
    }

    fn symbol(&mut self, symbol: &'g Symbol, position: usize) -> Option<Node> {
        let text = self.text;
        let rest = &text[position..];
        let matched = match symbol {
            Symbol::Nonterminal(name) => return self.rule(name, position),
            Symbol::Terminal(literal) => rest
                .starts_with(literal.as_str())
                .then(|| (NodeKind::Terminal(literal.clone()), literal.len())),
            Symbol::Pattern(pattern) => self
                .matcher
                .patterns
                .get(pattern)
                .and_then(|regex| regex.find(rest))
                .map(|found| (NodeKind::Pattern(pattern.clone()), found.end())),
        };

        match matched {
            Some((kind, length)) => Some(Node {
                kind,
                start: position,
                end: position + length,
                children: Vec::new(),
            }),
            None => {
                self.fail(position, symbol);
                None
            }
        }
    }
}
