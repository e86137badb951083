/*
    This module is for storing and manipulating grammars
*/

pub mod action;

use std::collections::HashMap;
use std::fmt::Display;

use itertools::Itertools;

// A regular expression terminal, written ~"source"flags
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub struct Pattern {
    pub source: String,
    pub case_insensitive: bool,
}

// The base unit in a grammar rule
#[derive(Debug, PartialEq, Eq, Clone, Hash)]
pub enum Symbol {
    Terminal(String),
    Pattern(Pattern),
    Nonterminal(String),
}

// The symbols in a single alternative
pub type Alternative = Vec<Symbol>;

// The alternatives of a rewrite rule, tried in order
pub type Rewrite = Vec<Alternative>;

// Wraps a literal in double quotes, escaping the two characters the grammar
// lexer treats specially
pub fn quote_literal(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('"');
    for c in text.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

impl Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Symbol::Terminal(text) => write!(f, "{}", quote_literal(text)),
            Symbol::Pattern(pattern) => write!(
                f,
                "~{}{}",
                quote_literal(&pattern.source),
                if pattern.case_insensitive { "i" } else { "" }
            ),
            Symbol::Nonterminal(name) => write!(f, "{}", name),
        }
    }
}

pub fn alternative_text(alternative: &Alternative) -> String {
    alternative.iter().join(" ")
}

// A rule with no alternatives prints as the empty placeholder `""`
pub fn rewrite_text(rewrite: &Rewrite) -> String {
    if rewrite.is_empty() {
        return quote_literal("");
    }
    if rewrite.len() == 1 {
        return alternative_text(&rewrite[0]);
    }
    rewrite
        .iter()
        .map(|alternative| {
            if alternative.len() == 1 {
                alternative_text(alternative)
            } else {
                format!("({})", alternative_text(alternative))
            }
        })
        .join(" / ")
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Grammar {
    pub start_symbol: String,
    pub rules: HashMap<String, Rewrite>,
    // Definition order, kept so the grammar prints the same way every time
    order: Vec<String>,
}

impl Grammar {
    pub fn new(start_symbol: &str) -> Self {
        Grammar {
            start_symbol: start_symbol.to_string(),
            rules: HashMap::new(),
            order: Vec::new(),
        }
    }

    // Defines a rule, replacing any previous definition in place
    pub fn define(&mut self, symbol: &str, rewrite: Rewrite) {
        if self.rules.insert(symbol.to_string(), rewrite).is_none() {
            self.order.push(symbol.to_string());
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&Rewrite> {
        self.rules.get(symbol)
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.rules.contains_key(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    pub fn rules_in_order(&self) -> impl Iterator<Item = (&String, &Rewrite)> {
        self.order.iter().filter_map(|symbol| self.rules.get(symbol).map(|rewrite| (symbol, rewrite)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

// Serializes the grammar back into the text format the parser reads. The start
// symbol is always written first.
impl Display for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let start_first = self
            .rules_in_order()
            .filter(|(symbol, _)| **symbol == self.start_symbol)
            .chain(self.rules_in_order().filter(|(symbol, _)| **symbol != self.start_symbol));
        for (symbol, rewrite) in start_first {
            writeln!(f, "{} = {}", symbol, rewrite_text(rewrite))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoting_escapes_specials() {
        assert_eq!(quote_literal("SELECT"), "\"SELECT\"");
        assert_eq!(quote_literal("a\"b\\c"), "\"a\\\"b\\\\c\"");
    }

    #[test]
    fn rewrite_rendering() {
        let rewrite = vec![
            vec![
                Symbol::Terminal("(".to_string()),
                Symbol::Nonterminal("ws".to_string()),
                Symbol::Nonterminal("query".to_string()),
            ],
            vec![Symbol::Nonterminal("query".to_string())],
        ];
        assert_eq!(rewrite_text(&rewrite), "(\"(\" ws query) / query");

        let ws = vec![vec![Symbol::Pattern(Pattern { source: "\\s*".to_string(), case_insensitive: true })]];
        assert_eq!(rewrite_text(&ws), "~\"\\\\s*\"i");
        assert_eq!(rewrite_text(&Rewrite::new()), "\"\"");
    }

    #[test]
    fn define_keeps_order_and_replaces_in_place() {
        let mut grammar = Grammar::new("a");
        grammar.define("b", vec![vec![Symbol::Terminal("x".to_string())]]);
        grammar.define("a", vec![vec![Symbol::Nonterminal("b".to_string())]]);
        grammar.define("b", vec![vec![Symbol::Terminal("y".to_string())]]);

        assert_eq!(grammar.symbols().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(grammar.to_string(), "a = b\nb = \"y\"\n");
    }
}
