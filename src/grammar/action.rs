/*
    Actions are the canonical, hashable form of a single grammar production:

        nonterminal -> [child_1, child_2, ...]

    A child is a nonterminal name, a quoted literal or a ~"pattern". Literal
    productions of the open nonterminals render as `number -> ["3"]` and
    `string -> ["'BOSTON'"]`, the inner single quotes marking string values.
*/

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use std::sync::Arc;

use itertools::Itertools;
use thiserror::Error;

use super::{quote_literal, Symbol};

// The symbols whose names change how a production is formatted
#[derive(Debug, Clone, PartialEq)]
pub struct Roles {
    pub whitespace: String,
    pub string_literal: String,
    pub number_literal: String,
}

impl Default for Roles {
    fn default() -> Self {
        Roles {
            whitespace: "ws".to_string(),
            string_literal: "string".to_string(),
            number_literal: "number".to_string(),
        }
    }
}

impl Roles {
    pub fn is_open(&self, nonterminal: &str) -> bool {
        nonterminal == self.string_literal || nonterminal == self.number_literal
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Child {
    Nonterminal(String),
    Terminal(String),
    // Rendered ~"source"flags text of a regex terminal
    Pattern(String),
}

impl Child {
    pub fn is_nonterminal(&self) -> bool {
        matches!(self, Child::Nonterminal(_))
    }
}

impl Display for Child {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Child::Nonterminal(name) => write!(f, "{}", name),
            Child::Terminal(text) => write!(f, "{}", quote_literal(text)),
            Child::Pattern(rendered) => write!(f, "{}", rendered),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Rhs {
    Production(Vec<Child>),
    Number(String),
    String(String),
}

impl Display for Rhs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rhs::Production(children) => write!(f, "[{}]", children.iter().join(", ")),
            Rhs::Number(value) => write!(f, "[{}]", quote_literal(value)),
            Rhs::String(value) => write!(f, "[{}]", quote_literal(&format!("'{}'", value))),
        }
    }
}

// Equality, ordering and hashing all go through the canonical string
#[derive(Debug, Clone)]
pub struct Action {
    nonterminal: Arc<str>,
    rhs: Rhs,
    canonical: Arc<str>,
}

impl Action {
    pub fn new(nonterminal: &str, rhs: Rhs) -> Self {
        let canonical = format!("{} -> {}", nonterminal, rhs);
        Action {
            nonterminal: Arc::from(nonterminal),
            rhs,
            canonical: Arc::from(canonical),
        }
    }

    pub fn production(nonterminal: &str, children: Vec<Child>) -> Self {
        Action::new(nonterminal, Rhs::Production(children))
    }

    pub fn number(nonterminal: &str, value: &str) -> Self {
        Action::new(nonterminal, Rhs::Number(value.to_string()))
    }

    pub fn string(nonterminal: &str, value: &str) -> Self {
        Action::new(nonterminal, Rhs::String(value.to_string()))
    }

    pub fn nonterminal(&self) -> &str {
        &self.nonterminal
    }

    pub fn rhs(&self) -> &Rhs {
        &self.rhs
    }

    pub fn as_str(&self) -> &str {
        &self.canonical
    }

    pub fn children(&self) -> &[Child] {
        match &self.rhs {
            Rhs::Production(children) => children,
            _ => &[],
        }
    }

    // The nonterminals this production introduces, left to right
    pub fn nonterminal_children(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.children().iter().filter_map(|child| match child {
            Child::Nonterminal(name) => Some(name.as_str()),
            _ => None,
        })
    }

    // The entity value of a string or number production
    pub fn literal_value(&self) -> Option<&str> {
        match &self.rhs {
            Rhs::Number(value) | Rhs::String(value) => Some(value),
            Rhs::Production(_) => None,
        }
    }
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.canonical == other.canonical
    }
}

impl Eq for Action {}

impl Hash for Action {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.canonical.hash(state)
    }
}

// Lets maps keyed by action be queried with a canonical string
impl Borrow<str> for Action {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl PartialOrd for Action {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Action {
    fn cmp(&self, other: &Self) -> Ordering {
        self.canonical.cmp(&other.canonical)
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.canonical)
    }
}

// Identifiers name nonterminals; anything quoted is a terminal
pub fn is_nonterminal(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

fn strip_single_quotes(text: &str) -> &str {
    if text.len() >= 2 && text.starts_with('\'') && text.ends_with('\'') {
        &text[1..text.len() - 1]
    } else {
        text
    }
}

fn format_child(symbol: &Symbol, roles: &Roles) -> Option<Child> {
    match symbol {
        Symbol::Nonterminal(name) if *name == roles.whitespace => None,
        Symbol::Nonterminal(name) => Some(Child::Nonterminal(name.clone())),
        Symbol::Terminal(text) => Some(Child::Terminal(text.clone())),
        Symbol::Pattern(_) => Some(Child::Pattern(symbol.to_string())),
    }
}

// Formats one right-hand side of `nonterminal`. The whitespace marker never
// appears in an action. A single literal alternative of an open nonterminal
// becomes a string or number production.
pub fn format_action(nonterminal: &str, alternative: &[Symbol], roles: &Roles) -> Action {
    if let [Symbol::Terminal(text)] = alternative {
        if nonterminal == roles.string_literal {
            return Action::string(nonterminal, strip_single_quotes(text));
        }
        if nonterminal == roles.number_literal {
            return Action::number(nonterminal, text);
        }
    }

    let children = alternative.iter().filter_map(|symbol| format_child(symbol, roles)).collect();
    Action::production(nonterminal, children)
}

// Formats a discovered value of an open nonterminal
pub fn format_value(nonterminal: &str, value: &str, roles: &Roles) -> Action {
    if nonterminal == roles.string_literal {
        Action::string(nonterminal, value)
    } else {
        Action::number(nonterminal, value)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ActionParseError {
    #[error("missing ` -> ` in `{0}`")]
    MissingArrow(String),
    #[error("`{0}` is not a nonterminal name")]
    BadNonterminal(String),
    #[error("right-hand side `{0}` is not a bracketed list")]
    MissingBrackets(String),
    #[error("malformed child `{0}`")]
    BadChild(String),
}

// Splits the inside of `[...]` on commas that are not inside quotes
fn split_children(inner: &str) -> Result<Vec<String>, ActionParseError> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' if in_quotes => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(c);
            }
            ',' if !in_quotes => {
                items.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(ActionParseError::BadChild(current));
    }
    if !current.trim().is_empty() || !items.is_empty() {
        items.push(current.trim().to_string());
    }
    Ok(items)
}

fn unquote(item: &str) -> Option<String> {
    let body = item.strip_prefix('"')?.strip_suffix('"')?;
    let mut text = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            text.push(chars.next()?);
        } else {
            text.push(c);
        }
    }
    Some(text)
}

fn parse_child(item: &str) -> Result<Child, ActionParseError> {
    if item.starts_with("~\"") {
        Ok(Child::Pattern(item.to_string()))
    } else if item.starts_with('"') {
        unquote(item).map(Child::Terminal).ok_or_else(|| ActionParseError::BadChild(item.to_string()))
    } else if is_nonterminal(item) {
        Ok(Child::Nonterminal(item.to_string()))
    } else {
        Err(ActionParseError::BadChild(item.to_string()))
    }
}

// Parses a canonical action string. Every right-hand side comes back as a
// production; literal productions compare equal to the string and number
// actions that render the same way.
impl FromStr for Action {
    type Err = ActionParseError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (nonterminal, rhs) = text
            .split_once(" -> ")
            .ok_or_else(|| ActionParseError::MissingArrow(text.to_string()))?;
        if !is_nonterminal(nonterminal) {
            return Err(ActionParseError::BadNonterminal(nonterminal.to_string()));
        }
        let inner = rhs
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| ActionParseError::MissingBrackets(rhs.to_string()))?;
        let children = split_children(inner)?
            .iter()
            .map(|item| parse_child(item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Action::production(nonterminal, children))
    }
}
