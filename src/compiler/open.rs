/*
    Open nonterminals start out with no productions and are filled in with
    values discovered at runtime, one literal alternative per value.
*/

use crate::grammar::action::{format_value, Action, Roles};
use crate::grammar::{Alternative, Symbol};

pub trait OpenNonterminal {
    fn symbol(&self) -> &str;

    // The production a discovered value contributes to the action space
    fn action(&self, value: &str) -> Action;

    // How the value is spelled in matched text
    fn alternative(&self, value: &str) -> Alternative;

    // The value behind a matched spelling
    fn value<'t>(&self, matched: &'t str) -> Option<&'t str>;

    // The value a single-literal alternative spells, if it spells one
    fn matched_value<'t>(&self, alternative: &'t [Symbol]) -> Option<&'t str> {
        match alternative {
            [Symbol::Terminal(matched)] => self.value(matched),
            _ => None,
        }
    }
}

pub fn open_nonterminals(roles: &Roles) -> [Box<dyn OpenNonterminal>; 2] {
    [Box::new(StringLiteral::new(roles)), Box::new(NumberLiteral::new(roles))]
}

// String values are matched with their single quotes, as SQL writes them
pub struct StringLiteral {
    roles: Roles,
}

pub struct NumberLiteral {
    roles: Roles,
}

impl StringLiteral {
    pub fn new(roles: &Roles) -> Self {
        StringLiteral { roles: roles.clone() }
    }
}

impl NumberLiteral {
    pub fn new(roles: &Roles) -> Self {
        NumberLiteral { roles: roles.clone() }
    }
}

impl OpenNonterminal for StringLiteral {
    fn symbol(&self) -> &str {
        &self.roles.string_literal
    }

    fn action(&self, value: &str) -> Action {
        format_value(self.symbol(), value, &self.roles)
    }

    fn alternative(&self, value: &str) -> Alternative {
        vec![Symbol::Terminal(format!("'{}'", value))]
    }

    fn value<'t>(&self, matched: &'t str) -> Option<&'t str> {
        matched.strip_prefix('\'')?.strip_suffix('\'')
    }
}

impl OpenNonterminal for NumberLiteral {
    fn symbol(&self) -> &str {
        &self.roles.number_literal
    }

    fn action(&self, value: &str) -> Action {
        format_value(self.symbol(), value, &self.roles)
    }

    fn alternative(&self, value: &str) -> Alternative {
        vec![Symbol::Terminal(value.to_string())]
    }

    fn value<'t>(&self, matched: &'t str) -> Option<&'t str> {
        Some(matched)
    }
}
