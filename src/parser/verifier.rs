use std::collections::HashMap;

use itertools::Itertools;
use regex::Regex;

use crate::error_handling::Error;
use crate::grammar::Symbol::{Nonterminal, Pattern};
use super::GrammarErrorType::{InvalidPattern, UndefinedNonterminal};
use super::{Alternative, FileResult, GrammarSyntaxError, GrammarSyntaxErrors, Location, Rewrite};

pub type IntermediateRuleset = HashMap<String, (Rewrite, Location)>;

fn get_alternative_undefined_symbols(alternative: &Alternative, location: &Location, rules: &IntermediateRuleset) -> GrammarSyntaxErrors {
    // Filter out everything but nonterminals and unwrap the text from the
    // nonterminals. Then filter out all the undefined nonterminals.
    alternative.iter()
        .filter_map(|symbol| match symbol {
            Nonterminal(symbol) => Some(symbol),
            _ => None
        })
        .filter(|symbol| !rules.contains_key(*symbol))
        .map(|symbol_text| Error::at(location.to_owned(), UndefinedNonterminal(symbol_text.to_owned())))
        .collect()
}

fn get_alternative_invalid_patterns(alternative: &Alternative, location: &Location) -> GrammarSyntaxErrors {
    alternative.iter()
        .filter_map(|symbol| match symbol {
            Pattern(pattern) => Regex::new(&pattern.source).err(),
            _ => None
        })
        .map(|error| Error::at(location.to_owned(), InvalidPattern(error.to_string())))
        .collect()
}

fn get_rewrite_errors(rewrite: &Rewrite, location: &Location, rules: &IntermediateRuleset) -> GrammarSyntaxErrors {
    // Check each alternative, flattening into all the errors in the rewrite
    rewrite.iter()
        .flat_map(|alternative| {
            get_alternative_undefined_symbols(alternative, location, rules)
                .into_iter()
                .chain(get_alternative_invalid_patterns(alternative, location))
        })
        .collect()
}

fn get_errors(rules: &IntermediateRuleset) -> GrammarSyntaxErrors {
    // Hash map order is arbitrary, so report errors by line
    rules.iter()
        .flat_map(|(_, (rewrite, location))| get_rewrite_errors(rewrite, location, rules))
        .sorted_by_key(|error: &GrammarSyntaxError| error.location.line)
        .collect()
}

pub fn verify_rules(rules: &IntermediateRuleset) -> FileResult<()> {
    let errors = get_errors(rules);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
