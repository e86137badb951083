/*
    This module parses grammar description files into a Grammar
*/

mod lexer;
mod verifier;

use std::fs;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use thiserror::Error;

use crate::error_handling::*;
use crate::grammar::*;
use lexer::*;
use verifier::verify_rules;
use verifier::IntermediateRuleset;

#[derive(Debug, Error)]
pub enum GrammarErrorType {
    // Something other than `=` follows the name of a rule
    #[error("Expected `=` after nonterminal")]
    MissingEquals,
    // An `=` somewhere other than after a rule name
    #[error("Unexpected `=` encountered")]
    UnexpectedEquals,
    // The grammar starts with something other than a rule definition
    #[error("Tried to define something other than a nonterminal")]
    MissingNonterminal,
    #[error("Unmatched quotes")]
    UnmatchedQuote,
    #[error("Unmatched parenthesis")]
    UnmatchedParenthesis,
    #[error("Unexpected character `{0}`")]
    UnexpectedCharacter(char),
    #[error("Unknown pattern flag `{0}`")]
    UnknownFlag(char),
    // `a / / b`, `()`, or a rule with nothing after `=`
    #[error("Empty alternative")]
    EmptyAlternative,
    // Every alternative has to be a flat sequence so it can be named by one action
    #[error("A choice nested inside a sequence must be given its own rule")]
    NestedChoice,
    #[error("`{0}` is defined more than once")]
    DuplicateRule(String),
    #[error("Could not find definition for `{0}`")]
    UndefinedNonterminal(String),
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    // Empty or comment-only text leaves nothing to start from
    #[error("Grammar defines no rules")]
    NoRules,
    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),
}

impl ErrorType for GrammarErrorType {}

impl PartialEq for GrammarErrorType {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (GrammarErrorType::FileError(a), GrammarErrorType::FileError(b)) => a.kind() == b.kind(),
            (GrammarErrorType::UnexpectedCharacter(a), GrammarErrorType::UnexpectedCharacter(b)) => a == b,
            (GrammarErrorType::UnknownFlag(a), GrammarErrorType::UnknownFlag(b)) => a == b,
            (GrammarErrorType::DuplicateRule(a), GrammarErrorType::DuplicateRule(b)) => a == b,
            (GrammarErrorType::UndefinedNonterminal(a), GrammarErrorType::UndefinedNonterminal(b)) => a == b,
            (GrammarErrorType::InvalidPattern(a), GrammarErrorType::InvalidPattern(b)) => a == b,
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }
}

pub type GrammarSyntaxError = Error<GrammarErrorType>;
pub type GrammarSyntaxErrors = Errors<GrammarErrorType>;

pub type Result<T> = std::result::Result<T, GrammarErrorType>;
pub type FileResult<T> = std::result::Result<T, GrammarSyntaxErrors>;

// A token together with the line it was found on
type Located = (Token, usize);

#[derive(PartialEq, Debug)]
struct Rule {
    symbol: String,
    rewrite: Rewrite,
    location: Location,
}

// A parenthesised expression before it is flattened into alternatives
#[derive(Debug)]
enum Item {
    Symbol(Symbol),
    Group(Vec<Vec<Item>>),
}

struct RuleParser<'a> {
    tokens: &'a [Located],
    position: usize,
}

impl<'a> RuleParser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.position).map(|(token, _)| token)
    }

    fn line(&self, fallback: usize) -> usize {
        self.tokens.get(self.position).map_or(fallback, |(_, line)| *line)
    }

    fn parse_choice(&mut self) -> Result<Vec<Vec<Item>>> {
        let mut alternatives = vec![self.parse_sequence()?];
        while self.peek() == Some(&Token::Or) {
            self.position += 1;
            alternatives.push(self.parse_sequence()?);
        }
        Ok(alternatives)
    }

    fn parse_sequence(&mut self) -> Result<Vec<Item>> {
        let mut items = Vec::new();
        while let Some(token) = self.peek() {
            let item = match token {
                Token::Nonterminal(name) => Item::Symbol(Symbol::Nonterminal(name.clone())),
                Token::Terminal(text) => Item::Symbol(Symbol::Terminal(text.clone())),
                Token::Pattern(pattern) => Item::Symbol(Symbol::Pattern(pattern.clone())),
                Token::Open => {
                    self.position += 1;
                    let group = self.parse_choice()?;
                    if self.peek() != Some(&Token::Close) {
                        return Err(GrammarErrorType::UnmatchedParenthesis);
                    }
                    Item::Group(group)
                }
                Token::Or | Token::Close => break,
                Token::Equals => return Err(GrammarErrorType::UnexpectedEquals),
            };
            self.position += 1;
            items.push(item);
        }

        if items.is_empty() {
            return Err(GrammarErrorType::EmptyAlternative);
        }
        Ok(items)
    }
}

// Flattens parsed alternatives into a rewrite. An alternative that is nothing
// but a group contributes that group's alternatives; a group inside a longer
// sequence must be a plain sequence itself.
fn flatten_choice(alternatives: Vec<Vec<Item>>) -> Result<Rewrite> {
    let mut rewrite = Rewrite::new();
    for mut items in alternatives {
        if items.len() == 1 {
            if let Some(Item::Group(_)) = items.first() {
                if let Some(Item::Group(group)) = items.pop() {
                    rewrite.extend(flatten_choice(group)?);
                }
                continue;
            }
        }
        rewrite.push(flatten_sequence(items)?);
    }
    Ok(rewrite)
}

fn flatten_sequence(items: Vec<Item>) -> Result<Alternative> {
    let mut alternative = Alternative::new();
    for item in items {
        match item {
            Item::Symbol(symbol) => alternative.push(symbol),
            Item::Group(mut group) => {
                if group.len() != 1 {
                    return Err(GrammarErrorType::NestedChoice);
                }
                if let Some(inner) = group.pop() {
                    alternative.extend(flatten_sequence(inner)?);
                }
            }
        }
    }
    Ok(alternative)
}

fn parse_rewrite(tokens: &[Located], rule_line: usize) -> std::result::Result<Rewrite, GrammarSyntaxError> {
    let mut parser = RuleParser { tokens, position: 0 };
    let located = |parser: &RuleParser, error: GrammarErrorType| -> GrammarSyntaxError {
        Error::at(Location::inline(parser.line(rule_line)), error)
    };

    let alternatives = parser.parse_choice().map_err(|e| located(&parser, e))?;
    match parser.peek() {
        None => {}
        Some(Token::Close) => return Err(located(&parser, GrammarErrorType::UnmatchedParenthesis)),
        Some(_) => return Err(located(&parser, GrammarErrorType::UnexpectedEquals)),
    }
    flatten_choice(alternatives).map_err(|e| located(&parser, e))
}

fn starts_rule(tokens: &[Located], index: usize) -> bool {
    matches!(tokens.get(index), Some((Token::Nonterminal(_), _)))
        && matches!(tokens.get(index + 1), Some((Token::Equals, _)))
}

// Splits the token stream into one slice per rule. A rule runs until the
// next `name =`.
fn split_rules(tokens: &[Located]) -> (Vec<&[Located]>, GrammarSyntaxErrors) {
    let starts = (0..tokens.len()).filter(|&i| starts_rule(tokens, i)).collect_vec();
    let mut errors = GrammarSyntaxErrors::new();

    let first = starts.first().copied().unwrap_or(tokens.len());
    if first > 0 {
        let (token, line) = &tokens[0];
        let error = match token {
            Token::Nonterminal(_) => GrammarErrorType::MissingEquals,
            _ => GrammarErrorType::MissingNonterminal,
        };
        errors.push(Error::at(Location::inline(*line), error));
    }

    let bounds = starts.iter().copied().chain(std::iter::once(tokens.len())).collect_vec();
    let rules = bounds.windows(2).map(|w| &tokens[w[0]..w[1]]).collect();
    (rules, errors)
}

fn parse_rule(tokens: &[Located]) -> std::result::Result<Rule, GrammarSyntaxError> {
    let (symbol, line) = match &tokens[0] {
        (Token::Nonterminal(symbol), line) => (symbol.clone(), *line),
        (_, line) => return Err(Error::at(Location::inline(*line), GrammarErrorType::MissingNonterminal)),
    };
    let rewrite = parse_rewrite(&tokens[2..], line)?;
    Ok(Rule {
        symbol,
        rewrite,
        location: Location::inline(line),
    })
}

fn lex_text(text: &str) -> FileResult<Vec<Located>> {
    let (tokens, errors): (Vec<_>, Vec<_>) = text
        .lines()
        .enumerate()
        .map(|(num, line)| {
            lex_line(line)
                .map(|tokens| tokens.into_iter().map(|t| (t, num + 1)).collect_vec())
                .map_err(|error| Error::at(Location::inline(num + 1), error))
        })
        .partition_result();

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(tokens.into_iter().flatten().collect())
}

// Builds the grammar from its rules, the first rule being the start symbol
fn grammar_from_rules(rule_list: Vec<Rule>) -> FileResult<Grammar> {
    let start_symbol = match rule_list.first() {
        Some(rule) => rule.symbol.clone(),
        None => return Err(vec![Error::at(Location::inline(0), GrammarErrorType::NoRules)]),
    };

    let mut errors = GrammarSyntaxErrors::new();
    let mut test_ruleset = IntermediateRuleset::with_capacity(rule_list.len());
    let mut order = Vec::with_capacity(rule_list.len());
    for rule in rule_list {
        if test_ruleset.contains_key(&rule.symbol) {
            errors.push(Error::at(rule.location, GrammarErrorType::DuplicateRule(rule.symbol)));
            continue;
        }
        order.push(rule.symbol.clone());
        test_ruleset.insert(rule.symbol, (rule.rewrite, rule.location));
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    verify_rules(&test_ruleset)?;

    let mut grammar = Grammar::new(&start_symbol);
    for symbol in order {
        if let Some((rewrite, _)) = test_ruleset.remove(&symbol) {
            grammar.define(&symbol, rewrite);
        }
    }
    Ok(grammar)
}

// Parses grammar text, collecting every syntax error rather than stopping at
// the first one
pub fn parse_str(text: &str) -> FileResult<Grammar> {
    let tokens = lex_text(text)?;
    let (rule_tokens, mut errors) = split_rules(&tokens);

    let (rules, rule_errors): (Vec<_>, Vec<_>) = rule_tokens.into_iter().map(parse_rule).partition_result();
    errors.extend(rule_errors);
    if !errors.is_empty() {
        return Err(errors);
    }

    grammar_from_rules(rules)
}

// Points errors found in inline text at the file the text came from
fn relocate(errors: GrammarSyntaxErrors, path: &Path) -> GrammarSyntaxErrors {
    errors
        .into_iter()
        .map(|e| Error::at(Location::new(path.to_path_buf(), e.location.line), e.error))
        .collect()
}

pub fn parse_file(path: &PathBuf) -> FileResult<Grammar> {
    let text = fs::read_to_string(path)
        .map_err(|e| vec![Error::at(Location::new(path.clone(), 0), GrammarErrorType::from(e))])?;
    parse_str(&text).map_err(|errors| relocate(errors, path))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn s_nonterminal(text: &str) -> Symbol {
        Symbol::Nonterminal(text.to_string())
    }

    fn s_terminal(text: &str) -> Symbol {
        Symbol::Terminal(text.to_string())
    }

    fn located(line: &str) -> Vec<Located> {
        lex_line(line).unwrap().into_iter().map(|t| (t, 1)).collect()
    }

    fn error_kinds(errors: GrammarSyntaxErrors) -> Vec<(usize, GrammarErrorType)> {
        errors.into_iter().map(|e| (e.location.line, e.error)).collect()
    }

    #[test]
    fn parse_normal_rule() {
        let rule = parse_rule(&located("col_refs = (col_ref ws \",\" ws col_refs) / (col_ref)")).unwrap();

        assert_eq!(rule, Rule {
            symbol: "col_refs".to_string(),
            rewrite: vec![
                vec![
                    s_nonterminal("col_ref"),
                    s_nonterminal("ws"),
                    s_terminal(","),
                    s_nonterminal("ws"),
                    s_nonterminal("col_refs"),
                ],
                vec![s_nonterminal("col_ref")],
            ],
            location: Location::inline(1),
        });
    }

    #[test]
    fn groups_flatten() {
        let rule = parse_rule(&located("a = ((\"x\" / \"y\")) / b (c (d)) \"e\"")).unwrap();
        assert_eq!(rule.rewrite, vec![
            vec![s_terminal("x")],
            vec![s_terminal("y")],
            vec![s_nonterminal("b"), s_nonterminal("c"), s_nonterminal("d"), s_terminal("e")],
        ]);
    }

    #[test]
    fn parse_malformed_rules() {
        let kind = |line: &str| parse_rule(&located(line)).unwrap_err().error;

        assert_eq!(kind("a = b (c / d)"), GrammarErrorType::NestedChoice);
        assert_eq!(kind("a = b / / c"), GrammarErrorType::EmptyAlternative);
        assert_eq!(kind("a = ()"), GrammarErrorType::EmptyAlternative);
        assert_eq!(kind("a ="), GrammarErrorType::EmptyAlternative);
        assert_eq!(kind("a = (b c"), GrammarErrorType::UnmatchedParenthesis);
        assert_eq!(kind("a = b c)"), GrammarErrorType::UnmatchedParenthesis);
        assert_eq!(kind("a = b = c"), GrammarErrorType::UnexpectedEquals);
    }

    #[test]
    fn parse_multiline_grammar() {
        let text = "
            # a tiny query language
            statement = \"SELECT\" ws col
            col       = \"a\" /
                        \"b\"
            ws        = ~\"\\s*\"i
        ";
        let grammar = parse_str(text).unwrap();

        let mut rules = HashMap::new();
        rules.insert("statement".to_string(), vec![vec![
            s_terminal("SELECT"),
            s_nonterminal("ws"),
            s_nonterminal("col"),
        ]]);
        rules.insert("col".to_string(), vec![vec![s_terminal("a")], vec![s_terminal("b")]]);
        rules.insert("ws".to_string(), vec![vec![Symbol::Pattern(Pattern {
            source: "\\s*".to_string(),
            case_insensitive: true,
        })]]);

        assert_eq!(grammar.start_symbol, "statement");
        assert_eq!(grammar.rules, rules);
        assert_eq!(grammar.symbols().collect_vec(), vec!["statement", "col", "ws"]);
    }

    #[test]
    fn printed_grammar_parses_back() {
        let text = "statement = query ws \";\"\n\
                    query = (\"(\" ws query ws \")\") / (\"SELECT\" ws name)\n\
                    name = \"a\\\"b\" / \"c\\\\d\" / \"\"\n\
                    ws = ~\"\\s*\"i\n";
        let grammar = parse_str(text).unwrap();
        let printed = grammar.to_string();
        assert_eq!(parse_str(&printed).unwrap(), grammar);
        assert_eq!(parse_str(&printed).unwrap().to_string(), printed);
    }

    #[test]
    fn parse_malformed_grammar() {
        let text = "\"alpha\" = bravo\nbravo = \"x\"\ncharlie = bravo = \"y\"\ndelta = \"unterminated\n";
        assert_eq!(error_kinds(parse_str(text).unwrap_err()), vec![
            (4, GrammarErrorType::UnmatchedQuote),
        ]);

        let text = "\"alpha\" = bravo\nbravo = \"x\"\ncharlie = bravo echo = \"y\" =\n";
        assert_eq!(error_kinds(parse_str(text).unwrap_err()), vec![
            (1, GrammarErrorType::MissingNonterminal),
            (3, GrammarErrorType::UnexpectedEquals),
        ]);

        let text = "a = b\nb = \"x\"\na = \"y\"\n";
        assert_eq!(error_kinds(parse_str(text).unwrap_err()), vec![
            (3, GrammarErrorType::DuplicateRule("a".to_string())),
        ]);
    }

    #[test]
    fn undefined_nonterminals_are_reported() {
        let errors = error_kinds(parse_str("a = b c\nb = \"x\"\n").unwrap_err());
        assert_eq!(errors, vec![(1, GrammarErrorType::UndefinedNonterminal("c".to_string()))]);
    }

    #[test]
    fn grammar_without_rules() {
        for text in ["", "\n   \n", "# nothing but a comment\n# and another\n"] {
            assert_eq!(error_kinds(parse_str(text).unwrap_err()), vec![(0, GrammarErrorType::NoRules)]);
        }
    }

    #[test]
    fn missing_file() {
        let path = PathBuf::from("example_data/does_not_exist.peg");
        let errors = parse_file(&path).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].location.file, path);
        assert!(matches!(errors[0].error, GrammarErrorType::FileError(_)));
    }

    #[test]
    fn parse_example_file() {
        let grammar = parse_file(&PathBuf::from("example_data/select.peg")).unwrap();
        assert_eq!(grammar.start_symbol, "statement");
        assert!(grammar.contains("ws"));
    }
}
