use itertools::{Itertools, PeekingNext};

use crate::grammar::Pattern;
use super::GrammarErrorType;

pub type Result<T> = std::result::Result<T, GrammarErrorType>;

#[derive(PartialEq, Debug, Clone)]
pub enum Token {
    Equals,
    Or,
    Open,
    Close,
    Nonterminal(String),
    Terminal(String),
    Pattern(Pattern),
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// Reads a double-quoted literal. Only \" and \\ are escapes, every other
// backslash is kept so regex sources can be written naturally.
pub fn lex_quoted(line: &mut impl PeekingNext<Item = char>) -> Result<String> {
    line.next(); // Consume open quote
    lex_quoted_body(line)
}

fn lex_quoted_body(line: &mut impl PeekingNext<Item = char>) -> Result<String> {
    let mut text = String::new();

    loop {
        match line.next() {
            None => return Err(GrammarErrorType::UnmatchedQuote),
            Some('"') => return Ok(text),
            Some('\\') => match line.peeking_next(|&c| c == '"' || c == '\\') {
                Some(escaped) => text.push(escaped),
                None => text.push('\\'),
            },
            Some(c) => text.push(c),
        }
    }
}

pub fn lex_terminal(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    Ok(Token::Terminal(lex_quoted(line)?))
}

pub fn lex_pattern(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    line.next(); // Consume tilde
    if line.peeking_next(|&c| c == '"').is_none() {
        return Err(GrammarErrorType::UnexpectedCharacter('~'));
    }
    let source = lex_quoted_body(line)?;

    let mut case_insensitive = false;
    for flag in line.peeking_take_while(|c| c.is_alphabetic()).collect_vec() {
        match flag {
            'i' => case_insensitive = true,
            other => return Err(GrammarErrorType::UnknownFlag(other)),
        }
    }

    Ok(Token::Pattern(Pattern { source, case_insensitive }))
}

pub fn lex_nonterminal(line: &mut impl PeekingNext<Item = char>) -> Result<Token> {
    Ok(Token::Nonterminal(line.peeking_take_while(|&c| is_name_char(c)).collect()))
}

pub fn lex_line(line: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();

    let mut line_chars = line.chars().peekable();

    while let Some(&c) = line_chars.peek() {
        match c {
            '#' => break,
            '=' => {
                line_chars.next();
                tokens.push(Token::Equals);
            }
            '/' | '|' => {
                line_chars.next();
                tokens.push(Token::Or);
            }
            '(' => {
                line_chars.next();
                tokens.push(Token::Open);
            }
            ')' => {
                line_chars.next();
                tokens.push(Token::Close);
            }
            '"' => tokens.push(lex_terminal(&mut line_chars)?),
            '~' => tokens.push(lex_pattern(&mut line_chars)?),
            c if is_name_char(c) => tokens.push(lex_nonterminal(&mut line_chars)?),
            c if c.is_whitespace() => {
                line_chars.next();
            }
            other => return Err(GrammarErrorType::UnexpectedCharacter(other)),
        }
    }

    Ok(tokens)
}
