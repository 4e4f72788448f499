//! Shell-style matching of file base names.
//!
//! Supported syntax:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]` match one character from the set or range
//! - `[!abc]` or `[^abc]` match one character NOT in the set
//! - `\x` matches `x` literally

use crate::error::SetupError;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Literal(char),
    AnyOne,
    AnyMany,
    Class { negated: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Literal(l) => *l == c,
            Token::AnyOne => true,
            Token::AnyMany => false,
            Token::Class { negated, ranges } => {
                ranges.iter().any(|(lo, hi)| (*lo..=*hi).contains(&c)) != *negated
            }
        }
    }
}

/// A compiled glob pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Glob {
    tokens: Vec<Token>,
}

impl Glob {
    pub fn new(pattern: &str) -> Result<Self, SetupError> {
        let invalid = |reason: &str| SetupError::Pattern {
            pattern: pattern.to_string(),
            reason: reason.to_string(),
        };

        let mut tokens = Vec::new();
        let mut chars = pattern.chars().peekable();
        while let Some(c) = chars.next() {
            let token = match c {
                '*' => {
                    // consecutive stars are equivalent to one
                    if tokens.last() == Some(&Token::AnyMany) {
                        continue;
                    }
                    Token::AnyMany
                }
                '?' => Token::AnyOne,
                '\\' => Token::Literal(chars.next().ok_or_else(|| invalid("trailing escape"))?),
                '[' => {
                    let negated = matches!(chars.peek(), Some('!' | '^'));
                    if negated {
                        chars.next();
                    }
                    let mut ranges = Vec::new();
                    let mut first = true;
                    loop {
                        let lo = chars.next().ok_or_else(|| invalid("unclosed '['"))?;
                        // a leading ']' is a literal member of the set
                        if lo == ']' && !first {
                            break;
                        }
                        first = false;
                        let mut lookahead = chars.clone();
                        if lookahead.next() == Some('-') && lookahead.peek().is_some_and(|c| *c != ']')
                        {
                            chars.next();
                            let hi = chars.next().ok_or_else(|| invalid("unclosed '['"))?;
                            if hi < lo {
                                return Err(invalid("reversed range in character class"));
                            }
                            ranges.push((lo, hi));
                        } else {
                            ranges.push((lo, lo));
                        }
                    }
                    Token::Class { negated, ranges }
                }
                c => Token::Literal(c),
            };
            tokens.push(token);
        }
        Ok(Self { tokens })
    }

    /// True when the pattern matches the whole of `input`.
    pub fn is_match(&self, input: &str) -> bool {
        let input: Vec<char> = input.chars().collect();
        let tokens = &self.tokens;
        let (mut t, mut i) = (0, 0);
        // (token after the last star, input position it was tried at)
        let mut backtrack: Option<(usize, usize)> = None;

        while i < input.len() {
            match tokens.get(t) {
                Some(Token::AnyMany) => {
                    t += 1;
                    backtrack = Some((t, i));
                    continue;
                }
                Some(tok) if tok.matches(input[i]) => {
                    t += 1;
                    i += 1;
                    continue;
                }
                _ => {}
            }
            match backtrack {
                Some((bt, bi)) => {
                    t = bt;
                    i = bi + 1;
                    backtrack = Some((bt, bi + 1));
                }
                None => return false,
            }
        }
        tokens[t..].iter().all(|tok| *tok == Token::AnyMany)
    }
}
