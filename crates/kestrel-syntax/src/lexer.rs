//! Turns source text into a token stream.
//!
//! Input is scanned one physical line at a time. Within a line the rules are
//! tried in priority order with maximal munch: string literals, `==`, single
//! character symbols, then a run of "word" characters that is classified as
//! a whole (reserved word, integer, identifier, or an invalid token).

use std::iter::{Enumerate, Peekable};
use std::str::Chars;

use crate::diagnostics::{Diagnostic, DiagnosticKind, Reporter, Tally};
use crate::error::{LexIssue, SyntaxError};
use crate::token::{Literal, Op, Token, TokenKind, Type};

type Cursor<'a> = Peekable<Enumerate<Chars<'a>>>;

pub const RESERVED_WORDS: [&str; 8] = [
    "int", "string", "boolean", "print", "if", "while", "true", "false",
];

/// Lex `source`, reporting every problem and failing if any error was found.
pub fn lex(source: &str, reporter: &mut dyn Reporter) -> Result<Vec<Token>, SyntaxError> {
    let mut lexer = Lexer::new(reporter);
    lexer.tally.trace("Lexing source code...");
    lexer.run(source);
    lexer.finish()
}

struct Lexer<'r> {
    tally: Tally<'r>,
    tokens: Vec<Token>,
    terminated: bool,
}

impl<'r> Lexer<'r> {
    fn new(reporter: &'r mut dyn Reporter) -> Self {
        Lexer {
            tally: Tally::new(reporter),
            tokens: Vec::new(),
            terminated: false,
        }
    }

    fn run(&mut self, source: &str) {
        let mut lines = source.lines().enumerate();
        while let Some((index, line)) = lines.next() {
            let line_no = index + 1;
            if let Some(rest) = self.scan_line(line, line_no) {
                // `$` ends the program for good; everything after it is dropped
                let trailing = !rest.trim().is_empty()
                    || lines.any(|(_, line)| !line.trim().is_empty());
                if trailing {
                    self.tally.warning(Diagnostic::at(
                        DiagnosticKind::ContentAfterEof,
                        line_no,
                        "content found after the end of program marker '$' was ignored",
                    ));
                }
                return;
            }
        }
    }

    /// Scan one line. Returns the unscanned remainder if `$` was found.
    fn scan_line<'a>(&mut self, line: &'a str, line_no: usize) -> Option<&'a str> {
        let mut chars: Cursor<'_> = line.chars().enumerate().peekable();

        while let Some(&(column, ch)) = chars.peek() {
            match ch {
                c if c.is_whitespace() => {
                    chars.next();
                }
                '"' => self.string(&mut chars, line_no, column),
                '=' => {
                    chars.next();
                    if chars.next_if(|&(_, c)| c == '=').is_some() {
                        self.push(Token::new(TokenKind::Equality, "==", line_no, column));
                    } else {
                        self.push(Token::new(TokenKind::Assign, "=", line_no, column));
                    }
                }
                '+' | '-' => {
                    chars.next();
                    self.push(Token::new(TokenKind::Op, ch.to_string(), line_no, column));
                }
                '(' | ')' | '{' | '}' => {
                    chars.next();
                    let kind = match ch {
                        '(' => TokenKind::OpenParen,
                        ')' => TokenKind::CloseParen,
                        '{' => TokenKind::OpenBracket,
                        _ => TokenKind::CloseBracket,
                    };
                    self.push(Token::new(kind, ch.to_string(), line_no, column));
                }
                '$' => {
                    chars.next();
                    self.push(Token::new(TokenKind::Eof, "$", line_no, column));
                    self.terminated = true;
                    let offset = line
                        .char_indices()
                        .nth(column + 1)
                        .map_or(line.len(), |(offset, _)| offset);
                    return Some(&line[offset..]);
                }
                _ => self.word(&mut chars, line_no, column),
            }
        }

        None
    }

    fn string(&mut self, chars: &mut Cursor<'_>, line_no: usize, column: usize) {
        chars.next();
        let mut value = String::new();
        let mut closed = false;
        for (_, c) in chars.by_ref() {
            if c == '"' {
                closed = true;
                break;
            }
            value.push(c);
        }

        let text = format!("\"{value}\"");
        if !closed {
            let issue = LexIssue::UnterminatedString(text);
            self.error(line_no, DiagnosticKind::UnterminatedString, issue);
        } else if !value.chars().all(|c| c == ' ' || c.is_ascii_graphic()) {
            self.error(line_no, DiagnosticKind::InvalidToken, LexIssue::InvalidToken(text));
        } else {
            let value = Literal::Str(value);
            self.push(Token::literal(TokenKind::String, text, value, line_no, column));
        }
    }

    fn word(&mut self, chars: &mut Cursor<'_>, line_no: usize, column: usize) {
        let mut word = String::new();
        while let Some((_, c)) = chars.next_if(|&(_, c)| !ends_word(c)) {
            word.push(c);
        }

        if Type::from_keyword(&word).is_some() {
            self.push(Token::new(TokenKind::Type, word, line_no, column));
            return;
        }

        let token = match word.as_str() {
            "print" => Token::new(TokenKind::Print, word, line_no, column),
            "while" => Token::new(TokenKind::While, word, line_no, column),
            "if" => Token::new(TokenKind::If, word, line_no, column),
            "true" | "false" => {
                let value = Literal::Bool(word == "true");
                Token::literal(TokenKind::Bool, word, value, line_no, column)
            }
            w if w.chars().all(|c| c.is_ascii_digit()) => match w.parse::<u8>() {
                Ok(n) => Token::literal(TokenKind::Int, word, Literal::Int(n), line_no, column),
                Err(_) => {
                    let issue = LexIssue::IntegerOutOfRange(word);
                    self.error(line_no, DiagnosticKind::IntegerOutOfRange, issue);
                    return;
                }
            },
            w if is_identifier(w) => Token::new(TokenKind::Id, word, line_no, column),
            _ => {
                self.error(line_no, DiagnosticKind::InvalidToken, LexIssue::InvalidToken(word));
                return;
            }
        };
        self.push(token);
    }

    fn push(&mut self, token: Token) {
        self.tally.trace(format!(
            "Found {} '{}' on line {}",
            token.kind, token.text, token.line
        ));
        self.tokens.push(token);
    }

    fn error(&mut self, line_no: usize, kind: DiagnosticKind, issue: LexIssue) {
        self.tally.failure(format!("Invalid token on line {line_no}"));
        self.tally.error(Diagnostic::at(kind, line_no, issue));
    }

    fn finish(mut self) -> Result<Vec<Token>, SyntaxError> {
        if !self.terminated {
            let (line, column) = self
                .tokens
                .last()
                .map_or((1, 0), |t| (t.line, t.column + t.width()));
            self.tally.warning(Diagnostic::at(
                DiagnosticKind::MissingEof,
                line,
                "missing end of program marker '$', one was added",
            ));
            self.tokens.push(Token::new(TokenKind::Eof, "$", line, column));
        }

        tracing::debug!(tokens = self.tokens.len(), errors = self.tally.errors, "lexing finished");

        if self.tally.errors > 0 {
            self.tally.failure("Lex failed!");
            return Err(SyntaxError::Lex(self.tally.errors));
        }
        self.tally.success("Lex successful!");
        Ok(self.tokens)
    }
}

fn ends_word(c: char) -> bool {
    c.is_whitespace() || matches!(c, '"' | '=' | '+' | '-' | '(' | ')' | '{' | '}' | '$')
}

/// `[a-zA-Z][a-zA-Z0-9]*`, excluding reserved words.
pub fn is_identifier(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric())
        && !RESERVED_WORDS.contains(&word)
}

/// Operator symbol of an `OP` token.
pub fn op_of(token: &Token) -> Option<Op> {
    match token.kind {
        TokenKind::Op => token.text.chars().next().and_then(Op::from_symbol),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use quickcheck::quickcheck;

    use super::*;
    use crate::diagnostics::Diagnostics;

    fn kinds(tokens: &[Token]) -> Vec<TokenKind> {
        tokens.iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_lex_block() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("{\n  int a\n  a = 1 + 2\n  print(a)\n}$", &mut diagnostics).unwrap();
        assert_eq!(
            kinds(&tokens),
            vec![
                TokenKind::OpenBracket,
                TokenKind::Type,
                TokenKind::Id,
                TokenKind::Id,
                TokenKind::Assign,
                TokenKind::Int,
                TokenKind::Op,
                TokenKind::Int,
                TokenKind::Print,
                TokenKind::OpenParen,
                TokenKind::Id,
                TokenKind::CloseParen,
                TokenKind::CloseBracket,
                TokenKind::Eof,
            ]
        );
        assert_eq!(tokens[1].line, 2);
        assert_eq!(tokens[2].text, "a");
        assert_eq!(tokens[5].value, Some(Literal::Int(1)));
        assert!(diagnostics.errors.is_empty());
        assert!(diagnostics.warnings.is_empty());
    }

    #[test]
    fn test_equality_beats_assign() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("if (a == b) { a = 2 } $", &mut diagnostics).unwrap();
        assert_eq!(tokens[3].kind, TokenKind::Equality);
        assert_eq!(tokens[8].kind, TokenKind::Assign);
    }

    #[test]
    fn test_multi_character_identifiers_and_keywords() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("{ intx = 3 boolean flag2 flag2 = true } $", &mut diagnostics).unwrap();
        assert_eq!(tokens[1].kind, TokenKind::Id);
        assert_eq!(tokens[1].text, "intx");
        assert_eq!(tokens[4].kind, TokenKind::Type);
        assert_eq!(tokens[5].text, "flag2");
        assert_eq!(tokens[8].value, Some(Literal::Bool(true)));
    }

    #[test]
    fn test_string_literal() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("print(\"hello world\")$", &mut diagnostics).unwrap();
        assert_eq!(tokens[2].kind, TokenKind::String);
        assert_eq!(tokens[2].value, Some(Literal::Str("hello world".to_string())));
        assert_eq!(tokens[3].column, 19);
    }

    #[test]
    fn test_collects_every_invalid_token() {
        let mut diagnostics = Diagnostics::new();
        let result = lex("{ int a# \n a = 1_0 \n print(@) } $", &mut diagnostics);
        assert_eq!(result, Err(SyntaxError::Lex(3)));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::InvalidToken), 3);
        assert_eq!(diagnostics.errors[1].line, Some(2));
    }

    #[test]
    fn test_unterminated_string_and_large_integer() {
        let mut diagnostics = Diagnostics::new();
        let result = lex("{ a = 300 \n print(\"abc) } $", &mut diagnostics);
        assert_eq!(result, Err(SyntaxError::Lex(2)));
        assert_eq!(diagnostics.errors_of(DiagnosticKind::IntegerOutOfRange), 1);
        assert_eq!(diagnostics.errors_of(DiagnosticKind::UnterminatedString), 1);
    }

    #[test]
    fn test_missing_eof_is_appended() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("{ int a }", &mut diagnostics).unwrap();
        assert_eq!(tokens.last().map(|t| t.kind), Some(TokenKind::Eof));
        assert_eq!(diagnostics.warnings_of(DiagnosticKind::MissingEof), 1);
        assert_eq!(diagnostics.warnings.len(), 1);
    }

    #[test]
    fn test_content_after_eof_is_dropped() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("{ int a } $ print(a)\n{ } $ # junk", &mut diagnostics).unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens.iter().filter(|t| t.is(TokenKind::Eof)).count(), 1);
        assert_eq!(diagnostics.warnings_of(DiagnosticKind::ContentAfterEof), 1);
        assert!(diagnostics.errors.is_empty());
    }

    #[test]
    fn test_tokens_serialize() {
        let mut diagnostics = Diagnostics::new();
        let tokens = lex("x = 7 $", &mut diagnostics).unwrap();
        let json = serde_json::to_value(&tokens[2]).unwrap();
        assert_eq!(json["kind"], "INT");
        assert_eq!(json["value"], 7);
        assert_eq!(json["line"], 1);
    }

    quickcheck! {
        fn prop_lexing_is_deterministic(source: String) -> bool {
            let mut first = Diagnostics::new();
            let mut second = Diagnostics::new();
            lex(&source, &mut first) == lex(&source, &mut second)
                && first.errors == second.errors
                && first.warnings == second.warnings
        }

        fn prop_stream_ends_with_single_eof(source: String) -> bool {
            let mut diagnostics = Diagnostics::new();
            match lex(&source, &mut diagnostics) {
                Ok(tokens) => {
                    tokens.last().is_some_and(|t| t.is(TokenKind::Eof))
                        && tokens.iter().filter(|t| t.is(TokenKind::Eof)).count() == 1
                }
                Err(SyntaxError::Lex(n)) => n == diagnostics.errors.len(),
                Err(_) => false,
            }
        }
    }
}
