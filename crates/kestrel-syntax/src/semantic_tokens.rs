use tower_lsp::lsp_types::{SemanticToken, SemanticTokenType};

use crate::diagnostics::Diagnostics;
use crate::lexer::lex;
use crate::token::{Token, TokenKind};

/// Token types in legend order. `token_type` in each `SemanticToken` is an
/// index into this list.
pub const LEGEND: [SemanticTokenType; 6] = [
    SemanticTokenType::KEYWORD,
    SemanticTokenType::VARIABLE,
    SemanticTokenType::TYPE,
    SemanticTokenType::STRING,
    SemanticTokenType::NUMBER,
    SemanticTokenType::OPERATOR,
];

pub fn provide_semantic_tokens(source: &str) -> Vec<SemanticToken> {
    let mut sink = Diagnostics::new();
    match lex(source, &mut sink) {
        Ok(tokens) => encode(&tokens),
        Err(_) => Vec::new(),
    }
}

/// Delta-encode `tokens` the way LSP expects: each position is relative to
/// the previous highlighted token.
pub fn encode(tokens: &[Token]) -> Vec<SemanticToken> {
    let mut semantic_tokens = vec![];
    let mut prev_line = 0;
    let mut prev_start = 0;

    for token in tokens {
        let Some(kind) = token_type(token.kind) else {
            continue;
        };

        // lexer lines are 1-based, LSP lines are 0-based
        let line = token.line.saturating_sub(1);
        let delta_line = line - prev_line.min(line);
        let delta_start = if delta_line == 0 {
            token.column - prev_start
        } else {
            token.column
        };

        semantic_tokens.push(SemanticToken {
            delta_line: delta_line as u32,
            delta_start: delta_start as u32,
            length: token.width() as u32,
            token_type: token_type_index(&kind),
            token_modifiers_bitset: 0,
        });

        prev_line = line;
        prev_start = token.column;
    }
    semantic_tokens
}

fn token_type(kind: TokenKind) -> Option<SemanticTokenType> {
    match kind {
        TokenKind::Print | TokenKind::While | TokenKind::If | TokenKind::Bool => {
            Some(SemanticTokenType::KEYWORD)
        }
        TokenKind::Id => Some(SemanticTokenType::VARIABLE),
        TokenKind::Type => Some(SemanticTokenType::TYPE),
        TokenKind::String => Some(SemanticTokenType::STRING),
        TokenKind::Int => Some(SemanticTokenType::NUMBER),
        TokenKind::Op | TokenKind::Assign | TokenKind::Equality => {
            Some(SemanticTokenType::OPERATOR)
        }
        _ => None,
    }
}

fn token_type_index(typ: &SemanticTokenType) -> u32 {
    LEGEND.iter().position(|t| t == typ).unwrap_or(0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semantic_tokens_are_delta_encoded() {
        let tokens = provide_semantic_tokens("{\n  int a\n  a = 5\n} $");
        let data: Vec<_> = tokens
            .iter()
            .map(|t| (t.delta_line, t.delta_start, t.length, t.token_type))
            .collect();
        assert_eq!(
            data,
            vec![
                (1, 2, 3, 2), // int
                (0, 4, 1, 1), // a
                (1, 2, 1, 1), // a
                (0, 2, 1, 5), // =
                (0, 2, 1, 4), // 5
            ]
        );
    }

    #[test]
    fn test_lex_failure_yields_nothing() {
        assert!(provide_semantic_tokens("{ int @ } $").is_empty());
    }
}
