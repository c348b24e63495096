//! Token kinds produced by the lexer.
//!
//! Flowa mixes Python-style indentation blocks with optional braces, so the
//! token stream carries synthetic `Newline`, `Indent`, and `Dedent` tokens in
//! addition to the usual operators, literals, and keywords.

use strum::IntoStaticStr;

/// Kinds of tokens the lexer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr)]
pub enum TokenKind {
    /// A character the lexer could not classify. The parser reports it.
    Illegal,
    Eof,

    // Identifiers and literals
    Ident,
    Int,
    Float,
    Str,

    // Operators
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    PlusPlus,
    MinusMinus,
    /// The pipeline operator `|>`.
    Pipe,
    /// The route arrow `->`.
    Arrow,

    // Delimiters
    Dot,
    Comma,
    Colon,
    Semicolon,
    Lparen,
    Rparen,
    Lbrace,
    Rbrace,
    Lbracket,
    Rbracket,

    // Comparison
    Lt,
    Gt,
    LtEq,
    GtEq,
    Eq,
    NotEq,

    // Layout
    Newline,
    Indent,
    Dedent,

    // Keywords
    Func,
    Def,
    Async,
    Return,
    If,
    Elif,
    Else,
    True,
    False,
    None,
    For,
    While,
    In,
    Break,
    Spawn,
    Await,
    Module,
    Import,
    From,
    Type,
    Service,
    On,
    Get,
    Post,
    Put,
    Delete,
    Ws,
    Use,
    Defer,
}

impl TokenKind {
    /// Returns the keyword kind for an identifier-shaped lexeme, if any.
    #[must_use]
    pub fn keyword(ident: &str) -> Option<Self> {
        let kind = match ident {
            "func" => Self::Func,
            "def" => Self::Def,
            "async" => Self::Async,
            "return" => Self::Return,
            "if" => Self::If,
            "elif" => Self::Elif,
            "else" => Self::Else,
            "True" => Self::True,
            "False" => Self::False,
            "None" => Self::None,
            "for" => Self::For,
            "while" => Self::While,
            "in" => Self::In,
            "break" => Self::Break,
            "spawn" => Self::Spawn,
            "await" => Self::Await,
            "module" => Self::Module,
            "import" => Self::Import,
            "from" => Self::From,
            "type" => Self::Type,
            "service" => Self::Service,
            "on" => Self::On,
            "get" => Self::Get,
            "post" => Self::Post,
            "put" => Self::Put,
            "delete" => Self::Delete,
            "ws" => Self::Ws,
            "use" => Self::Use,
            "defer" => Self::Defer,
            _ => return Option::None,
        };
        Some(kind)
    }

    /// Returns true for the HTTP method keywords accepted in service blocks.
    #[must_use]
    pub fn is_http_method(self) -> bool {
        matches!(self, Self::Get | Self::Post | Self::Put | Self::Delete | Self::Ws)
    }
}

/// A single token with its source lexeme and position.
///
/// The `literal` holds the raw lexeme for identifiers and literals, the
/// decoded text for strings, and is empty for layout tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    /// 1-based source line.
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, literal: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            literal: literal.into(),
            line,
        }
    }

    /// Shorthand for tokens whose kind fully determines them.
    pub fn bare(kind: TokenKind, line: u32) -> Self {
        Self {
            kind,
            literal: String::new(),
            line,
        }
    }

    /// Human-readable name for diagnostics.
    #[must_use]
    pub fn describe(&self) -> &str {
        if self.literal.is_empty() {
            self.kind.into()
        } else {
            &self.literal
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("func"), Some(TokenKind::Func));
        assert_eq!(TokenKind::keyword("None"), Some(TokenKind::None));
        assert_eq!(TokenKind::keyword("elif"), Some(TokenKind::Elif));
        assert_eq!(TokenKind::keyword("none"), None);
        assert_eq!(TokenKind::keyword("x"), None);
    }

    #[test]
    fn test_http_method_kinds() {
        assert!(TokenKind::Get.is_http_method());
        assert!(TokenKind::Ws.is_http_method());
        assert!(!TokenKind::Use.is_http_method());
    }
}
