use crate::error::{LexicalError, Pos};
use logos::{FilterResult, Lexer, Logos};
use std::convert::Infallible;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    #[error("invalid character '{0}'")]
    InvalidCharacter(char),
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("integer literal out of range")]
    IntegerOutOfRange,
}

impl LexErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            LexErrorKind::InvalidCharacter(_) => "invalid-character",
            LexErrorKind::UnterminatedString => "unterminated-string",
            LexErrorKind::UnterminatedComment => "unterminated-comment",
            LexErrorKind::IntegerOutOfRange => "integer-out-of-range",
        }
    }
}

// logos produces the default error for input no pattern accepts; the real
// character is filled in by `tokenize`.
impl Default for LexErrorKind {
    fn default() -> Self {
        LexErrorKind::InvalidCharacter('\0')
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexErrorKind)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
pub enum TokenKind {
    // Keywords
    #[token("Wake")]
    Wake,
    #[token("Sleep")]
    Sleep,
    #[token("Box")]
    Box,
    #[token("paws")]
    Paws,
    #[token("Hunt")]
    Hunt,
    #[token("Bring")]
    Bring,
    #[token("Purr")]
    Purr,
    #[token("Hiss")]
    Hiss,
    #[token("Chase")]
    Chase,
    #[token("Meow")]
    Meow,

    // Identifiers and literals
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[regex(r"[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f64>().ok())]
    FloatLiteral(f64),

    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i64>().map_err(|_| LexErrorKind::IntegerOutOfRange))]
    IntLiteral(i64),

    #[token("\"", string_literal)]
    StringLiteral(String),

    /// Matches `/*` so the callback can skip the comment. The payload is
    /// uninhabited, so this variant never exists as a value.
    #[doc(hidden)]
    #[token("/*", block_comment)]
    BlockComment(Infallible),

    // Operators
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,

    // Comparison
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,

    // Logical
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Not,

    // Delimiters
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,

    Eof,
}

/// Scans a string body after the opening quote. On error the lexer is left
/// just before the offending newline so scanning resumes on the next line.
fn string_literal(lex: &mut Lexer<TokenKind>) -> Result<String, LexErrorKind> {
    let rest = lex.remainder();
    let mut value = String::new();
    let mut chars = rest.char_indices();
    let mut outcome = None;

    while let Some((i, c)) = chars.next() {
        match c {
            '"' => {
                outcome = Some((i + 1, true));
                break;
            }
            '\n' => {
                outcome = Some((i, false));
                break;
            }
            '\\' => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, '"')) => value.push('"'),
                Some((_, '\\')) => value.push('\\'),
                Some((j, '\n')) => {
                    outcome = Some((j, false));
                    break;
                }
                Some((_, other)) => value.push(other),
                None => break,
            },
            _ => value.push(c),
        }
    }

    let (consumed, closed) = outcome.unwrap_or((rest.len(), false));
    lex.bump(consumed);
    if closed {
        Ok(value)
    } else {
        Err(LexErrorKind::UnterminatedString)
    }
}

fn block_comment(lex: &mut Lexer<TokenKind>) -> FilterResult<Infallible, LexErrorKind> {
    let rest = lex.remainder();
    match rest.find("*/") {
        Some(end) => {
            lex.bump(end + 2);
            FilterResult::Skip
        }
        None => {
            lex.bump(rest.len());
            FilterResult::Error(LexErrorKind::UnterminatedComment)
        }
    }
}

/// Coarse token classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TokenClass {
    Keyword,
    Identifier,
    IntegerLiteral,
    FloatLiteral,
    StringLiteral,
    Operator,
    Delimiter,
    EndOfInput,
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TokenClass::Keyword => "keyword",
            TokenClass::Identifier => "identifier",
            TokenClass::IntegerLiteral => "integer literal",
            TokenClass::FloatLiteral => "float literal",
            TokenClass::StringLiteral => "string literal",
            TokenClass::Operator => "operator",
            TokenClass::Delimiter => "delimiter",
            TokenClass::EndOfInput => "end of input",
        };
        write!(f, "{}", name)
    }
}

impl TokenKind {
    pub fn class(&self) -> TokenClass {
        match self {
            TokenKind::Wake
            | TokenKind::Sleep
            | TokenKind::Box
            | TokenKind::Paws
            | TokenKind::Hunt
            | TokenKind::Bring
            | TokenKind::Purr
            | TokenKind::Hiss
            | TokenKind::Chase
            | TokenKind::Meow => TokenClass::Keyword,
            TokenKind::Identifier(_) => TokenClass::Identifier,
            TokenKind::IntLiteral(_) => TokenClass::IntegerLiteral,
            TokenKind::FloatLiteral(_) => TokenClass::FloatLiteral,
            TokenKind::StringLiteral(_) => TokenClass::StringLiteral,
            TokenKind::LParen
            | TokenKind::RParen
            | TokenKind::LBrace
            | TokenKind::RBrace
            | TokenKind::Comma
            | TokenKind::Semicolon => TokenClass::Delimiter,
            TokenKind::Eof => TokenClass::EndOfInput,
            TokenKind::BlockComment(never) => match *never {},
            _ => TokenClass::Operator,
        }
    }

    /// Whether this kind may start a statement or close a block. The parser
    /// resynchronizes on these after a syntax error.
    pub fn is_sync_point(&self) -> bool {
        matches!(
            self,
            TokenKind::Box
                | TokenKind::Hunt
                | TokenKind::Purr
                | TokenKind::Chase
                | TokenKind::Bring
                | TokenKind::Meow
                | TokenKind::RBrace
                | TokenKind::Sleep
                | TokenKind::Eof
        )
    }
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenKind::Wake => write!(f, "'Wake'"),
            TokenKind::Sleep => write!(f, "'Sleep'"),
            TokenKind::Box => write!(f, "'Box'"),
            TokenKind::Paws => write!(f, "'paws'"),
            TokenKind::Hunt => write!(f, "'Hunt'"),
            TokenKind::Bring => write!(f, "'Bring'"),
            TokenKind::Purr => write!(f, "'Purr'"),
            TokenKind::Hiss => write!(f, "'Hiss'"),
            TokenKind::Chase => write!(f, "'Chase'"),
            TokenKind::Meow => write!(f, "'Meow'"),
            TokenKind::Identifier(s) => write!(f, "identifier '{}'", s),
            TokenKind::FloatLiteral(n) => write!(f, "float {:?}", n),
            TokenKind::IntLiteral(n) => write!(f, "integer {}", n),
            TokenKind::StringLiteral(s) => write!(f, "string {:?}", s),
            TokenKind::BlockComment(never) => match *never {},
            TokenKind::Plus => write!(f, "'+'"),
            TokenKind::Minus => write!(f, "'-'"),
            TokenKind::Star => write!(f, "'*'"),
            TokenKind::Slash => write!(f, "'/'"),
            TokenKind::Percent => write!(f, "'%'"),
            TokenKind::Equal => write!(f, "'=='"),
            TokenKind::NotEqual => write!(f, "'!='"),
            TokenKind::Less => write!(f, "'<'"),
            TokenKind::Greater => write!(f, "'>'"),
            TokenKind::LessEqual => write!(f, "'<='"),
            TokenKind::GreaterEqual => write!(f, "'>='"),
            TokenKind::And => write!(f, "'&&'"),
            TokenKind::Or => write!(f, "'||'"),
            TokenKind::Not => write!(f, "'!'"),
            TokenKind::LParen => write!(f, "'('"),
            TokenKind::RParen => write!(f, "')'"),
            TokenKind::LBrace => write!(f, "'{{'"),
            TokenKind::RBrace => write!(f, "'}}'"),
            TokenKind::Comma => write!(f, "','"),
            TokenKind::Semicolon => write!(f, "';'"),
            TokenKind::Eof => write!(f, "end of input"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub pos: Pos,
}

/// Maps byte offsets to line/column pairs.
struct LineIndex<'a> {
    source: &'a str,
    starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        LineIndex { source, starts }
    }

    fn pos(&self, offset: usize) -> Pos {
        let line = self.starts.partition_point(|&start| start <= offset);
        let start = self.starts[line - 1];
        let column = self.source[start..offset].chars().count() + 1;
        Pos::new(line, column)
    }
}

/// Tokenizes the whole source. Lexical errors do not stop the scan; every one
/// found is returned together.
pub fn tokenize(source: &str) -> Result<Vec<Token>, Vec<LexicalError>> {
    let index = LineIndex::new(source);
    let mut lex = TokenKind::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    while let Some(result) = lex.next() {
        let span = lex.span();
        let pos = index.pos(span.start);
        match result {
            Ok(kind) => tokens.push(Token {
                kind,
                lexeme: lex.slice().to_string(),
                pos,
            }),
            Err(LexErrorKind::InvalidCharacter(_)) => {
                let c = lex.slice().chars().next().unwrap_or('\0');
                errors.push(LexicalError {
                    kind: LexErrorKind::InvalidCharacter(c),
                    pos,
                });
            }
            Err(kind) => errors.push(LexicalError { kind, pos }),
        }
    }

    debug!(tokens = tokens.len(), errors = errors.len(), "lexing finished");
    if !errors.is_empty() {
        return Err(errors);
    }

    tokens.push(Token {
        kind: TokenKind::Eof,
        lexeme: String::new(),
        pos: index.pos(source.len()),
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .expect("source should lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        assert_eq!(
            kinds("Wake Box catnip paws Sleep Wakeful _x1"),
            vec![
                TokenKind::Wake,
                TokenKind::Box,
                TokenKind::Identifier("catnip".into()),
                TokenKind::Paws,
                TokenKind::Sleep,
                TokenKind::Identifier("Wakeful".into()),
                TokenKind::Identifier("_x1".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn numbers() {
        assert_eq!(
            kinds("42 3.14 0 100.5"),
            vec![
                TokenKind::IntLiteral(42),
                TokenKind::FloatLiteral(3.14),
                TokenKind::IntLiteral(0),
                TokenKind::FloatLiteral(100.5),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#""Hello" "a\tb\n" "say \"meow\"" "back\\slash""#),
            vec![
                TokenKind::StringLiteral("Hello".into()),
                TokenKind::StringLiteral("a\tb\n".into()),
                TokenKind::StringLiteral("say \"meow\"".into()),
                TokenKind::StringLiteral("back\\slash".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn all_operators_and_delimiters() {
        let tokens = tokenize("+ - * / % == != < > <= >= && || ! ( ) { } , ;").unwrap();
        // 14 operators, 6 delimiters, end of input
        assert_eq!(tokens.len(), 21);
        let operators = tokens
            .iter()
            .filter(|t| t.kind.class() == TokenClass::Operator)
            .count();
        let delimiters = tokens
            .iter()
            .filter(|t| t.kind.class() == TokenClass::Delimiter)
            .count();
        assert_eq!(operators, 14);
        assert_eq!(delimiters, 6);
    }

    #[test]
    fn comments_are_skipped() {
        let source = "// line comment\nBox x paws 10\n/* multi\n   line */ Box y paws 20";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Box,
                TokenKind::Identifier("x".into()),
                TokenKind::Paws,
                TokenKind::IntLiteral(10),
                TokenKind::Box,
                TokenKind::Identifier("y".into()),
                TokenKind::Paws,
                TokenKind::IntLiteral(20),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn only_the_final_token_is_end_of_input() {
        let tokens = tokenize("Meow /* a */ (1) /* b */ /**/ // c\n").unwrap();
        let classes: Vec<TokenClass> = tokens.iter().map(|t| t.kind.class()).collect();
        assert_eq!(
            classes,
            vec![
                TokenClass::Keyword,
                TokenClass::Delimiter,
                TokenClass::IntegerLiteral,
                TokenClass::Delimiter,
                TokenClass::EndOfInput,
            ]
        );
    }

    #[test]
    fn positions_are_tracked() {
        let tokens = tokenize("Wake\n  Box x paws 5\nSleep").unwrap();
        let positions: Vec<(usize, usize)> =
            tokens.iter().map(|t| (t.pos.line, t.pos.column)).collect();
        assert_eq!(
            positions,
            vec![(1, 1), (2, 3), (2, 7), (2, 9), (2, 14), (3, 1), (3, 6)]
        );
    }

    #[test]
    fn lexemes_reconstruct_source() {
        let source = "Wake\n  Box total paws (3.5 + x) * 2\n  Meow(\"hi\")\n  Purr (total >= 10) { Meow(total) }\nSleep\n";
        let tokens = tokenize(source).unwrap();
        let joined: String = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        let normalized: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(joined, normalized);
    }

    #[test]
    fn unterminated_string() {
        let errors = tokenize("Meow(\"Hello").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnterminatedString);
        assert_eq!(errors[0].pos, Pos::new(1, 6));
    }

    #[test]
    fn string_cannot_span_lines() {
        let errors = tokenize("Box s paws \"abc\nBox t paws 1").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnterminatedString);
        assert_eq!(errors[0].pos, Pos::new(1, 12));
    }

    #[test]
    fn unterminated_comment() {
        let errors = tokenize("Box x paws 1 /* never closed").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, LexErrorKind::UnterminatedComment);
        assert_eq!(errors[0].pos, Pos::new(1, 14));
    }

    #[test]
    fn collects_every_error() {
        let errors = tokenize("Box a paws 1 @\nBox b paws 2 #\n\"open").unwrap_err();
        let found: Vec<(LexErrorKind, usize, usize)> = errors
            .into_iter()
            .map(|e| (e.kind, e.pos.line, e.pos.column))
            .collect();
        assert_eq!(
            found,
            vec![
                (LexErrorKind::InvalidCharacter('@'), 1, 14),
                (LexErrorKind::InvalidCharacter('#'), 2, 14),
                (LexErrorKind::UnterminatedString, 3, 1),
            ]
        );
    }

    #[test]
    fn integer_overflow() {
        let errors = tokenize("99999999999999999999").unwrap_err();
        assert_eq!(errors[0].kind, LexErrorKind::IntegerOutOfRange);
    }
}
