//! Lexer for the C-like source language.
//!
//! Turns a byte buffer into a stream of tokens with 1-based source
//! positions. `next` consumes, `peek`/`peek2` look ahead without
//! consuming. Multi-character operators are matched maximal-munch
//! (`<<=` beats `<<` beats `<=` beats `<`). Unknown bytes become
//! `Unknown` tokens; the parser surfaces those as syntax errors.

use crate::error::{CompileError, LexErrorKind, SourcePos};

/// Reserved words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Void,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
    Signed,
    Unsigned,
    Const,
    Volatile,
    Static,
    Extern,
    If,
    Else,
    While,
    Do,
    For,
    Return,
    Break,
    Continue,
    Goto,
    Sizeof,
}

fn keyword(ident: &str) -> Option<Keyword> {
    use Keyword::*;
    Some(match ident {
        "void" => Void,
        "char" => Char,
        "short" => Short,
        "int" => Int,
        "long" => Long,
        "float" => Float,
        "double" => Double,
        "signed" => Signed,
        "unsigned" => Unsigned,
        "const" => Const,
        "volatile" => Volatile,
        "static" => Static,
        "extern" => Extern,
        "if" => If,
        "else" => Else,
        "while" => While,
        "do" => Do,
        "for" => For,
        "return" => Return,
        "break" => Break,
        "continue" => Continue,
        "goto" => Goto,
        "sizeof" => Sizeof,
        _ => return None,
    })
}

/// Punctuation and operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Punct {
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Colon,
    Question,
    Dot,
    Ellipsis,
    Arrow,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    Pipe,
    Caret,
    Tilde,
    Bang,
    Assign,
    Lt,
    Gt,
    PlusPlus,
    MinusMinus,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    PercentAssign,
    AmpAssign,
    PipeAssign,
    CaretAssign,
    ShlAssign,
    ShrAssign,
    EqEq,
    NotEq,
    Le,
    Ge,
    Shl,
    Shr,
    AndAnd,
    OrOr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Keyword(Keyword),
    Ident,
    IntLit(i64),
    FloatLit(f64),
    CharLit(u8),
    StrLit(String),
    Punct(Punct),
    Unknown(u8),
    Eof,
}

impl TokenKind {
    fn describe(&self) -> &'static str {
        match self {
            TokenKind::Keyword(_) => "keyword",
            TokenKind::Ident => "identifier",
            TokenKind::IntLit(_) => "int-literal",
            TokenKind::FloatLit(_) => "float-literal",
            TokenKind::CharLit(_) => "char-literal",
            TokenKind::StrLit(_) => "string-literal",
            TokenKind::Punct(_) => "punctuation",
            TokenKind::Unknown(_) => "unknown",
            TokenKind::Eof => "end of input",
        }
    }
}

/// A token with its exact source text and 1-based position.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
    pub col: u32,
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.lexeme.is_empty() {
            write!(f, "{}:{}: {}", self.line, self.col, self.kind.describe())
        } else {
            write!(
                f,
                "{}:{}: {} '{}'",
                self.line,
                self.col,
                self.kind.describe(),
                self.lexeme
            )
        }
    }
}

pub struct Lexer<'s> {
    file: String,
    src: &'s str,
    bytes: &'s [u8],
    pos: usize,
    line: u32,
    col: u32,
    lookahead: Vec<Token>,
}

impl<'s> Lexer<'s> {
    pub fn new(file: &str, source: &'s str) -> Lexer<'s> {
        Lexer {
            file: file.to_string(),
            src: source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            lookahead: Vec::new(),
        }
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    /// Consume and return the next token.
    pub fn next(&mut self) -> Result<Token, CompileError> {
        if self.lookahead.is_empty() {
            self.scan_token()
        } else {
            Ok(self.lookahead.remove(0))
        }
    }

    /// Look at the next token without consuming it.
    pub fn peek(&mut self) -> Result<&Token, CompileError> {
        self.fill(1)?;
        Ok(&self.lookahead[0])
    }

    /// Look two tokens ahead (needed for labels and casts).
    pub fn peek2(&mut self) -> Result<&Token, CompileError> {
        self.fill(2)?;
        Ok(&self.lookahead[1])
    }

    fn fill(&mut self, n: usize) -> Result<(), CompileError> {
        while self.lookahead.len() < n {
            let token = self.scan_token()?;
            self.lookahead.push(token);
        }
        Ok(())
    }

    fn err(&self, line: u32, col: u32, kind: LexErrorKind) -> CompileError {
        CompileError::Lex {
            pos: SourcePos::new(self.file.clone(), line, col),
            kind,
        }
    }

    fn at(&self, offset: usize) -> u8 {
        *self.bytes.get(self.pos + offset).unwrap_or(&0)
    }

    /// Consume one byte, maintaining line/column counters.
    fn bump(&mut self) -> u8 {
        let b = self.bytes[self.pos];
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        b
    }

    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        loop {
            match self.at(0) {
                b' ' | b'\t' | b'\r' | b'\n' if self.pos < self.bytes.len() => {
                    self.bump();
                }
                b'/' if self.at(1) == b'/' => {
                    while self.pos < self.bytes.len() && self.at(0) != b'\n' {
                        self.bump();
                    }
                }
                b'/' if self.at(1) == b'*' => {
                    let (line, col) = (self.line, self.col);
                    self.bump();
                    self.bump();
                    loop {
                        if self.pos >= self.bytes.len() {
                            return Err(self.err(line, col, LexErrorKind::UnterminatedComment));
                        }
                        if self.at(0) == b'*' && self.at(1) == b'/' {
                            self.bump();
                            self.bump();
                            break;
                        }
                        self.bump();
                    }
                }
                _ => return Ok(()),
            }
            if self.pos >= self.bytes.len() {
                return Ok(());
            }
        }
    }

    fn scan_token(&mut self) -> Result<Token, CompileError> {
        self.skip_trivia()?;

        let start = self.pos;
        let line = self.line;
        let col = self.col;

        let token = |kind: TokenKind, lexeme: String| Token {
            kind,
            lexeme,
            line,
            col,
        };

        if self.pos >= self.bytes.len() {
            return Ok(token(TokenKind::Eof, String::new()));
        }

        let b = self.at(0);
        let kind = match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => {
                while matches!(self.at(0), b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_')
                    && self.pos < self.bytes.len()
                {
                    self.bump();
                }
                let text = &self.src[start..self.pos];
                match keyword(text) {
                    Some(kw) => TokenKind::Keyword(kw),
                    None => TokenKind::Ident,
                }
            }
            b'0'..=b'9' => self.scan_number(start, line, col)?,
            b'"' => self.scan_string(line, col)?,
            b'\'' => self.scan_char(line, col)?,
            _ => match self.scan_punct() {
                Some(p) => TokenKind::Punct(p),
                None => {
                    // Unknown byte; consume the whole UTF-8 sequence so
                    // the lexeme stays a valid string slice.
                    let first = self.bump();
                    while self.at(0) & 0xC0 == 0x80 && self.pos < self.bytes.len() {
                        self.bump();
                    }
                    TokenKind::Unknown(first)
                }
            },
        };

        let lexeme = self.src[start..self.pos].to_string();
        Ok(token(kind, lexeme))
    }

    fn scan_number(&mut self, start: usize, line: u32, col: u32) -> Result<TokenKind, CompileError> {
        let mut value: i64 = 0;
        while self.at(0).is_ascii_digit() && self.pos < self.bytes.len() {
            let digit = (self.bump() - b'0') as i64;
            // Overflow is not detected; the value wraps.
            value = value.wrapping_mul(10).wrapping_add(digit);
        }
        if self.at(0) == b'.' {
            if !self.at(1).is_ascii_digit() {
                return Err(self.err(line, col, LexErrorKind::MalformedNumber));
            }
            self.bump();
            while self.at(0).is_ascii_digit() && self.pos < self.bytes.len() {
                self.bump();
            }
            let text = &self.src[start..self.pos];
            let parsed = text
                .parse::<f64>()
                .map_err(|_| self.err(line, col, LexErrorKind::MalformedNumber))?;
            return Ok(TokenKind::FloatLit(parsed));
        }
        Ok(TokenKind::IntLit(value))
    }

    fn unescape(&self, escape: u8, line: u32, col: u32) -> Result<u8, CompileError> {
        Ok(match escape {
            b'n' => b'\n',
            b't' => b'\t',
            b'r' => b'\r',
            b'0' => 0,
            b'\\' => b'\\',
            b'"' => b'"',
            b'\'' => b'\'',
            other => {
                return Err(self.err(line, col, LexErrorKind::InvalidEscape(other as char)));
            }
        })
    }

    fn scan_string(&mut self, line: u32, col: u32) -> Result<TokenKind, CompileError> {
        self.bump(); // opening quote
        let mut value = Vec::new();
        loop {
            if self.pos >= self.bytes.len() || self.at(0) == b'\n' {
                return Err(self.err(line, col, LexErrorKind::UnterminatedString));
            }
            match self.bump() {
                b'"' => break,
                b'\\' => {
                    if self.pos >= self.bytes.len() {
                        return Err(self.err(line, col, LexErrorKind::UnterminatedString));
                    }
                    let escape = self.bump();
                    value.push(self.unescape(escape, line, col)?);
                }
                other => value.push(other),
            }
        }
        // Source is ASCII; escapes only produce ASCII bytes.
        let text = String::from_utf8_lossy(&value).into_owned();
        Ok(TokenKind::StrLit(text))
    }

    fn scan_char(&mut self, line: u32, col: u32) -> Result<TokenKind, CompileError> {
        self.bump(); // opening quote
        if self.pos >= self.bytes.len() || self.at(0) == b'\n' {
            return Err(self.err(line, col, LexErrorKind::UnterminatedChar));
        }
        let value = match self.bump() {
            b'\\' => {
                if self.pos >= self.bytes.len() {
                    return Err(self.err(line, col, LexErrorKind::UnterminatedChar));
                }
                let escape = self.bump();
                self.unescape(escape, line, col)?
            }
            b'\'' => return Err(self.err(line, col, LexErrorKind::UnterminatedChar)),
            other => other,
        };
        if self.at(0) != b'\'' {
            return Err(self.err(line, col, LexErrorKind::UnterminatedChar));
        }
        self.bump(); // closing quote
        Ok(TokenKind::CharLit(value))
    }

    /// Longest-prefix match over the operator table.
    fn scan_punct(&mut self) -> Option<Punct> {
        use Punct::*;
        let (p, len) = match (self.at(0), self.at(1), self.at(2)) {
            (b'<', b'<', b'=') => (ShlAssign, 3),
            (b'>', b'>', b'=') => (ShrAssign, 3),
            (b'.', b'.', b'.') => (Ellipsis, 3),
            (b'<', b'<', _) => (Shl, 2),
            (b'>', b'>', _) => (Shr, 2),
            (b'<', b'=', _) => (Le, 2),
            (b'>', b'=', _) => (Ge, 2),
            (b'=', b'=', _) => (EqEq, 2),
            (b'!', b'=', _) => (NotEq, 2),
            (b'&', b'&', _) => (AndAnd, 2),
            (b'|', b'|', _) => (OrOr, 2),
            (b'+', b'+', _) => (PlusPlus, 2),
            (b'-', b'-', _) => (MinusMinus, 2),
            (b'-', b'>', _) => (Arrow, 2),
            (b'+', b'=', _) => (PlusAssign, 2),
            (b'-', b'=', _) => (MinusAssign, 2),
            (b'*', b'=', _) => (StarAssign, 2),
            (b'/', b'=', _) => (SlashAssign, 2),
            (b'%', b'=', _) => (PercentAssign, 2),
            (b'&', b'=', _) => (AmpAssign, 2),
            (b'|', b'=', _) => (PipeAssign, 2),
            (b'^', b'=', _) => (CaretAssign, 2),
            (b'<', _, _) => (Lt, 1),
            (b'>', _, _) => (Gt, 1),
            (b'=', _, _) => (Assign, 1),
            (b'!', _, _) => (Bang, 1),
            (b'&', _, _) => (Amp, 1),
            (b'|', _, _) => (Pipe, 1),
            (b'^', _, _) => (Caret, 1),
            (b'~', _, _) => (Tilde, 1),
            (b'+', _, _) => (Plus, 1),
            (b'-', _, _) => (Minus, 1),
            (b'*', _, _) => (Star, 1),
            (b'/', _, _) => (Slash, 1),
            (b'%', _, _) => (Percent, 1),
            (b'(', _, _) => (LParen, 1),
            (b')', _, _) => (RParen, 1),
            (b'{', _, _) => (LBrace, 1),
            (b'}', _, _) => (RBrace, 1),
            (b'[', _, _) => (LBracket, 1),
            (b']', _, _) => (RBracket, 1),
            (b';', _, _) => (Semi, 1),
            (b',', _, _) => (Comma, 1),
            (b':', _, _) => (Colon, 1),
            (b'?', _, _) => (Question, 1),
            (b'.', _, _) => (Dot, 1),
            _ => return None,
        };
        for _ in 0..len {
            self.bump();
        }
        Some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LexErrorKind;

    fn lex_all(source: &str) -> Vec<Token> {
        let mut lexer = Lexer::new("test.c", source);
        let mut tokens = Vec::new();
        loop {
            let t = lexer.next().expect("lex");
            let done = t.kind == TokenKind::Eof;
            tokens.push(t);
            if done {
                break;
            }
        }
        tokens
    }

    fn lex_err(source: &str) -> LexErrorKind {
        let mut lexer = Lexer::new("test.c", source);
        loop {
            match lexer.next() {
                Ok(t) if t.kind == TokenKind::Eof => panic!("expected a lex error"),
                Ok(_) => {}
                Err(CompileError::Lex { kind, .. }) => return kind,
                Err(other) => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let tokens = lex_all("int foo while whilex _bar");
        assert_eq!(tokens[0].kind, TokenKind::Keyword(Keyword::Int));
        assert_eq!(tokens[1].kind, TokenKind::Ident);
        assert_eq!(tokens[1].lexeme, "foo");
        assert_eq!(tokens[2].kind, TokenKind::Keyword(Keyword::While));
        assert_eq!(tokens[3].kind, TokenKind::Ident);
        assert_eq!(tokens[3].lexeme, "whilex");
        assert_eq!(tokens[4].kind, TokenKind::Ident);
        assert_eq!(tokens[4].lexeme, "_bar");
    }

    #[test]
    fn test_int_and_float_literals() {
        let tokens = lex_all("0 42 3.25");
        assert_eq!(tokens[0].kind, TokenKind::IntLit(0));
        assert_eq!(tokens[1].kind, TokenKind::IntLit(42));
        assert_eq!(tokens[2].kind, TokenKind::FloatLit(3.25));
    }

    #[test]
    fn test_trailing_dot_is_malformed() {
        assert_eq!(lex_err("1."), LexErrorKind::MalformedNumber);
    }

    #[test]
    fn test_string_escapes() {
        let tokens = lex_all(r#""a\tb\n" "q\"q""#);
        assert_eq!(tokens[0].kind, TokenKind::StrLit("a\tb\n".to_string()));
        assert_eq!(tokens[1].kind, TokenKind::StrLit("q\"q".to_string()));
    }

    #[test]
    fn test_unterminated_string() {
        assert_eq!(lex_err("\"abc"), LexErrorKind::UnterminatedString);
        assert_eq!(lex_err("\"abc\nd\""), LexErrorKind::UnterminatedString);
    }

    #[test]
    fn test_char_literals() {
        let tokens = lex_all(r"'a' '\n' '\0'");
        assert_eq!(tokens[0].kind, TokenKind::CharLit(b'a'));
        assert_eq!(tokens[1].kind, TokenKind::CharLit(b'\n'));
        assert_eq!(tokens[2].kind, TokenKind::CharLit(0));
    }

    #[test]
    fn test_invalid_escape() {
        assert_eq!(lex_err(r#""\q""#), LexErrorKind::InvalidEscape('q'));
    }

    #[test]
    fn test_maximal_munch() {
        let tokens = lex_all("<<= << <= < >>= >> >= > == = ++ + += -> -");
        let expected = [
            Punct::ShlAssign,
            Punct::Shl,
            Punct::Le,
            Punct::Lt,
            Punct::ShrAssign,
            Punct::Shr,
            Punct::Ge,
            Punct::Gt,
            Punct::EqEq,
            Punct::Assign,
            Punct::PlusPlus,
            Punct::Plus,
            Punct::PlusAssign,
            Punct::Arrow,
            Punct::Minus,
        ];
        for (token, punct) in tokens.iter().zip(expected.iter()) {
            assert_eq!(token.kind, TokenKind::Punct(*punct));
        }
    }

    #[test]
    fn test_comments_skipped() {
        let tokens = lex_all("a // line comment\nb /* block\ncomment */ c");
        assert_eq!(tokens[0].lexeme, "a");
        assert_eq!(tokens[1].lexeme, "b");
        assert_eq!(tokens[2].lexeme, "c");
        assert_eq!(tokens[3].kind, TokenKind::Eof);
    }

    #[test]
    fn test_unterminated_block_comment() {
        assert_eq!(lex_err("int /* no close"), LexErrorKind::UnterminatedComment);
    }

    #[test]
    fn test_positions() {
        let tokens = lex_all("a\n  b");
        assert_eq!((tokens[0].line, tokens[0].col), (1, 1));
        assert_eq!((tokens[1].line, tokens[1].col), (2, 3));
    }

    #[test]
    fn test_cursor_monotonic_and_lexeme_exact() {
        // The cursor never moves backwards or past the end, and every
        // token's lexeme is exactly the bytes it consumed.
        let source = "int x = 42; \"s\\n\" 'c' <<= 3.5";
        let mut lexer = Lexer::new("test.c", source);
        loop {
            let before = lexer.pos;
            let token = lexer.next().expect("lex");
            let after = lexer.pos;
            assert!(after >= before);
            assert!(after <= source.len());
            if token.kind == TokenKind::Eof {
                assert!(token.lexeme.is_empty());
                break;
            }
            assert_eq!(&source[after - token.lexeme.len()..after], token.lexeme);
        }
    }

    #[test]
    fn test_unknown_bytes() {
        let tokens = lex_all("a @ b");
        assert_eq!(tokens[1].kind, TokenKind::Unknown(b'@'));
    }

    #[test]
    fn test_non_ascii_is_unknown() {
        let tokens = lex_all("a é b");
        assert!(matches!(tokens[1].kind, TokenKind::Unknown(_)));
        assert_eq!(tokens[2].lexeme, "b");
    }

    #[test]
    fn test_peek_does_not_consume() {
        let mut lexer = Lexer::new("test.c", "a b");
        assert_eq!(lexer.peek().expect("peek").lexeme, "a");
        assert_eq!(lexer.peek2().expect("peek2").lexeme, "b");
        assert_eq!(lexer.next().expect("next").lexeme, "a");
        assert_eq!(lexer.next().expect("next").lexeme, "b");
    }
}
