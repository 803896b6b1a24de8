//! Source text to tokens.

use crate::error::{Position, ScriptError};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Keyword(Keyword),

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Assign,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    /// Statement separator: a line break or `;`.
    Newline,
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Print,
    Write,
    Input,
    Let,
    If,
    Then,
    Else,
    End,
    While,
    Do,
    For,
    To,
    Downto,
    And,
    Or,
    Not,
    True,
    False,
}

impl Keyword {
    fn lookup(word: &str) -> Option<Self> {
        Some(match word {
            "print" => Keyword::Print,
            "write" => Keyword::Write,
            "input" => Keyword::Input,
            "let" => Keyword::Let,
            "if" => Keyword::If,
            "then" => Keyword::Then,
            "else" => Keyword::Else,
            "end" => Keyword::End,
            "while" => Keyword::While,
            "do" => Keyword::Do,
            "for" => Keyword::For,
            "to" => Keyword::To,
            "downto" => Keyword::Downto,
            "and" => Keyword::And,
            "or" => Keyword::Or,
            "not" => Keyword::Not,
            "true" => Keyword::True,
            "false" => Keyword::False,
            _ => return None,
        })
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Keyword::Print => "print",
            Keyword::Write => "write",
            Keyword::Input => "input",
            Keyword::Let => "let",
            Keyword::If => "if",
            Keyword::Then => "then",
            Keyword::Else => "else",
            Keyword::End => "end",
            Keyword::While => "while",
            Keyword::Do => "do",
            Keyword::For => "for",
            Keyword::To => "to",
            Keyword::Downto => "downto",
            Keyword::And => "and",
            Keyword::Or => "or",
            Keyword::Not => "not",
            Keyword::True => "true",
            Keyword::False => "false",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub start: Position,
    pub end: Position,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    pos: Position,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().peekable(),
            pos: Position::default(),
        }
    }

    /// Tokenize the whole input. The result always ends with `Eof`.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ScriptError> {
        let mut tokens = Vec::new();

        while let Some(&ch) = self.chars.peek() {
            let start = self.pos;
            let kind = match ch {
                ' ' | '\t' | '\r' => {
                    self.bump();
                    continue;
                }
                '#' => {
                    while self.chars.peek().is_some_and(|&c| c != '\n') {
                        self.bump();
                    }
                    continue;
                }
                '\n' | ';' => {
                    self.bump();
                    TokenKind::Newline
                }
                '0'..='9' => self.number()?,
                '"' => self.string()?,
                c if c.is_ascii_alphabetic() || c == '_' => self.word(),
                '+' => self.single(TokenKind::Plus),
                '-' => self.single(TokenKind::Minus),
                '*' => self.single(TokenKind::Star),
                '/' => self.single(TokenKind::Slash),
                '%' => self.single(TokenKind::Percent),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                ',' => self.single(TokenKind::Comma),
                '=' => self.either('=', TokenKind::Eq, TokenKind::Assign),
                '<' => self.either('=', TokenKind::Le, TokenKind::Lt),
                '>' => self.either('=', TokenKind::Ge, TokenKind::Gt),
                '!' => {
                    self.bump();
                    if self.chars.peek() == Some(&'=') {
                        self.bump();
                        TokenKind::Ne
                    } else {
                        return Err(ScriptError::expected_char(
                            "'=' (after '!')",
                            start,
                            self.pos,
                        ));
                    }
                }
                other => {
                    self.bump();
                    return Err(ScriptError::illegal_char(
                        format!("'{other}'"),
                        start,
                        self.pos,
                    ));
                }
            };
            tokens.push(Token {
                kind,
                start,
                end: self.pos,
            });
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            start: self.pos,
            end: self.pos,
        });
        Ok(tokens)
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next()?;
        self.pos.advance(ch);
        Some(ch)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.bump();
        kind
    }

    /// `first` alone, or `first` followed by `next` as a two-char operator.
    fn either(&mut self, next: char, double: TokenKind, single: TokenKind) -> TokenKind {
        self.bump();
        if self.chars.peek() == Some(&next) {
            self.bump();
            double
        } else {
            single
        }
    }

    fn number(&mut self) -> Result<TokenKind, ScriptError> {
        let start = self.pos;
        let mut text = String::new();
        let mut dots = 0;

        while let Some(&c) = self.chars.peek() {
            if c == '.' {
                if dots == 1 {
                    break;
                }
                dots += 1;
            } else if !c.is_ascii_digit() {
                break;
            }
            text.push(c);
            self.bump();
        }

        if dots == 0 {
            text.parse::<i64>().map(TokenKind::Int).map_err(|_| {
                ScriptError::illegal_char(format!("number too large: {text}"), start, self.pos)
            })
        } else {
            text.parse::<f64>()
                .map(TokenKind::Float)
                .map_err(|_| ScriptError::illegal_char(format!("'{text}'"), start, self.pos))
        }
    }

    fn string(&mut self) -> Result<TokenKind, ScriptError> {
        let start = self.pos;
        self.bump();
        let mut text = String::new();

        loop {
            match self.bump() {
                Some('"') => return Ok(TokenKind::Str(text)),
                Some('\\') => match self.bump() {
                    Some('n') => text.push('\n'),
                    Some('t') => text.push('\t'),
                    Some(c) => text.push(c),
                    None => break,
                },
                Some('\n') | None => break,
                Some(c) => text.push(c),
            }
        }

        Err(ScriptError::expected_char(
            "'\"' to close the string",
            start,
            self.pos,
        ))
    }

    fn word(&mut self) -> TokenKind {
        let mut word = String::new();
        while let Some(&c) = self.chars.peek() {
            if !(c.is_ascii_alphanumeric() || c == '_') {
                break;
            }
            word.push(c);
            self.bump();
        }
        match Keyword::lookup(&word) {
            Some(kw) => TokenKind::Keyword(kw),
            None => TokenKind::Ident(word),
        }
    }
}
