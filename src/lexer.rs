//! Character-to-token lexer for COOL source.
//!
//! Turns raw source text into the token stream [`crate::parser::Parser`]
//! consumes, handling whitespace, comments, string escapes and the
//! keyword/identifier split along the way.

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    Class,
    Inherits,
    If,
    Then,
    Else,
    Fi,
    While,
    Loop,
    Pool,
    Let,
    In,
    Case,
    Of,
    Esac,
    New,
    IsVoid,
    Not,
    Self_,
    SelfType,

    ObjectId(String),
    TypeId(String),
    IntLiteral(i32),
    StringLiteral(Vec<u8>),
    BoolLiteral(bool),

    LBrace,
    RBrace,
    LParen,
    RParen,
    Colon,
    Semi,
    Comma,
    At,
    Dot,
    Assign,    // <-
    Arrow,     // =>
    Plus,
    Minus,
    Star,
    Slash,
    Tilde,
    Lt,
    Le,
    Eq,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-indexed source line, matching the `"<file>", line N:` diagnostic format.
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: u32,
}

pub fn lex(source: &str) -> (Vec<Token>, Vec<LexError>) {
    Lexer::new(source).run()
}

struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    src: &'a str,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'a> Lexer<'a> {
    fn new(source: &'a str) -> Self {
        Lexer {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            src: source,
            tokens: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn run(mut self) -> (Vec<Token>, Vec<LexError>) {
        while let Some(c) = self.peek() {
            match c {
                ' ' | '\t' | '\r' => {
                    self.advance();
                }
                '\n' => {
                    self.line += 1;
                    self.advance();
                }
                '-' if self.peek_at(1) == Some('-') => self.skip_line_comment(),
                '(' if self.peek_at(1) == Some('*') => self.skip_block_comment(),
                '"' => self.lex_string(),
                c if c.is_ascii_digit() => self.lex_integer(),
                c if c.is_ascii_uppercase() => self.lex_ident_upper(),
                c if c.is_ascii_lowercase() || c == '_' => self.lex_ident_lower(),
                _ => self.lex_operator(),
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::Eof,
            line: self.line,
        });
        (self.tokens, self.errors)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        self.pos += 1;
        c
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.peek() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn skip_block_comment(&mut self) {
        let start_line = self.line;
        self.advance();
        self.advance();
        let mut depth = 1;
        while depth > 0 {
            match self.peek() {
                None => {
                    self.errors.push(LexError {
                        message: "EOF in comment".to_string(),
                        line: start_line,
                    });
                    return;
                }
                Some('*') if self.peek_at(1) == Some(')') => {
                    self.advance();
                    self.advance();
                    depth -= 1;
                }
                Some('(') if self.peek_at(1) == Some('*') => {
                    self.advance();
                    self.advance();
                    depth += 1;
                }
                Some('\n') => {
                    self.line += 1;
                    self.advance();
                }
                Some(_) => {
                    self.advance();
                }
            }
        }
    }

    fn lex_string(&mut self) {
        let start_line = self.line;
        self.advance(); // opening quote
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None => {
                    self.errors.push(LexError {
                        message: "EOF in string constant".to_string(),
                        line: start_line,
                    });
                    return;
                }
                Some('"') => {
                    self.advance();
                    break;
                }
                Some('\n') => {
                    self.errors.push(LexError {
                        message: "Unterminated string constant".to_string(),
                        line: start_line,
                    });
                    self.line += 1;
                    self.advance();
                    return;
                }
                Some('\\') => {
                    self.advance();
                    match self.peek() {
                        Some('\n') => {
                            bytes.push(b'\n');
                            self.line += 1;
                            self.advance();
                        }
                        Some(n) => {
                            let translated = match n {
                                'n' => b'\n',
                                't' => b'\t',
                                'b' => 0x08,
                                'f' => 0x0c,
                                'r' => b'\r',
                                '"' => b'"',
                                '\\' => b'\\',
                                other => other as u8,
                            };
                            bytes.push(translated);
                            self.advance();
                        }
                        None => {
                            self.errors.push(LexError {
                                message: "EOF in string constant".to_string(),
                                line: start_line,
                            });
                            return;
                        }
                    }
                }
                Some(c) => {
                    bytes.push(c as u8);
                    self.advance();
                }
            }
        }
        self.tokens.push(Token {
            kind: TokenKind::StringLiteral(bytes),
            line: start_line,
        });
    }

    fn lex_integer(&mut self) {
        let line = self.line;
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        match text.parse::<i32>() {
            Ok(v) => self.tokens.push(Token {
                kind: TokenKind::IntLiteral(v),
                line,
            }),
            Err(_) => self.errors.push(LexError {
                message: format!("Integer literal '{}' out of range", text),
                line,
            }),
        }
    }

    fn lex_ident_upper(&mut self) {
        let line = self.line;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = match text.as_str() {
            "SELF_TYPE" => TokenKind::SelfType,
            "True" | "False" => {
                // Bool literals are lexically type-ids in COOL but must start lowercase.
                // A TYPEID spelled True/False is not a bool constant; only the lowercase
                // `true`/`false` object identifiers are.
                TokenKind::TypeId(text)
            }
            _ => TokenKind::TypeId(text),
        };
        self.tokens.push(Token { kind, line });
    }

    fn lex_ident_lower(&mut self) {
        let line = self.line;
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.advance();
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        let kind = match text.as_str() {
            "class" => TokenKind::Class,
            "inherits" => TokenKind::Inherits,
            "if" => TokenKind::If,
            "then" => TokenKind::Then,
            "else" => TokenKind::Else,
            "fi" => TokenKind::Fi,
            "while" => TokenKind::While,
            "loop" => TokenKind::Loop,
            "pool" => TokenKind::Pool,
            "let" => TokenKind::Let,
            "in" => TokenKind::In,
            "case" => TokenKind::Case,
            "of" => TokenKind::Of,
            "esac" => TokenKind::Esac,
            "new" => TokenKind::New,
            "isvoid" => TokenKind::IsVoid,
            "not" => TokenKind::Not,
            "self" => TokenKind::Self_,
            "true" => TokenKind::BoolLiteral(true),
            "false" => TokenKind::BoolLiteral(false),
            _ => TokenKind::ObjectId(text),
        };
        self.tokens.push(Token { kind, line });
    }

    fn lex_operator(&mut self) {
        let line = self.line;
        let c = self.advance().unwrap();
        let kind = match c {
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            ':' => TokenKind::Colon,
            ';' => TokenKind::Semi,
            ',' => TokenKind::Comma,
            '@' => TokenKind::At,
            '.' => TokenKind::Dot,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '~' => TokenKind::Tilde,
            '=' => {
                if self.peek() == Some('>') {
                    self.advance();
                    TokenKind::Arrow
                } else {
                    TokenKind::Eq
                }
            }
            '<' => match self.peek() {
                Some('-') => {
                    self.advance();
                    TokenKind::Assign
                }
                Some('=') => {
                    self.advance();
                    TokenKind::Le
                }
                _ => TokenKind::Lt,
            },
            other => {
                self.errors.push(LexError {
                    message: format!("Invalid character '{}'", other),
                    line,
                });
                return;
            }
        };
        let _ = self.src;
        self.tokens.push(Token { kind, line });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_class_skeleton() {
        let (tokens, errors) = lex("class Main { main() : Object { 0 }; };");
        assert!(errors.is_empty());
        assert!(tokens.iter().any(|t| t.kind == TokenKind::Class));
        assert!(tokens
            .iter()
            .any(|t| t.kind == TokenKind::TypeId("Main".to_string())));
    }

    #[test]
    fn lexes_string_escapes() {
        let (tokens, errors) = lex("\"a\\nb\"");
        assert!(errors.is_empty());
        match &tokens[0].kind {
            TokenKind::StringLiteral(bytes) => assert_eq!(bytes, b"a\nb"),
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn translates_named_escapes_to_control_bytes() {
        let (tokens, errors) = lex("\"\\t\\b\\f\\r\"");
        assert!(errors.is_empty());
        match &tokens[0].kind {
            TokenKind::StringLiteral(bytes) => assert_eq!(bytes, &[0x09, 0x08, 0x0c, 0x0d]),
            other => panic!("unexpected token {:?}", other),
        }
    }

    #[test]
    fn reports_unterminated_string() {
        let (_tokens, errors) = lex("\"abc\nclass");
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn nested_block_comments() {
        let (tokens, errors) = lex("(* outer (* inner *) still outer *) class");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::Class);
    }
}
