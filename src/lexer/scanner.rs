use super::token::{Token, TokenKind};
use crate::error::{Error, Result};
use crate::location::Location;

/// Scanner for Pigeon source text
pub struct Scanner {
    /// Source file name used in token locations
    file: String,
    /// Source code as character vector
    source: Vec<char>,
    /// Accumulated tokens
    tokens: Vec<Token>,
    /// Start position of current token
    start: usize,
    /// Current position in source
    current: usize,
    /// Current line number (1-indexed)
    line: usize,
    /// Current column number (1-indexed)
    column: usize,
    /// Line where the current token starts
    start_line: usize,
    /// Column where the current token starts
    start_column: usize,
}

impl Scanner {
    /// Creates a new scanner over `source`, tagging locations with `file`
    pub fn new(file: impl Into<String>, source: &str) -> Self {
        Scanner {
            file: file.into(),
            source: source.chars().collect(),
            tokens: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            column: 1,
            start_line: 1,
            start_column: 1,
        }
    }

    /// Scans all tokens from source code and returns them as a vector
    pub fn scan_tokens(&mut self) -> Result<Vec<Token>> {
        while !self.is_at_end() {
            self.start = self.current;
            self.start_line = self.line;
            self.start_column = self.column;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenKind::Eof,
            String::new(),
            Location::new(self.file.clone(), self.line, self.column),
        ));

        Ok(std::mem::take(&mut self.tokens))
    }

    fn scan_token(&mut self) -> Result<()> {
        let c = self.advance();

        match c {
            ' ' | '\r' | '\t' | '\n' => {}

            '/' => {
                if self.match_char('/') {
                    self.skip_line_comment();
                } else {
                    self.add_token(TokenKind::Slash);
                }
            }

            '(' => self.add_token(TokenKind::LeftParen),
            ')' => self.add_token(TokenKind::RightParen),
            '{' => self.add_token(TokenKind::LeftBrace),
            '}' => self.add_token(TokenKind::RightBrace),
            ',' => self.add_token(TokenKind::Comma),
            ';' => self.add_token(TokenKind::Semicolon),
            ':' => self.add_token(TokenKind::Colon),
            '+' => self.add_token(TokenKind::Plus),
            '-' => self.add_token(TokenKind::Minus),
            '*' => self.add_token(TokenKind::Star),

            '=' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::Eq);
                } else {
                    self.add_token(TokenKind::Assign);
                }
            }
            '!' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::NotEq);
                } else {
                    return Err(self.unexpected('!'));
                }
            }
            '<' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::LtEq);
                } else {
                    self.add_token(TokenKind::Lt);
                }
            }
            '>' => {
                if self.match_char('=') {
                    self.add_token(TokenKind::GtEq);
                } else {
                    self.add_token(TokenKind::Gt);
                }
            }

            c if c.is_ascii_digit() => self.scan_number()?,
            c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier_or_keyword(),

            other => return Err(self.unexpected(other)),
        }

        Ok(())
    }

    fn skip_line_comment(&mut self) {
        while self.peek() != '\n' && !self.is_at_end() {
            self.advance();
        }
    }

    fn scan_number(&mut self) -> Result<()> {
        let hexadecimal = self.source[self.start] == '0' && matches!(self.peek(), 'x' | 'X');
        if hexadecimal {
            self.advance();
            while self.peek().is_ascii_hexdigit() {
                self.advance();
            }
        } else {
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let parsed = if hexadecimal {
            i64::from_str_radix(&text[2..], 16)
        } else {
            text.parse::<i64>()
        };

        let value = parsed.map_err(|e| Error::SyntaxError {
            location: self.token_location(),
            message: format!("invalid integer literal `{}`: {}", text, e),
        })?;

        self.add_token(TokenKind::Integer(value));
        Ok(())
    }

    fn scan_identifier_or_keyword(&mut self) {
        while self.peek().is_ascii_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text: String = self.source[self.start..self.current].iter().collect();
        let kind = TokenKind::keyword(&text).unwrap_or(TokenKind::Identifier(text));
        self.add_token(kind);
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        c
    }

    fn peek(&self) -> char {
        if self.is_at_end() {
            '\0'
        } else {
            self.source[self.current]
        }
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() != expected {
            return false;
        }
        self.advance();
        true
    }

    fn token_location(&self) -> Location {
        Location::new(self.file.clone(), self.start_line, self.start_column)
    }

    fn unexpected(&self, character: char) -> Error {
        Error::UnexpectedCharacter {
            location: self.token_location(),
            character,
        }
    }

    fn add_token(&mut self, kind: TokenKind) {
        let lexeme: String = self.source[self.start..self.current].iter().collect();
        let location = self.token_location();
        self.tokens.push(Token::new(kind, lexeme, location));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut scanner = Scanner::new("test", source);
        scanner
            .scan_tokens()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_declaration() {
        assert_eq!(
            kinds("i32 x = 5;"),
            vec![
                TokenKind::Identifier("i32".to_string()),
                TokenKind::Identifier("x".to_string()),
                TokenKind::Assign,
                TokenKind::Integer(5),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_operators() {
        assert_eq!(
            kinds("== != <= >= < > : /"),
            vec![
                TokenKind::Eq,
                TokenKind::NotEq,
                TokenKind::LtEq,
                TokenKind::GtEq,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::Colon,
                TokenKind::Slash,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_hex_literal() {
        assert_eq!(
            kinds("0x1FF"),
            vec![TokenKind::Integer(0x1FF), TokenKind::Eof]
        );
    }

    #[test]
    fn test_keywords() {
        assert_eq!(
            kinds("while if else return void"),
            vec![
                TokenKind::While,
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Return,
                TokenKind::Void,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn test_comment() {
        let source = "// a comment\nx";
        assert_eq!(
            kinds(source),
            vec![TokenKind::Identifier("x".to_string()), TokenKind::Eof]
        );
    }

    #[test]
    fn test_locations() {
        let mut scanner = Scanner::new("loc.pg", "i32 x\n  = 7;");
        let tokens = scanner.scan_tokens().unwrap();
        assert_eq!(tokens[1].location, Location::new("loc.pg", 1, 5));
        assert_eq!(tokens[2].location, Location::new("loc.pg", 2, 3));
        assert_eq!(tokens[3].lexeme, "7");
    }

    #[test]
    fn test_unexpected_character() {
        let mut scanner = Scanner::new("test", "x = $;");
        let err = scanner.scan_tokens().unwrap_err();
        assert!(matches!(
            err,
            Error::UnexpectedCharacter { character: '$', .. }
        ));
    }

    #[test]
    fn test_integer_overflow() {
        let mut scanner = Scanner::new("test", "99999999999999999999");
        assert!(matches!(
            scanner.scan_tokens(),
            Err(Error::SyntaxError { .. })
        ));
    }
}
