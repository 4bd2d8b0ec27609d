pub mod token;

use crate::scanner::token::{Token, TokenType};
use crate::span::Span;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct ScanError {
    pub span: Span,
    pub message: String,
}

/// Everything the scanner produced. Scanning never stops at an error, so `tokens` always ends
/// in `Eof` and `errors` lists every problem in source order.
pub struct ScanResult {
    pub tokens: Vec<Token>,
    pub errors: Vec<ScanError>,
}

fn punctuation(c: char) -> Option<TokenType> {
    Some(match c {
        '(' => TokenType::LeftParen,
        ')' => TokenType::RightParen,
        '{' => TokenType::LeftBrace,
        '}' => TokenType::RightBrace,
        '[' => TokenType::LeftBracket,
        ']' => TokenType::RightBracket,
        ',' => TokenType::Comma,
        ':' => TokenType::Colon,
        '?' => TokenType::Question,
        '+' => TokenType::Plus,
        '-' => TokenType::Minus,
        '*' => TokenType::Star,
        '/' => TokenType::Slash,
        '%' => TokenType::Percent,
        '&' => TokenType::Ampersand,
        '|' => TokenType::Pipe,
        _ => return None,
    })
}

fn closer(open: char) -> Option<char> {
    match open {
        '(' => Some(')'),
        '{' => Some('}'),
        '[' => Some(']'),
        _ => None,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct Scanner {
    source: Vec<char>,
    tokens: Vec<Token>,
    errors: Vec<ScanError>,
    start: usize,
    current: usize,
    line: usize,
    line_start: usize,
    // a line holding only whitespace becomes an EmptyLine marker
    line_has_content: bool,
    keywords: HashMap<String, TokenType>,
    // closers still owed, innermost last
    open: Vec<char>,
}

impl Scanner {
    pub fn new(source: impl Into<String>, keywords: &HashMap<String, TokenType>) -> Self {
        Scanner {
            source: source.into().chars().collect(),
            tokens: Vec::new(),
            errors: Vec::new(),
            start: 0,
            current: 0,
            line: 1,
            line_start: 0,
            line_has_content: false,
            keywords: keywords.clone(),
            open: Vec::new(),
        }
    }

    pub fn scan_tokens(mut self) -> ScanResult {
        while self.current < self.source.len() {
            self.start = self.current;
            self.scan_token();
        }

        let eof = Span::new(self.line, self.current - self.line_start + 1, 0);
        self.tokens.push(Token::new(TokenType::Eof, "", eof));
        ScanResult {
            tokens: self.tokens,
            errors: self.errors,
        }
    }

    fn scan_token(&mut self) {
        let c = self.advance();
        if !c.is_whitespace() {
            self.line_has_content = true;
        }

        if let Some(close) = closer(c) {
            self.open.push(close);
        } else if matches!(c, ')' | '}' | ']') {
            if self.open.last() == Some(&c) {
                self.open.pop();
            } else {
                self.report_error(format!("Unmatched '{}'", c));
            }
        }
        if let Some(token_type) = punctuation(c) {
            self.add_token(token_type);
            return;
        }

        match c {
            '.' => {
                let token_type = self.either('.', TokenType::DotDot, TokenType::Dot);
                self.add_token(token_type);
            }
            '!' => {
                let token_type = self.either('=', TokenType::NotEqual, TokenType::Bang);
                self.add_token(token_type);
            }
            '=' => {
                let token_type = self.either('=', TokenType::Equal, TokenType::Assign);
                self.add_token(token_type);
            }
            '>' => {
                let token_type = self.either('=', TokenType::GreaterEqual, TokenType::Greater);
                self.add_token(token_type);
            }
            '<' => {
                let token_type = self.either('=', TokenType::LessEqual, TokenType::Less);
                self.add_token(token_type);
            }
            '#' => {
                if self.match_char('*') {
                    self.block_comment();
                } else {
                    self.skip_while(|c| c != '\n');
                    self.add_token(TokenType::Comment);
                }
            }
            '\n' => self.newline(),
            c if c.is_whitespace() => {}
            '"' | '\'' => self.string(c),
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.word(),
            _ => self.report_error(format!("Unexpected character: '{}'", c)),
        }
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current];
        self.current += 1;
        c
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.current).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.current + 1).copied()
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn either(&mut self, second: char, matched: TokenType, single: TokenType) -> TokenType {
        if self.match_char(second) {
            matched
        } else {
            single
        }
    }

    fn skip_while(&mut self, keep: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&keep) {
            self.current += 1;
        }
    }

    fn lexeme(&self) -> String {
        self.source[self.start..self.current].iter().collect()
    }

    fn start_col(&self) -> usize {
        self.start.saturating_sub(self.line_start) + 1
    }

    fn next_line(&mut self) {
        self.line += 1;
        self.line_start = self.current;
    }

    fn newline(&mut self) {
        let blank = Span::new(self.line, 1, 0);
        let was_blank = !self.line_has_content;
        self.next_line();
        self.line_has_content = false;

        // one marker per run of blank lines, and never inside brackets
        let emit = was_blank
            && self.open.is_empty()
            && self
                .tokens
                .last()
                .is_some_and(|t| t.token_type != TokenType::EmptyLine);
        if emit {
            self.tokens.push(Token::new(TokenType::EmptyLine, "", blank));
        }
    }

    fn block_comment(&mut self) {
        let span_start = (self.line, self.start_col());
        loop {
            match self.peek() {
                None => {
                    self.report_error("Unterminated multi-line comment");
                    return;
                }
                Some('*') if self.peek_next() == Some('#') => {
                    self.current += 2;
                    break;
                }
                Some('\n') => {
                    self.current += 1;
                    self.next_line();
                }
                Some(_) => self.current += 1,
            }
        }

        let span = Span::new(span_start.0, span_start.1, self.current - self.start);
        self.tokens.push(Token::new(TokenType::Comment, self.lexeme(), span));
    }

    // Strings are raw and single-line; `{{ }}` interpolation is handled by the parser.
    fn string(&mut self, quote: char) {
        self.skip_while(|c| c != quote && c != '\n');
        if !self.match_char(quote) {
            self.report_error("Unterminated string");
            return;
        }
        let value: String = self.source[self.start + 1..self.current - 1].iter().collect();
        self.add_token(TokenType::String(value));
    }

    fn number(&mut self) {
        self.skip_while(|c| c.is_ascii_digit());
        // `1..3` is a range, not a fraction
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.current += 1;
            self.skip_while(|c| c.is_ascii_digit());
        }

        if let Some(suffix) = self.peek().filter(|c| c.is_alphabetic() || *c == '_') {
            let text = self.lexeme();
            self.skip_while(is_word_char);
            self.report_error(format!(
                "Invalid number '{}' - unexpected suffix '{}'",
                text, suffix
            ));
            return;
        }

        let text = self.lexeme();
        match text.parse::<f64>() {
            Ok(n) => self.add_token(TokenType::Number(n)),
            Err(_) => self.report_error(format!("Invalid number: '{}'", text)),
        }
    }

    fn word(&mut self) {
        self.skip_while(is_word_char);
        let token_type = self
            .keywords
            .get(&self.lexeme())
            .cloned()
            .unwrap_or(TokenType::Identifier);
        self.add_token(token_type);
    }

    fn add_token(&mut self, token_type: TokenType) {
        let span = Span::new(self.line, self.start_col(), self.current - self.start);
        self.tokens.push(Token::new(token_type, self.lexeme(), span));
    }

    fn report_error(&mut self, message: impl Into<String>) {
        let length = (self.current - self.start).max(1);
        self.errors.push(ScanError {
            span: Span::new(self.line, self.start_col(), length),
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::load_keywords;

    fn scan(source: &str) -> ScanResult {
        let keywords = load_keywords(None).unwrap();
        Scanner::new(source, &keywords).scan_tokens()
    }

    fn token_types(result: &ScanResult) -> Vec<&TokenType> {
        result.tokens.iter().map(|t| &t.token_type).collect()
    }

    #[test]
    fn scan_basic_tokens() {
        let result = scan("let x = 5");
        assert!(result.errors.is_empty());
        assert_eq!(
            token_types(&result),
            vec![
                &TokenType::Let,
                &TokenType::Identifier,
                &TokenType::Assign,
                &TokenType::Number(5.0),
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scan_two_char_operators() {
        let result = scan("a == b != c <= d >= e");
        assert!(result.errors.is_empty());
        let types = token_types(&result);
        assert!(types.contains(&&TokenType::Equal));
        assert!(types.contains(&&TokenType::NotEqual));
        assert!(types.contains(&&TokenType::LessEqual));
        assert!(types.contains(&&TokenType::GreaterEqual));
    }

    #[test]
    fn scan_range_is_not_a_fraction() {
        let result = scan("1..3 2.5");
        assert_eq!(
            token_types(&result),
            vec![
                &TokenType::Number(1.0),
                &TokenType::DotDot,
                &TokenType::Number(3.0),
                &TokenType::Number(2.5),
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scan_both_quote_styles_raw() {
        let result = scan(r#"'a "b"' "c\n""#);
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens[0].token_type, TokenType::String("a \"b\"".into()));
        assert_eq!(result.tokens[1].token_type, TokenType::String("c\\n".into()));
    }

    #[test]
    fn scan_error_on_unterminated_string() {
        let result = scan("\"unterminated\nlet x = 1");
        assert!(!result.errors.is_empty());
        assert!(result.errors[0].message.contains("Unterminated string"));
        assert!(token_types(&result).contains(&&TokenType::Let));
    }

    #[test]
    fn scan_comments_are_tokens() {
        let result = scan("# hello\n#* multi\nline *# 5");
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens[0].token_type, TokenType::Comment);
        assert_eq!(result.tokens[0].lexeme, "# hello");
        assert_eq!(result.tokens[1].token_type, TokenType::Comment);
        assert_eq!(result.tokens[1].lexeme, "#* multi\nline *#");
        assert_eq!(result.tokens[1].span.line, 2);
        assert_eq!(result.tokens[2].span.line, 3);
    }

    #[test]
    fn scan_unterminated_block_comment() {
        let result = scan("#* never closed");
        assert!(result.errors[0].message.contains("Unterminated multi-line comment"));
    }

    #[test]
    fn scan_blank_line_runs_collapse() {
        let result = scan("a\n\n\n\nb");
        assert_eq!(
            token_types(&result),
            vec![
                &TokenType::Identifier,
                &TokenType::EmptyLine,
                &TokenType::Identifier,
                &TokenType::Eof,
            ]
        );
    }

    #[test]
    fn scan_no_blank_marker_inside_brackets() {
        let result = scan("[1,\n\n2]");
        assert!(!token_types(&result).contains(&&TokenType::EmptyLine));
    }

    #[test]
    fn scan_unicode_identifier() {
        let result = scan("let 名字 = 1");
        assert!(result.errors.is_empty());
        assert_eq!(result.tokens[1].token_type, TokenType::Identifier);
        assert_eq!(result.tokens[1].lexeme, "名字");
    }

    #[test]
    fn scan_span_columns() {
        let result = scan("let  x");
        assert_eq!(result.tokens[1].span, Span::new(1, 6, 1));
    }

    #[test]
    fn scan_number_with_suffix_is_error() {
        let result = scan("3abc");
        assert!(result.errors[0].message.contains("unexpected suffix"));
    }
}
