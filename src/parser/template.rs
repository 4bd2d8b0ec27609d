use crate::error::VineError;
use crate::parser::ast::{Expr, ExprKind, TemplatePart};
use crate::parser::Parser;
use crate::scanner::Scanner;
use crate::span::Span;

enum Segment {
    Text(String),
    Expr { source: String, offset: usize },
}

/// True when `text` holds at least one `{{ expression }}` slot.
pub fn is_template(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i + 1 < chars.len() {
        if chars[i] == '{' && chars[i + 1] == '{' {
            let mut j = i + 2;
            while j < chars.len() && chars[j] != '}' {
                j += 1;
            }
            if j > i + 2 && j + 1 < chars.len() && chars[j + 1] == '}' {
                return true;
            }
        }
        i += 1;
    }
    false
}

fn split(text: &str, span: Span) -> Result<Vec<Segment>, VineError> {
    let chars: Vec<char> = text.chars().collect();
    let mut segments = Vec::new();
    let mut buffer = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                buffer.push(match chars[i + 1] {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
                i += 2;
            }
            '{' if chars.get(i + 1) == Some(&'{') => {
                if !buffer.is_empty() {
                    segments.push(Segment::Text(std::mem::take(&mut buffer)));
                }
                let offset = i + 2;
                let mut j = offset;
                while j < chars.len() && chars[j] != '}' {
                    j += 1;
                }
                if chars.get(j + 1) != Some(&'}') {
                    return Err(VineError::syntax("The template string is not closed", span));
                }
                let source: String = chars[offset..j].iter().collect();
                if source.trim().is_empty() {
                    return Err(VineError::syntax("Empty expression in template string", span));
                }
                segments.push(Segment::Expr { source, offset });
                i = j + 2;
            }
            c => {
                buffer.push(c);
                i += 1;
            }
        }
    }

    if !buffer.is_empty() {
        segments.push(Segment::Text(buffer));
    }
    Ok(segments)
}

impl Parser {
    // `span` is the string token; its opening quote sits at span.col
    pub(super) fn template(&mut self, raw: &str, span: Span) -> Result<Expr, VineError> {
        let segments = split(raw, span).map_err(|e| self.errors.push(e))?;
        let mut parts = Vec::with_capacity(segments.len());

        for segment in segments {
            match segment {
                Segment::Text(text) => parts.push(TemplatePart::Text(text)),
                Segment::Expr { source, offset } => {
                    let shift = |inner: Span| Span {
                        line: span.line,
                        col: span.col + offset + inner.col,
                        length: inner.length,
                    };

                    let scanned = Scanner::new(source, &self.keywords).scan_tokens();
                    if let Some(error) = scanned.errors.first() {
                        let span = shift(error.span);
                        return Err(self.fail(error.message.clone(), span));
                    }
                    let tokens = scanned
                        .tokens
                        .into_iter()
                        .map(|mut t| {
                            t.span = shift(t.span);
                            t
                        })
                        .collect();

                    let mut sub = Parser::new(tokens)
                        .with_keywords(&self.keywords)
                        .with_match_mode(self.match_mode);
                    sub.next_id = self.next_id;
                    let expr = sub.parse_expression();
                    self.next_id = sub.next_id;
                    parts.push(TemplatePart::Expr(expr.map_err(|e| self.errors.push(e))?));
                }
            }
        }

        Ok(Expr {
            kind: ExprKind::Template {
                raw: raw.to_string(),
                parts,
            },
            span,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::default_table;

    fn parse_string(source: &str) -> Result<Expr, VineError> {
        let tokens = Scanner::new(source, &default_table()).scan_tokens().tokens;
        Parser::new(tokens).parse_expression()
    }

    #[test]
    fn detects_slots() {
        assert!(is_template("hello {{name}}"));
        assert!(!is_template("hello {name}"));
        assert!(!is_template("{{}}"));
        assert!(!is_template("{{ open"));
    }

    #[test]
    fn splits_text_and_expressions() {
        let expr = parse_string(r#""a {{ 1 + 2 }} b""#).unwrap();
        match expr.kind {
            ExprKind::Template { parts, .. } => {
                assert_eq!(parts.len(), 3);
                assert!(matches!(&parts[0], TemplatePart::Text(t) if t == "a "));
                assert!(matches!(&parts[1], TemplatePart::Expr(_)));
                assert!(matches!(&parts[2], TemplatePart::Text(t) if t == " b"));
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn escapes_are_processed() {
        let expr = parse_string(r#""\{x\} {{a}}\n""#).unwrap();
        match expr.kind {
            ExprKind::Template { parts, .. } => {
                assert!(matches!(&parts[0], TemplatePart::Text(t) if t == "{x} "));
                assert!(matches!(&parts[2], TemplatePart::Text(t) if t == "\n"));
            }
            other => panic!("expected template, got {:?}", other),
        }
    }

    #[test]
    fn unclosed_slot_is_an_error() {
        let err = parse_string(r#""{{a} {{b}}""#).unwrap_err();
        assert_eq!(err.message, "The template string is not closed");
    }

    #[test]
    fn bad_expression_points_inside_string() {
        let err = parse_string(r#""ok {{ 1 + }}""#).unwrap_err();
        let span = err.span.unwrap();
        assert_eq!(span.line, 1);
        assert!(span.col > 4);
    }
}
