use crate::error::{ErrorCode, VineError};
use crate::span::Span;
use std::fmt::Write;
use std::path::Path;

/// Rustc-style report: header, `-->` location, the offending source line and a caret underline.
pub fn render(
    source: &str,
    kind: &str,
    file: Option<&Path>,
    span: Span,
    message: &str,
    hint: Option<&str>,
) -> String {
    let line = source.lines().nth(span.line.saturating_sub(1)).unwrap_or("");
    let gutter = " ".repeat(span.line.to_string().len());
    let location = match file {
        Some(file) => format!("{}:{}", file.display(), span),
        None => format!("line {}", span),
    };
    // tabs are kept so the carets line up under tab-indented code
    let padding: String = line
        .chars()
        .take(span.col.saturating_sub(1))
        .map(|c| if c == '\t' { '\t' } else { ' ' })
        .collect();

    let mut out = String::new();
    let _ = writeln!(out, "error[{}]: {}", kind, message);
    let _ = writeln!(out, "{}--> {}", gutter, location);
    let _ = writeln!(out, "{} |", gutter);
    let _ = writeln!(out, "{} | {}", span.line, line);
    let _ = writeln!(out, "{} | {}{}", gutter, padding, "^".repeat(span.length.max(1)));
    if let Some(hint) = hint {
        let _ = writeln!(out, "{} |", gutter);
        let _ = writeln!(out, "{} = hint: {}", gutter, hint);
    }
    out
}

pub fn suggest_hint(error: &VineError) -> Option<String> {
    if let Some(hint) = &error.hint {
        return Some(hint.clone());
    }
    let msg = error.message.to_lowercase();

    if msg.contains("condition must be a boolean") {
        return Some("there is no truthiness; compare explicitly, e.g. `x != nil`".into());
    }

    if msg.contains("cannot assign to constant") || msg.contains("cannot delete constant") {
        return Some("declare with 'let' instead of 'const' to make it reassignable".into());
    }

    if msg.contains("is not callable") {
        return Some("make sure the function is declared before this line".into());
    }

    if msg.contains("'break' at end of case") {
        return Some("end every case with 'break' unless its last statement is 'return'".into());
    }

    if msg.contains("cyclic import") {
        return Some("move the shared declarations into a module both files can use".into());
    }

    if msg.starts_with("module") && msg.contains("not found") {
        return Some("module paths are relative to the importing file".into());
    }

    None
}

fn label(code: ErrorCode) -> &'static str {
    match code {
        ErrorCode::Syntax => "syntax",
        ErrorCode::Runtime => "runtime",
        ErrorCode::Interpreter => "interpreter",
    }
}

/// Renders `error` against `source`, the text of the file the error points into.
pub fn render_error(source: &str, error: &VineError) -> String {
    let kind = label(error.code);
    let hint = suggest_hint(error);
    let file = error.file.as_deref();
    match error.span {
        Some(span) if span.line > 0 => {
            render(source, kind, file, span, &error.message, hint.as_deref())
        }
        _ => {
            let mut out = String::new();
            let _ = writeln!(out, "error[{}]: {}", kind, error.message);
            if let Some(file) = file {
                let _ = writeln!(out, "  --> {}", file.display());
            }
            if let Some(hint) = &hint {
                let _ = writeln!(out, "  = hint: {}", hint);
            }
            out
        }
    }
}
