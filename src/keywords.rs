use std::collections::HashMap;
use std::fs;
use anyhow::Result;

use crate::scanner::token::TokenType;

/// Builds the spelling -> keyword table. A JSON file maps canonical keyword names to new
/// spellings; keywords it does not mention keep their default spelling.
pub fn load_keywords(path: Option<&str>) -> Result<HashMap<String, TokenType>> {
    let mut spellings = default_spellings();
    if let Some(p) = path {
        let contents = fs::read_to_string(p)?;
        let overrides: HashMap<String, String> = serde_json::from_str(&contents)?;
        spellings.extend(overrides);
    }
    Ok(table(spellings))
}

/// The built-in spellings, without consulting any override file.
pub fn default_table() -> HashMap<String, TokenType> {
    table(default_spellings())
}

// canonical name -> spelling becomes spelling -> token; unknown names are ignored
fn table(spellings: HashMap<String, String>) -> HashMap<String, TokenType> {
    spellings
        .into_iter()
        .filter_map(|(name, spelling)| str_to_token_type(&name).map(|t| (spelling, t)))
        .collect()
}

const CANONICAL: &[&str] = &[
    "use", "expose", "pick", "as", "task", "wait", "to", "run", "if", "else", "let", "const",
    "cst", "fn", "return", "end", "for", "in", "range", "switch", "case", "default", "break",
    "NaN", "nil", "true", "false",
];

fn default_spellings() -> HashMap<String, String> {
    CANONICAL
        .iter()
        .map(|k| (k.to_string(), k.to_string()))
        .collect()
}

fn str_to_token_type(s: &str) -> Option<TokenType> {
    match s {
        "use" => Some(TokenType::Use),
        "expose" => Some(TokenType::Expose),
        "pick" => Some(TokenType::Pick),
        "as" => Some(TokenType::As),
        "task" => Some(TokenType::Task),
        "wait" => Some(TokenType::Wait),
        "to" => Some(TokenType::To),
        "run" => Some(TokenType::Run),
        "if" => Some(TokenType::If),
        "else" => Some(TokenType::Else),
        "let" => Some(TokenType::Let),
        "const" | "cst" => Some(TokenType::Const),
        "fn" => Some(TokenType::Fn),
        "return" => Some(TokenType::Return),
        "end" => Some(TokenType::End),
        "for" => Some(TokenType::For),
        "in" => Some(TokenType::In),
        "range" => Some(TokenType::Range),
        "switch" => Some(TokenType::Switch),
        "case" => Some(TokenType::Case),
        "default" => Some(TokenType::Default),
        "break" => Some(TokenType::Break),
        "NaN" => Some(TokenType::NaN),
        "nil" => Some(TokenType::Nil),
        "true" => Some(TokenType::True),
        "false" => Some(TokenType::False),
        _ => None,
    }
}
