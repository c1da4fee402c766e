// src/domain/search.rs

/// Lowercase and strip punctuation, keeping word characters and whitespace.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect()
}

/// How a search string is matched against title/description/author email.
#[derive(Debug, PartialEq)]
pub enum SearchMode {
    /// 1-2 words: any word may match (OR).
    AnyWord(Vec<String>),
    /// 3+ words: the whole normalized phrase must match.
    Phrase(String),
}

pub fn search_mode(raw: &str) -> Option<SearchMode> {
    let trimmed = raw.trim().to_lowercase();
    if trimmed.is_empty() {
        return None;
    }

    let words: Vec<&str> = trimmed.split_whitespace().collect();
    if words.len() <= 2 {
        Some(SearchMode::AnyWord(
            words.iter().map(|w| normalize_text(w)).collect(),
        ))
    } else {
        Some(SearchMode::Phrase(normalize_text(&trimmed)))
    }
}

/// Whitelisted sort keys for the publication list. Returns the SQL order
/// expression, or None for anything not on the list.
pub fn ordering_clause(raw: &str) -> Option<&'static str> {
    match raw {
        "created_at" => Some("p.created_at asc"),
        "-created_at" => Some("p.created_at desc"),
        "total_views" => Some("total_views asc"),
        "-total_views" => Some("total_views desc"),
        "total_donated" => Some("total_donated asc"),
        "-total_donated" => Some("total_donated desc"),
        _ => None,
    }
}
