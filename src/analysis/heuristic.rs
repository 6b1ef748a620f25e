//! Deterministic heuristic analysis
//!
//! Used when no LLM is reachable or mock mode is forced, and as the per-chunk
//! fallback when a real analysis call fails. Indexing never hard-fails purely
//! because no LLM is configured.

use super::ChunkAnalysis;

const SUMMARY_MAX_CHARS: usize = 120;
const MAX_ENTITIES: usize = 16;

/// Keywords that open a branch or loop, used as a complexity proxy
const BRANCHING_KEYWORDS: &[&str] = &[
    "if", "else", "elif", "for", "while", "loop", "match", "switch", "case", "catch", "except",
    "when",
];

/// Keywords that introduce a named declaration
const DECLARATION_KEYWORDS: &[&str] = &[
    "fn", "struct", "enum", "trait", "impl", "class", "def", "function", "interface", "type",
    "mod", "module",
];

/// Analyze a chunk without any model call.
///
/// Deterministic by construction: output depends only on the chunk text and
/// language tag.
pub fn analyze(text: &str, language: Option<&str>) -> ChunkAnalysis {
    ChunkAnalysis {
        summary: summary_line(text),
        purpose: purpose_of(text, language),
        complexity_score: complexity_of(text),
        entities: entities_of(text),
    }
}

/// First non-empty line, truncated on a char boundary
fn summary_line(text: &str) -> String {
    let line = text
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("(empty chunk)");

    if line.chars().count() <= SUMMARY_MAX_CHARS {
        line.to_string()
    } else {
        let truncated: String = line.chars().take(SUMMARY_MAX_CHARS).collect();
        format!("{}...", truncated)
    }
}

fn purpose_of(text: &str, language: Option<&str>) -> String {
    let declares = tokens_of(text)
        .any(|token| DECLARATION_KEYWORDS.contains(&token));
    let subject = if declares {
        "declarations and logic"
    } else {
        "supporting content"
    };

    match language {
        Some(lang) => format!("{} ({} source)", subject, lang),
        None => subject.to_string(),
    }
}

/// 1 plus the number of branching keywords, so the score is always >= 1
fn complexity_of(text: &str) -> u32 {
    let branches = tokens_of(text)
        .filter(|token| BRANCHING_KEYWORDS.contains(token))
        .count();
    1 + branches as u32
}

/// Identifiers that directly follow a declaration keyword
fn entities_of(text: &str) -> Vec<String> {
    let mut entities = Vec::new();
    let tokens: Vec<&str> = tokens_of(text).collect();

    for pair in tokens.windows(2) {
        if DECLARATION_KEYWORDS.contains(&pair[0]) && is_identifier(pair[1]) {
            let name = pair[1].to_string();
            if !entities.contains(&name) {
                entities.push(name);
                if entities.len() == MAX_ENTITIES {
                    break;
                }
            }
        }
    }

    entities
}

fn tokens_of(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
}

fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && !DECLARATION_KEYWORDS.contains(&token)
        && !BRANCHING_KEYWORDS.contains(&token)
}
