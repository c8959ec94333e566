// Text Processing Service
// Sentence splitting and token extraction used by the source adapters

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Sentences at or below this many characters are ignored.
pub const DEFAULT_SENTENCE_MIN_LENGTH: usize = 20;

const STOPWORDS: &[&str] = &[
    "about", "above", "after", "again", "against", "because", "before", "being", "below",
    "between", "could", "during", "every", "having", "other", "should", "their", "there",
    "these", "those", "through", "under", "until", "where", "which", "while", "would",
];

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("valid sentence regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z0-9]+").expect("valid word regex"))
}

fn technical_term_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Z][a-z0-9]+[A-Z][A-Za-z0-9]*\b").expect("valid term regex")
    })
}

fn code_patterns() -> &'static [Regex] {
    static RES: OnceLock<Vec<Regex>> = OnceLock::new();
    RES.get_or_init(|| {
        [
            // function declarations
            r"\b(?:function|def|fn)\s+\w+\s*\(",
            // class declarations: a capitalized name followed by a body, base list or heritage clause
            r"(?m)^\s*(?:(?:pub|public|export|abstract|final|data)\s+)*class\s+[A-Z]\w*\s*(?:[:({<]|extends\b|implements\b)",
            // import statements
            r"(?m)^\s*(?:import\s+[\w{*]|from\s+[\w.]+\s+import\s)",
            // assignment-call expressions
            r"\b\w+\s*=\s*[\w.]+\(",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("valid code pattern"))
        .collect()
    })
}

/// Normalize punctuation and whitespace
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{2014}', "-")
        .replace(['\u{3000}', '\u{00A0}'], " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    s.lines()
        .map(|ln| ln.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Split on terminal punctuation, keeping trimmed pieces longer than `min_len` chars.
pub fn split_sentences(text: &str, min_len: usize) -> Vec<String> {
    sentence_re()
        .split(text)
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| s.chars().count() > min_len)
        .collect()
}

/// First `max_chars` characters of `text`.
pub fn leading_fragment(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect::<String>().trim_end().to_string()
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Lowercased words longer than 4 chars, minus stopwords, first occurrence order.
pub fn extract_keywords(sentence: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    word_re()
        .find_iter(sentence)
        .map(|m| m.as_str().to_lowercase())
        .filter(|w| w.chars().count() > 4 && !STOPWORDS.contains(&w.as_str()))
        .filter(|w| seen.insert(w.clone()))
        .collect()
}

/// CamelCase-like capitalized tokens longer than 5 chars (e.g. `JavaScript`, `PostgreSQL`).
pub fn extract_technical_terms(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    technical_term_re()
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.chars().count() > 5)
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

pub fn looks_like_code(text: &str) -> bool {
    code_patterns().iter().any(|re| re.is_match(text))
}

/// Trimmed lines matching one of the code patterns, in source order.
pub fn code_fragments(text: &str, max_fragments: usize, max_chars: usize) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|ln| !ln.is_empty() && looks_like_code(ln))
        .take(max_fragments)
        .map(|ln| leading_fragment(ln, max_chars))
        .collect()
}

/// Fixed-size character windows; the last window may be shorter.
pub fn chunk_text(text: &str, chunk_chars: usize) -> Vec<String> {
    if text.trim().is_empty() || chunk_chars == 0 {
        return vec![];
    }
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_chars)
        .map(|c| c.iter().collect::<String>())
        .filter(|c| !c.trim().is_empty())
        .collect()
}
