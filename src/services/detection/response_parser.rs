// Generative-model response parser
// Turns free-form model output into a ChunkAnalysis, or reports why it could not.

use serde_json::{Map, Value};

use crate::models::{clamp_unit, CandidateSource, ChunkAnalysis, Highlight};

#[derive(Debug, Clone, PartialEq)]
pub enum ChunkParse {
    Parsed(ChunkAnalysis),
    Fallback(String),
}

pub fn parse_chunk_response(content: &str) -> ChunkParse {
    let body = strip_code_fences(content);
    match first_json_object(body) {
        Some(obj) => ChunkParse::Parsed(analysis_from_object(&obj)),
        None => ChunkParse::Fallback(format!(
            "no JSON object in response ({} chars)",
            content.chars().count()
        )),
    }
}

/// Inner text of the first fenced block, or the input unchanged.
fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(open) = trimmed.find("```") else {
        return trimmed;
    };
    let after_open = &trimmed[open + 3..];
    // Skip the info string (e.g. `json`)
    let body_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after_open[body_start..];
    match body.find("```") {
        Some(close) => body[..close].trim(),
        None => body.trim(),
    }
}

/// End index (exclusive) of the balanced object starting at `start`.
fn balanced_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

fn first_json_object(text: &str) -> Option<Map<String, Value>> {
    text.match_indices('{').find_map(|(start, _)| {
        let end = balanced_end(text, start)?;
        match serde_json::from_str::<Value>(&text[start..end]) {
            Ok(Value::Object(obj)) => Some(obj),
            _ => None,
        }
    })
}

fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| obj.get(*n)).filter(|v| !v.is_null())
}

/// Accepts numbers or numeric strings; values above 1 are read as percentages.
fn probability(value: Option<&Value>) -> f64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(v) if v > 1.0 => clamp_unit(v / 100.0),
        Some(v) => clamp_unit(v),
        None => 0.0,
    }
}

fn highlights(value: Option<&Value>) -> Vec<Highlight> {
    let Some(Value::Array(items)) = value else {
        return vec![];
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(Highlight {
                sentence: s.trim().to_string(),
                reason: String::new(),
            }),
            Value::Object(o) => {
                let sentence = field(o, &["sentence", "text", "content"])?.as_str()?.trim();
                let reason = field(o, &["reason", "explanation"])
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim();
                Some(Highlight {
                    sentence: sentence.to_string(),
                    reason: reason.to_string(),
                })
            }
            _ => None,
        })
        .filter(|h| !h.sentence.is_empty())
        .collect()
}

fn sources(value: Option<&Value>) -> Vec<CandidateSource> {
    let Some(Value::Array(items)) = value else {
        return vec![];
    };
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(CandidateSource {
                title: s.clone(),
                url: if s.starts_with("http") { s.clone() } else { String::new() },
            }),
            Value::Object(o) => {
                let title = field(o, &["title", "name"]).and_then(Value::as_str).unwrap_or("");
                let url = field(o, &["url", "link"]).and_then(Value::as_str).unwrap_or("");
                (!title.is_empty() || !url.is_empty()).then(|| CandidateSource {
                    title: title.to_string(),
                    url: url.to_string(),
                })
            }
            _ => None,
        })
        .collect()
}

fn analysis_from_object(obj: &Map<String, Value>) -> ChunkAnalysis {
    ChunkAnalysis {
        ai_probability: probability(field(obj, &["aiProbability", "ai_probability"])),
        ai_highlights: highlights(field(obj, &["aiHighlights", "ai_highlights"])),
        plagiarism_probability: probability(field(
            obj,
            &["plagiarismProbability", "plagiarism_probability"],
        )),
        plagiarism_highlights: highlights(field(
            obj,
            &["plagiarismHighlights", "plagiarism_highlights"],
        )),
        sources: sources(field(obj, &["sources", "potentialSources"])),
        is_fallback: false,
    }
}
