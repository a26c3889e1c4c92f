//! Tolerant reader for the unified LLM reply.
//!
//! The model is asked for a bare JSON object but may wrap it in a Markdown
//! fence or prose, drop fields, repeat items or point at headlines that do
//! not exist. The parser keeps whatever is usable and records a
//! [`ParseWarning`] for everything it had to skip or repair. It only fails
//! when there is no JSON object at all, or when candidates were offered and
//! neither a greeting nor a single item could be recovered.
//!
//! Selection is a subset operation: every returned item is a clone of a
//! candidate, looked up by 1-based `index`, then by `link`/`url`, then by
//! exact original `title`. Nothing the model invents can get through.

use crate::error::AiRequestError;
use crate::models::{Category, NewsItem};
use crate::utils::truncate_for_log;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// The model is asked for at least this many items when enough candidates exist.
pub const MIN_SELECTED: usize = 10;
/// Hard cap on selected items; extras are dropped.
pub const MAX_SELECTED: usize = 25;

/// Something the parser repaired or skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarning {
    /// The JSON object had to be cut out of surrounding text or a code fence.
    ExtractedFromProse,
    MissingGreeting,
    MissingAdvice { city: String },
    /// No selection array in the reply although candidates were offered.
    MissingSelection,
    InvalidItem { position: usize, reason: String },
    DuplicateItem { position: usize, link: String },
    Truncated { offered: usize, kept: usize },
    /// Fewer than [`MIN_SELECTED`] items survived; accepted as-is.
    FewerThanExpected { count: usize },
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExtractedFromProse => write!(f, "JSON object extracted from surrounding text"),
            Self::MissingGreeting => write!(f, "greeting missing; using fallback"),
            Self::MissingAdvice { city } => write!(f, "no weather advice for {city}"),
            Self::MissingSelection => write!(f, "no news selection in reply"),
            Self::InvalidItem { position, reason } => {
                write!(f, "selection #{position} skipped: {reason}")
            }
            Self::DuplicateItem { position, link } => {
                write!(f, "selection #{position} repeats {link}")
            }
            Self::Truncated { offered, kept } => {
                write!(f, "{offered} items selected; kept the first {kept}")
            }
            Self::FewerThanExpected { count } => {
                write!(f, "only {count} items selected (expected at least {MIN_SELECTED})")
            }
        }
    }
}

/// Everything recovered from one reply.
#[derive(Debug, Clone, Default)]
pub struct ParsedReply {
    pub greeting: Option<String>,
    /// `(city, advice)` in the order the cities were given.
    pub weather_advice: Vec<(String, String)>,
    /// Enriched candidate clones in selection order, ranks set from 1.
    pub items: Vec<NewsItem>,
    pub warnings: Vec<ParseWarning>,
}

/// Strip a Markdown code fence if the whole reply is wrapped in one.
fn strip_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().trim_end_matches("```").trim()
}

/// Locate the JSON object in the reply. The flag is set when it had to be
/// dug out of a fence or prose.
fn extract_object(raw: &str) -> Option<(Map<String, Value>, bool)> {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw.trim()) {
        return Some((map, false));
    }
    let unfenced = strip_fence(raw);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(unfenced) {
        return Some((map, true));
    }
    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&unfenced[start..=end]) {
        Ok(Value::Object(map)) => Some((map, true)),
        _ => None,
    }
}

fn non_blank_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_field<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Read a 1-based index given as a number or a numeric string.
fn as_index(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn resolve_candidate<'a>(
    selection: &'a Value,
    candidates: &'a [NewsItem],
) -> Result<(&'a NewsItem, Option<&'a Map<String, Value>>), String> {
    let by_index = |idx: u64| -> Result<&'a NewsItem, String> {
        usize::try_from(idx)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| candidates.get(i))
            .ok_or_else(|| format!("index {idx} is not in the candidate list (1..={})", candidates.len()))
    };

    match selection {
        Value::Number(_) | Value::String(_) => {
            let idx = as_index(selection).ok_or_else(|| "selection is not an index".to_string())?;
            by_index(idx).map(|item| (item, None))
        }
        Value::Object(obj) => {
            if let Some(idx) = obj.get("index").and_then(as_index) {
                return by_index(idx).map(|item| (item, Some(obj)));
            }
            if let Some(link) = non_blank_str(first_field(obj, &["link", "url"])) {
                return candidates
                    .iter()
                    .find(|c| c.link == link)
                    .map(|item| (item, Some(obj)))
                    .ok_or_else(|| format!("link {link} is not a candidate"));
            }
            if let Some(title) = non_blank_str(first_field(obj, &["original_title", "title"])) {
                return candidates
                    .iter()
                    .find(|c| c.title.trim() == title)
                    .map(|item| (item, Some(obj)))
                    .ok_or_else(|| format!("title {:?} is not a candidate", truncate_for_log(&title, 60)));
            }
            Err("item has no index, link or title".to_string())
        }
        other => Err(format!("unexpected {} in selection", json_kind(other))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn enrich(candidate: &NewsItem, fields: Option<&Map<String, Value>>, rank: usize) -> NewsItem {
    let mut item = candidate.clone();
    if let Some(obj) = fields {
        item.translated_title = non_blank_str(first_field(obj, &["title_cn", "translated_title"]));
        item.summary = non_blank_str(obj.get("summary"));
        item.category = non_blank_str(obj.get("category")).map(|c| Category::from_code(&c));
    }
    item.rank = Some(rank);
    item
}

fn parse_advice(obj: &Map<String, Value>, cities: &[String], warnings: &mut Vec<ParseWarning>) -> Vec<(String, String)> {
    let advice = obj.get("weather_advice").and_then(Value::as_object);
    cities
        .iter()
        .filter_map(|city| {
            let text = advice.and_then(|a| non_blank_str(a.get(city.as_str())));
            if text.is_none() {
                warnings.push(ParseWarning::MissingAdvice { city: city.clone() });
            }
            text.map(|t| (city.clone(), t))
        })
        .collect()
}

fn parse_selection(obj: &Map<String, Value>, candidates: &[NewsItem], warnings: &mut Vec<ParseWarning>) -> Vec<NewsItem> {
    let Some(selection) = first_field(obj, &["selected", "selected_news", "selected_news_indices"])
        .and_then(Value::as_array)
    else {
        if !candidates.is_empty() {
            warnings.push(ParseWarning::MissingSelection);
        }
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for (i, entry) in selection.iter().enumerate() {
        let position = i + 1;
        match resolve_candidate(entry, candidates) {
            Ok((candidate, fields)) => {
                if !seen.insert(candidate.link.as_str()) {
                    warnings.push(ParseWarning::DuplicateItem {
                        position,
                        link: candidate.link.clone(),
                    });
                    continue;
                }
                items.push(enrich(candidate, fields, items.len() + 1));
            }
            Err(reason) => warnings.push(ParseWarning::InvalidItem { position, reason }),
        }
    }

    if items.len() > MAX_SELECTED {
        warnings.push(ParseWarning::Truncated {
            offered: items.len(),
            kept: MAX_SELECTED,
        });
        items.truncate(MAX_SELECTED);
    }
    if items.len() < MIN_SELECTED && items.len() < candidates.len() {
        warnings.push(ParseWarning::FewerThanExpected { count: items.len() });
    }
    items
}

/// Parse the raw reply against the candidates that were offered.
///
/// # Errors
///
/// [`AiRequestError::Unparseable`] when the reply holds no JSON object, or
/// when candidates were offered and it yields neither a greeting nor any
/// selected item. Without candidates a missing greeting is only a warning.
pub fn parse_reply(raw: &str, candidates: &[NewsItem], cities: &[String]) -> Result<ParsedReply, AiRequestError> {
    let (obj, extracted) = extract_object(raw).ok_or_else(|| {
        AiRequestError::Unparseable(format!("no JSON object in reply: {}", truncate_for_log(raw.trim(), 200)))
    })?;

    let mut warnings = Vec::new();
    if extracted {
        warnings.push(ParseWarning::ExtractedFromProse);
    }

    let greeting = non_blank_str(obj.get("greeting"));
    if greeting.is_none() {
        warnings.push(ParseWarning::MissingGreeting);
    }
    let weather_advice = parse_advice(&obj, cities, &mut warnings);
    let items = parse_selection(&obj, candidates, &mut warnings);

    if greeting.is_none() && items.is_empty() && !candidates.is_empty() {
        return Err(AiRequestError::Unparseable(
            "reply has neither a greeting nor any usable news item".to_string(),
        ));
    }

    Ok(ParsedReply {
        greeting,
        weather_advice,
        items,
        warnings,
    })
}
