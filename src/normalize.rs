// Reduces free-form model output to exactly three well-formed decks.
//
// Nothing in here fails: text that is not JSON, JSON without a deck list,
// unknown card names and short or long deck lists all degrade to fallback
// or placeholder decks.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde_json::{Map, Value};

use crate::metrics;
use crate::models::{
    CardDescriptor, DeckResponse, DeckSuggestion, DECKS_PER_RESPONSE, DECK_SIZE,
    DEFAULT_ELIXIR_COST, MAX_EVOLUTIONS_PER_DECK,
};
use crate::payload::round2;

/// Longest raw text kept in the reasons of a non-JSON fallback deck, in chars.
pub const FALLBACK_REASONS_MAX_CHARS: usize = 4000;

pub const FALLBACK_WARNING: &str = "Fallback: non-JSON response from the model.";
pub const PLACEHOLDER_REASON: &str = "fallback deck (AI returned fewer than 3)";

/// Deepest brace nesting the span matcher follows before giving up on a start.
const MAX_BRACE_DEPTH: usize = 64;

/// Shorthand names folded to their catalog spelling. Keys are lower-case.
const CARD_ALIASES: &[(&str, &str)] = &[
    ("log", "The Log"),
    ("the log", "The Log"),
    ("pekka", "P.E.K.K.A"),
    ("p.e.k.k.a.", "P.E.K.K.A"),
    ("mini pekka", "Mini P.E.K.K.A"),
    ("mini p.e.k.k.a.", "Mini P.E.K.K.A"),
    ("ebarbs", "Elite Barbarians"),
    ("e-barbs", "Elite Barbarians"),
    ("egiant", "Electro Giant"),
    ("e-giant", "Electro Giant"),
    ("xbow", "X-Bow"),
    ("x bow", "X-Bow"),
    ("mk", "Mega Knight"),
];

/// Fold a known shorthand to its canonical card name.
pub fn fold_alias(name: &str) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    CARD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

// ── Catalog index ────────────────────────────────────────────────────

/// Catalog keyed by card name, with a case-insensitive side table.
#[derive(Debug, Clone, Default)]
pub struct CatalogIndex {
    by_name: HashMap<String, CardDescriptor>,
    by_lower: HashMap<String, String>,
}

impl CatalogIndex {
    pub fn new(cards: &[CardDescriptor]) -> Self {
        let mut index = CatalogIndex::default();
        for card in cards {
            index
                .by_lower
                .entry(card.name.to_lowercase())
                .or_insert_with(|| card.name.clone());
            index.by_name.insert(card.name.clone(), card.clone());
        }
        index
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&CardDescriptor> {
        self.by_name.get(name)
    }

    /// Resolve a model-supplied name to the catalog's spelling: alias folding
    /// first, then an exact match, then a case-insensitive one.
    pub fn canonical(&self, raw: &str) -> Option<String> {
        let folded = fold_alias(raw);
        if self.by_name.contains_key(&folded) {
            return Some(folded);
        }
        self.by_lower.get(&folded.to_lowercase()).cloned()
    }
}

// ── Step 1: JSON extraction ──────────────────────────────────────────

/// Find the JSON object in a model reply.
///
/// Tried in order: the whole text; the span from the first `{` to the last
/// `}`; then each balanced `{...}` span by start position. A top-level JSON
/// array is taken as the deck list itself.
///
/// The span matcher counts braces only. Braces inside string literals are
/// not skipped, so a card name or reason containing `{` or `}` can hide an
/// otherwise valid object from the third pass.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let trimmed = text.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Object(obj)) => return Some(obj),
        Ok(Value::Array(decks)) => {
            let mut obj = Map::new();
            obj.insert("decks".to_string(), Value::Array(decks));
            return Some(obj);
        }
        _ => {}
    }

    let start = trimmed.find('{')?;
    if let Some(end) = trimmed.rfind('}') {
        if end > start {
            if let Some(obj) = parse_object(&trimmed[start..=end]) {
                return Some(obj);
            }
        }
    }

    let bytes = trimmed.as_bytes();
    bytes
        .iter()
        .enumerate()
        .filter(|(_, b)| **b == b'{')
        .filter_map(|(open, _)| balanced_span_end(bytes, open).map(|close| (open, close)))
        .find_map(|(open, close)| parse_object(&trimmed[open..=close]))
}

fn parse_object(snippet: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(snippet) {
        Ok(Value::Object(obj)) => Some(obj),
        _ => None,
    }
}

/// Index of the `}` closing the `{` at `open`, if the nesting balances
/// within [`MAX_BRACE_DEPTH`].
fn balanced_span_end(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, b) in bytes[open..].iter().enumerate() {
        match b {
            b'{' => {
                depth += 1;
                if depth > MAX_BRACE_DEPTH {
                    return None;
                }
            }
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

// ── Step 2: per-deck validation ──────────────────────────────────────

/// Normalization settings for one request.
#[derive(Debug, Clone)]
pub struct DeckNormalizer<'a> {
    catalog: &'a CatalogIndex,
    owned_evolutions: &'a BTreeSet<String>,
    max_evolutions: usize,
}

impl<'a> DeckNormalizer<'a> {
    pub fn new(catalog: &'a CatalogIndex, owned_evolutions: &'a BTreeSet<String>) -> Self {
        Self {
            catalog,
            owned_evolutions,
            max_evolutions: MAX_EVOLUTIONS_PER_DECK,
        }
    }

    /// Lower the evolution limit. Values above the game's cap are clamped.
    pub fn with_max_evolutions(mut self, max_evolutions: usize) -> Self {
        self.max_evolutions = max_evolutions.min(MAX_EVOLUTIONS_PER_DECK);
        self
    }

    /// Turn raw model text into a response holding exactly three decks.
    pub fn normalize(&self, raw_text: &str) -> DeckResponse {
        let raw_decks = decode_decks(raw_text).unwrap_or_else(|| {
            metrics::NORMALIZATION_FALLBACKS_TOTAL
                .with_label_values(&["text"])
                .inc();
            vec![text_fallback_deck(raw_text)]
        });

        let decks = raw_decks
            .iter()
            .take(DECKS_PER_RESPONSE)
            .map(|deck| self.validate_deck(deck))
            .collect();
        if raw_decks.len() > DECKS_PER_RESPONSE {
            tracing::debug!("Truncating {} decks to {DECKS_PER_RESPONSE}", raw_decks.len());
            metrics::NORMALIZATION_FALLBACKS_TOTAL
                .with_label_values(&["truncated"])
                .inc();
        }

        DeckResponse {
            decks: pad_decks(decks),
        }
    }

    /// Clean one decoded deck object. Anything that is not an object is
    /// treated as an empty deck.
    pub fn validate_deck(&self, raw: &Value) -> DeckSuggestion {
        let cards = self.validate_cards(&name_list(raw.get("cards")));
        let evolved_cards = self.clamp_evolutions(&name_list(raw.get("evolved_cards")), &cards);
        DeckSuggestion {
            avg_elixir: average_elixir(&cards, self.catalog),
            cards,
            evolved_cards,
            reasons: text_field(raw.get("reasons")),
            warnings: text_field(raw.get("warnings")),
        }
    }

    /// Catalog-known, de-duplicated names in model order, at most eight.
    pub fn validate_cards(&self, names: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        names
            .iter()
            .filter_map(|name| self.catalog.canonical(name))
            .filter(|name| seen.insert(name.clone()))
            .take(DECK_SIZE)
            .collect()
    }

    /// Proposed evolutions the player owns and the deck plays, in model
    /// order, cut to the per-deck maximum.
    pub fn clamp_evolutions(&self, proposed: &[String], deck: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        proposed
            .iter()
            .map(|name| self.catalog.canonical(name).unwrap_or_else(|| fold_alias(name)))
            .filter(|name| self.owned_evolutions.contains(name) && deck.contains(name))
            .filter(|name| seen.insert(name.clone()))
            .take(self.max_evolutions)
            .collect()
    }
}

/// Contract-level entry point with the default evolution limit.
pub fn normalize(
    raw_text: &str,
    catalog: &CatalogIndex,
    owned_evolutions: &BTreeSet<String>,
) -> DeckResponse {
    DeckNormalizer::new(catalog, owned_evolutions).normalize(raw_text)
}

/// Elixir average of a validated deck: zero for an empty deck, the mean
/// rounded to two decimals for a full one, nothing otherwise.
pub fn average_elixir(cards: &[String], catalog: &CatalogIndex) -> Option<f64> {
    if cards.is_empty() {
        return Some(0.0);
    }
    if cards.len() != DECK_SIZE {
        return None;
    }
    let total: f64 = cards
        .iter()
        .map(|name| {
            catalog
                .get(name)
                .map(CardDescriptor::elixir)
                .unwrap_or(DEFAULT_ELIXIR_COST)
        })
        .sum();
    Some(round2(total / DECK_SIZE as f64))
}

/// Card names from a JSON list of strings or `{ "name": ... }` objects.
fn name_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| match item {
            Value::String(name) => Some(name.clone()),
            Value::Object(obj) => obj.get("name").and_then(Value::as_str).map(str::to_string),
            _ => None,
        })
        .collect()
}

/// Free text from a string, a list of strings, or anything else.
fn text_field(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(other) => other.to_string(),
    }
}

// ── Step 1b / Step 3: fallback and padding ───────────────────────────

fn text_fallback_deck(raw_text: &str) -> Value {
    let reasons: String = raw_text
        .trim()
        .chars()
        .take(FALLBACK_REASONS_MAX_CHARS)
        .collect();
    serde_json::json!({
        "cards": [],
        "avg_elixir": 0,
        "evolved_cards": [],
        "reasons": reasons,
        "warnings": FALLBACK_WARNING,
    })
}

/// The decoded deck list, or `None` when the text has to fall back.
///
/// An object without a `decks` key yields an empty list, which is padded
/// later. An empty object or a `decks` value that is not a list falls back.
fn decode_decks(raw_text: &str) -> Option<Vec<Value>> {
    let Some(mut obj) = extract_json_object(raw_text) else {
        tracing::warn!("Model response is not JSON, falling back to text");
        return None;
    };
    if obj.is_empty() {
        tracing::warn!("Model JSON is an empty object, falling back to text");
        return None;
    }
    match obj.remove("decks") {
        Some(Value::Array(decks)) => Some(decks),
        None => {
            tracing::debug!("Model JSON has no decks key");
            Some(Vec::new())
        }
        Some(_) => {
            tracing::warn!("Model JSON decks is not a list, falling back to text");
            None
        }
    }
}

pub fn placeholder_deck() -> DeckSuggestion {
    DeckSuggestion {
        cards: Vec::new(),
        avg_elixir: Some(0.0),
        evolved_cards: Vec::new(),
        reasons: PLACEHOLDER_REASON.to_string(),
        warnings: String::new(),
    }
}

fn pad_decks(mut decks: Vec<DeckSuggestion>) -> Vec<DeckSuggestion> {
    if decks.len() < DECKS_PER_RESPONSE {
        tracing::debug!(
            "Padding {} decks with {} placeholders",
            decks.len(),
            DECKS_PER_RESPONSE - decks.len()
        );
        metrics::NORMALIZATION_FALLBACKS_TOTAL
            .with_label_values(&["padded"])
            .inc();
    }
    decks.truncate(DECKS_PER_RESPONSE);
    while decks.len() < DECKS_PER_RESPONSE {
        decks.push(placeholder_deck());
    }
    decks
}
