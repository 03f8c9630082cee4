// Card catalog, meta snapshot, player profile and deck records.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Elixir cost assumed for a catalog entry that does not carry one.
pub const DEFAULT_ELIXIR_COST: f64 = 3.0;

/// Card level recorded when an add-card request leaves it out.
pub const DEFAULT_CARD_LEVEL: u32 = 11;

/// Number of cards in a complete deck.
pub const DECK_SIZE: usize = 8;

/// Number of decks every deck response carries.
pub const DECKS_PER_RESPONSE: usize = 3;

/// Evolved cards allowed in one deck.
pub const MAX_EVOLUTIONS_PER_DECK: usize = 2;

/// Card type as the vendor spells it. Unrecognized spellings are kept
/// verbatim in `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CardType {
    Troop,
    Spell,
    Building,
    #[serde(untagged)]
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Rare,
    Epic,
    Legendary,
    Champion,
    #[serde(untagged)]
    Unknown(String),
}

/// One entry of the vendor card catalog.
///
/// Vendor fields this crate does not model (icon urls, max level, ...) are
/// kept in `extra` so the cached catalog stays a faithful copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elixir_cost: Option<f64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub card_type: Option<CardType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,
    #[serde(default)]
    pub id: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CardDescriptor {
    pub fn new(name: impl Into<String>, elixir_cost: f64) -> Self {
        CardDescriptor {
            name: name.into(),
            elixir_cost: Some(elixir_cost),
            card_type: None,
            rarity: None,
            id: 0,
            extra: Map::new(),
        }
    }

    pub fn elixir(&self) -> f64 {
        self.elixir_cost.unwrap_or(DEFAULT_ELIXIR_COST)
    }
}

/// A curated archetype inside the meta snapshot. Only `name` and `cards`
/// are interpreted; anything else is carried through to the model as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArchetypeEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub cards: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaSnapshot {
    #[serde(default)]
    pub period: String,
    #[serde(default)]
    pub archetypes: Vec<ArchetypeEntry>,
}

impl MetaSnapshot {
    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnedCard {
    #[serde(default = "default_owned_level")]
    pub level: u32,
    #[serde(default)]
    pub evolution: bool,
}

fn default_owned_level() -> u32 {
    1
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub bans: BTreeSet<String>,
    #[serde(default)]
    pub must_have: BTreeSet<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub cards_owned: BTreeMap<String, OwnedCard>,
    #[serde(default)]
    pub preferences: Preferences,
}

impl PlayerProfile {
    pub fn empty(player_id: impl Into<String>) -> Self {
        PlayerProfile {
            player_id: player_id.into(),
            ..Default::default()
        }
    }

    /// Names of the owned cards with their evolution unlocked.
    pub fn evolutions_owned(&self) -> BTreeSet<String> {
        self.cards_owned
            .iter()
            .filter(|(_, card)| card.evolution)
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn set_card(&mut self, name: impl Into<String>, level: u32, evolution: bool) {
        self.cards_owned
            .insert(name.into(), OwnedCard { level, evolution });
    }
}

/// One normalized deck suggestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckSuggestion {
    #[serde(default)]
    pub cards: Vec<String>,
    #[serde(default)]
    pub avg_elixir: Option<f64>,
    #[serde(default)]
    pub evolved_cards: Vec<String>,
    #[serde(default)]
    pub reasons: String,
    #[serde(default)]
    pub warnings: String,
}

impl DeckSuggestion {
    pub fn is_complete(&self) -> bool {
        self.cards.len() == DECK_SIZE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeckResponse {
    pub decks: Vec<DeckSuggestion>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_card_descriptor_keeps_vendor_fields() {
        let raw = json!({
            "name": "Knight",
            "id": 26000000,
            "maxLevel": 14,
            "elixirCost": 3,
            "rarity": "common",
            "iconUrls": {"medium": "https://example.invalid/knight.png"}
        });
        let card: CardDescriptor = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(card.name, "Knight");
        assert_eq!(card.elixir(), 3.0);
        assert_eq!(card.rarity, Some(Rarity::Common));
        assert_eq!(card.id, 26000000);
        assert!(card.extra.contains_key("maxLevel"));

        let back = serde_json::to_value(&card).unwrap();
        assert_eq!(back["maxLevel"], 14);
        assert_eq!(back["iconUrls"], raw["iconUrls"]);
    }

    #[test]
    fn test_card_without_elixir_defaults_to_three() {
        let card: CardDescriptor =
            serde_json::from_value(json!({"name": "Mirror", "rarity": "mythic"})).unwrap();
        assert_eq!(card.elixir(), DEFAULT_ELIXIR_COST);
        assert_eq!(card.rarity, Some(Rarity::Unknown("mythic".into())));
    }

    #[test]
    fn test_unrecognized_type_and_rarity_are_kept_verbatim() {
        let raw = json!({"name": "Knight", "type": "Troop", "rarity": "Common"});
        let card: CardDescriptor = serde_json::from_value(raw).unwrap();
        assert_eq!(card.card_type, Some(CardType::Unknown("Troop".into())));

        let back = serde_json::to_value(&card).unwrap();
        assert_eq!(back["type"], "Troop");
        assert_eq!(back["rarity"], "Common");

        let spell: CardDescriptor =
            serde_json::from_value(json!({"name": "Zap", "type": "spell"})).unwrap();
        assert_eq!(spell.card_type, Some(CardType::Spell));
        assert_eq!(serde_json::to_value(&spell).unwrap()["type"], "spell");
    }

    #[test]
    fn test_player_profile_defaults() {
        let player: PlayerProfile = serde_json::from_value(json!({
            "cards_owned": {"Knight": {"level": 12}, "Archers": {"evolution": true}}
        }))
        .unwrap();
        assert_eq!(player.player_id, "");
        assert_eq!(player.cards_owned["Knight"].level, 12);
        assert!(!player.cards_owned["Knight"].evolution);
        assert_eq!(player.cards_owned["Archers"].level, 1);
        assert!(player.preferences.bans.is_empty());
    }

    #[test]
    fn test_evolutions_owned() {
        let mut player = PlayerProfile::empty("samuel");
        player.set_card("Knight", 13, true);
        player.set_card("Archers", 12, false);
        player.set_card("Mortar", 11, true);
        let evos: Vec<String> = player.evolutions_owned().into_iter().collect();
        assert_eq!(evos, vec!["Knight".to_string(), "Mortar".to_string()]);
    }

    #[test]
    fn test_meta_snapshot_keeps_unknown_archetype_fields() {
        let meta: MetaSnapshot = serde_json::from_value(json!({
            "period": "2025-05..2025-08",
            "archetypes": [{"name": "Hog 2.6", "cards": ["Hog Rider"], "win_rate": 0.54}]
        }))
        .unwrap();
        assert!(!meta.is_empty());
        assert_eq!(meta.archetypes[0].extra["win_rate"], 0.54);
    }
}
