// Compact request object handed to the generative model.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::models::{CardDescriptor, CardType, MetaSnapshot, OwnedCard, PlayerProfile, Rarity};

/// Average card level reported for a player that owns no cards.
pub const DEFAULT_AVG_LEVEL: f64 = 11.0;

#[derive(Debug, Clone, Serialize)]
pub struct Constraints {
    pub max_evolutions_per_deck: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub id: String,
    pub avg_level: f64,
    pub owned: Vec<String>,
    pub levels: BTreeMap<String, OwnedCard>,
    pub evolutions_owned: Vec<String>,
}

/// Catalog entry stripped down to what the model needs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactCard {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elixir_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rarity: Option<Rarity>,
    pub id: i64,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub card_type: Option<CardType>,
}

impl From<&CardDescriptor> for CompactCard {
    fn from(card: &CardDescriptor) -> Self {
        CompactCard {
            name: card.name.clone(),
            elixir_cost: card.elixir_cost,
            rarity: card.rarity.clone(),
            id: card.id,
            card_type: card.card_type.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeckRequestPayload {
    pub constraints: Constraints,
    pub player: PlayerSummary,
    pub cards: Vec<CompactCard>,
    pub meta: MetaSnapshot,
    pub request: String,
}

/// Assemble the model payload for one deck-building request.
pub fn build_payload(
    player: &PlayerProfile,
    catalog: &[CardDescriptor],
    meta: &MetaSnapshot,
    request_text: &str,
    max_evolutions_per_deck: usize,
) -> DeckRequestPayload {
    DeckRequestPayload {
        constraints: Constraints {
            max_evolutions_per_deck,
        },
        player: PlayerSummary {
            id: player.player_id.clone(),
            avg_level: average_level(player),
            owned: player.cards_owned.keys().cloned().collect(),
            levels: player.cards_owned.clone(),
            evolutions_owned: player.evolutions_owned().into_iter().collect(),
        },
        cards: catalog.iter().map(CompactCard::from).collect(),
        meta: meta.clone(),
        request: request_text.to_string(),
    }
}

/// Mean owned-card level rounded to 2 decimals.
pub fn average_level(player: &PlayerProfile) -> f64 {
    if player.cards_owned.is_empty() {
        return DEFAULT_AVG_LEVEL;
    }
    let total: f64 = player.cards_owned.values().map(|c| c.level as f64).sum();
    round2(total / player.cards_owned.len() as f64)
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArchetypeEntry;
    use serde_json::json;

    fn sample_player() -> PlayerProfile {
        let mut player = PlayerProfile::empty("samuel");
        player.set_card("Knight", 13, true);
        player.set_card("Archers", 12, false);
        player.set_card("Hog Rider", 12, false);
        player
    }

    #[test]
    fn test_average_level() {
        assert_eq!(average_level(&sample_player()), 12.33);
        assert_eq!(average_level(&PlayerProfile::empty("new")), DEFAULT_AVG_LEVEL);
    }

    #[test]
    fn test_payload_shape() {
        let mut knight = CardDescriptor::new("Knight", 3.0);
        knight.id = 26000000;
        knight.extra.insert("iconUrls".into(), json!({"medium": "x"}));
        knight.extra.insert("maxLevel".into(), json!(14));
        let meta = MetaSnapshot {
            period: "summer".into(),
            archetypes: vec![ArchetypeEntry {
                name: "Hog 2.6".into(),
                ..Default::default()
            }],
        };

        let payload = build_payload(&sample_player(), &[knight], &meta, "fast \"cycle\" deck", 2);
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(value["constraints"]["max_evolutions_per_deck"], 2);
        assert_eq!(value["player"]["id"], "samuel");
        assert_eq!(value["player"]["avg_level"], 12.33);
        assert_eq!(value["player"]["owned"], json!(["Archers", "Hog Rider", "Knight"]));
        assert_eq!(value["player"]["evolutions_owned"], json!(["Knight"]));
        assert_eq!(value["player"]["levels"]["Knight"]["level"], 13);
        assert_eq!(
            value["cards"][0],
            json!({"name": "Knight", "elixirCost": 3.0, "id": 26000000})
        );
        assert_eq!(value["meta"]["period"], "summer");
        assert_eq!(value["request"], "fast \"cycle\" deck");
    }
}
