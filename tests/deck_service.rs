// Integration tests for deck-build orchestration and player administration,
// run against a temp data dir and a scripted model backend.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;

use deck_builder::config::Config;
use deck_builder::error::{Error, Result};
use deck_builder::llm::{GenerationConfig, ModelAdapter, ModelBackend, ModelResponse};
use deck_builder::models::{ArchetypeEntry, CardDescriptor, MetaSnapshot, PlayerProfile};
use deck_builder::normalize::{FALLBACK_WARNING, PLACEHOLDER_REASON};
use deck_builder::service::DeckService;
use deck_builder::store::Store;
use deck_builder::vendor::{VendorCard, VendorPlayer};

const DECK: [&str; 8] = [
    "Hog Rider",
    "Musketeer",
    "Ice Spirit",
    "Skeletons",
    "Cannon",
    "Fireball",
    "The Log",
    "Knight",
];

/// Model backend that replays canned replies and records every prompt.
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<ModelResponse>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<ModelResponse>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn text(reply: impl Into<String>) -> Arc<Self> {
        Self::new(vec![Ok(ModelResponse::CandidateParts(vec![reply.into()]))])
    }
}

#[async_trait]
impl ModelBackend for ScriptedModel {
    async fn generate(&self, prompt: &str, _config: &GenerationConfig) -> Result<ModelResponse> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(ModelResponse::Empty))
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    service: DeckService,
}

fn fixture(model: Option<Arc<ScriptedModel>>) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::default()
    };
    let adapter = model.map(|m| ModelAdapter::new(m, GenerationConfig::attempts(false)));
    let service = DeckService::new(config, Store::new(dir.path()), adapter);
    Fixture { _dir: dir, service }
}

async fn seed(service: &DeckService) {
    let store = service.store();
    let mut cards: Vec<CardDescriptor> = DECK
        .iter()
        .map(|name| CardDescriptor::new(*name, 3.0))
        .collect();
    cards.push(CardDescriptor::new("P.E.K.K.A", 7.0));
    store.save_cards(&cards).await.unwrap();

    store
        .save_meta(&MetaSnapshot {
            period: "last 4 months".into(),
            archetypes: vec![ArchetypeEntry {
                name: "Hog 2.6".into(),
                cards: DECK.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            }],
        })
        .await
        .unwrap();

    let mut player = PlayerProfile::default();
    player.set_card("Knight", 14, true);
    player.set_card("Hog Rider", 13, false);
    player.set_card("Skeletons", 12, true);
    store.save_player("samuel", &mut player).await.unwrap();
}

// ── Deck building ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_build_decks_normalizes_model_reply() {
    let reply = json!({"decks": [
        {"cards": DECK, "evolved_cards": ["Knight", "Musketeer"], "reasons": "cycle"},
        {"cards": ["pekka", "Golem"], "reasons": "heavy"}
    ]});
    let model = ScriptedModel::text(format!("```json\n{reply}\n```"));
    let fx = fixture(Some(model.clone()));
    seed(&fx.service).await;

    let resp = fx
        .service
        .build_decks(" Samuel ", "fast hog cycle")
        .await
        .unwrap();

    assert_eq!(resp.decks.len(), 3);
    assert_eq!(resp.decks[0].cards, DECK.to_vec());
    assert_eq!(resp.decks[0].avg_elixir, Some(3.0));
    assert_eq!(resp.decks[0].evolved_cards, vec!["Knight"]);
    assert_eq!(resp.decks[1].cards, vec!["P.E.K.K.A"]);
    assert_eq!(resp.decks[1].avg_elixir, None);
    assert_eq!(resp.decks[2].reasons, PLACEHOLDER_REASON);

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("--- INPUT ---"));
    assert!(prompts[0].contains("\"request\":\"fast hog cycle\""));
    assert!(prompts[0].contains("\"evolutions_owned\":[\"Knight\",\"Skeletons\"]"));
}

#[tokio::test]
async fn test_build_decks_text_reply_falls_back() {
    let fx = fixture(Some(ScriptedModel::text("Try Hog Rider with Musketeer.")));
    seed(&fx.service).await;

    let resp = fx.service.build_decks("samuel", "anything").await.unwrap();
    assert_eq!(resp.decks[0].reasons, "Try Hog Rider with Musketeer.");
    assert_eq!(resp.decks[0].warnings, FALLBACK_WARNING);
    assert_eq!(resp.decks.len(), 3);
}

#[tokio::test]
async fn test_empty_replies_make_model_unavailable() {
    let model = ScriptedModel::new(vec![
        Ok(ModelResponse::DirectText(String::new())),
        Ok(ModelResponse::DirectText(String::new())),
    ]);
    let fx = fixture(Some(model.clone()));
    seed(&fx.service).await;

    let err = fx.service.build_decks("samuel", "cycle").await.unwrap_err();
    assert!(matches!(err, Error::ModelUnavailable(_)), "{err:?}");
    assert_eq!(model.prompts.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn test_build_decks_requires_id_and_prompt() {
    let fx = fixture(Some(ScriptedModel::text("{}")));
    seed(&fx.service).await;

    let err = fx.service.build_decks("samuel", "   ").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
    let err = fx.service.build_decks("", "cycle").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_build_decks_unknown_player() {
    let fx = fixture(Some(ScriptedModel::text("{}")));
    seed(&fx.service).await;

    let err = fx.service.build_decks("nobody", "cycle").await.unwrap_err();
    assert!(matches!(err, Error::RecordNotFound(ref id) if id == "nobody"));
}

#[tokio::test]
async fn test_build_decks_missing_data() {
    let fx = fixture(Some(ScriptedModel::text("{}")));

    // Player without cards.
    fx.service.create_player("ana").await.unwrap();
    let err = fx.service.build_decks("ana", "cycle").await.unwrap_err();
    assert!(matches!(err, Error::MissingData(ref m) if m.contains("no cards")));

    // Cards but no catalog.
    fx.service.add_card("ana", "Knight", None, false).await.unwrap();
    let err = fx.service.build_decks("ana", "cycle").await.unwrap_err();
    assert!(matches!(err, Error::MissingData(ref m) if m.contains("catalog")));

    // Catalog but no meta.
    fx.service
        .store()
        .save_cards(&[CardDescriptor::new("Knight", 3.0)])
        .await
        .unwrap();
    let err = fx.service.build_decks("ana", "cycle").await.unwrap_err();
    assert!(matches!(err, Error::MissingData(ref m) if m.contains("meta")));
}

#[tokio::test]
async fn test_build_decks_without_model_key() {
    let fx = fixture(None);
    seed(&fx.service).await;

    let err = fx.service.build_decks("samuel", "cycle").await.unwrap_err();
    assert!(matches!(err, Error::ConfigurationMissing("GEMINI_API_KEY")));
}

// ── Player administration ─────────────────────────────────────────────

#[tokio::test]
async fn test_add_card_defaults_level() {
    let fx = fixture(None);
    fx.service.create_player("Ana").await.unwrap();

    let player = fx
        .service
        .add_card("ana", " Knight ", None, true)
        .await
        .unwrap();
    assert_eq!(player.cards_owned["Knight"].level, 11);
    assert!(player.cards_owned["Knight"].evolution);

    let player = fx
        .service
        .add_card("ana", "Knight", Some(14), false)
        .await
        .unwrap();
    assert_eq!(player.cards_owned["Knight"].level, 14);
    assert_eq!(player.cards_owned.len(), 1);
}

#[tokio::test]
async fn test_add_card_to_missing_player() {
    let fx = fixture(None);
    let err = fx
        .service
        .add_card("ghost", "Knight", None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RecordNotFound(_)));

    fx.service.create_player("ghost").await.unwrap();
    let err = fx.service.add_card("ghost", "  ", None, false).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_create_list_delete_players() {
    let fx = fixture(None);
    fx.service.create_player("zoe").await.unwrap();
    fx.service.create_player("ana").await.unwrap();
    assert_eq!(fx.service.list_players().await.unwrap(), vec!["ana", "zoe"]);

    assert!(fx.service.delete_player("ZOE").await.unwrap());
    assert!(!fx.service.delete_player("zoe").await.unwrap());
    assert_eq!(fx.service.list_players().await.unwrap(), vec!["ana"]);
}

#[tokio::test]
async fn test_imported_player_is_stored() {
    let fx = fixture(None);
    let raw = VendorPlayer {
        tag: Some("#ABC123".into()),
        name: Some("Samuel".into()),
        cards: vec![
            VendorCard {
                name: Some("Knight".into()),
                level: Some(14),
                max_level: Some(16),
                count: Some(3),
            },
            VendorCard {
                name: Some("Archers".into()),
                level: None,
                max_level: None,
                count: None,
            },
        ],
    };

    let count = fx.service.store_imported_player("Samuel", &raw).await.unwrap();
    assert_eq!(count, 2);
    let player = fx.service.get_player("samuel").await.unwrap();
    assert_eq!(player.cards_owned["Knight"].level, 14);
    assert_eq!(player.cards_owned["Archers"].level, 1);
    assert!(player.evolutions_owned().is_empty());
}

#[tokio::test]
async fn test_import_without_cards_is_rejected() {
    let fx = fixture(None);
    let raw = VendorPlayer {
        tag: Some("#ABC123".into()),
        name: None,
        cards: vec![],
    };
    let err = fx.service.store_imported_player("samuel", &raw).await.unwrap_err();
    assert!(matches!(err, Error::MissingData(_)));
    assert!(fx.service.list_players().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vendor_operations_need_api_key() {
    let fx = fixture(None);
    let err = fx.service.refresh_catalog().await.unwrap_err();
    assert!(matches!(err, Error::ConfigurationMissing("API_KEY")));
    let err = fx.service.import_player("samuel", "#ABC").await.unwrap_err();
    assert!(matches!(err, Error::ConfigurationMissing("API_KEY")));
}

#[tokio::test]
async fn test_update_meta_text() {
    let fx = fixture(None);
    let err = fx.service.update_meta_text("{not json").await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let meta = fx
        .service
        .update_meta_text(r#"{"period": "jun-sep", "archetypes": [{"name": "Log Bait", "cards": ["The Log"]}]}"#)
        .await
        .unwrap();
    assert_eq!(meta.archetypes[0].name, "Log Bait");
    assert_eq!(fx.service.store().get_meta().await.unwrap(), meta);
}
