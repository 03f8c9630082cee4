// Deck building and player administration, shared by the web routes and
// the interactive menu.

use std::sync::Arc;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::llm::gemini::GeminiBackend;
use crate::llm::{GenerationConfig, ModelAdapter, DECK_INSTRUCTIONS};
use crate::metrics;
use crate::models::{DeckResponse, MetaSnapshot, PlayerProfile, DEFAULT_CARD_LEVEL};
use crate::normalize::{CatalogIndex, DeckNormalizer};
use crate::payload::build_payload;
use crate::store::{normalize_player_id, Store, StoreStatus};
use crate::vendor::{transform_player, VendorClient, VendorPlayer};

pub struct DeckService {
    config: Config,
    store: Store,
    model: Option<ModelAdapter>,
}

impl DeckService {
    pub fn new(config: Config, store: Store, model: Option<ModelAdapter>) -> Self {
        Self {
            config,
            store,
            model,
        }
    }

    /// Wire the service from configuration. The model adapter is only built
    /// when a model key is present; deck builds report the missing key.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = Store::new(config.data_dir.clone());
        let model = match GeminiBackend::from_config(&config) {
            Ok(backend) => Some(ModelAdapter::new(
                Arc::new(backend),
                GenerationConfig::attempts(config.strict_schema),
            )),
            Err(Error::ConfigurationMissing(var)) => {
                tracing::warn!("{var} is not set; deck building is disabled");
                None
            }
            Err(e) => return Err(e),
        };
        Ok(Self::new(config, store, model))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    fn vendor(&self) -> Result<VendorClient> {
        let key = self.config.require_vendor_key()?;
        VendorClient::new(&self.config.vendor_base_url, key)
    }

    // ── Catalog and meta ─────────────────────────────────────────────

    /// Re-fetch the vendor catalog and overwrite the cache. Returns the
    /// number of cards stored.
    pub async fn refresh_catalog(&self) -> Result<usize> {
        let cards = self.vendor()?.fetch_catalog().await?;
        self.store.save_cards(&cards).await?;
        tracing::info!("Card catalog refreshed: {} cards", cards.len());
        Ok(cards.len())
    }

    pub async fn update_meta(&self, meta: &MetaSnapshot) -> Result<()> {
        self.store.save_meta(meta).await?;
        tracing::info!(
            "Meta snapshot saved ({} archetypes, period '{}')",
            meta.archetypes.len(),
            meta.period
        );
        Ok(())
    }

    /// Parse pasted meta JSON and store it.
    pub async fn update_meta_text(&self, text: &str) -> Result<MetaSnapshot> {
        let meta: MetaSnapshot = serde_json::from_str(text)
            .map_err(|e| Error::invalid_input(format!("invalid meta JSON: {e}")))?;
        self.update_meta(&meta).await?;
        Ok(meta)
    }

    // ── Players ──────────────────────────────────────────────────────

    pub async fn list_players(&self) -> Result<Vec<String>> {
        self.store.list_players().await
    }

    pub async fn get_player(&self, player_id: &str) -> Result<PlayerProfile> {
        let id = normalize_player_id(player_id)?;
        self.store
            .get_player(&id)
            .await?
            .ok_or(Error::RecordNotFound(id))
    }

    /// Store an empty profile, replacing any existing record.
    pub async fn create_player(&self, player_id: &str) -> Result<PlayerProfile> {
        let mut player = PlayerProfile::default();
        self.store.save_player(player_id, &mut player).await?;
        tracing::info!("Player '{}' created", player.player_id);
        Ok(player)
    }

    pub async fn delete_player(&self, player_id: &str) -> Result<bool> {
        let deleted = self.store.delete_player(player_id).await?;
        if deleted {
            tracing::info!("Player '{}' deleted", player_id.trim().to_lowercase());
        }
        Ok(deleted)
    }

    /// Insert or update one owned card.
    pub async fn add_card(
        &self,
        player_id: &str,
        name: &str,
        level: Option<u32>,
        evolution: bool,
    ) -> Result<PlayerProfile> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::invalid_input("card name is required"));
        }
        let mut player = self.get_player(player_id).await?;
        player.set_card(name, level.unwrap_or(DEFAULT_CARD_LEVEL), evolution);
        let id = player.player_id.clone();
        self.store.save_player(&id, &mut player).await?;
        Ok(player)
    }

    /// Fetch a player by tag from the vendor and store it under `player_id`.
    /// Returns the number of cards imported.
    pub async fn import_player(&self, player_id: &str, tag: &str) -> Result<usize> {
        let id = normalize_player_id(player_id)?;
        let raw = self.vendor()?.fetch_player(tag).await?;
        self.store_imported_player(&id, &raw).await
    }

    /// Transform and store a vendor player record. An import without cards
    /// is rejected.
    pub async fn store_imported_player(&self, player_id: &str, raw: &VendorPlayer) -> Result<usize> {
        let id = normalize_player_id(player_id)?;
        let mut player = transform_player(&id, raw);
        if player.cards_owned.is_empty() {
            return Err(Error::missing_data(
                "import returned no cards; check the tag and the API key scope",
            ));
        }
        self.store.save_player(&id, &mut player).await?;
        metrics::PLAYER_IMPORTS_TOTAL.inc();
        tracing::info!(
            "Player '{id}' imported with {} cards",
            player.cards_owned.len()
        );
        Ok(player.cards_owned.len())
    }

    pub async fn store_status(&self) -> Result<StoreStatus> {
        self.store.status().await
    }

    // ── Deck building ────────────────────────────────────────────────

    /// Ask the model for three decks for `player_id` and normalize the reply.
    pub async fn build_decks(&self, player_id: &str, prompt: &str) -> Result<DeckResponse> {
        let result = self.build_decks_inner(player_id, prompt).await;
        let outcome = if result.is_ok() { "ok" } else { "error" };
        metrics::DECK_BUILDS_TOTAL
            .with_label_values(&[outcome])
            .inc();
        result
    }

    async fn build_decks_inner(&self, player_id: &str, prompt: &str) -> Result<DeckResponse> {
        let prompt = prompt.trim();
        if player_id.trim().is_empty() || prompt.is_empty() {
            return Err(Error::invalid_input("player_id and prompt are required"));
        }
        let player = self.get_player(player_id).await?;
        if player.cards_owned.is_empty() {
            return Err(Error::missing_data(format!(
                "player '{}' has no cards; import it first",
                player.player_id
            )));
        }
        let cards = self.store.get_cards().await?;
        if cards.is_empty() {
            return Err(Error::missing_data(
                "no card catalog cached; refresh the cards first",
            ));
        }
        let meta = self.store.get_meta().await?;
        if meta.is_empty() {
            return Err(Error::missing_data(
                "no meta snapshot stored; update the meta first",
            ));
        }
        let model = self
            .model
            .as_ref()
            .ok_or(Error::ConfigurationMissing("GEMINI_API_KEY"))?;

        let max_evolutions = self.config.max_evolutions_per_deck;
        let payload = build_payload(&player, &cards, &meta, prompt, max_evolutions);
        let raw = model.invoke(DECK_INSTRUCTIONS, &payload).await?;

        let index = CatalogIndex::new(&cards);
        let evolutions = player.evolutions_owned();
        Ok(DeckNormalizer::new(&index, &evolutions)
            .with_max_evolutions(max_evolutions)
            .normalize(&raw))
    }
}
