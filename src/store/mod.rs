// Flat-file JSON storage for the card catalog, meta snapshot and players.
//
// Each document is read and replaced wholesale. Writes go to a sibling
// temp file and are renamed into place, so a reader never sees a half
// written file; concurrent writers still race and the last rename wins.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::models::{CardDescriptor, MetaSnapshot, PlayerProfile};

const CARDS_FILE: &str = "cards.json";
const META_FILE: &str = "meta_snapshot.json";
const PLAYERS_DIR: &str = "players";

/// Which store files exist on disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct StoreStatus {
    pub players_dir_exists: bool,
    pub players_files: Vec<String>,
    pub meta_exists: bool,
    pub cards_exists: bool,
}

#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cards_path(&self) -> PathBuf {
        self.root.join(CARDS_FILE)
    }

    fn meta_path(&self) -> PathBuf {
        self.root.join(META_FILE)
    }

    fn players_dir(&self) -> PathBuf {
        self.root.join(PLAYERS_DIR)
    }

    fn player_path(&self, player_id: &str) -> Result<PathBuf> {
        let id = normalize_player_id(player_id)?;
        Ok(self.players_dir().join(format!("{id}.json")))
    }

    // ── Catalog ──────────────────────────────────────────────────────

    /// The cached catalog, or an empty list when it was never fetched.
    pub async fn get_cards(&self) -> Result<Vec<CardDescriptor>> {
        Ok(load_json(&self.cards_path()).await?.unwrap_or_default())
    }

    pub async fn save_cards(&self, cards: &[CardDescriptor]) -> Result<()> {
        save_json(&self.cards_path(), &cards).await
    }

    // ── Meta ─────────────────────────────────────────────────────────

    pub async fn get_meta(&self) -> Result<MetaSnapshot> {
        Ok(load_json(&self.meta_path()).await?.unwrap_or_default())
    }

    pub async fn save_meta(&self, meta: &MetaSnapshot) -> Result<()> {
        save_json(&self.meta_path(), meta).await
    }

    // ── Players ──────────────────────────────────────────────────────

    /// Sorted ids of every stored player.
    pub async fn list_players(&self) -> Result<Vec<String>> {
        let dir = self.players_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    pub async fn get_player(&self, player_id: &str) -> Result<Option<PlayerProfile>> {
        load_json(&self.player_path(player_id)?).await
    }

    /// Store a player under `player_id`, stamping the id into the record.
    pub async fn save_player(&self, player_id: &str, player: &mut PlayerProfile) -> Result<()> {
        let id = normalize_player_id(player_id)?;
        player.player_id = id.clone();
        save_json(&self.player_path(&id)?, player).await
    }

    /// Remove a player record. Returns whether one existed.
    pub async fn delete_player(&self, player_id: &str) -> Result<bool> {
        let path = self.player_path(player_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn status(&self) -> Result<StoreStatus> {
        let players_dir_exists = tokio::fs::try_exists(self.players_dir()).await?;
        let players_files = if players_dir_exists {
            self.list_players()
                .await?
                .into_iter()
                .map(|id| format!("{id}.json"))
                .collect()
        } else {
            Vec::new()
        };
        Ok(StoreStatus {
            players_dir_exists,
            players_files,
            meta_exists: tokio::fs::try_exists(self.meta_path()).await?,
            cards_exists: tokio::fs::try_exists(self.cards_path()).await?,
        })
    }
}

/// Trim and lower-case a player id, rejecting anything that is not a plain
/// file stem.
pub fn normalize_player_id(raw: &str) -> Result<String> {
    let id = raw.trim().to_lowercase();
    if id.is_empty() {
        return Err(Error::invalid_input("player_id is required"));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::invalid_input(format!(
            "invalid player_id '{id}': use letters, digits, '-' or '_'"
        )));
    }
    Ok(id)
}

async fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
