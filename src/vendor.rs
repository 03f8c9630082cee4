// Game vendor REST client: card catalog and player profiles.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{CardDescriptor, OwnedCard, PlayerProfile, Preferences};

const VENDOR_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct CatalogEnvelope {
    items: Vec<CardDescriptor>,
}

/// Card entry of a vendor player record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCard {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub level: Option<u32>,
    #[serde(default)]
    pub max_level: Option<u32>,
    #[serde(default)]
    pub count: Option<u32>,
}

/// The vendor's player record, reduced to the fields the import uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorPlayer {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub cards: Vec<VendorCard>,
}

pub struct VendorClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl VendorClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(VENDOR_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into().trim().to_string(),
        })
    }

    /// Fetch the full card catalog.
    pub async fn fetch_catalog(&self) -> Result<Vec<CardDescriptor>> {
        let url = self.endpoint(&["cards"])?;
        let envelope: CatalogEnvelope = self.get_json(url, "cards").await?;
        Ok(envelope.items)
    }

    /// Fetch a player by tag, e.g. `#ABCD123`.
    pub async fn fetch_player(&self, tag: &str) -> Result<VendorPlayer> {
        let tag = normalize_tag(tag)?;
        let url = self.endpoint(&["players", &tag])?;
        self.get_json(url, "players").await
    }

    /// Build an endpoint URL. Path segments are percent-encoded, which turns
    /// the leading `#` of a player tag into `%23`.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        player_url(&self.base_url, segments)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, endpoint: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = resp.status();
        metrics::VENDOR_REQUESTS_TOTAL
            .with_label_values(&[endpoint, status.as_str()])
            .inc();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("Vendor {endpoint} request failed with {status}");
            return Err(Error::VendorRequestFailed {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

fn player_url(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| Error::invalid_input(format!("invalid vendor base url '{base_url}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| Error::invalid_input(format!("vendor base url '{base_url}' cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// Trim and upper-case a player tag; a tag without `#` gets one.
pub fn normalize_tag(raw: &str) -> Result<String> {
    let tag = raw.trim().to_uppercase();
    let body = tag.trim_start_matches('#');
    if body.is_empty() {
        return Err(Error::invalid_input("player tag is required"));
    }
    Ok(format!("#{body}"))
}

/// Map a vendor player record onto the local profile schema.
///
/// The vendor does not expose evolution ownership, so every card starts with
/// `evolution: false` and has to be corrected through the add-card operation.
pub fn transform_player(player_id: &str, raw: &VendorPlayer) -> PlayerProfile {
    let cards_owned: BTreeMap<String, OwnedCard> = raw
        .cards
        .iter()
        .filter_map(|card| {
            let name = card.name.as_deref()?.trim();
            if name.is_empty() {
                return None;
            }
            Some((
                name.to_string(),
                OwnedCard {
                    level: card.level.unwrap_or(1),
                    evolution: false,
                },
            ))
        })
        .collect();

    PlayerProfile {
        player_id: player_id.to_string(),
        cards_owned,
        preferences: Preferences::default(),
    }
}
