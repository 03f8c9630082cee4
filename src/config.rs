// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::models::MAX_EVOLUTIONS_PER_DECK;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_VENDOR_BASE_URL: &str = "https://api.clashroyale.com/v1";
pub const DEFAULT_MODEL_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_PORT: u16 = 10000;
pub const DEFAULT_MAX_EVOLUTIONS: usize = MAX_EVOLUTIONS_PER_DECK;

/// Application configuration.
///
/// Built once at startup and handed to each component; nothing below
/// `main` reads the environment on its own.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the flat-file stores.
    pub data_dir: PathBuf,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Bearer token for the game vendor API.
    pub vendor_api_key: Option<String>,
    pub vendor_base_url: String,
    /// API key for the generative model.
    pub model_api_key: Option<String>,
    pub model_name: String,
    pub model_base_url: String,
    /// Ask the model for schema-constrained JSON output.
    pub strict_schema: bool,
    pub max_evolutions_per_deck: usize,
    /// Run the interactive menu instead of the HTTP server.
    pub cli_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data_dir: PathBuf::from("data"),
            port: DEFAULT_PORT,
            vendor_api_key: None,
            vendor_base_url: DEFAULT_VENDOR_BASE_URL.to_string(),
            model_api_key: None,
            model_name: DEFAULT_MODEL.to_string(),
            model_base_url: DEFAULT_MODEL_BASE_URL.to_string(),
            strict_schema: false,
            max_evolutions_per_deck: DEFAULT_MAX_EVOLUTIONS,
            cli_mode: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `DATA_DIR` - store root (default: `data`)
    /// - `PORT` - HTTP server port (default: 10000)
    /// - `API_KEY` - vendor API bearer token
    /// - `VENDOR_BASE_URL` - vendor API root
    /// - `GEMINI_API_KEY` - model API key
    /// - `GEMINI_MODEL` - model name (default: `gemini-2.5-flash`)
    /// - `GEMINI_BASE_URL` - model API root
    /// - `MODEL_STRICT_SCHEMA` - `true`/`1` to request schema-constrained JSON
    /// - `MAX_EVOLUTIONS_PER_DECK` - evolution slots per deck (default and cap: 2)
    ///
    /// CLI flags:
    /// - `--cli` - run the interactive menu
    /// - `--port <PORT>` - override the port
    /// - `--data-dir <DIR>` - override the store root
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    /// Build a config from an argument list and an environment lookup.
    pub fn from_sources<F>(args: &[String], env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let data_dir = Self::parse_cli_value(args, "--data-dir")
            .or_else(|| non_empty("DATA_DIR"))
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| non_empty("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(defaults.port);

        let strict_schema = non_empty("MODEL_STRICT_SCHEMA")
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        let max_evolutions_per_deck = non_empty("MAX_EVOLUTIONS_PER_DECK")
            .and_then(|v| v.parse::<usize>().ok())
            .map(|n| n.min(MAX_EVOLUTIONS_PER_DECK))
            .unwrap_or(defaults.max_evolutions_per_deck);

        Config {
            data_dir,
            port,
            vendor_api_key: non_empty("API_KEY"),
            vendor_base_url: non_empty("VENDOR_BASE_URL").unwrap_or(defaults.vendor_base_url),
            model_api_key: non_empty("GEMINI_API_KEY"),
            model_name: non_empty("GEMINI_MODEL").unwrap_or(defaults.model_name),
            model_base_url: non_empty("GEMINI_BASE_URL").unwrap_or(defaults.model_base_url),
            strict_schema,
            max_evolutions_per_deck,
            cli_mode: args.iter().any(|a| a == "--cli"),
        }
    }

    pub fn require_vendor_key(&self) -> Result<&str> {
        self.vendor_api_key
            .as_deref()
            .ok_or(Error::ConfigurationMissing("API_KEY"))
    }

    pub fn require_model_key(&self) -> Result<&str> {
        self.model_api_key
            .as_deref()
            .ok_or(Error::ConfigurationMissing("GEMINI_API_KEY"))
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}
