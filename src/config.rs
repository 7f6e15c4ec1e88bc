use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash-preview-04-17";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-3.0-generate-002";
pub const DEFAULT_DB_FILE: &str = "automkt.db";
pub const DEFAULT_IMAGES_DIR: &str = "generated_images";
pub const DEFAULT_IMAGE_LIMIT: usize = 5;

/// Process-wide settings, read once at startup and handed to each component.
#[derive(Clone)]
pub struct Config {
    pub rss_feeds: Vec<String>,
    pub gemini_api_key: Option<String>,
    pub text_model: String,
    pub image_model: String,
    pub db_path: String,
    pub webhook_url: Option<String>,
    pub image_processing_limit: usize,
    pub generate_images_on_ingest: bool,
    pub images_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rss_feeds: Vec::new(),
            gemini_api_key: None,
            text_model: DEFAULT_TEXT_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            db_path: DEFAULT_DB_FILE.to_string(),
            webhook_url: None,
            image_processing_limit: DEFAULT_IMAGE_LIMIT,
            generate_images_on_ingest: false,
            images_dir: PathBuf::from(DEFAULT_IMAGES_DIR),
        }
    }
}

// The API key never reaches log output.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("rss_feeds", &self.rss_feeds)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("db_path", &self.db_path)
            .field("webhook_url", &self.webhook_url)
            .field("image_processing_limit", &self.image_processing_limit)
            .field("generate_images_on_ingest", &self.generate_images_on_ingest)
            .field("images_dir", &self.images_dir)
            .finish()
    }
}

impl Config {
    /// Loads `.env` (if present) and then reads the process environment.
    /// Variables already set in the environment take precedence over `.env`.
    pub fn load() -> Self {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => tracing::debug!("No .env file found"),
            Err(e) => tracing::warn!("Failed to load .env file: {}", e),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values are treated as unset
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut rss_feeds = Vec::new();
        while let Some(url) = get(&format!("RSS_FEED_{}", rss_feeds.len() + 1)) {
            rss_feeds.push(url);
        }

        if rss_feeds.is_empty() {
            tracing::warn!("No RSS feed URLs configured (RSS_FEED_n)");
        } else {
            tracing::info!("Loaded {} RSS feed URL(s)", rss_feeds.len());
        }

        let gemini_api_key = get("GEMINI_API_KEY");
        if gemini_api_key.is_none() {
            tracing::warn!("GEMINI_API_KEY is not set; AI features are disabled");
        }

        let defaults = Config::default();

        let image_processing_limit = match get("IMAGE_PROCESSING_LIMIT") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(
                    "Invalid IMAGE_PROCESSING_LIMIT {:?}, using {}",
                    raw,
                    defaults.image_processing_limit
                );
                defaults.image_processing_limit
            }),
            None => defaults.image_processing_limit,
        };

        let generate_images_on_ingest = match get("GENERATE_IMAGES_ON_INGEST") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                tracing::warn!("Invalid GENERATE_IMAGES_ON_INGEST {:?}, using false", raw);
                false
            }),
            None => false,
        };

        Self {
            rss_feeds,
            gemini_api_key,
            text_model: get("GEMINI_MODEL_NAME").unwrap_or(defaults.text_model),
            image_model: get("IMAGEN_MODEL_NAME").unwrap_or(defaults.image_model),
            db_path: get("DATABASE_FILE_NAME").unwrap_or(defaults.db_path),
            webhook_url: get("SLACK_WEBHOOK_URL"),
            image_processing_limit,
            generate_images_on_ingest,
            images_dir: get("GENERATED_IMAGES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.images_dir),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = config_from(&[]);
        assert!(config.rss_feeds.is_empty());
        assert!(config.gemini_api_key.is_none());
        assert_eq!(config.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.db_path, "automkt.db");
        assert_eq!(config.image_processing_limit, 5);
        assert!(!config.generate_images_on_ingest);
        assert_eq!(config.images_dir, PathBuf::from("generated_images"));
    }

    #[test]
    fn numbered_feeds_stop_at_first_gap() {
        let config = config_from(&[
            ("RSS_FEED_1", "https://a.example/rss"),
            ("RSS_FEED_2", "https://b.example/rss"),
            ("RSS_FEED_4", "https://d.example/rss"),
        ]);
        assert_eq!(
            config.rss_feeds,
            vec!["https://a.example/rss", "https://b.example/rss"]
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = config_from(&[("GEMINI_API_KEY", "   "), ("RSS_FEED_1", "")]);
        assert!(config.gemini_api_key.is_none());
        assert!(config.rss_feeds.is_empty());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = config_from(&[
            ("GEMINI_API_KEY", "key"),
            ("GEMINI_MODEL_NAME", "gemini-1.5-flash"),
            ("DATABASE_FILE_NAME", "other.db"),
            ("SLACK_WEBHOOK_URL", "https://hooks.example/abc"),
            ("IMAGE_PROCESSING_LIMIT", "12"),
            ("GENERATE_IMAGES_ON_INGEST", "Yes"),
        ]);
        assert_eq!(config.gemini_api_key.as_deref(), Some("key"));
        assert_eq!(config.text_model, "gemini-1.5-flash");
        assert_eq!(config.db_path, "other.db");
        assert_eq!(config.webhook_url.as_deref(), Some("https://hooks.example/abc"));
        assert_eq!(config.image_processing_limit, 12);
        assert!(config.generate_images_on_ingest);
    }

    #[test]
    fn malformed_values_fall_back() {
        let config = config_from(&[
            ("IMAGE_PROCESSING_LIMIT", "lots"),
            ("GENERATE_IMAGES_ON_INGEST", "maybe"),
        ]);
        assert_eq!(config.image_processing_limit, DEFAULT_IMAGE_LIMIT);
        assert!(!config.generate_images_on_ingest);
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = config_from(&[("GEMINI_API_KEY", "sk-very-secret")]);
        let printed = format!("{:?}", config);
        assert!(!printed.contains("sk-very-secret"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains(DEFAULT_TEXT_MODEL));
    }
}
