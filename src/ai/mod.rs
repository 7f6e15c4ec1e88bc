mod chroma;
mod imagen;
mod insight;
mod parsing;

pub use chroma::{chroma_distance, chroma_key, BACKGROUND_KEY, KEY_THRESHOLD};
pub use imagen::{ImageSource, ImageSynthesizer};
pub use insight::{InsightExtractor, InsightSource, MAX_BODY_CHARS};
pub use parsing::{insight_points, parse_keywords, parse_points, NO_POINTS_EXTRACTED};

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
