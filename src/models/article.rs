use chrono::{DateTime, Utc};

/// A row of the `articles` table.
#[derive(Debug, Clone)]
pub struct Article {
    pub id: i64,
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    /// Empty when the row was stored without points.
    pub insight_points: Vec<String>,
    pub generated_image_path: Option<String>,
    pub posting_image_path: Option<String>,
    pub posting_video_path: Option<String>,
    pub ingested_at: DateTime<Utc>,
}

impl Article {
    pub fn has_generated_image(&self) -> bool {
        self.generated_image_path
            .as_deref()
            .is_some_and(|p| !p.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub title: String,
    pub link: String,
    pub summary: Option<String>,
    pub insight_points: Vec<String>,
}
