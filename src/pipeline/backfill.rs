use std::path::{Path, PathBuf};

use crate::ai::{ImageSource, ImageSynthesizer, InsightExtractor, InsightSource};
use crate::config::Config;
use crate::db::Repository;
use crate::error::{AppError, Result};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BackfillReport {
    /// Rows returned by the missing-image query.
    pub selected: usize,
    pub generated: usize,
    pub failed: usize,
}

/// Generates images for up to `limit` articles that do not have one yet.
///
/// Only setup failures (output directory, store query) end the batch with an error;
/// a failing row is logged and skipped.
pub async fn run_backfill(
    store: &Repository,
    keywords: Option<&dyn InsightSource>,
    images: &dyn ImageSource,
    images_dir: &Path,
    limit: usize,
) -> Result<BackfillReport> {
    tracing::info!("Starting image backfill (limit {})", limit);

    tokio::fs::create_dir_all(images_dir).await?;

    let articles = store.find_missing_generated_image(limit).await?;
    let mut report = BackfillReport {
        selected: articles.len(),
        ..Default::default()
    };

    if articles.is_empty() {
        tracing::info!("No articles are missing a generated image");
        return Ok(report);
    }

    tracing::info!("Generating images for {} article(s)", articles.len());

    for article in articles {
        if article.title.trim().is_empty() {
            tracing::warn!("Skipping article {} with an empty title", article.id);
            report.failed += 1;
            continue;
        }

        let subject = image_subject(keywords, &article.title).await;
        let destination = image_path(images_dir, article.id);
        tracing::info!(
            "Generating image for article {} ('{}') -> {}",
            article.id,
            article.title,
            destination.display()
        );

        if !images.synthesize(&subject, &destination).await {
            tracing::error!("Image generation failed for article {}", article.id);
            report.failed += 1;
            continue;
        }

        let path = destination.to_string_lossy();
        match store.set_generated_image(article.id, &path).await {
            Ok(true) => report.generated += 1,
            Ok(false) => {
                tracing::error!("Article {} was not updated with {}", article.id, path);
                report.failed += 1;
            }
            Err(e) => {
                tracing::error!("Failed to record image for article {}: {}", article.id, e);
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "Image backfill finished: {} generated, {} failed",
        report.generated,
        report.failed
    );
    Ok(report)
}

/// Builds the Gemini clients from `config` and runs [`run_backfill`].
pub async fn run_configured_backfill(
    config: &Config,
    store: &Repository,
    limit: usize,
) -> Result<BackfillReport> {
    let api_key = config.gemini_api_key.clone().ok_or_else(|| {
        AppError::Config("GEMINI_API_KEY is required for image generation".to_string())
    })?;

    let keywords = match InsightExtractor::new(api_key.clone(), config.text_model.clone()) {
        Ok(extractor) => Some(extractor),
        Err(e) => {
            tracing::warn!("Keyword extraction unavailable ({}); using titles as prompts", e);
            None
        }
    };
    let images = ImageSynthesizer::new(api_key, config.image_model.clone())?;
    tracing::info!("Image model: {}", images.model());

    run_backfill(
        store,
        keywords.as_ref().map(|k| k as &dyn InsightSource),
        &images,
        &config.images_dir,
        limit,
    )
    .await
}

/// Deterministic output location for an article's image.
pub fn image_path(images_dir: &Path, article_id: i64) -> PathBuf {
    images_dir.join(format!("article_img_{}.png", article_id))
}

/// Keyword phrase for the image prompt, or the title itself when no keywords
/// can be had.
pub async fn image_subject(keywords: Option<&dyn InsightSource>, title: &str) -> String {
    let Some(extractor) = keywords else {
        return title.to_string();
    };

    match extractor.extract_keywords(title).await {
        Ok(words) if !words.is_empty() => {
            let subject = words.join(", ");
            tracing::info!("Using keyword prompt '{}'", subject);
            subject
        }
        Ok(_) => {
            tracing::warn!("No keywords extracted for '{}'; using the title", title);
            title.to_string()
        }
        Err(e) => {
            tracing::error!("Keyword extraction failed for '{}': {}; using the title", title, e);
            title.to_string()
        }
    }
}
