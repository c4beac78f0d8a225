//! Storefront hero banner: one active row, edited in place.

use crate::{
    errors::ShopResult,
    models::hero::{DEFAULT_HEADLINE, DEFAULT_SUB_HEADLINE, HeroSection, HeroUpdate},
    services::image_service::{ImageService, ImageUpload},
};
use chrono::Utc;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};
use validator::Validate;

const HERO_COLUMNS: &str = "id, headline, sub_headline, banner_image_url, is_active, updated_at";

#[derive(Debug, Clone, PartialEq)]
pub struct HeroMutation {
    pub hero: HeroSection,
    pub warning: Option<String>,
}

/// Result of a banner upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BannerUpload {
    pub url: String,
    pub hero: HeroSection,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub struct HeroService {
    db: SqlitePool,
    images: ImageService,
}

impl HeroService {
    pub fn new(db: SqlitePool, images: ImageService) -> Self {
        Self { db, images }
    }

    /// The active hero, or the built-in default when none was saved yet.
    pub async fn get(&self) -> ShopResult<HeroSection> {
        Ok(self.active().await?.unwrap_or_default())
    }

    async fn active(&self) -> ShopResult<Option<HeroSection>> {
        let sql = format!(
            "SELECT {HERO_COLUMNS} FROM hero_section WHERE is_active = 1 ORDER BY id DESC LIMIT 1"
        );
        Ok(sqlx::query_as::<_, HeroSection>(&sql)
            .fetch_optional(&self.db)
            .await?)
    }

    /// Upsert the active row. A banner left out keeps the current one; a
    /// different banner releases the old object.
    #[instrument(skip(self, input))]
    pub async fn update(&self, input: HeroUpdate) -> ShopResult<HeroMutation> {
        input.validate()?;

        let current = self.active().await?;
        let previous_banner = current.as_ref().and_then(|h| h.banner_image_url.clone());
        let banner = input.banner_image_url.clone().or(previous_banner.clone());

        let hero = self
            .save(
                current.as_ref().and_then(|h| h.id),
                input.headline.trim(),
                input.sub_headline.trim(),
                banner.as_deref(),
            )
            .await?;

        let warning = match previous_banner {
            Some(old) if Some(&old) != banner.as_ref() => {
                self.images.delete_by_url(&old).await.warning("Old banner")
            }
            _ => None,
        };
        info!(id = ?hero.id, "hero section saved");
        Ok(HeroMutation { hero, warning })
    }

    /// Store a new banner and point the active row at it.
    #[instrument(skip(self, upload))]
    pub async fn upload_banner(&self, upload: ImageUpload) -> ShopResult<BannerUpload> {
        let current = self.active().await?;
        let old_banner = current.as_ref().and_then(|h| h.banner_image_url.clone());

        let replaced = self.images.replace(old_banner.as_deref(), upload).await?;
        let url = replaced.stored.public_url;

        let (id, headline, sub_headline) = match &current {
            Some(hero) => (hero.id, hero.headline.as_str(), hero.sub_headline.as_str()),
            None => (None, DEFAULT_HEADLINE, DEFAULT_SUB_HEADLINE),
        };
        let hero = self.save(id, headline, sub_headline, Some(&url)).await?;

        info!(url = %url, "hero banner uploaded");
        Ok(BannerUpload {
            url,
            hero,
            warning: replaced.warning,
        })
    }

    async fn save(
        &self,
        id: Option<i64>,
        headline: &str,
        sub_headline: &str,
        banner_image_url: Option<&str>,
    ) -> ShopResult<HeroSection> {
        let now = Utc::now();
        let hero = match id {
            Some(id) => {
                let sql = format!(
                    "UPDATE hero_section
                     SET headline = ?, sub_headline = ?, banner_image_url = ?, updated_at = ?
                     WHERE id = ?
                     RETURNING {HERO_COLUMNS}"
                );
                sqlx::query_as::<_, HeroSection>(&sql)
                    .bind(headline)
                    .bind(sub_headline)
                    .bind(banner_image_url)
                    .bind(now)
                    .bind(id)
                    .fetch_one(&self.db)
                    .await?
            }
            None => {
                let sql = format!(
                    "INSERT INTO hero_section (headline, sub_headline, banner_image_url, is_active, updated_at)
                     VALUES (?, ?, ?, 1, ?)
                     RETURNING {HERO_COLUMNS}"
                );
                sqlx::query_as::<_, HeroSection>(&sql)
                    .bind(headline)
                    .bind(sub_headline)
                    .bind(banner_image_url)
                    .bind(now)
                    .fetch_one(&self.db)
                    .await?
            }
        };
        Ok(hero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::connect_in_memory,
        errors::ShopError,
        services::storage_service::{LocalObjectStore, ObjectStore},
    };
    use std::sync::Arc;

    const JPEG: &[u8] = b"\xff\xd8\xff\xe0fake";

    async fn service(dir: &tempfile::TempDir) -> (HeroService, Arc<LocalObjectStore>) {
        let store = Arc::new(LocalObjectStore::new(dir.path(), "http://localhost:3000"));
        let db = connect_in_memory().await.unwrap();
        (HeroService::new(db, ImageService::hero(store.clone())), store)
    }

    fn update(headline: &str, banner: Option<&str>) -> HeroUpdate {
        HeroUpdate {
            headline: headline.into(),
            sub_headline: "Audio".into(),
            banner_image_url: banner.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn defaults_until_first_save() {
        let dir = tempfile::tempdir().unwrap();
        let (hero, _) = service(&dir).await;
        let current = hero.get().await.unwrap();
        assert_eq!(current, HeroSection::default());
        assert_eq!(current.headline, DEFAULT_HEADLINE);
    }

    #[tokio::test]
    async fn update_creates_then_edits_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let (hero, _) = service(&dir).await;

        let first = hero.update(update("Hello", None)).await.unwrap().hero;
        let second = hero.update(update("Hi again", None)).await.unwrap().hero;
        assert_eq!(first.id, second.id);
        assert_eq!(hero.get().await.unwrap().headline, "Hi again");
    }

    #[tokio::test]
    async fn update_rejects_long_headlines() {
        let dir = tempfile::tempdir().unwrap();
        let (hero, _) = service(&dir).await;
        let err = hero.update(update(&"x".repeat(256), None)).await.unwrap_err();
        assert!(matches!(err, ShopError::Validation(_)));
    }

    #[tokio::test]
    async fn banner_upload_replaces_previous_banner() {
        let dir = tempfile::tempdir().unwrap();
        let (hero, store) = service(&dir).await;

        let first = hero
            .upload_banner(ImageUpload::new(JPEG.to_vec(), "image/jpeg"))
            .await
            .unwrap();
        assert_eq!(first.hero.headline, DEFAULT_HEADLINE);
        let first_path = ImageService::hero(store.clone())
            .path_from_url(&first.url)
            .unwrap();
        assert!(first_path.starts_with("banners/"));

        let second = hero
            .upload_banner(ImageUpload::new(JPEG.to_vec(), "image/jpeg"))
            .await
            .unwrap();
        assert_eq!(second.warning, None);
        assert!(!store.exists("hero-images", &first_path).await.unwrap());
        assert_eq!(
            hero.get().await.unwrap().banner_image_url,
            Some(second.url)
        );
    }
}
