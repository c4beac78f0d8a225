//! Storefront hero banner.

use super::not_blank;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const DEFAULT_HEADLINE: &str = "Selamat Datang di MetaJaya Shop";
pub const DEFAULT_SUB_HEADLINE: &str = "Toko Audio Profesional Terlengkap di Indonesia";

/// The active hero section. `id` and `updated_at` are `None` for the
/// built-in default shown before anything is saved.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct HeroSection {
    pub id: Option<i64>,
    pub headline: String,
    pub sub_headline: String,
    pub banner_image_url: Option<String>,
    pub is_active: bool,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Default for HeroSection {
    fn default() -> Self {
        Self {
            id: None,
            headline: DEFAULT_HEADLINE.to_string(),
            sub_headline: DEFAULT_SUB_HEADLINE.to_string(),
            banner_image_url: None,
            is_active: true,
            updated_at: None,
        }
    }
}

/// Body of `PUT /api/hero`. An absent banner keeps the current one.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct HeroUpdate {
    #[validate(
        length(max = 255, message = "Headline must be at most 255 characters"),
        custom(function = "not_blank")
    )]
    pub headline: String,

    #[validate(
        length(max = 500, message = "Sub headline must be at most 500 characters"),
        custom(function = "not_blank")
    )]
    pub sub_headline: String,

    #[validate(url(message = "Banner image URL is not valid"))]
    pub banner_image_url: Option<String>,
}
