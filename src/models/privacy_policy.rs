//! Privacy policy document.

use super::not_blank;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct PrivacyPolicy {
    pub id: i64,
    pub content: String,
    pub updated_at: NaiveDate,
}

/// Body of `POST /api/privacy-policy`.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PrivacyPolicyInput {
    #[validate(custom(function = "not_blank"))]
    pub content: String,
}
