pub mod featured_service;
pub mod hero_service;
pub mod image_service;
pub mod privacy_policy_service;
pub mod product_repository;
pub mod product_service;
pub mod storage_service;
