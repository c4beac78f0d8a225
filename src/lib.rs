//! MetaJaya Shop catalog backend.
//!
//! REST API for a storefront and its admin dashboard: products with coupled
//! image assets, a capped featured-product selection, the hero banner and
//! the privacy policy. SQLite holds records; images live in an object store
//! served back under public URLs.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
