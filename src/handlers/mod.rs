pub mod content_handlers;
pub mod extract;
pub mod featured_handlers;
pub mod health_handlers;
pub mod object_handlers;
pub mod product_handlers;
pub mod upload_handlers;
