pub mod palette_codec;
pub mod person_store;
pub mod project_images;
pub mod project_store;
pub mod tile_backend;
pub mod tile_cache;
pub mod tile_store;
