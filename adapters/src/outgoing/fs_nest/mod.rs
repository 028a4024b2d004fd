pub mod layout;
pub mod project_images_fs;
pub mod tile_cache_fs;
