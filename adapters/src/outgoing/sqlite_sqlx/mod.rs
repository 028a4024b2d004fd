pub mod person_store_sqlite;
pub mod pool;
pub mod project_store_sqlite;
pub mod tile_store_sqlite;
pub mod utils;
