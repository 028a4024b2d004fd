pub mod tile_backend_reqwest;
