pub mod fs_nest;
pub mod http_reqwest;
pub mod image_rs;
pub mod sqlite_sqlx;
