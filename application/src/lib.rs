#[cfg(any(
    feature = "adapters",
    feature = "sqlx",
    feature = "reqwest",
    feature = "image"
))]
compile_error!("application must not depend on adapters/framework crates");

pub mod checker;
pub mod config;
pub mod differ;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod infrastructure_config;
pub mod ports;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod testing;
