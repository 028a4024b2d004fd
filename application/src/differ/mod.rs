pub mod compare;
pub mod service;
