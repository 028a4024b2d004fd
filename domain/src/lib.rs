pub mod coords;
pub mod error;
pub mod history;
pub mod palette;
pub mod person;
pub mod project;
pub mod tile;
