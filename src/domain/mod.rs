pub mod exchange;
pub mod models;
pub mod registry;
pub mod settings;
