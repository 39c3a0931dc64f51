pub mod logging;
pub mod peripheral;
