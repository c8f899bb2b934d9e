pub mod app;

pub use app::{load_config_default, load_config_from, AppConfig};
