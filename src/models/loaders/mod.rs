pub mod json_loader;
pub mod toml_loader;

pub use json_loader::{load_all_record_files, load_records_from_json};
pub use toml_loader::load_config_toml;
