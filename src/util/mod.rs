pub mod dir;
pub mod toml;
