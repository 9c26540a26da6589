pub mod config_cmd;
pub mod generate;
pub mod inspect;
pub mod schema;
