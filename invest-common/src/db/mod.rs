//! Database schema, migrations and runtime settings

pub mod init;
pub mod migrations;
pub mod settings;

pub use init::{init_database, init_memory_database};
pub use migrations::run_migrations;
pub use settings::{get_i64_setting, get_setting, set_setting};
