pub mod config;
pub mod logging;

pub use config::{bind_address, load_config};
pub use logging::init_logging;
