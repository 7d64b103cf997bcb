pub mod conn_cache;
pub mod endpoint;
pub mod health;
pub mod policy;

pub use conn_cache::ConnectionCache;
pub use endpoint::{ConnectOptions, Endpoint, EndpointConfig, Exchange};
pub use policy::SelectionPolicy;
