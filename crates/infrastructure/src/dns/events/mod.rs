pub mod emitter;
pub mod logger;
pub mod metrics;
pub mod types;

pub use emitter::ChannelQueryTap;
pub use logger::TapEventLogger;
pub use metrics::{InMemoryRouterMetrics, UpstreamStats};
pub use types::{TapEvent, TapKind};
