mod domain_list;
mod query_tap;
mod router_metrics;

pub use domain_list::{DomainListPort, ReloadOutcome};
pub use query_tap::{InboundResponse, NoopQueryTap, OutboundQuery, QueryTapPort};
pub use router_metrics::{NoopRouterMetrics, RouterMetricsPort};
