pub mod domain_list;
pub mod events;
pub mod forwarding;
pub mod load_balancer;
pub mod router;
pub mod transport;
pub mod wire;

pub use domain_list::{ChecksumReloader, DomainSet, DomainSource, LoadedList, SharedDomainList};
pub use events::{ChannelQueryTap, InMemoryRouterMetrics, TapEvent, TapEventLogger};
pub use load_balancer::{ConnectOptions, Endpoint, SelectionPolicy};
pub use router::{Answer, InboundQuery, Pool, Router, RouterBuilder};
