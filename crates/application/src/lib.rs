//! bypass-dns application layer: ports the router core calls into.
pub mod ports;
