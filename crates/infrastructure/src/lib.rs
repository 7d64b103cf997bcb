//! Transports, domain lists, endpoint health and the query router.
pub mod dns;
