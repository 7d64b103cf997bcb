pub mod checksum;
pub mod domain_set;
pub mod geosite;
pub mod plaintext;
pub mod reloader;
pub mod source;

pub use checksum::{partial_checksum, partial_checksum_bytes, Checksum, CHUNK_SIZE};
pub use domain_set::DomainSet;
pub use reloader::{empty_shared_list, shared_list, ChecksumReloader, SharedDomainList};
pub use source::{DomainSource, LoadedList};
