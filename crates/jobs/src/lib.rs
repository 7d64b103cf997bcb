pub mod domain_list_reload;
pub mod runner;

pub use domain_list_reload::DomainListReloadJob;
pub use runner::{JobHandles, JobRunner};
