#![allow(dead_code)]
pub mod mock_domain_list;

pub use mock_domain_list::MockDomainList;
