//! External collaborator interfaces and their HTTP implementations

pub mod catalog;
pub mod job_api;
pub mod object_store;

pub use catalog::{CatalogClient, CatalogQuery, HttpCatalogClient};
pub use job_api::{Hyp3Client, JobApi, JobRecord, JobStatus};
pub use object_store::{HttpObjectStore, ObjectStore};
