//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_directory_client;
mod in_memory_directory_repository;
mod in_memory_resolution_cache;
mod in_memory_service_record_repository;
mod in_memory_target_repository;
mod postgres_audit_repository;
mod postgres_directory_repository;
mod postgres_service_record_repository;
mod postgres_target_repository;

pub use http_directory_client::HttpDirectoryClient;
pub use in_memory_directory_repository::InMemoryDirectoryRepository;
pub use in_memory_resolution_cache::InMemoryResolutionCache;
pub use in_memory_service_record_repository::InMemoryServiceRecordRepository;
pub use in_memory_target_repository::InMemoryTargetRepository;
pub use postgres_audit_repository::PostgresAuditRepository;
pub use postgres_directory_repository::PostgresDirectoryRepository;
pub use postgres_service_record_repository::PostgresServiceRecordRepository;
pub use postgres_target_repository::PostgresTargetRepository;
