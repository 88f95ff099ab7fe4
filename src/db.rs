// src/db.rs

pub mod repository;
pub use repository::{Repository, RepositoryTx};
pub mod pg_repo;
pub use pg_repo::PgRepository;
pub mod memory_repo;
pub use memory_repo::MemoryRepository;
