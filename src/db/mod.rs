pub mod migration;
pub mod pagination;
pub mod pool;
pub mod queries;
