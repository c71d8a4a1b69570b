pub mod backend;
pub mod memory;
pub mod metric_store;
pub mod redis_backend;
pub mod sweep;
pub mod types;

pub use backend::*;
pub use memory::*;
pub use metric_store::*;
pub use redis_backend::*;
pub use sweep::*;
pub use types::*;
