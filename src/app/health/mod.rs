pub mod eval;
mod test;
pub mod types;
pub mod watermark;

pub use eval::*;
pub use types::*;
pub use watermark::*;
