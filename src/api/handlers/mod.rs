pub mod capacity;
pub mod health;

pub use capacity::*;
pub use health::*;
