pub mod compute;
pub mod files;

pub use compute::*;
pub use files::*;
