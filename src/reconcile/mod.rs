pub mod annotate;
pub mod mapper;
pub mod merge;
pub mod types;

pub use annotate::*;
pub use mapper::*;
pub use merge::*;
pub use types::*;
