pub mod score;
pub mod weights;

pub use score::*;
pub use weights::*;
