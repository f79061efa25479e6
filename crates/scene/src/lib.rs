pub mod attach;
pub mod visibility;

pub use attach::*;
pub use visibility::*;
