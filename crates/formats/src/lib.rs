pub mod bundle;
pub mod log_line;

pub use bundle::*;
pub use log_line::*;
