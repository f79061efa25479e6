pub mod cache;
pub mod fetch;
pub mod loader;
pub mod preload;
pub mod resolver;

pub use cache::*;
pub use fetch::*;
pub use loader::*;
pub use preload::*;
pub use resolver::*;
