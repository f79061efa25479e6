pub mod device;
pub mod frame;
pub mod governor;
pub mod idle;

pub use device::*;
pub use frame::*;
pub use governor::*;
pub use idle::*;
