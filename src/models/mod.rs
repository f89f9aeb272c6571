pub mod applied;
pub mod cart;
pub mod class;
pub mod enrollment;
pub mod payment;
pub mod user;

pub use applied::*;
pub use cart::*;
pub use class::*;
pub use enrollment::*;
pub use payment::*;
pub use user::*;
