pub mod achievement;
pub mod common;
pub mod donation;
pub mod dream;
pub mod referral;

pub use achievement::*;
pub use common::*;
pub use donation::*;
pub use dream::*;
pub use referral::*;
