pub mod currency;
pub mod notification;
pub mod translation;

pub use currency::*;
pub use notification::*;
pub use translation::*;
