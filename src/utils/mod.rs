pub mod jwt;
pub mod refer_code;
pub mod text;

pub use jwt::*;
pub use refer_code::{generate_refer_code, generate_unique_refer_code};
pub use text::shorten;
