pub mod achievements;
pub mod currencies;
pub mod donate_sizes;
pub mod donations;
pub mod dreams;
pub mod users;

pub use achievements::AchievementType;
pub use donations::DonationStatus;
pub use dreams::{DreamStatus, DreamType, RefDonations};

pub use achievements as achievement_entity;
pub use currencies as currency_entity;
pub use donate_sizes as donate_size_entity;
pub use donations as donation_entity;
pub use dreams as dream_entity;
pub use users as user_entity;
