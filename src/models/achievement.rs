use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{AchievementType, achievement_entity as achievements};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AchievementResponse {
    pub type_name: AchievementType,
    pub received_at: Option<DateTime<Utc>>,
}

impl From<achievements::Model> for AchievementResponse {
    fn from(m: achievements::Model) -> Self {
        AchievementResponse {
            type_name: m.type_name,
            received_at: m.received_at,
        }
    }
}
