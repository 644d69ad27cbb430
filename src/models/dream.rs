use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::{DreamStatus, DreamType, dream_entity as dreams};

/// 创建梦想（草稿时 goal 可为空）
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateDreamRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    /// 目标金额（分）
    pub goal: Option<i64>,
    /// 默认 user
    pub type_dream: Option<DreamType>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateDreamRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub goal: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DreamResponse {
    pub id: i32,
    pub user_id: i32,
    pub status: DreamStatus,
    pub type_dream: DreamType,
    pub title: String,
    pub description: String,
    pub language: String,
    pub goal: i64,
    pub collected: i64,
    pub currency_id: i32,
    /// 强制捐赠槽位，按级别排序
    pub ref_donations: Vec<i32>,
    pub donations_count: i32,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

impl From<dreams::Model> for DreamResponse {
    fn from(m: dreams::Model) -> Self {
        DreamResponse {
            id: m.id,
            user_id: m.user_id,
            status: m.status,
            type_dream: m.type_dream,
            title: m.title,
            description: m.description,
            language: m.language,
            goal: m.goal,
            collected: m.collected,
            currency_id: m.currency_id,
            ref_donations: m.ref_donations.0,
            donations_count: m.donations_count,
            created_at: m.created_at,
            closed_at: m.closed_at,
        }
    }
}

/// 分级捐赠目标梦想的展示信息（已翻译、已截断）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReferralDreamSummary {
    pub id: i32,
    pub user_id: i32,
    pub status: DreamStatus,
    pub title: String,
    pub description: String,
    pub goal: i64,
    pub collected: i64,
}
