use chrono::{DateTime, Utc};
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 梦想状态，数值严格递增，CLOSED 为终态
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "i32", db_type = "Integer")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DreamStatus {
    #[sea_orm(num_value = 10)]
    Draft,
    #[sea_orm(num_value = 20)]
    Quart,
    #[sea_orm(num_value = 30)]
    Half,
    #[sea_orm(num_value = 40)]
    ThreeQuarters,
    #[sea_orm(num_value = 50)]
    Whole,
    #[sea_orm(num_value = 60)]
    Active,
    #[sea_orm(num_value = 70)]
    Closed,
}

impl DreamStatus {
    /// 状态机允许的迁移
    pub fn can_transition_to(self, next: DreamStatus) -> bool {
        use DreamStatus::*;
        matches!(
            (self, next),
            (Draft, Quart)
                | (Draft, Half)
                | (Quart, Half)
                | (Half, ThreeQuarters)
                | (ThreeQuarters, Whole)
                | (ThreeQuarters, Active)
                | (Whole, Active)
                | (Active, Closed)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == DreamStatus::Closed
    }
}

impl std::fmt::Display for DreamStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DreamStatus::Draft => write!(f, "DRAFT"),
            DreamStatus::Quart => write!(f, "QUART"),
            DreamStatus::Half => write!(f, "HALF"),
            DreamStatus::ThreeQuarters => write!(f, "THREE_QUARTERS"),
            DreamStatus::Whole => write!(f, "WHOLE"),
            DreamStatus::Active => write!(f, "ACTIVE"),
            DreamStatus::Closed => write!(f, "CLOSED"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema, DeriveActiveEnum, EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum DreamType {
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "charity")]
    Charity,
}

/// 发起方梦想的强制捐赠槽位（按级别排序的 donation id）
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult)]
pub struct RefDonations(pub Vec<i32>);

impl RefDonations {
    pub fn contains(&self, donation_id: i32) -> bool {
        self.0.contains(&donation_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "dreams")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub status: DreamStatus,
    pub type_dream: DreamType,
    pub title: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub language: String,
    pub goal: i64,
    pub collected: i64,
    pub currency_id: i32,
    pub ref_donations: RefDonations,
    pub donations_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
