use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum AchievementType {
    #[sea_orm(string_value = "ufandao_member")]
    UfandaoMember,
    #[sea_orm(string_value = "ufandao_friend")]
    UfandaoFriend,
    #[sea_orm(string_value = "ufandao_fundraiser")]
    UfandaoFundraiser,
    #[sea_orm(string_value = "top_fundraiser")]
    TopFundraiser,
    #[sea_orm(string_value = "dream_maker")]
    DreamMaker,
}

impl AchievementType {
    /// 按推荐人数解锁的门槛；ufandao_member 由 ACTIVE 梦想触发，没有门槛
    pub fn referral_threshold(self) -> Option<i32> {
        match self {
            AchievementType::UfandaoMember => None,
            AchievementType::UfandaoFriend => Some(3),
            AchievementType::UfandaoFundraiser => Some(5),
            AchievementType::TopFundraiser => Some(7),
            AchievementType::DreamMaker => Some(10),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "achievements")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub type_name: AchievementType,
    /// 一旦设置不再清空
    pub received_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
