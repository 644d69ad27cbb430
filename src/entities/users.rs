use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub email: String,
    pub language: String,
    /// 本人的推荐码（订阅后才会生成）
    pub refer_code: Option<String>,
    /// 上级的推荐码
    pub referer: Option<String>,
    /// 直接下级中拥有 ACTIVE 梦想的人数
    pub refer_count: i32,
    pub currency_id: i32,
    pub is_vip: bool,
    pub is_active: bool,
    pub paid_till: Option<NaiveDate>,
    pub trial_till: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Model {
    /// 订阅是否有效: 付费到期日不早于今天，或试用期尚未结束
    pub fn has_subscription(&self, now: DateTime<Utc>) -> bool {
        self.paid_till.is_some_and(|d| d >= now.date_naive())
            || self.trial_till.is_some_and(|t| t > now)
    }

    /// 可以作为捐赠接收方
    pub fn can_receive(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.has_subscription(now)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
