use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 货币
/// - course: 相对平台基准货币的整数汇率
/// - dream_limit: 梦想目标上限（整数单位，未乘 FINANCE_RATIO）
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "currencies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub code: String,
    pub symbol: String,
    pub course: i32,
    pub dream_limit: i64,
    pub is_active: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
