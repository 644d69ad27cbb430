use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 捐赠状态: NEW -> WAITING_FOR_CONFIRMATION -> CONFIRMED/AUTO_CONFIRMED，
/// 确认前任意时刻可进入 FAILED
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
pub enum DonationStatus {
    #[sea_orm(num_value = 10)]
    New,
    #[sea_orm(num_value = 20)]
    WaitingForConfirmation,
    #[sea_orm(num_value = 30)]
    Confirmed,
    #[sea_orm(num_value = 40)]
    AutoConfirmed,
    #[sea_orm(num_value = 99)]
    Failed,
}

impl DonationStatus {
    pub fn is_confirmed(self) -> bool {
        matches!(self, DonationStatus::Confirmed | DonationStatus::AutoConfirmed)
    }

    pub fn is_terminal(self) -> bool {
        self.is_confirmed() || self == DonationStatus::Failed
    }

    /// 已付款（等待确认或已确认），不含 FAILED
    pub fn is_paid(self) -> bool {
        self > DonationStatus::New && self < DonationStatus::Failed
    }

    pub fn can_transition_to(self, next: DonationStatus) -> bool {
        use DonationStatus::*;
        match (self, next) {
            (New, WaitingForConfirmation) => true,
            (WaitingForConfirmation, Confirmed) | (WaitingForConfirmation, AutoConfirmed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for DonationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DonationStatus::New => write!(f, "NEW"),
            DonationStatus::WaitingForConfirmation => write!(f, "WAITING_FOR_CONFIRMATION"),
            DonationStatus::Confirmed => write!(f, "CONFIRMED"),
            DonationStatus::AutoConfirmed => write!(f, "AUTO_CONFIRMED"),
            DonationStatus::Failed => write!(f, "FAILED"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "donations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// 接收捐赠的梦想
    pub dream_id: i32,
    /// ref_donations 中包含本捐赠的梦想（自由捐赠为空）
    pub sponsor_dream_id: Option<i32>,
    pub recipient_id: i32,
    pub sender_id: Option<i32>,
    pub level_number: Option<i32>,
    /// 接收方货币金额
    pub amount: i64,
    pub currency_id: i32,
    /// 发送方货币金额
    pub first_amount: i64,
    pub first_currency_id: i32,
    pub status: DonationStatus,
    pub receipt: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub sub_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    pub fn is_leveled(&self) -> bool {
        self.level_number.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
