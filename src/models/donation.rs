use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::ReferralDreamSummary;
use crate::entities::{DonationStatus, DreamStatus, donation_entity as donations};

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct PayDonationRequest {
    /// 付款凭证
    pub receipt: Option<String>,
}

/// 首笔捐赠: 没有上级的用户直接向某个梦想捐赠
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SeedDonationRequest {
    /// 发起方（捐赠人）自己的梦想
    pub sponsor_dream_id: i32,
    pub receipt: Option<String>,
}

/// 自由捐赠（不占用级别槽位）
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct FreeDonationRequest {
    /// 发送方货币金额（分）
    pub amount: i64,
    /// 匿名捐赠时必填，否则取发送方当前货币
    pub currency_id: Option<i32>,
    pub receipt: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DonationResponse {
    pub id: i32,
    pub dream_id: i32,
    pub sponsor_dream_id: Option<i32>,
    pub recipient_id: i32,
    pub sender_id: Option<i32>,
    pub level_number: Option<i32>,
    pub amount: i64,
    pub currency_id: i32,
    pub first_amount: i64,
    pub first_currency_id: i32,
    pub status: DonationStatus,
    pub receipt: Option<String>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<donations::Model> for DonationResponse {
    fn from(m: donations::Model) -> Self {
        DonationResponse {
            id: m.id,
            dream_id: m.dream_id,
            sponsor_dream_id: m.sponsor_dream_id,
            recipient_id: m.recipient_id,
            sender_id: m.sender_id,
            level_number: m.level_number,
            amount: m.amount,
            currency_id: m.currency_id,
            first_amount: m.first_amount,
            first_currency_id: m.first_currency_id,
            status: m.status,
            receipt: m.receipt,
            confirmed_at: m.confirmed_at,
            created_at: m.created_at,
        }
    }
}

/// 分级捐赠及其目标梦想
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReferralDonationResponse {
    pub donation: DonationResponse,
    pub dream: ReferralDreamSummary,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmDonationResponse {
    pub donation: DonationResponse,
    /// 接收方梦想确认后的状态
    pub dream_status: DreamStatus,
    /// 分级捐赠时发起方梦想的状态
    pub sponsor_dream_status: Option<DreamStatus>,
}
