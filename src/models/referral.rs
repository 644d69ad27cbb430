use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 绑定上级: ref_code 与 sub_dream_id 二选一
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct SubscribeReferralRequest {
    pub ref_code: Option<String>,
    /// 通过某个梦想绑定到其所有者
    pub sub_dream_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscribeReferralResponse {
    pub referer: String,
    /// 由 QUART 升到 HALF 的梦想数量
    pub promoted_dreams: u64,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CommunityQuery {
    /// 只看某一层
    pub level: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommunityMember {
    pub user_id: i32,
    pub name: String,
    pub level: usize,
    pub refer_count: i32,
}

/// 订阅回调（由计费服务调用）
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct SubscriptionRequest {
    pub paid_till: Option<NaiveDate>,
    pub trial_till: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubscriptionResponse {
    pub refer_code: String,
    pub activated_dream_id: Option<i32>,
}
