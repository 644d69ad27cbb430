use crate::config::FundingConfig;
use crate::entities::{
    AchievementType, DonationStatus, DreamStatus, DreamType, RefDonations,
    achievement_entity as achievements, currency_entity as currencies,
    donation_entity as donations, dream_entity as dreams, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::external::{Outbox, SharedNotifier};
use crate::models::{
    CommunityMember, CreateDreamRequest, DreamResponse, SubscribeReferralRequest,
    SubscribeReferralResponse, SubscriptionRequest, SubscriptionResponse, UpdateDreamRequest,
};
use crate::services::dream_transitions::{
    activate_another_dream, has_active_dream, transition, transition_all_of_user,
};
use crate::services::referral_counter::recount_in;
use crate::services::referral_graph::ReferralGraph;
use crate::utils::generate_unique_refer_code;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, ModelTrait, PaginatorTrait, QueryFilter, Set, TransactionTrait,
};

/// 金额定点倍数（分）
pub const FINANCE_RATIO: i64 = 100;

/// 梦想生命周期与推荐关系
#[derive(Clone)]
pub struct DreamService {
    pool: DatabaseConnection,
    funding: FundingConfig,
    graph: ReferralGraph,
    notifier: SharedNotifier,
}

impl DreamService {
    pub fn new(pool: DatabaseConnection, funding: FundingConfig, notifier: SharedNotifier) -> Self {
        Self {
            graph: ReferralGraph::new(funding.max_referral_depth),
            pool,
            funding,
            notifier,
        }
    }

    /// 创建梦想；draft 为 true 时保存为草稿
    pub async fn create_dream(
        &self,
        user_id: i32,
        req: CreateDreamRequest,
        draft: bool,
    ) -> AppResult<DreamResponse> {
        let title = req.title.trim().to_string();
        if title.is_empty() {
            return Err(AppError::ValidationError("Title is required".into()));
        }

        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;

        let owned = dreams::Entity::find()
            .filter(dreams::Column::UserId.eq(user.id))
            .count(&txn)
            .await?;
        if owned >= self.funding.max_dream_count {
            return Err(AppError::ValidationError(format!(
                "A user can own at most {} dreams",
                self.funding.max_dream_count
            )));
        }

        let goal = match (req.goal, draft) {
            (Some(goal), _) => {
                self.check_goal(&txn, &user, goal).await?;
                goal
            }
            (None, true) => 0,
            (None, false) => return Err(AppError::ValidationError("Goal is required".into())),
        };

        let status = if draft {
            DreamStatus::Draft
        } else {
            submitted_status(&user)
        };

        let dream = dreams::ActiveModel {
            user_id: Set(user.id),
            status: Set(status),
            type_dream: Set(req.type_dream.unwrap_or(DreamType::User)),
            title: Set(title),
            description: Set(req.description),
            language: Set(user.language.clone()),
            goal: Set(goal),
            collected: Set(0),
            currency_id: Set(user.currency_id),
            ref_donations: Set(RefDonations::default()),
            donations_count: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
            closed_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        log::info!("User {} created dream {} ({})", user.id, dream.id, dream.status);
        Ok(dream.into())
    }

    /// 修改草稿
    pub async fn update_draft(
        &self,
        user_id: i32,
        dream_id: i32,
        req: UpdateDreamRequest,
    ) -> AppResult<DreamResponse> {
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;
        let dream = find_owned(&txn, user.id, dream_id).await?;
        if dream.status != DreamStatus::Draft {
            return Err(AppError::NotFound("Draft not found".into()));
        }
        self.check_goal(&txn, &user, req.goal).await?;

        let updated = apply_update(&txn, dream, req).await?;
        txn.commit().await?;
        Ok(updated.into())
    }

    /// 提交草稿: DRAFT -> QUART | HALF
    pub async fn submit_draft(&self, user_id: i32, dream_id: i32) -> AppResult<DreamResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;
        let dream = find_owned(&txn, user.id, dream_id).await?;
        if dream.status != DreamStatus::Draft {
            return Err(AppError::NotFound("Draft not found".into()));
        }
        self.check_goal(&txn, &user, dream.goal).await?;

        let target = submitted_status(&user);
        if !transition(&txn, dream.id, DreamStatus::Draft, target, now).await? {
            return Err(AppError::InvalidState(format!(
                "dream {} is no longer a draft",
                dream.id
            )));
        }
        let dream = find_owned(&txn, user.id, dream_id).await?;
        txn.commit().await?;
        Ok(dream.into())
    }

    /// 修改已提交的梦想；收到过确认的捐赠后不可再改
    pub async fn update_dream(
        &self,
        user_id: i32,
        dream_id: i32,
        req: UpdateDreamRequest,
    ) -> AppResult<DreamResponse> {
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;
        let dream = find_owned(&txn, user.id, dream_id).await?;
        if dream.status == DreamStatus::Draft || dream.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "dream in status {} cannot be edited",
                dream.status
            )));
        }

        let confirmed = donations::Entity::find()
            .filter(donations::Column::DreamId.eq(dream.id))
            .filter(
                donations::Column::Status
                    .is_in([DonationStatus::Confirmed, DonationStatus::AutoConfirmed]),
            )
            .count(&txn)
            .await?;
        if confirmed > 0 {
            return Err(AppError::Forbidden(
                "Dream already received confirmed donations".into(),
            ));
        }
        self.check_goal(&txn, &user, req.goal).await?;

        let updated = apply_update(&txn, dream, req).await?;
        txn.commit().await?;
        Ok(updated.into())
    }

    /// 删除梦想；已有捐赠指向它或已付过分级捐赠时拒绝
    pub async fn delete_dream(&self, user_id: i32, dream_id: i32) -> AppResult<()> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;
        let dream = find_owned(&txn, user.id, dream_id).await?;
        if dream.status.is_terminal() {
            return Err(AppError::InvalidState("Closed dreams cannot be deleted".into()));
        }

        let incoming = donations::Entity::find()
            .filter(donations::Column::DreamId.eq(dream.id))
            .filter(donations::Column::Status.ne(DonationStatus::Failed))
            .count(&txn)
            .await?;
        if incoming > 0 {
            return Err(AppError::Forbidden("Dream has donations".into()));
        }

        let slots = donations::Entity::find()
            .filter(donations::Column::Id.is_in(dream.ref_donations.0.clone()))
            .all(&txn)
            .await?;
        if slots.iter().any(|d| d.status.is_paid()) {
            return Err(AppError::Forbidden("Dream has paid referral donations".into()));
        }

        let released = donations::Entity::update_many()
            .col_expr(donations::Column::Status, Expr::value(DonationStatus::Failed))
            .col_expr(donations::Column::UpdatedAt, Expr::value(now))
            .filter(donations::Column::Id.is_in(dream.ref_donations.0.clone()))
            .filter(donations::Column::Status.eq(DonationStatus::New))
            .exec(&txn)
            .await?;

        let was_active = dream.status == DreamStatus::Active;
        dream.delete(&txn).await?;

        let mut outbox = Outbox::new();
        if was_active {
            activate_another_dream(&txn, &user, now).await?;
            recount_in(&txn, user.referer.as_deref(), now, &mut outbox).await?;
        }
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;

        log::info!(
            "User {} deleted dream {}, released {} referral donations",
            user.id,
            dream_id,
            released.rows_affected
        );
        Ok(())
    }

    /// 主人手动关闭 ACTIVE 梦想
    pub async fn close_dream(&self, user_id: i32, dream_id: i32) -> AppResult<DreamResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;
        let dream = find_owned(&txn, user.id, dream_id).await?;
        if dream.status != DreamStatus::Active {
            return Err(AppError::InvalidState(format!(
                "dream in status {} cannot be closed",
                dream.status
            )));
        }
        if !transition(&txn, dream.id, DreamStatus::Active, DreamStatus::Closed, now).await? {
            return Err(AppError::InvalidState(format!(
                "dream {} is no longer active",
                dream.id
            )));
        }

        let mut outbox = Outbox::new();
        activate_another_dream(&txn, &user, now).await?;
        recount_in(&txn, user.referer.as_deref(), now, &mut outbox).await?;

        let dream = find_owned(&txn, user.id, dream_id).await?;
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;
        Ok(dream.into())
    }

    /// 收款信息已登记: THREE_QUARTERS -> ACTIVE | WHOLE
    pub async fn record_payment_details(
        &self,
        user_id: i32,
        dream_id: i32,
    ) -> AppResult<DreamResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;
        let dream = find_owned(&txn, user.id, dream_id).await?;
        if dream.status < DreamStatus::ThreeQuarters || dream.status.is_terminal() {
            return Err(AppError::InvalidState(format!(
                "payment details cannot be recorded for a dream in status {}",
                dream.status
            )));
        }

        let mut outbox = Outbox::new();
        if dream.status == DreamStatus::ThreeQuarters {
            let target = if user.has_subscription(now)
                && !has_active_dream(&txn, user.id, Some(dream.id)).await?
            {
                DreamStatus::Active
            } else {
                DreamStatus::Whole
            };
            transition(&txn, dream.id, DreamStatus::ThreeQuarters, target, now).await?;
            recount_in(&txn, user.referer.as_deref(), now, &mut outbox).await?;
        }

        let dream = find_owned(&txn, user.id, dream_id).await?;
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;
        Ok(dream.into())
    }

    /// 绑定推荐人（推荐码或推荐人的某个梦想）
    pub async fn subscribe_to_referrer(
        &self,
        user_id: i32,
        req: SubscribeReferralRequest,
    ) -> AppResult<SubscribeReferralResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;
        if user.referer.is_some() {
            return Err(AppError::Forbidden("Referer already set".into()));
        }

        let referer = match (req.ref_code.as_deref(), req.sub_dream_id) {
            (Some(code), _) if !code.trim().is_empty() => users::Entity::find()
                .filter(users::Column::ReferCode.eq(code.trim()))
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound("Refer code not found".into()))?,
            (_, Some(sub_dream_id)) => {
                let dream = dreams::Entity::find_by_id(sub_dream_id)
                    .one(&txn)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Dream not found".into()))?;
                find_user(&txn, dream.user_id).await?
            }
            _ => {
                return Err(AppError::ValidationError(
                    "ref_code or sub_dream_id is required".into(),
                ));
            }
        };
        let Some(code) = referer.refer_code.clone() else {
            return Err(AppError::NotFound("Referer has no refer code".into()));
        };
        if self.graph.is_ancestor(&txn, user.id, referer.id).await? {
            return Err(AppError::Forbidden("Referral cycle is not allowed".into()));
        }

        let res = users::Entity::update_many()
            .col_expr(users::Column::Referer, Expr::value(Some(code.clone())))
            .filter(users::Column::Id.eq(user.id))
            .filter(users::Column::Referer.is_null())
            .exec(&txn)
            .await?;
        if res.rows_affected != 1 {
            return Err(AppError::Forbidden("Referer already set".into()));
        }

        let promoted =
            transition_all_of_user(&txn, user.id, DreamStatus::Quart, DreamStatus::Half, now)
                .await?;

        let mut outbox = Outbox::new();
        recount_in(&txn, Some(&code), now, &mut outbox).await?;
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;

        log::info!("User {} subscribed to referer {}", user.id, referer.id);
        Ok(SubscribeReferralResponse {
            referer: code,
            promoted_dreams: promoted,
        })
    }

    /// 订阅状态变更（计费服务回调）
    pub async fn apply_subscription(
        &self,
        user_id: i32,
        req: SubscriptionRequest,
    ) -> AppResult<SubscriptionResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let user = find_user(&txn, user_id).await?;

        let mut active: users::ActiveModel = user.clone().into();
        if let Some(paid_till) = req.paid_till {
            active.paid_till = Set(Some(paid_till));
        }
        if let Some(trial_till) = req.trial_till {
            active.trial_till = Set(Some(trial_till));
        }
        if user.refer_code.is_none() {
            active.refer_code = Set(Some(generate_unique_refer_code(&txn).await?));
        }
        let user = active.update(&txn).await?;

        let activated = activate_another_dream(&txn, &user, now).await?;

        let mut outbox = Outbox::new();
        recount_in(&txn, user.referer.as_deref(), now, &mut outbox).await?;
        recount_in(&txn, user.refer_code.as_deref(), now, &mut outbox).await?;
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;

        let refer_code = user
            .refer_code
            .ok_or_else(|| AppError::InternalError("refer code was not assigned".into()))?;
        Ok(SubscriptionResponse {
            refer_code,
            activated_dream_id: activated,
        })
    }

    /// 我的社区
    pub async fn community(
        &self,
        user_id: i32,
        level: Option<usize>,
    ) -> AppResult<Vec<CommunityMember>> {
        self.graph
            .community(
                &self.pool,
                user_id,
                level.unwrap_or(self.funding.community_depth),
            )
            .await
    }

    /// 目标须为正数且不超过 dream_limit（梦想制造者可放大）
    async fn check_goal<C: ConnectionTrait>(
        &self,
        conn: &C,
        user: &users::Model,
        goal: i64,
    ) -> AppResult<()> {
        if goal <= 0 {
            return Err(AppError::ValidationError("Goal must be positive".into()));
        }
        let currency = currencies::Entity::find_by_id(user.currency_id)
            .one(conn)
            .await?
            .ok_or_else(|| {
                AppError::DataIntegrity(format!("currency {} missing", user.currency_id))
            })?;

        let dream_maker = achievements::Entity::find()
            .filter(achievements::Column::UserId.eq(user.id))
            .filter(achievements::Column::TypeName.eq(AchievementType::DreamMaker))
            .filter(achievements::Column::ReceivedAt.is_not_null())
            .count(conn)
            .await?
            > 0;
        let factor = if dream_maker {
            self.funding.dream_maker_limit_factor
        } else {
            1
        };
        let limit = goal_limit(currency.dream_limit, factor);
        if goal > limit {
            return Err(AppError::ValidationError(format!(
                "Goal exceeds the limit of {limit}"
            )));
        }
        Ok(())
    }
}

pub fn goal_limit(dream_limit: i64, factor: i64) -> i64 {
    dream_limit.saturating_mul(FINANCE_RATIO).saturating_mul(factor)
}

/// 有推荐人的用户提交后直接进入 HALF
fn submitted_status(user: &users::Model) -> DreamStatus {
    if user.referer.is_some() {
        DreamStatus::Half
    } else {
        DreamStatus::Quart
    }
}

async fn find_user(txn: &DatabaseTransaction, user_id: i32) -> AppResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

async fn find_owned(
    txn: &DatabaseTransaction,
    user_id: i32,
    dream_id: i32,
) -> AppResult<dreams::Model> {
    dreams::Entity::find_by_id(dream_id)
        .filter(dreams::Column::UserId.eq(user_id))
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Dream not found".into()))
}

async fn apply_update(
    txn: &DatabaseTransaction,
    dream: dreams::Model,
    req: UpdateDreamRequest,
) -> AppResult<dreams::Model> {
    let title = req.title.trim().to_string();
    if title.is_empty() {
        return Err(AppError::ValidationError("Title is required".into()));
    }
    let now: DateTime<Utc> = Utc::now();
    let mut active: dreams::ActiveModel = dream.into();
    active.title = Set(title);
    active.description = Set(req.description);
    active.goal = Set(req.goal);
    active.updated_at = Set(now);
    Ok(active.update(txn).await?)
}
