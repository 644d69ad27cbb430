use crate::entities::{
    AchievementType, DreamStatus, achievement_entity as achievements, dream_entity as dreams,
    user_entity as users,
};
use crate::error::AppResult;
use crate::external::{NotificationKind, Outbox, SharedNotifier};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, Iterable,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecountOutcome {
    pub user_id: i32,
    pub refer_count: i32,
    /// 本次新获得的成就
    pub newly_received: Vec<AchievementType>,
}

/// 推荐计数与成就
#[derive(Clone)]
pub struct ReferralCounter {
    pool: DatabaseConnection,
    notifier: SharedNotifier,
}

impl ReferralCounter {
    pub fn new(pool: DatabaseConnection, notifier: SharedNotifier) -> Self {
        Self { pool, notifier }
    }

    /// 重新统计推荐码持有人的有效下级数量，可重复调用
    pub async fn recount(&self, refer_code: &str) -> AppResult<Option<RecountOutcome>> {
        let txn = self.pool.begin().await?;
        let mut outbox = Outbox::new();
        let outcome = recount_in(&txn, Some(refer_code), Utc::now(), &mut outbox).await?;
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;
        Ok(outcome)
    }

    /// 我的成就（不存在则初始化）
    pub async fn list_achievements(&self, user_id: i32) -> AppResult<Vec<achievements::Model>> {
        let txn = self.pool.begin().await?;
        let list = ensure_achievements(&txn, user_id, Utc::now()).await?;
        txn.commit().await?;
        Ok(list)
    }
}

/// 事务内版本，供确认/激活流程调用
pub async fn recount_in<C: ConnectionTrait>(
    conn: &C,
    refer_code: Option<&str>,
    now: DateTime<Utc>,
    outbox: &mut Outbox,
) -> AppResult<Option<RecountOutcome>> {
    let Some(code) = refer_code.filter(|c| !c.is_empty()) else {
        return Ok(None);
    };
    let Some(owner) = users::Entity::find()
        .filter(users::Column::ReferCode.eq(code))
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    let referee_ids: Vec<i32> = users::Entity::find()
        .select_only()
        .column(users::Column::Id)
        .filter(users::Column::Referer.eq(code))
        .into_tuple()
        .all(conn)
        .await?;

    let refer_count = if referee_ids.is_empty() {
        0
    } else {
        let with_active: Vec<i32> = dreams::Entity::find()
            .select_only()
            .column(dreams::Column::UserId)
            .filter(dreams::Column::UserId.is_in(referee_ids))
            .filter(dreams::Column::Status.eq(DreamStatus::Active))
            .distinct()
            .into_tuple()
            .all(conn)
            .await?;
        with_active.len() as i32
    };

    if refer_count != owner.refer_count {
        log::info!(
            "refer_count of user {} changed {} -> {}",
            owner.id,
            owner.refer_count,
            refer_count
        );
    }
    users::Entity::update_many()
        .col_expr(users::Column::ReferCount, Expr::value(refer_count))
        .filter(users::Column::Id.eq(owner.id))
        .exec(conn)
        .await?;

    let has_active_dream = dreams::Entity::find()
        .filter(dreams::Column::UserId.eq(owner.id))
        .filter(dreams::Column::Status.eq(DreamStatus::Active))
        .count(conn)
        .await?
        > 0;

    ensure_achievements(conn, owner.id, now).await?;

    let mut newly_received = Vec::new();
    for kind in AchievementType::iter() {
        let reached = match kind.referral_threshold() {
            Some(threshold) => refer_count >= threshold,
            None => has_active_dream,
        };
        if reached && assign_received_at(conn, owner.id, kind, now).await? {
            newly_received.push(kind);
        }
    }

    if newly_received.contains(&AchievementType::DreamMaker) {
        outbox.push(owner.id, NotificationKind::DreamMaker);
    }

    Ok(Some(RecountOutcome {
        user_id: owner.id,
        refer_count,
        newly_received,
    }))
}

/// 确保用户五种成就记录都存在
pub async fn ensure_achievements<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    now: DateTime<Utc>,
) -> AppResult<Vec<achievements::Model>> {
    let existing = achievements::Entity::find()
        .filter(achievements::Column::UserId.eq(user_id))
        .order_by_asc(achievements::Column::Id)
        .all(conn)
        .await?;

    let missing: Vec<AchievementType> = AchievementType::iter()
        .filter(|t| !existing.iter().any(|a| a.type_name == *t))
        .collect();
    if missing.is_empty() {
        return Ok(existing);
    }

    let mut list = existing;
    for type_name in missing {
        let created = achievements::ActiveModel {
            user_id: Set(user_id),
            type_name: Set(type_name),
            received_at: Set(None),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(conn)
        .await?;
        list.push(created);
    }
    Ok(list)
}

/// 只在 received_at 为空时写入，已获得的成就永不清空
async fn assign_received_at<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    kind: AchievementType,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let res = achievements::Entity::update_many()
        .col_expr(achievements::Column::ReceivedAt, Expr::value(Some(now)))
        .filter(achievements::Column::UserId.eq(user_id))
        .filter(achievements::Column::TypeName.eq(kind))
        .filter(achievements::Column::ReceivedAt.is_null())
        .exec(conn)
        .await?;
    if res.rows_affected == 1 {
        log::info!("User {} received achievement {:?}", user_id, kind);
    }
    Ok(res.rows_affected == 1)
}
