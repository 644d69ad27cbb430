//! 梦想状态迁移: 所有迁移都是 `UPDATE ... WHERE status = from` 形式的 CAS，
//! 前置状态已被并发请求改变时返回 false 而不是报错。

use crate::entities::{DreamStatus, dream_entity as dreams, user_entity as users};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};

/// 单个梦想 from -> to
pub async fn transition<C: ConnectionTrait>(
    conn: &C,
    dream_id: i32,
    from: DreamStatus,
    to: DreamStatus,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    if !from.can_transition_to(to) {
        return Err(AppError::InvalidState(format!(
            "dream transition {from} -> {to} is not allowed"
        )));
    }

    let mut update = dreams::Entity::update_many()
        .col_expr(dreams::Column::Status, Expr::value(to))
        .col_expr(dreams::Column::UpdatedAt, Expr::value(now));
    if to == DreamStatus::Closed {
        update = update.col_expr(dreams::Column::ClosedAt, Expr::value(Some(now)));
    }

    let res = update
        .filter(dreams::Column::Id.eq(dream_id))
        .filter(dreams::Column::Status.eq(from))
        .exec(conn)
        .await?;

    if res.rows_affected == 1 {
        log::info!("Dream {} moved {} -> {}", dream_id, from, to);
        Ok(true)
    } else {
        log::info!(
            "Dream {} is no longer {}, skipped transition to {}",
            dream_id,
            from,
            to
        );
        Ok(false)
    }
}

/// 用户名下所有处于 from 的梦想批量迁移，返回迁移数量
pub async fn transition_all_of_user<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    from: DreamStatus,
    to: DreamStatus,
    now: DateTime<Utc>,
) -> AppResult<u64> {
    if !from.can_transition_to(to) {
        return Err(AppError::InvalidState(format!(
            "dream transition {from} -> {to} is not allowed"
        )));
    }
    let res = dreams::Entity::update_many()
        .col_expr(dreams::Column::Status, Expr::value(to))
        .col_expr(dreams::Column::UpdatedAt, Expr::value(now))
        .filter(dreams::Column::UserId.eq(user_id))
        .filter(dreams::Column::Status.eq(from))
        .exec(conn)
        .await?;
    if res.rows_affected > 0 {
        log::info!(
            "{} dreams of user {} moved {} -> {}",
            res.rows_affected,
            user_id,
            from,
            to
        );
    }
    Ok(res.rows_affected)
}

pub async fn has_active_dream<C: ConnectionTrait>(
    conn: &C,
    user_id: i32,
    except_dream_id: Option<i32>,
) -> AppResult<bool> {
    let mut query = dreams::Entity::find()
        .filter(dreams::Column::UserId.eq(user_id))
        .filter(dreams::Column::Status.eq(DreamStatus::Active));
    if let Some(id) = except_dream_id {
        query = query.filter(dreams::Column::Id.ne(id));
    }
    Ok(query.count(conn).await? > 0)
}

/// 当前没有 ACTIVE 梦想且订阅有效时，激活最早的 WHOLE 梦想
pub async fn activate_another_dream<C: ConnectionTrait>(
    conn: &C,
    user: &users::Model,
    now: DateTime<Utc>,
) -> AppResult<Option<i32>> {
    if !user.has_subscription(now) || has_active_dream(conn, user.id, None).await? {
        return Ok(None);
    }
    let Some(whole) = dreams::Entity::find()
        .filter(dreams::Column::UserId.eq(user.id))
        .filter(dreams::Column::Status.eq(DreamStatus::Whole))
        .order_by_asc(dreams::Column::Id)
        .one(conn)
        .await?
    else {
        return Ok(None);
    };

    let activated = transition(conn, whole.id, DreamStatus::Whole, DreamStatus::Active, now).await?;
    Ok(activated.then_some(whole.id))
}
