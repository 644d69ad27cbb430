use crate::entities::{DreamStatus, DreamType, dream_entity as dreams, user_entity as users};
use crate::error::{AppError, AppResult};
use crate::models::CommunityMember;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashSet;

/// 推荐链上的一个祖先
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub user_id: i32,
    /// 1 = 直接上级
    pub level: usize,
    /// 祖先名下可接收捐赠的 ACTIVE 非慈善梦想
    pub dream_id: Option<i32>,
    pub eligible: bool,
}

/// 判断祖先是否可接收本次分配时需要的上下文
pub struct ChainContext<'a> {
    pub sponsor_id: i32,
    pub used_dreams: &'a HashSet<i32>,
    pub now: DateTime<Utc>,
}

/// referer -> refer_code 自引用关系的只读遍历
#[derive(Clone)]
pub struct ReferralGraph {
    max_depth: usize,
}

impl ReferralGraph {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// 自下而上遍历上级链，最多 depth 个祖先（近者在前）
    ///
    /// 数据中出现环时不会死循环: 深度受 max_depth 约束，
    /// 回到起点视为数据完整性错误。
    pub async fn ancestors<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i32,
        depth: usize,
        ctx: &ChainContext<'_>,
    ) -> AppResult<Vec<ChainLink>> {
        if depth > self.max_depth {
            return Err(AppError::DataIntegrity(format!(
                "referral depth {depth} exceeds cap {}",
                self.max_depth
            )));
        }

        let start = users::Entity::find_by_id(user_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let mut chain = Vec::with_capacity(depth);
        let mut seen = HashSet::from([start.id]);
        let mut next_code = start.referer;

        while chain.len() < depth {
            let Some(code) = next_code.take() else {
                break;
            };
            let Some(ancestor) = users::Entity::find()
                .filter(users::Column::ReferCode.eq(code.as_str()))
                .one(conn)
                .await?
            else {
                log::warn!("Dangling referer {} in chain of user {}", code, start.id);
                break;
            };
            if !seen.insert(ancestor.id) {
                return Err(AppError::DataIntegrity(format!(
                    "referral cycle at user {} in chain of user {}",
                    ancestor.id, start.id
                )));
            }

            let dream_id = eligible_dream_of(conn, ancestor.id).await?;
            let eligible = ancestor.can_receive(ctx.now)
                && ancestor.id != ctx.sponsor_id
                && dream_id.is_some_and(|id| !ctx.used_dreams.contains(&id));

            chain.push(ChainLink {
                user_id: ancestor.id,
                level: chain.len() + 1,
                dream_id,
                eligible,
            });
            next_code = ancestor.referer;
        }

        Ok(chain)
    }

    /// ancestor_id 是否在 user_id 的上级链上（含自身）
    pub async fn is_ancestor<C: ConnectionTrait>(
        &self,
        conn: &C,
        ancestor_id: i32,
        user_id: i32,
    ) -> AppResult<bool> {
        let mut seen = HashSet::new();
        let mut current = users::Entity::find_by_id(user_id).one(conn).await?;
        while let Some(user) = current {
            if user.id == ancestor_id {
                return Ok(true);
            }
            if !seen.insert(user.id) {
                return Err(AppError::DataIntegrity(format!(
                    "referral cycle at user {}",
                    user.id
                )));
            }
            current = match user.referer {
                Some(code) => {
                    users::Entity::find()
                        .filter(users::Column::ReferCode.eq(code))
                        .one(conn)
                        .await?
                }
                None => None,
            };
        }
        Ok(false)
    }

    /// 我的社区: 自上而下按层列出下级
    pub async fn community<C: ConnectionTrait>(
        &self,
        conn: &C,
        user_id: i32,
        max_level: usize,
    ) -> AppResult<Vec<CommunityMember>> {
        if max_level == 0 || max_level > self.max_depth {
            return Err(AppError::ValidationError(format!(
                "level must be between 1 and {}",
                self.max_depth
            )));
        }

        let root = users::Entity::find_by_id(user_id)
            .one(conn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;

        let mut members = Vec::new();
        let mut seen = HashSet::from([root.id]);
        let mut codes: Vec<String> = root.refer_code.into_iter().collect();

        for level in 1..=max_level {
            if codes.is_empty() {
                break;
            }
            let layer = users::Entity::find()
                .filter(users::Column::Referer.is_in(codes.clone()))
                .order_by_asc(users::Column::Id)
                .all(conn)
                .await?;

            codes.clear();
            for u in layer {
                if !seen.insert(u.id) {
                    log::warn!("User {} reached twice in community of {}", u.id, root.id);
                    continue;
                }
                if let Some(code) = &u.refer_code {
                    codes.push(code.clone());
                }
                members.push(CommunityMember {
                    user_id: u.id,
                    name: u.name,
                    level,
                    refer_count: u.refer_count,
                });
            }
        }

        Ok(members)
    }
}

async fn eligible_dream_of<C: ConnectionTrait>(conn: &C, user_id: i32) -> AppResult<Option<i32>> {
    let dream = dreams::Entity::find()
        .filter(dreams::Column::UserId.eq(user_id))
        .filter(dreams::Column::Status.eq(DreamStatus::Active))
        .filter(dreams::Column::TypeDream.ne(DreamType::Charity))
        .order_by_asc(dreams::Column::Id)
        .one(conn)
        .await?;
    Ok(dream.map(|d| d.id))
}
