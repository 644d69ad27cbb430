use crate::entities::{
    AchievementType, DreamStatus, DreamType, achievement_entity as achievements,
    donation_entity as donations, dream_entity as dreams, user_entity as users,
};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    Top,
    Vip,
    Charity,
}

/// 替补接收梦想
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub dream_id: i32,
    pub user_id: i32,
    /// 最近一次被分配捐赠的时间，从未被分配为 None
    pub last_donation_at: Option<DateTime<Utc>>,
    pub kind: PoolKind,
}

/// 每次调用重新计算，不做缓存
pub struct FallbackPool;

impl FallbackPool {
    /// top + vip + charity，各自按最久未获捐赠优先排序
    pub async fn candidates<C: ConnectionTrait>(
        conn: &C,
        requester_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Candidate>> {
        let active = dreams::Entity::find()
            .filter(dreams::Column::Status.eq(DreamStatus::Active))
            .filter(dreams::Column::UserId.ne(requester_id))
            .order_by_asc(dreams::Column::Id)
            .all(conn)
            .await?;
        if active.is_empty() {
            return Ok(Vec::new());
        }

        let owner_ids: Vec<i32> = active
            .iter()
            .map(|d| d.user_id)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        let owners: HashMap<i32, users::Model> = users::Entity::find()
            .filter(users::Column::Id.is_in(owner_ids.clone()))
            .all(conn)
            .await?
            .into_iter()
            .filter(|u| u.can_receive(now))
            .map(|u| (u.id, u))
            .collect();

        let top_users: HashSet<i32> = achievements::Entity::find()
            .filter(achievements::Column::UserId.is_in(owner_ids))
            .filter(
                achievements::Column::TypeName
                    .is_in([AchievementType::TopFundraiser, AchievementType::DreamMaker]),
            )
            .filter(achievements::Column::ReceivedAt.is_not_null())
            .all(conn)
            .await?
            .into_iter()
            .map(|a| a.user_id)
            .collect();

        let dream_ids: Vec<i32> = active.iter().map(|d| d.id).collect();
        let mut last_donation: HashMap<i32, DateTime<Utc>> = HashMap::new();
        let stamps: Vec<(i32, DateTime<Utc>)> = donations::Entity::find()
            .select_only()
            .column(donations::Column::DreamId)
            .column(donations::Column::SubAt)
            .filter(donations::Column::DreamId.is_in(dream_ids))
            .filter(donations::Column::SubAt.is_not_null())
            .into_tuple()
            .all(conn)
            .await?;
        for (dream_id, sub_at) in stamps {
            last_donation
                .entry(dream_id)
                .and_modify(|t| *t = (*t).max(sub_at))
                .or_insert(sub_at);
        }

        let (mut top, mut vip, mut charity) = (Vec::new(), Vec::new(), Vec::new());
        for dream in active {
            let Some(owner) = owners.get(&dream.user_id) else {
                continue;
            };
            let kind = match dream.type_dream {
                DreamType::User if top_users.contains(&owner.id) => PoolKind::Top,
                DreamType::User if owner.is_vip => PoolKind::Vip,
                DreamType::Charity => PoolKind::Charity,
                DreamType::User => continue,
            };
            let candidate = Candidate {
                dream_id: dream.id,
                user_id: dream.user_id,
                last_donation_at: last_donation.get(&dream.id).copied(),
                kind,
            };
            match kind {
                PoolKind::Top => top.push(candidate),
                PoolKind::Vip => vip.push(candidate),
                PoolKind::Charity => charity.push(candidate),
            }
        }

        Ok(rank(top, vip, charity))
    }
}

/// 各池按 last_donation_at 升序（None 最先），再按 top、vip、charity 拼接
pub fn rank(
    mut top: Vec<Candidate>,
    mut vip: Vec<Candidate>,
    mut charity: Vec<Candidate>,
) -> Vec<Candidate> {
    for pool in [&mut top, &mut vip, &mut charity] {
        pool.sort_by(|a, b| {
            a.last_donation_at
                .cmp(&b.last_donation_at)
                .then(a.dream_id.cmp(&b.dream_id))
        });
    }
    top.into_iter().chain(vip).chain(charity).collect()
}
