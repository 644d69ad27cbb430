use crate::config::FundingConfig;
use crate::entities::{
    DonationStatus, DreamStatus, RefDonations, donation_entity as donations,
    dream_entity as dreams, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::external::{CurrencyRates, TranslatedText, Translator};
use crate::models::{DonationResponse, ReferralDonationResponse, ReferralDreamSummary};
use crate::services::amounts::{donate_size, recipient_amount};
use crate::services::fallback_pool::{Candidate, FallbackPool};
use crate::services::referral_graph::{ChainContext, ChainLink, ReferralGraph};
use crate::utils::shorten;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 有一笔首捐时 ref_donations 的长度
const FIRST_DONATION: usize = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetSource {
    Chain,
    Fallback,
}

/// 某个级别的接收梦想
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub dream_id: i32,
    pub user_id: i32,
    pub source: TargetSource,
}

/// 为 slots 个级别挑选接收梦想: 先按链上顺序取合格的上级，
/// 不足的部分用替补池补齐。exclude 中的梦想与本批已选梦想都会跳过。
pub fn plan_levels(
    chain: &[ChainLink],
    pool: &[Candidate],
    slots: usize,
    sponsor_id: i32,
    exclude: &HashSet<i32>,
) -> AppResult<Vec<Target>> {
    let mut chosen = exclude.clone();
    let mut targets = Vec::with_capacity(slots);

    for link in chain {
        if targets.len() == slots {
            break;
        }
        let Some(dream_id) = link.dream_id else {
            continue;
        };
        if !link.eligible || link.user_id == sponsor_id || !chosen.insert(dream_id) {
            continue;
        }
        targets.push(Target {
            dream_id,
            user_id: link.user_id,
            source: TargetSource::Chain,
        });
    }

    for candidate in pool {
        if targets.len() == slots {
            break;
        }
        if candidate.user_id == sponsor_id || !chosen.insert(candidate.dream_id) {
            continue;
        }
        targets.push(Target {
            dream_id: candidate.dream_id,
            user_id: candidate.user_id,
            source: TargetSource::Fallback,
        });
    }

    if targets.len() < slots {
        return Err(AppError::ExhaustedFallback(format!(
            "only {} of {} levels could be filled",
            targets.len(),
            slots
        )));
    }
    Ok(targets)
}

/// 分级捐赠分配
#[derive(Clone)]
pub struct AllocationService {
    pool: DatabaseConnection,
    funding: FundingConfig,
    graph: ReferralGraph,
    rates: Arc<dyn CurrencyRates>,
    translator: Arc<dyn Translator>,
}

impl AllocationService {
    pub fn new(
        pool: DatabaseConnection,
        funding: FundingConfig,
        rates: Arc<dyn CurrencyRates>,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            graph: ReferralGraph::new(funding.max_referral_depth),
            pool,
            funding,
            rates,
            translator,
        }
    }

    /// 获取 HALF 梦想的 N 个分级捐赠；首次调用时生成，之后校验并就地替换失效项
    pub async fn allocate(
        &self,
        user_id: i32,
        dream_id: i32,
        language: Option<&str>,
    ) -> AppResult<Vec<ReferralDonationResponse>> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let sponsor = users::Entity::find_by_id(user_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".into()))?;
        let ids = self.allocate_in(&txn, &sponsor, dream_id, now).await?;
        let slots = load_slots(&txn, &ids).await?;

        txn.commit().await?;

        let language = language.unwrap_or(sponsor.language.as_str());
        let mut list = Vec::with_capacity(slots.len());
        for (donation, dream) in slots {
            // 分配已提交，翻译失败只退回原文
            let text = match self.translator.translate(&dream, language).await {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Failed to translate dream {} to {}: {}", dream.id, language, e);
                    TranslatedText {
                        title: dream.title.clone(),
                        description: dream.description.clone(),
                    }
                }
            };
            list.push(ReferralDonationResponse {
                donation: DonationResponse::from(donation),
                dream: ReferralDreamSummary {
                    id: dream.id,
                    user_id: dream.user_id,
                    status: dream.status,
                    title: text.title,
                    description: shorten(
                        &text.description,
                        self.funding.short_description_len,
                        "...",
                    ),
                    goal: dream.goal,
                    collected: dream.collected,
                },
            });
        }
        Ok(list)
    }

    /// 事务内分配，返回写回梦想的 ref_donations
    pub async fn allocate_in(
        &self,
        txn: &DatabaseTransaction,
        sponsor: &users::Model,
        dream_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i32>> {
        let dream = dreams::Entity::find_by_id(dream_id)
            .filter(dreams::Column::UserId.eq(sponsor.id))
            .filter(dreams::Column::Status.eq(DreamStatus::Half))
            .one(txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Dream not found".into()))?;

        self.ensure_single_activation(txn, sponsor.id, dream.id).await?;

        let n = self.funding.need_to_donate_num;
        let current = dream.ref_donations.0.clone();

        match current.len() {
            len if len == n => self.repair(txn, sponsor, &dream, current, now).await,
            0 => {
                let ids = self
                    .generate(txn, sponsor, dream.id, 1, n, &HashSet::new(), now)
                    .await?;
                store_ref_donations(txn, dream.id, ids.clone(), now).await?;
                Ok(ids)
            }
            FIRST_DONATION => {
                // 首捐槽位保持不动，只生成 2..N 级
                let first_id = current[0];
                let first = donations::Entity::find_by_id(first_id)
                    .one(txn)
                    .await?
                    .ok_or_else(|| {
                        AppError::DataIntegrity(format!(
                            "first donation {first_id} of dream {} missing",
                            dream.id
                        ))
                    })?;
                let exclude = HashSet::from([first.dream_id]);
                let mut ids = vec![first_id];
                ids.extend(
                    self.generate(txn, sponsor, dream.id, 2, n - 1, &exclude, now)
                        .await?,
                );
                store_ref_donations(txn, dream.id, ids.clone(), now).await?;
                Ok(ids)
            }
            len => Err(AppError::DataIntegrity(format!(
                "dream {} has {} ref donations, expected 0, {} or {}",
                dream.id, len, FIRST_DONATION, n
            ))),
        }
    }

    /// 同一用户只能有一个正在激活的梦想（已为其付过分级捐赠的 HALF 梦想）
    async fn ensure_single_activation(
        &self,
        txn: &DatabaseTransaction,
        user_id: i32,
        dream_id: i32,
    ) -> AppResult<()> {
        let half_dreams = dreams::Entity::find()
            .filter(dreams::Column::UserId.eq(user_id))
            .filter(dreams::Column::Status.eq(DreamStatus::Half))
            .all(txn)
            .await?;
        let paid: HashSet<i32> = donations::Entity::find()
            .filter(donations::Column::SenderId.eq(user_id))
            .filter(donations::Column::Status.gt(DonationStatus::New))
            .filter(donations::Column::Status.lt(DonationStatus::Failed))
            .all(txn)
            .await?
            .into_iter()
            .map(|d| d.id)
            .collect();

        let with_paid: Vec<i32> = half_dreams
            .iter()
            .filter(|d| d.ref_donations.0.iter().any(|id| paid.contains(id)))
            .map(|d| d.id)
            .collect();
        if !with_paid.is_empty() && !with_paid.contains(&dream_id) {
            return Err(AppError::Forbidden(format!(
                "dream {} is already being activated",
                with_paid[0]
            )));
        }
        Ok(())
    }

    /// 为 first_level 起的 slots 个级别创建 NEW 捐赠
    #[allow(clippy::too_many_arguments)]
    async fn generate(
        &self,
        txn: &DatabaseTransaction,
        sponsor: &users::Model,
        sponsor_dream_id: i32,
        first_level: i32,
        slots: usize,
        exclude: &HashSet<i32>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i32>> {
        let ctx = ChainContext {
            sponsor_id: sponsor.id,
            used_dreams: exclude,
            now,
        };
        let chain = self
            .graph
            .ancestors(txn, sponsor.id, self.funding.need_to_donate_num, &ctx)
            .await?;
        let pool = FallbackPool::candidates(txn, sponsor.id, now).await?;
        let targets = plan_levels(&chain, &pool, slots, sponsor.id, exclude)?;

        let mut ids = Vec::with_capacity(targets.len());
        for (offset, target) in targets.iter().enumerate() {
            let level = first_level + offset as i32;
            let id = self
                .create_leveled_donation(txn, sponsor, sponsor_dream_id, target, level, now)
                .await?;
            log::info!(
                "Dream {} level {} -> dream {} ({:?}), donation {}",
                sponsor_dream_id,
                level,
                target.dream_id,
                target.source,
                id
            );
            ids.push(id);
        }
        Ok(ids)
    }

    /// 逐个校验已有的 N 个捐赠，只替换失效的 NEW 项
    async fn repair(
        &self,
        txn: &DatabaseTransaction,
        sponsor: &users::Model,
        dream: &dreams::Model,
        mut ids: Vec<i32>,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i32>> {
        let existing: HashMap<i32, donations::Model> = donations::Entity::find()
            .filter(donations::Column::Id.is_in(ids.clone()))
            .all(txn)
            .await?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();

        // 已付款的槽位不可替换，其目标梦想先占位
        let mut kept: HashSet<i32> = existing
            .values()
            .filter(|d| d.status.is_paid())
            .map(|d| d.dream_id)
            .collect();

        let mut invalid: Vec<(usize, Option<&donations::Model>)> = Vec::new();
        for (slot, id) in ids.iter().enumerate() {
            let Some(donation) = existing.get(id) else {
                invalid.push((slot, None));
                continue;
            };
            match donation.status {
                DonationStatus::New => {
                    if self.still_valid(txn, sponsor, donation, &kept, now).await? {
                        kept.insert(donation.dream_id);
                    } else {
                        invalid.push((slot, Some(donation)));
                    }
                }
                DonationStatus::Failed => invalid.push((slot, Some(donation))),
                _ => {}
            }
        }

        if invalid.is_empty() {
            return Ok(ids);
        }

        let pool = FallbackPool::candidates(txn, sponsor.id, now).await?;
        for (slot, old) in invalid {
            let level = slot as i32 + 1;
            let candidate = pool
                .iter()
                .find(|c| c.user_id != sponsor.id && !kept.contains(&c.dream_id))
                .ok_or_else(|| {
                    AppError::ExhaustedFallback(format!(
                        "no replacement for level {} of dream {}",
                        level, dream.id
                    ))
                })?;
            kept.insert(candidate.dream_id);

            let target = Target {
                dream_id: candidate.dream_id,
                user_id: candidate.user_id,
                source: TargetSource::Fallback,
            };
            let new_id = self
                .create_leveled_donation(txn, sponsor, dream.id, &target, level, now)
                .await?;

            if let Some(old) = old
                && old.status == DonationStatus::New
            {
                fail_new_donation(txn, old.id, now).await?;
            }
            log::info!(
                "Dream {} level {}: replaced donation {} with {} (dream {})",
                dream.id,
                level,
                ids[slot],
                new_id,
                candidate.dream_id
            );
            ids[slot] = new_id;
        }

        store_ref_donations(txn, dream.id, ids.clone(), now).await?;
        Ok(ids)
    }

    async fn still_valid(
        &self,
        txn: &DatabaseTransaction,
        sponsor: &users::Model,
        donation: &donations::Model,
        kept: &HashSet<i32>,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        if donation.recipient_id == sponsor.id || kept.contains(&donation.dream_id) {
            return Ok(false);
        }
        let target_active = dreams::Entity::find_by_id(donation.dream_id)
            .one(txn)
            .await?
            .is_some_and(|d| d.status == DreamStatus::Active);
        if !target_active {
            return Ok(false);
        }
        let recipient_ok = users::Entity::find_by_id(donation.recipient_id)
            .one(txn)
            .await?
            .is_some_and(|u| u.can_receive(now));
        Ok(recipient_ok)
    }

    async fn create_leveled_donation(
        &self,
        txn: &DatabaseTransaction,
        sponsor: &users::Model,
        sponsor_dream_id: i32,
        target: &Target,
        level: i32,
        now: DateTime<Utc>,
    ) -> AppResult<i32> {
        let first_amount = donate_size(txn, sponsor.currency_id, level).await?;
        let (amount, currency_id) = recipient_amount(
            self.rates.as_ref(),
            txn,
            first_amount,
            sponsor.currency_id,
            target.user_id,
        )
        .await?;

        let created = donations::ActiveModel {
            dream_id: Set(target.dream_id),
            sponsor_dream_id: Set(Some(sponsor_dream_id)),
            recipient_id: Set(target.user_id),
            sender_id: Set(Some(sponsor.id)),
            level_number: Set(Some(level)),
            amount: Set(amount),
            currency_id: Set(currency_id),
            first_amount: Set(first_amount),
            first_currency_id: Set(sponsor.currency_id),
            status: Set(DonationStatus::New),
            receipt: Set(None),
            confirmed_at: Set(None),
            sub_at: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(txn)
        .await?;
        Ok(created.id)
    }
}

/// 写回 ref_donations；梦想在分配期间离开 HALF 则整体回滚
async fn store_ref_donations(
    txn: &DatabaseTransaction,
    dream_id: i32,
    ids: Vec<i32>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let unique: HashSet<&i32> = ids.iter().collect();
    if unique.len() != ids.len() {
        return Err(AppError::DataIntegrity(format!(
            "duplicate donation ids for dream {dream_id}: {ids:?}"
        )));
    }
    let res = dreams::Entity::update_many()
        .col_expr(dreams::Column::RefDonations, Expr::value(RefDonations(ids)))
        .col_expr(dreams::Column::UpdatedAt, Expr::value(now))
        .filter(dreams::Column::Id.eq(dream_id))
        .filter(dreams::Column::Status.eq(DreamStatus::Half))
        .exec(txn)
        .await?;
    if res.rows_affected != 1 {
        return Err(AppError::InvalidState(format!(
            "dream {dream_id} left HALF during allocation"
        )));
    }
    Ok(())
}

async fn fail_new_donation(
    txn: &DatabaseTransaction,
    donation_id: i32,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let res = donations::Entity::update_many()
        .col_expr(donations::Column::Status, Expr::value(DonationStatus::Failed))
        .col_expr(donations::Column::UpdatedAt, Expr::value(now))
        .filter(donations::Column::Id.eq(donation_id))
        .filter(donations::Column::Status.eq(DonationStatus::New))
        .exec(txn)
        .await?;
    Ok(res.rows_affected == 1)
}

/// 按 ids 顺序（即级别顺序）取出捐赠与目标梦想
async fn load_slots(
    txn: &DatabaseTransaction,
    ids: &[i32],
) -> AppResult<Vec<(donations::Model, dreams::Model)>> {
    let mut by_id: HashMap<i32, donations::Model> = donations::Entity::find()
        .filter(donations::Column::Id.is_in(ids.to_vec()))
        .all(txn)
        .await?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();
    let dream_ids: Vec<i32> = by_id.values().map(|d| d.dream_id).collect();
    let dreams_by_id: HashMap<i32, dreams::Model> = dreams::Entity::find()
        .filter(dreams::Column::Id.is_in(dream_ids))
        .all(txn)
        .await?
        .into_iter()
        .map(|d| (d.id, d))
        .collect();

    let mut slots = Vec::with_capacity(ids.len());
    for id in ids {
        let donation = by_id
            .remove(id)
            .ok_or_else(|| AppError::DataIntegrity(format!("donation {id} missing")))?;
        let dream = dreams_by_id.get(&donation.dream_id).cloned().ok_or_else(|| {
            AppError::DataIntegrity(format!("target dream {} missing", donation.dream_id))
        })?;
        slots.push((donation, dream));
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fallback_pool::PoolKind;

    fn link(user_id: i32, dream_id: Option<i32>, eligible: bool) -> ChainLink {
        ChainLink {
            user_id,
            level: 0,
            dream_id,
            eligible,
        }
    }

    fn cand(user_id: i32, dream_id: i32) -> Candidate {
        Candidate {
            dream_id,
            user_id,
            last_donation_at: None,
            kind: PoolKind::Vip,
        }
    }

    #[test]
    fn test_chain_first_then_pool() {
        let chain = vec![link(2, Some(20), true), link(3, None, false)];
        let pool = vec![cand(5, 50), cand(6, 60), cand(7, 70)];
        let plan = plan_levels(&chain, &pool, 4, 1, &HashSet::new()).unwrap();

        let dreams: Vec<i32> = plan.iter().map(|t| t.dream_id).collect();
        assert_eq!(dreams, vec![20, 50, 60, 70]);
        assert_eq!(plan[0].source, TargetSource::Chain);
        assert!(plan[1..].iter().all(|t| t.source == TargetSource::Fallback));
    }

    #[test]
    fn test_pool_skips_dreams_already_chosen() {
        let chain = vec![link(2, Some(20), true)];
        let pool = vec![cand(2, 20), cand(5, 50)];
        let plan = plan_levels(&chain, &pool, 2, 1, &HashSet::new()).unwrap();
        assert_eq!(plan[1].dream_id, 50);
    }

    #[test]
    fn test_excluded_and_sponsor_dreams_skipped() {
        let chain = vec![link(2, Some(20), true)];
        let pool = vec![cand(1, 10), cand(5, 50), cand(6, 60)];
        let exclude = HashSet::from([20]);
        let plan = plan_levels(&chain, &pool, 2, 1, &exclude).unwrap();
        let dreams: Vec<i32> = plan.iter().map(|t| t.dream_id).collect();
        assert_eq!(dreams, vec![50, 60]);
    }

    #[test]
    fn test_ineligible_ancestor_dream_can_still_come_from_pool() {
        // 上级不合格（如未订阅）时其梦想不计入已选
        let chain = vec![link(2, Some(20), false)];
        let pool = vec![cand(5, 50)];
        let plan = plan_levels(&chain, &pool, 1, 1, &HashSet::new()).unwrap();
        assert_eq!(plan[0].dream_id, 50);
    }

    #[test]
    fn test_exhausted_pool() {
        let pool = vec![cand(5, 50)];
        let err = plan_levels(&[], &pool, 3, 1, &HashSet::new()).unwrap_err();
        assert!(matches!(err, AppError::ExhaustedFallback(_)));
    }
}
