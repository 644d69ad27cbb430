use crate::config::FundingConfig;
use crate::entities::{
    DonationStatus, DreamStatus, RefDonations, donation_entity as donations,
    dream_entity as dreams, user_entity as users,
};
use crate::error::{AppError, AppResult};
use crate::external::{CurrencyRates, NotificationKind, Outbox, SharedNotifier};
use crate::models::{
    ConfirmDonationResponse, DonationResponse, FreeDonationRequest, PayDonationRequest,
    SeedDonationRequest,
};
use crate::services::amounts::{donate_size, recipient_amount};
use crate::services::dream_transitions::{
    activate_another_dream, transition, transition_all_of_user,
};
use crate::services::referral_counter::recount_in;
use crate::services::referral_graph::ReferralGraph;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, Set, TransactionTrait,
};
use std::sync::Arc;

const CONFIRMED: [DonationStatus; 2] = [DonationStatus::Confirmed, DonationStatus::AutoConfirmed];

/// 捐赠付款、确认与失败
#[derive(Clone)]
pub struct DonationService {
    pool: DatabaseConnection,
    funding: FundingConfig,
    graph: ReferralGraph,
    rates: Arc<dyn CurrencyRates>,
    notifier: SharedNotifier,
}

impl DonationService {
    pub fn new(
        pool: DatabaseConnection,
        funding: FundingConfig,
        rates: Arc<dyn CurrencyRates>,
        notifier: SharedNotifier,
    ) -> Self {
        Self {
            graph: ReferralGraph::new(funding.max_referral_depth),
            pool,
            funding,
            rates,
            notifier,
        }
    }

    /// 发送方标记已付款: NEW -> WAITING_FOR_CONFIRMATION
    ///
    /// 分级捐赠的金额按发送方当前货币和当前汇率重新计算。
    pub async fn pay_donation(
        &self,
        sender_id: i32,
        donation_id: i32,
        req: PayDonationRequest,
    ) -> AppResult<DonationResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let donation = donations::Entity::find_by_id(donation_id)
            .filter(donations::Column::SenderId.eq(sender_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Donation not found".into()))?;
        if donation.status != DonationStatus::New {
            return Err(AppError::InvalidState(format!(
                "donation {} is {}, not NEW",
                donation.id, donation.status
            )));
        }

        let (first_amount, first_currency_id, amount, currency_id) = match donation.level_number {
            Some(level) => {
                let sender = find_user(&txn, sender_id).await?;
                let first_amount = donate_size(&txn, sender.currency_id, level).await?;
                let (amount, currency_id) = recipient_amount(
                    self.rates.as_ref(),
                    &txn,
                    first_amount,
                    sender.currency_id,
                    donation.recipient_id,
                )
                .await?;
                (first_amount, sender.currency_id, amount, currency_id)
            }
            None => (
                donation.first_amount,
                donation.first_currency_id,
                donation.amount,
                donation.currency_id,
            ),
        };

        let res = donations::Entity::update_many()
            .col_expr(
                donations::Column::Status,
                Expr::value(DonationStatus::WaitingForConfirmation),
            )
            .col_expr(donations::Column::Receipt, Expr::value(req.receipt))
            .col_expr(donations::Column::FirstAmount, Expr::value(first_amount))
            .col_expr(donations::Column::FirstCurrencyId, Expr::value(first_currency_id))
            .col_expr(donations::Column::Amount, Expr::value(amount))
            .col_expr(donations::Column::CurrencyId, Expr::value(currency_id))
            .col_expr(donations::Column::UpdatedAt, Expr::value(now))
            .filter(donations::Column::Id.eq(donation.id))
            .filter(donations::Column::Status.eq(DonationStatus::New))
            .exec(&txn)
            .await?;
        if res.rows_affected != 1 {
            return Err(AppError::InvalidState(format!(
                "donation {} changed concurrently",
                donation.id
            )));
        }

        let mut outbox = Outbox::new();
        outbox.push(
            donation.recipient_id,
            NotificationKind::DonationReceived {
                donation_id: donation.id,
            },
        );
        let donation = find_donation(&txn, donation.id).await?;
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;

        log::info!("Donation {} paid by user {}", donation.id, sender_id);
        Ok(donation.into())
    }

    /// 没有推荐人的用户向某个 ACTIVE 梦想做首捐，同时绑定该梦想主人为推荐人
    pub async fn seed_donation(
        &self,
        sender_id: i32,
        dream_id: i32,
        req: SeedDonationRequest,
    ) -> AppResult<DonationResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let sender = find_user(&txn, sender_id).await?;
        if sender.referer.is_some() {
            return Err(AppError::Forbidden("Referer already set".into()));
        }

        let target = dreams::Entity::find_by_id(dream_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Dream not found".into()))?;
        if target.status != DreamStatus::Active {
            return Err(AppError::InvalidState(format!(
                "dream {} is not active",
                target.id
            )));
        }

        let recipient = find_user(&txn, target.user_id).await?;
        if recipient.id == sender.id {
            return Err(AppError::Forbidden("Cannot donate to own dream".into()));
        }
        if sender.refer_code.is_some() && recipient.referer == sender.refer_code {
            return Err(AppError::Forbidden(
                "Cannot donate to a user you referred".into(),
            ));
        }
        let Some(code) = recipient.refer_code.clone() else {
            return Err(AppError::Forbidden("Recipient has no refer code".into()));
        };
        if !recipient.can_receive(now) {
            return Err(AppError::InvalidState(format!(
                "user {} cannot receive donations",
                recipient.id
            )));
        }
        if self.graph.is_ancestor(&txn, sender.id, recipient.id).await? {
            return Err(AppError::Forbidden("Referral cycle is not allowed".into()));
        }

        let sponsor_dream = dreams::Entity::find_by_id(req.sponsor_dream_id)
            .filter(dreams::Column::UserId.eq(sender.id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Dream not found".into()))?;
        let sponsor_status = sponsor_dream.status;
        if !matches!(sponsor_status, DreamStatus::Quart | DreamStatus::Half)
            || !sponsor_dream.ref_donations.is_empty()
        {
            return Err(AppError::InvalidState(format!(
                "dream {} cannot take a first donation",
                sponsor_dream.id
            )));
        }

        let first_amount = donate_size(&txn, sender.currency_id, 1).await?;
        let (amount, currency_id) = recipient_amount(
            self.rates.as_ref(),
            &txn,
            first_amount,
            sender.currency_id,
            recipient.id,
        )
        .await?;
        let donation = donations::ActiveModel {
            dream_id: Set(target.id),
            sponsor_dream_id: Set(Some(sponsor_dream.id)),
            recipient_id: Set(recipient.id),
            sender_id: Set(Some(sender.id)),
            level_number: Set(Some(1)),
            amount: Set(amount),
            currency_id: Set(currency_id),
            first_amount: Set(first_amount),
            first_currency_id: Set(sender.currency_id),
            status: Set(DonationStatus::WaitingForConfirmation),
            receipt: Set(req.receipt),
            confirmed_at: Set(None),
            sub_at: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let res = dreams::Entity::update_many()
            .col_expr(
                dreams::Column::RefDonations,
                Expr::value(RefDonations(vec![donation.id])),
            )
            .col_expr(dreams::Column::UpdatedAt, Expr::value(now))
            .filter(dreams::Column::Id.eq(sponsor_dream.id))
            .filter(dreams::Column::Status.eq(sponsor_status))
            .exec(&txn)
            .await?;
        if res.rows_affected != 1 {
            return Err(AppError::InvalidState(format!(
                "dream {} changed concurrently",
                sponsor_dream.id
            )));
        }

        let res = users::Entity::update_many()
            .col_expr(users::Column::Referer, Expr::value(Some(code.clone())))
            .filter(users::Column::Id.eq(sender.id))
            .filter(users::Column::Referer.is_null())
            .exec(&txn)
            .await?;
        if res.rows_affected != 1 {
            return Err(AppError::Forbidden("Referer already set".into()));
        }
        transition_all_of_user(&txn, sender.id, DreamStatus::Quart, DreamStatus::Half, now)
            .await?;

        let mut outbox = Outbox::new();
        recount_in(&txn, Some(&code), now, &mut outbox).await?;
        outbox.push(
            recipient.id,
            NotificationKind::DonationReceived {
                donation_id: donation.id,
            },
        );
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;

        log::info!(
            "User {} seeded dream {} with donation {} to dream {}",
            sender.id,
            sponsor_dream.id,
            donation.id,
            target.id
        );
        Ok(donation.into())
    }

    /// 不计级别的自由捐赠
    pub async fn free_donation(
        &self,
        sender_id: Option<i32>,
        dream_id: i32,
        req: FreeDonationRequest,
    ) -> AppResult<DonationResponse> {
        if req.amount <= 0 {
            return Err(AppError::ValidationError("Amount must be positive".into()));
        }
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let dream = dreams::Entity::find_by_id(dream_id)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Dream not found".into()))?;
        if dream.status != DreamStatus::Active {
            return Err(AppError::InvalidState(format!(
                "dream {} is not active",
                dream.id
            )));
        }
        let owner = find_user(&txn, dream.user_id).await?;
        if !owner.can_receive(now) {
            return Err(AppError::InvalidState(format!(
                "user {} cannot receive donations",
                owner.id
            )));
        }

        let sender = match sender_id {
            Some(id) => Some(find_user(&txn, id).await?),
            None => None,
        };
        if sender.as_ref().is_some_and(|s| s.id == owner.id) {
            return Err(AppError::Forbidden("Cannot donate to own dream".into()));
        }

        let source_currency_id = req
            .currency_id
            .or(sender.as_ref().map(|s| s.currency_id))
            .unwrap_or(owner.currency_id);
        let (amount, currency_id) = recipient_amount(
            self.rates.as_ref(),
            &txn,
            req.amount,
            source_currency_id,
            owner.id,
        )
        .await?;

        let donation = donations::ActiveModel {
            dream_id: Set(dream.id),
            sponsor_dream_id: Set(None),
            recipient_id: Set(owner.id),
            sender_id: Set(sender.as_ref().map(|s| s.id)),
            level_number: Set(None),
            amount: Set(amount),
            currency_id: Set(currency_id),
            first_amount: Set(req.amount),
            first_currency_id: Set(source_currency_id),
            status: Set(DonationStatus::WaitingForConfirmation),
            receipt: Set(req.receipt),
            confirmed_at: Set(None),
            sub_at: Set(Some(now)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut outbox = Outbox::new();
        outbox.push(
            owner.id,
            NotificationKind::DonationReceived {
                donation_id: donation.id,
            },
        );
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;
        Ok(donation.into())
    }

    /// 接收方确认收款
    pub async fn confirm_donation(
        &self,
        caller_id: i32,
        donation_id: i32,
    ) -> AppResult<ConfirmDonationResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let donation = donations::Entity::find_by_id(donation_id)
            .filter(donations::Column::RecipientId.eq(caller_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Donation not found".into()))?;

        let mut outbox = Outbox::new();
        let response = self
            .confirm_in(&txn, donation, DonationStatus::Confirmed, now, &mut outbox)
            .await?;
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;
        Ok(response)
    }

    /// 系统自动确认
    pub async fn auto_confirm_donation(
        &self,
        donation_id: i32,
    ) -> AppResult<ConfirmDonationResponse> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let donation = find_donation(&txn, donation_id).await?;

        let mut outbox = Outbox::new();
        let response = self
            .confirm_in(&txn, donation, DonationStatus::AutoConfirmed, now, &mut outbox)
            .await?;
        txn.commit().await?;
        outbox.flush(self.notifier.as_ref()).await;
        Ok(response)
    }

    /// 标记失败；发送方或接收方均可操作。已是终态时返回 false
    pub async fn fail_donation(&self, caller_id: i32, donation_id: i32) -> AppResult<bool> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;
        let donation = find_donation(&txn, donation_id).await?;
        if donation.recipient_id != caller_id && donation.sender_id != Some(caller_id) {
            return Err(AppError::NotFound("Donation not found".into()));
        }
        if donation.status.is_terminal() {
            return Ok(false);
        }

        let res = donations::Entity::update_many()
            .col_expr(donations::Column::Status, Expr::value(DonationStatus::Failed))
            .col_expr(donations::Column::UpdatedAt, Expr::value(now))
            .filter(donations::Column::Id.eq(donation.id))
            .filter(donations::Column::Status.eq(donation.status))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        let failed = res.rows_affected == 1;
        if failed {
            log::info!("Donation {} failed by user {}", donation.id, caller_id);
        }
        Ok(failed)
    }

    async fn confirm_in(
        &self,
        txn: &DatabaseTransaction,
        donation: donations::Model,
        to: DonationStatus,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> AppResult<ConfirmDonationResponse> {
        if !donation.status.can_transition_to(to) {
            return Err(AppError::InvalidState(format!(
                "donation {} is {}, not waiting for confirmation",
                donation.id, donation.status
            )));
        }

        let res = donations::Entity::update_many()
            .col_expr(donations::Column::Status, Expr::value(to))
            .col_expr(donations::Column::ConfirmedAt, Expr::value(Some(now)))
            .col_expr(donations::Column::UpdatedAt, Expr::value(now))
            .filter(donations::Column::Id.eq(donation.id))
            .filter(donations::Column::Status.eq(DonationStatus::WaitingForConfirmation))
            .exec(txn)
            .await?;
        if res.rows_affected != 1 {
            return Err(AppError::InvalidState(format!(
                "donation {} was confirmed concurrently",
                donation.id
            )));
        }
        log::info!("Donation {} moved {} -> {}", donation.id, donation.status, to);

        let dream_status = self.credit_dream(txn, &donation, now, outbox).await?;

        let mut sponsor_dream_status = None;
        if donation.is_leveled()
            && let Some(sponsor_dream_id) = donation.sponsor_dream_id
        {
            sponsor_dream_status = self
                .advance_sponsor_dream(txn, sponsor_dream_id, donation.id, now)
                .await?;
        }

        outbox.push(
            donation.recipient_id,
            NotificationKind::DonationConfirmed {
                donation_id: donation.id,
            },
        );
        if let Some(sender_id) = donation.sender_id {
            outbox.push(
                sender_id,
                NotificationKind::DonationAccepted {
                    donation_id: donation.id,
                },
            );
        }

        let donation = find_donation(txn, donation.id).await?;
        Ok(ConfirmDonationResponse {
            donation: donation.into(),
            dream_status,
            sponsor_dream_status,
        })
    }

    /// 累加目标梦想的已筹金额，达标后关闭
    async fn credit_dream(
        &self,
        txn: &DatabaseTransaction,
        donation: &donations::Model,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> AppResult<DreamStatus> {
        let confirmed_count = donations::Entity::find()
            .filter(donations::Column::DreamId.eq(donation.dream_id))
            .filter(donations::Column::Status.is_in(CONFIRMED))
            .count(txn)
            .await?;

        dreams::Entity::update_many()
            .col_expr(
                dreams::Column::Collected,
                Expr::col(dreams::Column::Collected).add(donation.amount),
            )
            .col_expr(
                dreams::Column::DonationsCount,
                Expr::value(i32::try_from(confirmed_count).unwrap_or(i32::MAX)),
            )
            .col_expr(dreams::Column::UpdatedAt, Expr::value(now))
            .filter(dreams::Column::Id.eq(donation.dream_id))
            .exec(txn)
            .await?;

        let dream = find_dream(txn, donation.dream_id).await?;
        if dream.status != DreamStatus::Active || dream.collected < dream.goal {
            return Ok(dream.status);
        }

        if transition(txn, dream.id, DreamStatus::Active, DreamStatus::Closed, now).await? {
            let owner = find_user(txn, dream.user_id).await?;
            activate_another_dream(txn, &owner, now).await?;
            recount_in(txn, owner.referer.as_deref(), now, outbox).await?;
            outbox.push(owner.id, NotificationKind::DreamFulfilled { dream_id: dream.id });
            log::info!(
                "Dream {} fulfilled: collected {} of {}",
                dream.id,
                dream.collected,
                dream.goal
            );
        }
        Ok(find_dream(txn, dream.id).await?.status)
    }

    /// 分级捐赠确认后推进发起方梦想
    async fn advance_sponsor_dream(
        &self,
        txn: &DatabaseTransaction,
        sponsor_dream_id: i32,
        donation_id: i32,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DreamStatus>> {
        let sponsor_dream = find_dream(txn, sponsor_dream_id).await?;
        if !sponsor_dream.ref_donations.contains(donation_id) {
            log::warn!(
                "Donation {} is not in ref_donations of dream {}",
                donation_id,
                sponsor_dream.id
            );
            return Ok(Some(sponsor_dream.status));
        }

        if sponsor_dream.status == DreamStatus::Quart {
            transition(txn, sponsor_dream.id, DreamStatus::Quart, DreamStatus::Half, now).await?;
        }

        let need = self.funding.need_to_donate_num;
        let confirmed = donations::Entity::find()
            .filter(donations::Column::Id.is_in(sponsor_dream.ref_donations.0.clone()))
            .filter(donations::Column::Status.is_in(CONFIRMED))
            .count(txn)
            .await?;
        if sponsor_dream.ref_donations.len() >= need && confirmed >= need as u64 {
            transition(
                txn,
                sponsor_dream.id,
                DreamStatus::Half,
                DreamStatus::ThreeQuarters,
                now,
            )
            .await?;
        }

        Ok(Some(find_dream(txn, sponsor_dream.id).await?.status))
    }
}

async fn find_user(txn: &DatabaseTransaction, user_id: i32) -> AppResult<users::Model> {
    users::Entity::find_by_id(user_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}

async fn find_dream(txn: &DatabaseTransaction, dream_id: i32) -> AppResult<dreams::Model> {
    dreams::Entity::find_by_id(dream_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::DataIntegrity(format!("dream {dream_id} missing")))
}

async fn find_donation(txn: &DatabaseTransaction, donation_id: i32) -> AppResult<donations::Model> {
    donations::Entity::find_by_id(donation_id)
        .one(txn)
        .await?
        .ok_or_else(|| AppError::NotFound("Donation not found".into()))
}
