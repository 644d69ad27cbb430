#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dreamfund_backend::AppResult;
use dreamfund_backend::config::{DatabaseConfig, FundingConfig};
use dreamfund_backend::database::{create_pool, run_migrations};
use dreamfund_backend::entities::{
    AchievementType, DonationStatus, DreamStatus, DreamType, RefDonations,
    achievement_entity as achievements, currency_entity as currencies,
    donate_size_entity as donate_sizes, donation_entity as donations, dream_entity as dreams,
    user_entity as users,
};
use dreamfund_backend::external::{
    CurrencyTableRates, NotificationKind, NotificationSink, StoredTextTranslator,
};
use dreamfund_backend::services::{
    AllocationService, DonationService, DreamService, ReferralCounter,
};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::{Arc, Mutex};

/// 每级固定捐赠额（分）
pub const LEVEL_SIZE: i64 = 1_000;

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(i32, NotificationKind)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(i32, NotificationKind)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, user_id: i32, kind: &NotificationKind) -> AppResult<()> {
        self.sent.lock().unwrap().push((user_id, kind.clone()));
        Ok(())
    }
}

pub struct TestApp {
    pub db: DatabaseConnection,
    pub funding: FundingConfig,
    pub notifier: Arc<RecordingNotifier>,
    pub allocation: AllocationService,
    pub dreams: DreamService,
    pub donations: DonationService,
    pub counter: ReferralCounter,
    pub currency_id: i32,
}

impl TestApp {
    pub async fn new() -> Self {
        let db = setup_db().await;
        let funding = FundingConfig::default();
        let notifier = Arc::new(RecordingNotifier::default());
        let currency_id = create_currency(&db, "USD", 1, 10_000).await;

        Self {
            allocation: AllocationService::new(
                db.clone(),
                funding.clone(),
                Arc::new(CurrencyTableRates),
                Arc::new(StoredTextTranslator),
            ),
            dreams: DreamService::new(db.clone(), funding.clone(), notifier.clone()),
            donations: DonationService::new(
                db.clone(),
                funding.clone(),
                Arc::new(CurrencyTableRates),
                notifier.clone(),
            ),
            counter: ReferralCounter::new(db.clone(), notifier.clone()),
            db,
            funding,
            notifier,
            currency_id,
        }
    }

    /// 已订阅、有推荐码的用户
    pub async fn user(&self, code: &str, referer: Option<&str>) -> users::Model {
        create_user(&self.db, self.currency_id, Some(code), referer).await
    }

    pub async fn vip_with_active_dream(&self, code: &str) -> (users::Model, dreams::Model) {
        let user = self.user(code, None).await;
        let user = set_vip(&self.db, user.id).await;
        let dream = create_dream(&self.db, &user, DreamStatus::Active, 100_000).await;
        (user, dream)
    }
}

pub async fn setup_db() -> DatabaseConnection {
    // 内存库只能有一个连接，否则每个连接各自一份空库
    let db = create_pool(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
    })
    .await
    .expect("connect sqlite");
    run_migrations(&db).await.expect("run migrations");
    db
}

pub async fn create_currency(
    db: &DatabaseConnection,
    code: &str,
    course: i32,
    dream_limit: i64,
) -> i32 {
    let currency = currencies::ActiveModel {
        code: Set(code.to_string()),
        symbol: Set("$".to_string()),
        course: Set(course),
        dream_limit: Set(dream_limit),
        is_active: Set(true),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert currency");

    for level in 1..=4 {
        donate_sizes::ActiveModel {
            currency_id: Set(currency.id),
            level: Set(level),
            size: Set(LEVEL_SIZE * level as i64),
            ..Default::default()
        }
        .insert(db)
        .await
        .expect("insert donate size");
    }
    currency.id
}

pub async fn create_user(
    db: &DatabaseConnection,
    currency_id: i32,
    refer_code: Option<&str>,
    referer: Option<&str>,
) -> users::Model {
    let now = Utc::now();
    users::ActiveModel {
        name: Set(format!("user-{}", refer_code.unwrap_or("anon"))),
        email: Set(format!("{}@example.com", refer_code.unwrap_or("anon"))),
        language: Set("en".to_string()),
        refer_code: Set(refer_code.map(str::to_string)),
        referer: Set(referer.map(str::to_string)),
        refer_count: Set(0),
        currency_id: Set(currency_id),
        is_vip: Set(false),
        is_active: Set(true),
        paid_till: Set(Some((now + Duration::days(30)).date_naive())),
        trial_till: Set(None),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert user")
}

pub async fn set_vip(db: &DatabaseConnection, user_id: i32) -> users::Model {
    let user = users::Entity::find_by_id(user_id)
        .one(db)
        .await
        .unwrap()
        .unwrap();
    let mut active: users::ActiveModel = user.into();
    active.is_vip = Set(true);
    active.update(db).await.expect("update user")
}

pub async fn unsubscribe(db: &DatabaseConnection, user_id: i32) {
    users::Entity::update_many()
        .col_expr(users::Column::PaidTill, Expr::value(Option::<chrono::NaiveDate>::None))
        .col_expr(
            users::Column::TrialTill,
            Expr::value(Option::<chrono::DateTime<Utc>>::None),
        )
        .filter(users::Column::Id.eq(user_id))
        .exec(db)
        .await
        .expect("unsubscribe");
}

pub async fn deactivate(db: &DatabaseConnection, user_id: i32) {
    users::Entity::update_many()
        .col_expr(users::Column::IsActive, Expr::value(false))
        .filter(users::Column::Id.eq(user_id))
        .exec(db)
        .await
        .expect("deactivate");
}

pub async fn set_user_currency(db: &DatabaseConnection, user_id: i32, currency_id: i32) {
    users::Entity::update_many()
        .col_expr(users::Column::CurrencyId, Expr::value(currency_id))
        .filter(users::Column::Id.eq(user_id))
        .exec(db)
        .await
        .expect("set user currency");
}

pub async fn create_dream(
    db: &DatabaseConnection,
    owner: &users::Model,
    status: DreamStatus,
    goal: i64,
) -> dreams::Model {
    create_dream_of_type(db, owner, status, goal, DreamType::User).await
}

pub async fn create_dream_of_type(
    db: &DatabaseConnection,
    owner: &users::Model,
    status: DreamStatus,
    goal: i64,
    type_dream: DreamType,
) -> dreams::Model {
    let now = Utc::now();
    dreams::ActiveModel {
        user_id: Set(owner.id),
        status: Set(status),
        type_dream: Set(type_dream),
        title: Set(format!("dream of {}", owner.id)),
        description: Set("a dream".to_string()),
        language: Set("en".to_string()),
        goal: Set(goal),
        collected: Set(0),
        currency_id: Set(owner.currency_id),
        ref_donations: Set(RefDonations::default()),
        donations_count: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
        closed_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert dream")
}

pub async fn set_dream_status(db: &DatabaseConnection, dream_id: i32, status: DreamStatus) {
    dreams::Entity::update_many()
        .col_expr(dreams::Column::Status, Expr::value(status))
        .filter(dreams::Column::Id.eq(dream_id))
        .exec(db)
        .await
        .expect("set dream status");
}

pub async fn set_collected(db: &DatabaseConnection, dream_id: i32, collected: i64) {
    dreams::Entity::update_many()
        .col_expr(dreams::Column::Collected, Expr::value(collected))
        .filter(dreams::Column::Id.eq(dream_id))
        .exec(db)
        .await
        .expect("set collected");
}

pub async fn set_ref_donations(db: &DatabaseConnection, dream_id: i32, ids: Vec<i32>) {
    dreams::Entity::update_many()
        .col_expr(dreams::Column::RefDonations, Expr::value(RefDonations(ids)))
        .filter(dreams::Column::Id.eq(dream_id))
        .exec(db)
        .await
        .expect("set ref donations");
}

/// 直接写入一笔捐赠；sponsor_dream 为空时是自由捐赠
pub async fn create_donation(
    db: &DatabaseConnection,
    target: &dreams::Model,
    sender_id: Option<i32>,
    sponsor_dream_id: Option<i32>,
    level: Option<i32>,
    amount: i64,
    status: DonationStatus,
) -> donations::Model {
    let now = Utc::now();
    donations::ActiveModel {
        dream_id: Set(target.id),
        sponsor_dream_id: Set(sponsor_dream_id),
        recipient_id: Set(target.user_id),
        sender_id: Set(sender_id),
        level_number: Set(level),
        amount: Set(amount),
        currency_id: Set(target.currency_id),
        first_amount: Set(amount),
        first_currency_id: Set(target.currency_id),
        status: Set(status),
        receipt: Set(None),
        confirmed_at: Set(None),
        sub_at: Set(Some(now)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert donation")
}

pub async fn grant_achievement(db: &DatabaseConnection, user_id: i32, type_name: AchievementType) {
    let now = Utc::now();
    achievements::ActiveModel {
        user_id: Set(user_id),
        type_name: Set(type_name),
        received_at: Set(Some(now)),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("insert achievement");
}

pub async fn dream(db: &DatabaseConnection, id: i32) -> dreams::Model {
    dreams::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
}

pub async fn donation(db: &DatabaseConnection, id: i32) -> donations::Model {
    donations::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
}

pub async fn user(db: &DatabaseConnection, id: i32) -> users::Model {
    users::Entity::find_by_id(id).one(db).await.unwrap().unwrap()
}

pub async fn donation_count(db: &DatabaseConnection) -> usize {
    donations::Entity::find().all(db).await.unwrap().len()
}
