mod common;

use async_trait::async_trait;
use common::*;
use dreamfund_backend::entities::{DonationStatus, DreamStatus, DreamType, dream_entity as dreams};
use dreamfund_backend::external::{CurrencyTableRates, TranslatedText, Translator};
use dreamfund_backend::services::AllocationService;
use dreamfund_backend::{AppError, AppResult};
use std::collections::HashSet;
use std::sync::Arc;

struct OfflineTranslator;

#[async_trait]
impl Translator for OfflineTranslator {
    async fn translate(&self, _dream: &dreams::Model, _language: &str) -> AppResult<TranslatedText> {
        Err(AppError::ExternalApiError("translator offline".into()))
    }
}

#[tokio::test]
async fn test_one_eligible_ancestor_and_three_fallbacks() {
    let app = TestApp::new().await;
    let root = app.user("ROOT", None).await;
    let root_dream = create_dream(&app.db, &root, DreamStatus::Active, 100_000).await;
    let mut vip_dreams = Vec::new();
    for code in ["VIP1", "VIP2", "VIP3"] {
        vip_dreams.push(app.vip_with_active_dream(code).await.1.id);
    }
    let sponsor = app.user("SPONSOR", Some("ROOT")).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;

    let list = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    assert_eq!(list.len(), 4);
    assert_eq!(list[0].dream.id, root_dream.id);
    let targets: Vec<i32> = list.iter().map(|r| r.dream.id).collect();
    assert_eq!(targets.iter().collect::<HashSet<_>>().len(), 4);
    assert_eq!(&targets[1..], &vip_dreams[..]);

    for (i, item) in list.iter().enumerate() {
        let level = i as i32 + 1;
        assert_eq!(item.donation.level_number, Some(level));
        assert_eq!(item.donation.status, DonationStatus::New);
        assert_eq!(item.donation.sponsor_dream_id, Some(half.id));
        assert_eq!(item.donation.first_amount, LEVEL_SIZE * level as i64);
        assert_eq!(item.donation.amount, LEVEL_SIZE * level as i64);
    }

    let stored = dream(&app.db, half.id).await;
    let ids: Vec<i32> = list.iter().map(|r| r.donation.id).collect();
    assert_eq!(stored.ref_donations.0, ids);
}

#[tokio::test]
async fn test_repair_without_invalid_entries_is_unchanged() {
    let app = TestApp::new().await;
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;

    let first = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();
    let before = dream(&app.db, half.id).await;
    let second = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();
    let after = dream(&app.db, half.id).await;

    let first_ids: Vec<i32> = first.iter().map(|r| r.donation.id).collect();
    let second_ids: Vec<i32> = second.iter().map(|r| r.donation.id).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(before.ref_donations, after.ref_donations);
    assert_eq!(before.updated_at, after.updated_at);
    assert_eq!(donation_count(&app.db).await, 4);
}

#[tokio::test]
async fn test_invalid_slot_is_replaced_without_duplicates() {
    let app = TestApp::new().await;
    let mut vip_dreams = Vec::new();
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        vip_dreams.push(app.vip_with_active_dream(code).await.1.id);
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let first = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    // 第二级的目标梦想关闭，新来一个替补
    let closed_target = first[1].dream.id;
    set_dream_status(&app.db, closed_target, DreamStatus::Closed).await;
    let (_, spare) = app.vip_with_active_dream("VIP5").await;

    let second = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    assert_eq!(second.len(), 4);
    assert_eq!(second[1].dream.id, spare.id);
    assert_eq!(second[1].donation.level_number, Some(2));
    for slot in [0, 2, 3] {
        assert_eq!(second[slot].donation.id, first[slot].donation.id);
    }
    let targets: HashSet<i32> = second.iter().map(|r| r.dream.id).collect();
    assert_eq!(targets.len(), 4);
    assert!(!targets.contains(&closed_target));

    let replaced = donation(&app.db, first[1].donation.id).await;
    assert_eq!(replaced.status, DonationStatus::Failed);
}

#[tokio::test]
async fn test_paid_slot_is_never_replaced() {
    let app = TestApp::new().await;
    for code in ["VIP1", "VIP2", "VIP3", "VIP4", "VIP5"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let first = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    let paid = first[0].donation.id;
    app.donations
        .pay_donation(sponsor.id, paid, Default::default())
        .await
        .unwrap();
    // 已付款后目标梦想关闭，槽位仍保留
    set_dream_status(&app.db, first[0].dream.id, DreamStatus::Closed).await;

    let second = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();
    assert_eq!(second[0].donation.id, paid);
    assert_eq!(
        second[0].donation.status,
        DonationStatus::WaitingForConfirmation
    );
}

#[tokio::test]
async fn test_exhausted_fallback_rolls_back() {
    let app = TestApp::new().await;
    app.vip_with_active_dream("VIP1").await;
    app.vip_with_active_dream("VIP2").await;
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;

    let err = app
        .allocation
        .allocate(sponsor.id, half.id, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExhaustedFallback(_)));
    assert!(dream(&app.db, half.id).await.ref_donations.is_empty());
    assert_eq!(donation_count(&app.db).await, 0);
}

#[tokio::test]
async fn test_seeded_first_slot_is_kept() {
    let app = TestApp::new().await;
    let root = app.user("ROOT", None).await;
    let root_dream = create_dream(&app.db, &root, DreamStatus::Active, 100_000).await;
    for code in ["VIP1", "VIP2", "VIP3"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", Some("ROOT")).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let seed = create_donation(
        &app.db,
        &root_dream,
        Some(sponsor.id),
        Some(half.id),
        Some(1),
        LEVEL_SIZE,
        DonationStatus::WaitingForConfirmation,
    )
    .await;
    set_ref_donations(&app.db, half.id, vec![seed.id]).await;

    let list = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    assert_eq!(list.len(), 4);
    assert_eq!(list[0].donation.id, seed.id);
    assert!(list[1..].iter().all(|r| r.dream.id != root_dream.id));
    let levels: Vec<Option<i32>> = list.iter().map(|r| r.donation.level_number).collect();
    assert_eq!(levels, vec![Some(1), Some(2), Some(3), Some(4)]);
}

#[tokio::test]
async fn test_charity_dreams_fill_last() {
    let app = TestApp::new().await;
    let (_, vip_dream) = app.vip_with_active_dream("VIP1").await;
    let charity_owner = app.user("CHARITY", None).await;
    let mut charity = Vec::new();
    for _ in 0..3 {
        charity.push(
            create_dream_of_type(
                &app.db,
                &charity_owner,
                DreamStatus::Active,
                1_000_000,
                DreamType::Charity,
            )
            .await
            .id,
        );
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;

    let list = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();
    let targets: Vec<i32> = list.iter().map(|r| r.dream.id).collect();
    assert_eq!(targets[0], vip_dream.id);
    assert_eq!(&targets[1..], &charity[..]);
}

#[tokio::test]
async fn test_only_owner_of_half_dream_may_allocate() {
    let app = TestApp::new().await;
    let sponsor = app.user("SPONSOR", None).await;
    let other = app.user("OTHER", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let quart = create_dream(&app.db, &sponsor, DreamStatus::Quart, 50_000).await;

    let err = app.allocation.allocate(other.id, half.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
    let err = app.allocation.allocate(sponsor.id, quart.id, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn test_second_dream_cannot_start_while_one_is_activating() {
    let app = TestApp::new().await;
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", None).await;
    let first = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let second = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;

    let list = app.allocation.allocate(sponsor.id, first.id, None).await.unwrap();
    app.donations
        .pay_donation(sponsor.id, list[0].donation.id, Default::default())
        .await
        .unwrap();

    let err = app
        .allocation
        .allocate(sponsor.id, second.id, None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_unsubscribed_ancestor_is_skipped() {
    let app = TestApp::new().await;
    let root = app.user("ROOT", None).await;
    let root_dream = create_dream(&app.db, &root, DreamStatus::Active, 100_000).await;
    unsubscribe(&app.db, root.id).await;
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", Some("ROOT")).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;

    let list = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();
    assert!(list.iter().all(|r| r.dream.id != root_dream.id));
}

#[tokio::test]
async fn test_duplicate_target_is_replaced_with_distinct_dream() {
    let app = TestApp::new().await;
    let mut vip_dreams = Vec::new();
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        vip_dreams.push(app.vip_with_active_dream(code).await.1);
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;

    // 第二、三级指向同一个梦想
    let mut ids = Vec::new();
    for (level, target) in [&vip_dreams[0], &vip_dreams[1], &vip_dreams[1], &vip_dreams[2]]
        .into_iter()
        .enumerate()
    {
        let level = level as i32 + 1;
        let slot = create_donation(
            &app.db,
            target,
            Some(sponsor.id),
            Some(half.id),
            Some(level),
            LEVEL_SIZE * level as i64,
            DonationStatus::New,
        )
        .await;
        ids.push(slot.id);
    }
    set_ref_donations(&app.db, half.id, ids.clone()).await;

    let list = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    assert_eq!(list.len(), 4);
    assert_eq!(list[0].donation.id, ids[0]);
    assert_eq!(list[1].donation.id, ids[1]);
    assert_eq!(list[3].donation.id, ids[3]);
    assert_ne!(list[2].donation.id, ids[2]);
    assert_eq!(list[2].dream.id, vip_dreams[3].id);
    assert_eq!(list[2].donation.level_number, Some(3));
    let targets: HashSet<i32> = list.iter().map(|r| r.dream.id).collect();
    assert_eq!(targets.len(), 4);
    assert_eq!(donation(&app.db, ids[2]).await.status, DonationStatus::Failed);
}

#[tokio::test]
async fn test_recipient_that_cannot_receive_is_replaced() {
    let app = TestApp::new().await;
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let first = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    unsubscribe(&app.db, first[1].dream.user_id).await;
    deactivate(&app.db, first[3].dream.user_id).await;
    let (_, spare1) = app.vip_with_active_dream("VIP5").await;
    let (_, spare2) = app.vip_with_active_dream("VIP6").await;

    let second = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    assert_eq!(second[0].donation.id, first[0].donation.id);
    assert_eq!(second[2].donation.id, first[2].donation.id);
    assert_eq!(second[1].dream.id, spare1.id);
    assert_eq!(second[3].dream.id, spare2.id);
    assert_eq!(second[3].donation.level_number, Some(4));
    for slot in [1, 3] {
        let old = donation(&app.db, first[slot].donation.id).await;
        assert_eq!(old.status, DonationStatus::Failed);
    }
}

#[tokio::test]
async fn test_failed_slot_gets_new_donation() {
    let app = TestApp::new().await;
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let first = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    let failed = first[2].donation.id;
    assert!(app.donations.fail_donation(sponsor.id, failed).await.unwrap());

    let second = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();

    assert_ne!(second[2].donation.id, failed);
    assert_eq!(second[2].donation.status, DonationStatus::New);
    assert_eq!(second[2].donation.level_number, Some(3));
    // 只剩原目标梦想可选，换成一笔新捐赠
    assert_eq!(second[2].dream.id, first[2].dream.id);
    for slot in [0, 1, 3] {
        assert_eq!(second[slot].donation.id, first[slot].donation.id);
    }
    assert_eq!(donation(&app.db, failed).await.status, DonationStatus::Failed);
    assert_eq!(donation_count(&app.db).await, 5);
    let stored = dream(&app.db, half.id).await;
    assert_eq!(stored.ref_donations.0[2], second[2].donation.id);
}

#[tokio::test]
async fn test_exhausted_repair_rolls_back_replacements() {
    let app = TestApp::new().await;
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let first = app.allocation.allocate(sponsor.id, half.id, None).await.unwrap();
    let before = dream(&app.db, half.id).await;

    // 两个目标关闭，只有一个替补：第二级能补上，第三级补不上
    set_dream_status(&app.db, first[1].dream.id, DreamStatus::Closed).await;
    set_dream_status(&app.db, first[2].dream.id, DreamStatus::Closed).await;
    app.vip_with_active_dream("VIP5").await;

    let err = app
        .allocation
        .allocate(sponsor.id, half.id, None)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::ExhaustedFallback(_)));
    assert_eq!(donation_count(&app.db).await, 4);
    assert_eq!(dream(&app.db, half.id).await.ref_donations, before.ref_donations);
    for slot in &first {
        assert_eq!(
            donation(&app.db, slot.donation.id).await.status,
            DonationStatus::New
        );
    }
}

#[tokio::test]
async fn test_translation_failure_falls_back_to_stored_text() {
    let app = TestApp::new().await;
    for code in ["VIP1", "VIP2", "VIP3", "VIP4"] {
        app.vip_with_active_dream(code).await;
    }
    let sponsor = app.user("SPONSOR", None).await;
    let half = create_dream(&app.db, &sponsor, DreamStatus::Half, 50_000).await;
    let allocation = AllocationService::new(
        app.db.clone(),
        app.funding.clone(),
        Arc::new(CurrencyTableRates),
        Arc::new(OfflineTranslator),
    );

    let list = allocation.allocate(sponsor.id, half.id, Some("de")).await.unwrap();

    assert_eq!(list.len(), 4);
    for item in &list {
        let stored = dream(&app.db, item.dream.id).await;
        assert_eq!(item.dream.title, stored.title);
        assert_eq!(item.dream.description, stored.description);
    }
    assert_eq!(dream(&app.db, half.id).await.ref_donations.0.len(), 4);
}
