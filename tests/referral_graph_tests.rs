mod common;

use chrono::Utc;
use common::*;
use dreamfund_backend::AppError;
use dreamfund_backend::entities::{DreamStatus, DreamType, user_entity as users};
use dreamfund_backend::services::{ChainContext, ReferralGraph};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use std::collections::HashSet;

#[tokio::test]
async fn test_chain_is_nearest_first_and_annotated() {
    let app = TestApp::new().await;
    let top = app.user("TOP", None).await;
    let top_dream = create_dream(&app.db, &top, DreamStatus::Active, 1_000).await;
    let mid = app.user("MID", Some("TOP")).await;
    create_dream_of_type(&app.db, &mid, DreamStatus::Active, 1_000, DreamType::Charity).await;
    let leaf = app.user("LEAF", Some("MID")).await;

    let used = HashSet::new();
    let ctx = ChainContext {
        sponsor_id: leaf.id,
        used_dreams: &used,
        now: Utc::now(),
    };
    let chain = ReferralGraph::new(16)
        .ancestors(&app.db, leaf.id, 4, &ctx)
        .await
        .unwrap();

    assert_eq!(chain.len(), 2);
    assert_eq!((chain[0].user_id, chain[0].level), (mid.id, 1));
    // 慈善梦想不能作为链上接收梦想
    assert_eq!(chain[0].dream_id, None);
    assert!(!chain[0].eligible);
    assert_eq!((chain[1].user_id, chain[1].level), (top.id, 2));
    assert_eq!(chain[1].dream_id, Some(top_dream.id));
    assert!(chain[1].eligible);
}

#[tokio::test]
async fn test_used_dream_is_not_eligible() {
    let app = TestApp::new().await;
    let top = app.user("TOP", None).await;
    let top_dream = create_dream(&app.db, &top, DreamStatus::Active, 1_000).await;
    let leaf = app.user("LEAF", Some("TOP")).await;

    let used = HashSet::from([top_dream.id]);
    let ctx = ChainContext {
        sponsor_id: leaf.id,
        used_dreams: &used,
        now: Utc::now(),
    };
    let chain = ReferralGraph::new(16)
        .ancestors(&app.db, leaf.id, 4, &ctx)
        .await
        .unwrap();
    assert!(!chain[0].eligible);
}

#[tokio::test]
async fn test_dangling_referer_ends_chain() {
    let app = TestApp::new().await;
    let leaf = app.user("LEAF", Some("GHOST")).await;
    let used = HashSet::new();
    let ctx = ChainContext {
        sponsor_id: leaf.id,
        used_dreams: &used,
        now: Utc::now(),
    };
    let chain = ReferralGraph::new(16)
        .ancestors(&app.db, leaf.id, 4, &ctx)
        .await
        .unwrap();
    assert!(chain.is_empty());
}

#[tokio::test]
async fn test_cycle_is_data_integrity_error() {
    let app = TestApp::new().await;
    let a = app.user("A", Some("B")).await;
    app.user("B", Some("A")).await;

    let used = HashSet::new();
    let ctx = ChainContext {
        sponsor_id: a.id,
        used_dreams: &used,
        now: Utc::now(),
    };
    let err = ReferralGraph::new(16)
        .ancestors(&app.db, a.id, 4, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DataIntegrity(_)));
}

#[tokio::test]
async fn test_depth_above_cap_is_rejected() {
    let app = TestApp::new().await;
    let leaf = app.user("LEAF", None).await;
    let used = HashSet::new();
    let ctx = ChainContext {
        sponsor_id: leaf.id,
        used_dreams: &used,
        now: Utc::now(),
    };
    let err = ReferralGraph::new(3)
        .ancestors(&app.db, leaf.id, 4, &ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::DataIntegrity(_)));
}

#[tokio::test]
async fn test_is_ancestor() {
    let app = TestApp::new().await;
    let top = app.user("TOP", None).await;
    let mid = app.user("MID", Some("TOP")).await;
    let leaf = app.user("LEAF", Some("MID")).await;
    let graph = ReferralGraph::new(16);

    assert!(graph.is_ancestor(&app.db, top.id, leaf.id).await.unwrap());
    assert!(graph.is_ancestor(&app.db, leaf.id, leaf.id).await.unwrap());
    assert!(!graph.is_ancestor(&app.db, leaf.id, mid.id).await.unwrap());
}

#[tokio::test]
async fn test_community_by_level() {
    let app = TestApp::new().await;
    let top = app.user("TOP", None).await;
    let mid = app.user("MID", Some("TOP")).await;
    let leaf = app.user("LEAF", Some("MID")).await;
    let deep = app.user("DEEP", Some("LEAF")).await;
    users::Entity::update_many()
        .col_expr(users::Column::ReferCount, Expr::value(1))
        .filter(users::Column::Id.eq(mid.id))
        .exec(&app.db)
        .await
        .unwrap();

    let members = app.dreams.community(top.id, Some(2)).await.unwrap();
    let levels: Vec<(i32, usize)> = members.iter().map(|m| (m.user_id, m.level)).collect();
    assert_eq!(levels, vec![(mid.id, 1), (leaf.id, 2)]);
    assert_eq!(members[0].refer_count, 1);

    let all = app.dreams.community(top.id, None).await.unwrap();
    assert!(all.iter().any(|m| m.user_id == deep.id && m.level == 3));

    let err = app.dreams.community(top.id, Some(0)).await.unwrap_err();
    assert!(matches!(err, AppError::ValidationError(_)));
}
