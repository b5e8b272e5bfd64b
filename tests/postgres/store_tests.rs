//! Mapping store contract against `PostgreSQL`.

use crate::postgres::helpers::{
    PostgresCluster, TestDatabase, context, epoch, mapping_at, postgres_cluster, test_runtime,
    thread,
};
use chrono::Duration;
use rstest::rstest;
use thread_bridge::mapping::{
    domain::{ContextValidator, MappingStatus, RawConversationContext, ScopeKey, TenantId},
    ports::{MappingStore, MappingStoreError},
};

#[rstest]
fn created_mapping_is_found_by_scope_and_thread(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");
    let raw = RawConversationContext::new("conv-a", "user-1", "group", "acme")
        .with_metadata("service_url", "https://channel.example/api");
    let group = ContextValidator::multi_tenant()
        .validate(&raw)
        .expect("valid context");
    let mapping = mapping_at(&group, "teams-1", epoch());

    let (by_scope, by_thread) = test_runtime().block_on(async {
        store.create(&mapping).await.expect("create");
        let by_scope = store
            .get_by_scope_key(&ScopeKey::derive(&group))
            .await
            .expect("scope lookup");
        let by_thread = store
            .get_by_thread_id(&thread("teams-1"))
            .await
            .expect("thread lookup");
        (by_scope, by_thread)
    });

    assert_eq!(by_scope, Some(mapping.clone()));
    assert_eq!(by_thread, Some(mapping));
}

#[rstest]
fn second_mapping_for_scope_is_a_scope_conflict(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");
    let personal = context("acme", "A", "U", "personal");

    let result = test_runtime().block_on(async {
        store
            .create(&mapping_at(&personal, "teams-1", epoch()))
            .await
            .expect("first create");
        store
            .create(&mapping_at(&personal, "teams-2", epoch()))
            .await
    });

    assert!(
        matches!(result, Err(MappingStoreError::ScopeConflict(_))),
        "expected scope conflict, got {result:?}"
    );
}

#[rstest]
fn reused_thread_id_is_a_duplicate(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");

    let result = test_runtime().block_on(async {
        store
            .create(&mapping_at(&context("acme", "A", "U1", "personal"), "teams-1", epoch()))
            .await
            .expect("first create");
        store
            .create(&mapping_at(&context("acme", "B", "U2", "personal"), "teams-1", epoch()))
            .await
    });

    assert!(
        matches!(&result, Err(MappingStoreError::DuplicateThreadId(id)) if id.as_str() == "teams-1"),
        "expected duplicate thread id, got {result:?}"
    );
}

#[rstest]
fn same_scope_in_another_tenant_is_independent(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");

    test_runtime().block_on(async {
        store
            .create(&mapping_at(&context("acme", "G", "U", "group"), "teams-1", epoch()))
            .await
            .expect("acme create");
        store
            .create(&mapping_at(&context("globex", "G", "U", "group"), "teams-2", epoch()))
            .await
            .expect("globex create");
    });
}

#[rstest]
fn touch_only_moves_activity_forward(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");
    let id = thread("teams-1");

    let (after_forward, after_backward) = test_runtime().block_on(async {
        store
            .create(&mapping_at(&context("acme", "A", "U", "personal"), "teams-1", epoch()))
            .await
            .expect("create");
        store
            .touch(&id, epoch() + Duration::hours(2))
            .await
            .expect("forward touch");
        let after_forward = store.get_by_thread_id(&id).await.expect("lookup");
        store
            .touch(&id, epoch() + Duration::hours(1))
            .await
            .expect("stale touch");
        let after_backward = store.get_by_thread_id(&id).await.expect("lookup");
        (after_forward, after_backward)
    });

    let forward = after_forward.expect("mapping present");
    let backward = after_backward.expect("mapping present");
    assert_eq!(forward.last_activity_at(), epoch() + Duration::hours(2));
    assert_eq!(backward.last_activity_at(), epoch() + Duration::hours(2));
    assert_eq!(backward.created_at(), epoch());
}

#[rstest]
fn touch_and_deactivate_report_unknown_threads(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");
    let missing = thread("teams-missing");

    let (touched, deactivated) = test_runtime().block_on(async {
        (
            store.touch(&missing, epoch()).await,
            store.deactivate(&missing).await,
        )
    });

    assert!(matches!(touched, Err(MappingStoreError::NotFound(_))));
    assert!(matches!(deactivated, Err(MappingStoreError::NotFound(_))));
}

#[rstest]
fn deactivated_mapping_leaves_active_list_until_touched(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");
    let acme = TenantId::new("acme").expect("tenant");

    let (older, newer) = (thread("teams-older"), thread("teams-newer"));
    let (listed, after_deactivate, after_touch) = test_runtime().block_on(async {
        store
            .create(&mapping_at(&context("acme", "A", "U1", "personal"), "teams-older", epoch()))
            .await
            .expect("create");
        store
            .create(&mapping_at(
                &context("acme", "B", "U2", "personal"),
                "teams-newer",
                epoch() + Duration::minutes(5),
            ))
            .await
            .expect("create");
        store
            .create(&mapping_at(&context("globex", "A", "U1", "personal"), "teams-other", epoch()))
            .await
            .expect("create");
        let listed = store.list_active(&acme).await.expect("list");
        store.deactivate(&older).await.expect("deactivate");
        let after_deactivate = store.list_active(&acme).await.expect("list");
        store
            .touch(&older, epoch() + Duration::hours(1))
            .await
            .expect("touch");
        let after_touch = store.list_active(&acme).await.expect("list");
        (listed, after_deactivate, after_touch)
    });

    let ids = |mappings: &[thread_bridge::mapping::domain::ThreadMapping]| {
        mappings
            .iter()
            .map(|mapping| mapping.thread_id().clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(ids(&listed), vec![newer.clone(), older.clone()]);
    assert_eq!(ids(&after_deactivate), vec![newer.clone()]);
    assert_eq!(ids(&after_touch), vec![older.clone(), newer]);
    assert!(
        after_touch
            .iter()
            .all(|mapping| mapping.status() == MappingStatus::Active)
    );
}

#[rstest]
fn stale_rows_are_listed_oldest_first_up_to_limit(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");

    let selected = test_runtime().block_on(async {
        for (user, age_days) in [("a", 3), ("b", 5), ("c", 4), ("fresh", 0)] {
            store
                .create(&mapping_at(
                    &context("acme", user, user, "personal"),
                    &format!("teams-{user}"),
                    epoch() - Duration::days(age_days),
                ))
                .await
                .expect("create");
        }
        store
            .list_inactive(epoch() - Duration::days(1), 2)
            .await
            .expect("list")
    });

    let ids: Vec<_> = selected
        .iter()
        .map(|mapping| mapping.thread_id().as_str().to_owned())
        .collect();
    assert_eq!(ids, ["teams-b", "teams-c"]);
}

#[rstest]
fn conditional_delete_keeps_rows_touched_after_cutoff(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");
    let cutoff = epoch() - Duration::days(1);
    let (stale, revived) = (thread("teams-stale"), thread("teams-revived"));

    let (deleted_stale, deleted_revived, deleted_again) = test_runtime().block_on(async {
        for user in ["stale", "revived"] {
            store
                .create(&mapping_at(
                    &context("acme", user, user, "personal"),
                    &format!("teams-{user}"),
                    epoch() - Duration::days(2),
                ))
                .await
                .expect("create");
        }
        store.touch(&revived, epoch()).await.expect("touch");
        (
            store.delete_if_inactive(&stale, cutoff).await.expect("delete"),
            store.delete_if_inactive(&revived, cutoff).await.expect("delete"),
            store.delete_if_inactive(&stale, cutoff).await.expect("delete"),
        )
    });

    assert!(deleted_stale);
    assert!(!deleted_revived);
    assert!(!deleted_again);
}

#[rstest]
fn bulk_delete_counts_removed_rows(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");

    let (deleted, remaining) = test_runtime().block_on(async {
        for (user, age_days) in [("a", 10), ("b", 20), ("c", 0)] {
            store
                .create(&mapping_at(
                    &context("acme", user, user, "personal"),
                    &format!("teams-{user}"),
                    epoch() - Duration::days(age_days),
                ))
                .await
                .expect("create");
        }
        let deleted = store
            .delete_inactive(epoch() - Duration::days(5))
            .await
            .expect("bulk delete");
        let remaining = store
            .list_active(&TenantId::new("acme").expect("tenant"))
            .await
            .expect("list");
        (deleted, remaining)
    });

    assert_eq!(deleted, 2);
    assert_eq!(remaining.len(), 1);
}

#[rstest]
fn long_channel_identifiers_are_stored_intact(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::migrated(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");
    let conversation = format!("19:{}@thread.tacv2", "c".repeat(700));
    let user = format!("29:{}", "u".repeat(400));
    let tenant = "t".repeat(300);
    let long_thread = format!("teams-{}", "f".repeat(200));
    let channel = context(&tenant, &conversation, &user, "channel");
    let mapping = mapping_at(&channel, &long_thread, epoch());

    let stored = test_runtime().block_on(async {
        store.create(&mapping).await.expect("create");
        store
            .get_by_scope_key(&ScopeKey::derive(&channel))
            .await
            .expect("lookup")
    });

    assert_eq!(stored, Some(mapping));
}
