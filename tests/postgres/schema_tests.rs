//! Schema bootstrap against an empty database.

use crate::postgres::helpers::{
    PostgresCluster, TestDatabase, context, epoch, mapping_at, postgres_cluster, test_runtime,
};
use rstest::rstest;
use thread_bridge::mapping::{
    domain::ScopeKey,
    ports::{MappingStore, MappingStoreError},
};

#[rstest]
fn ensure_schema_creates_table_and_is_repeatable(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::empty(postgres_cluster).expect("test database");
    let store = database.store(2).expect("store");
    let personal = context("acme", "A", "U", "personal");
    let mapping = mapping_at(&personal, "teams-1", epoch());

    let stored = test_runtime().block_on(async {
        store.ensure_schema().await.expect("first bootstrap");
        store.ensure_schema().await.expect("second bootstrap");
        store.create(&mapping).await.expect("create");
        store
            .get_by_scope_key(&ScopeKey::derive(&personal))
            .await
            .expect("lookup")
    });

    assert_eq!(stored, Some(mapping));
}

#[rstest]
fn operations_before_bootstrap_surface_persistence_errors(postgres_cluster: PostgresCluster) {
    let database = TestDatabase::empty(postgres_cluster).expect("test database");
    let store = database.store(1).expect("store");
    let personal = context("acme", "A", "U", "personal");

    let result = test_runtime().block_on(async {
        store.get_by_scope_key(&ScopeKey::derive(&personal)).await
    });

    assert!(
        matches!(result, Err(MappingStoreError::Persistence(_))),
        "expected a persistence error, got {result:?}"
    );
}
