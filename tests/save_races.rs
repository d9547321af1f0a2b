mod common;

use common::{GatedRemote, field, init_tracing, past_debounce, principal, settled};
use fieldsync::{
    FieldValue, InitializationState, MemoryRemotePersistence, SaveTaskStatus,
};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn edit_landing_mid_flight_keeps_the_field_dirty() {
    init_tracing();
    let owner = principal("founder-1");
    let remote = Arc::new(GatedRemote::new());
    remote
        .store
        .seed(
            &owner,
            BTreeMap::from([("company_name".to_string(), FieldValue::from("v0"))]),
        )
        .await;
    let engine = Arc::new(common::engine(remote.clone()));
    engine.initialize(Some(owner.clone())).await.expect("init");

    let company = field("company_name");
    engine
        .set_field(&company, FieldValue::from("v1"))
        .await
        .expect("first edit");

    // Park the save on the wire so an edit can land mid-flight.
    let release = remote.hold_next_save();
    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        let company = company.clone();
        async move { engine.save_field(&company).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(engine.snapshot().await.is_saving);

    engine
        .set_field(&company, FieldValue::from("v2"))
        .await
        .expect("mid-flight edit");
    release.send(()).expect("release gate");
    handle.await.expect("join").expect("save succeeds");

    // The save committed v1, but v2 has moved on: dirty survives, and the
    // baseline records what the backend actually holds.
    let snapshot = engine.snapshot().await;
    let state = snapshot.field(&company).expect("company");
    assert!(state.is_dirty);
    assert_eq!(state.current_value, FieldValue::from("v2"));
    assert_eq!(state.last_persisted, Some(FieldValue::from("v1")));
    assert_eq!(remote.store.update_calls(), 1);

    let tasks = engine.save_tasks().await;
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0].status, SaveTaskStatus::Committed);
    assert_eq!(tasks[0].superseded_by, Some(tasks[1].id));
    assert!(tasks[1].target_fields.contains(&company));

    // The follow-up save carries v2 out on its own countdown.
    assert!(settled(&engine, Duration::from_secs(1)).await, "settles");
    assert_eq!(remote.store.update_calls(), 2);
    let stored = remote.store.stored(&owner).await.expect("stored");
    assert_eq!(
        stored.values.get("company_name"),
        Some(&FieldValue::from("v2"))
    );
    let tasks = engine.save_tasks().await;
    assert_eq!(tasks[1].status, SaveTaskStatus::Committed);
    assert_eq!(engine.metrics().superseded_saves, 1);
}

#[tokio::test]
async fn concurrent_explicit_saves_insert_once_then_update() {
    init_tracing();
    let owner = principal("founder-2");
    let remote = Arc::new(MemoryRemotePersistence::new());
    let engine = common::engine(remote.clone());
    engine.initialize(Some(owner.clone())).await.expect("init");
    assert_eq!(engine.snapshot().await.record_id, None);

    let company = field("company_name");
    let pitch = field("pitch");
    engine
        .set_field(&company, FieldValue::from("New Co"))
        .await
        .expect("edit company");
    engine
        .set_field(&pitch, FieldValue::from("We build engines"))
        .await
        .expect("edit pitch");

    let results = join_all(vec![
        engine.save_field(&company),
        engine.save_field(&pitch),
    ])
    .await;
    for result in results {
        result.expect("save");
    }

    // Whichever save won the race inserted; the loser saw the assigned id.
    assert_eq!(remote.insert_calls(), 1);
    assert_eq!(remote.update_calls(), 1);

    let snapshot = engine.snapshot().await;
    assert!(snapshot.record_id.is_some());
    assert_eq!(snapshot.dirty_count(), 0);

    let stored = remote.stored(&owner).await.expect("stored");
    assert_eq!(
        stored.values.get("company_name"),
        Some(&FieldValue::from("New Co"))
    );
    assert_eq!(
        stored.values.get("pitch"),
        Some(&FieldValue::from("We build engines"))
    );

    past_debounce().await;
    assert_eq!(remote.save_calls(), 2);
}

#[tokio::test]
async fn debounced_batches_create_the_record_exactly_once() {
    let owner = principal("founder-3");
    let remote = Arc::new(MemoryRemotePersistence::new());
    let engine = common::engine(remote.clone());
    engine.initialize(Some(owner.clone())).await.expect("init");

    engine
        .set_field(&field("company_name"), FieldValue::from("New Co"))
        .await
        .expect("edit company");
    engine
        .set_field(&field("pitch"), FieldValue::from("two fields, one record"))
        .await
        .expect("edit pitch");

    assert!(settled(&engine, Duration::from_secs(1)).await, "settles");

    assert_eq!(remote.insert_calls(), 1);
    assert_eq!(remote.update_calls(), 1);
    assert!(engine.snapshot().await.record_id.is_some());

    let stored = remote.stored(&owner).await.expect("stored");
    assert_eq!(
        stored.values.get("company_name"),
        Some(&FieldValue::from("New Co"))
    );
    assert_eq!(
        stored.values.get("pitch"),
        Some(&FieldValue::from("two fields, one record"))
    );
}

#[tokio::test]
async fn completion_arriving_after_reset_is_discarded() {
    init_tracing();
    let owner = principal("founder-4");
    let remote = Arc::new(GatedRemote::new());
    remote
        .store
        .seed(
            &owner,
            BTreeMap::from([("company_name".to_string(), FieldValue::from("v0"))]),
        )
        .await;
    let engine = Arc::new(common::engine(remote.clone()));
    engine.initialize(Some(owner.clone())).await.expect("init");

    engine
        .set_field(&field("company_name"), FieldValue::from("v1"))
        .await
        .expect("edit");

    let release = remote.hold_next_save();
    let handle = tokio::spawn({
        let engine = Arc::clone(&engine);
        let company = field("company_name");
        async move { engine.save_field(&company).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(engine.snapshot().await.is_saving);

    engine.on_principal_changed(None).await.expect("sign out");
    release.send(()).expect("release gate");
    handle.await.expect("join").expect("save resolves");

    // The backend write landed, but the engine torn down mid-flight must not
    // resurrect anything from it.
    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.state, InitializationState::Uninitialized);
    assert_eq!(snapshot.owner, None);
    assert_eq!(snapshot.dirty_count(), 0);
    assert!(!snapshot.is_saving);
    assert!(engine.save_tasks().await.is_empty());

    past_debounce().await;
    assert_eq!(remote.store.update_calls(), 1);
}
