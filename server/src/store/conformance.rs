//! Behavioural checks every `Store` backend must pass.
//!
//! Each function drives one scenario against a fresh store and panics on the
//! first violation. Backend test modules call them from `#[tokio::test]`s.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use super::{
    ConfigId, ConfigPatch, ConfigRecord, ConfigStatus, Document, NewUser, Store, StoreError,
    UserId,
};

/// How long a store call may wait before it counts as blocked.
pub const BLOCKED_AFTER: Duration = Duration::from_millis(1500);

fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

fn unique_email(tag: &str) -> String {
    format!("{tag}-{}@example.com", UserId::new_random())
}

async fn active_ids(store: &dyn Store, owner: UserId) -> Vec<ConfigId> {
    store
        .list_configs(owner)
        .await
        .expect("list configs")
        .into_iter()
        .filter(|c| c.status == ConfigStatus::Active)
        .map(|c| c.config_id)
        .collect()
}

/// Activate `config_id`, or `None` if the call is still waiting after
/// [`BLOCKED_AFTER`].
pub async fn activate_within(
    store: &dyn Store,
    owner: UserId,
    config_id: ConfigId,
) -> Option<ConfigRecord> {
    tokio::time::timeout(BLOCKED_AFTER, store.activate_config(owner, config_id))
        .await
        .ok()
        .map(|result| result.expect("activation failed"))
}

/// Two owners with one inactive config each: `(owner, mine, neighbour, theirs)`.
pub async fn two_owners(store: &dyn Store) -> (UserId, ConfigId, UserId, ConfigId) {
    let owner = UserId::new_random();
    let neighbour = UserId::new_random();
    let mine = store
        .create_config(owner, "mine", &Document::new())
        .await
        .expect("create mine");
    let theirs = store
        .create_config(neighbour, "theirs", &Document::new())
        .await
        .expect("create theirs");
    (owner, mine.config_id, neighbour, theirs.config_id)
}

pub async fn user_lifecycle(store: &dyn Store) {
    let email = unique_email("alice");
    let created = store
        .create_user(&NewUser {
            name: "Alice".to_string(),
            email: Some(email.clone()),
            password_hash: Some("digest".to_string()),
            google_id: None,
        })
        .await
        .expect("create user");

    let found = store
        .find_user_by_email(&email)
        .await
        .expect("find user")
        .expect("user exists");
    assert_eq!(found, created);
    assert_eq!(store.get_user(created.user_id).await.expect("get user"), created);

    let duplicate = store
        .create_user(&NewUser {
            name: "Impostor".to_string(),
            email: Some(email),
            password_hash: None,
            google_id: None,
        })
        .await;
    assert!(matches!(duplicate, Err(StoreError::AlreadyExists)));

    assert!(
        store
            .find_user_by_email(&unique_email("nobody"))
            .await
            .expect("lookup")
            .is_none()
    );
    assert!(matches!(
        store.get_user(UserId::new_random()).await,
        Err(StoreError::NotFound)
    ));
}

pub async fn config_crud(store: &dyn Store) {
    let owner = UserId::new_random();
    let first = store
        .create_config(owner, "first", &doc(json!({"retries": 3})))
        .await
        .expect("create first");
    let second = store
        .create_config(owner, "second", &doc(json!({"retries": 5})))
        .await
        .expect("create second");

    assert_eq!(first.status, ConfigStatus::Inactive);
    assert_eq!(first.owner_id, owner);
    assert_eq!(first.name.as_deref(), Some("first"));

    let listed: Vec<_> = store
        .list_configs(owner)
        .await
        .expect("list")
        .into_iter()
        .map(|c| c.config_id)
        .collect();
    assert_eq!(listed, vec![first.config_id, second.config_id]);

    let renamed = store
        .update_config(
            owner,
            first.config_id,
            &ConfigPatch {
                name: Some("renamed".to_string()),
                payload: None,
            },
        )
        .await
        .expect("rename");
    assert_eq!(renamed.name.as_deref(), Some("renamed"));
    assert_eq!(renamed.payload, doc(json!({"retries": 3})));

    let repayloaded = store
        .update_config(
            owner,
            first.config_id,
            &ConfigPatch {
                name: None,
                payload: Some(doc(json!({"retries": 9, "queue": "fast"}))),
            },
        )
        .await
        .expect("replace payload");
    assert_eq!(repayloaded.name.as_deref(), Some("renamed"));
    assert_eq!(repayloaded.payload, doc(json!({"retries": 9, "queue": "fast"})));
    assert_eq!(repayloaded.status, ConfigStatus::Inactive);

    let unchanged = store
        .update_config(owner, first.config_id, &ConfigPatch::default())
        .await
        .expect("empty patch");
    assert_eq!(unchanged, repayloaded);

    assert!(matches!(
        store
            .update_config(UserId::new_random(), first.config_id, &ConfigPatch::default())
            .await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.get_config(owner, ConfigId::new_random()).await,
        Err(StoreError::NotFound)
    ));

    store
        .delete_config(owner, second.config_id)
        .await
        .expect("delete");
    assert!(matches!(
        store.delete_config(owner, second.config_id).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.get_config(owner, second.config_id).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.deactivate_config(owner, second.config_id).await,
        Err(StoreError::NotFound)
    ));
}

pub async fn activation_scenario(store: &dyn Store) {
    let owner = UserId::new_random();
    let a = store
        .create_config(owner, "a", &Document::new())
        .await
        .expect("create a");
    let b = store
        .create_config(owner, "b", &Document::new())
        .await
        .expect("create b");

    assert!(matches!(
        store.get_active_config(owner).await,
        Err(StoreError::NotFound)
    ));

    let activated = store
        .activate_config(owner, a.config_id)
        .await
        .expect("activate a");
    assert_eq!(activated.config_id, a.config_id);
    assert_eq!(activated.status, ConfigStatus::Active);
    let active = store.get_active_config(owner).await.expect("active a");
    assert_eq!(active.config_id, a.config_id);
    assert_eq!(active.status, ConfigStatus::Active);

    store
        .activate_config(owner, b.config_id)
        .await
        .expect("activate b");
    assert_eq!(
        store.get_active_config(owner).await.expect("active b").config_id,
        b.config_id
    );
    assert_eq!(
        store.get_config(owner, a.config_id).await.expect("get a").status,
        ConfigStatus::Inactive
    );

    store
        .deactivate_config(owner, b.config_id)
        .await
        .expect("deactivate b");
    assert!(matches!(
        store.get_active_config(owner).await,
        Err(StoreError::NotFound)
    ));
    // Deactivating an inactive record is not an error.
    store
        .deactivate_config(owner, b.config_id)
        .await
        .expect("deactivate b again");
}

pub async fn activation_is_idempotent(store: &dyn Store) {
    let owner = UserId::new_random();
    let bystander = UserId::new_random();
    let a = store
        .create_config(owner, "a", &Document::new())
        .await
        .expect("create a");
    let theirs = store
        .create_config(bystander, "a", &Document::new())
        .await
        .expect("create bystander config");
    store
        .activate_config(bystander, theirs.config_id)
        .await
        .expect("activate bystander");

    for _ in 0..2 {
        let record = store
            .activate_config(owner, a.config_id)
            .await
            .expect("activate a");
        assert_eq!(record.status, ConfigStatus::Active);
        assert_eq!(active_ids(store, owner).await, vec![a.config_id]);
    }
    assert_eq!(active_ids(store, bystander).await, vec![theirs.config_id]);
}

pub async fn failed_activation_keeps_previous_active(store: &dyn Store) {
    let owner = UserId::new_random();
    let other = UserId::new_random();
    let mine = store
        .create_config(owner, "mine", &Document::new())
        .await
        .expect("create mine");
    let foreign = store
        .create_config(other, "foreign", &Document::new())
        .await
        .expect("create foreign");
    store
        .activate_config(owner, mine.config_id)
        .await
        .expect("activate mine");
    store
        .activate_config(other, foreign.config_id)
        .await
        .expect("activate foreign");

    // Someone else's id and a random id both look missing.
    for target in [foreign.config_id, ConfigId::new_random()] {
        assert!(matches!(
            store.activate_config(owner, target).await,
            Err(StoreError::NotFound)
        ));
        assert_eq!(active_ids(store, owner).await, vec![mine.config_id]);
        assert_eq!(active_ids(store, other).await, vec![foreign.config_id]);
    }
}

pub async fn cross_owner_isolation(store: &dyn Store) {
    let first = UserId::new_random();
    let second = UserId::new_random();
    let x = store
        .create_config(first, "shared-name", &Document::new())
        .await
        .expect("create x");
    let y = store
        .create_config(second, "shared-name", &Document::new())
        .await
        .expect("create y");
    store
        .activate_config(second, y.config_id)
        .await
        .expect("activate y");

    store
        .activate_config(first, x.config_id)
        .await
        .expect("activate x");

    assert_eq!(
        store.get_active_config(second).await.expect("second active").config_id,
        y.config_id
    );
    assert_eq!(
        store.get_active_config(first).await.expect("first active").config_id,
        x.config_id
    );
    assert!(matches!(
        store.get_config(first, y.config_id).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.delete_config(first, y.config_id).await,
        Err(StoreError::NotFound)
    ));
    assert!(matches!(
        store.deactivate_config(first, y.config_id).await,
        Err(StoreError::NotFound)
    ));
    assert_eq!(active_ids(store, second).await, vec![y.config_id]);
}

pub async fn delete_active_leaves_none(store: &dyn Store) {
    let owner = UserId::new_random();
    let a = store
        .create_config(owner, "a", &Document::new())
        .await
        .expect("create a");
    let b = store
        .create_config(owner, "b", &Document::new())
        .await
        .expect("create b");
    store
        .activate_config(owner, a.config_id)
        .await
        .expect("activate a");

    store.delete_config(owner, a.config_id).await.expect("delete a");

    assert!(matches!(
        store.get_active_config(owner).await,
        Err(StoreError::NotFound)
    ));
    assert_eq!(
        store.get_config(owner, b.config_id).await.expect("get b").status,
        ConfigStatus::Inactive
    );
}

/// Interleave many activations of A and B for one owner while another owner
/// activates its own record. Afterwards exactly one of the owner's records is
/// active, it is one of the requested ids, and the other owner is untouched.
pub async fn concurrent_activations(store: Arc<dyn Store>) {
    const ROUNDS: usize = 16;

    let owner = UserId::new_random();
    let neighbour = UserId::new_random();
    let a = store
        .create_config(owner, "a", &Document::new())
        .await
        .expect("create a");
    let b = store
        .create_config(owner, "b", &Document::new())
        .await
        .expect("create b");
    let c = store
        .create_config(owner, "c", &Document::new())
        .await
        .expect("create c");
    let n = store
        .create_config(neighbour, "n", &Document::new())
        .await
        .expect("create n");

    let mut tasks = Vec::with_capacity(ROUNDS * 2 + 1);
    for round in 0..ROUNDS {
        for id in [a.config_id, b.config_id] {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                if round % 2 == 0 {
                    tokio::task::yield_now().await;
                }
                store.activate_config(owner, id).await.map(|r| r.config_id)
            }));
        }
    }
    {
        let store = Arc::clone(&store);
        let id = n.config_id;
        tasks.push(tokio::spawn(async move {
            store.activate_config(neighbour, id).await.map(|r| r.config_id)
        }));
    }

    for task in tasks {
        task.await.expect("task panicked").expect("activation failed");
    }

    let active = active_ids(store.as_ref(), owner).await;
    assert_eq!(active.len(), 1, "exactly one active record, got {active:?}");
    let winner = active[0];
    let requested: HashSet<_> = [a.config_id, b.config_id].into_iter().collect();
    assert!(requested.contains(&winner));
    assert_ne!(winner, c.config_id);
    assert_eq!(
        store.get_active_config(owner).await.expect("active").config_id,
        winner
    );
    assert_eq!(active_ids(store.as_ref(), neighbour).await, vec![n.config_id]);
}

pub async fn payload_order_preserved(store: &dyn Store) {
    let owner = UserId::new_random();
    let payload: Document = serde_json::from_str(
        r#"{"zeta": 1, "alpha": {"nested": [1, 2, 3]}, "mid": null, "x-unknown": "kept"}"#,
    )
    .expect("parse payload");

    let created = store
        .create_config(owner, "ordered", &payload)
        .await
        .expect("create");
    let fetched = store
        .get_config(owner, created.config_id)
        .await
        .expect("get");

    let keys: Vec<_> = fetched.payload.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["zeta", "alpha", "mid", "x-unknown"]);
    assert_eq!(fetched.payload, payload);
}
