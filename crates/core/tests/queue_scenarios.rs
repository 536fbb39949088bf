//! Print queue, casting queue, code and credential scenarios against a
//! shared store.

use std::collections::HashSet;
use std::sync::Arc;

use kiosk_core::{
    casting::{CastingAction, CastingListQuery, CastingQueue},
    config::{CredentialConfig, TasksConfig},
    locks::KeyedLocks,
    testing::fixtures,
    AccessTokenSigner, CodeGenerator, CredentialCache, KioskError, KvStore, NamespacedStore,
    PrintQueue, SqliteKvStore, TaskType, Tenant,
};

fn store() -> Arc<dyn KvStore> {
    Arc::new(SqliteKvStore::in_memory().unwrap())
}

fn casting_queue(store: Arc<dyn KvStore>) -> CastingQueue {
    CastingQueue::new(store, Tenant::none(), Arc::new(KeyedLocks::new()))
}

#[test]
fn test_duplicate_print_fails_exactly_once() {
    let queue = PrintQueue::new(store(), TaskType::StyledImage, 10);
    let task = fixtures::succeeded_image_task("No.1001");

    queue.add_task(&task, false).unwrap();
    let second = queue.add_task(&task, false);
    assert!(matches!(second, Err(KioskError::DuplicateOperation(_))));

    // Explicit override still works
    queue.add_task(&task, true).unwrap();
    assert_eq!(queue.waiting().unwrap(), 2);
}

#[test]
fn test_admission_control_and_fifo() {
    let queue = PrintQueue::new(store(), TaskType::StyledImage, 2);
    for code in ["No.1", "No.2", "No.3"] {
        queue
            .add_task(&fixtures::succeeded_image_task(code), false)
            .unwrap();
    }

    queue.set_outstanding_jobs(3).unwrap();
    assert!(queue.poll_one().unwrap().is_none());
    assert_eq!(queue.waiting().unwrap(), 3);

    queue.set_outstanding_jobs(2).unwrap();
    let order: Vec<String> = queue
        .poll_batch(3)
        .unwrap()
        .into_iter()
        .map(|item| item.name)
        .collect();
    assert_eq!(order, vec!["printing:No.1", "printing:No.2", "printing:No.3"]);
    assert!(queue.poll_one().unwrap().is_none());
}

#[test]
fn test_screen_one_at_a_time_covers_every_entry() {
    let queue = casting_queue(store());
    let m = 7;
    for i in 0..m {
        queue
            .add_entry(&fixtures::succeeded_image_task(&format!("No.{}", i)))
            .unwrap();
    }

    let mut seen = HashSet::new();
    for _ in 0..(2 * m) {
        for entry in queue.screen(TaskType::StyledImage, 1).unwrap() {
            seen.insert(entry.name);
        }
    }
    assert_eq!(seen.len(), m);
}

#[test]
fn test_delete_keeps_rotation_consistent() {
    let queue = casting_queue(store());
    for i in 0..6 {
        queue
            .add_entry(&fixtures::succeeded_image_task(&format!("No.{}", i)))
            .unwrap();
    }
    queue.screen(TaskType::StyledImage, 4).unwrap();

    for code in ["No.0", "No.5", "No.3"] {
        queue
            .operate(TaskType::StyledImage, code, CastingAction::Delete)
            .unwrap();
    }
    assert_eq!(queue.len(TaskType::StyledImage).unwrap(), 3);

    // Remaining entries keep rotating and deleted ones never come back
    let mut seen = HashSet::new();
    for _ in 0..6 {
        for entry in queue.screen(TaskType::StyledImage, 1).unwrap() {
            seen.insert(entry.name);
        }
    }
    let expected: HashSet<String> = ["casting:No.1", "casting:No.2", "casting:No.4"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn test_five_items_in_pages_of_two() {
    let queue = casting_queue(store());
    for i in 1..=5 {
        queue
            .add_entry(&fixtures::succeeded_image_task(&format!("No.{}", i)))
            .unwrap();
    }

    let mut anchor = None;
    let mut pages = Vec::new();
    for page_num in 1..=3 {
        let page = queue
            .list(
                TaskType::StyledImage,
                &CastingListQuery {
                    keyword: None,
                    score: anchor,
                    page_size: 2,
                    page_num,
                },
            )
            .unwrap();
        anchor = page.score;
        pages.push((
            page.items.iter().map(|e| e.name.clone()).collect::<Vec<_>>(),
            page.has_more,
        ));
    }

    assert_eq!(
        pages,
        vec![
            (vec!["casting:No.5".to_string(), "casting:No.4".to_string()], true),
            (vec!["casting:No.3".to_string(), "casting:No.2".to_string()], true),
            (vec!["casting:No.1".to_string()], false),
        ]
    );
}

#[tokio::test]
async fn test_hundred_concurrent_codes_are_gapless() {
    let shared = store();
    let generator = Arc::new(CodeGenerator::new(shared, &TasksConfig::default()));

    let handles: Vec<_> = (0..100)
        .map(|_| {
            let generator = generator.clone();
            tokio::task::spawn_blocking(move || generator.next_code(TaskType::StyledImage).unwrap())
        })
        .collect();

    let mut codes = HashSet::new();
    for handle in handles {
        codes.insert(handle.await.unwrap());
    }
    let expected: HashSet<String> = (1001..=1100).map(|n| format!("No.{}", n)).collect();
    assert_eq!(codes, expected);
}

#[tokio::test]
async fn test_fifty_credential_callers_share_one_token() {
    let cache = Arc::new(CredentialCache::new(
        AccessTokenSigner::new(&CredentialConfig::default()),
        store(),
    ));
    let tenant = Tenant::new("expo");

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let cache = cache.clone();
            let tenant = tenant.clone();
            tokio::spawn(async move { cache.get_latest(&tenant).await.unwrap().value })
        })
        .collect();

    let mut values = HashSet::new();
    for handle in handles {
        values.insert(handle.await.unwrap());
    }
    assert_eq!(values.len(), 1);
    assert_eq!(cache.generated_count(), 1);
}

#[test]
fn test_tenants_never_share_queues() {
    let shared = store();
    let a: Arc<dyn KvStore> = Arc::new(NamespacedStore::new(shared.clone(), Tenant::new("a")));
    let b: Arc<dyn KvStore> = Arc::new(NamespacedStore::new(shared, Tenant::new("b")));

    let queue_a = PrintQueue::new(a, TaskType::StyledImage, 10);
    let queue_b = PrintQueue::new(b, TaskType::StyledImage, 10);
    queue_a
        .add_task(&fixtures::succeeded_image_task("No.1"), false)
        .unwrap();

    assert!(queue_b.poll_one().unwrap().is_none());
    assert!(queue_b
        .add_task(&fixtures::succeeded_image_task("No.1"), false)
        .is_ok());
}
