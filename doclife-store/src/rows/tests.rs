// SPDX-License-Identifier: MIT OR Apache-2.0

use doclife_core::{Row, Value};

use crate::rows::RowStore;
use crate::{Filter, MemoryStore, Transaction};

fn item_row(name: &str, idx: i64, group: &str) -> Row {
    [
        ("name", Value::from(name)),
        ("idx", Value::Int(idx)),
        ("item_group", Value::from(group)),
        ("docstatus", Value::Int(0)),
    ]
    .into_iter()
    .collect()
}

#[tokio::test]
async fn insert_get_and_update() {
    let store = MemoryStore::new();

    // 1. Inserting the same name twice is refused.
    assert!(store.insert_row("Item", item_row("WIDGET-1", 0, "All Items")).await.unwrap());
    assert!(!store.insert_row("Item", item_row("WIDGET-1", 0, "Tools")).await.unwrap());

    let row = store.get_row("Item", "WIDGET-1", false).await.unwrap().unwrap();
    assert_eq!(row.get_str("item_group"), Some("All Items"));
    assert!(store.get_row("Item", "WIDGET-2", false).await.unwrap().is_none());
    assert!(store.get_row("Customer", "WIDGET-1", false).await.unwrap().is_none());

    // 2. Updates only touch the given columns.
    let values: Row = [("item_group", "Tools")].into_iter().collect();
    assert!(store.update_row("Item", "WIDGET-1", values.clone()).await.unwrap());
    assert!(!store.update_row("Item", "WIDGET-2", values).await.unwrap());

    let row = store.get_row("Item", "WIDGET-1", true).await.unwrap().unwrap();
    assert_eq!(row.get_str("item_group"), Some("Tools"));
    assert_eq!(row.get("docstatus"), Some(&Value::Int(0)));

    // 3. Changing the name column moves the row.
    let values: Row = [("name", "WIDGET-9")].into_iter().collect();
    assert!(store.update_row("Item", "WIDGET-1", values).await.unwrap());
    assert!(store.get_row("Item", "WIDGET-1", false).await.unwrap().is_none());
    assert!(store.get_row("Item", "WIDGET-9", false).await.unwrap().is_some());
}

#[tokio::test]
async fn filter_order_and_delete() {
    let store = MemoryStore::new();
    store.insert_row("Item", item_row("C", 2, "Tools")).await.unwrap();
    store.insert_row("Item", item_row("A", 3, "Tools")).await.unwrap();
    store.insert_row("Item", item_row("B", 1, "Parts")).await.unwrap();
    store.insert_row("Item", item_row("D", 1, "Tools")).await.unwrap();

    let names: Vec<String> = store
        .get_rows("Item", &Filter::new())
        .await
        .unwrap()
        .iter()
        .map(|row| row.name().to_owned())
        .collect();
    assert_eq!(names, vec!["B", "D", "C", "A"]);

    let tools = store
        .get_rows("Item", &Filter::new().eq("item_group", "Tools"))
        .await
        .unwrap();
    assert_eq!(tools.len(), 3);

    assert_eq!(
        store
            .delete_rows("Item", &Filter::new().eq("item_group", "Tools"))
            .await
            .unwrap(),
        3
    );
    assert_eq!(store.delete_rows("Unknown", &Filter::new()).await.unwrap(), 0);
    assert_eq!(store.get_rows("Item", &Filter::new()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn singles_and_series() {
    let store = MemoryStore::new();
    assert!(store.get_single("Settings").await.unwrap().is_none());

    store
        .set_single("Settings", [("company_name", "ACME")].into_iter().collect())
        .await
        .unwrap();
    let row = store.get_single("Settings").await.unwrap().unwrap();
    assert_eq!(row.name(), "Settings");
    assert_eq!(row.get_str("company_name"), Some("ACME"));

    assert_eq!(store.next_series("SO-").await.unwrap(), 1);
    assert_eq!(store.next_series("SO-").await.unwrap(), 2);
    assert_eq!(store.next_series("PR-").await.unwrap(), 1);
}

#[tokio::test]
async fn rollback_restores_tables() {
    let store = MemoryStore::new();
    store.insert_row("Item", item_row("KEEP", 0, "Tools")).await.unwrap();

    let permit = store.begin().await.unwrap();
    assert!(store.in_transaction());
    store.insert_row("Item", item_row("DROP", 0, "Tools")).await.unwrap();
    store
        .update_row("Item", "KEEP", [("item_group", "Parts")].into_iter().collect())
        .await
        .unwrap();
    store.next_series("SO-").await.unwrap();
    store.rollback(permit).await.unwrap();
    assert!(!store.in_transaction());

    assert!(store.get_row("Item", "DROP", false).await.unwrap().is_none());
    let row = store.get_row("Item", "KEEP", false).await.unwrap().unwrap();
    assert_eq!(row.get_str("item_group"), Some("Tools"));
    assert_eq!(store.next_series("SO-").await.unwrap(), 1);

    // Committed changes stay.
    let permit = store.begin().await.unwrap();
    store.insert_row("Item", item_row("NEW", 0, "Tools")).await.unwrap();
    store.commit(permit).await.unwrap();
    assert!(store.get_row("Item", "NEW", false).await.unwrap().is_some());
}

#[tokio::test]
async fn dropped_permit_rolls_back() {
    let store = MemoryStore::new();

    let permit = store.begin().await.unwrap();
    store.insert_row("Item", item_row("ABANDONED", 0, "Tools")).await.unwrap();
    store.next_series("SO-").await.unwrap();
    drop(permit);
    assert!(!store.in_transaction());
    assert!(store.get_row("Item", "ABANDONED", false).await.unwrap().is_none());

    // The next transaction starts from a clean slate.
    let permit = store.begin().await.unwrap();
    assert_eq!(store.next_series("SO-").await.unwrap(), 1);
    store.commit(permit).await.unwrap();
    assert_eq!(store.next_series("SO-").await.unwrap(), 2);
}

#[tokio::test]
async fn transactions_are_serialized() {
    let store = MemoryStore::new();
    let permit = store.begin().await.unwrap();

    let other = store.clone();
    let handle = tokio::spawn(async move {
        let permit = other.begin().await.unwrap();
        let row = other.get_row("Item", "FIRST", true).await.unwrap();
        other.commit(permit).await.unwrap();
        row
    });

    store.insert_row("Item", item_row("FIRST", 0, "Tools")).await.unwrap();
    tokio::task::yield_now().await;
    store.commit(permit).await.unwrap();

    // The second transaction only started after the first one committed.
    assert!(handle.await.unwrap().is_some());
}
