#[cfg(test)]
mod store_tests {
    use std::sync::Arc;

    use agency_quote_server::db::store::{
        Collection, Filter, RecordStore, SqliteRecordStore, StoreError, StoredRecord,
    };
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        owner: String,
        text: String,
    }

    fn note(id: &str, owner: &str, text: &str) -> Note {
        Note {
            id: id.to_string(),
            owner: owner.to_string(),
            text: text.to_string(),
        }
    }

    async fn notes() -> Collection {
        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::in_memory().await.unwrap());
        Collection::open(store, "notes").await.unwrap()
    }

    #[tokio::test]
    async fn test_collection_creation_is_idempotent() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.get_or_create_collection("notes").await.unwrap();
        store.get_or_create_collection("notes").await.unwrap();
        assert!(matches!(
            store.get_or_create_collection("Notes!").await,
            Err(StoreError::InvalidCollection(_))
        ));
    }

    #[tokio::test]
    async fn test_find_filters_on_fields_in_insertion_order() {
        let notes = notes().await;
        notes.insert("n1", &note("n1", "alice", "first")).await.unwrap();
        notes.insert("n2", &note("n2", "bob", "second")).await.unwrap();
        notes.insert("n3", &note("n3", "alice", "third")).await.unwrap();

        let alice: Vec<Note> = notes
            .find::<Note>(&Filter::new().eq("owner", "alice"))
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.record)
            .collect();
        assert_eq!(alice, vec![note("n1", "alice", "first"), note("n3", "alice", "third")]);

        let one = notes.find_one::<Note>(&Filter::by_id("n2")).await.unwrap().unwrap();
        assert_eq!(one.version, 1);
        assert_eq!(one.record.owner, "bob");

        assert!(notes
            .find_one::<Note>(&Filter::by_id("missing"))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_duplicate_key_is_rejected() {
        let notes = notes().await;
        notes.insert("n1", &note("n1", "alice", "first")).await.unwrap();

        let err = notes.insert("n1", &note("n1", "bob", "again")).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateKey { ref id, .. } if id == "n1"));

        let all = notes.find::<Note>(&Filter::new()).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record.owner, "alice");
    }

    #[tokio::test]
    async fn test_delete_then_reinsert_bumps_version() {
        let notes = notes().await;
        notes.insert("n1", &note("n1", "alice", "draft")).await.unwrap();

        let version = notes
            .delete_then_reinsert("n1", 1, &note("n1", "alice", "final"))
            .await
            .unwrap();
        assert_eq!(version, 2);

        let stored = notes.find_one::<Note>(&Filter::by_id("n1")).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.record.text, "final");
    }

    #[tokio::test]
    async fn test_stale_version_is_a_conflict_and_keeps_the_record() {
        let notes = notes().await;
        notes.insert("n1", &note("n1", "alice", "v1")).await.unwrap();
        notes
            .delete_then_reinsert("n1", 1, &note("n1", "alice", "v2"))
            .await
            .unwrap();

        let err = notes
            .delete_then_reinsert("n1", 1, &note("n1", "alice", "lost update"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { expected: 1, .. }));

        let stored = notes.find::<Note>(&Filter::by_id("n1")).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].record.text, "v2");
    }

    #[tokio::test]
    async fn test_reinsert_of_missing_record_is_not_found() {
        let notes = notes().await;
        let err = notes
            .delete_then_reinsert("ghost", 1, &note("ghost", "nobody", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(notes.find::<Note>(&Filter::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_reports_count() {
        let notes = notes().await;
        notes.insert("n1", &note("n1", "alice", "a")).await.unwrap();
        notes.insert("n2", &note("n2", "alice", "b")).await.unwrap();
        notes.insert("n3", &note("n3", "bob", "c")).await.unwrap();

        assert_eq!(notes.delete(&Filter::new().eq("owner", "alice")).await.unwrap(), 2);
        assert_eq!(notes.delete(&Filter::by_id("n1")).await.unwrap(), 0);
        assert_eq!(notes.find::<Note>(&Filter::new()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_raw_records_round_trip_json() {
        let store = SqliteRecordStore::in_memory().await.unwrap();
        store.get_or_create_collection("raw").await.unwrap();
        store
            .insert(
                "raw",
                StoredRecord {
                    id: "r1".to_string(),
                    version: 1,
                    body: json!({"id": "r1", "nested": {"a": [1, 2]}, "flag": true}),
                },
            )
            .await
            .unwrap();

        let found = store
            .find("raw", &Filter::new().eq("flag", true))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].body["nested"]["a"][1], 2);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists_across_connections() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("records.db").display());

        {
            let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::connect(&url).await.unwrap());
            let notes = Collection::open(store.clone(), "notes").await.unwrap();
            notes.insert("n1", &note("n1", "alice", "kept")).await.unwrap();
            store.close().await;
        }

        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::connect(&url).await.unwrap());
        let notes = Collection::open(store, "notes").await.unwrap();
        let stored = notes.find_one::<Note>(&Filter::by_id("n1")).await.unwrap().unwrap();
        assert_eq!(stored.record.text, "kept");
    }
}
