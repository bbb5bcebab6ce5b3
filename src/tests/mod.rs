use std::sync::{Arc, Mutex};

use base64::Engine as _;

use crate::{
    config::MigrationConfig,
    migrate::{MigrationDriver, MigrationResult, RESULT_TTL_SECS},
    normalize::{DocumentEngine, Normalizer, Unrecognized},
    progress::{MigrationPhase, ProgressReporter, RecordStatus},
    store::{
        IdPage, RecordId, RecordQuery, RecordSink, RecordSource, ResultChannel,
        sqlite::{self, LocalDatabase},
    },
};

const ROW_PAYLOAD: &str = concat!(
    r#"a:3:{s:4:"type";s:3:"row";s:4:"attr";a:0:{}s:8:"children";a:2:{"#,
    r#"i:0;a:2:{s:4:"type";s:6:"column";s:4:"attr";a:1:{s:7:"content";s:19:"<strong>Hi</strong>";}}"#,
    r#"i:1;a:3:{s:4:"type";s:5:"image";s:4:"attr";a:1:{s:3:"src";s:20:"https://x.test/a.jpg";}s:5:"title";s:8:"Alt text";}"#,
    "}}"
);

const ROW_DOCUMENT: &str = "<p><strong>Hi</strong></p>\n\n<figure class=\"migrated-image\"><img src=\"https://x.test/a.jpg\" alt=\"Alt text\" loading=\"lazy\" decoding=\"async\" /></figure>";

const META_KEY: &str = "mfn-page-items";

fn encode(payload: &str) -> String {
    base64::engine::general_purpose::STANDARD.encode(payload)
}

async fn open() -> LocalDatabase {
    LocalDatabase::open("sqlite::memory:").await.unwrap()
}

async fn seed(db: &LocalDatabase, post_type: &str, content: &str, marker: Option<&str>) -> RecordId {
    let id = db.insert_post(post_type, "publish", content).await.unwrap();
    if let Some(marker) = marker {
        db.set_meta(id, META_KEY, Some(marker)).await.unwrap();
    }
    id
}

async fn content_of(db: &LocalDatabase, id: RecordId) -> String {
    db.client().content(id).await.unwrap().unwrap()
}

async fn migrate(db: &LocalDatabase, config: MigrationConfig) -> MigrationResult {
    MigrationDriver::new(db.client(), db.client(), config)
        .run()
        .await
}

#[tokio::test]
async fn test_row_with_column_and_image() {
    let db = open().await;
    let id = seed(&db, "page", "", Some(&encode(ROW_PAYLOAD))).await;

    let result = migrate(&db, MigrationConfig::default()).await;

    assert_eq!(content_of(&db, id).await, ROW_DOCUMENT);
    assert_eq!(
        result,
        MigrationResult {
            processed: 1,
            updated: 1,
            normalized: 1,
            ..Default::default()
        }
    );
}

#[tokio::test]
async fn test_empty_marker_is_no_data() {
    let db = open().await;
    let id = seed(&db, "post", "untouched", Some("")).await;

    let result = migrate(&db, MigrationConfig::default()).await;

    assert_eq!(result.skipped_no_meta, 1);
    assert_eq!(result.processed, 1);
    assert_eq!(result.updated, 0);
    assert_eq!(content_of(&db, id).await, "untouched");
}

#[tokio::test]
async fn test_no_overwrite_skips_before_decoding() {
    let db = open().await;
    let kept = seed(&db, "page", "<p>keep me</p>", Some("not base64!")).await;
    let blank = seed(&db, "page", "", Some(&encode(ROW_PAYLOAD))).await;
    let config = MigrationConfig {
        overwrite_nonempty: false,
        ..Default::default()
    };

    let result = migrate(&db, config).await;

    assert_eq!(result.skipped_existing, 1);
    assert_eq!(result.invalid_base64, 0);
    assert_eq!(result.updated, 1);
    assert_eq!(content_of(&db, kept).await, "<p>keep me</p>");
    assert_eq!(content_of(&db, blank).await, ROW_DOCUMENT);
}

#[tokio::test]
async fn test_bad_records_are_counted_not_written() {
    let db = open().await;
    let invalid = seed(&db, "page", "old", Some("Tjs*")).await;
    let object = seed(
        &db,
        "page",
        "old",
        Some(&encode(r#"a:1:{i:0;O:8:"Exploit":0:{}}"#)),
    )
    .await;
    let scalar = seed(&db, "page", "old", Some(&encode("i:5;"))).await;
    let empty = seed(&db, "page", "old", Some(&encode("a:0:{}"))).await;

    let result = migrate(&db, MigrationConfig::default()).await;

    assert_eq!(result.processed, 4);
    assert_eq!(result.invalid_base64, 1);
    assert_eq!(result.skipped_unrecognized, 2);
    assert_eq!(result.updated, 1);
    assert_eq!(result.normalized, 0);
    for id in [invalid, object, scalar] {
        assert_eq!(content_of(&db, id).await, "old");
    }
    assert_eq!(content_of(&db, empty).await, "");
}

#[tokio::test]
async fn test_pagination_visits_every_matching_record() {
    let db = open().await;
    let blob = encode(ROW_PAYLOAD);
    let mut ids = Vec::new();
    for post_type in ["page", "post", "template", "portfolio", "product", "page", "post"] {
        ids.push(seed(&db, post_type, "", Some(&blob)).await);
    }
    let attachment = seed(&db, "attachment", "", Some(&blob)).await;
    let unmarked = seed(&db, "page", "plain", None).await;
    let config = MigrationConfig {
        page_size: 2,
        ..Default::default()
    };

    let result = migrate(&db, config).await;

    assert_eq!(result.processed, 7);
    assert_eq!(result.updated, 7);
    for id in ids {
        assert_eq!(content_of(&db, id).await, ROW_DOCUMENT);
    }
    assert_eq!(content_of(&db, attachment).await, "");
    assert_eq!(content_of(&db, unmarked).await, "plain");
}

#[tokio::test]
async fn test_concurrent_run_matches_sequential() {
    let sequential = open().await;
    let concurrent = open().await;
    for db in [&sequential, &concurrent] {
        for marker in [
            encode(ROW_PAYLOAD),
            String::new(),
            "@@".to_owned(),
            encode("a:0:{}"),
            encode(ROW_PAYLOAD),
        ] {
            seed(db, "page", "", Some(&marker)).await;
        }
    }

    let expected = migrate(&sequential, MigrationConfig::default()).await;
    let config = MigrationConfig {
        concurrency: 4,
        page_size: 3,
        ..Default::default()
    };
    assert_eq!(migrate(&concurrent, config).await, expected);
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let db = open().await;
    let id = seed(&db, "page", "", Some(&encode(ROW_PAYLOAD))).await;

    let first = migrate(&db, MigrationConfig::default()).await;
    let after_first = content_of(&db, id).await;
    let second = migrate(&db, MigrationConfig::default()).await;

    assert_eq!(first, second);
    assert_eq!(content_of(&db, id).await, after_first);
}

/// Sink that rejects every write, like a store refusing locked records.
struct RejectingSink;

#[derive(Debug, thiserror::Error)]
#[error("record is locked")]
struct Locked;

impl RecordSink for RejectingSink {
    type Error = Locked;

    async fn update_content(&self, _id: RecordId, _content: &str) -> Result<(), Self::Error> {
        Err(Locked)
    }
}

#[tokio::test]
async fn test_update_failures_keep_five_samples() {
    let db = open().await;
    let blob = encode(ROW_PAYLOAD);
    for _ in 0..7 {
        seed(&db, "page", "old", Some(&blob)).await;
    }

    let result = MigrationDriver::new(db.client(), RejectingSink, MigrationConfig::default())
        .run()
        .await;

    assert_eq!(result.errors, 7);
    assert_eq!(result.updated, 0);
    assert_eq!(
        result.error_samples,
        (1..=5)
            .map(|id| format!("Record ID {id}: Failed to update record: record is locked"))
            .collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_sqlite_trigger_rejection_is_an_error() {
    let db = open().await;
    let blob = encode(ROW_PAYLOAD);
    let locked = seed(&db, "page", "old", Some(&blob)).await;
    let open_id = seed(&db, "page", "old", Some(&blob)).await;
    let trigger = format!(
        r#"
        CREATE TRIGGER reject_locked BEFORE UPDATE ON posts
        WHEN OLD.id = {locked}
        BEGIN
            SELECT RAISE(ABORT, 'record is locked');
        END
    "#
    );
    sqlx::query(&trigger).execute(db.pool()).await.unwrap();

    let result = migrate(&db, MigrationConfig::default()).await;

    assert_eq!(result.errors, 1);
    assert_eq!(result.updated, 1);
    assert!(
        result.error_samples[0]
            .starts_with(&format!("Record ID {locked}: Failed to update record"))
    );
    assert_eq!(content_of(&db, locked).await, "old");
    assert_eq!(content_of(&db, open_id).await, ROW_DOCUMENT);
}

/// Source whose listing always fails.
struct Unreachable;

impl RecordSource for Unreachable {
    type Error = sqlite::Error;

    async fn list_ids(
        &self,
        _query: &RecordQuery<'_>,
        _page: u32,
        _per_page: u32,
    ) -> Result<IdPage, Self::Error> {
        Err(sqlite::Error::Sqlite(sqlx::Error::PoolClosed))
    }

    async fn marker(&self, _id: RecordId, _meta_key: &str) -> Result<Option<String>, Self::Error> {
        Ok(None)
    }

    async fn content(&self, _id: RecordId) -> Result<Option<String>, Self::Error> {
        Ok(None)
    }
}

#[tokio::test]
async fn test_listing_failure_ends_run_with_error() {
    let db = open().await;
    let result = MigrationDriver::new(Unreachable, db.client(), MigrationConfig::default())
        .run()
        .await;

    assert_eq!(result.processed, 0);
    assert_eq!(result.errors, 1);
    assert!(result.error_samples[0].starts_with("Page 1: Failed to list records"));
}

#[tokio::test]
async fn test_result_is_handed_off_once() {
    let db = open().await;
    seed(&db, "page", "", Some(&encode(ROW_PAYLOAD))).await;
    let result = migrate(&db, MigrationConfig::default()).await;

    let channel = db.client();
    channel.put_result(&result, RESULT_TTL_SECS).await.unwrap();
    assert_eq!(channel.take_result().await.unwrap(), Some(result));
    assert_eq!(channel.take_result().await.unwrap(), None);
}

#[tokio::test]
async fn test_post_type_filter() {
    let db = open().await;
    let blob = encode(ROW_PAYLOAD);
    let page = seed(&db, "page", "", Some(&blob)).await;
    let product = seed(&db, "product", "", Some(&blob)).await;
    let config = MigrationConfig {
        post_types: vec!["product".into()],
        ..Default::default()
    };

    let result = migrate(&db, config).await;

    assert_eq!(result.processed, 1);
    assert_eq!(content_of(&db, page).await, "");
    assert_eq!(content_of(&db, product).await, ROW_DOCUMENT);
}

/// Engine that panics on one specific payload and normalizes the rest.
struct PanicsOn(&'static str);

impl DocumentEngine for PanicsOn {
    fn normalize_decoded(&self, bytes: &[u8]) -> Result<String, Unrecognized> {
        if bytes == self.0.as_bytes() {
            panic!("engine bug");
        }
        Normalizer::default().normalize_decoded(bytes)
    }
}

#[derive(Default)]
struct WarningLog(Mutex<Vec<String>>);

impl ProgressReporter for WarningLog {
    fn set_phase(&self, _phase: MigrationPhase) {}
    fn register_total(&self, _total: u64) {}
    fn update_record(&self, _id: RecordId, _status: RecordStatus) {}
    fn log_warn(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_owned());
    }
    fn log_error(&self, _message: &str) {}
    fn finish(&self) {}
}

#[tokio::test]
async fn test_engine_panic_is_contained_to_its_record() {
    let db = open().await;
    let poisoned = seed(&db, "page", "old", Some(&encode("a:0:{}"))).await;
    let healthy = seed(&db, "page", "old", Some(&encode(ROW_PAYLOAD))).await;
    let warnings = Arc::new(WarningLog::default());

    let result = MigrationDriver::new(db.client(), db.client(), MigrationConfig::default())
        .with_normalizer(PanicsOn("a:0:{}"))
        .with_reporter(warnings.clone())
        .run()
        .await;

    assert_eq!(result.processed, 2);
    assert_eq!(result.skipped_unrecognized, 1);
    assert_eq!(result.updated, 1);
    assert_eq!(result.errors, 0);
    assert_eq!(content_of(&db, poisoned).await, "old");
    assert_eq!(content_of(&db, healthy).await, ROW_DOCUMENT);
    assert_eq!(
        *warnings.0.lock().unwrap(),
        [format!("Record ID {poisoned}: normalization panicked")]
    );
}
