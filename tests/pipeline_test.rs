//! End-to-end pipeline tests over in-memory queue and sink implementations

use chrono::NaiveDate;
use login_etl::load::processing_date;
use login_etl::{
    decode, EtlError, FailurePolicy, Loader, MemorySink, MemorySource, Pipeline, RunConfig, Stage,
};
use serde_json::json;

fn config() -> RunConfig {
    RunConfig::new("http://localhost:4566/000000000000", "login-queue")
}

fn login(user_id: &str, ip: Option<&str>, device_id: Option<&str>, app_version: &str) -> String {
    let mut body = json!({
        "user_id": user_id,
        "app_version": app_version,
        "device_type": "android",
        "locale": "RU",
    });
    if let Some(ip) = ip {
        body["ip"] = json!(ip);
    }
    if let Some(device_id) = device_id {
        body["device_id"] = json!(device_id);
    }
    body.to_string()
}

#[tokio::test]
async fn test_skips_invalid_message_and_loads_the_rest() {
    let source = MemorySource::from_bodies(vec![
        login("u1", Some("199.172.111.135"), Some("593-47-5928"), "2.3.0"),
        login("u2", Some("10.0.0.2"), None, "2.3.0"),
        login("u3", Some("130.111.167.54"), Some("221-36-1234"), "12.4.1"),
    ]);
    let sink = MemorySink::new();

    let before = processing_date();
    let summary = Pipeline::new(config(), source, sink.clone()).run().await.unwrap();
    let after = processing_date();

    assert_eq!(summary.received, 3);
    assert_eq!(summary.masked, 2);
    assert_eq!(summary.inserted, 2);
    assert_eq!(summary.rejected.len(), 1);
    assert!(matches!(
        summary.rejected[0],
        EtlError::MissingField { position: 2, field: "device_id" }
    ));

    let rows = sink.rows();
    assert_eq!(rows.len(), 2);

    assert_eq!(rows[0].user_id.as_deref(), Some("u1"));
    assert_eq!(rows[0].masked_ip, "MTk5LjE3Mi4xMTEuMTM1");
    assert_eq!(rows[0].masked_device_id, "NTkzLTQ3LTU5Mjg=");
    assert_eq!(rows[0].app_version, 2);

    assert_eq!(rows[1].user_id.as_deref(), Some("u3"));
    assert_eq!(decode(&rows[1].masked_ip).unwrap(), "130.111.167.54");
    assert_eq!(decode(&rows[1].masked_device_id).unwrap(), "221-36-1234");
    assert_eq!(rows[1].app_version, 12);

    for row in &rows {
        assert!(row.create_date == before || row.create_date == after);
        assert_eq!(row.locale, "RU");
    }

    assert_eq!((sink.opened(), sink.closed()), (1, 1));
}

#[tokio::test]
async fn test_empty_queue_stops_before_transform_and_load() {
    let source = MemorySource::new(Vec::new());
    let sink = MemorySink::new();

    let err = Pipeline::new(config(), source.clone(), sink.clone())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::EmptyBatch(Stage::Extract)));
    assert_eq!(source.receives(), 1);
    assert_eq!(sink.opened(), 0);
}

#[tokio::test]
async fn test_empty_queue_is_idle_when_allowed() {
    let mut config = config();
    config.allow_empty = true;
    let sink = MemorySink::new();

    let summary = Pipeline::new(config, MemorySource::new(Vec::new()), sink.clone())
        .run()
        .await
        .unwrap();

    assert!(summary.is_idle());
    assert_eq!(summary.inserted, 0);
    assert_eq!(sink.opened(), 0);
}

#[tokio::test]
async fn test_unreachable_queue_is_terminal() {
    let sink = MemorySink::new();

    let err = Pipeline::new(config(), MemorySource::unavailable("connection refused"), sink.clone())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::QueueUnavailable(_)));
    assert_eq!(err.stage(), Some(Stage::Extract));
    assert_eq!(sink.opened(), 0);
}

#[tokio::test]
async fn test_all_messages_invalid_fails_at_load_without_connecting() {
    let source = MemorySource::from_bodies(vec![
        login("u1", None, Some("d1"), "1.0"),
        "not json".to_string(),
    ]);
    let sink = MemorySink::new();

    let err = Pipeline::new(config(), source, sink.clone()).run().await.unwrap_err();

    assert!(matches!(err, EtlError::EmptyBatch(Stage::Load)));
    assert_eq!(sink.opened(), 0);
}

#[tokio::test]
async fn test_malformed_version_is_isolated_by_default() {
    let source = MemorySource::from_bodies(vec![
        login("u1", Some("1.1.1.1"), Some("d1"), "7"),
        login("u2", Some("2.2.2.2"), Some("d2"), "3.0.1"),
    ]);
    let sink = MemorySink::new();

    let summary = Pipeline::new(config(), source, sink.clone()).run().await.unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.skipped(), 1);
    assert!(matches!(
        summary.load_failures[0],
        EtlError::MalformedVersion { position: 1, .. }
    ));
    assert_eq!(sink.rows()[0].user_id.as_deref(), Some("u2"));
}

#[tokio::test]
async fn test_abort_policy_stops_at_first_bad_record() {
    let mut config = config();
    config.failure_policy = FailurePolicy::Abort;

    let source = MemorySource::from_bodies(vec![
        login("u1", Some("1.1.1.1"), Some("d1"), "1.0"),
        login("u2", Some("2.2.2.2"), Some("d2"), "7"),
        login("u3", Some("3.3.3.3"), Some("d3"), "3.0"),
    ]);
    let sink = MemorySink::new();

    let err = Pipeline::new(config, source, sink.clone()).run().await.unwrap_err();

    assert!(matches!(err, EtlError::MalformedVersion { position: 2, .. }));
    assert_eq!(sink.rows().len(), 1);
    assert_eq!((sink.opened(), sink.closed()), (1, 1));
}

#[tokio::test]
async fn test_batch_is_bounded_by_max_messages() {
    let mut config = config();
    config.max_messages = 2;

    let bodies: Vec<String> = (1..=5)
        .map(|i| login(&format!("u{}", i), Some("1.1.1.1"), Some("d"), "1.0"))
        .collect();
    let sink = MemorySink::new();

    let summary = Pipeline::new(config, MemorySource::from_bodies(bodies), sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(summary.received, 2);
    assert_eq!(sink.rows().len(), 2);
}

#[tokio::test]
async fn test_invalid_config_fails_before_receiving() {
    let mut config = config();
    config.max_messages = 0;
    let source = MemorySource::from_bodies(vec![login("u1", Some("1.1.1.1"), Some("d"), "1.0")]);

    let err = Pipeline::new(config, source.clone(), MemorySink::new())
        .run()
        .await
        .unwrap_err();

    assert!(matches!(err, EtlError::Config(_)));
    assert_eq!(source.receives(), 0);
}

#[tokio::test]
async fn test_create_date_comes_from_the_loader_clock() {
    fn frozen() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 31).unwrap()
    }

    let mut body: serde_json::Value =
        serde_json::from_str(&login("u1", Some("1.1.1.1"), Some("d"), "1.0")).unwrap();
    body["create_date"] = json!("1999-12-31");

    let sink = MemorySink::new();
    let loader = Loader::new(sink.clone(), FailurePolicy::Isolate).with_clock(frozen);
    let source = MemorySource::from_bodies(vec![body.to_string()]);

    Pipeline::with_loader(config(), source, loader).run().await.unwrap();

    assert_eq!(sink.rows()[0].create_date, frozen());
}
