use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use querykit::config::{ConnectionConfig, DatabaseConfig};
use querykit::prelude::*;
use querykit::test_utils::RecordingDriver;

fn recording_registry(opened: Arc<AtomicUsize>) -> ConnectionRegistry {
    let config = DatabaseConfig::single(ConnectionConfig::new(
        "recording", "localhost", "app", "", "app",
    ))
    .with_connection(
        "reports",
        ConnectionConfig::new("recording", "replica", "ro", "", "app").with_table_prefix("rpt_"),
    );
    let mut registry = ConnectionRegistry::new(config);
    registry.register_factory("recording", move |config, _log| {
        let opened = Arc::clone(&opened);
        async move {
            opened.fetch_add(1, Ordering::SeqCst);
            let driver = RecordingDriver::with_config(Dialect::Postgres, config);
            Ok(Box::new(driver) as Box<dyn Driver>)
        }
    });
    registry
}

#[tokio::test]
async fn connections_open_once_and_are_reused() -> Result<(), Box<dyn std::error::Error>> {
    let opened = Arc::new(AtomicUsize::new(0));
    let mut registry = recording_registry(Arc::clone(&opened));

    registry.connect(None).await?;
    let db = registry.connect(Some("default")).await?;
    let sql = db.table("users").get_compiled_select(true)?;
    assert_eq!(sql, "SELECT \"users\".* FROM \"users\"");
    assert_eq!(opened.load(Ordering::SeqCst), 1);

    let reports = registry.connect(Some("reports")).await?;
    assert_eq!(reports.config().hostname, "replica");
    let sql = reports.table("daily").get_compiled_select(true)?;
    assert_eq!(sql, "SELECT \"rpt_daily\".* FROM \"rpt_daily\"");
    assert_eq!(opened.load(Ordering::SeqCst), 2);
    assert!(registry.is_connected("reports"));
    Ok(())
}

#[tokio::test]
async fn disconnected_drivers_are_reopened() -> Result<(), Box<dyn std::error::Error>> {
    let opened = Arc::new(AtomicUsize::new(0));
    let mut registry = recording_registry(Arc::clone(&opened));

    registry.connect(None).await?.disconnect().await;
    assert!(!registry.is_connected("default"));
    registry.connect(None).await?;
    assert_eq!(opened.load(Ordering::SeqCst), 2);

    assert!(registry.disconnect("default").await);
    assert!(!registry.disconnect("default").await);

    registry.connect(None).await?;
    registry.connect(Some("reports")).await?;
    assert_eq!(registry.disconnect_all().await, 2);
    assert!(!registry.is_connected("reports"));
    Ok(())
}

#[tokio::test]
async fn incomplete_config_is_rejected_before_connecting() {
    let opened = Arc::new(AtomicUsize::new(0));
    let config = DatabaseConfig::single(ConnectionConfig::new("recording", "", "app", "", "app"));
    let mut registry = ConnectionRegistry::new(config);
    let counter = Arc::clone(&opened);
    registry.register_factory("recording", move |config, _log| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move {
            let driver = RecordingDriver::with_config(Dialect::MySql, config);
            Ok(Box::new(driver) as Box<dyn Driver>)
        }
    });

    let err = registry.connect(None).await.err();
    assert!(matches!(err, Some(DbError::Config(_))));
    assert_eq!(opened.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn shared_registry_serves_tasks() -> Result<(), Box<dyn std::error::Error>> {
    let opened = Arc::new(AtomicUsize::new(0));
    let shared = recording_registry(Arc::clone(&opened)).shared();

    let mut handles = Vec::new();
    for n in 0..4 {
        let shared = Arc::clone(&shared);
        handles.push(tokio::spawn(async move {
            let mut registry = shared.lock().await;
            let db = registry.connect(None).await?;
            db.table("jobs").where_("id", "=", n).get(true).await.map(|_| ())
        }));
    }
    for handle in handles {
        handle.await??;
    }
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    Ok(())
}
