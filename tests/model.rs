#![cfg(feature = "postgres")]

use std::sync::{Arc, Mutex};

use querykit::prelude::*;
use querykit::test_utils::RecordingDriver;

fn users() -> ModelConfig {
    ModelConfig::new("users").with_allowed_fields(["name", "age"])
}

#[tokio::test]
async fn finds_skip_soft_deleted_rows() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_soft_deletes(true))?;

    model.find(5).await?;
    model.find_all(Some(10), None).await?;
    model.first().await?;
    model.with_deleted().find_all(None, None).await?;
    model.only_deleted().find_many([1, 2]).await?;
    model.find_all(None, None).await?;

    assert_eq!(
        recording.sql(),
        vec![
            "SELECT \"users\".* FROM \"users\" WHERE \"users\".\"id\" = $1 \
             AND \"users\".\"deleted_at\" IS NULL",
            "SELECT \"users\".* FROM \"users\" WHERE \"users\".\"deleted_at\" IS NULL LIMIT 10",
            "SELECT \"users\".* FROM \"users\" WHERE \"users\".\"deleted_at\" IS NULL \
             ORDER BY \"users\".\"id\" ASC LIMIT 1",
            "SELECT \"users\".* FROM \"users\"",
            "SELECT \"users\".* FROM \"users\" WHERE \"users\".\"id\" IN ($1, $2) \
             AND \"users\".\"deleted_at\" IS NOT NULL",
            "SELECT \"users\".* FROM \"users\" WHERE \"users\".\"deleted_at\" IS NULL",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn caller_conditions_are_grouped_before_the_soft_delete_filter()
-> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_soft_deletes(true))?;

    model
        .where_("name", "=", "ann")
        .or_like("name", "bob", LikeSide::After)
        .order_by("age", "DESC")
        .find_all(None, None)
        .await?;

    let statement = recording.last().ok_or("nothing recorded")?;
    assert_eq!(
        statement.sql,
        "SELECT \"users\".* FROM \"users\" WHERE (\"users\".\"name\" = $1 \
         OR \"users\".\"name\" LIKE $2 ESCAPE '!') AND \"users\".\"deleted_at\" IS NULL \
         ORDER BY \"users\".\"age\" DESC"
    );
    assert_eq!(statement.params, vec!["ann".into(), RowValues::Text("bob%".into())]);
    Ok(())
}

#[tokio::test]
async fn explicit_groups_are_not_wrapped_again() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_soft_deletes(true))?;

    model
        .group_start()
        .where_("age", ">", 18)
        .group_end()
        .find_all(None, None)
        .await?;

    assert_eq!(
        recording.sql(),
        vec![
            "SELECT \"users\".* FROM \"users\" WHERE (\"users\".\"age\" > $1) \
             AND \"users\".\"deleted_at\" IS NULL"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn or_after_a_closed_group_keeps_the_filter_on_every_branch()
-> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_soft_deletes(true))?;

    model
        .group_start()
        .where_("age", ">", 18)
        .group_end()
        .or_where("name", "=", "ann")
        .find_all(None, None)
        .await?;

    assert_eq!(
        recording.sql(),
        vec![
            "SELECT \"users\".* FROM \"users\" WHERE ((\"users\".\"age\" > $1) \
             OR (\"users\".\"name\" = $2)) AND \"users\".\"deleted_at\" IS NULL"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn delete_stamps_and_purge_removes() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_soft_deletes(true))?;

    let deleted = model.delete(vec![3.into()]).await?;
    assert!(deleted.status);
    model.purge(vec![3.into()]).await?;
    model.purge_deleted().await?;

    let statements = recording.statements();
    assert_eq!(
        statements[0].sql,
        "UPDATE \"users\" SET \"deleted_at\" = $1 WHERE \"users\".\"id\" IN ($2)"
    );
    assert!(matches!(statements[0].params[0], RowValues::Timestamp(_)));
    assert_eq!(statements[0].params[1], RowValues::Int(3));
    assert_eq!(
        statements[1].sql,
        "DELETE FROM \"users\" WHERE \"users\".\"id\" IN ($1)"
    );
    assert_eq!(
        statements[2].sql,
        "DELETE FROM \"users\" WHERE \"users\".\"deleted_at\" IS NOT NULL"
    );
    Ok(())
}

#[tokio::test]
async fn delete_needs_ids_or_conditions() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users())?;

    let err = model.delete(Vec::new()).await.err();
    assert!(matches!(err, Some(DbError::InvalidInput(_))));
    assert!(recording.is_empty());

    model.where_("age", "<", 13).delete(Vec::new()).await?;
    assert_eq!(
        recording.sql(),
        vec!["DELETE FROM \"users\" WHERE (\"users\".\"age\" < $1)"]
    );
    Ok(())
}

#[tokio::test]
async fn insert_keeps_allowed_fields_and_adds_timestamps() -> Result<(), Box<dyn std::error::Error>>
{
    let mut driver = RecordingDriver::postgres();
    driver.respond_rows(&["id", "name"], vec![vec![9.into(), "Ann".into()]]);
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_timestamps(true))?;

    let row = Record::new()
        .with("name", "Ann")
        .with("age", 31)
        .with("extra", "dropped")
        .with("id", 100);
    let result = model.insert(row).await?;

    assert_eq!(result.insert_id, Some(RowValues::Int(9)));
    assert_eq!(result.affected_rows, 1);
    let statement = recording.last().ok_or("nothing recorded")?;
    assert_eq!(
        statement.sql,
        "INSERT INTO \"users\" (\"name\", \"age\", \"created_at\", \"updated_at\") \
         VALUES ($1, $2, $3, $4) RETURNING *"
    );
    assert_eq!(statement.params[..2], ["Ann".into(), RowValues::Int(31)]);
    assert!(matches!(statement.params[2], RowValues::Timestamp(_)));
    assert_eq!(statement.params[2], statement.params[3]);
    Ok(())
}

#[tokio::test]
async fn nothing_is_writable_without_an_allow_list() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, ModelConfig::new("users"))?;

    let err = model.insert(Record::from([("name", "Ann")])).await.err();
    assert!(matches!(err, Some(DbError::InvalidInput(_))));
    assert!(recording.is_empty());

    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let open = ModelConfig::new("users").with_protect_fields(false);
    let mut model = Model::new(&mut driver, open)?;
    model.insert(Record::from([("anything", "goes")])).await?;
    assert_eq!(recording.len(), 1);
    Ok(())
}

#[tokio::test]
async fn update_filters_by_ids_and_scope() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let config = users().with_timestamps(true).with_soft_deletes(true);
    let mut model = Model::new(&mut driver, config)?;

    model
        .update(vec![1.into()], Record::new().with("name", "Bo").with("id", 99))
        .await?;

    let statement = recording.last().ok_or("nothing recorded")?;
    assert_eq!(
        statement.sql,
        "UPDATE \"users\" SET \"name\" = $1, \"updated_at\" = $2 \
         WHERE \"users\".\"id\" IN ($3) AND \"users\".\"deleted_at\" IS NULL"
    );
    assert_eq!(statement.params[2], RowValues::Int(1));

    let err = model
        .update(Vec::new(), Record::from([("name", "everyone")]))
        .await
        .err();
    assert!(matches!(err, Some(DbError::InvalidInput(_))));
    Ok(())
}

#[tokio::test]
async fn upsert_never_overwrites_the_created_stamp() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_timestamps(true))?;

    model
        .upsert(Record::new().with("id", 4).with("name", "Cy"))
        .await?;

    assert_eq!(
        recording.sql(),
        vec![
            "INSERT INTO \"users\" (\"id\", \"name\", \"created_at\", \"updated_at\") \
             VALUES ($1, $2, $3, $4) ON CONFLICT (\"id\") DO UPDATE SET \
             \"name\" = EXCLUDED.\"name\", \"updated_at\" = EXCLUDED.\"updated_at\""
        ]
    );
    Ok(())
}

#[tokio::test]
async fn save_routes_on_the_primary_key() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users())?;

    model.save(Record::new().with("id", 4).with("name", "Di")).await?;
    model
        .save(Record::new().with("id", RowValues::Null).with("name", "Ed"))
        .await?;
    model
        .save(vec![
            Record::new().with("id", 1).with("name", "Fi"),
            Record::new().with("id", 2).with("name", "Gus"),
        ])
        .await?;

    assert_eq!(
        recording.sql(),
        vec![
            "UPDATE \"users\" SET \"name\" = $1 WHERE \"users\".\"id\" IN ($2)",
            "INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING *",
            "INSERT INTO \"users\" (\"id\", \"name\") VALUES ($1, $2), ($3, $4) \
             ON CONFLICT (\"id\") DO UPDATE SET \"name\" = EXCLUDED.\"name\"",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn callbacks_rewrite_data_and_observe_results() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    driver.respond_rows(&["id"], vec![vec![21.into()]]);
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users())?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    model
        .on(ModelEvent::BeforeInsert, |mut event| {
            if let Some(Payload::Single(record)) = event.data.as_mut() {
                record.set("name", "ANN");
            }
            Ok(event)
        })
        .on(ModelEvent::AfterInsert, move |event| {
            if let Ok(mut seen) = sink.lock() {
                seen.push((event.method, event.insert_id.clone()));
            }
            Ok(event)
        });

    model.insert(Record::from([("name", "ann")])).await?;

    let statement = recording.last().ok_or("nothing recorded")?;
    assert_eq!(statement.params, vec![RowValues::Text("ANN".into())]);
    let seen = seen.lock().map_err(|e| e.to_string())?.clone();
    assert_eq!(seen, vec![("insert", Some(RowValues::Int(21)))]);
    Ok(())
}

#[tokio::test]
async fn before_find_can_answer_without_a_query() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users())?;

    let cached = ResultSet::from_rows(&["id"], vec![vec![1.into()], vec![2.into()]]);
    model.on(ModelEvent::BeforeFind, move |mut event| {
        event.rows = Some(cached.results.clone());
        Ok(event)
    });

    let rows = model.find_all(None, None).await?;
    assert_eq!(rows.len(), 2);
    assert!(recording.is_empty());
    Ok(())
}

#[tokio::test]
async fn failing_callback_aborts_the_write() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users())?;
    model.on(ModelEvent::BeforeDelete, |_| {
        Err(DbError::InvalidInput("rows are archived, not deleted".into()))
    });

    let err = model.delete(vec![1.into()]).await.err();
    assert!(matches!(err, Some(DbError::InvalidInput(_))));
    assert!(recording.is_empty());

    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_callbacks(false))?;
    model.on(ModelEvent::BeforeDelete, |_| {
        Err(DbError::InvalidInput("never runs".into()))
    });
    model.delete(vec![1.into()]).await?;
    assert_eq!(recording.len(), 1);
    Ok(())
}

#[tokio::test]
async fn raw_reads_are_refused_through_the_model() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users())?;

    let err = model.call(BuilderCall::GetRowArray).err();
    match err {
        Some(DbError::UnsupportedMethod(message)) => assert!(message.contains("first")),
        other => panic!("expected UnsupportedMethod, got {other:?}"),
    }
    assert!(model.call(BuilderCall::UpdateBulk).is_err());

    model
        .call(BuilderCall::WhereBetween {
            column: "age".into(),
            low: 20.into(),
            high: 30.into(),
        })?
        .call(BuilderCall::Limit(2))?;
    model.find_all(None, None).await?;
    assert_eq!(
        recording.sql(),
        vec!["SELECT \"users\".* FROM \"users\" WHERE (\"users\".\"age\" BETWEEN $1 AND $2) LIMIT 2"]
    );
    Ok(())
}

#[tokio::test]
async fn count_and_column_reads() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    driver
        .respond_rows(&["numrows"], vec![vec![RowValues::Int(3)]])
        .respond_rows(&["name"], vec![vec!["a".into()], vec!["b".into()]]);
    let recording = driver.recording();
    let mut model = Model::new(&mut driver, users().with_soft_deletes(true))?;

    assert_eq!(model.count_all().await?, 3);
    assert_eq!(model.find_column("name").await?, vec![RowValues::Text("a".into()), RowValues::Text("b".into())]);
    assert_eq!(
        recording.sql(),
        vec![
            "SELECT COUNT(*) AS \"numrows\" FROM \"users\" WHERE \"users\".\"deleted_at\" IS NULL",
            "SELECT \"users\".\"name\" FROM \"users\" WHERE \"users\".\"deleted_at\" IS NULL",
        ]
    );
    Ok(())
}
