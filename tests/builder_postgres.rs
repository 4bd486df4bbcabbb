#![cfg(feature = "postgres")]

use querykit::prelude::*;
use querykit::test_utils::RecordingDriver;

#[tokio::test]
async fn or_where_numbers_placeholders_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    db.table("t")
        .where_("a", "=", 1)
        .or_where("b", "=", 2)
        .get(true)
        .await?;

    let statement = recording.last().ok_or("nothing recorded")?;
    assert_eq!(
        statement.sql,
        "SELECT \"t\".* FROM \"t\" WHERE \"t\".\"a\" = $1 OR \"t\".\"b\" = $2"
    );
    assert_eq!(statement.params, vec![RowValues::Int(1), RowValues::Int(2)]);
    Ok(())
}

#[test]
fn compiled_select_inlines_escaped_literals() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let db: &mut dyn Driver = &mut driver;
    let mut people = db.table("people");

    let sql = people
        .where_("name", "=", "O'Brien")
        .where_in("id", [3, 4])
        .get_compiled_select(true)?;
    assert_eq!(
        sql,
        "SELECT \"people\".* FROM \"people\" WHERE \"people\".\"name\" = 'O''Brien' \
         AND \"people\".\"id\" IN (3, 4)"
    );
    assert_eq!(
        people.get_compiled_select(false)?,
        "SELECT \"people\".* FROM \"people\""
    );
    Ok(())
}

#[test]
fn raw_predicates_share_the_numbering() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let db: &mut dyn Driver = &mut driver;
    let mut orders = db.table("orders");

    orders
        .where_("status", "=", "open")
        .where_raw("total > ? AND total < ?", vec![10.into(), 99.into()])
        .like("note", "rush", LikeSide::Both);
    let query = orders.fragments().compile_select()?;
    assert_eq!(
        query.query,
        "SELECT \"orders\".* FROM \"orders\" WHERE \"orders\".\"status\" = $1 \
         AND total > $2 AND total < $3 AND \"orders\".\"note\" LIKE $4 ESCAPE '!'"
    );
    assert_eq!(query.params.len(), 4);
    Ok(())
}

#[tokio::test]
async fn insert_reads_the_key_back_from_returning() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    driver.respond_rows(&["id", "name"], vec![vec![42.into(), "Ann".into()]]);
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    let result = db
        .table("users")
        .insert(Record::from([("name", "Ann")]), true)
        .await?;

    assert!(result.status);
    assert_eq!(result.insert_id, Some(RowValues::Int(42)));
    assert_eq!(
        recording.sql(),
        vec!["INSERT INTO \"users\" (\"name\") VALUES ($1) RETURNING *"]
    );
    Ok(())
}

#[tokio::test]
async fn bulk_insert_writes_in_chunks_of_one_hundred() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    let rows: Vec<Record> = (0..250).map(|n| Record::from([("n", n)])).collect();
    let result = db.table("numbers").insert_bulk(rows, true).await?;

    assert!(result.status);
    assert_eq!(result.affected_rows, 3);
    let statements = recording.statements();
    let sizes: Vec<usize> = statements.iter().map(|s| s.params.len()).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert!(statements[2].sql.ends_with("($49), ($50)"));
    assert_eq!(statements[1].params[0], RowValues::Int(100));
    Ok(())
}

#[tokio::test]
async fn upsert_updates_everything_but_key_and_exclusions() -> Result<(), Box<dyn std::error::Error>>
{
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    let row = Record::new()
        .with("id", 5)
        .with("email", "ann@example.com")
        .with("created_at", "2024-01-01");
    db.table("users")
        .upsert(row, "id", &["created_at"], true)
        .await?;

    assert_eq!(
        recording.sql(),
        vec![
            "INSERT INTO \"users\" (\"id\", \"email\", \"created_at\") VALUES ($1, $2, $3) \
             ON CONFLICT (\"id\") DO UPDATE SET \"email\" = EXCLUDED.\"email\""
        ]
    );
    Ok(())
}

#[tokio::test]
async fn bulk_update_joins_a_typed_values_list() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    driver
        .respond_rows(
            &["column_name", "data_type", "udt_name"],
            vec![
                vec!["id".into(), "integer".into(), "int4".into()],
                vec!["score".into(), "numeric".into(), "numeric".into()],
                vec!["active".into(), "boolean".into(), "bool".into()],
            ],
        )
        .respond(Ok(ResultSet::affected(2)));
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    let rows = vec![
        Record::new().with("id", 1).with("score", 10.5),
        Record::new().with("id", 2).with("score", 20.0),
    ];
    let result = db
        .table("scores")
        .where_("active", "=", true)
        .update_bulk(rows, "id", true)
        .await?;

    assert_eq!(result.affected_rows, 2);
    let statements = recording.statements();
    assert_eq!(statements.len(), 2);
    assert!(statements[0].sql.contains("WHERE table_name = $1::text"));
    assert_eq!(statements[0].params, vec![RowValues::Text("scores".into())]);
    assert_eq!(
        statements[1].sql,
        "UPDATE \"scores\" SET \"score\" = \"_u\".\"score\" \
         FROM (VALUES ($1::integer, $2::numeric), ($3::integer, $4::numeric)) AS \"_u\" (\"id\", \"score\") \
         WHERE \"scores\".\"id\" = \"_u\".\"id\" AND (\"scores\".\"active\" = $5)"
    );
    assert_eq!(
        statements[1].params,
        vec![
            RowValues::Int(1),
            RowValues::Float(10.5),
            RowValues::Int(2),
            RowValues::Float(20.0),
            RowValues::Bool(true),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn bulk_update_rejects_unknown_columns() {
    let mut driver = RecordingDriver::postgres();
    driver.respond_rows(
        &["column_name", "data_type", "udt_name"],
        vec![vec!["id".into(), "integer".into(), "int4".into()]],
    );
    let db: &mut dyn Driver = &mut driver;

    let rows = vec![Record::new().with("id", 1).with("nickname", "x")];
    let err = db.table("users").update_bulk(rows, "id", true).await.err();
    assert!(matches!(err, Some(DbError::SchemaIntrospection(_))));
}

#[tokio::test]
async fn count_reads_the_numrows_alias() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    driver.respond_rows(&["numrows"], vec![vec![RowValues::Int(12)]]);
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    let total = db
        .table("posts")
        .where_("published", "=", true)
        .order_by("id", "desc")
        .count_all_results(true)
        .await?;

    assert_eq!(total, 12);
    assert_eq!(
        recording.sql(),
        vec!["SELECT COUNT(*) AS \"numrows\" FROM \"posts\" WHERE \"posts\".\"published\" = $1"]
    );
    Ok(())
}

#[tokio::test]
async fn full_outer_join_is_available() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let db: &mut dyn Driver = &mut driver;
    let sql = db
        .table("a")
        .join("b", "a.id = b.a_id", "full outer")
        .get_compiled_select(true)?;
    assert_eq!(
        sql,
        "SELECT \"a\".* FROM \"a\" FULL OUTER JOIN \"b\" ON \"a\".\"id\" = \"b\".\"a_id\""
    );
    Ok(())
}

#[tokio::test]
async fn failed_statement_rolls_the_transaction_back_on_commit() {
    let mut driver = RecordingDriver::postgres();
    driver
        .respond(Ok(ResultSet::affected(1)))
        .respond(Err(DbError::Execution("duplicate key".into())));
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    assert!(db.trans_begin().await.is_ok());
    let ok = db.table("t").insert(Record::from([("a", 1)]), true).await;
    assert!(ok.is_ok());
    let failed = db.table("t").insert(Record::from([("a", 1)]), true).await;
    assert!(failed.is_err());
    assert_eq!(db.trans_status(), TransactionState::Failed);

    let err = db.trans_commit().await.err();
    assert!(matches!(err, Some(DbError::Transaction(_))));
    assert_eq!(db.trans_status(), TransactionState::Idle);
    assert_eq!(recording.sql().last().map(String::as_str), Some("ROLLBACK"));
}

#[tokio::test]
async fn truncate_and_empty_table_honour_the_reset_flag() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::postgres();
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;
    let mut logs = db.table("logs");
    let fresh = "SELECT \"logs\".* FROM \"logs\"";

    logs.where_("level", "=", "debug").order_by("id", "desc").set("seen", true);
    assert!(logs.truncate(true).await?);
    assert_eq!(logs.get_compiled_select(false)?, fresh);

    logs.where_("level", "=", "debug");
    assert!(logs.empty_table(false).await?);
    assert_eq!(
        logs.get_compiled_select(false)?,
        "SELECT \"logs\".* FROM \"logs\" WHERE \"logs\".\"level\" = 'debug'"
    );
    assert!(logs.empty_table(true).await?);
    assert_eq!(logs.get_compiled_select(false)?, fresh);

    assert_eq!(
        recording.sql(),
        vec![
            "TRUNCATE TABLE \"logs\"",
            "DELETE FROM \"logs\"",
            "DELETE FROM \"logs\"",
        ]
    );
    Ok(())
}
