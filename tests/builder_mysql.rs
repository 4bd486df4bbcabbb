#![cfg(feature = "mysql")]

use querykit::config::ConnectionConfig;
use querykit::prelude::*;
use querykit::test_utils::RecordingDriver;

#[test]
fn groups_keep_or_inside_parentheses() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::mysql();
    let db: &mut dyn Driver = &mut driver;
    let mut t = db.table("t");

    t.group_start()
        .where_("a", "=", 1)
        .or_where("b", "=", 2)
        .group_end()
        .where_("c", "=", 3);
    let query = t.fragments().compile_select()?;
    assert_eq!(
        query.query,
        "SELECT `t`.* FROM `t` WHERE (`t`.`a` = ? OR `t`.`b` = ?) AND `t`.`c` = ?"
    );
    assert_eq!(
        query.params,
        vec![RowValues::Int(1), RowValues::Int(2), RowValues::Int(3)]
    );
    Ok(())
}

#[tokio::test]
async fn reset_leaves_a_fresh_builder() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::mysql();
    let db: &mut dyn Driver = &mut driver;
    let mut users = db.table("users");

    users
        .select("id, email")
        .distinct()
        .join("roles r", "r.id = users.role_id", "left")
        .where_("active", "=", true)
        .group_by("email")
        .having("id", ">", 3)
        .order_by("id", "desc")
        .limit(5)
        .offset(10)
        .for_update()
        .get(true)
        .await?;

    let after_reset = users.get_compiled_select(false)?;
    let fresh = db.table("users").get_compiled_select(false)?;
    assert_eq!(after_reset, fresh);
    assert_eq!(fresh, "SELECT `users`.* FROM `users`");
    Ok(())
}

#[tokio::test]
async fn builder_errors_surface_at_the_terminal_call() {
    let mut driver = RecordingDriver::mysql();
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;
    let mut t = db.table("t");

    let err = t.where_("a", "=>", 1).get(true).await.err();
    assert!(matches!(err, Some(DbError::UnsupportedOperator(op)) if op == "=>"));
    assert!(recording.is_empty());

    let err = t.join("b", "t.id = b.id", "full").get(true).await.err();
    assert!(matches!(err, Some(DbError::UnsupportedJoinType(_))));

    let err = t.group_start().where_("a", "=", 1).get(true).await.err();
    assert!(matches!(err, Some(DbError::InvalidInput(_))));
    assert!(recording.is_empty());

    assert!(t.get(true).await.is_ok());
    assert_eq!(recording.len(), 1);
}

#[tokio::test]
async fn insert_reports_the_auto_increment_id() -> Result<(), Box<dyn std::error::Error>> {
    let mut inserted = ResultSet::affected(1);
    inserted.insert_id = Some(7);
    let mut driver = RecordingDriver::mysql();
    driver.respond(Ok(inserted));
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    let result = db
        .table("users")
        .set("visits", 0)
        .insert(Record::new().with("name", "Ann").with("age", 31), true)
        .await?;

    assert_eq!(result.insert_id, Some(RowValues::Int(7)));
    assert_eq!(db.insert_id(), Some(7));
    let statement = recording.last().ok_or("nothing recorded")?;
    assert_eq!(
        statement.sql,
        "INSERT INTO `users` (`visits`, `name`, `age`) VALUES (?, ?, ?)"
    );
    assert_eq!(
        statement.params,
        vec![RowValues::Int(0), "Ann".into(), RowValues::Int(31)]
    );
    Ok(())
}

#[tokio::test]
async fn upsert_uses_on_duplicate_key() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::mysql();
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    let rows = vec![
        Record::new().with("id", 1).with("name", "Ann"),
        Record::new().with("id", 2).with("name", "Bob"),
    ];
    db.table("users").upsert_bulk(rows, "id", &[], true).await?;

    assert_eq!(
        recording.sql(),
        vec![
            "INSERT INTO `users` (`id`, `name`) VALUES (?, ?), (?, ?) \
             ON DUPLICATE KEY UPDATE `name` = VALUES(`name`)"
        ]
    );
    Ok(())
}

#[tokio::test]
async fn bulk_update_stages_rows_in_a_temporary_table() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::mysql();
    driver.respond_rows(
        &["Field", "Type"],
        vec![
            vec!["id".into(), "int(11)".into()],
            vec!["score".into(), "decimal(6,2)".into()],
        ],
    );
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

    assert!(result.status);
    assert_eq!(
        recording.sql(),
        vec![
            "SHOW COLUMNS FROM `scores`".to_string(),
            "CREATE TEMPORARY TABLE `scores_bulk_stage` (`id` int(11), `score` decimal(6,2))"
                .to_string(),
            "INSERT INTO `scores_bulk_stage` (`id`, `score`) VALUES (?, ?), (?, ?)".to_string(),
            "UPDATE `scores` INNER JOIN `scores_bulk_stage` \
             ON `scores`.`id` = `scores_bulk_stage`.`id` \
             SET `scores`.`score` = `scores_bulk_stage`.`score` WHERE `scores`.`active` = ?"
                .to_string(),
            "DROP TEMPORARY TABLE IF EXISTS `scores_bulk_stage`".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn staging_table_is_dropped_when_the_update_fails() {
    let mut driver = RecordingDriver::mysql();
    driver
        .respond_rows(
            &["Field", "Type"],
            vec![vec!["id".into(), "int".into()], vec!["n".into(), "int".into()]],
        )
        .respond(Ok(ResultSet::affected(0)))
        .respond(Err(DbError::Execution("lock wait timeout".into())));
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;

    let rows = vec![Record::new().with("id", 1).with("n", 2)];
    let err = db.table("t").update_bulk(rows, "id", true).await.err();

    assert!(matches!(err, Some(DbError::Execution(_))));
    assert_eq!(
        recording.sql().last().map(String::as_str),
        Some("DROP TEMPORARY TABLE IF EXISTS `t_bulk_stage`")
    );
}

#[tokio::test]
async fn table_prefix_applies_once() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConnectionConfig::new("mysql", "localhost", "u", "", "db")
        .with_table_prefix("app_")
        .with_allow_truncate(false);
    let mut driver = RecordingDriver::with_config(Dialect::MySql, config);
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;
    let mut posts = db.table("posts");

    let sql = posts
        .join("app_users u", "u.id = posts.user_id", "")
        .get_compiled_select(true)?;
    assert_eq!(
        sql,
        "SELECT `app_posts`.* FROM `app_posts` INNER JOIN `app_users` AS `u` \
         ON `u`.`id` = `app_posts`.`user_id`"
    );

    assert!(posts.truncate(true).await?);
    assert_eq!(recording.sql(), vec!["DELETE FROM `app_posts`"]);
    Ok(())
}

#[tokio::test]
async fn replace_and_delete_carry_conditions() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::mysql();
    let recording = driver.recording();
    let db: &mut dyn Driver = &mut driver;
    let mut posts = db.table("posts");

    posts
        .where_("id", "<", 100)
        .replace(&[Replacement::new("body", "http://", "https://")], true)
        .await?;
    posts.where_null("author").delete(true).await?;

    assert_eq!(
        recording.sql(),
        vec![
            "UPDATE `posts` SET `body` = REPLACE(`body`, ?, ?) WHERE `posts`.`id` < ?",
            "DELETE FROM `posts` WHERE `posts`.`author` IS NULL",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn statements_are_logged_with_their_call_site() -> Result<(), Box<dyn std::error::Error>> {
    let mut driver = RecordingDriver::mysql();
    let db: &mut dyn Driver = &mut driver;

    db.table("users").where_("name", "=", "it's").get(true).await?;

    let entries = db.query_log().entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(
        entries[0].sql,
        r"SELECT `users`.* FROM `users` WHERE `users`.`name` = 'it\'s'"
    );
    assert_eq!(entries[0].call_site.as_deref(), Some("users::get"));
    Ok(())
}
