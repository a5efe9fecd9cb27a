//! End-to-end tests against a real SQLite database: builders, CRUD entry
//! points, limit emulation, and transaction visibility.

use serde::Deserialize;
use sqlrelay_core::{DataType, DbError, Field, Value};
use sqlrelay_driver_sqlite::SqliteDriver;
use sqlrelay_engine::{BatchConfig, ConnectionConfig, DB};
use std::sync::Arc;

async fn open_db(dir: &tempfile::TempDir) -> DB {
    let path = dir.path().join("e2e.db");
    let config = ConnectionConfig::new(Arc::new(SqliteDriver::new()), path.to_string_lossy());
    DB::new(config).await.expect("sqlite must open")
}

async fn create_user_table(db: &DB) {
    let mut tb = sqlrelay_builder::create_table("user");
    tb.set_dialect(db.dialect());
    tb.if_not_exists();
    tb.column([
        Field::new("id", DataType::Int64).primary_key().auto_increment(),
        Field::new("username", DataType::String).size(100),
        Field::new("age", DataType::Int32),
        Field::new("status", DataType::Int32),
    ]);
    db.exec_builder(&tb).await.expect("create table");
}

#[derive(Debug, Deserialize, PartialEq)]
struct User {
    id: i64,
    username: String,
    age: i64,
    status: i64,
}

#[derive(serde::Serialize)]
struct NewUser<'a> {
    username: &'a str,
    age: i64,
    status: i64,
}

async fn seed(db: &DB) {
    for (name, age) in [("ada", 36), ("bob", 17), ("cleo", 28), ("dan", 45)] {
        db.insert("user", &NewUser {
            username: name,
            age,
            status: 0,
        })
        .await
        .expect("seed insert");
    }
}

#[tokio::test]
async fn insert_find_update_delete_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;

    let id = db
        .insert("user", &NewUser {
            username: "ada",
            age: 36,
            status: 0,
        })
        .await
        .unwrap();
    assert_eq!(id, 1);

    let user: User = db
        .find_one_as("user", |b| {
            let w = b.cond.eq("username", "ada");
            b.and_where(w);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(user.username, "ada");
    assert_eq!(user.age, 36);

    let affected = db
        .update("user", &serde_json::json!({"age": 37}), |b| {
            let w = b.cond.eq("id", id);
            b.and_where(w);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let affected = db
        .delete("user", |b| {
            let w = b.cond.eq("id", id);
            b.and_where(w);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let err = db
        .find_one("user", |b| {
            let w = b.cond.eq("id", id);
            b.and_where(w);
            Ok(())
        })
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::NotFound));
}

#[tokio::test]
async fn find_all_with_conditions() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;
    seed(&db).await;

    let adults = db
        .find_all("user", |b| {
            let w = b.cond.ge("age", 18);
            b.and_where(w);
            b.order_by(["age"]).asc();
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(adults.len(), 3);
    assert_eq!(adults[0]["username"], Value::String("cleo".into()));

    let typed: Vec<User> = db
        .find_as("user", |b| {
            let w = b.cond.like("username", "%a%");
            b.and_where(w);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(typed.len(), 2); // ada, dan
}

#[tokio::test]
async fn update_with_limit_uses_id_subquery() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;
    seed(&db).await;

    // SQLite has no native UPDATE … LIMIT; the builder rewrites through an
    // id sub-query, so only 2 rows may change
    let affected = db
        .update("user", &serde_json::json!({"status": 1}), |b| {
            let w = b.cond.eq("status", 0);
            b.and_where(w);
            b.order_by(["id"]).asc().limit(2);
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(affected, 2);

    let flagged = db
        .find_all("user", |b| {
            let w = b.cond.eq("status", 1);
            b.and_where(w);
            b.order_by(["id"]).asc();
            Ok(())
        })
        .await
        .unwrap();
    assert_eq!(flagged.len(), 2);
    assert_eq!(flagged[0]["username"], Value::String("ada".into()));
    assert_eq!(flagged[1]["username"], Value::String("bob".into()));
}

#[tokio::test]
async fn pages_totals_ignore_pagination() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;
    seed(&db).await;

    let (list, pages) = db
        .pages("user", 1, 3, |b| {
            let w = b.cond.ge("age", 18);
            b.and_where(w);
            b.order_by(["id"]).asc();
            Ok(())
        })
        .await
        .unwrap();

    assert_eq!(list.len(), 3);
    assert_eq!(pages.total, 3);
    assert_eq!(pages.count, 1);
    assert_eq!(pages.curpage, 1);

    let (list, pages) = db.pages("user", 2, 3, |_| Ok(())).await.unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(pages.total, 4);
    assert_eq!(pages.count, 2);
}

#[tokio::test]
async fn failed_transaction_leaves_no_rows_behind() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;

    let result = db
        .transaction::<(), _>(|tx| {
            Box::pin(async move {
                tx.insert("user", &NewUser {
                    username: "ghost",
                    age: 99,
                    status: 0,
                })
                .await?;
                Err(DbError::Exception("abort".into()))
            })
        })
        .await;
    assert!(result.is_err());

    // no rows written inside the callback are observable afterwards
    let rows = db.find_all("user", |_| Ok(())).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn committed_transaction_persists() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;

    db.transaction(|tx| {
        Box::pin(async move {
            tx.insert("user", &NewUser {
                username: "kept",
                age: 20,
                status: 0,
            })
            .await?;
            Ok(())
        })
    })
    .await
    .unwrap();

    let rows = db.find_all("user", |_| Ok(())).await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn batch_insert_returns_each_id() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;

    let rows = vec![
        serde_json::json!({"username": "u1", "age": 1, "status": 0}),
        serde_json::json!({"username": "u2", "age": 2, "status": 0}),
        serde_json::json!({"username": "u3", "age": 3, "status": 0}),
    ];
    let ids = db
        .batch_insert("user", &rows, BatchConfig::default())
        .await
        .unwrap();
    assert_eq!(ids, vec![1, 2, 3]);

    // inferred mode reconstructs the same ids from the last rowid
    let more = vec![
        serde_json::json!({"username": "u4", "age": 4, "status": 0}),
        serde_json::json!({"username": "u5", "age": 5, "status": 0}),
    ];
    let ids = db
        .batch_insert(
            "user",
            &more,
            BatchConfig {
                max_batch: 10,
                infer_ids: true,
            },
        )
        .await
        .unwrap();
    assert_eq!(ids, vec![4, 5]);
}

#[tokio::test]
async fn has_table_and_columns_probe() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;

    assert!(db.has_table("user").await.unwrap());
    assert!(!db.has_table("missing").await.unwrap());

    let columns = db.get_columns("user").await.unwrap();
    assert!(columns.contains_key("username"));
    assert_eq!(columns["age"], "integer");
}

#[tokio::test]
async fn raw_sql_query_to_typed_records() {
    let dir = tempfile::tempdir().unwrap();
    let db = open_db(&dir).await;
    create_user_table(&db).await;
    seed(&db).await;

    let users: Vec<User> = db
        .query_to("SELECT * FROM user WHERE age >= ? ORDER BY id", &[Value::from(18)])
        .await
        .unwrap();
    assert_eq!(users.len(), 3);
    assert_eq!(users[0].username, "ada");
}
