//! End-to-end checks against a real Postgres, via `testcontainers`. Only
//! compiled with `--features test-postgres` since it needs a Docker daemon.

#![cfg(feature = "test-postgres")]

use std::collections::BTreeMap;

use squel::exec::{RunContext, run};
use squel::expr::Expr;
use squel::shortcuts::{
    self, ConflictTarget, InsertOptions, InsertRows, Lateral, SelectMode, SelectOptions,
    UpsertOptions, Where, insert, select, select_exactly_one, select_one, upsert,
};
use testcontainers::ImageExt;
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::postgres::Postgres;
use tokio_postgres::NoTls;

async fn create_postgres_container() -> (testcontainers::ContainerAsync<Postgres>, tokio_postgres::Client) {
    // Surface the `on_query`/`on_result` tracing events `TracingListeners`
    // emits so a failing run is diagnosable from test output.
    let _ = tracing_subscriber::fmt().with_env_filter("squel=debug").try_init();

    let container =
        Postgres::default().with_tag("18").start().await.expect("failed to start postgres container");

    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(5432).await.unwrap();
    let connection_string =
        format!("host={host} port={port} user=postgres password=postgres dbname=postgres");

    let (client, connection) = tokio_postgres::connect(&connection_string, NoTls)
        .await
        .expect("failed to connect to postgres");

    tokio::spawn(async move {
        if let Err(e) = connection.await {
            eprintln!("connection error: {e}");
        }
    });

    (container, client)
}

fn row(pairs: &[(&str, Expr)]) -> BTreeMap<String, Expr> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

#[tokio::test]
async fn insert_and_select_round_trip() {
    let (_container, client) = create_postgres_container().await;
    client
        .execute(
            "CREATE TABLE squel_test_user (id BIGSERIAL PRIMARY KEY, email TEXT NOT NULL, bio TEXT)",
            &[],
        )
        .await
        .expect("create table");

    let ctx = RunContext::default();

    let inserted = insert(
        "squel_test_user",
        InsertRows::Single(row(&[("email", Expr::param("a@b.com"))])),
        InsertOptions::default(),
    );
    let inserted = run(&inserted, &client, &ctx, false).await.expect("insert");
    let id = inserted["id"].as_i64().expect("id in result");
    assert_eq!(inserted["email"], serde_json::json!("a@b.com"));

    let mut pred = BTreeMap::new();
    pred.insert("id".to_string(), Expr::param(id));
    let fetched = select_exactly_one("squel_test_user", Where::Predicate(pred), SelectOptions::default());
    let fetched = run(&fetched, &client, &ctx, false).await.expect("select");
    assert_eq!(fetched["email"], serde_json::json!("a@b.com"));
}

#[tokio::test]
async fn upsert_updates_on_conflict() {
    let (_container, client) = create_postgres_container().await;
    client
        .execute(
            "CREATE TABLE squel_test_account (email TEXT PRIMARY KEY, logins BIGINT NOT NULL)",
            &[],
        )
        .await
        .expect("create table");

    let ctx = RunContext::default();

    let first = upsert(
        "squel_test_account",
        InsertRows::Single(row(&[("email", Expr::param("a@b.com")), ("logins", Expr::param(1i64))])),
        ConflictTarget::Column("email".to_string()),
        UpsertOptions::default(),
    );
    run(&first, &client, &ctx, false).await.expect("first upsert");

    let second = upsert(
        "squel_test_account",
        InsertRows::Single(row(&[("email", Expr::param("a@b.com")), ("logins", Expr::param(2i64))])),
        ConflictTarget::Column("email".to_string()),
        UpsertOptions::default(),
    );
    let result = run(&second, &client, &ctx, false).await.expect("second upsert");
    assert_eq!(result["logins"], serde_json::json!(2));
    assert_eq!(result["$action"], serde_json::json!("UPDATE"));
}

#[tokio::test]
async fn select_one_returns_null_when_absent() {
    let (_container, client) = create_postgres_container().await;
    client
        .execute("CREATE TABLE squel_test_empty (id BIGINT PRIMARY KEY)", &[])
        .await
        .expect("create table");

    let ctx = RunContext::default();
    let mut pred = BTreeMap::new();
    pred.insert("id".to_string(), Expr::param(1i64));
    let f = select_one("squel_test_empty", Where::Predicate(pred), SelectOptions::default());
    let result = run(&f, &client, &ctx, false).await.expect("select one");
    assert!(result.is_null());
}

#[tokio::test]
async fn select_with_lateral_map_merges_joined_result() {
    let (_container, client) = create_postgres_container().await;
    client
        .execute("CREATE TABLE squel_test_author (id BIGINT PRIMARY KEY, name TEXT NOT NULL)", &[])
        .await
        .expect("create author table");
    client
        .execute(
            "CREATE TABLE squel_test_book (id BIGINT PRIMARY KEY, author_id BIGINT NOT NULL, title TEXT NOT NULL)",
            &[],
        )
        .await
        .expect("create book table");
    client.execute("INSERT INTO squel_test_author VALUES (1, 'Ada')", &[]).await.expect("seed author");
    client
        .execute("INSERT INTO squel_test_book VALUES (1, 1, 'Notes')", &[])
        .await
        .expect("seed book");

    let ctx = RunContext::default();

    let mut book_pred = BTreeMap::new();
    book_pred.insert("author_id".to_string(), Expr::parent("id"));
    let books = select(
        "squel_test_book",
        Where::Predicate(book_pred),
        SelectOptions::default(),
        SelectMode::Many,
    );

    let mut laterals = BTreeMap::new();
    laterals.insert("books".to_string(), books);
    let mut author_pred = BTreeMap::new();
    author_pred.insert("id".to_string(), Expr::param(1i64));
    let f = select_exactly_one(
        "squel_test_author",
        Where::Predicate(author_pred),
        SelectOptions { lateral: Some(Lateral::Map(laterals)), ..Default::default() },
    );

    let result = run(&f, &client, &ctx, false).await.expect("lateral select");
    assert_eq!(result["name"], serde_json::json!("Ada"));
    assert_eq!(result["books"][0]["title"], serde_json::json!("Notes"));
}

#[tokio::test]
async fn count_returns_numeric_result() {
    let (_container, client) = create_postgres_container().await;
    client
        .execute("CREATE TABLE squel_test_count (id BIGINT PRIMARY KEY)", &[])
        .await
        .expect("create table");
    client.execute("INSERT INTO squel_test_count VALUES (1), (2), (3)", &[]).await.expect("seed rows");

    let ctx = RunContext::default();
    let f = shortcuts::count("squel_test_count", Where::All, SelectOptions::default());
    let result = run(&f, &client, &ctx, false).await.expect("count");
    assert_eq!(result, serde_json::json!(3.0));
}
