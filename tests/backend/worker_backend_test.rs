//! `WorkerBackend` against a scripted stand-in worker.
//!
//! The stand-in is a shell loop speaking the NDJSON protocol: it tracks a
//! single transaction, answers queries only while it is open and reports
//! `TRANSACTION_NOT_FOUND` after a rollback.

#![cfg(unix)]

use std::sync::Arc;
use std::time::Duration;

use keyscout::backend::{KeyBackend, QueryError, WorkerBackend};
use keyscout::sql::Dialect;
use keyscout::worker::protocol::{self, methods};
use keyscout::worker::{WorkerClient, WorkerError};

const FAKE_WORKER: &str = r##"
open=0
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed 's/^{"id":"\([^"]*\)".*/\1/')
  method=$(printf '%s\n' "$line" | sed 's/.*"method":"\([^"]*\)".*/\1/')
  case "$method" in
    metadata.get_columns)
      printf '{"id":"%s","success":true,"result":{"columns":[{"name":"b","position":2},{"name":"a","position":1}]}}\n' "$id" ;;
    transaction.begin)
      open=1
      printf '{"id":"%s","success":true,"result":{"transaction_id":"tx-1"}}\n' "$id"
      if [ -n "$EXIT_AFTER_BEGIN" ]; then exit 0; fi ;;
    transaction.query)
      if [ "$open" = 1 ]; then
        printf '{"id":"%s","success":true,"result":{"rows":[["3"]]}}\n' "$id"
      else
        printf '{"id":"%s","success":false,"error":{"code":"TRANSACTION_NOT_FOUND","message":"tx-1"}}\n' "$id"
      fi ;;
    transaction.rollback)
      open=0
      printf '{"id":"%s","success":true,"result":{}}\n' "$id" ;;
    *)
      printf '{"id":"%s","success":false,"error":{"code":"METHOD_NOT_FOUND","message":"%s"}}\n' "$id" "$method" ;;
  esac
done
"##;

async fn spawn_fake(exit_after_begin: bool) -> Arc<WorkerClient> {
    let prelude = if exit_after_begin {
        "EXIT_AFTER_BEGIN=1"
    } else {
        "EXIT_AFTER_BEGIN="
    };
    let script = format!("{}\n{}", prelude, FAKE_WORKER);
    let args = ["-c".to_string(), script];
    let client = WorkerClient::spawn_with_args("sh", &args, Duration::from_secs(5))
        .await
        .unwrap();
    Arc::new(client)
}

fn backend(client: &Arc<WorkerClient>) -> WorkerBackend {
    WorkerBackend::new(
        client.clone(),
        "postgres",
        "postgres://localhost/air",
        Dialect::Postgres,
    )
}

/// Issue a query on the stand-in's transaction outside of any session.
async fn query_open_transaction(
    client: &WorkerClient,
) -> Result<protocol::QueryResponse, WorkerError> {
    client
        .request(
            methods::TRANSACTION_QUERY,
            protocol::TransactionQuery {
                transaction_id: "tx-1",
                sql: "SELECT 1",
            },
        )
        .await
}

#[tokio::test]
async fn test_columns_follow_ordinal_position() {
    let client = spawn_fake(false).await;
    let columns = backend(&client)
        .list_columns("public", "flight")
        .await
        .unwrap();
    assert_eq!(columns, vec!["a".to_string(), "b".to_string()]);
}

#[tokio::test]
async fn test_session_counts_then_rolls_back() {
    let client = spawn_fake(false).await;
    let backend = backend(&client);

    let mut session = backend.begin_snapshot().await.unwrap();
    let dupes = session
        .count_duplicates("public", "flight", &["a".to_string(), "b".to_string()])
        .await
        .unwrap();
    assert_eq!(dupes, 3);

    session.release().await.unwrap();

    let after = query_open_transaction(&client).await;
    assert!(
        matches!(after, Err(WorkerError::TransactionNotFound(_))),
        "{:?}",
        after.map(|r| r.rows)
    );
}

#[tokio::test]
async fn test_dropped_session_rolls_back_in_background() {
    let client = spawn_fake(false).await;
    let backend = backend(&client);

    let session = backend.begin_snapshot().await.unwrap();
    assert!(query_open_transaction(&client).await.is_ok());
    drop(session);

    // The rollback is spawned; give it a moment to reach the worker.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(matches!(
        query_open_transaction(&client).await,
        Err(WorkerError::TransactionNotFound(_))
    ));
}

#[tokio::test]
async fn test_release_after_worker_exit_is_not_an_error() {
    let client = spawn_fake(true).await;
    let backend = backend(&client);

    let session = backend.begin_snapshot().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!client.is_alive());

    session.release().await.unwrap();
}

#[tokio::test]
async fn test_query_after_worker_exit_fails() {
    let client = spawn_fake(true).await;
    let backend = backend(&client);

    let mut session = backend.begin_snapshot().await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let result = session
        .count_duplicates("public", "flight", &["a".to_string()])
        .await;
    assert!(
        matches!(&result, Err(QueryError::Worker(e)) if e.is_worker_exited()),
        "{:?}",
        result
    );
}

#[tokio::test]
async fn test_unknown_method_is_rejected() {
    let client = spawn_fake(false).await;
    let result = backend(&client).list_schemas().await;
    assert!(matches!(result, Err(QueryError::Worker(WorkerError::Rejected(_)))));
}
