mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use user_ingest::{
    ApiStatus, IngestionClient, IngestionClientConfig, IngestionRunner, Record, Submitter,
    ValidatedTable, ValidationResult,
};

/// What the stub endpoint does with one request
#[derive(Debug, Clone, Copy)]
enum StubResponse {
    Reply(u16, &'static str),
    /// Read the request and never answer
    Stall,
}

/// Minimal HTTP endpoint on a loopback port. Answers request `n` with
/// `responses[n]`, repeating the last entry once the list runs out.
struct StubServer {
    url: String,
    hits: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    async fn start(responses: Vec<StubResponse>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ingest", listener.local_addr().unwrap());
        let hits = Arc::new(AtomicUsize::new(0));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let server_hits = Arc::clone(&hits);
        let server_requests = Arc::clone(&requests);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let index = server_hits.fetch_add(1, Ordering::SeqCst);
                let response = responses[index.min(responses.len() - 1)];

                let request = read_request(&mut stream).await.unwrap_or_default();
                server_requests.lock().unwrap().push(request);

                match response {
                    StubResponse::Reply(status, body) => {
                        let reply = format!(
                            "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                            body.len()
                        );
                        let _ = stream.write_all(reply.as_bytes()).await;
                        let _ = stream.shutdown().await;
                    }
                    StubResponse::Stall => {
                        tokio::time::sleep(Duration::from_secs(30)).await;
                    }
                }
            }
        });

        Self {
            url,
            hits,
            requests,
        }
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let read = stream.read(&mut chunk).await?;
        if read == 0 {
            break;
        }
        buffer.extend_from_slice(&chunk[..read]);

        let Some(header_end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buffer[..header_end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok());

        let complete = match content_length {
            Some(length) => buffer.len() >= header_end + 4 + length,
            None if head.contains("transfer-encoding: chunked") => buffer.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            break;
        }
    }

    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

fn client(url: &str, retry_attempts: u32) -> IngestionClient {
    IngestionClient::new(IngestionClientConfig {
        api_url: url.to_string(),
        timeout_seconds: 5,
        retry_attempts,
        retry_delay_ms: 10,
        max_retry_delay_ms: 50,
        ..Default::default()
    })
    .unwrap()
}

fn validated() -> ValidatedTable {
    let columns: Vec<String> = common::COLUMNS.iter().map(|c| c.to_string()).collect();
    let record = |values: Vec<String>| -> Record {
        columns
            .iter()
            .cloned()
            .zip(values.into_iter().map(Some))
            .collect()
    };

    ValidatedTable::new(
        columns.clone(),
        vec![
            ValidationResult::new(record(common::valid_row("alice", "1111111111")), Vec::new()),
            ValidationResult::new(
                record(common::valid_row("bo", "2222222222")),
                vec!["username must be at least 3 characters".to_string()],
            ),
            ValidationResult::new(record(common::valid_row("carol", "3333333333")), Vec::new()),
        ],
    )
}

fn first_row() -> (Vec<String>, ValidationResult) {
    let table = validated();
    (table.columns().to_vec(), table.results()[0].clone())
}

#[tokio::test]
async fn test_only_correct_rows_reach_the_endpoint() {
    let server = StubServer::start(vec![StubResponse::Reply(
        200,
        r#"{"status":"SUCCESSFUL"}"#,
    )])
    .await;

    let report = IngestionRunner::new(Duration::ZERO)
        .run(&validated(), &client(&server.url, 0))
        .await;

    assert_eq!(server.hits(), 2);
    assert_eq!(report.summary().success, 2);
    assert_eq!(report.summary().skipped, 1);
    assert_eq!(report.rows()[1].outcome.status, ApiStatus::Skipped);

    let requests = server.requests();
    assert!(requests[0].contains(r#"name="DHIS2IngestionRequest""#));
    assert!(requests[0].contains(r#"filename="file""#));
    assert!(requests[0].contains(r#""tenantId":"bi""#));
    assert!(requests[0].contains("alice,1111111111"));
    assert!(requests[1].contains("carol,3333333333"));
    assert!(!requests.iter().any(|request| request.contains("bo,2222222222")));
}

#[tokio::test]
async fn test_error_body_on_2xx_is_a_failure() {
    let body = r#"{"Errors":[{"code":"DUPLICATE_USER"}]}"#;
    let server = StubServer::start(vec![StubResponse::Reply(200, body)]).await;
    let (columns, result) = first_row();

    let outcome = client(&server.url, 0).submit(&columns, &result).await;
    assert_eq!(outcome.status, ApiStatus::Error);
    assert_eq!(outcome.status_code, Some(200));
    assert_eq!(outcome.message, body);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = StubServer::start(vec![StubResponse::Reply(400, "bad request")]).await;
    let (columns, result) = first_row();

    let outcome = client(&server.url, 3).submit(&columns, &result).await;
    assert_eq!(server.hits(), 1);
    assert_eq!(outcome.status, ApiStatus::Error);
    assert_eq!(outcome.status_code, Some(400));
    assert_eq!(outcome.message, "bad request");
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = StubServer::start(vec![
        StubResponse::Reply(503, "busy"),
        StubResponse::Reply(200, "{}"),
    ])
    .await;
    let (columns, result) = first_row();

    let outcome = client(&server.url, 2).submit(&columns, &result).await;
    assert_eq!(server.hits(), 2);
    assert_eq!(outcome.status, ApiStatus::Success);
    assert_eq!(outcome.status_code, Some(200));
}

#[tokio::test]
async fn test_last_server_error_is_reported_after_retries() {
    let server = StubServer::start(vec![StubResponse::Reply(500, "boom")]).await;
    let (columns, result) = first_row();

    let outcome = client(&server.url, 1).submit(&columns, &result).await;
    assert_eq!(server.hits(), 2);
    assert_eq!(outcome.status_code, Some(500));
    assert_eq!(outcome.message, "boom");
}

#[tokio::test]
async fn test_timeout_is_reported_as_408() {
    let server = StubServer::start(vec![StubResponse::Stall]).await;
    let (columns, result) = first_row();

    let client = IngestionClient::new(IngestionClientConfig {
        api_url: server.url.clone(),
        timeout_seconds: 1,
        retry_attempts: 0,
        ..Default::default()
    })
    .unwrap();

    let outcome = client.submit(&columns, &result).await;
    assert_eq!(outcome.status, ApiStatus::Error);
    assert_eq!(outcome.status_code, Some(408));
    assert_eq!(outcome.message, "Request timeout");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_reported_as_500() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/ingest", listener.local_addr().unwrap());
    drop(listener);
    let (columns, result) = first_row();

    let outcome = client(&url, 0).submit(&columns, &result).await;
    assert_eq!(outcome.status, ApiStatus::Error);
    assert_eq!(outcome.status_code, Some(500));
}

#[tokio::test]
async fn test_report_written_next_to_input() {
    let server = StubServer::start(vec![
        StubResponse::Reply(200, "{}"),
        StubResponse::Reply(422, "invalid user"),
    ])
    .await;
    let workspace = common::Workspace::new();

    let report = IngestionRunner::new(Duration::ZERO)
        .run(&validated(), &client(&server.url, 0))
        .await;
    let path = workspace.path().join("users_results.csv");
    report.write_csv_path(&path).unwrap();

    let csv = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].ends_with("validation_status,validation_errors,api_status,api_status_code,api_message"));
    assert!(lines[1].ends_with(",CORRECT,[],SUCCESS,200,{}"));
    assert!(lines[2].ends_with(",SKIPPED,N/A,Validation failed"));
    assert!(lines[3].ends_with(",CORRECT,[],ERROR,422,invalid user"));
    assert!(report.summary().has_errors());
}
