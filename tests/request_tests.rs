//! End-to-end request tests over real sockets against the echo application.

use serde_json::Value;

mod common;

async fn echo(client: &reqwest::Client, url: &str) -> Value {
    let response = client.get(url).send().await.expect("server unreachable");
    assert_eq!(response.status(), 200, "unexpected status for {url}");
    assert_eq!(response.headers()["content-type"], "application/json");
    response.json().await.unwrap()
}

#[tokio::test]
async fn simple_get() {
    let running = common::start_echo(&["http://+:28401/basepath/".to_string()]).await;
    let client = common::client();

    let report = echo(&client, "http://127.0.0.1:28401/basepath/SomePath?SomeQuery").await;

    assert_eq!(report["method"], "GET");
    assert_eq!(report["scheme"], "http");
    assert_eq!(report["path_base"], "/basepath");
    assert_eq!(report["path"], "/SomePath");
    assert_eq!(report["query_string"], "?SomeQuery");
    assert_eq!(report["protocol"], "HTTP/1.1");
    assert_eq!(report["body_len"], 0);
    assert!(report["request_id"].as_str().unwrap().len() == 36);

    let connection = &report["connection"];
    assert_eq!(connection["remote_ip"], "127.0.0.1");
    assert_eq!(connection["local_ip"], "127.0.0.1");
    assert_eq!(connection["local_port"], 28401);
    assert_ne!(connection["remote_port"], 0);
    assert_eq!(connection["is_local"], true);

    let headers = report["headers"].as_array().unwrap();
    assert!(headers
        .iter()
        .any(|pair| pair[0] == "host" && pair[1] == "127.0.0.1:28401"));

    running.stop().await;
}

#[tokio::test]
async fn path_splitting() {
    let cases = [
        ("/", "/", "", "/"),
        ("/basepath/", "/basepath", "/basepath", ""),
        ("/basepath/", "/basepath/", "/basepath", "/"),
        ("/basepath/", "/basepath/subpath", "/basepath", "/subpath"),
        ("/base path/", "/base%20path/sub path", "/base path", "/sub path"),
        (
            "/base葉path/",
            "/base%E8%91%89path/sub%E8%91%89path",
            "/base葉path",
            "/sub葉path",
        ),
    ];
    let client = common::client();

    for (i, (prefix_path, request_path, expected_base, expected_path)) in cases.into_iter().enumerate() {
        let port = 28410 + i as u16;
        let running = common::start_echo(&[format!("http://+:{port}{prefix_path}")]).await;

        let report = echo(&client, &format!("http://127.0.0.1:{port}{request_path}")).await;
        assert_eq!(report["scheme"], "http", "case {request_path}");
        assert_eq!(report["path_base"], expected_base, "case {request_path}");
        assert_eq!(report["path"], expected_path, "case {request_path}");
        assert_eq!(report["query_string"], "", "case {request_path}");

        running.stop().await;
    }
}

#[tokio::test]
async fn multiple_prefixes() {
    let prefixes: Vec<String> = ["/", "/11", "/2/3", "/2", "/11/2"]
        .iter()
        .map(|path| format!("http://+:28420{path}"))
        .collect();
    let running = common::start_echo(&prefixes).await;
    let client = common::client();

    let cases = [
        ("/", "", "/"),
        ("/random", "", "/random"),
        ("/11", "/11", ""),
        ("/11/", "/11", "/"),
        ("/11/random", "/11", "/random"),
        ("/2", "/2", ""),
        ("/2/", "/2", "/"),
        ("/2/random", "/2", "/random"),
        ("/2/3", "/2/3", ""),
        ("/2/3/", "/2/3", "/"),
        ("/2/3/random", "/2/3", "/random"),
    ];
    for (request_path, expected_base, expected_path) in cases {
        let report = echo(&client, &format!("http://127.0.0.1:28420{request_path}")).await;
        assert_eq!(report["path_base"], expected_base, "case {request_path}");
        assert_eq!(report["path"], expected_path, "case {request_path}");
    }

    running.stop().await;
}

#[tokio::test]
async fn request_body_is_streamed_to_the_application() {
    let running = common::start_echo(&["http://+:28430/upload/".to_string()]).await;
    let client = common::client();

    let response = client
        .post("http://127.0.0.1:28430/upload/file")
        .body(vec![7u8; 4096])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["method"], "POST");
    assert_eq!(report["body_len"], 4096);

    running.stop().await;
}

#[tokio::test]
async fn unmatched_path_is_not_found() {
    let running = common::start_echo(&["http://+:28431/api/".to_string()]).await;
    let client = common::client();

    let response = client.get("http://127.0.0.1:28431/other").send().await.unwrap();
    assert_eq!(response.status(), 404);
    assert!(response.text().await.unwrap().is_empty());

    running.stop().await;
}

#[tokio::test]
async fn undecodable_path_is_bad_request() {
    let running = common::start_echo(&["http://+:28432/".to_string()]).await;
    let client = common::client();

    let response = client.get("http://127.0.0.1:28432/bad%FF").send().await.unwrap();
    assert_eq!(response.status(), 400);

    running.stop().await;
}

#[tokio::test]
async fn explicit_host_prefix_wins_only_for_its_host() {
    let running = common::start_echo(&[
        "http://127.0.0.1:28433/only-ip/".to_string(),
        "http://example.invalid:28433/".to_string(),
    ])
    .await;
    let client = common::client();

    let report = echo(&client, "http://127.0.0.1:28433/only-ip/x").await;
    assert_eq!(report["path_base"], "/only-ip");

    // Same socket, but the Host header names neither prefix's host.
    let response = client
        .get("http://127.0.0.1:28433/only-ip/x")
        .header("host", "somewhere.else:28433")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    running.stop().await;
}

#[tokio::test]
async fn stopping_releases_the_port() {
    let running = common::start_echo(&["http://+:28434/".to_string()]).await;
    running.stop().await;

    // The accept task is aborted, so the socket closes on its next poll.
    let mut rebound = None;
    for _ in 0..50 {
        if let Ok(listener) = tokio::net::TcpListener::bind("127.0.0.1:28434").await {
            rebound = Some(listener);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(rebound.is_some());
}
