//! 🧪 The appender against a real(ish) HTTP server. wiremock plays Elasticsearch,
//! badly but convincingly, like a community theatre production of "The Cluster".

use std::time::Duration;

use esap::schema::SchemaResources;
use esap::{Appender, AppenderConfig, AppenderError, FlushOutcome, LogEvent, PatternLayout};
use tracing::Level;
use wiremock::matchers::{body_string, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH: &str = "Basic ZWxhc3RpYzpjaGFuZ2VtZQ==";

fn config_for(server: &MockServer) -> AppenderConfig {
    let mut config = AppenderConfig::new("elastic", "changeme");
    config.host = server.uri();
    config.connect_timeout_seconds = 5;
    config
}

async fn root_reports(server: &MockServer, version: &str) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"{{"name":"node-1","version":{{"number":"{version}"}},"tagline":"You Know, for Search"}}"#
        )))
        .mount(server)
        .await;
}

async fn already_provisioned(server: &MockServer) {
    root_reports(server, "7.17.0").await;
    Mock::given(method("GET"))
        .and(path("/_template/log4j"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"log4j":{"order":0}}"#))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_ingest/pipeline/log4j"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"log4j":{"processors":[]}}"#))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}

fn event(message: &str) -> LogEvent {
    LogEvent::new(Level::INFO, "shop::orders", message)
}

#[tokio::test]
async fn the_one_where_a_fresh_cluster_gets_template_and_pipeline() {
    let server = MockServer::start().await;
    let resources = SchemaResources::default();
    root_reports(&server, "7.10.2").await;
    Mock::given(method("GET"))
        .and(path("/_template/log4j"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_ingest/pipeline/log4j"))
        .respond_with(ResponseTemplate::new(404).set_body_string("{}"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/_template/log4j"))
        .and(body_string(resources.template_v7.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"acknowledged":true}"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/_ingest/pipeline/log4j"))
        .and(body_string(resources.pipeline.clone()))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"acknowledged":true}"#))
        .expect(1)
        .mount(&server)
        .await;

    let appender = Appender::new("es", config_for(&server), PatternLayout::with_hostname("h"))
        .await
        .expect("💀 bootstrap should succeed against a healthy cluster");

    assert!(appender.is_ready());
    assert_eq!(appender.major_version(), 7);

    // -- 🔐 every single request carried credentials and a JSON content type
    let requests = server.received_requests().await.unwrap_or_default();
    assert_eq!(requests.len(), 5);
    for request in &requests {
        let auth = request.headers.get("authorization").and_then(|v| v.to_str().ok());
        assert_eq!(auth, Some(AUTH), "missing auth on {}", request.url);
        let content_type = request.headers.get("content-type").and_then(|v| v.to_str().ok());
        assert_eq!(content_type, Some("application/json"));
    }
}

#[tokio::test]
async fn the_one_where_a_provisioned_cluster_only_gets_looked_at() {
    let server = MockServer::start().await;
    already_provisioned(&server).await;

    let appender = Appender::new("es", config_for(&server), PatternLayout::with_hostname("h"))
        .await
        .expect("💀 bootstrap should succeed");

    assert!(appender.is_ready());
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.iter().all(|r| r.method.as_str() == "GET"));
    // -- the `expect(0)` on PUT is verified when the server drops
}

#[tokio::test]
async fn the_one_where_lines_land_in_one_bulk_post() {
    let server = MockServer::start().await;
    already_provisioned(&server).await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .and(query_param("pipeline", "log4j"))
        .and(header("authorization", AUTH))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"took":3,"errors":false,"items":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let appender = Appender::new("es", config_for(&server), PatternLayout::with_hostname("web-01"))
        .await
        .expect("💀 bootstrap should succeed");
    appender.start().expect("💀 start inside a runtime");

    appender.append(&event("order placed"));
    appender.append(&event("order shipped"));
    assert_eq!(appender.flush().await, FlushOutcome::Delivered(2));
    assert!(appender.stop(Duration::from_secs(10)).await);

    let requests = server.received_requests().await.unwrap_or_default();
    let bulk = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .expect("💀 no bulk request arrived");
    let body = String::from_utf8_lossy(&bulk.body);
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with(r#"{"index":{"_index":"log4j-"#));
    assert!(!lines[0].contains("_type"));
    assert!(lines[1].contains(r#"[web-01][INFO ][s::orders"#));
    assert!(lines[1].contains("order placed"));
    assert!(lines[3].contains("order shipped"));
    assert!(body.ends_with('\n'));
    assert_eq!(appender.stats().records_delivered, 2);
}

#[tokio::test]
async fn the_one_where_the_cluster_rejects_the_batch_and_we_move_on() {
    let server = MockServer::start().await;
    already_provisioned(&server).await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(429).set_body_string("es_rejected_execution_exception"))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.debug = true;
    let appender = Appender::new("es", config, PatternLayout::with_hostname("h"))
        .await
        .expect("💀 bootstrap should succeed");
    appender.start().expect("💀 start inside a runtime");

    appender.append(&event("this one is doomed"));
    assert_eq!(appender.flush().await, FlushOutcome::Failed(1));
    assert_eq!(appender.buffered(), 0);
    // -- 🪦 nothing left to retry
    assert_eq!(appender.flush().await, FlushOutcome::Empty);
    assert!(appender.stop(Duration::from_secs(10)).await);
    assert_eq!(appender.stats().batches_failed, 1);
}

#[tokio::test]
async fn the_one_where_a_broken_root_fails_construction() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal sadness"))
        .mount(&server)
        .await;

    let err = Appender::new("es", config_for(&server), PatternLayout::with_hostname("h"))
        .await
        .expect_err("💀 verify_connection should refuse a broken cluster");

    assert!(matches!(
        err,
        AppenderError::Bootstrap {
            connected: false,
            template: false,
            pipeline: false,
        }
    ));
    // -- 🔌 version unknown, so nobody went looking for templates
    assert_eq!(server.received_requests().await.unwrap_or_default().len(), 1);
}

#[tokio::test]
async fn the_one_where_nobody_is_listening_and_we_stay_degraded() {
    let mut config = AppenderConfig::new("elastic", "changeme");
    // -- 🔌 port 1 on loopback: nobody home, refused immediately
    config.host = "http://127.0.0.1:1".to_string();
    config.connect_timeout_seconds = 2;
    config.verify_connection = false;

    let appender = Appender::new("es", config, PatternLayout::with_hostname("h"))
        .await
        .expect("💀 degraded mode should still construct");

    assert!(!appender.is_ready());
    assert_eq!(appender.major_version(), -1);
}

#[tokio::test]
async fn the_one_where_version_six_gets_typed_action_lines() {
    let server = MockServer::start().await;
    root_reports(&server, "6.8.23").await;
    Mock::given(method("GET"))
        .and(path("/_template/log4j"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"log4j":{}}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/_ingest/pipeline/log4j"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"log4j":{}}"#))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"errors":false}"#))
        .mount(&server)
        .await;

    let appender = Appender::new("es", config_for(&server), PatternLayout::with_hostname("h"))
        .await
        .expect("💀 bootstrap should succeed");
    appender.start().expect("💀 start inside a runtime");
    appender.append(&event("old but gold"));
    appender.flush().await;
    appender.stop(Duration::from_secs(10)).await;

    let requests = server.received_requests().await.unwrap_or_default();
    let bulk = requests
        .iter()
        .find(|r| r.method.as_str() == "POST")
        .expect("💀 no bulk request arrived");
    let body = String::from_utf8_lossy(&bulk.body);
    assert!(body.lines().next().is_some_and(|line| line.ends_with(r#""_type":"_doc"}}"#)));
}

#[tokio::test]
async fn the_one_where_two_flushes_at_once_never_ship_a_line_twice() {
    let server = MockServer::start().await;
    already_provisioned(&server).await;
    Mock::given(method("POST"))
        .and(path("/_bulk"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"errors":false}"#)
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let appender = Appender::new("es", config_for(&server), PatternLayout::with_hostname("h"))
        .await
        .expect("💀 bootstrap should succeed");
    appender.start().expect("💀 start inside a runtime");

    appender.append(&event("first-alpha"));
    appender.append(&event("first-beta"));
    // -- 🐢 while the first bulk is still in the air, a second flush and two more lines show up
    let late_arrivals = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        appender.append(&event("second-gamma"));
        appender.append(&event("second-delta"));
    };
    let second_flush = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        appender.flush().await
    };
    let (first, second, ()) = tokio::join!(appender.flush(), second_flush, late_arrivals);

    assert_eq!(first, FlushOutcome::Delivered(2));
    assert_eq!(second, FlushOutcome::Delivered(2));
    assert_eq!(appender.buffered(), 0);
    assert!(appender.stop(Duration::from_secs(10)).await);

    let requests = server.received_requests().await.unwrap_or_default();
    let bodies: Vec<String> = requests
        .iter()
        .filter(|r| r.method.as_str() == "POST")
        .map(|r| String::from_utf8_lossy(&r.body).into_owned())
        .collect();
    assert_eq!(bodies.len(), 2);
    for message in ["first-alpha", "first-beta", "second-gamma", "second-delta"] {
        let shipped = bodies.iter().map(|body| body.matches(message).count()).sum::<usize>();
        assert_eq!(shipped, 1, "{message} shipped {shipped} times");
    }
    assert_eq!(appender.stats().records_delivered, 4);
}
