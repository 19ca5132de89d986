//! Webhook delivery from the worker pool.

mod harness;

use std::time::Duration;

use audithub_entity::job::JobState;
use audithub_service::SubmitAuditRequest;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn with_hook(url: &str, hook: String) -> SubmitAuditRequest {
    SubmitAuditRequest {
        webhook_url: Some(hook),
        webhook_token: Some("s3cret".into()),
        ..SubmitAuditRequest::new(url)
    }
}

#[tokio::test]
async fn test_completed_job_delivers_once_with_percent_scores() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header("authorization", "Bearer s3cret"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let app = harness::TestHarness::start(1, 3).await;
    let response = app
        .service
        .submit_audit(with_hook("https://example.com", format!("{}/hook", server.uri())))
        .await
        .unwrap();
    app.wait_for_finished(1).await;
    app.stop().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["jobId"], response.job_id.to_string());
    assert_eq!(body["state"], "completed");
    let score = |name: &str| body["result"]["scores"][name].as_f64().unwrap();
    assert!((score("performance") - 91.0).abs() < 1e-9);
    assert!((score("seo") - 80.0).abs() < 1e-9);
    assert_eq!(score("accessibility"), 0.0);
    server.verify().await;
}

#[tokio::test]
async fn test_terminal_failure_delivers_failed_state() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let app = harness::TestHarness::start(1, 2).await;
    app.service
        .submit_audit(with_hook("https://fail.example.com", format!("{}/hook", server.uri())))
        .await
        .unwrap();
    app.wait_for_finished(1).await;
    app.stop().await;

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1, "only the final failure is delivered");
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["state"], "failed");
    assert_eq!(body["result"]["error"], "net::ERR_NAME_NOT_RESOLVED");
}

#[tokio::test]
async fn test_delivery_failure_keeps_job_completed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let app = harness::TestHarness::start(1, 3).await;
    let response = app
        .service
        .submit_audit(with_hook("https://example.com", format!("{}/hook", server.uri())))
        .await
        .unwrap();
    app.wait_for_finished(1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let job = app.service.get_job(&response.job_id.to_string()).await.unwrap();
    assert_eq!(job.status, JobState::Completed);
    assert_eq!(job.attempts_made, 1);
    assert!(job.data.webhook_token.is_none());
    app.stop().await;
}
