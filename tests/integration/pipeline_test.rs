//! End-to-end tests: submission through worker execution to batch views.

mod harness;

use std::collections::HashSet;

use audithub_entity::batch::BatchStatus;
use audithub_entity::job::JobState;
use audithub_service::{SubmitAuditRequest, SubmitBatchRequest};

fn batch(urls: &[&str]) -> SubmitBatchRequest {
    SubmitBatchRequest {
        urls: urls.iter().map(|u| u.to_string()).collect(),
        ..SubmitBatchRequest::default()
    }
}

#[tokio::test]
async fn test_single_audit_completes() {
    let app = harness::TestHarness::start(2, 3).await;

    let response = app
        .service
        .submit_audit(SubmitAuditRequest::new("https://example.com"))
        .await
        .unwrap();
    assert_eq!(response.status, "queued");

    app.wait_for_finished(1).await;
    let job = app.service.get_job(&response.job_id.to_string()).await.unwrap();
    assert_eq!(job.status, JobState::Completed);
    assert_eq!(job.attempts_made, 1);
    let result = job.result.unwrap();
    assert_eq!(result["scores"]["performance"], 0.91);
    assert_eq!(result["metrics"]["lcp"], 1800.0);
    assert!(job.finished_at.is_some());

    let report = app.stop().await;
    assert_eq!(report.abandoned, 0);
}

#[tokio::test]
async fn test_batch_all_succeed() {
    let app = harness::TestHarness::start(3, 3).await;
    let urls = [
        "https://a.example.com",
        "https://b.example.com",
        "https://c.example.com",
        "https://d.example.com",
        "https://e.example.com",
    ];

    let response = app.service.submit_batch(batch(&urls)).await.unwrap();
    assert_eq!(response.total, 5);
    assert_eq!(response.job_ids.len(), 5);

    app.wait_for_finished(5).await;
    let detail = app
        .service
        .get_batch(&response.batch_id.to_string())
        .await
        .unwrap();
    assert_eq!(detail.counts.total, 5);
    assert_eq!(detail.counts.completed, 5);
    assert_eq!(detail.status, BatchStatus::Completed);
    assert_eq!(detail.jobs.len(), 5);

    let listed = app.service.list_batches().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, BatchStatus::Completed);
    assert_eq!(listed[0].urls.len(), 3);

    app.stop().await;
}

#[tokio::test]
async fn test_batch_with_failures_is_partial() {
    let app = harness::TestHarness::start(2, 2).await;
    let response = app
        .service
        .submit_batch(batch(&[
            "https://ok.example.com",
            "https://fail.example.com",
            "https://also-ok.example.com",
        ]))
        .await
        .unwrap();

    app.wait_for_finished(3).await;
    let detail = app
        .service
        .get_batch(&response.batch_id.to_string())
        .await
        .unwrap();
    assert_eq!(detail.counts.completed, 2);
    assert_eq!(detail.counts.failed, 1);
    assert_eq!(
        detail.counts.completed + detail.counts.failed + detail.counts.active + detail.counts.waiting,
        detail.counts.total
    );
    assert_eq!(detail.status, BatchStatus::Partial);

    let failed = detail
        .jobs
        .iter()
        .find(|j| j.status == JobState::Failed)
        .unwrap();
    assert_eq!(failed.attempts_made, 2);
    assert_eq!(failed.failed_reason.as_deref(), Some("net::ERR_NAME_NOT_RESOLVED"));

    let snapshot = app.metrics.snapshot();
    assert_eq!(snapshot.completed, 2);
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.retried, 1);

    app.stop().await;
}

#[tokio::test]
async fn test_concurrent_batches_are_disjoint() {
    let app = harness::TestHarness::start(4, 1).await;
    let first = batch(&["https://1.example.com", "https://2.example.com"]);
    let second = batch(&["https://3.example.com", "https://4.example.com"]);

    let (a, b) = tokio::join!(app.service.submit_batch(first), app.service.submit_batch(second));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.batch_id, b.batch_id);
    let ids: HashSet<_> = a.job_ids.iter().chain(b.job_ids.iter()).collect();
    assert_eq!(ids.len(), 4);

    app.wait_for_finished(4).await;
    let listed: HashSet<_> = app
        .service
        .list_batches()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.batch_id)
        .collect();
    assert!(listed.contains(&a.batch_id));
    assert!(listed.contains(&b.batch_id));

    app.stop().await;
}

#[tokio::test]
async fn test_cleanup_after_processing() {
    let app = harness::TestHarness::start(2, 1).await;
    app.service
        .submit_batch(batch(&["https://x.example.com", "https://fail.example.com"]))
        .await
        .unwrap();
    app.wait_for_finished(2).await;

    let first = app.service.cleanup_all().await.unwrap();
    assert_eq!(first.cleaned, 2);
    assert_eq!(first.completed_cleaned, 1);
    assert_eq!(first.failed_cleaned, 1);
    assert_eq!(first.stats.total, 0);
    assert!(app.service.list_batches().await.unwrap().is_empty());

    let second = app.service.cleanup_all().await.unwrap();
    assert_eq!(second.cleaned, 0);

    app.stop().await;
}

#[tokio::test]
async fn test_unknown_ids_not_found() {
    let app = harness::TestHarness::start(1, 1).await;
    assert!(app.service.get_job("nonexistent").await.unwrap_err().is_not_found());
    assert!(app.service.get_batch("nonexistent").await.unwrap_err().is_not_found());
    app.stop().await;
}
