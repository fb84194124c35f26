//! Job and batch read views, pagination, and statistics.

use axum::http::StatusCode;
use serde_json::json;

use crate::e2e_tests::helpers::*;
use crate::testing::{insert_batch, insert_job};

/// Alice: batch b-1 with jobs 0..5 (even accepted, odd rejected), and a
/// loose job 5. Bob: batch b-2 with one job.
async fn seeded() -> (TestServer, String, String) {
    let server = TestServer::start().await;
    let (alice, alice_id) = server.register("Alice", "alice@example.com").await;
    let (bob, bob_id) = server.register("Bob", "bob@example.com").await;
    let pool = server.store.pool();

    insert_batch(pool, "b-1", alice_id, 5, 3).await;
    for seq in 0..5 {
        let status = if seq % 2 == 0 { "accepted" } else { "rejected" };
        insert_job(pool, &format!("job-{seq}"), alice_id, status, Some("b-1"), seq).await;
    }
    insert_job(pool, "job-5", alice_id, "accepted", None, 5).await;

    insert_batch(pool, "b-2", bob_id, 1, 1).await;
    insert_job(pool, "bob-job", bob_id, "accepted", Some("b-2"), 0).await;

    (server, alice, bob)
}

fn job_ids(body: &serde_json::Value) -> Vec<String> {
    body["data"]
        .as_array()
        .expect("data array")
        .iter()
        .map(|j| j["job_id"].as_str().expect("job id").to_string())
        .collect()
}

#[tokio::test]
async fn test_list_jobs_newest_first_with_paging() {
    let (server, alice, _) = seeded().await;

    let (status, body) = server.get("/jobs?page=1&per_page=4", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job_ids(&body), vec!["job-5", "job-4", "job-3", "job-2"]);
    assert_eq!(body["page"], json!(1));
    assert_eq!(body["per_page"], json!(4));
    assert_eq!(body["total_items"], json!(6));
    assert_eq!(body["total_pages"], json!(2));
    assert_eq!(body["success"], json!(true));

    let (_, body) = server.get("/jobs?page=2&per_page=4", &alice).await;
    assert_eq!(job_ids(&body), vec!["job-1", "job-0"]);
}

#[tokio::test]
async fn test_list_jobs_clamps_bad_paging() {
    let (server, alice, _) = seeded().await;

    let (status, body) = server.get("/jobs?page=-3&per_page=1000", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["page"], json!(1));
    assert_eq!(body["per_page"], json!(20));

    let (_, body) = server.get("/batches/b-1/jobs?per_page=101", &alice).await;
    assert_eq!(body["per_page"], json!(50));

    let (_, body) = server.get("/jobs?page=abc&per_page=0", &alice).await;
    assert_eq!(body["page"], json!(1));
    assert_eq!(body["per_page"], json!(20));
    assert_eq!(body["total_pages"], json!(1));
}

#[tokio::test]
async fn test_list_jobs_filters() {
    let (server, alice, _) = seeded().await;

    let (_, body) = server.get("/jobs?status=rejected", &alice).await;
    assert_eq!(job_ids(&body), vec!["job-3", "job-1"]);
    assert_eq!(body["data"][0]["reason"], json!("quota exceeded"));

    let (_, body) = server.get("/jobs?batch_id=b-1&status=accepted", &alice).await;
    assert_eq!(job_ids(&body), vec!["job-4", "job-2", "job-0"]);

    let (_, body) = server.get("/jobs?status=", &alice).await;
    assert_eq!(body["total_items"], json!(6));
}

#[tokio::test]
async fn test_get_job_is_owner_scoped() {
    let (server, alice, bob) = seeded().await;

    let (status, body) = server.get("/jobs/job-2", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], json!("Job retrieved"));
    assert_eq!(body["data"]["job_payload"], json!({"seq": 2}));
    assert_eq!(body["data"]["batch_id"], json!("b-1"));

    let (status, body) = server.get("/jobs/job-2", &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Job not found"));
}

#[tokio::test]
async fn test_stats() {
    let (server, alice, _) = seeded().await;
    server.create_config(&alice, "a", json!({})).await;
    let b = server.create_config(&alice, "b", json!({})).await;
    server
        .post(&format!("/configs/{b}/activate"), &alice, json!({}))
        .await;

    let (status, body) = server.get("/jobs/stats", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({
            "total_jobs": 6,
            "accepted_jobs": 4,
            "rejected_jobs": 2,
            "total_batches": 1,
            "total_configs": 2,
            "active_configs": 1
        })
    );
}

#[tokio::test]
async fn test_batches() {
    let (server, alice, bob) = seeded().await;

    let (status, body) = server.get("/batches", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_items"], json!(1));
    assert_eq!(body["data"][0]["batch_id"], json!("b-1"));

    let (status, body) = server.get("/batches/b-1", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_jobs"], json!(5));
    assert_eq!(body["data"]["admitted_jobs"], json!(3));
    assert_eq!(body["data"]["rejected_jobs"], json!(2));
    assert_eq!(body["data"]["batch_name"], json!("b-1 name"));

    let (status, body) = server.get("/batches/b-1", &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Batch not found"));
}

#[tokio::test]
async fn test_batch_jobs() {
    let (server, alice, bob) = seeded().await;

    let (status, body) = server.get("/batches/b-1/jobs", &alice).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["per_page"], json!(50));
    assert_eq!(
        job_ids(&body),
        vec!["job-4", "job-3", "job-2", "job-1", "job-0"]
    );

    let (_, body) = server.get("/batches/b-1/jobs?per_page=2&page=3", &alice).await;
    assert_eq!(job_ids(&body), vec!["job-0"]);
    assert_eq!(body["total_pages"], json!(3));

    let (status, _) = server.get("/batches/b-1/jobs", &bob).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
