//! # Integration Tests
//!
//! These tests exercise the resupply reports endpoints by sending HTTP
//! requests to the running server. They require PostgreSQL and the service
//! to be running.
//!
//! ## Running Tests
//!
//! ```bash
//! # 1. Start the service (in another terminal)
//! cargo run --bin resupply-reports
//!
//! # 2. Run tests
//! cargo test --test integration
//! ```

#[cfg(test)]
mod tests {
    use serde_json::json;

    fn base_url() -> String {
        std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string())
    }

    #[tokio::test]
    async fn test_report_rejects_bad_start_date() {
        let client = reqwest::Client::new();
        let res = client
            .post(format!("{}/reports/resupply", base_url()))
            .json(&json!({"date_start": "01/05/2023", "date_end": "2023-01-10"}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 400, "Expected 400 Bad Request");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(body["success"], false);
        assert_eq!(
            body["error"].as_str().unwrap(),
            "Please provide a Start date. It must be in the format yyyy-mm-dd."
        );
    }

    #[tokio::test]
    async fn test_report_rejects_reversed_range() {
        let client = reqwest::Client::new();
        let res = client
            .post(format!("{}/reports/resupply", base_url()))
            .json(&json!({"date_start": "2023-02-01", "date_end": "2023-01-01"}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 400, "Expected 400 Bad Request");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(
            body["error"].as_str().unwrap(),
            "The end date must be ahead of the start date."
        );
    }

    #[tokio::test]
    async fn test_report_rejects_long_range() {
        let client = reqwest::Client::new();
        let res = client
            .post(format!("{}/reports/resupply", base_url()))
            .json(&json!({"date_start": "2023-01-01", "date_end": "2023-06-01"}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 400, "Expected 400 Bad Request");
    }

    #[tokio::test]
    async fn test_report_for_empty_range() {
        let client = reqwest::Client::new();
        let res = client
            .post(format!("{}/reports/resupply", base_url()))
            .json(&json!({"date_start": "1990-01-01", "date_end": "1990-01-31"}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 200, "Expected 200 OK");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(body["data"]["range"]["start"], "1990-01-01");
        assert!(
            body["data"]["products"].as_array().unwrap().is_empty(),
            "No orders exist for 1990"
        );
    }

    #[tokio::test]
    async fn test_buckets_for_empty_range() {
        let client = reqwest::Client::new();
        let res = client
            .post(format!("{}/reports/resupply/buckets", base_url()))
            .json(&json!({"date_start": "1990-01-01", "date_end": "1990-01-02"}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 200, "Expected 200 OK");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert!(body["data"]["pid"].as_object().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_coupon_not_found() {
        let client = reqwest::Client::new();
        let res = client
            .get(format!("{}/coupons/NO-SUCH-COUPON-99999", base_url()))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 404, "Expected 404 Not Found");
    }

    #[tokio::test]
    async fn test_cron_run_requires_collection_days() {
        let client = reqwest::Client::new();
        let res = client
            .post(format!("{}/cron-runs", base_url()))
            .json(&json!({
                "product_id": 1,
                "cron_script_id": 1,
                "collection_days": []
            }))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 400, "Expected 400 Bad Request");
    }

    #[tokio::test]
    async fn test_cron_run_recorded_and_captured() {
        let client = reqwest::Client::new();
        let res = client
            .post(format!("{}/cron-runs", base_url()))
            .json(&json!({
                "product_id": 424242,
                "cron_script_id": 1,
                "collection_days": ["2023-03-04", "2023-03-02", "2023-03-03"]
            }))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 201, "Expected 201 Created");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(body["data"]["interval_start"], "2023-03-02");
        assert_eq!(body["data"]["interval_end"], "2023-03-04");

        let res = client
            .get(format!(
                "{}/cron-runs/last-capture?product_id=424242&use_post_date=true",
                base_url()
            ))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 200, "Expected 200 OK");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert!(
            body["data"]["post_date"].is_string(),
            "Post date mode should return a date"
        );
    }

    #[tokio::test]
    async fn test_kpi_put_rejects_negative_count() {
        let client = reqwest::Client::new();
        let res = client
            .put(format!("{}/kpi-inputs/2023-05-01/1", base_url()))
            .json(&json!({"field": "transactions", "count": "-3"}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 400, "Expected 400 Bad Request");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(body["error"].as_str().unwrap(), "Must be a number.");
    }

    #[tokio::test]
    async fn test_kpi_put_then_get_day() {
        let client = reqwest::Client::new();
        let res = client
            .put(format!("{}/kpi-inputs/2023-05-02/7", base_url()))
            .json(&json!({"field": "chargebacks", "count": "4"}))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 200, "Expected 200 OK");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(body["message"], "Updated.");
        assert_eq!(body["data"]["num_chargebacks_for_day_visa_only"], 4);

        let res = client
            .get(format!("{}/kpi-inputs/2023-05-02", base_url()))
            .send()
            .await
            .expect("Failed to send request");

        assert_eq!(res.status(), 200, "Expected 200 OK");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        assert_eq!(body["data"]["7"]["count_cb"], 4);

        let res = client
            .get(format!("{}/kpi-inputs/month/2023-05", base_url()))
            .send()
            .await
            .expect("Failed to send request");

        let body: serde_json::Value = res.json().await.expect("Failed to parse response");
        let rows = body["data"].as_array().expect("Monthly list should be an array");
        assert!(rows
            .iter()
            .any(|row| row["report_day"] == "2023-05-02" && row["product_id"] == 7));
    }
}
