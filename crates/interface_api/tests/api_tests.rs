//! Router tests against the in-memory ledger

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use domain_fees::FeeLedgerPort;
use interface_api::auth::{create_token, permissions};
use interface_api::config::ApiConfig;
use interface_api::create_router;
use test_utils::{InvoiceBuilder, LedgerFixture};

const SECRET: &str = "router-test-secret";

fn app(fixture: &LedgerFixture) -> Router {
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        ..ApiConfig::default()
    };
    create_router(fixture.service.clone(), config)
}

fn token(roles: &[&str]) -> String {
    create_token(
        "staff-7",
        roles.iter().map(|r| r.to_string()).collect(),
        SECRET,
        300,
    )
    .unwrap()
}

fn admin() -> String {
    token(&["admin"])
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(bearer) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {bearer}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

// ============================================================================
// Health & Auth
// ============================================================================

mod auth_tests {
    use super::*;

    #[tokio::test]
    async fn test_health_is_public() {
        let fixture = LedgerFixture::new();
        let (status, body) = send(app(&fixture), "GET", "/health", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_readiness_reports_adapters() {
        let fixture = LedgerFixture::new();
        let (status, body) = send(app(&fixture), "GET", "/health/ready", None, None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["adapters"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_api_requires_bearer_token() {
        let fixture = LedgerFixture::new();
        let (status, _) = send(app(&fixture), "GET", "/api/v1/fee-structures", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let (status, _) =
            send(app(&fixture), "GET", "/api/v1/fee-structures", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_missing_permission_is_forbidden() {
        let fixture = LedgerFixture::new();
        let reader = token(&[permissions::FEES_READ]);
        let body = json!({ "name": "Karate", "amount": "1500" });

        let (status, body) =
            send(app(&fixture), "POST", "/api/v1/fee-structures", Some(&reader), Some(body)).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "forbidden");
    }
}

// ============================================================================
// Catalog & Enrollment
// ============================================================================

mod catalog_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_list_fee_structures() {
        let fixture = LedgerFixture::new();
        let body = json!({ "name": "Karate", "amount": "1500.00", "description": "Evening batch" });

        let (status, created) =
            send(app(&fixture), "POST", "/api/v1/fee-structures", Some(&admin()), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["name"], "Karate");

        let (status, listed) =
            send(app(&fixture), "GET", "/api/v1/fee-structures", Some(&admin()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let fixture = LedgerFixture::new();
        fixture.fee_structure("Karate", dec!(1500)).await;
        let body = json!({ "name": "KARATE", "amount": "900" });

        let (status, body) =
            send(app(&fixture), "POST", "/api/v1/fee-structures", Some(&admin()), Some(body)).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "conflict");
    }

    #[tokio::test]
    async fn test_blank_name_fails_validation() {
        let fixture = LedgerFixture::new();
        let body = json!({ "name": "", "amount": "900" });

        let (status, body) =
            send(app(&fixture), "POST", "/api/v1/fee-structures", Some(&admin()), Some(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["details"][0].as_str().unwrap().starts_with("name"));
    }

    #[tokio::test]
    async fn test_non_positive_amount_is_rejected() {
        let fixture = LedgerFixture::new();
        let fee = fixture.fee_structure("Yoga", dec!(700)).await;
        let uri = format!("/api/v1/fee-structures/{}/amount", fee.id.as_uuid());

        let (status, _) =
            send(app(&fixture), "PUT", &uri, Some(&admin()), Some(json!({ "amount": "0" }))).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_amount_beyond_storage_maximum_is_rejected() {
        let fixture = LedgerFixture::new();
        let body = json!({ "name": "Sailing", "amount": "50000000000000000000000000000" });

        let (status, body) =
            send(app(&fixture), "POST", "/api/v1/fee-structures", Some(&admin()), Some(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert!(fixture.service.list_fee_structures().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enroll_and_deactivate() {
        let fixture = LedgerFixture::new();
        let student = fixture.active_student().await;
        let fee = fixture.fee_structure("Swimming", dec!(1200)).await;
        let body = json!({
            "student_id": student.id.as_uuid(),
            "fee_structure_id": fee.id.as_uuid(),
            "start_date": "2024-01-10"
        });

        let (status, enrollment) =
            send(app(&fixture), "POST", "/api/v1/enrollments", Some(&admin()), Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(enrollment["status"], "active");

        let uri = format!(
            "/api/v1/enrollments/{}/deactivate",
            enrollment["id"].as_str().unwrap()
        );
        let (status, deactivated) = send(app(&fixture), "POST", &uri, Some(&admin()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deactivated["status"], "inactive");
    }

    #[tokio::test]
    async fn test_enroll_with_unknown_fee_structure_is_not_found() {
        let fixture = LedgerFixture::new();
        let student = fixture.active_student().await;
        let body = json!({
            "student_id": student.id.as_uuid(),
            "fee_structure_id": uuid::Uuid::new_v4(),
        });

        let (status, _) =
            send(app(&fixture), "POST", "/api/v1/enrollments", Some(&admin()), Some(body)).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

// ============================================================================
// Ledger
// ============================================================================

mod ledger_tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_overpayment_returns_remainder() {
        let fixture = LedgerFixture::new();
        let (student, _, _) = fixture.enrolled_student(dec!(2000)).await;
        let cashier = token(&[permissions::PAYMENTS_COLLECT]);
        let body = json!({
            "student_id": student.id.as_uuid(),
            "amount": "2500",
            "payment_method": "Cash"
        });

        let (status, receipt) =
            send(app(&fixture), "POST", "/api/v1/payments/collect", Some(&cashier), Some(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&receipt["amount_applied"]), dec!(2000));
        assert_eq!(decimal(&receipt["remainder"]), dec!(500));
        assert_eq!(receipt["allocations"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_collect_rejects_zero_amount_and_writes_nothing() {
        let fixture = LedgerFixture::new();
        let (student, _, _) = fixture.enrolled_student(dec!(2000)).await;
        let body = json!({
            "student_id": student.id.as_uuid(),
            "amount": "0",
            "payment_method": "cash"
        });

        let (status, body) =
            send(app(&fixture), "POST", "/api/v1/payments/collect", Some(&admin()), Some(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(fixture.ledger.payment_count().await, 0);
    }

    #[tokio::test]
    async fn test_collect_rejects_sub_cent_amount_and_writes_nothing() {
        let fixture = LedgerFixture::new();
        let (student, _, _) = fixture.enrolled_student(dec!(2000)).await;
        let body = json!({
            "student_id": student.id.as_uuid(),
            "amount": "2000.005",
            "payment_method": "cash"
        });

        let (status, body) =
            send(app(&fixture), "POST", "/api/v1/payments/collect", Some(&admin()), Some(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(fixture.ledger.payment_count().await, 0);
        assert_eq!(fixture.ledger.allocation_count().await, 0);
    }

    #[tokio::test]
    async fn test_collect_for_inactive_student_is_rejected() {
        let fixture = LedgerFixture::new();
        let student = fixture.student_with_status("suspended").await;
        let body = json!({
            "student_id": student.id.as_uuid(),
            "amount": "100",
            "payment_method": "cash"
        });

        let (status, _) =
            send(app(&fixture), "POST", "/api/v1/payments/collect", Some(&admin()), Some(body)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_fee_calculation_suggests_pending_balance() {
        let fixture = LedgerFixture::new();
        let (student, _, _) = fixture.enrolled_student(dec!(2000)).await;
        let uri = format!("/api/v1/students/{}/fee-calculation", student.id.as_uuid());

        let (status, view) = send(app(&fixture), "GET", &uri, Some(&admin()), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(decimal(&view["monthly_fee"]), dec!(2000));
        assert_eq!(decimal(&view["pending_amount"]), dec!(2000));
        assert_eq!(decimal(&view["suggested_amount"]), dec!(2000));
        assert_eq!(view["per_charge"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_generate_for_reference_date_is_idempotent() {
        let fixture = LedgerFixture::new();
        let (student, _, _) = fixture.enrolled_student(dec!(800)).await;
        let uri = format!(
            "/api/v1/students/{}/invoices/generate?reference_date=2024-03-15",
            student.id.as_uuid()
        );

        let (status, first) = send(app(&fixture), "POST", &uri, Some(&admin()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["month"], 3);
        assert_eq!(first["created"].as_array().unwrap().len(), 1);

        let (_, second) = send(app(&fixture), "POST", &uri, Some(&admin()), None).await;
        assert!(second["created"].as_array().unwrap().is_empty());
        assert_eq!(second["existing"], 1);
    }

    #[tokio::test]
    async fn test_invoices_and_payments_history() {
        let fixture = LedgerFixture::new();
        let student = fixture.active_student().await;
        for (month, amount) in [(1, dec!(500)), (2, dec!(300))] {
            fixture
                .ledger
                .put_invoice_unchecked(
                    InvoiceBuilder::new()
                        .for_student(student.id)
                        .in_period(month, 2024)
                        .with_amount(amount)
                        .build(),
                )
                .await;
        }
        let body = json!({
            "student_id": student.id.as_uuid(),
            "amount": "600",
            "payment_method": "upi",
            "notes": "January and part of February"
        });
        let (status, _) =
            send(app(&fixture), "POST", "/api/v1/payments/collect", Some(&admin()), Some(body)).await;
        assert_eq!(status, StatusCode::OK);

        let uri = format!("/api/v1/students/{}/invoices", student.id.as_uuid());
        let (_, invoices) = send(app(&fixture), "GET", &uri, Some(&admin()), None).await;
        let invoices = invoices.as_array().unwrap();
        assert_eq!(invoices[0]["status"], "paid");
        assert_eq!(invoices[1]["status"], "partial");
        assert_eq!(decimal(&invoices[1]["balance_due"]), dec!(200));

        let uri = format!("/api/v1/students/{}/payments", student.id.as_uuid());
        let (_, payments) = send(app(&fixture), "GET", &uri, Some(&admin()), None).await;
        assert_eq!(decimal(&payments[0]["unallocated"]), dec!(0));
        assert_eq!(payments[0]["allocations"].as_array().unwrap().len(), 2);
        assert_eq!(fixture.ledger.list_payments(student.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_student_is_rejected() {
        let fixture = LedgerFixture::new();
        let uri = format!("/api/v1/students/{}/invoices", uuid::Uuid::new_v4());

        let (status, _) = send(app(&fixture), "GET", &uri, Some(&admin()), None).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}
