use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use fulfillment_engine::{
    db_types::{MerchantWithdrawal, Role, WithdrawalStatus},
    withdrawal_objects::MerchantBalance,
    FulfillmentError,
    FulfillmentSettings,
    WithdrawalApi,
};
use market_common::Money;
use mockall::predicate::eq;
use serde_json::json;

use super::{
    helpers::{api_request, as_actor, body_json},
    mocks::MockWithdrawals,
};
use crate::routes::{
    CancelWithdrawalRoute,
    MerchantBalanceRoute,
    MyWithdrawalsRoute,
    ProcessWithdrawalRoute,
    RequestWithdrawalRoute,
    SearchWithdrawalsRoute,
};

const MERCHANT: i64 = 21;
const ADMIN: i64 = 1;

fn withdrawal(id: i64, amount: Money, status: WithdrawalStatus) -> MerchantWithdrawal {
    MerchantWithdrawal {
        id,
        merchant_id: MERCHANT,
        amount,
        bank_name: Some("BCA".into()),
        bank_account_number: Some("1234567890".into()),
        bank_account_name: Some("Bob's Bakery".into()),
        status,
        ..Default::default()
    }
}

fn configure(cfg: &mut ServiceConfig) {
    let mut db = MockWithdrawals::new();
    db.expect_fetch_balance().with(eq(MERCHANT)).returning(|_| {
        let balance = MerchantBalance {
            total_earnings: Money::from_major(500_000),
            pending_balance: Money::from_major(58_500),
            total_revenue: Money::from_major(555_000),
            withdrawn_amount: Money::from_major(100_000),
            pending_withdrawal: Money::from_major(50_000),
            ..Default::default()
        };
        Ok(balance.with_available_balance())
    });
    db.expect_request_withdrawal().returning(|merchant_id, amount, _| {
        if amount > Money::from_major(350_000) {
            return Err(FulfillmentError::InsufficientBalance(Money::from_major(350_000)));
        }
        Ok(MerchantWithdrawal { merchant_id, ..withdrawal(9, amount, WithdrawalStatus::Pending) })
    });
    db.expect_cancel_withdrawal().with(eq(MERCHANT), eq(8)).returning(|_, _| {
        Err(FulfillmentError::InvalidTransition("Withdrawal #8 is processing and can no longer be cancelled".into()))
    });
    db.expect_search_withdrawals().with(eq(Some(WithdrawalStatus::Pending))).returning(|_| {
        Ok(vec![
            withdrawal(7, Money::from_major(20_000), WithdrawalStatus::Pending),
            withdrawal(9, Money::from_major(15_000), WithdrawalStatus::Pending),
        ])
    });
    db.expect_search_withdrawals().with(eq(None)).returning(|_| Ok(vec![]));
    db.expect_process_withdrawal()
        .withf(|admin, id, decision| {
            *admin == ADMIN && *id == 7 && decision.status == WithdrawalStatus::Rejected && decision.reason.is_some()
        })
        .returning(|admin, id, decision| {
            Ok(MerchantWithdrawal {
                reject_reason: decision.reason.clone(),
                processed_by: Some(admin),
                ..withdrawal(id, Money::from_major(20_000), WithdrawalStatus::Rejected)
            })
        });
    let api = WithdrawalApi::new(db, &FulfillmentSettings::default());
    cfg.service(MerchantBalanceRoute::<MockWithdrawals>::new())
        .service(MyWithdrawalsRoute::<MockWithdrawals>::new())
        .service(RequestWithdrawalRoute::<MockWithdrawals>::new())
        .service(CancelWithdrawalRoute::<MockWithdrawals>::new())
        .service(SearchWithdrawalsRoute::<MockWithdrawals>::new())
        .service(ProcessWithdrawalRoute::<MockWithdrawals>::new())
        .app_data(web::Data::new(api));
}

#[actix_web::test]
async fn merchant_balance() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/merchant/balance"), MERCHANT, Role::Merchant);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    let balance = body_json(&body);
    assert_eq!(balance["total_earnings"], 50_000_000);
    // 500,000 - 100,000 - 50,000
    assert_eq!(balance["available_balance"], 35_000_000);
}

#[actix_web::test]
async fn request_withdrawal() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::post().uri("/api/merchant/withdrawals"), MERCHANT, Role::Merchant)
        .set_json(json!({ "amount": 2_000_000, "notes": "Flour supplier" }));
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::CREATED);
    let withdrawal = body_json(&body);
    assert_eq!(withdrawal["amount"], 2_000_000);
    assert_eq!(withdrawal["status"], "pending");
    assert_eq!(withdrawal["bank_name"], "BCA");
}

#[actix_web::test]
async fn withdrawal_below_minimum() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::post().uri("/api/merchant/withdrawals"), MERCHANT, Role::Merchant)
        .set_json(json!({ "amount": 999_999 }));
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, r#"{"error":"The minimum withdrawal amount is 10000.00"}"#);
}

#[actix_web::test]
async fn withdrawal_above_balance() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::post().uri("/api/merchant/withdrawals"), MERCHANT, Role::Merchant)
        .set_json(json!({ "amount": 40_000_000 }));
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, r#"{"error":"Insufficient balance. Available: 350000.00"}"#);
}

#[actix_web::test]
async fn malformed_withdrawal_request() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::post().uri("/api/merchant/withdrawals"), MERCHANT, Role::Merchant)
        .set_json(json!({ "notes": "no amount" }));
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body_json(&body)["error"].as_str().is_some_and(|e| e.starts_with("Could not read request body")));
}

#[actix_web::test]
async fn cancel_processing_withdrawal() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::post().uri("/api/merchant/withdrawals/8/cancel"), MERCHANT, Role::Merchant);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body, r#"{"error":"Invalid transition. Withdrawal #8 is processing and can no longer be cancelled"}"#);
}

#[actix_web::test]
async fn admin_lists_pending_withdrawals() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/admin/withdrawals?status=pending"), ADMIN, Role::Admin);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    let withdrawals = body_json(&body);
    assert_eq!(withdrawals[0]["id"], 7);
    assert_eq!(withdrawals[1]["id"], 9);
}

#[actix_web::test]
async fn unknown_status_filter() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/admin/withdrawals?status=lost"), ADMIN, Role::Admin);
    let (status, _) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn merchants_cannot_search_withdrawals() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::get().uri("/api/admin/withdrawals"), MERCHANT, Role::Merchant);
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Insufficient permissions.");
}

#[actix_web::test]
async fn admin_rejects_withdrawal() {
    let _ = env_logger::try_init();
    let req = as_actor(TestRequest::post().uri("/api/admin/withdrawals/7/process"), ADMIN, Role::Admin)
        .set_json(json!({ "status": "rejected", "reason": "Account name does not match" }));
    let (status, body) = api_request(req, configure).await;
    assert_eq!(status, StatusCode::OK);
    let withdrawal = body_json(&body);
    assert_eq!(withdrawal["status"], "rejected");
    assert_eq!(withdrawal["reject_reason"], "Account name does not match");
    assert_eq!(withdrawal["processed_by"], ADMIN);
}
