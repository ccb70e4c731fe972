//! Stress tests for the concurrent paths.
//!
//! Ignored by default so the regular suite stays fast; run with
//! `cargo test -- --ignored`.

mod common;

use sea_orm::EntityTrait;
use uuid::Uuid;

use common::*;
use stockflow::models::stock_transfer_entity::{Entity as StockTransfer, TransferStatus};
use stockflow::models::MovementType;

#[tokio::test]
#[ignore]
async fn concurrent_debits_never_overdraw() {
    let app = TestApp::new().await;
    let company = create_test_company(&app.db, "Acme Logistics", Uuid::new_v4()).await;
    let warehouse = create_test_warehouse(&app.db, company.id, "Central", "Rotterdam").await;
    let product = create_test_product(&app.db, company.id, "Pallet jack", "PJ-100").await;
    set_stock(&app.db, warehouse.id, product.id, 10).await;

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let adjustments = app.services.adjustments.clone();
        let clerk = employee_at(company.id, warehouse.id);
        let product_id = product.id;
        tasks.push(tokio::spawn(async move {
            adjustments
                .adjust(clerk, product_id, 1, MovementType::Out)
                .await
        }));
    }

    let mut successes = 0;
    for task in tasks {
        if task.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(
        successes, 10,
        "exactly ten unit debits can succeed; got {}",
        successes
    );
    assert_eq!(stock_of(&app.db, warehouse.id, product.id).await, 0);
}

#[tokio::test]
#[ignore]
async fn concurrent_settlement_moves_stock_once() {
    let app = TestApp::new().await;
    let company = create_test_company(&app.db, "Acme Logistics", Uuid::new_v4()).await;
    let origin = create_test_warehouse(&app.db, company.id, "Origin", "Rotterdam").await;
    let destination = create_test_warehouse(&app.db, company.id, "Destination", "Antwerp").await;
    let product = create_test_product(&app.db, company.id, "Pallet jack", "PJ-100").await;
    set_stock(&app.db, origin.id, product.id, 10).await;

    let transfer =
        create_approved_transfer(&app.db, product.id, origin.id, destination.id, 4).await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let transfers = app.services.transfers.clone();
        let transfer_id = transfer.id;
        tasks.push(tokio::spawn(
            async move { transfers.try_settle(transfer_id).await },
        ));
    }

    let mut settled = 0;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        if outcome.settled {
            settled += 1;
        }
    }

    assert_eq!(settled, 1, "settlement must happen exactly once");
    let current = StockTransfer::find_by_id(transfer.id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.status, TransferStatus::Completed);
    assert_eq!(stock_of(&app.db, origin.id, product.id).await, 6);
    assert_eq!(stock_of(&app.db, destination.id, product.id).await, 4);
}

#[tokio::test]
#[ignore]
async fn racing_final_approvals_settle_once() {
    let app = TestApp::new().await;
    let company = create_test_company(&app.db, "Acme Logistics", Uuid::new_v4()).await;
    let origin = create_test_warehouse(&app.db, company.id, "Origin", "Rotterdam").await;
    let destination = create_test_warehouse(&app.db, company.id, "Destination", "Antwerp").await;
    let product = create_test_product(&app.db, company.id, "Pallet jack", "PJ-100").await;
    set_stock(&app.db, origin.id, product.id, 10).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(company.id),
            product.id,
            origin.id,
            destination.id,
            4,
        )
        .await
        .unwrap();

    let out_task = {
        let transfers = app.services.transfers.clone();
        let clerk = employee_at(company.id, origin.id);
        let transfer_id = transfer.id;
        tokio::spawn(async move { transfers.approve_out(clerk, transfer_id).await })
    };
    let in_task = {
        let transfers = app.services.transfers.clone();
        let clerk = employee_at(company.id, destination.id);
        let transfer_id = transfer.id;
        tokio::spawn(async move { transfers.approve_in(clerk, transfer_id).await })
    };

    let out_result = out_task.await.unwrap().unwrap();
    let in_result = in_task.await.unwrap().unwrap();

    let settled = [&out_result, &in_result]
        .iter()
        .filter(|r| r.settled)
        .count();
    assert_eq!(settled, 1, "whichever approval lands last settles");
    assert_eq!(stock_of(&app.db, origin.id, product.id).await, 6);
    assert_eq!(stock_of(&app.db, destination.id, product.id).await, 4);
}
