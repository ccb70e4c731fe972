mod common;

use assert_matches::assert_matches;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use uuid::Uuid;

use common::*;
use stockflow::errors::ServiceError;
use stockflow::models::stock_transfer_entity::{Entity as StockTransfer, TransferStatus};
use stockflow::models::{stock_movement_entity, MovementType};

struct TransferScene {
    company_id: Uuid,
    origin_id: Uuid,
    destination_id: Uuid,
    product_id: Uuid,
}

async fn transfer_scene(app: &TestApp) -> TransferScene {
    let company = create_test_company(&app.db, "Acme Logistics", Uuid::new_v4()).await;
    let origin = create_test_warehouse(&app.db, company.id, "Origin", "Rotterdam").await;
    let destination = create_test_warehouse(&app.db, company.id, "Destination", "Antwerp").await;
    let product = create_test_product(&app.db, company.id, "Pallet jack", "PJ-100").await;
    TransferScene {
        company_id: company.id,
        origin_id: origin.id,
        destination_id: destination.id,
        product_id: product.id,
    }
}

#[tokio::test]
async fn create_transfer_starts_pending() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    assert_eq!(transfer.status, TransferStatus::Pending);
    assert!(!transfer.out_approved);
    assert!(!transfer.in_approved);
    assert_eq!(transfer.quantity, 4);
    // Creation never touches the ledger.
    assert_eq!(stock_of(&app.db, scene.origin_id, scene.product_id).await, 0);
}

#[tokio::test]
async fn create_rejects_same_warehouse() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;

    let err = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.origin_id,
            4,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn create_rejects_cross_company_warehouses() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    let other_company = create_test_company(&app.db, "Rival Goods", Uuid::new_v4()).await;
    let foreign_warehouse =
        create_test_warehouse(&app.db, other_company.id, "Foreign", "Hamburg").await;

    let err = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            foreign_warehouse.id,
            4,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("same company"));
}

#[tokio::test]
async fn create_rejects_foreign_actor() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    let other_company = create_test_company(&app.db, "Rival Goods", Uuid::new_v4()).await;

    let err = app
        .services
        .transfers
        .create_transfer(
            manager_of(other_company.id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PermissionDenied(_));
}

#[tokio::test]
async fn create_rejects_nonpositive_quantity() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;

    for quantity in [0, -3] {
        let err = app
            .services
            .transfers
            .create_transfer(
                manager_of(scene.company_id),
                scene.product_id,
                scene.origin_id,
                scene.destination_id,
                quantity,
            )
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
}

#[tokio::test]
async fn create_requires_manager_or_owner() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;

    let err = app
        .services
        .transfers
        .create_transfer(
            employee_at(scene.company_id, scene.origin_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PermissionDenied(_));
}

#[tokio::test]
async fn full_approval_moves_stock() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    set_stock(&app.db, scene.origin_id, scene.product_id, 10).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    let first = app
        .services
        .transfers
        .approve_out(employee_at(scene.company_id, scene.origin_id), transfer.id)
        .await
        .unwrap();
    assert!(!first.settled);
    assert_eq!(first.transfer.status, TransferStatus::Pending);

    let second = app
        .services
        .transfers
        .approve_in(
            employee_at(scene.company_id, scene.destination_id),
            transfer.id,
        )
        .await
        .unwrap();
    assert!(second.settled);
    assert_eq!(second.transfer.status, TransferStatus::Completed);

    let origin_stock = stock_of(&app.db, scene.origin_id, scene.product_id).await;
    let destination_stock = stock_of(&app.db, scene.destination_id, scene.product_id).await;
    assert_eq!(origin_stock, 6);
    assert_eq!(destination_stock, 4);
    assert_eq!(origin_stock + destination_stock, 10, "settlement must conserve stock");

    let movements = stock_movement_entity::Entity::find()
        .filter(stock_movement_entity::Column::ReferenceId.eq(transfer.id))
        .all(app.db.as_ref())
        .await
        .unwrap();
    assert_eq!(movements.len(), 2);
    for movement in &movements {
        assert_eq!(movement.reference_type.as_deref(), Some("stock_transfer"));
        assert_eq!(movement.quantity, 4);
    }
    let out_row = movements
        .iter()
        .find(|m| m.movement_type == MovementType::Out)
        .unwrap();
    assert_eq!(out_row.warehouse_id, scene.origin_id);
    let in_row = movements
        .iter()
        .find(|m| m.movement_type == MovementType::In)
        .unwrap();
    assert_eq!(in_row.warehouse_id, scene.destination_id);
}

#[tokio::test]
async fn settlement_with_insufficient_stock_stays_pending_and_retries() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    set_stock(&app.db, scene.origin_id, scene.product_id, 2).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    app.services
        .transfers
        .approve_out(employee_at(scene.company_id, scene.origin_id), transfer.id)
        .await
        .unwrap();

    let err = app
        .services
        .transfers
        .approve_in(
            employee_at(scene.company_id, scene.destination_id),
            transfer.id,
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InsufficientStock(_));

    // The approval itself committed; only the settlement rolled back.
    let current = StockTransfer::find_by_id(transfer.id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(current.status, TransferStatus::Pending);
    assert!(current.out_approved);
    assert!(current.in_approved);
    assert_eq!(stock_of(&app.db, scene.origin_id, scene.product_id).await, 2);
    assert_eq!(
        stock_of(&app.db, scene.destination_id, scene.product_id).await,
        0
    );

    // Once stock arrives the same transfer settles without new approvals.
    set_stock(&app.db, scene.origin_id, scene.product_id, 10).await;
    let outcome = app.services.transfers.try_settle(transfer.id).await.unwrap();
    assert!(outcome.settled);
    assert_eq!(outcome.transfer.status, TransferStatus::Completed);
    assert_eq!(stock_of(&app.db, scene.origin_id, scene.product_id).await, 6);
    assert_eq!(
        stock_of(&app.db, scene.destination_id, scene.product_id).await,
        4
    );
}

#[tokio::test]
async fn manager_cannot_approve() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    let err = app
        .services
        .transfers
        .approve_out(manager_of(scene.company_id), transfer.id)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PermissionDenied(ref msg) if msg.contains("Manager"));
}

#[tokio::test]
async fn third_warehouse_employee_cannot_approve() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    let third = create_test_warehouse(&app.db, scene.company_id, "Third", "Bremen").await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    let err = app
        .services
        .transfers
        .approve_out(employee_at(scene.company_id, third.id), transfer.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PermissionDenied(_));

    let current = StockTransfer::find_by_id(transfer.id)
        .one(app.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(!current.out_approved);
    assert!(!current.in_approved);
}

#[tokio::test]
async fn employee_cannot_approve_opposite_side() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    // The origin clerk may confirm only the outgoing side.
    let err = app
        .services
        .transfers
        .approve_in(employee_at(scene.company_id, scene.origin_id), transfer.id)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::PermissionDenied(_));
}

#[tokio::test]
async fn owner_can_force_both_sides() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    set_stock(&app.db, scene.origin_id, scene.product_id, 10).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            owner_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    let owner = owner_of(scene.company_id);
    app.services
        .transfers
        .approve_out(owner.clone(), transfer.id)
        .await
        .unwrap();
    let result = app
        .services
        .transfers
        .approve_in(owner, transfer.id)
        .await
        .unwrap();

    assert!(result.settled);
    assert_eq!(stock_of(&app.db, scene.origin_id, scene.product_id).await, 6);
    assert_eq!(
        stock_of(&app.db, scene.destination_id, scene.product_id).await,
        4
    );
}

#[tokio::test]
async fn reapproval_is_idempotent() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    set_stock(&app.db, scene.origin_id, scene.product_id, 10).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    let out_clerk = employee_at(scene.company_id, scene.origin_id);
    let first = app
        .services
        .transfers
        .approve_out(out_clerk.clone(), transfer.id)
        .await
        .unwrap();
    let second = app
        .services
        .transfers
        .approve_out(out_clerk, transfer.id)
        .await
        .unwrap();

    assert!(!first.settled);
    assert!(!second.settled);
    assert!(second.transfer.out_approved);
    assert_eq!(second.transfer.status, TransferStatus::Pending);

    let result = app
        .services
        .transfers
        .approve_in(
            employee_at(scene.company_id, scene.destination_id),
            transfer.id,
        )
        .await
        .unwrap();
    assert!(result.settled);
    // Stock moved exactly once despite the duplicate approval.
    assert_eq!(stock_of(&app.db, scene.origin_id, scene.product_id).await, 6);
    assert_eq!(
        stock_of(&app.db, scene.destination_id, scene.product_id).await,
        4
    );
}

#[tokio::test]
async fn approving_completed_transfer_is_rejected() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    set_stock(&app.db, scene.origin_id, scene.product_id, 10).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    let owner = owner_of(scene.company_id);
    app.services
        .transfers
        .approve_out(owner.clone(), transfer.id)
        .await
        .unwrap();
    app.services
        .transfers
        .approve_in(owner.clone(), transfer.id)
        .await
        .unwrap();

    let err = app
        .services
        .transfers
        .approve_out(owner, transfer.id)
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::Conflict(_));
    assert_eq!(stock_of(&app.db, scene.origin_id, scene.product_id).await, 6);
    assert_eq!(
        stock_of(&app.db, scene.destination_id, scene.product_id).await,
        4
    );
}

#[tokio::test]
async fn try_settle_is_idempotent_after_completion() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    set_stock(&app.db, scene.origin_id, scene.product_id, 10).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            owner_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();
    let owner = owner_of(scene.company_id);
    app.services
        .transfers
        .approve_out(owner.clone(), transfer.id)
        .await
        .unwrap();
    app.services
        .transfers
        .approve_in(owner, transfer.id)
        .await
        .unwrap();

    let again = app.services.transfers.try_settle(transfer.id).await.unwrap();
    assert!(!again.settled);
    assert_eq!(again.transfer.status, TransferStatus::Completed);
    assert_eq!(stock_of(&app.db, scene.origin_id, scene.product_id).await, 6);
    assert_eq!(
        stock_of(&app.db, scene.destination_id, scene.product_id).await,
        4
    );
}

#[tokio::test]
async fn try_settle_before_full_approval_is_noop() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    set_stock(&app.db, scene.origin_id, scene.product_id, 10).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();
    app.services
        .transfers
        .approve_out(employee_at(scene.company_id, scene.origin_id), transfer.id)
        .await
        .unwrap();

    let outcome = app.services.transfers.try_settle(transfer.id).await.unwrap();

    assert!(!outcome.settled);
    assert_eq!(outcome.transfer.status, TransferStatus::Pending);
    assert_eq!(stock_of(&app.db, scene.origin_id, scene.product_id).await, 10);
}

#[tokio::test]
async fn transfers_listing_scoped_by_company() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    let other = transfer_scene(&app).await;

    let ours = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();
    app.services
        .transfers
        .create_transfer(
            manager_of(other.company_id),
            other.product_id,
            other.origin_id,
            other.destination_id,
            2,
        )
        .await
        .unwrap();

    let listed = app
        .services
        .transfers
        .list_transfers(&manager_of(scene.company_id))
        .await
        .unwrap();

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, ours.id);
}

#[tokio::test]
async fn get_transfer_hides_other_companies() {
    let app = TestApp::new().await;
    let scene = transfer_scene(&app).await;
    let other = transfer_scene(&app).await;

    let transfer = app
        .services
        .transfers
        .create_transfer(
            manager_of(scene.company_id),
            scene.product_id,
            scene.origin_id,
            scene.destination_id,
            4,
        )
        .await
        .unwrap();

    let found = app
        .services
        .transfers
        .get_transfer(&manager_of(scene.company_id), transfer.id)
        .await
        .unwrap();
    assert_eq!(found.id, transfer.id);

    let err = app
        .services
        .transfers
        .get_transfer(&manager_of(other.company_id), transfer.id)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
