//! Production runs against the active BOM.
//!
//! A run consumes every component and receives the finished item inside one
//! transaction. Its ledger rows carry the batch id. An idempotency key turns
//! a retried request into a read of the batch that was already produced.

use chrono::Utc;
use metrics::{counter, histogram};
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use super::{
    bom::active_bom,
    map_unique_violation,
    stock::{apply_in_txn, MovementRequest, StockService},
};
use crate::{
    entities::{production_batch, stock_movement},
    errors::ServiceError,
    events::{Event, EventSender},
    models::{ledger::MovementKind, within_storage},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProduceInput {
    pub item_id: Uuid,
    pub warehouse_id: Uuid,
    pub quantity: Decimal,
    #[validate(length(max = 120))]
    pub reference: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductionOutcome {
    pub batch: production_batch::Model,
    pub movements: Vec<stock_movement::Model>,
    pub replayed: bool,
}

#[derive(Clone)]
pub struct ProductionService {
    db: Arc<DatabaseConnection>,
    event_sender: EventSender,
    stock: StockService,
}

impl ProductionService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: EventSender, stock: StockService) -> Self {
        Self {
            db,
            event_sender,
            stock,
        }
    }

    async fn replay(
        &self,
        input: &ProduceInput,
        key: &str,
    ) -> Result<Option<ProductionOutcome>, ServiceError> {
        let Some(batch) = production_batch::Entity::find()
            .filter(production_batch::Column::IdempotencyKey.eq(key))
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
        else {
            return Ok(None);
        };

        if batch.item_id != input.item_id
            || batch.warehouse_id != input.warehouse_id
            || batch.quantity != input.quantity
        {
            return Err(ServiceError::Conflict(format!(
                "Idempotency key {} was used for a different production run",
                key
            )));
        }

        let movements = stock_movement::Entity::find()
            .filter(stock_movement::Column::BatchId.eq(batch.id))
            .order_by_asc(stock_movement::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        info!(batch_id = %batch.id, idempotency_key = key, "Replaying production batch");
        Ok(Some(ProductionOutcome {
            batch,
            movements,
            replayed: true,
        }))
    }

    /// Produces `quantity` units of an item with its active BOM.
    #[instrument(skip(self, input), fields(item_id = %input.item_id, quantity = %input.quantity))]
    pub async fn produce(
        &self,
        input: ProduceInput,
        created_by: Option<Uuid>,
    ) -> Result<ProductionOutcome, ServiceError> {
        input.validate()?;
        if input.quantity <= Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Production quantity must be greater than zero".to_string(),
            ));
        }
        if within_storage(Some(input.quantity)).is_none() {
            return Err(ServiceError::ValidationError(
                "Production quantity is out of range".to_string(),
            ));
        }
        if let Some(key) = input.idempotency_key.as_deref() {
            if let Some(outcome) = self.replay(&input, key).await? {
                return Ok(outcome);
            }
        }

        match self.run(&input, created_by).await {
            Err(ServiceError::Conflict(msg)) => {
                // A concurrent request with the same key may have won.
                if let Some(key) = input.idempotency_key.as_deref() {
                    if let Some(outcome) = self.replay(&input, key).await? {
                        return Ok(outcome);
                    }
                }
                Err(ServiceError::Conflict(msg))
            }
            other => other,
        }
    }

    async fn run(
        &self,
        input: &ProduceInput,
        created_by: Option<Uuid>,
    ) -> Result<ProductionOutcome, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let bom = active_bom(&txn, input.item_id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("No active BOM for item {}", input.item_id))
        })?;

        let batch = production_batch::ActiveModel {
            id: Set(Uuid::new_v4()),
            item_id: Set(input.item_id),
            warehouse_id: Set(input.warehouse_id),
            bom_id: Set(bom.bom.id),
            quantity: Set(input.quantity),
            reference: Set(input.reference.clone()),
            idempotency_key: Set(input.idempotency_key.clone()),
            created_by: Set(created_by),
            created_at: Set(Utc::now()),
        }
        .insert(&txn)
        .await
        .map_err(|e| map_unique_violation(e, "Production batch already recorded"))?;

        let reason = Some(format!("Production batch {}", batch.id));
        let mut movements = Vec::with_capacity(bom.lines.len() + 1);
        for line in &bom.lines {
            let quantity = within_storage(input.quantity.checked_mul(line.quantity)).ok_or_else(|| {
                ServiceError::ValidationError("Production quantity is out of range".to_string())
            })?;
            let consumed = apply_in_txn(
                &txn,
                MovementRequest {
                    kind: MovementKind::Out,
                    item_id: line.component_id,
                    warehouse_id: input.warehouse_id,
                    to_warehouse_id: None,
                    quantity,
                    reference: input.reference.clone(),
                    reason: reason.clone(),
                    batch_id: Some(batch.id),
                    idempotency_key: None,
                    created_by,
                },
            )
            .await
            .map_err(|e| {
                warn!(component_id = %line.component_id, error = %e, "Production consumption failed");
                e
            })?;
            movements.extend(consumed);
        }

        movements.extend(
            apply_in_txn(
                &txn,
                MovementRequest {
                    kind: MovementKind::Produce,
                    item_id: input.item_id,
                    warehouse_id: input.warehouse_id,
                    to_warehouse_id: None,
                    quantity: input.quantity,
                    reference: input.reference.clone(),
                    reason,
                    batch_id: Some(batch.id),
                    idempotency_key: None,
                    created_by,
                },
            )
            .await?,
        );
        txn.commit().await.map_err(ServiceError::db_error)?;

        counter!("aberturas_production.batches", 1);
        histogram!(
            "aberturas_production.quantity",
            input.quantity.to_f64().unwrap_or(0.0)
        );
        info!(
            batch_id = %batch.id,
            bom_id = %bom.bom.id,
            version = bom.bom.version,
            components = bom.lines.len(),
            "Production batch completed"
        );

        self.stock.after_movements(&movements).await;
        self.event_sender
            .send_or_log(Event::ProductionCompleted {
                batch_id: batch.id,
                item_id: batch.item_id,
                quantity: batch.quantity,
            })
            .await;
        Ok(ProductionOutcome {
            batch,
            movements,
            replayed: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_memory_pool;
    use crate::entities::stock_item::ItemKind;
    use crate::services::bom::{BomLineInput, BomService, CreateBomInput};
    use crate::services::stock::{
        BalanceFilter, CreateItemInput, CreateWarehouseInput, MovementInput,
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    struct Plant {
        stock: StockService,
        boms: BomService,
        production: ProductionService,
        window: Uuid,
        profile: Uuid,
        glass: Uuid,
        warehouse: Uuid,
    }

    async fn plant() -> Plant {
        let db = Arc::new(migrated_memory_pool().await);
        let (tx, _rx) = mpsc::channel(128);
        let events = EventSender::new(tx);
        let stock = StockService::new(db.clone(), events.clone());
        let boms = BomService::new(db.clone(), events.clone());
        let production = ProductionService::new(db, events, stock.clone());

        let mut ids = Vec::new();
        for (sku, kind) in [
            ("VENT-120", ItemKind::FinishedGood),
            ("PERFIL", ItemKind::RawMaterial),
            ("VIDRIO", ItemKind::RawMaterial),
        ] {
            let item = stock
                .create_item(CreateItemInput {
                    sku: sku.to_string(),
                    name: sku.to_string(),
                    unit: "u".to_string(),
                    kind,
                    min_stock: None,
                })
                .await
                .unwrap();
            ids.push(item.id);
        }
        let warehouse = stock
            .create_warehouse(CreateWarehouseInput {
                code: "TALLER".to_string(),
                name: "Taller".to_string(),
                branch_id: None,
            })
            .await
            .unwrap()
            .id;

        Plant {
            stock,
            boms,
            production,
            window: ids[0],
            profile: ids[1],
            glass: ids[2],
            warehouse,
        }
    }

    impl Plant {
        async fn receive(&self, item_id: Uuid, quantity: Decimal) {
            self.stock
                .apply_movement(
                    MovementInput {
                        kind: MovementKind::In,
                        item_id,
                        warehouse_id: self.warehouse,
                        to_warehouse_id: None,
                        quantity,
                        reference: None,
                        reason: None,
                        idempotency_key: None,
                    },
                    None,
                )
                .await
                .unwrap();
        }

        async fn on_hand(&self, item_id: Uuid) -> Decimal {
            self.stock
                .list_balances(&BalanceFilter {
                    item_id: Some(item_id),
                    warehouse_id: Some(self.warehouse),
                })
                .await
                .unwrap()
                .first()
                .map(|b| b.on_hand)
                .unwrap_or_default()
        }

        async fn activate_bom(&self) {
            self.boms
                .create_bom(
                    CreateBomInput {
                        item_id: self.window,
                        name: None,
                        notes: None,
                        lines: vec![
                            BomLineInput {
                                component_id: self.profile,
                                quantity: dec!(4),
                                notes: None,
                            },
                            BomLineInput {
                                component_id: self.glass,
                                quantity: dec!(1),
                                notes: None,
                            },
                        ],
                        activate: true,
                    },
                    None,
                )
                .await
                .unwrap();
        }

        fn order(&self, quantity: Decimal, key: Option<&str>) -> ProduceInput {
            ProduceInput {
                item_id: self.window,
                warehouse_id: self.warehouse,
                quantity,
                reference: Some("OP-7".to_string()),
                idempotency_key: key.map(str::to_string),
            }
        }
    }

    #[tokio::test]
    async fn production_needs_an_active_bom() {
        let p = plant().await;
        assert_matches!(
            p.production.produce(p.order(dec!(1), None), None).await,
            Err(ServiceError::NotFound(_))
        );
    }

    #[tokio::test]
    async fn production_consumes_components_and_receives_the_item() {
        let p = plant().await;
        p.activate_bom().await;
        p.receive(p.profile, dec!(20)).await;
        p.receive(p.glass, dec!(5)).await;

        let outcome = p.production.produce(p.order(dec!(3), None), None).await.unwrap();
        assert_eq!(outcome.movements.len(), 3);
        assert!(outcome
            .movements
            .iter()
            .all(|m| m.batch_id == Some(outcome.batch.id)));
        assert_eq!(p.on_hand(p.profile).await, dec!(8));
        assert_eq!(p.on_hand(p.glass).await, dec!(2));
        assert_eq!(p.on_hand(p.window).await, dec!(3));
    }

    #[tokio::test]
    async fn shortage_rolls_back_the_whole_run() {
        let p = plant().await;
        p.activate_bom().await;
        p.receive(p.profile, dec!(20)).await;
        p.receive(p.glass, dec!(1)).await;

        assert_matches!(
            p.production.produce(p.order(dec!(2), None), None).await,
            Err(ServiceError::InsufficientStock(_))
        );
        assert_eq!(p.on_hand(p.profile).await, dec!(20));
        assert_eq!(p.on_hand(p.glass).await, dec!(1));
        assert_eq!(p.on_hand(p.window).await, dec!(0));
    }

    #[tokio::test]
    async fn retried_run_with_same_key_produces_once() {
        let p = plant().await;
        p.activate_bom().await;
        p.receive(p.profile, dec!(40)).await;
        p.receive(p.glass, dec!(10)).await;

        let first = p
            .production
            .produce(p.order(dec!(2), Some("op-7-a")), None)
            .await
            .unwrap();
        let retry = p
            .production
            .produce(p.order(dec!(2), Some("op-7-a")), None)
            .await
            .unwrap();
        assert!(retry.replayed);
        assert_eq!(retry.batch.id, first.batch.id);
        assert_eq!(retry.movements.len(), 3);
        assert_eq!(p.on_hand(p.window).await, dec!(2));

        assert_matches!(
            p.production
                .produce(p.order(dec!(5), Some("op-7-a")), None)
                .await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn oversized_runs_are_rejected_without_writes() {
        let p = plant().await;
        p.activate_bom().await;
        p.receive(p.profile, dec!(20)).await;

        for quantity in [Decimal::MAX, crate::models::max_stored_decimal()] {
            assert_matches!(
                p.production.produce(p.order(quantity, None), None).await,
                Err(ServiceError::ValidationError(_))
            );
        }
        assert_eq!(p.on_hand(p.profile).await, dec!(20));
        assert_eq!(p.on_hand(p.window).await, dec!(0));
    }
}
