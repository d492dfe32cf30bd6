use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::{EntityTrait, Schema};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_directory_tables::Migration),
            Box::new(m20240301_000002_create_crm_tables::Migration),
            Box::new(m20240301_000003_create_sales_tables::Migration),
            Box::new(m20240301_000004_create_stock_tables::Migration),
            Box::new(m20240315_000005_one_active_bom_per_item::Migration),
        ]
    }
}

/// Creates the table described by an entity, foreign keys and column-level
/// unique constraints included.
async fn create_entity_table<E>(manager: &SchemaManager<'_>, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait,
{
    let schema = Schema::new(manager.get_database_backend());
    manager
        .create_table(
            schema
                .create_table_from_entity(entity)
                .if_not_exists()
                .to_owned(),
        )
        .await
}

async fn drop_entity_table<E>(manager: &SchemaManager<'_>, entity: E) -> Result<(), DbErr>
where
    E: EntityTrait + 'static,
{
    manager
        .drop_table(Table::drop().table(entity).if_exists().to_owned())
        .await
}

mod m20240301_000001_create_directory_tables {
    use super::*;
    use crate::entities::{branch, user};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_directory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            create_entity_table(manager, branch::Entity).await?;
            create_entity_table(manager, user::Entity).await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_branch_id")
                        .table(user::Entity)
                        .col(user::Column::BranchId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            drop_entity_table(manager, user::Entity).await?;
            drop_entity_table(manager, branch::Entity).await
        }
    }
}

mod m20240301_000002_create_crm_tables {
    use super::*;
    use crate::entities::{customer, interaction, note, supplier};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_crm_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            create_entity_table(manager, customer::Entity).await?;
            create_entity_table(manager, note::Entity).await?;
            create_entity_table(manager, interaction::Entity).await?;
            create_entity_table(manager, supplier::Entity).await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customers_name")
                        .table(customer::Entity)
                        .col(customer::Column::Name)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_customer_notes_customer_id")
                        .table(note::Entity)
                        .col(note::Column::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_interactions_customer_id")
                        .table(interaction::Entity)
                        .col(interaction::Column::CustomerId)
                        .col(interaction::Column::OccurredAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            drop_entity_table(manager, supplier::Entity).await?;
            drop_entity_table(manager, interaction::Entity).await?;
            drop_entity_table(manager, note::Entity).await?;
            drop_entity_table(manager, customer::Entity).await
        }
    }
}

mod m20240301_000003_create_sales_tables {
    use super::*;
    use crate::entities::{project, quote, quote_stage_change, sequence, task};

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_sales_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            create_entity_table(manager, sequence::Entity).await?;
            create_entity_table(manager, quote::Entity).await?;
            create_entity_table(manager, quote_stage_change::Entity).await?;
            create_entity_table(manager, project::Entity).await?;
            create_entity_table(manager, task::Entity).await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quotes_customer_stage")
                        .table(quote::Entity)
                        .col(quote::Column::CustomerId)
                        .col(quote::Column::Stage)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_quote_stage_changes_quote_id")
                        .table(quote_stage_change::Entity)
                        .col(quote_stage_change::Column::QuoteId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_projects_current_stage")
                        .table(project::Entity)
                        .col(project::Column::CurrentStage)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tasks_status_due")
                        .table(task::Entity)
                        .col(task::Column::Status)
                        .col(task::Column::DueDate)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            drop_entity_table(manager, task::Entity).await?;
            drop_entity_table(manager, project::Entity).await?;
            drop_entity_table(manager, quote_stage_change::Entity).await?;
            drop_entity_table(manager, quote::Entity).await?;
            drop_entity_table(manager, sequence::Entity).await
        }
    }
}

mod m20240301_000004_create_stock_tables {
    use super::*;
    use crate::entities::{
        bom, bom_line, production_batch, stock_balance, stock_item, stock_movement, warehouse,
    };

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            create_entity_table(manager, stock_item::Entity).await?;
            create_entity_table(manager, warehouse::Entity).await?;
            create_entity_table(manager, stock_balance::Entity).await?;
            create_entity_table(manager, stock_movement::Entity).await?;
            create_entity_table(manager, bom::Entity).await?;
            create_entity_table(manager, bom_line::Entity).await?;
            create_entity_table(manager, production_batch::Entity).await?;

            // One balance row per item and warehouse.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_stock_balances_item_warehouse")
                        .table(stock_balance::Entity)
                        .col(stock_balance::Column::ItemId)
                        .col(stock_balance::Column::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_item_created")
                        .table(stock_movement::Entity)
                        .col(stock_movement::Column::ItemId)
                        .col(stock_movement::Column::CreatedAt)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_batch_id")
                        .table(stock_movement::Entity)
                        .col(stock_movement::Column::BatchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_boms_item_version")
                        .table(bom::Entity)
                        .col(bom::Column::ItemId)
                        .col(bom::Column::Version)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_bom_lines_component")
                        .table(bom_line::Entity)
                        .col(bom_line::Column::BomId)
                        .col(bom_line::Column::ComponentId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            drop_entity_table(manager, production_batch::Entity).await?;
            drop_entity_table(manager, bom_line::Entity).await?;
            drop_entity_table(manager, bom::Entity).await?;
            drop_entity_table(manager, stock_movement::Entity).await?;
            drop_entity_table(manager, stock_balance::Entity).await?;
            drop_entity_table(manager, warehouse::Entity).await?;
            drop_entity_table(manager, stock_item::Entity).await
        }
    }
}

mod m20240315_000005_one_active_bom_per_item {
    use super::*;
    use sea_orm_migration::sea_orm::ConnectionTrait;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240315_000005_one_active_bom_per_item"
        }
    }

    // Partial index; both SQLite and Postgres accept the same statement.
    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .get_connection()
                .execute_unprepared(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uq_boms_active_item ON boms (item_id) WHERE active",
                )
                .await?;
            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .get_connection()
                .execute_unprepared("DROP INDEX IF EXISTS uq_boms_active_item")
                .await?;
            Ok(())
        }
    }
}
