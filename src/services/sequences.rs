//! Named counters for human-facing numbers (project order numbers, quote
//! numbers).
//!
//! Values are taken with a compare-and-swap update on the `sequences` row and
//! retried when another writer got there first. Callers allocate inside the
//! transaction that stores the numbered record. Unique indexes on
//! `projects.order_number` and `quotes.number` back this up.

use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveValue::Set,
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect,
};
use tracing::{debug, warn};

use crate::entities::{project, quote, sequence};
use crate::errors::ServiceError;

pub const PROJECT_ORDER_NUMBER: &str = "project_order_number";
pub const QUOTE_NUMBER: &str = "quote_number";

const MAX_ATTEMPTS: usize = 16;

/// Takes the next value of the named sequence.
pub async fn next_value<C>(conn: &C, name: &str) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    for attempt in 1..=MAX_ATTEMPTS {
        let current = sequence::Entity::find_by_id(name.to_string())
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?;

        let Some(current) = current else {
            seed(conn, name).await?;
            continue;
        };

        if let Some(next) = compare_and_swap(conn, name, current.value).await? {
            debug!(sequence = name, value = next, "Allocated sequence value");
            return Ok(next);
        }
        warn!(sequence = name, attempt, "Lost sequence race, retrying");
    }

    Err(ServiceError::Conflict(format!(
        "Could not allocate a value from sequence {}",
        name
    )))
}

/// Moves the sequence from `expected` to `expected + 1`. `None` when the
/// stored value no longer matches.
async fn compare_and_swap<C>(conn: &C, name: &str, expected: i64) -> Result<Option<i64>, ServiceError>
where
    C: ConnectionTrait,
{
    let next = expected + 1;
    let updated = sequence::Entity::update_many()
        .col_expr(sequence::Column::Value, Expr::value(next))
        .col_expr(sequence::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(sequence::Column::Name.eq(name))
        .filter(sequence::Column::Value.eq(expected))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok((updated.rows_affected == 1).then_some(next))
}

/// Creates the sequence row starting at the highest number already in use.
/// A concurrent seed wins silently.
async fn seed<C>(conn: &C, name: &str) -> Result<(), ServiceError>
where
    C: ConnectionTrait,
{
    let start = current_max(conn, name).await?;
    let row = sequence::ActiveModel {
        name: Set(name.to_string()),
        value: Set(start),
        updated_at: Set(Utc::now()),
    };

    sequence::Entity::insert(row)
        .on_conflict(
            OnConflict::column(sequence::Column::Name)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(ServiceError::db_error)?;
    debug!(sequence = name, start, "Seeded sequence");
    Ok(())
}

async fn current_max<C>(conn: &C, name: &str) -> Result<i64, ServiceError>
where
    C: ConnectionTrait,
{
    let max: Option<Option<i64>> = match name {
        PROJECT_ORDER_NUMBER => project::Entity::find()
            .select_only()
            .column_as(project::Column::OrderNumber.max(), "max")
            .into_tuple()
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?,
        QUOTE_NUMBER => quote::Entity::find()
            .select_only()
            .column_as(quote::Column::Number.max(), "max")
            .into_tuple()
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?,
        _ => None,
    };
    Ok(max.flatten().unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::migrated_memory_pool as setup;
    use sea_orm::TransactionTrait;

    #[tokio::test]
    async fn values_are_consecutive_per_sequence() {
        let conn = setup().await;
        assert_eq!(next_value(&conn, PROJECT_ORDER_NUMBER).await.unwrap(), 1);
        assert_eq!(next_value(&conn, PROJECT_ORDER_NUMBER).await.unwrap(), 2);
        assert_eq!(next_value(&conn, QUOTE_NUMBER).await.unwrap(), 1);
        assert_eq!(next_value(&conn, PROJECT_ORDER_NUMBER).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn rolled_back_allocation_is_not_persisted() {
        let conn = setup().await;
        let txn = conn.begin().await.unwrap();
        assert_eq!(next_value(&txn, QUOTE_NUMBER).await.unwrap(), 1);
        txn.rollback().await.unwrap();

        assert_eq!(next_value(&conn, QUOTE_NUMBER).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn stale_swap_is_refused_and_allocation_moves_on() {
        let conn = setup().await;
        assert_eq!(next_value(&conn, QUOTE_NUMBER).await.unwrap(), 1);

        // Another writer already moved 0 -> 1
        assert_eq!(compare_and_swap(&conn, QUOTE_NUMBER, 0).await.unwrap(), None);
        assert_eq!(compare_and_swap(&conn, QUOTE_NUMBER, 1).await.unwrap(), Some(2));
        assert_eq!(next_value(&conn, QUOTE_NUMBER).await.unwrap(), 3);
        assert_eq!(
            compare_and_swap(&conn, "unknown_sequence", 0).await.unwrap(),
            None
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_allocations_never_repeat() {
        let dir = tempfile::tempdir().unwrap();
        let conn = crate::db::test_support::migrated_file_pool(&dir.path().join("seq.db"), 4).await;

        let mut handles = Vec::new();
        for _ in 0..4 {
            let conn = conn.clone();
            handles.push(tokio::spawn(async move {
                let mut taken = Vec::new();
                for _ in 0..8 {
                    taken.push(next_value(&conn, PROJECT_ORDER_NUMBER).await.unwrap());
                }
                taken
            }));
        }
        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.await.unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (1..=32).collect::<Vec<i64>>());
    }
}
