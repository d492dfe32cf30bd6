pub mod activity;
pub mod bom;
pub mod branches;
pub mod customers;
pub mod dashboard;
pub mod production;
pub mod projects;
pub mod quotes;
pub mod sequences;
pub mod stock;
pub mod suppliers;
pub mod tasks;
pub mod users;

use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{ColumnTrait, IntoSimpleExpr};
use serde::Serialize;

/// Page request after clamping to the configured limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    pub fn new(page: u64, per_page: u64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Zero-based page index as used by sea-orm paginators.
    pub fn index(&self) -> u64 {
        self.page - 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// One page of results plus the total count.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page,
            per_page: request.per_page,
            total_pages: total.div_ceil(request.per_page),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            per_page: self.per_page,
            total_pages: self.total_pages,
        }
    }
}

/// Trims a free-text filter, treating blank input as absent.
pub(crate) fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_lowercase())
}

/// Case-insensitive substring match on a column. `needle` must already be
/// lowercased.
pub(crate) fn lower_contains<C: ColumnTrait>(column: C, needle: &str) -> SimpleExpr {
    Expr::expr(Func::lower(column.into_simple_expr())).like(format!("%{}%", needle))
}

/// Maps a unique-constraint violation to a conflict, everything else to a
/// database error.
pub(crate) fn map_unique_violation(err: sea_orm::DbErr, message: impl Into<String>) -> crate::errors::ServiceError {
    match err.sql_err() {
        Some(sea_orm::SqlErr::UniqueConstraintViolation(_)) => {
            crate::errors::ServiceError::Conflict(message.into())
        }
        _ => crate::errors::ServiceError::db_error(err),
    }
}
