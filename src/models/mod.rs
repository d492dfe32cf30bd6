use rust_decimal::Decimal;

pub mod ledger;
pub mod project_workflow;

/// Largest magnitude a `Decimal(16, 4)` column holds.
pub fn max_stored_decimal() -> Decimal {
    Decimal::new(9_999_999_999_999_999, 4)
}

/// `value` if it fits a `Decimal(16, 4)` column.
pub fn within_storage(value: Option<Decimal>) -> Option<Decimal> {
    value.filter(|v| v.abs() <= max_stored_decimal())
}
