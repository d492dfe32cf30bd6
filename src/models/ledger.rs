//! Stock ledger arithmetic.
//!
//! A balance holds `on_hand` and `reserved` for one item in one warehouse.
//! Every movement kind is a pure transition on that pair; the stock service
//! persists the result together with the ledger row.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

use super::within_storage;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum MovementKind {
    In,
    Out,
    Adjust,
    Transfer,
    Reserve,
    Unreserve,
    Produce,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("quantity must be greater than zero, got {0}")]
    NonPositiveQuantity(Decimal),
    #[error("adjustment quantity cannot be zero")]
    ZeroAdjustment,
    #[error("available {available} is less than requested {requested}")]
    InsufficientAvailable {
        available: Decimal,
        requested: Decimal,
    },
    #[error("reserved {reserved} is less than requested {requested}")]
    InsufficientReserved {
        reserved: Decimal,
        requested: Decimal,
    },
    #[error("adjustment would leave on hand {on_hand} below reserved {reserved}")]
    AdjustmentBelowReserved { on_hand: Decimal, reserved: Decimal },
    #[error("resulting quantity is out of range")]
    OutOfRange,
}

/// Quantities of one item in one warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BalanceState {
    pub on_hand: Decimal,
    pub reserved: Decimal,
}

impl BalanceState {
    pub fn new(on_hand: Decimal, reserved: Decimal) -> Self {
        Self { on_hand, reserved }
    }

    pub fn available(&self) -> Decimal {
        self.on_hand - self.reserved
    }

    fn require_positive(quantity: Decimal) -> Result<(), LedgerError> {
        if quantity <= Decimal::ZERO {
            Err(LedgerError::NonPositiveQuantity(quantity))
        } else {
            Ok(())
        }
    }

    fn require_available(&self, quantity: Decimal) -> Result<(), LedgerError> {
        if self.available() < quantity {
            Err(LedgerError::InsufficientAvailable {
                available: self.available(),
                requested: quantity,
            })
        } else {
            Ok(())
        }
    }

    fn checked_add(a: Decimal, b: Decimal) -> Result<Decimal, LedgerError> {
        within_storage(a.checked_add(b)).ok_or(LedgerError::OutOfRange)
    }

    pub fn receive(self, quantity: Decimal) -> Result<Self, LedgerError> {
        Self::require_positive(quantity)?;
        Ok(Self::new(Self::checked_add(self.on_hand, quantity)?, self.reserved))
    }

    pub fn issue(self, quantity: Decimal) -> Result<Self, LedgerError> {
        Self::require_positive(quantity)?;
        self.require_available(quantity)?;
        Ok(Self::new(self.on_hand - quantity, self.reserved))
    }

    /// Signed correction of the on-hand quantity.
    pub fn adjust(self, delta: Decimal) -> Result<Self, LedgerError> {
        if delta.is_zero() {
            return Err(LedgerError::ZeroAdjustment);
        }
        let on_hand = Self::checked_add(self.on_hand, delta)?;
        if on_hand < self.reserved || on_hand < Decimal::ZERO {
            return Err(LedgerError::AdjustmentBelowReserved {
                on_hand,
                reserved: self.reserved,
            });
        }
        Ok(Self::new(on_hand, self.reserved))
    }

    pub fn reserve(self, quantity: Decimal) -> Result<Self, LedgerError> {
        Self::require_positive(quantity)?;
        self.require_available(quantity)?;
        Ok(Self::new(self.on_hand, Self::checked_add(self.reserved, quantity)?))
    }

    pub fn unreserve(self, quantity: Decimal) -> Result<Self, LedgerError> {
        Self::require_positive(quantity)?;
        if self.reserved < quantity {
            return Err(LedgerError::InsufficientReserved {
                reserved: self.reserved,
                requested: quantity,
            });
        }
        Ok(Self::new(self.on_hand, self.reserved - quantity))
    }

    /// Applies a single-warehouse movement. Transfers are split by the
    /// caller into an issue at the source and a receipt at the destination.
    pub fn apply(self, kind: MovementKind, quantity: Decimal) -> Result<Self, LedgerError> {
        match kind {
            MovementKind::In | MovementKind::Produce => self.receive(quantity),
            MovementKind::Out | MovementKind::Transfer => self.issue(quantity),
            MovementKind::Adjust => self.adjust(quantity),
            MovementKind::Reserve => self.reserve(quantity),
            MovementKind::Unreserve => self.unreserve(quantity),
        }
    }
}
