pub mod bom;
pub mod bom_line;
pub mod branch;
pub mod customer;
pub mod interaction;
pub mod note;
pub mod production_batch;
pub mod project;
pub mod quote;
pub mod quote_stage_change;
pub mod sequence;
pub mod stock_balance;
pub mod stock_item;
pub mod stock_movement;
pub mod supplier;
pub mod task;
pub mod warehouse;

pub use crate::auth::user;
