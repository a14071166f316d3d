//! Catalog domain module.
//!
//! Product records, the rules for creating them (validation, package → base unit
//! conversion, per-unit cost derivation). Pure domain logic, no IO.

pub mod product;

pub use product::{
    AddMode, DEFAULT_ALERT_THRESHOLD, DEFAULT_UNIT_LABEL, NewProduct, Product, ProductId, round_div,
};
