//! # quote-pricing-core
//!
//! Core data structures for quote pricing tables.
//!
//! This crate provides the row shapes that calculated-column formulas read:
//! - [`Cell`] - One column's numeric value within a row
//! - [`ProductRow`] - One row of a pricing table
//!
//! ## Example
//!
//! ```rust
//! use quote_pricing_core::{Cell, ProductRow};
//!
//! let mut row = ProductRow::new(vec![Cell::new("qty", 2.0)]);
//! row.set_value("unitCost", 15.0);
//!
//! assert_eq!(row.value("qty"), Some(2.0));
//! assert_eq!(row.value("unitCost"), Some(15.0));
//! assert_eq!(row.value("shipping"), None);
//! ```

pub mod cell;
pub mod error;
pub mod row;

pub use cell::Cell;
pub use error::{Error, Result};
pub use row::ProductRow;
