//! Prelude module - common imports for quote-pricing users
//!
//! ```rust
//! use quote_pricing::prelude::*;
//! ```

pub use crate::{
    // Calculation types
    CalculationOptions,
    CalculationStats,
    // Row types
    Cell,
    CellDiagnostic,
    Column,
    // Error types
    Error,
    EvalError,
    // Formula types
    ExpressionNode,
    Operation,
    PricingTable,
    ProductRow,
    Result,
    RuleModel,
};
