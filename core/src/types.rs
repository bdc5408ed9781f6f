//! Shared primitive types used across the engine.

/// A merchant account identifier.
pub type AccountId = String;

/// A subscription product identifier.
pub type ProductId = String;

/// An integral minor-currency amount (e.g. US cents).
pub type Cents = i64;
