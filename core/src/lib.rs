//! churnmetrics-core — the subscriber-churn analytics engine.
//!
//! Given a date range and an optional product filter, the engine classifies
//! a merchant's subscriptions into active / new / churned buckets per day,
//! aggregates them with Stripe's churn formula (churned ÷ (active-at-start
//! + new)), and produces a per-day series suitable for charting.
//!
//! Layering, leaves first:
//!   - `period`     — range normalization, merchant-timezone day boundaries
//!   - `classifier` — pure per-subscription predicates and MRR normalization
//!   - `aggregate`  — period totals and the churn-rate formula
//!   - `daily`      — running-balance daily series
//!   - `source`     — two interchangeable retrieval strategies
//!   - `cache`      — day-level read-through caching for large sellers
//!   - `service`    — orchestration and the result document
//!
//! All SQL lives under `store`; nothing else touches the database.

pub mod aggregate;
pub mod cache;
pub mod classifier;
pub mod config;
pub mod daily;
pub mod error;
pub mod period;
pub mod service;
pub mod source;
pub mod store;
pub mod types;
