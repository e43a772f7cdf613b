//! Declarative macros for entities and projections.
//!
//! Both are `#[macro_export]`ed, so callers use them as `xplus::entity!` and
//! `xplus::projection!`.

mod entity;
mod projection;
