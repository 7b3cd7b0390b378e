//! # Route Modules
//!
//! Each module defines an Axum Router for one API surface area. Routers are
//! assembled in [`crate::app`].

pub mod audit;
pub mod cosigners;
pub mod health;
pub mod metrics;
pub mod proof;
pub mod register;
pub mod sth;
