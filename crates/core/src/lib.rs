//! Brewline Core - Shared policy engine.
//!
//! This crate implements every cross-cutting rule of the ordering platform:
//! sessions, access policy, rate limiting, pricing, and the order lifecycle.
//! Both customer-facing and staff-facing services embed it and see identical
//! behavior, because the rules live here and nowhere else.
//!
//! # Architecture
//!
//! External state sits behind traits ([`cache::CacheStore`],
//! [`orders::store::OrderStore`], [`identity::IdentityStore`]); the crate
//! ships in-memory implementations for single-process deployments and tests.
//! The [`platform::Platform`] facade wires everything together and is the
//! only type a transport needs to hold.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, money, and roles
//! - [`error`] - The unified error taxonomy transports map onto status codes
//! - [`cache`] - Shared cache store, atomic counters, response caching
//! - [`token`] - Session token issuance, verification, rotation, revocation
//! - [`ratelimit`] - Distributed fixed-window rate governor
//! - [`pricing`] - Coupon validation and discount computation
//! - [`orders`] - Order model, lifecycle state machine, persistence seam
//! - [`policy`] - Static role-to-operation access table
//! - [`platform`] - The assembled facade

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod identity;
pub mod orders;
pub mod platform;
pub mod policy;
pub mod pricing;
pub mod ratelimit;
pub mod token;
pub mod types;

pub use error::{CoreError, Result};
pub use platform::Platform;
pub use token::Principal;
pub use types::*;
