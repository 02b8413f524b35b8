//! # Confstore Testkit
//!
//! Testing utilities for Confstore.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a memory-backed service on a manual clock, with helpers
//!   to create clients and mint their tokens
//! - **Generators**: Proptest strategies for valid keys, values, and batches
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use confstore::{NewValue, ValueKind};
//! use confstore_testkit::TestService;
//!
//! async fn example() {
//!     let fixture = TestService::new().await;
//!     let alice = fixture.client("alice").await;
//!
//!     fixture
//!         .service
//!         .add_values(&alice.principal, ValueKind::Setting, &[NewValue::new("timeout", "30")])
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use confstore_testkit::generators::key;
//!
//! proptest! {
//!     #[test]
//!     fn keys_are_valid(k in key()) {
//!         prop_assert!(confstore_core::validate_key(&k, 256).is_ok());
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{test_config, TestClient, TestService, START_MILLIS, SYSTEM_CLIENT_ID};
pub use generators::{key, new_value, new_values, value, value_kind};
