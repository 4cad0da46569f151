//! Backend Error Module
//!
//! - **`types`** - `BackendError` and `StoreError`
//! - **`conversion`** - `IntoResponse` for `BackendError`

/// Error type definitions
pub mod types;

/// Error conversion implementations
pub mod conversion;

pub use types::{BackendError, StoreError};
