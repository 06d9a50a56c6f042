//! # tally-core: Pure Inventory Logic for Tally
//!
//! This crate holds the inventory quantity rules of the Tally point-of-sale
//! backend as pure, I/O-free code.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Inventory Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          Callers (sale workflow, product lifecycle, reports)    │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ in-process calls                       │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          tally-db: InventoryService (transaction owner)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ tally-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   stock   │  │ movement  │  │  ledger   │  │ validation│  │   │
//! │  │   │StockRecord│  │ Movement  │  │  replay   │  │   rules   │  │   │
//! │  │   │ counters  │  │ type/why  │  │ reconcile │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`stock`] - Stock record counters and the canonical operations
//! - [`movement`] - Movement records (type, reason, quantity, actor)
//! - [`ledger`] - Movement log replay, reconciliation, point-in-time quantity
//! - [`types`] - Product, operation context, batch lines, list filters
//! - [`error`] - Domain error types and stable error kinds
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use tally_core::StockRecord;
//!
//! let mut stock = StockRecord::new("product-1", 50, 5).unwrap();
//!
//! stock.reserve_stock(20).unwrap();
//! assert_eq!(stock.available_qty(), 30);
//! assert_eq!(stock.reserved_qty(), 20);
//!
//! stock.confirm_reserved_stock(15).unwrap();
//! assert_eq!(stock.total_qty(), 35);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod movement;
pub mod stock;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{ErrorKind, StockError, StockResult, ValidationError};
pub use ledger::{QuantitySnapshot, QuantityTotals, ReconciliationReport};
pub use movement::{MovementReason, MovementType, StockMovement};
pub use stock::{StockOperation, StockRecord, StockStatus};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tenant ID for single-tenant deployments and seed data.
pub const DEFAULT_TENANT_ID: &str = "00000000-0000-0000-0000-000000000001";

/// Maximum lines in one bulk reservation / release / confirmation.
///
/// Bulk operations hold one transaction open for the whole batch, so a batch
/// is bounded by a sale's line-item count, not by import volumes.
pub const MAX_BATCH_LINES: usize = 100;

/// Default page size for list queries.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound on a single page.
pub const MAX_PAGE_SIZE: u32 = 500;

pub const MAX_PRODUCT_ID_LEN: usize = 64;
pub const MAX_ACTOR_LEN: usize = 100;
pub const MAX_REFERENCE_LEN: usize = 100;
pub const MAX_NOTES_LEN: usize = 500;

/// Reference recorded on the movement written when stock is provisioned.
pub const INITIAL_STOCK_REFERENCE: &str = "initial-stock";
