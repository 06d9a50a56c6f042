//! # tally-db: Database Layer for Tally Inventory
//!
//! SQLite persistence and the transactional inventory coordinator.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tally Inventory Data Flow                        │
//! │                                                                         │
//! │  Sale workflow / product lifecycle / reporting                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     tally-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │  inventory    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │               │    │               │    │  (embedded)  │  │   │
//! │  │   │ single ops    │───►│ StockRepo     │    │              │  │   │
//! │  │   │ bulk ops      │    │ MovementRepo  │    │ 001_initial  │  │   │
//! │  │   │ reconcile     │    │ ProductRepo   │    │   _schema    │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                                │   │
//! │  │   ┌───────────────┐            │                                │   │
//! │  │   │ Database      │◄───────────┘  pool.rs: SqlitePool, WAL     │   │
//! │  │   └───────────────┘                                             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (tally.db)                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`config`] - Environment-driven settings
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Stock, movement and product stores
//! - [`inventory`] - Operation coordinator (single and bulk)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tally_core::{BatchLine, OperationContext};
//! use tally_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tally.db")).await?;
//! let inventory = db.inventory();
//!
//! let ctx = OperationContext::new("cashier-1").with_reference("sale-42");
//! inventory.provision("p-1", 50, 5, &ctx).await?;
//! inventory
//!     .reserve_batch(&[BatchLine::new("p-1", 2)], &ctx)
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod inventory;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::{ConfigError, Settings};
pub use error::{DbError, DbResult};
pub use inventory::{ErrorResponse, InventoryError, InventoryResult, InventoryService, StockChange};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::{MovementRepository, ProductRepository, StockRepository};
