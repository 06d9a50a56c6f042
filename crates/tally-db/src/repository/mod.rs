//! # Repository Module
//!
//! Stores behind the inventory coordinator.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  InventoryService (owns the transaction)                               │
//! │       │                                                                 │
//! │       │  let mut tx = begin_write(&pool)    (BEGIN IMMEDIATE)          │
//! │       │  StockRepository::find_by_product(&mut *tx, ..)                │
//! │       │  StockRepository::update(&mut *tx, ..)                         │
//! │       │  MovementRepository::append(&mut *tx, ..)                      │
//! │       │  tx.commit()                                                   │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Read-only callers use the pooled methods directly:                    │
//! │  db.stock().list(..), db.movements().search(..)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Catalog rows used for search and tenant scoping
//! - [`StockRepository`] - Stock records, versioned writes, filtered listing
//! - [`MovementRepository`] - Append-only movement log and reporting queries

pub mod movement;
pub mod product;
pub mod stock;

pub use movement::MovementRepository;
pub use product::ProductRepository;
pub use stock::StockRepository;
