//! # Movement Records
//!
//! Immutable facts describing one committed quantity change.
//!
//! ## Direction Lives in the Type
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  type       effect on counters                    typical reasons       │
//! │  ────────   ─────────────────────────────────     ──────────────────    │
//! │  in         available += q     (total += q)       purchase, return,     │
//! │                                                   adjustment            │
//! │  out        available -= q     (total -= q)       damage, expiry,       │
//! │             reserved  -= q  if reason = sale      adjustment, sale      │
//! │  reserved   available -> reserved (total same)    reservation           │
//! │  released   reserved -> available (total same)    release               │
//! │                                                                         │
//! │  quantity is ALWAYS > 0                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{StockError, StockResult, ValidationError};
use crate::types::OperationContext;
use crate::validation::validate_quantity;

// =============================================================================
// Movement Type
// =============================================================================

/// Direction of a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MovementType {
    In,
    Out,
    Reserved,
    Released,
}

impl MovementType {
    pub const ALL: [MovementType; 4] = [
        MovementType::In,
        MovementType::Out,
        MovementType::Reserved,
        MovementType::Released,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::In => "in",
            MovementType::Out => "out",
            MovementType::Reserved => "reserved",
            MovementType::Released => "released",
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        MovementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "type".to_string(),
                allowed: MovementType::ALL.iter().map(|t| t.to_string()).collect(),
            })
    }
}

// =============================================================================
// Movement Reason
// =============================================================================

/// Business reason for a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum MovementReason {
    Purchase,
    Sale,
    Return,
    Damage,
    Expiry,
    Adjustment,
    Reservation,
    Release,
}

impl MovementReason {
    pub const ALL: [MovementReason; 8] = [
        MovementReason::Purchase,
        MovementReason::Sale,
        MovementReason::Return,
        MovementReason::Damage,
        MovementReason::Expiry,
        MovementReason::Adjustment,
        MovementReason::Reservation,
        MovementReason::Release,
    ];

    /// Reasons a direct positive adjustment may carry.
    pub const INBOUND_ADJUSTMENT: [MovementReason; 3] = [
        MovementReason::Purchase,
        MovementReason::Return,
        MovementReason::Adjustment,
    ];

    /// Reasons a direct negative adjustment may carry.
    ///
    /// `Sale` is absent: sales leave stock through reserve → confirm only,
    /// and the ledger replays `out`/`sale` as consumed reservation.
    pub const OUTBOUND_ADJUSTMENT: [MovementReason; 3] = [
        MovementReason::Damage,
        MovementReason::Expiry,
        MovementReason::Adjustment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MovementReason::Purchase => "purchase",
            MovementReason::Sale => "sale",
            MovementReason::Return => "return",
            MovementReason::Damage => "damage",
            MovementReason::Expiry => "expiry",
            MovementReason::Adjustment => "adjustment",
            MovementReason::Reservation => "reservation",
            MovementReason::Release => "release",
        }
    }

    /// Checks this reason against the adjustment policy for a signed quantity.
    pub fn check_adjustment(&self, signed_qty: i64) -> StockResult<()> {
        let (allowed, operation) = if signed_qty > 0 {
            (&Self::INBOUND_ADJUSTMENT, "an inbound adjustment")
        } else {
            (&Self::OUTBOUND_ADJUSTMENT, "an outbound adjustment")
        };

        if allowed.contains(self) {
            Ok(())
        } else {
            Err(StockError::InvalidReason {
                reason: self.to_string(),
                operation: operation.to_string(),
            })
        }
    }
}

impl std::fmt::Display for MovementReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        MovementReason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "reason".to_string(),
                allowed: MovementReason::ALL.iter().map(|r| r.to_string()).collect(),
            })
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// One append-only audit fact.
///
/// Never updated or deleted once persisted; the store enforces this with
/// triggers as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    #[serde(rename = "type")]
    pub movement_type: MovementType,
    pub reason: MovementReason,
    /// Always positive; direction comes from `movement_type`.
    pub quantity: i64,
    pub reference: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

impl StockMovement {
    /// Builds a movement stamped at `created_at`.
    ///
    /// The coordinator passes the stock record's `last_movement_at` so the
    /// record and its movement share one timestamp.
    pub fn new(
        product_id: impl Into<String>,
        movement_type: MovementType,
        reason: MovementReason,
        quantity: i64,
        ctx: &OperationContext,
        created_at: DateTime<Utc>,
    ) -> StockResult<Self> {
        validate_quantity(quantity)?;

        Ok(StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: product_id.into(),
            movement_type,
            reason,
            quantity,
            reference: ctx.reference.clone(),
            notes: ctx.notes.clone(),
            created_at,
            created_by: ctx.actor.clone(),
        })
    }

    /// Change this movement makes to `available_qty`.
    pub fn available_delta(&self) -> i64 {
        match self.movement_type {
            MovementType::In | MovementType::Released => self.quantity,
            MovementType::Out if self.consumes_reservation() => 0,
            MovementType::Out | MovementType::Reserved => -self.quantity,
        }
    }

    /// Change this movement makes to `reserved_qty`.
    pub fn reserved_delta(&self) -> i64 {
        match self.movement_type {
            MovementType::Reserved => self.quantity,
            MovementType::Released => -self.quantity,
            MovementType::Out if self.consumes_reservation() => -self.quantity,
            MovementType::In | MovementType::Out => 0,
        }
    }

    /// Whether this is a confirmed sale consuming reserved stock.
    pub fn consumes_reservation(&self) -> bool {
        self.movement_type == MovementType::Out && self.reason == MovementReason::Sale
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn movement(t: MovementType, r: MovementReason, q: i64) -> StockMovement {
        StockMovement::new("p", t, r, q, &OperationContext::new("tester"), Utc::now()).unwrap()
    }

    #[test]
    fn test_quantity_must_be_positive() {
        let ctx = OperationContext::new("tester");
        let err = StockMovement::new(
            "p",
            MovementType::In,
            MovementReason::Purchase,
            0,
            &ctx,
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, StockError::InvalidQuantity { requested: 0 });
    }

    #[test]
    fn test_context_is_recorded_verbatim() {
        let ctx = OperationContext::new("user-7")
            .with_reference("sale-1")
            .with_notes("n");
        let m = StockMovement::new(
            "p",
            MovementType::Reserved,
            MovementReason::Reservation,
            2,
            &ctx,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(m.created_by, "user-7");
        assert_eq!(m.reference.as_deref(), Some("sale-1"));
        assert_eq!(m.notes.as_deref(), Some("n"));
    }

    #[test]
    fn test_deltas() {
        let m = movement(MovementType::In, MovementReason::Purchase, 5);
        assert_eq!((m.available_delta(), m.reserved_delta()), (5, 0));

        let m = movement(MovementType::Out, MovementReason::Damage, 2);
        assert_eq!((m.available_delta(), m.reserved_delta()), (-2, 0));

        let m = movement(MovementType::Out, MovementReason::Sale, 3);
        assert_eq!((m.available_delta(), m.reserved_delta()), (0, -3));

        let m = movement(MovementType::Reserved, MovementReason::Reservation, 4);
        assert_eq!((m.available_delta(), m.reserved_delta()), (-4, 4));

        let m = movement(MovementType::Released, MovementReason::Release, 4);
        assert_eq!((m.available_delta(), m.reserved_delta()), (4, -4));
    }

    #[test]
    fn test_parse_type_and_reason() {
        assert_eq!("IN".parse::<MovementType>().unwrap(), MovementType::In);
        assert_eq!(
            " released ".parse::<MovementType>().unwrap(),
            MovementType::Released
        );
        assert!("sideways".parse::<MovementType>().is_err());

        assert_eq!(
            "return".parse::<MovementReason>().unwrap(),
            MovementReason::Return
        );
        assert!("theft".parse::<MovementReason>().is_err());
    }

    #[test]
    fn test_adjustment_reason_policy() {
        assert!(MovementReason::Purchase.check_adjustment(5).is_ok());
        assert!(MovementReason::Adjustment.check_adjustment(-5).is_ok());
        assert!(MovementReason::Damage.check_adjustment(-1).is_ok());

        assert!(MovementReason::Damage.check_adjustment(1).is_err());
        assert!(matches!(
            MovementReason::Sale.check_adjustment(-1),
            Err(StockError::InvalidReason { .. })
        ));
        assert!(MovementReason::Reservation.check_adjustment(3).is_err());
    }

    #[test]
    fn test_serialized_shape() {
        let m = movement(MovementType::Out, MovementReason::Expiry, 1);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["type"], "out");
        assert_eq!(json["reason"], "expiry");
        assert_eq!(json["createdBy"], "tester");
    }
}
