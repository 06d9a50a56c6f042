//! # Ledger Replay
//!
//! Rebuilds quantity counters from the movement log.
//!
//! The stored stock record is the source of truth for current quantity; the
//! log must replay to the same numbers. Replay is how drift is detected and
//! how a point-in-time quantity is reconstructed.
//!
//! ```text
//!   empty state ──► m1 ──► m2 ──► ... ──► mN ──► QuantityTotals
//!                                                   │
//!                                                   ▼
//!                                 compare with stored StockRecord
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{StockError, StockResult};
use crate::movement::StockMovement;
use crate::stock::StockRecord;

/// Available / reserved / total counters without record metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QuantityTotals {
    pub available_qty: i64,
    pub reserved_qty: i64,
    pub total_qty: i64,
}

impl QuantityTotals {
    /// Counters currently stored on a record.
    pub fn of(record: &StockRecord) -> Self {
        QuantityTotals {
            available_qty: record.available_qty(),
            reserved_qty: record.reserved_qty(),
            total_qty: record.total_qty(),
        }
    }

    /// Applies one movement.
    ///
    /// Fails if a counter would go negative or overflow, which means the log
    /// does not describe a reachable history. `self` is untouched on failure.
    pub fn apply(&mut self, movement: &StockMovement) -> StockResult<()> {
        let replay_error = |reason: String| StockError::Replay {
            movement_id: movement.id.clone(),
            reason,
        };

        let (available, reserved, total) = self
            .available_qty
            .checked_add(movement.available_delta())
            .zip(self.reserved_qty.checked_add(movement.reserved_delta()))
            .and_then(|(a, r)| Some((a, r, a.checked_add(r)?)))
            .ok_or_else(|| {
                replay_error(format!(
                    "{} {} of {} overflows the counters",
                    movement.movement_type, movement.reason, movement.quantity
                ))
            })?;

        if available < 0 || reserved < 0 {
            return Err(replay_error(format!(
                "{} {} of {} leaves available {} reserved {}",
                movement.movement_type, movement.reason, movement.quantity, available, reserved
            )));
        }

        self.available_qty = available;
        self.reserved_qty = reserved;
        self.total_qty = total;
        Ok(())
    }
}

/// Replays `movements` (oldest first) from an empty state.
pub fn replay<'a, I>(movements: I) -> StockResult<QuantityTotals>
where
    I: IntoIterator<Item = &'a StockMovement>,
{
    let mut totals = QuantityTotals::default();
    for movement in movements {
        totals.apply(movement)?;
    }
    Ok(totals)
}

/// Result of comparing a stored record with its replayed movement log.
///
/// A log that cannot be replayed is reported, not rejected: `replayed`
/// holds the counters up to the offending movement and `replay_failure`
/// names it. Such a report is never `in_sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReconciliationReport {
    pub product_id: String,
    pub stored: QuantityTotals,
    pub replayed: QuantityTotals,
    pub movement_count: usize,
    pub in_sync: bool,
    pub replay_failure: Option<String>,
}

impl ReconciliationReport {
    /// Replays `movements` and compares the result with `record`.
    pub fn build(record: &StockRecord, movements: &[StockMovement]) -> Self {
        let stored = QuantityTotals::of(record);
        let mut replayed = QuantityTotals::default();
        let mut replay_failure = None;

        for movement in movements {
            if let Err(err) = replayed.apply(movement) {
                replay_failure = Some(err.to_string());
                break;
            }
        }

        ReconciliationReport {
            product_id: record.product_id().to_string(),
            stored,
            replayed,
            movement_count: movements.len(),
            in_sync: replay_failure.is_none() && stored == replayed,
            replay_failure,
        }
    }

    /// Signed difference stored − replayed for (available, reserved).
    pub fn drift(&self) -> (i64, i64) {
        (
            self.stored.available_qty - self.replayed.available_qty,
            self.stored.reserved_qty - self.replayed.reserved_qty,
        )
    }
}

/// Counters reconstructed as of an instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct QuantitySnapshot {
    pub product_id: String,
    #[ts(as = "String")]
    pub at: DateTime<Utc>,
    pub totals: QuantityTotals,
    pub movement_count: usize,
}

impl QuantitySnapshot {
    /// Replays the movements created at or before `at`.
    ///
    /// `movements` must be oldest first; later entries are ignored.
    pub fn at(
        product_id: impl Into<String>,
        at: DateTime<Utc>,
        movements: &[StockMovement],
    ) -> StockResult<Self> {
        let upto: Vec<&StockMovement> = movements
            .iter()
            .take_while(|m| m.created_at <= at)
            .collect();
        let totals = replay(upto.iter().copied())?;

        Ok(QuantitySnapshot {
            product_id: product_id.into(),
            at,
            totals,
            movement_count: upto.len(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::{MovementReason, MovementType};
    use crate::types::OperationContext;
    use chrono::Duration;

    fn mv(t: MovementType, r: MovementReason, q: i64, at: DateTime<Utc>) -> StockMovement {
        StockMovement::new("p", t, r, q, &OperationContext::new("tester"), at).unwrap()
    }

    #[test]
    fn test_replay_matches_sale_lifecycle() {
        let now = Utc::now();
        let log = vec![
            mv(MovementType::In, MovementReason::Purchase, 50, now),
            mv(MovementType::Reserved, MovementReason::Reservation, 20, now),
            mv(MovementType::Out, MovementReason::Sale, 15, now),
            mv(MovementType::Released, MovementReason::Release, 5, now),
            mv(MovementType::Out, MovementReason::Damage, 2, now),
        ];

        let totals = replay(&log).unwrap();
        assert_eq!(
            totals,
            QuantityTotals {
                available_qty: 33,
                reserved_qty: 0,
                total_qty: 33
            }
        );
    }

    #[test]
    fn test_replay_rejects_unreachable_history() {
        let now = Utc::now();
        let log = vec![
            mv(MovementType::In, MovementReason::Purchase, 1, now),
            mv(MovementType::Out, MovementReason::Sale, 1, now),
        ];
        assert!(matches!(replay(&log), Err(StockError::Replay { .. })));
    }

    #[test]
    fn test_replay_rejects_counter_overflow() {
        let now = Utc::now();
        let log = vec![
            mv(MovementType::In, MovementReason::Purchase, i64::MAX, now),
            mv(MovementType::In, MovementReason::Purchase, 1, now),
        ];
        assert!(matches!(replay(&log), Err(StockError::Replay { .. })));

        let log = vec![
            mv(MovementType::In, MovementReason::Purchase, i64::MAX, now),
            mv(MovementType::Reserved, MovementReason::Reservation, 1, now),
            mv(MovementType::In, MovementReason::Purchase, 1, now),
        ];
        let mut totals = QuantityTotals::default();
        totals.apply(&log[0]).unwrap();
        totals.apply(&log[1]).unwrap();
        let before = totals;
        // available + reserved fits, but the total would not.
        assert!(matches!(totals.apply(&log[2]), Err(StockError::Replay { .. })));
        assert_eq!(totals, before);
    }

    #[test]
    fn test_reconciliation_reports_unreplayable_log() {
        let record = StockRecord::new("p", 1, 0).unwrap();
        let now = Utc::now();
        let log = vec![
            mv(MovementType::In, MovementReason::Adjustment, 1, now),
            mv(MovementType::Out, MovementReason::Damage, 5, now),
            mv(MovementType::In, MovementReason::Purchase, 5, now),
        ];

        let report = ReconciliationReport::build(&record, &log);
        assert!(!report.in_sync);
        assert_eq!(report.movement_count, 3);
        assert_eq!(report.replayed.available_qty, 1);
        let failure = report.replay_failure.unwrap();
        assert!(failure.contains(&log[1].id), "{failure}");
    }

    #[test]
    fn test_reconciliation_in_sync_with_record() {
        let mut record = StockRecord::new("p", 10, 0).unwrap();
        record.reserve_stock(4).unwrap();
        record.confirm_reserved_stock(3).unwrap();

        let now = Utc::now();
        let log = vec![
            mv(MovementType::In, MovementReason::Adjustment, 10, now),
            mv(MovementType::Reserved, MovementReason::Reservation, 4, now),
            mv(MovementType::Out, MovementReason::Sale, 3, now),
        ];

        let report = ReconciliationReport::build(&record, &log);
        assert!(report.in_sync);
        assert!(report.replay_failure.is_none());
        assert_eq!(report.drift(), (0, 0));
        assert_eq!(report.movement_count, 3);
    }

    #[test]
    fn test_reconciliation_detects_drift() {
        let record = StockRecord::new("p", 10, 0).unwrap();
        let log = vec![mv(MovementType::In, MovementReason::Adjustment, 8, Utc::now())];

        let report = ReconciliationReport::build(&record, &log);
        assert!(!report.in_sync);
        assert_eq!(report.drift(), (2, 0));
    }

    #[test]
    fn test_point_in_time_snapshot() {
        let t0 = Utc::now() - Duration::hours(3);
        let log = vec![
            mv(MovementType::In, MovementReason::Purchase, 10, t0),
            mv(
                MovementType::Reserved,
                MovementReason::Reservation,
                4,
                t0 + Duration::hours(1),
            ),
            mv(
                MovementType::Out,
                MovementReason::Sale,
                4,
                t0 + Duration::hours(2),
            ),
        ];

        let snap = QuantitySnapshot::at("p", t0 + Duration::minutes(90), &log).unwrap();
        assert_eq!(snap.movement_count, 2);
        assert_eq!(snap.totals.available_qty, 6);
        assert_eq!(snap.totals.reserved_qty, 4);
        assert_eq!(snap.totals.total_qty, 10);

        let before = QuantitySnapshot::at("p", t0 - Duration::minutes(1), &log).unwrap();
        assert_eq!(before.totals, QuantityTotals::default());
    }
}
