//! # Stock Ledger
//!
//! The per-location ledger row and the item-level snapshot built from it.
//!
//! ## The Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  stock_available, on every write                        │
//! │                                                                         │
//! │   available = max(on_hand − reserved − damaged, 0)                     │
//! │                                                                         │
//! │   WH-A: on_hand 100, reserved 30, damaged 5   → available 65           │
//! │   WH-B: on_hand  10, reserved 30, damaged 0   → available  0 (clamped) │
//! │                                                                         │
//! │  Every mutation below re-derives `stock_available` before returning.   │
//! │  Reconciliation re-derives it again from the stored columns and        │
//! │  corrects any row that disagrees by more than VARIANCE_EPSILON.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Item Snapshot
//! ```text
//! ledger rows (active only)          active global reservations
//!   WH-A  on 100 res 30 dmg 5          (no location) 10
//!   WH-B  on  20 res  0 dmg 0
//!        │                                   │
//!        ▼                                   ▼
//!   on_hand 120, location_reserved 30, global_reserved 10
//!   reserved = 40, available = max(120 − 40 − 5, 0) = 75
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{InventoryItemLocation, Lifecycle};
use crate::VARIANCE_EPSILON;

// =============================================================================
// Quantity Helpers
// =============================================================================

/// The available-stock formula.
#[inline]
pub fn derive_available(on_hand: f64, reserved: f64, damaged: f64) -> f64 {
    (on_hand - reserved - damaged).max(0.0)
}

/// True when `value` is a real change rather than float noise.
#[inline]
pub fn exceeds_epsilon(value: f64) -> bool {
    value.abs() > VARIANCE_EPSILON
}

/// Rounds a quantity to 4 decimal places (the ledger's precision).
#[inline]
pub fn round_quantity(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Rounds a quantity to whole units for the product's displayed stock.
#[inline]
pub fn round_to_units(value: f64) -> i64 {
    value.round() as i64
}

// =============================================================================
// Aggregates
// =============================================================================

/// Item-level totals cached on `InventoryItem`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StockAggregates {
    pub current_stock: f64,
    pub reserved_stock: f64,
    pub available_stock: f64,
}

// =============================================================================
// Shortfall
// =============================================================================

/// A request that the row could not cover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shortfall {
    pub requested: f64,
    pub available: f64,
}

impl Shortfall {
    /// Converts into the caller-visible insufficient-stock error.
    pub fn into_error(self, sku: &str, location_code: Option<&str>) -> CoreError {
        CoreError::InsufficientStock {
            sku: sku.to_string(),
            location: location_code.map(str::to_string),
            requested: self.requested,
            available: self.available,
        }
    }
}

// =============================================================================
// Ledger Row Mutations
// =============================================================================

impl InventoryItemLocation {
    /// A fresh, all-zero row for an (item, location) pair.
    pub fn empty(tenant_id: &str, item_id: &str, location_id: &str, now: DateTime<Utc>) -> Self {
        InventoryItemLocation {
            id: crate::new_id(),
            tenant_id: tenant_id.to_string(),
            inventory_item_id: item_id.to_string(),
            inventory_location_id: location_id.to_string(),
            stock_on_hand: 0.0,
            stock_reserved: 0.0,
            stock_available: 0.0,
            stock_damaged: 0.0,
            stock_in_transit: 0.0,
            last_reconciled_at: None,
            lifecycle: Lifecycle::Active,
            created_at: now,
            updated_at: now,
        }
    }

    /// What `stock_available` should be given the other columns.
    pub fn derived_available(&self) -> f64 {
        derive_available(self.stock_on_hand, self.stock_reserved, self.stock_damaged)
    }

    fn rederive(&mut self, now: DateTime<Utc>) {
        self.stock_available = self.derived_available();
        self.updated_at = now;
    }

    /// Reactivates a retired row. Quantities are kept as they were.
    pub fn restore(&mut self, now: DateTime<Utc>) {
        self.lifecycle = Lifecycle::Active;
        self.rederive(now);
    }

    /// Sets on-hand to an absolute value. Returns the previous on-hand.
    pub fn set_on_hand(&mut self, quantity: f64, now: DateTime<Utc>) -> f64 {
        let previous = self.stock_on_hand;
        self.stock_on_hand = quantity.max(0.0);
        self.last_reconciled_at = Some(now);
        self.rederive(now);
        previous
    }

    /// Applies a signed delta to on-hand. Returns the previous on-hand.
    ///
    /// Fails without touching the row when the result would be negative.
    pub fn apply_delta(&mut self, delta: f64, now: DateTime<Utc>) -> Result<f64, Shortfall> {
        let previous = self.stock_on_hand;
        let next = previous + delta;
        if next < 0.0 {
            return Err(Shortfall {
                requested: -delta,
                available: previous,
            });
        }
        self.stock_on_hand = next;
        self.last_reconciled_at = Some(now);
        self.rederive(now);
        Ok(previous)
    }

    /// Holds `quantity` out of the available stock.
    pub fn reserve(&mut self, quantity: f64, now: DateTime<Utc>) -> Result<(), Shortfall> {
        if self.stock_available < quantity {
            return Err(Shortfall {
                requested: quantity,
                available: self.stock_available,
            });
        }
        self.stock_reserved += quantity;
        self.rederive(now);
        Ok(())
    }

    /// Returns a hold. Reserved never goes below zero.
    pub fn release(&mut self, quantity: f64, now: DateTime<Utc>) {
        self.stock_reserved = (self.stock_reserved - quantity).max(0.0);
        self.rederive(now);
    }

    /// Takes `quantity` of on-hand stock out (transfer source).
    pub fn withdraw(&mut self, quantity: f64, now: DateTime<Utc>) -> Result<(), Shortfall> {
        if self.stock_on_hand < quantity {
            return Err(Shortfall {
                requested: quantity,
                available: self.stock_on_hand,
            });
        }
        self.stock_on_hand -= quantity;
        self.rederive(now);
        Ok(())
    }

    /// Puts `quantity` of on-hand stock in (transfer destination).
    pub fn receive(&mut self, quantity: f64, now: DateTime<Utc>) {
        self.stock_on_hand += quantity;
        self.rederive(now);
    }
}

// =============================================================================
// Item Snapshot
// =============================================================================

/// One ledger row as seen by a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationSnapshot {
    pub location_id: String,
    pub stock_on_hand: f64,
    pub stock_reserved: f64,
    pub stock_available: f64,
    pub stock_damaged: f64,
    pub stock_in_transit: f64,
}

/// A ledger row whose stored `stock_available` disagreed with the formula.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailabilityCorrection {
    pub ledger_id: String,
    pub location_id: String,
    pub stored: f64,
    pub derived: f64,
}

/// Item totals recomputed from ledger rows and global holds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub on_hand: f64,
    /// location_reserved + global_reserved
    pub reserved: f64,
    pub location_reserved: f64,
    pub global_reserved: f64,
    pub damaged: f64,
    pub in_transit: f64,
    pub available: f64,
    /// Active reservations past their advisory expiry. Still counted.
    pub expired_active_reservations: usize,
    pub locations: Vec<LocationSnapshot>,
}

impl ItemSnapshot {
    /// Sums the active rows and the global holds.
    ///
    /// Rows whose stored available differs from the formula by more than
    /// the epsilon are reported as corrections; the snapshot already uses
    /// the corrected value.
    pub fn collect(
        rows: &[InventoryItemLocation],
        global_reserved: f64,
    ) -> (ItemSnapshot, Vec<AvailabilityCorrection>) {
        let mut snapshot = ItemSnapshot {
            global_reserved,
            ..ItemSnapshot::default()
        };
        let mut corrections = Vec::new();

        for row in rows.iter().filter(|r| r.lifecycle.is_active()) {
            snapshot.on_hand += row.stock_on_hand;
            snapshot.location_reserved += row.stock_reserved;
            snapshot.damaged += row.stock_damaged;
            snapshot.in_transit += row.stock_in_transit;

            let derived = row.derived_available();
            let mut available = row.stock_available;
            if exceeds_epsilon(derived - row.stock_available) {
                corrections.push(AvailabilityCorrection {
                    ledger_id: row.id.clone(),
                    location_id: row.inventory_location_id.clone(),
                    stored: row.stock_available,
                    derived,
                });
                available = derived;
            }

            snapshot.locations.push(LocationSnapshot {
                location_id: row.inventory_location_id.clone(),
                stock_on_hand: row.stock_on_hand,
                stock_reserved: row.stock_reserved,
                stock_available: available,
                stock_damaged: row.stock_damaged,
                stock_in_transit: row.stock_in_transit,
            });
        }

        snapshot.reserved = snapshot.location_reserved + snapshot.global_reserved;
        snapshot.available = derive_available(snapshot.on_hand, snapshot.reserved, snapshot.damaged);

        (snapshot, corrections)
    }

    pub fn aggregates(&self) -> StockAggregates {
        StockAggregates {
            current_stock: self.on_hand,
            reserved_stock: self.reserved,
            available_stock: self.available.max(0.0),
        }
    }

    /// JSON form stored in reconciliation metadata.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "on_hand": self.on_hand,
            "reserved": self.reserved,
            "available": self.available,
            "damaged": self.damaged,
            "in_transit": self.in_transit,
            "location_reserved": self.location_reserved,
            "global_reserved": self.global_reserved,
            "expired_active_reservations": self.expired_active_reservations,
            "locations": self.locations,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(on_hand: f64, reserved: f64, damaged: f64) -> InventoryItemLocation {
        let mut r = InventoryItemLocation::empty("t", "item", "loc", Utc::now());
        r.stock_on_hand = on_hand;
        r.stock_reserved = reserved;
        r.stock_damaged = damaged;
        r.stock_available = r.derived_available();
        r
    }

    fn assert_invariant(r: &InventoryItemLocation) {
        let expected = derive_available(r.stock_on_hand, r.stock_reserved, r.stock_damaged);
        assert!((r.stock_available - expected).abs() < 1e-9, "{:?}", r);
    }

    #[test]
    fn test_derive_available_clamps_at_zero() {
        assert_eq!(derive_available(100.0, 30.0, 5.0), 65.0);
        assert_eq!(derive_available(10.0, 30.0, 0.0), 0.0);
    }

    #[test]
    fn test_set_on_hand_returns_previous_and_stamps() {
        let mut r = row(10.0, 4.0, 0.0);
        let now = Utc::now();
        let previous = r.set_on_hand(25.0, now);
        assert_eq!(previous, 10.0);
        assert_eq!(r.stock_available, 21.0);
        assert_eq!(r.last_reconciled_at, Some(now));
    }

    #[test]
    fn test_apply_delta_rejects_negative_and_leaves_row() {
        let mut r = row(5.0, 0.0, 0.0);
        let before = r.clone();
        let err = r.apply_delta(-6.0, Utc::now()).unwrap_err();
        assert_eq!(err.requested, 6.0);
        assert_eq!(err.available, 5.0);
        assert_eq!(r, before);

        assert_eq!(r.apply_delta(-5.0, Utc::now()).unwrap(), 5.0);
        assert_eq!(r.stock_on_hand, 0.0);
    }

    #[test]
    fn test_reserve_checks_available_not_on_hand() {
        let mut r = row(100.0, 0.0, 0.0);
        r.reserve(30.0, Utc::now()).unwrap();
        assert_eq!(r.stock_available, 70.0);
        r.reserve(50.0, Utc::now()).unwrap();
        assert_eq!(r.stock_available, 20.0);

        let err = r.reserve(60.0, Utc::now()).unwrap_err();
        assert_eq!(err.available, 20.0);
        assert_eq!(r.stock_reserved, 80.0);
    }

    #[test]
    fn test_release_never_below_zero() {
        let mut r = row(10.0, 2.0, 0.0);
        r.release(5.0, Utc::now());
        assert_eq!(r.stock_reserved, 0.0);
        assert_eq!(r.stock_available, 10.0);
    }

    #[test]
    fn test_withdraw_checks_on_hand() {
        let mut r = row(10.0, 8.0, 0.0);
        // on-hand covers it even though available is only 2
        r.withdraw(9.0, Utc::now()).unwrap();
        assert_eq!(r.stock_on_hand, 1.0);
        assert_eq!(r.stock_available, 0.0);
        assert!(r.withdraw(2.0, Utc::now()).is_err());
    }

    #[test]
    fn test_withdraw_and_reserve_reject_sub_epsilon_excess() {
        let mut from = row(10.0, 0.0, 0.0);
        let mut to = row(0.0, 0.0, 0.0);
        let err = from.withdraw(10.000_05, Utc::now()).unwrap_err();
        assert_eq!(err.available, 10.0);
        assert_eq!(from.stock_on_hand, 10.0);

        from.withdraw(10.0, Utc::now()).unwrap();
        to.receive(10.0, Utc::now());
        assert_eq!(from.stock_on_hand + to.stock_on_hand, 10.0);

        let mut held = row(10.0, 0.0, 0.0);
        assert!(held.reserve(10.000_05, Utc::now()).is_err());
        assert_eq!(held.stock_reserved, 0.0);
        held.reserve(10.0, Utc::now()).unwrap();
        assert_eq!(held.stock_available, 0.0);
    }

    #[test]
    fn test_snapshot_sums_rows_and_global_holds() {
        let a = row(100.0, 30.0, 5.0);
        let mut b = row(20.0, 0.0, 0.0);
        b.inventory_location_id = "loc-b".into();

        let (snapshot, corrections) = ItemSnapshot::collect(&[a, b], 10.0);
        assert!(corrections.is_empty());
        assert_eq!(snapshot.on_hand, 120.0);
        assert_eq!(snapshot.location_reserved, 30.0);
        assert_eq!(snapshot.global_reserved, 10.0);
        assert_eq!(snapshot.reserved, 40.0);
        assert_eq!(snapshot.available, 75.0);
        assert_eq!(snapshot.locations.len(), 2);
    }

    #[test]
    fn test_snapshot_reports_drifted_available() {
        let mut drifted = row(50.0, 10.0, 0.0);
        drifted.stock_available = 45.0;

        let (snapshot, corrections) = ItemSnapshot::collect(&[drifted.clone()], 0.0);
        assert_eq!(corrections.len(), 1);
        assert_eq!(corrections[0].ledger_id, drifted.id);
        assert_eq!(corrections[0].stored, 45.0);
        assert_eq!(corrections[0].derived, 40.0);
        assert_eq!(snapshot.locations[0].stock_available, 40.0);
    }

    #[test]
    fn test_snapshot_skips_retired_rows() {
        let active = row(10.0, 0.0, 0.0);
        let mut retired = row(99.0, 0.0, 0.0);
        retired.lifecycle = Lifecycle::Retired;

        let (snapshot, _) = ItemSnapshot::collect(&[active, retired], 0.0);
        assert_eq!(snapshot.on_hand, 10.0);
    }

    #[test]
    fn test_round_helpers() {
        assert_eq!(round_quantity(1.234_56), 1.2346);
        assert_eq!(round_to_units(44.5), 45);
        assert_eq!(round_to_units(44.4), 44);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(f64),
        Delta(f64),
        Reserve(f64),
        Release(f64),
        Withdraw(f64),
        Receive(f64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0u32..500).prop_map(|q| Op::Set(q as f64)),
            (-200i32..200).prop_map(|d| Op::Delta(d as f64)),
            (1u32..200).prop_map(|q| Op::Reserve(q as f64)),
            (1u32..200).prop_map(|q| Op::Release(q as f64)),
            (1u32..200).prop_map(|q| Op::Withdraw(q as f64)),
            (1u32..200).prop_map(|q| Op::Receive(q as f64)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of mutations runs, available always
        /// matches the formula and on-hand never goes negative.
        #[test]
        fn available_invariant_holds_for_any_sequence(
            damaged in 0u32..20,
            ops in prop::collection::vec(op_strategy(), 1..40)
        ) {
            let mut r = row(0.0, 0.0, damaged as f64);
            let now = Utc::now();
            for op in ops {
                match op {
                    Op::Set(q) => { r.set_on_hand(q, now); }
                    Op::Delta(d) => { let _ = r.apply_delta(d, now); }
                    Op::Reserve(q) => { let _ = r.reserve(q, now); }
                    Op::Release(q) => r.release(q, now),
                    Op::Withdraw(q) => { let _ = r.withdraw(q, now); }
                    Op::Receive(q) => r.receive(q, now),
                }
                assert_invariant(&r);
                prop_assert!(r.stock_on_hand >= 0.0);
                prop_assert!(r.stock_reserved >= 0.0);
            }
        }

        /// Property: reserve immediately followed by release of the same
        /// quantity restores reserved and available exactly.
        #[test]
        fn reserve_then_release_restores_row(
            on_hand in 0u32..1000,
            reserved in 0u32..500,
            qty in 1u32..500
        ) {
            let mut r = row(on_hand as f64, reserved as f64, 0.0);
            let before = (r.stock_reserved, r.stock_available);
            if r.reserve(qty as f64, Utc::now()).is_ok() {
                r.release(qty as f64, Utc::now());
                prop_assert_eq!((r.stock_reserved, r.stock_available), before);
            } else {
                prop_assert_eq!((r.stock_reserved, r.stock_available), before);
            }
        }

        /// Property: a transfer preserves the on-hand sum of both rows.
        #[test]
        fn transfer_preserves_on_hand_sum(
            from_on_hand in 0u32..1000,
            to_on_hand in 0u32..1000,
            qty in 1u32..1000
        ) {
            let mut from = row(from_on_hand as f64, 0.0, 0.0);
            let mut to = row(to_on_hand as f64, 0.0, 0.0);
            let total = from.stock_on_hand + to.stock_on_hand;
            if from.withdraw(qty as f64, Utc::now()).is_ok() {
                to.receive(qty as f64, Utc::now());
            }
            prop_assert_eq!(from.stock_on_hand + to.stock_on_hand, total);
        }
    }
}
