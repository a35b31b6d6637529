//! Spatial resource reservations
//!
//! Cells are claimed for a bounded time. A claim lapses on its own once
//! `expires_at` passes; expired and released records linger until the next
//! purge so utilization can be reported.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::ReservationError;
use crate::types::{offset_secs, AgentId, GridCell, Position, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceReservation {
    pub cell: GridCell,
    pub agent: AgentId,
    /// What the cell is held for, e.g. `"workbench"`
    pub resource: String,
    pub reserved_at: Timestamp,
    pub expires_at: Timestamp,
    /// Cleared on explicit release
    pub active: bool,
}

impl ResourceReservation {
    /// Active and not yet expired at `now`
    pub fn is_live(&self, now: Timestamp) -> bool {
        self.active && self.expires_at > now
    }
}

/// One record per cell
#[derive(Debug, Clone, Default)]
pub struct ReservationTable {
    cells: BTreeMap<GridCell, ResourceReservation>,
}

impl ReservationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the cell containing `position` for `duration_secs`
    ///
    /// Overwrites an expired or released record, or the caller's own live
    /// one (which extends it).
    pub fn reserve(
        &mut self,
        position: Position,
        agent: AgentId,
        resource: &str,
        duration_secs: f64,
        now: Timestamp,
    ) -> Result<ResourceReservation, ReservationError> {
        if !(duration_secs.is_finite() && duration_secs > 0.0) {
            return Err(ReservationError::InvalidDuration(duration_secs));
        }
        let expires_at = offset_secs(now, duration_secs)
            .ok_or(ReservationError::InvalidDuration(duration_secs))?;
        let cell = position.cell();
        if let Some(existing) = self.cells.get(&cell) {
            if existing.is_live(now) && existing.agent != agent {
                return Err(ReservationError::AlreadyReserved {
                    cell,
                    owner: existing.agent,
                });
            }
        }

        let reservation = ResourceReservation {
            cell,
            agent,
            resource: resource.to_string(),
            reserved_at: now,
            expires_at,
            active: true,
        };
        self.cells.insert(cell, reservation.clone());
        Ok(reservation)
    }

    /// Release the caller's claim on the cell containing `position`
    pub fn release(
        &mut self,
        position: Position,
        agent: AgentId,
        now: Timestamp,
    ) -> Result<(), ReservationError> {
        let cell = position.cell();
        match self.cells.get_mut(&cell) {
            Some(existing) if existing.is_live(now) => {
                if existing.agent != agent {
                    return Err(ReservationError::NotOwner { cell, agent });
                }
                existing.active = false;
                Ok(())
            }
            _ => Err(ReservationError::NotFound(cell)),
        }
    }

    /// Live claims by other agents within `radius` of the cell at `position`
    pub fn conflicts(
        &self,
        position: Position,
        agent: AgentId,
        radius: f64,
        now: Timestamp,
    ) -> Vec<&ResourceReservation> {
        let center = position.cell();
        let origin = Position::new(center.x as f64, center.y as f64);
        self.cells
            .values()
            .filter(|r| r.agent != agent && r.is_live(now))
            .filter(|r| r.cell.distance_to(&origin) <= radius)
            .collect()
    }

    pub fn get(&self, position: Position) -> Option<&ResourceReservation> {
        self.cells.get(&position.cell())
    }

    /// Drop expired and released records; returns how many went
    pub fn purge(&mut self, now: Timestamp) -> usize {
        let before = self.cells.len();
        self.cells.retain(|_, r| r.is_live(now));
        before - self.cells.len()
    }

    pub fn live_count(&self, now: Timestamp) -> usize {
        self.cells.values().filter(|r| r.is_live(now)).count()
    }

    /// Records tracked, live or not
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResourceReservation> {
        self.cells.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::now;
    use chrono::Duration;

    #[test]
    fn test_second_agent_is_rejected_on_same_cell() {
        let mut table = ReservationTable::new();
        let t = now();
        table
            .reserve(Position::new(5.2, 5.7), AgentId(1), "workbench", 10.0, t)
            .unwrap();

        let err = table
            .reserve(Position::new(5.9, 5.1), AgentId(2), "workbench", 10.0, t)
            .unwrap_err();
        assert_eq!(
            err,
            ReservationError::AlreadyReserved {
                cell: GridCell::new(5, 5),
                owner: AgentId(1),
            }
        );
    }

    #[test]
    fn test_owner_can_extend() {
        let mut table = ReservationTable::new();
        let t = now();
        table.reserve(Position::new(1.0, 1.0), AgentId(1), "bed", 5.0, t).unwrap();
        let renewed = table
            .reserve(Position::new(1.5, 1.5), AgentId(1), "bed", 50.0, t)
            .unwrap();
        assert_eq!(renewed.expires_at, t + Duration::seconds(50));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_expired_claim_can_be_taken() {
        let mut table = ReservationTable::new();
        let t = now();
        table.reserve(Position::new(0.0, 0.0), AgentId(1), "ore", 1.0, t).unwrap();

        let later = t + Duration::seconds(2);
        let taken = table
            .reserve(Position::new(0.0, 0.0), AgentId(2), "ore", 1.0, later)
            .unwrap();
        assert_eq!(taken.agent, AgentId(2));
    }

    #[test]
    fn test_release_is_owner_only() {
        let mut table = ReservationTable::new();
        let t = now();
        let spot = Position::new(3.0, 3.0);
        table.reserve(spot, AgentId(1), "forge", 10.0, t).unwrap();

        assert!(matches!(
            table.release(spot, AgentId(2), t),
            Err(ReservationError::NotOwner { .. })
        ));
        table.release(spot, AgentId(1), t).unwrap();
        assert!(matches!(
            table.release(spot, AgentId(1), t),
            Err(ReservationError::NotFound(_))
        ));
        table.reserve(spot, AgentId(2), "forge", 10.0, t).unwrap();
    }

    #[test]
    fn test_conflicts_within_radius() {
        let mut table = ReservationTable::new();
        let t = now();
        table.reserve(Position::new(0.0, 0.0), AgentId(1), "a", 10.0, t).unwrap();
        table.reserve(Position::new(3.0, 4.0), AgentId(2), "b", 10.0, t).unwrap();
        table.reserve(Position::new(20.0, 0.0), AgentId(3), "c", 10.0, t).unwrap();

        let found = table.conflicts(Position::new(0.5, 0.5), AgentId(1), 5.0, t);
        let owners: Vec<_> = found.iter().map(|r| r.agent).collect();
        assert_eq!(owners, vec![AgentId(2)]);
    }

    #[test]
    fn test_purge_drops_dead_records() {
        let mut table = ReservationTable::new();
        let t = now();
        table.reserve(Position::new(0.0, 0.0), AgentId(1), "a", 1.0, t).unwrap();
        table.reserve(Position::new(1.0, 0.0), AgentId(1), "b", 100.0, t).unwrap();

        let later = t + Duration::seconds(5);
        assert_eq!(table.live_count(later), 1);
        assert_eq!(table.purge(later), 1);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_invalid_duration() {
        let mut table = ReservationTable::new();
        assert!(matches!(
            table.reserve(Position::new(0.0, 0.0), AgentId(1), "a", 0.0, now()),
            Err(ReservationError::InvalidDuration(_))
        ));
    }

    #[test]
    fn test_out_of_range_duration_rejected() {
        let mut table = ReservationTable::new();
        assert!(matches!(
            table.reserve(Position::new(0.0, 0.0), AgentId(1), "a", 1e13, now()),
            Err(ReservationError::InvalidDuration(_))
        ));
        assert!(table.is_empty());
    }
}
