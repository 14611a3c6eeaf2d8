//! Player ticket registry.
//!
//! # Problem
//!
//! The dashboard queues simulated players and wants to show who is waiting
//! without asking the backend for per-ticket state (it only exposes
//! aggregates). The local view is therefore *optimistic*: a ticket is added
//! as soon as the enqueue call succeeds and removed when an authoritative
//! match event covers it, or when the operator clears the pool.
//!
//! # Identity
//!
//! Each ticket carries a [`TicketKey`]:
//!
//! ```text
//! Assigned(ticket_id)   backend returned an identifier; sole removal key
//! Pending(player_name)  no identifier yet; matched by bare player name
//! ```
//!
//! Two assigned tickets that happen to share a player name are never
//! confused: name matching only applies to pending tickets.
//!
//! # Invariants
//!
//! - Ticket identifiers are unique while present.
//! - Slots (local sequence numbers, `1..=slots`) are unique while present and
//!   become reusable only after the ticket occupying them is removed.
//!
//! Pure, deterministic, no IO. Ownership and synchronization are the caller's
//! concern.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::RangeInclusive;

use chrono::{DateTime, Utc};
use mmd_schemas::{PoolView, Region, TicketView};

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TicketKey {
    Assigned(String),
    Pending(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerTicket {
    pub slot: u32,
    pub player_name: String,
    pub skill: i64,
    pub region: Region,
    pub game_mode: String,
    pub enqueued_at: DateTime<Utc>,
    pub key: TicketKey,
}

impl PlayerTicket {
    /// Build a ticket from an enqueue result. An absent or blank backend
    /// identifier yields a pending ticket keyed by player name.
    pub fn new(
        slot: u32,
        player_name: impl Into<String>,
        skill: i64,
        region: Region,
        game_mode: impl Into<String>,
        ticket_id: Option<String>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        let player_name = player_name.into();
        let key = match ticket_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => TicketKey::Assigned(id),
            None => TicketKey::Pending(player_name.clone()),
        };
        Self {
            slot,
            player_name,
            skill,
            region,
            game_mode: game_mode.into(),
            enqueued_at,
            key,
        }
    }

    pub fn ticket_id(&self) -> Option<&str> {
        match &self.key {
            TicketKey::Assigned(id) => Some(id.as_str()),
            TicketKey::Pending(_) => None,
        }
    }

    /// Whether an identifier in a match event's covered list refers to this
    /// ticket.
    pub fn is_covered_by(&self, covered: &HashSet<&str>) -> bool {
        match &self.key {
            TicketKey::Assigned(id) => covered.contains(id.as_str()),
            TicketKey::Pending(name) => covered.contains(name.as_str()),
        }
    }

    pub fn view(&self) -> TicketView {
        TicketView {
            slot: self.slot,
            player_name: self.player_name.clone(),
            skill: self.skill,
            region: self.region,
            game_mode: self.game_mode.clone(),
            ticket_id: self.ticket_id().map(str::to_string),
            enqueued_at: self.enqueued_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("slot {slot} is outside 1..={slots}")]
    SlotOutOfRange { slot: u32, slots: u32 },

    #[error("slot {slot} already holds a queued ticket")]
    SlotOccupied { slot: u32 },

    #[error("ticket {ticket_id} is already tracked")]
    DuplicateTicket { ticket_id: String },

    #[error("skill {skill} is outside {min}..={max}")]
    SkillOutOfRange { skill: i64, min: i64, max: i64 },

    #[error("no ticket is present in slot {slot}")]
    TicketNotPresent { slot: u32 },
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct TicketRegistry {
    slots: u32,
    skill_range: RangeInclusive<i64>,
    /// slot -> ticket
    tickets: BTreeMap<u32, PlayerTicket>,
    /// assigned ticket_id -> slot
    by_ticket: HashMap<String, u32>,
}

impl TicketRegistry {
    pub fn new(slots: u32, skill_range: RangeInclusive<i64>) -> Self {
        Self {
            slots,
            skill_range,
            tickets: BTreeMap::new(),
            by_ticket: HashMap::new(),
        }
    }

    pub fn slots(&self) -> u32 {
        self.slots
    }

    pub fn skill_range(&self) -> RangeInclusive<i64> {
        self.skill_range.clone()
    }

    /// `Ok` when `slot` is in range and currently free.
    pub fn check_slot(&self, slot: u32) -> Result<(), RegistryError> {
        if slot == 0 || slot > self.slots {
            return Err(RegistryError::SlotOutOfRange {
                slot,
                slots: self.slots,
            });
        }
        if self.tickets.contains_key(&slot) {
            return Err(RegistryError::SlotOccupied { slot });
        }
        Ok(())
    }

    /// Lowest free slot, if any.
    pub fn free_slot(&self) -> Option<u32> {
        (1..=self.slots).find(|s| !self.tickets.contains_key(s))
    }

    pub fn is_slot_active(&self, slot: u32) -> bool {
        self.tickets.contains_key(&slot)
    }

    /// Insert a ticket after a successful enqueue.
    pub fn insert(&mut self, ticket: PlayerTicket) -> Result<&PlayerTicket, RegistryError> {
        self.check_slot(ticket.slot)?;

        if !self.skill_range.contains(&ticket.skill) {
            return Err(RegistryError::SkillOutOfRange {
                skill: ticket.skill,
                min: *self.skill_range.start(),
                max: *self.skill_range.end(),
            });
        }

        if let Some(id) = ticket.ticket_id() {
            if self.by_ticket.contains_key(id) {
                return Err(RegistryError::DuplicateTicket {
                    ticket_id: id.to_string(),
                });
            }
            self.by_ticket.insert(id.to_string(), ticket.slot);
        }

        let slot = ticket.slot;
        Ok(self.tickets.entry(slot).or_insert(ticket))
    }

    /// Remove every ticket covered by `covered_ids`.
    ///
    /// Identifiers with no local counterpart are ignored; they belong to
    /// tickets queued by other sessions.
    pub fn remove_covered(&mut self, covered_ids: &[String]) -> Vec<PlayerTicket> {
        if covered_ids.is_empty() || self.tickets.is_empty() {
            return Vec::new();
        }
        let covered: HashSet<&str> = covered_ids.iter().map(String::as_str).collect();

        let hit: Vec<u32> = self
            .tickets
            .values()
            .filter(|t| t.is_covered_by(&covered))
            .map(|t| t.slot)
            .collect();

        let mut removed = Vec::with_capacity(hit.len());
        for slot in hit {
            if let Some(t) = self.tickets.remove(&slot) {
                if let Some(id) = t.ticket_id() {
                    self.by_ticket.remove(id);
                }
                removed.push(t);
            }
        }
        removed
    }

    /// Drop everything. Returns the removed tickets in slot order.
    pub fn clear(&mut self) -> Vec<PlayerTicket> {
        self.by_ticket.clear();
        std::mem::take(&mut self.tickets).into_values().collect()
    }

    pub fn get_by_slot(&self, slot: u32) -> Result<&PlayerTicket, RegistryError> {
        self.tickets
            .get(&slot)
            .ok_or(RegistryError::TicketNotPresent { slot })
    }

    pub fn get_by_ticket(&self, ticket_id: &str) -> Option<&PlayerTicket> {
        let slot = self.by_ticket.get(ticket_id)?;
        self.tickets.get(slot)
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Tickets in slot order.
    pub fn iter(&self) -> impl Iterator<Item = &PlayerTicket> {
        self.tickets.values()
    }

    /// Rounded mean skill over present tickets.
    pub fn average_skill(&self) -> Option<i64> {
        if self.tickets.is_empty() {
            return None;
        }
        let sum: i64 = self.tickets.values().map(|t| t.skill).sum();
        let n = self.tickets.len() as f64;
        Some((sum as f64 / n).round() as i64)
    }

    /// Distinct regions in slot order of first appearance.
    pub fn regions(&self) -> Vec<Region> {
        let mut out: Vec<Region> = Vec::new();
        for t in self.tickets.values() {
            if !out.contains(&t.region) {
                out.push(t.region);
            }
        }
        out
    }

    /// Region with the most tickets; ties go to the region seen first.
    pub fn most_common_region(&self) -> Option<Region> {
        let mut counts: Vec<(Region, usize)> = Vec::new();
        for t in self.tickets.values() {
            match counts.iter_mut().find(|(r, _)| *r == t.region) {
                Some((_, n)) => *n += 1,
                None => counts.push((t.region, 1)),
            }
        }
        let mut best: Option<(Region, usize)> = None;
        for (r, n) in counts {
            if best.map_or(true, |(_, bn)| n > bn) {
                best = Some((r, n));
            }
        }
        best.map(|(r, _)| r)
    }

    pub fn view(&self) -> PoolView {
        PoolView {
            tickets: self.tickets.values().map(PlayerTicket::view).collect(),
            total: self.tickets.len(),
            average_skill: self.average_skill(),
            regions: self.regions(),
            most_common_region: self.most_common_region(),
        }
    }
}
