use std::{
    fmt,
    sync::{Mutex, MutexGuard, OnceLock, PoisonError},
};

use chrono::{DateTime, Utc};

use crate::scheduler;

/// Number of slots in the table.
///
/// This is also the number of tickets a technician may work on at the same time,
/// the two limits just happen to share a value.
pub const CAPACITY: usize = 5;

pub const MAX_TITLE_SIZE: usize = 127;
pub const MAX_DESC_SIZE: usize = 511;
pub const MAX_USERNAME_SIZE: usize = 63;

pub type Username = BoundedText<MAX_USERNAME_SIZE>;

static SHARED_STORE: OnceLock<TicketStore> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketState {
    Open,
    InProgress,
    Closed,
    Priority,
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TicketState::Open => "OPEN",
            TicketState::InProgress => "IN_PROGRESS",
            TicketState::Closed => "CLOSED",
            TicketState::Priority => "PRIORITY",
        };

        f.write_str(name)
    }
}

/// An owned string that never holds more than `N` bytes
///
/// longer input is silently cut at the last char boundary that fits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundedText<const N: usize>(String);

impl<const N: usize> BoundedText<N> {
    pub fn new(text: &str) -> Self {
        let mut end = text.len().min(N);
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        Self(text[..end].to_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<const N: usize> fmt::Display for BoundedText<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub id: u32,
    pub title: BoundedText<MAX_TITLE_SIZE>,
    pub description: BoundedText<MAX_DESC_SIZE>,
    pub owner: Username,
    // empty while nobody has claimed the ticket
    pub technician: Username,
    pub state: TicketState,
    pub created: DateTime<Utc>,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum InsertError {
    #[error("No ticket ids left, no more tickets can be created.")]
    IdsExhausted,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum TakeError {
    #[error("Ticket not found.")]
    NotFound,

    #[error("Ticket already closed.")]
    Closed,

    #[error("Maximum capacity reached ({} tickets).", CAPACITY)]
    AtCapacity,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CloseError {
    #[error("Ticket not found.")]
    NotFound,

    #[error("Ticket already closed.")]
    Closed,

    #[error("You are not assigned to this ticket.")]
    NotAssigned,
}

/// The raw ticket table
///
/// only reachable through `TicketStore`, which hands it out while holding its lock.
#[derive(Debug)]
pub struct Table {
    slots: [Option<Ticket>; CAPACITY],
    // slot the next insert writes into
    cursor: usize,
    next_id: u32,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            slots: Default::default(),
            cursor: 0,
            next_id: 1,
        }
    }
}

impl Table {
    /// Writes a new open ticket into the slot under the cursor
    ///
    /// whatever occupied that slot is overwritten, even a ticket that is still being worked on.
    /// ids are never handed out twice, once they run out every insert fails and nothing changes.
    pub fn insert(
        &mut self,
        owner: &str,
        title: &str,
        description: &str,
        created: DateTime<Utc>,
    ) -> Result<u32, InsertError> {
        let id = self.next_id;
        self.next_id = id.checked_add(1).ok_or(InsertError::IdsExhausted)?;

        let slot = &mut self.slots[self.cursor];
        if let Some(evicted) = slot.as_ref().filter(|ticket| ticket.state != TicketState::Closed) {
            tracing::warn!(
                "ticket {} ({}) was evicted by ticket {} before being closed",
                evicted.id,
                evicted.state,
                id
            );
        }

        *slot = Some(Ticket {
            id,
            title: BoundedText::new(title),
            description: BoundedText::new(description),
            owner: BoundedText::new(owner),
            technician: Username::default(),
            state: TicketState::Open,
            created,
        });
        self.cursor = (self.cursor + 1) % CAPACITY;

        Ok(id)
    }

    /// Iterates over the live tickets in slot order
    pub fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.slots.iter().flatten()
    }

    pub fn tickets_mut(&mut self) -> impl Iterator<Item = &mut Ticket> {
        self.slots.iter_mut().flatten()
    }

    pub fn list_by_owner(&self, owner: &str) -> Vec<Ticket> {
        self.tickets()
            .filter(|ticket| ticket.owner.as_str() == owner)
            .cloned()
            .collect()
    }

    // unassigned tickets, and the ones assigned to the technician
    pub fn list_visible_to(&self, technician: &str) -> Vec<Ticket> {
        self.tickets()
            .filter(|ticket| {
                ticket.technician.is_empty() || ticket.technician.as_str() == technician
            })
            .cloned()
            .collect()
    }

    pub fn find(&self, id: u32) -> Option<&Ticket> {
        self.tickets().find(|ticket| ticket.id == id)
    }

    fn find_mut(&mut self, id: u32) -> Option<&mut Ticket> {
        self.tickets_mut().find(|ticket| ticket.id == id)
    }

    pub fn count_in_progress_for(&self, technician: &str) -> usize {
        self.tickets()
            .filter(|ticket| {
                ticket.state == TicketState::InProgress
                    && ticket.technician.as_str() == technician
            })
            .count()
    }

    /// Assigns a ticket to a technician and moves it to `InProgress`
    ///
    /// fails when the ticket doesn't exist, is closed,
    /// or the technician is already working on `CAPACITY` tickets.
    pub fn assign(&mut self, id: u32, technician: &str) -> Result<(), TakeError> {
        match self.find(id) {
            None => return Err(TakeError::NotFound),
            Some(ticket) if ticket.state == TicketState::Closed => return Err(TakeError::Closed),
            Some(_) => {}
        }

        if self.count_in_progress_for(technician) >= CAPACITY {
            return Err(TakeError::AtCapacity);
        }

        let ticket = self.find_mut(id).ok_or(TakeError::NotFound)?;
        ticket.technician = BoundedText::new(technician);
        ticket.state = TicketState::InProgress;

        Ok(())
    }

    /// Closes a ticket on behalf of the technician it is assigned to
    ///
    /// the technician is kept on the closed ticket for the record.
    pub fn close(&mut self, id: u32, technician: &str) -> Result<(), CloseError> {
        let ticket = self.find_mut(id).ok_or(CloseError::NotFound)?;

        if ticket.state == TicketState::Closed {
            return Err(CloseError::Closed);
        }

        if ticket.technician.is_empty() || ticket.technician.as_str() != technician {
            return Err(CloseError::NotAssigned);
        }

        ticket.state = TicketState::Closed;
        Ok(())
    }
}

/// The ticket table shared by every connection
///
/// every method runs entirely under a single lock acquisition,
/// composite operations included, so no caller can observe a half applied change.
#[derive(Debug, Default)]
pub struct TicketStore {
    table: Mutex<Table>,
}

impl TicketStore {
    /// Returns the process wide store, creating it on first use
    pub fn shared() -> &'static TicketStore {
        SHARED_STORE.get_or_init(TicketStore::default)
    }

    // a panicking holder can't leave the table half written: every mutation is a plain field store
    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, owner: &str, title: &str, description: &str) -> Result<u32, InsertError> {
        self.insert_at(owner, title, description, Utc::now())
    }

    pub fn insert_at(
        &self,
        owner: &str,
        title: &str,
        description: &str,
        created: DateTime<Utc>,
    ) -> Result<u32, InsertError> {
        self.lock().insert(owner, title, description, created)
    }

    pub fn list_by_owner(&self, owner: &str) -> Vec<Ticket> {
        self.lock().list_by_owner(owner)
    }

    pub fn list_visible_to(&self, technician: &str) -> Vec<Ticket> {
        self.lock().list_visible_to(technician)
    }

    pub fn find(&self, id: u32) -> Option<Ticket> {
        self.lock().find(id).cloned()
    }

    pub fn count_in_progress_for(&self, technician: &str) -> usize {
        self.lock().count_in_progress_for(technician)
    }

    /// Claims a ticket for a technician, see `Table::assign`
    pub fn take(&self, id: u32, technician: &str) -> Result<(), TakeError> {
        self.lock().assign(id, technician)
    }

    pub fn close(&self, id: u32, technician: &str) -> Result<(), CloseError> {
        self.lock().close(id, technician)
    }

    pub fn escalate_aged(&self, now: DateTime<Utc>) -> usize {
        scheduler::escalate_aged(&mut self.lock(), now)
    }

    /// Ages open tickets into priority and hands the pending priority tickets to the technician
    ///
    /// returns the number of tickets that were assigned.
    pub fn identify_technician(&self, technician: &str, now: DateTime<Utc>) -> usize {
        let mut table = self.lock();
        scheduler::escalate_aged(&mut table, now);
        scheduler::assign_priority(&mut table, technician)
    }
}
