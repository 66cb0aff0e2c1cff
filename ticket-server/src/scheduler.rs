use chrono::{DateTime, Duration, Utc};

use crate::tickets::{BoundedText, Table, TicketState, CAPACITY};

// an open ticket older than this becomes a priority
pub const PRIORITY_AGE_SECONDS: i64 = 24 * 3600;

/// Promotes every open ticket that reached the priority age
///
/// tickets only ever move forward, calling this again with a later `now` never demotes anything.
/// returns the number of promoted tickets.
pub fn escalate_aged(table: &mut Table, now: DateTime<Utc>) -> usize {
    let threshold = Duration::seconds(PRIORITY_AGE_SECONDS);

    let mut promoted = 0;
    for ticket in table.tickets_mut() {
        if ticket.state == TicketState::Open && now - ticket.created >= threshold {
            ticket.state = TicketState::Priority;
            promoted += 1;
        }
    }

    if promoted > 0 {
        tracing::debug!("{} ticket(s) escalated to priority", promoted);
    }

    promoted
}

/// Hands pending priority tickets to a technician, first fit in slot order
///
/// never pushes the technician past `CAPACITY` tickets in progress.
/// returns the number of tickets that were assigned.
pub fn assign_priority(table: &mut Table, technician: &str) -> usize {
    let remaining = CAPACITY.saturating_sub(table.count_in_progress_for(technician));

    let mut assigned = 0;
    for ticket in table
        .tickets_mut()
        .filter(|ticket| ticket.state == TicketState::Priority)
        .take(remaining)
    {
        ticket.technician = BoundedText::new(technician);
        ticket.state = TicketState::InProgress;
        assigned += 1;
    }

    assigned
}
