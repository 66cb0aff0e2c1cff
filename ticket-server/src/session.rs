use std::fmt::Write;

use chrono::{Local, Utc};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{
    command::{Command, Role},
    connection::Connection,
    tickets::{Ticket, TicketStore, Username},
};

const WELCOME_MSG: &str =
    "Welcome to the ticketing server.\nUsage: IDENT <username> <role:user|tech>\n";

const HELP_MSG: &str = "Commands:\n\
    IDENT <username> <role:user|tech>\n\
    sendTicket -new \"title\" \"description\"\n\
    sendTicket -l\n\
    list (technician, shows your tickets and the unassigned ones)\n\
    take <id> (technician)\n\
    close <id> (technician)\n";

const IDENTIFY_FIRST_MSG: &str = "Please identify first (IDENT ...)\n";
const TECHNICIAN_ONLY_MSG: &str =
    "This command is reserved to technicians (IDENT <username> tech)\n";
const CONNECT_TICKET_MSG: &str = "Use IDENT <username> tech to connect as a technician.\n";
const UNKNOWN_COMMAND_MSG: &str = "Unknown command. Type 'help' for help.\n";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    username: Username,
    role: Role,
}

/// The protocol state of a single client
///
/// starts unidentified, `IDENT` sets (or replaces) who the client is.
#[derive(Debug)]
pub struct Session<'a> {
    identity: Option<Identity>,
    store: &'a TicketStore,
}

impl<'a> Session<'a> {
    pub fn new(store: &'a TicketStore) -> Self {
        Self {
            identity: None,
            store,
        }
    }

    /// Interprets a single line and returns the reply block for it
    pub fn handle_line(&mut self, line: &str) -> String {
        match line.parse::<Command>() {
            Ok(command) => self.handle_command(command),
            Err(err) if err.requires_identity() && self.identity.is_none() => {
                IDENTIFY_FIRST_MSG.into()
            }
            Err(err) => rejection(err),
        }
    }

    pub fn handle_command(&mut self, command: Command) -> String {
        match command {
            Command::Ident { username, role } => self.ident(&username, role),
            Command::NewTicket { title, description } => match &self.identity {
                Some(identity) => {
                    match self
                        .store
                        .insert(identity.username.as_str(), &title, &description)
                    {
                        Ok(id) => format!("Ticket created with ID {}\n", id),
                        Err(err) => rejection(err),
                    }
                }
                None => IDENTIFY_FIRST_MSG.into(),
            },
            Command::ListOwn => match &self.identity {
                Some(identity) => {
                    let owner = identity.username.as_str();
                    let tickets = self.store.list_by_owner(owner);
                    if tickets.is_empty() {
                        format!("No tickets for {}\n", owner)
                    } else {
                        render(&tickets, false)
                    }
                }
                None => IDENTIFY_FIRST_MSG.into(),
            },
            Command::List => match self.technician() {
                Some(technician) => {
                    let tickets = self.store.list_visible_to(technician);
                    if tickets.is_empty() {
                        "No tickets to display.\n".into()
                    } else {
                        render(&tickets, true)
                    }
                }
                None => TECHNICIAN_ONLY_MSG.into(),
            },
            Command::Take { id } => match self.technician() {
                Some(technician) => match self.store.take(id, technician) {
                    Ok(()) => "Ticket taken.\n".into(),
                    Err(err) => rejection(err),
                },
                None => TECHNICIAN_ONLY_MSG.into(),
            },
            Command::Close { id } => match self.technician() {
                Some(technician) => match self.store.close(id, technician) {
                    Ok(()) => "Ticket closed.\n".into(),
                    Err(err) => rejection(err),
                },
                None => TECHNICIAN_ONLY_MSG.into(),
            },
            Command::ConnectTicket => CONNECT_TICKET_MSG.into(),
            Command::Help => HELP_MSG.into(),
            Command::Unknown => UNKNOWN_COMMAND_MSG.into(),
        }
    }

    fn ident(&mut self, username: &str, role: Role) -> String {
        let identity = Identity {
            username: Username::new(username),
            role,
        };

        let mut reply = format!(
            "Identified as '{}' (role={})\n",
            identity.username,
            role.label()
        );

        if role == Role::Technician {
            let assigned = self
                .store
                .identify_technician(identity.username.as_str(), Utc::now());
            tracing::debug!("{} priority ticket(s) assigned to {}", assigned, identity.username);

            if assigned > 0 {
                let _ = writeln!(reply, "Assigned {} PRIORITY ticket(s) to you.", assigned);
            } else {
                reply.push_str("No priority tickets to assign to you right now.\n");
            }
        }

        self.identity = Some(identity);
        reply
    }

    fn technician(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .filter(|identity| identity.role == Role::Technician)
            .map(|identity| identity.username.as_str())
    }
}

/// Runs a session over a connection until the client goes away
///
/// every line gets exactly one reply; the session state is dropped with the connection.
pub async fn serve<R, W>(
    mut connection: Connection<R, W>,
    store: &TicketStore,
) -> tokio::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut session = Session::new(store);
    connection.send(WELCOME_MSG).await?;

    while let Some(line) = connection.read_line().await? {
        tracing::debug!("received: {}", line);
        let reply = session.handle_line(&line);
        tracing::debug!("responded: {:?}", reply);

        connection.send(&reply).await?;
    }

    Ok(())
}

fn rejection(err: impl std::error::Error) -> String {
    format!("{}\n", err)
}

// one block per ticket, the technician view also names the owner
fn render(tickets: &[Ticket], with_owner_label: bool) -> String {
    let mut out = String::new();
    for ticket in tickets {
        let technician = match ticket.technician.is_empty() {
            true => "-",
            false => ticket.technician.as_str(),
        };
        let owner_label = if with_owner_label { "owner:" } else { "" };
        let created = ticket.created.with_timezone(&Local).format(TIMESTAMP_FORMAT);

        let _ = write!(
            out,
            "ID:{} | {} | {}{} | tech:{} | created:{}\nTitle: {}\nDesc: {}\n\n",
            ticket.id,
            ticket.state,
            owner_label,
            ticket.owner,
            technician,
            created,
            ticket.title,
            ticket.description
        );
    }

    out
}
