use std::str::FromStr;

const IDENT_USAGE_MSG: &str = "Usage: IDENT <username> <role:user|tech>";
const NEW_TICKET_USAGE_MSG: &str = "Usage: sendTicket -new \"title\" \"description\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Technician,
}

impl Role {
    // only the exact "tech" token grants the technician role
    pub fn from_token(token: &str) -> Self {
        match token {
            "tech" => Role::Technician,
            _ => Role::User,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Technician => "TECH",
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Ident { username: String, role: Role },
    NewTicket { title: String, description: String },
    ListOwn,
    List,
    Take { id: u32 },
    Close { id: u32 },
    ConnectTicket,
    Help,
    Unknown,
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum CommandError {
    #[error("{}", IDENT_USAGE_MSG)]
    IdentUsage,

    #[error("{} OR sendTicket -l", NEW_TICKET_USAGE_MSG)]
    SendTicketUsage,

    #[error("{}", NEW_TICKET_USAGE_MSG)]
    NewTicketUsage,

    #[error("Missing closing quote for title")]
    MissingTitleClose,

    #[error("Missing opening quote for description")]
    MissingDescriptionOpen,

    #[error("Missing closing quote for description")]
    MissingDescriptionClose,
}

impl CommandError {
    /// Whether the failing command is one that needs an identified session
    ///
    /// an unidentified session is told to identify before being told about its typo.
    pub fn requires_identity(&self) -> bool {
        !matches!(self, CommandError::IdentUsage)
    }
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // verbs taking arguments need the separating space, a bare "take" is just unknown
        let line = s.trim_end_matches(['\r', '\n']);

        match line.split_once(' ') {
            Some(("IDENT", args)) => {
                let mut parts = args.split_whitespace();
                let username = parts.next().ok_or(CommandError::IdentUsage)?.to_owned();
                let role = parts.next().map(Role::from_token).unwrap_or(Role::User);

                Ok(Command::Ident { username, role })
            }
            Some(("sendTicket", args)) => {
                if let Some(args) = args.strip_prefix("-new") {
                    parse_new_ticket(args)
                } else if args.starts_with("-l") {
                    Ok(Command::ListOwn)
                } else {
                    Err(CommandError::SendTicketUsage)
                }
            }
            Some(("take", args)) => Ok(Command::Take { id: parse_id(args) }),
            Some(("close", args)) => Ok(Command::Close { id: parse_id(args) }),
            _ if line.starts_with("connectTicket") => Ok(Command::ConnectTicket),
            _ if line.starts_with("list") => Ok(Command::List),
            _ if line == "help" => Ok(Command::Help),
            _ => Ok(Command::Unknown),
        }
    }
}

// the first quote opens the title, the next closes it,
// the one after that opens the description and the next one closes it
fn parse_new_ticket(args: &str) -> Result<Command, CommandError> {
    let (_, rest) = args.split_once('"').ok_or(CommandError::NewTicketUsage)?;
    let (title, rest) = rest
        .split_once('"')
        .ok_or(CommandError::MissingTitleClose)?;
    let (_, rest) = rest
        .split_once('"')
        .ok_or(CommandError::MissingDescriptionOpen)?;
    let (description, _) = rest
        .split_once('"')
        .ok_or(CommandError::MissingDescriptionClose)?;

    Ok(Command::NewTicket {
        title: title.into(),
        description: description.into(),
    })
}

// reads the leading digits, anything unreadable is id 0 which never matches a ticket
fn parse_id(args: &str) -> u32 {
    let args = args.trim_start();
    let end = args
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(args.len());

    args[..end].parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{Command, CommandError, Role};

    #[test]
    fn check_valid_command_parsing() {
        let raw_commands = [
            "IDENT alice user",
            "IDENT bob tech\r\n",
            "IDENT carol TECH",
            "IDENT  dave",
            "sendTicket -new \"Printer\" \"Out of toner\"",
            "sendTicket -new\"\"\"\"",
            "sendTicket -l",
            "list",
            "take 7",
            "take 12abc",
            "take abc",
            "close  3",
            "connectTicket",
            "connectTickets please",
            "listing",
            "help",
            "",
            "help me",
            " help",
            "quit",
            "IDENT",
            "take",
            "close",
            "sendTicket",
            "sendTicket\t-l",
        ];

        let expected_commands = [
            Command::Ident {
                username: "alice".into(),
                role: Role::User,
            },
            Command::Ident {
                username: "bob".into(),
                role: Role::Technician,
            },
            Command::Ident {
                username: "carol".into(),
                role: Role::User,
            },
            Command::Ident {
                username: "dave".into(),
                role: Role::User,
            },
            Command::NewTicket {
                title: "Printer".into(),
                description: "Out of toner".into(),
            },
            Command::NewTicket {
                title: "".into(),
                description: "".into(),
            },
            Command::ListOwn,
            Command::List,
            Command::Take { id: 7 },
            Command::Take { id: 12 },
            Command::Take { id: 0 },
            Command::Close { id: 3 },
            Command::ConnectTicket,
            Command::ConnectTicket,
            Command::List,
            Command::Help,
            Command::Unknown,
            Command::Unknown,
            Command::Unknown,
            Command::Unknown,
            Command::Unknown,
            Command::Unknown,
            Command::Unknown,
            Command::Unknown,
            Command::Unknown,
        ];

        for (command, expected) in raw_commands.into_iter().zip(expected_commands.iter()) {
            let command = match command.parse::<Command>() {
                Ok(command) => command,
                Err(reason) => panic!("failed to parse\n{}\nreason: {}", command, reason),
            };

            assert_eq!(command, *expected);
        }
    }

    #[test]
    fn check_bad_command_parsing() {
        let bad_commands = [
            "IDENT ",
            "IDENT   ",
            "sendTicket ",
            "sendTicket  -l",
            "sendTicket -x",
            "sendTicket -new",
            "sendTicket -new \"title",
            "sendTicket -new \"title\" description",
            "sendTicket -new \"title\" \"description",
        ];

        let expected_errors = [
            CommandError::IdentUsage,
            CommandError::IdentUsage,
            CommandError::SendTicketUsage,
            CommandError::SendTicketUsage,
            CommandError::SendTicketUsage,
            CommandError::NewTicketUsage,
            CommandError::MissingTitleClose,
            CommandError::MissingDescriptionOpen,
            CommandError::MissingDescriptionClose,
        ];

        for (command, expected) in bad_commands.into_iter().zip(expected_errors) {
            assert_eq!(command.parse::<Command>(), Err(expected), "{}", command);
        }
    }

    #[test]
    fn error_messages_are_the_replies() {
        assert_eq!(
            CommandError::SendTicketUsage.to_string(),
            "Usage: sendTicket -new \"title\" \"description\" OR sendTicket -l"
        );
        assert_eq!(
            CommandError::IdentUsage.to_string(),
            "Usage: IDENT <username> <role:user|tech>"
        );
        assert!(!CommandError::IdentUsage.requires_identity());
        assert!(CommandError::MissingTitleClose.requires_identity());
    }
}
