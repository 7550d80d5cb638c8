//! Refuses session-changing commands on the generic entry points.
//!
//! `perform_query`, `perform_update` and `perform_upload` cannot observe the
//! session effects of these commands, so they only run through
//! `login`, `logout` and `switch_group`.

use crate::dal_util::{LOGIN_PREFIX, LOGOUT_COMMAND, SWITCH_GROUP_PREFIX};
use crate::response::DalResponse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Login,
    Logout,
    SwitchGroup,
}

pub fn classify(command: &str) -> Option<SessionCommand> {
    if command.starts_with(LOGIN_PREFIX) {
        Some(SessionCommand::Login)
    } else if is_logout(command) {
        Some(SessionCommand::Logout)
    } else if command.starts_with(SWITCH_GROUP_PREFIX) {
        Some(SessionCommand::SwitchGroup)
    } else {
        None
    }
}

/// `logout`, also with a query string or trailing path, which the DAL
/// routes to the same handler.
fn is_logout(command: &str) -> bool {
    match command.strip_prefix(LOGOUT_COMMAND) {
        Some(rest) => rest.is_empty() || rest.starts_with('?') || rest.starts_with('/'),
        None => false,
    }
}

pub fn is_session_command(command: &str) -> bool {
    classify(command).is_some()
}

/// The local error response for a refused command, or `None` if allowed.
pub fn check(entry_point: &str, command: &str, url: &str) -> Option<DalResponse> {
    let kind = classify(command)?;
    log::warn!("{} refused {:?} command: {}", entry_point, kind, command);
    Some(DalResponse::local_error(
        url,
        format!("Invalid for {}: {}", entry_point, command),
        format!("Command not allowed: {}", command),
    ))
}
