//! Per-client session state.
//!
//! Only `login`, `switch_group` and `logout` change the identity, group and
//! write token; everything else just reads them.

use dalclient_config::ResponseFormat;

/// Who the DAL thinks we are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    NotLoggedIn,
    /// The server reported an existing session (`Already login.`) but never
    /// told us whose it is.
    UnknownButLoggedIn,
    LoggedIn(i64),
}

impl Identity {
    pub fn is_logged_in(&self) -> bool {
        !matches!(self, Identity::NotLoggedIn)
    }

    pub fn user_id(&self) -> Option<i64> {
        match self {
            Identity::LoggedIn(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    LoggedInUngrouped,
    LoggedInGrouped,
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Anonymous => "ANONYMOUS",
            SessionPhase::LoggedInUngrouped => "LOGGED_IN_UNGROUPED",
            SessionPhase::LoggedInGrouped => "LOGGED_IN_GROUPED",
        }
    }
}

pub const NO_GROUP: i64 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    // Client configuration, kept across logout
    pub base_url: Option<String>,
    pub response_format: ResponseFormat,
    pub explicit_logout: bool,

    pub identity: Identity,
    pub group_id: i64,
    pub group_name: Option<String>,
    pub is_admin: Option<bool>,
    pub write_token: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            base_url: None,
            response_format: ResponseFormat::default(),
            explicit_logout: false,
            identity: Identity::NotLoggedIn,
            group_id: NO_GROUP,
            group_name: None,
            is_admin: None,
            write_token: None,
        }
    }
}

impl SessionState {
    /// Forget the session, keep the configuration.
    pub fn reset(&mut self) {
        self.identity = Identity::NotLoggedIn;
        self.write_token = None;
        self.reset_group();
    }

    pub fn reset_group(&mut self) {
        self.group_id = NO_GROUP;
        self.group_name = None;
        self.is_admin = None;
    }

    pub fn phase(&self) -> SessionPhase {
        if !self.identity.is_logged_in() {
            SessionPhase::Anonymous
        } else if self.group_id == NO_GROUP {
            SessionPhase::LoggedInUngrouped
        } else {
            SessionPhase::LoggedInGrouped
        }
    }

    /// `"<base_url><command>"`, or `None` before a base URL is set.
    pub fn command_url(&self, command: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{}{}", base, command))
    }
}
