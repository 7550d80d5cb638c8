//! DAL wire vocabulary shared by requests, responses and the session.

// Events published on login state transitions
pub const EVENT_CLIENT_LOGGED_IN: &str = "DALClient-logged-in";
pub const EVENT_CLIENT_LOGGED_OUT: &str = "DALClient-logged-out";

/// Local error when `login` is attempted on a live session.
pub const ERRMSG_ALREADY_LOGGED_IN: &str = "Already logged in";

/// Error message the DAL itself returns when the session cookie is still valid.
pub const ERRMSG_ALREADY_LOGIN: &str = "Already login.";

/// Write token stand-in after recovering from `ERRMSG_ALREADY_LOGIN`.
pub const ALREADY_LOGGED_IN_WRITE_TOKEN: &str = "already-logged-in";

pub const ERRMSG_NO_BASE_URL: &str = "DalClient::set_base_url() has not yet been called";

// Commands tracked by the session and refused by perform_query/update/upload
pub const LOGIN_PREFIX: &str = "login/";
pub const LOGOUT_COMMAND: &str = "logout";
pub const SWITCH_GROUP_PREFIX: &str = "switch/group/";

pub const TAG_DATA: &str = "DATA";

pub const TAG_RECORD_META: &str = "RecordMeta";
pub const ATTR_TAG_NAME: &str = "TagName";

pub const TAG_ERROR: &str = "Error";
pub const ATTR_MESSAGE: &str = "Message";

pub const TAG_USER: &str = "User";
pub const ATTR_USER_ID: &str = "UserId";

pub const TAG_WRITE_TOKEN: &str = "WriteToken";
pub const ATTR_VALUE: &str = "Value";

pub const TAG_INFO: &str = "Info";
pub const ATTR_VERSION: &str = "Version";
pub const ATTR_GROUP_NAME: &str = "GroupName";
pub const ATTR_GADMIN: &str = "GAdmin";

pub const TAG_SYSTEM_GROUP: &str = "SystemGroup";
pub const ATTR_SYSTEM_GROUP_ID: &str = "SystemGroupId";
pub const ATTR_SYSTEM_GROUP_NAME: &str = "SystemGroupName";

pub const TAG_OPERATION: &str = "Operation";
pub const ATTR_REST: &str = "Rest";

pub const TAG_PAGINATION: &str = "Pagination";
pub const ATTR_NUM_OF_RECORDS: &str = "NumOfRecords";
pub const ATTR_NUM_OF_PAGES: &str = "NumOfPages";
pub const ATTR_PAGE: &str = "Page";
pub const ATTR_NUM_PER_PAGE: &str = "NumPerPage";

// add/... update/... upload/...
pub const TAG_RETURN_ID: &str = "ReturnId";
pub const ATTR_PARA_NAME: &str = "ParaName";

pub const TAG_RETURN_ID_FILE: &str = "ReturnIdFile";
pub const ATTR_XML: &str = "xml";

/// Current local time in the `yyyy-MM-dd HH:mm:ss` form the DAL accepts.
pub fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
