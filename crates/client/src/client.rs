//! KDDart DAL client.
//!
//! Every operation is an `async fn` that always resolves to a
//! [`DalResponse`], including failures found before anything is sent.
//! Those are delivered after `local_error_delay` so a caller never sees a
//! result sooner than it would from the network.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dalclient_config::{ResponseFormat, Settings};
use parking_lot::Mutex;
use serde_json::Value;
use smol::channel::Receiver;
use smol::Timer;

use crate::dal_util::{
    ALREADY_LOGGED_IN_WRITE_TOKEN, ATTR_GADMIN, ATTR_GROUP_NAME, ATTR_USER_ID, ATTR_VALUE,
    ERRMSG_ALREADY_LOGGED_IN, ERRMSG_ALREADY_LOGIN, ERRMSG_NO_BASE_URL, LOGIN_PREFIX,
    LOGOUT_COMMAND, SWITCH_GROUP_PREFIX, TAG_INFO, TAG_USER, TAG_WRITE_TOKEN,
};
use crate::events::{EventBus, SessionEvent};
use crate::guard;
use crate::params::Params;
use crate::response::{build_response, value_text, DalResponse, RecordSource};
use crate::session::{Identity, SessionPhase, SessionState};
use crate::signature::{login_signature, signed_write_params, write_signature};
use crate::transport::{
    AfterDispatch, BeforeDispatch, HttpRequest, ReqwestTransport, Transport, TransportOutcome,
};

/// Group name held between login and the first `switch_group`.
pub const UNKNOWN_GROUP_NAME: &str = "Unknown";

const ERRMSG_UPLOAD_NOT_IMPLEMENTED: &str = "Not yet implemented: perform_upload()";

/// Errors from configuring a client. Operations never return these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Response type other than JSON or XML
    InvalidResponseType(String),
    /// HTTP client could not be built
    Transport(String),
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::InvalidResponseType(msg) => write!(f, "{}", msg),
            ClientError::Transport(msg) => write!(f, "Transport error: {}", msg),
        }
    }
}

impl std::error::Error for ClientError {}

#[derive(Clone, Default)]
struct DispatchHooks {
    before: Option<BeforeDispatch>,
    after: Option<AfterDispatch>,
}

pub struct DalClient {
    transport: Arc<dyn Transport>,
    state: Mutex<SessionState>,
    events: EventBus,
    hooks: Mutex<DispatchHooks>,
    local_error_delay: Duration,
}

impl fmt::Debug for DalClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DalClient")
            .field("state", &*self.state.lock())
            .field("local_error_delay", &self.local_error_delay)
            .finish_non_exhaustive()
    }
}

impl DalClient {
    /// Client over the default reqwest transport.
    pub fn new() -> Result<Self, ClientError> {
        Self::from_settings(&Settings::default())
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let transport = ReqwestTransport::new(&settings.user_agent)?;
        let client = Self::with_transport(Arc::new(transport))
            .with_local_error_delay(Duration::from_millis(settings.local_error_delay_ms));
        if let Some(url) = &settings.base_url {
            client.set_base_url(url);
        }
        client.set_response_format(settings.response_type);
        client.set_explicit_logout(settings.explicit_logout);
        Ok(client)
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Mutex::new(SessionState::default()),
            events: EventBus::default(),
            hooks: Mutex::new(DispatchHooks::default()),
            local_error_delay: Duration::from_millis(
                dalclient_config::settings::DEFAULT_LOCAL_ERROR_DELAY_MS,
            ),
        }
    }

    pub fn with_local_error_delay(mut self, delay: Duration) -> Self {
        self.local_error_delay = delay;
        self
    }

    pub fn version() -> String {
        format!("DALClient-v{}", env!("CARGO_PKG_VERSION"))
    }

    // ── Configuration ───────────────────────────────────────────────

    pub fn base_url(&self) -> Option<String> {
        self.state.lock().base_url.clone()
    }

    /// Service root every command is appended to. A trailing `/` is added
    /// when missing.
    pub fn set_base_url(&self, url: &str) {
        let mut url = url.to_string();
        if !url.ends_with('/') {
            url.push('/');
        }
        self.state.lock().base_url = Some(url);
    }

    pub fn response_format(&self) -> ResponseFormat {
        self.state.lock().response_format
    }

    pub fn set_response_format(&self, format: ResponseFormat) {
        self.state.lock().response_format = format;
    }

    /// `"JSON"`/`"json"` or `"XML"`/`"xml"`; anything else is refused and the
    /// current format kept.
    pub fn set_response_type(&self, response_type: &str) -> Result<(), ClientError> {
        let format = response_type
            .parse::<ResponseFormat>()
            .map_err(ClientError::InvalidResponseType)?;
        self.set_response_format(format);
        Ok(())
    }

    /// Whether the next login asks the server to keep the session until an
    /// explicit logout.
    pub fn set_explicit_logout(&self, explicit: bool) {
        self.state.lock().explicit_logout = explicit;
    }

    pub fn set_before_dispatch(&self, hook: impl Fn(&mut HttpRequest) + Send + Sync + 'static) {
        self.hooks.lock().before = Some(Arc::new(hook));
    }

    pub fn set_after_dispatch(
        &self,
        hook: impl Fn(&HttpRequest, &TransportOutcome) + Send + Sync + 'static,
    ) {
        self.hooks.lock().after = Some(Arc::new(hook));
    }

    // ── Session ─────────────────────────────────────────────────────

    pub fn identity(&self) -> Identity {
        self.state.lock().identity
    }

    /// Only known after a login that reported `User/UserId`.
    pub fn user_id(&self) -> Option<i64> {
        self.state.lock().identity.user_id()
    }

    /// `-1` until `switch_group` succeeds.
    pub fn group_id(&self) -> i64 {
        self.state.lock().group_id
    }

    pub fn group_name(&self) -> Option<String> {
        self.state.lock().group_name.clone()
    }

    /// `None` until a group has been switched to.
    pub fn is_in_admin_group(&self) -> Option<bool> {
        self.state.lock().is_admin
    }

    pub fn write_token(&self) -> Option<String> {
        self.state.lock().write_token.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().identity.is_logged_in()
    }

    pub fn session_phase(&self) -> SessionPhase {
        self.state.lock().phase()
    }

    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let rx = self.events.subscribe();
        log::debug!("session event subscribers: {}", self.events.subscriber_count());
        rx
    }

    fn snapshot(&self) -> SessionState {
        self.state.lock().clone()
    }

    // ── Operations ──────────────────────────────────────────────────

    pub async fn login(&self, username: &str, password: &str) -> DalResponse {
        let state = self.snapshot();
        if state.identity.is_logged_in() {
            return self.local_error(LOGIN_PREFIX, ERRMSG_ALREADY_LOGGED_IN).await;
        }
        let Some(base_url) = state.base_url else {
            return self.local_error(LOGIN_PREFIX, ERRMSG_NO_BASE_URL).await;
        };

        let url = format!(
            "{}{}{}/{}",
            base_url,
            LOGIN_PREFIX,
            username,
            if state.explicit_logout { "yes" } else { "no" }
        );
        let signed = login_signature(password, username, &url);

        let format = state.response_format;
        let mut params = Params::new()
            .with("rand_num", signed.rand_num)
            .with("url", url.clone())
            .with("signature", signed.signature);
        if format.is_json() {
            params.insert("ctype", format.ctype());
        }

        let response = self.dispatch(HttpRequest::post(url, params, format)).await;
        match response.response_error_message() {
            None => self.complete_login(&response),
            Some(msg) if msg == ERRMSG_ALREADY_LOGIN => self.adopt_existing_login(),
            Some(msg) => log::warn!("login as {} failed: {}", username, msg),
        }
        response
    }

    fn complete_login(&self, response: &DalResponse) {
        let identity = match response.record_field_value(TAG_USER, ATTR_USER_ID) {
            Some(value) => parse_user_id(&value)
                .map(Identity::LoggedIn)
                .unwrap_or(Identity::UnknownButLoggedIn),
            None => Identity::UnknownButLoggedIn,
        };
        let write_token = response
            .record_field_value(TAG_WRITE_TOKEN, ATTR_VALUE)
            .map(|v| value_text(&v));

        {
            let mut state = self.state.lock();
            state.identity = identity;
            state.write_token = write_token;
            state.reset_group();
            state.group_name = Some(UNKNOWN_GROUP_NAME.to_string());
        }
        log::info!("logged in: {:?}", identity);
        self.events.publish(SessionEvent::LoggedIn);
    }

    /// The server still holds a session for this cookie jar but won't say
    /// whose. Carry on as an unknown user.
    fn adopt_existing_login(&self) {
        let mut state = self.state.lock();
        state.identity = Identity::UnknownButLoggedIn;
        state.write_token = Some(ALREADY_LOGGED_IN_WRITE_TOKEN.to_string());
        state.reset_group();
        state.group_name = Some(UNKNOWN_GROUP_NAME.to_string());
        log::info!("server reports an existing session, continuing with it");
    }

    /// Clear the session locally, then tell the server. The server's answer
    /// is not waited on for the state change and is otherwise ignored.
    pub async fn logout(&self) {
        let (request, was_logged_in) = {
            let mut state = self.state.lock();
            let format = state.response_format;
            let request = state
                .command_url(LOGOUT_COMMAND)
                .map(|url| HttpRequest::get(with_ctype(url, format), format));
            let was_logged_in = state.identity.is_logged_in();
            state.reset();
            (request, was_logged_in)
        };

        if was_logged_in {
            log::info!("logged out");
            self.events.publish(SessionEvent::LoggedOut);
        }

        match request {
            Some(request) => {
                let _ = self.dispatch(request).await;
            }
            None => log::debug!("logout: no base URL, nothing sent"),
        }
    }

    pub async fn switch_group(&self, group_id: i64) -> DalResponse {
        let command = format!("{}{}", SWITCH_GROUP_PREFIX, group_id);
        let response = self.get(&command, Params::new()).await;

        if response.response_error_message().is_none() {
            let info = response.first_record(TAG_INFO);
            let group_name = info.get(ATTR_GROUP_NAME).map(value_text);
            let is_admin = info.get(ATTR_GADMIN).map(value_text).as_deref() == Some("TRUE");

            let mut state = self.state.lock();
            state.group_id = group_id;
            state.group_name = group_name;
            state.is_admin = Some(is_admin);
        }
        response
    }

    pub async fn perform_query(&self, command: &str) -> DalResponse {
        self.perform_query_with(command, Params::new()).await
    }

    /// GET `command` with `params` in the query string.
    pub async fn perform_query_with(&self, command: &str, params: Params) -> DalResponse {
        if let Some(refused) = self.refuse("perform_query()", command) {
            return self.deliver_local(refused).await;
        }
        self.get(command, params).await
    }

    /// POST `params` to `command`, signed with the session's write token.
    pub async fn perform_update(&self, command: &str, params: Params) -> DalResponse {
        if let Some(refused) = self.refuse("perform_update()", command) {
            return self.deliver_local(refused).await;
        }

        let state = self.snapshot();
        let Some(url) = state.command_url(command) else {
            return self.local_error(command, ERRMSG_NO_BASE_URL).await;
        };
        let Some(write_token) = state.write_token else {
            let message = format!("Not logged in: no write token available for {}", command);
            return self.local_error(&url, &message).await;
        };

        let signed = write_signature(&write_token, &url, &params);
        let format = state.response_format;
        let mut for_post = signed_write_params(&params, &url, &signed);
        if format.is_json() {
            for_post.insert("ctype", format.ctype());
        }
        self.dispatch(HttpRequest::post(url, for_post, format)).await
    }

    /// File uploads are not supported; this always resolves to an error
    /// once the usual checks pass.
    pub async fn perform_upload(&self, command: &str, _params: Params, _content: &[u8]) -> DalResponse {
        if let Some(refused) = self.refuse("perform_upload()", command) {
            return self.deliver_local(refused).await;
        }
        let Some(url) = self.snapshot().command_url(command) else {
            return self.local_error(command, ERRMSG_NO_BASE_URL).await;
        };
        self.local_error(&url, ERRMSG_UPLOAD_NOT_IMPLEMENTED).await
    }

    // ── Plumbing ────────────────────────────────────────────────────

    fn refuse(&self, entry_point: &str, command: &str) -> Option<DalResponse> {
        let url = self
            .snapshot()
            .command_url(command)
            .unwrap_or_else(|| command.to_string());
        guard::check(entry_point, command, &url)
    }

    async fn get(&self, command: &str, params: Params) -> DalResponse {
        let state = self.snapshot();
        let Some(url) = state.command_url(command) else {
            return self.local_error(command, ERRMSG_NO_BASE_URL).await;
        };
        let format = state.response_format;
        let request = HttpRequest::get(with_ctype(url, format), format).with_params(params);
        self.dispatch(request).await
    }

    async fn dispatch(&self, mut request: HttpRequest) -> DalResponse {
        let hooks = self.hooks.lock().clone();
        if let Some(before) = &hooks.before {
            before(&mut request);
        }

        log::debug!("[dal-client: {} {}]", request.method, request.url);

        let transport = Arc::clone(&self.transport);
        let (request, outcome) = smol::unblock(move || {
            let outcome = transport.perform(&request);
            (request, outcome)
        })
        .await;

        log::debug!(
            "[dal-client: {} {} -> {}{} ({} bytes)]",
            request.method,
            request.url,
            outcome.status(),
            if outcome.is_success() { "" } else { " failed" },
            outcome.body().len()
        );
        if let Some(after) = &hooks.after {
            after(&request, &outcome);
        }
        build_response(&request.url, request.format, outcome)
    }

    async fn local_error(&self, url: &str, message: &str) -> DalResponse {
        self.deliver_local(DalResponse::local_error(url, message, message)).await
    }

    async fn deliver_local(&self, response: DalResponse) -> DalResponse {
        Timer::after(self.local_error_delay).await;
        response
    }
}

/// Append `ctype` to a GET URL when JSON is wanted; the DAL answers XML
/// otherwise.
fn with_ctype(url: String, format: ResponseFormat) -> String {
    if !format.is_json() {
        return url;
    }
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}ctype={}", url, separator, format.ctype())
}

fn parse_user_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::login_signature_with_rand;
    use crate::transport::HttpMethod;
    use std::collections::VecDeque;
    use std::time::Instant;

    /// Replays canned outcomes in order and records every request.
    #[derive(Default)]
    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<TransportOutcome>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<TransportOutcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn perform(&self, request: &HttpRequest) -> TransportOutcome {
            self.requests.lock().push(request.clone());
            self.outcomes
                .lock()
                .pop_front()
                .unwrap_or_else(TransportOutcome::unreachable)
        }
    }

    const BASE: &str = "http://dal.test/dal";
    const DELAY: Duration = Duration::from_millis(20);

    fn ok(body: &str) -> TransportOutcome {
        TransportOutcome::Success { status: 200, body: body.to_string() }
    }

    const LOGIN_OK: &str = r#"{"User":[{"UserId":"42"}],"WriteToken":[{"Value":"wtok123"}]}"#;

    fn client(outcomes: Vec<TransportOutcome>) -> (DalClient, Arc<ScriptedTransport>) {
        let transport = ScriptedTransport::new(outcomes);
        let client = DalClient::with_transport(transport.clone()).with_local_error_delay(DELAY);
        client.set_base_url(BASE);
        (client, transport)
    }

    fn logged_in_client(mut outcomes: Vec<TransportOutcome>) -> (DalClient, Arc<ScriptedTransport>) {
        outcomes.insert(0, ok(LOGIN_OK));
        let (client, transport) = client(outcomes);
        smol::block_on(client.login("bob", "secret"));
        assert!(client.is_logged_in());
        (client, transport)
    }

    #[test]
    fn test_login_success() {
        let (client, transport) = client(vec![ok(LOGIN_OK)]);
        let events = client.subscribe();

        let response = smol::block_on(client.login("bob", "secret"));
        assert!(response.response_error_message().is_none());

        assert_eq!(client.session_phase(), SessionPhase::LoggedInUngrouped);
        assert_eq!(client.user_id(), Some(42));
        assert_eq!(client.write_token().as_deref(), Some("wtok123"));
        assert_eq!(client.group_id(), -1);
        assert_eq!(client.is_in_admin_group(), None);
        assert_eq!(events.try_recv(), Ok(SessionEvent::LoggedIn));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        let login = &requests[0];
        let url = "http://dal.test/dal/login/bob/no";
        assert_eq!(login.method, HttpMethod::Post);
        assert_eq!(login.url, url);
        let keys: Vec<&str> = login.params.keys().collect();
        assert_eq!(keys, vec!["rand_num", "url", "signature", "ctype"]);
        assert_eq!(login.params.get("url"), Some(url));
        assert_eq!(login.params.get("ctype"), Some("json"));

        let rand_num = login.params.get("rand_num").unwrap().to_string();
        let expected = login_signature_with_rand("secret", "bob", url, rand_num);
        assert_eq!(login.params.get("signature"), Some(expected.signature.as_str()));
    }

    #[test]
    fn test_login_xml_with_explicit_logout() {
        let (client, transport) = client(vec![ok(
            r#"<?xml version="1.0"?><DATA><User UserId="7"/><WriteToken Value="xtok"/></DATA>"#,
        )]);
        client.set_response_format(ResponseFormat::Xml);
        client.set_explicit_logout(true);

        let response = smol::block_on(client.login("alice", "pw"));
        assert_eq!(response.format(), Some(ResponseFormat::Xml));
        assert_eq!(client.user_id(), Some(7));
        assert_eq!(client.write_token().as_deref(), Some("xtok"));

        let login = &transport.requests()[0];
        assert_eq!(login.url, "http://dal.test/dal/login/alice/yes");
        assert!(!login.params.contains_key("ctype"));
    }

    #[test]
    fn test_login_unparsable_user_id() {
        let (client, _) = client(vec![ok(r#"{"User":[{"UserId":"n/a"}],"WriteToken":[{"Value":"t"}]}"#)]);
        smol::block_on(client.login("bob", "secret"));
        assert_eq!(client.identity(), Identity::UnknownButLoggedIn);
        assert_eq!(client.user_id(), None);
        assert!(client.is_logged_in());
    }

    #[test]
    fn test_login_while_logged_in_is_local() {
        let (client, transport) = logged_in_client(vec![]);

        let started = Instant::now();
        let response = smol::block_on(client.login("bob", "secret"));
        assert!(started.elapsed() >= DELAY);

        assert!(response.is_error_variant());
        assert_eq!(response.response_error_message().as_deref(), Some(ERRMSG_ALREADY_LOGGED_IN));
        assert_eq!(response.http_status_code(), 200);
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(client.user_id(), Some(42));
    }

    #[test]
    fn test_login_server_already_login() {
        let (client, _) = client(vec![TransportOutcome::Failure {
            status: 420,
            reason: String::new(),
            body: r#"{"Error":[{"Message":"Already login."}]}"#.into(),
        }]);
        let events = client.subscribe();

        let response = smol::block_on(client.login("bob", "secret"));
        assert_eq!(response.response_error_message().as_deref(), Some(ERRMSG_ALREADY_LOGIN));
        assert_eq!(client.identity(), Identity::UnknownButLoggedIn);
        assert_eq!(client.write_token().as_deref(), Some(ALREADY_LOGGED_IN_WRITE_TOKEN));
        assert_eq!(client.session_phase(), SessionPhase::LoggedInUngrouped);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn test_login_failure_leaves_state() {
        let (client, _) = client(vec![TransportOutcome::Failure {
            status: 420,
            reason: String::new(),
            body: r#"{"Error":[{"Message":"Incorrect username or password."}]}"#.into(),
        }]);
        let response = smol::block_on(client.login("bob", "wrong"));
        assert!(response.response_error_message().is_some());
        assert_eq!(client.session_phase(), SessionPhase::Anonymous);
        assert_eq!(client.write_token(), None);
    }

    #[test]
    fn test_missing_base_url() {
        let transport = ScriptedTransport::new(vec![]);
        let client = DalClient::with_transport(transport.clone()).with_local_error_delay(DELAY);

        for response in [
            smol::block_on(client.login("bob", "secret")),
            smol::block_on(client.perform_query("list/genus")),
            smol::block_on(client.perform_update("update/genus/1", Params::new())),
            smol::block_on(client.switch_group(1)),
        ] {
            assert_eq!(response.response_error_message().as_deref(), Some(ERRMSG_NO_BASE_URL));
            assert_eq!(response.http_error_reason(), Some(ERRMSG_NO_BASE_URL));
        }
        smol::block_on(client.logout());
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_logout_from_anonymous() {
        let (client, transport) = client(vec![ok("{}")]);
        let events = client.subscribe();

        smol::block_on(client.logout());

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "http://dal.test/dal/logout?ctype=json");
        assert!(events.try_recv().is_err());
        assert_eq!(client.session_phase(), SessionPhase::Anonymous);
        assert_eq!(client.group_id(), -1);
        assert_eq!(client.group_name(), None);
        assert_eq!(client.write_token(), None);
    }

    #[test]
    fn test_logout_after_login() {
        let (client, transport) = logged_in_client(vec![TransportOutcome::unreachable()]);
        let events = client.subscribe();

        smol::block_on(client.logout());

        assert_eq!(events.try_recv(), Ok(SessionEvent::LoggedOut));
        assert_eq!(client.session_phase(), SessionPhase::Anonymous);
        assert_eq!(client.write_token(), None);
        assert_eq!(client.base_url().as_deref(), Some("http://dal.test/dal/"));
        assert_eq!(transport.requests()[1].method, HttpMethod::Get);
    }

    #[test]
    fn test_switch_group() {
        let (client, transport) = logged_in_client(vec![ok(
            r#"{"Info":[{"GroupName":"Breeders","GAdmin":"TRUE"}]}"#,
        )]);

        let response = smol::block_on(client.switch_group(3));
        assert!(response.response_error_message().is_none());
        assert_eq!(client.session_phase(), SessionPhase::LoggedInGrouped);
        assert_eq!(client.group_id(), 3);
        assert_eq!(client.group_name().as_deref(), Some("Breeders"));
        assert_eq!(client.is_in_admin_group(), Some(true));
        assert_eq!(
            transport.requests()[1].url,
            "http://dal.test/dal/switch/group/3?ctype=json"
        );
    }

    #[test]
    fn test_switch_group_failure_keeps_group() {
        let (client, _) = logged_in_client(vec![TransportOutcome::Failure {
            status: 420,
            reason: String::new(),
            body: r#"{"Error":[{"Message":"Not a member of group 9"}]}"#.into(),
        }]);
        smol::block_on(client.switch_group(9));
        assert_eq!(client.group_id(), -1);
        assert_eq!(client.session_phase(), SessionPhase::LoggedInUngrouped);
    }

    #[test]
    fn test_session_commands_refused_on_generic_entry_points() {
        let (client, transport) = logged_in_client(vec![]);

        let started = Instant::now();
        let response = smol::block_on(client.perform_update("login/bob/no", Params::new()));
        assert!(started.elapsed() >= DELAY);
        assert!(response
            .response_error_message()
            .unwrap()
            .contains("Command not allowed"));

        for command in ["logout", "logout?ctype=json", "switch/group/2"] {
            let response = smol::block_on(client.perform_query(command));
            assert_eq!(
                response.response_error_message(),
                Some(format!("Command not allowed: {}", command))
            );
        }
        let response = smol::block_on(client.perform_upload("login/x/no", Params::new(), b""));
        assert!(response.is_error_variant());

        assert_eq!(transport.requests().len(), 1);
        assert!(client.is_logged_in());
    }

    #[test]
    fn test_perform_query_ctype_and_params() {
        let (client, transport) = client(vec![ok("{}"), ok("{}"), ok("<DATA/>")]);

        smol::block_on(client.perform_query("list/genus"));
        smol::block_on(client.perform_query_with(
            "list/genus/10/page/1?Filtering=GenusName='Wheat'",
            Params::new().with("Sorting", "GenusId"),
        ));
        client.set_response_format(ResponseFormat::Xml);
        smol::block_on(client.perform_query("get/version"));

        let requests = transport.requests();
        assert_eq!(requests[0].url, "http://dal.test/dal/list/genus?ctype=json");
        assert_eq!(
            requests[1].url,
            "http://dal.test/dal/list/genus/10/page/1?Filtering=GenusName='Wheat'&ctype=json"
        );
        assert_eq!(requests[1].params.get("Sorting"), Some("GenusId"));
        assert_eq!(requests[2].url, "http://dal.test/dal/get/version");
        assert_eq!(requests[2].format, ResponseFormat::Xml);
    }

    #[test]
    fn test_perform_update_signs_params() {
        let (client, transport) = logged_in_client(vec![ok(r#"{"Info":[{"Message":"ok"}]}"#)]);
        let params = Params::new().with("GenusName", "GENUS_changed").with_null("Note");

        smol::block_on(client.perform_update("update/genus/7", params));

        let update = &transport.requests()[1];
        let url = "http://dal.test/dal/update/genus/7";
        assert_eq!(update.method, HttpMethod::Post);
        assert_eq!(update.url, url);
        let keys: Vec<&str> = update.params.keys().collect();
        assert_eq!(
            keys,
            vec!["GenusName", "Note", "rand_num", "url", "param_order", "signature", "ctype"]
        );
        assert_eq!(update.params.get("param_order"), Some("GenusName,Note"));

        let rand_num = update.params.get("rand_num").unwrap();
        let expected = crate::signature::hmac_sha1_hex(
            &format!("{}{}GENUS_changed", url, rand_num),
            "wtok123",
        );
        assert_eq!(update.params.get("signature"), Some(expected.as_str()));
    }

    #[test]
    fn test_perform_update_without_write_token() {
        let (client, transport) = client(vec![]);
        let response = smol::block_on(client.perform_update("update/genus/7", Params::new()));
        assert_eq!(
            response.response_error_message().as_deref(),
            Some("Not logged in: no write token available for update/genus/7")
        );
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_perform_upload_not_implemented() {
        let (client, transport) = logged_in_client(vec![]);
        let response = smol::block_on(client.perform_upload(
            "update/genus/7/file",
            Params::new(),
            b"contents",
        ));
        assert_eq!(
            response.response_error_message().as_deref(),
            Some(ERRMSG_UPLOAD_NOT_IMPLEMENTED)
        );
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_dispatch_hooks() {
        let (client, transport) = client(vec![ok("{}")]);
        let seen = Arc::new(Mutex::new(Vec::new()));

        client.set_before_dispatch(|request| request.params.insert("trace", "1"));
        let seen_after = Arc::clone(&seen);
        client.set_after_dispatch(move |request, outcome| {
            seen_after.lock().push((request.url.clone(), outcome.status()));
        });

        smol::block_on(client.perform_query("list/genus"));

        assert_eq!(transport.requests()[0].params.get("trace"), Some("1"));
        assert_eq!(
            *seen.lock(),
            vec![("http://dal.test/dal/list/genus?ctype=json".to_string(), 200)]
        );
    }

    #[test]
    fn test_configuration_accessors() {
        let (client, _) = client(vec![]);
        assert_eq!(client.base_url().as_deref(), Some("http://dal.test/dal/"));
        client.set_base_url("http://other.test/dal/");
        assert_eq!(client.base_url().as_deref(), Some("http://other.test/dal/"));

        assert!(client.set_response_type("xml").is_ok());
        assert_eq!(client.response_format(), ResponseFormat::Xml);
        let err = client.set_response_type("yaml").unwrap_err();
        assert_eq!(err.to_string(), "Invalid response type: 'yaml'");
        assert_eq!(client.response_format(), ResponseFormat::Xml);

        assert!(DalClient::version().starts_with("DALClient-v"));
    }

    #[test]
    fn test_from_settings() {
        let settings = Settings {
            base_url: Some("https://kddart.example.org/dal".into()),
            response_type: ResponseFormat::Xml,
            explicit_logout: true,
            local_error_delay_ms: 5,
            ..Settings::default()
        };
        let client = DalClient::from_settings(&settings).unwrap();
        assert_eq!(client.base_url().as_deref(), Some("https://kddart.example.org/dal/"));
        assert_eq!(client.response_format(), ResponseFormat::Xml);
        assert_eq!(client.local_error_delay, Duration::from_millis(5));
        assert!(client.snapshot().explicit_logout);
    }
}
