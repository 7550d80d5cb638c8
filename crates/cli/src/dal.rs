//! Commands that talk to the DAL.

use dalclient::{DalClient, DalResponse, Params, RecordSource};
use dalclient_config::Settings;

use crate::output;
use crate::{CliError, DalOpts};

/// Settings file, then environment, then flags.
pub fn resolve_settings(opts: &DalOpts) -> Result<Settings, CliError> {
    let mut settings = Settings::load().with_env_overrides().map_err(CliError::usage)?;
    if let Some(url) = &opts.url {
        settings.base_url = Some(url.clone());
    }
    if let Some(user) = &opts.user {
        settings.username = Some(user.clone());
    }
    if let Some(format) = opts.format {
        settings.response_type = format;
    }
    if opts.explicit_logout {
        settings.explicit_logout = true;
    }
    Ok(settings)
}

fn build_client(settings: &Settings) -> Result<DalClient, CliError> {
    if settings.base_url.is_none() {
        return Err(CliError::usage("no DAL base URL")
            .with_hint("pass --url, set DAL_BASE_URL, or run `dal config set-url`"));
    }
    DalClient::from_settings(settings).map_err(|e| CliError::general(e.to_string()))
}

fn credentials(opts: &DalOpts, settings: &Settings) -> Result<(String, String), CliError> {
    let user = settings
        .username
        .clone()
        .ok_or_else(|| CliError::usage("no username").with_hint("pass --user or set DAL_USERNAME"))?;

    if let Some(password) = &opts.password {
        return Ok((user, password.clone()));
    }
    let lookup = dalclient_config::get_password(&user);
    match lookup.password {
        Some(password) => {
            log::debug!("password for {} from {}", user, lookup.source.as_str());
            Ok((user, password))
        }
        None => Err(CliError::usage(format!("no password for {}", user))
            .with_hint("pass --password, set DAL_PASSWORD, or run `dal password set`")),
    }
}

/// Server-reported error text, if the response carries one.
fn dal_error(response: &DalResponse) -> Option<String> {
    response.response_error_message()
}

async fn open_session(client: &DalClient, opts: &DalOpts, settings: &Settings) -> Result<(), CliError> {
    let (user, password) = credentials(opts, settings)?;

    let response = client.login(&user, &password).await;
    if let Some(message) = dal_error(&response) {
        if !client.is_logged_in() {
            return Err(CliError::login(message));
        }
        log::warn!("{}", message);
    }

    if let Some(group) = opts.group {
        let response = client.switch_group(group).await;
        if let Some(message) = dal_error(&response) {
            client.logout().await;
            return Err(CliError::switch_group(message));
        }
    }
    Ok(())
}

fn connect(opts: &DalOpts) -> Result<(Settings, DalClient), CliError> {
    let settings = resolve_settings(opts)?;
    let client = build_client(&settings)?;
    Ok((settings, client))
}

pub fn parse_params(raw: &[String]) -> Result<Params, CliError> {
    let mut params = Params::new();
    for item in raw {
        let (key, value) = item
            .split_once('=')
            .ok_or_else(|| CliError::usage(format!("--param expects KEY=VALUE, got '{}'", item)))?;
        if key.is_empty() {
            return Err(CliError::usage(format!("--param has an empty key: '{}'", item)));
        }
        params.insert(key, value);
    }
    Ok(params)
}

/// Login, logout and group switches are session flags, not commands.
fn reject_session_command(command: &str) -> Result<(), CliError> {
    if dalclient::guard::is_session_command(command) {
        return Err(CliError::usage(format!("'{}' changes the session and cannot be run directly", command))
            .with_hint("use --group <id> to switch group, or `dal login-check` to test a login"));
    }
    Ok(())
}

fn finish(response: &DalResponse, tags: &[String], json: bool) -> Result<(), CliError> {
    match output::print_response(response, tags, json) {
        Some(message) => Err(CliError::dal(message)),
        None => Ok(()),
    }
}

pub fn cmd_query(opts: &DalOpts, command: &str, params: &[String], tags: &[String]) -> Result<(), CliError> {
    reject_session_command(command)?;
    let params = parse_params(params)?;
    let (settings, client) = connect(opts)?;

    smol::block_on(async {
        open_session(&client, opts, &settings).await?;
        let response = client.perform_query_with(command, params).await;
        client.logout().await;
        finish(&response, tags, opts.json)
    })
}

pub fn cmd_update(opts: &DalOpts, command: &str, params: &[String]) -> Result<(), CliError> {
    reject_session_command(command)?;
    let params = parse_params(params)?;
    let (settings, client) = connect(opts)?;

    smol::block_on(async {
        open_session(&client, opts, &settings).await?;
        let response = client.perform_update(command, params).await;
        client.logout().await;
        finish(&response, &[], opts.json)
    })
}

/// `get/version` needs no login.
pub fn cmd_version(opts: &DalOpts) -> Result<(), CliError> {
    let (_, client) = connect(opts)?;

    println!("{}", DalClient::version());
    let response = smol::block_on(client.perform_query("get/version"));
    finish(&response, &[], opts.json)
}

pub fn cmd_login_check(opts: &DalOpts) -> Result<(), CliError> {
    let (settings, client) = connect(opts)?;

    let session = smol::block_on(async {
        open_session(&client, opts, &settings).await?;
        let session = serde_json::json!({
            "phase": client.session_phase().as_str(),
            "user_id": client.user_id(),
            "group_id": client.group_id(),
            "group_name": client.group_name(),
            "is_in_admin_group": client.is_in_admin_group(),
            "checked_at": dalclient::dal_util::now_timestamp(),
        });
        client.logout().await;
        Ok::<_, CliError>(session)
    })?;

    if opts.json {
        println!("{}", session);
    } else if let Some(fields) = session.as_object() {
        for (name, value) in fields {
            println!("{}={}", name, output::display_value(value));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_params_keeps_order() {
        let params = parse_params(&[
            "GenusName=Wheat".to_string(),
            "Filtering=GenusName='A=B'".to_string(),
            "Empty=".to_string(),
        ])
        .unwrap();
        let keys: Vec<&str> = params.keys().collect();
        assert_eq!(keys, vec!["GenusName", "Filtering", "Empty"]);
        assert_eq!(params.get("Filtering"), Some("GenusName='A=B'"));
        assert_eq!(params.get("Empty"), Some(""));
    }

    #[test]
    fn test_parse_params_rejects_malformed() {
        let err = parse_params(&["GenusName".to_string()]).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
        assert!(parse_params(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_session_commands_are_usage_errors() {
        for command in ["logout", "switch/group/2", "login/admin/no"] {
            let err = reject_session_command(command).unwrap_err();
            assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
            assert!(err.hint.is_some());
        }
        assert!(reject_session_command("list/genus").is_ok());
    }

    #[test]
    fn test_build_client_requires_url() {
        let settings = Settings { base_url: None, ..Settings::default() };
        let err = build_client(&settings).unwrap_err();
        assert_eq!(err.code, crate::exit_codes::EXIT_USAGE);
        assert!(err.hint.is_some());
    }

    #[test]
    fn test_flags_override_settings() {
        let opts = DalOpts {
            url: Some("http://dal.test/dal".into()),
            user: Some("admin".into()),
            format: Some(dalclient_config::ResponseFormat::Xml),
            explicit_logout: true,
            ..DalOpts::default()
        };
        let settings = resolve_settings(&opts).unwrap();
        assert_eq!(settings.base_url.as_deref(), Some("http://dal.test/dal"));
        assert_eq!(settings.username.as_deref(), Some("admin"));
        assert_eq!(settings.response_type, dalclient_config::ResponseFormat::Xml);
        assert!(settings.explicit_logout);
    }
}
