use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::naming::Target;
use crate::types::{Command, ControlType};
use crate::{Error, Result};

pub const AUTH_PATH: &str = "services/auth/";
pub const RETRIEVE_PATH: &str = "services/retrieve/";
pub const CONTROL_PATH: &str = "services/control/";

pub const NAME_KINDS: [&str; 3] = ["outlets", "groups", "sequences"];
pub const ANALOG_CHANNELS: [&str; 6] = ["LC1", "LC2", "LV1", "LV2", "T0", "T1"];

/// Failure messages the device uses for "nothing to report".
const BENIGN_MESSAGES: &[&str] = &["there are no groups", "no groups configured"];

pub fn login_body(username: &str, password: &str) -> Value {
    json!({
        "username": username,
        "password": password,
    })
}

pub fn names_body(token: &str) -> Value {
    json!({
        "token": token,
        "names": NAME_KINDS,
        "analog": ANALOG_CHANNELS,
    })
}

pub fn states_body(token: &str, outlets: &[String], groups: &[String]) -> Value {
    json!({
        "token": token,
        "outlets": outlets,
        "groups": groups,
    })
}

/// Exactly one of `outlets`, `group` or `sequence` is present.
pub fn control_body(token: &str, target: &Target, command: Command) -> Value {
    let mut body = json!({
        "token": token,
        "control": control_type(target).as_device_str(),
        "command": command.as_device_str(),
    });
    let (field, value) = match target {
        Target::Outlet(key) => ("outlets", json!([key])),
        Target::Group(key) => ("group", json!(key)),
        Target::Sequence(name) => ("sequence", json!(name)),
    };
    if let Value::Object(map) = &mut body {
        map.insert(field.to_string(), value);
    }
    body
}

pub fn control_type(target: &Target) -> ControlType {
    match target {
        Target::Outlet(_) => ControlType::Outlet,
        Target::Group(_) => ControlType::Group,
        Target::Sequence(_) => ControlType::Sequence,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Success,
    /// `success:false` with a message that only means "no data".
    Benign,
}

pub fn is_benign_message(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    BENIGN_MESSAGES.iter().any(|m| message.contains(m))
}

fn message(body: &Value) -> String {
    body.get("message")
        .and_then(|v| v.as_str())
        .unwrap_or("no message from device")
        .to_string()
}

/// Judge the top-level `success` flag. States and control responses must
/// carry it.
pub fn check_envelope(body: &Value) -> Result<Acceptance> {
    match body.get("success").and_then(|v| v.as_bool()) {
        Some(true) => Ok(Acceptance::Success),
        Some(false) => {
            let msg = message(body);
            if is_benign_message(&msg) {
                Ok(Acceptance::Benign)
            } else {
                Err(Error::DeviceRejected(msg))
            }
        }
        None => Err(Error::Parse(
            "response has no boolean 'success' field".to_string(),
        )),
    }
}

/// The names payload is the one response allowed to omit the flag.
fn check_names_envelope(body: &Value) -> Result<Acceptance> {
    if body.get("success").is_none() {
        return Ok(Acceptance::Success);
    }
    check_envelope(body)
}

/// Token from a login response.
pub fn parse_login_response(body: &Value) -> Result<String> {
    match body.get("success").and_then(|v| v.as_bool()) {
        Some(true) => match body.get("token").and_then(|v| v.as_str()) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(Error::AuthenticationFailed(
                "device accepted login but returned no token".to_string(),
            )),
        },
        Some(false) => Err(Error::AuthenticationFailed(message(body))),
        None => Err(Error::AuthenticationFailed(
            "login response has no 'success' field".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NamesResponse {
    pub outlet_names: IndexMap<String, String>,
    pub group_names: IndexMap<String, String>,
    pub analog: IndexMap<String, String>,
}

pub fn parse_names_response(body: &Value) -> Result<NamesResponse> {
    let acceptance = check_names_envelope(body)?;
    let names = match (body.get("names"), acceptance) {
        (Some(names), _) => names,
        (None, Acceptance::Benign) => return Ok(NamesResponse::default()),
        (None, Acceptance::Success) => {
            return Err(Error::Parse("'names' field missing in response".to_string()));
        }
    };
    let (Some(outlets), Some(groups)) = (names.get("outletNames"), names.get("groupNames")) else {
        return Err(Error::Parse(
            "'outletNames' or 'groupNames' field missing in response".to_string(),
        ));
    };
    let analog = body
        .get("analog")
        .ok_or_else(|| Error::Parse("'analog' field missing in response".to_string()))?;

    Ok(NamesResponse {
        outlet_names: text_map(outlets, "outletNames")?,
        group_names: text_map(groups, "groupNames")?,
        analog: text_map(analog, "analog")?,
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatesResponse {
    pub outlets: IndexMap<String, String>,
    pub groups: IndexMap<String, String>,
}

pub fn parse_states_response(body: &Value) -> Result<StatesResponse> {
    let acceptance = check_envelope(body)?;
    let field = |name: &str| -> Result<IndexMap<String, String>> {
        match (body.get(name), acceptance) {
            (Some(v), _) => text_map(v, name),
            (None, Acceptance::Benign) => Ok(IndexMap::new()),
            (None, Acceptance::Success) => {
                Err(Error::Parse(format!("'{name}' field missing in state response")))
            }
        }
    };
    Ok(StatesResponse {
        outlets: field("outlets")?,
        groups: field("groups")?,
    })
}

pub fn parse_control_response(body: &Value) -> Result<Acceptance> {
    check_envelope(body)
}

/// JSON object -> ordered key/text map. Numbers are kept in their JSON form.
fn text_map(value: &Value, field: &str) -> Result<IndexMap<String, String>> {
    match value {
        Value::Object(map) => Ok(map
            .iter()
            .map(|(k, v)| (k.clone(), value_text(v)))
            .collect()),
        Value::Null => Ok(IndexMap::new()),
        _ => Err(Error::Parse(format!("'{field}' is not an object"))),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
