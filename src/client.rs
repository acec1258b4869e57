use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use indexmap::IndexMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::control;
use crate::diff::snapshot_events;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::naming::{Target, HASH};
use crate::protocol::{self, Acceptance, AUTH_PATH, CONTROL_PATH, RETRIEVE_PATH};
use crate::session::{Credentials, Session, DEFAULT_SESSION_TTL};
use crate::snapshot::{build_snapshot, DeviceView};
use crate::types::*;
use crate::{Error, Result};

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type SnapshotCallback = Box<dyn Fn(&Snapshot) + Send + Sync>;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Split a comma-separated setting, trimming entries and dropping blanks and
/// repeats.
fn parse_name_list(csv: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in csv.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    }
    names
}

/// Outlets are published by position; the device addresses them by the key
/// of its outlet-name map.
fn device_target(state: &DeviceState, target: Target) -> Target {
    match target {
        Target::Outlet(index) => {
            let key = index
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| state.outlet_names.get_index(i))
                .map(|(key, _)| key.clone());
            Target::Outlet(key.unwrap_or(index))
        }
        other => other,
    }
}

pub struct PduClientBuilder {
    host: String,
    protocol: String,
    credentials: Credentials,
    sequences: Vec<String>,
    historical: HashSet<String>,
    control_style: ControlStyle,
    session_ttl: Duration,
    timeout: Duration,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<String>,
}

impl PduClientBuilder {
    /// `host` is either an address (`10.0.0.5`, `pdu.local:8080`) or a full
    /// base URL (`http://10.0.0.5`).
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            protocol: "https".to_string(),
            credentials: Credentials::default(),
            sequences: Vec::new(),
            historical: HashSet::new(),
            control_style: ControlStyle::default(),
            session_ttl: DEFAULT_SESSION_TTL,
            timeout: DEFAULT_TIMEOUT,
            event_callbacks: Vec::new(),
            snapshot_callbacks: Vec::new(),
            log_mode: None,
            log_path: None,
        }
    }

    /// Scheme used when `host` carries none.
    pub fn protocol(mut self, proto: &str) -> Self {
        self.protocol = proto.to_string();
        self
    }

    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Credentials {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Comma-separated sequence names to expose as run buttons. Names
    /// containing `#` cannot be addressed by a control and are skipped.
    pub fn sequences(mut self, csv: &str) -> Self {
        self.sequences = parse_name_list(csv)
            .into_iter()
            .filter(|name| {
                let addressable = !name.contains(HASH);
                if !addressable {
                    warn!(sequence = %name, "sequence name contains '#', skipping");
                }
                addressable
            })
            .collect();
        self
    }

    /// Comma-separated property names published as historical data instead
    /// of live statistics. Names that match nothing are ignored.
    pub fn historical_properties(mut self, csv: &str) -> Self {
        self.historical = parse_name_list(csv).into_iter().collect();
        self
    }

    pub fn outlet_control_style(mut self, style: ControlStyle) -> Self {
        self.control_style = style;
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_snapshot(mut self, f: impl Fn(&Snapshot) + Send + Sync + 'static) -> Self {
        self.snapshot_callbacks.push(Box::new(f));
        self
    }

    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<String>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<PduClient> {
        let host = self.host.trim().trim_end_matches('/');
        if host.is_empty() {
            return Err(Error::InvalidConfiguration("device address is empty".to_string()));
        }
        let base_url = if host.contains("://") {
            host.to_string()
        } else {
            format!("{}://{}", self.protocol, host)
        };

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(self.timeout)
            .build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, &path)?),
            _ => None,
        };

        Ok(PduClient {
            http,
            base_url,
            credentials: self.credentials,
            sequences: self.sequences,
            historical: self.historical,
            control_style: self.control_style,
            session_ttl: self.session_ttl,
            state: Mutex::new(DeviceState {
                logger,
                ..Default::default()
            }),
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            event_callbacks: self.event_callbacks,
            snapshot_callbacks: self.snapshot_callbacks,
        })
    }
}

/// Everything a poll or control reads and writes, guarded by one lock.
#[derive(Default)]
struct DeviceState {
    session: Option<Session>,
    outlet_names: IndexMap<String, String>,
    group_names: IndexMap<String, String>,
    /// Next poll hands back the published snapshot without a device round trip.
    redeliver: bool,
    logger: Option<MessageLogger>,
}

/// Client for one iBoot PDU.
///
/// Polls and controls are serialised: each holds the device lock for its
/// whole duration, network calls included. The published snapshot can be
/// read at any time through [`PduClient::snapshot`] without waiting.
pub struct PduClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Credentials,
    sequences: Vec<String>,
    historical: HashSet<String>,
    control_style: ControlStyle,
    session_ttl: Duration,
    state: Mutex<DeviceState>,
    snapshot: ArcSwap<Snapshot>,
    event_callbacks: Vec<EventCallback>,
    snapshot_callbacks: Vec<SnapshotCallback>,
}

impl PduClient {
    pub fn builder(host: impl Into<String>) -> PduClientBuilder {
        PduClientBuilder::new(host)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Last published snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.session.is_some()
    }

    /// Make the next [`PduClient::poll`] return the cached snapshot.
    pub async fn request_redelivery(&self) {
        self.state.lock().await.redeliver = true;
    }

    /// Run one poll cycle and publish the result. On error the previously
    /// published snapshot stays in place.
    pub async fn poll(&self) -> Result<Arc<Snapshot>> {
        let mut state = self.state.lock().await;

        if std::mem::take(&mut state.redeliver) {
            debug!("re-delivering cached snapshot");
            return Ok(self.snapshot.load_full());
        }

        if let Some(ref mut logger) = state.logger {
            logger.begin_cycle("poll");
        }

        let started = Instant::now();
        let next = match self.retrieve(&mut state).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "poll failed, keeping previous snapshot");
                return Err(e);
            }
        };

        let previous = self.snapshot.load_full();
        let events = snapshot_events(&previous, &next);
        let next = Arc::new(next);
        self.snapshot.store(next.clone());

        debug!(
            statistics = next.statistics.len(),
            historical = next.historical.len(),
            controls = next.controls.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "poll complete"
        );

        self.emit(&events, Some(&*next));
        Ok(next)
    }

    /// Send one control to the device. Properties that address nothing
    /// controllable are ignored.
    pub async fn apply_control(&self, property: &str, value: &str) -> Result<()> {
        let Some(request) = control::resolve(property, value) else {
            warn!(property, "ignoring control for unknown property");
            return Ok(());
        };

        let mut state = self.state.lock().await;

        if let Some(ref mut logger) = state.logger {
            logger.begin_cycle("control");
        }

        let command = request.command;
        debug!(
            property,
            value,
            command = command.as_device_str(),
            "sending control"
        );

        let target = &device_target(&state, request.target);
        let acceptance = self
            .request(
                &mut state,
                CONTROL_PATH,
                "control",
                |token| protocol::control_body(token, target, command),
                protocol::parse_control_response,
            )
            .await
            .map_err(|e| {
                warn!(property, error = %e, "control failed");
                Error::ControlFailed {
                    property: property.to_string(),
                    source: Box::new(e),
                }
            })?;

        if acceptance == Acceptance::Benign {
            debug!(property, "device reported nothing to do");
        }

        let previous = self.snapshot.load_full();
        let mut next = Snapshot::clone(&previous);
        let mut events = vec![Event::ControlApplied {
            property: property.to_string(),
            command,
        }];

        let changed = control::patch(&mut next, property, value);
        for name in &changed {
            if let Some(new) = next.get(name) {
                events.push(Event::PropertyChanged {
                    name: name.clone(),
                    old: previous.get(name).map(str::to_string),
                    new: new.to_string(),
                });
            }
        }
        let published = if changed.is_empty() {
            None
        } else {
            let next = Arc::new(next);
            self.snapshot.store(next.clone());
            Some(next)
        };

        state.redeliver = true;
        self.emit(&events, published.as_deref());
        Ok(())
    }

    /// Apply each control independently. Failures are logged and returned;
    /// they never stop the remaining entries.
    pub async fn apply_controls<P, V>(&self, controls: &[(P, V)]) -> Vec<Error>
    where
        P: AsRef<str> + Sync,
        V: AsRef<str> + Sync,
    {
        let mut failures = Vec::new();
        for (property, value) in controls {
            if let Err(e) = self.apply_control(property.as_ref(), value.as_ref()).await {
                warn!(
                    property = property.as_ref(),
                    error = %e,
                    "control failed, continuing with remaining entries"
                );
                failures.push(e);
            }
        }
        failures
    }

    /// Drop session, names and snapshot. Waits for an in-flight poll or
    /// control to finish first.
    pub async fn disconnect(&self) {
        let mut state = self.state.lock().await;
        state.session = None;
        state.outlet_names.clear();
        state.group_names.clear();
        state.redeliver = false;
        self.snapshot.store(Arc::new(Snapshot::default()));
        debug!(url = %self.base_url, "disconnected, device state cleared");
    }

    async fn retrieve(&self, state: &mut DeviceState) -> Result<Snapshot> {
        let names = self
            .request(
                state,
                RETRIEVE_PATH,
                "names",
                protocol::names_body,
                protocol::parse_names_response,
            )
            .await?;

        let outlet_keys: Vec<String> = names.outlet_names.keys().cloned().collect();
        let group_keys: Vec<String> = names.group_names.keys().cloned().collect();
        trace!(outlets = outlet_keys.len(), groups = group_keys.len(), "names retrieved");

        let states = self
            .request(
                state,
                RETRIEVE_PATH,
                "states",
                |token| protocol::states_body(token, &outlet_keys, &group_keys),
                protocol::parse_states_response,
            )
            .await?;

        let view = DeviceView {
            outlet_names: &names.outlet_names,
            group_names: &names.group_names,
            outlet_states: &states.outlets,
            group_states: &states.groups,
            analog: &names.analog,
        };
        let snapshot = build_snapshot(
            &view,
            &self.sequences,
            &self.historical,
            self.control_style,
        );

        // committed with the snapshot it numbered; controls resolve outlet
        // positions against it
        state.outlet_names = names.outlet_names;
        state.group_names = names.group_names;
        Ok(snapshot)
    }

    /// Authenticated request. A rejected token triggers one re-login and one
    /// retry.
    async fn request<T>(
        &self,
        state: &mut DeviceState,
        path: &str,
        label: &str,
        build: impl Fn(&str) -> Value,
        parse: impl Fn(&Value) -> Result<T>,
    ) -> Result<T> {
        let token = self.ensure_session(state).await?;
        let response = self.post(state, path, label, &build(&token)).await?;
        match parse(&response) {
            Err(e) if e.is_token_rejected() => {
                debug!(error = %e, "token rejected, re-authenticating");
                let token = self.login(state).await?;
                let response = self.post(state, path, label, &build(&token)).await?;
                parse(&response)
            }
            other => other,
        }
    }

    async fn ensure_session(&self, state: &mut DeviceState) -> Result<String> {
        self.credentials.validate()?;
        if let Some(ref session) = state.session
            && session.is_fresh_at(Instant::now(), self.session_ttl)
        {
            return Ok(session.token().to_string());
        }
        self.login(state).await
    }

    async fn login(&self, state: &mut DeviceState) -> Result<String> {
        state.session = None;
        debug!(url = %self.base_url, user = %self.credentials.username, "authenticating");

        let body = protocol::login_body(&self.credentials.username, &self.credentials.password);
        let response = self
            .post(state, AUTH_PATH, "auth", &body)
            .await
            .map_err(|e| Error::AuthenticationFailed(format!("login request failed: {e}")))?;

        let token = protocol::parse_login_response(&response)?;
        state.session = Some(Session::new(token.clone(), Instant::now()));
        Ok(token)
    }

    async fn post(
        &self,
        state: &mut DeviceState,
        path: &str,
        label: &str,
        body: &Value,
    ) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, path);
        trace!(url = %url, label, "POST");

        if let Some(ref mut logger) = state.logger {
            logger.log_request(path, body);
        }

        let resp = self.http.post(&url).json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let parsed: Option<Value> = serde_json::from_str(&text).ok();

        if let Some(ref mut logger) = state.logger {
            logger.log_response(label, status.as_u16(), parsed.as_ref().unwrap_or(&Value::Null));
        }

        match parsed {
            Some(v) if status.is_success() || v.get("success").is_some() => Ok(v),
            _ if !status.is_success() => Err(Error::HttpStatus(status.as_u16())),
            _ => Err(Error::Parse(format!("response from {path} is not JSON"))),
        }
    }

    fn emit(&self, events: &[Event], snapshot: Option<&Snapshot>) {
        for event in events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        if let Some(snapshot) = snapshot {
            for cb in &self.snapshot_callbacks {
                cb(snapshot);
            }
        }
        if !events.is_empty() {
            debug!(count = events.len(), "dispatched events");
        }
    }
}
