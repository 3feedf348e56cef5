//! In-memory Junos device.
//!
//! One [`MockDevice`] models the device side of every link opened through
//! its [`MockConnector`]: a running configuration, a single candidate
//! behind an exclusive lock, a pending confirmed commit that reverts at its
//! deadline, and an event log with (tokio) timestamps. Faults are injected
//! through [`MockDevice::inject`].
//!
//! Configuration is stored as full-path statements without the leading
//! `set`, in insertion order.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use junos_cfg_common::codec::{CONFIG_OUTPUT_END, CONFIG_OUTPUT_START, DELETE_LS, SET_LS};
use junos_reconcile::identity::GET_SOFTWARE_INFORMATION;
use junos_reconcile::{Connector, Credentials, DeviceLink, DeviceTarget, LinkError};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Faults applied by the mock device.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    /// The next N connects fail with a transport error.
    pub fail_connects: u32,
    /// Connects never complete.
    pub stall_connects: bool,
    /// The identity RPC fails.
    pub fail_identity: bool,
    /// Lock requests are refused as if another user held the lock.
    pub refuse_lock: bool,
    /// Locks are granted but the reply never arrives.
    pub stall_lock_reply: bool,
    /// `load_set` rejects any statement containing this text.
    pub reject_statement: Option<String>,
    /// Commits fail with this diagnostic.
    pub commit_error: Option<String>,
    /// Warnings returned by successful commits.
    pub commit_warnings: Vec<String>,
    /// Commits succeed without changing the running configuration.
    pub silent_commit: bool,
    /// Commits never complete.
    pub stall_commit: bool,
    /// Every dump is returned twice, as a duplicated response would be.
    pub duplicate_dump: bool,
    /// Latency added to every link operation.
    pub op_delay: Option<Duration>,
}

/// Something a link did to the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    Connect,
    ConnectFailed,
    Lock,
    LockRefused,
    Unlock,
    Load(Vec<String>),
    LoadRejected(String),
    Discard,
    Commit { confirm_minutes: Option<u16> },
    CommitFailed,
    CommitCheck,
    Rollback,
    Command(String),
    Close,
}

/// One entry of the device event log.
#[derive(Debug, Clone)]
pub struct Event {
    pub at: Instant,
    /// Link that caused the event; 0 for device-internal events.
    pub link: u64,
    pub kind: EventKind,
}

#[derive(Debug)]
struct PendingConfirm {
    rollback: Vec<String>,
    deadline: Instant,
}

#[derive(Debug)]
struct DeviceState {
    identity_xml: String,
    running: Vec<String>,
    candidate: Option<Vec<String>>,
    lock_holder: Option<u64>,
    pending_confirm: Option<PendingConfirm>,
    strict_lock: bool,
    next_link: u64,
    open_links: usize,
    commit_log: Vec<String>,
    faults: Faults,
    events: Vec<Event>,
}

impl DeviceState {
    fn record(&mut self, link: u64, kind: EventKind) {
        self.events.push(Event {
            at: Instant::now(),
            link,
            kind,
        });
    }

    /// Reverts an unconfirmed commit whose deadline has passed.
    fn expire_confirm(&mut self) {
        let expired = self
            .pending_confirm
            .as_ref()
            .is_some_and(|pending| Instant::now() >= pending.deadline);
        if expired {
            if let Some(pending) = self.pending_confirm.take() {
                self.running = pending.rollback;
                self.record(0, EventKind::Rollback);
            }
        }
    }

    fn require_lock(&self, link: u64) -> Result<(), LinkError> {
        if self.lock_holder == Some(link) {
            Ok(())
        } else {
            Err(LinkError::Rpc(
                "configuration database is not locked by this session".to_string(),
            ))
        }
    }
}

/// Shared handle to the simulated device.
#[derive(Debug, Clone)]
pub struct MockDevice {
    state: Arc<Mutex<DeviceState>>,
}

/// Default `get-software-information` reply for `hostname`.
pub fn software_information(hostname: &str) -> String {
    format!(
        "<software-information>\n\
         <host-name>{}</host-name>\n\
         <product-model>vmx</product-model>\n\
         <product-name>vmx</product-name>\n\
         <junos-version>22.4R1.10</junos-version>\n\
         <package-information><name>junos</name><comment>JUNOS OS</comment></package-information>\n\
         </software-information>",
        hostname
    )
}

impl MockDevice {
    /// Creates an empty device answering as `hostname`.
    pub fn new(hostname: &str) -> Self {
        Self {
            state: Arc::new(Mutex::new(DeviceState {
                identity_xml: software_information(hostname),
                running: Vec::new(),
                candidate: None,
                lock_holder: None,
                pending_confirm: None,
                strict_lock: true,
                next_link: 1,
                open_links: 0,
                commit_log: Vec::new(),
                faults: Faults::default(),
                events: Vec::new(),
            })),
        }
    }

    /// Replaces the identity reply.
    pub fn with_identity_xml(self, xml: impl Into<String>) -> Self {
        self.state.lock().identity_xml = xml.into();
        self
    }

    /// Controls whether a lock survives the link that took it.
    ///
    /// Strict (the default) models a session the device has not noticed
    /// is gone: the lock stays held until someone unlocks it.
    pub fn with_strict_lock(self, strict: bool) -> Self {
        self.state.lock().strict_lock = strict;
        self
    }

    /// Returns a connector opening links to this device.
    pub fn connector(&self) -> MockConnector {
        MockConnector {
            device: self.clone(),
        }
    }

    /// Adjusts the injected faults.
    pub fn inject(&self, f: impl FnOnce(&mut Faults)) {
        f(&mut self.state.lock().faults);
    }

    /// Seeds the running configuration with `set` statements.
    pub fn load_running<S: AsRef<str>>(&self, lines: &[S]) {
        let mut state = self.state.lock();
        for line in lines {
            let _ = apply_statement(&mut state.running, line.as_ref());
        }
    }

    /// Returns the running configuration, reverting an expired
    /// confirmed commit first.
    pub fn running(&self) -> Vec<String> {
        let mut state = self.state.lock();
        state.expire_confirm();
        state.running.clone()
    }

    /// Returns true if a running statement equals `statement`.
    pub fn has_statement(&self, statement: &str) -> bool {
        self.running().iter().any(|s| s == statement)
    }

    /// Returns true if anything is configured at or below `path`.
    pub fn has_path(&self, path: &str) -> bool {
        self.running().iter().any(|s| covers(path, s))
    }

    /// Returns the pending candidate, if an edit is in progress.
    pub fn candidate(&self) -> Option<Vec<String>> {
        self.state.lock().candidate.clone()
    }

    /// Returns the link holding the configuration lock.
    pub fn lock_holder(&self) -> Option<u64> {
        self.state.lock().lock_holder
    }

    /// Returns true if a confirmed commit awaits confirmation.
    pub fn confirm_pending(&self) -> bool {
        let mut state = self.state.lock();
        state.expire_confirm();
        state.pending_confirm.is_some()
    }

    /// Returns the number of links not yet closed.
    pub fn open_links(&self) -> usize {
        self.state.lock().open_links
    }

    /// Returns the log messages of successful commits.
    pub fn commit_log(&self) -> Vec<String> {
        self.state.lock().commit_log.clone()
    }

    /// Returns the event log.
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    /// Returns the event kinds, in order.
    pub fn event_kinds(&self) -> Vec<EventKind> {
        self.state.lock().events.iter().map(|e| e.kind.clone()).collect()
    }

    /// Returns the time of the first event matching `pred`.
    pub fn first_event_at(&self, pred: impl Fn(&EventKind) -> bool) -> Option<Instant> {
        self.state
            .lock()
            .events
            .iter()
            .find(|e| pred(&e.kind))
            .map(|e| e.at)
    }

    /// Counts events matching `pred`.
    pub fn count_events(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.state
            .lock()
            .events
            .iter()
            .filter(|e| pred(&e.kind))
            .count()
    }

    /// Clears the event log.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    fn op_delay(&self) -> Option<Duration> {
        self.state.lock().faults.op_delay
    }
}

/// Connector for a [`MockDevice`].
#[derive(Debug, Clone)]
pub struct MockConnector {
    device: MockDevice,
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(
        &self,
        target: &DeviceTarget,
        _credentials: &Credentials,
    ) -> Result<Box<dyn DeviceLink>, LinkError> {
        if let Some(delay) = self.device.op_delay() {
            tokio::time::sleep(delay).await;
        }

        let stall = {
            let mut state = self.device.state.lock();
            if state.faults.fail_connects > 0 {
                state.faults.fail_connects -= 1;
                state.record(0, EventKind::ConnectFailed);
                return Err(LinkError::Transport(format!(
                    "connect to {} refused",
                    target
                )));
            }
            state.faults.stall_connects
        };
        if stall {
            std::future::pending::<()>().await;
        }

        let mut state = self.device.state.lock();
        let id = state.next_link;
        state.next_link += 1;
        state.open_links += 1;
        state.record(id, EventKind::Connect);
        debug!(link = id, "Mock link opened");

        Ok(Box::new(MockLink {
            device: self.device.clone(),
            id,
            closed: false,
        }))
    }
}

/// Device side of one link.
#[derive(Debug)]
pub struct MockLink {
    device: MockDevice,
    id: u64,
    closed: bool,
}

impl MockLink {
    async fn delay(&self) {
        if let Some(delay) = self.device.op_delay() {
            tokio::time::sleep(delay).await;
        }
    }

    fn check_open(&self) -> Result<(), LinkError> {
        if self.closed {
            Err(LinkError::Transport("link closed".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DeviceLink for MockLink {
    async fn rpc(&mut self, request: &str) -> Result<String, LinkError> {
        self.delay().await;
        self.check_open()?;
        let state = self.device.state.lock();
        if request != GET_SOFTWARE_INFORMATION {
            return Err(LinkError::Rpc(format!("syntax error: {}", request)));
        }
        if state.faults.fail_identity {
            return Err(LinkError::Rpc("permission denied".to_string()));
        }
        Ok(state.identity_xml.clone())
    }

    async fn command(&mut self, command: &str) -> Result<String, LinkError> {
        self.delay().await;
        self.check_open()?;
        let mut state = self.device.state.lock();
        state.expire_confirm();
        state.record(self.id, EventKind::Command(command.to_string()));

        let (path, relative) = parse_show_configuration(command)?;
        let mut lines = dump(&state.running, path, relative);
        if state.faults.duplicate_dump {
            lines.extend(lines.clone());
        }

        let mut reply = String::from(CONFIG_OUTPUT_START);
        reply.push('\n');
        for line in lines {
            reply.push_str(&line);
            reply.push('\n');
        }
        reply.push_str(CONFIG_OUTPUT_END);
        reply.push('\n');
        Ok(reply)
    }

    async fn lock(&mut self) -> Result<(), LinkError> {
        self.delay().await;
        self.check_open()?;
        let stall = {
            let mut state = self.device.state.lock();
            let held_by_other = state.lock_holder.is_some_and(|holder| holder != self.id);
            if state.faults.refuse_lock || held_by_other {
                state.record(self.id, EventKind::LockRefused);
                return Err(LinkError::Rpc(
                    "configuration database locked by: netops terminal p0 (pid 4242)"
                        .to_string(),
                ));
            }
            state.lock_holder = Some(self.id);
            state.record(self.id, EventKind::Lock);
            state.faults.stall_lock_reply
        };
        if stall {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn unlock(&mut self) -> Result<(), LinkError> {
        self.delay().await;
        self.check_open()?;
        let mut state = self.device.state.lock();
        state.require_lock(self.id)?;
        state.lock_holder = None;
        state.candidate = None;
        state.record(self.id, EventKind::Unlock);
        Ok(())
    }

    async fn load_set(&mut self, lines: &[String]) -> Result<(), LinkError> {
        self.delay().await;
        self.check_open()?;
        let mut state = self.device.state.lock();
        state.require_lock(self.id)?;
        state.expire_confirm();

        let rejected = state.faults.reject_statement.clone();
        if let Some(bad) = rejected {
            if let Some(line) = lines.iter().find(|l| l.contains(bad.as_str())) {
                state.record(self.id, EventKind::LoadRejected(line.clone()));
                return Err(LinkError::Rpc(format!("syntax error: {}", line)));
            }
        }

        let mut candidate = state
            .candidate
            .clone()
            .unwrap_or_else(|| state.running.clone());
        for line in lines {
            if let Err(message) = apply_statement(&mut candidate, line) {
                state.record(self.id, EventKind::LoadRejected(line.clone()));
                return Err(LinkError::Rpc(message));
            }
        }
        state.candidate = Some(candidate);
        state.record(self.id, EventKind::Load(lines.to_vec()));
        Ok(())
    }

    async fn discard_changes(&mut self) -> Result<(), LinkError> {
        self.delay().await;
        self.check_open()?;
        let mut state = self.device.state.lock();
        state.candidate = None;
        state.record(self.id, EventKind::Discard);
        Ok(())
    }

    async fn commit(
        &mut self,
        confirm_minutes: Option<u16>,
        log_message: &str,
    ) -> Result<Vec<String>, LinkError> {
        self.delay().await;
        self.check_open()?;

        let stall = {
            let mut state = self.device.state.lock();
            state.require_lock(self.id)?;
            state.expire_confirm();
            if let Some(message) = state.faults.commit_error.clone() {
                state.record(self.id, EventKind::CommitFailed);
                return Err(LinkError::Rpc(message));
            }
            state.faults.stall_commit
        };
        if stall {
            std::future::pending::<()>().await;
        }

        let mut state = self.device.state.lock();
        let previous = state.running.clone();
        if let Some(candidate) = state.candidate.take() {
            if !state.faults.silent_commit {
                state.running = candidate;
            }
        }
        if let Some(minutes) = confirm_minutes {
            state.pending_confirm = Some(PendingConfirm {
                rollback: previous,
                deadline: Instant::now() + Duration::from_secs(u64::from(minutes) * 60),
            });
        }
        state.commit_log.push(log_message.to_string());
        state.record(self.id, EventKind::Commit { confirm_minutes });
        Ok(state.faults.commit_warnings.clone())
    }

    async fn commit_check(&mut self) -> Result<(), LinkError> {
        self.delay().await;
        self.check_open()?;
        let mut state = self.device.state.lock();
        state.expire_confirm();
        state.pending_confirm = None;
        state.record(self.id, EventKind::CommitCheck);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), LinkError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let mut state = self.device.state.lock();
        state.open_links = state.open_links.saturating_sub(1);
        if !state.strict_lock && state.lock_holder == Some(self.id) {
            state.lock_holder = None;
            state.candidate = None;
        }
        state.record(self.id, EventKind::Close);
        Ok(())
    }
}

/// Returns true if `statement` lies at or below `path`.
fn covers(path: &str, statement: &str) -> bool {
    path.is_empty()
        || statement == path
        || statement
            .strip_prefix(path)
            .is_some_and(|rest| rest.starts_with(' '))
}

fn apply_statement(config: &mut Vec<String>, line: &str) -> Result<(), String> {
    if let Some(statement) = line.strip_prefix(SET_LS) {
        let statement = statement.trim();
        if statement.is_empty() {
            return Err(format!("syntax error: {}", line));
        }
        if !config.iter().any(|s| s == statement) {
            config.push(statement.to_string());
        }
        Ok(())
    } else if let Some(path) = line.strip_prefix(DELETE_LS) {
        let path = path.trim();
        config.retain(|s| !covers(path, s));
        Ok(())
    } else {
        Err(format!("syntax error: {}", line))
    }
}

fn parse_show_configuration(command: &str) -> Result<(&str, bool), LinkError> {
    let syntax_error = || LinkError::Rpc(format!("syntax error: {}", command));
    let rest = command
        .strip_prefix("show configuration")
        .ok_or_else(syntax_error)?;
    let (path, pipe) = match rest.split_once('|') {
        Some((path, pipe)) => (path.trim(), pipe.trim()),
        None => (rest.trim(), ""),
    };
    match pipe {
        "display set" => Ok((path, false)),
        "display set relative" => Ok((path, true)),
        _ => Err(syntax_error()),
    }
}

fn dump(running: &[String], path: &str, relative: bool) -> Vec<String> {
    running
        .iter()
        .filter(|s| covers(path, s))
        .map(|s| {
            if relative {
                format!("{}{}", SET_LS, s[path.len()..].trim_start())
            } else {
                format!("{}{}", SET_LS, s)
            }
        })
        .collect()
}
