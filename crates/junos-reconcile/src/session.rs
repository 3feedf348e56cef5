//! Session manager: one device connection and its lock/edit/commit
//! lifecycle.
//!
//! ```text
//! Connected --lock--> Locked --config_set--> Edited
//!     ^                  |                     |
//!     |                  +------commit---------+--> (plain) Connected
//!     |                                        +--> (confirmed) PendingConfirm --confirm_commit--> Connected
//!     +----------------------------clear------------------------------------+
//! ```
//!
//! Every call except [`Session::clear`] and [`Session::close`] observes the
//! session's cancellation token. Those two run on failure paths and must
//! still reach the device after a cancellation; callers bound them with a
//! timeout instead.

use std::future::Future;
use std::time::Duration;

use junos_cfg_common::codec::config_output_lines;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::commit::CommitMode;
use crate::error::{ReconcileError, ReconcileResult};
use crate::identity::{DeviceIdentity, GET_SOFTWARE_INFORMATION};
use crate::link::{Connector, Credentials, DeviceLink, DeviceTarget, LinkError};

/// Lifecycle state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Transport up, no lock held.
    Connected,
    /// Exclusive lock held, candidate untouched.
    Locked,
    /// Exclusive lock held, candidate carries pending statements.
    Edited,
    /// Confirmed commit active, waiting for its confirmation.
    PendingConfirm,
    /// Transport torn down.
    Closed,
}

impl SessionState {
    /// Returns true while this session holds the configuration lock.
    pub fn holds_lock(&self) -> bool {
        matches!(
            self,
            SessionState::Locked | SessionState::Edited | SessionState::PendingConfirm
        )
    }
}

/// Connect parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Attempts before giving up.
    pub retry_count: u8,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            retry_count: 1,
            timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// One authenticated device connection.
pub struct Session {
    target: DeviceTarget,
    link: Box<dyn DeviceLink>,
    identity: DeviceIdentity,
    state: SessionState,
    /// A lock request was sent but its reply never arrived; the device
    /// may hold the lock for this session.
    lock_unconfirmed: bool,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("identity", &self.identity)
            .field("state", &self.state)
            .field("lock_unconfirmed", &self.lock_unconfirmed)
            .finish_non_exhaustive()
    }
}

/// Runs `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T, F>(
    cancel: &CancellationToken,
    stage: &str,
    fut: F,
) -> ReconcileResult<T>
where
    F: Future<Output = ReconcileResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReconcileError::cancelled(stage)),
        result = fut => result,
    }
}

impl Session {
    /// Connects to `target`, retrying with linear backoff.
    ///
    /// Attempt `n` that fails is followed by an `n`-second pause. Once the
    /// transport is up the identity snapshot is fetched; a failure there
    /// closes the link and is not retried.
    #[instrument(skip(connector, target, credentials, cancel), fields(target = %target))]
    pub async fn connect<C: Connector + ?Sized>(
        connector: &C,
        target: &DeviceTarget,
        credentials: &Credentials,
        options: ConnectOptions,
        cancel: CancellationToken,
    ) -> ReconcileResult<Self> {
        let attempts = options.retry_count.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match Self::connect_once(connector, target, credentials, options.timeout, &cancel)
                .await?
            {
                Ok(link) => {
                    debug!(attempt, "Transport established");
                    return Self::open(target.clone(), link, cancel).await;
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Connect attempt failed");
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                let backoff = Duration::from_secs(u64::from(attempt));
                cancellable(&cancel, "connect backoff", async {
                    tokio::time::sleep(backoff).await;
                    Ok(())
                })
                .await?;
            }
        }

        Err(ReconcileError::Connect {
            host: target.to_string(),
            attempts,
            message: last_error,
        })
    }

    /// One transport attempt; the outer error is cancellation only.
    async fn connect_once<C: Connector + ?Sized>(
        connector: &C,
        target: &DeviceTarget,
        credentials: &Credentials,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> ReconcileResult<Result<Box<dyn DeviceLink>, LinkError>> {
        cancellable(cancel, "connect", async {
            let connecting = connector.connect(target, credentials);
            let link = match timeout {
                Some(limit) => match tokio::time::timeout(limit, connecting).await {
                    Ok(link) => link,
                    Err(_) => Err(LinkError::Transport(format!(
                        "timed out after {}s",
                        limit.as_secs()
                    ))),
                },
                None => connecting.await,
            };
            Ok(link)
        })
        .await
    }

    async fn open(
        target: DeviceTarget,
        mut link: Box<dyn DeviceLink>,
        cancel: CancellationToken,
    ) -> ReconcileResult<Self> {
        let reply = cancellable(&cancel, "identity query", async {
            link.rpc(GET_SOFTWARE_INFORMATION)
                .await
                .map_err(|e| ReconcileError::query(GET_SOFTWARE_INFORMATION, e))
        })
        .await;

        let identity = match reply.and_then(|reply| DeviceIdentity::from_xml(&reply)) {
            Ok(identity) => identity,
            Err(e) => {
                if let Err(close_err) = link.close().await {
                    debug!(error = %close_err, "Close after failed identity query failed");
                }
                return Err(e);
            }
        };

        info!(
            host = %target,
            hostname = %identity.hostname,
            model = %identity.model,
            version = %identity.version,
            cluster = identity.cluster,
            "Connected"
        );

        Ok(Self {
            target,
            link,
            identity,
            state: SessionState::Connected,
            lock_unconfirmed: false,
            cancel,
        })
    }

    /// Returns the device target.
    pub fn target(&self) -> &DeviceTarget {
        &self.target
    }

    /// Returns the identity snapshot taken at connect time.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    fn expect_state(&self, operation: &str, allowed: &[SessionState]) -> ReconcileResult<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ReconcileError::internal(format!(
                "{} not allowed in state {:?}",
                operation, self.state
            )))
        }
    }

    /// Takes the exclusive candidate configuration lock.
    ///
    /// Fails fast when another session holds it. A lock interrupted by
    /// cancellation may still have been granted, so [`Session::clear`] and
    /// [`Session::close`] attempt an unlock afterwards.
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn lock(&mut self) -> ReconcileResult<()> {
        self.expect_state("lock", &[SessionState::Connected])?;

        let host = self.target.to_string();
        let link = &mut self.link;
        self.lock_unconfirmed = true;
        let result = cancellable(&self.cancel, "lock", async {
            link.lock().await.map_err(|e| ReconcileError::lock(&host, e))
        })
        .await;
        if !matches!(result, Err(ReconcileError::Cancelled { .. })) {
            self.lock_unconfirmed = false;
        }
        result?;

        self.state = SessionState::Locked;
        debug!("Configuration locked");
        Ok(())
    }

    /// Loads statements into the candidate configuration without
    /// committing. An empty slice succeeds without contacting the device.
    #[instrument(skip(self, lines), fields(target = %self.target, statements = lines.len()))]
    pub async fn config_set(&mut self, lines: &[String]) -> ReconcileResult<()> {
        self.expect_state("config_set", &[SessionState::Locked, SessionState::Edited])?;
        if lines.is_empty() {
            return Ok(());
        }

        for line in lines {
            debug!(statement = %line, "Loading statement");
        }

        let link = &mut self.link;
        cancellable(&self.cancel, "config_set", async {
            link.load_set(lines).await.map_err(|e| ReconcileError::Apply {
                message: e.to_string(),
            })
        })
        .await?;

        self.state = SessionState::Edited;
        Ok(())
    }

    /// Activates the candidate configuration and returns device warnings.
    ///
    /// A plain commit releases the lock. A confirmed commit keeps it until
    /// [`Session::confirm_commit`]. On failure the candidate stays pending
    /// and the caller must [`Session::clear`].
    #[instrument(skip(self, log_message), fields(target = %self.target))]
    pub async fn commit(
        &mut self,
        mode: CommitMode,
        log_message: &str,
    ) -> ReconcileResult<Vec<String>> {
        self.expect_state("commit", &[SessionState::Locked, SessionState::Edited])?;

        let link = &mut self.link;
        let mut warnings = cancellable(&self.cancel, "commit", async {
            link.commit(mode.confirm_minutes(), log_message)
                .await
                .map_err(|e| ReconcileError::Commit {
                    message: e.to_string(),
                })
        })
        .await?;

        match mode {
            CommitMode::Plain => {
                info!("Configuration committed");
                if let Some(warning) = self.release_lock().await {
                    warnings.push(warning);
                }
            }
            CommitMode::Confirmed(confirmed) => {
                info!(
                    timeout_minutes = confirmed.timeout_minutes,
                    "Configuration committed, confirmation pending"
                );
                self.state = SessionState::PendingConfirm;
            }
        }
        Ok(warnings)
    }

    /// Confirms a pending confirmed commit and releases the lock.
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn confirm_commit(&mut self) -> ReconcileResult<Vec<String>> {
        self.expect_state("confirm_commit", &[SessionState::PendingConfirm])?;

        let link = &mut self.link;
        cancellable(&self.cancel, "confirm_commit", async {
            link.commit_check()
                .await
                .map_err(|e| ReconcileError::Commit {
                    message: e.to_string(),
                })
        })
        .await?;

        info!("Confirmed commit");
        Ok(self.release_lock().await.into_iter().collect())
    }

    /// Unlocks after a successful commit; a failure is only a warning since
    /// the configuration is already active.
    async fn release_lock(&mut self) -> Option<String> {
        let result = self.link.unlock().await;
        self.state = SessionState::Connected;
        match result {
            Ok(()) => None,
            Err(e) => {
                warn!(error = %e, "Unlock after commit failed");
                Some(format!("unlock after commit failed: {}", e))
            }
        }
    }

    /// Unlocks after a lock request whose reply never arrived. The device
    /// refuses the unlock when the request never took effect.
    async fn release_unconfirmed_lock(&mut self) {
        self.lock_unconfirmed = false;
        match self.link.unlock().await {
            Ok(()) => info!("Released lock granted to an interrupted request"),
            Err(e) => debug!(error = %e, "No lock held after interrupted request"),
        }
    }

    /// Discards the pending candidate edit and releases the lock.
    ///
    /// Both steps are attempted; the first failure is returned.
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn clear(&mut self) -> ReconcileResult<()> {
        if self.lock_unconfirmed {
            self.release_unconfirmed_lock().await;
        }
        if !self.state.holds_lock() {
            return Ok(());
        }

        let discard = self.link.discard_changes().await;
        let unlock = self.link.unlock().await;
        self.state = SessionState::Connected;

        discard
            .and(unlock)
            .map_err(|e| ReconcileError::lock(&self.target, format!("clear failed: {}", e)))?;
        info!("Candidate configuration cleared");
        Ok(())
    }

    /// Releases the lock if still held and tears down the transport.
    ///
    /// Calling it again is a no-op.
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn close(&mut self) -> ReconcileResult<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        if self.lock_unconfirmed {
            self.release_unconfirmed_lock().await;
        }
        if self.state.holds_lock() {
            if let Err(e) = self.link.unlock().await {
                warn!(error = %e, "Unlock on close failed");
            }
        }
        self.state = SessionState::Closed;
        self.link
            .close()
            .await
            .map_err(|e| ReconcileError::internal(format!("close failed: {}", e)))?;
        debug!("Session closed");
        Ok(())
    }

    /// Runs a read-only command; usable without the lock.
    #[instrument(skip(self), fields(target = %self.target))]
    pub async fn command(&mut self, query: &str) -> ReconcileResult<String> {
        if self.state == SessionState::Closed {
            return Err(ReconcileError::internal("command on closed session"));
        }
        let link = &mut self.link;
        cancellable(&self.cancel, "command", async {
            link.command(query)
                .await
                .map_err(|e| ReconcileError::query(query, e))
        })
        .await
    }

    /// Dumps `path` as flat `set` statements.
    ///
    /// With `relative` the statements are relative to `path`; otherwise
    /// they carry the full hierarchy. An empty result means the path holds
    /// no configuration.
    pub async fn show_config_set(
        &mut self,
        path: &str,
        relative: bool,
    ) -> ReconcileResult<Vec<String>> {
        let query = if relative {
            format!("show configuration {} | display set relative", path)
        } else {
            format!("show configuration {} | display set", path)
        };
        let reply = self.command(&query).await?;
        Ok(config_output_lines(&reply)
            .into_iter()
            .map(str::to_string)
            .collect())
    }
}
