/// SSH related functionality.
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use russh::{
    client::{self, Config, Handle, Msg},
    keys::{load_secret_key, ssh_key, PrivateKeyWithHashAlg},
    Channel, Disconnect,
};

use crate::config::ConnectionConfig;
use crate::error::{Error, Result};

/// Runs one remote command line per call.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send {
    /// Run `command` and return its standard output verbatim.
    async fn run(&mut self, command: &str) -> Result<String>;
}

#[derive(Debug)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the remote side closed without reporting a status
    pub exit_status: Option<u32>,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.exit_status == Some(0)
    }
}

enum AuthAttempt {
    Unavailable,
    Rejected,
    Accepted,
}

/// SSH client for a single appliance.
///
/// The session is opened on first use and reused for every later command
/// until [`Client::disconnect`] is called.
pub struct Client {
    config: ConnectionConfig,
    session: Option<Handle<Handler>>,
}

impl Client {
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        if config.host.is_empty() {
            return Err(Error::Configuration(
                "host not configured. Run 'syno-vm config set --host <hostname>'".into(),
            ));
        }
        if config.username.is_empty() {
            return Err(Error::Configuration(
                "username not configured. Run 'syno-vm config set --username <username>'".into(),
            ));
        }

        Ok(Self {
            config,
            session: None,
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn user(&self) -> &str {
        &self.config.username
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Open and authenticate the session unless it is already open.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_none() {
            let session = self.open().await?;
            self.session = Some(session);
        }
        Ok(())
    }

    async fn open(&self) -> Result<Handle<Handler>> {
        let config = Arc::new(Config::default());

        info!("Connecting to {}", self);
        let connect = client::connect(config, (&self.config.host[..], self.config.port), Handler {});
        // a zero timeout means no deadline
        let connected = if self.config.timeout.is_zero() {
            connect.await
        } else {
            tokio::time::timeout(self.config.timeout, connect)
                .await
                .map_err(|_| {
                    Error::Connection(format!(
                        "timed out after {}s connecting to {}",
                        self.config.timeout.as_secs(),
                        self
                    ))
                })?
        };
        let mut session = connected
            .map_err(|e| Error::Connection(format!("failed to connect to {}: {}", self, e)))?;

        let mut offered = false;

        match self.authenticate_with_agent(&mut session).await? {
            AuthAttempt::Accepted => return Ok(session),
            AuthAttempt::Rejected => offered = true,
            AuthAttempt::Unavailable => {}
        }

        match self.authenticate_with_keyfile(&mut session).await? {
            AuthAttempt::Accepted => return Ok(session),
            AuthAttempt::Rejected => offered = true,
            AuthAttempt::Unavailable => {}
        }

        Err(auth_failure(&self.config.username, offered))
    }

    #[cfg(unix)]
    async fn authenticate_with_agent(&self, session: &mut Handle<Handler>) -> Result<AuthAttempt> {
        use russh::keys::agent::client::AgentClient;

        let mut agent = match AgentClient::connect_env().await {
            Ok(agent) => agent,
            Err(e) => {
                debug!("SSH agent unavailable: {}", e);
                return Ok(AuthAttempt::Unavailable);
            }
        };

        let identities = match agent.request_identities().await {
            Ok(identities) => identities,
            Err(e) => {
                debug!("Failed to list SSH agent identities: {}", e);
                return Ok(AuthAttempt::Unavailable);
            }
        };
        if identities.is_empty() {
            debug!("SSH agent holds no identities");
            return Ok(AuthAttempt::Unavailable);
        }

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?
            .flatten();

        for key in identities {
            match session
                .authenticate_publickey_with(&self.config.username, key, hash_alg, &mut agent)
                .await
            {
                Ok(result) if result.success() => {
                    info!("Authenticated to {} with SSH agent key", self);
                    return Ok(AuthAttempt::Accepted);
                }
                Ok(_) => debug!("SSH agent key rejected by {}", self),
                Err(e) => debug!("SSH agent signing failed: {}", e),
            }
        }

        Ok(AuthAttempt::Rejected)
    }

    #[cfg(not(unix))]
    async fn authenticate_with_agent(&self, _session: &mut Handle<Handler>) -> Result<AuthAttempt> {
        Ok(AuthAttempt::Unavailable)
    }

    async fn authenticate_with_keyfile(
        &self,
        session: &mut Handle<Handler>,
    ) -> Result<AuthAttempt> {
        let Some(ref keypath) = self.config.keyfile else {
            return Ok(AuthAttempt::Unavailable);
        };

        let key_pair = match load_secret_key(keypath, None) {
            Ok(key_pair) => key_pair,
            Err(e) => {
                warn!(
                    "Failed to load private key from {}: {}",
                    keypath.display(),
                    e
                );
                return Ok(AuthAttempt::Unavailable);
            }
        };

        let hash_alg = session
            .best_supported_rsa_hash()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?
            .flatten();
        let result = session
            .authenticate_publickey(
                &self.config.username,
                PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg),
            )
            .await
            .map_err(|e| Error::authentication(e.to_string()))?;

        if result.success() {
            info!("Authenticated to {} with key {}", self, keypath.display());
            Ok(AuthAttempt::Accepted)
        } else {
            debug!("Key {} rejected by {}", keypath.display(), self);
            Ok(AuthAttempt::Rejected)
        }
    }

    /// Run a command and capture its output and exit status without
    /// judging the result.
    pub async fn execute(&mut self, command: &str) -> Result<CommandResult> {
        self.connect().await?;

        let opened = match &self.session {
            Some(session) => session.channel_open_session().await,
            None => return Err(Error::Connection("SSH session is not established".into())),
        };
        let mut channel = opened.map_err(|e| Error::Command {
            command: command.to_string(),
            status: None,
            stderr: format!("failed to create SSH session: {}", e),
        })?;

        debug!("Executing '{}' on {}", command, self);
        let result = match channel.exec(true, command).await {
            Ok(()) => Ok(wait_result_from_channel(&mut channel).await),
            Err(e) => Err(Error::Command {
                command: command.to_string(),
                status: None,
                stderr: e.to_string(),
            }),
        };

        if let Err(e) = channel.close().await {
            debug!("Closing channel for '{}' failed: {}", command, e);
        }

        result
    }

    /// Run a command, failing unless it exits with status 0.
    pub async fn execute_command(&mut self, command: &str) -> Result<String> {
        let result = self.execute(command).await?;
        if !result.success() {
            return Err(Error::Command {
                command: command.to_string(),
                status: result.exit_status,
                stderr: result.stderr.trim_end().to_string(),
            });
        }
        Ok(result.stdout)
    }

    /// Close the session. Failures are logged and otherwise ignored.
    pub async fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
            {
                warn!("Failed to close SSH session to {}: {}", self, e);
            }
        }
    }
}

#[async_trait]
impl CommandRunner for Client {
    async fn run(&mut self, command: &str) -> Result<String> {
        self.execute_command(command).await
    }
}

impl std::fmt::Display for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}@{}:{}",
            self.config.username, self.config.host, self.config.port
        )
    }
}

/// Error for a session where no credential was accepted. `offered` is set
/// when at least one key reached the server.
fn auth_failure(username: &str, offered: bool) -> Error {
    if offered {
        Error::authentication(format!("server rejected all keys for user {}", username))
    } else {
        Error::authentication(
            "no SSH authentication methods available. Please ensure ssh-agent is running or configure a keyfile",
        )
    }
}

pub async fn wait_result_from_channel(channel: &mut Channel<Msg>) -> CommandResult {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_status = None;

    while let Some(msg) = channel.wait().await {
        match msg {
            russh::ChannelMsg::Data { data } => stdout.extend_from_slice(&data),
            russh::ChannelMsg::ExtendedData { data, ext } => {
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                }
            }
            russh::ChannelMsg::ExitStatus { exit_status: code } => exit_status = Some(code),
            russh::ChannelMsg::Close => break,
            _ => {}
        }
    }

    CommandResult {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        exit_status,
    }
}

#[derive(Debug)]
pub struct Handler {}

// Host keys are not verified: appliances usually present self-generated keys.
impl client::Handler for Handler {
    type Error = russh::Error;

    fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> impl Future<Output = std::result::Result<bool, Self::Error>> + Send {
        debug!(
            "Accepting unverified host key {}",
            server_public_key.fingerprint(ssh_key::HashAlg::Sha256)
        );
        async { Ok(true) }
    }
}
