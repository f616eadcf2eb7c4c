//! Scripted devices and an in-memory transport for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netbackup::config::{AppConfig, Timeouts};
use netbackup::error::{Result, StorageError, TransportError};
use netbackup::storage::ConfigStore;
use netbackup::transport::{Connection, Credential, Transport};
use secrecy::ExposeSecret;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

pub const PROMPT: &str = "router1#";
pub const SHOW_RUNNING: &str = "show running-config";
pub const CONFIG: &str = "!\r\nhostname router1\r\n!\r\nend";

/// How the fake device behaves once a shell is open.
#[derive(Debug, Clone)]
pub struct DeviceScript {
    pub banner: String,
    pub prompt: String,
    pub config: String,
    /// Stop responding after echoing this command.
    pub hang_on: Option<String>,
    /// Hang up partway through the reply to this command.
    pub drop_on: Option<String>,
    /// Never print a prompt at all.
    pub silent: bool,
}

impl Default for DeviceScript {
    fn default() -> Self {
        Self {
            banner: "Welcome to router1\n".into(),
            prompt: PROMPT.into(),
            config: CONFIG.into(),
            hang_on: None,
            drop_on: None,
            silent: false,
        }
    }
}

impl DeviceScript {
    pub fn hang_on(mut self, command: &str) -> Self {
        self.hang_on = Some(command.into());
        self
    }

    pub fn drop_on(mut self, command: &str) -> Self {
        self.drop_on = Some(command.into());
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }
}

/// Shared record of what the transport was asked to do.
#[derive(Debug, Default)]
pub struct Journal {
    /// `(address, username)` per connect call, in order.
    pub attempts: Mutex<Vec<(String, String)>>,
    /// Commands received on interactive channels, in order.
    pub commands: Mutex<Vec<String>>,
    pub closes: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl Journal {
    pub fn usernames(&self) -> Vec<String> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .map(|(_, user)| user.clone())
            .collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Transport accepting a fixed set of username/password pairs.
#[derive(Debug, Clone)]
pub struct FakeTransport {
    accepted: HashMap<String, String>,
    script: DeviceScript,
    connect_delay: Duration,
    refuse_connections: bool,
    fail_close: bool,
    pub journal: Arc<Journal>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            accepted: HashMap::new(),
            script: DeviceScript::default(),
            connect_delay: Duration::ZERO,
            refuse_connections: false,
            fail_close: false,
            journal: Arc::new(Journal::default()),
        }
    }

    pub fn accept(mut self, username: &str, password: &str) -> Self {
        self.accepted.insert(username.into(), password.into());
        self
    }

    pub fn script(mut self, script: DeviceScript) -> Self {
        self.script = script;
        self
    }

    pub fn connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn refuse_connections(mut self) -> Self {
        self.refuse_connections = true;
        self
    }

    /// Make every `close` report an error after counting it.
    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

impl Transport for FakeTransport {
    type Connection = FakeConnection;

    async fn connect(&self, host: &str, credential: &Credential) -> Result<FakeConnection> {
        let journal = &self.journal;
        journal
            .attempts
            .lock()
            .unwrap()
            .push((host.to_string(), credential.username.clone()));

        let now = journal.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        journal.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.connect_delay).await;
        journal.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.refuse_connections {
            return Err(TransportError::Disconnected.into());
        }

        match self.accepted.get(&credential.username) {
            Some(password) if password == credential.password.expose_secret() => {
                Ok(FakeConnection {
                    script: self.script.clone(),
                    fail_close: self.fail_close,
                    journal: self.journal.clone(),
                })
            }
            _ => Err(TransportError::AuthenticationFailed {
                user: credential.username.clone(),
            }
            .into()),
        }
    }
}

pub struct FakeConnection {
    script: DeviceScript,
    fail_close: bool,
    journal: Arc<Journal>,
}

impl Connection for FakeConnection {
    type Channel = DuplexStream;

    async fn run_once(&mut self, command: &str) -> Result<String> {
        self.journal.commands.lock().unwrap().push(command.into());
        if command == SHOW_RUNNING {
            Ok(self.script.config.clone())
        } else {
            Ok(String::new())
        }
    }

    async fn open_interactive(&mut self) -> Result<DuplexStream> {
        let (client, server) = tokio::io::duplex(64 * 1024);
        tokio::spawn(run_device(
            server,
            self.script.clone(),
            self.journal.clone(),
        ));
        Ok(client)
    }

    async fn close(self) -> Result<()> {
        self.journal.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(TransportError::Disconnected.into());
        }
        Ok(())
    }
}

/// Echo each command, print its output, then the prompt.
async fn run_device(stream: DuplexStream, script: DeviceScript, journal: Arc<Journal>) {
    let (read, mut write) = tokio::io::split(stream);
    let mut lines = BufReader::new(read).lines();

    if script.silent {
        let _ = write.write_all(script.banner.as_bytes()).await;
        std::future::pending::<()>().await;
    }

    let greeting = format!("{}{}", script.banner, script.prompt);
    if write.write_all(greeting.as_bytes()).await.is_err() {
        return;
    }

    while let Ok(Some(command)) = lines.next_line().await {
        journal.commands.lock().unwrap().push(command.clone());

        let mut reply = format!("{command}\n");
        if script.hang_on.as_deref() == Some(command.as_str()) {
            let _ = write.write_all(reply.as_bytes()).await;
            std::future::pending::<()>().await;
        }

        if script.drop_on.as_deref() == Some(command.as_str()) {
            reply.push_str("!\nhostname ");
            let _ = write.write_all(reply.as_bytes()).await;
            return;
        }

        if command == SHOW_RUNNING {
            reply.push_str(&script.config);
            reply.push('\n');
        }
        reply.push_str(&script.prompt);

        if write.write_all(reply.as_bytes()).await.is_err() {
            return;
        }
    }
}

/// Store keeping configurations in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    pub saved: Mutex<Vec<(String, String)>>,
}

impl MemoryStore {
    pub fn saved(&self) -> Vec<(String, String)> {
        self.saved.lock().unwrap().clone()
    }
}

impl ConfigStore for MemoryStore {
    async fn save(&self, name: &str, text: &str) -> Result<PathBuf> {
        self.saved
            .lock()
            .unwrap()
            .push((name.to_string(), text.to_string()));
        Ok(PathBuf::from(format!("{name}.cfg")))
    }
}

/// Store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore;

impl ConfigStore for FailingStore {
    async fn save(&self, name: &str, _text: &str) -> Result<PathBuf> {
        Err(StorageError::Write {
            path: PathBuf::from(format!("{name}.cfg")),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
        }
        .into())
    }
}

/// Quick timeouts so hung devices fail fast.
pub fn fast_timeouts() -> Timeouts {
    Timeouts {
        connect: Duration::from_secs(2),
        prompt_sync: Duration::from_millis(300),
        disable_paging: Duration::from_millis(300),
        show_command: Duration::from_millis(300),
    }
}

/// App settings with the given global credentials.
pub fn app_config(credentials: &[(&str, &str)]) -> AppConfig {
    let mut app = AppConfig::default();
    app.defaults.timeouts = fast_timeouts();
    app.credentials = credentials
        .iter()
        .map(|(user, password)| Credential::new(*user, *password))
        .collect();
    app
}
