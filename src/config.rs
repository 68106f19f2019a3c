use crate::error::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Server configuration.
///
/// In JSON every timeout is a whole number of milliseconds, e.g.
/// `{ "port": 8080, "read_timeout": 500, "idle_timeout": null }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    // Network configuration
    pub listen_address: String,
    pub port: u16,

    // Content
    pub root_dir: PathBuf,
    pub index_file: String,

    /// How long a single accept attempt waits before the loop re-checks for shutdown
    #[serde(with = "duration_ms")]
    pub accept_timeout: Duration,

    /// Length of one blocking read on a connection
    #[serde(with = "duration_ms")]
    pub read_timeout: Duration,

    /// Total time a connection may stay silent before it is dropped.
    /// `None` keeps waiting until the peer hangs up or the server stops.
    #[serde(with = "option_duration_ms")]
    pub idle_timeout: Option<Duration>,

    /// Upper bound on discarding request headers once the request line is in
    #[serde(with = "duration_ms")]
    pub header_timeout: Duration,

    /// How long `stop()` waits for the accept loop and handlers to wind down
    #[serde(with = "duration_ms")]
    pub shutdown_timeout: Duration,

    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1".to_string(),
            port: 8000,

            root_dir: PathBuf::from("."),
            index_file: "index.html".to_string(),

            accept_timeout: Duration::from_millis(250),
            read_timeout: Duration::from_millis(500),
            idle_timeout: Some(Duration::from_secs(30)),
            header_timeout: Duration::from_secs(2),
            shutdown_timeout: Duration::from_secs(3),

            max_line_length: 8 * 1024, // 8 KB
        }
    }
}

impl ServerConfig {
    /// Create a configuration serving `root_dir` on `port`
    pub fn new<P: Into<PathBuf>>(port: u16, root_dir: P) -> Self {
        Self {
            port,
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Set the address and port to listen on
    pub fn with_address(mut self, address: &str, port: u16) -> Self {
        self.listen_address = address.to_string();
        self.port = port;
        self
    }

    pub fn with_root_dir<P: Into<PathBuf>>(mut self, root_dir: P) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Get the full address string (address:port)
    pub fn socket_address(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }

    /// Check the values that would otherwise only fail at request time
    pub fn validate(&self) -> ServerResult<()> {
        if !self.root_dir.is_dir() {
            return Err(ServerError::Config(format!(
                "root directory {} does not exist or is not a directory",
                self.root_dir.display()
            )));
        }

        let timeouts = [
            ("accept_timeout", self.accept_timeout),
            ("read_timeout", self.read_timeout),
            ("header_timeout", self.header_timeout),
            ("shutdown_timeout", self.shutdown_timeout),
        ];
        for (name, value) in timeouts {
            if value.is_zero() {
                return Err(ServerError::Config(format!("{} must be non-zero", name)));
            }
        }

        if self.max_line_length == 0 {
            return Err(ServerError::Config("max_line_length must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> ServerResult<Self> {
        let content = fs::read_to_string(path)?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_json_file<P: AsRef<Path>>(&self, path: P) -> ServerResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod option_duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => (d.as_millis() as u64).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let opt: Option<u64> = Option::deserialize(deserializer)?;
        Ok(opt.map(Duration::from_millis))
    }
}
