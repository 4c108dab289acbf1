use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, anyhow};
use parley_domain::Nickname;
use parley_util::endpoint::ServerEndpoint;
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ClientCoreError;
use crate::handshake::{DEFAULT_HANDSHAKE_TEMPLATE, HandshakeCoordinator};
use crate::reconnect::{DEFAULT_BACKOFF_MAX, ReconnectPolicy};

/// Local dev server endpoint.
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:18203/chat";

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
	/// Target chat server.
	pub endpoint: ServerEndpoint,

	/// Identity to register; may also be supplied at connect time.
	pub nickname: Option<Nickname>,

	/// Identity message template (must contain `{nickname}`).
	pub handshake_template: String,

	/// Behavior after an unexpected close.
	pub reconnect: ReconnectPolicy,
}

impl ClientConfig {
	/// Convenience: create a config from `ws://host:port[/path]`.
	pub fn from_server_url(url: &str) -> Result<Self, ClientCoreError> {
		let endpoint = ServerEndpoint::parse(url).map_err(ClientCoreError::Config)?;
		Ok(Self {
			endpoint,
			..Self::default()
		})
	}

	pub fn handshake(&self) -> Result<HandshakeCoordinator, ClientCoreError> {
		HandshakeCoordinator::new(self.handshake_template.clone())
	}
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			endpoint: ServerEndpoint {
				secure: false,
				host: "127.0.0.1".to_string(),
				port: 18203,
				path: "/chat".to_string(),
			},
			nickname: None,
			handshake_template: DEFAULT_HANDSHAKE_TEMPLATE.to_string(),
			reconnect: ReconnectPolicy::Immediate,
		}
	}
}

/// Default config path: `~/.parley/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".parley").join("config.toml"))
}

/// Load the client config from TOML and env overrides.
pub fn load_client_config() -> anyhow::Result<ClientConfig> {
	let path = default_config_path()?;
	load_client_config_from_path(&path)
}

/// Same as `load_client_config` but with an explicit config path.
pub fn load_client_config_from_path(path: &Path) -> anyhow::Result<ClientConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = ClientConfig::from_file(file_cfg).with_context(|| format!("invalid config in {}", path.display()))?;

	apply_env_overrides(&mut cfg);

	Ok(cfg)
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	server_url: Option<String>,
	nickname: Option<String>,
	handshake_template: Option<String>,

	#[serde(default)]
	reconnect: FileReconnectSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileReconnectSettings {
	backoff_base_ms: Option<u64>,
	max_delay_ms: Option<u64>,
}

impl ClientConfig {
	fn from_file(file: FileConfig) -> anyhow::Result<Self> {
		let mut cfg = Self::default();

		if let Some(url) = file.server_url.filter(|s| !s.trim().is_empty()) {
			cfg.endpoint = ServerEndpoint::parse(&url).map_err(|e| anyhow!(e)).context("server_url")?;
		}

		if let Some(nick) = file.nickname.filter(|s| !s.trim().is_empty()) {
			cfg.nickname = Some(Nickname::new(nick).context("nickname")?);
		}

		if let Some(template) = file.handshake_template.filter(|s| !s.trim().is_empty()) {
			HandshakeCoordinator::new(template.clone()).context("handshake_template")?;
			cfg.handshake_template = template;
		}

		cfg.reconnect = reconnect_policy(file.reconnect.backoff_base_ms, file.reconnect.max_delay_ms);

		Ok(cfg)
	}
}

fn reconnect_policy(backoff_base_ms: Option<u64>, max_delay_ms: Option<u64>) -> ReconnectPolicy {
	match backoff_base_ms.filter(|ms| *ms > 0) {
		Some(base_ms) => ReconnectPolicy::backoff(
			Duration::from_millis(base_ms),
			max_delay_ms.map(Duration::from_millis).unwrap_or(DEFAULT_BACKOFF_MAX),
		),
		None => ReconnectPolicy::Immediate,
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn apply_env_overrides(cfg: &mut ClientConfig) {
	apply_overrides_from(cfg, |key| std::env::var(key).ok());
}

/// Apply `PARLEY_*` overrides. Invalid values are logged and ignored.
fn apply_overrides_from(cfg: &mut ClientConfig, lookup: impl Fn(&str) -> Option<String>) {
	let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

	if let Some(v) = get("PARLEY_SERVER_URL") {
		match ServerEndpoint::parse(&v) {
			Ok(endpoint) => {
				cfg.endpoint = endpoint;
				info!("client config: server_url overridden by env");
			}
			Err(e) => warn!(error = %e, "ignoring invalid PARLEY_SERVER_URL"),
		}
	}

	if let Some(v) = get("PARLEY_NICKNAME") {
		match Nickname::new(v) {
			Ok(nick) => {
				cfg.nickname = Some(nick);
				info!("client config: nickname overridden by env");
			}
			Err(e) => warn!(error = %e, "ignoring invalid PARLEY_NICKNAME"),
		}
	}

	if let Some(v) = get("PARLEY_HANDSHAKE_TEMPLATE") {
		match HandshakeCoordinator::new(v.clone()) {
			Ok(_) => {
				cfg.handshake_template = v;
				info!("client config: handshake_template overridden by env");
			}
			Err(e) => warn!(error = %e, "ignoring invalid PARLEY_HANDSHAKE_TEMPLATE"),
		}
	}

	let backoff_ms = get("PARLEY_RECONNECT_BACKOFF_MS").and_then(|v| v.parse::<u64>().ok());
	let max_delay_ms = get("PARLEY_RECONNECT_MAX_DELAY_MS").and_then(|v| v.parse::<u64>().ok());
	if backoff_ms.is_some() {
		let max_delay_ms = max_delay_ms.or(match cfg.reconnect {
			ReconnectPolicy::Backoff { max, .. } => Some(max.as_millis() as u64),
			ReconnectPolicy::Immediate => None,
		});
		cfg.reconnect = reconnect_policy(backoff_ms, max_delay_ms);
		info!(policy = ?cfg.reconnect, "client config: reconnect policy overridden by env");
	} else if let (Some(max_ms), ReconnectPolicy::Backoff { base, .. }) = (max_delay_ms, cfg.reconnect) {
		cfg.reconnect = ReconnectPolicy::backoff(base, Duration::from_millis(max_ms));
		info!(max_ms, "client config: reconnect max delay overridden by env");
	}
}
