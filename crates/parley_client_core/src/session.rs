use core::fmt;

use parley_domain::Nickname;
use tokio::task::JoinHandle;

use crate::transport::{HandlerRegistration, SharedTransport};

/// Connection lifecycle state, owned by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
	#[default]
	Idle,
	Connecting,
	Open,
	Closing,
	Closed,
}

impl ConnectionState {
	pub const fn as_str(self) -> &'static str {
		match self {
			ConnectionState::Idle => "idle",
			ConnectionState::Connecting => "connecting",
			ConnectionState::Open => "open",
			ConnectionState::Closing => "closing",
			ConnectionState::Closed => "closed",
		}
	}
}

impl fmt::Display for ConnectionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// One transport lifetime. Replaced on every connect, never shared.
pub(crate) struct Session {
	pub(crate) generation: u64,
	pub(crate) transport: SharedTransport,
	pub(crate) handlers: HandlerRegistration,
	pub(crate) nickname: Nickname,
	pub(crate) open_task: JoinHandle<()>,
}
