use parley_domain::Nickname;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::error::ClientCoreError;
use crate::session::ConnectionState;

#[derive(Debug)]
pub enum ManagerCommand {
	Connect {
		nickname: Option<Nickname>,
		is_reconnect: bool,
		done: oneshot::Sender<Result<(), ClientCoreError>>,
	},
	Disconnect {
		done: oneshot::Sender<()>,
	},
	Send {
		text: String,
	},
}

/// Cloneable handle presentation code uses to drive the connection manager.
#[derive(Clone)]
pub struct ConnectionController {
	pub(super) cmd_tx: mpsc::Sender<ManagerCommand>,
	pub(super) state_rx: watch::Receiver<ConnectionState>,
}

impl ConnectionController {
	pub fn new(cmd_tx: mpsc::Sender<ManagerCommand>, state_rx: watch::Receiver<ConnectionState>) -> Self {
		Self { cmd_tx, state_rx }
	}

	/// Start a session as `nickname`. Returns once the transport is created; open completes asynchronously.
	pub async fn connect(&self, nickname: Nickname) -> Result<(), ClientCoreError> {
		self.request_connect(Some(nickname), false).await
	}

	/// Rebuild the session with the last nickname.
	pub async fn reconnect(&self) -> Result<(), ClientCoreError> {
		self.request_connect(None, true).await
	}

	async fn request_connect(&self, nickname: Option<Nickname>, is_reconnect: bool) -> Result<(), ClientCoreError> {
		let (done, done_rx) = oneshot::channel();
		self.cmd_tx
			.send(ManagerCommand::Connect {
				nickname,
				is_reconnect,
				done,
			})
			.await
			.map_err(|_| ClientCoreError::ManagerStopped)?;

		done_rx.await.map_err(|_| ClientCoreError::ManagerStopped)?
	}

	/// Close the connection and stop reconnecting. Resolves after the close attempt.
	pub async fn disconnect(&self) -> Result<(), ClientCoreError> {
		let (done, done_rx) = oneshot::channel();
		self.cmd_tx
			.send(ManagerCommand::Disconnect { done })
			.await
			.map_err(|_| ClientCoreError::ManagerStopped)?;

		done_rx.await.map_err(|_| ClientCoreError::ManagerStopped)
	}

	/// Queue a chat message. Dropped by the manager unless the connection is open.
	pub async fn send(&self, text: impl Into<String>) -> Result<(), ClientCoreError> {
		self.cmd_tx
			.send(ManagerCommand::Send { text: text.into() })
			.await
			.map_err(|_| ClientCoreError::ManagerStopped)
	}

	pub fn state(&self) -> ConnectionState {
		*self.state_rx.borrow()
	}

	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.state_rx.clone()
	}
}

pub struct ShutdownHandle {
	pub(super) shutdown_tx: oneshot::Sender<()>,
	pub(super) join_handle: JoinHandle<()>,
}

impl ShutdownHandle {
	pub fn new(shutdown_tx: oneshot::Sender<()>, join_handle: JoinHandle<()>) -> Self {
		Self {
			shutdown_tx,
			join_handle,
		}
	}

	/// Disconnect and wait for the manager task to exit.
	pub async fn shutdown(self) {
		let _ = self.shutdown_tx.send(());
		let _ = self.join_handle.await;
	}
}
