use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parley_domain::{ConnectionStatus, Nickname};
use parley_util::endpoint::ServerEndpoint;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::controller::ManagerCommand;
use crate::error::ClientCoreError;
use crate::event::ClientEvent;
use crate::handshake::HandshakeCoordinator;
use crate::reconnect::{ReconnectPolicy, schedule_reconnect};
use crate::session::{ConnectionState, Session};
use crate::transport::{TransportEnvelope, TransportEvent, TransportFactory, register_handlers};

/// Owns the single logical connection to the chat server.
///
/// All state lives on one task: caller commands and transport events arrive
/// through the same `select!` loop. Transport events carry the generation of
/// the session that produced them and are dropped unless it is current.
pub struct ConnectionManager<F: TransportFactory> {
	endpoint: ServerEndpoint,
	handshake: HandshakeCoordinator,
	reconnect: ReconnectPolicy,
	factory: F,

	state_tx: watch::Sender<ConnectionState>,
	events_tx: mpsc::UnboundedSender<ClientEvent>,
	pub(crate) transport_tx: mpsc::UnboundedSender<TransportEnvelope>,
	pub(crate) transport_rx: mpsc::UnboundedReceiver<TransportEnvelope>,

	generation: u64,
	session: Option<Session>,
	nickname: Option<Nickname>,
	disconnect_requested: bool,
	reconnect_attempt: u32,
	reconnect_deadline: Option<Instant>,
}

impl<F: TransportFactory> ConnectionManager<F> {
	pub fn new(
		cfg: &ClientConfig,
		factory: F,
		events_tx: mpsc::UnboundedSender<ClientEvent>,
	) -> Result<(Self, watch::Receiver<ConnectionState>), ClientCoreError> {
		let handshake = cfg.handshake()?;
		let (state_tx, state_rx) = watch::channel(ConnectionState::Idle);
		let (transport_tx, transport_rx) = mpsc::unbounded_channel();

		let manager = Self {
			endpoint: cfg.endpoint.clone(),
			handshake,
			reconnect: cfg.reconnect,
			factory,
			state_tx,
			events_tx,
			transport_tx,
			transport_rx,
			generation: 0,
			session: None,
			nickname: cfg.nickname.clone(),
			disconnect_requested: false,
			reconnect_attempt: 0,
			reconnect_deadline: None,
		};

		Ok((manager, state_rx))
	}

	pub fn state(&self) -> ConnectionState {
		*self.state_tx.borrow()
	}

	pub fn generation(&self) -> u64 {
		self.generation
	}

	/// Run until shutdown is signalled or every controller handle is dropped.
	pub async fn run(mut self, mut cmd_rx: mpsc::Receiver<ManagerCommand>, mut shutdown_rx: oneshot::Receiver<()>) {
		loop {
			let reconnect_deadline = self.reconnect_deadline;

			tokio::select! {
				_ = &mut shutdown_rx => {
					info!("connection manager shutting down");
					self.disconnect().await;
					break;
				}

				cmd = cmd_rx.recv() => {
					let Some(cmd) = cmd else {
						info!("all controllers dropped; shutting down");
						self.disconnect().await;
						break;
					};
					self.handle_command(cmd).await;
				}

				Some(envelope) = self.transport_rx.recv() => {
					self.handle_transport_event(envelope).await;
				}

				_ = async {
					if let Some(deadline) = reconnect_deadline {
						tokio::time::sleep_until(deadline).await;
					}
				}, if reconnect_deadline.is_some() => {
					self.reconnect_deadline = None;
					self.connect(true).await;
				}
			}
		}
	}

	async fn handle_command(&mut self, cmd: ManagerCommand) {
		match cmd {
			ManagerCommand::Connect {
				nickname,
				is_reconnect,
				done,
			} => {
				let res = self.request_connect(nickname, is_reconnect).await;
				let _ = done.send(res);
			}
			ManagerCommand::Disconnect { done } => {
				self.disconnect().await;
				let _ = done.send(());
			}
			ManagerCommand::Send { text } => {
				self.send(text).await;
			}
		}
	}

	/// Caller-initiated connect: clears a previous user disconnect.
	pub(crate) async fn request_connect(
		&mut self,
		nickname: Option<Nickname>,
		is_reconnect: bool,
	) -> Result<(), ClientCoreError> {
		if let Some(nickname) = nickname {
			self.nickname = Some(nickname);
		}
		if self.nickname.is_none() {
			return Err(ClientCoreError::Config("a nickname is required to connect".to_string()));
		}

		self.disconnect_requested = false;
		self.reconnect_attempt = 0;
		self.connect(is_reconnect).await;
		Ok(())
	}

	/// Replace the current session with a fresh transport and start opening it.
	pub(crate) async fn connect(&mut self, is_reconnect: bool) {
		let Some(nickname) = self.nickname.clone() else {
			warn!("connect requested without a nickname; ignoring");
			return;
		};

		self.reconnect_deadline = None;
		if self.teardown_session(false).await {
			debug!("previous session torn down before connect");
		}

		self.generation += 1;
		let generation = self.generation;

		let (sink, handlers) = register_handlers(generation, self.transport_tx.clone());
		let transport = self.factory.create(&self.endpoint, sink);

		self.set_state(ConnectionState::Connecting);
		self.emit_status(if is_reconnect {
			ConnectionStatus::Reconnecting
		} else {
			ConnectionStatus::Connecting
		});
		info!(generation, is_reconnect, endpoint = %self.endpoint, "connecting");

		let opener = Arc::clone(&transport);
		let open_task = tokio::spawn(async move {
			if let Err(e) = opener.open().await {
				warn!(generation, error = %e, "transport open failed");
			}
		});

		self.session = Some(Session {
			generation,
			transport,
			handlers,
			nickname,
			open_task,
		});
	}

	/// User-initiated disconnect. Stops automatic reconnects until the next connect.
	pub(crate) async fn disconnect(&mut self) {
		self.disconnect_requested = true;
		self.reconnect_deadline = None;

		if self.session.is_none() {
			debug!("disconnect: no session");
			return;
		}

		// Retire the generation so queued events from this session are stale.
		self.generation += 1;
		self.teardown_session(true).await;
		self.set_state(ConnectionState::Closed);
		info!(generation = self.generation, "disconnected by request");
	}

	/// Detach handlers, then close (if open) or cancel (otherwise). Outcome is logged only.
	///
	/// Only a user disconnect waits for the close handshake. A replaced
	/// session is closed on a detached task.
	async fn teardown_session(&mut self, await_close: bool) -> bool {
		let Some(session) = self.session.take() else {
			return false;
		};

		session.handlers.detach();
		let generation = session.generation;

		if self.state() != ConnectionState::Open {
			session.open_task.abort();
			session.transport.cancel_connection();
		} else if await_close {
			self.set_state(ConnectionState::Closing);
			if let Err(e) = session.transport.close().await {
				warn!(generation, error = %e, "transport close failed");
			}
		} else {
			let transport = session.transport;
			tokio::spawn(async move {
				if let Err(e) = transport.close().await {
					warn!(generation, error = %e, "transport close failed");
				}
			});
		}

		true
	}

	pub(crate) async fn send(&mut self, text: String) {
		if text.is_empty() {
			return;
		}

		let Some(session) = self.session.as_ref().filter(|_| self.state() == ConnectionState::Open) else {
			debug!(state = %self.state(), "dropping send; connection not open");
			return;
		};

		if let Err(e) = session.transport.send_text(text).await {
			warn!(generation = session.generation, error = %e, "send failed");
		}
	}

	pub(crate) async fn handle_transport_event(&mut self, envelope: TransportEnvelope) {
		let current = self.session.as_ref().map(|s| s.generation);
		if current != Some(envelope.generation) || envelope.generation != self.generation {
			debug!(
				generation = envelope.generation,
				current = self.generation,
				event = ?envelope.event,
				"discarding stale transport event"
			);
			return;
		}

		match envelope.event {
			TransportEvent::Opened => self.on_open().await,
			TransportEvent::Closed { code } => self.on_close(code).await,
			TransportEvent::Message(bytes) => self.on_message(bytes),
		}
	}

	async fn on_open(&mut self) {
		if self.state() != ConnectionState::Connecting {
			debug!(state = %self.state(), "ignoring duplicate open");
			return;
		}

		self.set_state(ConnectionState::Open);
		self.reconnect_attempt = 0;
		self.emit_status(ConnectionStatus::Connected);
		info!(generation = self.generation, "connected");

		let Some(session) = self.session.as_ref() else {
			return;
		};

		// Runs before the loop can pick up any queued user send.
		if let Err(e) = self.handshake.register(session.transport.as_ref(), &session.nickname).await {
			warn!(generation = session.generation, error = %e, "identity message failed");
		}
	}

	async fn on_close(&mut self, code: u16) {
		let was_open = self.state() == ConnectionState::Open;
		let generation = self.generation;

		self.emit_status(if was_open {
			ConnectionStatus::Disconnected
		} else {
			ConnectionStatus::FailedToConnect
		});
		self.set_state(ConnectionState::Closed);
		self.session = None;

		if was_open {
			warn!(generation, code, "connection closed");
		} else {
			warn!(generation, code, "failed to connect");
		}

		if self.disconnect_requested {
			return;
		}

		self.schedule_retry().await;
	}

	fn on_message(&mut self, bytes: Bytes) {
		match std::str::from_utf8(&bytes) {
			Ok(text) => self.emit(ClientEvent::MessageReceived(text.to_owned())),
			Err(e) => {
				let err = ClientCoreError::from(e);
				debug!(generation = self.generation, len = bytes.len(), error = %err, "dropping malformed message");
			}
		}
	}

	async fn schedule_retry(&mut self) {
		self.reconnect_attempt = self.reconnect_attempt.saturating_add(1);

		match self.reconnect {
			ReconnectPolicy::Immediate => {
				debug!(attempt = self.reconnect_attempt, "reconnecting immediately");
				self.connect(true).await;
			}
			ReconnectPolicy::Backoff { base, max } => {
				let (deadline, ms) = schedule_reconnect(self.reconnect_attempt, base, max);
				self.reconnect_deadline = Some(deadline);
				info!(
					attempt = self.reconnect_attempt,
					next_retry_in = ?Duration::from_millis(ms),
					"reconnect scheduled"
				);
			}
		}
	}

	#[cfg(test)]
	pub(crate) fn reconnect_pending(&self) -> bool {
		self.reconnect_deadline.is_some()
	}

	fn set_state(&self, state: ConnectionState) {
		let prev = self.state_tx.send_replace(state);
		if prev != state {
			debug!(from = %prev, to = %state, "state changed");
		}
	}

	fn emit_status(&self, status: ConnectionStatus) {
		self.emit(ClientEvent::StatusChanged(status));
	}

	fn emit(&self, event: ClientEvent) {
		if self.events_tx.send(event).is_err() {
			debug!("client event receiver dropped");
		}
	}
}
