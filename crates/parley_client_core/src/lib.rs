#![forbid(unsafe_code)]

use tokio::sync::{mpsc, oneshot};
use tracing::info;

pub mod config;
pub mod controller;
pub mod error;
pub mod event;
pub mod handshake;
pub mod manager;
pub mod reconnect;
pub mod session;
pub mod transport;


pub use config::{ClientConfig, load_client_config, load_client_config_from_path};
pub use controller::{ConnectionController, ShutdownHandle};
pub use error::ClientCoreError;
pub use event::ClientEvent;
pub use handshake::HandshakeCoordinator;
pub use manager::ConnectionManager;
pub use parley_domain::{ConnectionStatus, Nickname};
pub use reconnect::ReconnectPolicy;
pub use session::ConnectionState;
pub use transport::{Transport, TransportFactory, WebSocketTransportFactory};

/// Bounded queue between controllers and the manager task.
pub const COMMAND_CHANNEL_CAPACITY: usize = 128;

/// Start a connection manager that talks WebSocket.
pub fn start_connection_manager(
	cfg: &ClientConfig,
) -> Result<(ConnectionController, mpsc::UnboundedReceiver<ClientEvent>, ShutdownHandle), ClientCoreError> {
	start_connection_manager_with_factory(cfg, WebSocketTransportFactory)
}

/// Start a connection manager on the current tokio runtime.
///
/// The returned receiver yields status changes and inbound messages. The
/// manager keeps running until [`ShutdownHandle::shutdown`] is called or
/// every [`ConnectionController`] clone is dropped.
pub fn start_connection_manager_with_factory<F: TransportFactory>(
	cfg: &ClientConfig,
	factory: F,
) -> Result<(ConnectionController, mpsc::UnboundedReceiver<ClientEvent>, ShutdownHandle), ClientCoreError> {
	let (events_tx, events_rx) = mpsc::unbounded_channel();
	let (manager, state_rx) = ConnectionManager::new(cfg, factory, events_tx)?;

	let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
	let (shutdown_tx, shutdown_rx) = oneshot::channel();

	info!(endpoint = %cfg.endpoint, "starting connection manager");
	let join_handle = tokio::spawn(manager.run(cmd_rx, shutdown_rx));

	Ok((
		ConnectionController::new(cmd_tx, state_rx),
		events_rx,
		ShutdownHandle::new(shutdown_tx, join_handle),
	))
}
