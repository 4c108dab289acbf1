use parley_domain::ConnectionStatus;

/// Events emitted by the connection manager to presentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
	StatusChanged(ConnectionStatus),
	MessageReceived(String),
}
