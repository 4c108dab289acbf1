use parley_domain::ParseIdError;

/// Errors for client core operations.
///
/// Transport and decode failures are recovered inside the manager (logged,
/// then folded into the close-and-retry path); only `Config` and
/// `ManagerStopped` ever reach callers.
#[derive(Debug, thiserror::Error)]
pub enum ClientCoreError {
	/// Opening the transport failed.
	#[error("failed to open transport: {0}")]
	TransportOpen(String),

	/// Writing a frame to the transport failed.
	#[error("failed to send: {0}")]
	TransportSend(String),

	/// Closing the transport failed.
	#[error("failed to close transport: {0}")]
	TransportClose(String),

	/// Inbound frame was not valid UTF-8.
	#[error("failed to decode message: {0}")]
	MessageDecode(#[from] std::str::Utf8Error),

	/// Invalid configuration (endpoint, nickname, template).
	#[error("invalid configuration: {0}")]
	Config(String),

	/// The manager task is no longer running.
	#[error("connection manager is not running")]
	ManagerStopped,
}

impl From<ParseIdError> for ClientCoreError {
	fn from(e: ParseIdError) -> Self {
		ClientCoreError::Config(e.to_string())
	}
}
