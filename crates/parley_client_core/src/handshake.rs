use parley_domain::Nickname;
use tracing::debug;

use crate::error::ClientCoreError;
use crate::transport::Transport;

/// Placeholder replaced with the nickname in identity templates.
pub const NICKNAME_PLACEHOLDER: &str = "{nickname}";

/// Default identity message: the server's nickname-change command.
pub const DEFAULT_HANDSHAKE_TEMPLATE: &str = "/nickname {nickname}";

/// Sends the one-time identity message right after a transport opens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeCoordinator {
	template: String,
}

impl HandshakeCoordinator {
	pub fn new(template: impl Into<String>) -> Result<Self, ClientCoreError> {
		let template = template.into();
		if !template.contains(NICKNAME_PLACEHOLDER) {
			return Err(ClientCoreError::Config(format!(
				"handshake template must contain {NICKNAME_PLACEHOLDER}: {template:?}"
			)));
		}
		Ok(Self { template })
	}

	pub fn identity_message(&self, nickname: &Nickname) -> String {
		self.template.replace(NICKNAME_PLACEHOLDER, nickname.as_str())
	}

	/// Send the identity message. Not gated on readiness and never retried.
	pub async fn register(&self, transport: &dyn Transport, nickname: &Nickname) -> Result<(), ClientCoreError> {
		let identity = self.identity_message(nickname);
		debug!(%nickname, "sending identity message");
		transport.send_text(identity).await
	}
}

impl Default for HandshakeCoordinator {
	fn default() -> Self {
		Self {
			template: DEFAULT_HANDSHAKE_TEMPLATE.to_string(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_template_formats_nick_command() {
		let hs = HandshakeCoordinator::default();
		let nick = Nickname::new("alice").unwrap();
		assert_eq!(hs.identity_message(&nick), "/nickname alice");
	}

	#[test]
	fn custom_template_replaces_every_placeholder() {
		let hs = HandshakeCoordinator::new("NICK {nickname} :{nickname}").unwrap();
		let nick = Nickname::new("bob").unwrap();
		assert_eq!(hs.identity_message(&nick), "NICK bob :bob");
	}

	#[test]
	fn template_without_placeholder_is_rejected() {
		let err = HandshakeCoordinator::new("/nickname").unwrap_err();
		assert!(matches!(err, ClientCoreError::Config(_)));
	}
}
