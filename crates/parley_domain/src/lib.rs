#![forbid(unsafe_code)]

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum nickname length, in characters.
pub const NICKNAME_MAX_CHARS: usize = 32;

/// Errors for parsing identifiers from strings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseIdError {
	#[error("empty value")]
	Empty,
	#[error("value too long: {len} characters (max {max})")]
	TooLong { len: usize, max: usize },
	#[error("unknown status: {0}")]
	UnknownStatus(String),
	#[error("invalid format: {0}")]
	InvalidFormat(String),
}

/// Connection status as reported to presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ConnectionStatus {
	Connecting,
	Reconnecting,
	Connected,
	Disconnected,
	FailedToConnect,
}

impl ConnectionStatus {
	/// Stable string identifier.
	pub const fn as_str(self) -> &'static str {
		match self {
			ConnectionStatus::Connecting => "connecting",
			ConnectionStatus::Reconnecting => "reconnecting",
			ConnectionStatus::Connected => "connected",
			ConnectionStatus::Disconnected => "disconnected",
			ConnectionStatus::FailedToConnect => "failed_to_connect",
		}
	}

	/// True when the status describes a live, usable connection.
	pub const fn is_connected(self) -> bool {
		matches!(self, ConnectionStatus::Connected)
	}
}

impl fmt::Display for ConnectionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for ConnectionStatus {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(ParseIdError::Empty);
		}

		match s.to_ascii_lowercase().as_str() {
			"connecting" => Ok(ConnectionStatus::Connecting),
			"reconnecting" => Ok(ConnectionStatus::Reconnecting),
			"connected" => Ok(ConnectionStatus::Connected),
			"disconnected" => Ok(ConnectionStatus::Disconnected),
			"failed_to_connect" | "failed" => Ok(ConnectionStatus::FailedToConnect),
			other => Err(ParseIdError::UnknownStatus(other.to_string())),
		}
	}
}

/// Chat identity registered with the server on every (re)connect.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Nickname(String);

impl Nickname {
	/// Create a validated `Nickname`. Surrounding whitespace is trimmed.
	pub fn new(nick: impl Into<String>) -> Result<Self, ParseIdError> {
		let nick = nick.into();
		let nick = nick.trim();
		if nick.is_empty() {
			return Err(ParseIdError::Empty);
		}

		let len = nick.chars().count();
		if len > NICKNAME_MAX_CHARS {
			return Err(ParseIdError::TooLong {
				len,
				max: NICKNAME_MAX_CHARS,
			});
		}

		if nick.chars().any(|c| c.is_whitespace() || c.is_control()) {
			return Err(ParseIdError::InvalidFormat(
				"nickname must not contain whitespace or control characters".into(),
			));
		}

		Ok(Self(nick.to_string()))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Nickname {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for Nickname {
	type Err = ParseIdError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Nickname::new(s)
	}
}

impl TryFrom<String> for Nickname {
	type Error = ParseIdError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Nickname::new(value)
	}
}

impl From<Nickname> for String {
	fn from(value: Nickname) -> Self {
		value.0
	}
}

#[cfg(test)]
mod tests {
	use proptest::prelude::*;

	use super::*;

	#[test]
	fn status_parse_and_display() {
		assert_eq!(
			"failed_to_connect".parse::<ConnectionStatus>().unwrap(),
			ConnectionStatus::FailedToConnect
		);
		assert_eq!(" Connected ".parse::<ConnectionStatus>().unwrap(), ConnectionStatus::Connected);
		assert_eq!(ConnectionStatus::Reconnecting.to_string(), "reconnecting");
		assert!("".parse::<ConnectionStatus>().is_err());
		assert!(matches!(
			"open".parse::<ConnectionStatus>(),
			Err(ParseIdError::UnknownStatus(_))
		));
	}

	#[test]
	fn only_connected_is_connected() {
		assert!(ConnectionStatus::Connected.is_connected());
		assert!(!ConnectionStatus::Connecting.is_connected());
		assert!(!ConnectionStatus::Disconnected.is_connected());
	}

	#[test]
	fn nickname_trims_and_validates() {
		let nick = Nickname::new("  alice ").unwrap();
		assert_eq!(nick.as_str(), "alice");
		assert_eq!(nick.to_string(), "alice");

		assert_eq!(Nickname::new("   "), Err(ParseIdError::Empty));
		assert!(matches!(Nickname::new("bob smith"), Err(ParseIdError::InvalidFormat(_))));
		assert!(matches!(Nickname::new("tab\there"), Err(ParseIdError::InvalidFormat(_))));
		assert!(matches!(
			Nickname::new("x".repeat(NICKNAME_MAX_CHARS + 1)),
			Err(ParseIdError::TooLong { .. })
		));
		assert!(Nickname::new("ü".repeat(NICKNAME_MAX_CHARS)).is_ok());
	}

	#[cfg(feature = "serde")]
	#[test]
	fn serde_uses_plain_strings() {
		let nick: Nickname = serde_json::from_str("\"carol\"").unwrap();
		assert_eq!(nick.as_str(), "carol");
		assert!(serde_json::from_str::<Nickname>("\"\"").is_err());

		let status = serde_json::to_string(&ConnectionStatus::FailedToConnect).unwrap();
		assert_eq!(status, "\"failed_to_connect\"");
	}

	proptest! {
		#[test]
		fn valid_nicknames_survive_parsing(nick in "[A-Za-z0-9_\\-\\[\\]]{1,32}") {
			let parsed = Nickname::new(nick.clone()).unwrap();
			prop_assert_eq!(parsed.as_str(), nick.as_str());
		}

		#[test]
		fn nicknames_with_inner_spaces_are_rejected(a in "[a-z]{1,10}", b in "[a-z]{1,10}") {
			let joined = format!("{a} {b}");
			prop_assert!(Nickname::new(joined).is_err());
		}

		#[test]
		fn status_strings_roundtrip(idx in 0usize..5) {
			let all = [
				ConnectionStatus::Connecting,
				ConnectionStatus::Reconnecting,
				ConnectionStatus::Connected,
				ConnectionStatus::Disconnected,
				ConnectionStatus::FailedToConnect,
			];
			let status = all[idx];
			prop_assert_eq!(status.as_str().parse::<ConnectionStatus>().unwrap(), status);
		}
	}
}
