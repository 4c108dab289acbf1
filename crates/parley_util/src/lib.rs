#![forbid(unsafe_code)]

pub mod endpoint {
	use core::fmt;

	/// Parsed `ws://host:port[/path]` or `wss://host:port[/path]` endpoint.
	#[derive(Debug, Clone, PartialEq, Eq, Hash)]
	pub struct ServerEndpoint {
		/// `true` for `wss://`.
		pub secure: bool,
		pub host: String,
		pub port: u16,
		/// Request path, always starting with `/`.
		pub path: String,
	}

	impl ServerEndpoint {
		/// Returns `host:port` (host preserved, IPv6 stays bracketed).
		pub fn hostport(&self) -> String {
			format!("{}:{}", self.host, self.port)
		}

		pub fn scheme(&self) -> &'static str {
			if self.secure { "wss" } else { "ws" }
		}

		/// Full URL suitable for a WebSocket client.
		pub fn url(&self) -> String {
			format!("{}://{}{}", self.scheme(), self.hostport(), self.path)
		}

		/// Parse an endpoint string in the form `ws://host:port[/path]`.
		pub fn parse(s: &str) -> Result<Self, String> {
			let s = s.trim();
			if s.is_empty() {
				return Err("endpoint must be non-empty (expected ws://host:port[/path])".to_string());
			}

			let (secure, rest) = if let Some(rest) = s.strip_prefix("wss://") {
				(true, rest)
			} else if let Some(rest) = s.strip_prefix("ws://") {
				(false, rest)
			} else {
				return Err(format!("invalid endpoint scheme (expected ws:// or wss://): {s}"));
			};

			if rest.contains('?') || rest.contains('#') {
				return Err(format!("invalid endpoint (query/fragment not allowed): {s}"));
			}

			let (authority, path) = match rest.find('/') {
				Some(idx) => (&rest[..idx], &rest[idx..]),
				None => (rest, "/"),
			};

			let (host, port_str) = authority
				.rsplit_once(':')
				.ok_or_else(|| format!("invalid endpoint (missing :port, expected ws://host:port[/path]): {s}"))?;

			let host = host.trim();
			if host.is_empty() {
				return Err(format!("invalid endpoint host (expected ws://host:port[/path]): {s}"));
			}

			if host.contains(':') && !(host.starts_with('[') && host.ends_with(']')) {
				return Err(format!(
					"invalid endpoint host (IPv6 must be bracketed like ws://[::1]:18203): {s}"
				));
			}

			let port: u16 = port_str
				.trim()
				.parse()
				.map_err(|_| format!("invalid endpoint port (expected 1..=65535): {s}"))?;

			if port == 0 {
				return Err(format!("invalid endpoint port (expected 1..=65535): {s}"));
			}

			Ok(Self {
				secure,
				host: host.to_string(),
				port,
				path: path.to_string(),
			})
		}
	}

	impl fmt::Display for ServerEndpoint {
		fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
			f.write_str(&self.url())
		}
	}

	/// Validate `ws://host:port[/path]`.
	pub fn validate_server_endpoint(s: &str) -> Result<(), String> {
		let _ = ServerEndpoint::parse(s)?;
		Ok(())
	}

	#[cfg(test)]
	mod tests {
		use proptest::prelude::*;

		use super::*;

		#[test]
		fn parses_dns_hostname_with_path() {
			let e = ServerEndpoint::parse("wss://chat.example.com:443/socket").unwrap();
			assert!(e.secure);
			assert_eq!(e.host, "chat.example.com");
			assert_eq!(e.port, 443);
			assert_eq!(e.path, "/socket");
			assert_eq!(e.url(), "wss://chat.example.com:443/socket");
		}

		#[test]
		fn missing_path_defaults_to_root() {
			let e = ServerEndpoint::parse("ws://127.0.0.1:18203").unwrap();
			assert!(!e.secure);
			assert_eq!(e.path, "/");
			assert_eq!(e.hostport(), "127.0.0.1:18203");
			assert_eq!(e.to_string(), "ws://127.0.0.1:18203/");
		}

		#[test]
		fn parses_bracketed_ipv6() {
			let e = ServerEndpoint::parse("ws://[::1]:18203/chat").unwrap();
			assert_eq!(e.host, "[::1]");
			assert_eq!(e.hostport(), "[::1]:18203");
		}

		#[test]
		fn rejects_unbracketed_ipv6() {
			let err = ServerEndpoint::parse("ws://::1:18203").unwrap_err();
			assert!(err.to_lowercase().contains("ipv6"));
		}

		#[test]
		fn rejects_other_schemes_and_query_fragment() {
			assert!(ServerEndpoint::parse("http://127.0.0.1:80").is_err());
			assert!(ServerEndpoint::parse("quic://127.0.0.1:18203").is_err());
			assert!(ServerEndpoint::parse("ws://127.0.0.1:18203/chat?x=y").is_err());
			assert!(ServerEndpoint::parse("ws://127.0.0.1:18203#frag").is_err());
		}

		#[test]
		fn rejects_port_zero_and_missing_port() {
			assert!(ServerEndpoint::parse("ws://127.0.0.1:0").is_err());
			assert!(ServerEndpoint::parse("ws://127.0.0.1/chat").is_err());
			assert!(ServerEndpoint::parse("ws://:80").is_err());
			assert!(validate_server_endpoint("   ").is_err());
		}

		proptest! {
			#[test]
			fn parsed_url_reparses_to_same_endpoint(
				secure in any::<bool>(),
				host in "[a-z][a-z0-9\\-]{0,20}(\\.[a-z]{2,6})?",
				port in 1u16..=u16::MAX,
				path in "(/[a-z0-9_]{1,8}){0,3}",
			) {
				let scheme = if secure { "wss" } else { "ws" };
				let raw = format!("{scheme}://{host}:{port}{path}");
				let parsed = ServerEndpoint::parse(&raw).unwrap();
				prop_assert_eq!(parsed.port, port);
				prop_assert_eq!(ServerEndpoint::parse(&parsed.url()).unwrap(), parsed);
			}
		}
	}
}
