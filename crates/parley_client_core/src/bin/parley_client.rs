#![forbid(unsafe_code)]

use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context as _;
use parley_client_core::config::DEFAULT_SERVER_URL;
use parley_client_core::{
	ClientEvent, ConnectionStatus, Nickname, load_client_config, load_client_config_from_path, start_connection_manager,
};
use parley_util::endpoint::ServerEndpoint;
use tokio::io::{AsyncBufReadExt as _, BufReader};
use tracing::{info, warn};

fn usage_and_exit() -> ! {
	eprintln!(
		"Usage: parley_client [--connect ws://host:port/path] [--nick name] [--config path]\n\
\n\
Options:\n\
	--connect   Server endpoint (alias: --endpoint) (default: {DEFAULT_SERVER_URL})\n\
	            Format: ws://host:port[/path] or wss://host:port[/path]\n\
	--endpoint  Alias for --connect\n\
	--nick      Nickname to register after connecting (required unless configured)\n\
	--config    Config file (default: ~/.parley/config.toml)\n\
	--help      Show this help\n\
\n\
Notes:\n\
	Each line read from stdin is sent as a chat message; /clear clears the screen locally.\n\
	The connection is re-established automatically until stdin closes.\n\
\n\
Examples:\n\
	parley_client --connect ws://127.0.0.1:18203/chat --nick alice\n\
	parley_client --config ./parley.toml\n"
	);
	std::process::exit(2)
}

fn init_tracing() {
	let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info,parley_client_core=debug".to_string());
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_target(false)
		.with_writer(std::io::stderr)
		.init();
}

struct Args {
	endpoint: Option<ServerEndpoint>,
	nickname: Option<Nickname>,
	config_path: Option<PathBuf>,
}

fn parse_args() -> Args {
	let mut args = Args {
		endpoint: None,
		nickname: None,
		config_path: None,
	};

	let mut it = std::env::args().skip(1);
	while let Some(arg) = it.next() {
		match arg.as_str() {
			"--help" | "-h" => usage_and_exit(),
			"--connect" | "--endpoint" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				let endpoint = ServerEndpoint::parse(&v).unwrap_or_else(|e| {
					eprintln!("Invalid --connect value: {v}\n{e}");
					usage_and_exit()
				});
				args.endpoint = Some(endpoint);
			}
			"--nick" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				let nickname = Nickname::new(&v).unwrap_or_else(|e| {
					eprintln!("Invalid --nick value: {v:?}\n{e}");
					usage_and_exit()
				});
				args.nickname = Some(nickname);
			}
			"--config" => {
				let v = it.next().unwrap_or_else(|| usage_and_exit());
				if v.trim().is_empty() {
					eprintln!("--config must be non-empty");
					usage_and_exit();
				}
				args.config_path = Some(PathBuf::from(v));
			}
			other => {
				eprintln!("Unknown argument: {other}");
				usage_and_exit();
			}
		}
	}

	args
}

/// Clears the local transcript; never sent to the server.
const CLEAR_COMMAND: &str = "/clear";

/// What to do with one line typed by the user.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
	Skip,
	Clear,
	Send(&'a str),
}

fn classify_input(line: &str) -> Input<'_> {
	let line = line.trim_end();
	if line.is_empty() {
		Input::Skip
	} else if line == CLEAR_COMMAND {
		Input::Clear
	} else {
		Input::Send(line)
	}
}

fn print_event(ev: &ClientEvent) {
	match ev {
		ClientEvent::StatusChanged(status) if status.is_connected() => info!("connected"),
		ClientEvent::StatusChanged(status @ (ConnectionStatus::Connecting | ConnectionStatus::Reconnecting)) => {
			info!(%status, "connecting")
		}
		ClientEvent::StatusChanged(status) => warn!(%status, "connection lost"),
		ClientEvent::MessageReceived(text) => println!("{text}"),
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	init_tracing();
	let args = parse_args();

	let mut cfg = match &args.config_path {
		Some(path) => load_client_config_from_path(path)?,
		None => load_client_config()?,
	};
	if let Some(endpoint) = args.endpoint {
		cfg.endpoint = endpoint;
	}
	if let Some(nickname) = args.nickname {
		cfg.nickname = Some(nickname);
	}

	let Some(nickname) = cfg.nickname.clone() else {
		eprintln!("A nickname is required (--nick, PARLEY_NICKNAME or config file)");
		usage_and_exit();
	};

	info!(endpoint = %cfg.endpoint, %nickname, "starting parley client");

	let (controller, mut events, shutdown) = start_connection_manager(&cfg).context("start connection manager")?;
	controller.connect(nickname).await.context("connect")?;

	let mut lines = BufReader::new(tokio::io::stdin()).lines();

	loop {
		tokio::select! {
			_ = tokio::signal::ctrl_c() => {
				info!("interrupted");
				break;
			}

			ev = events.recv() => {
				let Some(ev) = ev else {
					warn!("connection manager stopped");
					break;
				};
				print_event(&ev);
			}

			line = lines.next_line() => {
				match line.context("read stdin")? {
					Some(line) => match classify_input(&line) {
						Input::Skip => {}
						Input::Clear => {
							// ANSI: erase screen, cursor home.
							print!("\x1b[2J\x1b[H");
							let _ = std::io::stdout().flush();
						}
						Input::Send(text) => controller.send(text).await?,
					},
					None => {
						info!("stdin closed");
						break;
					}
				}
			}
		}
	}

	controller.disconnect().await?;
	shutdown.shutdown().await;
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn clear_is_handled_locally() {
		assert_eq!(classify_input("/clear"), Input::Clear);
		assert_eq!(classify_input("/clear\r"), Input::Clear);
		assert_eq!(classify_input("/clear all"), Input::Send("/clear all"));
	}

	#[test]
	fn blank_lines_are_skipped_and_text_is_sent() {
		assert_eq!(classify_input(""), Input::Skip);
		assert_eq!(classify_input("   "), Input::Skip);
		assert_eq!(classify_input("hello  "), Input::Send("hello"));
		assert_eq!(classify_input("/nickname bob"), Input::Send("/nickname bob"));
	}
}
