#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use parley_client_core::{
	ClientConfig, ClientEvent, ConnectionState, ConnectionStatus, Nickname, start_connection_manager,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

static LOG_INIT: OnceLock<()> = OnceLock::new();

fn init_test_logging() {
	LOG_INIT.get_or_init(|| {
		if std::env::var_os("PARLEY_TEST_LOG").is_none() {
			return;
		}

		let _ = tracing_subscriber::fmt()
			.with_env_filter(std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_string()))
			.with_target(false)
			.try_init();
	});
}

/// Echo server. A text frame of `drop` makes it close that connection.
async fn spawn_echo_server() -> anyhow::Result<SocketAddr> {
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let addr = listener.local_addr()?;

	tokio::spawn(async move {
		while let Ok((stream, _)) = listener.accept().await {
			tokio::spawn(async move {
				let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
					return;
				};
				while let Some(Ok(msg)) = ws.next().await {
					match msg {
						Message::Text(text) if text.as_str() == "drop" => {
							let _ = ws.close(None).await;
							break;
						}
						Message::Text(text) => {
							if ws.send(Message::Text(text)).await.is_err() {
								break;
							}
						}
						Message::Close(_) => break,
						_ => {}
					}
				}
			});
		}
	});

	Ok(addr)
}

async fn next_event(events: &mut mpsc::UnboundedReceiver<ClientEvent>) -> ClientEvent {
	tokio::time::timeout(Duration::from_secs(5), events.recv())
		.await
		.expect("timed out waiting for client event")
		.expect("client event channel closed")
}

async fn expect_status(events: &mut mpsc::UnboundedReceiver<ClientEvent>, want: ConnectionStatus) {
	assert_eq!(next_event(events).await, ClientEvent::StatusChanged(want));
}

async fn expect_message(events: &mut mpsc::UnboundedReceiver<ClientEvent>, want: &str) {
	assert_eq!(next_event(events).await, ClientEvent::MessageReceived(want.to_string()));
}

#[tokio::test]
async fn websocket_round_trip_and_reconnect() -> anyhow::Result<()> {
	init_test_logging();

	let addr = spawn_echo_server().await?;
	let cfg = ClientConfig::from_server_url(&format!("ws://{addr}/chat"))?;
	let (controller, mut events, shutdown) = start_connection_manager(&cfg)?;

	controller.connect(Nickname::new("alice")?).await?;
	expect_status(&mut events, ConnectionStatus::Connecting).await;
	expect_status(&mut events, ConnectionStatus::Connected).await;
	expect_message(&mut events, "/nickname alice").await;

	controller.send("hello").await?;
	expect_message(&mut events, "hello").await;

	controller.send("drop").await?;
	expect_status(&mut events, ConnectionStatus::Disconnected).await;
	expect_status(&mut events, ConnectionStatus::Reconnecting).await;
	expect_status(&mut events, ConnectionStatus::Connected).await;
	expect_message(&mut events, "/nickname alice").await;

	controller.disconnect().await?;
	assert_eq!(controller.state(), ConnectionState::Closed);

	shutdown.shutdown().await;
	Ok(())
}

#[tokio::test]
async fn refused_connection_keeps_retrying_until_disconnect() -> anyhow::Result<()> {
	init_test_logging();

	// Reserve a port, then free it so nothing is listening.
	let addr = {
		let listener = TcpListener::bind("127.0.0.1:0").await?;
		listener.local_addr()?
	};

	let cfg = ClientConfig::from_server_url(&format!("ws://{addr}/chat"))?;
	let (controller, mut events, shutdown) = start_connection_manager(&cfg)?;

	controller.connect(Nickname::new("bob")?).await?;
	expect_status(&mut events, ConnectionStatus::Connecting).await;
	expect_status(&mut events, ConnectionStatus::FailedToConnect).await;
	expect_status(&mut events, ConnectionStatus::Reconnecting).await;
	expect_status(&mut events, ConnectionStatus::FailedToConnect).await;

	controller.disconnect().await?;
	assert_eq!(controller.state(), ConnectionState::Closed);

	// Anything still buffered was emitted before the disconnect; nothing follows it.
	while events.try_recv().is_ok() {}
	tokio::time::sleep(Duration::from_millis(100)).await;
	assert!(events.try_recv().is_err());

	shutdown.shutdown().await;
	Ok(())
}
