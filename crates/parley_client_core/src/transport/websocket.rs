use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use parley_util::endpoint::ServerEndpoint;
use tokio::net::TcpStream;
use tokio::task::{AbortHandle, JoinHandle};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{
	BoxFuture, CLOSE_CODE_ABNORMAL, CLOSE_CODE_NO_STATUS, SharedTransport, Transport, TransportEvent, TransportEventSink,
	TransportFactory,
};
use crate::error::ClientCoreError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

#[derive(Debug, Default)]
struct TaskHandles {
	connect: Option<AbortHandle>,
	reader: Option<JoinHandle<()>>,
	cancelled: bool,
}

/// [`Transport`] over a WebSocket connection (`tokio-tungstenite`).
pub struct WebSocketTransport {
	url: String,
	sink: TransportEventSink,
	writer: tokio::sync::Mutex<Option<WsWriter>>,
	tasks: parking_lot::Mutex<TaskHandles>,
	closed_emitted: Arc<AtomicBool>,
}

impl WebSocketTransport {
	pub fn new(url: impl Into<String>, sink: TransportEventSink) -> Self {
		Self {
			url: url.into(),
			sink,
			writer: tokio::sync::Mutex::new(None),
			tasks: parking_lot::Mutex::new(TaskHandles::default()),
			closed_emitted: Arc::new(AtomicBool::new(false)),
		}
	}

	fn emit_closed(&self, code: u16) {
		emit_closed_once(&self.sink, &self.closed_emitted, code);
	}
}

fn emit_closed_once(sink: &TransportEventSink, closed_emitted: &AtomicBool, code: u16) {
	if !closed_emitted.swap(true, Ordering::AcqRel) {
		sink.emit(TransportEvent::Closed { code });
	}
}

impl Transport for WebSocketTransport {
	fn open(&self) -> BoxFuture<'_, Result<(), ClientCoreError>> {
		Box::pin(async move {
			let generation = self.sink.generation();
			let url = self.url.clone();

			let connect = {
				let mut tasks = self.tasks.lock();
				if tasks.cancelled {
					drop(tasks);
					self.emit_closed(CLOSE_CODE_ABNORMAL);
					return Err(ClientCoreError::TransportOpen("connection cancelled".to_string()));
				}
				let connect = tokio::spawn(async move { tokio_tungstenite::connect_async(url).await });
				tasks.connect = Some(connect.abort_handle());
				connect
			};

			info!(generation, url = %self.url, "opening websocket");

			let ws = match connect.await {
				Ok(Ok((ws, _resp))) => ws,
				Ok(Err(e)) => {
					self.emit_closed(CLOSE_CODE_ABNORMAL);
					return Err(ClientCoreError::TransportOpen(format!("connect {}: {e}", self.url)));
				}
				Err(_) => {
					self.emit_closed(CLOSE_CODE_ABNORMAL);
					return Err(ClientCoreError::TransportOpen("connection cancelled".to_string()));
				}
			};

			let (writer, reader) = ws.split();

			let mut tasks = self.tasks.lock();
			tasks.connect = None;
			if tasks.cancelled {
				drop(tasks);
				self.emit_closed(CLOSE_CODE_ABNORMAL);
				return Err(ClientCoreError::TransportOpen("connection cancelled".to_string()));
			}

			match self.writer.try_lock() {
				Ok(mut slot) => *slot = Some(writer),
				Err(_) => warn!(generation, "websocket writer busy during open; sends will fail"),
			}

			// Opened must reach the owner before any message the reader forwards.
			self.sink.emit(TransportEvent::Opened);
			tasks.reader = Some(tokio::spawn(read_loop(
				reader,
				self.sink.clone(),
				Arc::clone(&self.closed_emitted),
			)));

			debug!(generation, "websocket open");
			Ok(())
		})
	}

	fn send_text(&self, text: String) -> BoxFuture<'_, Result<(), ClientCoreError>> {
		Box::pin(async move {
			let mut guard = self.writer.lock().await;
			let writer = guard
				.as_mut()
				.ok_or_else(|| ClientCoreError::TransportSend("websocket is not open".to_string()))?;

			writer
				.send(Message::Text(text.into()))
				.await
				.map_err(|e| ClientCoreError::TransportSend(e.to_string()))
		})
	}

	fn close(&self) -> BoxFuture<'_, Result<(), ClientCoreError>> {
		Box::pin(async move {
			let writer = self.writer.lock().await.take();
			let Some(mut writer) = writer else {
				return Err(ClientCoreError::TransportClose("websocket is not open".to_string()));
			};

			let res = writer
				.close()
				.await
				.map_err(|e| ClientCoreError::TransportClose(e.to_string()));

			let reader = self.tasks.lock().reader.take();
			if let Some(reader) = reader {
				if res.is_ok() {
					// The reader ends once the peer acknowledges the close frame.
					let _ = reader.await;
				} else {
					reader.abort();
				}
			}

			res
		})
	}

	fn cancel_connection(&self) {
		{
			let mut tasks = self.tasks.lock();
			tasks.cancelled = true;
			if let Some(connect) = tasks.connect.take() {
				connect.abort();
			}
			if let Some(reader) = tasks.reader.take() {
				reader.abort();
			}
		}

		if let Ok(mut slot) = self.writer.try_lock() {
			slot.take();
		}

		debug!(generation = self.sink.generation(), "websocket connection cancelled");
	}
}

impl Drop for WebSocketTransport {
	fn drop(&mut self) {
		let tasks = self.tasks.get_mut();
		if let Some(connect) = tasks.connect.take() {
			connect.abort();
		}
		if let Some(reader) = tasks.reader.take() {
			reader.abort();
		}
	}
}

async fn read_loop(mut reader: WsReader, sink: TransportEventSink, closed_emitted: Arc<AtomicBool>) {
	let generation = sink.generation();
	let mut code = CLOSE_CODE_ABNORMAL;

	while let Some(msg) = reader.next().await {
		match msg {
			Ok(Message::Text(text)) => {
				sink.emit(TransportEvent::Message(Bytes::copy_from_slice(text.as_bytes())));
			}
			Ok(Message::Binary(data)) => {
				sink.emit(TransportEvent::Message(data));
			}
			Ok(Message::Close(frame)) => {
				code = frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_CODE_NO_STATUS);
				debug!(generation, code, "websocket close frame received");
			}
			Ok(_) => {}
			Err(e) => {
				warn!(generation, error = %e, "websocket read failed");
				break;
			}
		}
	}

	debug!(generation, code, "websocket reader finished");
	emit_closed_once(&sink, &closed_emitted, code);
}

/// Creates a [`WebSocketTransport`] per session.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketTransportFactory;

impl TransportFactory for WebSocketTransportFactory {
	fn create(&mut self, endpoint: &ServerEndpoint, sink: TransportEventSink) -> SharedTransport {
		Arc::new(WebSocketTransport::new(endpoint.url(), sink))
	}
}
