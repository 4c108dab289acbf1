use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parley_util::endpoint::ServerEndpoint;
use tokio::sync::mpsc;

use crate::error::ClientCoreError;

pub mod websocket;

pub use websocket::{WebSocketTransport, WebSocketTransportFactory};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type SharedTransport = Arc<dyn Transport>;

/// Close code reported when a connection ends without a close frame, or never opened.
pub const CLOSE_CODE_ABNORMAL: u16 = 1006;

/// Close code reported when the peer sent a close frame without a status.
pub const CLOSE_CODE_NO_STATUS: u16 = 1005;

/// Asynchronous events a transport reports back to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	Opened,
	/// Emitted exactly once per transport, including after a failed open.
	Closed {
		code: u16,
	},
	Message(Bytes),
}

/// A transport event tagged with the generation of the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEnvelope {
	pub generation: u64,
	pub event: TransportEvent,
}

/// Bidirectional text-message channel.
///
/// Implementations report open/close/message through the [`TransportEventSink`]
/// they were created with. `open` must result in a `Closed` event when it fails.
pub trait Transport: Send + Sync {
	fn open(&self) -> BoxFuture<'_, Result<(), ClientCoreError>>;

	fn send_text(&self, text: String) -> BoxFuture<'_, Result<(), ClientCoreError>>;

	/// Graceful close of an open connection.
	fn close(&self) -> BoxFuture<'_, Result<(), ClientCoreError>>;

	/// Abort without a graceful close (in-flight connect or open connection).
	fn cancel_connection(&self);
}

/// Creates one transport per session.
pub trait TransportFactory: Send + 'static {
	fn create(&mut self, endpoint: &ServerEndpoint, sink: TransportEventSink) -> SharedTransport;
}

/// Event handlers registered for a single session.
///
/// Every event is tagged with the session generation. Once the matching
/// [`HandlerRegistration`] is detached, events are dropped at the source.
#[derive(Debug, Clone)]
pub struct TransportEventSink {
	generation: u64,
	tx: mpsc::UnboundedSender<TransportEnvelope>,
	attached: Arc<AtomicBool>,
}

impl TransportEventSink {
	pub fn generation(&self) -> u64 {
		self.generation
	}

	pub fn is_attached(&self) -> bool {
		self.attached.load(Ordering::Acquire)
	}

	/// Deliver an event to the owner. Returns false when it was dropped.
	pub fn emit(&self, event: TransportEvent) -> bool {
		if !self.is_attached() {
			return false;
		}

		self.tx
			.send(TransportEnvelope {
				generation: self.generation,
				event,
			})
			.is_ok()
	}
}

/// Owner side of a [`TransportEventSink`].
#[derive(Debug)]
pub struct HandlerRegistration {
	attached: Arc<AtomicBool>,
}

impl HandlerRegistration {
	pub fn detach(&self) {
		self.attached.store(false, Ordering::Release);
	}

	pub fn is_attached(&self) -> bool {
		self.attached.load(Ordering::Acquire)
	}
}

impl Drop for HandlerRegistration {
	fn drop(&mut self) {
		self.detach();
	}
}

/// Register the open/close/message handlers for one session generation.
pub fn register_handlers(
	generation: u64,
	tx: mpsc::UnboundedSender<TransportEnvelope>,
) -> (TransportEventSink, HandlerRegistration) {
	let attached = Arc::new(AtomicBool::new(true));
	let sink = TransportEventSink {
		generation,
		tx,
		attached: Arc::clone(&attached),
	};
	(sink, HandlerRegistration { attached })
}
