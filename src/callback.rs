// Local HTTP listener for progress callbacks. The service POSTs a
// `StatusResult` to the advertised url every time a submission makes
// progress. The listener runs axum on its own single-threaded runtime so
// the rest of the tool can stay blocking.

use crate::api::StatusResult;
use crate::error::{Error, Result};
use crate::status::{CallbackEvent, CallbackSource, Observer, StatusSource, StatusUpdate};
use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

pub const CALLBACK_PATH: &str = "/callback";

struct CallbackState {
    tx: Mutex<Sender<CallbackEvent>>,
    received: AtomicUsize,
    shutdown: Arc<Notify>,
}

impl CallbackState {
    fn forward(&self, event: CallbackEvent) {
        let sent = self
            .tx
            .lock()
            .map(|tx| tx.send(event).is_ok())
            .unwrap_or(false);
        if !sent {
            debug!("callback arrived after the receiver went away");
        }
    }

    fn reject(&self, status: StatusCode, reason: String) -> Response {
        debug!("{reason}");
        let body = reason.clone();
        self.forward(CallbackEvent::Invalid(reason));
        (status, body).into_response()
    }
}

/// A running callback listener. Dropping it stops the server.
pub struct CallbackListener {
    url: String,
    local_addr: SocketAddr,
    shutdown: Arc<Notify>,
    thread: Option<JoinHandle<()>>,
    source: CallbackSource,
}

impl CallbackListener {
    /// Listen on `addr` (`host:port`). The socket is bound before this
    /// returns, so the address is usable as soon as the call succeeds.
    pub fn bind(addr: &str) -> Result<Self> {
        let socket = std::net::TcpListener::bind(addr)
            .map_err(|e| Error::Callback(format!("failed to listen on {addr}: {e}")))?;
        socket.set_nonblocking(true)?;
        let local_addr = socket.local_addr()?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let (tx, rx) = mpsc::channel();
        let shutdown = Arc::new(Notify::new());
        let state = Arc::new(CallbackState {
            tx: Mutex::new(tx),
            received: AtomicUsize::new(0),
            shutdown: Arc::clone(&shutdown),
        });
        let stop = Arc::clone(&shutdown);

        let thread = thread::Builder::new()
            .name("callback-listener".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    let listener = match tokio::net::TcpListener::from_std(socket) {
                        Ok(listener) => listener,
                        Err(e) => {
                            warn!("callback listener failed to start: {e}");
                            return;
                        }
                    };
                    let app = Router::new()
                        .route(CALLBACK_PATH, any(receive))
                        .with_state(state);
                    info!(address = %local_addr, "callback listener started");
                    let served = axum::serve(listener, app)
                        .with_graceful_shutdown(async move { stop.notified().await })
                        .await;
                    if let Err(e) = served {
                        warn!("callback listener failed: {e}");
                    }
                    info!("callback listener stopped");
                });
            })?;

        Ok(CallbackListener {
            url: format!("http://{addr}{CALLBACK_PATH}"),
            local_addr,
            shutdown,
            thread: Some(thread),
            source: CallbackSource::new(rx),
        })
    }

    /// The url to hand to the service as progress and finished url.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The address actually bound, useful when port 0 was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl StatusSource for CallbackListener {
    fn next_update(
        &mut self,
        deadline: Instant,
        observer: &mut dyn Observer,
    ) -> Result<Option<StatusUpdate>> {
        self.source.next_update(deadline, observer)
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        self.shutdown.notify_one();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

async fn receive(
    State(state): State<Arc<CallbackState>>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let sequence = state.received.fetch_add(1, Ordering::SeqCst) + 1;

    if method != Method::POST {
        return state.reject(
            StatusCode::BAD_REQUEST,
            format!("Expected POST to callback, not {method}"),
        );
    }
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let mime = content_type.split(';').next().unwrap_or_default().trim();
    if !mime.eq_ignore_ascii_case("application/json") {
        return state.reject(
            StatusCode::BAD_REQUEST,
            format!("Expected application/json callback, not {content_type}"),
        );
    }

    match serde_json::from_slice::<StatusResult>(&body) {
        Ok(result) => {
            debug!(sequence, id = %result.id, "callback received");
            let finished = result.finished_url().is_some();
            state.forward(CallbackEvent::Update(StatusUpdate {
                sequence: Some(sequence),
                result,
            }));
            if finished {
                state.shutdown.notify_one();
            }
        }
        Err(e) => {
            let reason = format!("Failed to unmarshal callback: {e}");
            debug!("{reason}");
            state.forward(CallbackEvent::Invalid(reason));
        }
    }
    StatusCode::OK.into_response()
}
