// Following a submission until it has a result. Status arrives either by
// polling GET /emails/{id} or through the local callback listener; both
// feed the same loop, which stops at the first update carrying a url.

use crate::api::{ApiClient, Outcome, StatusResult};
use crate::error::{Error, Result};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

pub const POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const THROTTLE_BACKOFF: Duration = Duration::from_millis(200);

/// One status report. Callbacks are numbered in arrival order from 1;
/// polled results carry no number.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub sequence: Option<usize>,
    pub result: StatusResult,
}

/// Where status updates come from.
pub trait StatusSource {
    /// Block until the next update, or return `Ok(None)` once `deadline`
    /// passes. Events that are not updates go to `observer`.
    fn next_update(
        &mut self,
        deadline: Instant,
        observer: &mut dyn Observer,
    ) -> Result<Option<StatusUpdate>>;
}

/// Receives progress while a submission is followed.
pub trait Observer {
    fn update(&mut self, update: &StatusUpdate);

    /// The server asked us to slow down.
    fn throttled(&mut self) {}

    /// A callback request was refused or could not be decoded.
    fn callback_error(&mut self, _message: &str) {}
}

/// Drain `source` until an update has a url, handing every update to
/// `observer` on the way. Returns the result url.
pub fn follow<S>(source: &mut S, observer: &mut dyn Observer, deadline: Instant) -> Result<String>
where
    S: StatusSource + ?Sized,
{
    while let Some(update) = source.next_update(deadline, observer)? {
        observer.update(&update);
        if let Some(url) = update.result.finished_url() {
            debug!(id = %update.result.id, %url, "processing finished");
            return Ok(url.to_string());
        }
    }
    Err(Error::TimedOut)
}

/// Polls the API for the status of one submission.
pub struct Poller<'a> {
    client: &'a ApiClient,
    id: String,
    interval: Duration,
    backoff: Duration,
    polled: bool,
}

impl<'a> Poller<'a> {
    pub fn new(client: &'a ApiClient, id: &str) -> Self {
        Poller {
            client,
            id: id.to_string(),
            interval: POLL_INTERVAL,
            backoff: THROTTLE_BACKOFF,
            polled: false,
        }
    }

    pub fn with_interval(mut self, interval: Duration, backoff: Duration) -> Self {
        self.interval = interval;
        self.backoff = backoff;
        self
    }
}

/// Sleep for `wait`, or until `deadline` if that comes first. Returns
/// false when the deadline has been reached.
fn sleep_until(wait: Duration, deadline: Instant) -> bool {
    let now = Instant::now();
    if now >= deadline {
        return false;
    }
    thread::sleep(wait.min(deadline - now));
    Instant::now() < deadline
}

impl StatusSource for Poller<'_> {
    fn next_update(
        &mut self,
        deadline: Instant,
        observer: &mut dyn Observer,
    ) -> Result<Option<StatusUpdate>> {
        if self.polled && !sleep_until(self.interval, deadline) {
            return Ok(None);
        }
        self.polled = true;
        loop {
            if Instant::now() >= deadline {
                return Ok(None);
            }
            match self.client.email_status(&self.id)? {
                Outcome::Success(result) => {
                    return Ok(Some(StatusUpdate {
                        sequence: None,
                        result,
                    }))
                }
                Outcome::Throttled => {
                    debug!(id = %self.id, "throttled, sleeping");
                    observer.throttled();
                    if !sleep_until(self.backoff, deadline) {
                        return Ok(None);
                    }
                }
                Outcome::Failed(failure) => {
                    return Err(Error::Rejected {
                        status: failure.status,
                        message: failure.message.map(|m| m.message),
                    })
                }
            }
        }
    }
}

/// What the callback listener forwards for each request it handles.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackEvent {
    Update(StatusUpdate),
    Invalid(String),
}

/// Events forwarded by the callback listener.
pub struct CallbackSource {
    rx: Receiver<CallbackEvent>,
}

impl CallbackSource {
    pub fn new(rx: Receiver<CallbackEvent>) -> Self {
        CallbackSource { rx }
    }
}

impl StatusSource for CallbackSource {
    fn next_update(
        &mut self,
        deadline: Instant,
        observer: &mut dyn Observer,
    ) -> Result<Option<StatusUpdate>> {
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(wait) {
                Ok(CallbackEvent::Update(update)) => return Ok(Some(update)),
                Ok(CallbackEvent::Invalid(message)) => observer.callback_error(&message),
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Callback(
                        "listener stopped before a result arrived".to_string(),
                    ))
                }
            }
        }
    }
}
