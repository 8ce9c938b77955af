use aboutmyemail::api::{ApiClient, StatusResult};
use aboutmyemail::callback::CallbackListener;
use aboutmyemail::status::{follow, Observer, Poller, StatusUpdate};
use aboutmyemail::Error;
use httpmock::prelude::*;
use serde_json::json;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Recorder {
    updates: Vec<StatusUpdate>,
    throttles: usize,
    callback_errors: Vec<String>,
}

impl Observer for Recorder {
    fn update(&mut self, update: &StatusUpdate) {
        self.updates.push(update.clone());
    }

    fn throttled(&mut self) {
        self.throttles += 1;
    }

    fn callback_error(&mut self, message: &str) {
        self.callback_errors.push(message.to_string());
    }
}

fn deadline(secs: u64) -> Instant {
    Instant::now() + Duration::from_secs(secs)
}

#[test]
fn poller_returns_result_url() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/emails/abc");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "id": "abc",
                "messages": ["Finished"],
                "url": "http://127.0.0.1:3000/abc",
            }));
    });

    let client = ApiClient::new(&server.url("/api/v1"), "").unwrap();
    let mut recorder = Recorder::default();
    let mut poller = Poller::new(&client, "abc");
    let url = follow(&mut poller, &mut recorder, deadline(5)).unwrap();

    assert_eq!(url, "http://127.0.0.1:3000/abc");
    mock.assert_hits(1);
    assert_eq!(recorder.updates.len(), 1);
    assert_eq!(recorder.updates[0].sequence, None);
}

#[test]
fn poller_keeps_polling_until_deadline() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/emails/slow");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "id": "slow", "messages": ["Waiting"] }));
    });

    let client = ApiClient::new(&server.url("/api/v1"), "").unwrap();
    let mut recorder = Recorder::default();
    let mut poller = Poller::new(&client, "slow")
        .with_interval(Duration::from_millis(50), Duration::from_millis(10));
    let result = follow(
        &mut poller,
        &mut recorder,
        Instant::now() + Duration::from_millis(400),
    );

    assert!(matches!(result, Err(Error::TimedOut)));
    assert!(mock.hits() >= 2);
    assert_eq!(recorder.updates.len(), mock.hits());
}

#[test]
fn poller_backs_off_when_throttled() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/emails/busy");
        then.status(429);
    });

    let client = ApiClient::new(&server.url("/api/v1"), "").unwrap();
    let mut recorder = Recorder::default();
    let mut poller = Poller::new(&client, "busy")
        .with_interval(Duration::from_millis(50), Duration::from_millis(20));
    let result = follow(
        &mut poller,
        &mut recorder,
        Instant::now() + Duration::from_millis(300),
    );

    assert!(matches!(result, Err(Error::TimedOut)));
    assert!(recorder.throttles >= 2);
    assert!(recorder.updates.is_empty());
}

#[test]
fn poller_stops_on_rejection() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/emails/missing");
        then.status(404)
            .header("content-type", "application/json")
            .json_body(json!({ "message": "not found" }));
    });

    let client = ApiClient::new(&server.url("/api/v1"), "").unwrap();
    let mut recorder = Recorder::default();
    let result = follow(&mut Poller::new(&client, "missing"), &mut recorder, deadline(5));
    match result {
        Err(Error::Rejected { status, message }) => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(message.as_deref(), Some("not found"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn callback_url_uses_given_address() {
    let listener = CallbackListener::bind("127.0.0.1:0").unwrap();
    assert_eq!(listener.url(), "http://127.0.0.1:0/callback");
    assert_ne!(listener.local_addr().port(), 0);
}

#[test]
fn callback_bind_failure_is_reported() {
    let first = CallbackListener::bind("127.0.0.1:0").unwrap();
    let taken = first.local_addr().to_string();
    assert!(matches!(
        CallbackListener::bind(&taken),
        Err(Error::Callback(_))
    ));
}

#[test]
fn callbacks_are_numbered_until_finished() {
    let mut listener = CallbackListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/callback", listener.local_addr());
    let http = reqwest::blocking::Client::new();

    let progress = StatusResult {
        id: "abc".into(),
        messages: Some(vec!["Connecting".into()]),
        ..Default::default()
    };
    let finished = StatusResult {
        id: "abc".into(),
        messages: Some(vec!["Done".into()]),
        token: Some("banana".into()),
        url: Some("http://127.0.0.1:3000/abc".into()),
    };
    for body in [&progress, &finished] {
        let res = http.post(&url).json(body).send().unwrap();
        assert_eq!(res.status().as_u16(), 200);
    }

    let mut recorder = Recorder::default();
    let result_url = follow(&mut listener, &mut recorder, deadline(5)).unwrap();
    assert_eq!(result_url, "http://127.0.0.1:3000/abc");
    assert_eq!(recorder.updates.len(), 2);
    assert_eq!(recorder.updates[0].sequence, Some(1));
    assert_eq!(recorder.updates[0].result, progress);
    assert_eq!(recorder.updates[1].sequence, Some(2));
    assert_eq!(recorder.updates[1].result.token.as_deref(), Some("banana"));
}

#[test]
fn invalid_callbacks_are_refused() {
    let mut listener = CallbackListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/callback", listener.local_addr());
    let http = reqwest::blocking::Client::new();

    let res = http.get(&url).send().unwrap();
    assert_eq!(res.status().as_u16(), 400);

    let res = http
        .post(&url)
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .unwrap();
    assert_eq!(res.status().as_u16(), 400);

    // Accepted at the HTTP level, but not a status result.
    let res = http
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let res = http
        .post(&url)
        .json(&json!({ "id": "abc", "url": "http://127.0.0.1:3000/abc" }))
        .send()
        .unwrap();
    assert_eq!(res.status().as_u16(), 200);

    let mut recorder = Recorder::default();
    follow(&mut listener, &mut recorder, deadline(5)).unwrap();
    assert_eq!(recorder.callback_errors.len(), 3);
    assert!(recorder.callback_errors[0].contains("Expected POST"));
    assert!(recorder.callback_errors[1].contains("application/json"));
    assert_eq!(recorder.updates.len(), 1);
    assert_eq!(recorder.updates[0].sequence, Some(4));
}

#[test]
fn callback_wait_times_out() {
    let mut listener = CallbackListener::bind("127.0.0.1:0").unwrap();
    let mut recorder = Recorder::default();
    let result = follow(
        &mut listener,
        &mut recorder,
        Instant::now() + Duration::from_millis(100),
    );
    assert!(matches!(result, Err(Error::TimedOut)));
}
