use aboutmyemail::api::{ApiClient, ApiMessage, Outcome, Submit, UploadFile};
use aboutmyemail::Error;
use httpmock::prelude::*;
use serde_json::json;

const TEST_KEY: &str = "myemail_0LekAwu5Wob2kSru";

const SAMPLE_EMAIL: &str = "From: <steve@blighty.com>\r\n\
To: <steve@blighty.com>\r\n\
Subject: test sausage\r\n\
\r\n\
body\r\n";

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(&server.url("/api/v1"), TEST_KEY).unwrap()
}

fn sample_submit() -> Submit {
    Submit {
        from: "steve@blighty.com".into(),
        to: "steve@blighty.com".into(),
        ip: "10.11.12.13".into(),
        payload: SAMPLE_EMAIL.into(),
        token: Some("potato".into()),
        ..Default::default()
    }
}

#[test]
fn submit_returns_id() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/emails")
            .header("authorization", format!("Bearer {TEST_KEY}"))
            .json_body(json!({
                "from": "steve@blighty.com",
                "to": "steve@blighty.com",
                "ip": "10.11.12.13",
                "payload": SAMPLE_EMAIL,
                "token": "potato",
            }));
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "id": "abc123" }));
    });

    let outcome = client(&server).submit_email(&sample_submit()).unwrap();
    mock.assert();
    match outcome {
        Outcome::Success(success) => assert_eq!(success.id, "abc123"),
        other => panic!("expected success, got {other:?}"),
    }
}

#[test]
fn no_api_key_sends_no_authorization() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/emails")
            .matches(|req| {
                req.headers
                    .as_ref()
                    .map_or(true, |h| h.iter().all(|(k, _)| !k.eq_ignore_ascii_case("authorization")))
            });
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "id": "anon" }));
    });

    let client = ApiClient::new(&server.url("/api/v1"), "").unwrap();
    let outcome = client.submit_email(&sample_submit()).unwrap();
    mock.assert();
    assert!(matches!(outcome, Outcome::Success(_)));
}

#[test]
fn submit_rejection_keeps_message() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/emails");
        then.status(400)
            .header("content-type", "application/json")
            .json_body(json!({ "message": "invalid ip" }));
    });

    let outcome = client(&server).submit_email(&sample_submit()).unwrap();
    let Outcome::Failed(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.status.as_u16(), 400);
    assert_eq!(
        failure.message,
        Some(ApiMessage {
            message: "invalid ip".into()
        })
    );
}

#[test]
fn non_json_error_keeps_body() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/emails");
        then.status(502).body("bad gateway");
    });

    let Outcome::Failed(failure) = client(&server).submit_email(&sample_submit()).unwrap() else {
        panic!("expected failure");
    };
    assert_eq!(failure.message, None);
    assert_eq!(failure.body, "bad gateway");
}

#[test]
fn success_without_json_is_an_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/emails");
        then.status(200).body("ok");
    });

    let result = client(&server).submit_email(&sample_submit());
    assert!(matches!(result, Err(Error::UnexpectedResponse(_))));
}

#[test]
fn status_is_parsed() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(GET).path("/api/v1/emails/abc123");
        then.status(200)
            .header("content-type", "application/json; charset=utf-8")
            .json_body(json!({
                "id": "abc123",
                "messages": ["Connecting", "Delivered"],
                "token": "potato",
                "url": "https://aboutmy.email/abc123",
            }));
    });

    let Outcome::Success(status) = client(&server).email_status("abc123").unwrap() else {
        panic!("expected success");
    };
    mock.assert();
    assert_eq!(status.messages(), ["Connecting", "Delivered"]);
    assert_eq!(status.token.as_deref(), Some("potato"));
    assert_eq!(status.finished_url(), Some("https://aboutmy.email/abc123"));
}

#[test]
fn status_throttled_and_not_found() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/emails/busy");
        then.status(429);
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v1/emails/gone");
        then.status(404)
            .header("content-type", "application/json")
            .json_body(json!({ "message": "no such result" }));
    });

    let client = client(&server);
    assert_eq!(client.email_status("busy").unwrap(), Outcome::Throttled);

    let err = client.email_status("gone").unwrap().into_result().unwrap_err();
    match err {
        Error::Rejected { status, message } => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(message.as_deref(), Some("no such result"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn upload_sends_multipart_files() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/style/content")
            .header_exists("content-type")
            .body_contains("name=\"filename\"; filename=\"home.md\"")
            .body_contains("# Welcome")
            .body_contains("filename=\"branding.json\"");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "files": ["home.md", "branding.json"] }));
    });

    let files = vec![
        UploadFile {
            name: "home.md".into(),
            contents: b"# Welcome".to_vec(),
        },
        UploadFile {
            name: "branding.json".into(),
            contents: br#"{"HomeLink": "https://example.com"}"#.to_vec(),
        },
    ];
    let Outcome::Success(result) = client(&server).upload_content(&files).unwrap() else {
        panic!("expected success");
    };
    mock.assert();
    assert_eq!(result.files.unwrap().len(), 2);
}

#[test]
fn publish_reports_server_errors() {
    let server = MockServer::start();
    let mut ok = server.mock(|when, then| {
        when.method(POST).path("/api/v1/style/publish");
        then.status(200);
    });

    let client = client(&server);
    assert_eq!(client.publish_style().unwrap(), Outcome::Success(()));
    ok.assert();
    ok.delete();

    server.mock(|when, then| {
        when.method(POST).path("/api/v1/style/publish");
        then.status(500)
            .header("content-type", "application/json")
            .json_body(json!({ "message": "nothing staged" }));
    });
    let Outcome::Failed(failure) = client.publish_style().unwrap() else {
        panic!("expected failure");
    };
    assert_eq!(failure.status.as_u16(), 500);
    assert_eq!(failure.message.unwrap().message, "nothing staged");
}

#[test]
fn upload_accepts_plain_text_success() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/api/v1/style/content");
        then.status(200).header("content-type", "text/plain").body("OK");
    });

    let files = vec![UploadFile {
        name: "home.md".into(),
        contents: b"# Welcome".to_vec(),
    }];
    let outcome = client(&server).upload_content(&files).unwrap();
    mock.assert();
    assert_eq!(outcome, Outcome::Success(Default::default()));
}
