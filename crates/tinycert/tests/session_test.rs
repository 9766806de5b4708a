//! Session lifecycle and the signed call path

mod common;

use common::{connected_session, stub_session, API_KEY, SERVER};
use tinycert::{
    sign, CertificateAuthorities, Fields, SessionState, TinyCertError,
};

#[test]
fn test_connect_sends_credentials_without_token() {
    let (mut session, transport) = stub_session();
    transport.reply(200, r#"{"token": "tok-1"}"#);

    session.connect().unwrap();

    let request = transport.last_request();
    assert_eq!(request.url, format!("{}connect", SERVER));
    assert_eq!(
        request.field_names(),
        vec!["email", "passphrase", "digest"]
    );
    assert_eq!(request.field("email").unwrap(), "ops@example.com");
    assert_eq!(request.field("passphrase").unwrap(), "correct horse");
    assert!(request.field("token").is_none());

    assert_eq!(
        session.state(),
        &SessionState::Connected {
            token: "tok-1".to_string()
        }
    );
}

#[test]
fn test_digest_covers_transmitted_fields() {
    let (mut session, transport) = stub_session();
    transport.reply(200, r#"{"token": "tok-1"}"#);
    session.connect().unwrap();

    let request = transport.last_request();
    let digest = request.field("digest").unwrap();

    assert_eq!(
        request.signed_part(),
        "email=ops%40example.com&passphrase=correct+horse"
    );
    assert_eq!(digest, sign(request.signed_part(), API_KEY));
}

#[test]
fn test_token_injected_and_sorted_after_connect() {
    let (session, transport) = connected_session();
    transport.reply(200, r#"{"ca_id": 5}"#);

    CertificateAuthorities::new(&session)
        .create("Acme", "Den Haag", "ZH", "NL", Default::default())
        .unwrap();

    let request = transport.last_request();
    assert_eq!(request.endpoint(), "ca/new");
    assert_eq!(
        request.field_names(),
        vec!["C", "L", "O", "ST", "hash_method", "token", "digest"]
    );
    assert_eq!(request.field("token").unwrap(), "tok-1");
    assert_eq!(
        request.field("digest").unwrap(),
        sign(request.signed_part(), API_KEY)
    );
}

#[test]
fn test_prepare_without_connect_adds_no_token() {
    let (session, _transport) = stub_session();

    let fields = Fields::new().with("ca_id", 12i64).with("what", "cert");
    let supplied = fields.len();
    let request = session.prepare(fields);

    assert_eq!(request.canonical, "ca_id=12&what=cert");
    assert_eq!(request.canonical.split('&').count(), supplied);
    assert_eq!(request.digest, sign("ca_id=12&what=cert", API_KEY));
}

#[test]
fn test_prepare_after_connect_adds_token() {
    let (session, _transport) = connected_session();

    let request = session.prepare(Fields::new().with("ca_id", 12i64));
    assert_eq!(request.canonical, "ca_id=12&token=tok-1");
}

#[test]
fn test_prepare_is_deterministic() {
    let (session, _transport) = connected_session();

    let a = session.prepare(Fields::new().with("b", "2").with("a", "1"));
    let b = session.prepare(Fields::new().with("a", "1").with("b", "2"));
    assert_eq!(a, b);
    assert_eq!(a.body(), b.body());
}

#[test]
fn test_operation_before_connect_fails_fast() {
    let (session, transport) = stub_session();

    let result = CertificateAuthorities::new(&session).list();

    assert!(matches!(result, Err(TinyCertError::NotConnected)));
    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_connect_rejected_is_authentication_error() {
    let (mut session, transport) = stub_session();
    transport.reply(401, "invalid credentials");

    let err = session.connect().unwrap_err();

    match err {
        TinyCertError::Authentication(inner) => match *inner {
            TinyCertError::Server { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid credentials");
            }
            other => panic!("unexpected cause: {:?}", other),
        },
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!session.is_connected());
}

#[test]
fn test_connect_transport_failure_is_authentication_error() {
    let (mut session, transport) = stub_session();
    transport.fail();

    let err = session.connect().unwrap_err();

    assert!(matches!(err, TinyCertError::Authentication(ref inner)
        if matches!(**inner, TinyCertError::Transport(_))));
    assert!(!session.is_connected());
}

#[test]
fn test_connect_without_token_in_body_fails() {
    let (mut session, transport) = stub_session();
    transport.reply(200, r#"{"status": "ok"}"#);

    let err = session.connect().unwrap_err();

    assert!(matches!(err, TinyCertError::Authentication(ref inner)
        if matches!(**inner, TinyCertError::Decode { .. })));
}

#[test]
fn test_disconnect_clears_token() {
    let (mut session, transport) = connected_session();
    transport.reply(200, "{}");

    session.disconnect().unwrap();

    let request = transport.last_request();
    assert_eq!(request.endpoint(), "disconnect");
    assert_eq!(request.field_names(), vec!["token", "digest"]);
    assert_eq!(session.state(), &SessionState::Unconnected);
}

#[test]
fn test_failed_disconnect_keeps_token() {
    let (mut session, transport) = connected_session();
    transport.reply(500, "internal error");

    let err = session.disconnect().unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert!(session.is_connected());
}

#[test]
fn test_disconnect_when_unconnected_is_noop() {
    let (mut session, transport) = stub_session();

    session.disconnect().unwrap();

    assert_eq!(transport.request_count(), 0);
}

#[test]
fn test_server_error_propagates() {
    let (session, transport) = connected_session();
    transport.reply(403, "forbidden");

    let err = CertificateAuthorities::new(&session).list().unwrap_err();

    match err {
        TinyCertError::Server { status, body } => {
            assert_eq!(status, 403);
            assert_eq!(body, "forbidden");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_malformed_json_is_decode_error() {
    let (session, transport) = connected_session();
    transport.reply(200, "{\"ca_id\": 4");

    let err = CertificateAuthorities::new(&session)
        .create("Acme", "Den Haag", "ZH", "NL", Default::default())
        .unwrap_err();

    assert!(matches!(err, TinyCertError::Decode { ref endpoint, .. } if endpoint == "ca/new"));
}

#[test]
fn test_transport_error_propagates_without_retry() {
    let (session, transport) = connected_session();
    transport.fail();

    let err = CertificateAuthorities::new(&session).list().unwrap_err();

    assert!(matches!(err, TinyCertError::Transport(_)));
    // connect + one attempt
    assert_eq!(transport.request_count(), 2);
}

#[test]
fn test_with_connection_disconnects_on_success() {
    let (mut session, transport) = stub_session();
    transport
        .reply(200, r#"{"token": "tok-9"}"#)
        .reply(200, r#"[{"id": 1, "name": "Acme Root"}]"#)
        .reply(200, "{}");

    let list = session
        .with_connection(|s| CertificateAuthorities::new(s).list())
        .unwrap();

    assert_eq!(list.len(), 1);
    let endpoints: Vec<String> = transport
        .requests()
        .iter()
        .map(|r| r.endpoint().to_string())
        .collect();
    assert_eq!(endpoints, vec!["connect", "ca/list", "disconnect"]);
    assert!(!session.is_connected());
}

#[test]
fn test_with_connection_disconnects_on_error() {
    let (mut session, transport) = stub_session();
    transport
        .reply(200, r#"{"token": "tok-9"}"#)
        .reply(404, "no such ca")
        .reply(200, "{}");

    let err = session
        .with_connection(|s| CertificateAuthorities::new(s).details(77))
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(transport.last_request().endpoint(), "disconnect");
    assert!(!session.is_connected());
}

#[test]
fn test_with_connection_reports_disconnect_failure() {
    let (mut session, transport) = stub_session();
    transport
        .reply(200, r#"{"token": "tok-9"}"#)
        .reply(200, "{}")
        .reply(503, "busy");

    let err = session
        .with_connection(|s| CertificateAuthorities::new(s).delete(3))
        .unwrap_err();

    assert_eq!(err.status(), Some(503));
}

#[test]
fn test_with_connection_disconnects_on_panic() {
    let (mut session, transport) = stub_session();
    transport
        .reply(200, r#"{"token": "tok-9"}"#)
        .reply(200, "{}");

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _ = session.with_connection(|_| -> tinycert::Result<()> { panic!("caller bug") });
    }));

    assert!(result.is_err());
    assert_eq!(transport.last_request().endpoint(), "disconnect");
    assert!(!session.is_connected());
}

#[test]
fn test_with_connection_skips_body_when_connect_fails() {
    let (mut session, transport) = stub_session();
    transport.reply(401, "nope");

    let mut ran = false;
    let err = session
        .with_connection(|_| {
            ran = true;
            Ok(())
        })
        .unwrap_err();

    assert!(matches!(err, TinyCertError::Authentication(_)));
    assert!(!ran);
    assert_eq!(transport.request_count(), 1);
}

#[test]
fn test_session_debug_hides_credentials() {
    let (session, _transport) = connected_session();
    let debug = format!("{:?}", session);

    assert!(debug.contains("Connected"));
    assert!(!debug.contains("ops@example.com"));
    assert!(!debug.contains("correct horse"));
    assert!(!debug.contains(API_KEY));
    assert!(!debug.contains("tok-1"));
}
