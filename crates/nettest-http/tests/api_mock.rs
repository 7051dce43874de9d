mod common;

use nettest_core::config::load_api_specs;
use nettest_core::{
    send_point, ApiDefinition, ApiMock, ApiSpec, Captures, MockError, Mode, NetworkBlocker,
    PatternEndpoint, ResponseSpec,
};
use nettest_http::{get, HttpConnection};
use rstest::rstest;
use serde_json::json;
use std::sync::Arc;

struct TestApi;

impl ApiDefinition for TestApi {
    fn hostnames(&self) -> Vec<String> {
        vec!["127.0.0.1".into()]
    }

    fn endpoints(&self) -> Result<Vec<PatternEndpoint>, MockError> {
        Ok(vec![PatternEndpoint::new(
            "test",
            r"^GET /test/(?P<test_id>.*?)/",
            |groups| (418, json!({"id": groups["test_id"]})).into(),
        )?])
    }
}

fn test_mock() -> ApiMock {
    ApiMock::from_api(TestApi).unwrap()
}

fn expected_captures() -> Captures {
    Captures::from([("test_id".to_string(), "abc".to_string())])
}

#[rstest]
fn test_request_unmatched() {
    let _serial = common::serial();
    let mock = test_mock();
    let _mock = mock.enter();
    let blocker = NetworkBlocker::blocked();
    let _blocker = blocker.enter();

    let err = get("http://localhost").unwrap_err();

    assert!(err.is_network_blocked());
    assert!(!mock.endpoint("test").unwrap().invocations().was_called());
}

#[rstest]
fn test_request_matched_hostname_only() {
    let _serial = common::serial();
    let mock = test_mock();
    let _mock = mock.enter();
    let blocker = NetworkBlocker::blocked();
    let _blocker = blocker.enter();

    let response = get("http://127.0.0.1").unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.reason, "OK");
    assert!(response.body.is_empty());
    assert!(!mock.endpoint("test").unwrap().invocations().was_called());
}

#[rstest]
fn test_request_matched_endpoint() {
    let _serial = common::serial();
    let mock = test_mock();
    let _mock = mock.enter();
    let blocker = NetworkBlocker::blocked();
    let _blocker = blocker.enter();

    let response = get("http://127.0.0.1/test/abc/").unwrap();

    assert_eq!(response.status, 418);
    assert_eq!(response.body, b"{\"id\": \"abc\"}");
    let invocations = mock.endpoint("test").unwrap().invocations();
    assert!(invocations.called_once());
    assert_eq!(invocations.last(), Some(expected_captures()));
}

#[rstest]
fn test_request_override_response() {
    let _serial = common::serial();
    let mock = test_mock();
    let _mock = mock.enter();
    mock.endpoint("test")
        .unwrap()
        .set_response(|_| ResponseSpec::status(204));
    let blocker = NetworkBlocker::blocked();
    let _blocker = blocker.enter();

    let response = get("http://127.0.0.1/test/abc/").unwrap();

    assert_eq!(response.status, 204);
    assert!(response.body.is_empty());
    assert!(mock.endpoint("test").unwrap().invocations().called_once());
}

#[rstest]
fn test_request_override_removed_nested_mock() {
    let _serial = common::serial();
    let outer = test_mock();
    let _outer = outer.enter();
    {
        let inner = test_mock();
        let _inner = inner.enter();
        inner
            .endpoint("test")
            .unwrap()
            .set_response(|_| ResponseSpec::status(204));

        let blocker = NetworkBlocker::blocked();
        let _blocker = blocker.enter();
        assert_eq!(get("http://127.0.0.1/test/abc/").unwrap().status, 204);
    }

    let blocker = NetworkBlocker::blocked();
    let _blocker = blocker.enter();
    let response = get("http://127.0.0.1/test/abc/").unwrap();

    assert_eq!(response.status, 418);
    assert_eq!(response.body, b"{\"id\": \"abc\"}");
    let invocations = outer.endpoint("test").unwrap().invocations();
    assert!(invocations.called_once());
    assert_eq!(invocations.last(), Some(expected_captures()));
}

#[rstest]
fn test_request_override_removed_mock_twice() {
    let _serial = common::serial();
    {
        let mock = test_mock();
        let _mock = mock.enter();
        mock.endpoint("test")
            .unwrap()
            .set_response(|_| ResponseSpec::status(204));
        let blocker = NetworkBlocker::blocked();
        let _blocker = blocker.enter();
        assert_eq!(get("http://127.0.0.1/test/abc/").unwrap().status, 204);
    }

    let mock = test_mock();
    let _mock = mock.enter();
    let blocker = NetworkBlocker::blocked();
    let _blocker = blocker.enter();
    let response = get("http://127.0.0.1/test/abc/").unwrap();

    assert_eq!(response.status, 418);
    assert!(mock.endpoint("test").unwrap().invocations().called_once());
}

#[rstest]
fn test_request_body_is_swallowed() {
    let _serial = common::serial();
    let mock = test_mock();
    let _mock = mock.enter();
    let blocker = NetworkBlocker::blocked();
    let _blocker = blocker.enter();

    let mut connection = HttpConnection::new("127.0.0.1", 80);
    connection
        .request("POST", "/items", &[("Content-Type", "application/json")], Some(b"{\"name\": \"x\"}"))
        .unwrap();
    let response = connection.get_response().unwrap();

    assert_eq!(response.status, 200);
    assert!(!connection.is_connected());
    assert_eq!(mock.sends().count(), 2);
}

#[rstest]
fn test_send_hook_restored_after_last_mock() {
    let _serial = common::serial();
    let original = send_point().current();
    {
        let first = test_mock();
        let second = test_mock();
        let _first = first.enter();
        let _second = second.enter();
        assert!(!Arc::ptr_eq(&send_point().current(), &original));
    }
    assert!(Arc::ptr_eq(&send_point().current(), &original));
}

#[rstest]
fn test_observe_mode_reaches_server() {
    let _serial = common::serial();
    let server = common::serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok");
    let mock = ApiMock::builder(nettest_core::ApiInterceptor::new(&TestApi).unwrap())
        .mode(Mode::Observe)
        .build();
    let _mock = mock.enter();

    let response = get(&server.url("/test/abc/")).unwrap();

    assert_eq!(response.body, b"ok");
    assert!(mock.endpoint("test").unwrap().invocations().called_once());
    assert!(server.received().starts_with(b"GET /test/abc/ HTTP/1.1\r\n"));
}

#[rstest]
fn test_undeclared_host_reaches_server() {
    let _serial = common::serial();
    let server = common::serve_once(b"HTTP/1.1 201 Created\r\nContent-Length: 0\r\n\r\n");
    let spec: ApiSpec = serde_json::from_value(json!({
        "name": "elsewhere",
        "hostnames": ["api.internal"],
    }))
    .unwrap();
    let mock = ApiMock::from_api(spec).unwrap();
    let _mock = mock.enter();

    let response = get(&server.url("/")).unwrap();

    assert_eq!(response.status, 201);
    assert!(!mock.sends().was_called());
    server.received();
}

#[rstest]
fn test_declarative_api_from_file() {
    let _serial = common::serial();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("local.yaml"),
        r#"
name: local
hostnames: [127.0.0.1]
endpoints:
  - operation_id: user
    pattern: 'GET /users/(?P<user_id>\d+)'
    response:
      status: 200
      body: {id: "{user_id}"}
  - operation_id: legacy
    pattern: 'GET /legacy'
    response:
      raw: "HTTP/1.0 200 OK\r\n\r\nplain text"
"#,
    )
    .unwrap();

    let specs = load_api_specs(&format!("{}/*.yaml", dir.path().display())).unwrap();
    let mock = ApiMock::from_api(specs.into_iter().next().unwrap()).unwrap();
    let _mock = mock.enter();
    let blocker = NetworkBlocker::blocked();
    let _blocker = blocker.enter();

    let user = get("http://127.0.0.1/users/7").unwrap();
    assert_eq!(user.body, b"{\"id\": \"7\"}");

    let legacy = get("http://127.0.0.1/legacy").unwrap();
    assert_eq!(legacy.text(), "plain text");
}

#[rstest]
fn test_invalid_template_surfaces_as_mock_error() {
    let _serial = common::serial();
    let spec: ApiSpec = serde_json::from_value(json!({
        "name": "broken",
        "hostnames": ["127.0.0.1"],
        "endpoints": [{"operation_id": "bad", "pattern": "GET", "response": "teapot"}],
    }))
    .unwrap();
    let mock = ApiMock::from_api(spec).unwrap();
    let _mock = mock.enter();

    let err = get("http://127.0.0.1/").unwrap_err();

    assert!(matches!(
        err.mock_error(),
        Some(MockError::InvalidResponse { operation_id, .. }) if operation_id == "bad"
    ));
}
