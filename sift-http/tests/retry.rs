use reqwest::StatusCode;
use serde_json::{Value, json};
use sift_http::{Auth, HttpClient, HttpError, RequestOpts};
use std::borrow::Cow;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&format!("{}/", server.uri())).unwrap();
    let got: Value = client
        .get_json("v1/items", RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(got, json!({"ok": true}));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({"error": {"message": "invalid api key"}})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .post_json::<_, Value>("/search", Some("sk-test"), &json!({"query": "x"}))
        .await
        .unwrap_err();
    match err {
        HttpError::Api { status, message, .. } => {
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn header_and_query_auth_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(header("x-api-key", "exa-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .and(query_param("key", "q-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"up": true})))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap().with_retries(0);
    let opts = RequestOpts {
        auth: Some(Auth::Header {
            name: "x-api-key".parse().unwrap(),
            value: "exa-key".parse().unwrap(),
        }),
        ..Default::default()
    };
    let got: Value = client
        .post_json_opts("/search", &json!({"query": "rust"}), opts)
        .await
        .unwrap();
    assert_eq!(got["results"], json!([]));

    let opts = RequestOpts {
        auth: Some(Auth::Query {
            name: "key",
            value: Cow::Borrowed("q-key"),
        }),
        ..Default::default()
    };
    let got: Value = client.get_json("/status", opts).await.unwrap();
    assert_eq!(got["up"], json!(true));
}

#[tokio::test]
async fn undecodable_success_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>nope</html>"))
        .mount(&server)
        .await;

    let client = HttpClient::new(&server.uri()).unwrap();
    let err = client
        .get_json::<Value>("/html", RequestOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, HttpError::Decode(_, ref body) if body.contains("nope")));
    assert_eq!(err.status(), None);
}
