//! Verify request building and response parsing against JSON test vectors
//! stored in `test-vectors/`.
//!
//! Bodies are compared as parsed JSON rather than raw strings so key order in
//! the vector files does not matter.

use serde_json::Value;
use strap_core::{build_request, parse_response, ApiError, HttpMethod, HttpResponse, Params, ServiceDescriptor};

const TOKEN: &str = "tok";

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|h| {
            let arr = h.as_array().unwrap();
            (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_test_vectors() {
    let raw = include_str!("../../test-vectors/requests.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let descriptor: ServiceDescriptor = serde_json::from_value(case["descriptor"].clone()).unwrap();
        let method: HttpMethod = case["method"].as_str().unwrap().parse().unwrap();
        let params = Params::from(case["params"].clone());

        let result = build_request(method, &descriptor, TOKEN, params);

        if let Some(expected_error) = case.get("expected_error") {
            let err = result.unwrap_err();
            match expected_error["kind"].as_str().unwrap() {
                "MissingPathParameter" => assert_eq!(
                    err,
                    ApiError::MissingPathParameter(expected_error["param"].as_str().unwrap().to_string()),
                    "{name}: error"
                ),
                other => panic!("{name}: unknown expected_error kind: {other}"),
            }
            continue;
        }

        let req = result.unwrap();
        let expected = &case["expected_request"];
        assert_eq!(req.method.as_str(), expected["method"].as_str().unwrap(), "{name}: method");
        assert_eq!(req.url, expected["url"].as_str().unwrap(), "{name}: url");
        assert_eq!(req.headers, pairs(&expected["headers"]), "{name}: headers");

        match &expected["body"] {
            Value::Null => assert!(req.body.is_none(), "{name}: body should be None"),
            body => {
                let actual: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                assert_eq!(&actual, body, "{name}: body");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn response_test_vectors() {
    let raw = include_str!("../../test-vectors/responses.json");
    let vectors: Value = serde_json::from_str(raw).unwrap();

    for case in vectors["cases"].as_array().unwrap() {
        let name = case["name"].as_str().unwrap();
        let sim = &case["response"];
        let response = HttpResponse {
            status: sim["status"].as_u64().unwrap() as u16,
            headers: pairs(&sim["headers"]),
            body: sim["body"].as_str().unwrap().to_string(),
        };

        let result = parse_response(response);

        if let Some(expected_error) = case.get("expected_error") {
            assert_eq!(
                result.unwrap_err(),
                ApiError::UpstreamError {
                    status: expected_error["status"].as_u64().unwrap() as u16,
                    body: expected_error["body"].as_str().unwrap().to_string(),
                },
                "{name}: error"
            );
            continue;
        }

        let (body, meta) = result.unwrap();
        assert_eq!(body, case["expected_body"], "{name}: body");
        let expected_meta = &case["expected_meta"];
        assert_eq!(meta.page as u64, expected_meta["page"].as_u64().unwrap(), "{name}: page");
        assert_eq!(meta.pages as u64, expected_meta["pages"].as_u64().unwrap(), "{name}: pages");
        assert_eq!(meta.next as u64, expected_meta["next"].as_u64().unwrap(), "{name}: next");
    }
}
