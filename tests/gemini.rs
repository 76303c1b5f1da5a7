//! Gemini backend against a local mock of the `generateContent` endpoint.
//!
//! Run with:
//!   cargo test --test gemini

use image::{ImageFormat, Rgb, RgbImage};
use medimg_report::{analyze_bytes, AnalysisConfig, AnalysisOutcome, Analyzer, MedImgError};
use serde_json::json;
use std::io::Cursor;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

const ENDPOINT: &str = "/v1beta/models/gemini-2.0-flash-exp:generateContent";

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([40, 40, 40]));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn config(server: &MockServer, web_search: bool) -> AnalysisConfig {
    AnalysisConfig::builder()
        .api_key("test-key")
        .api_base_url(server.uri())
        .web_search(web_search)
        .build()
        .unwrap()
}

fn success_body() -> serde_json::Value {
    json!({
        "candidates": [{
            "content": {
                "role": "model",
                "parts": [
                    { "text": "### 1. Image Type & Region\n- Knee MRI, sagittal\n" },
                    { "text": "### 2. Key Findings\n- Intact ACL\n" }
                ]
            },
            "finishReason": "STOP",
            "groundingMetadata": {
                "groundingChunks": [
                    { "web": { "uri": "https://radiopaedia.org/articles/acl", "title": "ACL tear" } },
                    { "web": { "uri": "https://radiopaedia.org/articles/acl", "title": "ACL tear" } },
                    { "web": { "uri": "https://pubmed.ncbi.nlm.nih.gov/1" } }
                ]
            }
        }],
        "usageMetadata": { "promptTokenCount": 1290, "candidatesTokenCount": 512 }
    })
}

#[tokio::test]
async fn report_with_grounding_sources() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({ "tools": [{ "googleSearch": {} }] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = analyze_bytes(&png(1000, 500), "image/png", &config(&server, true))
        .await
        .unwrap();

    let report = outcome.report().expect("expected a report");
    assert_eq!(
        report.markdown,
        "### 1. Image Type & Region\n- Knee MRI, sagittal\n### 2. Key Findings\n- Intact ACL\n"
    );
    assert_eq!(report.stats.input_tokens, 1290);
    assert_eq!(report.stats.output_tokens, 512);
    assert_eq!(report.stats.model, "gemini-2.0-flash-exp");
    assert_eq!(report.sources.len(), 2, "duplicate uri should collapse");
    assert_eq!(report.sources[0].title, "ACL tear");
    assert_eq!(report.sources[1].title, "https://pubmed.ncbi.nlm.nih.gov/1");
}

#[tokio::test]
async fn request_carries_prompt_and_png() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(success_body()))
        .mount(&server)
        .await;

    analyze_bytes(&png(640, 480), "image/png", &config(&server, false))
        .await
        .unwrap();

    let received: Vec<Request> = server.received_requests().await.unwrap();
    assert_eq!(received.len(), 1);
    let body: serde_json::Value = received[0].body_json().unwrap();

    let parts = &body["contents"][0]["parts"];
    let prompt = parts[0]["text"].as_str().unwrap();
    assert!(prompt.contains("### 5. Research Context"));
    assert!(!prompt.contains("Use web search"));
    assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
    assert!(!parts[1]["inlineData"]["data"].as_str().unwrap().is_empty());
    assert!(body.get("tools").is_none(), "search tool sent while disabled");
    assert!(
        !received[0].url.as_str().contains("test-key"),
        "API key must not appear in the URL"
    );
}

#[tokio::test]
async fn quota_error_becomes_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {
                "code": 429,
                "message": "Resource has been exhausted (e.g. check quota).",
                "status": "RESOURCE_EXHAUSTED"
            }
        })))
        .mount(&server)
        .await;

    let outcome = analyze_bytes(&png(300, 200), "image/png", &config(&server, true))
        .await
        .unwrap();

    match outcome {
        AnalysisOutcome::Error(ref e) => {
            assert!(e.message.contains("429"), "got: {}", e.message);
            assert!(e.message.contains("Resource has been exhausted"));
        }
        other => panic!("expected an error outcome, got {other:?}"),
    }
    assert!(outcome.display_text().starts_with("⚠️ Analysis error:"));
}

#[tokio::test]
async fn safety_block_becomes_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .mount(&server)
        .await;

    let outcome = analyze_bytes(&png(300, 200), "image/png", &config(&server, true))
        .await
        .unwrap();
    assert!(!outcome.is_report());
    assert!(outcome.display_text().contains("SAFETY"));
}

#[tokio::test]
async fn malformed_body_becomes_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
        .mount(&server)
        .await;

    let outcome = analyze_bytes(&png(300, 200), "image/png", &config(&server, true))
        .await
        .unwrap();
    assert!(!outcome.is_report());
    assert!(outcome.display_text().contains("malformed response"));
}

#[tokio::test]
async fn unreachable_endpoint_becomes_outcome() {
    // Nothing listens on port 9 of localhost.
    let config = AnalysisConfig::builder()
        .api_key("test-key")
        .api_base_url("http://127.0.0.1:9")
        .build()
        .unwrap();

    let outcome = analyze_bytes(&png(300, 200), "image/png", &config)
        .await
        .unwrap();
    assert!(!outcome.is_report());
    assert!(outcome.display_text().contains("request to gemini failed"));
}

#[test]
fn missing_key_is_fatal_at_construction() {
    let err = Analyzer::new(AnalysisConfig::default()).err().unwrap();
    assert!(matches!(err, MedImgError::MissingCredential { .. }));

    let err = Analyzer::new(AnalysisConfig::builder().api_key("   ").build().unwrap())
        .err()
        .unwrap();
    assert!(matches!(err, MedImgError::MissingCredential { .. }));
}
