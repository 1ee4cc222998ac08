//! GeminiClient against a mock HTTP server.
//!
//! Run with: cargo test --test gemini_http

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use cairo_vision::studio::gemini::{GenerateRequest, ModelApi};
use cairo_vision::studio::generator::{generate_image, ImageModels, ImageRequest};
use cairo_vision::studio::{AspectRatio, DesignStyle, GeminiClient, StudioError};

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new(format!("{}/v1beta/", server.uri()), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_posts_to_model_endpoint_with_key_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
        .and(header("x-goog-api-key", "AIza-test"))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "hi there" }] } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = client(&server)
        .generate_content("gemini-2.5-flash", "AIza-test", &GenerateRequest::from_text("hello"))
        .await
        .unwrap();

    assert_eq!(response.text().as_deref(), Some("hi there"));
}

#[tokio::test]
async fn test_error_envelope_message_is_surfaced() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT"
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate_content("m", "bad", &GenerateRequest::from_text("x"))
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(400));
    assert_eq!(err.message, "API key not valid. Please pass a valid API key.");
}

#[tokio::test]
async fn test_non_json_error_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let err = client(&server)
        .generate_content("m", "k", &GenerateRequest::from_text("x"))
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(503));
    assert!(err.message.contains("503"));
    assert!(err.message.contains("upstream unavailable"));
}

#[tokio::test]
async fn test_image_request_wire_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/models/pro-image:generateContent"))
        .and(body_partial_json(json!({
            "generationConfig": {
                "seed": 4242,
                "imageConfig": { "aspectRatio": "16:9", "imageSize": "1K" }
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your image" },
                { "inlineData": { "mimeType": "image/jpeg", "data": "iVBORw0KGgo=" } }
            ]}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let models = ImageModels {
        standard: "flash-image".into(),
        high_quality: "pro-image".into(),
    };
    let request = ImageRequest {
        prompt: "night skyline over the Nile",
        style: DesignStyle::Illustration,
        ratio: AspectRatio::Landscape,
        high_quality: true,
        reference: None,
        seed: 4242,
    };

    let url = generate_image(&client(&server), Some("AIza-test"), &models, &request)
        .await
        .unwrap();
    assert_eq!(url, "data:image/png;base64,iVBORw0KGgo=");
}

#[tokio::test]
async fn test_expired_key_maps_to_session_expired() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "Requested entity was not found." }
        })))
        .mount(&server)
        .await;

    let models = ImageModels {
        standard: "flash-image".into(),
        high_quality: "pro-image".into(),
    };
    let request = ImageRequest {
        prompt: "a red chair",
        style: DesignStyle::Realistic,
        ratio: AspectRatio::Square,
        high_quality: false,
        reference: None,
        seed: 1,
    };

    let err = generate_image(&client(&server), Some("AIza-test"), &models, &request)
        .await
        .unwrap_err();
    assert_eq!(err, StudioError::SessionExpired);
}
