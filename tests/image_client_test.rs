mod helpers;

use base64::Engine;
use cleo::api::ApiError;
use cleo::image::ImageClient;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn image_client(server: &MockServer) -> ImageClient {
    let tmp = TempDir::new().unwrap();
    ImageClient::new(helpers::test_config(tmp.path(), &server.uri()).image).unwrap()
}

#[tokio::test]
async fn generate_decodes_first_image() {
    let server = MockServer::start().await;
    let png = b"\x89PNG fake image bytes".to_vec();
    let encoded = base64::engine::general_purpose::STANDARD.encode(&png);

    Mock::given(method("POST"))
        .and(path("/image/generation"))
        .and(header("authorization", "Bearer image-key"))
        .and(body_partial_json(json!({
            "model_name": "FLUX.1-dev",
            "prompt": "a cat in a hat",
            "height": 1024,
            "width": 1024,
            "steps": 50,
            "backend": "auto"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "images": [{ "image": encoded }] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let bytes = image_client(&server).generate("a cat in a hat").await.unwrap();
    assert_eq!(bytes, png);
}

#[tokio::test]
async fn error_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("gpu on fire"))
        .mount(&server)
        .await;

    let err = image_client(&server).generate("anything").await.unwrap_err();
    assert!(matches!(err, ApiError::Status { status: 502, .. }));
}

#[tokio::test]
async fn missing_images_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "images": [] })))
        .mount(&server)
        .await;

    let err = image_client(&server).generate("anything").await.unwrap_err();
    assert!(matches!(err, ApiError::Malformed(_)));
}

#[tokio::test]
async fn invalid_base64_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "images": [{ "image": "not base64!!" }] })),
        )
        .mount(&server)
        .await;

    let err = image_client(&server).generate("anything").await.unwrap_err();
    assert_eq!(err.kind(), "DecodeError");
}
