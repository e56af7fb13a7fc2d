//! Mock NLI archive: a manifest endpoint and an image delivery endpoint on one wiremock server.

use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DELIVERY_PATH: &str = "/delivery";

/// Manifest base URL; the book id follows the trailing slash.
pub fn manifest_base(server: &MockServer) -> String {
    format!("{}/manifest/", server.uri())
}

/// Download base URL in the archive's query-string shape.
pub fn download_base(server: &MockServer) -> String {
    format!("{}{DELIVERY_PATH}?dps_func=stream&dps_pid=", server.uri())
}

/// Envelope with `Value` holding the JSON-encoded IIIF manifest, as the archive sends it.
pub fn manifest_body(image_ids: &[&str]) -> String {
    let canvases: Vec<_> = image_ids
        .iter()
        .map(|id| serde_json::json!({ "label": id, "images": [{ "@id": id }] }))
        .collect();
    let iiif = serde_json::json!({ "sequences": [{ "canvases": canvases }] });
    serde_json::json!({ "Success": true, "Value": iiif.to_string(), "ErrorMessage": null })
        .to_string()
}

pub fn error_body(message: &str) -> String {
    serde_json::json!({ "Success": false, "Value": null, "ErrorMessage": message }).to_string()
}

pub async fn mount_manifest(server: &MockServer, book_id: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/manifest/{book_id}")))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_page(server: &MockServer, image_id: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(DELIVERY_PATH))
        .and(query_param("dps_pid", image_id))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
        .mount(server)
        .await;
}

/// A page that answers every attempt with `status`; expects exactly `attempts` requests.
pub async fn mount_failing_page(server: &MockServer, image_id: &str, status: u16, attempts: u64) {
    Mock::given(method("GET"))
        .and(path(DELIVERY_PATH))
        .and(query_param("dps_pid", image_id))
        .respond_with(ResponseTemplate::new(status))
        .expect(attempts)
        .mount(server)
        .await;
}

/// Fails unless no image request arrives at all.
pub async fn expect_no_page_requests(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(DELIVERY_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(server)
        .await;
}
