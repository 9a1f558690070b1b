//! End-to-end tests: the gateway on an ephemeral port, reading images from a
//! second local server through the real HTTP fetcher and `image` engine.

use axum::Router;
use axum::http::header;
use axum::routing::get;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use pixelpipe::config::FetchConfig;
use pixelpipe::fetch::HttpFetcher;
use pixelpipe::gateway;
use pixelpipe::imaging::RustEngine;
use pixelpipe::service::ImageService;
use serde_json::{Value, json};
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

fn test_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, _| Rgb([(x * 8) as u8, 64, 200]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Image host serving a 20x10 PNG at `/img.png` and plain text at `/notes.txt`.
async fn spawn_image_host() -> SocketAddr {
    let png = test_png(20, 10);
    let router = Router::new()
        .route(
            "/img.png",
            get(move || {
                let png = png.clone();
                async move { ([(header::CONTENT_TYPE, "image/png")], png) }
            }),
        )
        .route("/notes.txt", get(|| async { "definitely not an image" }));
    spawn(router).await
}

async fn spawn_gateway() -> SocketAddr {
    let fetcher = HttpFetcher::new(&FetchConfig::default()).unwrap();
    let service = Arc::new(ImageService::new(RustEngine::new(), fetcher));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        gateway::serve(listener, service).await.unwrap();
    });
    addr
}

struct Harness {
    gateway: SocketAddr,
    image_url: String,
    text_url: String,
    client: reqwest::Client,
}

impl Harness {
    async fn start() -> Self {
        let host = spawn_image_host().await;
        Self {
            gateway: spawn_gateway().await,
            image_url: format!("http://{host}/img.png"),
            text_url: format!("http://{host}/notes.txt"),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.gateway, path)
    }

    async fn get_json(&self, path: &str, source: &str) -> (u16, Value) {
        let response = self
            .client
            .get(self.url(path))
            .query(&[("source", source)])
            .send()
            .await
            .unwrap();
        let status = response.status().as_u16();
        let body = response.bytes().await.unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn process(&self, steps: Value) -> reqwest::Response {
        self.client
            .post(self.url("/process"))
            .query(&[("source", self.image_url.as_str())])
            .header(header::CONTENT_TYPE.as_str(), "application/json")
            .body(json!({ "steps": steps }).to_string())
            .send()
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn healthz_answers_ok() {
    let harness = Harness::start().await;
    let response = harness.client.get(harness.url("/healthz")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn metadata_of_remote_png() {
    let harness = Harness::start().await;
    let (status, body) = harness.get_json("/metadata", &harness.image_url).await;
    assert_eq!(status, 200);
    assert_eq!(body["format"], "png");
    assert_eq!(body["width"], 20);
    assert_eq!(body["height"], 10);
    assert_eq!(body["channels"], 3);
    assert_eq!(body["hasAlpha"], false);
}

#[tokio::test]
async fn stats_of_remote_png() {
    let harness = Harness::start().await;
    let (status, body) = harness.get_json("/stats", &harness.image_url).await;
    assert_eq!(status, 200);
    let channels = body["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 3);
    // green and blue are constant
    assert_eq!(channels[1]["min"], 64);
    assert_eq!(channels[1]["max"], 64);
    assert_eq!(channels[2]["mean"], 200.0);
    assert_eq!(body["isOpaque"], true);
}

#[tokio::test]
async fn process_streams_encoded_image() {
    let harness = Harness::start().await;
    let response = harness.process(json!([["resize", 10], "flop", ["jpeg", {"quality": 60}]])).await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE.as_str()],
        "image/jpeg"
    );
    let bytes = response.bytes().await.unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (10, 5));
}

#[tokio::test]
async fn process_to_file_reports_output_info() {
    let harness = Harness::start().await;
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("out.png");

    let response = harness
        .process(json!([["rotate", 90], ["toFile", path.to_string_lossy()]]))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    let body: Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(body["format"], "png");
    assert_eq!(body["width"], 10);
    assert_eq!(body["height"], 20);
    assert_eq!(body["size"], std::fs::metadata(&path).unwrap().len());
}

#[tokio::test]
async fn process_rotates_by_oblique_angle() {
    let harness = Harness::start().await;
    let response = harness
        .process(json!([["rotate", 30, {"background": {"r": 0, "g": 0, "b": 0, "alpha": 0}}], "png"]))
        .await;
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.headers()[header::CONTENT_TYPE.as_str()], "image/png");
    let decoded = image::load_from_memory(&response.bytes().await.unwrap())
        .unwrap()
        .to_rgba8();
    assert_eq!(decoded.dimensions(), (23, 19));
    assert_eq!(decoded.get_pixel(0, 0)[3], 0);
}

#[tokio::test]
async fn undecodable_input_maps_to_json_error() {
    let harness = Harness::start().await;
    let response = harness
        .client
        .post(harness.url("/process"))
        .query(&[("source", harness.text_url.as_str())])
        .header(header::CONTENT_TYPE.as_str(), "application/json")
        .body(json!({ "steps": ["png"] }).to_string())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(body["name"], "EngineError");
    assert_eq!(body["type"], "ENGINE_ERROR");
}

#[tokio::test]
async fn unknown_operation_maps_to_422() {
    let harness = Harness::start().await;
    let response = harness.process(json!([["sparkle", 3]])).await;
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(body["name"], "EngineError");
    assert_eq!(body["type"], "ENGINE_ERROR");
    assert_eq!(body["code"], 422);
}

#[tokio::test]
async fn missing_source_maps_to_validation_error() {
    let harness = Harness::start().await;
    let response = harness.client.get(harness.url("/metadata")).send().await.unwrap();
    assert_eq!(response.status().as_u16(), 422);
    let body: Value = serde_json::from_slice(&response.bytes().await.unwrap()).unwrap();
    assert_eq!(body["type"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn unreachable_host_maps_to_bad_gateway() {
    let harness = Harness::start().await;
    // bind then drop to get a port with nothing listening
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
    let (status, body) = harness
        .get_json("/metadata", &format!("http://{closed}/img.png"))
        .await;
    assert_eq!(status, 502);
    assert_eq!(body["type"], "FETCH_ERROR");
}
