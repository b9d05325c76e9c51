#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use powchain_node::{app, AppState, NodeConfig};
use serde_json::Value;
use std::fs;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;

pub struct Response {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A node state with a throwaway public dir holding a couple of static files.
pub fn create_test_state(config: NodeConfig) -> (TempDir, AppState) {
    let temp_dir = tempdir().expect("Failed to create temp dir");
    let public = temp_dir.path();
    fs::write(public.join("index.html"), "<h1>powchain</h1>").unwrap();
    fs::write(public.join("app.js"), "console.log('hi')").unwrap();
    fs::write(public.join("style.css"), "body {}").unwrap();
    fs::write(public.join("logo.bin"), [0u8, 1, 2]).unwrap();
    let config = NodeConfig {
        public_dir: public.to_path_buf(),
        ..config
    };
    let state = AppState::new(config).expect("Failed to build state");
    (temp_dir, state)
}

pub fn create_test_app(difficulty: u32) -> (TempDir, AppState, Router) {
    let (temp_dir, state) = create_test_state(NodeConfig {
        difficulty,
        ..NodeConfig::default()
    });
    let router = app(state.clone());
    (temp_dir, state, router)
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<&str>) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    let request = builder
        .body(body.map(|b| Body::from(b.to_owned())).unwrap_or_else(Body::empty))
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_owned());
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    Response {
        status,
        content_type,
        body,
    }
}

pub async fn get(router: &Router, uri: &str) -> Response {
    send(router, Method::GET, uri, None).await
}

pub async fn post(router: &Router, uri: &str, body: Option<&str>) -> Response {
    send(router, Method::POST, uri, body).await
}
