//! Blocking HTTP client for the simulation API.

use anyhow::{Context, Result, anyhow};
use reqwest::Method;
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{GenerateRequest, GenerateResponse, GraphExport, Health, SimStatus, StateExport, StepRequest, Timeseries};
use crate::config::ViewerConfig;

/// Message shown to the user for a non-success response.
///
/// `<METHOD> <path> failed: <status> <reason>`, followed by `: <body>` when the
/// server sent one.
pub fn failure_message(method: &Method, path: &str, status: u16, reason: &str, body: &str) -> String {
    let mut message = format!("{} {} failed: {}", method, path, status);
    if !reason.is_empty() {
        message.push(' ');
        message.push_str(reason);
    }
    let body = body.trim();
    if !body.is_empty() {
        message.push_str(": ");
        message.push_str(body);
    }
    message
}

/// Client for the simulation backend.
pub struct SimApiClient {
    client: Client,
    base: String,
    preset: String,
}

impl SimApiClient {
    pub fn new(config: &ViewerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base: config.api_base().to_string(),
            preset: config.preset.clone(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn health(&self) -> Result<Health> {
        self.request::<(), _>(Method::GET, "/health", None)
    }

    /// Create a new graph of `n` nodes and a simulation on it.
    pub fn generate(&self, n: u32) -> Result<GenerateResponse> {
        let path = format!("/graph/generate/{}", self.preset);
        self.request(Method::POST, &path, Some(&GenerateRequest { n }))
    }

    pub fn graph_export(&self, graph_id: &str) -> Result<GraphExport> {
        self.request::<(), _>(Method::GET, &format!("/graph/{}/export/json", graph_id), None)
    }

    pub fn state_export(&self, sim_id: &str) -> Result<StateExport> {
        self.request::<(), _>(Method::GET, &format!("/sim/{}/export/state.json", sim_id), None)
    }

    pub fn timeseries(&self, sim_id: &str) -> Result<Timeseries> {
        self.request::<(), _>(Method::GET, &format!("/sim/{}/timeseries", sim_id), None)
    }

    pub fn step(&self, sim_id: &str, days: u32) -> Result<SimStatus> {
        self.request(Method::POST, &format!("/sim/{}/step", sim_id), Some(&StepRequest { days }))
    }

    fn request<B: Serialize, T: DeserializeOwned>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        log::debug!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().with_context(|| format!("{} {} failed", method, path))?;
        let response = Self::check(&method, path, response)?;
        response.json::<T>().with_context(|| format!("{} {}: invalid response body", method, path))
    }

    fn check(method: &Method, path: &str, response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let reason = status.canonical_reason().unwrap_or("");
        let body = response.text().unwrap_or_default();
        Err(anyhow!(failure_message(method, path, status.as_u16(), reason, &body)))
    }
}
