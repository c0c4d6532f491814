//! Outbound HTTP for the chat widget.
//!
//! The widget never awaits anything itself: it hands a request to a
//! [`ChatTransport`] together with a one-shot sender and polls the matching
//! receiver once per frame. In the browser the request runs on the JS event
//! loop through `gloo-net`; natively a worker thread runs a blocking
//! `reqwest` call. Neither path has a timeout.

use anyhow::{Context as _, bail};
use futures_channel::oneshot;
use serde::{Deserialize, Serialize};

use crate::message::ContextMessage;

/// JSON body POSTed to the chat endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question: String,
    pub previous_messages: Vec<ContextMessage>,
}

/// Expected reply body. Any other shape counts as a failed turn.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Everything a transport needs to issue one POST.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub endpoint: String,
    pub api_key: String,
    pub body: ChatRequest,
}

pub type ReplySender = oneshot::Sender<anyhow::Result<String>>;

pub trait ChatTransport {
    /// Starts the request and returns immediately. The outcome must be
    /// delivered through `reply`; dropping it counts as a failure.
    fn dispatch(&self, outbound: Outbound, reply: ReplySender);
}

/// Pulls the `response` field out of a successful body.
pub fn parse_reply(status: u16, body: &str) -> anyhow::Result<String> {
    if !(200..300).contains(&status) {
        bail!("API request failed with status {status}");
    }
    let parsed: ChatResponse =
        serde_json::from_str(body).context("malformed chat response body")?;
    Ok(parsed.response)
}

// ── Browser ────────────────────────────────────────────────────────────────

#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default, Clone, Copy)]
pub struct FetchTransport;

#[cfg(target_arch = "wasm32")]
impl ChatTransport for FetchTransport {
    fn dispatch(&self, outbound: Outbound, reply: ReplySender) {
        crate::execute(async move {
            let result = post_fetch(&outbound).await;
            // receiver gone means the widget was torn down; nothing to do
            let _ = reply.send(result);
        });
    }
}

#[cfg(target_arch = "wasm32")]
async fn post_fetch(outbound: &Outbound) -> anyhow::Result<String> {
    use gloo_net::http::Request;

    let response = Request::post(&outbound.endpoint)
        .header("x-api-key", &outbound.api_key)
        .json(&outbound.body)
        .map_err(|e| anyhow::anyhow!("could not encode request: {e}"))?
        .send()
        .await
        .map_err(|e| anyhow::anyhow!("network error: {e}"))?;
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| anyhow::anyhow!("could not read response body: {e}"))?;
    parse_reply(status, &body)
}

// ── Native ─────────────────────────────────────────────────────────────────

#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default, Clone)]
pub struct BlockingTransport {
    client: reqwest::blocking::Client,
}

#[cfg(not(target_arch = "wasm32"))]
impl ChatTransport for BlockingTransport {
    fn dispatch(&self, outbound: Outbound, reply: ReplySender) {
        let client = self.client.clone();
        crate::execute(async move {
            let result = post_blocking(&client, &outbound);
            let _ = reply.send(result);
        });
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn post_blocking(client: &reqwest::blocking::Client, outbound: &Outbound) -> anyhow::Result<String> {
    let response = client
        .post(&outbound.endpoint)
        .header("x-api-key", &outbound.api_key)
        .json(&outbound.body)
        .send()
        .context("network error")?;
    let status = response.status().as_u16();
    let body = response.text().context("could not read response body")?;
    parse_reply(status, &body)
}
