//! Blocking HTTP implementation of [`AnchorGateway`] on top of `ureq`.
//!
//! Endpoints (relative to `api_root`):
//!
//! - `GET /anchor` returns the full snapshot.
//! - `PUT /anchor` with a [`PutAnchorBody`] confirms, refines or adds.
//! - `DELETE /anchor` with a [`DeleteAnchorBody`] deletes.
//! - `GET /model_update` triggers retraining (long client-side timeout).
//!
//! Every request sends `Content-Type: application/json`. Non-2xx answers are
//! reported as [`FetchError::Service`] with the response headers attached.

use std::time::Duration;

use serde::de::DeserializeOwned;
use ureq::http::Response;
use ureq::{Agent, Body};

use super::{
    Acknowledgement, AnchorBody, AnchorGateway, DeleteAnchorBody, PutAnchorBody,
};
use crate::anchor::{AnchorCell, AnchorSnapshot, ModelArtifact};
use crate::error::FetchError;
use crate::options::ApiOptions;

const CONTENT_TYPE: &str = "application/json";

/// Anchor/model service client.
pub struct HttpGateway {
    anchor_url: String,
    model_url: String,
    agent: Agent,
    model_agent: Agent,
    request_timeout: Duration,
    model_timeout: Duration,
}

impl HttpGateway {
    /// Build a client for the service rooted at `options.api_root`.
    #[must_use]
    pub fn new(options: &ApiOptions) -> Self {
        let root = options.api_root.trim_end_matches('/');
        let request_timeout = Duration::from_secs(options.request_timeout_secs);
        let model_timeout =
            Duration::from_secs(options.model_update_timeout_secs);
        Self {
            anchor_url: format!("{root}/anchor"),
            model_url: format!("{root}/model_update"),
            agent: agent_with_timeout(request_timeout),
            model_agent: agent_with_timeout(model_timeout),
            request_timeout,
            model_timeout,
        }
    }

    /// URL of the anchor endpoint.
    #[must_use]
    pub fn anchor_url(&self) -> &str {
        &self.anchor_url
    }

    fn put(&self, body: &PutAnchorBody) -> Result<Acknowledgement, FetchError> {
        let payload = encode(&self.anchor_url, body)?;
        let result = self
            .agent
            .put(&self.anchor_url)
            .header("Content-Type", CONTENT_TYPE)
            .send(payload.as_str());
        let mut response =
            check(&self.anchor_url, result, self.request_timeout)?;
        decode(&self.anchor_url, &mut response)
    }
}

fn agent_with_timeout(timeout: Duration) -> Agent {
    Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build()
        .into()
}

fn encode<T: serde::Serialize>(
    endpoint: &str,
    body: &T,
) -> Result<String, FetchError> {
    serde_json::to_string(body).map_err(|e| FetchError::Decode {
        endpoint: endpoint.to_owned(),
        message: e.to_string(),
    })
}

/// Map transport failures and non-2xx statuses to [`FetchError`].
fn check(
    endpoint: &str,
    result: Result<Response<Body>, ureq::Error>,
    timeout: Duration,
) -> Result<Response<Body>, FetchError> {
    let response = result.map_err(|e| match e {
        ureq::Error::Timeout(_) => FetchError::Timeout {
            endpoint: endpoint.to_owned(),
            timeout,
        },
        other => FetchError::Transport {
            endpoint: endpoint.to_owned(),
            message: other.to_string(),
        },
    })?;

    if response.status().is_success() {
        return Ok(response);
    }

    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                value.to_str().unwrap_or_default().to_owned(),
            )
        })
        .collect();
    Err(FetchError::Service {
        endpoint: endpoint.to_owned(),
        status: response.status().as_u16(),
        headers,
    })
}

fn read_body(
    endpoint: &str,
    response: &mut Response<Body>,
) -> Result<String, FetchError> {
    response
        .body_mut()
        .read_to_string()
        .map_err(|e| FetchError::Transport {
            endpoint: endpoint.to_owned(),
            message: e.to_string(),
        })
}

fn decode<T: DeserializeOwned>(
    endpoint: &str,
    response: &mut Response<Body>,
) -> Result<T, FetchError> {
    let text = read_body(endpoint, response)?;
    serde_json::from_str(&text).map_err(|e| FetchError::Decode {
        endpoint: endpoint.to_owned(),
        message: e.to_string(),
    })
}

impl AnchorGateway for HttpGateway {
    fn fetch_all(&self, iteration: u64) -> Result<AnchorSnapshot, FetchError> {
        log::debug!("GET {} (iteration {iteration})", self.anchor_url);
        let result = self
            .agent
            .get(&self.anchor_url)
            .header("Content-Type", CONTENT_TYPE)
            .call();
        let mut response =
            check(&self.anchor_url, result, self.request_timeout)?;
        decode(&self.anchor_url, &mut response)
    }

    fn confirm(&self, anchor_id: &str) -> Result<Acknowledgement, FetchError> {
        self.put(&PutAnchorBody::Confirm {
            anchor_id: anchor_id.to_owned(),
        })
    }

    fn refine(
        &self,
        anchor_id: &str,
        cells: &[AnchorCell],
    ) -> Result<Acknowledgement, FetchError> {
        self.put(&PutAnchorBody::Refine {
            anchor: AnchorBody {
                id: anchor_id.to_owned(),
                cells: cells.to_vec(),
            },
        })
    }

    fn add(
        &self,
        anchor_id: &str,
        cells: &[AnchorCell],
    ) -> Result<Acknowledgement, FetchError> {
        self.put(&PutAnchorBody::Add {
            anchor: AnchorBody {
                id: anchor_id.to_owned(),
                cells: cells.to_vec(),
            },
        })
    }

    fn delete(&self, anchor_id: &str) -> Result<Acknowledgement, FetchError> {
        let payload = encode(
            &self.anchor_url,
            &DeleteAnchorBody {
                anchor_id: anchor_id.to_owned(),
            },
        )?;
        let result = self
            .agent
            .delete(&self.anchor_url)
            .header("Content-Type", CONTENT_TYPE)
            .force_send_body()
            .send(payload.as_str());
        let mut response =
            check(&self.anchor_url, result, self.request_timeout)?;
        decode(&self.anchor_url, &mut response)
    }

    fn request_model_update(
        &self,
        next_iteration: u64,
    ) -> Result<ModelArtifact, FetchError> {
        log::info!(
            "requesting model update towards iteration {next_iteration} \
             (timeout {}s)",
            self.model_timeout.as_secs()
        );
        let result = self
            .model_agent
            .get(&self.model_url)
            .header("Content-Type", CONTENT_TYPE)
            .call();
        let mut response = check(&self.model_url, result, self.model_timeout)?;
        let payload = read_body(&self.model_url, &mut response)?;
        Ok(ModelArtifact { payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_are_built_from_api_root() {
        let options = ApiOptions {
            api_root: "http://localhost:7778/api/".into(),
            ..ApiOptions::default()
        };
        let gateway = HttpGateway::new(&options);
        assert_eq!(gateway.anchor_url(), "http://localhost:7778/api/anchor");
        assert_eq!(gateway.model_url, "http://localhost:7778/api/model_update");
        assert_eq!(gateway.model_timeout, Duration::from_secs(600));
    }

    #[test]
    fn unreachable_service_reports_endpoint() {
        let options = ApiOptions {
            api_root: "http://127.0.0.1:1/api".into(),
            request_timeout_secs: 2,
            ..ApiOptions::default()
        };
        let gateway = HttpGateway::new(&options);
        let err = gateway.fetch_all(0).unwrap_err();
        assert_eq!(err.endpoint(), "http://127.0.0.1:1/api/anchor");
    }
}
