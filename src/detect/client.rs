//! Inference dispatch client.
//!
//! Submits one encoded frame per call to the detection endpoint and returns
//! the parsed batch. Failures are classified so the pipeline can log and
//! drop the frame; nothing here retries - the next sampled frame is the
//! retry.

use std::time::Duration;

use thiserror::Error;

use crate::detect::result::DetectionBatch;

/// Why a submission produced no batch.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The endpoint could not be reached at all.
    #[error("inference endpoint unreachable: {0}")]
    Network(String),
    /// The endpoint answered with a non-success status.
    #[error("inference endpoint returned status {0}")]
    Server(u16),
    /// The endpoint answered 200 but the body did not match the schema.
    /// Treated upstream as "no detections this tick".
    #[error("inference response malformed: {0}")]
    MalformedResponse(String),
}

/// Anything that can turn an encoded frame into a detection batch.
///
/// The HTTP client below is the production implementation; tests inject
/// their own to drive the pipeline deterministically.
pub trait InferenceClient: Send + Sync {
    fn submit(&self, jpeg: &[u8]) -> Result<DetectionBatch, DispatchError>;
}

/// HTTP client for the `/proxy/detect` endpoint.
pub struct HttpInferenceClient {
    endpoint: String,
    agent: ureq::Agent,
}

impl HttpInferenceClient {
    /// `api_base` is the console backend base URL, e.g. `http://host:8000`.
    pub fn new(api_base: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(5))
            .build();
        Self {
            endpoint: format!("{}/proxy/detect", api_base.trim_end_matches('/')),
            agent,
        }
    }
}

impl InferenceClient for HttpInferenceClient {
    fn submit(&self, jpeg: &[u8]) -> Result<DetectionBatch, DispatchError> {
        let boundary = format!("fodconsole{:016x}", rand::random::<u64>());
        let body = build_multipart(&boundary, "file", "frame.jpg", "image/jpeg", jpeg);
        let response = self
            .agent
            .post(&self.endpoint)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={boundary}"),
            )
            .send_bytes(&body)
            .map_err(|err| match err {
                ureq::Error::Status(code, _) => DispatchError::Server(code),
                ureq::Error::Transport(transport) => {
                    DispatchError::Network(transport.to_string())
                }
            })?;
        parse_batch_reader(response.into_reader())
    }
}

/// Assemble a single-part `multipart/form-data` body by hand; ureq has no
/// multipart helper.
pub(crate) fn build_multipart(
    boundary: &str,
    field: &str,
    filename: &str,
    content_type: &str,
    payload: &[u8],
) -> Vec<u8> {
    let mut body = Vec::with_capacity(payload.len() + 256);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

fn parse_batch_reader(reader: impl std::io::Read) -> Result<DetectionBatch, DispatchError> {
    serde_json::from_reader(reader).map_err(|err| DispatchError::MalformedResponse(err.to_string()))
}
