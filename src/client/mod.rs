//! HTTP transport used by the upload form.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};

use crate::dto::UploadResponse;
use crate::forms::upload::SelectedFile;

/// Prefix of the multipart field names the upload endpoint accepts.
pub const FILE_FIELD_PREFIX: &str = "file";

/// Errors raised while talking to the upload endpoint.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("upload request failed")]
    Http(#[from] reqwest::Error),
}

/// Multipart body built from a validated selection, keyed `file0`, `file1`, ...
#[derive(Clone, Debug)]
pub struct UploadPayload {
    parts: Vec<(String, SelectedFile)>,
}

impl UploadPayload {
    pub fn from_files(files: &[SelectedFile]) -> Self {
        let parts = files
            .iter()
            .enumerate()
            .map(|(index, file)| (format!("{FILE_FIELD_PREFIX}{index}"), file.clone()))
            .collect();
        Self { parts }
    }

    pub fn parts(&self) -> &[(String, SelectedFile)] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn into_form(self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        for (key, file) in self.parts {
            let part = Part::bytes(file.content.to_vec())
                .file_name(file.name)
                .mime_str(&file.mime_type)?;
            form = form.part(key, part);
        }
        Ok(form)
    }
}

/// Sends an upload payload and returns the endpoint's JSON answer.
#[async_trait]
pub trait UploadTransport: Send + Sync {
    async fn send(&self, payload: UploadPayload) -> Result<UploadResponse, ClientError>;
}

/// Posts payloads to the upload endpoint over HTTP.
#[derive(Clone, Debug)]
pub struct HttpUploadClient {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpUploadClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl UploadTransport for HttpUploadClient {
    async fn send(&self, payload: UploadPayload) -> Result<UploadResponse, ClientError> {
        let form = payload.into_form()?;
        // Error statuses carry the same JSON shape, so the body is read either way.
        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn png(name: &str) -> SelectedFile {
        SelectedFile::new(name, "image/png", Bytes::from_static(b"PNG"))
    }

    #[test]
    fn payload_keys_are_indexed() {
        let payload = UploadPayload::from_files(&[png("a.png"), png("b.png")]);
        let keys: Vec<&str> = payload.parts().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["file0", "file1"]);
    }

    #[tokio::test]
    async fn send_posts_multipart_parts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .and(body_string_contains("name=\"file0\"; filename=\"a.png\""))
            .and(body_string_contains("name=\"file1\"; filename=\"b.png\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "Files uploaded successfully",
                "files": [
                    {"fileId": "1", "fileName": "a.png"},
                    {"fileId": "2", "fileName": "b.png"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpUploadClient::new(format!("{}/api/upload", server.uri()));
        let response = client
            .send(UploadPayload::from_files(&[png("a.png"), png("b.png")]))
            .await
            .unwrap();

        assert!(response.success);
        assert_eq!(response.files.map(|f| f.len()), Some(2));
    }

    #[tokio::test]
    async fn send_reads_failure_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/upload"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "success": false,
                "message": "File upload failed"
            })))
            .mount(&server)
            .await;

        let client = HttpUploadClient::new(format!("{}/api/upload", server.uri()));
        let response = client
            .send(UploadPayload::from_files(&[png("a.png")]))
            .await
            .unwrap();

        assert_eq!(response, UploadResponse::failure("File upload failed"));
    }
}
