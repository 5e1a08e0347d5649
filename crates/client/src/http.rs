//! HTTP transport over `reqwest`.

use std::future::Future;
use std::pin::Pin;

use bigfile_protocol::constants::{
    CHECK_PATH, FIELD_CHUNK, FIELD_CHUNKS, FIELD_FILE, FIELD_MD5, FIELD_NAME, MERGE_PATH,
    UPLOAD_PATH,
};
use bigfile_protocol::{CheckParams, CheckResponse, JsonResult, MergeParams, MergeResponse, UploadResponse};
use bigfile_transfer::Fingerprint;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::transport::{ChunkUpload, RemoteStatus, UploadTransport};

/// Talks to a `bigfile-server` over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    /// Creates a transport for the server at `base_url` (e.g. `http://127.0.0.1:8686`).
    pub fn new(base_url: impl Into<String>) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_client(http, base_url))
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Sends `req` and unwraps the result envelope.
    ///
    /// Error statuses still carry an envelope; its code and message win
    /// over the bare status when it parses.
    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.bytes().await?;

        let envelope: JsonResult<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(_) if !status.is_success() => {
                return Err(ClientError::Status {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&body).into_owned(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        envelope.into_result()?.ok_or(ClientError::EmptyResponse)
    }
}

impl UploadTransport for HttpTransport {
    fn check<'a>(
        &'a self,
        fp: &'a Fingerprint,
    ) -> Pin<Box<dyn Future<Output = Result<RemoteStatus, ClientError>> + Send + 'a>> {
        Box::pin(async move {
            let params = CheckParams {
                file_md5: fp.to_string(),
            };
            let req = self.http.post(self.url(CHECK_PATH)).query(&params);
            let resp: CheckResponse = self.send(req).await?;
            Ok(resp.into())
        })
    }

    fn upload_chunk<'a>(
        &'a self,
        chunk: &'a ChunkUpload,
    ) -> Pin<Box<dyn Future<Output = Result<u32, ClientError>> + Send + 'a>> {
        Box::pin(async move {
            let part = Part::bytes(chunk.data.clone()).file_name(chunk.file_name.clone());
            let form = Form::new()
                .text(FIELD_MD5, chunk.fingerprint.to_string())
                .text(FIELD_CHUNK, chunk.index.to_string())
                .text(FIELD_CHUNKS, chunk.total.to_string())
                .text(FIELD_NAME, chunk.file_name.clone())
                .part(FIELD_FILE, part);

            let req = self.http.post(self.url(UPLOAD_PATH)).multipart(form);
            let resp: UploadResponse = self.send(req).await?;
            Ok(resp.uploaded_chunk_count)
        })
    }

    fn merge<'a>(
        &'a self,
        fp: &'a Fingerprint,
        file_name: &'a str,
        total: u32,
    ) -> Pin<Box<dyn Future<Output = Result<MergeResponse, ClientError>> + Send + 'a>> {
        Box::pin(async move {
            let params = MergeParams {
                file_name: file_name.to_string(),
                file_md5: fp.to_string(),
                chunks: Some(total),
            };
            let req = self.http.post(self.url(MERGE_PATH)).query(&params);
            self.send(req).await
        })
    }
}
