use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, ETAG, IF_NONE_MATCH, RANGE};
use reqwest::{Method, Response, StatusCode};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::debug;

use super::progress::{ProgressObserver, progress_stream};
use super::{Location, RemoteFile, WebDavClient, multistatus};
use crate::accessor::ClientCredentialsAccessor;
use crate::client::{AuthenticatingClient, ensure_success, read_text};
use crate::config::{DEFAULT_UPLOAD_BUFFER_SIZE, Environment};
use crate::error::{ClientError, ClientResult, ConfigError};

/// WebDAV client for one instance
#[derive(Clone)]
pub struct SfccWebDavClient {
    client: AuthenticatingClient,
    buffer_size: usize,
}

impl SfccWebDavClient {
    /// Client for `env`.
    ///
    /// Uses the client credentials grant when the environment has an API
    /// client, and falls back to Basic authentication with the Business
    /// Manager account otherwise.
    pub fn new(env: &Environment) -> Result<Self, ConfigError> {
        env.validate()?;
        let http = env.http_client()?;
        let client = if env.has_client_credentials() {
            let accessor = Arc::new(ClientCredentialsAccessor::new(env)?);
            AuthenticatingClient::new(http, env.base_url(), accessor)
        } else {
            debug!("no client credentials; using Basic authentication for WebDAV");
            AuthenticatingClient::with_basic_auth(
                http,
                env.base_url(),
                env.username.clone().unwrap_or_default(),
                env.password.clone().unwrap_or_default(),
            )
        };
        Ok(Self::from_client(client))
    }

    /// Client over an already configured authenticating client
    pub const fn from_client(client: AuthenticatingClient) -> Self {
        Self {
            client,
            buffer_size: DEFAULT_UPLOAD_BUFFER_SIZE,
        }
    }

    /// Chunk size of streamed uploads, and so the granularity of progress
    /// reports
    #[must_use]
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Upload `length` bytes from `reader` without buffering them
    pub async fn put_stream<R>(
        &self,
        location: Location,
        path: &str,
        reader: R,
        length: u64,
        progress: Arc<dyn ProgressObserver>,
    ) -> ClientResult<bool>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        debug!(%location, path, length, "putting file");
        let body = reqwest::Body::wrap_stream(progress_stream(reader, length, self.buffer_size, progress));
        let request = self
            .client
            .request(Method::PUT, &location.path(path))
            .header(CONTENT_LENGTH, length)
            .body(body);
        self.client.send_accepted(request).await
    }

    /// Body of `path` as a stream of chunks
    pub async fn get_stream(
        &self,
        location: Location,
        path: &str,
    ) -> ClientResult<impl Stream<Item = ClientResult<Vec<u8>>> + Send + use<>> {
        let response = self
            .client
            .send(self.client.request(Method::GET, &location.path(path)))
            .await?;
        let response = ensure_success(response).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ClientError::from)))
    }

    async fn propfind(&self, uri: &str, depth: &str) -> ClientResult<Response> {
        let method = Method::from_bytes(b"PROPFIND")
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        self.client
            .send(self.client.request(method, uri).header("Depth", depth))
            .await
    }

    async fn info_at(&self, uri: &str) -> ClientResult<Option<RemoteFile>> {
        let response = self.propfind(uri, "0").await?;
        if !response.status().is_success() {
            debug!(uri, status = %response.status(), "no such WebDAV entry");
            return Ok(None);
        }
        let body = read_text(response).await?;
        Ok(multistatus::parse(&body)?.into_iter().next())
    }

    async fn fetch_body(&self, uri: &str) -> ClientResult<Vec<u8>> {
        let response = self.client.send(self.client.request(Method::GET, uri)).await?;
        let response = ensure_success(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl WebDavClient for SfccWebDavClient {
    async fn list_directory(&self, location: Location, directory: &str) -> ClientResult<Vec<RemoteFile>> {
        debug!(%location, directory, "listing directory");
        let response = self.propfind(&location.path(directory), "1").await?;
        let body = read_text(ensure_success(response).await?).await?;
        // The first entry describes the directory itself
        Ok(multistatus::parse(&body)?.into_iter().skip(1).collect())
    }

    async fn get_info(&self, location: Location, path: &str) -> ClientResult<Option<RemoteFile>> {
        self.info_at(&location.path(path)).await
    }

    async fn get(&self, location: Location, path: &str) -> ClientResult<Option<RemoteFile>> {
        debug!(%location, path, "getting file");
        let uri = location.path(path);
        let Some(mut file) = self.info_at(&uri).await? else {
            return Ok(None);
        };
        if file.is_file() {
            file.fill(self.fetch_body(&uri).await?);
        }
        Ok(Some(file))
    }

    async fn put(&self, location: Location, path: &str, contents: Vec<u8>) -> ClientResult<bool> {
        debug!(%location, path, length = contents.len(), "putting file");
        let request = self.client.request(Method::PUT, &location.path(path)).body(contents);
        self.client.send_accepted(request).await
    }

    async fn put_file(
        &self,
        location: Location,
        path: &str,
        local: &Path,
        progress: Arc<dyn ProgressObserver>,
    ) -> ClientResult<bool> {
        let file = tokio::fs::File::open(local).await?;
        let length = file.metadata().await?.len();
        self.put_stream(location, path, file, length, progress).await
    }

    async fn download(&self, location: Location, path: &str, destination: &Path) -> ClientResult<u64> {
        let mut chunks = Box::pin(self.get_stream(location, path).await?);
        let mut output = tokio::fs::File::create(destination).await?;
        let mut written = 0u64;
        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            output.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        output.flush().await?;
        Ok(written)
    }

    async fn delete(&self, location: Location, path: &str) -> ClientResult<bool> {
        debug!(%location, path, "deleting file");
        self.client
            .send_accepted(self.client.request(Method::DELETE, &location.path(path)))
            .await
    }

    async fn make_directory(&self, location: Location, path: &str) -> ClientResult<bool> {
        debug!(%location, path, "creating directory");
        let uri = location.path(path);
        if self.info_at(&uri).await?.is_some() {
            debug!(%location, path, "directory exists");
            return Ok(true);
        }
        let method =
            Method::from_bytes(b"MKCOL").map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        self.client.send_accepted(self.client.request(method, &uri)).await
    }

    async fn decompress_remote_archive(&self, location: Location, path: &str) -> ClientResult<bool> {
        debug!(%location, path, "unzipping file");
        let request = self
            .client
            .request(Method::POST, &location.path(path))
            .form(&[("method", "UNZIP")]);
        self.client.send_accepted(request).await
    }

    async fn update_if_changed(&self, file: &mut RemoteFile, use_range: bool) -> ClientResult<bool> {
        if file.is_directory {
            return Ok(false);
        }
        let Some(known) = file.contents().map(<[u8]>::len) else {
            let body = self.fetch_body(&file.uri).await?;
            file.fill(body);
            return Ok(true);
        };

        let mut request = self.client.request(Method::GET, &file.uri);
        if use_range {
            request = request.header(RANGE, format!("bytes={known}-"));
        }
        if let Some(etag) = &file.etag {
            request = request.header(IF_NONE_MATCH, etag.as_str());
        }

        let response = self.client.send(request).await?;
        let status = response.status();
        if status == StatusCode::NOT_MODIFIED || status == StatusCode::RANGE_NOT_SATISFIABLE {
            return Ok(false);
        }
        let response = ensure_success(response).await?;

        if let Some(etag) = response.headers().get(ETAG).and_then(|v| v.to_str().ok()) {
            file.etag = Some(etag.to_string());
        }
        let body = response.bytes().await?;

        // A server that ignores the range answers 200 with the whole file
        let fresh: &[u8] = if status == StatusCode::PARTIAL_CONTENT {
            &body
        } else {
            body.get(known..).unwrap_or_default()
        };
        if fresh.is_empty() {
            return Ok(false);
        }

        let length = file.append(fresh);
        debug!(uri = %file.uri, appended = fresh.len(), length, "file grew");
        Ok(true)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
