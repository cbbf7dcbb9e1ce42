// Copyright (C) 2026  winnyboy5
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
//! Stateless RPC proxy between an HTTP request and the git engine
//!
//! The request body is fed to the child's stdin from its own task while the
//! response streams the child's stdout. Writing everything before reading
//! deadlocks as soon as the payload is larger than the pipe buffer.

use axum::body::Body;
use axum::http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::{Bytes, BytesMut};
use flate2::read::{DeflateDecoder, GzDecoder};
use futures::StreamExt;
use githttp_protocol::Service;
use std::io::{self, Read};
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStderr, ChildStdin};
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;

use crate::engine::GitEngine;
use crate::error::{ServerError, ServerResult};

/// Content encoding of an RPC request body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentEncoding {
    /// No encoding
    Identity,
    /// gzip
    Gzip,
    /// Raw DEFLATE
    Deflate,
}

impl ContentEncoding {
    /// Read the `Content-Encoding` header
    pub fn from_headers(headers: &HeaderMap) -> ServerResult<Self> {
        let Some(value) = headers.get(CONTENT_ENCODING) else {
            return Ok(ContentEncoding::Identity);
        };

        let value = value
            .to_str()
            .map_err(|_| ServerError::UnsupportedEncoding(format!("{:?}", value)))?;

        match value.trim().to_ascii_lowercase().as_str() {
            "" | "identity" => Ok(ContentEncoding::Identity),
            "gzip" | "x-gzip" => Ok(ContentEncoding::Gzip),
            "deflate" => Ok(ContentEncoding::Deflate),
            other => Err(ServerError::UnsupportedEncoding(other.to_string())),
        }
    }

    /// Decompress a complete body, refusing output larger than `limit`
    pub fn decode(self, body: Bytes, limit: usize) -> ServerResult<Bytes> {
        let reader: Box<dyn Read + '_> = match self {
            ContentEncoding::Identity => return Ok(body),
            ContentEncoding::Gzip => Box::new(GzDecoder::new(&body[..])),
            ContentEncoding::Deflate => Box::new(DeflateDecoder::new(&body[..])),
        };

        // One byte past the limit tells an exact fit from an overflow
        let mut decoded = Vec::new();
        reader
            .take(limit as u64 + 1)
            .read_to_end(&mut decoded)
            .map_err(|e| ServerError::Decoding(format!("{:?} body: {}", self, e)))?;

        if decoded.len() > limit {
            return Err(ServerError::PayloadTooLarge(limit));
        }
        Ok(Bytes::from(decoded))
    }

    /// Decompress off the async runtime
    pub async fn decode_blocking(self, body: Bytes, limit: usize) -> ServerResult<Bytes> {
        if self == ContentEncoding::Identity {
            return Ok(body);
        }
        tokio::task::spawn_blocking(move || self.decode(body, limit))
            .await
            .map_err(|e| ServerError::Decoding(format!("decoder task failed: {}", e)))?
    }
}

/// Read a request body, failing once it grows past `limit` bytes
pub async fn read_limited(body: Body, limit: usize) -> ServerResult<Bytes> {
    let mut stream = body.into_data_stream();
    let mut buf = BytesMut::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ServerError::Decoding(e.to_string()))?;
        if buf.len() + chunk.len() > limit {
            return Err(ServerError::PayloadTooLarge(limit));
        }
        buf.extend_from_slice(&chunk);
    }

    Ok(buf.freeze())
}

/// Run `service` for the repository at `dir` with `payload` as its input
///
/// Spawn failures are returned as errors, since nothing has been sent yet.
/// Once the response is returned its status is fixed; later failures are
/// logged and end the body early.
pub async fn proxy(
    engine: &GitEngine,
    service: Service,
    dir: PathBuf,
    payload: Bytes,
) -> ServerResult<Response> {
    let mut child = engine
        .stateless_rpc(service, &dir)
        .spawn()
        .map_err(|e| {
            let context = format!("failed to start {} {}", engine.bin().display(), service);
            ServerError::subprocess(&context, e)
        })?;

    let pipes = (child.stdin.take(), child.stdout.take(), child.stderr.take());
    let (Some(stdin), Some(stdout), Some(stderr)) = pipes else {
        // Reap before reporting
        if let Err(e) = child.kill().await {
            tracing::warn!(repo = %dir.display(), "Failed to kill {}: {}", service, e);
        }
        return Err(ServerError::Subprocess(format!("{} pipes unavailable", service)));
    };

    tracing::debug!(
        repo = %dir.display(),
        service = %service,
        bytes = payload.len(),
        "Proxying stateless RPC"
    );

    let writer = spawn_writer(stdin, payload);
    let drain = spawn_stderr_drain(stderr);

    let body = async_stream::stream! {
        let mut output = ReaderStream::new(stdout);
        let mut failure = None;

        while let Some(chunk) = output.next().await {
            match chunk {
                Ok(bytes) => yield Ok(bytes),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(output);

        match writer.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(repo = %dir.display(), %service, "Writing request failed: {}", e)
            }
            Err(e) => tracing::error!(%service, "Request writer task failed: {}", e),
        }

        match child.wait().await {
            Ok(status) if status.success() => {
                tracing::debug!(repo = %dir.display(), %service, "RPC finished")
            }
            Ok(status) => {
                let repo = dir.display();
                tracing::warn!(%repo, %service, %status, "RPC exited unsuccessfully")
            }
            Err(e) => {
                tracing::error!(repo = %dir.display(), %service, "Failed to wait for child: {}", e)
            }
        }

        match drain.await {
            Ok(stderr) if !stderr.is_empty() => {
                let stderr = stderr.trim_end();
                tracing::warn!(repo = %dir.display(), %service, %stderr, "RPC stderr")
            }
            Ok(_) => {}
            Err(e) => tracing::error!(%service, "Stderr drain task failed: {}", e),
        }

        if let Some(e) = failure {
            tracing::error!(repo = %dir.display(), %service, "Reading RPC output failed: {}", e);
            yield Err::<Bytes, io::Error>(e);
        }
    };

    let content_type = HeaderValue::from_str(&service.result_content_type())
        .map_err(|e| ServerError::subprocess("invalid content type", e))?;

    Ok((
        StatusCode::OK,
        [(CONTENT_TYPE, content_type)],
        Body::from_stream(body),
    )
        .into_response())
}

fn spawn_writer(mut stdin: ChildStdin, payload: Bytes) -> JoinHandle<io::Result<()>> {
    tokio::spawn(async move {
        stdin.write_all(&payload).await?;
        stdin.shutdown().await
    })
}

fn spawn_stderr_drain(mut stderr: ChildStderr) -> JoinHandle<String> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        if let Err(e) = stderr.read_to_end(&mut buf).await {
            tracing::debug!("Reading RPC stderr failed: {}", e);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{DeflateEncoder, GzEncoder};
    use flate2::Compression;
    use std::io::Write;

    const PAYLOAD: &[u8] = b"0032want a647ec2ea40ee9ca35d32232dc28de22b1537e00\n00000009done\n";

    fn headers(encoding: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_str(encoding).unwrap());
        headers
    }

    #[test]
    fn test_encoding_from_headers() {
        assert_eq!(
            ContentEncoding::from_headers(&HeaderMap::new()).unwrap(),
            ContentEncoding::Identity
        );
        assert_eq!(
            ContentEncoding::from_headers(&headers("GZIP")).unwrap(),
            ContentEncoding::Gzip
        );
        assert_eq!(
            ContentEncoding::from_headers(&headers("deflate")).unwrap(),
            ContentEncoding::Deflate
        );
        assert!(matches!(
            ContentEncoding::from_headers(&headers("br")),
            Err(ServerError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_decode_gzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(PAYLOAD).unwrap();
        let compressed = Bytes::from(encoder.finish().unwrap());

        let decoded = ContentEncoding::Gzip.decode(compressed, PAYLOAD.len()).unwrap();
        assert_eq!(&decoded[..], PAYLOAD);
    }

    #[test]
    fn test_decode_raw_deflate() {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::fast());
        encoder.write_all(PAYLOAD).unwrap();
        let compressed = Bytes::from(encoder.finish().unwrap());

        let decoded = ContentEncoding::Deflate.decode(compressed, 1024).unwrap();
        assert_eq!(&decoded[..], PAYLOAD);
    }

    #[test]
    fn test_decode_malformed_gzip() {
        let err = ContentEncoding::Gzip
            .decode(Bytes::from_static(b"definitely not gzip"), 1024)
            .unwrap_err();
        assert!(matches!(err, ServerError::Decoding(_)));
    }

    #[tokio::test]
    async fn test_identity_passthrough() {
        let body = Bytes::from_static(PAYLOAD);
        let decoded = ContentEncoding::Identity
            .decode_blocking(body.clone(), PAYLOAD.len())
            .await
            .unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_decoded_size_is_capped() {
        // Compresses to a few kilobytes
        let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
        encoder.write_all(&vec![0u8; 4 * 1024 * 1024]).unwrap();
        let compressed = Bytes::from(encoder.finish().unwrap());
        assert!(compressed.len() < 64 * 1024);

        let err = ContentEncoding::Gzip
            .decode(compressed.clone(), 64 * 1024)
            .unwrap_err();
        assert!(matches!(err, ServerError::PayloadTooLarge(65536)));

        let exact = ContentEncoding::Gzip.decode(compressed, 4 * 1024 * 1024).unwrap();
        assert_eq!(exact.len(), 4 * 1024 * 1024);
    }

    #[tokio::test]
    async fn test_read_limited() {
        let body = read_limited(Body::from(PAYLOAD), PAYLOAD.len()).await.unwrap();
        assert_eq!(&body[..], PAYLOAD);

        let err = read_limited(Body::from(PAYLOAD), PAYLOAD.len() - 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::PayloadTooLarge(_)));
    }

    #[tokio::test]
    async fn test_spawn_failure_is_error() {
        let engine = GitEngine::new("/nonexistent/bin/git");
        let result = proxy(
            &engine,
            Service::UploadPack,
            std::env::temp_dir(),
            Bytes::from_static(PAYLOAD),
        )
        .await;
        assert!(matches!(result, Err(ServerError::Subprocess(_))));
    }
}
