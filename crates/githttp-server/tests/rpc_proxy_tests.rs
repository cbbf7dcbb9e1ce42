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
// RPC proxy and ref advertisement tests against a shell script standing in
// for the git executable.
#![cfg(unix)]

use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use flate2::write::GzEncoder;
use flate2::Compression;
use githttp_protocol::{ChannelSink, Event, EventType};
use githttp_server::{create_router, AccessMode, AppState, ServerConfig};
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;
use tower::ServiceExt;

const WANT: &str = "a647ec2ea40ee9ca35d32232dc28de22b1537e00";
const ZERO: &str = "0000000000000000000000000000000000000000";
const MASTER: &str = "92eef6dc0c4e4d2bbd8b4a1d0e3a3b3f6f1c2f16";

// upload-pack echoes its input, receive-pack prefixes its arguments, and
// `config` reports every key as unset.
const FAKE_GIT: &str = r#"#!/bin/sh
case "$1" in
  upload-pack|receive-pack)
    if [ "$3" = "--advertise-refs" ]; then
      printf '003f92eef6dc0c4e4d2bbd8b4a1d0e3a3b3f6f1c2f16 refs/heads/master\n0000'
      exit 0
    fi
    if [ "$1" = "receive-pack" ]; then
      printf '%s\n' "$*"
    fi
    echo "fake git: $1 in $(pwd)" >&2
    exec cat
    ;;
  update-server-info)
    mkdir -p info
    printf '92eef6dc0c4e4d2bbd8b4a1d0e3a3b3f6f1c2f16\trefs/heads/master\n' > info/refs
    ;;
  config)
    exit 1
    ;;
  *)
    exit 2
    ;;
esac
"#;

/// Written once per test binary so no test execs a file another is writing
fn fake_git() -> &'static Path {
    static ENGINE: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_dir, path) = ENGINE.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("git");
        std::fs::write(&path, FAKE_GIT).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        (dir, path)
    });
    path
}

struct Fixture {
    root: TempDir,
    app: Router,
    events: UnboundedReceiver<Event>,
}

impl Fixture {
    fn new(receive_pack: AccessMode) -> Self {
        Self::with_engine(receive_pack, fake_git().to_path_buf())
    }

    fn with_engine(receive_pack: AccessMode, git_bin_path: PathBuf) -> Self {
        Self::build(ServerConfig {
            git_bin_path,
            receive_pack,
            ..ServerConfig::default()
        })
    }

    fn with_body_limit(max_body_bytes: usize) -> Self {
        Self::build(ServerConfig {
            git_bin_path: fake_git().to_path_buf(),
            max_body_bytes,
            ..ServerConfig::default()
        })
    }

    fn build(config: ServerConfig) -> Self {
        let root = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(root.path().join("project.git")).unwrap();

        let config = ServerConfig {
            project_root: Some(root.path().to_path_buf()),
            ..config
        };
        let (sink, events) = ChannelSink::new();
        let state = AppState::new(config).unwrap().with_event_sink(Arc::new(sink));

        Self {
            root,
            app: create_router(Arc::new(state)),
            events,
        }
    }

    fn repo_dir(&self) -> PathBuf {
        self.root.path().join("project.git")
    }

    fn drain_events(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

fn rpc_request(service: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(format!("/project.git/git-{}", service))
        .header(header::CONTENT_TYPE, format!("application/x-git-{}-request", service))
        .body(body.into())
        .unwrap()
}

fn upload_payload() -> String {
    format!("0032want {}\n00000009done\n", WANT)
}

fn receive_payload() -> String {
    format!("0084{} {} refs/heads/master\0 report-status side-band-64k0000PACK", ZERO, MASTER)
}

async fn read_body(response: axum::response::Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn test_upload_pack_streams_engine_output() {
    let mut fixture = Fixture::new(AccessMode::Repository);
    let response = fixture
        .app
        .clone()
        .oneshot(rpc_request("upload-pack", upload_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-git-upload-pack-result"
    );
    assert_eq!(read_body(response).await, upload_payload().into_bytes());

    let events = fixture.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Fetch);
    assert_eq!(events[0].commit, WANT);
    assert_eq!(events[0].dir, fixture.repo_dir());
}

#[tokio::test]
async fn test_receive_pack_denied_without_repository_setting() {
    let mut fixture = Fixture::new(AccessMode::Repository);
    let response = fixture
        .app
        .clone()
        .oneshot(rpc_request("receive-pack", receive_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(read_body(response).await, b"Forbidden");
    assert!(fixture.drain_events().is_empty());
}

#[tokio::test]
async fn test_receive_pack_forced() {
    let mut fixture = Fixture::new(AccessMode::Force);
    let response = fixture
        .app
        .clone()
        .oneshot(rpc_request("receive-pack", receive_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = read_body(response).await;
    let expected_args = format!(
        "receive-pack --stateless-rpc {}\n",
        fixture.repo_dir().display()
    );
    assert!(body.starts_with(expected_args.as_bytes()));
    assert!(body.ends_with(receive_payload().as_bytes()));

    let events = fixture.drain_events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, EventType::Push);
    assert_eq!(events[0].last.as_deref(), Some(ZERO));
    assert_eq!(events[0].commit, MASTER);
    assert_eq!(events[0].branch.as_deref(), Some("master"));
}

#[tokio::test]
async fn test_payload_larger_than_pipe_buffer() {
    let fixture = Fixture::new(AccessMode::Repository);

    // Well past any pipe buffer, so writing it all before reading would hang
    let mut payload = upload_payload().into_bytes();
    payload.extend(std::iter::repeat_n(b'x', 8 * 1024 * 1024));
    let expected_len = payload.len();

    let response = tokio::time::timeout(Duration::from_secs(60), async {
        let response = fixture
            .app
            .clone()
            .oneshot(rpc_request("upload-pack", payload))
            .await
            .unwrap();
        read_body(response).await
    })
    .await
    .expect("proxy deadlocked");

    assert_eq!(response.len(), expected_len);
}

#[tokio::test]
async fn test_gzip_body_is_decoded() {
    let mut fixture = Fixture::new(AccessMode::Repository);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(upload_payload().as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut request = rpc_request("upload-pack", compressed);
    request
        .headers_mut()
        .insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());

    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_body(response).await, upload_payload().into_bytes());
    assert_eq!(fixture.drain_events().len(), 1);
}

#[tokio::test]
async fn test_body_over_limit() {
    let mut fixture = Fixture::with_body_limit(16);
    let response = fixture
        .app
        .clone()
        .oneshot(rpc_request("upload-pack", upload_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(fixture.drain_events().is_empty());
}

#[tokio::test]
async fn test_decompressed_body_over_limit() {
    let mut fixture = Fixture::with_body_limit(64 * 1024);

    // A few kilobytes on the wire, 32 MiB once inflated
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(upload_payload().as_bytes()).unwrap();
    encoder.write_all(&vec![b'x'; 32 * 1024 * 1024]).unwrap();
    let compressed = encoder.finish().unwrap();
    assert!(compressed.len() < 64 * 1024);

    let mut request = rpc_request("upload-pack", compressed);
    request
        .headers_mut()
        .insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());

    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert!(fixture.drain_events().is_empty());
}

#[tokio::test]
async fn test_unsupported_encoding() {
    let fixture = Fixture::new(AccessMode::Repository);
    let mut request = rpc_request("upload-pack", upload_payload());
    request
        .headers_mut()
        .insert(header::CONTENT_ENCODING, "br".parse().unwrap());

    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn test_malformed_gzip_body() {
    let fixture = Fixture::new(AccessMode::Repository);
    let mut request = rpc_request("upload-pack", "this is not gzip");
    request
        .headers_mut()
        .insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());

    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_content_type_forbidden() {
    let fixture = Fixture::new(AccessMode::Force);
    let mut request = rpc_request("upload-pack", upload_payload());
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        "application/x-git-receive-pack-request".parse().unwrap(),
    );

    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_missing_engine_before_commit() {
    let fixture = Fixture::with_engine(AccessMode::Force, "/nonexistent/bin/git".into());
    let response = fixture
        .app
        .clone()
        .oneshot(rpc_request("receive-pack", receive_payload()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_smart_ref_advertisement() {
    let fixture = Fixture::new(AccessMode::Repository);
    let request = Request::builder()
        .uri("/project.git/info/refs?service=git-upload-pack")
        .body(Body::empty())
        .unwrap();

    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-git-upload-pack-advertisement"
    );
    assert_eq!(response.headers()[header::PRAGMA], "no-cache");

    let body = String::from_utf8(read_body(response).await).unwrap();
    assert_eq!(
        body,
        format!(
            "001e# service=git-upload-pack\n0000003f{} refs/heads/master\n0000",
            MASTER
        )
    );
}

#[tokio::test]
async fn test_dumb_info_refs_when_service_denied() {
    let fixture = Fixture::new(AccessMode::Repository);
    let request = Request::builder()
        .uri("/project.git/info/refs?service=git-receive-pack")
        .body(Body::empty())
        .unwrap();

    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "text/plain; charset=utf-8"
    );

    let body = String::from_utf8(read_body(response).await).unwrap();
    assert_eq!(body, format!("{}\trefs/heads/master\n", MASTER));
}

#[tokio::test]
async fn test_dumb_info_refs_without_service() {
    let fixture = Fixture::new(AccessMode::Force);
    let request = Request::builder()
        .uri("/project.git/info/refs")
        .body(Body::empty())
        .unwrap();

    let response = fixture.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CACHE_CONTROL],
        "no-cache, max-age=0, must-revalidate"
    );
}
