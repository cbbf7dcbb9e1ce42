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
//! Request dispatch and operation handlers

use axum::body::Body;
use axum::extract::{Query, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use githttp_protocol::{extract_events, pktline, Operation, Service};
use std::collections::HashMap;
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ServerError, ServerResult};
use crate::files::{CachePolicy, FileResponse};
use crate::routing::RouteMiss;
use crate::rpc::{self, ContentEncoding};
use crate::state::AppState;

/// Everything one request needs after routing
#[derive(Debug)]
pub struct RequestContext {
    /// Existing repository directory
    pub repo_dir: PathBuf,
    /// Selected operation
    pub operation: Operation,
    /// Path of the requested file inside the repository
    pub file_path: String,
    /// Request URI
    pub uri: Uri,
    /// Request headers
    pub headers: HeaderMap,
    /// Request body, possibly content-encoded
    pub body: Body,
}

/// Fallback handler for every git HTTP endpoint
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    match handle(&state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

async fn handle(state: &AppState, request: Request) -> ServerResult<Response> {
    let path = decoded_path(request.uri())?;
    let route = state
        .routes
        .resolve(&path, request.method())
        .map_err(|miss| match miss {
            RouteMiss::NotFound => ServerError::RouteNotFound(path.clone()),
            RouteMiss::WrongMethod { .. } => ServerError::method_not_allowed(request.version()),
        })?;

    let repo_dir = state.resolver.resolve(&route.repo_prefix).await?;

    tracing::debug!(
        repo = %repo_dir.display(),
        operation = %route.operation,
        file = %route.file_path,
        "Routed request"
    );

    let (parts, body) = request.into_parts();
    let ctx = RequestContext {
        repo_dir,
        operation: route.operation,
        file_path: route.file_path,
        uri: parts.uri,
        headers: parts.headers,
        body,
    };

    match ctx.operation.service() {
        Some(service) => service_rpc(state, service, ctx).await,
        None if ctx.operation == Operation::AdvertiseRefs => info_refs(state, ctx).await,
        None => send_file(ctx).await,
    }
}

/// `POST .../git-upload-pack` and `POST .../git-receive-pack`
pub async fn service_rpc(
    state: &AppState,
    service: Service,
    ctx: RequestContext,
) -> ServerResult<Response> {
    let declared = ctx
        .headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let decision = state
        .access
        .check(ctx.operation, &ctx.repo_dir, Some(declared))
        .await;
    if !decision.allowed {
        return Err(ServerError::AccessDenied(decision.to_string()));
    }

    let encoding = ContentEncoding::from_headers(&ctx.headers)?;
    let limit = state.config.max_body_bytes;
    let raw = rpc::read_limited(ctx.body, limit).await?;
    let payload = encoding.decode_blocking(raw, limit).await?;

    if let Some(sink) = &state.event_sink {
        for event in extract_events(service, ctx.repo_dir.clone(), &payload) {
            sink.publish(event);
        }
    }

    rpc::proxy(&state.engine, service, ctx.repo_dir, payload).await
}

/// `GET .../info/refs`, smart advertisement or dumb fallback
pub async fn info_refs(state: &AppState, ctx: RequestContext) -> ServerResult<Response> {
    let requested = requested_service(&ctx.uri);

    if let Some(service) = requested {
        let decision = state
            .access
            .check_service(service, &ctx.repo_dir, None)
            .await;
        if decision.allowed {
            return advertise(state, service, &ctx.repo_dir).await;
        }
        tracing::debug!(
            repo = %ctx.repo_dir.display(),
            service = %service,
            %decision,
            "Falling back to dumb info/refs"
        );
    }

    state.engine.update_server_info(&ctx.repo_dir).await?;
    FileResponse::INFO_REFS.send(&ctx.repo_dir, "info/refs").await
}

async fn advertise(
    state: &AppState,
    service: Service,
    repo_dir: &Path,
) -> ServerResult<Response> {
    let refs = state.engine.advertise_refs(service, repo_dir).await?;

    let mut body = pktline::service_announcement(service.as_str());
    body.extend_from_slice(&refs);

    let mut headers = HeaderMap::new();
    let content_type = HeaderValue::from_str(&service.advertisement_content_type())
        .map_err(|e| ServerError::subprocess("invalid content type", e))?;
    headers.insert(CONTENT_TYPE, content_type);
    CachePolicy::NoCache.apply(&mut headers, Utc::now());

    Ok((StatusCode::OK, headers, body).into_response())
}

/// Percent-decoded request path
///
/// Segments are decoded before routing so `%2e%2e` meets the same traversal
/// checks as a literal `..`.
fn decoded_path(uri: &Uri) -> ServerResult<String> {
    percent_decode_str(uri.path())
        .decode_utf8()
        .map(|path| path.into_owned())
        .map_err(|_| ServerError::RouteNotFound(uri.path().to_string()))
}

/// The `service` query parameter, if it names a known service
fn requested_service(uri: &Uri) -> Option<Service> {
    let Query(params) = Query::<HashMap<String, String>>::try_from_uri(uri).ok()?;
    params.get("service").and_then(|s| Service::from_query(s))
}

/// Dumb protocol files
pub async fn send_file(ctx: RequestContext) -> ServerResult<Response> {
    let response = FileResponse::for_operation(ctx.operation)
        .ok_or_else(|| ServerError::RouteNotFound(ctx.file_path.clone()))?;
    response.send(&ctx.repo_dir, &ctx.file_path).await
}
