use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use bytes::Buf;
use futures::Stream;
use log::warn;
use warp::filters::BoxedFilter;
use warp::http::{HeaderMap, Method, StatusCode};
use warp::path::FullPath;
use warp::reply::Response;
use warp::{reply, Filter, Rejection, Reply};

use super::capture::{exchange_from_parts, read_body};
use super::live_channel::serve_observer;
use super::types::{Ack, ApiError, ServiceInfo};
use super::web_server::AppState;
use crate::error_handling::types::{CaptureError, StoreError};

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Query string, empty when there is none.
fn raw_query() -> impl Filter<Extract = (String,), Error = Infallible> + Clone {
    warp::query::raw()
        .or(warp::any().map(String::new))
        .unify()
}

fn error_reply(message: ApiError, status: StatusCode) -> Response {
    reply::with_status(reply::json(&message), status).into_response()
}

fn store_error_reply(err: StoreError) -> Response {
    match err {
        StoreError::NotFound(_) | StoreError::RawUnavailable(_) => {
            error_reply(ApiError::not_found(), StatusCode::NOT_FOUND)
        }
    }
}

async fn handle_inbound<S, B>(
    method: Method,
    path: FullPath,
    query: String,
    headers: HeaderMap,
    remote: Option<SocketAddr>,
    body: S,
    state: AppState,
) -> Result<Response, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    let payload = match read_body(body, state.max_body_bytes).await {
        Ok(payload) => payload,
        Err(err @ CaptureError::PayloadTooLarge { .. }) => {
            warn!("Rejected {} {}: {}", method, path.as_str(), err);
            return Ok(error_reply(
                ApiError::new(err.to_string()),
                StatusCode::PAYLOAD_TOO_LARGE,
            ));
        }
        Err(err @ CaptureError::BodyRead(_)) => {
            warn!("Dropped {} {}: {}", method, path.as_str(), err);
            return Ok(error_reply(
                ApiError::new(err.to_string()),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    let exchange = exchange_from_parts(&method, path.as_str(), query, &headers, remote, payload);
    state.recorder.record(&exchange);

    Ok(reply::with_status("OK", StatusCode::OK).into_response())
}

/// ANY /inbound
pub fn inbound_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("inbound")
        .and(warp::path::end())
        .and(warp::method())
        .and(warp::path::full())
        .and(raw_query())
        .and(warp::header::headers_cloned())
        .and(warp::addr::remote())
        .and(warp::body::stream())
        .and(with_state(state))
        .and_then(handle_inbound)
}

/// GET /api/requests
pub fn list_requests_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "requests")
        .and(warp::get())
        .and(with_state(state))
        .map(|state: AppState| {
            state.store.prune();
            reply::json(&state.store.list())
        })
}

/// GET /api/requests/:id
pub fn get_request_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "requests" / u64)
        .and(warp::get())
        .and(with_state(state))
        .map(|id: u64, state: AppState| match state.store.get(id) {
            Ok(request) => reply::json(request.as_ref()).into_response(),
            Err(e) => store_error_reply(e),
        })
}

/// GET /api/requests/:id/raw
pub fn get_raw_request_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "requests" / u64 / "raw")
        .and(warp::get())
        .and(with_state(state))
        .map(|id: u64, state: AppState| match state.store.raw(id) {
            Ok(bytes) => reply::with_header(
                reply::with_header(bytes, "Content-Type", "application/octet-stream"),
                "Content-Disposition",
                format!("attachment; filename=\"request-{}.txt\"", id),
            )
            .into_response(),
            Err(e) => store_error_reply(e),
        })
}

/// DELETE /api/requests/:id
pub fn delete_request_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "requests" / u64)
        .and(warp::delete())
        .and(with_state(state))
        .map(|id: u64, state: AppState| match state.store.delete(id) {
            Ok(()) => reply::json(&Ack::OK).into_response(),
            Err(e) => store_error_reply(e),
        })
}

/// DELETE /api/requests
pub fn delete_all_requests_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path!("api" / "requests")
        .and(warp::delete())
        .and(with_state(state))
        .map(|state: AppState| {
            state.store.delete_all();
            reply::json(&Ack::OK)
        })
}

/// GET /ws
pub fn live_channel_route(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("ws")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_state(state))
        .map(|ws: warp::ws::Ws, state: AppState| {
            let live_feed = Arc::clone(&state.live_feed);
            ws.on_upgrade(move |socket| serve_observer(socket, live_feed))
        })
}

/// GET /healthz
pub fn healthz_route() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    warp::path("healthz")
        .and(warp::path::end())
        .and(warp::get())
        .map(|| reply::json(&Ack::OK))
}

/// GET / : the bundled frontend when `frontend_dir` exists, service info otherwise.
pub fn index_route(frontend_dir: &Path) -> BoxedFilter<(Response,)> {
    if frontend_dir.is_dir() {
        warp::get()
            .and(warp::fs::dir(frontend_dir.to_path_buf()))
            .map(|file: warp::fs::File| file.into_response())
            .boxed()
    } else {
        warp::path::end()
            .and(warp::get())
            .map(|| reply::json(&ServiceInfo::default()).into_response())
            .boxed()
    }
}
