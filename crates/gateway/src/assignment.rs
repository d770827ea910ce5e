//! Per-request assignment middleware and the `Exp` extractor.

use std::convert::Infallible;
use std::sync::Arc;

use abwright_core::{Assignment, HeaderCookieJar, RequestContext};
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::SharedState;

/// The visitor's assignment, injected into request extensions by
/// [`assignment_middleware`].
///
/// Handlers take `Exp` as an extractor; outside the middleware it yields the
/// inactive assignment.
#[derive(Debug, Clone)]
pub struct Exp(pub Arc<Assignment>);

impl Exp {
    pub fn assignment(&self) -> &Assignment {
        &self.0
    }
}

impl<S> FromRequestParts<S> for Exp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Exp>()
            .cloned()
            .unwrap_or_else(|| Exp(Arc::new(Assignment::none()))))
    }
}

/// Assign the request to an experiment before the handler runs.
///
/// Loads the catalog, runs the engine against the request's cookies, inserts
/// [`Exp`] for the handler and appends any `Set-Cookie` header the
/// assignment produced. Never rejects the request.
pub async fn assignment_middleware(
    State(state): State<SharedState>,
    mut req: Request,
    next: Next,
) -> Response {
    let ctx = request_context(&req);
    let cookie_header = joined_cookie_header(req.headers());
    let mut jar = HeaderCookieJar::from_header(cookie_header.as_deref());

    let catalog = state.catalog.load().await;
    let assignment = state.engine.assign(&catalog, &ctx, &mut jar);
    debug!(
        path = %ctx.path,
        experiment = assignment.experiment_id().unwrap_or("-"),
        variants = ?assignment.variant_indexes,
        "Request assigned"
    );

    req.extensions_mut().insert(Exp(Arc::new(assignment)));
    let mut response = next.run(req).await;

    for cookie in jar.into_set_cookie_headers() {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Assignment cookie is not a valid header value"),
        }
    }
    response
}

/// Snapshot the parts of the request eligibility rules can inspect.
pub fn request_context(req: &Request) -> RequestContext {
    let mut ctx = RequestContext::server()
        .with_method(req.method().as_str())
        .with_path(req.uri().path());
    if let Some(query) = req.uri().query() {
        ctx = ctx.with_query_string(query);
    }
    for (name, value) in req.headers() {
        if let Ok(value) = value.to_str() {
            ctx = ctx.with_header(name.as_str(), value);
        }
    }
    ctx
}

fn joined_cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    (!values.is_empty()).then(|| values.join("; "))
}
