//! CORS middleware.
//!
//! Answers preflight (`OPTIONS`) requests directly with 204 and the allowed
//! methods/headers/origin; every other request gets the allowed origin
//! header and continues down the chain.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::http::{Request, ResponseWriter};
use crate::middleware::{handler_fn, HandlerFunc, Middleware};

/// CORS settings, loadable from the `[cors]` config table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsMiddleware {
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allowed_origin: String,
}

impl Default for CorsMiddleware {
    fn default() -> Self {
        Self {
            allowed_methods: vec!["GET".into(), "POST".into(), "OPTIONS".into()],
            allowed_headers: vec!["Content-Type".into(), "Origin".into()],
            allowed_origin: "*".to_string(),
        }
    }
}

struct Prepared {
    methods: HeaderValue,
    headers: HeaderValue,
    origin: HeaderValue,
}

fn header_value(value: String) -> HeaderValue {
    HeaderValue::from_str(&value).unwrap_or_else(|_| {
        tracing::warn!(value = %value, "invalid CORS header value, sending empty");
        HeaderValue::from_static("")
    })
}

impl Middleware for CorsMiddleware {
    fn middleware(&self, next: HandlerFunc) -> HandlerFunc {
        let prepared = Arc::new(Prepared {
            methods: header_value(self.allowed_methods.join(",")),
            headers: header_value(self.allowed_headers.join(",")),
            origin: header_value(self.allowed_origin.clone()),
        });

        handler_fn(move |mut w: ResponseWriter, r: Request| {
            let next = next.clone();
            let prepared = prepared.clone();
            async move {
                if *r.method() == Method::OPTIONS {
                    let headers = w.headers_mut();
                    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, prepared.methods.clone());
                    headers.insert(header::ACCESS_CONTROL_ALLOW_HEADERS, prepared.headers.clone());
                    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, prepared.origin.clone());
                    w.write_header(StatusCode::NO_CONTENT);
                    return w;
                }
                w.headers_mut()
                    .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, prepared.origin.clone());
                next(w, r).await
            }
        })
    }
}
