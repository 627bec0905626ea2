//! Request logging middleware.

use std::time::Instant;

use crate::http::{Request, ResponseWriter};
use crate::middleware::{handler_fn, HandlerFunc, Middleware};

/// Emits one `tracing` event per request with method, path, status and latency.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestLogger;

impl Middleware for RequestLogger {
    fn middleware(&self, next: HandlerFunc) -> HandlerFunc {
        handler_fn(move |w: ResponseWriter, r: Request| {
            let next = next.clone();
            async move {
                let start = Instant::now();
                let method = r.method().clone();
                // The query string carries call arguments; keep it out of logs.
                let path = r.uri().path().to_string();
                let route = r.route().map(|route| route.key());

                let w = next(w, r).await;

                tracing::info!(
                    method = %method,
                    path = %path,
                    route = route.as_deref().unwrap_or("none"),
                    status = w.status().map(|s| s.as_u16()).unwrap_or(200),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "request handled"
                );
                w
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::{factory, ServeReply};
    use axum::body::Bytes;
    use axum::http::{self, StatusCode};
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_logger_is_transparent() {
        let terminal = handler_fn(|mut w: ResponseWriter, _r| async move {
            w.write_header(StatusCode::ACCEPTED);
            w
        });
        let chain = RequestLogger.middleware(terminal);
        let req: Request = http::Request::builder()
            .uri("/jobs?id=3")
            .body(Bytes::new())
            .unwrap()
            .into();

        let w = chain(ResponseWriter::new(factory::<ServeReply>()), req).await;
        assert_eq!(w.status(), Some(StatusCode::ACCEPTED));
    }

    #[tokio::test]
    async fn test_logged_path_omits_query() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let terminal = handler_fn(|w: ResponseWriter, _r| async move { w });
        let chain = RequestLogger.middleware(terminal);
        let req: Request = http::Request::builder()
            .uri("/login?query=%7B%22password%22%3A%22hunter2%22%7D")
            .body(Bytes::new())
            .unwrap()
            .into();
        chain(ResponseWriter::new(factory::<ServeReply>()), req).await;

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("path=/login"), "{output}");
        assert!(!output.contains("hunter2"), "{output}");
    }
}
