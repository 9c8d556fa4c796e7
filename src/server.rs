use std::convert::Infallible;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::tokio::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::handler::CounterHandler;
use crate::protocol::response::{MessageBody, to_body};
use crate::protocol::{RequestEvent, ResponseResult};

/// HTTP gateway in front of the counter handler
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    handler: Arc<CounterHandler>,
}

impl Server {
    /// Create and bind TCP server to specified address
    pub async fn bind(addr: &str, handler: Arc<CounterHandler>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        info!("TCP server bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            handler,
        })
    }

    /// Get local listening address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Start server, accept and process connections
    pub async fn run(self: Arc<Self>) {
        info!("Server started, listening on {}", self.local_addr);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    info!("New connection accepted from {}", peer_addr);

                    let io = TokioIo::new(stream);
                    let gateway = Gateway {
                        handler: Arc::clone(&self.handler),
                        peer_addr,
                    };

                    // Spawn an independent task for each connection
                    tokio::spawn(async move {
                        if let Err(e) = http1::Builder::new()
                            .timer(TokioTimer::new())
                            .serve_connection(io, gateway)
                            .await
                        {
                            error!("Error handling connection from {}: {}", peer_addr, e);
                        }
                        info!("Connection handler ended for {}", peer_addr);
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Per-connection service turning requests into invocation events
#[derive(Clone)]
struct Gateway {
    handler: Arc<CounterHandler>,
    peer_addr: SocketAddr,
}

impl hyper::service::Service<Request<Incoming>> for Gateway {
    type Response = Response<Full<Bytes>>;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let gateway = self.clone();
        Box::pin(async move { Ok(gateway.process_request(req).await) })
    }
}

impl Gateway {
    /// Map one HTTP request through the handler, the way a managed gateway
    /// turns a request into an event and the result back into a reply.
    async fn process_request(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        debug!("Received {} {} from {}", req.method(), req.uri(), self.peer_addr);

        let event = RequestEvent::from_http(&req);
        match self.handler.handle(&event).await {
            Ok(res) => to_http(res),
            Err(e) => {
                error!("Invocation failed for {} {}: {}", req.method(), req.uri(), e);
                plain_error(StatusCode::BAD_GATEWAY, "Internal server error")
            }
        }
    }
}

fn to_http(res: ResponseResult) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(res.status_code);
    for (name, value) in res.headers.unwrap_or_default() {
        builder = builder.header(name, value);
    }
    let body = match res.body {
        Some(body) => {
            builder = builder.header(hyper::header::CONTENT_TYPE, "application/json");
            Full::new(Bytes::from(body))
        }
        None => Full::new(Bytes::new()),
    };

    builder.body(body).unwrap_or_else(|e| {
        error!("Failed to build response: {}", e);
        plain_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
    })
}

fn plain_error(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    let body = to_body(&MessageBody { message }).unwrap_or_default();
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::record::ROOT_PAGE_KEY;
    use crate::store::{CounterStore, MemoryStore};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn start(store: Arc<MemoryStore>) -> SocketAddr {
        let handler = Arc::new(CounterHandler::new(store));
        let server = Arc::new(Server::bind("127.0.0.1:0", handler).await.unwrap());
        let addr = server.local_addr();
        tokio::spawn(server.run());
        addr
    }

    /// Send raw bytes and read until the server closes the connection
    async fn roundtrip(addr: SocketAddr, request: &[u8]) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request).await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }

    /// Split a single response into (head, body)
    fn split(res: &str) -> (String, &str) {
        let (head, body) = res.split_once("\r\n\r\n").unwrap();
        (head.to_ascii_lowercase(), body)
    }

    #[tokio::test]
    async fn test_get_and_post() {
        let store = Arc::new(MemoryStore::new());
        let addr = start(store.clone()).await;

        let res = roundtrip(addr, b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
        assert!(res.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(res.ends_with(r#"{"message": "Here is the Count", "count": 0}"#));

        let res = roundtrip(addr, b"POST / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
        assert!(res.starts_with("HTTP/1.1 200 OK\r\n"));
        let (head, body) = split(&res);
        assert!(head.contains("content-type: application/json\r\n"));
        assert_eq!(body, r#"{"message": "Counter Updated", "count": 1}"#);

        let record = store.get(ROOT_PAGE_KEY).await.unwrap().unwrap();
        assert_eq!(record.visit_count, 1);
    }

    #[tokio::test]
    async fn test_keep_alive_pipelined_requests() {
        let store = Arc::new(MemoryStore::new());
        let addr = start(store.clone()).await;

        let res = roundtrip(
            addr,
            b"POST / HTTP/1.1\r\nHost: x\r\n\r\nPOST / HTTP/1.1\r\nHost: x\r\n\r\nGET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert_eq!(res.matches("HTTP/1.1 200 OK").count(), 3);
        assert!(res.ends_with(r#"{"message": "Here is the Count", "count": 2}"#));
    }

    #[tokio::test]
    async fn test_suppressed_update_via_query() {
        let store = Arc::new(MemoryStore::new());
        let addr = start(store.clone()).await;

        let res = roundtrip(
            addr,
            b"POST /?update=False HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(res.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        let (head, body) = split(&res);
        assert!(head.contains("content-length: 0"));
        assert_eq!(body, "");
        assert_eq!(store.get(ROOT_PAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_percent_encoded_flag_suppresses_update() {
        let store = Arc::new(MemoryStore::new());
        let addr = start(store.clone()).await;

        let res = roundtrip(
            addr,
            b"POST /?update=%46alse HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .await;
        assert!(res.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert_eq!(store.get(ROOT_PAGE_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_wrong_method() {
        let addr = start(Arc::new(MemoryStore::new())).await;

        let res = roundtrip(addr, b"DELETE / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
        assert!(res.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(res.ends_with(r#"{"message": "Oops! Wrong Method!!"}"#));
    }

    #[tokio::test]
    async fn test_head_response_has_no_body() {
        let store = Arc::new(MemoryStore::new());
        let addr = start(store.clone()).await;

        let res = roundtrip(
            addr,
            b"HEAD / HTTP/1.1\r\nHost: x\r\n\r\nGET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n",
        )
        .await;
        // the HEAD reply carries no body, so the next reply starts right after its head
        let (_, rest) = res.split_once("\r\n\r\n").unwrap();
        assert!(res.starts_with("HTTP/1.1 401 Unauthorized\r\n"));
        assert!(rest.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(rest.ends_with(r#"{"message": "Here is the Count", "count": 0}"#));
    }

    #[tokio::test]
    async fn test_malformed_request() {
        let addr = start(Arc::new(MemoryStore::new())).await;

        let res = roundtrip(addr, b"garbage\r\n\r\n").await;
        assert!(res.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn test_store_failure_is_bad_gateway() {
        let store = Arc::new(MemoryStore::new());
        store.put_raw(ROOT_PAGE_KEY, b"garbage".to_vec());
        let addr = start(store).await;

        let res = roundtrip(addr, b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n").await;
        assert!(res.starts_with("HTTP/1.1 502 Bad Gateway\r\n"));
        assert!(res.ends_with(r#"{"message": "Internal server error"}"#));
    }
}
