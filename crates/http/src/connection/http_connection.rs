use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use http::header::{CONNECTION, CONTENT_TYPE};
use http::{HeaderValue, Response, StatusCode};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::codec::{RequestDecoder, ResponseEncoder};
use crate::protocol::{HttpError, Message, ParseError, PayloadSize, RequestHeader, SendError};
use crate::request::{HttpRequest, PayloadStream};
use crate::routes::{RouteMatch, Routes};

/// Whether the connection survives the exchange that just finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    KeepAlive,
    Close,
}

/// An HTTP connection that reads requests, routes them and writes the responses back
///
/// Requests on one connection are handled strictly one after another. When the connection
/// stays open, the unread remainder of the body is drained after the handler returns so the
/// next request header starts at the right place in the stream.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
/// * `W`: The async writable stream type
pub struct HttpConnection<R, W> {
    framed_read: FramedRead<R, RequestDecoder>,
    framed_write: FramedWrite<W, ResponseEncoder>,
    routes: Arc<Routes>,
    recv_timeout: Duration,
}

impl<R, W> HttpConnection<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W, routes: Arc<Routes>, recv_timeout: Duration) -> Self {
        Self {
            framed_read: FramedRead::with_capacity(reader, RequestDecoder::new(), 8 * 1024),
            framed_write: FramedWrite::new(writer, ResponseEncoder::new()),
            routes,
            recv_timeout,
        }
    }

    /// Serves requests until the peer disconnects or the exchange asks for a close.
    pub async fn process(mut self) -> Result<(), HttpError> {
        loop {
            match self.framed_read.next().await {
                Some(Ok(Message::Header((header, payload_size)))) => {
                    if self.do_process(header, payload_size).await? == Flow::Close {
                        debug!("closing connection after response");
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received body bytes while waiting for a request header");
                    self.framed_write.send(close_response(StatusCode::BAD_REQUEST, "")).await?;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request");
                    self.framed_write.send(close_response(StatusCode::BAD_REQUEST, "")).await?;
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn do_process(&mut self, header: RequestHeader, payload_size: PayloadSize) -> Result<Flow, HttpError> {
        if header.expects_continue() && !payload_size.is_empty() {
            let writer = self.framed_write.get_mut();
            writer.write_all(b"HTTP/1.1 100 Continue\r\n\r\n").await.map_err(SendError::io)?;
            writer.flush().await.map_err(SendError::io)?;
            info!("receive expect request header, sent continue response");
        }

        let wants_close = header.wants_close();
        let method = header.method().clone();
        let route = self.routes.lookup(header.path(), &method);

        let stream: PayloadStream<'_> = Pin::new(&mut self.framed_read);
        let mut request = HttpRequest::new(header, payload_size, stream, self.recv_timeout);

        let result = match route {
            RouteMatch::Found(handler) => handler.call(&mut request).await,
            RouteMatch::MethodNotAllowed => {
                debug!(path = request.path(), %method, "method not allowed");
                Ok(html_response(StatusCode::METHOD_NOT_ALLOWED, "Request method for this URI is not handled by server"))
            }
            RouteMatch::NotFound => {
                debug!(path = request.path(), %method, "no route matches");
                Ok(html_response(StatusCode::NOT_FOUND, "Nothing matches the given URI"))
            }
        };

        let mut response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(cause = %e, path = request.path(), %method, "handler aborted request, closing connection");
                return Ok(Flow::Close);
            }
        };

        let mut close = wants_close || response_wants_close(&response);
        // the rest of the body only matters if another request follows
        if !close && let Err(e) = request.drain().await {
            warn!(cause = %e, "can't drain request body");
            close = true;
        }

        if close {
            response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
        }

        self.framed_write.send(response).await?;

        Ok(if close { Flow::Close } else { Flow::KeepAlive })
    }
}

fn response_wants_close(response: &Response<Bytes>) -> bool {
    response.headers().get(CONNECTION).is_some_and(|value| value.as_bytes().eq_ignore_ascii_case(b"close"))
}

fn html_response(status: StatusCode, body: &'static str) -> Response<Bytes> {
    let mut response = Response::new(Bytes::from_static(body.as_bytes()));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static("text/html"));
    response
}

fn close_response(status: StatusCode, body: &'static str) -> Response<Bytes> {
    let mut response = html_response(status, body);
    response.headers_mut().insert(CONNECTION, HeaderValue::from_static("close"));
    response
}
