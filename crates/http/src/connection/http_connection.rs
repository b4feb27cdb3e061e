use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http::{Method, StatusCode, Version};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::task::JoinError;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, trace, warn};

use crate::codec::{DEFAULT_MAX_BODY_BYTES, DEFAULT_MAX_HEADER_BYTES, HeaderDecoder, MAX_HEADER_NUM, RequestDecoder};
use crate::connection::output::Output;
use crate::connection::selector::{ProtocolVariant, select_protocol};
use crate::handler::{Handler, HandlerError};
use crate::protocol::body::{BodyParser, BodyStrategy};
use crate::protocol::{Gate, HttpError, Message, ParseError, PayloadItem, PayloadSize, Request, RequestHeader, Response};

/// Per-connection limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    pub read_buffer_size: usize,
    pub max_header_bytes: usize,
    pub max_headers: usize,
    /// Requests announcing a larger `content-length` get a 413
    pub max_body_bytes: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: 8 * 1024,
            max_header_bytes: DEFAULT_MAX_HEADER_BYTES,
            max_headers: MAX_HEADER_NUM,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Backpressure gates of one connection.
///
/// The transport pauses and resumes them; the engine waits on `readable` before
/// every read and each [`Output`] write waits on `writable`.
#[derive(Debug, Clone, Default)]
pub struct FlowControl {
    readable: Gate,
    writable: Gate,
}

impl FlowControl {
    pub fn pause_writing(&self) {
        self.writable.close();
    }

    pub fn resume_writing(&self) {
        self.writable.open();
    }

    pub fn pause_reading(&self) {
        self.readable.close();
    }

    pub fn resume_reading(&self) {
        self.readable.open();
    }

    pub fn is_writable(&self) -> bool {
        self.writable.is_open()
    }

    pub fn is_readable(&self) -> bool {
        self.readable.is_open()
    }
}

/// An HTTP/1 connection that decodes requests and dispatches them to a [`Handler`].
///
/// Each request runs as its own task, spawned as soon as the header is decoded,
/// while the connection keeps feeding body bytes to the request's
/// [`BodyStrategy`]. One message is in flight at a time: the next request is
/// only read once the current handler finished.
///
/// # Type Parameters
///
/// * `R`: The async readable stream type
pub struct HttpConnection<R> {
    reader: R,
    output: Output,
    flow_control: FlowControl,
    config: ConnectionConfig,
}

impl<R> std::fmt::Debug for HttpConnection<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpConnection").field("flow_control", &self.flow_control).field("config", &self.config).finish_non_exhaustive()
    }
}

/// Whether the connection can read another message after the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Next {
    KeepAlive,
    Close,
}

impl<R> HttpConnection<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new<W>(reader: R, writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_config(reader, writer, ConnectionConfig::default())
    }

    pub fn with_config<W>(reader: R, writer: W, config: ConnectionConfig) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let flow_control = FlowControl::default();
        let output = Output::new(writer, flow_control.writable.clone());
        Self { reader, output, flow_control, config }
    }

    /// The handle the transport uses to report pause/resume.
    pub fn flow_control(&self) -> FlowControl {
        self.flow_control.clone()
    }

    /// Serves the connection until the peer disconnects or an error closes it.
    pub async fn process<H>(self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + 'static,
    {
        let HttpConnection { mut reader, output, flow_control, config } = self;

        let (variant, initial) = match select_protocol(&mut reader).await.map_err(ParseError::io)? {
            Some(selected) => selected,
            None => {
                info!("connection closed before any request");
                return Ok(());
            }
        };

        if variant == ProtocolVariant::Http2Preface {
            warn!("http/2 is not supported, closing connection");
            output.shutdown().await.map_err(ParseError::io)?;
            return Ok(());
        }

        let header_decoder = HeaderDecoder::new(config.max_header_bytes, config.max_headers).with_max_body_bytes(config.max_body_bytes);
        let decoder = RequestDecoder::with_header_decoder(header_decoder);
        let framed_read = FramedRead::with_capacity(Cursor::new(initial).chain(reader), decoder, config.read_buffer_size);

        let mut engine = Engine { framed_read, output, flow_control };
        let result = engine.serve(handler).await;
        trace!("connection closed");
        result
    }
}

struct Engine<T> {
    framed_read: FramedRead<T, RequestDecoder>,
    output: Output,
    flow_control: FlowControl,
}

impl<T> Engine<T>
where
    T: AsyncRead + Unpin,
{
    async fn next_message(&mut self) -> Option<Result<Message<(RequestHeader, PayloadSize)>, ParseError>> {
        self.flow_control.readable.wait_open().await;
        self.framed_read.next().await
    }

    async fn serve<H>(&mut self, handler: Arc<H>) -> Result<(), HttpError>
    where
        H: Handler + 'static,
    {
        loop {
            match self.next_message().await {
                Some(Ok(Message::Header((header, _)))) => {
                    if self.dispatch(header, &handler).await? == Next::Close {
                        return Ok(());
                    }
                }

                Some(Ok(Message::Payload(_))) => {
                    error!("received body bytes without a request header");
                    self.send_error(StatusCode::BAD_REQUEST).await;
                    return Err(ParseError::invalid_body("need header while receive body").into());
                }

                Some(Err(e)) => {
                    error!(cause = %e, "can't receive next request");
                    self.send_error(error_status(&e)).await;
                    return Err(e.into());
                }

                None => {
                    info!("cant read more request, break this connection down");
                    return Ok(());
                }
            }
        }
    }

    async fn dispatch<H>(&mut self, header: RequestHeader, handler: &Arc<H>) -> Result<Next, HttpError>
    where
        H: Handler + 'static,
    {
        let mut body_parser = BodyStrategy::select(header.headers());
        let keep_alive = is_keep_alive(&header);

        debug!(method = %header.method(), path = header.uri().path(), "request header received");

        let request = Arc::new(Request::new(header));
        let head_only = *request.method() == Method::HEAD;
        let response = Arc::new(Response::new(request.version(), self.output.clone()).head_only(head_only));

        request.headers_ready().fire();
        let task = tokio::spawn({
            let handler = handler.clone();
            let request = request.clone();
            let response = response.clone();
            async move { handler.call(request, response).await }
        });

        // the handler runs while the body is still arriving
        let mut read_error = None;
        let mut disconnected = false;
        loop {
            match self.next_message().await {
                Some(Ok(Message::Payload(PayloadItem::Chunk(bytes)))) => body_parser.feed(&bytes),
                Some(Ok(Message::Payload(PayloadItem::Eof))) => break,
                Some(Ok(Message::Header(_))) => {
                    read_error = Some(ParseError::invalid_body("received a header before the body completed"));
                    break;
                }
                Some(Err(e)) => {
                    read_error = Some(e);
                    break;
                }
                None => {
                    disconnected = true;
                    break;
                }
            }
        }

        if disconnected || read_error.is_some() {
            warn!("connection interrupted while receiving the body, cancelling request");
            task.abort();
        } else {
            let body = body_parser.finish();
            if let Err(e) = &body {
                warn!(cause = %e, "request body can't be parsed");
            }
            request.complete_body(body);
        }

        let handler_result = self.finalize(task.await, &response).await;

        if let Some(e) = read_error {
            return Err(e.into());
        }
        handler_result?;

        if disconnected || !keep_alive {
            self.output.shutdown().await.map_err(ParseError::io)?;
            return Ok(Next::Close);
        }
        Ok(Next::KeepAlive)
    }

    /// Settles the response once the handler task is over.
    async fn finalize(&self, outcome: Result<Result<(), HandlerError>, JoinError>, response: &Response) -> Result<(), HttpError> {
        match outcome {
            Ok(Ok(())) => {
                if !response.is_written() {
                    debug!("handler wrote no response, sending empty 200");
                    response.send(Bytes::new(), StatusCode::OK).await?;
                }
                Ok(())
            }

            Ok(Err(e)) => {
                error!(cause = %e, "unhandled handler error");
                if !response.is_written() {
                    response.send(Bytes::new(), StatusCode::INTERNAL_SERVER_ERROR).await?;
                }
                Err(HttpError::handler(e))
            }

            Err(e) if e.is_cancelled() => {
                warn!("request task cancelled");
                if !response.is_written() {
                    // the peer may be gone already
                    if let Err(e) = response.send(Bytes::new(), StatusCode::SERVICE_UNAVAILABLE).await {
                        debug!(cause = %e, "can't send 503 for cancelled request");
                    }
                }
                Ok(())
            }

            Err(e) => {
                error!(cause = %e, "request task panicked");
                if !response.is_written() {
                    response.send(Bytes::new(), StatusCode::INTERNAL_SERVER_ERROR).await?;
                }
                Err(HttpError::handler(e))
            }
        }
    }

    async fn send_error(&self, status: StatusCode) {
        let response = Response::new(Version::HTTP_11, self.output.clone());
        if let Err(e) = response.send(Bytes::new(), status).await {
            warn!(cause = %e, "can't send error response");
        }
    }
}

fn error_status(e: &ParseError) -> StatusCode {
    match e {
        ParseError::TooLargeHeader { .. } | ParseError::TooManyHeaders { .. } => StatusCode::REQUEST_HEADER_FIELDS_TOO_LARGE,
        ParseError::TooLargeBody { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn is_keep_alive(header: &RequestHeader) -> bool {
    let connection = header.headers().get(http::header::CONNECTION).map(|value| value.as_bytes().to_ascii_lowercase());
    match header.version() {
        Version::HTTP_10 => connection.is_some_and(|value| value == b"keep-alive"),
        _ => connection.is_none_or(|value| value != b"close"),
    }
}
