use std::future::Future;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;

use tern_http::connection::{ConnectionConfig, HttpConnection};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::error_handler::{ErrorChain, ErrorHandler};
use crate::handler::BoxedHandler;
use crate::lifecycle::Dispatcher;
use crate::router::Router;

#[derive(Debug)]
pub struct ServerBuilder {
    router: Option<Router<BoxedHandler>>,
    address: Option<Result<Vec<SocketAddr>, String>>,
    error_chain: ErrorChain,
    connection_config: ConnectionConfig,
}

impl ServerBuilder {
    fn new() -> Self {
        Self { router: None, address: None, error_chain: ErrorChain::new(), connection_config: ConnectionConfig::default() }
    }

    /// Sets the listen address, resolution errors are reported by [`build`](Self::build).
    pub fn address<A: ToSocketAddrs>(mut self, address: A) -> Self {
        let resolved = address.to_socket_addrs().map(|addrs| addrs.collect()).map_err(|e| e.to_string());
        self.address = Some(resolved);
        self
    }

    pub fn router(mut self, router: Router<BoxedHandler>) -> Self {
        self.router = Some(router);
        self
    }

    /// Adds an error handler, asked before the ones added earlier.
    pub fn on_error(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_chain.push(handler);
        self
    }

    pub fn connection_config(mut self, connection_config: ConnectionConfig) -> Self {
        self.connection_config = connection_config;
        self
    }

    pub fn build(self) -> Result<Server, ServerBuildError> {
        let router = self.router.ok_or(ServerBuildError::MissingRouter)?;
        let address = self.address.ok_or(ServerBuildError::MissingAddress)?.map_err(|reason| ServerBuildError::InvalidAddress { reason })?;
        if address.is_empty() {
            return Err(ServerBuildError::InvalidAddress { reason: "address resolved to nothing".into() });
        }

        Ok(Server {
            dispatcher: Arc::new(Dispatcher::new(router, self.error_chain)),
            address,
            connection_config: self.connection_config,
        })
    }
}

#[derive(Debug)]
pub struct Server {
    dispatcher: Arc<Dispatcher>,
    address: Vec<SocketAddr>,
    connection_config: ConnectionConfig,
}

#[derive(Error, Debug)]
pub enum ServerBuildError {
    #[error("router must be set")]
    MissingRouter,
    #[error("address must be set")]
    MissingAddress,
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Installs an INFO level subscriber, binds and serves until SIGINT or SIGTERM.
    pub async fn start(self) {
        let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            warn!(cause = %e, "a global subscriber is already installed");
        }

        info!("start listening at {:?}", self.address);
        let tcp_listener = match TcpListener::bind(self.address.as_slice()).await {
            Ok(tcp_listener) => tcp_listener,
            Err(e) => {
                error!(cause = %e, "bind server error");
                return;
            }
        };

        self.serve(tcp_listener, shutdown_signal()).await;
    }

    /// Accepts connections on `tcp_listener` until `shutdown` completes.
    ///
    /// Connections accepted before the shutdown keep being served.
    pub async fn serve<F>(self, tcp_listener: TcpListener, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let (tcp_stream, remote_addr) = tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested, stop accepting connections");
                    return;
                }
                accepted = tcp_listener.accept() => match accepted {
                    Ok(stream_and_addr) => stream_and_addr,
                    Err(e) => {
                        warn!(cause = %e, "failed to accept");
                        continue;
                    }
                },
            };

            let dispatcher = self.dispatcher.clone();
            let connection_config = self.connection_config;

            tokio::spawn(async move {
                let (reader, writer) = tcp_stream.into_split();
                let connection = HttpConnection::with_config(reader, writer, connection_config);
                match connection.process(dispatcher).await {
                    Ok(_) => {
                        info!(%remote_addr, "finished process, connection shutdown");
                    }
                    Err(e) => {
                        error!(%remote_addr, "service has error, cause {}, connection shutdown", e);
                    }
                }
            });
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(cause = %e, "can't listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(cause = %e, "can't listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
