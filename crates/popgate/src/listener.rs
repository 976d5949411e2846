//! TCP/TLS listener.
//!
//! Every accepted connection runs [`pop3::serve`] on its own task. The
//! listener shares the settings store and the mail store with all tasks;
//! neither holds per-connection state.

use std::fs::File;
use std::future::Future;
use std::io::BufReader;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use popgate_core::{
    AccountNamePolicy, ImapMailStore, MailStore, SettingsStore, SqliteSettingsStore,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_rustls::TlsAcceptor;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::config::{Config, TlsVersion};
use crate::pop3::{self, SessionConfig};

/// Time a client gets to complete the TLS handshake.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// Pause after a failed accept before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builds a TLS acceptor from PEM files.
///
/// The first PKCS#1, PKCS#8 or SEC1 key in `key_path` is used. Client
/// certificates are not requested.
///
/// # Errors
///
/// Returns an error if a file cannot be read or holds no usable
/// certificate or key.
pub fn load_tls_acceptor(
    cert_path: impl AsRef<Path>,
    key_path: impl AsRef<Path>,
    min_version: TlsVersion,
) -> Result<TlsAcceptor> {
    let cert_path = cert_path.as_ref();
    let key_path = key_path.as_ref();

    let mut cert_reader = BufReader::new(
        File::open(cert_path).with_context(|| format!("open {}", cert_path.display()))?,
    );
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| anyhow!("invalid cert: {e}"))?;
    if certs.is_empty() {
        return Err(anyhow!("no certificate in {}", cert_path.display()));
    }

    let mut key_reader = BufReader::new(
        File::open(key_path).with_context(|| format!("open {}", key_path.display()))?,
    );
    let mut key: Option<PrivateKeyDer<'static>> = None;
    for item in rustls_pemfile::read_all(&mut key_reader) {
        let item = item.map_err(|e| anyhow!("invalid key: {e}"))?;
        key = match item {
            rustls_pemfile::Item::Pkcs1Key(k) => Some(PrivateKeyDer::Pkcs1(k)),
            rustls_pemfile::Item::Pkcs8Key(k) => Some(PrivateKeyDer::Pkcs8(k)),
            rustls_pemfile::Item::Sec1Key(k) => Some(PrivateKeyDer::Sec1(k)),
            _ => continue,
        };
        break;
    }
    let key = key.ok_or_else(|| anyhow!("no private key in {}", key_path.display()))?;

    let versions: &[&'static rustls::SupportedProtocolVersion] = match min_version {
        TlsVersion::Tls12 => &[&rustls::version::TLS13, &rustls::version::TLS12],
        TlsVersion::Tls13 => &[&rustls::version::TLS13],
    };
    let config = rustls::ServerConfig::builder_with_protocol_versions(versions)
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| anyhow!("tls config: {e}"))?;

    Ok(TlsAcceptor::from(Arc::new(config)))
}

/// Accepts connections forever, one task per client.
///
/// Accept failures are logged and do not stop the loop; the next attempt
/// follows a short pause.
pub async fn serve<St, M>(
    listener: TcpListener,
    tls: Option<TlsAcceptor>,
    config: Arc<SessionConfig>,
    settings: Arc<St>,
    store: Arc<M>,
) where
    St: SettingsStore + 'static,
    M: MailStore + 'static,
    M::Session: Sync,
{
    loop {
        let (stream, peer) = accept_with_backoff(|| listener.accept()).await;

        let tls = tls.clone();
        let config = Arc::clone(&config);
        let settings = Arc::clone(&settings);
        let store = Arc::clone(&store);

        tokio::spawn(
            async move {
                info!("connection accepted");
                handle_connection(stream, peer, tls, &config, settings.as_ref(), store.as_ref())
                    .await;
            }
            .instrument(info_span!("conn", %peer)),
        );
    }
}

/// Retries `accept` until it succeeds, sleeping between failures.
async fn accept_with_backoff<F, Fut, T>(mut accept: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::io::Result<T>>,
{
    loop {
        match accept().await {
            Ok(accepted) => return accepted,
            Err(e) => {
                warn!("accept failed: {e}");
                tokio::time::sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

async fn handle_connection<St, M>(
    stream: TcpStream,
    peer: SocketAddr,
    tls: Option<TlsAcceptor>,
    config: &SessionConfig,
    settings: &St,
    store: &M,
) where
    St: SettingsStore,
    M: MailStore,
{
    let result = match tls {
        Some(acceptor) => {
            match tokio::time::timeout(HANDSHAKE_TIMEOUT, acceptor.accept(stream)).await {
                Ok(Ok(stream)) => run_session(stream, config, settings, store).await,
                Ok(Err(e)) => {
                    warn!("tls handshake with {peer} failed: {e}");
                    return;
                }
                Err(_) => {
                    warn!("tls handshake with {peer} timed out");
                    return;
                }
            }
        }
        None => run_session(stream, config, settings, store).await,
    };

    if let Err(e) = result {
        debug!("connection with {peer} ended with error: {e}");
    }
}

async fn run_session<IO, St, M>(
    io: IO,
    config: &SessionConfig,
    settings: &St,
    store: &M,
) -> std::io::Result<()>
where
    IO: AsyncRead + AsyncWrite + Unpin,
    St: SettingsStore,
    M: MailStore,
{
    pop3::serve(io, config, settings, store).await
}

/// Runs the gateway until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the settings store, the TLS material or the listen
/// socket cannot be set up.
pub async fn run(config: Config) -> Result<()> {
    let policy = match config.settings.account_pattern.as_deref() {
        Some(pattern) => AccountNamePolicy::with_pattern(pattern)?,
        None => AccountNamePolicy::any(),
    };
    let settings = SqliteSettingsStore::new(&config.settings.database, policy)
        .await
        .with_context(|| format!("open settings database {}", config.settings.database))?;

    let store = ImapMailStore::new(config.store_config());

    let tls = if config.pop.tls {
        let (Some(cert), Some(key)) = (config.pop.cert.as_deref(), config.pop.key.as_deref())
        else {
            return Err(anyhow!("pop.tls requires pop.cert and pop.key"));
        };
        Some(load_tls_acceptor(cert, key, config.pop.min_tls_version)?)
    } else {
        None
    };

    let addr = format!("{}:{}", config.pop.bind, config.pop.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!(
        "listening on {addr} (tls: {}), backend {}:{}",
        tls.is_some(),
        store.config().host,
        store.config().port
    );

    tokio::select! {
        () = serve(
            listener,
            tls,
            Arc::new(config.session_config()),
            Arc::new(settings),
            Arc::new(store),
        ) => Ok(()),
        signal = tokio::signal::ctrl_c() => {
            signal.context("wait for ctrl-c")?;
            info!("shutting down");
            Ok(())
        }
    }
}
