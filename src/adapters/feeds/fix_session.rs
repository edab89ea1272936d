//! FIX Session Transport - Initiator over TCP/TLS
//!
//! A minimal FIX initiator for market data:
//! - Logon (35=A) decorated by the credential injector, acknowledged
//!   within `logon_timeout`
//! - outbound heartbeats when idle, Heartbeat replies to TestRequest
//! - MsgSeqNum tracking with gap warnings (no resend)
//! - Logout handshake on close, Logout reply when the server logs out

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rustls::ClientConfig;
use rustls::pki_types::ServerName;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tokio_rustls::TlsConnector;
use tracing::{debug, info, instrument, warn};

use super::fix_codec::{FixDecoder, encode};
use crate::domain::credentials::CredentialInjector;
use crate::domain::error::FeedError;
use crate::domain::fix_message::{FixMessage, msg_type, tags};
use crate::domain::frame::{InboundFrame, SessionId};
use crate::domain::subscription::SubscriptionRequest;
use crate::ports::transport::{FeedTransport, TransportEvent, TransportKind};

const READ_CHUNK: usize = 8 * 1024;
const LOGOUT_TIMEOUT: Duration = Duration::from_secs(5);
const SENDING_TIME_FORMAT: &str = "%Y%m%d-%H:%M:%S%.3f";

trait IoStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<S: AsyncRead + AsyncWrite + Unpin + Send> IoStream for S {}

/// Session parameters for one FIX connection.
#[derive(Debug, Clone)]
pub struct FixSessionConfig {
    pub host: String,
    pub port: u16,
    /// Wrap the TCP stream in TLS.
    pub tls: bool,
    pub begin_string: String,
    pub sender_comp_id: String,
    pub target_comp_id: String,
    /// Advertised in Logon `HeartBtInt (108)`; also the outbound idle timer.
    pub heartbeat_interval: Duration,
    pub logon_timeout: Duration,
    /// Send `ResetSeqNumFlag (141)=Y` on Logon.
    pub reset_seq_num: bool,
}

enum Step {
    Inbound(FixMessage),
    HeartbeatDue,
}

/// FIX transport implementing `FeedTransport`.
pub struct FixTransport {
    config: FixSessionConfig,
    tls: Arc<ClientConfig>,
    stream: Option<Box<dyn IoStream>>,
    decoder: FixDecoder,
    read_buf: Box<[u8]>,
    /// Outbound admin hook; set by `authenticate`.
    injector: CredentialInjector,
    session: SessionId,
    next_out_seq: u64,
    next_in_seq: u64,
    last_sent: Instant,
    logged_on: bool,
    /// Server already sent Logout; `close` must not start another handshake.
    remote_logged_out: bool,
    md_req_count: u64,
    pending: VecDeque<TransportEvent>,
    /// Encoded bytes not yet accepted by the stream.
    outbound: Vec<u8>,
}

impl FixTransport {
    pub fn new(config: FixSessionConfig, tls: Arc<ClientConfig>) -> Self {
        Self {
            config,
            tls,
            stream: None,
            decoder: FixDecoder::new(),
            read_buf: vec![0u8; READ_CHUNK].into_boxed_slice(),
            injector: CredentialInjector::default(),
            session: SessionId::nil(),
            next_out_seq: 1,
            next_in_seq: 1,
            last_sent: Instant::now(),
            logged_on: false,
            remote_logged_out: false,
            md_req_count: 0,
            pending: VecDeque::new(),
            outbound: Vec::new(),
        }
    }

    /// Stamp the standard header and append one message to the
    /// outbound buffer.
    ///
    /// Session-layer messages pass through the credential injector
    /// before encoding; only a Logon is actually modified.
    fn queue(&mut self, mut message: FixMessage) {
        message.set(tags::SENDER_COMP_ID, self.config.sender_comp_id.as_str());
        message.set(tags::TARGET_COMP_ID, self.config.target_comp_id.as_str());
        message.set(tags::MSG_SEQ_NUM, self.next_out_seq.to_string());
        message.set(
            tags::SENDING_TIME,
            Utc::now().format(SENDING_TIME_FORMAT).to_string(),
        );
        if message.is_admin() && self.injector.decorate(&mut message) {
            debug!("Credentials injected into Logon");
        }

        self.outbound
            .extend_from_slice(&encode(&message, &self.config.begin_string));
        debug!(msg_type = message.msg_type(), seq = self.next_out_seq, "FIX message queued");
        self.next_out_seq += 1;
        self.last_sent = Instant::now();
    }

    /// Write out everything queued.
    ///
    /// Cancel-safe: written bytes are drained as each `write` completes,
    /// so a dropped flush resumes where it stopped and never leaves a
    /// torn frame behind.
    async fn flush(&mut self) -> Result<(), FeedError> {
        if self.outbound.is_empty() {
            return Ok(());
        }
        let stream = self.stream.as_mut().ok_or(FeedError::NotConnected)?;
        while !self.outbound.is_empty() {
            let n = stream
                .write(&self.outbound)
                .await
                .map_err(|e| FeedError::Transport(e.to_string()))?;
            if n == 0 {
                return Err(FeedError::Transport("FIX connection closed by peer".to_string()));
            }
            self.outbound.drain(..n);
        }
        stream
            .flush()
            .await
            .map_err(|e| FeedError::Transport(e.to_string()))
    }

    async fn send(&mut self, message: FixMessage) -> Result<(), FeedError> {
        self.queue(message);
        self.flush().await
    }

    /// Read until one complete, checksum-valid message is available.
    ///
    /// Cancel-safe: bytes are only moved into the decoder after a read
    /// completes. Malformed frames are logged and skipped.
    async fn read_message(&mut self) -> Result<FixMessage, FeedError> {
        loop {
            match self.decoder.decode() {
                Ok(Some(message)) => {
                    self.track_inbound_seq(&message);
                    return Ok(message);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(error = %e, "Malformed FIX frame discarded");
                    continue;
                }
            }

            let stream = self.stream.as_mut().ok_or(FeedError::NotConnected)?;
            let n = stream
                .read(&mut self.read_buf)
                .await
                .map_err(|e| FeedError::Transport(e.to_string()))?;
            if n == 0 {
                return Err(FeedError::Transport(
                    "FIX connection closed by peer".to_string(),
                ));
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    fn track_inbound_seq(&mut self, message: &FixMessage) {
        let Some(seq) = message
            .get(tags::MSG_SEQ_NUM)
            .and_then(|s| s.parse::<u64>().ok())
        else {
            warn!(msg_type = message.msg_type(), "Inbound message without MsgSeqNum");
            return;
        };

        if seq > self.next_in_seq {
            warn!(expected = self.next_in_seq, received = seq, "Inbound sequence gap");
        } else if seq < self.next_in_seq && message.get(tags::POSS_DUP_FLAG) != Some("Y") {
            warn!(expected = self.next_in_seq, received = seq, "Inbound sequence lower than expected");
            return;
        }
        self.next_in_seq = self.next_in_seq.max(seq + 1);
    }

    fn heartbeat_for(request: &FixMessage) -> FixMessage {
        let mut heartbeat = FixMessage::new(msg_type::HEARTBEAT);
        if let Some(id) = request.get(tags::TEST_REQ_ID) {
            heartbeat.set(tags::TEST_REQ_ID, id);
        }
        heartbeat
    }

    /// Session-level reactions to an inbound message while streaming.
    ///
    /// The frame is queued for delivery before any reply, and replies
    /// are only buffered here; `next_event` flushes them.
    fn on_inbound(&mut self, message: FixMessage) {
        let reply = match message.msg_type() {
            msg_type::TEST_REQUEST => Some(Self::heartbeat_for(&message)),
            msg_type::LOGOUT => {
                let reason = message.get(tags::TEXT).unwrap_or_default().to_string();
                self.remote_logged_out = true;
                let reply = self.logged_on.then(|| FixMessage::new(msg_type::LOGOUT));
                self.logged_on = false;
                info!("Logged out");
                self.pending
                    .push_back(TransportEvent::Frame(InboundFrame::fix(message, self.session)));
                self.pending.push_back(TransportEvent::Closed { reason });
                if let Some(reply) = reply {
                    self.queue(reply);
                }
                return;
            }
            _ => None,
        };
        self.pending
            .push_back(TransportEvent::Frame(InboundFrame::fix(message, self.session)));
        if let Some(reply) = reply {
            self.queue(reply);
        }
    }
}

#[async_trait]
impl FeedTransport for FixTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Fix
    }

    #[instrument(skip(self), fields(host = %self.config.host, port = self.config.port, tls = self.config.tls))]
    async fn connect(&mut self, session: SessionId) -> Result<(), FeedError> {
        let tcp = TcpStream::connect((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| FeedError::ConnectionInit(e.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|e| FeedError::ConnectionInit(e.to_string()))?;

        let stream: Box<dyn IoStream> = if self.config.tls {
            let server_name = ServerName::try_from(self.config.host.clone())
                .map_err(|e| FeedError::Tls(e.to_string()))?;
            let connector = TlsConnector::from(Arc::clone(&self.tls));
            let tls_stream = connector
                .connect(server_name, tcp)
                .await
                .map_err(|e| FeedError::ConnectionInit(e.to_string()))?;
            Box::new(tls_stream)
        } else {
            Box::new(tcp)
        };

        self.stream = Some(stream);
        self.session = session;
        self.decoder = FixDecoder::new();
        self.next_out_seq = 1;
        self.next_in_seq = 1;
        self.logged_on = false;
        self.remote_logged_out = false;
        self.pending.clear();
        self.outbound.clear();
        info!("Connected to FIX acceptor");
        Ok(())
    }

    #[instrument(skip_all, fields(sender = %self.config.sender_comp_id, target = %self.config.target_comp_id))]
    async fn authenticate(
        &mut self,
        injector: &CredentialInjector,
    ) -> Result<Vec<InboundFrame>, FeedError> {
        self.injector = injector.clone();

        let mut logon = FixMessage::new(msg_type::LOGON);
        logon.set(tags::ENCRYPT_METHOD, "0");
        logon.set(
            tags::HEART_BT_INT,
            self.config.heartbeat_interval.as_secs().to_string(),
        );
        if self.config.reset_seq_num {
            logon.set(tags::RESET_SEQ_NUM_FLAG, "Y");
        }
        self.send(logon).await?;

        let timeout_secs = self.config.logon_timeout.as_secs();
        let deadline = Instant::now() + self.config.logon_timeout;
        let mut frames = Vec::new();
        loop {
            let message = tokio::time::timeout_at(deadline, self.read_message())
                .await
                .map_err(|_| FeedError::LogonTimeout(timeout_secs))??;

            match message.msg_type() {
                msg_type::LOGON => {
                    self.logged_on = true;
                    info!("Logged in");
                    frames.push(InboundFrame::fix(message, self.session));
                    return Ok(frames);
                }
                msg_type::LOGOUT | msg_type::REJECT => {
                    let reason = message
                        .get(tags::TEXT)
                        .unwrap_or("logon refused")
                        .to_string();
                    self.remote_logged_out = message.msg_type() == msg_type::LOGOUT;
                    return Err(FeedError::LogonRejected(reason));
                }
                msg_type::TEST_REQUEST => {
                    self.send(Self::heartbeat_for(&message)).await?;
                    frames.push(InboundFrame::fix(message, self.session));
                }
                _ => frames.push(InboundFrame::fix(message, self.session)),
            }
        }
    }

    async fn send_subscription(&mut self, request: &SubscriptionRequest) -> Result<(), FeedError> {
        if !self.logged_on {
            return Err(FeedError::SubscriptionSend("session is not logged on".to_string()));
        }
        self.md_req_count += 1;
        let md_req_id = format!("{}-{}", request.channel(), self.md_req_count);
        self.send(request.to_fix(&md_req_id))
            .await
            .map_err(|e| FeedError::SubscriptionSend(e.to_string()))
    }

    async fn next_event(&mut self) -> Result<TransportEvent, FeedError> {
        loop {
            self.flush().await?;
            if let Some(event) = self.pending.pop_front() {
                return Ok(event);
            }

            let idle = self
                .config
                .heartbeat_interval
                .saturating_sub(self.last_sent.elapsed());
            let step = tokio::select! {
                message = self.read_message() => Step::Inbound(message?),
                () = tokio::time::sleep(idle) => Step::HeartbeatDue,
            };

            match step {
                Step::Inbound(message) => self.on_inbound(message),
                Step::HeartbeatDue => self.queue(FixMessage::new(msg_type::HEARTBEAT)),
            }
        }
    }

    async fn close(&mut self) -> Result<(), FeedError> {
        if self.stream.is_none() {
            return Ok(());
        }
        if let Err(e) = self.flush().await {
            debug!(error = %e, "Dropping unsent FIX bytes on close");
            self.outbound.clear();
        }

        if self.logged_on && !self.remote_logged_out {
            self.send(FixMessage::new(msg_type::LOGOUT)).await?;
            let confirmed = tokio::time::timeout(LOGOUT_TIMEOUT, async {
                loop {
                    match self.read_message().await {
                        Ok(m) if m.msg_type() == msg_type::LOGOUT => return true,
                        Ok(_) => {}
                        Err(_) => return false,
                    }
                }
            })
            .await
            .unwrap_or(false);
            if confirmed {
                info!("Logged out");
            } else {
                warn!("No Logout confirmation from acceptor");
            }
        }
        self.logged_on = false;

        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                debug!(error = %e, "FIX stream shutdown error");
            }
        }
        info!("FIX connection closed");
        Ok(())
    }
}
