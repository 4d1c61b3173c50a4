/*
[INPUT]:  Feed endpoint, session key and a connected transport
[OUTPUT]: A logged-in feed connection publishing decoded frames as events
[POS]:    Feed layer - one live socket per feed kind
[UPDATE]: When changing the login handshake or the reader loop
*/

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::FeedConfig;
use crate::feed::frame::truncate_for_log;
use crate::feed::{
    BoxedFeedIo, FeedCommand, FeedConnector, FeedEvent, FeedEventBody, FeedEventBus, Frame,
    FrameBuffer,
};
use crate::http::{NordnetError, Result};
use crate::types::{FeedEndpoint, FeedKind};

const MESSAGE_SAMPLE_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

/// A logged-in feed socket.
///
/// Dropping or closing the connection stops its reader; after [`FeedConnection::close`]
/// returns no further events are published for it.
pub struct FeedConnection {
    endpoint: FeedEndpoint,
    writer: FeedWriter,
    read_task: JoinHandle<()>,
}

/// Write side of a connection.
///
/// Cloned out of the feed slot before writing, so a peer that stops reading
/// stalls only its own senders. Each write is bounded by the write timeout.
#[derive(Clone)]
pub struct FeedWriter {
    kind: FeedKind,
    connection_id: Uuid,
    active: Arc<AtomicBool>,
    io: Arc<Mutex<WriteHalf<BoxedFeedIo>>>,
    write_timeout: Duration,
}

impl fmt::Debug for FeedWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedWriter")
            .field("kind", &self.kind)
            .field("connection_id", &self.connection_id)
            .field("write_timeout", &self.write_timeout)
            .finish_non_exhaustive()
    }
}

impl FeedWriter {
    pub fn connection_id(&self) -> Uuid {
        self.connection_id
    }

    /// Write one command and flush it
    pub async fn send(&self, command: &FeedCommand) -> Result<()> {
        let kind = self.kind;
        if !self.active.load(Ordering::Acquire) {
            return Err(NordnetError::FeedNotConnected(kind));
        }

        let line = command.encode()?;
        let write = async {
            let mut io = self.io.lock().await;
            write_line(&mut *io, kind, &line).await
        };
        bounded_write(kind, self.write_timeout, write).await?;

        debug!(
            %kind,
            connection_id = %self.connection_id,
            cmd = ?command.cmd,
            event_type = command.event_type(),
            "feed command sent"
        );
        Ok(())
    }
}

impl fmt::Debug for FeedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeedConnection")
            .field("endpoint", &self.endpoint)
            .field("connection_id", &self.writer.connection_id)
            .field("active", &self.is_alive())
            .finish_non_exhaustive()
    }
}

impl FeedConnection {
    /// Connect, send the login command and start reading.
    ///
    /// Resolves once the login line is flushed; the feed sends no acknowledgement.
    pub async fn open(
        connector: &FeedConnector,
        endpoint: FeedEndpoint,
        session_key: &str,
        config: &FeedConfig,
        bus: FeedEventBus,
    ) -> Result<Self> {
        let kind = endpoint.kind;
        let io = connector.connect(&endpoint, config.connect_timeout()).await?;
        let (reader, mut writer) = tokio::io::split(io);

        let write_timeout = config.write_timeout();
        let login = FeedCommand::login(session_key).encode()?;
        bounded_write(kind, write_timeout, write_line(&mut writer, kind, &login)).await?;

        let connection_id = Uuid::new_v4();
        info!(
            %kind,
            host = %endpoint.host,
            port = endpoint.port,
            %connection_id,
            "feed login sent"
        );

        let active = Arc::new(AtomicBool::new(true));
        let read_task = tokio::spawn(read_loop(
            reader,
            FrameBuffer::new(config.max_frame_bytes),
            ReaderContext {
                kind,
                connection_id,
                active: active.clone(),
                bus,
            },
        ));

        Ok(Self {
            endpoint,
            writer: FeedWriter {
                kind,
                connection_id,
                active,
                io: Arc::new(Mutex::new(writer)),
                write_timeout,
            },
            read_task,
        })
    }

    pub fn kind(&self) -> FeedKind {
        self.endpoint.kind
    }

    pub fn endpoint(&self) -> &FeedEndpoint {
        &self.endpoint
    }

    pub fn connection_id(&self) -> Uuid {
        self.writer.connection_id
    }

    /// False once the socket closed or the connection was shut down
    pub fn is_alive(&self) -> bool {
        self.writer.active.load(Ordering::Acquire)
    }

    pub fn writer(&self) -> FeedWriter {
        self.writer.clone()
    }

    /// Write one command and flush it
    pub async fn send(&self, command: &FeedCommand) -> Result<()> {
        self.writer.send(command).await
    }

    /// Stop the reader and close the socket
    pub async fn close(mut self) {
        self.writer.active.store(false, Ordering::Release);
        self.read_task.abort();
        // Wait for the reader to stop so nothing is published after this returns
        let _ = (&mut self.read_task).await;

        // A stalled sender keeps the write half until its write times out
        match self.writer.io.try_lock() {
            Ok(mut io) => {
                if let Err(e) = io.shutdown().await {
                    debug!(kind = %self.kind(), error = %e, "feed socket shutdown failed");
                }
            }
            Err(_) => debug!(kind = %self.kind(), "feed write in progress, skipping shutdown"),
        }
        debug!(
            kind = %self.kind(),
            connection_id = %self.connection_id(),
            "feed connection closed"
        );
    }
}

impl Drop for FeedConnection {
    fn drop(&mut self) {
        self.writer.active.store(false, Ordering::Release);
        self.read_task.abort();
    }
}

async fn bounded_write<F>(kind: FeedKind, limit: Duration, write: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    match tokio::time::timeout(limit, write).await {
        Ok(result) => result,
        Err(_) => {
            let duration_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
            warn!(%kind, timeout_ms = duration_ms, "feed write timed out");
            Err(NordnetError::Timeout { duration_ms })
        }
    }
}

async fn write_line<W>(writer: &mut W, kind: FeedKind, line: &str) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| NordnetError::feed(kind, format!("write failed: {e}")))?;
    writer
        .flush()
        .await
        .map_err(|e| NordnetError::feed(kind, format!("flush failed: {e}")))
}

struct ReaderContext {
    kind: FeedKind,
    connection_id: Uuid,
    active: Arc<AtomicBool>,
    bus: FeedEventBus,
}

impl ReaderContext {
    fn publish(&self, body: FeedEventBody) {
        self.bus
            .publish(FeedEvent::new(self.kind, self.connection_id, body));
    }
}

async fn read_loop(mut reader: ReadHalf<BoxedFeedIo>, mut frames: FrameBuffer, ctx: ReaderContext) {
    let mut sampled = 0usize;

    let reason = loop {
        match reader.read_buf(frames.buffer_mut()).await {
            Ok(0) => {
                if frames.pending_len() > 0 {
                    debug!(
                        kind = %ctx.kind,
                        bytes = frames.pending_len(),
                        "feed closed with an incomplete frame"
                    );
                }
                break None;
            }
            Ok(_) => {
                while let Some(frame) = frames.next_frame() {
                    if !ctx.active.load(Ordering::Acquire) {
                        return;
                    }
                    match frame {
                        Frame::Json(value) => {
                            if sampled < MESSAGE_SAMPLE_LIMIT {
                                sampled += 1;
                                debug!(
                                    kind = %ctx.kind,
                                    sample_index = sampled,
                                    sample_limit = MESSAGE_SAMPLE_LIMIT,
                                    message = %truncate_for_log(&value.to_string(), RAW_LOG_MAX_BYTES),
                                    "feed message sample"
                                );
                            }
                            ctx.publish(FeedEventBody::Message(value));
                        }
                        Frame::Malformed { raw, error } => {
                            warn!(
                                kind = %ctx.kind,
                                connection_id = %ctx.connection_id,
                                %error,
                                bytes = raw.len(),
                                "feed frame could not be decoded"
                            );
                            ctx.publish(FeedEventBody::MalformedFrame { raw, error });
                        }
                    }
                }
            }
            Err(e) => break Some(e.to_string()),
        }
    };

    if ctx.active.swap(false, Ordering::AcqRel) {
        info!(
            kind = %ctx.kind,
            connection_id = %ctx.connection_id,
            reason = reason.as_deref().unwrap_or("closed by peer"),
            "feed disconnected"
        );
        ctx.publish(FeedEventBody::Disconnected { reason });
    }
}
