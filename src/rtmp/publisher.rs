//! RTMP stream publisher
//!
//! Pushes one stream to an RTMP ingest:
//!
//! ```text
//! handshake -> Set Chunk Size -> connect -> _result
//!           -> releaseStream, FCPublish, createStream -> _result(stream id)
//!           -> publish -> onStatus(NetStream.Publish.Start)
//!           -> audio / video / @setDataFrame ...
//!           -> FCUnpublish, deleteStream
//! ```
//!
//! After setup the socket is split: frames are written by the owning worker
//! task, while a background reader answers pings, sends acknowledgements
//! and watches for the server dropping the stream.

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::chunk::{ChunkDecoder, ChunkEncoder};
use super::config::PublishConfig;
use super::handshake::client_handshake;
use super::message::{
    Command, RtmpMessage, MSG_SET_CHUNK_SIZE, MSG_SET_PEER_BANDWIDTH, MSG_WINDOW_ACK_SIZE,
};
use super::url::RtmpUrl;
use crate::amf::AmfValue;
use crate::error::{Error, Result};
use crate::media::MediaFrame;
use crate::sink::MediaSink;

const TX_CONNECT: f64 = 1.0;
const TX_RELEASE_STREAM: f64 = 2.0;
const TX_FC_PUBLISH: f64 = 3.0;
const TX_CREATE_STREAM: f64 = 4.0;
const TX_PUBLISH: f64 = 5.0;

const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;

/// Inbound bookkeeping shared by the setup phase and the background reader
#[derive(Debug)]
struct InboundState {
    decoder: ChunkDecoder,
    window_ack_size: u32,
    bytes_received: u64,
    last_ack: u64,
}

impl InboundState {
    fn new() -> Self {
        Self {
            decoder: ChunkDecoder::new(),
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            bytes_received: 0,
            last_ack: 0,
        }
    }

    /// Count received bytes, returning an Acknowledgement when the window fills
    fn on_bytes(&mut self, n: usize) -> Option<RtmpMessage> {
        self.bytes_received += n as u64;
        if self.bytes_received - self.last_ack >= u64::from(self.window_ack_size) {
            self.last_ack = self.bytes_received;
            Some(RtmpMessage::acknowledgement(self.bytes_received as u32))
        } else {
            None
        }
    }

    /// Apply a protocol control message, returning a reply if one is due
    fn on_control(&mut self, msg: &RtmpMessage) -> Option<RtmpMessage> {
        match msg.type_id {
            MSG_SET_CHUNK_SIZE => {
                if let Some(size) = msg.control_value() {
                    self.decoder.set_chunk_size(size);
                }
                None
            }
            MSG_WINDOW_ACK_SIZE => {
                if let Some(size) = msg.control_value() {
                    self.window_ack_size = size.max(1);
                }
                None
            }
            MSG_SET_PEER_BANDWIDTH => msg.control_value().map(RtmpMessage::window_ack_size),
            _ => msg.ping_request().map(RtmpMessage::ping_response),
        }
    }
}

/// Setup phase: the socket is still whole and replies are awaited inline
struct Setup {
    stream: TcpStream,
    read_buf: BytesMut,
    inbound: InboundState,
    encoder: ChunkEncoder,
    config: PublishConfig,
}

impl Setup {
    async fn send(&mut self, msg: RtmpMessage) -> Result<()> {
        let mut out = BytesMut::new();
        self.encoder.encode(&msg, &mut out);
        self.stream.write_all(&out).await?;
        Ok(())
    }

    async fn read_message(&mut self) -> Result<RtmpMessage> {
        loop {
            if let Some(msg) = self.inbound.decoder.decode(&mut self.read_buf)? {
                return Ok(msg);
            }

            let read = self.stream.read_buf(&mut self.read_buf);
            let n = tokio::time::timeout(self.config.read_timeout, read)
                .await
                .map_err(|_| Error::ConnectTimeout(self.config.read_timeout))??;
            if n == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            if let Some(ack) = self.inbound.on_bytes(n) {
                self.send(ack).await?;
            }
        }
    }

    async fn next_command(&mut self) -> Result<Command> {
        loop {
            let msg = self.read_message().await?;
            if let Some(cmd) = msg.to_command()? {
                return Ok(cmd);
            }
            if let Some(reply) = self.inbound.on_control(&msg) {
                self.send(reply).await?;
            }
        }
    }

    /// Wait for `_result` of `transaction_id`, failing on `_error`
    async fn expect_result(&mut self, command: &str, transaction_id: f64) -> Result<Command> {
        loop {
            let cmd = self.next_command().await?;
            if cmd.transaction_id != transaction_id {
                tracing::debug!(name = %cmd.name, "Ignoring unrelated command during setup");
                continue;
            }
            match cmd.name.as_str() {
                "_result" => return Ok(cmd),
                "_error" => return Err(Error::rtmp(command, cmd.description())),
                _ => continue,
            }
        }
    }

    async fn expect_publish_start(&mut self) -> Result<()> {
        loop {
            let cmd = self.next_command().await?;
            match cmd.name.as_str() {
                "onStatus" if cmd.is_error_status() => {
                    return Err(Error::rtmp("publish", cmd.description()))
                }
                "onStatus" if cmd.status_code() == Some("NetStream.Publish.Start") => {
                    return Ok(())
                }
                "_error" if cmd.transaction_id == TX_PUBLISH => {
                    return Err(Error::rtmp("publish", cmd.description()))
                }
                _ => continue,
            }
        }
    }
}

/// Publisher connected to one RTMP destination
pub struct RtmpPublisher {
    url: RtmpUrl,
    stream_id: u32,
    writer: OwnedWriteHalf,
    encoder: ChunkEncoder,
    out: BytesMut,
    replies: mpsc::UnboundedReceiver<RtmpMessage>,
    reader: Option<JoinHandle<Result<()>>>,
    closed: bool,
}

impl RtmpPublisher {
    /// Connect, handshake and start publishing
    ///
    /// Returns once the server confirmed `NetStream.Publish.Start`.
    pub async fn connect(url: &str, config: &PublishConfig) -> Result<Self> {
        let url = RtmpUrl::parse(url)?;
        let mut stream = TcpStream::connect(url.addr()).await?;
        if config.tcp_nodelay {
            stream.set_nodelay(true)?;
        }

        client_handshake(&mut stream).await?;

        let mut setup = Setup {
            stream,
            read_buf: BytesMut::with_capacity(8192),
            inbound: InboundState::new(),
            encoder: ChunkEncoder::new(),
            config: config.clone(),
        };

        setup.send(RtmpMessage::set_chunk_size(config.chunk_size)).await?;
        setup.encoder.set_chunk_size(config.chunk_size);

        setup.send(connect_command(&url, config)).await?;
        setup.expect_result("connect", TX_CONNECT).await?;

        let key = AmfValue::from(url.stream_key.as_str());
        setup
            .send(RtmpMessage::command(
                &["releaseStream".into(), TX_RELEASE_STREAM.into(), AmfValue::Null, key.clone()],
                0,
            ))
            .await?;
        setup
            .send(RtmpMessage::command(
                &["FCPublish".into(), TX_FC_PUBLISH.into(), AmfValue::Null, key.clone()],
                0,
            ))
            .await?;
        setup
            .send(RtmpMessage::command(
                &["createStream".into(), TX_CREATE_STREAM.into(), AmfValue::Null],
                0,
            ))
            .await?;

        let created = setup.expect_result("createStream", TX_CREATE_STREAM).await?;
        let stream_id = created
            .args
            .iter()
            .rev()
            .find_map(|v| v.as_number())
            .ok_or_else(|| Error::rtmp("createStream", "no stream id in reply"))?
            as u32;

        setup
            .send(RtmpMessage::command(
                &["publish".into(), TX_PUBLISH.into(), AmfValue::Null, key, "live".into()],
                stream_id,
            ))
            .await?;
        setup.expect_publish_start().await?;

        tracing::info!(
            host = %url.host,
            app = %url.app,
            stream_id = stream_id,
            "RTMP publish started"
        );

        let Setup {
            stream,
            read_buf,
            inbound,
            encoder,
            ..
        } = setup;
        let (read_half, writer) = stream.into_split();
        let (reply_tx, replies) = mpsc::unbounded_channel();
        let reader = tokio::spawn(read_loop(read_half, read_buf, inbound, reply_tx));

        Ok(Self {
            url,
            stream_id,
            writer,
            encoder,
            out: BytesMut::with_capacity(64 * 1024),
            replies,
            reader: Some(reader),
            closed: false,
        })
    }

    /// Message stream id assigned by `createStream`
    pub fn stream_id(&self) -> u32 {
        self.stream_id
    }

    async fn send(&mut self, msg: &RtmpMessage) -> Result<()> {
        while let Ok(reply) = self.replies.try_recv() {
            self.encoder.encode(&reply, &mut self.out);
        }
        self.encoder.encode(msg, &mut self.out);
        let result = self.writer.write_all(&self.out).await;
        self.out.clear();
        result.map_err(Error::from)
    }

    /// Error recorded by the background reader, if it has stopped
    async fn reader_failure(&mut self) -> Option<Error> {
        if !self.reader.as_ref().is_some_and(|r| r.is_finished()) {
            return None;
        }
        let reader = self.reader.take()?;
        Some(match reader.await {
            Ok(Err(e)) => e,
            Ok(Ok(())) => Error::NotConnected,
            Err(e) => Error::Io(std::io::Error::other(e)),
        })
    }
}

impl MediaSink for RtmpPublisher {
    async fn write_frame(&mut self, frame: &MediaFrame, timestamp: u32) -> Result<()> {
        if self.closed || self.reader.is_none() {
            return Err(Error::NotConnected);
        }
        if let Some(err) = self.reader_failure().await {
            return Err(err);
        }
        let msg = RtmpMessage::media(frame, self.stream_id, timestamp);
        self.send(&msg).await
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let key = AmfValue::from(self.url.stream_key.as_str());
        let unpublish = RtmpMessage::command(&["FCUnpublish".into(), 6.0.into(), AmfValue::Null, key], 0);
        let delete = RtmpMessage::command(
            &["deleteStream".into(), 7.0.into(), AmfValue::Null, f64::from(self.stream_id).into()],
            0,
        );

        let result = async {
            self.send(&unpublish).await?;
            self.send(&delete).await?;
            self.writer.shutdown().await?;
            Ok::<(), Error>(())
        }
        .await;

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        tracing::debug!(host = %self.url.host, app = %self.url.app, "RTMP publish closed");
        result
    }
}

impl Drop for RtmpPublisher {
    fn drop(&mut self) {
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
    }
}

fn connect_command(url: &RtmpUrl, config: &PublishConfig) -> RtmpMessage {
    let tc_url = url.tc_url();
    let props = AmfValue::object([
        ("app", AmfValue::from(url.app.as_str())),
        ("type", AmfValue::from("nonprivate")),
        ("flashVer", AmfValue::from(config.flash_ver.as_str())),
        ("swfUrl", AmfValue::from(tc_url.as_str())),
        ("tcUrl", AmfValue::from(tc_url.as_str())),
    ]);
    RtmpMessage::command(&["connect".into(), TX_CONNECT.into(), props], 0)
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    mut buf: BytesMut,
    mut inbound: InboundState,
    replies: mpsc::UnboundedSender<RtmpMessage>,
) -> Result<()> {
    loop {
        while let Some(msg) = inbound.decoder.decode(&mut buf)? {
            match msg.to_command()? {
                Some(cmd) if cmd.name == "onStatus" && cmd.is_error_status() => {
                    return Err(Error::rtmp("publish", cmd.description()));
                }
                Some(cmd) => {
                    tracing::debug!(name = %cmd.name, code = ?cmd.status_code(), "Server command");
                }
                None => {
                    if let Some(reply) = inbound.on_control(&msg) {
                        let _ = replies.send(reply);
                    }
                }
            }
        }

        let n = reader.read_buf(&mut buf).await?;
        if n == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionAborted,
                "server closed the connection",
            )
            .into());
        }
        if let Some(ack) = inbound.on_bytes(n) {
            let _ = replies.send(ack);
        }
    }
}
