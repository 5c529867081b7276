//! The network layer: TCP accept loop, per-connection reader/writer
//! tasks, and the single core loop that owns every piece of mutable
//! state.
//!
//! All state mutation happens on one task: reader tasks never touch the
//! store, they forward
//! framed lines over a channel and wait for the core's go-ahead before
//! reading again. That reply doubles as the penalty throttle — when a
//! session's accumulated penalty exceeds the threshold, the core answers
//! with the excess and the reader sleeps it off before its next read,
//! which is exactly "stops reading from its socket until the penalty
//! decays".

use std::collections::HashMap;
use std::net::SocketAddr;

use ember_proto::{IrcEncode, Message, Prefix};
use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration, Instant};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tracing::{debug, info, warn};

use crate::commands::connection::quit_user;
use crate::dispatch::{process_line, Registry};
use crate::server::{Server, ShutdownKind};
use crate::store::Uid;
use crate::user::User;

/// Everything the core loop reacts to. Readers and the accept loop only
/// ever send these; they never dereference core state.
enum CoreEvent {
    /// A new TCP connection was accepted.
    Accept { stream: TcpStream, addr: SocketAddr },
    /// A framed line arrived; `resume` tells the reader how many
    /// milliseconds to back off before the next read.
    Line {
        uid: Uid,
        line: String,
        resume: oneshot::Sender<u64>,
    },
    /// The session has been idle past the ping interval.
    IdlePing { uid: Uid },
    /// No data arrived within the post-ping grace period.
    PingTimeout { uid: Uid },
    /// The socket closed or errored.
    Disconnected { uid: Uid, reason: String },
    /// SIGINT/SIGTERM.
    Shutdown,
}

/// Accept connections and run the core loop until shutdown. Returns the
/// oper-requested shutdown kind, if any (`None` means a signal stopped
/// us).
pub async fn run(
    mut server: Server,
    registry: Registry,
    listener: TcpListener,
) -> anyhow::Result<Option<ShutdownKind>> {
    let (core_tx, mut core_rx) = mpsc::unbounded_channel::<CoreEvent>();

    {
        let core_tx = core_tx.clone();
        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if core_tx.send(CoreEvent::Accept { stream, addr }).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "accept failed");
                    }
                }
            }
        });
    }

    {
        let core_tx = core_tx.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = core_tx.send(CoreEvent::Shutdown);
            }
        });
    }

    // Wall-clock anchor for penalty decay, per session.
    let mut last_seen: HashMap<Uid, Instant> = HashMap::new();

    while let Some(event) = core_rx.recv().await {
        match event {
            CoreEvent::Accept { stream, addr } => {
                accept_session(&mut server, &core_tx, stream, addr, &mut last_seen);
            }
            CoreEvent::Line { uid, line, resume } => {
                handle_line(&mut server, &registry, &uid, &line, resume, &mut last_seen);
                if let Some(kind) = server.shutdown {
                    info!(kind = ?kind, "core loop stopping on oper request");
                    return Ok(Some(kind));
                }
            }
            CoreEvent::IdlePing { uid } => {
                let server_name = server.config().server.name.clone();
                let ping = Message {
                    tags: None,
                    prefix: None,
                    command: "PING".to_string(),
                    params: vec![server_name],
                };
                if let Some(user) = server.store.find_user_by_uid(&uid) {
                    user.send_raw(ping.to_bytes());
                }
            }
            CoreEvent::PingTimeout { uid } => {
                quit_user(&mut server, &uid, "Ping timeout");
                last_seen.remove(&uid);
            }
            CoreEvent::Disconnected { uid, reason } => {
                quit_user(&mut server, &uid, &reason);
                last_seen.remove(&uid);
            }
            CoreEvent::Shutdown => {
                info!("shutting down on signal");
                return Ok(None);
            }
        }
    }
    Ok(None)
}

/// Create the session record and spawn its reader/writer tasks.
fn accept_session(
    server: &mut Server,
    core_tx: &mpsc::UnboundedSender<CoreEvent>,
    stream: TcpStream,
    addr: SocketAddr,
    last_seen: &mut HashMap<Uid, Instant>,
) {
    let config = server.config();
    let uid = server.uid_gen.next();
    info!(uid = %uid, addr = %addr, "client connected");

    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Vec<u8>>(config.limits.sendq_max_msgs);

    // DNS is out of scope; the IP string is the real host.
    let mut user = User::new(uid.clone(), addr, addr.ip().to_string());
    user.outbound = Some(outbound_tx);
    if let Err(e) = server.store.insert_user(user) {
        warn!(uid = %uid, error = ?e, "could not insert new session");
        return;
    }
    last_seen.insert(uid.clone(), Instant::now());

    tokio::spawn(write_loop(
        write_half,
        outbound_rx,
        config.limits.send_record_size,
    ));
    tokio::spawn(read_loop(
        uid,
        read_half,
        core_tx.clone(),
        config.limits.max_line_length,
        Duration::from_secs(config.limits.ping_interval_secs),
        Duration::from_secs(config.limits.ping_grace_secs),
    ));
}

/// Dispatch one line, deliver the replies, and tell the reader how long
/// to back off.
fn handle_line(
    server: &mut Server,
    registry: &Registry,
    uid: &Uid,
    line: &str,
    resume: oneshot::Sender<u64>,
    last_seen: &mut HashMap<Uid, Instant>,
) {
    // Sessions already tearing down discard further input.
    let (quitting, saturated) = match server.store.find_user_by_uid(uid) {
        Some(user) => (user.quitting, user.sendq_saturated()),
        None => return,
    };
    if quitting {
        return;
    }
    if saturated {
        quit_user(server, uid, "SendQ exceeded");
        last_seen.remove(uid);
        return;
    }

    let now = Instant::now();
    if let Some(prev) = last_seen.insert(uid.clone(), now) {
        let elapsed_ms = now.duration_since(prev).as_millis() as i64;
        if let Some(user) = server.store.find_user_by_uid_mut(uid) {
            user.decay_penalty(elapsed_ms);
        }
    }

    debug!(uid = %uid, line = %line, "dispatching");
    // Capture the send handle first: a QUIT (or a registration denial)
    // reaps the session mid-dispatch, and its closing ERROR line still
    // has to go out.
    let outbound = server
        .store
        .find_user_by_uid(uid)
        .and_then(|u| u.outbound.clone());
    let replies = process_line(server, registry, uid, line);
    let server_name = server.config().server.name.clone();
    if let Some(tx) = outbound {
        for reply in replies {
            let _ = tx.try_send(finalize_reply(reply, &server_name).to_bytes());
        }
    }

    let threshold = server.config().limits.penalty_threshold_ms;
    match server.store.find_user_by_uid(uid) {
        Some(user) if !user.quitting => {
            let delay = (user.penalty_ms - threshold).max(0) as u64;
            // A dropped receiver just means the reader is already gone.
            let _ = resume.send(delay);
        }
        // Session reaped mid-command (QUIT, KILL): dropping the ack
        // stops the reader.
        _ => {}
    }
}

/// Handler replies are built unsourced; numerics and other server-origin
/// lines pick up the server-name prefix here. `ERROR` is conventionally
/// sent bare, and anything a handler sourced itself passes through.
fn finalize_reply(mut message: Message, server_name: &str) -> Message {
    if message.prefix.is_none() && message.command != "ERROR" {
        message.prefix = Some(Prefix::ServerName(server_name.to_string()));
    }
    message
}

/// Per-connection read loop: frame lines, forward them, obey the core's
/// back-off, and track the idle-ping protocol.
async fn read_loop(
    uid: Uid,
    read_half: OwnedReadHalf,
    core_tx: mpsc::UnboundedSender<CoreEvent>,
    max_line: usize,
    ping_interval: Duration,
    ping_grace: Duration,
) {
    let mut frames = FramedRead::new(read_half, LinesCodec::new_with_max_length(max_line));
    let mut pinged = false;

    loop {
        let wait = if pinged { ping_grace } else { ping_interval };
        match timeout(wait, frames.next()).await {
            Ok(Some(Ok(line))) => {
                pinged = false;
                let (resume, resumed) = oneshot::channel();
                if core_tx
                    .send(CoreEvent::Line {
                        uid: uid.clone(),
                        line,
                        resume,
                    })
                    .is_err()
                {
                    return;
                }
                match resumed.await {
                    Ok(0) => {}
                    Ok(delay_ms) => tokio::time::sleep(Duration::from_millis(delay_ms)).await,
                    // Core dropped the ack: the session was reaped.
                    Err(_) => return,
                }
            }
            Ok(Some(Err(LinesCodecError::MaxLineLengthExceeded))) => {
                // The codec already skipped to the next line boundary.
                debug!(uid = %uid, "overlong line dropped");
                pinged = false;
            }
            Ok(Some(Err(LinesCodecError::Io(e)))) => {
                let _ = core_tx.send(CoreEvent::Disconnected {
                    uid,
                    reason: format!("Read error: {e}"),
                });
                return;
            }
            Ok(None) => {
                let _ = core_tx.send(CoreEvent::Disconnected {
                    uid,
                    reason: "Connection closed".to_string(),
                });
                return;
            }
            Err(_elapsed) if !pinged => {
                pinged = true;
                if core_tx.send(CoreEvent::IdlePing { uid: uid.clone() }).is_err() {
                    return;
                }
            }
            Err(_elapsed) => {
                let _ = core_tx.send(CoreEvent::PingTimeout { uid });
                return;
            }
        }
    }
}

/// Per-connection write loop: drain the send queue, coalescing queued
/// messages into records of up to `record_size` bytes.
async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Vec<u8>>,
    record_size: usize,
) {
    let mut record = bytes::BytesMut::with_capacity(record_size);
    while let Some(bytes) = outbound.recv().await {
        record.extend_from_slice(&bytes);
        while record.len() < record_size {
            match outbound.try_recv() {
                Ok(more) => record.extend_from_slice(&more),
                Err(_) => break,
            }
        }
        if write_half.write_all(&record).await.is_err() {
            // The reader half reports the disconnect; just stop draining.
            return;
        }
        record.clear();
    }
    let _ = write_half.shutdown().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numerics_get_server_prefix() {
        let msg = Message::reply(
            ember_proto::Response::RPL_WELCOME,
            "alice",
            vec!["Welcome".to_string()],
        );
        let finalized = finalize_reply(msg, "irc.example.test");
        assert_eq!(
            finalized.prefix,
            Some(Prefix::ServerName("irc.example.test".to_string()))
        );
    }

    #[test]
    fn error_lines_stay_bare() {
        let msg = Message {
            tags: None,
            prefix: None,
            command: "ERROR".to_string(),
            params: vec!["Closing link".to_string()],
        };
        let finalized = finalize_reply(msg, "irc.example.test");
        assert!(finalized.prefix.is_none());
    }

    #[test]
    fn user_sourced_messages_pass_through() {
        let msg = Message {
            tags: None,
            prefix: Some(Prefix::new("alice", "a", "host")),
            command: "JOIN".to_string(),
            params: vec!["#test".to_string()],
        };
        let finalized = finalize_reply(msg.clone(), "irc.example.test");
        assert_eq!(finalized, msg);
    }
}
