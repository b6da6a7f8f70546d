//! A2S_INFO probe over UDP.

use async_trait::async_trait;
use chrono::Utc;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{UdpSocket, lookup_host};
use tokio::time::Instant;
use tracing::{debug, trace};

use a2s::{InfoReply, MAX_PACKET_SIZE, ServerInfo, decode_info_reply, encode_info_request};

use super::{ProbeFailure, ProbeTarget, StatusProbe};
use crate::Result;
use crate::domain::Snapshot;

/// Queries a Steam game server with A2S_INFO.
#[derive(Debug, Clone, Default)]
pub struct A2sProbe;

impl A2sProbe {
    pub fn new() -> Self {
        Self
    }

    async fn resolve(target: &ProbeTarget) -> std::result::Result<SocketAddr, ProbeFailure> {
        let mut addrs = lookup_host(target.to_string())
            .await
            .map_err(|e| ProbeFailure::Unreachable(format!("failed to resolve {target}: {e}")))?;
        addrs
            .next()
            .ok_or_else(|| ProbeFailure::Unreachable(format!("no address found for {target}")))
    }

    /// Run the request/challenge exchange. Returns the info block and the
    /// time from the first send to the final reply.
    async fn query(
        target: &ProbeTarget,
    ) -> std::result::Result<(ServerInfo, Duration), ProbeFailure> {
        let addr = Self::resolve(target).await?;
        let bind_addr = if addr.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(addr).await?;

        let mut buf = vec![0u8; MAX_PACKET_SIZE];
        let mut challenge = None;
        let started = Instant::now();

        loop {
            socket.send(&encode_info_request(challenge)).await?;
            let len = socket.recv(&mut buf).await?;
            trace!(bytes = len, "A2S reply from {}", addr);

            match decode_info_reply(&buf[..len])? {
                InfoReply::Info(info) => return Ok((*info, started.elapsed())),
                InfoReply::Challenge(c) if challenge.is_none() => {
                    debug!("A2S challenge from {}, resending", addr);
                    challenge = Some(c);
                }
                InfoReply::Challenge(_) => {
                    return Err(ProbeFailure::Protocol(
                        "server answered the challenge with another challenge".to_string(),
                    ));
                }
            }
        }
    }
}

#[async_trait]
impl StatusProbe for A2sProbe {
    async fn probe(&self, address: &str, timeout: Duration) -> Result<Snapshot> {
        let target = ProbeTarget::parse(address)?;

        let outcome = tokio::time::timeout(timeout, Self::query(&target)).await;
        let observed_at = Utc::now();

        let snapshot = match outcome {
            Ok(Ok((info, latency))) => {
                Snapshot::online(
                    observed_at,
                    u32::from(info.players),
                    u32::from(info.max_players),
                    info.map,
                )
                .with_server(info.name, info.version)
                .with_latency(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX))
            }
            Ok(Err(failure)) => {
                debug!(address = %target, reason = %failure, "Probe failed");
                Snapshot::offline(observed_at, Some(failure.to_string()))
            }
            Err(_) => {
                debug!(address = %target, ?timeout, "Probe timed out");
                Snapshot::offline(observed_at, Some(ProbeFailure::Timeout.to_string()))
            }
        };

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_reply(players: u8, max_players: u8) -> Vec<u8> {
        let mut p = vec![0xFF, 0xFF, 0xFF, 0xFF, 0x49, 0x11];
        p.extend_from_slice(b"Test Server\0");
        p.extend_from_slice(b"Russia\0");
        p.extend_from_slice(b"unturned\0");
        p.extend_from_slice(b"Unturned\0");
        p.extend_from_slice(&0u16.to_le_bytes());
        p.extend_from_slice(&[players, max_players, 0, b'd', b'l', 0, 1]);
        p.extend_from_slice(b"3.24.1.0\0");
        p
    }

    /// Bind a fake server that answers the first request with a challenge
    /// and the challenged request with an info reply.
    async fn spawn_server(challenge: bool) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 1400];
            let (len, peer) = socket.recv_from(&mut buf).await.unwrap();
            let mut request = buf[..len].to_vec();

            if challenge {
                socket
                    .send_to(&[0xFF, 0xFF, 0xFF, 0xFF, 0x41, 9, 8, 7, 6], peer)
                    .await
                    .unwrap();
                let (len, _) = socket.recv_from(&mut buf).await.unwrap();
                request = buf[..len].to_vec();
                assert_eq!(&request[request.len() - 4..], &[9, 8, 7, 6]);
            }

            assert_eq!(request[4], 0x54);
            socket.send_to(&info_reply(30, 24), peer).await.unwrap();
        });

        addr
    }

    #[tokio::test]
    async fn test_probe_online_with_challenge() {
        let addr = spawn_server(true).await;
        let snapshot = A2sProbe::new()
            .probe(&addr.to_string(), Duration::from_secs(2))
            .await
            .unwrap();

        assert!(snapshot.online);
        assert_eq!(snapshot.map_name, "Russia");
        assert_eq!(snapshot.server_name, "Test Server");
        assert_eq!(snapshot.version, "3.24.1.0");
        // 30 reported players clamp to the 24 slots.
        assert_eq!(snapshot.player_count, 24);
        assert_eq!(snapshot.max_players, 24);
        assert!(snapshot.latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_probe_online_without_challenge() {
        let addr = spawn_server(false).await;
        let snapshot = A2sProbe::new()
            .probe(&addr.to_string(), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(snapshot.online);
        assert!(snapshot.failure_reason.is_none());
    }

    #[tokio::test]
    async fn test_probe_silent_server_times_out() {
        // Bound but never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let snapshot = A2sProbe::new()
            .probe(&addr.to_string(), Duration::from_millis(100))
            .await
            .unwrap();

        assert!(!snapshot.online);
        assert_eq!(snapshot.failure_reason.as_deref(), Some("timeout"));
        drop(silent);
    }

    #[tokio::test]
    async fn test_probe_garbage_reply_is_protocol_error() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 1400];
            let (_, peer) = socket.recv_from(&mut buf).await.unwrap();
            socket.send_to(&[0xFE, 0xFF, 0xFF, 0xFF, 0, 0], peer).await.unwrap();
        });

        let snapshot = A2sProbe::new()
            .probe(&addr.to_string(), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!snapshot.online);
        assert!(
            snapshot
                .failure_reason
                .unwrap()
                .starts_with("protocol error")
        );
    }

    #[tokio::test]
    async fn test_probe_malformed_address_is_error() {
        let err = A2sProbe::new()
            .probe("not-an-address", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
