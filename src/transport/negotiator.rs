use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use str0m::change::SdpAnswer;
use str0m::media::{Direction, MediaKind};
use str0m::{Candidate, Rtc};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use super::channel::ChannelGate;
use super::peer::{AudioParams, PeerDriver, PeerTransport};
use super::signaling::{HttpSignaling, Signaling};
use super::{stun, Negotiator, OpenedTransport};
use crate::agent;
use crate::capture::MediaStream;
use crate::config::Config;
use crate::consts::DATA_CHANNEL_LABEL;
use crate::credential::Credential;
use crate::error::{Result, SessionError};
use crate::types::ClientEvent;

/// Opens str0m peer connections against the realtime endpoint.
pub struct RtcNegotiator {
    signaling: Arc<dyn Signaling>,
    stun_url: Option<String>,
    session_update: ClientEvent,
}

impl RtcNegotiator {
    pub fn new(signaling: Arc<dyn Signaling>, stun_url: Option<String>, session_update: ClientEvent) -> Self {
        Self {
            signaling,
            stun_url,
            session_update,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &Config) -> Self {
        let signaling = HttpSignaling::new(client, config.realtime_endpoint(), config.model());
        Self::new(
            Arc::new(signaling),
            config.stun_url().map(str::to_string),
            agent::session_update(config.voice().clone()),
        )
    }

    async fn gather(&self, rtc: &mut Rtc, socket: &UdpSocket) -> Result<SocketAddr> {
        let port = socket
            .local_addr()
            .map_err(|e| SessionError::Negotiation(format!("socket has no address: {}", e)))?
            .port();
        let host = SocketAddr::new(local_ip(), port);
        match Candidate::host(host, "udp") {
            Ok(candidate) => {
                rtc.add_local_candidate(candidate);
                tracing::debug!("host candidate {}", host);
            }
            Err(e) => tracing::warn!("invalid host candidate {}: {}", host, e),
        }

        if let Some(url) = &self.stun_url {
            match stun::probe(socket, url, stun::PROBE_TIMEOUT).await {
                Ok(mapped) if mapped != host => match Candidate::server_reflexive(mapped, host, "udp") {
                    Ok(candidate) => {
                        rtc.add_local_candidate(candidate);
                        tracing::debug!("server reflexive candidate {}", mapped);
                    }
                    Err(e) => tracing::warn!("invalid reflexive candidate {}: {}", mapped, e),
                },
                Ok(_) => {}
                Err(e) => tracing::warn!("stun probe via {} failed, using host candidates only: {}", url, e),
            }
        }
        Ok(host)
    }
}

#[async_trait]
impl Negotiator for RtcNegotiator {
    async fn open(&self, credential: Credential, stream: MediaStream) -> Result<OpenedTransport> {
        if credential.token().expose_secret().is_empty() {
            return Err(SessionError::TokenUnavailable);
        }

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| SessionError::Negotiation(format!("failed to bind udp socket: {}", e)))?;

        let mut rtc = Rtc::new(Instant::now());
        let local_addr = self.gather(&mut rtc, &socket).await?;

        let mut changes = rtc.sdp_api();
        let mid = changes.add_media(MediaKind::Audio, Direction::SendRecv, None, None, None);
        let channel_id = changes.add_channel(DATA_CHANNEL_LABEL.to_string());
        let (offer, pending) = changes
            .apply()
            .ok_or_else(|| SessionError::Negotiation("no local offer generated".to_string()))?;

        let answer_sdp = self.signaling.exchange(offer.to_sdp_string(), &credential).await?;
        let answer = SdpAnswer::from_sdp_string(&answer_sdp)
            .map_err(|e| SessionError::Negotiation(format!("invalid SDP answer: {}", e)))?;
        rtc.sdp_api()
            .accept_answer(pending, answer)
            .map_err(|e| SessionError::Negotiation(format!("failed to apply SDP answer: {}", e)))?;

        let (pt, clock_rate) = {
            let writer = rtc
                .writer(mid)
                .ok_or_else(|| SessionError::Negotiation("audio track not negotiated".to_string()))?;
            let params = writer
                .payload_params()
                .next()
                .ok_or_else(|| SessionError::Negotiation("no audio codec negotiated".to_string()))?;
            (params.pt(), params.spec().clock_rate)
        };
        tracing::info!("SDP handshake complete: audio mid={}, pt={:?}", mid, pt);

        let gate = ChannelGate::new(self.session_update.clone());
        let open = gate.open_flag();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let driver = PeerDriver::new(
            rtc,
            socket,
            local_addr,
            AudioParams { mid, pt, clock_rate },
            channel_id,
            gate,
            stream,
            command_rx,
            event_tx,
        );
        tokio::spawn(driver.run());

        Ok(OpenedTransport {
            transport: Arc::new(PeerTransport::new(command_tx, open)),
            events: event_rx,
        })
    }
}

/// The address of the interface that routes to the public internet.
/// A UDP connect sends nothing.
fn local_ip() -> IpAddr {
    let probe = std::net::UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80)).map(|_| socket))
        .and_then(|socket| socket.local_addr());
    match probe {
        Ok(addr) => addr.ip(),
        Err(e) => {
            tracing::warn!("no routable interface, using loopback: {}", e);
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::tests::test_stream;
    use crate::transport::signaling::MockSignaling;
    use crate::types::audio::Voice;

    fn negotiator(signaling: MockSignaling) -> RtcNegotiator {
        RtcNegotiator::new(Arc::new(signaling), None, agent::session_update(Voice::Ash))
    }

    #[tokio::test]
    async fn empty_credential_is_rejected_before_signaling() {
        let mut signaling = MockSignaling::new();
        signaling.expect_exchange().never();
        let (stream, _tx, _) = test_stream();

        let result = negotiator(signaling).open(Credential::new("", None), stream).await;
        assert_eq!(result.err(), Some(SessionError::TokenUnavailable));
    }

    #[tokio::test]
    async fn offer_carries_audio_and_control_channel() {
        let mut signaling = MockSignaling::new();
        signaling
            .expect_exchange()
            .withf(|offer, _| offer.contains("m=audio") && offer.contains("m=application"))
            .times(1)
            .returning(|_, _| Err(SessionError::Negotiation("SDP exchange returned 401 Unauthorized".into())));
        let (stream, _tx, _) = test_stream();

        let result = negotiator(signaling).open(Credential::new("ek_1", None), stream).await;
        assert_eq!(
            result.err(),
            Some(SessionError::Negotiation("SDP exchange returned 401 Unauthorized".into()))
        );
    }

    #[tokio::test]
    async fn unusable_answer_is_a_negotiation_error() {
        let mut signaling = MockSignaling::new();
        signaling
            .expect_exchange()
            .times(1)
            .returning(|_, _| Ok("this is not sdp".to_string()));
        let (stream, _tx, _) = test_stream();

        let result = negotiator(signaling).open(Credential::new("ek_1", None), stream).await;
        assert!(matches!(result.err(), Some(SessionError::Negotiation(_))));
    }
}
