//! Real-time media transport
//!
//! One negotiated peer connection per session pair, carrying the avatar's
//! audio and video downstream. The session owns connection-state observation
//! and the remote-track registry; negotiation itself (offer/answer exchange)
//! runs through the synthesis service, which drives the hooks exposed here.

mod connection;

pub use connection::TransportSession;

use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;

/// Transport connection state.
///
/// `Idle → Negotiating → Connected → Disconnected|Failed → Closed`; `Closed`
/// is terminal and only entered through [`TransportSession::close`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Created, negotiation not yet started
    Idle,
    /// Offer/answer and connectivity checks in progress
    Negotiating,
    /// Media flowing
    Connected,
    /// Connectivity lost; the pair is a candidate for recovery
    Disconnected,
    /// Connectivity establishment failed
    Failed,
    /// Closed locally; terminal
    Closed,
}

impl TransportState {
    /// Whether the transport is in its stable, probe-worthy state.
    pub fn is_stable(&self) -> bool {
        matches!(self, TransportState::Connected)
    }

    /// Whether this state calls for session recovery.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, TransportState::Disconnected | TransportState::Failed)
    }

    /// Map the underlying peer-connection state, if it is one we track.
    pub(crate) fn from_peer_state(state: RTCPeerConnectionState) -> Option<Self> {
        match state {
            RTCPeerConnectionState::New => Some(TransportState::Idle),
            RTCPeerConnectionState::Connecting => Some(TransportState::Negotiating),
            RTCPeerConnectionState::Connected => Some(TransportState::Connected),
            RTCPeerConnectionState::Disconnected => Some(TransportState::Disconnected),
            RTCPeerConnectionState::Failed => Some(TransportState::Failed),
            RTCPeerConnectionState::Closed => Some(TransportState::Closed),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TransportState::Idle => "idle",
            TransportState::Negotiating => "negotiating",
            TransportState::Connected => "connected",
            TransportState::Disconnected => "disconnected",
            TransportState::Failed => "failed",
            TransportState::Closed => "closed",
        };
        write!(f, "{}", s)
    }
}

/// Remote media track kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// Audio track
    Audio,
    /// Video track
    Video,
}

impl TrackKind {
    /// Map the RTP codec type of a remote track, if it is a media kind.
    pub(crate) fn from_codec_type(codec_type: RTPCodecType) -> Option<Self> {
        match codec_type {
            RTPCodecType::Audio => Some(TrackKind::Audio),
            RTPCodecType::Video => Some(TrackKind::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}
