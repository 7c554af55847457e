//! Peer connection lifecycle for one avatar session

use crate::auth::RelayCredential;
use crate::transport::{TrackKind, TransportState};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::api::APIBuilder;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;
use webrtc::peer_connection::RTCPeerConnection as WebRTCPeerConnection;
use webrtc::rtp_transceiver::rtp_codec::RTPCodecType;
use webrtc::rtp_transceiver::rtp_receiver::RTCRtpReceiver;
use webrtc::rtp_transceiver::RTCRtpTransceiver;
use webrtc::track::track_remote::TrackRemote;

/// Observer invoked on transport state transitions.
type StateObserver = Arc<dyn Fn(TransportState) + Send + Sync>;

/// Observer invoked when a remote track lands. The flag reports whether the
/// track replaced an earlier one of the same kind.
type TrackObserver = Arc<dyn Fn(TrackKind, Arc<TrackRemote>, bool) + Send + Sync>;

/// WebRTC transport session wrapper
///
/// Wraps a webrtc::RTCPeerConnection configured for receiving the avatar's
/// audio and video streams through a relay. Each session instance corresponds
/// to exactly one negotiation; recovery builds a fresh session rather than
/// renegotiating this one.
pub struct TransportSession {
    /// Unique identifier for this connection instance
    connection_id: String,

    /// Current transport state
    state: Arc<RwLock<TransportState>>,

    /// Actual WebRTC peer connection
    peer_connection: Arc<WebRTCPeerConnection>,

    /// Remote tracks keyed by kind; a renegotiated track replaces its
    /// predecessor instead of accumulating
    remote_tracks: Arc<RwLock<HashMap<TrackKind, Arc<TrackRemote>>>>,

    /// Observer for state transitions
    state_observer: Arc<RwLock<Option<StateObserver>>>,

    /// Observer for remote track arrival
    track_observer: Arc<RwLock<Option<TrackObserver>>>,

    /// Timestamp when the connection reached `Connected`
    connected_at: Arc<RwLock<Option<SystemTime>>>,

    /// Whether close() has already run
    closed: AtomicBool,
}

impl TransportSession {
    /// Create a new transport session from a relay credential
    ///
    /// Declares one video and one audio transceiver up front so that both
    /// media sections appear in the SDP offer; the avatar service only ever
    /// sends media downstream on those two.
    #[instrument(skip(relay))]
    pub async fn create(relay: &RelayCredential) -> Result<Self> {
        let connection_id = uuid::Uuid::new_v4().to_string();

        info!("Creating transport session: connection_id={}", connection_id);

        // Create MediaEngine with default codecs
        let mut media_engine = MediaEngine::default();

        media_engine
            .register_default_codecs()
            .map_err(|e| Error::TransportError(format!("Failed to register codecs: {}", e)))?;

        // Create InterceptorRegistry with default interceptors
        let interceptor_registry =
            register_default_interceptors(Default::default(), &mut media_engine).map_err(|e| {
                Error::TransportError(format!("Failed to register interceptors: {}", e))
            })?;

        // Build WebRTC API
        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(interceptor_registry)
            .build();

        // The relay hands out a single TURN credential set covering all of
        // its transport URLs
        let ice_servers = vec![RTCIceServer {
            urls: relay.urls.clone(),
            username: relay.username.clone(),
            credential: relay.password.clone(),
            ..Default::default()
        }];

        let rtc_config = RTCConfiguration {
            ice_servers,
            ..Default::default()
        };

        // Create peer connection
        let peer_connection =
            Arc::new(api.new_peer_connection(rtc_config).await.map_err(|e| {
                Error::TransportError(format!("Failed to create peer connection: {}", e))
            })?);

        // Video first, then audio, before any negotiation starts
        peer_connection
            .add_transceiver_from_kind(RTPCodecType::Video, None)
            .await
            .map_err(|e| {
                Error::TransportError(format!("Failed to add video transceiver: {}", e))
            })?;

        peer_connection
            .add_transceiver_from_kind(RTPCodecType::Audio, None)
            .await
            .map_err(|e| {
                Error::TransportError(format!("Failed to add audio transceiver: {}", e))
            })?;

        let state = Arc::new(RwLock::new(TransportState::Idle));
        let connected_at = Arc::new(RwLock::new(None));
        let state_observer: Arc<RwLock<Option<StateObserver>>> = Arc::new(RwLock::new(None));
        let track_observer: Arc<RwLock<Option<TrackObserver>>> = Arc::new(RwLock::new(None));
        let remote_tracks: Arc<RwLock<HashMap<TrackKind, Arc<TrackRemote>>>> =
            Arc::new(RwLock::new(HashMap::new()));

        // Set up connection state change handler
        let state_clone = Arc::clone(&state);
        let connected_at_clone = Arc::clone(&connected_at);
        let observer_clone = Arc::clone(&state_observer);
        let id_clone = connection_id.clone();

        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let state_clone = Arc::clone(&state_clone);
                let connected_at_clone = Arc::clone(&connected_at_clone);
                let observer_clone = Arc::clone(&observer_clone);
                let connection_id = id_clone.clone();

                Box::pin(async move {
                    let new_state = match TransportState::from_peer_state(s) {
                        Some(state) => state,
                        None => return,
                    };

                    if new_state == TransportState::Connected {
                        *connected_at_clone.write().await = Some(SystemTime::now());
                    }

                    if store_transition(&state_clone, &connection_id, new_state).await {
                        let observer = observer_clone.read().await.clone();
                        if let Some(observer) = observer {
                            observer(new_state);
                        }
                    }
                })
            },
        ));

        // Set up remote track handler
        let tracks_clone = Arc::clone(&remote_tracks);
        let track_observer_clone = Arc::clone(&track_observer);
        let id_clone = connection_id.clone();

        peer_connection.on_track(Box::new(
            move |track: Arc<TrackRemote>,
                  _receiver: Arc<RTCRtpReceiver>,
                  _transceiver: Arc<RTCRtpTransceiver>| {
                let tracks_clone = Arc::clone(&tracks_clone);
                let track_observer_clone = Arc::clone(&track_observer_clone);
                let connection_id = id_clone.clone();

                Box::pin(async move {
                    let kind = match TrackKind::from_codec_type(track.kind()) {
                        Some(kind) => kind,
                        None => return,
                    };

                    let replaced = tracks_clone
                        .write()
                        .await
                        .insert(kind, Arc::clone(&track))
                        .is_some();

                    info!(
                        "Transport {} received {} track (ssrc={}, replaced={})",
                        connection_id,
                        kind,
                        track.ssrc(),
                        replaced
                    );

                    let observer = track_observer_clone.read().await.clone();
                    if let Some(observer) = observer {
                        observer(kind, track, replaced);
                    }
                })
            },
        ));

        Ok(Self {
            connection_id,
            state,
            peer_connection,
            remote_tracks,
            state_observer,
            track_observer,
            connected_at,
            closed: AtomicBool::new(false),
        })
    }

    /// Get the connection ID
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    /// Get the current transport state
    pub async fn state(&self) -> TransportState {
        *self.state.read().await
    }

    /// Whether media is currently flowing
    pub async fn is_connected(&self) -> bool {
        self.state().await.is_stable()
    }

    /// Set the transport state
    pub(crate) async fn set_state(&self, new_state: TransportState) {
        if store_transition(&self.state, &self.connection_id, new_state).await {
            if new_state == TransportState::Connected {
                *self.connected_at.write().await = Some(SystemTime::now());
            }

            let observer = self.state_observer.read().await.clone();
            if let Some(observer) = observer {
                observer(new_state);
            }
        }
    }

    /// Register an observer for state transitions
    ///
    /// Replaces any previously registered observer. The observer runs on the
    /// transport's event path and must not block.
    pub async fn set_state_observer<F>(&self, observer: F)
    where
        F: Fn(TransportState) + Send + Sync + 'static,
    {
        *self.state_observer.write().await = Some(Arc::new(observer));
    }

    /// Register an observer for remote track arrival
    pub async fn set_track_observer<F>(&self, observer: F)
    where
        F: Fn(TrackKind, Arc<TrackRemote>, bool) + Send + Sync + 'static,
    {
        *self.track_observer.write().await = Some(Arc::new(observer));
    }

    /// Get the most recent remote track of a kind, if one has arrived
    pub async fn remote_track(&self, kind: TrackKind) -> Option<Arc<TrackRemote>> {
        self.remote_tracks.read().await.get(&kind).cloned()
    }

    /// Create an SDP offer
    ///
    /// Generates the local SDP offer that the synthesis service relays to the
    /// avatar backend. Returns the SDP string.
    pub async fn create_offer(&self) -> Result<String> {
        self.set_state(TransportState::Negotiating).await;

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .map_err(|e| {
                Error::TransportNegotiationFailed(format!("Failed to create offer: {}", e))
            })?;

        self.peer_connection
            .set_local_description(offer)
            .await
            .map_err(|e| {
                Error::TransportNegotiationFailed(format!("Failed to set local description: {}", e))
            })?;

        let local_desc = self
            .peer_connection
            .local_description()
            .await
            .ok_or_else(|| {
                Error::TransportNegotiationFailed(
                    "No local description after setting offer".to_string(),
                )
            })?;

        let sdp = local_desc.sdp.clone();

        debug!("Created SDP offer for transport {}", self.connection_id);

        Ok(sdp)
    }

    /// Apply the remote SDP answer
    ///
    /// # Arguments
    ///
    /// * `sdp` - The SDP answer produced by the avatar backend
    pub async fn apply_answer(&self, sdp: String) -> Result<()> {
        debug!("Applying remote answer for transport {}", self.connection_id);

        let answer = RTCSessionDescription::answer(sdp).map_err(|e| {
            Error::TransportNegotiationFailed(format!("Failed to parse answer: {}", e))
        })?;

        self.peer_connection
            .set_remote_description(answer)
            .await
            .map_err(|e| {
                Error::TransportNegotiationFailed(format!(
                    "Failed to set remote description: {}",
                    e
                ))
            })?;

        self.set_state(TransportState::Negotiating).await;

        Ok(())
    }

    /// How long the transport has been connected, if it ever connected
    pub async fn uptime(&self) -> Option<Duration> {
        let connected_at = (*self.connected_at.read().await)?;
        connected_at.elapsed().ok()
    }

    /// Close the transport
    ///
    /// Idempotent; the first call tears down the peer connection and later
    /// calls return without effect.
    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Transport {} already closed", self.connection_id);
            return Ok(());
        }

        info!("Closing transport session {}", self.connection_id);

        self.set_state(TransportState::Closed).await;

        self.peer_connection.close().await.map_err(|e| {
            Error::TransportError(format!("Failed to close peer connection: {}", e))
        })?;

        Ok(())
    }
}

/// Record a state transition, returning whether anything changed.
///
/// `Closed` is terminal: late peer-connection callbacks arriving after a
/// local close must not resurrect the session.
async fn store_transition(
    state: &RwLock<TransportState>,
    connection_id: &str,
    new_state: TransportState,
) -> bool {
    let mut guard = state.write().await;
    let old_state = *guard;

    if old_state == new_state || old_state == TransportState::Closed {
        return false;
    }

    debug!(
        "Transport {} state transition: {} -> {}",
        connection_id, old_state, new_state
    );
    *guard = new_state;

    true
}
