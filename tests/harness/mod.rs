//! Scripted session backends for end-to-end controller tests
//!
//! The controller reaches the outside world through three seams: the token
//! provider, the synthesis connector, and the dialogue backend. The harness
//! provides scripted implementations of all three so a complete session can
//! run in-process with no services behind it:
//!
//! - [`ScriptedTokens`] hands out fixed credentials and counts fetches
//! - [`ScriptedSynthesis`] records every markup document and scripts outcomes
//! - [`ScriptedDialogue`] detects a fixed language and appends a scripted reply
//!
//! [`SessionFixture`] wires the three into a controller plus its event stream.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use avatar_rtc::{
    AvatarAppearance, AvatarSessionConfig, AvatarSessionController, CancelReason,
    ConversationTurn, DialogueBackend, DialogueReply, Error, Product, RelayCredential, Result,
    SessionEvent, SpeechCredential, SsmlDocument, SynthesisConnector, SynthesisOutcome,
    SynthesisSession, TokenProvider, TransportSession,
};

/// Initialize tracing for tests (call once per test)
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,webrtc=warn")
        .try_init();
}

/// Let spawned session tasks run to their next suspension point.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

/// A product offer shaped like the backend's catalog entries.
pub fn sample_product(content: &str) -> Product {
    Product {
        content: Some(content.to_string()),
        image_url: Some("https://cdn.example.com/item.png".to_string()),
        extra: serde_json::Map::new(),
    }
}

// ============================================================================
// Scripted credentials
// ============================================================================

/// Token provider handing out fixed credentials.
pub struct ScriptedTokens {
    relay_fetches: AtomicU32,
}

impl ScriptedTokens {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            relay_fetches: AtomicU32::new(0),
        })
    }

    /// How many relay credentials have been fetched; one per pair build.
    pub fn relay_fetches(&self) -> u32 {
        self.relay_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for ScriptedTokens {
    async fn fetch_transport_credential(&self) -> Result<RelayCredential> {
        self.relay_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(RelayCredential {
            urls: vec!["stun:stun.l.google.com:19302".to_string()],
            username: String::new(),
            password: String::new(),
        })
    }

    async fn fetch_synthesis_credential(&self) -> Result<SpeechCredential> {
        Ok(SpeechCredential {
            token: "scripted-token".to_string(),
        })
    }
}

// ============================================================================
// Scripted synthesis
// ============================================================================

/// Synthesis session that records markup and scripts its outcomes.
pub struct ScriptedSynthesis {
    start_outcome: SynthesisOutcome,
    closes: AtomicU32,
    spoken: Mutex<Vec<String>>,
}

impl ScriptedSynthesis {
    /// Session whose avatar start and utterances all complete.
    pub fn completing() -> Arc<Self> {
        Arc::new(Self {
            start_outcome: SynthesisOutcome::Completed {
                result_id: "avatar".to_string(),
            },
            closes: AtomicU32::new(0),
            spoken: Mutex::new(Vec::new()),
        })
    }

    /// Session whose avatar start is canceled with a service-error cause.
    pub fn failing_start(detail: &str) -> Arc<Self> {
        Arc::new(Self {
            start_outcome: SynthesisOutcome::Canceled {
                reason: CancelReason::ServiceError,
                detail: detail.to_string(),
            },
            closes: AtomicU32::new(0),
            spoken: Mutex::new(Vec::new()),
        })
    }

    /// Markup documents submitted so far, in submission order.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn closes(&self) -> u32 {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisSession for ScriptedSynthesis {
    async fn start_avatar(&self, _transport: Arc<TransportSession>) -> SynthesisOutcome {
        self.start_outcome.clone()
    }

    async fn speak(&self, document: &SsmlDocument) -> SynthesisOutcome {
        let mut spoken = self.spoken.lock().unwrap();
        spoken.push(document.as_str().to_string());
        SynthesisOutcome::Completed {
            result_id: format!("utterance-{}", spoken.len()),
        }
    }

    async fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out one scripted session per fixture.
pub struct ScriptedConnector {
    session: Arc<ScriptedSynthesis>,
    connects: AtomicU32,
}

impl ScriptedConnector {
    pub fn new(session: Arc<ScriptedSynthesis>) -> Arc<Self> {
        Arc::new(Self {
            session,
            connects: AtomicU32::new(0),
        })
    }

    pub fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisConnector for ScriptedConnector {
    async fn connect(
        &self,
        _credential: &SpeechCredential,
        _appearance: &AvatarAppearance,
    ) -> Result<Arc<dyn SynthesisSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.session) as Arc<dyn SynthesisSession>)
    }
}

// ============================================================================
// Scripted dialogue
// ============================================================================

/// Dialogue backend that detects a fixed language and appends a scripted
/// assistant reply to whatever log it receives.
pub struct ScriptedDialogue {
    language: Option<String>,
    reply_text: String,
    products: Vec<Product>,
    exchanges: AtomicU32,
}

impl ScriptedDialogue {
    pub fn replying(language: &str, reply_text: &str) -> Arc<Self> {
        Arc::new(Self {
            language: Some(language.to_string()),
            reply_text: reply_text.to_string(),
            products: Vec::new(),
            exchanges: AtomicU32::new(0),
        })
    }

    pub fn with_products(language: &str, reply_text: &str, products: Vec<Product>) -> Arc<Self> {
        Arc::new(Self {
            language: Some(language.to_string()),
            reply_text: reply_text.to_string(),
            products,
            exchanges: AtomicU32::new(0),
        })
    }

    /// Backend whose language detection always fails.
    pub fn without_detection() -> Arc<Self> {
        Arc::new(Self {
            language: None,
            reply_text: String::new(),
            products: Vec::new(),
            exchanges: AtomicU32::new(0),
        })
    }

    pub fn exchanges(&self) -> u32 {
        self.exchanges.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DialogueBackend for ScriptedDialogue {
    async fn exchange(&self, turns: &[ConversationTurn]) -> Result<DialogueReply> {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        let mut messages = turns.to_vec();
        messages.push(ConversationTurn::assistant(&self.reply_text));
        Ok(DialogueReply {
            messages,
            products: self.products.clone(),
        })
    }

    async fn detect_language(&self, _text: &str) -> Result<String> {
        self.language
            .clone()
            .ok_or_else(|| Error::DialogueFailed("detection unavailable".to_string()))
    }
}

// ============================================================================
// Fixture
// ============================================================================

/// A controller wired to scripted backends, plus handles to observe them.
pub struct SessionFixture {
    pub controller: AvatarSessionController,
    pub events: mpsc::UnboundedReceiver<SessionEvent>,
    pub tokens: Arc<ScriptedTokens>,
    pub synthesis: Arc<ScriptedSynthesis>,
    pub connector: Arc<ScriptedConnector>,
    pub dialogue: Arc<ScriptedDialogue>,
}

impl SessionFixture {
    /// Fixture around the default configuration with completing synthesis.
    pub fn new(dialogue: Arc<ScriptedDialogue>) -> Result<Self> {
        Self::with_synthesis(dialogue, ScriptedSynthesis::completing())
    }

    pub fn with_synthesis(
        dialogue: Arc<ScriptedDialogue>,
        synthesis: Arc<ScriptedSynthesis>,
    ) -> Result<Self> {
        let tokens = ScriptedTokens::new();
        let connector = ScriptedConnector::new(Arc::clone(&synthesis));

        let (controller, events) = AvatarSessionController::new(
            AvatarSessionConfig::new("http://localhost:7071/api"),
            Arc::clone(&tokens) as Arc<dyn TokenProvider>,
            Arc::clone(&connector) as Arc<dyn SynthesisConnector>,
            Arc::clone(&dialogue) as Arc<dyn DialogueBackend>,
        )?;

        Ok(Self {
            controller,
            events,
            tokens,
            synthesis,
            connector,
            dialogue,
        })
    }

    /// Pop every queued event.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
