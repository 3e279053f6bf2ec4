use tokio::sync::mpsc;
use voice_hints::config::Settings;
use voice_hints::context::context::DocumentContext;
use voice_hints::context::messages::{FrameEnvelope, FrameMessage};
use voice_hints::dom::document::{Document, Element, ElementTree};
use voice_hints::hints::alphabet::HintAlphabet;
use voice_hints::hints::pool::HintPool;

// =========================================================================
// Page fixtures
// =========================================================================

pub fn link(id: &str, y: f64) -> ElementTree {
    ElementTree::new(
        Element::new("a")
            .with_attr("id", id)
            .with_attr("href", &format!("https://example.com/{id}"))
            .with_rect(10.0, y, 80.0, 20.0)
            .with_text(id),
    )
}

pub fn button(id: &str, y: f64) -> ElementTree {
    ElementTree::new(
        Element::new("button")
            .with_attr("id", id)
            .with_rect(10.0, y, 80.0, 20.0)
            .with_text(id),
    )
}

pub fn text_input(id: &str, y: f64, value: &str) -> ElementTree {
    ElementTree::new(
        Element::new("input")
            .with_attr("id", id)
            .with_attr("type", "text")
            .with_rect(10.0, y, 200.0, 20.0)
            .with_value(value),
    )
}

/// A plain text container: not clickable, but a candidate.
pub fn paragraph(id: &str, y: f64, text: &str) -> ElementTree {
    ElementTree::new(
        Element::new("p")
            .with_attr("id", id)
            .with_rect(10.0, y, 400.0, 20.0)
            .with_text(text),
    )
}

pub fn page(url: &str, elements: Vec<ElementTree>) -> Document {
    let mut doc = Document::new(url, "Test page");
    let body = doc.body();
    for tree in &elements {
        doc.append_tree(body, tree).expect("fixture append");
    }
    doc
}

pub fn settings(letters: &str) -> Settings {
    Settings {
        hint_letters: letters.to_string(),
        ..Settings::default()
    }
}

// =========================================================================
// Synchronous stand-in for the coordinating process
// =========================================================================

/// A context wired to a test-owned channel plus the tab stack that answers
/// its claims.
pub struct Harness {
    pub ctx: DocumentContext,
    pub rx: mpsc::UnboundedReceiver<FrameEnvelope>,
    pub pool: HintPool,
    /// Messages the stand-in does not answer (notifications, tab opens, ...)
    pub other: Vec<FrameMessage>,
}

impl Harness {
    pub fn new(doc: Document, settings: &Settings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let ctx = DocumentContext::new(1, 0, doc, settings, tx);
        let pool = HintPool::new(&HintAlphabet::from_settings(settings));
        Harness {
            ctx,
            rx,
            pool,
            other: Vec::new(),
        }
    }

    pub fn started(doc: Document, settings: &Settings) -> Self {
        let mut harness = Harness::new(doc, settings);
        harness.ctx.start();
        harness.pump();
        harness
    }

    /// Answer queued messages until the context has nothing more to say.
    /// Sibling reclaims come back empty: this context is alone in its tab.
    pub fn pump(&mut self) {
        while let Ok(envelope) = self.rx.try_recv() {
            let frame = envelope.frame;
            match envelope.message {
                FrameMessage::InitStack => {
                    self.pool.release_frame(frame);
                }
                FrameMessage::ClaimHints { correlation, amount } => {
                    let labels = self.pool.claim(frame, amount);
                    self.ctx.handle_claim_reply(correlation, labels);
                }
                FrameMessage::ReclaimFromOthers { correlation, .. } => {
                    self.ctx.handle_claim_reply(correlation, Vec::new());
                }
                FrameMessage::ReleaseHints { labels } => {
                    self.pool.release(frame, &labels);
                }
                FrameMessage::GetPoolSnapshot { correlation } => {
                    self.ctx.handle_pool_snapshot(correlation, self.pool.snapshot());
                }
                other => self.other.push(other),
            }
        }
    }

    pub fn mutate<F>(&mut self, change: F)
    where
        F: FnOnce(&mut Document),
    {
        self.ctx.mutate(change);
        self.pump();
    }

    pub fn label(&self, id: &str) -> Option<String> {
        self.ctx.label_of_id(id).map(|l| l.to_string())
    }

    pub fn labels(&self) -> Vec<String> {
        self.ctx.registry().labels().iter().map(|l| l.to_string()).collect()
    }
}
