//! Interactive session — one user's product context plus running history.
//!
//! Used by the terminal chat. Turns are appended only when a response
//! finishes with `stop`, so a failed or abandoned exchange leaves the
//! history untouched. Only the most recent turns are retained, a small
//! multiple of the prompt's history limit.

use std::sync::Arc;

use forkreach_core::context::SessionContext;
use forkreach_core::message::Turn;
use tokio::sync::{Mutex, mpsc};

use crate::frame::{FinishReason, Frame};
use crate::streamer::{ResponseStreamer, StreamRequest};

/// Retained turns per turn the prompt actually uses.
const RETAINED_HISTORY_FACTOR: usize = 2;

pub struct Session {
    streamer: Arc<ResponseStreamer>,
    model: Option<String>,
    context: Option<SessionContext>,
    history: Arc<Mutex<Vec<Turn>>>,
}

impl Session {
    pub fn new(streamer: Arc<ResponseStreamer>) -> Self {
        Self {
            streamer,
            model: None,
            context: None,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Replace the product context for subsequent messages.
    pub fn attach_context(&mut self, context: SessionContext) {
        self.context = Some(context);
    }

    pub fn clear_context(&mut self) {
        self.context = None;
    }

    pub fn context(&self) -> Option<&SessionContext> {
        self.context.as_ref()
    }

    pub async fn history(&self) -> Vec<Turn> {
        self.history.lock().await.clone()
    }

    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }

    /// Stream a reply to `message`. The exchange joins the history once the
    /// response finishes successfully.
    pub async fn send(&self, message: &str, handler_id: Option<&str>) -> mpsc::Receiver<Frame> {
        let mut request = StreamRequest::new(message).with_history(self.history().await);
        request.handler_id = handler_id.map(str::to_string);
        request.model = self.model.clone();
        request.context = self.context.clone();

        let mut upstream = self.streamer.stream(request);
        let (tx, rx) = mpsc::channel(upstream.max_capacity());
        let history = Arc::clone(&self.history);
        let user_text = message.to_string();
        let retained = (self.streamer.settings().history_limit * RETAINED_HISTORY_FACTOR).max(2);

        tokio::spawn(async move {
            let mut reply = String::new();
            while let Some(frame) = upstream.recv().await {
                match &frame {
                    Frame::TextDelta { delta, .. } => reply.push_str(delta),
                    Frame::Finish {
                        finish_reason: FinishReason::Stop,
                        ..
                    } => {
                        let mut turns = history.lock().await;
                        turns.push(Turn::user(user_text.clone()));
                        turns.push(Turn::assistant(reply.clone()));
                        let excess = turns.len().saturating_sub(retained);
                        turns.drain(..excess);
                    }
                    _ => {}
                }
                if tx.send(frame).await.is_err() {
                    return;
                }
            }
        });

        rx
    }
}
