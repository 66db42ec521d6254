//! Deterministic stand-ins for the model and embedding backends.
//!
//! Enabled in this crate's own tests and, through the `testing` feature, in
//! downstream integration tests.

use crate::vector::Embedder;
use crate::{ChatCompletion, ChatFuture, ChatModel, ChatRequest, LlmError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

// ── ScriptedModel ──────────────────────────────────────────────────

/// A [`ChatModel`] that replays queued responses in order.
///
/// Once the queue is empty every call returns the fallback completion
/// (`"ok"` unless changed). All requests are recorded for assertions.
pub struct ScriptedModel {
    queue: Mutex<VecDeque<Result<ChatCompletion, LlmError>>>,
    fallback: ChatCompletion,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: ChatCompletion::text("ok"),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Completion returned once the queue runs dry.
    pub fn with_fallback(mut self, completion: ChatCompletion) -> Self {
        self.fallback = completion;
        self
    }

    /// Queue a successful completion.
    pub fn then(self, completion: ChatCompletion) -> Self {
        self.push(Ok(completion));
        self
    }

    /// Queue a failure.
    pub fn then_fail(self, error: LlmError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, response: Result<ChatCompletion, LlmError>) {
        self.queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response);
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatModel for ScriptedModel {
    fn chat<'a>(&'a self, body: &'a ChatRequest) -> ChatFuture<'a> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(body.clone());
        let next = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Ok(self.fallback.clone()));
        Box::pin(async move { next })
    }
}

// ── HashEmbedder ───────────────────────────────────────────────────

/// Bag-of-words [`Embedder`]: each lowercase alphanumeric word is hashed
/// (FNV-1a) into one of `dimensions` buckets and the vector is normalised.
///
/// Texts sharing words score higher under cosine similarity, which is enough
/// for retrieval tests without a network.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();
        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let bucket = (fnv1a(word) % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

fn fnv1a(word: &str) -> u64 {
    word.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
    })
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts.iter().map(|t| self.embed(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
