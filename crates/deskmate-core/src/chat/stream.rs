//! Simulated typing for the SSE endpoint.
//!
//! The reply is already complete when streaming starts; it is split into
//! whole-word chunks so the client can render it progressively.

use serde::Serialize;
use utoipa::ToSchema;

/// Chunk sizes, in words, applied round-robin.
const CHUNK_WORDS: [usize; 3] = [3, 4, 5];

/// One SSE `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Start {
        session_id: i64,
        user_message_id: i64,
    },
    Chunk {
        content: String,
    },
    Complete {
        message_id: i64,
        full_response: String,
    },
    Error {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_id: Option<i64>,
    },
}

fn ends_sentence(word: &str) -> bool {
    word.trim_end_matches(['"', '\'', ')', ']', '*'])
        .ends_with(['.', '!', '?', '…'])
}

/// Split `text` into word groups; concatenating the result yields `text`.
pub fn chunk_reply(text: &str) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    // Each token is one word plus its trailing whitespace; leading
    // whitespace sticks to the first token.
    let mut tokens: Vec<&str> = Vec::new();
    let mut start = 0;
    let mut seen_word = false;
    let mut in_space = false;
    for (idx, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if seen_word {
                in_space = true;
            }
        } else {
            if in_space {
                tokens.push(&text[start..idx]);
                start = idx;
                in_space = false;
            }
            seen_word = true;
        }
    }
    tokens.push(&text[start..]);

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut words = 0;
    let mut size_idx = 0;
    for token in tokens {
        current.push_str(token);
        words += 1;
        if words >= CHUNK_WORDS[size_idx % CHUNK_WORDS.len()] || ends_sentence(token.trim_end()) {
            chunks.push(std::mem::take(&mut current));
            words = 0;
            size_idx += 1;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
