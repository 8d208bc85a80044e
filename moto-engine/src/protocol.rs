//! JSON-lines protocol between the miner and whatever feeds it work.
//!
//! One message per line on stdin/stdout. Binary fields travel as
//! lowercase hex so lines stay greppable; unknown or malformed lines are
//! skipped by the reader rather than treated as fatal.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::constants::WORK_SIZE;
use crate::pow::{ProofOfWork, Work};

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Message {
    Work {
        block: String,
        target_frames: i32,
        #[serde(default)]
        msg: String,
        #[serde(default = "default_true")]
        is_new: bool,
    },
    Solution {
        block: String,
        msg: String,
        nonce: u32,
        num_frames: i32,
        updates: String,
    },
}

const fn default_true() -> bool {
    true
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 * bytes.len());
    for b in bytes {
        out.push(char::from_digit(u32::from(b >> 4), 16).unwrap_or('0'));
        out.push(char::from_digit(u32::from(b & 0xF), 16).unwrap_or('0'));
    }
    out
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    s.as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let hi = (pair[0] as char).to_digit(16)?;
            let lo = (pair[1] as char).to_digit(16)?;
            Some((hi * 16 + lo) as u8)
        })
        .collect()
}

/// Parse one input line as a work message. Returns `None` for anything
/// else, malformed lines included.
#[must_use]
pub fn parse_work(line: &str) -> Option<Work> {
    let msg = match serde_json::from_str::<Message>(line.trim()) {
        Ok(m) => m,
        Err(e) => {
            debug!("skipping line: {e}");
            return None;
        }
    };
    let Message::Work {
        block,
        target_frames,
        msg,
        is_new,
    } = msg
    else {
        return None;
    };
    let bytes = decode_hex(&block)?;
    let block: [u8; WORK_SIZE] = bytes.try_into().ok()?;
    if target_frames <= 0 {
        debug!("skipping work with non-positive frame target");
        return None;
    }
    Some(Work {
        block,
        target_frames,
        msg,
        is_new,
    })
}

/// Serialize a job back onto the wire, used to hand unfinished work back
/// when a newer job preempts it.
#[must_use]
pub fn work_line(work: &Work) -> String {
    let msg = Message::Work {
        block: encode_hex(&work.block),
        target_frames: work.target_frames,
        msg: work.msg.clone(),
        is_new: work.is_new,
    };
    serde_json::to_string(&msg).unwrap_or_default()
}

/// Serialize a checked solution for the job it solves. Update codes
/// travel as little-endian hex pairs.
#[must_use]
pub fn solution_line(work: &Work, pow: &ProofOfWork) -> String {
    let mut update_bytes = Vec::with_capacity(2 * pow.updates.len());
    for code in &pow.updates {
        update_bytes.extend_from_slice(&code.to_le_bytes());
    }
    let msg = Message::Solution {
        block: encode_hex(&work.block),
        msg: work.msg.clone(),
        nonce: pow.nonce,
        num_frames: pow.num_frames,
        updates: encode_hex(&update_bytes),
    };
    serde_json::to_string(&msg).unwrap_or_default()
}

/// Parse a solution line back into a proof, for tooling that re-checks
/// solutions offline.
#[must_use]
pub fn parse_solution(line: &str) -> Option<(String, ProofOfWork)> {
    let Message::Solution {
        block,
        nonce,
        num_frames,
        updates,
        ..
    } = serde_json::from_str::<Message>(line.trim()).ok()?
    else {
        return None;
    };
    let bytes = decode_hex(&updates)?;
    let updates = bytes
        .chunks_exact(2)
        .map(|p| u16::from_le_bytes([p[0], p[1]]))
        .collect();
    Some((
        block,
        ProofOfWork {
            nonce,
            num_frames,
            updates,
        },
    ))
}
