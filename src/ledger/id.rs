use crate::error::{LedgerError, LedgerResult};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::Mutex;

/// Size of the visible `test_NNN` id space
pub const ID_SPACE: u32 = 1000;

/// Draws before falling back to a linear scan of the id space
const DRAW_ATTEMPTS: usize = 32;

pub fn format_session_id(n: u32) -> String {
    format!("test_{:03}", n % ID_SPACE)
}

/// Source of candidate session numbers
pub trait IdSource: Send + Sync {
    fn draw(&self) -> u32;
}

/// Uniform draws from the thread-local RNG
#[derive(Debug, Default)]
pub struct RandomIds;

impl IdSource for RandomIds {
    fn draw(&self) -> u32 {
        rand::thread_rng().gen_range(0..ID_SPACE)
    }
}

/// Replays a fixed list of candidates, then counts upward from the last one.
///
/// Useful wherever a predictable id is needed (tests, demos).
#[derive(Debug)]
pub struct SequenceIds {
    queue: Mutex<VecDeque<u32>>,
    last: Mutex<u32>,
}

impl SequenceIds {
    pub fn new(candidates: impl IntoIterator<Item = u32>) -> Self {
        Self {
            queue: Mutex::new(candidates.into_iter().collect()),
            last: Mutex::new(0),
        }
    }
}

impl IdSource for SequenceIds {
    fn draw(&self) -> u32 {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let next = self
            .queue
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or((*last + 1) % ID_SPACE);
        *last = next;
        next
    }
}

/// Allocate a `test_NNN` id that `is_taken` reports as free.
///
/// Draws keep ids visually scattered; once those keep colliding the whole
/// space is scanned, so an id is only refused when all of them are live.
pub fn allocate_session_id<F>(source: &dyn IdSource, is_taken: F) -> LedgerResult<String>
where
    F: Fn(&str) -> bool,
{
    let mut start = 0;
    for _ in 0..DRAW_ATTEMPTS {
        start = source.draw() % ID_SPACE;
        let candidate = format_session_id(start);
        if !is_taken(&candidate) {
            return Ok(candidate);
        }
    }

    (0..ID_SPACE)
        .map(|offset| format_session_id((start + offset) % ID_SPACE))
        .find(|candidate| !is_taken(candidate))
        .ok_or(LedgerError::IdSpaceExhausted)
}
