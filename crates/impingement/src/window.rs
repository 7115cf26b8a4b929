//! Trailing time-window sums kept in step with a shared firing-duration timeline.
//!
//! The timeline decides how many of the oldest firings fall out of the window;
//! that single eviction count is then replayed on every face. Every face
//! receives one entry per firing (zero when not struck), so all face queues
//! share the timeline's length and can live in one ring-buffer arena with a
//! common head and length.

use std::collections::VecDeque;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const INITIAL_CAPACITY: usize = 8;

/// Monitored quantity of a window tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowQuantity {
    Pressure,
    HeatFluxLoad,
}

#[derive(Debug, Error)]
pub enum WindowError {
    #[error("window size must be a positive number of seconds, got {0}")]
    InvalidWindowSize(f64),
    #[error("firing duration must be finite and non-negative, got {0}")]
    InvalidDuration(f64),
    #[error("expected {expected} per-face contributions, got {found}")]
    ContributionLength { expected: usize, found: usize },
    #[error("inconsistent window state: {0}")]
    InconsistentState(String),
}

/// FIFO of firing durations whose total never exceeds the window size.
#[derive(Debug, Clone)]
pub struct TimelineWindow {
    window_size_s: f64,
    durations: VecDeque<f64>,
    running_duration_s: f64,
}

impl TimelineWindow {
    pub fn new(window_size_s: f64) -> Result<Self, WindowError> {
        if !(window_size_s.is_finite() && window_size_s > 0.0) {
            return Err(WindowError::InvalidWindowSize(window_size_s));
        }
        Ok(Self {
            window_size_s,
            durations: VecDeque::new(),
            running_duration_s: 0.0,
        })
    }

    /// Append a firing duration, then drop the oldest entries until the total fits.
    /// Returns how many entries were dropped.
    pub fn push(&mut self, duration_s: f64) -> Result<usize, WindowError> {
        if !(duration_s.is_finite() && duration_s >= 0.0) {
            return Err(WindowError::InvalidDuration(duration_s));
        }
        self.durations.push_back(duration_s);
        self.running_duration_s += duration_s;

        let mut evicted = 0;
        while self.running_duration_s > self.window_size_s {
            let Some(oldest) = self.durations.pop_front() else {
                break;
            };
            self.running_duration_s -= oldest;
            evicted += 1;
        }
        if self.durations.is_empty() {
            self.running_duration_s = 0.0;
        }
        Ok(evicted)
    }

    pub fn window_size_s(&self) -> f64 {
        self.window_size_s
    }

    pub fn running_duration_s(&self) -> f64 {
        self.running_duration_s
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Resident durations, oldest first.
    pub fn durations(&self) -> impl Iterator<Item = f64> + '_ {
        self.durations.iter().copied()
    }
}

/// Per-face FIFOs stored as one face-major ring buffer with a shared head and length.
#[derive(Debug, Clone)]
pub struct WindowArena {
    faces: usize,
    capacity: usize,
    head: usize,
    len: usize,
    /// `values[face * capacity + slot]`
    values: Vec<f64>,
    sums: Vec<f64>,
}

impl WindowArena {
    pub fn new(faces: usize, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            faces,
            capacity,
            head: 0,
            len: 0,
            values: vec![0.0; faces * capacity],
            sums: vec![0.0; faces],
        }
    }

    pub fn faces(&self) -> usize {
        self.faces
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Running sum per face.
    pub fn running_sums(&self) -> &[f64] {
        &self.sums
    }

    /// Append one firing's contribution for every face.
    pub fn push_row(&mut self, row: &[f64]) -> Result<(), WindowError> {
        if row.len() != self.faces {
            return Err(WindowError::ContributionLength {
                expected: self.faces,
                found: row.len(),
            });
        }
        if self.len == self.capacity {
            self.grow();
        }

        let slot = (self.head + self.len) % self.capacity;
        self.values
            .par_chunks_mut(self.capacity)
            .zip(self.sums.par_iter_mut())
            .zip(row.par_iter())
            .for_each(|((queue, sum), value)| {
                queue[slot] = *value;
                *sum += *value;
            });
        self.len += 1;
        Ok(())
    }

    /// Pop the `count` oldest entries from every face queue.
    pub fn evict_oldest(&mut self, count: usize) {
        let count = count.min(self.len);
        if count == 0 {
            return;
        }

        let (head, capacity) = (self.head, self.capacity);
        let emptied = count == self.len;
        self.values
            .par_chunks_mut(capacity)
            .zip(self.sums.par_iter_mut())
            .for_each(|(queue, sum)| {
                for k in 0..count {
                    let slot = (head + k) % capacity;
                    *sum -= queue[slot];
                    queue[slot] = 0.0;
                }
                if emptied {
                    *sum = 0.0;
                }
            });
        self.head = (head + count) % capacity;
        self.len -= count;
    }

    /// Resident values of one face, oldest first.
    pub fn face_values(&self, face: usize) -> impl Iterator<Item = f64> + '_ {
        let queue = &self.values[face * self.capacity..(face + 1) * self.capacity];
        (0..self.len).map(move |k| queue[(self.head + k) % self.capacity])
    }

    /// Resident values grouped by firing, oldest first.
    pub fn rows(&self) -> Vec<Vec<f64>> {
        (0..self.len)
            .map(|k| {
                let slot = (self.head + k) % self.capacity;
                (0..self.faces)
                    .map(|face| self.values[face * self.capacity + slot])
                    .collect()
            })
            .collect()
    }

    fn grow(&mut self) {
        let capacity = self.capacity * 2;
        let mut values = vec![0.0; self.faces * capacity];
        for (face, queue) in values.chunks_mut(capacity).enumerate() {
            for (k, value) in self.face_values(face).enumerate() {
                queue[k] = value;
            }
        }
        self.values = values;
        self.capacity = capacity;
        self.head = 0;
    }
}

/// Serialized tracker contents, oldest firing first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowState {
    pub quantity: WindowQuantity,
    pub window_size_s: f64,
    pub durations: Vec<f64>,
    pub running_duration_s: f64,
    pub rows: Vec<Vec<f64>>,
    pub sums: Vec<f64>,
}

/// Trailing window of one monitored quantity across every face.
#[derive(Debug, Clone)]
pub struct ConstraintWindowTracker {
    quantity: WindowQuantity,
    timeline: TimelineWindow,
    arena: WindowArena,
}

impl ConstraintWindowTracker {
    pub fn new(
        quantity: WindowQuantity,
        window_size_s: f64,
        faces: usize,
    ) -> Result<Self, WindowError> {
        Ok(Self {
            quantity,
            timeline: TimelineWindow::new(window_size_s)?,
            arena: WindowArena::new(faces, INITIAL_CAPACITY),
        })
    }

    pub fn quantity(&self) -> WindowQuantity {
        self.quantity
    }

    pub fn timeline(&self) -> &TimelineWindow {
        &self.timeline
    }

    pub fn arena(&self) -> &WindowArena {
        &self.arena
    }

    pub fn running_sums(&self) -> &[f64] {
        self.arena.running_sums()
    }

    /// Number of firings currently inside the window.
    pub fn queue_len(&self) -> usize {
        self.arena.len()
    }

    /// Advance by one firing. Returns the number of firings evicted from every face.
    pub fn update(&mut self, duration_s: f64, contributions: &[f64]) -> Result<usize, WindowError> {
        if contributions.len() != self.arena.faces() {
            return Err(WindowError::ContributionLength {
                expected: self.arena.faces(),
                found: contributions.len(),
            });
        }
        let evictions = self.timeline.push(duration_s)?;
        self.arena.push_row(contributions)?;
        self.arena.evict_oldest(evictions);
        debug_assert_eq!(self.arena.len(), self.timeline.len());
        Ok(evictions)
    }

    pub fn state(&self) -> WindowState {
        WindowState {
            quantity: self.quantity,
            window_size_s: self.timeline.window_size_s,
            durations: self.timeline.durations().collect(),
            running_duration_s: self.timeline.running_duration_s,
            rows: self.arena.rows(),
            sums: self.arena.sums.clone(),
        }
    }

    /// Rebuild a tracker from a checkpoint, keeping the stored running sums bit-for-bit.
    pub fn from_state(state: WindowState, faces: usize) -> Result<Self, WindowError> {
        if state.durations.len() != state.rows.len() {
            return Err(WindowError::InconsistentState(format!(
                "{} durations for {} rows",
                state.durations.len(),
                state.rows.len()
            )));
        }
        if state.sums.len() != faces {
            return Err(WindowError::InconsistentState(format!(
                "{} running sums for {} faces",
                state.sums.len(),
                faces
            )));
        }

        let mut timeline = TimelineWindow::new(state.window_size_s)?;
        timeline.durations = state.durations.into_iter().collect();
        timeline.running_duration_s = state.running_duration_s;

        let mut arena = WindowArena::new(faces, state.rows.len().max(INITIAL_CAPACITY));
        for row in &state.rows {
            arena.push_row(row)?;
        }
        arena.sums = state.sums;

        Ok(Self {
            quantity: state.quantity,
            timeline,
            arena,
        })
    }
}
