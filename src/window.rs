//! Bounded buffer of recent messages for the subject under inspection.

use crate::types::Message;
use parking_lot::Mutex;
use std::collections::VecDeque;

struct WindowState {
    messages: VecDeque<Message>,
    /// Bumped by every `clear`.
    epoch: u64,
}

/// Fixed-capacity, arrival-ordered message buffer.
///
/// All operations take the same lock, so inserts never interleave and a
/// reader never observes a partially shifted buffer.
pub struct MessageWindow {
    state: Mutex<WindowState>,
    capacity: usize,
}

impl MessageWindow {
    /// Create a window holding at most `capacity` messages (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(WindowState {
                messages: VecDeque::with_capacity(capacity),
                epoch: 0,
            }),
            capacity,
        }
    }

    /// Append a message, evicting the single oldest one when full.
    pub fn append(&self, message: Message) {
        let mut state = self.state.lock();
        Self::push(&mut state.messages, self.capacity, message);
    }

    /// Append only if the window has not been cleared since `epoch`.
    pub fn append_in_epoch(&self, epoch: u64, message: Message) -> bool {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return false;
        }
        Self::push(&mut state.messages, self.capacity, message);
        true
    }

    fn push(messages: &mut VecDeque<Message>, capacity: usize, message: Message) {
        if messages.len() >= capacity {
            messages.pop_front();
        }
        messages.push_back(message);
    }

    /// Copy of the buffered messages, oldest first.
    pub fn snapshot_all(&self) -> Vec<Message> {
        self.state.lock().messages.iter().cloned().collect()
    }

    /// Drop every message. Returns the new epoch.
    pub fn clear(&self) -> u64 {
        let mut state = self.state.lock();
        state.messages.clear();
        state.epoch += 1;
        state.epoch
    }

    /// Current epoch, for use with [`MessageWindow::append_in_epoch`].
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    pub fn count(&self) -> usize {
        self.state.lock().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().messages.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
