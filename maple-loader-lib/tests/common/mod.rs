#![allow(dead_code)]

use maple_loader_lib::progress::{MessageLevel, ProgressCallback, ProgressId, ProgressInfo};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Keeps everything the library reports so tests can assert on it.
#[derive(Default)]
pub struct RecordingProgress {
    next_id: AtomicU64,
    pub started: Mutex<Vec<String>>,
    pub finished: Mutex<Vec<String>>,
    pub messages: Mutex<Vec<(MessageLevel, String)>>,
}

impl RecordingProgress {
    pub fn messages_at(&self, level: MessageLevel) -> Vec<String> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        self.started.lock().unwrap().push(info.message);
        ProgressId(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn update_message(&self, _id: ProgressId, _message: String) {}

    fn finish(&self, _id: ProgressId, final_message: String) {
        self.finished.lock().unwrap().push(final_message);
    }

    fn message(&self, level: MessageLevel, text: String) {
        self.messages.lock().unwrap().push((level, text));
    }
}
