//! CLI 进度条实现
//!
//! indicatif spinners when stdout is a terminal, plain lines otherwise.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use maple_loader_lib::progress::{MessageLevel, ProgressCallback, ProgressId, ProgressInfo};
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn print_message(level: MessageLevel, text: &str) {
    let text = text.trim_end_matches('\n');
    match level {
        MessageLevel::Info => {
            let mut stdout = io::stdout();
            let _ = writeln!(stdout, "{}", text);
            let _ = stdout.flush();
        }
        MessageLevel::Warn => eprintln!("Warning: {}", text),
        MessageLevel::Error => eprintln!("{}", text),
    }
}

/// 基于标准输出的纯文本进度回调实现
pub struct PlainProgressCallback {
    prefixes: Mutex<HashMap<u64, String>>,
    next_id: Mutex<u64>,
}

impl PlainProgressCallback {
    pub fn new() -> Self {
        Self {
            prefixes: Mutex::new(HashMap::new()),
            next_id: Mutex::new(1),
        }
    }

    /// 获取下一个唯一的进度条 ID
    fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }
}

impl Default for PlainProgressCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for PlainProgressCallback {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = self.next_id();
        print_message(
            MessageLevel::Info,
            &format!("[{}] {}", info.prefix, info.message),
        );
        self.prefixes.lock().unwrap().insert(id, info.prefix);
        ProgressId(id)
    }

    fn update_message(&self, _id: ProgressId, _message: String) {}

    fn finish(&self, id: ProgressId, final_message: String) {
        let prefix = self.prefixes.lock().unwrap().remove(&id.0);
        if let Some(prefix) = prefix {
            print_message(MessageLevel::Info, &format!("[{}] {}", prefix, final_message));
        }
    }

    fn message(&self, level: MessageLevel, text: String) {
        print_message(level, &text);
    }
}

/// 基于 indicatif 的进度回调实现
pub struct IndicatifProgressCallback {
    multi_progress: MultiProgress,
    progress_bars: Arc<Mutex<HashMap<u64, ProgressBar>>>,
    next_id: Arc<Mutex<u64>>,
}

impl IndicatifProgressCallback {
    pub fn new() -> Self {
        Self {
            multi_progress: MultiProgress::new(),
            progress_bars: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
        }
    }

    fn next_id(&self) -> u64 {
        let mut id = self.next_id.lock().unwrap();
        let current = *id;
        *id += 1;
        current
    }
}

impl Default for IndicatifProgressCallback {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressCallback for IndicatifProgressCallback {
    fn start(&self, info: ProgressInfo) -> ProgressId {
        let id = self.next_id();

        let spinner = self.multi_progress.add(ProgressBar::new_spinner());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner.set_style(
            ProgressStyle::with_template(&format!("[{}] {{spinner}} {{msg}}", info.prefix))
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message(info.message);

        // 存储进度条引用
        self.progress_bars.lock().unwrap().insert(id, spinner);
        ProgressId(id)
    }

    fn update_message(&self, id: ProgressId, message: String) {
        if let Ok(bars) = self.progress_bars.lock()
            && let Some(bar) = bars.get(&id.0)
        {
            bar.set_message(message);
        }
    }

    fn finish(&self, id: ProgressId, final_message: String) {
        if let Ok(mut bars) = self.progress_bars.lock()
            && let Some(bar) = bars.remove(&id.0)
        {
            bar.finish_with_message(final_message);
        }
    }

    fn message(&self, level: MessageLevel, text: String) {
        // Print above the spinners instead of through them.
        self.multi_progress.suspend(|| print_message(level, &text));
    }
}

/// 创建进度回调的便利函数
pub fn create_progress_callback() -> Arc<dyn ProgressCallback> {
    if io::stdout().is_terminal() {
        Arc::new(IndicatifProgressCallback::new())
    } else {
        Arc::new(PlainProgressCallback::new())
    }
}
