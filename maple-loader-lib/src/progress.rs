//! 进度回调系统
//!
//! The library never writes to the terminal itself. Every stage spinner and
//! every line of tool output goes through a [`ProgressCallback`], so the CLI
//! (or any other front end) decides how it is rendered.

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

/// Severity of a free-standing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Warn,
    Error,
}

/// 进度条状态
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// 步骤前缀（通常是十六进制步骤号）
    pub prefix: String,
    /// 当前消息
    pub message: String,
}

/// 进度回调 trait
///
/// 实现此 trait 以自定义进度条的显示方式
pub trait ProgressCallback: Send + Sync {
    /// Start a new spinner and return its id.
    fn start(&self, info: ProgressInfo) -> ProgressId;

    /// Replace the message of a running spinner.
    fn update_message(&self, id: ProgressId, message: String);

    /// Stop a spinner, leaving `final_message` behind.
    fn finish(&self, id: ProgressId, final_message: String);

    /// Print a line that is not tied to any spinner.
    fn message(&self, level: MessageLevel, text: String);
}

/// 进度条 ID 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

/// 默认的空进度回调实现
#[derive(Debug, Default)]
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn start(&self, _info: ProgressInfo) -> ProgressId {
        ProgressId(0)
    }

    fn update_message(&self, _id: ProgressId, _message: String) {}

    fn finish(&self, _id: ProgressId, _final_message: String) {}

    fn message(&self, _level: MessageLevel, _text: String) {}
}

/// 进度回调的包装器，便于使用
pub type ProgressCallbackArc = Arc<dyn ProgressCallback>;

/// 创建默认的空进度回调
pub fn no_op_progress_callback() -> ProgressCallbackArc {
    Arc::new(NoOpProgressCallback)
}

/// 进度条助手结构体
///
/// Hands out step-numbered spinners and forwards plain messages.
#[derive(Clone)]
pub struct ProgressHelper {
    callback: ProgressCallbackArc,
    step_counter: Arc<AtomicI32>,
}

impl ProgressHelper {
    pub fn new(callback: ProgressCallbackArc, initial_step: i32) -> Self {
        Self {
            callback,
            step_counter: Arc::new(AtomicI32::new(initial_step)),
        }
    }

    fn next_step(&self) -> i32 {
        self.step_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// 创建一个旋转进度条
    pub fn create_spinner(&self, message: impl Into<String>) -> ProgressHandler {
        let step = self.next_step();
        let info = ProgressInfo {
            prefix: format!("0x{:02X}", step),
            message: message.into(),
        };
        let id = self.callback.start(info);
        ProgressHandler {
            callback: Arc::clone(&self.callback),
            id,
        }
    }

    pub fn info(&self, text: impl Into<String>) {
        self.callback.message(MessageLevel::Info, text.into());
    }

    pub fn warn(&self, text: impl Into<String>) {
        self.callback.message(MessageLevel::Warn, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.callback.message(MessageLevel::Error, text.into());
    }
}

/// 进度条处理器
pub struct ProgressHandler {
    callback: ProgressCallbackArc,
    id: ProgressId,
}

impl ProgressHandler {
    pub fn set_message(&self, message: impl Into<String>) {
        self.callback.update_message(self.id, message.into());
    }

    pub fn finish_with_message(self, message: impl Into<String>) {
        self.callback.finish(self.id, message.into());
    }
}
