use std::fmt;

use thiserror::Error;

/// 定义 WebVTT 处理过程中可能发生的各种错误。
///
/// 注意：格式错误的 *输入文本* 不会产生 `VttError`。
/// 解析器对此类问题一律生成 [`crate::Diagnostic`]，并尽力返回可用的结果。
/// 这个枚举只用于真正异常的内部情况，例如生成器的字符串写入失败。
#[derive(Error, Debug)]
pub enum VttError {
    /// 字符串格式化错误。
    #[error("格式化错误: {0}")]
    Format(#[from] fmt::Error),
    /// 内部逻辑错误或未明确分类的错误。
    #[error("错误: {0}")]
    Internal(String),
}

impl From<VttError> for std::io::Error {
    fn from(err: VttError) -> Self {
        std::io::Error::other(err)
    }
}
