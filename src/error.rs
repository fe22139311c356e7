//! 错误类型
//!
//! 检测流程中所有可能出现的错误都归入 [`DetectError`]。

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    /// 输入图像为空或面积为零
    #[error("输入图像无效: {0}")]
    Input(String),
    /// 输入数据无法解码为图像
    #[error("图像解码失败: {0}")]
    Decode(#[from] image::ImageError),
    /// 模型文件缺失、无法加载或形状不匹配，只会在启动时出现
    #[error("模型加载失败: {0}")]
    ModelLoad(String),
    /// 推理引擎调用失败
    #[error("模型推理失败: {0}")]
    Inference(String),
    #[error("配置错误: {0}")]
    Config(String),
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),
}

impl DetectError {
    pub fn model_load(msg: &str, e: impl std::fmt::Display) -> Self {
        DetectError::ModelLoad(format!("{}: {}", msg, e))
    }

    pub fn inference(msg: &str, e: impl std::fmt::Display) -> Self {
        DetectError::Inference(format!("{}: {}", msg, e))
    }

    /// 是否属于调用方提供了错误输入的情况
    pub fn is_input_error(&self) -> bool {
        matches!(self, DetectError::Input(_) | DetectError::Decode(_))
    }
}
