use ort::session::{Session, builder::GraphOptimizationLevel};
use std::path::Path;
use tracing::{debug, info};

use crate::error::DetectError;

/// 加载ONNX模型
///
/// 加载ONNX格式的检测模型，并应用优化配置。模型只在启动时加载一次。
///
/// # 参数
/// * `model_path` - 模型文件路径
///
/// # 错误处理
/// 文件不存在或无法创建推理会话时返回 [`DetectError::ModelLoad`]
pub fn load_model(model_path: impl AsRef<Path>) -> Result<Session, DetectError> {
    let model_path = model_path.as_ref();
    if !model_path.exists() {
        return Err(DetectError::ModelLoad(format!(
            "模型文件不存在: {:?}",
            model_path
        )));
    }

    info!("加载模型文件: {:?}", model_path);
    let model = Session::builder()
        .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
        .and_then(|builder| builder.with_intra_threads(4))
        .and_then(|builder| builder.commit_from_file(model_path))
        .map_err(|e| DetectError::model_load("无法创建推理会话", e))?;
    debug!(
        "模型输入数量: {}, 输出数量: {}",
        model.inputs.len(),
        model.outputs.len()
    );
    Ok(model)
}
