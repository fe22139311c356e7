use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::DetectError;

// 目标检测超参数配置
pub const DEFAULT_INPUT_WIDTH: u32 = 320;
pub const DEFAULT_INPUT_HEIGHT: u32 = 320;
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f32 = 0.5;

/// 模型原始输出中每行的固定列：cx, cy, w, h, objectness
pub const BOX_COLUMNS: usize = 5;

/// 网络输入分辨率
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputResolution {
    pub width: u32,
    pub height: u32,
}

impl Default for InputResolution {
    fn default() -> Self {
        Self {
            width: DEFAULT_INPUT_WIDTH,
            height: DEFAULT_INPUT_HEIGHT,
        }
    }
}

/// 置信度的取值规则
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreRule {
    /// 只使用第 5 列的 objectness 分数
    #[default]
    Objectness,
    /// 使用类别分数中的最大值
    ClassMax,
    /// objectness 与最大类别分数的乘积
    Product,
}

/// 框宽度的缩放方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxScaling {
    /// 宽和高都按原图高度缩放，并截断到整像素。
    /// 已部署的模型是按这种方式标定的，宽高比不为 1 的图像上 x 方向会有偏差。
    #[default]
    Legacy,
    /// 宽按原图宽度、高按原图高度缩放，不截断
    Proportional,
}

/// 输入张量的通道顺序
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    /// 与 OpenCV 解码结果一致的通道顺序
    Bgr,
}

/// 检测器配置
///
/// 所有字段都有默认值，JSON 文件中可以只写需要覆盖的字段。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    /// 置信度阈值，不高于此值的候选框被丢弃
    pub confidence_threshold: f32,
    /// NMS 阈值，与已选框的 IoU 超过此值的框被抑制
    pub iou_threshold: f32,
    pub input_resolution: InputResolution,
    pub score_rule: ScoreRule,
    pub box_scaling: BoxScaling,
    pub channel_order: ChannelOrder,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
            input_resolution: InputResolution::default(),
            score_rule: ScoreRule::default(),
            box_scaling: BoxScaling::default(),
            channel_order: ChannelOrder::default(),
        }
    }
}

impl DetectConfig {
    /// 从 JSON 文件读取配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 错误处理
    /// 文件无法读取、格式错误或取值越界时返回Err
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DetectError::Config(format!("无法读取配置文件 {:?}: {}", path, e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, DetectError> {
        let config: DetectConfig = serde_json::from_str(text)
            .map_err(|e| DetectError::Config(format!("配置格式错误: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn with_iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold;
        self
    }

    pub fn with_input_resolution(mut self, width: u32, height: u32) -> Self {
        self.input_resolution = InputResolution { width, height };
        self
    }

    pub fn with_score_rule(mut self, rule: ScoreRule) -> Self {
        self.score_rule = rule;
        self
    }

    pub fn with_box_scaling(mut self, scaling: BoxScaling) -> Self {
        self.box_scaling = scaling;
        self
    }

    pub fn with_channel_order(mut self, order: ChannelOrder) -> Self {
        self.channel_order = order;
        self
    }

    /// 检查阈值都在 [0, 1] 内、分辨率非零
    pub fn validate(&self) -> Result<(), DetectError> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.confidence_threshold) {
            return Err(DetectError::Config(format!(
                "置信度阈值必须在 [0, 1] 内, 实际为 {}",
                self.confidence_threshold
            )));
        }
        if !in_unit(self.iou_threshold) {
            return Err(DetectError::Config(format!(
                "IoU 阈值必须在 [0, 1] 内, 实际为 {}",
                self.iou_threshold
            )));
        }
        let InputResolution { width, height } = self.input_resolution;
        if width == 0 || height == 0 {
            return Err(DetectError::Config(format!(
                "输入分辨率无效: {}x{}",
                width, height
            )));
        }
        Ok(())
    }
}
