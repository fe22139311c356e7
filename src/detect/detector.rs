use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info};

use crate::config::DetectConfig;
use crate::detect::bounds::convert;
use crate::detect::infer::{EngineSignature, InferenceEngine, OrtEngine};
use crate::detect::nms::suppress;
use crate::detect::posts::decode;
use crate::detect::prevs::{check_image, preprocess};
use crate::error::DetectError;
use crate::labels::LabelTable;

/// 检测结果结构
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    /// 类别名称
    pub label: String,
    /// 置信度
    pub confidence: f32,
    /// [x1, y1, x2, y2]，相对原图归一化并限制在 [0, 1] 内
    pub bbox: [f32; 4],
}

/// 目标检测器
///
/// 持有推理引擎、配置和标签表，封装了完整的检测流程：
/// 预处理 → 推理 → 解码 → 坐标转换 → NMS → 生成结果。
///
/// 推理引擎放在互斥锁里，同一时刻只有一个请求在调用它，
/// 其余各阶段可以并发执行。需要更高吞吐时为每个工作线程创建一个检测器。
///
/// # 示例
///
/// ```no_run
/// use lookout::{DetectConfig, Detector, LabelTable, load_image};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let detector = Detector::load("models/yolov5.onnx", DetectConfig::default(), LabelTable::coco())?;
/// let image = load_image("path/to/image.jpg")?;
/// let detections = detector.detect(&image)?;
/// # Ok(())
/// # }
/// ```
pub struct Detector<E> {
    engine: Mutex<E>,
    signature: EngineSignature,
    config: DetectConfig,
    labels: LabelTable,
}

impl Detector<OrtEngine> {
    /// 加载 ONNX 模型并创建检测器
    pub fn load(
        model_path: impl AsRef<Path>,
        config: DetectConfig,
        labels: LabelTable,
    ) -> Result<Self, DetectError> {
        let engine = OrtEngine::load(model_path)?;
        Self::new(engine, config, labels)
    }
}

impl<E: InferenceEngine> Detector<E> {
    /// 创建检测器，并检查模型形状与配置、标签表是否一致
    ///
    /// # 错误处理
    /// * 配置取值无效时返回 [`DetectError::Config`]
    /// * 模型输入分辨率与配置不一致，或类别数与标签表长度不一致时返回 [`DetectError::ModelLoad`]
    pub fn new(engine: E, config: DetectConfig, labels: LabelTable) -> Result<Self, DetectError> {
        config.validate()?;
        let signature = engine.signature();

        let resolution = config.input_resolution;
        if signature.input_width != resolution.width || signature.input_height != resolution.height {
            return Err(DetectError::ModelLoad(format!(
                "模型输入分辨率为 {}x{}, 配置为 {}x{}",
                signature.input_width, signature.input_height, resolution.width, resolution.height
            )));
        }

        let num_classes = signature.num_classes();
        let labels_match = if num_classes == 0 {
            !labels.is_empty()
        } else {
            labels.len() == num_classes
        };
        if !labels_match {
            return Err(DetectError::ModelLoad(format!(
                "模型输出 {} 个类别, 标签表有 {} 个",
                num_classes.max(1),
                labels.len()
            )));
        }

        debug!("检测器配置: {:?}", config);
        Ok(Self {
            engine: Mutex::new(engine),
            signature,
            config,
            labels,
        })
    }

    pub fn config(&self) -> &DetectConfig {
        &self.config
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn signature(&self) -> EngineSignature {
        self.signature
    }

    /// 完整的检测流程：从图像到检测结果
    ///
    /// 没有检测到目标时返回空列表；任何一步失败都会返回Err，不会返回部分结果。
    pub fn detect(&self, img: &DynamicImage) -> Result<Vec<Detection>, DetectError> {
        check_image(img)?;
        let (img_width, img_height) = img.dimensions();
        let config = &self.config;

        let start = Instant::now();
        let tensor = preprocess(img, config.input_resolution, config.channel_order);
        debug!("预处理耗时: {:?}", start.elapsed());

        let start = Instant::now();
        let output = {
            let mut engine = self
                .engine
                .lock()
                .map_err(|_| DetectError::Inference("推理引擎锁已失效".to_string()))?;
            engine.infer(&tensor)?
        };
        debug!("模型推理耗时: {:?}", start.elapsed());

        if output.ncols() != self.signature.columns {
            return Err(DetectError::Inference(format!(
                "模型输出每行 {} 列, 加载时为 {} 列",
                output.ncols(),
                self.signature.columns
            )));
        }

        let start = Instant::now();
        let candidates = decode(output.view(), config.confidence_threshold, config.score_rule);
        let boxes = convert(
            &candidates,
            img_width as f32,
            img_height as f32,
            config.box_scaling,
        );
        let confidences: Vec<f32> = candidates.iter().map(|c| c.confidence).collect();
        let keep = suppress(
            &boxes,
            &confidences,
            config.confidence_threshold,
            config.iou_threshold,
        );
        debug!(
            "后处理耗时: {:?}, 候选 {} 个, 保留 {} 个",
            start.elapsed(),
            candidates.len(),
            keep.len()
        );

        let detections = keep
            .into_iter()
            .map(|i| {
                let candidate = &candidates[i];
                let label = self.labels.get(candidate.class_id).ok_or_else(|| {
                    DetectError::Inference(format!("类别 {} 超出标签表范围", candidate.class_id))
                })?;
                Ok(Detection {
                    label: label.to_string(),
                    confidence: candidate.confidence,
                    bbox: boxes[i].clamped().to_array(),
                })
            })
            .collect::<Result<Vec<_>, DetectError>>()?;

        info!("{}x{} 图像检测到 {} 个目标", img_width, img_height, detections.len());
        Ok(detections)
    }
}
