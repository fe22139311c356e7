//! Detect模块 - 实现基于YOLO的目标检测功能
//!
//! 该模块提供了一整套目标检测功能，包括：
//! - 图像预处理
//! - 模型推理
//! - 输出解码、坐标转换
//! - 非极大值抑制
//! - 可视化绘制
//!
//! # 主要组件
//!
//! - Detector：核心检测器结构，封装了检测流程
//! - InferenceEngine：推理引擎接口，OrtEngine 为 ONNX Runtime 实现
//! - draw_detections：在图像上绘制检测结果
//!
//! # 工作流程
//!
//! 1. 使用Detector::load加载ONNX模型，创建检测器
//! 2. 使用load_image或decode_image得到待检测图像
//! 3. 调用detect方法执行检测
//! 4. 使用draw_detections绘制检测结果
//!
//! # 示例
//!
//! ```no_run
//! use lookout::{DetectConfig, Detector, LabelTable, draw_detections, load_image};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = DetectConfig::default()
//!     .with_confidence_threshold(0.5)
//!     .with_iou_threshold(0.5);
//! let detector = Detector::load("path/to/model.onnx", config, LabelTable::coco())?;
//! let image = load_image("path/to/image.jpg")?;
//!
//! let detections = detector.detect(&image)?;
//! let result_image = draw_detections(&image, &detections, "person");
//! # Ok(())
//! # }
//! ```

pub mod bounds;
pub mod detector;
pub mod draw;
pub mod infer;
pub mod model;
pub mod nms;
pub mod posts;
pub mod prevs;

// 重新导出常用类型和函数
pub use bounds::{BoundingBox, convert};
pub use detector::{Detection, Detector};
pub use draw::draw_detections;
pub use infer::{EngineSignature, InferenceEngine, OrtEngine, TensorLayout};
pub use model::load_model;
pub use nms::suppress;
pub use posts::{Candidate, decode};
pub use prevs::{decode_image, load_image, preprocess, resize_image};
