pub mod config;
pub mod detect;
pub mod error;
pub mod labels;

// 重新导出常用类型和函数
pub use config::DetectConfig;
pub use detect::{Detection, Detector, InferenceEngine, OrtEngine, draw_detections};
pub use detect::{decode_image, load_image};
pub use error::DetectError;
pub use labels::LabelTable;
