use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use lookout::{DetectConfig, DetectError, Detection, Detector, LabelTable, OrtEngine};
use lookout::{draw_detections, load_image};

/// 图像目标检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// ONNX 模型文件路径
    #[arg(long, value_name = "FILE")]
    model: PathBuf,

    /// JSON 配置文件路径
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 标签文件路径，每行一个类别名称，默认使用 COCO 80 类
    #[arg(long, value_name = "FILE")]
    labels: Option<PathBuf>,

    /// 置信度阈值 (0.0 - 1.0)，覆盖配置文件
    #[arg(long, value_name = "THRESHOLD")]
    confidence: Option<f32>,

    /// NMS IOU 阈值 (0.0 - 1.0)，覆盖配置文件
    #[arg(long, value_name = "THRESHOLD")]
    iou: Option<f32>,

    /// 绘制检测框后的图像保存目录
    #[arg(long, value_name = "DIR")]
    annotate: Option<PathBuf>,

    /// 待检测的图像文件
    #[arg(required = true, value_name = "IMAGE")]
    images: Vec<PathBuf>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Report {
    Results { image: String, results: Vec<Detection> },
    Failure { image: String, error: String },
}

fn build_detector(args: &Args) -> Result<Detector<OrtEngine>, DetectError> {
    let mut config = match &args.config {
        Some(path) => DetectConfig::from_file(path)?,
        None => DetectConfig::default(),
    };
    if let Some(threshold) = args.confidence {
        config = config.with_confidence_threshold(threshold);
    }
    if let Some(threshold) = args.iou {
        config = config.with_iou_threshold(threshold);
    }

    let labels = match &args.labels {
        Some(path) => LabelTable::from_file(path)?,
        None => LabelTable::coco(),
    };

    Detector::load(&args.model, config, labels)
}

fn process(
    detector: &Detector<OrtEngine>,
    path: &Path,
    annotate: Option<&Path>,
) -> Result<Vec<Detection>, DetectError> {
    let image = load_image(path)?;
    let detections = detector.detect(&image)?;

    if let Some(dir) = annotate {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let output = dir.join(format!("{}_detections.png", stem));
        let highlight = detector.labels().get(0).unwrap_or_default();
        draw_detections(&image, &detections, highlight)
            .save(&output)
            .map_err(|e| DetectError::Io(std::io::Error::other(e)))?;
        info!("结果已保存到: {:?}", output);
    }

    Ok(detections)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    info!("模型文件路径: {:?}", args.model);

    let detector = match build_detector(&args) {
        Ok(detector) => Arc::new(detector),
        Err(e) => {
            error!("检测器初始化失败: {}", e);
            return Err(e.into());
        }
    };

    if let Some(dir) = &args.annotate {
        std::fs::create_dir_all(dir)?;
    }

    let handles: Vec<_> = args
        .images
        .iter()
        .cloned()
        .map(|path| {
            let detector = Arc::clone(&detector);
            let annotate = args.annotate.clone();
            tokio::task::spawn_blocking(move || {
                let result = process(&detector, &path, annotate.as_deref());
                (path, result)
            })
        })
        .collect();

    let mut failures = 0usize;
    for handle in handles {
        let (path, result) = handle.await?;
        let image = path.display().to_string();
        let report = match result {
            Ok(results) => Report::Results { image, results },
            Err(e) => {
                failures += 1;
                if e.is_input_error() {
                    warn!("跳过无效图像 {:?}: {}", path, e);
                } else {
                    error!("处理 {:?} 失败: {}", path, e);
                }
                Report::Failure {
                    image,
                    error: e.to_string(),
                }
            }
        };
        println!("{}", serde_json::to_string(&report)?);
    }

    if failures > 0 {
        return Err(format!("{} 张图像处理失败", failures).into());
    }
    Ok(())
}
