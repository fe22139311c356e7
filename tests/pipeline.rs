use image::{DynamicImage, Rgb, RgbImage};
use lookout::config::{BoxScaling, ScoreRule};
use lookout::detect::{BoundingBox, EngineSignature};
use lookout::{DetectConfig, DetectError, Detector, InferenceEngine, LabelTable};
use ndarray::{Array2, Array4, array};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

enum Behavior {
    Output(Array2<f32>),
    Fail,
    Panic,
}

/// 返回固定输出的推理引擎，记录调用次数并检查是否被并发调用
struct FakeEngine {
    signature: EngineSignature,
    behavior: Behavior,
    calls: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
    delay: Duration,
}

impl FakeEngine {
    fn new(columns: usize, behavior: Behavior) -> Self {
        Self {
            signature: EngineSignature {
                input_width: 320,
                input_height: 320,
                columns,
            },
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
            busy: Arc::new(AtomicBool::new(false)),
            delay: Duration::ZERO,
        }
    }

    fn with_output(output: Array2<f32>) -> Self {
        Self::new(output.ncols(), Behavior::Output(output))
    }
}

impl InferenceEngine for FakeEngine {
    fn signature(&self) -> EngineSignature {
        self.signature
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array2<f32>, DetectError> {
        assert!(!self.busy.swap(true, Ordering::SeqCst), "engine entered concurrently");
        assert_eq!(input.shape(), &[1, 320, 320, 3]);
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        let result = match &self.behavior {
            Behavior::Output(output) => Ok(output.clone()),
            Behavior::Fail => Err(DetectError::Inference("device lost".to_string())),
            Behavior::Panic => panic!("engine crashed"),
        };
        self.busy.store(false, Ordering::SeqCst);
        result
    }
}

fn image(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([90, 120, 200])))
}

fn two_labels() -> LabelTable {
    LabelTable::new(["cat", "dog"])
}

fn assert_close(actual: [f32; 4], expected: [f32; 4]) {
    for (a, e) in actual.iter().zip(expected.iter()) {
        assert!((a - e).abs() < 1e-5, "{:?} != {:?}", actual, expected);
    }
}

#[test]
fn test_single_row_scenario() {
    let engine = FakeEngine::with_output(array![[0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.8]]);
    let detector = Detector::new(engine, DetectConfig::default(), two_labels()).unwrap();

    let detections = detector.detect(&image(320, 320)).unwrap();
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0].label, "dog");
    assert_eq!(detections[0].confidence, 0.9);
    assert_close(detections[0].bbox, [0.3, 0.3, 0.7, 0.7]);
}

#[test]
fn test_all_below_threshold_is_empty_success() {
    let engine = FakeEngine::with_output(array![
        [0.5, 0.5, 0.4, 0.4, 0.2, 0.1, 0.8],
        [0.2, 0.2, 0.1, 0.1, 0.5, 0.9, 0.1],
    ]);
    let detector = Detector::new(engine, DetectConfig::default(), two_labels()).unwrap();
    let detections = detector.detect(&image(640, 480)).unwrap();
    assert!(detections.is_empty());
}

#[test]
fn test_overlapping_boxes_keep_highest_first() {
    // 同一中心、宽度相近的两个框，IoU 远大于 0.5；第三个框与它们不重叠
    let engine = FakeEngine::with_output(array![
        [0.3, 0.3, 0.2, 0.2, 0.6, 1.0, 0.0],
        [0.3, 0.3, 0.22, 0.22, 0.9, 1.0, 0.0],
        [0.8, 0.8, 0.1, 0.1, 0.7, 0.0, 1.0],
    ]);
    let detector = Detector::new(engine, DetectConfig::default(), two_labels()).unwrap();
    let detections = detector.detect(&image(320, 320)).unwrap();

    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].confidence, 0.9);
    assert_eq!(detections[0].label, "cat");
    assert_eq!(detections[1].confidence, 0.7);
    assert_eq!(detections[1].label, "dog");
}

#[test]
fn test_final_boxes_are_clamped() {
    let engine = FakeEngine::with_output(array![[0.02, 0.98, 0.2, 0.2, 0.9, 0.0, 1.0]]);
    let config = DetectConfig::default().with_box_scaling(BoxScaling::Proportional);
    let detector = Detector::new(engine, config, two_labels()).unwrap();

    let detections = detector.detect(&image(200, 100)).unwrap();
    assert_eq!(detections.len(), 1);
    assert_close(detections[0].bbox, [0.0, 0.88, 0.12, 1.0]);
}

#[test]
fn test_properties_hold_across_thresholds() {
    let mut rows = Vec::new();
    for i in 0..60 {
        let cx = 0.1 + (i % 8) as f32 * 0.1;
        let cy = 0.1 + (i / 8) as f32 * 0.1;
        let confidence = ((i * 37) % 100) as f32 / 100.0;
        rows.extend_from_slice(&[cx, cy, 0.15, 0.15, confidence, 0.3, 0.6]);
    }
    let output = Array2::from_shape_vec((60, 7), rows).unwrap();

    for threshold in [0.0, 0.25, 0.5, 0.75, 0.95] {
        for iou_threshold in [0.1, 0.5, 0.9] {
            let engine = FakeEngine::with_output(output.clone());
            let config = DetectConfig::default()
                .with_confidence_threshold(threshold)
                .with_iou_threshold(iou_threshold)
                .with_box_scaling(BoxScaling::Proportional);
            let detector = Detector::new(engine, config, two_labels()).unwrap();
            let detections = detector.detect(&image(320, 320)).unwrap();

            for (a, det) in detections.iter().enumerate() {
                assert!(det.confidence >= threshold);
                assert!(det.bbox.iter().all(|v| (0.0..=1.0).contains(v)));
                let [x1, y1, x2, y2] = det.bbox;
                let first = BoundingBox::new(x1, y1, x2, y2);
                for other in &detections[a + 1..] {
                    let [x1, y1, x2, y2] = other.bbox;
                    assert!(first.iou(&BoundingBox::new(x1, y1, x2, y2)) <= iou_threshold + 1e-6);
                }
            }
        }
    }
}

#[test]
fn test_score_rule_changes_confidence() {
    let output = array![[0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.8]];
    let config = DetectConfig::default().with_score_rule(ScoreRule::Product);
    let detector =
        Detector::new(FakeEngine::with_output(output), config, two_labels()).unwrap();
    let detections = detector.detect(&image(320, 320)).unwrap();
    assert!((detections[0].confidence - 0.72).abs() < 1e-6);
}

#[test]
fn test_resolution_mismatch_fails_at_construction() {
    let engine = FakeEngine::new(7, Behavior::Fail);
    let config = DetectConfig::default().with_input_resolution(640, 640);
    let err = Detector::new(engine, config, two_labels()).err().unwrap();
    assert!(matches!(err, DetectError::ModelLoad(_)));
}

#[test]
fn test_label_mismatch_fails_at_construction() {
    let err = Detector::new(FakeEngine::new(85, Behavior::Fail), DetectConfig::default(), two_labels())
        .err()
        .unwrap();
    assert!(matches!(err, DetectError::ModelLoad(_)));

    assert!(Detector::new(FakeEngine::new(85, Behavior::Fail), DetectConfig::default(), LabelTable::coco()).is_ok());
    assert!(Detector::new(FakeEngine::new(5, Behavior::Fail), DetectConfig::default(), LabelTable::new(["person"])).is_ok());
    assert!(
        Detector::new(FakeEngine::new(5, Behavior::Fail), DetectConfig::default(), LabelTable::new(Vec::<String>::new()))
            .is_err()
    );
}

#[test]
fn test_invalid_config_fails_at_construction() {
    let config = DetectConfig::default().with_iou_threshold(2.0);
    let err = Detector::new(FakeEngine::new(7, Behavior::Fail), config, two_labels())
        .err()
        .unwrap();
    assert!(matches!(err, DetectError::Config(_)));
}

#[test]
fn test_engine_failure_is_inference_error() {
    let detector =
        Detector::new(FakeEngine::new(7, Behavior::Fail), DetectConfig::default(), two_labels()).unwrap();
    let err = detector.detect(&image(100, 100)).unwrap_err();
    assert!(matches!(err, DetectError::Inference(_)));
    assert!(!err.is_input_error());
}

#[test]
fn test_zero_area_image_never_reaches_engine() {
    let engine = FakeEngine::with_output(array![[0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.8]]);
    let calls = Arc::clone(&engine.calls);
    let detector = Detector::new(engine, DetectConfig::default(), two_labels()).unwrap();

    let err = detector.detect(&DynamicImage::new_rgb8(0, 0)).unwrap_err();
    assert!(err.is_input_error());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_output_width_drift_is_rejected() {
    let mut engine = FakeEngine::with_output(array![[0.5, 0.5, 0.4, 0.4, 0.9, 0.1]]);
    engine.signature.columns = 7;
    let detector = Detector::new(engine, DetectConfig::default(), two_labels()).unwrap();
    let err = detector.detect(&image(320, 320)).unwrap_err();
    assert!(matches!(err, DetectError::Inference(_)));
}

#[test]
fn test_shared_detector_serializes_engine() {
    let mut engine = FakeEngine::with_output(array![[0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.8]]);
    engine.delay = Duration::from_millis(5);
    let calls = Arc::clone(&engine.calls);
    let detector = Arc::new(Detector::new(engine, DetectConfig::default(), two_labels()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let detector = Arc::clone(&detector);
            thread::spawn(move || {
                for _ in 0..5 {
                    let detections = detector.detect(&image(64, 64)).unwrap();
                    assert_eq!(detections.len(), 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 20);
}

#[test]
fn test_poisoned_engine_reports_inference_error() {
    let detector = Arc::new(
        Detector::new(FakeEngine::new(7, Behavior::Panic), DetectConfig::default(), two_labels()).unwrap(),
    );

    let crashed = {
        let detector = Arc::clone(&detector);
        thread::spawn(move || detector.detect(&image(32, 32))).join()
    };
    assert!(crashed.is_err());

    let err = detector.detect(&image(32, 32)).unwrap_err();
    assert!(matches!(err, DetectError::Inference(_)));
}

#[test]
fn test_detections_serialize_like_http_results() {
    let engine = FakeEngine::with_output(array![[0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.8]]);
    let detector = Detector::new(engine, DetectConfig::default(), two_labels()).unwrap();
    let detections = detector.detect(&image(320, 320)).unwrap();

    let json = serde_json::to_value(&detections).unwrap();
    let first = &json[0];
    assert_eq!(first["label"], "dog");
    assert!(first["confidence"].is_number());
    assert_eq!(first["bbox"].as_array().map(Vec::len), Some(4));
}
