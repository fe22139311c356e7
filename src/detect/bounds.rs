//! 边界框与坐标转换
//!
//! 模型输出的是网络空间中的中心点格式 (cx, cy, w, h)，这里转换为
//! 相对原图归一化的角点格式 (x1, y1, x2, y2)。

use crate::config::BoxScaling;
use crate::detect::posts::Candidate;

/// 边界框结构
///
/// 表示一个矩形边界框，用于包围检测到的目标。
#[derive(Debug, Clone, Default, Copy, PartialEq)]
pub struct BoundingBox {
    /// 左上角x坐标
    pub x1: f32,
    /// 左上角y坐标
    pub y1: f32,
    /// 右下角x坐标
    pub x2: f32,
    /// 右下角y坐标
    pub y2: f32,
}

impl BoundingBox {
    /// 创建一个新的边界框
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// 计算边界框的宽度，反向的框宽度为 0
    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    /// 计算边界框的高度，反向的框高度为 0
    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// 检查边界框是否有效（宽度和高度都大于0）
    pub fn is_valid(&self) -> bool {
        self.width() > 0.0 && self.height() > 0.0
    }

    /// 计算两个边界框的交集面积
    pub fn intersection(&self, other: &BoundingBox) -> f32 {
        let width = self.x2.min(other.x2) - self.x1.max(other.x1);
        let height = self.y2.min(other.y2) - self.y1.max(other.y1);

        if width <= 0.0 || height <= 0.0 {
            0.0
        } else {
            width * height
        }
    }

    /// 交并比 (IoU)
    ///
    /// 并集面积为 0 时返回 0.0。
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter = self.intersection(other);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 { 0.0 } else { inter / union }
    }

    /// 把四个坐标限制在 [0, 1] 内
    pub fn clamped(&self) -> Self {
        Self {
            x1: self.x1.clamp(0.0, 1.0),
            y1: self.y1.clamp(0.0, 1.0),
            x2: self.x2.clamp(0.0, 1.0),
            y2: self.y2.clamp(0.0, 1.0),
        }
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

/// 将候选框从网络空间的中心点格式转换为相对原图归一化的角点格式
///
/// 结果与输入一一对应，不做裁剪，靠近边缘的框可能超出 [0, 1]。
///
/// # 参数
/// * `candidates` - 解码后的候选框
/// * `img_width` - 原始图像宽度
/// * `img_height` - 原始图像高度
/// * `scaling` - 宽度的缩放方式，见 [`BoxScaling`]
///
/// # 示例
///
/// ```
/// use lookout::config::BoxScaling;
/// use lookout::detect::{bounds::convert, posts::Candidate};
///
/// let full = Candidate { bbox: [0.5, 0.5, 1.0, 1.0], confidence: 0.9, class_id: 0 };
/// let boxes = convert(&[full], 640.0, 480.0, BoxScaling::Proportional);
/// assert_eq!(boxes[0].to_array(), [0.0, 0.0, 1.0, 1.0]);
/// ```
pub fn convert(
    candidates: &[Candidate],
    img_width: f32,
    img_height: f32,
    scaling: BoxScaling,
) -> Vec<BoundingBox> {
    candidates
        .iter()
        .map(|candidate| {
            let [cx, cy, w, h] = candidate.bbox;
            match scaling {
                BoxScaling::Legacy => {
                    // 先截断到整像素，再求角点
                    let cx = (cx * img_width).trunc();
                    let cy = (cy * img_height).trunc();
                    let w = (w * img_height).trunc();
                    let h = (h * img_height).trunc();
                    BoundingBox {
                        x1: (cx - w / 2.0).trunc() / img_width,
                        y1: (cy - h / 2.0).trunc() / img_height,
                        x2: (cx + w / 2.0).trunc() / img_width,
                        y2: (cy + h / 2.0).trunc() / img_height,
                    }
                }
                BoxScaling::Proportional => {
                    let cx = cx * img_width;
                    let cy = cy * img_height;
                    let w = w * img_width;
                    let h = h * img_height;
                    BoundingBox {
                        x1: (cx - w / 2.0) / img_width,
                        y1: (cy - h / 2.0) / img_height,
                        x2: (cx + w / 2.0) / img_width,
                        y2: (cy + h / 2.0) / img_height,
                    }
                }
            }
        })
        .collect()
}
