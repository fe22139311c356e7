use ndarray::{ArrayView2, Axis};

use crate::config::{BOX_COLUMNS, ScoreRule};

/// 候选检测结果
///
/// 由模型输出的一行解码而来，坐标仍是网络空间的中心点格式。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    /// [cx, cy, w, h]，均为相对网络输入归一化的值
    pub bbox: [f32; 4],
    pub confidence: f32,
    pub class_id: usize,
}

/// 解码模型输出，按置信度阈值过滤
///
/// 每行格式为 `[cx, cy, w, h, objectness, class_0, class_1, ...]`。
/// 类别 ID 取类别分数中最大值的下标（相等时取靠前的），没有类别列时为 0。
/// 置信度由 `rule` 决定，不高于阈值的行被丢弃。输出保持行的原始顺序。
///
/// # 参数
/// * `output` - 模型输出，形状为(num_boxes, num_params)
/// * `confidence_threshold` - 置信度阈值
/// * `rule` - 置信度取值规则
///
/// # 示例
///
/// ```
/// use ndarray::array;
/// use lookout::config::ScoreRule;
/// use lookout::detect::posts::decode;
///
/// let output = array![[0.5, 0.5, 0.4, 0.4, 0.9, 0.1, 0.8]];
/// let candidates = decode(output.view(), 0.5, ScoreRule::Objectness);
/// assert_eq!(candidates[0].class_id, 1);
/// assert_eq!(candidates[0].confidence, 0.9);
/// ```
pub fn decode(output: ArrayView2<f32>, confidence_threshold: f32, rule: ScoreRule) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for row in output.axis_iter(Axis(0)) {
        if row.len() < BOX_COLUMNS {
            continue;
        }
        let objectness = row[4];
        let best_class = row
            .iter()
            .skip(BOX_COLUMNS)
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f32)>, (idx, score)| match best {
                Some((_, top)) if score.is_nan() || score <= top => best,
                _ => Some((idx, score)),
            });

        let confidence = match (rule, best_class) {
            (ScoreRule::Objectness, _) | (_, None) => objectness,
            (ScoreRule::ClassMax, Some((_, score))) => score,
            (ScoreRule::Product, Some((_, score))) => objectness * score,
        };

        if confidence.is_nan() || confidence <= confidence_threshold {
            continue;
        }

        candidates.push(Candidate {
            bbox: [row[0], row[1], row[2], row[3]],
            confidence,
            class_id: best_class.map_or(0, |(idx, _)| idx),
        });
    }

    candidates
}
