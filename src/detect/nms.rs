//! 非极大值抑制 (NMS)

use crate::detect::bounds::BoundingBox;

/// 应用非极大值抑制
///
/// 按置信度降序（相同置信度保持原有顺序）贪心地选择框，每选出一个，
/// 就丢弃剩余框中与它 IoU 大于 `iou_threshold` 的框。
/// 不高于 `confidence_threshold` 的框直接跳过。
///
/// # 参数
/// * `boxes` - 角点格式的边界框
/// * `confidences` - 与 `boxes` 一一对应的置信度
/// * `confidence_threshold` - 置信度阈值
/// * `iou_threshold` - NMS阈值
///
/// # 返回值
/// 返回保留下来的框在输入中的下标，按选择顺序排列（置信度从高到低）
pub fn suppress(
    boxes: &[BoundingBox],
    confidences: &[f32],
    confidence_threshold: f32,
    iou_threshold: f32,
) -> Vec<usize> {
    debug_assert_eq!(boxes.len(), confidences.len());
    let len = boxes.len().min(confidences.len());

    let mut order: Vec<usize> = (0..len)
        .filter(|&i| confidences[i] > confidence_threshold)
        .collect();
    // sort_by 是稳定排序，相同置信度按下标升序
    order.sort_by(|&a, &b| confidences[b].total_cmp(&confidences[a]));

    let mut suppressed = vec![false; len];
    let mut keep = Vec::new();

    for (pos, &i) in order.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        keep.push(i);

        for &j in &order[pos + 1..] {
            if !suppressed[j] && boxes[i].iou(&boxes[j]) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}
