use image::{DynamicImage, GenericImageView};
use raqote::{DrawOptions, DrawTarget, LineJoin, PathBuilder, SolidSource, Source, StrokeStyle};

use crate::detect::detector::Detection;

/// 在图像上绘制检测结果
///
/// 检测框坐标是归一化的，绘制前按原图尺寸换算成像素。
/// `highlight` 类别使用青色，其他类别使用红色。
///
/// # 参数
/// * `image` - 原始图像
/// * `detections` - 检测结果列表
/// * `highlight` - 需要突出显示的类别名称
///
/// # 返回值
/// 返回绘制了检测框的图像
pub fn draw_detections(image: &DynamicImage, detections: &[Detection], highlight: &str) -> DynamicImage {
    let (img_width, img_height) = image.dimensions();
    let mut dt = DrawTarget::new(img_width as i32, img_height as i32);

    // raqote 使用预乘的 BGRA
    let rgba_image = image.to_rgba8();
    let image_data: Vec<u32> = rgba_image
        .pixels()
        .map(|pixel| {
            let [r, g, b, a] = pixel.0;
            u32::from_le_bytes([b, g, r, a])
        })
        .collect();

    let img = raqote::Image {
        width: img_width as i32,
        height: img_height as i32,
        data: &image_data,
    };
    dt.draw_image_at(0.0, 0.0, &img, &DrawOptions::new());

    let stroke_width = (img_width.min(img_height) as f32 / 200.0).max(2.0);
    for detection in detections {
        let [x1, y1, x2, y2] = detection.bbox;
        let (x1, y1) = (x1 * img_width as f32, y1 * img_height as f32);
        let (x2, y2) = (x2 * img_width as f32, y2 * img_height as f32);

        let mut pb = PathBuilder::new();
        pb.rect(x1, y1, x2 - x1, y2 - y1);
        let path = pb.finish();

        let color = if detection.label == highlight {
            SolidSource { r: 0x00, g: 0xFF, b: 0xFF, a: 0xFF }
        } else {
            SolidSource { r: 0xFF, g: 0x00, b: 0x00, a: 0xFF }
        };

        dt.stroke(
            &path,
            &Source::Solid(color),
            &StrokeStyle {
                join: LineJoin::Round,
                width: stroke_width,
                ..StrokeStyle::default()
            },
            &DrawOptions::default(),
        );
    }

    let pixels: Vec<u8> = dt
        .get_data()
        .iter()
        .flat_map(|&pixel| {
            let [b, g, r, a] = pixel.to_le_bytes();
            [r, g, b, a]
        })
        .collect();

    match image::RgbaImage::from_raw(img_width, img_height, pixels) {
        Some(buffer) => DynamicImage::ImageRgba8(buffer),
        None => image.clone(),
    }
}
