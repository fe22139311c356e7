use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;
use std::path::Path;

use crate::config::{ChannelOrder, InputResolution};
use crate::error::DetectError;

/// 加载图像文件
///
/// # 错误处理
/// 文件不存在、无法解码或尺寸为零时返回Err
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage, DetectError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(DetectError::Input(format!("图像文件不存在: {:?}", path)));
    }
    let bytes = std::fs::read(path)?;
    decode_image(&bytes)
}

/// 将上传的字节解码为图像
///
/// # 错误处理
/// 数据为空、无法解码或图像面积为零时返回Err
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, DetectError> {
    if bytes.is_empty() {
        return Err(DetectError::Input("图像数据为空".to_string()));
    }
    let img = image::load_from_memory(bytes)?;
    check_image(&img)?;
    Ok(img)
}

/// 检查图像面积不为零
pub fn check_image(img: &DynamicImage) -> Result<(), DetectError> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(DetectError::Input(format!("图像尺寸无效: {}x{}", width, height)));
    }
    Ok(())
}

/// 调整图像大小以适应模型输入
///
/// 双线性插值，采样方式与 OpenCV 的 INTER_LINEAR 相同：输出像素 `d` 对应源坐标
/// `(d + 0.5) * scale - 0.5`，只在相邻的 2x2 个像素间插值，缩小时不做抗锯齿。
/// 插值方式必须与模型训练时一致，否则精度会无声下降。
pub fn resize_image(img: &DynamicImage, width: u32, height: u32) -> RgbImage {
    let src = img.to_rgb8();
    if src.width() == 0 || src.height() == 0 {
        return RgbImage::new(width, height);
    }

    let xs = sample_positions(src.width(), width);
    let ys = sample_positions(src.height(), height);

    RgbImage::from_fn(width, height, |x, y| {
        let (x0, x1, fx) = xs[x as usize];
        let (y0, y1, fy) = ys[y as usize];
        let p00 = src.get_pixel(x0, y0);
        let p10 = src.get_pixel(x1, y0);
        let p01 = src.get_pixel(x0, y1);
        let p11 = src.get_pixel(x1, y1);
        Rgb(std::array::from_fn(|c| {
            let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
            let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
            (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
        }))
    })
}

/// 每个输出下标对应的 (左邻, 右邻, 右邻权重)，越界时贴边
fn sample_positions(src: u32, dst: u32) -> Vec<(u32, u32, f32)> {
    let scale = src as f32 / dst as f32;
    let last = src - 1;
    (0..dst)
        .map(|d| {
            let pos = (d as f32 + 0.5) * scale - 0.5;
            if pos <= 0.0 {
                return (0, 0, 0.0);
            }
            let left = pos.floor() as u32;
            if left >= last {
                return (last, last, 0.0);
            }
            (left, left + 1, pos - left as f32)
        })
        .collect()
}

/// 将图像转换为模型输入张量
///
/// 1. 调整到网络输入分辨率
/// 2. 归一化像素值到[0, 1]范围
/// 3. 按 `order` 排列通道
///
/// # 返回值
/// 返回形状为(1, height, width, 3)的NHWC四维张量
///
/// # 示例
///
/// ```
/// use image::DynamicImage;
/// use lookout::config::{ChannelOrder, InputResolution};
/// use lookout::detect::prevs::preprocess;
///
/// let img = DynamicImage::new_rgb8(1920, 1080);
/// let tensor = preprocess(&img, InputResolution { width: 320, height: 320 }, ChannelOrder::Rgb);
/// assert_eq!(tensor.shape(), &[1, 320, 320, 3]);
/// ```
pub fn preprocess(img: &DynamicImage, resolution: InputResolution, order: ChannelOrder) -> Array4<f32> {
    let InputResolution { width, height } = resolution;
    let resized = resize_image(img, width, height);

    let mut tensor = Array4::<f32>::zeros((1, height as usize, width as usize, 3));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let [r, g, b] = pixel.0;
        let channels = match order {
            ChannelOrder::Rgb => [r, g, b],
            ChannelOrder::Bgr => [b, g, r],
        };
        for (c, value) in channels.into_iter().enumerate() {
            tensor[[0, y as usize, x as usize, c]] = value as f32 / 255.0;
        }
    }

    tensor
}
