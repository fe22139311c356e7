//! 推理引擎
//!
//! [`InferenceEngine`] 把网络当作黑盒：输入预处理后的 NHWC 张量，
//! 输出一个批次中的所有候选行。输出的含义由 [`crate::detect::posts`] 解释。

use ndarray::{Array2, Array4};
use ort::{inputs, session::Session, value::Tensor};
use std::path::Path;
use tracing::{debug, info};

use crate::config::BOX_COLUMNS;
use crate::detect::model::load_model;
use crate::error::DetectError;

/// 模型在加载时声明的输入输出形状
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSignature {
    pub input_width: u32,
    pub input_height: u32,
    /// 每个候选行的长度：4 个坐标、objectness 以及类别分数
    pub columns: usize,
}

impl EngineSignature {
    /// 类别分数列的数量
    pub fn num_classes(&self) -> usize {
        self.columns.saturating_sub(BOX_COLUMNS)
    }
}

pub trait InferenceEngine: Send {
    fn signature(&self) -> EngineSignature;

    /// 执行一次前向推理
    ///
    /// # 参数
    /// * `input` - 形状为(1, height, width, 3)的张量
    ///
    /// # 返回值
    /// 返回形状为(num_boxes, columns)的原始输出
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array2<f32>, DetectError>;
}

impl<E: InferenceEngine + ?Sized> InferenceEngine for Box<E> {
    fn signature(&self) -> EngineSignature {
        (**self).signature()
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array2<f32>, DetectError> {
        (**self).infer(input)
    }
}

/// 模型输入的维度顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorLayout {
    /// [1, H, W, 3]
    Nhwc,
    /// [1, 3, H, W]
    Nchw,
}

/// 基于 ONNX Runtime 的推理引擎
pub struct OrtEngine {
    session: Session,
    input_name: String,
    layout: TensorLayout,
    signature: EngineSignature,
}

impl OrtEngine {
    /// 加载模型并检查输入输出形状
    ///
    /// 输入必须是 `[1, H, W, 3]` 或 `[1, 3, H, W]`，H 和 W 为固定值；
    /// 输出必须是 `[1, N, C]`，C 为固定值且不小于 5。
    pub fn load(model_path: impl AsRef<Path>) -> Result<Self, DetectError> {
        let session = load_model(model_path)?;
        Self::from_session(session)
    }

    pub fn from_session(session: Session) -> Result<Self, DetectError> {
        let input = session
            .inputs
            .first()
            .ok_or_else(|| DetectError::ModelLoad("模型没有输入".to_string()))?;
        let input_dims: Vec<i64> = input
            .input_type
            .tensor_shape()
            .ok_or_else(|| DetectError::ModelLoad("模型输入不是张量".to_string()))?
            .iter()
            .copied()
            .collect();
        let (layout, input_height, input_width) = input_layout(&input_dims)?;
        let input_name = input.name.clone();

        let output = session
            .outputs
            .first()
            .ok_or_else(|| DetectError::ModelLoad("模型没有输出".to_string()))?;
        let output_dims: Vec<i64> = output
            .output_type
            .tensor_shape()
            .ok_or_else(|| DetectError::ModelLoad("模型输出不是张量".to_string()))?
            .iter()
            .copied()
            .collect();
        let columns = output_columns(&output_dims)?;

        let signature = EngineSignature {
            input_width,
            input_height,
            columns,
        };
        info!(
            "模型输入 {:?} {}x{}, 每行输出 {} 列",
            layout, input_width, input_height, columns
        );

        Ok(Self {
            session,
            input_name,
            layout,
            signature,
        })
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }
}

impl InferenceEngine for OrtEngine {
    fn signature(&self) -> EngineSignature {
        self.signature
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array2<f32>, DetectError> {
        let input = to_layout(input, self.layout);
        let shape: Vec<usize> = input.shape().to_vec();
        let (data, _offset) = input.into_raw_vec_and_offset();
        let input_tensor = Tensor::from_array(([shape[0], shape[1], shape[2], shape[3]], data))
            .map_err(|e| DetectError::inference("无法创建输入张量", e))?;

        debug!("执行模型推理");
        let outputs = self
            .session
            .run(inputs![self.input_name.as_str() => input_tensor])
            .map_err(|e| DetectError::inference("推理执行失败", e))?;

        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectError::inference("无法提取输出张量", e))?;

        output_rows(shape, data)
    }
}

/// 把 NHWC 张量重排为模型要求的布局，结果为标准内存布局
fn to_layout(input: &Array4<f32>, layout: TensorLayout) -> Array4<f32> {
    match layout {
        TensorLayout::Nhwc => input.as_standard_layout().into_owned(),
        TensorLayout::Nchw => input
            .view()
            .permuted_axes([0, 3, 1, 2])
            .as_standard_layout()
            .into_owned(),
    }
}

/// 把形状为 [1, num_boxes, num_params] 的扁平输出转成二维候选行
fn output_rows(shape: &[i64], data: &[f32]) -> Result<Array2<f32>, DetectError> {
    if shape.len() != 3 || shape[0] != 1 || shape[1] < 0 || shape[2] < 0 {
        return Err(DetectError::Inference(format!(
            "模型输出形状不符合预期: {:?}",
            shape
        )));
    }
    let (rows, columns) = (shape[1] as usize, shape[2] as usize);
    Array2::from_shape_vec((rows, columns), data.to_vec())
        .map_err(|e| DetectError::inference("模型输出无法重塑", e))
}

/// 从输入维度判断布局与分辨率，动态批次维 (-1) 视为 1
fn input_layout(dims: &[i64]) -> Result<(TensorLayout, u32, u32), DetectError> {
    let invalid = || DetectError::ModelLoad(format!("模型输入形状不受支持: {:?}", dims));
    if dims.len() != 4 || !(dims[0] == 1 || dims[0] == -1) {
        return Err(invalid());
    }
    let (layout, h, w) = match (dims[1], dims[3]) {
        (_, 3) => (TensorLayout::Nhwc, dims[1], dims[2]),
        (3, _) => (TensorLayout::Nchw, dims[2], dims[3]),
        _ => return Err(invalid()),
    };
    if h <= 0 || w <= 0 {
        return Err(invalid());
    }
    Ok((layout, h as u32, w as u32))
}

fn output_columns(dims: &[i64]) -> Result<usize, DetectError> {
    if dims.len() != 3 || !(dims[0] == 1 || dims[0] == -1) {
        return Err(DetectError::ModelLoad(format!(
            "模型输出形状不受支持: {:?}",
            dims
        )));
    }
    let columns = dims[2];
    if columns < BOX_COLUMNS as i64 {
        return Err(DetectError::ModelLoad(format!(
            "模型输出每行至少需要 {} 列, 实际为 {}",
            BOX_COLUMNS, columns
        )));
    }
    Ok(columns as usize)
}
