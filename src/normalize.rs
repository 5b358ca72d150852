use anyhow::{Result, bail};
use opencv::core::{Mat, Rect, Size, Vector};
use opencv::imgproc::InterpolationFlags;
use opencv::prelude::*;
use opencv::{imgcodecs, imgproc};

/// 归一化后的图片
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// 编码后的 JPEG 数据
    pub data: Vec<u8>,
    /// 编码后的字节数
    pub size: usize,
}

/// 将原始图片转换为向量化模型需要的输入格式
///
/// 实现必须是线程安全的，引擎会在阻塞线程池中并发调用。
pub trait Normalizer: Send + Sync {
    fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage>;
}

/// 使用 OpenCV 缩放裁剪到固定正方形并编码为 JPEG
#[derive(Debug, Clone, Copy)]
pub struct CoverNormalizer {
    /// 目标边长
    pub side: i32,
    /// JPEG 质量，0 - 100
    pub quality: i32,
}

impl Default for CoverNormalizer {
    fn default() -> Self {
        // CLIP 模型的输入尺寸
        Self { side: 224, quality: 95 }
    }
}

impl CoverNormalizer {
    pub fn new(side: u32, quality: u32) -> Self {
        Self { side: side as i32, quality: quality.min(100) as i32 }
    }
}

/// 计算 cover 缩放后的尺寸：短边恰好等于 `side`，长边按比例，不小于 `side`
pub fn cover_size(width: i32, height: i32, side: i32) -> Size {
    let scale = (side as f64 / width as f64).max(side as f64 / height as f64);
    let w = ((width as f64 * scale).round() as i32).max(side);
    let h = ((height as f64 * scale).round() as i32).max(side);
    Size::new(w, h)
}

/// 居中裁剪的区域
pub fn center_crop(size: Size, side: i32) -> Rect {
    Rect::new((size.width - side) / 2, (size.height - side) / 2, side, side)
}

/// 可解码的格式取决于链接的 OpenCV：webp 需要编译时启用 WebP 支持，
/// gif 需要 OpenCV 4.11 及以上。无法解码的文件按损坏处理。
impl Normalizer for CoverNormalizer {
    fn normalize(&self, bytes: &[u8]) -> Result<NormalizedImage> {
        let buf = Mat::from_slice(bytes)?;
        let img = imgcodecs::imdecode(&buf, imgcodecs::IMREAD_COLOR)?;
        if img.empty() {
            bail!("无法解码图片");
        }

        let target = cover_size(img.cols(), img.rows(), self.side);
        // 缩小用 area，放大用 cubic
        let interpolation = if target.width < img.cols() {
            InterpolationFlags::INTER_AREA
        } else {
            InterpolationFlags::INTER_CUBIC
        };
        let mut resized = Mat::default();
        imgproc::resize(&img, &mut resized, target, 0., 0., interpolation as i32)?;

        let cropped = Mat::roi(&resized, center_crop(target, self.side))?.try_clone()?;

        let params = Vector::<i32>::from_slice(&[
            imgcodecs::IMWRITE_JPEG_QUALITY,
            self.quality,
            imgcodecs::IMWRITE_JPEG_OPTIMIZE,
            1,
        ]);
        let mut out = Vector::<u8>::new();
        if !imgcodecs::imencode(".jpg", &cropped, &mut out, &params)? {
            bail!("JPEG 编码失败");
        }
        let data = out.to_vec();
        Ok(NormalizedImage { size: data.len(), data })
    }
}
