//! Static Chart Renderer
//! Renders the per-minute histogram to a PNG image with plotters, for export
//! outside the dashboard.

use crate::data::{minute_caption, MinuteHistogram};
use image::{ImageFormat, RgbImage};
use plotters::prelude::*;
use std::io::Cursor;
use thiserror::Error;

const BAR_COLOR: RGBColor = RGBColor(100, 149, 237);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Drawing failed: {0}")]
    Drawing(String),
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Invalid image size {0}x{1}")]
    InvalidSize(u32, u32),
}

/// Output image settings.
#[derive(Debug, Clone, Copy)]
pub struct ImageOptions {
    pub width: u32,
    pub height: u32,
    /// Draw caption, axis descriptions and tick labels (needs system fonts).
    pub labels: bool,
}

impl Default for ImageOptions {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            labels: true,
        }
    }
}

pub struct StaticChartRenderer;

impl StaticChartRenderer {
    /// Render the histogram as PNG bytes.
    pub fn render_minute_histogram_png(
        histogram: &MinuteHistogram,
        options: ImageOptions,
    ) -> Result<Vec<u8>, RenderError> {
        let ImageOptions {
            width,
            height,
            labels,
        } = options;
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidSize(width, height));
        }

        let mut buffer = vec![0u8; width as usize * height as usize * 3];
        Self::draw_histogram(&mut buffer, histogram, width, height, labels)
            .map_err(RenderError::Drawing)?;

        let img = RgbImage::from_raw(width, height, buffer)
            .ok_or(RenderError::InvalidSize(width, height))?;
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn draw_histogram(
        buffer: &mut [u8],
        histogram: &MinuteHistogram,
        width: u32,
        height: u32,
        labels: bool,
    ) -> Result<(), String> {
        let root = BitMapBackend::with_buffer(buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).map_err(|e| e.to_string())?;

        // Leave 10% headroom above the tallest bar
        let max = histogram.max_count().max(1) as u32;
        let y_max = max + max / 10 + 1;

        let mut builder = ChartBuilder::on(&root);
        builder.margin(15);
        if labels {
            builder
                .caption(minute_caption(histogram.hour), ("sans-serif", 24))
                .x_label_area_size(40)
                .y_label_area_size(50);
        }
        let mut chart = builder
            .build_cartesian_2d((0u32..60u32).into_segmented(), 0u32..y_max)
            .map_err(|e| e.to_string())?;

        if labels {
            chart
                .configure_mesh()
                .disable_x_mesh()
                .x_desc("minute")
                .y_desc("crashes")
                .draw()
                .map_err(|e| e.to_string())?;
        }

        chart
            .draw_series(
                Histogram::vertical(&chart)
                    .style(BAR_COLOR.filled())
                    .margin(2)
                    .data(
                        histogram
                            .buckets
                            .iter()
                            .map(|b| (b.minute, b.crashes as u32)),
                    ),
            )
            .map_err(|e| e.to_string())?;

        root.present().map_err(|e| e.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CollisionViews, HourSubset};

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn plain(width: u32, height: u32) -> ImageOptions {
        ImageOptions {
            width,
            height,
            labels: false,
        }
    }

    #[test]
    fn renders_png_bytes() {
        let histogram = CollisionViews::minute_histogram(&HourSubset::default(), 0);
        let bytes =
            StaticChartRenderer::render_minute_histogram_png(&histogram, plain(320, 200)).unwrap();
        assert_eq!(&bytes[..8], &PNG_SIGNATURE);

        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 200));
    }

    #[test]
    fn rejects_empty_canvas() {
        let histogram = CollisionViews::minute_histogram(&HourSubset::default(), 0);
        let err = StaticChartRenderer::render_minute_histogram_png(&histogram, plain(0, 200))
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidSize(0, 200)));
    }
}
