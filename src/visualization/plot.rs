//! Raster score plot.
//!
//! Draws the raw, running-average and running-median score curves on a
//! transparent canvas with a dotted grid, and marks the success episode with
//! a red dot. The legend is a column of colour swatches in the upper right
//! corner, in the order raw, average, median, success.

use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use tracing::info;

use crate::error::Result;
use crate::metrics::ScoreCurves;

pub const RAW_COLOR: Rgba<u8> = Rgba([31, 119, 180, 255]);
pub const MEAN_COLOR: Rgba<u8> = Rgba([255, 127, 14, 255]);
pub const MEDIAN_COLOR: Rgba<u8> = Rgba([44, 160, 44, 255]);
pub const SUCCESS_COLOR: Rgba<u8> = Rgba([214, 39, 40, 255]);
const AXIS_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);
const GRID_COLOR: Rgba<u8> = Rgba([160, 160, 160, 255]);

#[derive(Clone, Debug, PartialEq)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
    pub margin: u32,
    /// Grid lines per axis
    pub grid_lines: u32,
}

impl Default for PlotOptions {
    fn default() -> Self {
        PlotOptions {
            width: 800,
            height: 500,
            margin: 40,
            grid_lines: 5,
        }
    }
}

/// Maps data coordinates onto the plot area
struct Frame {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
    x_max: f32,
    y_min: f32,
    y_max: f32,
}

impl Frame {
    fn new(options: &PlotOptions, episodes: usize, y_min: f32, y_max: f32) -> Self {
        let (y_min, y_max) = if (y_max - y_min).abs() < f32::EPSILON {
            (y_min - 1.0, y_max + 1.0)
        } else {
            (y_min, y_max)
        };
        // a margin wider than half the image collapses the plot area to a line
        let margin_x = options.margin.min(options.width / 2);
        let margin_y = options.margin.min(options.height / 2);
        Frame {
            left: margin_x as f32,
            right: options.width.saturating_sub(margin_x) as f32,
            top: margin_y as f32,
            bottom: options.height.saturating_sub(margin_y) as f32,
            x_max: episodes.max(1) as f32,
            y_min,
            y_max,
        }
    }

    fn point(&self, episode: f32, value: f32) -> (i64, i64) {
        let x = self.left + episode / self.x_max * (self.right - self.left);
        let y = self.bottom - (value - self.y_min) / (self.y_max - self.y_min) * (self.bottom - self.top);
        (x.round() as i64, y.round() as i64)
    }
}

fn put(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Bresenham line
fn draw_line(image: &mut RgbaImage, from: (i64, i64), to: (i64, i64), color: Rgba<u8>) {
    let (mut x0, mut y0) = from;
    let (x1, y1) = to;
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put(image, x0, y0, color);
        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

fn fill_disc(image: &mut RgbaImage, center: (i64, i64), radius: i64, color: Rgba<u8>) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx * dx + dy * dy <= radius * radius {
                put(image, center.0 + dx, center.1 + dy, color);
            }
        }
    }
}

fn fill_rect(image: &mut RgbaImage, x: i64, y: i64, w: i64, h: i64, color: Rgba<u8>) {
    for py in y..y + h {
        for px in x..x + w {
            put(image, px, py, color);
        }
    }
}

fn draw_series(image: &mut RgbaImage, frame: &Frame, values: &[f32], color: Rgba<u8>) {
    let points: Vec<(i64, i64)> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| frame.point(i as f32, v))
        .collect();
    match points.as_slice() {
        [] => {}
        [single] => put(image, single.0, single.1, color),
        _ => {
            for pair in points.windows(2) {
                draw_line(image, pair[0], pair[1], color);
            }
        }
    }
}

fn draw_grid(image: &mut RgbaImage, frame: &Frame, lines: u32) {
    let (left, right) = (frame.left as i64, frame.right as i64);
    let (top, bottom) = (frame.top as i64, frame.bottom as i64);

    for k in 1..=lines as i64 {
        let y = bottom - (bottom - top) * k / lines as i64;
        let x = left + (right - left) * k / lines as i64;
        // dotted
        for px in (left..=right).step_by(4) {
            put(image, px, y, GRID_COLOR);
        }
        for py in (top..=bottom).step_by(4) {
            put(image, x, py, GRID_COLOR);
        }
    }

    draw_line(image, (left, bottom), (right, bottom), AXIS_COLOR);
    draw_line(image, (left, top), (left, bottom), AXIS_COLOR);
}

fn draw_legend(image: &mut RgbaImage, frame: &Frame, with_success: bool) {
    let mut entries = vec![RAW_COLOR, MEAN_COLOR, MEDIAN_COLOR];
    if with_success {
        entries.push(SUCCESS_COLOR);
    }
    let x = frame.right as i64 - 30;
    for (i, color) in entries.into_iter().enumerate() {
        let y = frame.top as i64 + 8 + 14 * i as i64;
        fill_rect(image, x, y, 20, 8, color);
    }
}

/// Render the score curves; `success_threshold` places the success marker
pub fn render_scores(curves: &ScoreCurves, success_threshold: f32, options: &PlotOptions) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(options.width, options.height, Rgba([0, 0, 0, 0]));

    let all = curves.raw.iter().chain(&curves.running_mean).chain(&curves.running_median);
    let y_min = all.clone().copied().filter(|v| v.is_finite()).fold(f32::INFINITY, f32::min);
    let y_max = all.copied().filter(|v| v.is_finite()).fold(f32::NEG_INFINITY, f32::max);
    let (y_min, y_max) = if y_min.is_finite() { (y_min, y_max) } else { (0.0, 1.0) };

    let frame = Frame::new(options, curves.len(), y_min, y_max);
    draw_grid(&mut image, &frame, options.grid_lines.max(1));

    draw_series(&mut image, &frame, &curves.raw, RAW_COLOR);
    draw_series(&mut image, &frame, &curves.running_mean, MEAN_COLOR);
    draw_series(&mut image, &frame, &curves.running_median, MEDIAN_COLOR);

    let success = curves.success_point(success_threshold);
    if let Some((episode, value)) = success {
        fill_disc(&mut image, frame.point(episode as f32, value), 4, SUCCESS_COLOR);
    }

    draw_legend(&mut image, &frame, success.is_some());
    image
}

/// Render and write the score plot as PNG
pub fn save_score_plot<P: AsRef<Path>>(
    curves: &ScoreCurves,
    success_threshold: f32,
    path: P,
) -> Result<()> {
    let plot = render_scores(curves, success_threshold, &PlotOptions::default());
    plot.save_with_format(path.as_ref(), ImageFormat::Png)?;
    info!(path = %path.as_ref().display(), "DQN training scores plot written");
    Ok(())
}
