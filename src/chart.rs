//! PNG charts for the prediction and evaluation pages.

use std::io::Cursor;

use image::{ImageError, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_filled_rect_mut, draw_hollow_rect_mut, draw_polygon_mut,
};
use imageproc::point::Point;
use imageproc::rect::Rect;

use crate::models::{AggregateReport, ConfusionMatrix};
use crate::risk::RiskLabel;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([51, 51, 51]);
const EMPTY: Rgb<u8> = Rgb([217, 217, 217]);
const HEAT: Rgb<u8> = Rgb([8, 48, 107]);

// 3x5 glyphs, one bit per pixel, high bit on the left.
const DIGITS: [[u8; 5]; 10] = [
    [0b111, 0b101, 0b101, 0b101, 0b111],
    [0b010, 0b110, 0b010, 0b010, 0b111],
    [0b111, 0b001, 0b111, 0b100, 0b111],
    [0b111, 0b001, 0b111, 0b001, 0b111],
    [0b101, 0b101, 0b111, 0b001, 0b001],
    [0b111, 0b100, 0b111, 0b001, 0b111],
    [0b111, 0b100, 0b111, 0b101, 0b111],
    [0b111, 0b001, 0b001, 0b001, 0b001],
    [0b111, 0b101, 0b111, 0b101, 0b111],
    [0b111, 0b101, 0b111, 0b001, 0b111],
];
const POINT: [u8; 5] = [0b000, 0b000, 0b000, 0b000, 0b010];
const PERCENT: [u8; 5] = [0b101, 0b001, 0b010, 0b100, 0b101];

pub fn label_color(label: RiskLabel) -> Rgb<u8> {
    match label {
        RiskLabel::NotAtRisk => Rgb([0x66, 0xb3, 0xff]),
        RiskLabel::AtRisk => Rgb([0xff, 0x99, 0x99]),
    }
}

/// Share of each category, starting at twelve o'clock and running
/// counter-clockwise, with the percentage printed inside each slice.
/// An empty batch renders as a grey disc.
pub fn pie_chart_png(report: &AggregateReport) -> Result<Vec<u8>, ImageError> {
    const SIZE: u32 = 480;
    const RADIUS: i32 = 200;
    const LABEL_SCALE: u32 = 4;
    let center = (SIZE as i32 / 2, SIZE as i32 / 2);
    let mut image = RgbImage::from_pixel(SIZE, SIZE, WHITE);

    if report.total == 0 {
        draw_filled_circle_mut(&mut image, center, RADIUS, EMPTY);
        return encode_png(&image);
    }

    let mut labels = Vec::new();
    let mut start = 90.0;
    for entry in report.counts.iter().filter(|entry| entry.count > 0) {
        let sweep = entry.proportion * 360.0;
        let color = label_color(entry.label);
        if entry.count == report.total {
            draw_filled_circle_mut(&mut image, center, RADIUS, color);
        } else {
            draw_sector(&mut image, center, RADIUS as f64, start, sweep, color);
        }
        labels.push((start + sweep / 2.0, format!("{:.1}%", entry.proportion * 100.0)));
        start += sweep;
    }

    // Labels go on after every slice is filled.
    let label_radius = RADIUS as f64 * 0.6;
    for (angle, text) in labels {
        let radians = f64::to_radians(angle);
        let x = center.0 + (label_radius * radians.cos()).round() as i32;
        let y = center.1 - (label_radius * radians.sin()).round() as i32;
        let top = y - (5 * LABEL_SCALE as i32) / 2;
        draw_text(&mut image, &text, x, top, LABEL_SCALE, INK);
    }

    encode_png(&image)
}

fn draw_sector(
    image: &mut RgbImage,
    center: (i32, i32),
    radius: f64,
    start_degrees: f64,
    sweep_degrees: f64,
    color: Rgb<u8>,
) {
    let steps = (sweep_degrees.ceil() as usize).max(2);
    let mut points = vec![Point::new(center.0, center.1)];
    for step in 0..=steps {
        let angle = (start_degrees + sweep_degrees * step as f64 / steps as f64).to_radians();
        points.push(Point::new(
            center.0 + (radius * angle.cos()).round() as i32,
            center.1 - (radius * angle.sin()).round() as i32,
        ));
    }
    points.dedup();
    if points.len() >= 3 && points.first() != points.last() {
        draw_polygon_mut(image, &points, color);
    }
}

/// Heatmap with actual labels as rows and predicted labels as columns.
pub fn confusion_matrix_png(matrix: &ConfusionMatrix) -> Result<Vec<u8>, ImageError> {
    const CELL: u32 = 160;
    const MARGIN: u32 = 40;
    let size = MARGIN * 2 + CELL * 2;
    let mut image = RgbImage::from_pixel(size, size, WHITE);

    let grid = matrix.as_grid();
    let max = grid.iter().flatten().copied().max().unwrap_or(0).max(1);

    for (row, counts) in grid.iter().enumerate() {
        for (col, count) in counts.iter().enumerate() {
            let intensity = *count as f64 / max as f64;
            let x = (MARGIN + col as u32 * CELL) as i32;
            let y = (MARGIN + row as u32 * CELL) as i32;
            let cell = Rect::at(x, y).of_size(CELL, CELL);
            draw_filled_rect_mut(&mut image, cell, blend(WHITE, HEAT, intensity));
            draw_hollow_rect_mut(&mut image, cell, INK);

            let ink = if intensity > 0.5 { WHITE } else { INK };
            let center_x = x + CELL as i32 / 2;
            draw_number(&mut image, *count, center_x, y + CELL as i32 / 2 - 20, 8, ink);
        }
    }

    encode_png(&image)
}

/// Two bars, not-at-risk then at-risk, with the count above each bar.
pub fn label_distribution_png(counts: [usize; 2]) -> Result<Vec<u8>, ImageError> {
    const WIDTH: u32 = 480;
    const HEIGHT: u32 = 360;
    const BASELINE: i32 = 320;
    const MAX_BAR: f64 = 240.0;
    const BAR_WIDTH: u32 = 120;
    let mut image = RgbImage::from_pixel(WIDTH, HEIGHT, WHITE);

    let max = counts.iter().copied().max().unwrap_or(0).max(1);
    for (index, (label, count)) in RiskLabel::ALL.iter().zip(counts).enumerate() {
        let x = 80 + index as i32 * 200;
        let height = (count as f64 / max as f64 * MAX_BAR).round() as u32;
        if height > 0 {
            let bar = Rect::at(x, BASELINE - height as i32).of_size(BAR_WIDTH, height);
            draw_filled_rect_mut(&mut image, bar, label_color(*label));
        }
        let label_top = BASELINE - height as i32 - 30;
        draw_number(&mut image, count, x + BAR_WIDTH as i32 / 2, label_top, 4, INK);
    }

    draw_filled_rect_mut(&mut image, Rect::at(40, BASELINE).of_size(WIDTH - 80, 2), INK);

    encode_png(&image)
}

fn draw_number(
    image: &mut RgbImage,
    value: usize,
    center_x: i32,
    top: i32,
    scale: u32,
    color: Rgb<u8>,
) {
    draw_text(image, &value.to_string(), center_x, top, scale, color);
}

/// Draws digits, `.` and `%` centred on `center_x`; other characters are skipped.
fn draw_text(
    image: &mut RgbImage,
    text: &str,
    center_x: i32,
    top: i32,
    scale: u32,
    color: Rgb<u8>,
) {
    let glyphs = text.chars().filter_map(glyph).collect::<Vec<_>>();
    let advance = 4 * scale as i32;
    let width = glyphs.len() as i32 * advance - scale as i32;
    let mut x = center_x - width / 2;

    for rows in glyphs {
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..3 {
                if bits >> (2 - col) & 1 == 1 {
                    let pixel = Rect::at(x + col * scale as i32, top + row as i32 * scale as i32)
                        .of_size(scale, scale);
                    draw_filled_rect_mut(image, pixel, color);
                }
            }
        }
        x += advance;
    }
}

fn glyph(c: char) -> Option<[u8; 5]> {
    match c {
        '0'..='9' => c.to_digit(10).map(|digit| DIGITS[digit as usize]),
        '.' => Some(POINT),
        '%' => Some(PERCENT),
        _ => None,
    }
}

fn blend(from: Rgb<u8>, to: Rgb<u8>, t: f64) -> Rgb<u8> {
    let t = t.clamp(0.0, 1.0);
    let channel = |i: usize| (from[i] as f64 + (to[i] as f64 - from[i] as f64) * t).round() as u8;
    Rgb([channel(0), channel(1), channel(2)])
}

fn encode_png(image: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}
