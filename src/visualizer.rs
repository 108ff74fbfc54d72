//! Amplitude-reactive orb rendered from the playback analysis tap.
//!
//! The geometry is computed by a pure function of (mean amplitude,
//! wall-clock seconds) so the two visual states and their radii are unit
//! testable; the ratatui widget just draws whatever `orb_frame` returns
//! on a Braille canvas.

use std::time::Instant;

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::Color,
    symbols::Marker,
    widgets::{
        Widget,
        canvas::{Canvas, Context, Line},
    },
};

use crate::audio::AnalysisTap;

// --- 画布与配色 ---
const CANVAS_X_BOUND: f64 = 120.0;
const CANVAS_Y_BOUND: f64 = 120.0;
const COLOR_ORB: Color = Color::Rgb(14, 165, 233); // 品牌蓝

/// Mean byte-amplitude above which the orb switches to its speaking
/// rendering (out of 255).
pub const SPEAKING_THRESHOLD: f32 = 10.0;

/// One computed orb geometry, in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrbFrame {
    Speaking {
        radius: f64,
        glow_radius: f64,
        glow_alpha: f64,
        ring_radius: f64,
    },
    Idle {
        radius: f64,
        ripple_radius: f64,
        ripple_alpha: f64,
    },
}

/// Compute the orb geometry for one animation frame. `amplitude` is the
/// mean byte-frequency energy (0..=255), `t` is seconds since the
/// animation started.
pub fn orb_frame(amplitude: f32, t: f64) -> OrbFrame {
    if amplitude > SPEAKING_THRESHOLD {
        let radius = 20.0 + (amplitude as f64 / 255.0) * 30.0;
        OrbFrame::Speaking {
            radius,
            glow_radius: radius * 1.5,
            glow_alpha: 0.2 + (amplitude as f64 / 255.0) * 0.4,
            ring_radius: radius * 2.0,
        }
    } else {
        // 待机呼吸 + 周期性扩散涟漪
        let radius = 18.0 + (t * 2.5).sin() * 3.0;
        let ripple_radius = 18.0 + (t * 15.0) % 20.0;
        OrbFrame::Idle {
            radius,
            ripple_radius,
            ripple_alpha: (1.0 - ripple_radius / 38.0).max(0.0),
        }
    }
}

/// Owns the animation clock and the read side of the analysis tap.
pub struct OrbAnimator {
    tap: AnalysisTap,
    started: Instant,
}

impl OrbAnimator {
    pub fn new(tap: AnalysisTap) -> Self {
        Self {
            tap,
            started: Instant::now(),
        }
    }

    pub fn widget(&self) -> OrbWidget {
        let amplitude = self.tap.mean_amplitude();
        let t = self.started.elapsed().as_secs_f64();
        OrbWidget {
            frame: orb_frame(amplitude, t),
        }
    }
}

pub struct OrbWidget {
    frame: OrbFrame,
}

impl Widget for OrbWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Canvas::default()
            .block(ratatui::widgets::Block::default())
            .marker(Marker::Braille)
            .x_bounds([-CANVAS_X_BOUND / 2.0, CANVAS_X_BOUND / 2.0])
            .y_bounds([-CANVAS_Y_BOUND / 2.0, CANVAS_Y_BOUND / 2.0])
            .paint(|ctx| match self.frame {
                OrbFrame::Speaking {
                    radius,
                    glow_radius,
                    glow_alpha,
                    ring_radius,
                } => {
                    draw_disc(ctx, radius, COLOR_ORB);
                    draw_circle(ctx, glow_radius, faded(glow_alpha));
                    draw_circle(ctx, ring_radius, faded(0.3));
                }
                OrbFrame::Idle {
                    radius,
                    ripple_radius,
                    ripple_alpha,
                } => {
                    draw_disc(ctx, radius, COLOR_ORB);
                    if ripple_alpha > 0.0 {
                        draw_circle(ctx, ripple_radius, faded(ripple_alpha));
                    }
                }
            })
            .render(area, buf);
    }
}

// --- 辅助绘图函数 ---

// 终端没有真正的 alpha 通道，用降低亮度来近似
fn faded(alpha: f64) -> Color {
    let a = alpha.clamp(0.0, 1.0);
    Color::Rgb(
        (14.0 * a) as u8,
        (165.0 * a) as u8,
        (233.0 * a) as u8,
    )
}

// 通用圆绘制（32边形拟合）
fn draw_circle(ctx: &mut Context, r: f64, color: Color) {
    let segments = 32;
    let mut points = Vec::with_capacity(segments + 1);
    for i in 0..=segments {
        let theta = (i as f64 / segments as f64) * std::f64::consts::PI * 2.0;
        points.push((r * theta.cos(), r * theta.sin()));
    }
    for i in 0..segments {
        ctx.draw(&Line {
            x1: points[i].0,
            y1: points[i].1,
            x2: points[i + 1].0,
            y2: points[i + 1].1,
            color,
        });
    }
}

// 实心圆：逐行扫描填充
fn draw_disc(ctx: &mut Context, r: f64, color: Color) {
    let steps = (r * 2.0).ceil() as i32;
    for i in 0..=steps {
        let y = -r + i as f64;
        let half = (r * r - y * y).max(0.0).sqrt();
        ctx.draw(&Line {
            x1: -half,
            y1: y,
            x2: half,
            y2: y,
            color,
        });
    }
}
