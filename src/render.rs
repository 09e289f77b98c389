use wasm_bindgen::{Clamped, JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement, ImageData};

use crate::error::ClientError;
use crate::session::Session;

// --- PALETTE ---
type Rgb = (u8, u8, u8);

const BACKGROUND: Rgb = (0x06, 0x06, 0x0c);
const GRID_LINE: Rgb = (0x0e, 0x0e, 0x18);
const REMOTE_PLAYER: Rgb = (0x50, 0xa0, 0xff);
const OWN_CHARACTER: Rgb = (0xff, 0x60, 0x60);

const LOCATION_TITLE_COLOR: &str = "#1a1030";
const REMOTE_LABEL_COLOR: &str = "#c8b89a";
const OWN_LABEL_COLOR: &str = "#fff";
const TITLE_FONT: &str = "14px sans-serif";
const LABEL_FONT: &str = "10px sans-serif";

/// Remote players are drawn slightly smaller than a cell so neighbours stay
/// distinguishable; the viewer fills the cell.
const REMOTE_INSET: i32 = 2;
const LABEL_LIFT: f64 = 4.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

/// Grid cell under a canvas-relative pixel.
pub fn cell_at(px: f64, py: f64, cell_size: u32) -> GridCell {
    let size = cell_size as f64;
    GridCell { x: (px / size).floor() as i32, y: (py / size).floor() as i32 }
}

// --- PIXEL BUFFER ---

pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32) -> PixelBuffer {
        let size = (width * height * 4) as usize;
        PixelBuffer { width, height, pixels: vec![0; size] }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Reallocates when the canvas changed size. Returns whether it did.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if width == self.width && height == self.height {
            return false;
        }
        *self = PixelBuffer::new(width, height);
        true
    }

    pub fn get(&self, x: u32, y: u32) -> Option<Rgb> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        Some((self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]))
    }

    pub fn clear(&mut self, (r, g, b): Rgb) {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&[r, g, b, 255]);
        }
    }

    pub fn rect(&mut self, x: i32, y: i32, w: i32, h: i32, (r, g, b): Rgb) {
        // Clip to buffer
        let start_x = x.max(0);
        let start_y = y.max(0);
        let end_x = x.saturating_add(w).min(self.width as i32);
        let end_y = y.saturating_add(h).min(self.height as i32);

        if start_x >= end_x || start_y >= end_y {
            return;
        }

        for iy in start_y..end_y {
            let row = (iy * self.width as i32) as usize;
            for ix in start_x..end_x {
                let idx = (row + ix as usize) * 4;
                self.pixels[idx..idx + 4].copy_from_slice(&[r, g, b, 255]);
            }
        }
    }

    /// Vertical and horizontal one-pixel lines every `spacing` pixels.
    pub fn grid(&mut self, spacing: u32, color: Rgb) {
        if spacing == 0 {
            return;
        }
        let (w, h) = (self.width as i32, self.height as i32);
        for x in (0..w).step_by(spacing as usize) {
            self.rect(x, 0, 1, h, color);
        }
        for y in (0..h).step_by(spacing as usize) {
            self.rect(0, y, w, 1, color);
        }
    }
}

// --- FRAME COMPOSITION ---

#[derive(Debug, Clone, PartialEq)]
pub struct Label {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font: &'static str,
    pub color: &'static str,
}

/// Paints one frame of `session` into `buf` and returns the text labels to
/// draw over it, in paint order.
pub fn compose(buf: &mut PixelBuffer, session: &Session, cell_size: u32) -> Vec<Label> {
    let mut labels = Vec::new();
    buf.clear(BACKGROUND);

    let Some(me) = session.character() else {
        return labels;
    };

    if let Some(loc) = session.current_location() {
        labels.push(Label {
            text: loc.name.clone(),
            x: 10.0,
            y: 20.0,
            font: TITLE_FONT,
            color: LOCATION_TITLE_COLOR,
        });
    }

    buf.grid(cell_size, GRID_LINE);

    // Positions come off the wire unchecked; far-off cells saturate and clip away.
    let cell = cell_size as i32;
    for (player, (x, y)) in session.drawable_players() {
        let (px, py) = (x.saturating_mul(cell), y.saturating_mul(cell));
        buf.rect(px, py, cell - REMOTE_INSET, cell - REMOTE_INSET, REMOTE_PLAYER);
        labels.push(name_label(&player.character_name, x, y, cell, REMOTE_LABEL_COLOR));
    }

    if let Some((x, y)) = me.position() {
        buf.rect(x.saturating_mul(cell), y.saturating_mul(cell), cell, cell, OWN_CHARACTER);
        labels.push(name_label(&me.character_name, x, y, cell, OWN_LABEL_COLOR));
    }

    labels
}

fn name_label(name: &str, x: i32, y: i32, cell: i32, color: &'static str) -> Label {
    Label {
        text: name.to_string(),
        x: f64::from(x) * f64::from(cell),
        y: f64::from(y) * f64::from(cell) - LABEL_LIFT,
        font: LABEL_FONT,
        color,
    }
}

// --- CANVAS ---

pub struct Renderer {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
    buffer: PixelBuffer,
    cell_size: u32,
}

impl Renderer {
    pub fn new(canvas: HtmlCanvasElement, cell_size: u32) -> Result<Renderer, ClientError> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| ClientError::Js("2d context unavailable".to_string()))?
            .dyn_into::<CanvasRenderingContext2d>()
            .map_err(JsValue::from)?;
        let buffer = PixelBuffer::new(canvas.width(), canvas.height());
        Ok(Renderer { canvas, ctx, buffer, cell_size })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    /// Matches the canvas backing store to the given CSS size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        self.buffer.resize(width, height);
    }

    pub fn render(&mut self, session: &Session) -> Result<(), ClientError> {
        self.buffer.resize(self.canvas.width(), self.canvas.height());
        if self.buffer.width() == 0 || self.buffer.height() == 0 {
            return Ok(());
        }
        let labels = compose(&mut self.buffer, session, self.cell_size);

        let image = ImageData::new_with_u8_clamped_array_and_sh(
            Clamped(self.buffer.pixels()),
            self.buffer.width(),
            self.buffer.height(),
        )?;
        self.ctx.put_image_data(&image, 0.0, 0.0)?;

        for label in labels {
            self.ctx.set_fill_style_str(label.color);
            self.ctx.set_font(label.font);
            self.ctx.fill_text(&label.text, label.x, label.y)?;
        }
        Ok(())
    }
}
