// Cropped chart snapshots with a branded footer

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use shared::utils::file_stamp;

use super::surface::{ScreenPoint, Viewport};
use crate::error::EngineError;

/// Selections smaller than this on either side are treated as accidental taps.
pub const MIN_SELECTION_SIZE: f64 = 10.0;

const FOOTER_BACKGROUND: [u8; 4] = [19, 23, 34, 255];
const FOOTER_PADDING: f64 = 8.0;

/// RGBA pixels, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Raster {
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self { width, height, pixels }
    }

    pub fn from_rgba(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, EngineError> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(EngineError::SnapshotError(format!(
                "Raster {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                pixels.len()
            )));
        }
        Ok(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        Some([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2], self.pixels[i + 3]])
    }

    fn row(&self, y: u32, x: u32, width: u32) -> &[u8] {
        let start = (y as usize * self.width as usize + x as usize) * 4;
        &self.pixels[start..start + width as usize * 4]
    }

    /// Sub-image; the caller keeps the region inside the raster.
    fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Raster {
        let mut pixels = Vec::with_capacity(width as usize * height as usize * 4);
        for row in y..y + height {
            pixels.extend_from_slice(self.row(row, x, width));
        }
        Raster { width, height, pixels }
    }

    fn append_rows(&mut self, height: u32, rgba: [u8; 4]) {
        let extra = Raster::filled(self.width, height, rgba);
        self.pixels.extend(extra.pixels);
        self.height += height;
    }

    /// Binary PPM (P6). Alpha is dropped.
    pub fn to_ppm(&self) -> Vec<u8> {
        let mut out = format!("P6\n{} {}\n255\n", self.width, self.height).into_bytes();
        out.reserve(self.width as usize * self.height as usize * 3);
        for px in self.pixels.chunks_exact(4) {
            out.extend_from_slice(&px[..3]);
        }
        out
    }
}

/// A drag rectangle in logical pane pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectionRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl SelectionRect {
    /// Rectangle spanned by two drag corners, in any order.
    pub fn from_corners(a: ScreenPoint, b: ScreenPoint) -> Self {
        SelectionRect {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn is_accidental(&self) -> bool {
        self.width < MIN_SELECTION_SIZE || self.height < MIN_SELECTION_SIZE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelAnchor {
    Left,
    Center,
    Right,
}

/// Footer text, positioned in raster pixels. The host draws the glyphs.
#[derive(Debug, Clone, PartialEq)]
pub struct FooterLabel {
    pub text: String,
    pub anchor: LabelAnchor,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub image: Raster,
    pub labels: Vec<FooterLabel>,
    pub symbol: String,
    pub timeframe: String,
}

impl Snapshot {
    pub fn file_name(&self, at: DateTime<Utc>) -> String {
        format!("{}_{}_{}.ppm", self.symbol, self.timeframe, file_stamp(at))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotOutcome {
    Copied,
    Downloaded(PathBuf),
}

pub trait FrameGrabber {
    fn grab(&self) -> Result<Raster, EngineError>;
}

pub trait ClipboardSink {
    fn write_image(&mut self, snapshot: &Snapshot) -> Result<(), EngineError>;
}

pub trait DownloadSink {
    fn save(&mut self, file_name: &str, snapshot: &Snapshot) -> Result<PathBuf, EngineError>;
}

/// Clipboard for hosts without one; every write is refused.
#[derive(Debug, Default)]
pub struct NoClipboard;

impl ClipboardSink for NoClipboard {
    fn write_image(&mut self, _snapshot: &Snapshot) -> Result<(), EngineError> {
        Err(EngineError::SnapshotError("No clipboard available".to_string()))
    }
}

/// Saves snapshots as PPM files under one directory.
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
}

impl DirectoryDownloads {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DownloadSink for DirectoryDownloads {
    fn save(&mut self, file_name: &str, snapshot: &Snapshot) -> Result<PathBuf, EngineError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        let mut file = fs::File::create(&path)?;
        file.write_all(&snapshot.image.to_ppm())?;
        Ok(path)
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotExporter {
    watermark: String,
    footer_height: f64,
    drag_start: Option<ScreenPoint>,
    drag_current: Option<ScreenPoint>,
    selecting: bool,
}

impl SnapshotExporter {
    pub fn new(watermark: &str, footer_height: f64) -> Self {
        Self {
            watermark: watermark.to_string(),
            footer_height,
            drag_start: None,
            drag_current: None,
            selecting: false,
        }
    }

    pub fn is_selecting(&self) -> bool {
        self.selecting
    }

    pub fn start(&mut self) {
        self.selecting = true;
        self.drag_start = None;
        self.drag_current = None;
    }

    pub fn cancel(&mut self) {
        self.selecting = false;
        self.drag_start = None;
        self.drag_current = None;
    }

    pub fn drag(&mut self, point: ScreenPoint) {
        if !self.selecting {
            return;
        }
        if self.drag_start.is_none() {
            self.drag_start = Some(point);
        }
        self.drag_current = Some(point);
    }

    /// Rectangle covered by the drag so far.
    pub fn selection(&self) -> Option<SelectionRect> {
        Some(SelectionRect::from_corners(self.drag_start?, self.drag_current?))
    }

    /// Crops `frame` to `rect` and appends the footer. `None` for accidental or off-pane selections.
    pub fn compose(
        &self,
        frame: &Raster,
        logical: Viewport,
        rect: SelectionRect,
        symbol: &str,
        timeframe: &str,
    ) -> Option<Snapshot> {
        if rect.is_accidental() || logical.width <= 0.0 || logical.height <= 0.0 {
            tracing::debug!(width = rect.width, height = rect.height, "Snapshot selection ignored");
            return None;
        }
        let ratio_x = frame.width() as f64 / logical.width;
        let ratio_y = frame.height() as f64 / logical.height;

        let left = (rect.x * ratio_x).round().clamp(0.0, frame.width() as f64) as u32;
        let top = (rect.y * ratio_y).round().clamp(0.0, frame.height() as f64) as u32;
        let right = ((rect.x + rect.width) * ratio_x).round().clamp(0.0, frame.width() as f64) as u32;
        let bottom = ((rect.y + rect.height) * ratio_y).round().clamp(0.0, frame.height() as f64) as u32;
        if right <= left || bottom <= top {
            return None;
        }

        let mut image = frame.crop(left, top, right - left, bottom - top);
        let crop_height = image.height() as f64;
        let footer = (self.footer_height * ratio_y).round().max(1.0) as u32;
        image.append_rows(footer, FOOTER_BACKGROUND);

        let baseline = crop_height + footer as f64 / 2.0;
        let padding = FOOTER_PADDING * ratio_x;
        let width = image.width() as f64;
        let labels = vec![
            FooterLabel { text: symbol.to_string(), anchor: LabelAnchor::Left, x: padding, y: baseline },
            FooterLabel { text: timeframe.to_string(), anchor: LabelAnchor::Center, x: width / 2.0, y: baseline },
            FooterLabel { text: self.watermark.clone(), anchor: LabelAnchor::Right, x: width - padding, y: baseline },
        ];

        Some(Snapshot {
            image,
            labels,
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        })
    }

    /// Clipboard first, download on any clipboard failure.
    pub fn deliver(
        &self,
        snapshot: &Snapshot,
        clipboard: &mut dyn ClipboardSink,
        downloads: &mut dyn DownloadSink,
        at: DateTime<Utc>,
    ) -> Result<SnapshotOutcome, EngineError> {
        match clipboard.write_image(snapshot) {
            Ok(()) => {
                tracing::info!(symbol = %snapshot.symbol, timeframe = %snapshot.timeframe, "Snapshot copied to clipboard");
                Ok(SnapshotOutcome::Copied)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Clipboard write failed, downloading snapshot instead");
                let path = downloads.save(&snapshot.file_name(at), snapshot)?;
                tracing::info!(path = %path.display(), "Snapshot downloaded");
                Ok(SnapshotOutcome::Downloaded(path))
            }
        }
    }

    /// Ends the drag and exports the selection. `Ok(None)` when nothing was exported.
    #[allow(clippy::too_many_arguments)]
    pub fn finish(
        &mut self,
        rect: SelectionRect,
        grabber: &dyn FrameGrabber,
        logical: Viewport,
        symbol: &str,
        timeframe: &str,
        clipboard: &mut dyn ClipboardSink,
        downloads: &mut dyn DownloadSink,
    ) -> Result<Option<SnapshotOutcome>, EngineError> {
        self.cancel();
        if rect.is_accidental() {
            tracing::debug!(width = rect.width, height = rect.height, "Snapshot selection too small");
            return Ok(None);
        }
        let frame = grabber.grab()?;
        let Some(snapshot) = self.compose(&frame, logical, rect, symbol, timeframe) else {
            return Ok(None);
        };
        self.deliver(&snapshot, clipboard, downloads, Utc::now()).map(Some)
    }
}
