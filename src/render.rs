//! Drawing layouts to PDF and writing them to disk.

use crate::config::CollisionPolicy;
use crate::errors::{self, Result};
use crate::fonts::SelectedFont;
use crate::report::{Align, DetailDocument, SummaryTable};
use log::{debug, info, warn};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};
use std::fs;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Turns layouts into document bytes.
pub trait Renderer {
    fn detail(&self, doc: &DetailDocument) -> Result<Vec<u8>>;
    fn summary(&self, table: &SummaryTable) -> Result<Vec<u8>>;
}

/// Render `doc` and write it to `dest`. Returns the path actually written,
/// which differs from `dest` under [CollisionPolicy::Suffix].
///
/// Any failure is a [RenderFailure](errors::RenderFailure). Directories are
/// never created here.
pub fn render_detail(
    renderer: &dyn Renderer,
    doc: &DetailDocument,
    dest: &Path,
    policy: CollisionPolicy,
) -> Result<PathBuf> {
    let bytes = renderer
        .detail(doc)
        .map_err(|e| errors::render_failure(format!("{}: {e}", dest.display())))?;
    write_document(&bytes, dest, policy)
}

/// Render `table` and write it to `dest`; see [render_detail].
pub fn render_summary(
    renderer: &dyn Renderer,
    table: &SummaryTable,
    dest: &Path,
    policy: CollisionPolicy,
) -> Result<PathBuf> {
    let bytes = renderer
        .summary(table)
        .map_err(|e| errors::render_failure(format!("{}: {e}", dest.display())))?;
    write_document(&bytes, dest, policy)
}

/// Where to write, given what is already on disk.
pub fn resolve_destination(dest: &Path, policy: CollisionPolicy) -> Result<PathBuf> {
    if !dest.exists() {
        return Ok(dest.to_owned());
    }
    match policy {
        CollisionPolicy::Replace => {
            fs::remove_file(dest).map_err(|e| {
                errors::render_failure(format!("cannot replace {}: {e}", dest.display()))
            })?;
            debug!(target: "kyuyo", "removed old {}", dest.display());
            Ok(dest.to_owned())
        }
        CollisionPolicy::Suffix => {
            let stem = dest
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ext = dest
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            let mut n = 1;
            loop {
                let candidate = dest.with_file_name(format!("{stem}_{n}{ext}"));
                if !candidate.exists() {
                    return Ok(candidate);
                }
                n += 1;
            }
        }
    }
}

fn write_document(bytes: &[u8], dest: &Path, policy: CollisionPolicy) -> Result<PathBuf> {
    let path = resolve_destination(dest, policy)?;
    fs::write(&path, bytes)
        .map_err(|e| errors::render_failure(format!("{}: {e}", path.display())))?;
    debug!(target: "kyuyo", "wrote {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}

const A4_SHORT: f32 = 210.0;
const A4_LONG: f32 = 297.0;
const MARGIN: f32 = 15.0;
const PT_TO_MM: f32 = 0.3528;

/// Factor that shrinks a table `total` mm wide into `available` mm. Tables
/// that already fit keep their size.
fn fit_scale(total: f32, available: f32) -> f32 {
    if total > available && total > 0.0 {
        available / total
    } else {
        1.0
    }
}

/// Rough advance width: half an em for ASCII, a full em for everything else.
fn text_width(text: &str, size: f32) -> f32 {
    let ems: f32 = text
        .chars()
        .map(|c| if c.is_ascii() { 0.55 } else { 1.0 })
        .sum();
    ems * size * PT_TO_MM
}

fn hline(layer: &PdfLayerReference, x1: f32, x2: f32, y: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(x1), Mm(y)), false),
            (Point::new(Mm(x2), Mm(y)), false),
        ],
        is_closed: false,
    });
}

fn vline(layer: &PdfLayerReference, x: f32, y1: f32, y2: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(x), Mm(y1)), false),
            (Point::new(Mm(x), Mm(y2)), false),
        ],
        is_closed: false,
    });
}

/// A document being drawn top to bottom, with page breaks.
struct Pages {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    font: IndirectFontRef,
    width: f32,
    height: f32,
    y: f32,
}

impl Pages {
    fn new(title: &str, width: f32, height: f32, font: &SelectedFont) -> Result<Pages> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(width), Mm(height), "Layer 1");
        let layer = doc.get_page(page).get_layer(layer);
        let font = add_font(&doc, font)?;
        Ok(Pages {
            doc,
            layer,
            font,
            width,
            height,
            y: height - MARGIN,
        })
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(self.width), Mm(self.height), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.y = self.height - MARGIN;
    }

    /// Start a new page unless `needed` millimetres are left.
    fn ensure(&mut self, needed: f32) -> bool {
        if self.y - needed < MARGIN {
            self.new_page();
            true
        } else {
            false
        }
    }

    fn text(&self, text: &str, size: f32, x: f32, y: f32) {
        self.layer.use_text(text, size, Mm(x), Mm(y), &self.font);
    }

    fn aligned(&self, text: &str, size: f32, x: f32, width: f32, y: f32, align: Align) {
        let pad = 2.0;
        let x = match align {
            Align::Left => x + pad,
            Align::Right => x + width - pad - text_width(text, size),
            Align::Center => x + (width - text_width(text, size)) / 2.0,
        };
        self.text(text, size, x, y);
    }

    fn finish(self) -> Result<Vec<u8>> {
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| errors::render_failure(format!("PDF save error: {e}")))?;
        buf.into_inner()
            .map_err(|e| errors::render_failure(format!("PDF buffer error: {e}")))
    }
}

fn add_font(doc: &PdfDocumentReference, font: &SelectedFont) -> Result<IndirectFontRef> {
    if let SelectedFont::External { data, .. } = font {
        if let Ok(f) = doc.add_external_font(data.as_slice()) {
            return Ok(f);
        }
    }
    doc.add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| errors::render_failure(format!("PDF font error: {e}")))
}

/// Renders with printpdf.
pub struct PdfRenderer {
    font: SelectedFont,
}

impl PdfRenderer {
    /// Uses `font` if the PDF library accepts it, Helvetica otherwise.
    pub fn new(font: SelectedFont) -> PdfRenderer {
        let font = match font {
            SelectedFont::External { path, data } => {
                let probe = PdfDocument::empty("probe");
                match probe.add_external_font(data.as_slice()) {
                    Ok(_) => SelectedFont::External { path, data },
                    Err(e) => {
                        warn!(
                            target: "kyuyo",
                            "font {} rejected ({e}), using built-in Helvetica",
                            path.display()
                        );
                        SelectedFont::Builtin
                    }
                }
            }
            SelectedFont::Builtin => SelectedFont::Builtin,
        };
        info!(target: "kyuyo", "documents set in {}", font.describe());
        PdfRenderer { font }
    }

    pub fn font(&self) -> &SelectedFont {
        &self.font
    }
}

const LABEL_X: f32 = 25.0;
const VALUE_X: f32 = 100.0;
const VALUE_RIGHT: f32 = 185.0;
const LINE_STEP: f32 = 8.0;
const WRAP_COLUMNS: usize = 40;

impl Renderer for PdfRenderer {
    fn detail(&self, doc: &DetailDocument) -> Result<Vec<u8>> {
        let mut pages = Pages::new(&doc.title, A4_SHORT, A4_LONG, &self.font)?;
        pages.text(&doc.title, 16.0, LABEL_X, pages.y);
        pages.y -= 12.0;
        pages.text(&doc.subtitle, 12.0, LABEL_X, pages.y);
        pages.y -= 6.0;
        hline(&pages.layer, LABEL_X, VALUE_RIGHT, pages.y);
        pages.y -= LINE_STEP;
        for line in &doc.lines {
            let wrapped = textwrap::wrap(&line.value, WRAP_COLUMNS);
            pages.ensure(LINE_STEP * wrapped.len() as f32);
            pages.text(&line.label, 10.0, LABEL_X, pages.y);
            if wrapped.len() <= 1 {
                let width = VALUE_RIGHT - VALUE_X;
                pages.aligned(&line.value, 10.0, VALUE_X, width, pages.y, Align::Right);
                pages.y -= LINE_STEP;
            } else {
                for part in &wrapped {
                    pages.text(part, 10.0, VALUE_X, pages.y);
                    pages.y -= LINE_STEP;
                }
            }
        }
        pages.finish()
    }

    fn summary(&self, table: &SummaryTable) -> Result<Vec<u8>> {
        let row_height = 8.0;
        let baseline = 5.5;
        let left = 10.0;
        let total: f32 = table.columns.iter().map(|c| c.width).sum();
        let scale = fit_scale(total, A4_LONG - 2.0 * left);
        if scale < 1.0 {
            debug!(target: "kyuyo", "{} columns scaled by {scale:.2}", table.columns.len());
        }
        let widths: Vec<f32> = table.columns.iter().map(|c| c.width * scale).collect();
        let right = left + total * scale;
        let mut pages = Pages::new(&table.title, A4_LONG, A4_SHORT, &self.font)?;
        pages.layer.set_outline_thickness(0.5);
        pages.text(&table.title, 16.0, left, pages.y);
        pages.y -= 10.0;
        pages.text(&table.subtitle, 12.0, left, pages.y);
        pages.y -= 8.0;

        let draw_row = |pages: &Pages, cells: &[String], size: f32| {
            let top = pages.y;
            let mut x = left;
            for ((cell, column), &width) in cells.iter().zip(&table.columns).zip(&widths) {
                vline(&pages.layer, x, top, top - row_height);
                pages.aligned(cell, size, x, width, top - baseline, column.align);
                x += width;
            }
            vline(&pages.layer, right, top, top - row_height);
            hline(&pages.layer, left, right, top - row_height);
        };
        let headings: Vec<String> = table.columns.iter().map(|c| c.heading.clone()).collect();
        let draw_header = |pages: &mut Pages| {
            hline(&pages.layer, left, right, pages.y);
            draw_row(&*pages, &headings, 10.0 * scale);
            pages.y -= row_height;
        };

        draw_header(&mut pages);
        for row in table.rows.iter().chain(std::iter::once(&table.totals)) {
            if pages.ensure(row_height + 10.0) {
                draw_header(&mut pages);
            }
            draw_row(&pages, row, 9.0 * scale);
            pages.y -= row_height;
        }
        if let Some(footer) = &table.footer {
            pages.text(footer, 8.0, left, MARGIN - 5.0);
        }
        pages.finish()
    }
}
