//! Report document to PDF, drawn with printpdf page operations.
//!
//! Layout (A4 portrait, coordinates in mm from the bottom-left corner):
//! - cover: client logo, campaign title, period, client name and handle, agency logo
//! - one grid page per batch: 3×3 cells from `full_grid`, images fitted and centered,
//!   grey placeholder when a slot has no image, a "Vídeo" badge on video slots
//! - one or more detail pages per batch: each post of `rows` with date, network, format,
//!   caption and briefing, continuing on a new page when the current one is full
//! - footer on every page: client and agency handles
//!
//! Text uses the built-in Helvetica family (WinAnsi), which covers Portuguese accents.
//! An image that cannot be read or decoded is logged and drawn as a placeholder.

use printpdf::{
    BuiltinFont, Color, LinePoint, Mm, Op, PaintMode, PdfDocument, PdfPage, PdfSaveOptions,
    PdfWarnMsg, Point, Polygon, PolygonRing, Pt, RawImage, Rgb, TextItem, WindingOrder,
    XObjectId, XObjectTransform,
};
use std::path::Path;
use tracing::{debug, warn};

use crate::contract::{PdfRenderer, RenderError};
use crate::grid::{GridPage, ROW_SIZE};
use crate::report::{GridSlot, ReportDocument};

const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN: f32 = 18.0;
const CELL: f32 = 56.0;
const GAP: f32 = 4.0;
const GRID_TOP: f32 = 252.0;
const FOOTER_Y: f32 = 10.0;
const WRAP_CHARS: usize = 95;

const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const WHITE: (f32, f32, f32) = (1.0, 1.0, 1.0);
const GREY: (f32, f32, f32) = (0.35, 0.35, 0.35);
const PLACEHOLDER: (f32, f32, f32) = (0.93, 0.93, 0.93);

#[derive(Debug, Default, Clone, Copy)]
pub struct PrintPdfRenderer;

impl PdfRenderer for PrintPdfRenderer {
    fn render(&self, document: &ReportDocument) -> Result<Vec<u8>, RenderError> {
        let mut pdf = PdfDocument::new(&document.campaign_title);
        let mut warnings = Vec::new();

        let mut pages = vec![cover_page(&mut pdf, document, &mut warnings)];
        for page in &document.pages {
            pages.push(grid_page(&mut pdf, document, page, &mut warnings));
            pages.extend(detail_pages(document, page));
        }
        let page_count = pages.len();

        let bytes = pdf
            .with_pages(pages)
            .save(&PdfSaveOptions::default(), &mut warnings);
        if bytes.is_empty() {
            return Err(RenderError::Layout("printpdf produced no output".into()));
        }
        debug!(
            pages = page_count,
            bytes = bytes.len(),
            warnings = warnings.len(),
            "[PDF] Document rendered"
        );
        Ok(bytes)
    }
}

/// An image registered in the document, with its pixel size.
struct Embedded {
    id: XObjectId,
    width: usize,
    height: usize,
}

fn embed(pdf: &mut PdfDocument, path: &Path, warnings: &mut Vec<PdfWarnMsg>) -> Option<Embedded> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "[PDF] Image skipped");
            return None;
        }
    };
    match RawImage::decode_from_bytes(&bytes, warnings) {
        Ok(raw) if raw.width > 0 && raw.height > 0 => Some(Embedded {
            id: pdf.add_image(&raw),
            width: raw.width,
            height: raw.height,
        }),
        Ok(_) => {
            warn!(path = %path.display(), "[PDF] Image has no pixels");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "[PDF] Image not decodable");
            None
        }
    }
}

/// Operations of one page, positioned in mm.
#[derive(Default)]
struct Canvas {
    ops: Vec<Op>,
}

impl Canvas {
    fn text(&mut self, x: f32, y: f32, size: f32, font: BuiltinFont, color: (f32, f32, f32), text: &str) {
        if text.is_empty() {
            return;
        }
        self.ops.extend([
            Op::SetFillColor { col: rgb(color) },
            Op::StartTextSection,
            Op::SetFontSizeBuiltinFont {
                size: Pt(size),
                font,
            },
            Op::SetTextCursor {
                pos: Point::new(Mm(x), Mm(y)),
            },
            Op::WriteTextBuiltinFont {
                items: vec![TextItem::Text(text.to_string())],
                font,
            },
            Op::EndTextSection,
        ]);
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: (f32, f32, f32)) {
        let corner = |cx: f32, cy: f32| LinePoint {
            p: Point::new(Mm(cx), Mm(cy)),
            bezier: false,
        };
        self.ops.push(Op::SetFillColor { col: rgb(color) });
        self.ops.push(Op::DrawPolygon {
            polygon: Polygon {
                rings: vec![PolygonRing {
                    points: vec![
                        corner(x, y),
                        corner(x + w, y),
                        corner(x + w, y + h),
                        corner(x, y + h),
                    ],
                }],
                mode: PaintMode::Fill,
                winding_order: WindingOrder::NonZero,
            },
        });
    }

    /// Fits the image into the box keeping its aspect ratio, centered.
    fn image(&mut self, image: &Embedded, x: f32, y: f32, w: f32, h: f32) {
        let box_w = Pt::from(Mm(w)).0;
        let box_h = Pt::from(Mm(h)).0;
        // At 72 dpi one pixel is one point.
        let scale = (box_w / image.width as f32).min(box_h / image.height as f32);
        let drawn_w = image.width as f32 * scale;
        let drawn_h = image.height as f32 * scale;
        self.ops.push(Op::UseXobject {
            id: image.id.clone(),
            transform: XObjectTransform {
                translate_x: Some(Pt(Pt::from(Mm(x)).0 + (box_w - drawn_w) / 2.0)),
                translate_y: Some(Pt(Pt::from(Mm(y)).0 + (box_h - drawn_h) / 2.0)),
                rotate: None,
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(72.0),
            },
        });
    }

    fn footer(&mut self, document: &ReportDocument) {
        let line = format!("{} · {}", document.client_handle, document.agency_handle);
        self.text(MARGIN, FOOTER_Y, 8.0, BuiltinFont::Helvetica, GREY, &line);
    }

    fn finish(self) -> PdfPage {
        PdfPage::new(Mm(PAGE_W), Mm(PAGE_H), self.ops)
    }
}

fn rgb((r, g, b): (f32, f32, f32)) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

fn cover_page(
    pdf: &mut PdfDocument,
    document: &ReportDocument,
    warnings: &mut Vec<PdfWarnMsg>,
) -> PdfPage {
    let mut canvas = Canvas::default();
    if let Some(logo) = document.client_logo.as_deref().and_then(|p| embed(pdf, p, warnings)) {
        canvas.image(&logo, MARGIN, 215.0, 60.0, 60.0);
    }
    canvas.text(MARGIN, 190.0, 26.0, BuiltinFont::HelveticaBold, BLACK, &document.campaign_title);
    canvas.text(MARGIN, 178.0, 16.0, BuiltinFont::Helvetica, BLACK, &document.period);
    canvas.text(MARGIN, 164.0, 13.0, BuiltinFont::Helvetica, BLACK, &document.client_name);
    canvas.text(MARGIN, 156.0, 12.0, BuiltinFont::Helvetica, GREY, &document.client_handle);
    if let Some(logo) = document.agency_logo.as_deref().and_then(|p| embed(pdf, p, warnings)) {
        canvas.image(&logo, MARGIN, 40.0, 40.0, 40.0);
    }
    canvas.footer(document);
    canvas.finish()
}

/// Bottom-left corner of grid cell `index` (row-major).
fn cell_origin(index: usize) -> (f32, f32) {
    let left = (PAGE_W - (ROW_SIZE as f32 * CELL + (ROW_SIZE as f32 - 1.0) * GAP)) / 2.0;
    let row = (index / ROW_SIZE) as f32;
    let col = (index % ROW_SIZE) as f32;
    (left + col * (CELL + GAP), GRID_TOP - row * (CELL + GAP) - CELL)
}

fn grid_page(
    pdf: &mut PdfDocument,
    document: &ReportDocument,
    page: &GridPage<GridSlot>,
    warnings: &mut Vec<PdfWarnMsg>,
) -> PdfPage {
    let mut canvas = Canvas::default();
    canvas.text(MARGIN, PAGE_H - MARGIN - 6.0, 18.0, BuiltinFont::HelveticaBold, BLACK, &page.title);

    for (index, slot) in page.full_grid.iter().enumerate() {
        let (x, y) = cell_origin(index);
        match slot.image.as_deref().and_then(|p| embed(pdf, p, warnings)) {
            Some(image) => canvas.image(&image, x, y, CELL, CELL),
            None => canvas.rect(x, y, CELL, CELL, PLACEHOLDER),
        }
        if slot.is_video {
            canvas.rect(x + 2.0, y + 2.0, 14.0, 5.5, BLACK);
            canvas.text(x + 3.5, y + 3.6, 8.0, BuiltinFont::HelveticaBold, WHITE, "Vídeo");
        }
    }
    canvas.footer(document);
    canvas.finish()
}

/// Greedy word wrap on whitespace; words longer than `width` are split.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > width {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..width).collect());
            }
            let word: String = word.into_iter().collect();
            if word.is_empty() {
                continue;
            }
            let needed = if line.is_empty() { 0 } else { 1 } + word.chars().count();
            if !line.is_empty() && line.chars().count() + needed > width {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines
}

struct Line {
    text: String,
    size: f32,
    font: BuiltinFont,
    color: (f32, f32, f32),
}

fn detail_lines(slot: &GridSlot) -> Vec<Line> {
    let post = &slot.post;
    let mut lines = vec![
        Line {
            text: post.title.clone(),
            size: 11.0,
            font: BuiltinFont::HelveticaBold,
            color: BLACK,
        },
        Line {
            text: format!(
                "{} · {} · {}",
                post.publish_at.format("%d/%m/%Y %H:%M"),
                post.network.label(),
                post.format.label()
            ),
            size: 9.0,
            font: BuiltinFont::Helvetica,
            color: GREY,
        },
    ];
    for text in wrap_text(&post.caption, WRAP_CHARS) {
        lines.push(Line {
            text,
            size: 9.0,
            font: BuiltinFont::Helvetica,
            color: BLACK,
        });
    }
    for text in wrap_text(&post.briefing, WRAP_CHARS) {
        lines.push(Line {
            text,
            size: 9.0,
            font: BuiltinFont::HelveticaOblique,
            color: GREY,
        });
    }
    lines
}

fn detail_pages(document: &ReportDocument, page: &GridPage<GridSlot>) -> Vec<PdfPage> {
    let top = PAGE_H - MARGIN - 6.0;
    let start = |canvas: &mut Canvas| {
        canvas.text(MARGIN, top, 18.0, BuiltinFont::HelveticaBold, BLACK, &page.title);
        top - 12.0
    };

    let mut pages = Vec::new();
    let mut canvas = Canvas::default();
    let mut y = start(&mut canvas);
    for slot in page.rows.iter().flatten() {
        for line in detail_lines(slot) {
            let height = line.size * 0.45;
            if y - height < MARGIN {
                canvas.footer(document);
                pages.push(std::mem::take(&mut canvas).finish());
                y = start(&mut canvas);
            }
            y -= height;
            canvas.text(MARGIN, y, line.size, line.font, line.color, &line.text);
        }
        y -= 4.0;
    }
    canvas.footer(document);
    pages.push(canvas.finish());
    pages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::paginate;
    use crate::models::{Network, Post, PostFormat};
    use crate::normalize::normalize_bytes;
    use chrono::{TimeZone, Utc};
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn jpeg(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, image::Rgb([200, 40, 90])));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        normalize_bytes(&png, 550, 70).unwrap()
    }

    fn slot(id: u64, image: Option<PathBuf>, is_video: bool) -> GridSlot {
        GridSlot {
            post: Post {
                id,
                campaign_id: 1,
                title: format!("Post {id}"),
                publish_at: Utc.with_ymd_and_hms(2025, 3, id as u32, 10, 0, 0).unwrap(),
                network: Network::Feed,
                format: PostFormat::Static,
                caption: "Pão quentinho às 7h. ".repeat(20),
                briefing: "Foto da vitrine".into(),
                trashed: false,
                trashed_at: None,
                dropbox_path: None,
                sync_pending: false,
            },
            image,
            is_video,
        }
    }

    fn document(slots: Vec<GridSlot>) -> ReportDocument {
        ReportDocument {
            campaign_title: "Março Café".into(),
            period: "03/2025".into(),
            client_name: "Padaria São João".into(),
            client_handle: "@padaria.sj".into(),
            agency_handle: "Agência Luz".into(),
            client_logo: None,
            agency_logo: None,
            pages: paginate(&slots, "Março Café"),
        }
    }

    fn contains(haystack: &[u8], needle: &[u8]) -> bool {
        haystack.windows(needle.len()).any(|w| w == needle)
    }

    #[test]
    fn grid_image_is_embedded_as_xobject() {
        // Markup-significant characters in the directory name.
        let dir = tempdir().unwrap();
        let folder = dir.path().join("a&b's");
        std::fs::create_dir_all(&folder).unwrap();
        let path = folder.join("thumb.jpg");
        std::fs::write(&path, jpeg(640, 480)).unwrap();

        let with_image = PrintPdfRenderer
            .render(&document(vec![slot(1, Some(path), false)]))
            .unwrap();
        assert!(with_image.starts_with(b"%PDF"));
        assert!(contains(&with_image, b"/Image"), "image XObject expected");

        let placeholder = PrintPdfRenderer
            .render(&document(vec![slot(1, None, true)]))
            .unwrap();
        assert!(!contains(&placeholder, b"/Image"));
    }

    #[test]
    fn logos_are_embedded_and_broken_images_are_skipped() {
        let dir = tempdir().unwrap();
        let logo = dir.path().join("logo.jpg");
        std::fs::write(&logo, jpeg(300, 100)).unwrap();
        let broken = dir.path().join("broken.jpg");
        std::fs::write(&broken, b"not an image").unwrap();

        let mut doc = document(vec![
            slot(1, Some(broken), false),
            slot(2, Some(dir.path().join("missing.jpg")), true),
        ]);
        doc.agency_logo = Some(logo);
        let bytes = PrintPdfRenderer.render(&doc).unwrap();
        assert!(contains(&bytes, b"/Image"));
    }

    #[test]
    fn ten_posts_render_cover_and_two_batches() {
        let slots: Vec<GridSlot> = (1..=10).map(|i| slot(i, None, false)).collect();
        let doc = document(slots);
        let bytes = PrintPdfRenderer.render(&doc).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        // Nine long captions overflow one detail page.
        assert!(detail_pages(&doc, &doc.pages[0]).len() >= 2);
        assert_eq!(detail_pages(&doc, &doc.pages[1]).len(), 1);
    }

    #[test]
    fn grid_cells_are_row_major_inside_the_page() {
        let (x0, y0) = cell_origin(0);
        let (x2, y2) = cell_origin(2);
        let (x3, y3) = cell_origin(3);
        let (x8, y8) = cell_origin(8);
        assert_eq!(y0, y2);
        assert!(x2 > x0);
        assert_eq!(x3, x0);
        assert!(y3 < y0);
        assert!(x8 + CELL <= PAGE_W && y8 >= MARGIN);
    }

    #[test]
    fn wrap_text_breaks_on_words_and_splits_long_ones() {
        assert_eq!(wrap_text("um dois tres", 7), vec!["um dois", "tres"]);
        assert_eq!(wrap_text("abcdefghij", 4), vec!["abcd", "efgh", "ij"]);
        assert_eq!(wrap_text("linha um\n\nlinha dois", 20), vec!["linha um", "linha dois"]);
        assert!(wrap_text("   ", 10).is_empty());
    }
}
