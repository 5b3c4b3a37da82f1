//! Single-page A4 report drawn with `printpdf` and the built-in fonts.

use microgrid_client::domain::KpiField;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};

use super::{format_value, RenderError, ReportMetadata, NO_DATA_MESSAGE};

const PAGE_WIDTH: Mm = Mm(210.0);
const PAGE_HEIGHT: Mm = Mm(297.0);
const MARGIN_MM: f32 = 20.0;
/// Baseline advance per line, about 16pt.
const LEADING_MM: f32 = 5.6;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Line {
    Title(String),
    Heading(String),
    Text(String),
    Blank,
}

impl Line {
    fn size(&self) -> f32 {
        match self {
            Line::Title(_) => 18.0,
            Line::Heading(_) => 13.0,
            Line::Text(_) | Line::Blank => 10.0,
        }
    }

    /// Lines the entry occupies, titles take an extra one below.
    fn advance(&self) -> f32 {
        match self {
            Line::Title(_) => 2.0,
            _ => 1.0,
        }
    }
}

/// Page content, top to bottom.
pub(super) fn layout(rows: Option<&[KpiField]>, meta: &ReportMetadata) -> Vec<Line> {
    let mut lines = vec![
        Line::Title(meta.name.clone()),
        Line::Text(format!("Period: {}", meta.period())),
        Line::Text(format!("Generated: {}", meta.generated())),
        Line::Blank,
        Line::Heading("Key Performance Indicators".to_string()),
        Line::Blank,
    ];

    match rows {
        Some(rows) => {
            lines.push(Line::Text(format!("{:<28}{:>14}  {}", "KPI", "Value", "Unit")));
            for field in rows {
                lines.push(Line::Text(format!(
                    "{:<28}{:>14}  {}",
                    field.name,
                    format_value(field),
                    field.unit.symbol()
                )));
            }
        }
        None => lines.push(Line::Text(NO_DATA_MESSAGE.to_string())),
    }

    lines
}

pub(super) fn render(rows: Option<&[KpiField]>, meta: &ReportMetadata) -> Result<Vec<u8>, RenderError> {
    let (doc, page, layer) = PdfDocument::new(meta.name.as_str(), PAGE_WIDTH, PAGE_HEIGHT, "report");
    let layer = doc.get_page(page).get_layer(layer);

    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| RenderError::Encoding(e.to_string()))?;
    let mono = doc
        .add_builtin_font(BuiltinFont::Courier)
        .map_err(|e| RenderError::Encoding(e.to_string()))?;

    draw(&layer, &layout(rows, meta), &bold, &mono);

    doc.save_to_bytes().map_err(|e| RenderError::Encoding(e.to_string()))
}

fn draw(layer: &PdfLayerReference, lines: &[Line], bold: &IndirectFontRef, mono: &IndirectFontRef) {
    let mut y = PAGE_HEIGHT.0 - MARGIN_MM;
    for line in lines {
        match line {
            Line::Title(text) | Line::Heading(text) => {
                layer.use_text(text.as_str(), line.size(), Mm(MARGIN_MM), Mm(y), bold);
            }
            Line::Text(text) => {
                layer.use_text(text.as_str(), line.size(), Mm(MARGIN_MM), Mm(y), mono);
            }
            Line::Blank => {}
        }
        y -= LEADING_MM * line.advance();
    }
}
