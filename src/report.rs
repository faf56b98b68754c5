//! PDF complaint report.
//!
//! A US-letter page with the report title, a two-column table (label,
//! value) and a footer line under the table. Long values wrap inside their
//! cell; a row that does not fit continues on the next page. The built-in
//! Helvetica faces only cover Latin-1, so other characters render as `?`.

use anyhow::Result;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use cyberguard_core::models::{format_timestamp, ComplaintRecord};
use cyberguard_core::questions::fields;

pub const REPORT_TITLE: &str = "CYBER CRIME COMPLAINT REPORT";
pub const REPORT_FOOTER: &str = "This is an auto-generated document from CyberGuard AI Portal";

const NOT_AVAILABLE: &str = "N/A";

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const LABEL_WIDTH: f32 = 150.0;
const VALUE_WIDTH: f32 = 400.0;
const PADDING: f32 = 6.0;
const TITLE_SIZE: f32 = 18.0;
const FOOTER_SIZE: f32 = 10.0;

/// Font size of the first (header-styled) row and of the others.
const HEAD_SIZE: f32 = 14.0;
const BODY_SIZE: f32 = 12.0;

/// Label/value pairs in report order.
pub fn report_rows(record: &ComplaintRecord) -> Vec<(&'static str, String)> {
    let text = |field: &str| record.field(field).to_string();
    let flag = |field: &str| match record.field(field) {
        "" => NOT_AVAILABLE.to_string(),
        value => value.to_string(),
    };

    vec![
        ("Ticket Number", record.ticket_id.to_string()),
        ("Date Filed", format_timestamp(&record.filed_at)),
        ("Name and Phone", text(fields::NAME_PHONE)),
        ("Email Address", text(fields::EMAIL)),
        ("Incident Date", text(fields::INCIDENT_DATE)),
        (
            "Threat/Harassment to Women/Children",
            flag(fields::THREAT_HARASS_WOMEN_CHILDREN),
        ),
        ("Financial Scam", flag(fields::FINANCIAL_SCAM)),
        ("Malware/Ransomware", flag(fields::MALWARE_RANSOMWARE)),
        ("Illegal Trafficking", flag(fields::ILLEGAL_TRAFFICKING)),
        ("Incident Description", text(fields::INCIDENT_DESCRIPTION)),
        ("Evidence Description", text(fields::EVIDENCE)),
        ("Category", record.category.to_string()),
        (
            "Category Explanation",
            match record.explanation.trim() {
                "" => NOT_AVAILABLE.to_string(),
                e => e.to_string(),
            },
        ),
        ("Status", record.status.to_string()),
    ]
}

/// Render the report for `record` as PDF bytes.
pub fn render_complaint_pdf(record: &ComplaintRecord) -> Result<Vec<u8>> {
    let mut layout = Layout::new();
    layout.title(REPORT_TITLE);

    for (i, (label, value)) in report_rows(record).iter().enumerate() {
        let style = if i == 0 { RowStyle::Head } else { RowStyle::Body };
        layout.row(label, value, style);
    }
    layout.footer(REPORT_FOOTER);

    write_document(layout.finish())
}

#[derive(Clone, Copy)]
enum RowStyle {
    Head,
    Body,
}

impl RowStyle {
    fn font(self) -> &'static str {
        match self {
            RowStyle::Head => "F2",
            RowStyle::Body => "F1",
        }
    }

    fn size(self) -> f32 {
        match self {
            RowStyle::Head => HEAD_SIZE,
            RowStyle::Body => BODY_SIZE,
        }
    }
}

/// Greedy word wrap for Helvetica at `size` within `width` points.
///
/// Uses an average glyph width of half the font size; words longer than a
/// line are split.
fn wrap(text: &str, width: f32, size: f32) -> Vec<String> {
    let max_chars = ((width / (size * 0.5)).floor() as usize).max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();
            while word.len() > max_chars {
                if !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                }
                lines.push(word.drain(..max_chars).collect());
            }
            let word: String = word.into_iter().collect();
            let needed = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
            if needed > max_chars && !line.is_empty() {
                lines.push(std::mem::take(&mut line));
            }
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word);
        }
        lines.push(line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

/// Latin-1 bytes for a Type1 standard font; anything else becomes `?`.
fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

fn text_op(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(encode_latin1(text))]),
        Operation::new("ET", vec![]),
    ]
}

fn rect_op(x: f32, y: f32, w: f32, h: f32, paint: &str) -> Vec<Operation> {
    vec![
        Operation::new("re", vec![x.into(), y.into(), w.into(), h.into()]),
        Operation::new(paint, vec![]),
    ]
}

fn gray(op: &str, level: f32) -> Operation {
    Operation::new(op, vec![level.into()])
}

/// Page-by-page content builder. `cursor` is the top of the next row.
struct Layout {
    pages: Vec<Vec<Operation>>,
    cursor: f32,
    left: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            cursor: PAGE_HEIGHT - MARGIN,
            left: (PAGE_WIDTH - LABEL_WIDTH - VALUE_WIDTH) / 2.0,
        }
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        // `pages` always holds at least one page
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    fn new_page(&mut self) {
        self.pages.push(Vec::new());
        self.cursor = PAGE_HEIGHT - MARGIN;
    }

    fn title(&mut self, title: &str) {
        let width = title.chars().count() as f32 * TITLE_SIZE * 0.6;
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        let y = self.cursor - TITLE_SIZE;
        let ops = text_op("F2", TITLE_SIZE, x, y, title);
        self.ops().extend(ops);
        self.cursor = y - 2.0 * TITLE_SIZE;
    }

    fn row(&mut self, label: &str, value: &str, style: RowStyle) {
        let size = style.size();
        let leading = size * 1.2;
        let mut label_lines = wrap(label, LABEL_WIDTH - 2.0 * PADDING, size);
        let mut values = wrap(value, VALUE_WIDTH - 2.0 * PADDING, size)
            .into_iter()
            .peekable();

        loop {
            let room = self.cursor - MARGIN - 2.0 * PADDING;
            let fit = (room / leading).floor().max(0.0) as usize;
            if fit == 0 {
                self.new_page();
                continue;
            }

            let label_part: Vec<String> = label_lines.drain(..fit.min(label_lines.len())).collect();
            let value_part: Vec<String> = values.by_ref().take(fit).collect();
            let lines = label_part.len().max(value_part.len()).max(1);
            self.cell_block(&label_part, &value_part, lines, style);

            if label_lines.is_empty() && values.peek().is_none() {
                break;
            }
            self.new_page();
        }
    }

    fn cell_block(&mut self, labels: &[String], values: &[String], lines: usize, style: RowStyle) {
        let size = style.size();
        let leading = size * 1.2;
        let height = lines as f32 * leading + 2.0 * PADDING;
        let top = self.cursor;
        let bottom = top - height;
        let left = self.left;
        let split = left + LABEL_WIDTH;

        let mut ops = Vec::new();
        if let RowStyle::Head = style {
            ops.push(gray("g", 0.5));
            ops.extend(rect_op(left, bottom, LABEL_WIDTH + VALUE_WIDTH, height, "f"));
            // whitesmoke text on grey
            ops.push(gray("g", 0.96));
        } else {
            ops.push(gray("g", 0.0));
        }

        for (i, line) in labels.iter().enumerate() {
            let y = top - PADDING - size - i as f32 * leading;
            ops.extend(text_op(style.font(), size, left + PADDING, y, line));
        }
        for (i, line) in values.iter().enumerate() {
            let y = top - PADDING - size - i as f32 * leading;
            ops.extend(text_op(style.font(), size, split + PADDING, y, line));
        }

        ops.push(gray("G", 0.0));
        ops.push(Operation::new("w", vec![1.0f32.into()]));
        ops.extend(rect_op(left, bottom, LABEL_WIDTH, height, "S"));
        ops.extend(rect_op(split, bottom, VALUE_WIDTH, height, "S"));
        ops.push(gray("g", 0.0));

        self.ops().extend(ops);
        self.cursor = bottom;
    }

    fn footer(&mut self, footer: &str) {
        if self.cursor - MARGIN < 2.0 * FOOTER_SIZE + 12.0 {
            self.new_page();
        }
        let width = footer.chars().count() as f32 * FOOTER_SIZE * 0.5;
        let x = ((PAGE_WIDTH - width) / 2.0).max(MARGIN);
        let y = self.cursor - 12.0 - FOOTER_SIZE;
        let mut ops = vec![gray("g", 0.5)];
        ops.extend(text_op("F1", FOOTER_SIZE, x, y, footer));
        ops.push(gray("g", 0.0));
        self.ops().extend(ops);
        self.cursor = y;
    }

    fn finish(self) -> Vec<Vec<Operation>> {
        self.pages
    }
}

fn write_document(pages: Vec<Vec<Operation>>) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let regular = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular,
            "F2" => bold,
        },
    });

    let mut kids: Vec<ObjectId> = Vec::with_capacity(pages.len());
    for operations in pages {
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        kids.push(doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        }));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids.into_iter().map(Object::Reference).collect::<Vec<_>>(),
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![Object::from(0i64), 0i64.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}
