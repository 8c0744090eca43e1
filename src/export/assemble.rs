//! Document assembly: generated content → SVG markup blocks.
//!
//! Each heading, paragraph, code chunk and option list becomes its own SVG
//! document, sized to its content. Blocks are the unit of pagination, so
//! long paragraphs are split at blank lines and long code listings every
//! [`CODE_LINES_PER_BLOCK`] lines to keep any single block well under a page.
//!
//! Line wrapping uses an advance-width estimate (CJK glyphs count as one em,
//! everything else roughly half) because the real fonts are only known to
//! the rasteriser.

/// Width of every block's SVG viewport, in user units.
pub const VIEWPORT_WIDTH: f32 = 800.0;

/// Maximum code lines in one block.
pub const CODE_LINES_PER_BLOCK: usize = 40;

const PAD_X: f32 = 12.0;
const PAD_Y: f32 = 8.0;
const SANS: &str = "Noto Sans CJK TC, Noto Sans CJK SC, Noto Sans, DejaVu Sans, sans-serif";
const MONO: &str = "Noto Sans Mono, DejaVu Sans Mono, monospace";

use crate::export::block::ContentBlock;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// Anything that can be laid out into an exported document.
pub trait Exportable {
    /// Document title, also used for the default file name.
    fn export_title(&self) -> String;

    /// Append this item's blocks.
    fn assemble(&self, doc: &mut DocumentBuilder);
}

/// Build the full block sequence for `item`: title, rule, body.
pub fn assemble_document(item: &dyn Exportable) -> Vec<ContentBlock> {
    let mut doc = DocumentBuilder::new();
    doc.title(&item.export_title());
    doc.rule();
    item.assemble(&mut doc);
    doc.finish()
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    size: f32,
    line_height: f32,
    weight: &'static str,
    family: &'static str,
    fill: &'static str,
    mono: bool,
}

const TITLE: TextStyle = TextStyle {
    size: 30.0,
    line_height: 40.0,
    weight: "bold",
    family: SANS,
    fill: "#111111",
    mono: false,
};

const HEADING: TextStyle = TextStyle {
    size: 22.0,
    line_height: 30.0,
    weight: "bold",
    family: SANS,
    fill: "#1a3d6d",
    mono: false,
};

const BODY: TextStyle = TextStyle {
    size: 16.0,
    line_height: 24.0,
    weight: "normal",
    family: SANS,
    fill: "#222222",
    mono: false,
};

const CODE: TextStyle = TextStyle {
    size: 13.0,
    line_height: 18.0,
    weight: "normal",
    family: MONO,
    fill: "#202020",
    mono: true,
};

/// Accumulates [`ContentBlock`]s in document order.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    blocks: Vec<ContentBlock>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.push_text(text, TITLE, None);
        self
    }

    pub fn heading(&mut self, text: &str) -> &mut Self {
        self.push_text(text, HEADING, None);
        self
    }

    /// One block per blank-line-separated paragraph.
    pub fn paragraph(&mut self, text: &str) -> &mut Self {
        for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            self.push_text(para, BODY, None);
        }
        self
    }

    /// A paragraph with a label in front, e.g. "Student:".
    pub fn labelled(&mut self, label: &str, text: &str) -> &mut Self {
        let mut first = true;
        for para in text.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            if first {
                self.push_text(&format!("{label} {para}"), BODY, None);
                first = false;
            } else {
                self.push_text(para, BODY, None);
            }
        }
        if first {
            self.push_text(label, BODY, None);
        }
        self
    }

    /// Bulleted list, one block for the whole list.
    pub fn bullets<S: AsRef<str>>(&mut self, items: &[S]) -> &mut Self {
        if items.is_empty() {
            return self;
        }
        let text = items
            .iter()
            .map(|i| format!("• {}", i.as_ref().trim()))
            .collect::<Vec<_>>()
            .join("\n");
        self.push_text(&text, BODY, None);
        self
    }

    /// Monospace listing on a shaded background.
    pub fn code(&mut self, code: &str) -> &mut Self {
        let lines: Vec<&str> = code.lines().collect();
        for chunk in lines.chunks(CODE_LINES_PER_BLOCK) {
            self.push_text(&chunk.join("\n"), CODE, Some("#f3f3f3"));
        }
        self
    }

    /// A PNG bitmap, centred and shrunk to fit the viewport width.
    pub fn image(&mut self, png: &[u8], width_px: u32, height_px: u32) -> &mut Self {
        if width_px == 0 || height_px == 0 {
            return self;
        }
        let max_w = VIEWPORT_WIDTH - 2.0 * PAD_X;
        let w = (width_px as f32).min(max_w);
        let h = (height_px as f32 * w / width_px as f32).ceil();
        let x = (VIEWPORT_WIDTH - w) / 2.0;
        let total_h = h + 2.0 * PAD_Y;
        let svg = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink" width="{VIEWPORT_WIDTH}" height="{total_h}" viewBox="0 0 {VIEWPORT_WIDTH} {total_h}"><image x="{x}" y="{PAD_Y}" width="{w}" height="{h}" xlink:href="data:image/png;base64,{}"/></svg>"#,
            STANDARD.encode(png)
        );
        self.blocks.push(ContentBlock::Markup { svg });
        self
    }

    pub fn rule(&mut self) -> &mut Self {
        self.blocks.push(ContentBlock::Rule);
        self
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn finish(self) -> Vec<ContentBlock> {
        self.blocks
    }

    fn push_text(&mut self, text: &str, style: TextStyle, background: Option<&str>) {
        let max_width = VIEWPORT_WIDTH - 2.0 * PAD_X;
        let lines: Vec<String> = text
            .lines()
            .flat_map(|l| wrap_line(l, style, max_width))
            .collect();
        if lines.is_empty() {
            return;
        }
        self.blocks.push(ContentBlock::Markup {
            svg: render_svg(&lines, style, background),
        });
    }
}

fn render_svg(lines: &[String], style: TextStyle, background: Option<&str>) -> String {
    let height = (2.0 * PAD_Y + lines.len() as f32 * style.line_height).ceil();
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = VIEWPORT_WIDTH,
        h = height
    );
    if let Some(fill) = background {
        svg.push_str(&format!(
            r#"<rect x="0" y="0" width="{VIEWPORT_WIDTH}" height="{height}" rx="6" fill="{fill}"/>"#
        ));
    }
    for (i, line) in lines.iter().enumerate() {
        // Baseline sits ~80 % down the line box.
        let baseline = PAD_Y + i as f32 * style.line_height + style.line_height * 0.8;
        svg.push_str(&format!(
            r#"<text x="{PAD_X}" y="{baseline:.1}" font-family="{}" font-size="{}" font-weight="{}" fill="{}" xml:space="preserve">{}</text>"#,
            style.family,
            style.size,
            style.weight,
            style.fill,
            escape_xml(line)
        ));
    }
    svg.push_str("</svg>");
    svg
}

/// Estimated advance of `c` in ems.
fn char_advance(c: char, mono: bool) -> f32 {
    if is_wide(c) {
        1.0
    } else if mono {
        0.6
    } else if c.is_ascii_uppercase() || matches!(c, 'm' | 'w' | 'M' | 'W' | '@') {
        0.7
    } else {
        0.52
    }
}

fn is_wide(c: char) -> bool {
    matches!(c as u32,
        0x1100..=0x115F
        | 0x2E80..=0x303E
        | 0x3041..=0x33FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0xFFE0..=0xFFE6)
}

/// Greedy wrap of one source line. Breaks at spaces where possible and
/// anywhere in runs without spaces (CJK text, long identifiers).
fn wrap_line(line: &str, style: TextStyle, max_width: f32) -> Vec<String> {
    let line = line.replace('\t', "    ");
    if line.trim().is_empty() {
        return vec![String::new()];
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut width = 0.0f32;
    let mut last_space: Option<usize> = None;

    for c in line.chars() {
        let adv = char_advance(c, style.mono) * style.size;
        if width + adv > max_width && !current.is_empty() {
            match last_space {
                Some(pos) if !style.mono && pos > 0 => {
                    let rest = current[pos + 1..].to_string();
                    current.truncate(pos);
                    out.push(std::mem::take(&mut current));
                    current = rest;
                }
                _ => out.push(std::mem::take(&mut current)),
            }
            width = current
                .chars()
                .map(|ch| char_advance(ch, style.mono) * style.size)
                .sum();
            last_space = current.rfind(' ');
            if width + adv > max_width && !current.is_empty() {
                out.push(std::mem::take(&mut current));
                width = 0.0;
                last_space = None;
            }
        }
        if c == ' ' {
            last_space = Some(current.len());
        }
        current.push(c);
        width += adv;
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 => {}
            c => out.push(c),
        }
    }
    out
}
