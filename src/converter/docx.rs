//! Minimal WordprocessingML (`.docx`) package writer.
//!
//! Only what the in-process modes need: text paragraphs in a fixed body
//! style, and full-page pictures each in their own section sized to the
//! source page. The package holds five kinds of part:
//!
//! ```text
//! [Content_Types].xml
//! _rels/.rels
//! word/document.xml
//! word/_rels/document.xml.rels
//! word/media/imageN.png
//! ```

use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;
use std::io::{self, Seek, Write};
use zip::result::ZipResult;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Body font for text paragraphs.
pub const BODY_FONT: &str = "宋体";
/// Latin fallback for [`BODY_FONT`].
pub const BODY_FONT_LATIN: &str = "SimSun";
/// 12pt, in half-points.
pub const BODY_SIZE_HALF_POINTS: u32 = 24;
/// 1.5 lines, in 240ths of a line.
pub const BODY_LINE_SPACING: u32 = 360;

const EMU_PER_POINT: f64 = 12_700.0;
const TWIPS_PER_POINT: f64 = 20.0;
/// Share of the page a rendered page image occupies; a picture exactly the
/// page height would push an empty paragraph onto the next page.
const IMAGE_PAGE_FILL: f64 = 0.98;

// A4 portrait with 1in margins.
const A4_WIDTH_TWIPS: u32 = 11_906;
const A4_HEIGHT_TWIPS: u32 = 16_838;
const DEFAULT_MARGIN_TWIPS: u32 = 1_440;
// Word refuses pages outside 0.5in..22in.
const MIN_PAGE_TWIPS: u32 = 720;
const MAX_PAGE_TWIPS: u32 = 31_680;

const DOCUMENT_NAMESPACES: [(&str, &str); 5] = [
    ("xmlns:w", "http://schemas.openxmlformats.org/wordprocessingml/2006/main"),
    ("xmlns:r", "http://schemas.openxmlformats.org/officeDocument/2006/relationships"),
    ("xmlns:wp", "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"),
    ("xmlns:a", "http://schemas.openxmlformats.org/drawingml/2006/main"),
    ("xmlns:pic", "http://schemas.openxmlformats.org/drawingml/2006/picture"),
];

const RELATIONSHIPS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const PICTURE_URI: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";
const DOCUMENT_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";

const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
const CONTENT_TYPE_DEFAULTS: [(&str, &str); 3] = [
    ("rels", "application/vnd.openxmlformats-package.relationships+xml"),
    ("xml", "application/xml"),
    ("png", "image/png"),
];
const DOCUMENT_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";

/// A rendered page, PNG-encoded, with its size in points.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub png: Vec<u8>,
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone)]
enum Block {
    Paragraph(String),
    Page(PageImage),
}

/// Accumulates body content, then writes the package in one go.
#[derive(Debug, Clone, Default)]
pub struct DocxBuilder {
    blocks: Vec<Block>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PageGeometry {
    width: u32,
    height: u32,
    margin: u32,
}

impl PageGeometry {
    const A4: Self = Self {
        width: A4_WIDTH_TWIPS,
        height: A4_HEIGHT_TWIPS,
        margin: DEFAULT_MARGIN_TWIPS,
    };

    fn borderless(width_pt: f32, height_pt: f32) -> Self {
        let twips = |pt: f32| {
            ((pt as f64 * TWIPS_PER_POINT).round() as u32).clamp(MIN_PAGE_TWIPS, MAX_PAGE_TWIPS)
        };
        Self {
            width: twips(width_pt),
            height: twips(height_pt),
            margin: 0,
        }
    }

    fn write_sect_pr<W: Write>(&self, xml: &mut Writer<W>) -> io::Result<()> {
        let (w, h, m) = (
            self.width.to_string(),
            self.height.to_string(),
            self.margin.to_string(),
        );
        xml.create_element("w:sectPr").write_inner_content(|xml| {
            xml.create_element("w:pgSz")
                .with_attributes([("w:w", w.as_str()), ("w:h", h.as_str())])
                .write_empty()?;
            xml.create_element("w:pgMar")
                .with_attributes([
                    ("w:top", m.as_str()),
                    ("w:right", m.as_str()),
                    ("w:bottom", m.as_str()),
                    ("w:left", m.as_str()),
                    ("w:header", "0"),
                    ("w:footer", "0"),
                    ("w:gutter", "0"),
                ])
                .write_empty()?;
            Ok(())
        })?;
        Ok(())
    }
}

impl Block {
    fn geometry(&self) -> PageGeometry {
        match self {
            Block::Paragraph(_) => PageGeometry::A4,
            Block::Page(p) => PageGeometry::borderless(p.width_pt, p.height_pt),
        }
    }
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a body-style paragraph.
    pub fn push_paragraph(&mut self, text: impl Into<String>) {
        self.blocks.push(Block::Paragraph(text.into()));
    }

    /// Append a page image as its own borderless section.
    pub fn push_page(&mut self, page: PageImage) {
        self.blocks.push(Block::Page(page));
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Write the whole package to `sink`.
    pub fn write<W: Write + Seek>(&self, sink: W) -> ZipResult<W> {
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        // PNG data is already compressed.
        let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

        let mut zip = ZipWriter::new(sink);

        zip.start_file("[Content_Types].xml", options)?;
        write_content_types(&mut Writer::new(&mut zip))?;

        zip.start_file("_rels/.rels", options)?;
        write_relationships(
            &mut Writer::new(&mut zip),
            [("rId1", DOCUMENT_REL_TYPE, "word/document.xml".to_string())],
        )?;

        zip.start_file("word/document.xml", options)?;
        self.write_document(&mut Writer::new(&mut zip))?;

        zip.start_file("word/_rels/document.xml.rels", options)?;
        let images: Vec<(String, String)> = (1..=self.pages().count())
            .map(|n| (image_rel_id(n), format!("media/image{n}.png")))
            .collect();
        write_relationships(
            &mut Writer::new(&mut zip),
            images
                .iter()
                .map(|(id, target)| (id.as_str(), IMAGE_REL_TYPE, target.clone())),
        )?;

        for (n, page) in self.pages().enumerate() {
            zip.start_file(format!("word/media/image{}.png", n + 1), stored)?;
            zip.write_all(&page.png)?;
        }

        zip.finish()
    }

    fn pages(&self) -> impl Iterator<Item = &PageImage> {
        self.blocks.iter().filter_map(|b| match b {
            Block::Paragraph(_) => None,
            Block::Page(p) => Some(p),
        })
    }

    fn write_document<W: Write>(&self, xml: &mut Writer<W>) -> io::Result<()> {
        write_declaration(xml)?;
        xml.create_element("w:document")
            .with_attributes(DOCUMENT_NAMESPACES)
            .write_inner_content(|xml| {
                xml.create_element("w:body")
                    .write_inner_content(|xml| self.write_body(xml))?;
                Ok(())
            })?;
        Ok(())
    }

    fn write_body<W: Write>(&self, xml: &mut Writer<W>) -> io::Result<()> {
        let mut image_no = 0usize;

        for (i, block) in self.blocks.iter().enumerate() {
            // A section ends wherever the page geometry changes, and always
            // after a page image.
            let section_end = self.blocks.get(i + 1).and_then(|next| {
                let ends = matches!(block, Block::Page(_)) || next.geometry() != block.geometry();
                ends.then(|| block.geometry())
            });

            match block {
                Block::Paragraph(text) => write_text_paragraph(xml, text, section_end)?,
                Block::Page(page) => {
                    image_no += 1;
                    write_image_paragraph(xml, page, image_no, section_end)?;
                }
            }
        }

        if self.blocks.is_empty() {
            xml.create_element("w:p").write_empty()?;
        }

        self.blocks
            .last()
            .map(Block::geometry)
            .unwrap_or(PageGeometry::A4)
            .write_sect_pr(xml)
    }
}

fn image_rel_id(n: usize) -> String {
    format!("rIdImg{n}")
}

fn write_declaration<W: Write>(xml: &mut Writer<W>) -> io::Result<()> {
    xml.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
}

fn write_content_types<W: Write>(xml: &mut Writer<W>) -> io::Result<()> {
    write_declaration(xml)?;
    xml.create_element("Types")
        .with_attribute(("xmlns", CONTENT_TYPES_NS))
        .write_inner_content(|xml| {
            for (ext, content_type) in CONTENT_TYPE_DEFAULTS {
                xml.create_element("Default")
                    .with_attributes([("Extension", ext), ("ContentType", content_type)])
                    .write_empty()?;
            }
            xml.create_element("Override")
                .with_attributes([
                    ("PartName", "/word/document.xml"),
                    ("ContentType", DOCUMENT_CONTENT_TYPE),
                ])
                .write_empty()?;
            Ok(())
        })?;
    Ok(())
}

fn write_relationships<'a, W, I>(xml: &mut Writer<W>, rels: I) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a str, String)>,
{
    write_declaration(xml)?;
    xml.create_element("Relationships")
        .with_attribute(("xmlns", RELATIONSHIPS_NS))
        .write_inner_content(|xml| {
            for (id, kind, target) in rels {
                xml.create_element("Relationship")
                    .with_attributes([("Id", id), ("Type", kind), ("Target", target.as_str())])
                    .write_empty()?;
            }
            Ok(())
        })?;
    Ok(())
}

fn write_text_paragraph<W: Write>(
    xml: &mut Writer<W>,
    text: &str,
    section_end: Option<PageGeometry>,
) -> io::Result<()> {
    let line = BODY_LINE_SPACING.to_string();
    let size = BODY_SIZE_HALF_POINTS.to_string();
    let text = strip_forbidden_chars(text);

    xml.create_element("w:p").write_inner_content(|xml| {
        xml.create_element("w:pPr").write_inner_content(|xml| {
            xml.create_element("w:spacing")
                .with_attributes([("w:line", line.as_str()), ("w:lineRule", "auto")])
                .write_empty()?;
            if let Some(geometry) = section_end {
                geometry.write_sect_pr(xml)?;
            }
            Ok(())
        })?;
        xml.create_element("w:r").write_inner_content(|xml| {
            xml.create_element("w:rPr").write_inner_content(|xml| {
                xml.create_element("w:rFonts")
                    .with_attributes([
                        ("w:ascii", BODY_FONT_LATIN),
                        ("w:hAnsi", BODY_FONT_LATIN),
                        ("w:eastAsia", BODY_FONT),
                        ("w:cs", BODY_FONT_LATIN),
                    ])
                    .write_empty()?;
                xml.create_element("w:sz")
                    .with_attribute(("w:val", size.as_str()))
                    .write_empty()?;
                xml.create_element("w:szCs")
                    .with_attribute(("w:val", size.as_str()))
                    .write_empty()?;
                Ok(())
            })?;
            xml.create_element("w:t")
                .with_attribute(("xml:space", "preserve"))
                .write_text_content(BytesText::new(&text))?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

fn write_image_paragraph<W: Write>(
    xml: &mut Writer<W>,
    page: &PageImage,
    n: usize,
    section_end: Option<PageGeometry>,
) -> io::Result<()> {
    let cx = ((page.width_pt as f64 * IMAGE_PAGE_FILL * EMU_PER_POINT).round() as u64).to_string();
    let cy = ((page.height_pt as f64 * IMAGE_PAGE_FILL * EMU_PER_POINT).round() as u64).to_string();
    let id = n.to_string();
    let frame_name = format!("Page {n}");
    let file_name = format!("image{n}.png");
    let rel_id = image_rel_id(n);

    xml.create_element("w:p").write_inner_content(|xml| {
        xml.create_element("w:pPr").write_inner_content(|xml| {
            xml.create_element("w:spacing")
                .with_attributes([("w:before", "0"), ("w:after", "0")])
                .write_empty()?;
            xml.create_element("w:jc")
                .with_attribute(("w:val", "center"))
                .write_empty()?;
            if let Some(geometry) = section_end {
                geometry.write_sect_pr(xml)?;
            }
            Ok(())
        })?;
        xml.create_element("w:r").write_inner_content(|xml| {
            xml.create_element("w:drawing").write_inner_content(|xml| {
                xml.create_element("wp:inline")
                    .with_attributes([("distT", "0"), ("distB", "0"), ("distL", "0"), ("distR", "0")])
                    .write_inner_content(|xml| {
                        xml.create_element("wp:extent")
                            .with_attributes([("cx", cx.as_str()), ("cy", cy.as_str())])
                            .write_empty()?;
                        xml.create_element("wp:docPr")
                            .with_attributes([("id", id.as_str()), ("name", frame_name.as_str())])
                            .write_empty()?;
                        xml.create_element("wp:cNvGraphicFramePr").write_inner_content(|xml| {
                            xml.create_element("a:graphicFrameLocks")
                                .with_attribute(("noChangeAspect", "1"))
                                .write_empty()?;
                            Ok(())
                        })?;
                        xml.create_element("a:graphic").write_inner_content(|xml| {
                            xml.create_element("a:graphicData")
                                .with_attribute(("uri", PICTURE_URI))
                                .write_inner_content(|xml| {
                                    write_picture(xml, &id, &file_name, &rel_id, &cx, &cy)
                                })?;
                            Ok(())
                        })?;
                        Ok(())
                    })?;
                Ok(())
            })?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

fn write_picture<W: Write>(
    xml: &mut Writer<W>,
    id: &str,
    file_name: &str,
    rel_id: &str,
    cx: &str,
    cy: &str,
) -> io::Result<()> {
    xml.create_element("pic:pic").write_inner_content(|xml| {
        xml.create_element("pic:nvPicPr").write_inner_content(|xml| {
            xml.create_element("pic:cNvPr")
                .with_attributes([("id", id), ("name", file_name)])
                .write_empty()?;
            xml.create_element("pic:cNvPicPr").write_empty()?;
            Ok(())
        })?;
        xml.create_element("pic:blipFill").write_inner_content(|xml| {
            xml.create_element("a:blip")
                .with_attribute(("r:embed", rel_id))
                .write_empty()?;
            xml.create_element("a:stretch").write_inner_content(|xml| {
                xml.create_element("a:fillRect").write_empty()?;
                Ok(())
            })?;
            Ok(())
        })?;
        xml.create_element("pic:spPr").write_inner_content(|xml| {
            xml.create_element("a:xfrm").write_inner_content(|xml| {
                xml.create_element("a:off")
                    .with_attributes([("x", "0"), ("y", "0")])
                    .write_empty()?;
                xml.create_element("a:ext")
                    .with_attributes([("cx", cx), ("cy", cy)])
                    .write_empty()?;
                Ok(())
            })?;
            xml.create_element("a:prstGeom")
                .with_attribute(("prst", "rect"))
                .write_inner_content(|xml| {
                    xml.create_element("a:avLst").write_empty()?;
                    Ok(())
                })?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

/// Drop code points XML 1.0 cannot carry; escaping is left to the writer.
fn strip_forbidden_chars(text: &str) -> String {
    text.chars()
        .filter(|&c| {
            matches!(c, '\t' | '\n' | '\r')
                || !((c as u32) < 0x20 || c == '\u{FFFE}' || c == '\u{FFFF}')
        })
        .collect()
}
