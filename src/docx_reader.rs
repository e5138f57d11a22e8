use crate::error::{ConvertError, Result};
use crate::reader::{BlockSource, BlockStream, Metadata, StyleHint, TextBlock};
use docx_rust::document::{
    BodyContent, BreakType, Drawing, Paragraph, ParagraphContent, Run, RunContent, Table,
    TableCellContent, TableRowContent,
};
use docx_rust::{Docx, DocxFile};
use std::path::Path;
use tracing::debug;

/// Paragraph roles derived from the Word style id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParagraphRole {
    Body,
    /// `Heading1`: a structural chapter heading.
    TopHeading,
    /// `Heading2` and deeper: heading-styled, but only a chapter when the
    /// text looks like one.
    SubHeading,
    /// `Title` and `Subtitle`: title-page furniture.
    TitlePage,
}

fn paragraph_role(style_id: &str) -> ParagraphRole {
    let id = style_id.to_ascii_lowercase().replace(' ', "");
    match id.as_str() {
        "title" | "subtitle" => ParagraphRole::TitlePage,
        "heading1" => ParagraphRole::TopHeading,
        _ if id.starts_with("heading") => ParagraphRole::SubHeading,
        _ => ParagraphRole::Body,
    }
}

pub struct DocxSource {
    /// DocxFile owns the raw data; Docx borrows from it, so parsing happens
    /// where the blocks are produced.
    file: DocxFile,
}

impl DocxSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = DocxFile::from_file(path)
            .map_err(|e| ConvertError::adapter("docx", format!("{}: {}", path.display(), e)))?;
        Ok(Self { file })
    }

    fn parse(&self) -> Result<Docx<'_>> {
        self.file
            .parse()
            .map_err(|e| ConvertError::adapter("docx", format!("failed to parse document: {}", e)))
    }
}

impl BlockSource for DocxSource {
    fn metadata(&self) -> Metadata {
        let Ok(docx) = self.parse() else {
            return Metadata::default();
        };

        // Core comes in two namespace variants with the same fields.
        let (title, creator) = match &docx.core {
            Some(docx_rust::core::Core::CoreNamespace(c)) => (
                c.title.as_deref().map(|s| s.to_string()),
                c.creator.as_deref().map(|s| s.to_string()),
            ),
            Some(docx_rust::core::Core::CoreNoNamespace(c)) => (
                c.title.as_deref().map(|s| s.to_string()),
                c.creator.as_deref().map(|s| s.to_string()),
            ),
            None => (None, None),
        };

        Metadata::new(title.unwrap_or_default(), creator.unwrap_or_default())
    }

    fn blocks(self: Box<Self>) -> BlockStream {
        let docx = match self.parse() {
            Ok(docx) => docx,
            Err(e) => return Box::new(std::iter::once(Err(e))),
        };

        let blocks = walk_body(&docx);
        debug!(blocks = blocks.len(), "read DOCX body");
        Box::new(blocks.into_iter().map(Ok))
    }
}

fn walk_body(docx: &Docx<'_>) -> Vec<TextBlock> {
    let mut walker = BlockWalker {
        docx,
        blocks: Vec::new(),
        section_pending: false,
    };
    for content in &docx.document.body.content {
        walker.body_content(content);
    }
    walker.blocks
}

struct BlockWalker<'a> {
    docx: &'a Docx<'a>,
    blocks: Vec<TextBlock>,
    /// A page break was seen with no text after it yet.
    section_pending: bool,
}

/// Text of one paragraph plus the images anchored in it, in order.
#[derive(Default)]
struct ParagraphParts {
    text: String,
    images: Vec<TextBlock>,
    bold_runs: usize,
    plain_runs: usize,
    /// Page break before any text in the paragraph.
    starts_page: bool,
    /// Page break after some text.
    ends_page: bool,
}

impl<'a> BlockWalker<'a> {
    fn body_content(&mut self, content: &BodyContent) {
        match content {
            BodyContent::Paragraph(para) => self.paragraph(para),
            BodyContent::Table(table) => self.table(table),
            BodyContent::Sdt(sdt) => {
                if let Some(ref sdt_content) = sdt.content {
                    for item in &sdt_content.content {
                        self.body_content(item);
                    }
                }
            }
            _ => {}
        }
    }

    fn paragraph(&mut self, para: &Paragraph) {
        let role = para
            .property
            .as_ref()
            .and_then(|prop| prop.style_id.as_ref())
            .map(|style_id| paragraph_role(style_id.value.as_ref()))
            .unwrap_or(ParagraphRole::Body);
        let page_break_before = para
            .property
            .as_ref()
            .and_then(|prop| prop.page_break_before.as_ref())
            .is_some_and(|b| b.value != Some(false));

        let mut parts = ParagraphParts::default();
        for pc in &para.content {
            match pc {
                ParagraphContent::Run(run) => self.run(run, &mut parts),
                ParagraphContent::Link(link) => {
                    if let Some(run) = link.content.as_ref() {
                        self.run(run, &mut parts);
                    }
                }
                _ => {}
            }
        }

        // Images first: an illustrated chapter heading reads before its caption.
        self.blocks.append(&mut parts.images);

        self.section_pending |= page_break_before || parts.starts_page;
        let text = parts.text.trim();
        if text.is_empty() {
            return;
        }
        let mut block = match role {
            ParagraphRole::TitlePage => TextBlock::metadata(text),
            ParagraphRole::TopHeading => TextBlock::heading(text),
            ParagraphRole::SubHeading => TextBlock::body(text).with_hint(StyleHint::LargeFont),
            ParagraphRole::Body => TextBlock::body(text),
        };
        if parts.bold_runs > 0 && parts.plain_runs == 0 {
            block = block.with_hint(StyleHint::Bold);
        }
        if std::mem::take(&mut self.section_pending) {
            block = block.with_hint(StyleHint::SectionStart);
        }
        if parts.ends_page {
            block = block.with_hint(StyleHint::PageBreakFollows);
        }
        self.blocks.push(block);
    }

    fn run(&mut self, run: &Run, parts: &mut ParagraphParts) {
        let mut has_text = false;
        for rc in &run.content {
            match rc {
                RunContent::Text(t) => {
                    has_text |= !t.text.trim().is_empty();
                    parts.text.push_str(&t.text);
                }
                RunContent::Break(br) => {
                    if matches!(br.ty, Some(BreakType::Page)) {
                        if parts.text.trim().is_empty() {
                            parts.starts_page = true;
                        } else {
                            parts.ends_page = true;
                        }
                    }
                    parts.text.push('\n');
                }
                RunContent::Tab(_) => parts.text.push('\t'),
                RunContent::Drawing(drawing) => {
                    if let Some(image) = self.drawing(drawing) {
                        parts.images.push(image);
                    }
                }
                _ => {}
            }
        }

        if has_text {
            let bold = run
                .property
                .as_ref()
                .and_then(|p| p.bold.as_ref())
                .is_some_and(|b| b.value != Some(false));
            if bold {
                parts.bold_runs += 1;
            } else {
                parts.plain_runs += 1;
            }
        }
    }

    fn drawing(&self, drawing: &Drawing) -> Option<TextBlock> {
        // Inline drawings first, then floating anchors.
        if let Some(ref inline) = drawing.inline {
            if let Some(ref graphic) = inline.graphic {
                if let Some(pic) = graphic.data.children.first() {
                    return Some(self.resolve_image(pic.fill.blip.embed.as_ref()));
                }
            }
        }
        if let Some(ref anchor) = drawing.anchor {
            if let Some(ref graphic) = anchor.graphic {
                if let Some(pic) = graphic.data.children.first() {
                    return Some(self.resolve_image(pic.fill.blip.embed.as_ref()));
                }
            }
        }
        None
    }

    /// Follow a relationship id to the media part. A dangling id still
    /// yields an image block, without payload.
    fn resolve_image(&self, embed_id: &str) -> TextBlock {
        let target = self.docx.document_rels.as_ref().and_then(|rels| {
            rels.relationships
                .iter()
                .find(|r| r.id.as_ref() == embed_id)
                .map(|r| r.target.to_string())
        });
        let Some(target) = target else {
            return TextBlock {
                image: None,
                ..TextBlock::image(embed_id, Vec::new())
            };
        };

        let prefixed = format!("word/{}", target);
        let bytes = self
            .docx
            .media
            .iter()
            .find(|(path, _)| path.as_str() == target || path.as_str() == prefixed)
            .map(|(_, (_media_type, data))| data.to_vec());

        match bytes {
            Some(bytes) => TextBlock::image(target, bytes),
            None => TextBlock {
                image: None,
                ..TextBlock::image(target, Vec::new())
            },
        }
    }

    fn table(&mut self, table: &Table) {
        for row in &table.rows {
            for cell_content in &row.cells {
                if let TableRowContent::TableCell(cell) = cell_content {
                    for tc in &cell.content {
                        let TableCellContent::Paragraph(para) = tc;
                        self.paragraph(para);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::BlockOrigin;
    use docx_rust::document::{TableCell, TableRow};
    use docx_rust::formatting::{CharacterProperty, PageBreakBefore, ParagraphProperty};
    use docx_rust::media::MediaType;
    use docx_rust::rels::{Relationship, Relationships};

    fn plain(text: &str) -> Run<'_> {
        Run::default().push_text(text)
    }

    fn bold(text: &str) -> Run<'_> {
        Run::default()
            .property(CharacterProperty::default().bold(true))
            .push_text(text)
    }

    fn styled<'a>(style: &'a str, runs: Vec<Run<'a>>) -> Paragraph<'a> {
        let para = Paragraph::default().property(ParagraphProperty::default().style_id(style));
        runs.into_iter().fold(para, |para, run| para.push(run))
    }

    fn body<'a>(runs: Vec<Run<'a>>) -> Paragraph<'a> {
        styled("Normal", runs)
    }

    fn docx_with<'a>(content: Vec<BodyContent<'a>>) -> Docx<'a> {
        let mut docx = Docx::default();
        for item in content {
            docx.document.push(item);
        }
        docx
    }

    #[test]
    fn test_heading_styles_map_to_origins() {
        let docx = docx_with(vec![
            styled("Title", vec![plain("The Quiet House")]).into(),
            styled("Heading1", vec![plain("Chapter One")]).into(),
            styled("Heading2", vec![plain("The Arrival")]).into(),
            body(vec![plain("The house stood alone.")]).into(),
        ]);
        let blocks = walk_body(&docx);

        assert_eq!(blocks.len(), 4);
        assert_eq!(blocks[0].origin, BlockOrigin::Metadata);
        assert_eq!(blocks[1], TextBlock::heading("Chapter One"));
        assert_eq!(blocks[2], TextBlock::body("The Arrival").with_hint(StyleHint::LargeFont));
        assert_eq!(blocks[3], TextBlock::body("The house stood alone."));
    }

    #[test]
    fn test_all_bold_paragraph_gets_bold_hint() {
        let docx = docx_with(vec![
            body(vec![bold("The "), bold("Reckoning")]).into(),
            body(vec![bold("Warning:"), plain(" mind the step.")]).into(),
        ]);
        let blocks = walk_body(&docx);

        assert_eq!(blocks[0], TextBlock::body("The Reckoning").with_hint(StyleHint::Bold));
        assert!(!blocks[1].has_hint(StyleHint::Bold));
    }

    #[test]
    fn test_page_breaks_become_hints() {
        let mut before = ParagraphProperty::default();
        before.page_break_before = Some(PageBreakBefore { value: None });
        let after_break = Paragraph::default().property(before).push(plain("Chapter Two"));

        let docx = docx_with(vec![
            body(vec![plain("The end of it all."), Run::default().push_break(BreakType::Page)])
                .into(),
            after_break.into(),
            body(vec![plain("More.")]).into(),
            body(vec![Run::default().push_break(BreakType::Page)]).into(),
            body(vec![plain("Chapter Three")]).into(),
        ]);
        let blocks = walk_body(&docx);

        assert_eq!(blocks.len(), 4);
        assert!(blocks[0].has_hint(StyleHint::PageBreakFollows));
        assert!(blocks[1].has_hint(StyleHint::SectionStart));
        assert!(blocks[2].style.is_empty());
        assert_eq!(blocks[3].content, "Chapter Three");
        assert!(blocks[3].has_hint(StyleHint::SectionStart));
    }

    #[test]
    fn test_table_cells_are_read_in_order() {
        let table = Table::default().push_row(
            TableRow::default()
                .push_cell(TableCell::paragraph(body(vec![plain("Left")])))
                .push_cell(TableCell::paragraph(body(vec![plain("Right")]))),
        );
        let docx = docx_with(vec![body(vec![plain("Before.")]).into(), table.into()]);
        let texts: Vec<String> = walk_body(&docx).into_iter().map(|b| b.content).collect();
        assert_eq!(texts, vec!["Before.", "Left", "Right"]);
    }

    #[test]
    fn test_resolve_image_through_relationships() {
        let bytes = vec![0x89, 0x50, 0x4E, 0x47];
        let mut docx = Docx::default();
        docx.document_rels = Some(Relationships {
            relationships: vec![Relationship {
                id: "rId5".into(),
                target: "media/image1.png".into(),
                ..Default::default()
            }],
        });
        docx.media.insert("word/media/image1.png".to_string(), (MediaType::Image, &bytes));
        let walker = BlockWalker {
            docx: &docx,
            blocks: Vec::new(),
            section_pending: false,
        };

        let found = walker.resolve_image("rId5");
        assert_eq!(found.origin, BlockOrigin::ImageReference);
        assert_eq!(found.content, "media/image1.png");
        assert_eq!(found.image, Some(bytes.clone()));

        let dangling = walker.resolve_image("rId9");
        assert_eq!(dangling.origin, BlockOrigin::ImageReference);
        assert_eq!(dangling.image, None);
    }

    #[test]
    fn test_paragraph_roles() {
        assert_eq!(paragraph_role("Heading1"), ParagraphRole::TopHeading);
        assert_eq!(paragraph_role("heading 1"), ParagraphRole::TopHeading);
        assert_eq!(paragraph_role("Heading2"), ParagraphRole::SubHeading);
        assert_eq!(paragraph_role("Title"), ParagraphRole::TitlePage);
        assert_eq!(paragraph_role("Subtitle"), ParagraphRole::TitlePage);
        assert_eq!(paragraph_role("Normal"), ParagraphRole::Body);
    }

    #[test]
    fn test_open_missing_file_is_adapter_error() {
        let err = DocxSource::open(Path::new("/nonexistent/book.docx")).err().unwrap();
        assert!(matches!(err, ConvertError::AdapterRead { format: "docx", .. }));
    }
}
