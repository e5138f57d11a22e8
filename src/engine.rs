//! Chapter-boundary detection.
//!
//! [`BookConversion`] pulls one block at a time from an adapter, decides
//! whether it opens a chapter, and yields each finished chapter as soon as
//! the next boundary is confirmed. A heading-shaped line is only a
//! candidate until the following block shows body text.

use crate::config::HeadingConfig;
use crate::error::{OcrError, OcrWarning, Result};
use crate::heading::{BlockClass, HeadingClassifier, HeadingKind};
use crate::normalize::{
    ends_with_terminal_punctuation, ends_with_wrap_hyphen, is_ornamental_separator, normalize,
};
use crate::ocr::OcrGateway;
use crate::reader::{BlockOrigin, Metadata, StyleHint, TextBlock};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// The line separating chapters in the output.
pub const CHAPTER_SENTINEL: &str = "***";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    CollectingBody,
    EvaluatingCandidate,
    Flushing,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Candidate {
    text: String,
    kind: HeadingKind,
    subtitle_absorbed: bool,
}

/// Mutable per-run state: the chapter being built and the heading waiting
/// for confirmation.
#[derive(Debug, Default)]
pub struct ChapterAccumulator {
    current_chapter_lines: Vec<String>,
    pending_heading_candidate: Option<Candidate>,
    chapter_count: usize,
    /// The last line was cut by the layout mid-sentence.
    join_next: bool,
    /// Inside front or back matter: body lines are dropped.
    suppressing: bool,
}

/// Where headings may appear. Inactive until the adapter marks a page or
/// document start; from then on only the first lines after each start count.
#[derive(Debug, Default)]
struct HeadingWindow {
    anchored: bool,
    lines_since_start: usize,
    /// The previous block ended a page.
    start_next: bool,
}

impl HeadingWindow {
    fn observe(&mut self, block: &TextBlock) {
        if self.start_next || block.has_hint(StyleHint::SectionStart) {
            self.anchored = true;
            self.lines_since_start = 0;
        }
        self.start_next = block.has_hint(StyleHint::PageBreakFollows);
    }

    fn is_open(&self, size: usize) -> bool {
        size == 0 || !self.anchored || self.lines_since_start < size
    }
}

impl ChapterAccumulator {
    pub fn chapter_count(&self) -> usize {
        self.chapter_count
    }

    pub fn lines(&self) -> &[String] {
        &self.current_chapter_lines
    }

    pub fn pending_heading(&self) -> Option<&str> {
        self.pending_heading_candidate.as_ref().map(|c| c.text.as_str())
    }

    fn push_text(&mut self, text: &str, layout_break: bool) {
        for line in text.split('\n') {
            if line.is_empty() || is_ornamental_separator(line) {
                continue;
            }
            let joined = self.join_next;
            self.join_next = false;
            if let Some(last) = self.current_chapter_lines.last_mut().filter(|_| joined) {
                if ends_with_wrap_hyphen(last) {
                    last.pop();
                } else {
                    last.push(' ');
                }
                last.push_str(line);
                continue;
            }
            self.current_chapter_lines.push(line.to_string());
        }
        self.join_next = layout_break
            && self
                .current_chapter_lines
                .last()
                .is_some_and(|last| !ends_with_terminal_punctuation(last));
    }

    /// Render and reset the current chapter. Every chapter after the
    /// prelude starts with the sentinel line.
    fn take_chapter(&mut self) -> String {
        let body = std::mem::take(&mut self.current_chapter_lines).join("\n");
        self.join_next = false;
        if self.chapter_count == 0 {
            body
        } else if body.is_empty() {
            CHAPTER_SENTINEL.to_string()
        } else {
            format!("{}\n{}", CHAPTER_SENTINEL, body)
        }
    }
}

/// Lazy chapter stream over a block stream.
///
/// Yields one string per chapter. The first is the text before the first
/// confirmed heading (possibly empty); every later one starts with
/// [`CHAPTER_SENTINEL`]. An adapter error ends the stream after being
/// yielded.
pub struct BookConversion<'g, I> {
    blocks: I,
    classifier: HeadingClassifier,
    ocr: &'g dyn OcrGateway,
    state: EngineState,
    acc: ChapterAccumulator,
    window: HeadingWindow,
    ready: VecDeque<String>,
    warnings: Vec<OcrWarning>,
    block_index: usize,
}

/// Drive `blocks` through chapter detection.
pub fn convert<'g, I>(
    blocks: I,
    metadata: &Metadata,
    ocr: &'g dyn OcrGateway,
    config: &HeadingConfig,
) -> BookConversion<'g, I::IntoIter>
where
    I: IntoIterator<Item = Result<TextBlock>>,
{
    let classifier = HeadingClassifier::new(config.clone(), metadata);
    BookConversion::new(blocks.into_iter(), classifier, ocr)
}

impl<'g, I> BookConversion<'g, I>
where
    I: Iterator<Item = Result<TextBlock>>,
{
    pub fn new(blocks: I, classifier: HeadingClassifier, ocr: &'g dyn OcrGateway) -> Self {
        Self {
            blocks,
            classifier,
            ocr,
            state: EngineState::CollectingBody,
            acc: ChapterAccumulator::default(),
            window: HeadingWindow::default(),
            ready: VecDeque::new(),
            warnings: Vec::new(),
            block_index: 0,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn accumulator(&self) -> &ChapterAccumulator {
        &self.acc
    }

    /// Chapter boundaries confirmed so far.
    pub fn chapter_count(&self) -> usize {
        self.acc.chapter_count
    }

    /// Images that could not be recognized so far.
    pub fn warnings(&self) -> &[OcrWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<OcrWarning> {
        self.warnings
    }

    fn process(&mut self, block: TextBlock) {
        let index = self.block_index;
        self.block_index += 1;

        if block.origin == BlockOrigin::ImageReference {
            self.process_image(index, block);
            return;
        }

        self.window.observe(&block);
        let text = normalize(&block.content);
        let class = self.gate(self.classifier.classify(&block, &text), &block);
        debug!(index, ?class, state = ?self.state, "classified block");
        if class != BlockClass::Noise {
            self.window.lines_since_start += 1;
        }

        match (class, self.state) {
            (BlockClass::Noise, _) => {}
            (BlockClass::Heading(kind), EngineState::EvaluatingCandidate) => {
                if let Some(previous) = &self.acc.pending_heading_candidate {
                    debug!(
                        discarded = %previous.text,
                        replacement = %text,
                        "heading candidate replaced"
                    );
                }
                self.set_candidate(text, kind);
            }
            (BlockClass::Heading(kind), _) => {
                self.set_candidate(text, kind);
                self.state = EngineState::EvaluatingCandidate;
            }
            (BlockClass::Body, EngineState::EvaluatingCandidate) => {
                if self.absorbs_subtitle(&text, &block) {
                    if let Some(candidate) = self.acc.pending_heading_candidate.as_mut() {
                        debug!(heading = %candidate.text, subtitle = %text, "absorbed subtitle");
                        candidate.subtitle_absorbed = true;
                    }
                    return;
                }
                self.confirm_candidate();
                self.append_body(&text, block.has_layout_break());
            }
            (BlockClass::Body, _) => self.append_body(&text, block.has_layout_break()),
        }
    }

    /// Heading-shaped text is body when it continues a wrapped sentence or
    /// sits too far from a page start. Structural headings always count.
    fn gate(&self, class: BlockClass, block: &TextBlock) -> BlockClass {
        let BlockClass::Heading(kind) = class else {
            return class;
        };
        if block.origin == BlockOrigin::PotentialHeading {
            return class;
        }
        if self.acc.join_next {
            debug!(?kind, "heading shape inside a wrapped sentence");
            return BlockClass::Body;
        }
        if !self.window.is_open(self.classifier.config().heading_window) {
            debug!(?kind, "heading shape outside the heading window");
            return BlockClass::Body;
        }
        class
    }

    fn process_image(&mut self, index: usize, block: TextBlock) {
        let recognized = match block.image.as_deref() {
            Some(bytes) => self.ocr.recognize(bytes),
            None => Err(OcrError::MalformedImage("missing image payload".to_string())),
        };

        let text = match recognized {
            Ok(text) => normalize(&text),
            Err(error) => {
                warn!(reference = %block.content, %error, "image skipped");
                self.warnings.push(OcrWarning {
                    block_index: index,
                    reference: block.content,
                    error,
                });
                String::new()
            }
        };

        // An image is chapter content even when it yields nothing.
        if self.state == EngineState::EvaluatingCandidate {
            self.confirm_candidate();
        }
        if !text.is_empty() {
            self.append_body(&text, false);
        }
    }

    fn set_candidate(&mut self, text: String, kind: HeadingKind) {
        self.acc.pending_heading_candidate = Some(Candidate {
            text,
            kind,
            subtitle_absorbed: false,
        });
    }

    /// A line the layout wrapped into the next one is prose, not a subtitle.
    fn absorbs_subtitle(&self, text: &str, block: &TextBlock) -> bool {
        self.classifier.config().absorb_subtitles
            && !block.has_layout_break()
            && self.acc.pending_heading_candidate.as_ref().is_some_and(|c| {
                c.kind == HeadingKind::Chapter && !c.subtitle_absorbed
            })
            && self.classifier.is_subtitle(block, text)
    }

    fn confirm_candidate(&mut self) {
        self.state = EngineState::CollectingBody;
        let Some(candidate) = self.acc.pending_heading_candidate.take() else {
            return;
        };
        match candidate.kind {
            HeadingKind::Chapter => {
                debug!(heading = %candidate.text, "chapter boundary confirmed");
                self.flush();
                self.acc.chapter_count += 1;
                self.acc.suppressing = false;
                self.window.lines_since_start = 0;
            }
            HeadingKind::FrontMatter => {
                debug!(heading = %candidate.text, "skipping front matter");
                self.acc.suppressing = true;
                self.acc.join_next = false;
            }
        }
    }

    fn append_body(&mut self, text: &str, layout_break: bool) {
        if self.acc.suppressing {
            return;
        }
        self.acc.push_text(text, layout_break);
    }

    fn flush(&mut self) {
        let previous = self.state;
        self.state = EngineState::Flushing;
        let chapter = self.acc.take_chapter();
        self.ready.push_back(chapter);
        self.state = previous;
    }

    fn finish(&mut self) {
        if let Some(candidate) = &self.acc.pending_heading_candidate {
            if candidate.kind == HeadingKind::Chapter {
                self.confirm_candidate();
            } else {
                self.acc.pending_heading_candidate = None;
            }
        }
        self.flush();
        self.state = EngineState::Finished;
    }
}

impl<I> Iterator for BookConversion<'_, I>
where
    I: Iterator<Item = Result<TextBlock>>,
{
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(chapter) = self.ready.pop_front() {
                return Some(Ok(chapter));
            }
            if self.state == EngineState::Finished {
                return None;
            }
            match self.blocks.next() {
                Some(Ok(block)) => self.process(block),
                Some(Err(e)) => {
                    self.state = EngineState::Finished;
                    return Some(Err(e));
                }
                None => self.finish(),
            }
        }
    }
}

/// Concatenate chapters into the output text. An empty prelude leaves no
/// blank first line, so the text then opens with the sentinel.
pub fn join_chapters(chapters: &[String]) -> String {
    let joined = chapters.join("\n");
    match joined.strip_prefix('\n') {
        Some(rest) if chapters.first().is_some_and(|c| c.is_empty()) => rest.to_string(),
        _ => joined,
    }
}

/// Split output text back into chapter bodies on sentinel lines.
pub fn split_chapters(text: &str) -> Vec<String> {
    let mut chapters = vec![Vec::new()];
    for line in text.lines() {
        if line == CHAPTER_SENTINEL {
            chapters.push(Vec::new());
        } else if let Some(current) = chapters.last_mut() {
            current.push(line);
        }
    }
    chapters.into_iter().map(|lines| lines.join("\n")).collect()
}
