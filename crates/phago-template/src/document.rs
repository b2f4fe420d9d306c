use std::fs;
use std::path::{Path, PathBuf};

use phago_core::errors::{ErrorInfo, SweepError};
use quick_xml::events::{BytesEnd, BytesText, Event};
use quick_xml::{Reader, Writer};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::path::FieldPath;

fn load_error(code: &str, err: impl ToString) -> SweepError {
    SweepError::TemplateLoad(ErrorInfo::new(code, err.to_string()))
}

/// Parsed XML parameter document.
///
/// The document is held as the event stream produced by the parser. Overwrites
/// replace the events between a field's start and end tags, so declarations,
/// comments, attributes, whitespace and element order are written back
/// exactly as they were read.
#[derive(Debug, Clone)]
pub struct Template {
    events: Vec<Event<'static>>,
    root: String,
    digest: String,
    source: Option<PathBuf>,
    bom: bool,
}

const BOM: char = '\u{feff}';

/// Event span of a resolved element. `end` is `None` for `<field/>`.
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: Option<usize>,
}

impl Template {
    /// Reads and parses a template from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SweepError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            SweepError::TemplateLoad(
                ErrorInfo::new("template_read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let mut template = Self::parse(&text).map_err(|err| match err {
            SweepError::TemplateLoad(info) => SweepError::TemplateLoad(
                info.with_context("path", path.display().to_string()),
            ),
            other => other,
        })?;
        template.source = Some(path.to_path_buf());
        debug!(
            path = %path.display(),
            root = %template.root,
            events = template.events.len(),
            "loaded template"
        );
        Ok(template)
    }

    /// Parses a template from an in-memory document.
    ///
    /// A leading byte order mark is kept and written back by [`Template::to_bytes`].
    pub fn parse(text: &str) -> Result<Self, SweepError> {
        let (bom, body) = match text.strip_prefix(BOM) {
            Some(body) => (true, body),
            None => (false, text),
        };
        let mut reader = Reader::from_str(body);
        let mut events = Vec::new();
        let mut depth = 0usize;
        let mut root: Option<String> = None;
        loop {
            let event = reader.read_event().map_err(|err| {
                SweepError::TemplateLoad(
                    ErrorInfo::new("template_parse", err.to_string())
                        .with_context("offset", reader.buffer_position().to_string()),
                )
            })?;
            match &event {
                Event::Eof => break,
                Event::Start(start) | Event::Empty(start) => {
                    if depth == 0 {
                        if root.is_some() {
                            return Err(load_error(
                                "template_roots",
                                "document has more than one root element",
                            ));
                        }
                        root = Some(element_name(start.name().as_ref())?);
                    }
                    if matches!(event, Event::Start(_)) {
                        depth += 1;
                    }
                }
                Event::End(_) => {
                    depth = depth.checked_sub(1).ok_or_else(|| {
                        load_error("template_parse", "closing tag without an open element")
                    })?;
                }
                Event::Text(text) if depth == 0 => {
                    let content = text
                        .unescape()
                        .map_err(|err| load_error("template_parse", err))?;
                    if !content.trim().is_empty() {
                        return Err(load_error(
                            "template_parse",
                            "character data outside the root element",
                        ));
                    }
                }
                _ => {}
            }
            events.push(event.into_owned());
        }
        if depth != 0 {
            return Err(load_error(
                "template_parse",
                format!("document ends with {depth} unclosed element(s)"),
            ));
        }
        let root = root.ok_or_else(|| load_error("template_empty", "document has no root element"))?;
        let digest = format!("{:x}", Sha256::digest(text.as_bytes()));
        Ok(Self {
            events,
            root,
            digest,
            source: None,
            bom,
        })
    }

    /// Name of the document's root element.
    pub fn root_name(&self) -> &str {
        &self.root
    }

    /// SHA-256 of the bytes the template was parsed from.
    pub fn source_digest(&self) -> &str {
        &self.digest
    }

    /// Path the template was loaded from, when loaded from disk.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Whether `path` resolves to an element.
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.locate(path).is_ok()
    }

    /// Returns the unescaped text of the leaf element at `path`.
    pub fn get(&self, path: &FieldPath) -> Result<String, SweepError> {
        let span = self.locate(path)?;
        let Some(end) = span.end else {
            return Ok(String::new());
        };
        let mut value = String::new();
        for event in &self.events[span.start + 1..end] {
            match event {
                Event::Text(text) => {
                    let content = text
                        .unescape()
                        .map_err(|err| load_error("template_parse", err))?;
                    value.push_str(&content);
                }
                Event::CData(data) => value.push_str(&String::from_utf8_lossy(data)),
                _ => {}
            }
        }
        Ok(value)
    }

    /// Replaces the text of the leaf element at `path`.
    ///
    /// Fails with [`SweepError::MissingField`] when the path does not resolve
    /// or addresses an element that has child elements.
    pub fn set(&mut self, path: &FieldPath, value: &str) -> Result<(), SweepError> {
        let span = self.locate(path)?;
        let text = Event::Text(BytesText::new(value).into_owned());
        match span.end {
            Some(end) => {
                self.events.splice(span.start + 1..end, [text]).for_each(drop);
            }
            None => {
                let Event::Empty(start) = self.events[span.start].clone() else {
                    return Err(load_error("template_parse", "expected a self-closing element"));
                };
                let name = element_name(start.name().as_ref())?;
                self.events
                    .splice(
                        span.start..=span.start,
                        [Event::Start(start), text, Event::End(BytesEnd::new(name))],
                    )
                    .for_each(drop);
            }
        }
        Ok(())
    }

    /// Slash-separated paths of every leaf element, in document order.
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut stack: Vec<String> = Vec::new();
        let mut leaves = Vec::new();
        let mut has_child: Vec<bool> = Vec::new();
        for event in &self.events {
            match event {
                Event::Start(start) => {
                    if let Some(parent) = has_child.last_mut() {
                        *parent = true;
                    }
                    stack.push(String::from_utf8_lossy(start.name().as_ref()).into_owned());
                    has_child.push(false);
                }
                Event::Empty(start) => {
                    if let Some(parent) = has_child.last_mut() {
                        *parent = true;
                    }
                    if !stack.is_empty() {
                        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
                        leaves.push(join_below_root(&stack, Some(&name)));
                    }
                }
                Event::End(_) => {
                    let leaf = has_child.pop() == Some(false);
                    if leaf && stack.len() > 1 {
                        leaves.push(join_below_root(&stack, None));
                    }
                    stack.pop();
                }
                _ => {}
            }
        }
        leaves
    }

    /// Serializes the document.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SweepError> {
        let mut out = Vec::new();
        if self.bom {
            let mut buf = [0u8; 4];
            out.extend_from_slice(BOM.encode_utf8(&mut buf).as_bytes());
        }
        let mut writer = Writer::new(out);
        for event in &self.events {
            writer.write_event(event).map_err(|err| {
                SweepError::Serde(ErrorInfo::new("template_serialize", err.to_string()))
            })?;
        }
        Ok(writer.into_inner())
    }

    /// Serializes the document to `path`, creating parent directories.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<(), SweepError> {
        let path = path.as_ref();
        let write_error = |err: std::io::Error| {
            SweepError::ArtifactWrite(
                ErrorInfo::new("artifact_write", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        };
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_error)?;
        }
        fs::write(path, bytes).map_err(write_error)
    }

    /// Clones the template, applies `overrides` in order and serializes it.
    pub fn render<'a, I>(&self, overrides: I) -> Result<Vec<u8>, SweepError>
    where
        I: IntoIterator<Item = (&'a FieldPath, &'a str)>,
    {
        let mut copy = self.clone();
        for (path, value) in overrides {
            copy.set(path, value)?;
        }
        copy.to_bytes()
    }

    fn locate(&self, path: &FieldPath) -> Result<Span, SweepError> {
        let missing = |message: &str| {
            SweepError::MissingField(
                ErrorInfo::new("field_not_found", message)
                    .with_context("path", path.to_string())
                    .with_context("root", self.root.clone()),
            )
        };
        if let Some(root) = path.anchored_root() {
            if root != self.root {
                return Err(missing("anchored path names a different root element"));
            }
        }
        let target = path.segments();
        let mut stack: Vec<Vec<u8>> = Vec::new();
        for (idx, event) in self.events.iter().enumerate() {
            match event {
                Event::Start(start) => {
                    stack.push(start.name().as_ref().to_vec());
                    if matches_target(&stack, target) {
                        let end = self.matching_end(idx);
                        if self.events[idx + 1..end]
                            .iter()
                            .any(|event| matches!(event, Event::Start(_) | Event::Empty(_)))
                        {
                            return Err(SweepError::MissingField(
                                ErrorInfo::new("field_not_leaf", "field has child elements")
                                    .with_context("path", path.to_string()),
                            ));
                        }
                        return Ok(Span {
                            start: idx,
                            end: Some(end),
                        });
                    }
                }
                Event::Empty(start) => {
                    stack.push(start.name().as_ref().to_vec());
                    let found = matches_target(&stack, target);
                    stack.pop();
                    if found {
                        return Ok(Span {
                            start: idx,
                            end: None,
                        });
                    }
                }
                Event::End(_) => {
                    stack.pop();
                }
                _ => {}
            }
        }
        Err(missing("field path does not resolve in the template"))
    }

    fn matching_end(&self, start: usize) -> usize {
        let mut depth = 0usize;
        for (idx, event) in self.events.iter().enumerate().skip(start) {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => {
                    depth -= 1;
                    if depth == 0 {
                        return idx;
                    }
                }
                _ => {}
            }
        }
        // parse() rejects documents with unclosed elements
        self.events.len() - 1
    }
}

fn matches_target(stack: &[Vec<u8>], target: &[String]) -> bool {
    stack.len() == target.len() + 1
        && stack[1..]
            .iter()
            .zip(target)
            .all(|(name, segment)| name.as_slice() == segment.as_bytes())
}

fn element_name(raw: &[u8]) -> Result<String, SweepError> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|err| load_error("template_encoding", err))
}

fn join_below_root(stack: &[String], extra: Option<&str>) -> String {
    let mut parts: Vec<&str> = stack[1..].iter().map(String::as_str).collect();
    if let Some(extra) = extra {
        parts.push(extra);
    }
    parts.join("/")
}
