//! Line formatting.
//!
//! Templates use `{field}` placeholders with `{{` and `}}` as escapes.
//! The standard template is assembled from the logger settings in a
//! fixed field order:
//!
//! ```text
//! {asctime},{app},[{level}:pid={pid}:{thread}:{instance}:{module}:{function}:{line}],{message}
//! ```
//!
//! `{app}` and `{instance}` only appear when enabled, and the bracketed
//! block shrinks to `{level}` when call-site metadata is turned off.

use std::fmt::Write as FmtWrite;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::error::{LogWrapError, LogWrapResult};
use crate::record::LogRecord;

/// Timestamp layout for `{asctime}`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Layout of the suffix appended to dated file names.
pub const FILE_DATE_FORMAT: &str = "%Y%m%d%H%M%S";

/// Extension used when a file sink path has none.
pub const DEFAULT_LOG_EXTENSION: &str = "log";

/// Template used when a record lacks a field the configured template needs.
pub const MINIMAL_TEMPLATE: &str = "{asctime},{level},{message}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Asctime,
    Name,
    App,
    Level,
    Pid,
    Thread,
    Instance,
    Module,
    Function,
    File,
    Line,
    Message,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        let field = match name {
            "asctime" => Field::Asctime,
            "name" => Field::Name,
            "app" => Field::App,
            "level" => Field::Level,
            "pid" => Field::Pid,
            "thread" => Field::Thread,
            "instance" => Field::Instance,
            "module" => Field::Module,
            "function" => Field::Function,
            "file" => Field::File,
            "line" => Field::Line,
            "message" => Field::Message,
            _ => return None,
        };
        Some(field)
    }

    fn name(self) -> &'static str {
        match self {
            Field::Asctime => "asctime",
            Field::Name => "name",
            Field::App => "app",
            Field::Level => "level",
            Field::Pid => "pid",
            Field::Thread => "thread",
            Field::Instance => "instance",
            Field::Module => "module",
            Field::Function => "function",
            Field::File => "file",
            Field::Line => "line",
            Field::Message => "message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// A parsed line template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formatter {
    segments: Vec<Segment>,
}

impl Formatter {
    /// Parse a template such as `"{asctime} {level} {message}"`.
    pub fn parse(template: &str) -> LogWrapResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '{' => {
                    let mut name = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(c) => name.push(c),
                            None => {
                                return Err(LogWrapError::InvalidFormat(format!(
                                    "unclosed placeholder '{{{}' in {:?}",
                                    name, template
                                )))
                            }
                        }
                    }
                    let field = Field::parse(name.trim()).ok_or_else(|| {
                        LogWrapError::InvalidFormat(format!("unknown field '{}'", name))
                    })?;
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Field(field));
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '}' => {
                    return Err(LogWrapError::InvalidFormat(format!(
                        "unmatched '}}' in {:?}",
                        template
                    )))
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { segments })
    }

    /// Build the standard template from the enabled fields.
    pub fn standard(meta: bool, app_name: bool, instance: bool) -> Self {
        let mut b = SegmentBuilder::default();
        b.field(Field::Asctime).text(",");
        if app_name {
            b.field(Field::App).text(",");
        }
        if meta {
            b.text("[")
                .field(Field::Level)
                .text(":pid=")
                .field(Field::Pid)
                .text(":")
                .field(Field::Thread)
                .text(":");
            if instance {
                b.field(Field::Instance).text(":");
            }
            b.field(Field::Module)
                .text(":")
                .field(Field::Function)
                .text(":")
                .field(Field::Line)
                .text("],");
        } else {
            b.field(Field::Level).text(",");
            if instance {
                b.field(Field::Instance).text(",");
            }
        }
        b.field(Field::Message);
        Self {
            segments: b.segments,
        }
    }

    /// `{asctime},{level},{message}`
    pub fn minimal() -> Self {
        let mut b = SegmentBuilder::default();
        b.field(Field::Asctime)
            .text(",")
            .field(Field::Level)
            .text(",")
            .field(Field::Message);
        Self {
            segments: b.segments,
        }
    }

    /// The template this formatter was built from, escapes restored.
    pub fn template(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => {
                    out.push_str(&text.replace('{', "{{").replace('}', "}}"));
                }
                Segment::Field(field) => {
                    out.push('{');
                    out.push_str(field.name());
                    out.push('}');
                }
            }
        }
        out
    }

    /// Render a record, falling back to the minimal template when the
    /// record lacks a field this template references.
    pub fn format(&self, record: &LogRecord) -> String {
        match self.try_format(record) {
            Some(line) => line,
            None => Self::minimal()
                .try_format(record)
                .unwrap_or_else(|| record.message.clone()),
        }
    }

    fn try_format(&self, record: &LogRecord) -> Option<String> {
        let mut out = String::with_capacity(128);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => match field {
                    Field::Asctime => {
                        let _ = write!(out, "{}", record.timestamp.format(TIMESTAMP_FORMAT));
                    }
                    Field::Name => out.push_str(&record.logger),
                    Field::App => out.push_str(record.app_name.as_deref()?),
                    Field::Level => out.push_str(record.level.as_str()),
                    Field::Pid => {
                        let _ = write!(out, "{}", record.pid);
                    }
                    Field::Thread => out.push_str(&record.thread),
                    Field::Instance => out.push_str(record.instance.as_deref()?),
                    Field::Module => out.push_str(record.call_site?.module),
                    Field::Function => out.push_str(record.call_site?.function),
                    Field::File => out.push_str(record.call_site?.file),
                    Field::Line => {
                        let _ = write!(out, "{}", record.call_site?.line);
                    }
                    Field::Message => out.push_str(&record.message),
                },
            }
        }
        Some(out)
    }
}

#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<Segment>,
}

impl SegmentBuilder {
    fn field(&mut self, field: Field) -> &mut Self {
        self.segments.push(Segment::Field(field));
        self
    }

    fn text(&mut self, text: &str) -> &mut Self {
        match self.segments.last_mut() {
            Some(Segment::Literal(existing)) => existing.push_str(text),
            _ => self.segments.push(Segment::Literal(text.to_string())),
        }
        self
    }
}

/// File name with a capture-time suffix: `app.log` → `app_20230501120000.log`.
///
/// Paths without an extension get `.log`. The directory is kept.
pub fn dated_file_name(path: &Path, at: NaiveDateTime) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOG_EXTENSION.to_string());
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_else(|| DEFAULT_LOG_EXTENSION.to_string());
    let file_name = format!("{}_{}.{}", stem, at.format(FILE_DATE_FORMAT), extension);

    match path.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
