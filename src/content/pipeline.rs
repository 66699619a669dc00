//! Staged markdown-to-HTML conversion
//!
//! Conversion is an ordered list of [`Stage`]s. Each stage takes the
//! document in one state and hands it on, usually in the next state:
//!
//! ```text
//! Source --parse--> Markdown --to_html--> Html --serialize--> Rendered
//! ```
//!
//! Stages between those steps rewrite the tree in place (front-matter
//! fences, GFM autolinks, callouts, math, highlighting). The stage list is
//! plain data, so tests and callers can build any pipeline they like.

use pulldown_cmark::{Event, Options};
use std::fmt;
use thiserror::Error;

use super::stages::{
    Callouts, FrontMatterFence, Gfm, Highlight, Math, Parse, SerializeHtml, ToHtml,
};
use crate::config::MarkdownConfig;

/// A conversion failure. No partial output accompanies it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConvertError {
    #[error("stage `{stage}` expected {expected} input, found {found}")]
    UnexpectedInput {
        stage: &'static str,
        expected: Phase,
        found: Phase,
    },

    #[error("stage `{stage}` left an unbalanced tree")]
    Unbalanced { stage: &'static str },

    #[error("failed to highlight `{lang}` code block: {message}")]
    Highlight { lang: String, message: String },
}

/// Which state a [`Document`] is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Source,
    Markdown,
    Html,
    Rendered,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Source => "markdown text",
            Phase::Markdown => "markdown tree",
            Phase::Html => "html tree",
            Phase::Rendered => "html text",
        };
        f.write_str(name)
    }
}

/// The value passed from stage to stage
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
    Source(String),
    Markdown(Vec<Event<'static>>),
    Html(Vec<Event<'static>>),
    Rendered(String),
}

impl Document {
    pub fn phase(&self) -> Phase {
        match self {
            Document::Source(_) => Phase::Source,
            Document::Markdown(_) => Phase::Markdown,
            Document::Html(_) => Phase::Html,
            Document::Rendered(_) => Phase::Rendered,
        }
    }

    pub fn into_source(self, stage: &'static str) -> Result<String, ConvertError> {
        match self {
            Document::Source(text) => Ok(text),
            other => Err(other.mismatch(stage, Phase::Source)),
        }
    }

    pub fn into_markdown(self, stage: &'static str) -> Result<Vec<Event<'static>>, ConvertError> {
        match self {
            Document::Markdown(events) => Ok(events),
            other => Err(other.mismatch(stage, Phase::Markdown)),
        }
    }

    pub fn into_html(self, stage: &'static str) -> Result<Vec<Event<'static>>, ConvertError> {
        match self {
            Document::Html(events) => Ok(events),
            other => Err(other.mismatch(stage, Phase::Html)),
        }
    }

    pub fn into_rendered(self, stage: &'static str) -> Result<String, ConvertError> {
        match self {
            Document::Rendered(html) => Ok(html),
            other => Err(other.mismatch(stage, Phase::Rendered)),
        }
    }

    fn mismatch(&self, stage: &'static str, expected: Phase) -> ConvertError {
        ConvertError::UnexpectedInput {
            stage,
            expected,
            found: self.phase(),
        }
    }

    /// Start and end events pair up
    fn is_balanced(&self) -> bool {
        let events = match self {
            Document::Markdown(events) | Document::Html(events) => events,
            Document::Source(_) | Document::Rendered(_) => return true,
        };

        let mut depth: usize = 0;
        for event in events {
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => match depth.checked_sub(1) {
                    Some(d) => depth = d,
                    None => return false,
                },
                _ => {}
            }
        }
        depth == 0
    }
}

/// Parser settings shared by every stage of one run
#[derive(Debug, Clone, Copy)]
pub struct Context {
    pub options: Options,
}

/// One pure, order-dependent transform
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Markdown extensions the parser must recognise for this stage
    fn parse_options(&self) -> Options {
        Options::empty()
    }

    fn apply(&self, doc: Document, cx: &Context) -> Result<Document, ConvertError>;
}

/// An ordered list of stages
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    options: Options,
}

impl Pipeline {
    /// Build a pipeline from an explicit stage list
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        let options = stages
            .iter()
            .fold(Options::empty(), |acc, stage| acc | stage.parse_options());
        Self { stages, options }
    }

    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    /// parse, front-matter fences, GFM, to-html, serialize
    pub fn standard() -> Self {
        Self::builder()
            .stage(Parse)
            .stage(FrontMatterFence::new(true))
            .stage(Gfm::new(true))
            .stage(ToHtml::default())
            .stage(SerializeHtml)
            .build()
    }

    /// The standard pipeline shaped by site configuration
    pub fn from_config(config: &MarkdownConfig) -> Self {
        let mut builder = Self::builder()
            .stage(Parse)
            .stage(FrontMatterFence::new(config.strip_front_matter));

        if config.gfm {
            builder = builder.stage(Gfm::new(config.autolink));
        }

        builder = builder.stage(ToHtml {
            allow_raw_html: config.allow_raw_html,
            heading_ids: config.heading_ids,
        });

        if config.callouts {
            builder = builder.stage(Callouts);
        }
        if config.math {
            builder = builder.stage(Math);
        }
        if config.highlight.enable {
            builder = builder.stage(Highlight::new(
                &config.highlight.theme,
                config.highlight.line_number,
            ));
        }

        builder.stage(SerializeHtml).build()
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Convert markdown text to an HTML string
    pub fn run(&self, markdown: &str) -> Result<String, ConvertError> {
        let cx = Context {
            options: self.options,
        };

        let mut doc = Document::Source(markdown.to_string());
        for stage in &self.stages {
            doc = stage.apply(doc, &cx)?;
            if !doc.is_balanced() {
                return Err(ConvertError::Unbalanced {
                    stage: stage.name(),
                });
            }
            tracing::trace!(stage = stage.name(), phase = %doc.phase(), "stage applied");
        }

        doc.into_rendered("pipeline")
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .field("options", &self.options)
            .finish()
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline::new(self.stages)
    }
}
