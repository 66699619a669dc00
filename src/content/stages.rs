//! Pipeline stages
//!
//! Core stages run in this order: [`Parse`], [`FrontMatterFence`], [`Gfm`],
//! [`ToHtml`], [`SerializeHtml`]. [`Callouts`], [`Math`] and [`Highlight`]
//! are optional and work on the HTML tree, so they sit between `ToHtml`
//! and `SerializeHtml`.

use lazy_static::lazy_static;
use pulldown_cmark::{
    html, BlockQuoteKind, CodeBlockKind, CowStr, Event, LinkType, Options, Parser, Tag, TagEnd,
    TextMergeStream,
};
use regex::Regex;
use std::collections::HashMap;

use super::highlight::{html_escape, Highlighter};
use super::pipeline::{Context, ConvertError, Document, Stage};

lazy_static! {
    static ref BARE_URL: Regex = Regex::new(r"(?:https?://|www\.)[^\s<]+").unwrap();
}

/// Markdown text to markdown tree
pub struct Parse;

impl Stage for Parse {
    fn name(&self) -> &'static str {
        "parse"
    }

    fn apply(&self, doc: Document, cx: &Context) -> Result<Document, ConvertError> {
        let source = doc.into_source(self.name())?;
        let events = TextMergeStream::new(Parser::new_ext(&source, cx.options))
            .map(Event::into_static)
            .collect();
        Ok(Document::Markdown(events))
    }
}

/// Recognises a `---` metadata block left at the top of the body.
/// Stripped by default; otherwise kept as a `yaml` code block.
pub struct FrontMatterFence {
    strip: bool,
}

impl FrontMatterFence {
    pub fn new(strip: bool) -> Self {
        Self { strip }
    }
}

impl Stage for FrontMatterFence {
    fn name(&self) -> &'static str {
        "front-matter-fence"
    }

    fn parse_options(&self) -> Options {
        Options::ENABLE_YAML_STYLE_METADATA_BLOCKS
    }

    fn apply(&self, doc: Document, _cx: &Context) -> Result<Document, ConvertError> {
        let events = doc.into_markdown(self.name())?;
        let mut out = Vec::with_capacity(events.len());
        let mut inside = false;

        for event in events {
            match event {
                Event::Start(Tag::MetadataBlock(_)) => {
                    inside = true;
                    if !self.strip {
                        out.push(Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(
                            CowStr::Borrowed("yaml"),
                        ))));
                    }
                }
                Event::End(TagEnd::MetadataBlock(_)) => {
                    inside = false;
                    if !self.strip {
                        out.push(Event::End(TagEnd::CodeBlock));
                    }
                }
                other if inside => {
                    if !self.strip {
                        out.push(other);
                    }
                }
                other => out.push(other),
            }
        }

        Ok(Document::Markdown(out))
    }
}

/// GitHub-flavored extensions: tables, strikethrough, task lists,
/// footnotes and bare-URL autolinks
pub struct Gfm {
    autolink: bool,
}

impl Gfm {
    pub fn new(autolink: bool) -> Self {
        Self { autolink }
    }
}

impl Stage for Gfm {
    fn name(&self) -> &'static str {
        "gfm"
    }

    fn parse_options(&self) -> Options {
        Options::ENABLE_TABLES
            | Options::ENABLE_STRIKETHROUGH
            | Options::ENABLE_TASKLISTS
            | Options::ENABLE_FOOTNOTES
    }

    fn apply(&self, doc: Document, _cx: &Context) -> Result<Document, ConvertError> {
        let events = doc.into_markdown(self.name())?;
        if !self.autolink {
            return Ok(Document::Markdown(events));
        }
        Ok(Document::Markdown(autolink(events)))
    }
}

/// Turn bare URLs in plain text into links. Text inside links, images,
/// code and raw HTML is left alone.
fn autolink(events: Vec<Event<'static>>) -> Vec<Event<'static>> {
    let mut out = Vec::with_capacity(events.len());
    let mut opaque: usize = 0;

    for event in events {
        match &event {
            Event::Start(
                Tag::Link { .. }
                | Tag::Image { .. }
                | Tag::CodeBlock(_)
                | Tag::HtmlBlock
                | Tag::MetadataBlock(_),
            ) => opaque += 1,
            Event::End(
                TagEnd::Link
                | TagEnd::Image
                | TagEnd::CodeBlock
                | TagEnd::HtmlBlock
                | TagEnd::MetadataBlock(_),
            ) => opaque = opaque.saturating_sub(1),
            Event::Text(text) if opaque == 0 => {
                link_text(text, &mut out);
                continue;
            }
            _ => {}
        }
        out.push(event);
    }

    out
}

fn link_text(text: &str, out: &mut Vec<Event<'static>>) {
    let mut last = 0;

    for m in BARE_URL.find_iter(text) {
        if !at_word_boundary(text, m.start()) {
            continue;
        }

        let url = trim_url(m.as_str());
        let host = url
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_start_matches("www.");
        if host.is_empty() || host.starts_with('/') {
            continue;
        }

        if m.start() > last {
            out.push(Event::Text(text[last..m.start()].to_string().into()));
        }

        let dest = if url.starts_with("www.") {
            format!("http://{}", url)
        } else {
            url.to_string()
        };
        out.push(Event::Start(Tag::Link {
            link_type: LinkType::Autolink,
            dest_url: dest.into(),
            title: CowStr::Borrowed(""),
            id: CowStr::Borrowed(""),
        }));
        out.push(Event::Text(url.to_string().into()));
        out.push(Event::End(TagEnd::Link));

        last = m.start() + url.len();
    }

    if last < text.len() {
        out.push(Event::Text(text[last..].to_string().into()));
    }
}

/// Autolinks start at the beginning of text or after whitespace or an
/// opening delimiter
fn at_word_boundary(text: &str, start: usize) -> bool {
    match text[..start].chars().next_back() {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '*' | '_' | '~' | '('),
    }
}

/// Drop trailing punctuation and unbalanced closing parens
fn trim_url(url: &str) -> &str {
    let mut end = url.len();
    while let Some(last) = url[..end].chars().next_back() {
        let candidate = &url[..end];
        let trim = match last {
            '?' | '!' | '.' | ',' | ':' | ';' | '*' | '_' | '~' | '\'' | '"' => true,
            ')' => candidate.matches(')').count() > candidate.matches('(').count(),
            _ => false,
        };
        if !trim {
            break;
        }
        end -= last.len_utf8();
    }
    &url[..end]
}

/// Markdown tree to HTML tree.
///
/// Unless `allow_raw_html` is set, raw HTML is escaped into text and links
/// or images with script-capable schemes lose their destination.
#[derive(Debug, Clone, Default)]
pub struct ToHtml {
    pub allow_raw_html: bool,
    /// Give headings slug ids (`<h2 id="setup">`)
    pub heading_ids: bool,
}

impl Stage for ToHtml {
    fn name(&self) -> &'static str {
        "to-html"
    }

    fn apply(&self, doc: Document, _cx: &Context) -> Result<Document, ConvertError> {
        let events = doc.into_markdown(self.name())?;
        let mut out: Vec<Event<'static>> = Vec::with_capacity(events.len());
        let mut heading: Option<(usize, String)> = None;
        let mut seen_ids: HashMap<String, usize> = HashMap::new();

        for event in events {
            let event = if self.allow_raw_html {
                event
            } else {
                sanitize(event)
            };

            match &event {
                Event::Start(Tag::Heading { id: None, .. }) if self.heading_ids => {
                    heading = Some((out.len(), String::new()));
                }
                Event::Text(text) | Event::Code(text) => {
                    if let Some((_, buf)) = heading.as_mut() {
                        buf.push_str(text);
                    }
                }
                Event::End(TagEnd::Heading(_)) => {
                    if let Some((index, text)) = heading.take() {
                        let anchor = unique_id(&text, &mut seen_ids);
                        if let Event::Start(Tag::Heading { id, .. }) = &mut out[index] {
                            *id = Some(anchor.into());
                        }
                    }
                }
                _ => {}
            }

            out.push(event);
        }

        Ok(Document::Html(out))
    }
}

fn sanitize(event: Event<'static>) -> Event<'static> {
    match event {
        Event::Html(raw) | Event::InlineHtml(raw) => Event::Text(raw),
        Event::Start(Tag::HtmlBlock) => Event::Start(Tag::Paragraph),
        Event::End(TagEnd::HtmlBlock) => Event::End(TagEnd::Paragraph),
        Event::Start(Tag::Link {
            link_type,
            dest_url,
            title,
            id,
        }) if !is_safe_url(&dest_url) => Event::Start(Tag::Link {
            link_type,
            dest_url: CowStr::Borrowed(""),
            title,
            id,
        }),
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) if !is_safe_url(&dest_url) => Event::Start(Tag::Image {
            link_type,
            dest_url: CowStr::Borrowed(""),
            title,
            id,
        }),
        other => other,
    }
}

/// Relative URLs and http(s)/mailto/tel are safe
fn is_safe_url(url: &str) -> bool {
    let url = url.trim();
    match url.find([':', '/', '?', '#']) {
        Some(i) if url[i..].starts_with(':') => {
            let scheme = url[..i].to_ascii_lowercase();
            matches!(scheme.as_str(), "http" | "https" | "mailto" | "tel")
        }
        _ => true,
    }
}

fn unique_id(text: &str, seen: &mut HashMap<String, usize>) -> String {
    let mut base = slug::slugify(text);
    if base.is_empty() {
        base = "section".to_string();
    }

    let count = seen.entry(base.clone()).or_insert(0);
    let id = if *count == 0 {
        base
    } else {
        format!("{}-{}", base, count)
    };
    *count += 1;
    id
}

/// GitHub alert blockquotes (`> [!NOTE]`) get a title paragraph
pub struct Callouts;

impl Stage for Callouts {
    fn name(&self) -> &'static str {
        "callouts"
    }

    fn parse_options(&self) -> Options {
        Options::ENABLE_GFM
    }

    fn apply(&self, doc: Document, _cx: &Context) -> Result<Document, ConvertError> {
        let events = doc.into_html(self.name())?;
        let mut out = Vec::with_capacity(events.len());

        for event in events {
            let title = match &event {
                Event::Start(Tag::BlockQuote(Some(kind))) => Some(callout_title(kind)),
                _ => None,
            };
            out.push(event);
            if let Some(title) = title {
                out.push(Event::Html(
                    format!(r#"<p class="markdown-alert-title">{}</p>"#, title).into(),
                ));
            }
        }

        Ok(Document::Html(out))
    }
}

fn callout_title(kind: &BlockQuoteKind) -> &'static str {
    match kind {
        BlockQuoteKind::Note => "Note",
        BlockQuoteKind::Tip => "Tip",
        BlockQuoteKind::Important => "Important",
        BlockQuoteKind::Warning => "Warning",
        BlockQuoteKind::Caution => "Caution",
    }
}

/// `$inline$` and `$$display$$` math, emitted with KaTeX auto-render
/// delimiters for client-side typesetting
pub struct Math;

impl Stage for Math {
    fn name(&self) -> &'static str {
        "math"
    }

    fn parse_options(&self) -> Options {
        Options::ENABLE_MATH
    }

    fn apply(&self, doc: Document, _cx: &Context) -> Result<Document, ConvertError> {
        let events = doc.into_html(self.name())?;
        let out = events
            .into_iter()
            .map(|event| match event {
                Event::InlineMath(tex) => Event::InlineHtml(
                    format!(
                        r#"<span class="math math-inline">\({}\)</span>"#,
                        html_escape(&tex)
                    )
                    .into(),
                ),
                Event::DisplayMath(tex) => Event::InlineHtml(
                    format!(
                        r#"<span class="math math-display">\[{}\]</span>"#,
                        html_escape(&tex)
                    )
                    .into(),
                ),
                other => other,
            })
            .collect();

        Ok(Document::Html(out))
    }
}

/// Syntax highlighting for fenced code blocks that name a language
pub struct Highlight {
    highlighter: Highlighter,
}

impl Highlight {
    pub fn new(theme: &str, line_numbers: bool) -> Self {
        Self {
            highlighter: Highlighter::new(theme, line_numbers),
        }
    }
}

impl Stage for Highlight {
    fn name(&self) -> &'static str {
        "highlight"
    }

    fn apply(&self, doc: Document, _cx: &Context) -> Result<Document, ConvertError> {
        let events = doc.into_html(self.name())?;
        let mut out = Vec::with_capacity(events.len());
        // (language, collected code) while inside a fenced block
        let mut block: Option<(String, String)> = None;

        for event in events {
            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(ref info)))
                    if !info_language(info).is_empty() =>
                {
                    block = Some((info_language(info).to_string(), String::new()));
                }
                Event::Text(ref text) if block.is_some() => {
                    if let Some((_, code)) = block.as_mut() {
                        code.push_str(text);
                    }
                }
                Event::End(TagEnd::CodeBlock) if block.is_some() => {
                    if let Some((lang, code)) = block.take() {
                        let highlighted = self.highlighter.highlight(&code, &lang)?;
                        out.push(Event::Html(highlighted.into()));
                    }
                }
                other => out.push(other),
            }
        }

        Ok(Document::Html(out))
    }
}

/// First word of a fence info string (`rust,ignore` -> `rust`)
fn info_language(info: &str) -> &str {
    info.split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .unwrap_or("")
}

/// HTML tree to string
pub struct SerializeHtml;

impl Stage for SerializeHtml {
    fn name(&self) -> &'static str {
        "serialize"
    }

    fn apply(&self, doc: Document, _cx: &Context) -> Result<Document, ConvertError> {
        let events = doc.into_html(self.name())?;
        let mut output = String::new();
        html::push_html(&mut output, events.into_iter());
        Ok(Document::Rendered(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::pipeline::Pipeline;

    fn render(markdown: &str) -> String {
        Pipeline::standard().run(markdown).unwrap()
    }

    fn render_with(markdown: &str, extra: impl Stage + 'static) -> String {
        Pipeline::builder()
            .stage(Parse)
            .stage(FrontMatterFence::new(true))
            .stage(Gfm::new(true))
            .stage(ToHtml::default())
            .stage(extra)
            .stage(SerializeHtml)
            .build()
            .run(markdown)
            .unwrap()
    }

    #[test]
    fn test_table() {
        let html = render("| Name | Value |\n|------|-------|\n| a | 1 |\n");
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>Name</th>"));
        assert!(html.contains("<td>1</td>"));
    }

    #[test]
    fn test_strikethrough_and_tasklist() {
        let html = render("~~gone~~\n\n- [x] done\n- [ ] open\n");
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains(r#"type="checkbox""#));
        assert!(html.contains("checked"));
    }

    #[test]
    fn test_footnotes() {
        let html = render("Claim.[^1]\n\n[^1]: Source.\n");
        assert!(html.contains("footnote"));
    }

    #[test]
    fn test_autolink_bare_urls() {
        let html = render("see https://example.com/a_b. or www.rust-lang.org");
        assert!(html.contains(r#"<a href="https://example.com/a_b">https://example.com/a_b</a>."#));
        assert!(html.contains(r#"<a href="http://www.rust-lang.org">www.rust-lang.org</a>"#));
    }

    #[test]
    fn test_autolink_skips_code_and_links() {
        let html = render("`https://in.code`\n\n[label](https://x.org) and <https://y.org>\n\n```\nhttps://in.block\n```\n");
        assert!(!html.contains(r#"href="https://in.code""#));
        assert!(!html.contains(r#"href="https://in.block""#));
        assert_eq!(html.matches("<a ").count(), 2);
    }

    #[test]
    fn test_autolink_balanced_parens() {
        let html = render("(see https://en.wikipedia.org/wiki/Rust_(language))");
        assert!(html.contains(r#"href="https://en.wikipedia.org/wiki/Rust_(language)""#));
    }

    #[test]
    fn test_autolink_disabled() {
        let html = Pipeline::builder()
            .stage(Parse)
            .stage(Gfm::new(false))
            .stage(ToHtml::default())
            .stage(SerializeHtml)
            .build()
            .run("https://example.com")
            .unwrap();
        assert!(!html.contains("<a "));
    }

    #[test]
    fn test_raw_html_is_escaped() {
        let html = render("<script>alert(1)</script>\n\ninline <b>bold</b>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&lt;b&gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn test_raw_html_allowed() {
        let html = Pipeline::builder()
            .stage(Parse)
            .stage(ToHtml {
                allow_raw_html: true,
                heading_ids: false,
            })
            .stage(SerializeHtml)
            .build()
            .run("<div class=\"x\">hi</div>\n")
            .unwrap();
        assert!(html.contains(r#"<div class="x">hi</div>"#));
    }

    #[test]
    fn test_unsafe_link_scheme_removed() {
        let html = render("[click](javascript:alert(1)) [ok](/posts/x) [mail](mailto:a@b.c)");
        assert!(!html.contains("javascript:"));
        assert!(html.contains(r#"href="/posts/x""#));
        assert!(html.contains(r#"href="mailto:a@b.c""#));
    }

    #[test]
    fn test_heading_ids_are_unique() {
        let html = Pipeline::builder()
            .stage(Parse)
            .stage(ToHtml {
                allow_raw_html: false,
                heading_ids: true,
            })
            .stage(SerializeHtml)
            .build()
            .run("# Setup\n\n## Setup\n\n## `cargo` usage\n")
            .unwrap();
        assert!(html.contains(r#"<h1 id="setup">Setup</h1>"#));
        assert!(html.contains(r#"<h2 id="setup-1">Setup</h2>"#));
        assert!(html.contains(r#"id="cargo-usage""#));
    }

    #[test]
    fn test_residual_front_matter_stripped() {
        let html = render("---\ntitle: again\n---\n\nBody text\n");
        assert!(!html.contains("title: again"));
        assert!(html.contains("<p>Body text</p>"));
    }

    #[test]
    fn test_residual_front_matter_kept_as_code() {
        let html = Pipeline::builder()
            .stage(Parse)
            .stage(FrontMatterFence::new(false))
            .stage(ToHtml::default())
            .stage(SerializeHtml)
            .build()
            .run("---\ntitle: again\n---\n\nBody\n")
            .unwrap();
        assert!(html.contains(r#"<code class="language-yaml">title: again"#));
    }

    #[test]
    fn test_callouts() {
        let html = render_with("> [!WARNING]\n> Mind the gap.\n", Callouts);
        assert!(html.contains(r#"<p class="markdown-alert-title">Warning</p>"#));
        assert!(html.contains("Mind the gap."));

        let plain = render("> [!WARNING]\n> Mind the gap.\n");
        assert!(!plain.contains("markdown-alert-title"));
    }

    #[test]
    fn test_math() {
        let html = render_with("Euler: $e^{i\\pi} < 0$\n\n$$x^2$$\n", Math);
        assert!(html.contains(r#"<span class="math math-inline">\(e^{i\pi} &lt; 0\)</span>"#));
        assert!(html.contains(r#"<span class="math math-display">\[x^2\]</span>"#));

        let plain = render("costs $5 and $6");
        assert!(plain.contains("costs $5 and $6"));
    }

    #[test]
    fn test_highlight_fenced_code() {
        let html = render_with(
            "```rust\nfn main() {}\n```\n\n```\nplain\n```\n",
            Highlight::new("base16-ocean.dark", false),
        );
        assert!(html.contains(r#"<figure class="highlight rust">"#));
        assert!(html.contains("<pre><code>plain\n</code></pre>"));
    }

    #[test]
    fn test_optional_stage_before_to_html_fails() {
        let err = Pipeline::builder()
            .stage(Parse)
            .stage(Math)
            .stage(ToHtml::default())
            .stage(SerializeHtml)
            .build()
            .run("$x$")
            .unwrap_err();
        assert!(matches!(
            err,
            ConvertError::UnexpectedInput { stage: "math", .. }
        ));
    }

    #[test]
    fn test_trim_url() {
        assert_eq!(trim_url("https://a.org/x."), "https://a.org/x");
        assert_eq!(trim_url("https://a.org/x)"), "https://a.org/x");
        assert_eq!(trim_url("https://a.org/(x)"), "https://a.org/(x)");
        assert_eq!(trim_url("https://a.org/?q=1!"), "https://a.org/?q=1");
    }

    #[test]
    fn test_info_language() {
        assert_eq!(info_language("rust,ignore"), "rust");
        assert_eq!(info_language("python title=\"x\""), "python");
        assert_eq!(info_language(""), "");
    }
}
