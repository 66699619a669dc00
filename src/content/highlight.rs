//! Syntax highlighting for fenced code blocks

use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use super::pipeline::ConvertError;

/// Code highlighter backed by syntect's bundled syntaxes and themes
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme_set: ThemeSet,
    theme_name: String,
    line_numbers: bool,
}

impl Highlighter {
    pub fn new(theme: &str, line_numbers: bool) -> Self {
        Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme_set: ThemeSet::load_defaults(),
            theme_name: theme.to_string(),
            line_numbers,
        }
    }

    /// Highlight a code block into a `<figure class="highlight">`
    pub fn highlight(&self, code: &str, lang: &str) -> Result<String, ConvertError> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(lang)
            .or_else(|| self.syntax_set.find_syntax_by_extension(lang))
            .unwrap_or_else(|| self.syntax_set.find_syntax_plain_text());

        // Unknown theme names fall back to the first bundled theme
        let theme = self
            .theme_set
            .themes
            .get(&self.theme_name)
            .or_else(|| self.theme_set.themes.values().next())
            .ok_or_else(|| ConvertError::Highlight {
                lang: lang.to_string(),
                message: "no highlighting themes available".to_string(),
            })?;

        let highlighted = highlighted_html_for_string(code, &self.syntax_set, syntax, theme)
            .map_err(|e| ConvertError::Highlight {
                lang: lang.to_string(),
                message: e.to_string(),
            })?;

        let lang = html_escape(lang);
        if self.line_numbers {
            Ok(self.add_line_numbers(code, &highlighted, &lang))
        } else {
            Ok(format!(
                r#"<figure class="highlight {}">{}</figure>"#,
                lang, highlighted
            ))
        }
    }

    fn add_line_numbers(&self, code: &str, highlighted: &str, lang: &str) -> String {
        let line_count = code.lines().count().max(1);
        let gutter = (1..=line_count)
            .map(|n| format!(r#"<span class="line-number">{}</span>"#, n))
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            r#"<figure class="highlight {}"><table><tr><td class="gutter"><pre>{}</pre></td><td class="code">{}</td></tr></table></figure>"#,
            lang, gutter, highlighted
        )
    }
}

/// Simple HTML escaping
pub(crate) fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlight_known_language() {
        let highlighter = Highlighter::new("base16-ocean.dark", false);
        let html = highlighter.highlight("fn main() {}\n", "rust").unwrap();
        assert!(html.starts_with(r#"<figure class="highlight rust">"#));
        assert!(html.contains("<pre"));
        assert!(html.contains("main"));
    }

    #[test]
    fn test_line_numbers() {
        let highlighter = Highlighter::new("base16-ocean.dark", true);
        let html = highlighter.highlight("a\nb\nc\n", "text").unwrap();
        assert!(html.contains(r#"<span class="line-number">3</span>"#));
        assert!(!html.contains(r#"<span class="line-number">4</span>"#));
    }

    #[test]
    fn test_unknown_theme_and_language_fall_back() {
        let highlighter = Highlighter::new("no-such-theme", false);
        let html = highlighter.highlight("<b>x</b>\n", "klingon").unwrap();
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn test_html_escape() {
        assert_eq!(
            html_escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#39;&amp;&#39;&lt;/a&gt;"
        );
    }
}
