// Markdown → HTML rendering for draft content.

use pulldown_cmark::{html, Options, Parser};

/// Render markdown to an HTML fragment.
///
/// Footnotes are enabled on top of CommonMark; fenced code blocks are part
/// of the core grammar and carry their info string through as a
/// `language-*` class.
pub fn render_html(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, Options::ENABLE_FOOTNOTES);
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_paragraphs() {
        assert_eq!(render_html("hello world"), "<p>hello world</p>\n");
    }

    #[test]
    fn renders_fenced_code_with_language_class() {
        let html = render_html("```python\nprint(1)\n```");
        assert!(html.contains("<pre><code class=\"language-python\">"), "got: {html}");
        assert!(html.contains("print(1)"));
    }

    #[test]
    fn renders_fenced_code_without_language() {
        let html = render_html("```\nplain\n```");
        assert!(html.contains("<pre><code>"), "got: {html}");
    }

    #[test]
    fn renders_footnotes() {
        let html = render_html("text[^1]\n\n[^1]: the note");
        assert!(html.contains("footnote-reference"), "got: {html}");
        assert!(html.contains("the note"));
    }

    #[test]
    fn renders_images_as_img_tags() {
        let html = render_html("![alt](https://example.com/pic.png)");
        assert!(html.contains("<img src=\"https://example.com/pic.png\""), "got: {html}");
    }
}
