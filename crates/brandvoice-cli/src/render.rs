use pulldown_cmark::{Options, Parser, html};

/// Renders normalized markdown to an HTML fragment.
pub fn markdown_to_html(markdown: &str) -> String {
    let mut out = String::new();
    html::push_html(&mut out, Parser::new_ext(markdown, Options::ENABLE_STRIKETHROUGH));
    out
}
