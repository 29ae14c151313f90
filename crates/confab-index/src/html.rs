use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

static BLOCK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h1, h2, h3, h4, h5, h6, p, li").expect("static selector is valid")
});

/// Convert Confluence storage-format HTML into markdown-ish text.
///
/// Headings become `#`..`######` lines so the structural splitter can see
/// them, paragraphs are separated by blank lines, and list items become
/// `- ` lines. Everything else contributes its text content.
#[must_use]
pub fn html_to_markdown(html: &str) -> String {
    let fragment = Html::parse_fragment(html);

    let mut out = String::new();
    for element in fragment.select(&BLOCK_SELECTOR) {
        // Nested lists: the inner li is visited on its own, skip it here.
        if element.value().name() == "li" && has_li_ancestor(element) {
            continue;
        }
        let text = collect_text(element);
        if text.is_empty() {
            continue;
        }
        match element.value().name() {
            "h1" => push_block(&mut out, &format!("# {text}")),
            "h2" => push_block(&mut out, &format!("## {text}")),
            "h3" => push_block(&mut out, &format!("### {text}")),
            "h4" => push_block(&mut out, &format!("#### {text}")),
            "h5" => push_block(&mut out, &format!("##### {text}")),
            "h6" => push_block(&mut out, &format!("###### {text}")),
            "li" => push_item(&mut out, &format!("- {text}")),
            _ => push_block(&mut out, &text),
        }
    }
    out.trim_end().to_owned()
}

fn has_li_ancestor(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "li")
}

fn collect_text(element: ElementRef<'_>) -> String {
    let joined: String = element.text().collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_block(out: &mut String, block: &str) {
    if !out.is_empty() {
        out.push_str("\n\n");
    }
    out.push_str(block);
}

/// List items stay on consecutive lines instead of forming paragraphs.
fn push_item(out: &mut String, item: &str) {
    if out.is_empty() {
        // first block
    } else if out.lines().last().is_some_and(|l| l.starts_with("- ")) {
        out.push('\n');
    } else {
        out.push_str("\n\n");
    }
    out.push_str(item);
}
