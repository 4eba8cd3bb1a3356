//! Read-only view of the tables in an HTML page.
//!
//! The rest of the pipeline walks `Document -> Block -> Row -> Cell` and never
//! sees the HTML parser's types.

use std::sync::LazyLock;

use scraper::{ElementRef, Html, Node, Selector};

static TBODY: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tbody").unwrap());
static TR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());
static TD: LazyLock<Selector> = LazyLock::new(|| Selector::parse("td").unwrap());
static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub blocks: Vec<Block>,
}

/// One table body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub rows: Vec<Row>,
}

/// Data cells of one table row. Header (`th`) cells are not included.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cell {
    /// First non-empty text node directly under the cell, or the whole
    /// cell text when the cell only holds markup.
    pub text: String,
    /// Text of the first link inside the cell.
    pub link_text: Option<String>,
}

impl Document {
    pub fn parse_html(html: &str) -> Document {
        let page = Html::parse_document(html);
        let blocks = page
            .select(&TBODY)
            .map(|tbody| Block {
                rows: tbody
                    .select(&TR)
                    .map(|tr| Row {
                        cells: tr.select(&TD).map(cell_from_element).collect(),
                    })
                    .collect(),
            })
            .collect();
        Document { blocks }
    }
}

impl Row {
    /// Convenience for building rows by hand.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Row {
        Row {
            cells: texts
                .iter()
                .map(|t| Cell {
                    text: t.as_ref().to_string(),
                    link_text: None,
                })
                .collect(),
        }
    }
}

fn cell_from_element(td: ElementRef<'_>) -> Cell {
    let direct = td.children().find_map(|child| match child.value() {
        Node::Text(t) => {
            let t = t.trim();
            (!t.is_empty()).then(|| t.to_string())
        }
        _ => None,
    });
    let text = direct.unwrap_or_else(|| collapse_ws(&element_text(td)));

    let link_text = td
        .select(&ANCHOR)
        .next()
        .map(|a| collapse_ws(&element_text(a)))
        .filter(|t| !t.is_empty());

    Cell { text, link_text }
}

fn element_text(el: ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join("")
}

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
