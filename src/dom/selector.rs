use crate::config::CustomSelectors;
use crate::dom::document::{Document, NodeId};
use crate::error::DomError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrTest {
    Present(String),
    Equals(String, String),
}

/// One compound selector: `tag#id.class[attr][attr=value]`.
/// Combinators are not supported.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Selector {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrTest>,
}

impl Selector {
    pub fn parse(text: &str) -> Result<Selector, DomError> {
        let invalid = || DomError::InvalidSelector(text.to_string());
        let src = text.trim();
        if src.is_empty() || has_whitespace_outside_brackets(src) {
            return Err(invalid());
        }

        let mut selector = Selector::default();
        let mut chars = src.char_indices().peekable();
        let ident_end = |from: usize| {
            src[from..]
                .find(['#', '.', '['])
                .map(|i| from + i)
                .unwrap_or(src.len())
        };

        if let Some(&(_, c)) = chars.peek() {
            if c != '#' && c != '.' && c != '[' {
                let end = ident_end(0);
                if c == '*' && end == 1 {
                    // universal selector, no tag constraint
                } else {
                    selector.tag = Some(src[..end].to_ascii_lowercase());
                }
                while chars.peek().is_some_and(|(i, _)| *i < end) {
                    chars.next();
                }
            }
        }

        while let Some((i, c)) = chars.next() {
            match c {
                '#' | '.' => {
                    let end = ident_end(i + 1);
                    let name = &src[i + 1..end];
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    if c == '#' {
                        selector.id = Some(name.to_string());
                    } else {
                        selector.classes.push(name.to_string());
                    }
                    while chars.peek().is_some_and(|(j, _)| *j < end) {
                        chars.next();
                    }
                }
                '[' => {
                    let close = src[i..].find(']').map(|j| i + j).ok_or_else(invalid)?;
                    let body = &src[i + 1..close];
                    let test = match body.split_once('=') {
                        Some((name, value)) => AttrTest::Equals(
                            name.trim().to_string(),
                            value.trim().trim_matches(['"', '\'']).to_string(),
                        ),
                        None => AttrTest::Present(body.trim().to_string()),
                    };
                    if matches!(&test, AttrTest::Present(n) | AttrTest::Equals(n, _) if n.is_empty())
                    {
                        return Err(invalid());
                    }
                    selector.attrs.push(test);
                    while chars.peek().is_some_and(|(j, _)| *j <= close) {
                        chars.next();
                    }
                }
                _ => return Err(invalid()),
            }
        }

        Ok(selector)
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Ok(el) = doc.element(node) else {
            return false;
        };

        if self.tag.as_deref().is_some_and(|t| t != el.tag) {
            return false;
        }
        if self.id.as_deref().is_some_and(|id| el.attr("id") != Some(id)) {
            return false;
        }
        if !self.classes.iter().all(|c| el.classes().any(|have| have == c)) {
            return false;
        }
        self.attrs.iter().all(|test| match test {
            AttrTest::Present(name) => el.attr(name).is_some(),
            AttrTest::Equals(name, value) => el.attr(name) == Some(value.as_str()),
        })
    }
}

fn has_whitespace_outside_brackets(src: &str) -> bool {
    let mut depth = 0usize;
    for c in src.chars() {
        match c {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => return true,
            _ => {}
        }
    }
    false
}

/// Comma-separated selector group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorList(Vec<Selector>);

impl SelectorList {
    pub fn parse(text: &str) -> Result<SelectorList, DomError> {
        text.split(',')
            .map(Selector::parse)
            .collect::<Result<Vec<_>, _>>()
            .map(SelectorList)
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.0.iter().any(|s| s.matches(doc, node))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, selector: Selector) {
        self.0.push(selector);
    }
}

/// Compiled include/exclude lists for one host.
#[derive(Debug, Clone, Default)]
pub struct SelectorFilter {
    include: SelectorList,
    exclude: SelectorList,
}

impl SelectorFilter {
    /// Unparseable entries are skipped with a warning rather than poisoning
    /// the whole list.
    pub fn compile(selectors: &CustomSelectors) -> SelectorFilter {
        let compile_list = |list: &[String]| {
            let mut out = SelectorList::default();
            for text in list {
                match SelectorList::parse(text) {
                    Ok(parsed) => out.0.extend(parsed.0),
                    Err(e) => tracing::warn!(selector = %text, error = %e, "skipping custom selector"),
                }
            }
            out
        };

        SelectorFilter {
            include: compile_list(&selectors.include),
            exclude: compile_list(&selectors.exclude),
        }
    }

    pub fn is_included(&self, doc: &Document, node: NodeId) -> bool {
        self.include.matches(doc, node)
    }

    pub fn is_excluded(&self, doc: &Document, node: NodeId) -> bool {
        self.exclude.matches(doc, node)
    }
}

/// A selector that identifies `node` well enough to be stored in a custom
/// include/exclude list.
pub fn selector_for(doc: &Document, node: NodeId) -> Result<String, DomError> {
    let el = doc.element(node)?;

    if let Some(id) = el.attr("id") {
        return Ok(format!("{}#{}", el.tag, id));
    }

    let classes: Vec<&str> = el.classes().collect();
    if !classes.is_empty() {
        return Ok(format!("{}.{}", el.tag, classes.join(".")));
    }

    if let Some(href) = el.attr("href") {
        return Ok(format!("{}[href=\"{}\"]", el.tag, href));
    }

    if let Some(role) = el.attr("role") {
        return Ok(format!("{}[role=\"{}\"]", el.tag, role));
    }

    Ok(el.tag.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_combinators_and_empty_parts() {
        assert!(Selector::parse("div a").is_err());
        assert!(Selector::parse("div.").is_err());
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("a[]").is_err());
    }

    #[test]
    fn parse_compound() {
        let s = Selector::parse("A#main.card.big[data-x=\"1\"][hidden]").unwrap();
        assert_eq!(s.tag.as_deref(), Some("a"));
        assert_eq!(s.id.as_deref(), Some("main"));
        assert_eq!(s.classes, vec!["card", "big"]);
        assert_eq!(
            s.attrs,
            vec![
                AttrTest::Equals("data-x".into(), "1".into()),
                AttrTest::Present("hidden".into())
            ]
        );
    }
}
