//! CSS-subset selectors.
//!
//! Supported: type selectors, `*`, `.class`, `#id`, `[attr]`, `[attr="v"]`,
//! `[attr*="v"]`, `[attr^="v"]`, `[attr$="v"]`, the descendant combinator and
//! comma-separated lists.

use std::fmt;
use std::str::FromStr;

use feedguard_core_types::NodeId;

use crate::errors::SelectorError;
use crate::tree::DocumentTree;

#[derive(Clone, Debug, Eq, PartialEq)]
enum AttrOp {
    Exists,
    Equals(String),
    Contains(String),
    Prefix(String),
    Suffix(String),
}

#[derive(Clone, Debug, Eq, PartialEq)]
struct AttrMatcher {
    name: String,
    op: AttrOp,
}

impl AttrMatcher {
    fn accepts(&self, value: &str) -> bool {
        match &self.op {
            AttrOp::Exists => true,
            AttrOp::Equals(expected) => value == expected,
            AttrOp::Contains(needle) => !needle.is_empty() && value.contains(needle.as_str()),
            AttrOp::Prefix(prefix) => !prefix.is_empty() && value.starts_with(prefix.as_str()),
            AttrOp::Suffix(suffix) => !suffix.is_empty() && value.ends_with(suffix.as_str()),
        }
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatcher>,
}

impl Compound {
    fn matches<D>(&self, doc: &D, node: NodeId) -> bool
    where
        D: DocumentTree + ?Sized,
    {
        if let Some(tag) = &self.tag {
            match doc.tag_name(node) {
                Some(actual) if actual.eq_ignore_ascii_case(tag) => {}
                _ => return false,
            }
        }
        if !self
            .ids
            .iter()
            .all(|id| doc.attribute(node, "id").as_deref() == Some(id.as_str()))
        {
            return false;
        }
        if !self.classes.iter().all(|class| doc.has_class(node, class)) {
            return false;
        }
        self.attrs.iter().all(|matcher| {
            doc.attribute(node, &matcher.name)
                .map(|value| matcher.accepts(&value))
                .unwrap_or(false)
        })
    }
}

/// Compounds joined by descendant combinators, left to right.
#[derive(Clone, Debug, Eq, PartialEq)]
struct Complex {
    compounds: Vec<Compound>,
}

impl Complex {
    fn matches<D>(&self, doc: &D, node: NodeId) -> bool
    where
        D: DocumentTree + ?Sized,
    {
        let Some((subject, ancestors)) = self.compounds.split_last() else {
            return false;
        };
        if !subject.matches(doc, node) {
            return false;
        }
        // Descendant-only chains can bind each compound to the nearest
        // matching ancestor without backtracking.
        let mut current = node;
        for compound in ancestors.iter().rev() {
            loop {
                match doc.parent(current) {
                    Some(parent) => {
                        current = parent;
                        if compound.matches(doc, parent) {
                            break;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }
}

/// Parsed, comma-separated selector list.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SelectorList {
    source: String,
    selectors: Vec<Complex>,
}

impl SelectorList {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        Parser::new(source).parse_list()
    }

    /// Joins several selector sources into one list, keeping their order.
    pub fn parse_all<'a, I>(sources: I) -> Result<Self, SelectorError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let joined = sources.into_iter().collect::<Vec<_>>().join(", ");
        Self::parse(&joined)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn len(&self) -> usize {
        self.selectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    pub fn matches<D>(&self, doc: &D, node: NodeId) -> bool
    where
        D: DocumentTree + ?Sized,
    {
        self.selectors.iter().any(|complex| complex.matches(doc, node))
    }
}

impl FromStr for SelectorList {
    type Err = SelectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SelectorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn parse_list(mut self) -> Result<SelectorList, SelectorError> {
        let mut selectors = Vec::new();
        loop {
            self.skip_ws();
            selectors.push(self.parse_complex()?);
            self.skip_ws();
            match self.peek() {
                None => break,
                Some(',') => self.pos += 1,
                Some(other) => return Err(self.unexpected(other)),
            }
        }
        Ok(SelectorList {
            source: self.source.trim().to_string(),
            selectors,
        })
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        let mut compounds = Vec::new();
        loop {
            self.skip_ws();
            match self.peek() {
                None | Some(',') => break,
                Some(_) => compounds.push(self.parse_compound()?),
            }
        }
        if compounds.is_empty() {
            return Err(match self.peek() {
                Some(found) => self.unexpected(found),
                None => SelectorError::Empty,
            });
        }
        Ok(Complex { compounds })
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let mut compound = Compound::default();
        let mut any = false;
        match self.peek() {
            Some('*') => {
                self.pos += 1;
                any = true;
            }
            Some(c) if is_ident_char(c) => {
                compound.tag = Some(self.ident()?.to_ascii_lowercase());
                any = true;
            }
            _ => {}
        }
        loop {
            match self.peek() {
                Some('.') => {
                    self.pos += 1;
                    compound.classes.push(self.ident()?);
                }
                Some('#') => {
                    self.pos += 1;
                    compound.ids.push(self.ident()?);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attr()?);
                }
                _ => break,
            }
            any = true;
        }
        if !any {
            return Err(match self.peek() {
                Some(found) => self.unexpected(found),
                None => SelectorError::Unterminated(self.source.to_string()),
            });
        }
        Ok(compound)
    }

    fn attr(&mut self) -> Result<AttrMatcher, SelectorError> {
        self.skip_ws();
        let name = self.ident()?.to_ascii_lowercase();
        self.skip_ws();
        let op = match self.peek() {
            Some(']') => {
                self.pos += 1;
                return Ok(AttrMatcher {
                    name,
                    op: AttrOp::Exists,
                });
            }
            Some('=') => {
                self.pos += 1;
                AttrOp::Equals(String::new())
            }
            Some(c @ ('*' | '^' | '$')) => {
                self.pos += 1;
                self.expect('=')?;
                match c {
                    '*' => AttrOp::Contains(String::new()),
                    '^' => AttrOp::Prefix(String::new()),
                    _ => AttrOp::Suffix(String::new()),
                }
            }
            Some(other) => return Err(self.unexpected(other)),
            None => return Err(SelectorError::Unterminated(self.source.to_string())),
        };
        self.skip_ws();
        let value = self.value()?;
        self.skip_ws();
        self.expect(']')?;
        let op = match op {
            AttrOp::Equals(_) => AttrOp::Equals(value),
            AttrOp::Contains(_) => AttrOp::Contains(value),
            AttrOp::Prefix(_) => AttrOp::Prefix(value),
            AttrOp::Suffix(_) => AttrOp::Suffix(value),
            AttrOp::Exists => AttrOp::Exists,
        };
        Ok(AttrMatcher { name, op })
    }

    fn value(&mut self) -> Result<String, SelectorError> {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let start = self.pos;
                while let Some(c) = self.peek() {
                    if c == quote {
                        let value: String = self.chars[start..self.pos].iter().collect();
                        self.pos += 1;
                        return Ok(value);
                    }
                    self.pos += 1;
                }
                Err(SelectorError::Unterminated(self.source.to_string()))
            }
            _ => self.ident(),
        }
    }

    fn ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_ident_char(c)) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(match self.peek() {
                Some(found) => self.unexpected(found),
                None => SelectorError::Unterminated(self.source.to_string()),
            });
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn expect(&mut self, wanted: char) -> Result<(), SelectorError> {
        match self.peek() {
            Some(c) if c == wanted => {
                self.pos += 1;
                Ok(())
            }
            Some(other) => Err(self.unexpected(other)),
            None => Err(SelectorError::Unterminated(self.source.to_string())),
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn unexpected(&self, found: char) -> SelectorError {
        SelectorError::Unexpected {
            selector: self.source.to_string(),
            found,
            offset: self.pos,
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{el, MemoryDocument};

    #[test]
    fn parses_lists_and_attribute_operators() {
        let list = SelectorList::parse(
            "ytd-thumbnail a#thumbnail, a[href*=\"/watch?v=\"], [data-video-id], .a.b",
        )
        .expect("parse");
        assert_eq!(list.len(), 4);
        assert!(SelectorList::parse("a[href^='/shorts/']").is_ok());
        assert!(SelectorList::parse("div[x$=end]").is_ok());
    }

    #[test]
    fn rejects_malformed_selectors() {
        assert_eq!(SelectorList::parse("   "), Err(SelectorError::Empty));
        assert!(matches!(
            SelectorList::parse("a,,b"),
            Err(SelectorError::Unexpected { found: ',', .. })
        ));
        assert!(matches!(
            SelectorList::parse("a[href"),
            Err(SelectorError::Unterminated(_))
        ));
        assert!(SelectorList::parse("a[href=\"x]").is_err());
        assert!(SelectorList::parse("a > b").is_err());
    }

    #[test]
    fn matches_compound_and_descendant_chains() {
        let doc = MemoryDocument::new();
        let root = doc.root();
        let outer = doc
            .insert(
                root,
                el("ytd-thumbnail").class("wide").child(
                    el("div").child(
                        el("a")
                            .attr("id", "thumbnail")
                            .attr("href", "/watch?v=ABCDEFGHIJK"),
                    ),
                ),
            )
            .expect("insert");
        let link = doc.query_first(outer, &SelectorList::parse("a").expect("a")).expect("link");

        let chain = SelectorList::parse("ytd-thumbnail a#thumbnail").expect("chain");
        assert!(chain.matches(&doc, link));
        let wrong_chain = SelectorList::parse("ytd-video-renderer a").expect("wrong");
        assert!(!wrong_chain.matches(&doc, link));

        let href = SelectorList::parse("a[href*=\"/watch?v=\"]").expect("href");
        assert!(href.matches(&doc, link));
        let prefix = SelectorList::parse("a[href^=\"/shorts/\"]").expect("prefix");
        assert!(!prefix.matches(&doc, link));

        let classed = SelectorList::parse("YTD-THUMBNAIL.wide").expect("classed");
        assert!(classed.matches(&doc, outer));
        let missing_class = SelectorList::parse(".wide.narrow").expect("missing");
        assert!(!missing_class.matches(&doc, outer));
    }
}
