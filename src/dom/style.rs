//! Minimal cascade for the two properties visibility checks depend on.
//!
//! Rules come from a small user-agent sheet, every `<style>` block, any
//! fetched linked sheet and the element's `style` attribute. Sheets are
//! tokenized with `cssparser`; selectors and their specificity come from
//! `scraper`. Only `display` and `visibility` are ever asked for, so their
//! values are kept as plain strings and every other declaration is dropped
//! while parsing.

use super::{Document, NodeId};
use cssparser::{
    parse_important, AtRuleParser, CowRcStr, DeclarationListParser, DeclarationParser,
    ParseError, Parser, ParserInput, ParserState, QualifiedRuleParser, RuleListParser, Token,
};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

const USER_AGENT_CSS: &str = "[hidden], head, script, style, template, title { display: none; }";

/// Media types a screen rendering matches.
const SCREEN_MEDIA: &[&str] = &["all", "screen"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Origin {
    UserAgent,
    Author,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Property {
    Display,
    Visibility,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Declaration {
    property: Property,
    value: String,
    important: bool,
}

#[derive(Debug, Clone)]
struct StyleRule {
    // one complex selector, so the rule carries exactly its specificity
    selector: Selector,
    specificity: u32,
    origin: Origin,
    order: usize,
    declarations: Vec<Declaration>,
}

/// Ordered collection of parsed style rules.
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    rules: Vec<StyleRule>,
}

/// Computed values of the properties that can hide an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputedStyle {
    /// Cascaded `display`; `inline` when nothing applies
    pub display: String,
    /// Inherited `visibility`; `visible` at the root
    pub visibility: String,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "inline".to_string(),
            visibility: "visible".to_string(),
        }
    }
}

impl ComputedStyle {
    pub fn hides(&self) -> bool {
        self.display == "none" || self.visibility == "hidden"
    }
}

// Ordering key for competing declarations; larger wins.
type CascadeKey = (bool, Origin, bool, u32, usize);

#[derive(Default)]
struct Cascaded<'s> {
    display: Option<(CascadeKey, &'s str)>,
    visibility: Option<(CascadeKey, &'s str)>,
}

impl<'s> Cascaded<'s> {
    fn offer(&mut self, key: CascadeKey, decl: &'s Declaration) {
        let slot = match decl.property {
            Property::Display => &mut self.display,
            Property::Visibility => &mut self.visibility,
        };
        if slot.map_or(true, |(best, _)| key > best) {
            *slot = Some((key, decl.value.as_str()));
        }
    }
}

impl StyleSheet {
    /// A sheet holding only the built-in user-agent rules.
    pub fn user_agent() -> Self {
        let mut sheet = Self::default();
        sheet.push_css(USER_AGENT_CSS, Origin::UserAgent);
        sheet
    }

    pub fn add_author_css(&mut self, css: &str) {
        self.push_css(css, Origin::Author);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    fn push_css(&mut self, css: &str, origin: Origin) {
        let mut input = ParserInput::new(css);
        let mut parser = Parser::new(&mut input);
        let sink = SheetParser {
            rules: &mut self.rules,
            origin,
        };
        for result in RuleListParser::new_for_stylesheet(&mut parser, sink) {
            if let Err((_, text)) = result {
                log::trace!("skipping rule {:?}", text);
            }
        }
    }

    /// Winning declared `display` and `visibility` for `element`, in one
    /// pass over the rules.
    fn cascade(&self, element: &ElementRef<'_>) -> (Option<String>, Option<String>) {
        let inline = element
            .value()
            .attr("style")
            .map(parse_inline)
            .unwrap_or_default();

        let mut winners = Cascaded::default();
        for rule in &self.rules {
            if !rule.selector.matches(element) {
                continue;
            }
            for decl in &rule.declarations {
                let key = (decl.important, rule.origin, false, rule.specificity, rule.order);
                winners.offer(key, decl);
            }
        }
        for (i, decl) in inline.iter().enumerate() {
            winners.offer((decl.important, Origin::Author, true, 0, i), decl);
        }

        (
            winners.display.map(|(_, v)| v.to_string()),
            winners.visibility.map(|(_, v)| v.to_string()),
        )
    }
}

/// Feeds parsed style rules straight into a sheet.
struct SheetParser<'a> {
    rules: &'a mut Vec<StyleRule>,
    origin: Origin,
}

enum AtRulePrelude {
    /// `@media` that applies, `@supports`, or a `@layer` block
    Group,
    /// `@layer a, b;`
    LayerStatement,
}

impl<'i> QualifiedRuleParser<'i> for SheetParser<'_> {
    type Prelude = Selector;
    type QualifiedRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        input: &mut Parser<'i, 't>,
    ) -> Result<Selector, ParseError<'i, ()>> {
        let text = consume_rest(input);
        Selector::parse(text.trim()).map_err(|_| {
            log::debug!("skipping unsupported selector {:?}", text.trim());
            input.new_custom_error(())
        })
    }

    fn parse_block<'t>(
        &mut self,
        prelude: Selector,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<(), ParseError<'i, ()>> {
        let declarations = parse_declaration_list(input);
        if declarations.is_empty() {
            return Ok(());
        }
        for complex in prelude.selectors.iter() {
            let order = self.rules.len();
            self.rules.push(StyleRule {
                selector: Selector {
                    selectors: std::iter::once(complex.clone()).collect(),
                },
                specificity: complex.specificity(),
                origin: self.origin,
                order,
                declarations: declarations.clone(),
            });
        }
        Ok(())
    }
}

impl<'i> AtRuleParser<'i> for SheetParser<'_> {
    type Prelude = AtRulePrelude;
    type AtRule = ();
    type Error = ();

    fn parse_prelude<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<AtRulePrelude, ParseError<'i, ()>> {
        let name = name.to_ascii_lowercase();
        match name.as_str() {
            "media" if media_applies(input) => Ok(AtRulePrelude::Group),
            "supports" => {
                consume_rest(input);
                Ok(AtRulePrelude::Group)
            }
            "layer" => {
                consume_rest(input);
                Ok(AtRulePrelude::LayerStatement)
            }
            _ => {
                log::trace!("skipping @{} rule", name);
                Err(input.new_custom_error(()))
            }
        }
    }

    fn rule_without_block(
        &mut self,
        prelude: AtRulePrelude,
        _start: &ParserState,
    ) -> Result<(), ()> {
        match prelude {
            AtRulePrelude::LayerStatement => Ok(()),
            AtRulePrelude::Group => Err(()),
        }
    }

    fn parse_block<'t>(
        &mut self,
        _prelude: AtRulePrelude,
        _start: &ParserState,
        input: &mut Parser<'i, 't>,
    ) -> Result<(), ParseError<'i, ()>> {
        let nested = SheetParser {
            rules: &mut *self.rules,
            origin: self.origin,
        };
        for result in RuleListParser::new_for_nested_rule(input, nested) {
            if let Err((_, text)) = result {
                log::trace!("skipping nested rule {:?}", text);
            }
        }
        Ok(())
    }
}

/// Keeps `display` and `visibility`, rejects everything else.
struct DeclParser;

impl<'i> DeclarationParser<'i> for DeclParser {
    type Declaration = Declaration;
    type Error = ();

    fn parse_value<'t>(
        &mut self,
        name: CowRcStr<'i>,
        input: &mut Parser<'i, 't>,
    ) -> Result<Declaration, ParseError<'i, ()>> {
        let property = if name.eq_ignore_ascii_case("display") {
            Property::Display
        } else if name.eq_ignore_ascii_case("visibility") {
            Property::Visibility
        } else {
            return Err(input.new_custom_error(()));
        };

        let start = input.position();
        let mut end = start;
        loop {
            let before = input.state();
            let token = match input.next() {
                Ok(token) => token.clone(),
                Err(_) => break,
            };
            if token == Token::Delim('!') {
                input.reset(&before);
                break;
            }
            end = input.position();
        }
        let value = input.slice(start..end).trim().to_ascii_lowercase();
        let important = input.try_parse(parse_important).is_ok();
        if value.is_empty() {
            return Err(input.new_custom_error(()));
        }
        Ok(Declaration {
            property,
            value,
            important,
        })
    }
}

impl<'i> AtRuleParser<'i> for DeclParser {
    type Prelude = ();
    type AtRule = Declaration;
    type Error = ();
}

fn parse_declaration_list(input: &mut Parser<'_, '_>) -> Vec<Declaration> {
    DeclarationListParser::new(input, DeclParser)
        .filter_map(Result::ok)
        .collect()
}

fn parse_inline(css: &str) -> Vec<Declaration> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    parse_declaration_list(&mut parser)
}

/// Consume every remaining token and return the text they span.
fn consume_rest<'i>(input: &mut Parser<'i, '_>) -> &'i str {
    let start = input.position();
    while input.next().is_ok() {}
    input.slice_from(start)
}

/// Whether a `@media` prelude matches a screen. Feature conditions such as
/// `(min-width: 600px)` are taken as satisfied; only the media type and its
/// `not` / `only` modifiers decide.
fn media_applies(input: &mut Parser<'_, '_>) -> bool {
    // idents as Some, any other token as None; one list per query
    let mut queries: Vec<Vec<Option<String>>> = vec![Vec::new()];
    loop {
        let token = match input.next() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        match token {
            Token::Comma => queries.push(Vec::new()),
            Token::Ident(ident) => {
                if let Some(query) = queries.last_mut() {
                    query.push(Some(ident.to_ascii_lowercase()));
                }
            }
            _ => {
                if let Some(query) = queries.last_mut() {
                    query.push(None);
                }
            }
        }
    }
    // `@media { ... }` has an empty query list, which matches everything
    if queries.len() == 1 && queries[0].is_empty() {
        return true;
    }
    queries.iter().any(|q| query_applies(q))
}

fn query_applies(tokens: &[Option<String>]) -> bool {
    let mut rest = tokens.iter().peekable();
    let negated = match rest.peek() {
        Some(Some(word)) if word == "not" => {
            rest.next();
            true
        }
        Some(Some(word)) if word == "only" => {
            rest.next();
            false
        }
        _ => false,
    };
    let matches = match rest.next() {
        Some(Some(media_type)) if media_type != "and" => SCREEN_MEDIA.contains(&media_type.as_str()),
        // no media type: `(min-width: 600px)` and friends
        _ => true,
    };
    matches != negated
}

/// Memo of computed styles, filled from the root down so an element's
/// inherited `visibility` is read from its parent's entry.
///
/// Build one per pass over a document (a collection run, say) and ask it
/// about as many elements as needed; shared ancestors are resolved once.
pub struct StyleCache<'a> {
    doc: &'a Document,
    entries: HashMap<NodeId, Resolved>,
}

#[derive(Debug, Clone)]
struct Resolved {
    style: ComputedStyle,
    // this element or an ancestor hides
    hidden: bool,
}

impl<'a> StyleCache<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            entries: HashMap::new(),
        }
    }

    /// Number of elements resolved so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn computed_style(&mut self, node: NodeId) -> ComputedStyle {
        self.resolve(node)
            .map(|r| r.style.clone())
            .unwrap_or_default()
    }

    /// Whether `node` or any ancestor computes to `display: none` or
    /// `visibility: hidden`.
    pub fn hidden_in_tree(&mut self, node: NodeId) -> bool {
        self.resolve(node).map_or(false, |r| r.hidden)
    }

    fn resolve(&mut self, node: NodeId) -> Option<&Resolved> {
        let mut pending = Vec::new();
        let mut current = Some(node);
        while let Some(n) = current {
            if self.entries.contains_key(&n) {
                break;
            }
            pending.push(n);
            current = self.doc.parent_element(n);
        }

        let mut parent = current.and_then(|p| self.entries.get(&p)).cloned();
        for n in pending.into_iter().rev() {
            let inherited = parent
                .as_ref()
                .map_or("visible", |p| p.style.visibility.as_str());
            let style = self.doc.style_with_inherited(n, inherited);
            let hidden = parent.as_ref().map_or(false, |p| p.hidden) || style.hides();
            let entry = Resolved { style, hidden };
            self.entries.insert(n, entry.clone());
            parent = Some(entry);
        }
        self.entries.get(&node)
    }
}

impl Document {
    /// Computed `display`/`visibility` of an element.
    ///
    /// Each call resolves the ancestor chain afresh; use a [`StyleCache`]
    /// when asking about many elements.
    pub fn computed_style(&self, node: NodeId) -> ComputedStyle {
        StyleCache::new(self).computed_style(node)
    }

    fn style_with_inherited(&self, node: NodeId, inherited_visibility: &str) -> ComputedStyle {
        let Some(el) = self.element(node) else {
            return ComputedStyle::default();
        };
        let (display, visibility) = self.sheet.cascade(&el);
        let display = display
            .filter(|v| !matches!(v.as_str(), "inherit" | "initial" | "unset"))
            .unwrap_or_else(|| "inline".to_string());
        let visibility = match visibility {
            Some(v) if v == "initial" => "visible".to_string(),
            Some(v) if v != "inherit" && v != "unset" => v,
            _ => inherited_visibility.to_string(),
        };
        ComputedStyle {
            display,
            visibility,
        }
    }

    /// `href`s of `<link rel="stylesheet">` elements, in document order.
    pub fn stylesheet_links(&self) -> Vec<String> {
        let Ok(sel) = Selector::parse("link[href]") else {
            return Vec::new();
        };
        self.html
            .select(&sel)
            .filter(|el| {
                el.value()
                    .attr("rel")
                    .map_or(false, |rel| {
                        rel.split_whitespace()
                            .any(|r| r.eq_ignore_ascii_case("stylesheet"))
                    })
            })
            .filter_map(|el| el.value().attr("href").map(str::to_string))
            .collect()
    }
}

/// Text of every `<style>` element in document order.
pub(crate) fn style_blocks(html: &Html) -> Vec<String> {
    let Ok(sel) = Selector::parse("style") else {
        return Vec::new();
    };
    html.select(&sel)
        .map(|node| node.text().collect::<String>())
        .filter(|css| !css.trim().is_empty())
        .collect()
}
