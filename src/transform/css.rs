//! Stylesheet rewriting using cssparser
//!
//! Provides utilities for:
//! - Splitting a stylesheet into top-level rules by category
//! - Rewriting `@font-face` `src` URLs for resource relocation
//! - Reserializing rules in a fixed category order

use cssparser::{ParseError, Parser, ParserInput, SourcePosition, Token, serialize_string};
use thiserror::Error;

type CssParseError<'i> = ParseError<'i, ()>;

/// A stylesheet that could not be split into rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{reason} at byte {offset}")]
pub struct StylesheetError {
    /// Byte offset into the stylesheet where the problem starts.
    pub offset: usize,
    pub reason: String,
}

impl StylesheetError {
    fn new(offset: usize, reason: impl Into<String>) -> Self {
        Self {
            offset,
            reason: reason.into(),
        }
    }
}

/// Kind of a top-level rule. Declaration order is output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleCategory {
    Charset,
    Import,
    Namespace,
    Media,
    Page,
    Style,
    FontFace,
}

impl RuleCategory {
    /// Category of an at-rule, `None` for at-rules that are not kept.
    fn from_at_keyword(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        Some(match name.as_str() {
            "charset" => RuleCategory::Charset,
            "import" => RuleCategory::Import,
            "namespace" => RuleCategory::Namespace,
            "media" => RuleCategory::Media,
            "page" => RuleCategory::Page,
            "font-face" => RuleCategory::FontFace,
            _ => return None,
        })
    }
}

/// One top-level rule and its source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssRule<'a> {
    pub category: RuleCategory,
    pub text: &'a str,
    /// Byte offset of `text` in the stylesheet.
    pub offset: usize,
}

/// Top-level rules of a stylesheet, in source order.
#[derive(Debug, Default)]
pub struct ParsedStylesheet<'a> {
    pub rules: Vec<CssRule<'a>>,
    /// At-rules outside the kept categories (`@keyframes`, `@supports`, ...).
    pub dropped: usize,
}

/// Result of [`rewrite_stylesheet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenStylesheet {
    pub css: String,
    /// Number of at-rules left out of `css`.
    pub dropped: usize,
}

/// Split a stylesheet into categorized top-level rules.
pub fn parse_stylesheet(css: &str) -> Result<ParsedStylesheet<'_>, StylesheetError> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut sheet = ParsedStylesheet::default();

    loop {
        parser.skip_whitespace();
        let start = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        let category = match &token {
            Token::CDO | Token::CDC => continue,
            Token::AtKeyword(name) => {
                let category = RuleCategory::from_at_keyword(name);
                consume_rule(&mut parser, start, true)?;
                match category {
                    Some(category) => category,
                    None => {
                        sheet.dropped += 1;
                        continue;
                    }
                }
            }
            Token::CurlyBracketBlock => {
                // Rule with an empty prelude; the block is its whole body.
                consume_block(&mut parser, start)?;
                RuleCategory::Style
            }
            _ => {
                consume_rule(&mut parser, start, false)?;
                RuleCategory::Style
            }
        };

        sheet.rules.push(CssRule {
            category,
            text: parser.slice_from(start),
            offset: start.byte_index(),
        });
    }

    Ok(sheet)
}

/// Consume the rest of a rule up to its terminating `;` or `{}` block.
fn consume_rule(parser: &mut Parser, start: SourcePosition, statement: bool) -> Result<(), StylesheetError> {
    loop {
        match parser.next_including_whitespace_and_comments() {
            Ok(Token::Semicolon) if statement => return Ok(()),
            Ok(Token::CurlyBracketBlock) => return consume_block(parser, start),
            // Nested (), [] and function blocks are skipped by the next call.
            Ok(_) => {}
            Err(_) => {
                return Err(StylesheetError::new(
                    start.byte_index(),
                    "rule runs to end of input",
                ));
            }
        }
    }
}

/// Skip a `{}` block whose opening brace was just read.
///
/// The nested parser stops in front of the block's own `}`; only a closed
/// block leaves the outer parser past that point. A `}` that closes an
/// inner block does not count.
fn consume_block(parser: &mut Parser, start: SourcePosition) -> Result<(), StylesheetError> {
    let mut contents_end = None;
    let _ = parser.parse_nested_block(|p| {
        while p.next_including_whitespace_and_comments().is_ok() {}
        contents_end = Some(p.position().byte_index());
        Ok::<_, CssParseError>(())
    });

    match contents_end {
        Some(end) if parser.position().byte_index() > end => Ok(()),
        _ => Err(StylesheetError::new(start.byte_index(), "unterminated block")),
    }
}

/// Rewrite a stylesheet for serving from the asset server.
///
/// Every `url()` in a `@font-face` `src` descriptor is passed to `rewrite`;
/// `Some(new)` replaces it, `None` keeps it. Rules are then emitted in
/// [`RuleCategory`] order, source order within a category. URLs in ordinary
/// style rules are left alone.
pub fn rewrite_stylesheet<F>(css: &str, rewrite: F) -> Result<RewrittenStylesheet, StylesheetError>
where
    F: Fn(&str) -> Option<String>,
{
    let sheet = parse_stylesheet(css)?;

    let mut rules: Vec<(RuleCategory, String)> = Vec::with_capacity(sheet.rules.len());
    for rule in &sheet.rules {
        let text = if rule.category == RuleCategory::FontFace {
            rewrite_font_face(rule.text, &rewrite)
                .map_err(|e| StylesheetError::new(rule.offset + e.offset, e.reason))?
        } else {
            rule.text.to_string()
        };
        rules.push((rule.category, text));
    }

    // Stable sort keeps source order inside each category.
    rules.sort_by_key(|(category, _)| *category);

    let css = rules.into_iter().map(|(_, text)| text).collect::<Vec<_>>().join("\n");
    Ok(RewrittenStylesheet {
        css,
        dropped: sheet.dropped,
    })
}

/// A `url()` occurrence inside a font-face rule.
struct UrlSpan {
    start: usize,
    end: usize,
    url: String,
}

/// Rewrite the `src` URLs of one `@font-face` rule. Offsets in the returned
/// error are relative to `rule`.
fn rewrite_font_face<F>(rule: &str, rewrite: &F) -> Result<String, StylesheetError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut input = ParserInput::new(rule);
    let mut parser = Parser::new(&mut input);

    let mut spans = Vec::new();
    let mut error = None;

    while let Ok(token) = parser.next_including_whitespace_and_comments() {
        if let Token::CurlyBracketBlock = token {
            let _ = parser.parse_nested_block(|p| {
                collect_src_urls(p, &mut spans, &mut error);
                Ok::<_, CssParseError>(())
            });
        }
    }

    if let Some(err) = error {
        return Err(err);
    }

    // Apply replacements in reverse order
    let mut result = rule.to_string();
    for span in spans.into_iter().rev() {
        if let Some(new_url) = rewrite(&span.url) {
            result.replace_range(span.start..span.end, &css_url(&new_url));
        }
    }
    Ok(result)
}

/// Walk the declarations of a font-face block, collecting URLs of `src`.
fn collect_src_urls(parser: &mut Parser, spans: &mut Vec<UrlSpan>, error: &mut Option<StylesheetError>) {
    let mut property: Option<String> = None;
    let mut in_value = false;

    loop {
        let start = parser.position();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };
        let in_src = in_value && property.as_deref().is_some_and(|p| p.eq_ignore_ascii_case("src"));

        match token {
            Token::Semicolon => {
                property = None;
                in_value = false;
            }
            Token::Ident(name) if !in_value && property.is_none() => property = Some(name.to_string()),
            Token::Colon if !in_value && property.is_some() => in_value = true,
            Token::UnquotedUrl(url) if in_src => spans.push(UrlSpan {
                start: start.byte_index(),
                end: parser.position().byte_index(),
                url: url.to_string(),
            }),
            Token::Function(name) if in_src && name.eq_ignore_ascii_case("url") => {
                let mut url = None;
                let mut bad = false;
                let _ = parser.parse_nested_block(|p| {
                    while let Ok(token) = p.next() {
                        match token {
                            Token::QuotedString(value) if url.is_none() => url = Some(value.to_string()),
                            Token::BadString(_) => bad = true,
                            _ => {}
                        }
                    }
                    Ok::<_, CssParseError>(())
                });
                match url {
                    Some(url) if !bad => spans.push(UrlSpan {
                        start: start.byte_index(),
                        end: parser.position().byte_index(),
                        url,
                    }),
                    _ => {
                        error.get_or_insert_with(|| {
                            StylesheetError::new(start.byte_index(), "bad string in font-face src")
                        });
                    }
                }
            }
            Token::BadUrl(_) if in_src => {
                error.get_or_insert_with(|| StylesheetError::new(start.byte_index(), "bad url in font-face src"));
            }
            Token::BadString(_) if in_src => {
                error.get_or_insert_with(|| {
                    StylesheetError::new(start.byte_index(), "bad string in font-face src")
                });
            }
            _ => {}
        }
    }
}

/// Serialize a URL as `url(...)`, quoting only when it has to.
fn css_url(url: &str) -> String {
    let needs_quotes = url
        .chars()
        .any(|c| c.is_ascii_whitespace() || matches!(c, '"' | '\'' | '(' | ')' | '\\'));
    if !needs_quotes {
        return format!("url({url})");
    }

    let mut out = String::from("url(");
    // Writing into a String cannot fail.
    let _ = serialize_string(url, &mut out);
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "http://localhost:8000/4ac4613c-be9c-4f4c-a2b1-01b9fc0b4aa3/";

    fn to_server(url: &str) -> Option<String> {
        let name = url.rsplit(['/', '\\']).next()?;
        Some(format!("{BASE}{name}"))
    }

    #[test]
    fn test_parse_categorizes_rules() {
        let css = r#"
            @charset "utf-8";
            p { margin: 0 }
            @font-face { font-family: A; src: url(a.ttf) }
            @media screen { p { color: red } }
            @import url("base.css");
            @keyframes spin { from { opacity: 0 } to { opacity: 1 } }
            @page { margin: 1em }
            /* comment */
            @namespace epub "http://www.idpf.org/2007/ops";
        "#;

        let sheet = parse_stylesheet(css).unwrap();
        let categories: Vec<_> = sheet.rules.iter().map(|r| r.category).collect();

        assert_eq!(
            categories,
            [
                RuleCategory::Charset,
                RuleCategory::Style,
                RuleCategory::FontFace,
                RuleCategory::Media,
                RuleCategory::Import,
                RuleCategory::Page,
                RuleCategory::Namespace,
            ]
        );
        assert_eq!(sheet.dropped, 1);
        assert_eq!(sheet.rules[1].text, "p { margin: 0 }");
        assert_eq!(sheet.rules[3].text, "@media screen { p { color: red } }");
    }

    #[test]
    fn test_rewrite_orders_rules_by_category() {
        let css = "@font-face{src:url(f.ttf)} p{color:red} @import \"x.css\"; h1{margin:0} @charset \"utf-8\";";

        let out = rewrite_stylesheet(css, to_server).unwrap();

        assert_eq!(
            out.css,
            format!("@charset \"utf-8\";\n@import \"x.css\";\np{{color:red}}\nh1{{margin:0}}\n@font-face{{src:url({BASE}f.ttf)}}")
        );
        assert_eq!(out.dropped, 0);
    }

    #[test]
    fn test_rewrite_font_face_urls_quoted_and_unquoted() {
        let css = r#"@font-face {
  font-family: "Serif";
  src: url("../fonts/Serif.woff2") format("woff2"), url(../fonts/Serif.ttf) format('truetype');
}"#;

        let out = rewrite_stylesheet(css, to_server).unwrap();

        assert!(out.css.contains(&format!("url({BASE}Serif.woff2) format(\"woff2\")")));
        assert!(out.css.contains(&format!("url({BASE}Serif.ttf) format('truetype')")));
        assert!(out.css.contains("font-family: \"Serif\";"));
    }

    #[test]
    fn test_rewrite_leaves_style_rule_urls_alone() {
        let css = "body { background: url(images/bg.png) }";
        let out = rewrite_stylesheet(css, to_server).unwrap();
        assert_eq!(out.css, css);
    }

    #[test]
    fn test_rewrite_skips_urls_the_callback_declines() {
        let css = "@font-face { src: url(data:font/woff2;base64,AAAA) }";
        let out = rewrite_stylesheet(css, |_| None).unwrap();
        assert_eq!(out.css, css);
    }

    #[test]
    fn test_dropped_at_rules_are_counted() {
        let css = "@supports (display: grid) { p { display: grid } } @-webkit-keyframes x { } p { }";
        let out = rewrite_stylesheet(css, to_server).unwrap();
        assert_eq!(out.css, "p { }");
        assert_eq!(out.dropped, 2);
    }

    #[test]
    fn test_unterminated_block_is_an_error() {
        let err = parse_stylesheet("p { color: red } div { color: blue").unwrap_err();
        assert_eq!(err.offset, 17);
        assert_eq!(err.reason, "unterminated block");
    }

    #[test]
    fn test_inner_closing_brace_does_not_close_outer_block() {
        let err = parse_stylesheet("@media screen { p { color: red }").unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.reason, "unterminated block");

        let err = parse_stylesheet("p {} { a { b }").unwrap_err();
        assert_eq!(err.offset, 5);

        let sheet = parse_stylesheet("@media screen { p { color: red } }").unwrap();
        assert_eq!(sheet.rules[0].category, RuleCategory::Media);
    }

    #[test]
    fn test_rule_running_to_end_of_input_is_an_error() {
        let err = parse_stylesheet("@import url(a.css)").unwrap_err();
        assert_eq!(err.offset, 0);
        assert_eq!(err.reason, "rule runs to end of input");
    }

    #[test]
    fn test_bad_url_in_font_face_src_is_an_error() {
        let css = "p{} @font-face { src: url(bad name.ttf) }";
        let err = rewrite_stylesheet(css, to_server).unwrap_err();
        assert_eq!(err.reason, "bad url in font-face src");
        assert_eq!(err.offset, 22);
    }

    #[test]
    fn test_css_url_quotes_when_needed() {
        assert_eq!(css_url("http://h/a.ttf"), "url(http://h/a.ttf)");
        assert_eq!(css_url("http://h/my font.ttf"), "url(\"http://h/my font.ttf\")");
    }

    #[test]
    fn test_empty_stylesheet() {
        let out = rewrite_stylesheet("  /* nothing */ ", to_server).unwrap();
        assert_eq!(out.css, "");
        assert_eq!(out.dropped, 0);
    }
}
