//! Template substitution over the rendered HTML, using `minijinja`.
//!
//! Metadata header values are available as variables. Functions:
//!
//! | expression                    | result                          |
//! |-------------------------------|---------------------------------|
//! | `{{ today() }}`               | `19th of October, 2026` (UTC)   |
//! | `{{ space(name) }}`           | `name` with one trailing space  |
//! | `{{ underscore('x') }}`       | `<u>x</u>`                      |
//! | `{{ italic('x') }}`           | `<i>x</i>`                      |
//! | `{{ bold(italic('x')) }}`     | `<b><i>x</i></b>`               |
//!
//! Output is not auto-escaped: the markup lands in the HTML and is folded
//! into paragraph markup by the tag tree. Missing variables render empty.

use chrono::{Datelike, NaiveDate, Utc};
use minijinja::{Environment, Value};

use crate::error::{Md2PdfError, Result};
use crate::markdown::Headers;

/// Escaped ampersand; every `&` of a template source is replaced by it
/// before rendering.
pub const AMPERSAND: &str = "&amp;";

/// Renders an HTML template against the document's metadata headers.
pub trait TemplateEngine {
    fn render(&self, source: &str, headers: &Headers) -> Result<String>;
}

/// The default [`TemplateEngine`].
pub struct JinjaEngine {
    env: Environment<'static>,
}

/// Function arguments as text; `none` and undefined values are empty.
fn text(value: &Value) -> String {
    if value.is_undefined() || value.is_none() {
        String::new()
    } else {
        value.to_string()
    }
}

fn today_fn() -> String {
    today_long()
}

fn space_fn(value: Value) -> String {
    append_space(&text(&value))
}

fn underscore_fn(value: Value) -> String {
    format!("<u>{}</u>", text(&value))
}

fn italic_fn(value: Value) -> String {
    format!("<i>{}</i>", text(&value))
}

fn bold_fn(value: Value) -> String {
    format!("<b>{}</b>", text(&value))
}

impl JinjaEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_keep_trailing_newline(true);
        env.add_function("today", today_fn);
        env.add_function("space", space_fn);
        env.add_function("underscore", underscore_fn);
        env.add_function("italic", italic_fn);
        env.add_function("bold", bold_fn);
        Self { env }
    }
}

impl Default for JinjaEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateEngine for JinjaEngine {
    fn render(&self, source: &str, headers: &Headers) -> Result<String> {
        let source = source.replace('&', AMPERSAND);
        self.env
            .render_str(&source, headers)
            .map_err(|e| Md2PdfError::Template(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `1st`, `2nd`, `3rd`, `4th`, ... with `11th`–`13th`.
pub fn ordinal(n: u32) -> String {
    let suffix = if (11..=13).contains(&(n % 100)) {
        "th"
    } else {
        match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        }
    };
    format!("{n}{suffix}")
}

/// Today's UTC date as `10th of July, 2023`.
pub fn today_long() -> String {
    today_long_at(Utc::now().date_naive())
}

pub fn today_long_at(date: NaiveDate) -> String {
    format!("{} of {}", ordinal(date.day()), date.format("%B, %Y"))
}

/// Append a space unless `value` is empty or already ends with one.
pub fn append_space(value: &str) -> String {
    if value.is_empty() || value.ends_with(' ') {
        value.to_string()
    } else {
        format!("{value} ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value as Json;

    fn render(source: &str, headers: &[(&str, &str)]) -> String {
        let mut map = Headers::new();
        for (k, v) in headers {
            map.insert(k.to_string(), Json::String(v.to_string()));
        }
        JinjaEngine::new().render(source, &map).unwrap()
    }

    #[test]
    fn plain_sources() {
        assert_eq!(render("", &[]), "");
        assert_eq!(render("no headers {{ value }}", &[]), "no headers ");
        assert_eq!(
            render("with headers {{ value }}", &[("value", "with value")]),
            "with headers with value"
        );
        assert_eq!(render("<p>x</p>\n", &[]), "<p>x</p>\n");
    }

    #[test]
    fn ampersands_are_escaped_first() {
        assert_eq!(render("a &lt; b", &[]), "a &amp;lt; b");
        assert_eq!(render("{{ x }} &amp;", &[("x", "y")]), "y &amp;amp;");
    }

    #[test]
    fn decoration_functions_nest() {
        assert_eq!(render("{{ underscore('u') }}", &[]), "<u>u</u>");
        assert_eq!(render("{{ bold(italic('x')) }}", &[]), "<b><i>x</i></b>");
        assert_eq!(render("{{ italic(bold(\"y\")) }}", &[]), "<i><b>y</b></i>");
    }

    #[test]
    fn space_function_appends_once() {
        assert_eq!(render("[{{ space(name) }}]", &[("name", "Ann")]), "[Ann ]");
        assert_eq!(render("[{{ space(name) }}]", &[("name", "Ann ")]), "[Ann ]");
        assert_eq!(render("[{{ space(missing) }}]", &[]), "[]");
    }

    #[test]
    fn today_function_renders_a_date() {
        let out = render("Date {{ today() }} and {{ bold('x') }}", &[]);
        assert!(out.starts_with("Date "), "{out}");
        assert!(out.contains(" of "), "{out}");
        assert!(out.ends_with(" and <b>x</b>"), "{out}");
    }

    #[test]
    fn broken_template_is_an_error() {
        let err = JinjaEngine::new()
            .render("{{ bold( }}", &Headers::new())
            .unwrap_err();
        assert!(matches!(err, Md2PdfError::Template(_)));
    }

    #[test]
    fn ordinals() {
        let cases = [
            (1, "1st"),
            (2, "2nd"),
            (3, "3rd"),
            (4, "4th"),
            (11, "11th"),
            (12, "12th"),
            (13, "13th"),
            (20, "20th"),
            (21, "21st"),
            (22, "22nd"),
            (23, "23rd"),
            (24, "24th"),
            (111, "111th"),
        ];
        for (n, expected) in cases {
            assert_eq!(ordinal(n), expected);
        }
    }

    #[test]
    fn long_dates() {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(today_long_at(date(2023, 7, 10)), "10th of July, 2023");
        assert_eq!(today_long_at(date(2023, 8, 1)), "1st of August, 2023");
        assert_eq!(today_long_at(date(2025, 9, 23)), "23rd of September, 2025");
    }

    #[test]
    fn append_space_cases() {
        assert_eq!(append_space(""), "");
        assert_eq!(append_space("abc"), "abc ");
        assert_eq!(append_space("abc "), "abc ");
    }
}
