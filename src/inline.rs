//! Inline formatting: key-value decoration, layout directives and the
//! three-column line.

use crate::error::ContentError;

/// Paragraph markup for a non-breaking space.
pub const SPACE: &str = "&nbsp;";

pub const CLASS_KEY_VALUE: &str = "key-value";
pub const CLASS_THREE_COLUMNS: &str = "3-columns";
pub const CLASS_KEEP_TOGETHER: &str = "keep-together";

/// Layout directives carried by a node's classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directives {
    pub three_columns: bool,
    pub keep_together: bool,
}

impl Directives {
    pub fn from_classes(classes: &[&str]) -> Self {
        Self {
            three_columns: classes.contains(&CLASS_THREE_COLUMNS),
            keep_together: classes.contains(&CLASS_KEEP_TOGETHER),
        }
    }
}

/// Markup tags for a comma-separated decoration spec. Unknown tokens are
/// logged and skipped.
pub fn key_styles(spec: &str) -> Vec<&'static str> {
    spec.split(',')
        .filter_map(|token| match token.trim() {
            "bold" => Some("b"),
            "italic" => Some("i"),
            "underscore" => Some("u"),
            other => {
                log::warn!(
                    "{}",
                    ContentError::UnknownDecoration {
                        token: other.to_string(),
                        spec: spec.to_string(),
                    }
                );
                None
            }
        })
        .collect()
}

/// Decorate the key of a `key: value` text when `classes` carries
/// `key-value`; otherwise return `raw` unchanged.
///
/// The key (with its colon) is wrapped by each decoration in turn, so the
/// first token ends up innermost. An empty spec means `bold`.
pub fn format_value(raw: &str, classes: &[&str], key_style: &str) -> String {
    if !classes.contains(&CLASS_KEY_VALUE) {
        return raw.to_string();
    }

    let (key, value) = raw.split_once(':').unwrap_or((raw, ""));
    let spec = if key_style.trim().is_empty() { "bold" } else { key_style };

    let mut key = format!("{key}:");
    for tag in key_styles(spec) {
        key = format!("<{tag}>{key}</{tag}>");
    }
    format!("{key}{value}")
}

/// Split a `left#center#right` value into its three parts.
pub fn split_columns(text: &str) -> Result<[&str; 3], ContentError> {
    let parts: Vec<&str> = text.split('#').collect();
    match parts.as_slice() {
        [left, center, right] => Ok([*left, *center, *right]),
        _ => Err(ContentError::ColumnCount {
            text: text.to_string(),
            found: parts.len(),
        }),
    }
}

/// Lay `left`, `center` and `right` out on a line of `size` characters.
///
/// `left` is padded on its right to `(size - len(center)) div 2` characters
/// and `right` on its left to the remainder; every space becomes [`SPACE`].
/// Texts longer than their slot are not truncated.
pub fn three_columns(parts: [&str; 3], size: i64) -> String {
    let [left, center, right] = parts;
    let free = size - center.chars().count() as i64;
    let left_size = free.div_euclid(2).max(0) as usize;
    let right_size = (free - free.div_euclid(2)).max(0) as usize;

    format!("{left:<left_size$}{center}{right:>right_size$}").replace(' ', SPACE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(format_value("key: value", &[], "bold"), "key: value");
    }

    #[test]
    fn key_value_defaults_to_bold() {
        assert_eq!(format_value("item1: value1", &["key-value"], ""), "<b>item1:</b> value1");
    }

    #[test]
    fn first_decoration_is_innermost() {
        assert_eq!(
            format_value("key: value", &["key-value"], "italic,bold,underscore"),
            "<u><b><i>key:</i></b></u> value"
        );
        assert_eq!(
            format_value("key: value", &["key-value"], "bold,italic,underscore"),
            "<u><i><b>key:</b></i></u> value"
        );
    }

    #[test]
    fn value_without_colon_gets_empty_value() {
        assert_eq!(format_value("lonely", &["key-value"], "bold"), "<b>lonely:</b>");
    }

    #[test]
    fn only_first_colon_splits() {
        assert_eq!(
            format_value("time: 10:30", &["key-value"], "bold"),
            "<b>time:</b> 10:30"
        );
    }

    #[test]
    fn unknown_decoration_is_skipped() {
        assert_eq!(key_styles("bold, shiny ,italic"), vec!["b", "i"]);
        assert_eq!(format_value("k: v", &["key-value"], "shiny"), "k: v");
    }

    #[test]
    fn directives_are_independent() {
        let d = Directives::from_classes(&["3-columns", "keep-together"]);
        assert!(d.three_columns && d.keep_together);
        assert_eq!(Directives::from_classes(&["subtitle"]), Directives::default());
    }

    #[test]
    fn three_columns_on_73_characters() {
        let space = SPACE.repeat(29);
        assert_eq!(
            three_columns(["left", "center", "right"], 73),
            format!("left{space}center{space}right")
        );
    }

    #[test]
    fn three_columns_odd_remainder_goes_right() {
        // free = 70 - 6 = 64 → 32 / 32
        let out = three_columns(["left", "center", "right"], 70);
        assert_eq!(out, format!("left{}center{}right", SPACE.repeat(28), SPACE.repeat(27)));
        // free = 11 - 6 = 5 → 2 / 3
        let out = three_columns(["a", "center", "b"], 11);
        assert_eq!(out, format!("a{}center{}b", SPACE.repeat(1), SPACE.repeat(2)));
    }

    #[test]
    fn three_columns_without_room_has_no_padding() {
        assert_eq!(three_columns(["l", "center", "r"], 0), "lcenterr");
        assert_eq!(three_columns(["a b", "", "c"], 0), "a&nbsp;bc");
    }

    #[test]
    fn column_count_is_checked() {
        assert_eq!(split_columns("a#b#c").unwrap(), ["a", "b", "c"]);
        let err = split_columns("a#b").unwrap_err();
        assert!(matches!(err, ContentError::ColumnCount { found: 2, .. }));
    }
}
