//! Report matching: pick the report rule that applies to a node.

use crate::config::Report;
use crate::dom::Node;

/// What escapes from a matched report: the style reference only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportMatch<'a> {
    pub style: Option<&'a str>,
}

impl<'a> ReportMatch<'a> {
    /// Style name to build with; an empty name when no report supplied one.
    pub fn style_name(&self) -> &'a str {
        self.style.unwrap_or("")
    }
}

/// First report in declaration order whose predicates all match `node`,
/// otherwise `default`.
///
/// A report without predicates matches every node, so any rule declared
/// after it is unreachable.
pub fn find_report<'a>(node: &Node, reports: &'a [Report], default: &'a Report) -> ReportMatch<'a> {
    let report = reports
        .iter()
        .find(|r| r.attributes.iter().all(|a| a.matches(node)))
        .unwrap_or(default);
    ReportMatch {
        style: report.style.as_deref(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReportAttribute;
    use crate::dom::{html_to_tree, Tag};

    fn report(style: &str, attrs: &[(&str, &str)]) -> Report {
        Report {
            style: Some(style.to_string()),
            attributes: attrs
                .iter()
                .map(|(n, v)| ReportAttribute {
                    name: n.to_string(),
                    value: v.to_string(),
                })
                .collect(),
        }
    }

    fn reports() -> Vec<Report> {
        vec![
            report("Doc2 Title", &[("id", "title2")]),
            report("Doc1 Title", &[("id", "title")]),
            report("Doc1 subtitle", &[("tag", "h2"), ("class", "subtitle")]),
        ]
    }

    fn first(html: &str) -> Node {
        html_to_tree(html).children.remove(0)
    }

    #[test]
    fn first_full_match_wins() {
        let default = report("Body", &[]);
        let reports = reports();

        let h1 = first("<h1 id=\"title\">x</h1>");
        assert_eq!(find_report(&h1, &reports, &default).style, Some("Doc1 Title"));

        let h2 = first("<h2 class=\"subtitle\">x</h2>");
        assert_eq!(find_report(&h2, &reports, &default).style, Some("Doc1 subtitle"));
    }

    #[test]
    fn class_predicate_compares_the_whole_attribute() {
        let default = report("Body", &[]);
        let h2 = first("<h2 class=\"subtitle keep-together\">x</h2>");
        assert_eq!(find_report(&h2, &reports(), &default).style, Some("Body"));
    }

    #[test]
    fn missing_attribute_never_matches() {
        let default = report("Body", &[]);
        let reports = vec![report("Empty", &[("id", "")])];
        let p = first("<p>x</p>");
        assert_eq!(find_report(&p, &reports, &default).style, Some("Body"));
    }

    #[test]
    fn earlier_rule_shadows_later_overlap() {
        let default = report("Body", &[]);
        let reports = vec![report("Any", &[]), report("Heading", &[("tag", "h1")])];
        let mut node = Node::new(Tag::H1);
        node.value = "x".into();
        assert_eq!(find_report(&node, &reports, &default).style, Some("Any"));
    }

    #[test]
    fn absent_default_gives_empty_style() {
        let p = first("<p>x</p>");
        let default = Report::default();
        let m = find_report(&p, &[], &default);
        assert_eq!(m.style, None);
        assert_eq!(m.style_name(), "");
    }
}
