//! HTML rendering of Cobertura reports

use std::fmt::Write;

use super::{badge_url, SourceLinks};
use crate::config::ReportOptions;
use crate::coverage::{CoberturaFile, CoberturaReport};
use crate::utils::{escape_html, BadgeColor};

const TABLE_HEADER: &str =
    "<table><tr><th>File</th><th>Stmts</th><th>Miss</th><th>Cover</th><th>Missing</th></tr><tbody>";

/// Badge plus a collapsible table, each omitted when hidden
pub fn cobertura_html(report: &CoberturaReport, options: &ReportOptions, links: &SourceLinks) -> String {
    let mut html = String::new();

    if !options.hide_badge {
        let url = badge_url(
            &options.badge_title,
            &format!("{:.1}%", report.total),
            BadgeColor::for_percentage(report.total),
        );
        let _ = write!(html, "<img alt=\"Coverage\" src=\"{}\" /><br/>", url);
    }

    if !options.hide_report {
        let _ = write!(
            html,
            "<details><summary>{}</summary>{}</details>",
            escape_html(&options.title),
            cobertura_table(report, links)
        );
    }

    html
}

/// Files grouped under folder header rows, followed by a TOTAL row
pub fn cobertura_table(report: &CoberturaReport, links: &SourceLinks) -> String {
    let mut html = String::from(TABLE_HEADER);

    for (folder, files) in report.folders() {
        let indent = !folder.is_empty();
        if indent {
            let _ = write!(html, "<tr><td colspan=\"5\"><b>{}</b></td></tr>", escape_html(&folder));
        }
        for file in files {
            html.push_str(&file_row(file, indent, links));
        }
    }

    let (stmts, miss) = report.totals();
    let _ = write!(
        html,
        "<tr><td><b>TOTAL</b></td><td><b>{}</b></td><td><b>{}</b></td><td><b>{:.1}%</b></td><td>&nbsp;</td></tr>",
        stmts, miss, report.total
    );

    html.push_str("</tbody></table>");
    html
}

fn file_row(file: &CoberturaFile, indent: bool, links: &SourceLinks) -> String {
    let indent = if indent { "&nbsp; &nbsp;" } else { "" };
    format!(
        "<tr><td>{}<a href=\"{}\">{}</a></td><td>{}</td><td>{}</td><td>{:.1}%</td><td>{}</td></tr>",
        indent,
        escape_html(&links.file_url(&file.name)),
        escape_html(&file.name),
        file.stmts,
        file.miss,
        file.cover,
        missing_cell(file, links)
    )
}

fn missing_cell(file: &CoberturaFile, links: &SourceLinks) -> String {
    let Some(ref missing) = file.missing else {
        return "&nbsp;".to_string();
    };

    missing
        .split(", ")
        .map(|range| {
            format!(
                "<a href=\"{}\">{}</a>",
                escape_html(&links.line_url(&file.name, range)),
                range
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> CoberturaReport {
        CoberturaReport {
            total: 62.5,
            files: vec![
                CoberturaFile {
                    name: "app/models/user.rb".into(),
                    stmts: 5,
                    miss: 3,
                    cover: 40.0,
                    missing: Some("2-3, 5".into()),
                },
                CoberturaFile {
                    name: "boot.rb".into(),
                    stmts: 3,
                    miss: 0,
                    cover: 100.0,
                    missing: None,
                },
            ],
        }
    }

    fn links() -> SourceLinks {
        SourceLinks {
            repo_url: "https://github.com/acme/shop".into(),
            commit: "abc".into(),
            path_prefix: String::new(),
        }
    }

    #[test]
    fn test_table_rows() {
        let html = cobertura_table(&report(), &links());

        assert!(html.starts_with(TABLE_HEADER));
        assert!(html.contains("<tr><td colspan=\"5\"><b>app/models</b></td></tr>"));
        assert!(html.contains(
            "&nbsp; &nbsp;<a href=\"https://github.com/acme/shop/blob/abc/app/models/user.rb\">app/models/user.rb</a>"
        ));
        assert!(html.contains("<a href=\"https://github.com/acme/shop/blob/abc/app/models/user.rb#L2-3\">2-3</a>, "));
        assert!(html.contains("<td>3</td><td>0</td><td>100.0%</td><td>&nbsp;</td>"));
        assert!(html.ends_with(
            "<tr><td><b>TOTAL</b></td><td><b>8</b></td><td><b>3</b></td><td><b>62.5%</b></td><td>&nbsp;</td></tr></tbody></table>"
        ));
    }

    #[test]
    fn test_top_level_files_come_first() {
        let html = cobertura_table(&report(), &links());
        let boot = html.find("boot.rb").unwrap();
        let folder = html.find("<b>app/models</b>").unwrap();
        assert!(boot < folder);
    }

    #[test]
    fn test_badge_and_details() {
        let html = cobertura_html(&report(), &ReportOptions::default(), &links());

        assert!(html.starts_with(
            "<img alt=\"Coverage\" src=\"https://img.shields.io/badge/Coverage-62.5%25-yellow.svg\" /><br/>"
        ));
        assert!(html.contains("<details><summary>Coverage Report</summary><table>"));
    }

    #[test]
    fn test_hidden_parts() {
        let options = ReportOptions {
            hide_badge: true,
            hide_report: true,
            ..Default::default()
        };
        assert!(cobertura_html(&report(), &options, &links()).is_empty());
    }
}
