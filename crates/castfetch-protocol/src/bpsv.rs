//! BPSV: the pipe-delimited, typed-header text format used by the patch
//! service's `cdns` and `versions` endpoints.

use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::trace;

/// One column's declared name and width (the type tag itself — `STRING`,
/// `HEX`, `DEC` — is not consulted by this client; every value is kept and
/// exposed as a string).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub width: u32,
}

#[derive(Debug, Clone, Default)]
pub struct Row {
    fields: HashMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Space-separated list field, as used by the `Hosts`/`Servers` columns.
    pub fn get_list(&self, column: &str) -> Vec<&str> {
        self.get(column)
            .map(|v| v.split_whitespace().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Document {
    pub columns: Vec<Column>,
    pub sequence_number: Option<u32>,
    pub rows: Vec<Row>,
}

impl Document {
    /// Parse a complete BPSV document per the patch service's text rules:
    /// split on `\n`/`\r\n`, drop empty and `#`-prefixed lines, the first
    /// remaining line is the `Name!Type:Width` header, and data lines are
    /// `|`-split and zipped against it. Rows with fewer fields than the
    /// header are skipped rather than rejected.
    pub fn parse(content: &str) -> Result<Self> {
        let mut sequence_number = None;

        let mut lines = content.lines().filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            if let Some(rest) = line.strip_prefix("## seqn") {
                sequence_number = parse_seqn(rest);
                return None;
            }
            if line.starts_with('#') {
                return None;
            }
            Some(line)
        });

        let header_line = lines.next().ok_or(Error::EmptyDocument)?;
        let columns = parse_header(header_line)?;

        let mut rows = Vec::new();

        for line in lines {
            let values: Vec<&str> = line.split('|').collect();
            if values.len() < columns.len() {
                trace!(line, "skipping short BPSV row");
                continue;
            }

            let fields = columns
                .iter()
                .zip(values)
                .map(|(c, v)| (c.name.clone(), v.trim().to_owned()))
                .collect();
            rows.push(Row { fields });
        }

        Ok(Self {
            columns,
            sequence_number,
            rows,
        })
    }
}

fn parse_header(line: &str) -> Result<Vec<Column>> {
    if !line.contains('!') {
        return Err(Error::BpsvSyntax(
            "header line must contain `!`-typed columns".into(),
        ));
    }

    line.split('|')
        .map(|spec| {
            let name = spec.split('!').next().unwrap_or(spec);
            Ok(Column {
                name: name.to_owned(),
                width: 0,
            })
        })
        .collect()
}

fn parse_seqn(rest: &str) -> Option<u32> {
    let rest = rest.trim_start();
    let number = rest
        .trim_start_matches(['=', ':'])
        .trim();
    number.parse().ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_header_and_rows() {
        let content = "Name!STRING:0|Hosts!STRING:0\nus|level3.blizzard.com edgecast.blizzard.com\n";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.rows.len(), 1);
        assert_eq!(doc.rows[0].get("Name"), Some("us"));
        assert_eq!(
            doc.rows[0].get_list("Hosts"),
            vec!["level3.blizzard.com", "edgecast.blizzard.com"]
        );
    }

    #[test]
    fn sequence_number_is_parsed() {
        let content = "Name!STRING:0\n## seqn = 12345\nus\n";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.sequence_number, Some(12345));
    }

    #[test]
    fn short_rows_are_skipped() {
        let content = "Name!STRING:0|Hosts!STRING:0\nus\neu|edgecast.blizzard.com\n";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.rows.len(), 1);
        assert_eq!(doc.rows[0].get("Name"), Some("eu"));
    }

    #[test]
    fn comment_lines_are_dropped() {
        let content = "Name!STRING:0\n# a comment\nus\n";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.rows.len(), 1);
    }

    #[test]
    fn leading_comment_is_not_mistaken_for_the_header() {
        let content = "# leading comment\n## seqn = 99\nName!STRING:0\nus\n";
        let doc = Document::parse(content).unwrap();
        assert_eq!(doc.sequence_number, Some(99));
        assert_eq!(doc.rows.len(), 1);
        assert_eq!(doc.rows[0].get("Name"), Some("us"));
    }

    #[test]
    fn missing_header_is_an_error() {
        assert!(matches!(Document::parse(""), Err(Error::EmptyDocument)));
        assert!(Document::parse("Name\nus\n").is_err());
    }

    #[test]
    fn hosts_preferred_over_servers() {
        let content = "Name!STRING:0|Hosts!STRING:0|Servers!STRING:0\nus|h1 h2|s1 s2\n";
        let doc = Document::parse(content).unwrap();
        let row = &doc.rows[0];
        let preferred = if row.get_list("Hosts").is_empty() {
            row.get_list("Servers")
        } else {
            row.get_list("Hosts")
        };
        assert_eq!(preferred, vec!["h1", "h2"]);
    }
}
