//! Markdown, CSV and XML projectors.

use std::io::{self, Write};

use super::{Projector, Record, SectionSpec};

fn cells<'r>(record: &'r Record, columns: &'r [String]) -> impl Iterator<Item = &'r str> {
    columns.iter().map(move |c| record.get(c).unwrap_or(""))
}

// =============================================================================
// Markdown
// =============================================================================

/// Pipe table with a header and separator row.
pub struct MarkdownProjector<'a> {
    out: Box<dyn Write + 'a>,
}

impl<'a> MarkdownProjector<'a> {
    pub fn new(out: Box<dyn Write + 'a>) -> Self {
        Self { out }
    }

    fn row<'s>(&mut self, values: impl Iterator<Item = &'s str>) -> io::Result<()> {
        let escaped: Vec<String> = values.map(escape_markdown).collect();
        writeln!(self.out, "| {} |", escaped.join(" | "))
    }
}

impl Projector for MarkdownProjector<'_> {
    fn render(&mut self, records: &[Record], sections: &SectionSpec) -> io::Result<()> {
        let columns = sections.columns(records);
        if columns.is_empty() {
            return Ok(());
        }

        self.row(columns.iter().map(String::as_str))?;
        writeln!(self.out, "|{}", "---|".repeat(columns.len()))?;
        for record in records {
            self.row(cells(record, &columns))?;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn escape_markdown(value: &str) -> String {
    value
        .replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

// =============================================================================
// CSV
// =============================================================================

/// RFC 4180 comma-separated values with a header row.
pub struct CsvProjector<'a> {
    out: Box<dyn Write + 'a>,
}

impl<'a> CsvProjector<'a> {
    pub fn new(out: Box<dyn Write + 'a>) -> Self {
        Self { out }
    }

    fn row<'s>(&mut self, values: impl Iterator<Item = &'s str>) -> io::Result<()> {
        let quoted: Vec<String> = values.map(quote_csv).collect();
        writeln!(self.out, "{}", quoted.join(","))
    }
}

impl Projector for CsvProjector<'_> {
    fn render(&mut self, records: &[Record], sections: &SectionSpec) -> io::Result<()> {
        let columns = sections.columns(records);
        if columns.is_empty() {
            return Ok(());
        }

        self.row(columns.iter().map(String::as_str))?;
        for record in records {
            self.row(cells(record, &columns))?;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn quote_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// XML
// =============================================================================

/// `<report>` document with one `<record>` element per record.
pub struct XmlProjector<'a> {
    out: Box<dyn Write + 'a>,
    opened: bool,
}

impl<'a> XmlProjector<'a> {
    pub fn new(out: Box<dyn Write + 'a>) -> Self {
        Self { out, opened: false }
    }

    fn open(&mut self) -> io::Result<()> {
        if !self.opened {
            writeln!(self.out, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
            writeln!(self.out, "<report>")?;
            self.opened = true;
        }
        Ok(())
    }
}

impl Projector for XmlProjector<'_> {
    fn render(&mut self, records: &[Record], sections: &SectionSpec) -> io::Result<()> {
        self.open()?;
        let columns = sections.columns(records);
        let tags: Vec<String> = columns.iter().map(|c| element_name(c)).collect();

        for record in records {
            writeln!(self.out, "  <record>")?;
            for (tag, value) in tags.iter().zip(cells(record, &columns)) {
                writeln!(self.out, "    <{tag}>{}</{tag}>", escape_xml(value))?;
            }
            writeln!(self.out, "  </record>")?;
        }
        Ok(())
    }

    fn close(&mut self) -> io::Result<()> {
        self.open()?;
        writeln!(self.out, "</report>")?;
        self.out.flush()
    }
}

fn escape_xml(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Field names come from user section lists; keep them valid element names.
fn element_name(field: &str) -> String {
    let mut name: String = field
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        name.insert(0, '_');
    }
    name
}
