//! DGML writer.
//!
//! DGML is the directed-graph XML dialect understood by Visual Studio's
//! graph viewer. Combined nodes are written as ordinary nodes in the
//! `Combined` category, with a link from each of their two causes.

use std::io::Write;

use super::{GraphDocument, COMBINED_LINK_COLOR};
use crate::error::ExportError;

const NAMESPACE: &str = "http://schemas.microsoft.com/vs/2009/dgml";

pub(super) fn write<W: Write>(document: &GraphDocument, mut writer: W) -> Result<(), ExportError> {
    writeln!(writer, "<?xml version=\"1.0\" encoding=\"utf-8\"?>")?;
    writeln!(writer, "<DirectedGraph xmlns=\"{NAMESPACE}\">")?;

    writeln!(writer, "  <Nodes>")?;
    for node in &document.nodes {
        writeln!(writer, "    <Node Id=\"{}\" Label=\"{}\" />", node.id, escape(&node.label))?;
    }
    for node in &document.combined_nodes {
        writeln!(
            writer,
            "    <Node Id=\"{}\" Label=\"{}\" Category=\"Combined\" />",
            node.id,
            escape(&node.label)
        )?;
    }
    writeln!(writer, "  </Nodes>")?;

    writeln!(writer, "  <Links>")?;
    for node in &document.combined_nodes {
        for cause in [node.first, node.second] {
            writeln!(
                writer,
                "    <Link Source=\"{cause}\" Target=\"{}\" Stroke=\"{COMBINED_LINK_COLOR}\" />",
                node.id
            )?;
        }
    }
    for link in &document.links {
        write!(
            writer,
            "    <Link Source=\"{}\" Target=\"{}\" Reason=\"{}\"",
            link.source,
            link.target,
            escape(&link.reason)
        )?;
        if let Some(color) = &link.stroke_color {
            write!(writer, " Stroke=\"{}\"", escape(color))?;
        }
        writeln!(writer, " />")?;
    }
    writeln!(writer, "  </Links>")?;

    writeln!(writer, "  <Properties>")?;
    writeln!(writer, "    <Property Id=\"Reason\" DataType=\"System.String\" />")?;
    writeln!(writer, "  </Properties>")?;
    writeln!(writer, "</DirectedGraph>")?;

    writer.flush()?;
    Ok(())
}

/// Escape text for use inside a double-quoted XML attribute.
fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#xA;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
