//! JSON rendering shared by the documents the installer rewrites.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;

/// Indentation used for every rewritten document.
const INDENT: &[u8] = b"    ";

/// Pretty-prints `document` with four-space indentation and a trailing
/// newline.
pub(crate) fn render_pretty<T: Serialize + ?Sized>(document: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    document.serialize(&mut serializer)?;
    buffer.push(b'\n');
    Ok(buffer)
}
