//! Link-marker formatting.

/// Format a `[[target|label]]` link marker.
///
/// `|` separates the target from the label, so any pipe inside the target
/// is replaced with `-` rather than emitted raw. A label equal to the
/// target is omitted. `inline` prefixes the marker with `!` for embedded
/// display (images, audio). Backslashes are stripped from the result; they
/// only ever arrive via escaping artifacts and break marker parsing.
#[must_use]
pub fn format_link(target: &str, label: Option<&str>, inline: bool) -> String {
    let mut body = target.replace('|', "-");
    if let Some(label) = label
        && label != target
    {
        body.push('|');
        body.push_str(label);
    }
    let marker = if inline {
        format!("![[{body}]]")
    } else {
        format!("[[{body}]]")
    };
    marker.replace('\\', "")
}
