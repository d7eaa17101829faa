use notelens_protocol::Note;

/// Header line for one note: `[YYYY-MM-DD HH:MM]` in UTC, followed by
/// `[tags: a,b]` when the note carries tags.
pub fn format_header(note: &Note) -> String {
    let mut header = format!("[{}]", note.created.format("%Y-%m-%d %H:%M"));
    let tags = note.tags();
    if !tags.is_empty() {
        header.push_str("[tags: ");
        header.push_str(&tags.join(","));
        header.push(']');
    }
    header
}

/// Serialize notes, in the given order, into the combined text.
///
/// Each block is `header\ntext\n`; blocks are joined by `\n` so consecutive
/// notes are separated by one blank line.
pub fn assemble(notes: &[Note]) -> String {
    notes
        .iter()
        .map(|note| format!("{}\n{}\n", format_header(note), note.text))
        .collect::<Vec<_>>()
        .join("\n")
}
