use super::turn::{ImageAttachment, Turn};

pub fn describe_image(image: &ImageAttachment) -> String {
    match image.name.as_deref() {
        Some(name) => format!("[image: {name}, {}, {} bytes]", image.mime_type, image.len()),
        None => format!("[image: {}, {} bytes]", image.mime_type, image.len()),
    }
}

pub fn render_turn_markdown(turn: &Turn) -> String {
    let mut out = format!("**{}:**", turn.author.label());
    if let Some(image) = turn.payload.image() {
        out.push(' ');
        out.push_str(&describe_image(image));
    }
    out.push('\n');
    out.push_str(turn.text().trim_end());
    out.push('\n');
    out
}

/// Renders a full snapshot as markdown, turns separated by blank lines.
pub fn render_transcript_markdown(title: &str, turns: &[Turn]) -> String {
    let mut out = format!("# {title}\n");
    for turn in turns {
        out.push('\n');
        out.push_str(&render_turn_markdown(turn));
    }
    out
}
