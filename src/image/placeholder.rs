//! Deterministic stand-in image used when no diffusion backend is reachable.

use quick_xml::escape::escape;

pub const PLACEHOLDER_SIZE: u32 = 512;
pub const PLACEHOLDER_MIME: &str = "image/svg+xml";

const MAX_PROMPT_CHARS: usize = 60;

/// Caption drawn on the placeholder: a header line, a blank line and the
/// prompt, cut to 60 characters.
pub fn placeholder_text(prompt: &str) -> String {
    if prompt.chars().count() > MAX_PROMPT_CHARS {
        let head: String = prompt.chars().take(MAX_PROMPT_CHARS).collect();
        format!("Image for:\n\n{}...", head)
    } else {
        format!("Image for:\n\n{}", prompt)
    }
}

/// Render a 512x512 grey SVG with the caption in white.
pub fn render_placeholder(prompt: &str) -> Vec<u8> {
    let lines: String = placeholder_text(prompt)
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            let dy = if i == 0 { "0" } else { "1.2em" };
            format!(r#"<tspan x="50" dy="{}">{}</tspan>"#, dy, escape(line))
        })
        .collect();

    format!(
        concat!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" "#,
            r#"width="{size}" height="{size}" viewBox="0 0 {size} {size}">"#,
            r#"<rect width="100%" height="100%" fill="rgb(100,100,100)"/>"#,
            r#"<text x="50" y="200" fill="rgb(255,255,255)" "#,
            r#"font-family="sans-serif" font-size="16">{lines}</text>"#,
            "</svg>"
        ),
        size = PLACEHOLDER_SIZE,
        lines = lines
    )
    .into_bytes()
}
