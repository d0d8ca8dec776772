/*
 * html.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Small HTML helpers shared by the compiler.

/// Markup that replaces `?` in a failing expression shown in preview mode.
pub const INPUT_CONTROL: &str = "<input type=\"text\" size=\"2\" name=\"Var\">";

/// Units selector prepended to previews that mention `%u`.
const UNITS_SELECT: &str = "<select id=\"Units\" name=\"Units\"><option value=\"m\"> m </option><option value=\"cm\"> cm </option><option value=\"mm\"> mm </option></select>";

/// The ` id="lineN"` attribute for a 1-based line number.
pub fn line_id(line: usize) -> String {
    format!(" id=\"line{line}\"")
}

/// A clickable line reference used inside error messages.
pub fn line_link(line: usize) -> String {
    format!("[<a href=\"#0\" data-text=\"{line}\">{line}</a>]")
}

/// Wrap a message in an error paragraph.
pub fn error_paragraph(text: &str) -> String {
    format!("<p class=\"err\">{text}</p>")
}

/// Error paragraph for a failure at `line` while processing `source`.
pub fn line_error(source: &str, line: usize, message: &str) -> String {
    error_paragraph(&format!(
        "Error in \"{source}\" on line {}: {message}",
        line_link(line)
    ))
}

/// Insert `attribute` into the opening tag of `fragment`.
///
/// The attribute goes right before `>` (or before `/` of a self-closing
/// tag). Fragments that do not start with an element are returned as is.
pub fn insert_attribute(fragment: &str, attribute: &str) -> String {
    let bytes = fragment.as_bytes();
    if bytes.len() <= 2 || bytes[0] != b'<' || !bytes[1].is_ascii_alphabetic() {
        return fragment.to_string();
    }
    let Some(mut end) = fragment.find('>') else {
        return fragment.to_string();
    };
    if end <= 1 {
        return fragment.to_string();
    }
    let mut j = end;
    while j > 1 {
        j -= 1;
        if bytes[j] != b' ' {
            if bytes[j] == b'/' {
                end = j;
            }
            break;
        }
    }
    format!("{}{}{}", &fragment[..end], attribute, &fragment[end..])
}

/// Replace `%u` with the units name.
///
/// In preview the name is wrapped in a span and, if anything was replaced,
/// a units selector is prepended so the reader can switch units.
pub fn apply_units(html: &mut String, units: &str, calculate: bool) {
    if !html.contains("%u") {
        return;
    }
    if calculate {
        *html = html.replace("%u", units);
    } else {
        let replaced = html.replace("%u", &format!("<span class=\"Units\">{units}</span>"));
        *html = format!("{UNITS_SELECT}{replaced}");
    }
}
