use sha2::{Digest, Sha256};

const MAX_LABEL_LEN: usize = 80;

/// Deterministic, filesystem-safe export name: `{label}--{hash8(resource)}.json`.
///
/// The same label and resource always map to the same file, so re-running a
/// harvest replaces its previous export.
pub fn deterministic_filename(label: &str, resource: &str) -> String {
    format!("{}--{}.json", sanitize_label(label), short_hash(resource))
}

fn sanitize_label(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        let c = if is_forbidden(c) || c.is_whitespace() { '_' } else { c };
        // Runs of replaced characters collapse into one underscore.
        if c == '_' && out.ends_with('_') {
            continue;
        }
        out.push(c);
    }

    let mut name: String = out
        .trim_matches(&['_', '.'][..])
        .chars()
        .take(MAX_LABEL_LEN)
        .collect();
    if name.is_empty() {
        name = "harvest".to_string();
    }
    if is_reserved_windows_name(&name) {
        name.push('_');
    }
    name
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '#' | '\0'..='\u{1F}')
}

fn is_reserved_windows_name(name: &str) -> bool {
    const DEVICES: &[&str] = &["CON", "PRN", "AUX", "NUL"];
    let upper = name.to_ascii_uppercase();
    DEVICES.contains(&upper.as_str())
        || ((upper.starts_with("COM") || upper.starts_with("LPT"))
            && upper.len() == 4
            && upper.as_bytes()[3].is_ascii_digit()
            && upper.as_bytes()[3] != b'0')
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect()
}
