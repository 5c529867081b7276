//! The operational files this daemon touches directly: the PID file
//! (rewritten on boot) and the MOTD/RULES text files (read at boot and on
//! REHASH). No database, no message persistence.

use std::io::Write;

use tracing::warn;

/// Rewrite the PID file with the current process id. A failure is logged
/// and swallowed: a missing PID file degrades supervision, not service.
pub fn write_pid_file(path: &str) {
    let result = std::fs::File::create(path)
        .and_then(|mut f| writeln!(f, "{}", std::process::id()));
    if let Err(e) = result {
        warn!(path = %path, error = %e, "could not write PID file");
    }
}

/// Load a MOTD/RULES text file, reflowing long lines to fit within
/// `max_width` bytes so each fits a numeric reply's wire budget. Returns
/// `None` if the file is missing or unreadable (the caller replies
/// `ERR_NOMOTD` in that case).
pub fn load_text_file(path: &str, max_width: usize) -> Option<Vec<String>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            warn!(path = %path, error = %e, "could not read text file");
            return None;
        }
    };
    let mut lines = Vec::new();
    for line in text.lines() {
        wrap_line(line, max_width, &mut lines);
    }
    Some(lines)
}

/// Split `line` at byte boundaries into chunks of at most `max_width`
/// bytes, breaking at the last space before the boundary when one exists.
fn wrap_line(line: &str, max_width: usize, out: &mut Vec<String>) {
    let max_width = max_width.max(1);
    let mut rest = line;
    loop {
        if rest.len() <= max_width {
            out.push(rest.to_string());
            return;
        }
        let window = ember_proto::util::truncate_utf8_safe(rest, max_width);
        let cut = window.rfind(' ').filter(|&i| i > 0).unwrap_or(window.len());
        out.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
        if rest.is_empty() {
            return;
        }
    }
}
