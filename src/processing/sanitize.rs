//! Filename normalization for stored uploads.

use time::OffsetDateTime;
use time::macros::format_description;

/// Sanitize an uploaded filename before it is used as a storage path.
///
/// Keeps ASCII alphanumerics, `.`, `_`, and `-`; everything else (separators, traversal
/// sequences, control characters) becomes `_`. Leading dots are stripped so a stored file
/// can be neither hidden nor a relative traversal target.
pub fn sanitize_filename(filename: &str) -> String {
    let mapped: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = mapped.trim_start_matches('.');
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Compact UTC timestamp used to disambiguate filename collisions.
pub fn timestamp_suffix(now: OffsetDateTime) -> String {
    let format = format_description!("[year][month][day][hour][minute][second]");
    now.format(&format)
        .unwrap_or_else(|_| "19700101000000".to_string())
}

/// Insert a suffix before the extension: `report.pdf` + `x` becomes `report_x.pdf`.
pub fn collision_variant(filename: &str, suffix: &str) -> String {
    match filename.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => format!("{base}_{suffix}.{ext}"),
        _ => format!("{filename}_{suffix}"),
    }
}
