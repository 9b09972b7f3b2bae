use chrono::NaiveDate;

/// Windows-safe name for a downloaded result workbook.
///
/// Prefers the server-suggested name; falls back to `Consolidated_<Mon_DD_YYYY>.xlsx`.
pub fn result_filename(suggested: Option<&str>, date: NaiveDate) -> String {
    let stem_and_ext = suggested
        .map(sanitize_name)
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| format!("Consolidated_{}", date.format("%b_%d_%Y")));

    let lower = stem_and_ext.to_ascii_lowercase();
    if lower.ends_with(".xlsx") || lower.ends_with(".xls") {
        stem_and_ext
    } else {
        format!("{stem_and_ext}.xlsx")
    }
}

/// Extracts `filename` from a `Content-Disposition` header value.
pub(crate) fn content_disposition_filename(header: &str) -> Option<String> {
    header.split(';').map(str::trim).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        if !key.trim().eq_ignore_ascii_case("filename") {
            return None;
        }
        let value = value.trim().trim_matches('"');
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    })
}

fn sanitize_name(input: &str) -> String {
    // Keep only the last path component a server might smuggle in.
    let base = input.rsplit(['/', '\\']).next().unwrap_or(input);
    let cleaned: String = base
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' {
            if !prev_underscore {
                compacted.push(c);
            }
            prev_underscore = true;
        } else {
            compacted.push(c);
            prev_underscore = false;
        }
    }
    if compacted.chars().count() > 120 {
        compacted = compacted.chars().take(120).collect();
    }
    let stem_len = compacted.find('.').unwrap_or(compacted.len());
    if is_reserved_windows_name(&compacted[..stem_len]) {
        compacted.insert(stem_len, '_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 7).unwrap()
    }

    #[test]
    fn falls_back_to_dated_name() {
        assert_eq!(result_filename(None, day()), "Consolidated_Mar_07_2024.xlsx");
        assert_eq!(result_filename(Some("  "), day()), "Consolidated_Mar_07_2024.xlsx");
    }

    #[test]
    fn suggested_name_is_sanitized() {
        assert_eq!(
            result_filename(Some("../../etc/Consolidated:Q1?.xlsx"), day()),
            "Consolidated_Q1_.xlsx"
        );
        assert_eq!(result_filename(Some("CON.xlsx"), day()), "CON_.xlsx");
        assert_eq!(result_filename(Some("report"), day()), "report.xlsx");
    }

    #[test]
    fn parses_content_disposition() {
        assert_eq!(
            content_disposition_filename("attachment; filename=\"Consolidated_Mar_07_2024.xlsx\""),
            Some("Consolidated_Mar_07_2024.xlsx".to_string())
        );
        assert_eq!(content_disposition_filename("inline"), None);
    }
}
