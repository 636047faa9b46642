//! Helpers for `{N}` object references in trigger expressions and
//! correlation formulas.

/// Calls `f` for every `{digits}` reference with its byte range and id.
fn scan_references(text: &str, mut f: impl FnMut(std::ops::Range<usize>, u64)) {
    let bytes = text.as_bytes();
    let mut pos = 0;
    while pos < bytes.len() {
        if bytes[pos] != b'{' {
            pos += 1;
            continue;
        }
        let digits_start = pos + 1;
        let mut end = digits_start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if end > digits_start && end < bytes.len() && bytes[end] == b'}' {
            if let Ok(id) = text[digits_start..end].parse::<u64>() {
                f(pos..end + 1, id);
            }
            pos = end + 1;
        } else {
            pos += 1;
        }
    }
}

/// Function ids referenced by a trigger expression, sorted and unique.
///
/// ```
/// use vigil_common::expression::functionids;
///
/// assert_eq!(functionids("{12}>5 or {3}<1 and {12}=0"), vec![3, 12]);
/// assert!(functionids("{$MACRO}>1").is_empty());
/// ```
pub fn functionids(expression: &str) -> Vec<u64> {
    let mut ids = Vec::new();
    scan_references(expression, |_, id| ids.push(id));
    ids.sort_unstable();
    ids.dedup();
    ids
}

/// Replaces every `{id}` reference with the text returned by `replace`.
///
/// Returns the first id `replace` has no answer for.
///
/// ```
/// use vigil_common::expression::substitute_references;
///
/// let out = substitute_references("{1} and not {2}", |id| Some(if id == 1 { "1" } else { "0" }.to_string()));
/// assert_eq!(out, Ok("1 and not 0".to_string()));
/// assert_eq!(substitute_references("{7}", |_| None), Err(7));
/// ```
pub fn substitute_references(
    text: &str,
    mut replace: impl FnMut(u64) -> Option<String>,
) -> Result<String, u64> {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut missing = None;
    scan_references(text, |range, id| {
        if missing.is_some() {
            return;
        }
        match replace(id) {
            Some(replacement) => {
                out.push_str(&text[last..range.start]);
                out.push_str(&replacement);
                last = range.end;
            }
            None => missing = Some(id),
        }
    });
    if let Some(id) = missing {
        return Err(id);
    }
    out.push_str(&text[last..]);
    Ok(out)
}
