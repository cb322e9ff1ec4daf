/// Phrase that introduces the prerequisite block of `module spider <version>`.
pub const PREREQUISITE_MARKER: &str = "You will need to load all module(s)";

/// Returns trimmed listing lines that name a module of `namespace` and contain `requested`.
///
/// Matching is a substring match, so `3.10` matches every `3.10.x` release.
pub fn parse_version_lines<'a>(listing: &'a str, namespace: &str, requested: &str) -> Vec<&'a str> {
    let prefix = format!("{namespace}/");
    listing
        .lines()
        .map(str::trim)
        .filter(|line| line.starts_with(&prefix) && line.contains(requested))
        .collect()
}

/// Extracts prerequisite module names from `module spider <version>` output.
///
/// The block starts after the marker line and one gap line and ends with a blank
/// line or the end of the output. Without a marker, the result is empty.
pub fn parse_prerequisites(detail: &str) -> Vec<String> {
    let mut lines = detail
        .lines()
        .skip_while(|line| !line.contains(PREREQUISITE_MARKER));
    if lines.next().is_none() {
        return Vec::new();
    }
    lines
        .skip(1)
        .map(str::trim)
        .take_while(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect()
}
