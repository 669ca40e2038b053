use semver::Version;

/// Parse a version string into a semver::Version, normalizing partial versions.
///
/// Handles an optional `v` prefix and partial versions like "1" or "1.2"
/// by padding with zeros.
///
/// Examples:
/// - "1" -> Version(1, 0, 0)
/// - "v1.2" -> Version(1, 2, 0)
/// - "1.2.3" -> Version(1, 2, 3)
/// - "current" -> None
pub fn parse_version(version: &str) -> Option<Version> {
    let version = version.strip_prefix('v').unwrap_or(version);
    let parts: Vec<&str> = version.split('.').collect();
    let normalized = match parts.len() {
        1 => format!("{}.0.0", parts[0]),
        2 => format!("{}.{}.0", parts[0], parts[1]),
        _ => version.to_string(),
    };
    Version::parse(&normalized).ok()
}

/// Find the semantically maximum version from a list
///
/// Versions that do not parse are skipped. Returns the original string.
pub fn find_semantic_max<S: AsRef<str>>(versions: &[S]) -> Option<&str> {
    versions
        .iter()
        .map(|v| v.as_ref())
        .filter_map(|v| parse_version(v).map(|parsed| (v, parsed)))
        .max_by(|(_, a), (_, b)| a.cmp(b))
        .map(|(original, _)| original)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1", Some(Version::new(1, 0, 0)))]
    #[case("1.2", Some(Version::new(1, 2, 0)))]
    #[case("v1.2.3", Some(Version::new(1, 2, 3)))]
    #[case("current", None)]
    #[case("", None)]
    fn parse_version_returns_expected(#[case] input: &str, #[case] expected: Option<Version>) {
        assert_eq!(parse_version(input), expected);
    }

    #[rstest]
    #[case(vec![], None)]
    #[case(vec!["4.0.1", "5.0.0", "4.3.0"], Some("5.0.0"))]
    #[case(vec!["v1.0.0", "2.0.0", "v1.5.0"], Some("2.0.0"))]
    #[case(vec!["current", "1.0.0", "dev"], Some("1.0.0"))]
    #[case(vec!["1.0.0-ballot", "1.0.0"], Some("1.0.0"))]
    #[case(vec!["current", "dev"], None)]
    fn find_semantic_max_returns_expected(
        #[case] versions: Vec<&str>,
        #[case] expected: Option<&str>,
    ) {
        assert_eq!(find_semantic_max(&versions), expected);
    }
}
