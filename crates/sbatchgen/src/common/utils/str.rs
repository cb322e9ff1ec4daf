use std::borrow::Cow;

/// Return the input string with an added "s" at the end if `count` is larger than one and non-zero.
pub fn pluralize(value: &str, count: usize) -> Cow<'_, str> {
    if count == 1 {
        Cow::Borrowed(value)
    } else {
        Cow::Owned(format!("{value}s"))
    }
}

/// Returns true if `value` is empty or contains only whitespace.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::{is_blank, pluralize};

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize("module", 1), "module");
        assert_eq!(pluralize("module", 0), "modules");
        assert_eq!(pluralize("module", 3), "modules");
    }

    #[test]
    fn test_is_blank() {
        assert!(is_blank(""));
        assert!(is_blank(" \t"));
        assert!(!is_blank("4G"));
    }
}
