//! Dotted references to registered objects, such as `"dectest.sideeffects.GlobalStateChange"`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DottedPath(pub Vec<String>);

impl DottedPath {
    /// Splits `text` on `.`. Empty segments are kept so that malformed paths stay malformed.
    pub fn parse(text: &str) -> Self {
        if text.is_empty() {
            return Self(Vec::new());
        }
        Self(text.split('.').map(str::to_string).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Splits off the final segment: `a.b.c` becomes (`a.b`, `c`).
    pub fn split_last(&self) -> Option<(DottedPath, &str)> {
        let (last, rest) = self.0.split_last()?;
        Some((DottedPath(rest.to_vec()), last.as_str()))
    }
}

impl fmt::Display for DottedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display_round_trip() {
        let path = DottedPath::parse("dectest.sideeffects.GlobalStateChange");
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), "dectest.sideeffects.GlobalStateChange");
    }

    #[test]
    fn test_split_last() {
        let path = DottedPath::parse("a.b.c");
        let (module, attr) = path.split_last().unwrap();
        assert_eq!(module.to_string(), "a.b");
        assert_eq!(attr, "c");
        assert!(DottedPath::parse("").split_last().is_none());
    }
}
