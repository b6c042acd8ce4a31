//! Response-code class filter
//!
//! Persistence is decided per class of status code (1xx..5xx). A code that
//! is missing, empty or non-numeric belongs to no class and is never
//! persisted.

use serde::{Deserialize, Serialize};

use crate::config::lenient;

/// Per-class switches, all enabled by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeClasses {
    /// Informational responses (100-199)
    #[serde(rename = "1xx", default = "enabled", deserialize_with = "lenient::flag_on")]
    pub informational: bool,

    /// Successful responses (200-299)
    #[serde(rename = "2xx", default = "enabled", deserialize_with = "lenient::flag_on")]
    pub success: bool,

    /// Redirection responses (300-399)
    #[serde(rename = "3xx", default = "enabled", deserialize_with = "lenient::flag_on")]
    pub redirection: bool,

    /// Client error responses (400-499)
    #[serde(rename = "4xx", default = "enabled", deserialize_with = "lenient::flag_on")]
    pub client_error: bool,

    /// Server error responses (500-599)
    #[serde(rename = "5xx", default = "enabled", deserialize_with = "lenient::flag_on")]
    pub server_error: bool,
}

fn enabled() -> bool {
    true
}

impl Default for CodeClasses {
    fn default() -> Self {
        Self {
            informational: true,
            success: true,
            redirection: true,
            client_error: true,
            server_error: true,
        }
    }
}

impl CodeClasses {
    /// Enable or disable one class by its leading digit; other digits are ignored
    pub fn set(&mut self, class: u8, enabled: bool) {
        match class {
            1 => self.informational = enabled,
            2 => self.success = enabled,
            3 => self.redirection = enabled,
            4 => self.client_error = enabled,
            5 => self.server_error = enabled,
            _ => {}
        }
    }

    pub fn with(mut self, class: u8, enabled: bool) -> Self {
        self.set(class, enabled);
        self
    }
}

/// Decides whether a matched request is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeFilter {
    /// Indexed by leading digit minus one
    enabled: [bool; 5],
}

impl CodeFilter {
    pub fn new(classes: &CodeClasses) -> Self {
        Self {
            enabled: [
                classes.informational,
                classes.success,
                classes.redirection,
                classes.client_error,
                classes.server_error,
            ],
        }
    }

    /// True when the class of `code` is enabled
    ///
    /// `code` is the status code as text. Anything that is not a run of ASCII
    /// digits starting with 1-5 is rejected, including `"0"` and `""`.
    pub fn should_persist(&self, code: &str) -> bool {
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }

        match code.as_bytes()[0] {
            digit @ b'1'..=b'5' => self.enabled[usize::from(digit - b'1')],
            _ => false,
        }
    }
}

impl Default for CodeFilter {
    fn default() -> Self {
        Self::new(&CodeClasses::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_classes_enabled_by_default() {
        let filter = CodeFilter::default();

        for code in ["100", "200", "301", "404", "500", "599"] {
            assert!(filter.should_persist(code), "{} should persist", code);
        }
    }

    #[test]
    fn test_disabled_class_rejected() {
        let filter = CodeFilter::new(&CodeClasses::default().with(4, false));

        assert!(!filter.should_persist("404"));
        assert!(!filter.should_persist("429"));
        assert!(filter.should_persist("200"));
        assert!(filter.should_persist("500"));
    }

    #[test]
    fn test_each_class_independent() {
        for class in 1..=5u8 {
            let filter = CodeFilter::new(&CodeClasses::default().with(class, false));
            let code = format!("{}00", class);

            assert!(!filter.should_persist(&code));
            for other in (1..=5u8).filter(|c| *c != class) {
                assert!(filter.should_persist(&format!("{}00", other)));
            }
        }
    }

    #[test]
    fn test_malformed_codes_rejected() {
        let filter = CodeFilter::default();

        assert!(!filter.should_persist(""));
        assert!(!filter.should_persist("0"));
        assert!(!filter.should_persist("abc"));
        assert!(!filter.should_persist("4xx"));
        assert!(!filter.should_persist("-200"));
        assert!(!filter.should_persist(" 200"));
        assert!(!filter.should_persist("600"));
        assert!(!filter.should_persist("999"));
    }

    #[test]
    fn test_set_ignores_unknown_class() {
        let mut classes = CodeClasses::default();
        classes.set(9, false);
        classes.set(0, false);

        assert_eq!(classes, CodeClasses::default());
    }
}
