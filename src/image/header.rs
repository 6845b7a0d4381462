//! Immutable image-metadata record.
//!
//! Headers are key-value metadata carried alongside a grid (unit label,
//! coordinate keywords, ...). They are deliberately immutable: deriving a new
//! image copies the record and applies updates through `with`, so a source
//! image and its derived maps never share mutable metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Unit-label keyword, mirroring the FITS convention.
pub const BUNIT: &str = "BUNIT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    items: BTreeMap<String, String>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.items.get(key).map(String::as_str)
    }

    /// Copy-and-update: returns a new record with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl Into<String>) -> Header {
        let mut items = self.items.clone();
        items.insert(key.into(), value.into());
        Header { items }
    }

    pub fn bunit(&self) -> Option<&str> {
        self.get(BUNIT)
    }

    pub fn with_bunit(&self, unit: impl Into<String>) -> Header {
        self.with(BUNIT, unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_does_not_touch_the_source_record() {
        let base = Header::new().with_bunit("K");
        let derived = base.with_bunit("log10(n_H2 [cm-3])");

        assert_eq!(base.bunit(), Some("K"));
        assert_eq!(derived.bunit(), Some("log10(n_H2 [cm-3])"));
    }

    #[test]
    fn missing_keys_read_as_none() {
        let h = Header::new();
        assert_eq!(h.bunit(), None);
        assert_eq!(h.get("CRVAL1"), None);
    }
}
