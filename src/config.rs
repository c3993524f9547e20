use serde::{Deserialize, Serialize};

/// Options a host passes to a [`StructView`](crate::view::StructView).
///
/// Missing fields take their defaults when deserialized, so a host can store
/// only what it overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewConfig {
    /// Draw the chiral flag of structures flagged chiral.
    pub show_chiral_flag: bool,
    /// Recompute implicit hydrogen counts for touched atoms.
    pub implicit_hydrogens: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            show_chiral_flag: true,
            implicit_hydrogens: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: ViewConfig = serde_json::from_str(r#"{"show_chiral_flag": false}"#).unwrap();
        assert!(!cfg.show_chiral_flag);
        assert!(cfg.implicit_hydrogens);
        let empty: ViewConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(empty, ViewConfig::default());
    }
}
