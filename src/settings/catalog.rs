//! Ordered value/token catalog with nearest-match queries.

use thiserror::Error;

/// Errors from quantization queries.
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    #[error("setting catalog has no entries")]
    Empty,
    #[error("requested value {target} is outside the supported range [{min}, {max}]")]
    OutOfRange { target: f64, min: f64, max: f64 },
}

/// An ordered mapping from numeric values to device choice tokens.
///
/// Built once per connection session from the device's enumerated
/// choices and read-only afterwards. Tokens of the form `1/N` parse to
/// the reciprocal (sub-second shutter speeds); everything else parses
/// as a direct number. Tokens that fail to parse are skipped.
#[derive(Debug, Clone, Default)]
pub struct SettingCatalog {
    /// Entries sorted ascending by value; values are unique.
    entries: Vec<(f64, String)>,
}

impl SettingCatalog {
    /// Builds a catalog from raw device choice tokens.
    ///
    /// Unparsable tokens are logged and skipped; the catalog is usable
    /// as long as at least one token parses. Duplicate numeric values
    /// keep the last-parsed token.
    pub fn build<I, S>(raw_choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut entries: Vec<(f64, String)> = Vec::new();

        for token in raw_choices {
            let token = token.as_ref();
            let Some(value) = parse_choice(token) else {
                tracing::warn!(token, "skipping unparsable setting choice");
                continue;
            };

            if let Some(entry) = entries.iter_mut().find(|(v, _)| *v == value) {
                entry.1 = token.to_string();
            } else {
                entries.push((value, token.to_string()));
            }
            tracing::debug!(token, value, "parsed setting choice");
        }

        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { entries }
    }

    /// Resolves `target` to the token of the nearest catalog value.
    ///
    /// Fails with [`CatalogError::Empty`] on an empty catalog and with
    /// [`CatalogError::OutOfRange`] when `target` lies outside
    /// `[min, max]`. On an exact tie between two neighboring values the
    /// lower value wins.
    pub fn nearest(&self, target: f64) -> Result<&str, CatalogError> {
        let (min, max) = match (self.entries.first(), self.entries.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => return Err(CatalogError::Empty),
        };

        if target < min || target > max {
            return Err(CatalogError::OutOfRange { target, min, max });
        }

        // First entry with a value at or above the target.
        let at_or_above = self.entries.partition_point(|(v, _)| *v < target);

        if at_or_above == 0 {
            return Ok(&self.entries[0].1);
        }
        if at_or_above == self.entries.len() {
            return Ok(&self.entries[at_or_above - 1].1);
        }

        let (below_value, below_token) = &self.entries[at_or_above - 1];
        let (above_value, above_token) = &self.entries[at_or_above];

        if (target - below_value).abs() <= (above_value - target).abs() {
            Ok(below_token)
        } else {
            Ok(above_token)
        }
    }

    /// Smallest value in the catalog.
    pub fn min(&self) -> Option<f64> {
        self.entries.first().map(|(v, _)| *v)
    }

    /// Largest value in the catalog.
    pub fn max(&self) -> Option<f64> {
        self.entries.last().map(|(v, _)| *v)
    }

    /// Number of parsed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no tokens parsed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(value, token)` pairs in ascending value order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, &str)> + '_ {
        self.entries.iter().map(|(v, t)| (*v, t.as_str()))
    }
}

/// Parses one choice token into its numeric value.
///
/// `1/N` is the reciprocal form used for sub-second exposure times.
fn parse_choice(token: &str) -> Option<f64> {
    let token = token.trim();
    if let Some(denominator) = token.strip_prefix("1/") {
        let denominator: f64 = denominator.parse().ok()?;
        if denominator == 0.0 {
            return None;
        }
        Some(1.0 / denominator)
    } else {
        token.parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn shutter_catalog() -> SettingCatalog {
        SettingCatalog::build(["1/4000", "1/125", "1/2", "1", "4", "30"])
    }

    #[test]
    fn test_fractional_and_direct_parsing() {
        let catalog = SettingCatalog::build(["1/125", "30"]);
        assert_eq!(catalog.min(), Some(1.0 / 125.0));
        assert_eq!(catalog.max(), Some(30.0));
    }

    #[test]
    fn test_exact_hits_are_idempotent() {
        let catalog = shutter_catalog();
        assert_eq!(catalog.nearest(1.0 / 4000.0).unwrap(), "1/4000");
        assert_eq!(catalog.nearest(0.5).unwrap(), "1/2");
        assert_eq!(catalog.nearest(4.0).unwrap(), "4");
        assert_eq!(catalog.nearest(30.0).unwrap(), "30");
    }

    #[test]
    fn test_midpoint_tie_prefers_lower() {
        let catalog = SettingCatalog::build(["100", "200", "400"]);
        assert_eq!(catalog.nearest(150.0).unwrap(), "100");
        assert_eq!(catalog.nearest(300.0).unwrap(), "200");
    }

    #[test]
    fn test_off_midpoint_picks_closer_neighbor() {
        let catalog = SettingCatalog::build(["100", "200"]);
        assert_eq!(catalog.nearest(149.0).unwrap(), "100");
        assert_eq!(catalog.nearest(151.0).unwrap(), "200");
    }

    #[test]
    fn test_out_of_range_rejected() {
        let catalog = shutter_catalog();
        assert!(matches!(
            catalog.nearest(1.0 / 8000.0),
            Err(CatalogError::OutOfRange { .. })
        ));
        assert!(matches!(
            catalog.nearest(60.0),
            Err(CatalogError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let catalog = SettingCatalog::build(Vec::<String>::new());
        assert!(matches!(catalog.nearest(1.0), Err(CatalogError::Empty)));
    }

    #[test]
    fn test_unparsable_tokens_skipped() {
        let catalog = SettingCatalog::build(["bulb", "1/60", "auto", "2"]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.nearest(2.0).unwrap(), "2");
    }

    #[test]
    fn test_duplicate_value_keeps_last_token() {
        let catalog = SettingCatalog::build(["0.5", "1/2"]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.nearest(0.5).unwrap(), "1/2");
    }

    #[test]
    fn test_zero_denominator_skipped() {
        let catalog = SettingCatalog::build(["1/0", "1"]);
        assert_eq!(catalog.len(), 1);
    }

    proptest! {
        /// `nearest` always returns the entry minimizing absolute
        /// distance, breaking exact ties toward the lower value.
        #[test]
        fn prop_nearest_minimizes_distance(
            values in prop::collection::btree_set(0u32..10_000, 1..32),
            target_raw in 0u32..10_000,
        ) {
            let values: Vec<u32> = values.iter().copied().collect();
            let tokens: Vec<String> = values.iter().map(|v| v.to_string()).collect();
            let catalog = SettingCatalog::build(&tokens);

            let min = values[0] as f64;
            let max = values[values.len() - 1] as f64;
            let target = (target_raw as f64).clamp(min, max);

            let token = catalog.nearest(target).unwrap();
            let picked: f64 = token.parse().unwrap();
            let picked_dist = (target - picked).abs();

            for &v in &values {
                let dist = (target - v as f64).abs();
                prop_assert!(
                    picked_dist < dist
                        || (picked_dist == dist && picked <= v as f64),
                    "picked {} (dist {}) but {} has dist {}",
                    picked, picked_dist, v, dist
                );
            }
        }
    }
}
