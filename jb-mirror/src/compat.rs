use crate::api::PluginUpdate;
use crate::error::MirrorError;
use std::cmp::Ordering;
use std::fmt;

/// A vendor build identifier, split into its numeric segments.
///
/// A trailing wildcard (`*`) or empty segment is dropped during parsing,
/// never treated as zero. `4.2.*` therefore compares as `(4, 2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTuple(Vec<u64>);

impl BuildTuple {
    /// Parse a `since`/`until` range string.
    ///
    /// Valid: ``""``, `"123"`, `"123.*"`, `"123.456"`, `"123.456.*"`,
    /// `"123.456.789"`. A wildcard may only be the final segment and
    /// never the first.
    pub fn parse_range(raw: &str) -> Result<Self, MirrorError> {
        if raw.is_empty() {
            return Ok(Self(Vec::new()));
        }

        let segments: Vec<&str> = raw.split('.').collect();
        if segments.len() > 3 {
            return Err(MirrorError::InvalidRangeFormat(raw.to_owned()));
        }

        let mut parts = Vec::with_capacity(segments.len());
        for (index, segment) in segments.iter().enumerate() {
            if *segment == "*" {
                if index == 0 || index + 1 != segments.len() {
                    return Err(MirrorError::InvalidRangeFormat(raw.to_owned()));
                }
                break;
            }

            let value = segment
                .parse::<u64>()
                .map_err(|_| MirrorError::InvalidRangeFormat(raw.to_owned()))?;
            parts.push(value);
        }

        Ok(Self(parts))
    }

    /// Parse a product build string such as `"242.23726.103"`.
    ///
    /// More lenient than [`Self::parse_range`]: wildcard and empty
    /// segments are filtered wherever they appear, the rest must be
    /// numeric.
    pub fn from_build(raw: &str) -> Result<Self, MirrorError> {
        raw.split('.')
            .map(str::trim)
            .filter(|segment| !segment.is_empty() && *segment != "*")
            .map(|segment| {
                segment
                    .parse::<u64>()
                    .map_err(|_| MirrorError::InvalidRangeFormat(raw.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Lexicographic ordering over the shared-length prefix only.
    ///
    /// The first differing segment decides; if one tuple runs out before
    /// any difference is found, the tuples are considered equal. Extra
    /// segments on either side carry no weight.
    pub fn cmp_prefix(&self, other: &Self) -> Ordering {
        for (own, theirs) in self.0.iter().zip(other.0.iter()) {
            match own.cmp(theirs) {
                Ordering::Equal => continue,
                unequal => return unequal,
            }
        }

        Ordering::Equal
    }
}

impl fmt::Display for BuildTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, segment) in self.0.iter().enumerate() {
            if index > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment)?;
        }

        Ok(())
    }
}

/// The build range a plugin update declares itself compatible with.
///
/// An absent bound is a first-class "no constraint", not zero.
#[derive(Debug, Clone)]
pub struct VersionRange {
    pub since: Option<BuildTuple>,
    pub until: Option<BuildTuple>,
}

impl VersionRange {
    pub fn parse(since: Option<&str>, until: Option<&str>) -> Result<Self, MirrorError> {
        Ok(Self {
            since: since.map(BuildTuple::parse_range).transpose()?,
            until: until.map(BuildTuple::parse_range).transpose()?,
        })
    }

    /// Whether `build` falls inside this range.
    ///
    /// The lower bound is inclusive. The upper bound uses a
    /// most-significant-difference walk: the first segment where the
    /// build is smaller than `until` satisfies the bound regardless of
    /// later segments, and a build that is longer than `until` does not
    /// fail by length alone (`until = "4.2.*"` admits the whole `4.2`
    /// series).
    pub fn contains(&self, build: &BuildTuple) -> bool {
        let low = match &self.since {
            None => true,
            Some(since) => build.cmp_prefix(since) != Ordering::Less,
        };

        let high = match &self.until {
            None => true,
            Some(until) => build.cmp_prefix(until) != Ordering::Greater,
        };

        tracing::trace!(
            "Testing {:?} <= {} <= {:?}: low={} high={}",
            self.since,
            build,
            self.until,
            low,
            high
        );

        low && high
    }
}

/// Pick the compatible update with the newest creation timestamp.
///
/// The update list arrives from the API in no guaranteed order, so the
/// whole history is ranked. Ties on the timestamp keep the earliest list
/// position.
pub fn select_update<'a>(updates: &'a [PluginUpdate], build: &BuildTuple) -> Option<&'a PluginUpdate> {
    let mut best: Option<&PluginUpdate> = None;

    for update in updates {
        if !update.range.contains(build) {
            continue;
        }

        match best {
            Some(current) if update.timestamp_ms <= current.timestamp_ms => {}
            _ => best = Some(update),
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuple(segments: &[u64]) -> BuildTuple {
        BuildTuple(segments.to_vec())
    }

    fn range(since: Option<&str>, until: Option<&str>) -> VersionRange {
        VersionRange::parse(since, until).unwrap()
    }

    fn update(id: u64, timestamp_ms: u64, until: Option<&str>) -> PluginUpdate {
        PluginUpdate {
            id,
            version: format!("v{}", id),
            timestamp_ms,
            range: range(None, until),
        }
    }

    #[test]
    fn parses_valid_range_strings() {
        assert_eq!(BuildTuple::parse_range("").unwrap(), tuple(&[]));
        assert_eq!(BuildTuple::parse_range("123").unwrap(), tuple(&[123]));
        assert_eq!(BuildTuple::parse_range("123.*").unwrap(), tuple(&[123]));
        assert_eq!(BuildTuple::parse_range("123.456").unwrap(), tuple(&[123, 456]));
        assert_eq!(BuildTuple::parse_range("123.456.*").unwrap(), tuple(&[123, 456]));
        assert_eq!(
            BuildTuple::parse_range("123.456.789").unwrap(),
            tuple(&[123, 456, 789])
        );
    }

    #[test]
    fn rejects_malformed_range_strings() {
        for raw in ["1..2", "1.*.2", "*", "*.1", "1.2.3.4", "a.b", "1.2.x"] {
            assert!(
                matches!(
                    BuildTuple::parse_range(raw),
                    Err(MirrorError::InvalidRangeFormat(_))
                ),
                "`{}` should be rejected",
                raw
            );
        }
    }

    #[test]
    fn build_string_drops_wildcard_and_empty_segments() {
        assert_eq!(BuildTuple::from_build("242.23726.103").unwrap(), tuple(&[242, 23726, 103]));
        assert_eq!(BuildTuple::from_build("242.*").unwrap(), tuple(&[242]));
        assert_eq!(BuildTuple::from_build("242.").unwrap(), tuple(&[242]));
        assert!(BuildTuple::from_build("242.x").is_err());
    }

    #[test]
    fn wildcard_until_admits_the_whole_branch() {
        // until = "1.*" truncates to (1,)
        let r = range(Some("1.0"), Some("1.*"));
        assert!(r.contains(&tuple(&[1, 0])));
        assert!(!r.contains(&tuple(&[2, 0])));
    }

    #[test]
    fn longer_build_does_not_fail_an_exhausted_until() {
        // until = "1.5.*" truncates to (1, 5); the third build segment is
        // never compared.
        let r = range(None, Some("1.5.*"));
        assert!(r.contains(&tuple(&[1, 5, 3])));
        assert!(!r.contains(&tuple(&[1, 6, 0])));
    }

    #[test]
    fn absent_bounds_are_unconstrained() {
        let r = range(None, None);
        assert!(r.contains(&tuple(&[999, 999])));

        let r = range(Some(""), Some(""));
        assert!(r.contains(&tuple(&[1])));
    }

    #[test]
    fn lower_bound_is_inclusive() {
        let r = range(Some("241.0"), None);
        assert!(r.contains(&tuple(&[241, 0])));
        assert!(r.contains(&tuple(&[242, 1])));
        assert!(!r.contains(&tuple(&[240, 9999])));
    }

    #[test]
    fn upper_bound_uses_most_significant_difference() {
        let r = range(None, Some("4.2.1"));
        // 4.1.99 wins at index 1 before index 2 is reached
        assert!(r.contains(&tuple(&[4, 1, 99])));
        assert!(r.contains(&tuple(&[4, 2, 1])));
        assert!(!r.contains(&tuple(&[4, 2, 2])));
        assert!(!r.contains(&tuple(&[4, 3, 0])));
    }

    #[test]
    fn selects_newest_compatible_update_by_timestamp() {
        let updates = vec![
            update(1, 100, None),          // compatible
            update(2, 200, None),          // compatible, newest
            update(3, 150, Some("0.9.*")), // incompatible
        ];

        let chosen = select_update(&updates, &tuple(&[1, 0])).unwrap();
        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn selection_is_independent_of_list_order() {
        let updates = vec![
            update(2, 200, None),
            update(3, 150, Some("0.9.*")),
            update(1, 100, None),
        ];

        let chosen = select_update(&updates, &tuple(&[1, 0])).unwrap();
        assert_eq!(chosen.id, 2);
    }

    #[test]
    fn timestamp_ties_keep_the_earliest_list_position() {
        let updates = vec![update(7, 100, None), update(8, 100, None)];

        let chosen = select_update(&updates, &tuple(&[1, 0])).unwrap();
        assert_eq!(chosen.id, 7);
    }

    #[test]
    fn no_compatible_update_yields_none() {
        let updates = vec![update(1, 100, Some("1.*"))];
        assert!(select_update(&updates, &tuple(&[2, 0])).is_none());
    }
}
