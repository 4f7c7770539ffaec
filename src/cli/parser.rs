// Dotted-path token parser for hypod
//
// Turns `a.b.c=value` tokens into one nested mapping whose leaves are raw
// strings. Two tokens may not assign different values to one path, and no
// path may be a strict prefix of another.

use crate::internal::error::{Error, Result};
use crate::value::types::{RawMap, RawValue};

/// One parsed `key=value` token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub path: Vec<String>,
    pub value: String,
}

impl Assignment {
    /// Parses a single token. The key and the value must both be non-empty,
    /// and every dotted segment of the key must be non-empty.
    pub fn parse(token: &str) -> Result<Self> {
        let (key, value) = token
            .split_once('=')
            .ok_or_else(|| Error::MalformedToken(token.to_string()))?;
        if key.is_empty() || value.is_empty() {
            return Err(Error::MalformedToken(token.to_string()));
        }
        let path: Vec<String> = key.split('.').map(str::to_string).collect();
        if path.iter().any(|segment| segment.is_empty()) {
            return Err(Error::MalformedToken(token.to_string()));
        }
        Ok(Self {
            path,
            value: value.to_string(),
        })
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

/// Parses tokens into a nested mapping.
pub fn parse_tokens<I, S>(tokens: I) -> Result<RawValue>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut assignments: Vec<Assignment> = Vec::new();

    for token in tokens {
        let next = Assignment::parse(token.as_ref())?;
        let mut repeated = false;
        for seen in &assignments {
            if seen.path == next.path {
                if seen.value != next.value {
                    return Err(Error::DuplicateKey {
                        key: next.dotted(),
                        first: seen.value.clone(),
                        second: next.value.clone(),
                    });
                }
                repeated = true;
            } else if next.path.starts_with(&seen.path) {
                return Err(Error::ConflictingPath {
                    prefix: seen.dotted(),
                    longer: next.dotted(),
                });
            } else if seen.path.starts_with(&next.path) {
                return Err(Error::ConflictingPath {
                    prefix: next.dotted(),
                    longer: seen.dotted(),
                });
            }
        }
        if !repeated {
            assignments.push(next);
        }
    }

    let mut root = RawMap::new();
    for assignment in assignments {
        insert_path(&mut root, &assignment.path, assignment.value);
    }
    Ok(RawValue::Map(root))
}

/// Inserts `value` at `path`, creating intermediate mappings.
///
/// Conflicts are rejected before insertion, so every intermediate slot is
/// either absent or already a mapping.
fn insert_path(map: &mut RawMap, path: &[String], value: String) {
    match path {
        [] => {}
        [leaf] => {
            map.insert(leaf.clone(), RawValue::Str(value));
        }
        [head, rest @ ..] => {
            let slot = map
                .entry(head.clone())
                .or_insert_with(RawValue::empty_map);
            if let RawValue::Map(child) = slot {
                insert_path(child, rest, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_nested_paths() {
        let raw = parse_tokens(["model.data=ffhq", "model.net.n=3", "seed=7"]).unwrap();
        let expected = RawValue::map([
            (
                "model",
                RawValue::map([
                    ("data", RawValue::from("ffhq")),
                    ("net", RawValue::map([("n", RawValue::from("3"))])),
                ]),
            ),
            ("seed", RawValue::from("7")),
        ]);
        assert_eq!(raw, expected);
    }

    #[test]
    fn test_value_keeps_later_equals_signs() {
        let raw = parse_tokens(["expr=a=b"]).unwrap();
        assert_eq!(raw.as_map().unwrap()["expr"], RawValue::from("a=b"));
    }

    #[test]
    fn test_malformed_tokens() {
        for token in ["novalue", "=3", "a=", "a..b=1", ".a=1", "a.=1"] {
            assert!(
                matches!(parse_tokens([token]), Err(Error::MalformedToken(_))),
                "token {token:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_duplicate_key() {
        let err = parse_tokens(["a.b=1", "a.b=2"]).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey { .. }));
        // Repeating the same assignment is harmless
        let raw = parse_tokens(["a.b=1", "a.b=1"]).unwrap();
        assert_eq!(raw, parse_tokens(["a.b=1"]).unwrap());
    }

    #[test]
    fn test_conflicting_paths_either_order() {
        assert!(matches!(parse_tokens(["a=1", "a.b=2"]), Err(Error::ConflictingPath { .. })));
        match parse_tokens(["a.b.c=2", "a.b=1"]).unwrap_err() {
            Error::ConflictingPath { prefix, longer } => {
                assert_eq!(prefix, "a.b");
                assert_eq!(longer, "a.b.c");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_siblings_share_parents() {
        let raw = parse_tokens(["a.x=1", "a.y=2"]).unwrap();
        let a = raw.as_map().unwrap()["a"].as_map().unwrap();
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_empty_token_list() {
        assert_eq!(parse_tokens(Vec::<String>::new()).unwrap(), RawValue::empty_map());
    }

    proptest! {
        #[test]
        fn prop_single_token_nests_by_segment(
            segments in proptest::collection::vec("[a-z_][a-z0-9_]{0,6}", 1..5),
            value in "[a-zA-Z0-9_./-]{1,10}",
        ) {
            let token = format!("{}={}", segments.join("."), value);
            let mut current = parse_tokens([token]).unwrap();
            for segment in &segments {
                let next = current.as_map().unwrap()[segment.as_str()].clone();
                current = next;
            }
            prop_assert_eq!(current, RawValue::Str(value));
        }
    }
}
