use std::collections::{BTreeMap, HashSet};

/// User-defined aliases, flattened once at construction.
///
/// An alias maps to a token sequence whose first token may itself be an
/// alias; chains are resolved here so dispatch only ever does one lookup.
/// Aliases that lead back to themselves are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasTable {
    expanded: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    pub fn new(raw: BTreeMap<String, Vec<String>>) -> Self {
        let raw: BTreeMap<String, Vec<String>> = raw
            .into_iter()
            .filter(|(_, tokens)| !tokens.is_empty())
            .map(|(alias, tokens)| (alias.to_lowercase(), tokens))
            .collect();

        let mut expanded = BTreeMap::new();
        for alias in raw.keys() {
            match flatten(alias, &raw) {
                Some(tokens) => {
                    expanded.insert(alias.clone(), tokens);
                }
                None => tracing::warn!(alias = %alias, "dropping cyclic alias"),
            }
        }
        Self { expanded }
    }

    /// Expansion for `token`, if it is an alias.
    pub fn get(&self, token: &str) -> Option<&[String]> {
        self.expanded.get(&token.to_lowercase()).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }
}

/// Follow the chain starting at `alias`. `None` on a cycle.
fn flatten(alias: &str, raw: &BTreeMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut seen = HashSet::new();
    seen.insert(alias.to_string());
    let mut tokens = raw.get(alias)?.clone();

    loop {
        let head = tokens[0].to_lowercase();
        let Some(next) = raw.get(&head) else {
            return Some(tokens);
        };
        if !seen.insert(head) {
            return None;
        }
        tokens.splice(0..1, next.iter().cloned());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> AliasTable {
        AliasTable::new(
            pairs
                .iter()
                .map(|(a, e)| {
                    (
                        a.to_string(),
                        e.split_whitespace().map(String::from).collect(),
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn simple_alias() {
        let t = table(&[("ll", "breakpoints")]);
        assert_eq!(t.get("ll").unwrap(), ["breakpoints"]);
        assert_eq!(t.get("LL").unwrap(), ["breakpoints"]);
        assert!(t.get("breakpoints").is_none());
    }

    #[test]
    fn chains_are_flattened() {
        let t = table(&[("pp", "px extra"), ("px", "print x")]);
        assert_eq!(t.get("pp").unwrap(), ["print", "x", "extra"]);
    }

    #[test]
    fn cycles_are_dropped() {
        let t = table(&[("a", "b"), ("b", "a 1"), ("ok", "help")]);
        assert!(t.get("a").is_none());
        assert!(t.get("b").is_none());
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let t = table(&[("loop", "loop again")]);
        assert!(t.is_empty());
    }

    #[test]
    fn empty_expansion_ignored() {
        let t = table(&[("nothing", "   ")]);
        assert!(t.get("nothing").is_none());
    }
}
