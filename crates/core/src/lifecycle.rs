//! Asset lifecycle vocabulary and the per-type transition rule table.
//!
//! Each asset type owns an ordered "main line" of states. Adjacent entries
//! are one-directional forward edges, and the terminal state may return to
//! the initial state (return-to-stock). No other edges exist.
//!
//! The table is plain data handed to the engine at construction time, so a
//! tenant-supplied table can replace the built-in one without any shared
//! mutable state.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Vocabulary
// ---------------------------------------------------------------------------

/// Kind of physical asset. Determines which lifecycle applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetType {
    MobilePhone,
    Tablet,
    Desktop,
    Laptop,
    Monitor,
}

impl AssetType {
    pub const ALL: [AssetType; 5] = [
        AssetType::MobilePhone,
        AssetType::Tablet,
        AssetType::Desktop,
        AssetType::Laptop,
        AssetType::Monitor,
    ];

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MobilePhone => "MOBILE_PHONE",
            Self::Tablet => "TABLET",
            Self::Desktop => "DESKTOP",
            Self::Laptop => "LAPTOP",
            Self::Monitor => "MONITOR",
        }
    }

    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("Invalid asset type '{s}'"))
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stage in an asset's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetState {
    Available,
    SignedOut,
    Building,
    ReadyToGo,
    Issued,
}

impl AssetState {
    pub const ALL: [AssetState; 5] = [
        AssetState::Available,
        AssetState::SignedOut,
        AssetState::Building,
        AssetState::ReadyToGo,
        AssetState::Issued,
    ];

    /// Convert to the database string value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::SignedOut => "SIGNED_OUT",
            Self::Building => "BUILDING",
            Self::ReadyToGo => "READY_TO_GO",
            Self::Issued => "ISSUED",
        }
    }

    /// Convert from a database string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .ok_or_else(|| format!("Invalid asset state '{s}'"))
    }
}

impl fmt::Display for AssetState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Configuration shape
// ---------------------------------------------------------------------------

fn default_return_to_start() -> bool {
    true
}

/// One asset type's lifecycle as supplied by configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    /// Main-line states, initial first and terminal last.
    pub states: Vec<AssetState>,
    /// Whether the terminal state may move back to the initial state.
    #[serde(default = "default_return_to_start")]
    pub return_to_start: bool,
}

impl Lifecycle {
    fn position(&self, state: AssetState) -> Option<usize> {
        self.states.iter().position(|s| *s == state)
    }

    fn next_states(&self, current: AssetState) -> BTreeSet<AssetState> {
        let mut next = BTreeSet::new();
        let Some(pos) = self.position(current) else {
            return next;
        };

        if let Some(forward) = self.states.get(pos + 1) {
            next.insert(*forward);
        }

        let is_terminal = pos + 1 == self.states.len();
        if is_terminal && self.return_to_start && self.states.len() > 1 {
            next.insert(self.states[0]);
        }

        next
    }
}

/// Tenant-supplied rule table, e.g. loaded from JSON:
///
/// ```json
/// { "lifecycles": { "LAPTOP": { "states": ["AVAILABLE", "ISSUED"] } } }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RulesConfig {
    pub lifecycles: HashMap<AssetType, Lifecycle>,
}

// ---------------------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------------------

/// Per-asset-type transition rules.
#[derive(Debug, Clone)]
pub struct TransitionRules {
    lifecycles: HashMap<AssetType, Lifecycle>,
}

impl TransitionRules {
    /// The built-in table: every type runs the full line except monitors,
    /// which skip `BUILDING`.
    pub fn standard() -> Self {
        use AssetState::*;

        let full = Lifecycle {
            states: vec![Available, SignedOut, Building, ReadyToGo, Issued],
            return_to_start: true,
        };
        let monitor = Lifecycle {
            states: vec![Available, SignedOut, ReadyToGo, Issued],
            return_to_start: true,
        };

        let lifecycles = AssetType::ALL
            .into_iter()
            .map(|t| match t {
                AssetType::Monitor => (t, monitor.clone()),
                _ => (t, full.clone()),
            })
            .collect();

        Self { lifecycles }
    }

    /// Build a table from configuration. Types absent from the config have
    /// no lifecycle at all.
    pub fn from_config(config: RulesConfig) -> Result<Self, CoreError> {
        for (asset_type, lifecycle) in &config.lifecycles {
            if lifecycle.states.is_empty() {
                return Err(CoreError::Validation(format!(
                    "Lifecycle for {asset_type} has no states"
                )));
            }
            let mut seen = HashSet::new();
            if let Some(dup) = lifecycle.states.iter().find(|s| !seen.insert(**s)) {
                return Err(CoreError::Validation(format!(
                    "Lifecycle for {asset_type} lists {dup} more than once"
                )));
            }
        }

        Ok(Self {
            lifecycles: config.lifecycles,
        })
    }

    /// Legal next states for `(asset_type, current)`.
    ///
    /// Unknown pairs yield an empty set; "no valid transition" is the safe
    /// default for states this table does not know about.
    pub fn valid_next_states(
        &self,
        asset_type: AssetType,
        current: AssetState,
    ) -> BTreeSet<AssetState> {
        self.lifecycles
            .get(&asset_type)
            .map(|l| l.next_states(current))
            .unwrap_or_default()
    }

    /// Canonical display/iteration order for a type.
    pub fn lifecycle_order(&self, asset_type: AssetType) -> &[AssetState] {
        self.lifecycles
            .get(&asset_type)
            .map(|l| l.states.as_slice())
            .unwrap_or(&[])
    }

    /// The state a freshly registered asset starts in.
    pub fn initial_state(&self, asset_type: AssetType) -> Option<AssetState> {
        self.lifecycle_order(asset_type).first().copied()
    }

    /// Whether `from -> to` is a single legal hop.
    pub fn is_legal(&self, asset_type: AssetType, from: AssetState, to: AssetState) -> bool {
        self.valid_next_states(asset_type, from).contains(&to)
    }

    /// Shortest sequence of hops leading from `from` to `to`.
    ///
    /// The returned path excludes `from` and ends with `to`. Returns `None`
    /// when `to` is unreachable or equal to `from`.
    pub fn path(
        &self,
        asset_type: AssetType,
        from: AssetState,
        to: AssetState,
    ) -> Option<Vec<AssetState>> {
        if from == to {
            return None;
        }

        let mut came_from: HashMap<AssetState, AssetState> = HashMap::new();
        let mut queue = VecDeque::from([from]);

        while let Some(state) = queue.pop_front() {
            for next in self.valid_next_states(asset_type, state) {
                if next == from || came_from.contains_key(&next) {
                    continue;
                }
                came_from.insert(next, state);
                if next == to {
                    let mut path = vec![to];
                    let mut cursor = to;
                    while let Some(prev) = came_from.get(&cursor).copied() {
                        if prev == from {
                            break;
                        }
                        path.push(prev);
                        cursor = prev;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(next);
            }
        }

        None
    }

    /// Every configured lifecycle, ordered by asset type.
    pub fn lifecycles(&self) -> Vec<(AssetType, &Lifecycle)> {
        let mut all: Vec<_> = self.lifecycles.iter().map(|(t, l)| (*t, l)).collect();
        all.sort_by_key(|(t, _)| *t);
        all
    }
}

impl Default for TransitionRules {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AssetState::*;

    fn set(states: &[AssetState]) -> BTreeSet<AssetState> {
        states.iter().copied().collect()
    }

    #[test]
    fn laptop_moves_forward_one_stage() {
        let rules = TransitionRules::standard();
        assert_eq!(
            rules.valid_next_states(AssetType::Laptop, Available),
            set(&[SignedOut])
        );
        assert_eq!(
            rules.valid_next_states(AssetType::Laptop, SignedOut),
            set(&[Building])
        );
        assert_eq!(
            rules.valid_next_states(AssetType::Laptop, Building),
            set(&[ReadyToGo])
        );
    }

    #[test]
    fn issued_returns_to_available_for_every_type() {
        let rules = TransitionRules::standard();
        for t in AssetType::ALL {
            assert_eq!(rules.valid_next_states(t, Issued), set(&[Available]), "{t}");
        }
    }

    #[test]
    fn monitor_skips_building() {
        let rules = TransitionRules::standard();
        assert_eq!(
            rules.lifecycle_order(AssetType::Monitor),
            &[Available, SignedOut, ReadyToGo, Issued]
        );
        assert_eq!(
            rules.valid_next_states(AssetType::Monitor, SignedOut),
            set(&[ReadyToGo])
        );
        assert!(!rules.is_legal(AssetType::Monitor, SignedOut, Building));
    }

    #[test]
    fn unknown_pair_yields_empty_set() {
        let rules = TransitionRules::standard();
        assert!(rules
            .valid_next_states(AssetType::Monitor, Building)
            .is_empty());

        let partial = TransitionRules::from_config(RulesConfig {
            lifecycles: HashMap::from([(
                AssetType::Laptop,
                Lifecycle {
                    states: vec![Available, Issued],
                    return_to_start: true,
                },
            )]),
        })
        .unwrap();
        for s in AssetState::ALL {
            assert!(partial.valid_next_states(AssetType::Tablet, s).is_empty());
        }
        assert!(partial.lifecycle_order(AssetType::Tablet).is_empty());
        assert_eq!(partial.initial_state(AssetType::Tablet), None);
    }

    #[test]
    fn self_transition_is_never_legal() {
        let rules = TransitionRules::standard();
        for t in AssetType::ALL {
            for s in AssetState::ALL {
                assert!(!rules.is_legal(t, s, s));
            }
        }
    }

    #[test]
    fn path_walks_intermediate_states() {
        let rules = TransitionRules::standard();
        assert_eq!(
            rules.path(AssetType::Laptop, Available, Issued),
            Some(vec![SignedOut, Building, ReadyToGo, Issued])
        );
        assert_eq!(
            rules.path(AssetType::Monitor, Available, Issued),
            Some(vec![SignedOut, ReadyToGo, Issued])
        );
        assert_eq!(
            rules.path(AssetType::Desktop, ReadyToGo, SignedOut),
            Some(vec![Issued, Available, SignedOut])
        );
    }

    #[test]
    fn path_is_none_for_self_or_unreachable() {
        let rules = TransitionRules::standard();
        assert_eq!(rules.path(AssetType::Laptop, Building, Building), None);
        assert_eq!(rules.path(AssetType::Monitor, Available, Building), None);
    }

    #[test]
    fn terminal_without_return_has_no_next_state() {
        let rules = TransitionRules::from_config(RulesConfig {
            lifecycles: HashMap::from([(
                AssetType::Tablet,
                Lifecycle {
                    states: vec![Available, Issued],
                    return_to_start: false,
                },
            )]),
        })
        .unwrap();
        assert!(rules.valid_next_states(AssetType::Tablet, Issued).is_empty());
        assert_eq!(rules.path(AssetType::Tablet, Issued, Available), None);
    }

    #[test]
    fn config_rejects_empty_and_duplicate_lifecycles() {
        let empty = RulesConfig {
            lifecycles: HashMap::from([(
                AssetType::Laptop,
                Lifecycle {
                    states: vec![],
                    return_to_start: true,
                },
            )]),
        };
        assert!(TransitionRules::from_config(empty).is_err());

        let dup = RulesConfig {
            lifecycles: HashMap::from([(
                AssetType::Laptop,
                Lifecycle {
                    states: vec![Available, SignedOut, Available],
                    return_to_start: true,
                },
            )]),
        };
        assert!(TransitionRules::from_config(dup).is_err());
    }

    #[test]
    fn config_parses_from_json_with_default_return_edge() {
        let json = r#"{ "lifecycles": { "MONITOR": { "states": ["AVAILABLE", "ISSUED"] } } }"#;
        let config: RulesConfig = serde_json::from_str(json).unwrap();
        let rules = TransitionRules::from_config(config).unwrap();
        assert_eq!(
            rules.valid_next_states(AssetType::Monitor, Issued),
            set(&[Available])
        );
    }

    #[test]
    fn string_values_round_trip() {
        for t in AssetType::ALL {
            assert_eq!(AssetType::from_str_value(t.as_str()).unwrap(), t);
        }
        for s in AssetState::ALL {
            assert_eq!(AssetState::from_str_value(s.as_str()).unwrap(), s);
        }
        assert!(AssetState::from_str_value("LOST").is_err());
        assert_eq!(
            serde_json::to_value(AssetState::ReadyToGo).unwrap(),
            "READY_TO_GO"
        );
    }
}
