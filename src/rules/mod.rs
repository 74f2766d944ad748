//! Built-in porting rules
//!
//! The rule set is closed: each [`Detector`] inspects one parsed unit and
//! records its findings in the unit's [`DiagnosticCollector`].

mod identifiers;
mod virtual_inheritance;

pub use virtual_inheritance::collect_leaves;

use crate::config::{Config, DEFAULT_MARKER, DEFAULT_PLATFORM_PREFIX};
use crate::diagnostic::DiagnosticCollector;
use crate::model::{ParsedUnit, SemanticModel};

/// Settings shared by the detectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSettings {
    /// Qualified name of the attribute that marks intentional virtual inheritance
    pub marker: String,
    /// Display-name prefix of platform types
    pub platform_prefix: String,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER.to_string(),
            platform_prefix: DEFAULT_PLATFORM_PREFIX.to_string(),
        }
    }
}

impl RuleSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            marker: config.analysis.marker.clone(),
            platform_prefix: config.analysis.platform_prefix.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Detector {
    /// Diamond inheritance from user interfaces without the marker
    VirtualInheritance,
    /// Identifiers outside `[A-Za-z0-9_]`
    NonAsciiIdentifiers,
}

impl Detector {
    pub const ALL: [Detector; 2] = [Detector::VirtualInheritance, Detector::NonAsciiIdentifiers];

    pub fn id(self) -> &'static str {
        match self {
            Detector::VirtualInheritance => virtual_inheritance::RULE_ID,
            Detector::NonAsciiIdentifiers => identifiers::RULE_ID,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Detector::VirtualInheritance => {
                "Base interfaces inherited more than once must be marked for virtual inheritance"
            }
            Detector::NonAsciiIdentifiers => "Identifiers must consist of ASCII letters, digits and underscores",
        }
    }

    /// Detectors left enabled by the configuration, in run order
    pub fn enabled(config: &Config) -> Vec<Detector> {
        Self::ALL
            .into_iter()
            .filter(|d| config.is_rule_enabled(d.id()))
            .collect()
    }

    /// Run over one unit; returns the number of findings recorded
    pub fn run<M: SemanticModel>(
        self,
        unit: &ParsedUnit<'_, M>,
        settings: &RuleSettings,
        collector: &mut DiagnosticCollector,
    ) -> usize {
        match self {
            Detector::VirtualInheritance => virtual_inheritance::check(unit, settings, collector),
            Detector::NonAsciiIdentifiers => identifiers::check(unit, collector),
        }
    }

    /// Narration line reporting how many problems a run found
    pub fn summary(self, count: usize) -> String {
        match self {
            Detector::VirtualInheritance => format!(
                "Found {} base non-system interfaces not marked for virtual inheritance in the ported C++ code",
                count
            ),
            Detector::NonAsciiIdentifiers => format!(
                "Found {} non-ASCII identifiers leading to errors in the ported C++ code",
                count
            ),
        }
    }
}

impl std::fmt::Display for Detector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for Detector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.id().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown rule: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detector_ids_round_trip() {
        for detector in Detector::ALL {
            assert_eq!(detector.id().parse::<Detector>(), Ok(detector));
        }
        assert_eq!("NON-ASCII-IDENTIFIERS".parse(), Ok(Detector::NonAsciiIdentifiers));
        assert!("no-such-rule".parse::<Detector>().is_err());
    }

    #[test]
    fn test_enabled_respects_disabled_rules() {
        let mut config = Config::default();
        assert_eq!(Detector::enabled(&config), Detector::ALL.to_vec());

        config.rules.disabled = vec!["Virtual-Inheritance".to_string()];
        assert_eq!(Detector::enabled(&config), vec![Detector::NonAsciiIdentifiers]);
    }

    #[test]
    fn test_summary_lines() {
        assert_eq!(
            Detector::NonAsciiIdentifiers.summary(2),
            "Found 2 non-ASCII identifiers leading to errors in the ported C++ code"
        );
        assert!(Detector::VirtualInheritance.summary(0).starts_with("Found 0 base non-system"));
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = Config::default();
        config.analysis.marker = "My.Marker".to_string();
        let settings = RuleSettings::from_config(&config);
        assert_eq!(settings.marker, "My.Marker");
        assert_eq!(settings.platform_prefix, "System.");
        assert_eq!(RuleSettings::default().marker, DEFAULT_MARKER);
    }
}
