// =============================================================================
// text_scanner.rs - THE METRIC RULE ENGINE
// =============================================================================
//
// Disclosure documents say the same thing a hundred different ways:
//
//   "Scope 1 emissions: 12,345.6 tCO2e"
//   "Scope I (tCO2e) ... 12,345"
//   "45% of electricity from renewable energy"
//
// Instead of one hand-written function per phrasing, every phrasing is a row
// in a rule table. Each metric gets an ordered list of rules; the engine
// tries them in order and the first one that matches wins. No voting, no
// merging. A new report format is a new row, not a new function.
//
// Every rule has the same skeleton: an anchor phrase, a bounded window of
// non-digit characters, a numeric token, and optionally a unit from a closed
// vocabulary. The window is the precision/recall dial. At 10 characters
// "Scope 1 emissions: 12,345" matches and "Scope 1 emissions are described
// on page 12" does not. Widen it and the second one starts "matching".
//
// Numbers in tables that the PDF text layer scatters across lines will be
// missed. That is a known limit of the approach, not something to paper over
// with an unbounded window.
// =============================================================================

use aho_corasick::AhoCorasick;
use regex::Regex;
use tracing::debug;

use crate::error::{ConfigError, FailureKind};
use crate::models::{Metric, MetricMatch, MetricSet};

/// The numeric token: starts and ends with a digit, thousands separators and
/// a decimal point allowed in between.
const NUMBER: &str = r"(?P<value>\d(?:[\d,.]*\d)?)";

/// The closed unit vocabulary. Longest spellings first so `tCO2e` is never
/// read as `tCO2` followed by a stray `e`.
const UNIT: &str = r"(?P<unit>mt\s?co(?:2|₂)\s?e\b|kt\s?co(?:2|₂)\s?e\b|t\s?co(?:2|₂)\s?e(?:q)?\b|t\s?co(?:2\b|₂)|tonnes\b|tons\b|mwh\b|gwh\b|%|percent\b|per\s?cent\b)";

/// Only the percentage spellings of [`UNIT`].
const PERCENT: &str = r"(?P<unit>%|percent\b|per\s?cent\b)";

/// One row of the rule table. `pattern` is a template over `{anchor}`,
/// `{window}`, `{number}`, `{unit}` and `{percent}`.
struct RuleTemplate {
    name: &'static str,
    pattern: &'static str,
    metrics: &'static [Metric],
}

const SCOPES_AND_RENEWABLE: &[Metric] = &Metric::ALL;
const RENEWABLE_ONLY: &[Metric] = &[Metric::RenewableEnergy];

/// The default rule table, in priority order.
const RULE_TABLE: &[RuleTemplate] = &[
    // "Scope 1 emissions: 12,345.6 tCO2e", "Renewable energy share 45%"
    RuleTemplate {
        name: "unit_suffixed",
        pattern: r"{anchor}{window}{number}\s*{unit}",
        metrics: SCOPES_AND_RENEWABLE,
    },
    // "Scope 2 (tCO2e): 987", the usual BRSR table header shape
    RuleTemplate {
        name: "parenthesized_unit",
        pattern: r"{anchor}\s*\(\s*{unit}\s*\){window}{number}",
        metrics: SCOPES_AND_RENEWABLE,
    },
    // "45% renewable energy"
    RuleTemplate {
        name: "percent_prefix",
        pattern: r"{number}\s*{percent}{window}{anchor}",
        metrics: RENEWABLE_ONLY,
    },
    // Anchor, window, number, maybe a unit. The last resort.
    RuleTemplate {
        name: "bare",
        pattern: r"{anchor}{window}{number}(?:\s*{unit})?",
        metrics: SCOPES_AND_RENEWABLE,
    },
];

/// The anchor phrase for a metric. Scope labels accept arabic and roman
/// numerals; `\b` keeps "Scope I" from matching inside "Scope II".
fn anchor(metric: Metric) -> &'static str {
    match metric {
        Metric::Scope1 => r"scope[\s\-–]*(?:1|i)\b(?:\s+(?:ghg\s+)?emissions?)?",
        Metric::Scope2 => r"scope[\s\-–]*(?:2|ii)\b(?:\s+(?:ghg\s+)?emissions?)?",
        Metric::Scope3 => r"scope[\s\-–]*(?:3|iii)\b(?:\s+(?:ghg\s+)?emissions?)?",
        Metric::RenewableEnergy => {
            r"(?:renewable\s+(?:energy|electricity|power)|renewables|green\s+power)"
        }
    }
}

/// Literals every anchor for the metric contains, for the cheap pre-check.
fn prefilter_terms(metric: Metric) -> &'static [&'static str] {
    match metric {
        Metric::Scope1 | Metric::Scope2 | Metric::Scope3 => &["scope"],
        Metric::RenewableEnergy => &["renewable", "green"],
    }
}

/// A compiled rule: one regex, one metric, one id, and optionally the
/// literals its anchor always contains.
#[derive(Debug, Clone)]
pub struct PatternRule {
    pub id: String,
    pub metric: Metric,
    regex: Regex,
    prefilter: Option<AhoCorasick>,
}

impl PatternRule {
    /// Compile a rule from a finished pattern. Matching is always
    /// case-insensitive. The pattern must define a `value` group and may
    /// define a `unit` group.
    pub fn new(id: impl Into<String>, metric: Metric, pattern: &str) -> Result<Self, ConfigError> {
        let id = id.into();
        let regex = Regex::new(&format!("(?i){pattern}")).map_err(|source| ConfigError::Rule {
            rule_id: id.clone(),
            source,
        })?;
        Ok(Self {
            id,
            metric,
            regex,
            prefilter: None,
        })
    }

    /// Skip the regex on text that contains none of `terms` (ASCII
    /// case-insensitive). Every match of the rule must contain one of them.
    pub fn with_prefilter(mut self, terms: &[&str]) -> Result<Self, ConfigError> {
        let automaton = AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(terms)?;
        self.prefilter = Some(automaton);
        Ok(self)
    }

    fn worth_scanning(&self, text: &str) -> bool {
        self.prefilter.as_ref().map_or(true, |ac| ac.is_match(text))
    }

    /// Apply the rule to `text`; the leftmost match wins.
    pub fn apply(&self, text: &str) -> Option<MetricMatch> {
        if !self.worth_scanning(text) {
            return None;
        }
        let caps = self.regex.captures(text)?;
        let raw_value = caps.name("value")?.as_str().to_string();
        let unit = caps
            .name("unit")
            .and_then(|u| canonical_unit(u.as_str()))
            .map(str::to_string);

        let numeric_value = match parse_numeric(&raw_value) {
            Ok(v) => Some(v),
            Err(kind) => {
                debug!(
                    rule = %self.id,
                    raw = %raw_value,
                    kind = %kind,
                    "matched a number we could not parse"
                );
                None
            }
        };

        Some(MetricMatch {
            metric: self.metric,
            raw_value,
            numeric_value,
            unit,
            rule_id: self.id.clone(),
        })
    }
}

/// Runs the ordered rule list for each metric.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    rules: Vec<PatternRule>,
}

impl MetricExtractor {
    /// Build the default rule table with the given lookahead window.
    pub fn new(lookahead_window: usize) -> Result<Self, ConfigError> {
        let window = format!("[^0-9]{{0,{lookahead_window}}}");
        let mut rules = Vec::new();

        for metric in Metric::ALL {
            for template in RULE_TABLE.iter().filter(|t| t.metrics.contains(&metric)) {
                let pattern = template
                    .pattern
                    .replace("{anchor}", anchor(metric))
                    .replace("{window}", &window)
                    .replace("{number}", NUMBER)
                    .replace("{unit}", UNIT)
                    .replace("{percent}", PERCENT);
                let id = format!("{}.{}", metric.key(), template.name);
                let rule = PatternRule::new(id, metric, &pattern)?
                    .with_prefilter(prefilter_terms(metric))?;
                rules.push(rule);
            }
        }

        Ok(Self::with_rules(rules))
    }

    /// Use an explicit rule list. Order within a metric is priority order.
    pub fn with_rules(rules: Vec<PatternRule>) -> Self {
        Self { rules }
    }

    pub fn rules_for(&self, metric: Metric) -> impl Iterator<Item = &PatternRule> + '_ {
        self.rules.iter().filter(move |r| r.metric == metric)
    }

    /// First matching rule for `metric`, or `None`.
    pub fn extract_metric(&self, metric: Metric, text: &str) -> Option<MetricMatch> {
        self.rules_for(metric).find_map(|rule| rule.apply(text))
    }

    /// Extract every tracked metric from `text`. A pure function of the
    /// text: the same input always yields the same set.
    pub fn extract_metrics(&self, text: &str) -> MetricSet {
        let mut set = MetricSet::empty();
        for metric in Metric::ALL {
            set.set(metric, self.extract_metric(metric, text));
        }

        debug!(
            found = set.found_count(),
            scope1 = set.get(Metric::Scope1).map(|m| m.rule_id.as_str()).unwrap_or("-"),
            scope2 = set.get(Metric::Scope2).map(|m| m.rule_id.as_str()).unwrap_or("-"),
            scope3 = set.get(Metric::Scope3).map(|m| m.rule_id.as_str()).unwrap_or("-"),
            renewable = set
                .get(Metric::RenewableEnergy)
                .map(|m| m.rule_id.as_str())
                .unwrap_or("-"),
            "metric scan complete"
        );
        set
    }
}

/// Map a matched unit spelling to its canonical form.
fn canonical_unit(raw: &str) -> Option<&'static str> {
    let key: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '₂' { '2' } else { c })
        .collect::<String>()
        .to_lowercase();
    let unit = match key.as_str() {
        "mtco2e" => "MtCO2e",
        "ktco2e" => "ktCO2e",
        "tco2e" | "tco2eq" => "tCO2e",
        "tco2" => "tCO2",
        "tonnes" => "tonnes",
        "tons" => "tons",
        "mwh" => "MWh",
        "gwh" => "GWh",
        "%" | "percent" => "%",
        _ => return None,
    };
    Some(unit)
}

/// Parse a numeric token with `,` as the thousands separator and `.` as the
/// decimal point. Indian lakh grouping ("12,34,567") is accepted. Anything
/// that could be read two ways is `PARSE_AMBIGUOUS`.
pub fn parse_numeric(raw: &str) -> Result<f64, FailureKind> {
    let ambiguous = Err(FailureKind::ParseAmbiguous);

    if raw.matches('.').count() > 1 {
        return ambiguous;
    }
    if let (Some(comma), Some(dot)) = (raw.rfind(','), raw.rfind('.')) {
        if comma > dot {
            return ambiguous;
        }
    }

    let integer_part = raw.split('.').next().unwrap_or_default();
    let groups: Vec<&str> = integer_part.split(',').collect();
    if groups.len() > 1 {
        let first = groups[0].len();
        let last = groups[groups.len() - 1].len();
        let middle_ok = groups[1..groups.len() - 1]
            .iter()
            .all(|g| g.len() == 2 || g.len() == 3);
        if first == 0 || first > 3 || last != 3 || !middle_ok {
            return ambiguous;
        }
    }

    raw.replace(',', "")
        .parse::<f64>()
        .map_err(|_| FailureKind::ParseAmbiguous)
}
