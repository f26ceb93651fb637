use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::{CoreError, Result};

/// Reserved condition key compared against the caller's mode string
/// instead of the metrics vector.
pub const MODE_KEY: &str = "mode";

/// Comparison operators, parsed once at rule-set load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl CmpOp {
    fn holds(self, lhs: f64, rhs: f64) -> bool {
        match self {
            Self::Ge => lhs >= rhs,
            Self::Le => lhs <= rhs,
            Self::Gt => lhs > rhs,
            Self::Lt => lhs < rhs,
            Self::Eq => lhs == rhs,
        }
    }
}

/// One parsed condition: a numeric comparison against a metric, or an
/// exact match on the reserved mode key.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Cmp { op: CmpOp, value: f64 },
    ModeIs(String),
}

/// A parsed rule: every condition must hold (logical AND) for the rule to
/// decide. An empty condition list matches unconditionally.
#[derive(Debug, Clone)]
pub struct Rule {
    pub when: Vec<(String, Condition)>,
    pub choose_label: String,
    pub description: String,
}

impl Rule {
    pub fn is_default(&self) -> bool {
        self.when.is_empty()
    }

    fn matches(&self, metrics: &HashMap<String, f64>, mode: &str) -> bool {
        self.when.iter().all(|(key, cond)| match cond {
            Condition::ModeIs(expected) => mode == expected,
            // A missing metric makes the condition false, never an error
            Condition::Cmp { op, value } => metrics
                .get(key)
                .map(|&actual| op.holds(actual, *value))
                .unwrap_or(false),
        })
    }
}

/// An ordered, validated rule set with its closed label vocabulary.
#[derive(Debug, Clone)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub valid_labels: Vec<String>,
}

/// Raw rule-file document shape, as authored.
#[derive(Debug, Deserialize)]
struct RawRuleSet {
    rules: Vec<RawRule>,
    valid_labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(default)]
    when: BTreeMap<String, String>,
    choose_label: String,
    #[serde(default)]
    description: String,
}

static CONDITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(>=|<=|==|=|>|<)\s*(-?\d+(?:\.\d+)?)\s*$").unwrap());

impl RuleSet {
    /// Load and validate a rule file. Callers reload per decision unless
    /// they explicitly cache the parsed set.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_yaml(&contents)
    }

    pub fn parse_yaml(text: &str) -> Result<Self> {
        let raw: RawRuleSet = serde_yaml::from_str(text)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawRuleSet) -> Result<Self> {
        let mut rules = Vec::with_capacity(raw.rules.len());
        for rule in raw.rules {
            if !raw.valid_labels.iter().any(|l| l == &rule.choose_label) {
                return Err(CoreError::UnknownLabel {
                    label: rule.choose_label,
                });
            }
            let mut when = Vec::with_capacity(rule.when.len());
            for (key, value) in rule.when {
                let condition = parse_condition(&key, &value)?;
                when.push((key, condition));
            }
            rules.push(Rule {
                when,
                choose_label: rule.choose_label,
                description: rule.description,
            });
        }

        // Exactly one unconditional rule, and it must come last — a rule
        // set that cannot resolve every input is a configuration defect.
        let default_count = rules.iter().filter(|r| r.is_default()).count();
        let last_is_default = rules.last().map(|r| r.is_default()).unwrap_or(false);
        if default_count != 1 || !last_is_default {
            return Err(CoreError::MissingDefaultRule);
        }

        Ok(Self {
            rules,
            valid_labels: raw.valid_labels,
        })
    }
}

fn parse_condition(key: &str, raw: &str) -> Result<Condition> {
    if key == MODE_KEY {
        let expected = raw.strip_prefix("==").unwrap_or(raw).trim();
        return Ok(Condition::ModeIs(expected.to_string()));
    }

    let caps = CONDITION_RE
        .captures(raw)
        .ok_or_else(|| CoreError::BadCondition {
            key: key.to_string(),
            raw: raw.to_string(),
        })?;
    let op = match &caps[1] {
        ">=" => CmpOp::Ge,
        "<=" => CmpOp::Le,
        ">" => CmpOp::Gt,
        "<" => CmpOp::Lt,
        "==" | "=" => CmpOp::Eq,
        _ => unreachable!(),
    };
    let value: f64 = caps[2].parse().map_err(|_| CoreError::BadCondition {
        key: key.to_string(),
        raw: raw.to_string(),
    })?;
    Ok(Condition::Cmp { op, value })
}

/// Evaluate rules strictly in order against the metrics vector and mode;
/// the first rule whose conditions all hold decides the label.
///
/// A validated rule set always resolves because the trailing default
/// matches everything. Falling off the end of a hand-built set without a
/// default is reported as the configuration defect it is.
pub fn decide_label_from_metrics(
    metrics: &HashMap<String, f64>,
    mode: &str,
    rules: &RuleSet,
) -> Result<String> {
    for rule in &rules.rules {
        if rule.matches(metrics, mode) {
            log::debug!(
                "rule {:?} decided {} for mode {mode:?}",
                rule.description,
                rule.choose_label
            );
            return Ok(rule.choose_label.clone());
        }
    }
    Err(CoreError::MissingDefaultRule)
}
