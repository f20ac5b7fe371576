//! Channel-name rule table.
//!
//! Ordered `{pattern, verdict}` entries compiled to case-insensitive regexes.
//! Every `allow` rule is evaluated before any `block` rule and the first
//! match wins; a name no rule matches is allowed.
//!
//! TOML shape:
//! ```toml
//! [[rules]]
//! pattern = "CCTV"
//! verdict = "allow"
//!
//! [[rules]]
//! pattern = "购物|导购"
//! verdict = "block"
//! ```
//! JSON: `{"rules": [{"pattern": "CCTV", "verdict": "allow"}]}`.

use anyhow::{anyhow, Context, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::aggregate::NameFilter;
use crate::model::ChannelIdentity;

/// Shopping / finance / gambling channels.
pub const DEFAULT_BLOCK_KEYWORDS: [&str; 6] = ["购物", "导购", "理财", "股票", "期货", "博彩"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Allow,
    Block,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuleSpec {
    pub pattern: String,
    pub verdict: Verdict,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleSpec>,
}

#[derive(Debug, Clone)]
struct CompiledRule {
    re: Regex,
    verdict: Verdict,
    label: String,
}

#[derive(Debug, Clone, Default)]
pub struct NameRules {
    allow: Vec<CompiledRule>,
    block: Vec<CompiledRule>,
}

impl NameRules {
    /// Compile specs, keeping file order within each verdict class.
    pub fn compile(specs: &[RuleSpec]) -> Result<Self> {
        let mut rules = Self::default();
        for (i, spec) in specs.iter().enumerate() {
            let pattern = spec.pattern.trim();
            if pattern.is_empty() {
                return Err(anyhow!("rule #{i} has an empty pattern"));
            }
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .with_context(|| format!("compiling rule #{i} pattern `{pattern}`"))?;
            let compiled = CompiledRule {
                re,
                verdict: spec.verdict,
                label: spec.name.clone().unwrap_or_else(|| pattern.to_string()),
            };
            match spec.verdict {
                Verdict::Allow => rules.allow.push(compiled),
                Verdict::Block => rules.block.push(compiled),
            }
        }
        Ok(rules)
    }

    /// Built-in table: block the default keywords, allow everything else.
    pub fn default_table() -> Self {
        let specs: Vec<RuleSpec> = DEFAULT_BLOCK_KEYWORDS
            .iter()
            .map(|k| RuleSpec {
                pattern: regex::escape(k),
                verdict: Verdict::Block,
                name: Some((*k).to_string()),
            })
            .collect();
        Self::compile(&specs).unwrap_or_default()
    }

    /// First matching rule's verdict, allow rules first.
    pub fn verdict(&self, name: &str) -> Verdict {
        match self
            .allow
            .iter()
            .chain(self.block.iter())
            .find(|r| r.re.is_match(name))
        {
            Some(rule) => {
                tracing::trace!(target: "ingest", name, rule = %rule.label, verdict = ?rule.verdict, "name rule matched");
                rule.verdict
            }
            None => Verdict::Allow,
        }
    }

    pub fn len(&self) -> usize {
        self.allow.len() + self.block.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NameFilter for NameRules {
    fn allows(&self, identity: &ChannelIdentity) -> bool {
        self.verdict(&identity.name) == Verdict::Allow
    }
}

/// Load a rule table from TOML or JSON (by extension, TOML by default).
pub fn load_rules_from(path: &Path) -> Result<NameRules> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading name rules from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let file: RuleFile = if ext == "json" {
        serde_json::from_str(&content).context("parsing name rules json")?
    } else {
        toml::from_str(&content).context("parsing name rules toml")?
    };
    NameRules::compile(&file.rules)
}

/// `path` if given, else the built-in table.
pub fn load_rules(path: Option<&Path>) -> Result<NameRules> {
    match path {
        Some(p) => load_rules_from(p),
        None => Ok(NameRules::default_table()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(pattern: &str, verdict: Verdict) -> RuleSpec {
        RuleSpec {
            pattern: pattern.into(),
            verdict,
            name: None,
        }
    }

    #[test]
    fn default_table_blocks_shopping() {
        let rules = NameRules::default_table();
        assert_eq!(rules.len(), DEFAULT_BLOCK_KEYWORDS.len());
        assert_eq!(rules.verdict("家有购物"), Verdict::Block);
        assert_eq!(rules.verdict("CCTV-1"), Verdict::Allow);
    }

    #[test]
    fn allow_beats_block_regardless_of_order() {
        let rules = NameRules::compile(&[
            spec("购物", Verdict::Block),
            spec("^CCTV", Verdict::Allow),
        ])
        .unwrap();
        assert_eq!(rules.verdict("CCTV 购物"), Verdict::Allow);
        assert_eq!(rules.verdict("好易购物"), Verdict::Block);
    }

    #[test]
    fn matching_is_case_insensitive() {
        let rules = NameRules::compile(&[spec("shop", Verdict::Block)]).unwrap();
        assert_eq!(rules.verdict("Home SHOPPING"), Verdict::Block);
    }

    #[test]
    fn bad_pattern_is_an_error() {
        assert!(NameRules::compile(&[spec("(", Verdict::Block)]).is_err());
        assert!(NameRules::compile(&[spec("  ", Verdict::Block)]).is_err());
    }

    #[test]
    fn loads_toml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let p_toml = dir.path().join("rules.toml");
        fs::write(
            &p_toml,
            "[[rules]]\npattern = \"news\"\nverdict = \"allow\"\n\n[[rules]]\npattern = \"bet\"\nverdict = \"block\"\n",
        )
        .unwrap();
        let r = load_rules_from(&p_toml).unwrap();
        assert_eq!(r.len(), 2);
        assert_eq!(r.verdict("Bet News"), Verdict::Allow);

        let p_json = dir.path().join("rules.json");
        fs::write(&p_json, r#"{"rules":[{"pattern":"bet","verdict":"block"}]}"#).unwrap();
        let r = load_rules_from(&p_json).unwrap();
        assert_eq!(r.verdict("Bet TV"), Verdict::Block);
    }
}
