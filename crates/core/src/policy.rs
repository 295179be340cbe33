use crate::domain::symbol;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Data-driven classification tables, loaded from a JSON policy file at
/// startup. Everything the scoring path looks up by symbol or sector lives
/// here so the logic itself carries no ticker knowledge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyTable {
    /// Symbols swept by the background scanner each cycle.
    #[serde(default)]
    pub universe: Vec<String>,

    /// Sector name -> member symbols, used to match catalysts to symbols.
    #[serde(default)]
    pub sectors: BTreeMap<String, Vec<String>>,

    /// Symbol -> related symbols for the peers view of /api/signals.
    #[serde(default)]
    pub peers: BTreeMap<String, Vec<String>>,

    /// Known congressional trading disclosures by symbol.
    #[serde(default)]
    pub disclosures: BTreeMap<String, DisclosureRecord>,

    /// Title-keyword rules that classify legislative items into sectors.
    #[serde(default)]
    pub keyword_rules: Vec<KeywordRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisclosureRecord {
    pub official: String,
    pub action: TradeAction,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeAction {
    Purchase,
    Sale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Uppercase fragments matched against an uppercased item title.
    pub keywords: Vec<String>,
    pub sector: String,
    pub score: i32,
    pub note: String,
}

impl PolicyTable {
    pub fn from_path(path: &str) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read policy file {path}"))?;
        Self::from_json(&text).with_context(|| format!("invalid policy file {path}"))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let table: Self = serde_json::from_str(text).context("policy file is not valid JSON")?;
        table.validate()?;
        Ok(table)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.universe.is_empty(), "policy universe must be non-empty");

        for sym in &self.universe {
            ensure_normalized(sym).with_context(|| format!("universe symbol {sym:?}"))?;
        }
        for (sector, members) in &self.sectors {
            anyhow::ensure!(!sector.trim().is_empty(), "sector name must be non-empty");
            for sym in members {
                ensure_normalized(sym).with_context(|| format!("sector {sector} symbol {sym:?}"))?;
            }
        }
        for (sym, related) in &self.peers {
            ensure_normalized(sym).with_context(|| format!("peers key {sym:?}"))?;
            for peer in related {
                ensure_normalized(peer).with_context(|| format!("peer of {sym}: {peer:?}"))?;
            }
        }
        for sym in self.disclosures.keys() {
            ensure_normalized(sym).with_context(|| format!("disclosure key {sym:?}"))?;
        }
        for rule in &self.keyword_rules {
            anyhow::ensure!(
                !rule.keywords.is_empty(),
                "keyword rule for sector {} has no keywords",
                rule.sector
            );
            anyhow::ensure!(
                (0..=100).contains(&rule.score),
                "keyword rule for sector {} has score {} outside 0..=100",
                rule.sector,
                rule.score
            );
        }

        Ok(())
    }

    pub fn sector_contains(&self, sector: &str, sym: &str) -> bool {
        self.sectors
            .get(sector)
            .is_some_and(|members| members.iter().any(|m| m == sym))
    }

    pub fn peers_of(&self, sym: &str) -> &[String] {
        self.peers.get(sym).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn disclosure(&self, sym: &str) -> Option<&DisclosureRecord> {
        self.disclosures.get(sym)
    }

    /// First rule whose keyword appears in the (uppercased) title wins; rules
    /// are scanned in file order.
    pub fn classify_title(&self, title: &str) -> Option<&KeywordRule> {
        let upper = title.to_uppercase();
        self.keyword_rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| upper.contains(k.as_str())))
    }
}

fn ensure_normalized(sym: &str) -> Result<()> {
    let normalized = symbol::normalize(sym)?;
    anyhow::ensure!(
        normalized == sym,
        "symbol {sym:?} is not normalized (expected {normalized:?})"
    );
    Ok(())
}
