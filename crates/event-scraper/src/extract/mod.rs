//! Body extraction strategies.
//!
//! Every strategy satisfies one contract: look at a [`DocumentTree`] and
//! return a [`CandidateSet`]. Strategies never fail; a strategy that finds
//! nothing returns an empty set. [`StrategyChain`] runs them in order and
//! skips any strategy whose fields are all already filled.

pub mod heuristic;
pub mod page_meta;
pub mod structured;

use std::collections::BTreeMap;

use crate::document::DocumentTree;
use crate::policy::{DescriptionStrategyKind, ExtractionPolicy};
use crate::types::{CandidateField, FieldName};

/// A pluggable body extractor.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs and pipeline traces.
    fn name(&self) -> &'static str;
    /// Fields this strategy can populate.
    fn provides(&self) -> &'static [FieldName];
    fn extract(&self, tree: &DocumentTree) -> CandidateSet;
}

/// At most one candidate per field. A structured candidate replaces a
/// heuristic one; never the other way round.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateSet {
    fields: BTreeMap<FieldName, CandidateField>,
}

impl CandidateSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a candidate. Blank values are dropped so that "not found"
    /// stays distinguishable from "found". Returns whether the set changed.
    pub fn insert(&mut self, candidate: CandidateField) -> bool {
        if candidate.value.trim().is_empty() {
            return false;
        }
        match self.fields.get(&candidate.field) {
            Some(existing) if existing.confidence >= candidate.confidence => false,
            _ => {
                self.fields.insert(candidate.field, candidate);
                true
            }
        }
    }

    /// Fold another set into this one under the same precedence rule.
    pub fn merge(&mut self, other: CandidateSet) {
        for candidate in other.fields.into_values() {
            self.insert(candidate);
        }
    }

    pub fn get(&self, field: FieldName) -> Option<&CandidateField> {
        self.fields.get(&field)
    }

    pub fn value(&self, field: FieldName) -> Option<&str> {
        self.fields.get(&field).map(|c| c.value.as_str())
    }

    pub fn contains(&self, field: FieldName) -> bool {
        self.fields.contains_key(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateField> {
        self.fields.values()
    }
}

/// Ordered list of strategies.
pub struct StrategyChain {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

/// What a chain run produced, plus which strategies contributed.
#[derive(Debug, Clone, Default)]
pub struct ChainOutcome {
    pub candidates: CandidateSet,
    /// `(strategy name, number of candidates it contributed)` for every
    /// strategy that ran.
    pub ran: Vec<(&'static str, usize)>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// The standard chain: embedded data first, then the date marker scan,
    /// then the description sub-strategies in the policy's order.
    pub fn from_policy(policy: &ExtractionPolicy) -> Self {
        let mut strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(structured::EmbeddedDataStrategy::new(policy.structured.clone())),
            Box::new(heuristic::DateMarkerStrategy::new(
                policy.heuristic.date_markers.clone(),
            )),
        ];
        for kind in &policy.heuristic.description_strategies {
            match kind {
                DescriptionStrategyKind::MarkerBounded => strategies.push(Box::new(
                    heuristic::MarkerBoundedStrategy::from_policy(&policy.heuristic),
                )),
                DescriptionStrategyKind::KeywordBlocks => strategies.push(Box::new(
                    heuristic::KeywordBlockStrategy::from_policy(&policy.heuristic),
                )),
            }
        }
        Self::new(strategies)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Run the chain against one document.
    pub fn run(&self, tree: &DocumentTree) -> ChainOutcome {
        let mut outcome = ChainOutcome::default();
        for strategy in &self.strategies {
            let needed = strategy
                .provides()
                .iter()
                .any(|f| !outcome.candidates.contains(*f));
            if !needed {
                tracing::debug!("strategy {} skipped: fields already filled", strategy.name());
                continue;
            }
            let found = strategy.extract(tree);
            tracing::debug!("strategy {} produced {} candidate(s)", strategy.name(), found.len());
            outcome.ran.push((strategy.name(), found.len()));
            outcome.candidates.merge(found);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Confidence;

    struct Fixed {
        name: &'static str,
        provides: &'static [FieldName],
        out: Vec<CandidateField>,
    }

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }
        fn provides(&self) -> &'static [FieldName] {
            self.provides
        }
        fn extract(&self, _tree: &DocumentTree) -> CandidateSet {
            let mut set = CandidateSet::new();
            for c in &self.out {
                set.insert(c.clone());
            }
            set
        }
    }

    #[test]
    fn test_structured_beats_heuristic_in_either_order() {
        let mut set = CandidateSet::new();
        set.insert(CandidateField::heuristic(FieldName::EventDate, "Doors 23:30"));
        set.insert(CandidateField::structured(FieldName::EventDate, "2024-07-01"));
        assert_eq!(set.value(FieldName::EventDate), Some("2024-07-01"));

        let mut set = CandidateSet::new();
        set.insert(CandidateField::structured(FieldName::EventDate, "2024-07-01"));
        assert!(!set.insert(CandidateField::heuristic(FieldName::EventDate, "Doors 23:30")));
        assert_eq!(set.value(FieldName::EventDate), Some("2024-07-01"));
        assert_eq!(
            set.get(FieldName::EventDate).map(|c| c.confidence),
            Some(Confidence::Structured)
        );
    }

    #[test]
    fn test_first_candidate_wins_at_equal_confidence() {
        let mut set = CandidateSet::new();
        set.insert(CandidateField::heuristic(FieldName::Description, "first"));
        set.insert(CandidateField::heuristic(FieldName::Description, "second"));
        assert_eq!(set.value(FieldName::Description), Some("first"));
    }

    #[test]
    fn test_blank_values_are_ignored() {
        let mut set = CandidateSet::new();
        assert!(!set.insert(CandidateField::heuristic(FieldName::Description, "  \n ")));
        assert!(set.is_empty());
    }

    #[test]
    fn test_chain_skips_strategies_with_nothing_left_to_fill() {
        let chain = StrategyChain::new(vec![
            Box::new(Fixed {
                name: "first",
                provides: &[FieldName::EventDate, FieldName::Description],
                out: vec![CandidateField::structured(FieldName::Description, "from blob")],
            }),
            Box::new(Fixed {
                name: "desc-only",
                provides: &[FieldName::Description],
                out: vec![CandidateField::heuristic(FieldName::Description, "ignored")],
            }),
            Box::new(Fixed {
                name: "date-only",
                provides: &[FieldName::EventDate],
                out: vec![CandidateField::heuristic(FieldName::EventDate, "23:30")],
            }),
        ]);
        let tree = DocumentTree::parse("<title>x</title>");
        let outcome = chain.run(&tree);
        assert_eq!(outcome.candidates.value(FieldName::Description), Some("from blob"));
        assert_eq!(outcome.candidates.value(FieldName::EventDate), Some("23:30"));
        let ran: Vec<&str> = outcome.ran.iter().map(|(n, _)| *n).collect();
        assert_eq!(ran, vec!["first", "date-only"]);
    }

    #[test]
    fn test_chain_from_policy_order() {
        let policy = ExtractionPolicy::embedded().unwrap();
        let chain = StrategyChain::from_policy(&policy);
        assert_eq!(
            chain.names(),
            vec!["embedded_data", "date_marker", "marker_bounded", "keyword_blocks"]
        );
    }
}
