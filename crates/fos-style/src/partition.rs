//! Selector Partitioning
//!
//! Rules are indexed by the rightmost part of each of their selectors, the
//! part that has to match the node itself. The index is a small graph:
//!
//! ```text
//! id partition ──> type slot ──> class slots
//!              └─> class slots
//! type partition ──> class slots      ("*" is a type partition too)
//! ```
//!
//! `match` only narrows the rule list to candidates. Compound selectors
//! still have to be tested against the node's ancestors afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use crate::bitset::StyleClassSet;
use crate::rule::Rule;
use crate::selector::{SimpleSelector, short_type_name};

#[derive(Debug, Clone)]
struct Entry {
    ordinal: usize,
    rule: Arc<Rule>,
}

/// Rules whose selectors require the same set of style-classes
#[derive(Debug, Default)]
struct ClassSlot {
    classes: StyleClassSet,
    rules: Vec<Entry>,
}

/// Rules keyed by one discriminant, with deeper slots for the next
#[derive(Debug, Default)]
struct Partition {
    rules: Vec<Entry>,
    class_slots: Vec<ClassSlot>,
    type_slots: HashMap<String, Partition>,
}

impl Partition {
    fn insert(&mut self, classes: &StyleClassSet, entry: Entry) {
        if classes.is_empty() {
            self.rules.push(entry);
            return;
        }
        match self.class_slots.iter_mut().find(|s| &s.classes == classes) {
            Some(slot) => slot.rules.push(entry),
            None => self.class_slots.push(ClassSlot {
                classes: classes.clone(),
                rules: vec![entry],
            }),
        }
    }

    /// Rules here and in every class slot the node's classes cover
    fn collect(&self, classes: &StyleClassSet, out: &mut Vec<Entry>) {
        out.extend(self.rules.iter().cloned());
        for slot in &self.class_slots {
            if slot.classes.is_subset_of(classes) {
                out.extend(slot.rules.iter().cloned());
            }
        }
    }

    fn len(&self) -> usize {
        self.rules.len()
            + self.class_slots.iter().map(|s| s.rules.len()).sum::<usize>()
            + self.type_slots.values().map(Partition::len).sum::<usize>()
    }
}

/// Index from a node's (id, type, classes) to candidate rules
#[derive(Debug, Default)]
pub struct SelectorPartitioning {
    id_partitions: HashMap<String, Partition>,
    type_partitions: HashMap<String, Partition>,
    next_ordinal: usize,
}

impl SelectorPartitioning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index `rule` under every one of its selectors
    pub fn add_rule(&mut self, rule: &Arc<Rule>) {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        for selector in rule.selectors() {
            self.partition(selector.rightmost(), rule, ordinal);
        }
    }

    /// Index `rule` under one rightmost selector part
    pub fn partition(&mut self, rightmost: &SimpleSelector, rule: &Arc<Rule>, ordinal: usize) {
        let entry = Entry {
            ordinal,
            rule: rule.clone(),
        };
        let classes = rightmost.style_classes();
        let type_name = rightmost.short_type_name();

        match rightmost.id() {
            Some(id) => {
                let partition = self.id_partitions.entry(id.to_string()).or_default();
                if rightmost.is_any_type() {
                    partition.insert(classes, entry);
                } else {
                    partition
                        .type_slots
                        .entry(type_name.to_string())
                        .or_default()
                        .insert(classes, entry);
                }
            }
            None => {
                self.type_partitions
                    .entry(type_name.to_string())
                    .or_default()
                    .insert(classes, entry);
            }
        }
    }

    /// Candidate rules for a node, in insertion order, without duplicates
    pub fn match_rules(
        &self,
        id: Option<&str>,
        type_name: &str,
        classes: &StyleClassSet,
    ) -> Vec<Arc<Rule>> {
        let type_name = short_type_name(type_name);
        let mut found = Vec::new();

        if let Some(partition) = id.and_then(|id| self.id_partitions.get(id)) {
            partition.collect(classes, &mut found);
            if let Some(slot) = partition.type_slots.get(type_name) {
                slot.collect(classes, &mut found);
            }
        }
        if let Some(partition) = self.type_partitions.get(type_name) {
            partition.collect(classes, &mut found);
        }
        if type_name != SimpleSelector::ANY {
            if let Some(partition) = self.type_partitions.get(SimpleSelector::ANY) {
                partition.collect(classes, &mut found);
            }
        }

        found.sort_by_key(|e| e.ordinal);
        found.dedup_by_key(|e| e.ordinal);
        found.into_iter().map(|e| e.rule).collect()
    }

    /// Number of indexed (selector, rule) entries
    pub fn len(&self) -> usize {
        self.id_partitions.values().map(Partition::len).sum::<usize>()
            + self.type_partitions.values().map(Partition::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every partition
    pub fn reset(&mut self) {
        self.id_partitions.clear();
        self.type_partitions.clear();
        self.next_ordinal = 0;
    }
}
