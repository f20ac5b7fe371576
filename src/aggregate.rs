//! Channel aggregation: group candidates by identity, deduplicating on
//! `(identity, url)`.
//!
//! The same URL under two identities is kept twice; cross-identity merging
//! would need name normalization policy, which lives outside the engine.
//! Channel order is first appearance; candidate order inside a channel is
//! first appearance too (ranking reorders later).

use std::collections::{HashMap, HashSet};

use crate::model::{Candidate, ChannelIdentity};

/// Name-based admission check applied at the aggregation boundary.
pub trait NameFilter {
    fn allows(&self, identity: &ChannelIdentity) -> bool;
}

/// Admits everything.
pub struct AllowAll;

impl NameFilter for AllowAll {
    fn allows(&self, _identity: &ChannelIdentity) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct ChannelGroup {
    pub identity: ChannelIdentity,
    pub candidates: Vec<Candidate>,
    urls: HashSet<String>,
}

impl ChannelGroup {
    fn new(identity: ChannelIdentity) -> Self {
        Self {
            identity,
            candidates: Vec::new(),
            urls: HashSet::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChannelPool {
    groups: Vec<ChannelGroup>,
    index: HashMap<ChannelIdentity, usize>,
    seen: usize,
    duplicates: usize,
    rejected: usize,
}

impl ChannelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one candidate. Returns `false` if it was a duplicate.
    pub fn push(&mut self, candidate: Candidate) -> bool {
        self.seen += 1;
        let idx = match self.index.get(&candidate.identity) {
            Some(&i) => i,
            None => {
                let i = self.groups.len();
                self.index.insert(candidate.identity.clone(), i);
                self.groups.push(ChannelGroup::new(candidate.identity.clone()));
                i
            }
        };
        let group = &mut self.groups[idx];
        if !group.urls.insert(candidate.url.clone()) {
            self.duplicates += 1;
            return false;
        }
        group.candidates.push(candidate);
        true
    }

    pub fn groups(&self) -> &[ChannelGroup] {
        &self.groups
    }

    pub fn get(&self, identity: &ChannelIdentity) -> Option<&ChannelGroup> {
        self.index.get(identity).map(|&i| &self.groups[i])
    }

    pub fn channel_count(&self) -> usize {
        self.groups.len()
    }

    /// Candidates offered, including duplicates and rejected names.
    pub fn seen(&self) -> usize {
        self.seen + self.rejected
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    /// Candidates dropped by the name filter.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn unique_candidates(&self) -> usize {
        self.groups.iter().map(|g| g.candidates.len()).sum()
    }

    /// Every distinct URL across all channels, in first-appearance order.
    pub fn unique_urls(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.groups
            .iter()
            .flat_map(|g| g.candidates.iter())
            .map(|c| c.url.as_str())
            .filter(|u| seen.insert(*u))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

pub fn aggregate<I>(candidates: I) -> ChannelPool
where
    I: IntoIterator<Item = Candidate>,
{
    aggregate_filtered(candidates, &AllowAll)
}

/// Aggregate, skipping candidates whose identity the filter rejects.
pub fn aggregate_filtered<I, F>(candidates: I, filter: &F) -> ChannelPool
where
    I: IntoIterator<Item = Candidate>,
    F: NameFilter + ?Sized,
{
    let mut pool = ChannelPool::new();
    for c in candidates {
        if !filter.allows(&c.identity) {
            pool.rejected += 1;
            continue;
        }
        pool.push(c);
    }
    pool
}
