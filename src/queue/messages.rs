//! Ordered message containers backing a queue.
//!
//! The ordering discipline is a tagged variant chosen by the factory:
//! plain FIFO, a priority structure with optional fair-share credits,
//! or a last-value map keyed by a designated application header.

use crate::message::QueuedMessage;
use std::collections::{BTreeMap, VecDeque};

/// Per-level dequeue credit used when `defaultFairshare` is set without
/// per-level counts.
pub const DEFAULT_FAIRSHARE_CREDIT: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerKind {
    Fifo,
    Priority {
        levels: u8,
        /// Credits aligned with levels, highest level first.
        fairshare: Option<Vec<u32>>,
    },
    Lvq {
        key: String,
    },
}

pub enum MessageContainer {
    Fifo(FifoMessages),
    Priority(PriorityMessages),
    Lvq(LvqMessages),
}

impl MessageContainer {
    pub fn new(kind: &ContainerKind) -> Self {
        match kind {
            ContainerKind::Fifo => Self::Fifo(FifoMessages::default()),
            ContainerKind::Priority { levels, fairshare } => {
                Self::Priority(PriorityMessages::new(*levels, fairshare.clone()))
            }
            ContainerKind::Lvq { key } => Self::Lvq(LvqMessages::new(key.clone())),
        }
    }

    /// Insert a message. For last-value containers the superseded
    /// message with the same key is returned.
    pub fn push(&mut self, entry: QueuedMessage) -> Option<QueuedMessage> {
        match self {
            Self::Fifo(inner) => {
                inner.entries.push_back(entry);
                None
            }
            Self::Priority(inner) => {
                inner.push(entry);
                None
            }
            Self::Lvq(inner) => inner.push(entry),
        }
    }

    /// Remove and return the next message in discipline order.
    pub fn take_next(&mut self) -> Option<QueuedMessage> {
        match self {
            Self::Fifo(inner) => inner.entries.pop_front(),
            Self::Priority(inner) => inner.next(),
            Self::Lvq(inner) => inner.next(),
        }
    }

    /// Remove and return the first message, in discipline order, that
    /// satisfies `pred`. Used by group-aware distribution.
    pub fn take_if(
        &mut self,
        pred: impl Fn(&QueuedMessage) -> bool,
    ) -> Option<QueuedMessage> {
        match self {
            Self::Fifo(inner) => {
                let pos = inner.entries.iter().position(&pred)?;
                inner.entries.remove(pos)
            }
            Self::Priority(inner) => inner.take_if(pred),
            Self::Lvq(inner) => inner.take_if(pred),
        }
    }

    pub fn drain_all(&mut self) -> Vec<QueuedMessage> {
        match self {
            Self::Fifo(inner) => inner.entries.drain(..).collect(),
            Self::Priority(inner) => inner.drain_all(),
            Self::Lvq(inner) => {
                let map = std::mem::take(&mut inner.entries);
                map.into_values().collect()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Fifo(inner) => inner.entries.len(),
            Self::Priority(inner) => inner.levels.iter().map(VecDeque::len).sum(),
            Self::Lvq(inner) => inner.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct FifoMessages {
    entries: VecDeque<QueuedMessage>,
}

pub struct PriorityMessages {
    // Index is the clamped priority, ascending; dequeue scans from the
    // top level down.
    levels: Vec<VecDeque<QueuedMessage>>,
    // Credits aligned with `levels`; empty when fair-share is off.
    limits: Vec<u32>,
    used: Vec<u32>,
}

impl PriorityMessages {
    pub fn new(levels: u8, fairshare: Option<Vec<u32>>) -> Self {
        let levels = levels.max(1) as usize;
        let limits = match fairshare {
            None => Vec::new(),
            Some(mut credits) => {
                // Configured highest level first; stored ascending.
                credits.reverse();
                credits.resize(levels, DEFAULT_FAIRSHARE_CREDIT);
                credits
            }
        };
        Self {
            used: vec![0; if limits.is_empty() { 0 } else { levels }],
            levels: (0..levels).map(|_| VecDeque::new()).collect(),
            limits,
        }
    }

    fn level_for(&self, priority: u8) -> usize {
        (priority as usize).min(self.levels.len() - 1)
    }

    fn push(&mut self, entry: QueuedMessage) {
        let level = self.level_for(entry.message.priority());
        self.levels[level].push_back(entry);
    }

    /// Level the next dequeue should come from, honoring fair-share
    /// credits when configured.
    fn front_level(&mut self) -> Option<usize> {
        if self.limits.is_empty() {
            return (0..self.levels.len())
                .rev()
                .find(|&level| !self.levels[level].is_empty());
        }
        let eligible = (0..self.levels.len())
            .rev()
            .find(|&level| !self.levels[level].is_empty() && self.used[level] < self.limits[level]);
        match eligible {
            Some(level) => Some(level),
            None => {
                // Every non-empty level has used its credits; start a
                // fresh round.
                let front = (0..self.levels.len())
                    .rev()
                    .find(|&level| !self.levels[level].is_empty())?;
                self.used.iter_mut().for_each(|u| *u = 0);
                Some(front)
            }
        }
    }

    fn next(&mut self) -> Option<QueuedMessage> {
        let level = self.front_level()?;
        if !self.limits.is_empty() {
            self.used[level] += 1;
        }
        self.levels[level].pop_front()
    }

    fn take_if(&mut self, pred: impl Fn(&QueuedMessage) -> bool) -> Option<QueuedMessage> {
        for level in (0..self.levels.len()).rev() {
            if let Some(pos) = self.levels[level].iter().position(&pred) {
                if !self.limits.is_empty() {
                    self.used[level] += 1;
                }
                return self.levels[level].remove(pos);
            }
        }
        None
    }

    fn drain_all(&mut self) -> Vec<QueuedMessage> {
        let mut out = Vec::new();
        for level in self.levels.iter_mut().rev() {
            out.extend(level.drain(..));
        }
        self.used.iter_mut().for_each(|u| *u = 0);
        out
    }
}

pub struct LvqMessages {
    key: String,
    // Keyed by the designated header value; a later insertion with the
    // same key supersedes the earlier message.
    entries: BTreeMap<String, QueuedMessage>,
}

impl LvqMessages {
    pub fn new(key: String) -> Self {
        Self {
            key,
            entries: BTreeMap::new(),
        }
    }

    fn push(&mut self, entry: QueuedMessage) -> Option<QueuedMessage> {
        let key = entry.message.header(&self.key).unwrap_or_default();
        self.entries.insert(key, entry)
    }

    fn next(&mut self) -> Option<QueuedMessage> {
        self.entries.pop_first().map(|(_, entry)| entry)
    }

    fn take_if(&mut self, pred: impl Fn(&QueuedMessage) -> bool) -> Option<QueuedMessage> {
        let key = self
            .entries
            .iter()
            .find(|(_, entry)| pred(entry))
            .map(|(key, _)| key.clone())?;
        self.entries.remove(&key)
    }
}
