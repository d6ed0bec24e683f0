//! Port Registry
//!
//! Owns the key → port assignments for dashboard instances. Ports are handed
//! out monotonically from the configured base and, once assigned, stay bound
//! to their key for the process lifetime so relaunching a stopped dashboard
//! lands on the same address.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::data::AnalysisType;

/// Identity of one dashboard: the (line, analysis) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct InstanceKey {
    pub line: String,
    pub analysis: AnalysisType,
}

impl InstanceKey {
    pub fn new(line: impl Into<String>, analysis: AnalysisType) -> Self {
        Self { line: line.into(), analysis }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.line, self.analysis)
    }
}

#[derive(Debug)]
pub struct PortRegistry {
    next: u16,
    assigned: HashMap<InstanceKey, u16>,
}

impl PortRegistry {
    pub fn new(base_port: u16) -> Self {
        Self { next: base_port, assigned: HashMap::new() }
    }

    /// Port for `key`, allocating the next free one on first sight.
    pub fn port_for(&mut self, key: &InstanceKey) -> u16 {
        if let Some(&port) = self.assigned.get(key) {
            return port;
        }
        let port = self.next;
        self.next += 1;
        self.assigned.insert(key.clone(), port);
        port
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned.len()
    }

    /// The port the next unseen key would receive.
    pub fn next_port(&self) -> u16 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_allocate_monotonically() {
        let mut registry = PortRegistry::new(8050);
        let a = registry.port_for(&InstanceKey::new("L1", AnalysisType::Cdv));
        let b = registry.port_for(&InstanceKey::new("L1", AnalysisType::Adv));
        let c = registry.port_for(&InstanceKey::new("L2", AnalysisType::Cdv));
        assert_eq!((a, b, c), (8050, 8051, 8052));
    }

    #[test]
    fn a_key_keeps_its_port() {
        let mut registry = PortRegistry::new(8050);
        let key = InstanceKey::new("L5", AnalysisType::Adv);
        let first = registry.port_for(&key);
        registry.port_for(&InstanceKey::new("L1", AnalysisType::Cdv));
        assert_eq!(registry.port_for(&key), first);
        assert_eq!(registry.assigned_count(), 2);
        assert_eq!(registry.next_port(), 8052);
    }
}
