/// Device cgroup emulator
///
/// Folds an ordered rule list into the effective policy a devices cgroup
/// would hold: a default verdict plus per-selector exceptions. Later rules
/// override earlier ones for the same selector.
use super::rule::{DeviceSelector, Permissions, Rule};
use crate::config::types::{Result, RuntimeError};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Emulator {
    default_allow: bool,
    exceptions: BTreeMap<DeviceSelector, Permissions>,
}

impl Emulator {
    /// Default-deny emulator with no exceptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an emulator from line-oriented rule text.
    ///
    /// Empty text is a default-deny emulator. Each line is parsed and applied
    /// in order; the first bad line aborts the parse.
    pub fn from_list(text: &str) -> Result<Self> {
        let mut emulator = Self::new();
        for (index, line) in text.lines().enumerate() {
            let rule: Rule = line.parse().map_err(|e| {
                RuntimeError::Device(format!("line {}: {}", index + 1, e))
            })?;
            emulator.apply(&rule)?;
        }
        Ok(emulator)
    }

    pub fn is_default_allow(&self) -> bool {
        self.default_allow
    }

    pub fn exceptions(&self) -> impl Iterator<Item = (&DeviceSelector, &Permissions)> {
        self.exceptions.iter()
    }

    pub fn apply(&mut self, rule: &Rule) -> Result<()> {
        if rule.allow {
            self.allow(rule)
        } else {
            self.deny(rule)
        }
    }

    fn allow(&mut self, rule: &Rule) -> Result<()> {
        if rule.selector.is_wildcard_type() {
            *self = Emulator {
                default_allow: true,
                exceptions: BTreeMap::new(),
            };
            return Ok(());
        }
        if self.default_allow {
            self.remove_exception(rule)
        } else {
            self.add_exception(rule);
            Ok(())
        }
    }

    fn deny(&mut self, rule: &Rule) -> Result<()> {
        if rule.selector.is_wildcard_type() {
            *self = Emulator::default();
            return Ok(());
        }
        if self.default_allow {
            self.add_exception(rule);
            Ok(())
        } else {
            self.remove_exception(rule)
        }
    }

    fn add_exception(&mut self, rule: &Rule) {
        let entry = self
            .exceptions
            .entry(rule.selector)
            .or_insert_with(Permissions::empty);
        *entry = entry.union(rule.permissions);
    }

    /// Subtract the rule's permissions from the exactly matching exception.
    ///
    /// A wildcard exception covering the selector cannot be partially
    /// revoked; the kernel would silently ignore such a request.
    fn remove_exception(&mut self, rule: &Rule) -> Result<()> {
        let selector = rule.selector;
        let covering = [
            DeviceSelector {
                major: None,
                ..selector
            },
            DeviceSelector {
                minor: None,
                ..selector
            },
            DeviceSelector {
                major: None,
                minor: None,
                ..selector
            },
        ];
        for partial in covering {
            if partial == selector {
                continue;
            }
            let partial_perms = self
                .exceptions
                .get(&partial)
                .copied()
                .unwrap_or_default();
            if !partial_perms.intersection(rule.permissions).is_empty() {
                return Err(RuntimeError::Device(format!(
                    "cannot remove [{} {}]: covered by wildcard exception [{} {}]",
                    selector, rule.permissions, partial, partial_perms
                )));
            }
        }

        let remaining = self
            .exceptions
            .get(&selector)
            .copied()
            .unwrap_or_default()
            .difference(rule.permissions);
        if remaining.is_empty() {
            self.exceptions.remove(&selector);
        } else {
            self.exceptions.insert(selector, remaining);
        }
        Ok(())
    }

    /// Rules that move a cgroup holding `self` to `target`'s policy.
    ///
    /// A differing default emits a blanket rule first, which also discards
    /// every existing exception. Then revocations for permissions `target`
    /// lacks, then grants for permissions `self` lacks, each in selector
    /// order so the output is stable.
    ///
    /// Applying the rules to `self` reaches `target`, except when a rule
    /// removes an exact exception that a wildcard exception also covers:
    /// the kernel cannot lift part of a wildcard, so `apply` rejects that
    /// rule with a "covered by wildcard exception" error.
    pub fn transition(&self, target: &Emulator) -> Vec<Rule> {
        let mut rules = Vec::new();
        let empty = BTreeMap::new();
        let mut current = &self.exceptions;

        if self.default_allow != target.default_allow {
            rules.push(Rule::blanket(target.default_allow));
            current = &empty;
        }

        for (selector, old_perms) in current {
            let new_perms = target
                .exceptions
                .get(selector)
                .copied()
                .unwrap_or_default();
            let dropped = old_perms.difference(new_perms);
            if !dropped.is_empty() {
                rules.push(Rule {
                    selector: *selector,
                    permissions: dropped,
                    allow: target.default_allow,
                });
            }
        }

        for (selector, new_perms) in &target.exceptions {
            let old_perms = current.get(selector).copied().unwrap_or_default();
            let gained = new_perms.difference(old_perms);
            if !gained.is_empty() {
                rules.push(Rule {
                    selector: *selector,
                    permissions: gained,
                    allow: !target.default_allow,
                });
            }
        }

        rules
    }
}
