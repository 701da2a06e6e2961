//! Append-only budget version chain.
//!
//! Versions are never rewritten. A chain is an arena of snapshots keyed
//! by version number with a pointer to the current one; committing a
//! version moves the pointer and freezes the version it leaves.

use chrono::{DateTime, Utc};
use fundctl_shared::types::{BudgetLineItemId, UserId};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

use super::error::VersionError;
use super::types::{BudgetChanges, BudgetLineItem, BudgetVersion, VersionSource, VersionState};
use crate::fiscal::fits_money_scale;

/// All versions of one budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChain {
    versions: BTreeMap<u32, BudgetVersion>,
    current: u32,
}

impl VersionChain {
    /// Starts a chain from a budget's first version, which becomes current.
    #[must_use]
    pub fn new(mut first: BudgetVersion) -> Self {
        first.state = VersionState::Current;
        let current = first.number;
        Self {
            versions: BTreeMap::from([(current, first)]),
            current,
        }
    }

    /// Rebuilds a chain from stored versions. Returns `None` unless
    /// exactly one version is current.
    #[must_use]
    pub fn from_versions(versions: impl IntoIterator<Item = BudgetVersion>) -> Option<Self> {
        let versions: BTreeMap<u32, BudgetVersion> =
            versions.into_iter().map(|v| (v.number, v)).collect();
        let mut current = versions
            .values()
            .filter(|v| v.state == VersionState::Current)
            .map(|v| v.number);
        let first = current.next()?;
        if current.next().is_some() {
            return None;
        }
        Some(Self {
            versions,
            current: first,
        })
    }

    /// Looks up a version.
    #[must_use]
    pub fn get(&self, number: u32) -> Option<&BudgetVersion> {
        self.versions.get(&number)
    }

    /// The current version.
    #[must_use]
    pub fn current(&self) -> &BudgetVersion {
        &self.versions[&self.current]
    }

    /// The open pending version, if any.
    #[must_use]
    pub fn pending(&self) -> Option<&BudgetVersion> {
        self.versions
            .values()
            .rev()
            .find(|v| v.state == VersionState::Pending)
    }

    /// Number the next version will get.
    #[must_use]
    pub fn next_number(&self) -> u32 {
        self.versions.keys().next_back().map_or(1, |n| n + 1)
    }

    /// Every version, ordered by number.
    pub fn versions(&self) -> impl Iterator<Item = &BudgetVersion> {
        self.versions.values()
    }

    /// Committed versions (current and frozen), ordered by number.
    pub fn history(&self) -> impl Iterator<Item = &BudgetVersion> {
        self.versions.values().filter(|v| v.state.is_committed())
    }

    /// Replaces the content of the current version.
    pub fn replace_current(&mut self, version: BudgetVersion) {
        let mut version = version;
        version.number = self.current;
        version.state = VersionState::Current;
        self.versions.insert(self.current, version);
    }

    /// Adds a pending version, discarding any other pending one.
    ///
    /// Returns the number of the discarded version.
    pub fn push_pending(&mut self, mut version: BudgetVersion) -> Option<u32> {
        let discarded = self.pending().map(|v| v.number);
        if let Some(number) = discarded {
            self.discard(number);
        }
        version.state = VersionState::Pending;
        self.versions.insert(version.number, version);
        discarded
    }

    /// Makes a pending version current and freezes the old current one.
    ///
    /// Returns false if `number` is not pending.
    pub fn commit(&mut self, number: u32, at: DateTime<Utc>) -> bool {
        match self.versions.get_mut(&number) {
            Some(version) if version.state == VersionState::Pending => {
                version.state = VersionState::Current;
                version.committed_at = Some(at);
            }
            _ => return false,
        }
        if let Some(previous) = self.versions.get_mut(&self.current) {
            previous.state = VersionState::Frozen;
        }
        self.current = number;
        true
    }

    /// Appends a version and commits it in one step.
    pub fn push_committed(&mut self, mut version: BudgetVersion, at: DateTime<Utc>) {
        let number = version.number;
        version.state = VersionState::Pending;
        self.versions.insert(number, version);
        self.commit(number, at);
    }

    /// Marks a pending version discarded. Returns false if it is not pending.
    pub fn discard(&mut self, number: u32) -> bool {
        match self.versions.get_mut(&number) {
            Some(version) if version.state == VersionState::Pending => {
                version.state = VersionState::Discarded;
                true
            }
            _ => false,
        }
    }
}

/// Rejects negative amounts and amounts finer than storage keeps.
pub(crate) fn check_amount(amount: Decimal) -> Result<(), VersionError> {
    if amount < Decimal::ZERO {
        return Err(VersionError::InvalidAmount(amount));
    }
    if !fits_money_scale(amount) {
        return Err(VersionError::InvalidPrecision(amount));
    }
    Ok(())
}

/// Applies `changes` to the content of `base`.
///
/// # Errors
///
/// Returns `InvalidAmount` for negative amounts, `InvalidPrecision` for
/// amounts with more than four decimal places and `LineItemNotFound`
/// when an update or removal names a line the base does not carry.
pub fn apply_changes(
    base: &BudgetVersion,
    changes: &BudgetChanges,
) -> Result<(Decimal, Vec<BudgetLineItem>), VersionError> {
    let total = changes.total_amount.unwrap_or(base.total_amount);
    check_amount(total)?;

    let mut line_items = base.line_items.clone();

    for id in &changes.remove_line_items {
        let position = line_items
            .iter()
            .position(|item| item.id == *id)
            .ok_or(VersionError::LineItemNotFound(*id))?;
        line_items.remove(position);
    }

    for (id, amount) in &changes.update_line_items {
        check_amount(*amount)?;
        let item = line_items
            .iter_mut()
            .find(|item| item.id == *id)
            .ok_or(VersionError::LineItemNotFound(*id))?;
        item.amount = *amount;
    }

    for new_item in &changes.add_line_items {
        check_amount(new_item.amount)?;
        line_items.push(BudgetLineItem {
            id: BudgetLineItemId::new(),
            category: new_item.category.clone(),
            amount: new_item.amount,
        });
    }

    Ok((total, line_items))
}

/// Builds a pending version numbered `number` on top of `base`.
///
/// # Errors
///
/// Returns the `apply_changes` errors.
pub fn derive_version(
    base: &BudgetVersion,
    number: u32,
    changes: &BudgetChanges,
    source: VersionSource,
    created_by: UserId,
) -> Result<BudgetVersion, VersionError> {
    let (total_amount, line_items) = apply_changes(base, changes)?;
    Ok(BudgetVersion {
        budget_id: base.budget_id,
        number,
        state: VersionState::Pending,
        total_amount,
        line_items,
        previous: Some(base.number),
        source,
        created_by,
        created_at: Utc::now(),
        committed_at: None,
    })
}
