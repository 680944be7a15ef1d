//! Planner
//!
//! Decides which scanned units are still pending.
//!
//! Two gating rules are available:
//!
//! - [`GatingMode::OrderKey`] (default): a unit is pending when its order key
//!   is greater than the id of the last applied record. This trusts that order
//!   keys line up one-to-one with store ids, which only holds while migrations
//!   are applied strictly in order and never deleted out of band.
//! - [`GatingMode::AppliedName`]: a unit is pending when its name has no
//!   record. It survives deleted records and renumbered files, at the cost of
//!   reading the full history on every plan.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

use crate::scanner::MigrationUnit;

/// How pending units are selected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum GatingMode {
    #[default]
    OrderKey,
    AppliedName,
}

/// Ordered list of units selected for one `up` run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlannedMigration {
    units: Vec<MigrationUnit>,
}

impl PlannedMigration {
    pub fn units(&self) -> &[MigrationUnit] {
        &self.units
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name.as_str()).collect()
    }
}

impl IntoIterator for PlannedMigration {
    type Item = MigrationUnit;
    type IntoIter = std::vec::IntoIter<MigrationUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}

/// Keep every unit whose order key exceeds `last_applied_id`, in scan order.
pub fn plan(units: Vec<MigrationUnit>, last_applied_id: i64) -> PlannedMigration {
    PlannedMigration {
        units: units
            .into_iter()
            .filter(|u| i64::from(u.order_key) > last_applied_id)
            .collect(),
    }
}

/// Keep every unit whose name is not in `applied`, in scan order.
pub fn plan_by_name(units: Vec<MigrationUnit>, applied: &HashSet<String>) -> PlannedMigration {
    PlannedMigration {
        units: units
            .into_iter()
            .filter(|u| !applied.contains(&u.name))
            .collect(),
    }
}
