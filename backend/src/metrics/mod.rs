//! Derived views over the transformed ledger tables.
//!
//! Every function here is a pure reduction: group rows by a key column, sum
//! a numeric column, optionally join against the member roster.
//!
//! ```text
//! Monthly Collection ─┬─ by MonthName ─▶ operational_cash_flow
//!                     ├─ by MemberID ──▶ commitment_fee_analysis ─┐
//!                     ├─ by MemberID ──▶ total_contribution_analysis ─┤ ⋈ Members
//!                     └─ by MonthName ─┐                          │
//! Admin Costs ─────── by MonthName ────┴▶ admin_fee_analysis      │
//! Disbursement ──┬─── by MonthName ──▶ disbursement_analysis      │
//!                └─── by MemberID ───▶ disbursement_by_member ····┘ (name lookup)
//! ```
//!
//! Month-keyed views come back in calendar order, member-keyed views in
//! lexicographic MemberID order (`M10` sorts before `M2`). Numeric columns
//! must already hold numbers (see [`crate::transform::convert_to_float`]);
//! text cells are a [`SchemaError::NotNumeric`], never a silent zero.

use std::collections::{HashMap, HashSet};

use crate::error::{DataError, SchemaError};
use crate::models::columns::{
    ADMIN_FEE_PAID, AMOUNT_CONTRIBUTED, AMOUNT_DISBURSED, AMOUNT_SPENT, COMMITMENT_FEE_PAID,
    MEMBER_ID, MONTH_NAME, NAME,
};
use crate::models::{
    month_order, AdminFeeMonth, BeneficiaryAmount, CashFlowMonth, DisbursementMonth,
    JoinIntegrityWarning, JoinPolicy, MemberAmount, MemberView, SpotlightMetrics, SummaryMetrics,
};
use crate::table::{Cell, Table};

/// View names used in warnings and errors.
pub const COMMITMENT_FEE_VIEW: &str = "commitment_fee_analysis";
pub const TOTAL_CONTRIBUTION_VIEW: &str = "total_contribution_analysis";

// =============================================================================
// Month-keyed views
// =============================================================================

/// MonthName → sum(AmountContributed).
pub fn operational_cash_flow(collections: &Table) -> Result<Vec<CashFlowMonth>, DataError> {
    let groups = group_sum(collections, MONTH_NAME, column_value(collections, AMOUNT_CONTRIBUTED)?)?;
    Ok(by_calendar(groups)
        .into_iter()
        .map(|g| CashFlowMonth {
            month_name: g.key,
            amount_contributed: g.total,
        })
        .collect())
}

/// MonthName → sum(AmountDisbursed).
pub fn disbursement_analysis(disbursements: &Table) -> Result<Vec<DisbursementMonth>, DataError> {
    let groups = group_sum(disbursements, MONTH_NAME, column_value(disbursements, AMOUNT_DISBURSED)?)?;
    Ok(by_calendar(groups)
        .into_iter()
        .map(|g| DisbursementMonth {
            month_name: g.key,
            amount_disbursed: g.total,
        })
        .collect())
}

/// Admin fee collected (from collections) vs spent (from admin costs) per
/// month, outer-joined on MonthName with the missing side counted as zero.
pub fn admin_fee_analysis(
    collections: &Table,
    admin_costs: &Table,
) -> Result<Vec<AdminFeeMonth>, DataError> {
    let collected = group_sum(collections, MONTH_NAME, column_value(collections, ADMIN_FEE_PAID)?)?;
    let spent = group_sum(admin_costs, MONTH_NAME, column_value(admin_costs, AMOUNT_SPENT)?)?;

    let mut months: Vec<AdminFeeMonth> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for g in collected {
        index.insert(g.key.clone(), months.len());
        months.push(AdminFeeMonth {
            month_name: g.key,
            admin_fee_paid: g.total,
            amount_spent: 0.0,
            net_admin_fee: 0.0,
        });
    }
    for g in spent {
        match index.get(&g.key) {
            Some(&i) => months[i].amount_spent = g.total,
            None => {
                index.insert(g.key.clone(), months.len());
                months.push(AdminFeeMonth {
                    month_name: g.key,
                    admin_fee_paid: 0.0,
                    amount_spent: g.total,
                    net_admin_fee: 0.0,
                });
            }
        }
    }

    for m in &mut months {
        m.net_admin_fee = m.admin_fee_paid - m.amount_spent;
    }
    months.sort_by_key(|m| calendar_rank(&m.month_name));
    Ok(months)
}

// =============================================================================
// Member-keyed views
// =============================================================================

/// MemberID → sum(CommitmentFeePaid), inner-joined with the roster.
pub fn commitment_fee_analysis(
    collections: &Table,
    members: &Table,
    policy: JoinPolicy,
) -> Result<MemberView, DataError> {
    let groups = group_sum(collections, MEMBER_ID, column_value(collections, COMMITMENT_FEE_PAID)?)?;
    join_roster(COMMITMENT_FEE_VIEW, groups, members, policy)
}

/// MemberID → sum(AmountContributed + CommitmentFeePaid), computed per row
/// before grouping, inner-joined with the roster.
pub fn total_contribution_analysis(
    collections: &Table,
    members: &Table,
    policy: JoinPolicy,
) -> Result<MemberView, DataError> {
    let contributed = column_value(collections, AMOUNT_CONTRIBUTED)?;
    let fee = column_value(collections, COMMITMENT_FEE_PAID)?;
    let groups = group_sum(collections, MEMBER_ID, |row, cells| {
        Ok(contributed(row, cells)? + fee(row, cells)?)
    })?;
    join_roster(TOTAL_CONTRIBUTION_VIEW, groups, members, policy)
}

/// MemberID → sum(AmountDisbursed), with names looked up in the roster.
///
/// Disbursements may go to people outside the group, so unknown IDs are
/// kept with no name instead of being subject to the join policy.
pub fn disbursement_by_member(
    disbursements: &Table,
    members: &Table,
) -> Result<Vec<BeneficiaryAmount>, DataError> {
    let names = roster(members)?;
    let mut groups =
        group_sum(disbursements, MEMBER_ID, column_value(disbursements, AMOUNT_DISBURSED)?)?;
    groups.sort_by(|a, b| a.key.cmp(&b.key));

    Ok(groups
        .into_iter()
        .map(|g| BeneficiaryAmount {
            name: names.get(&g.key).cloned(),
            member_id: g.key,
            amount: g.total,
        })
        .collect())
}

// =============================================================================
// Scalars
// =============================================================================

/// The four headline totals.
pub fn summary_metrics(
    collections: &Table,
    disbursements: &Table,
    admin_costs: &Table,
) -> Result<SummaryMetrics, DataError> {
    let total_contributions = column_sum(collections, AMOUNT_CONTRIBUTED)?;
    let total_disbursements = column_sum(disbursements, AMOUNT_DISBURSED)?;
    let total_admin_costs = column_sum(admin_costs, AMOUNT_SPENT)?;

    Ok(SummaryMetrics {
        total_contributions,
        total_disbursements,
        total_admin_costs,
        net_position: total_contributions - total_disbursements - total_admin_costs,
    })
}

/// Roster size, average contribution, latest month and active contributors.
pub fn spotlight_metrics(
    members: &Table,
    collections: &Table,
    summary: &SummaryMetrics,
    cash_flow: &[CashFlowMonth],
) -> Result<SpotlightMetrics, DataError> {
    let total_members = members.len();

    let active_contributors = match collections.locate(MEMBER_ID)? {
        Some(idx) => collections
            .rows()
            .iter()
            .map(|r| r[idx].key())
            .collect::<HashSet<_>>()
            .len(),
        None => 0,
    };

    Ok(SpotlightMetrics {
        total_members,
        average_contribution: (total_members > 0)
            .then(|| summary.total_contributions / total_members as f64),
        latest_month: cash_flow.last().map(|m| m.month_name.clone()),
        active_contributors,
    })
}

/// Sum of one numeric column; a headerless table sums to zero.
pub fn column_sum(table: &Table, column: &str) -> Result<f64, DataError> {
    let value = column_value(table, column)?;
    let mut total = 0.0;
    for (row, cells) in table.rows().iter().enumerate() {
        total += value(row, cells.as_slice())?;
    }
    Ok(total)
}

// =============================================================================
// Grouping
// =============================================================================

/// One group: key, summed value and how many rows fed it.
#[derive(Debug, Clone, PartialEq)]
struct Group {
    key: String,
    total: f64,
    rows: usize,
}

/// Row → number extractor for a named column.
type ValueFn<'a> = Box<dyn Fn(usize, &[Cell]) -> Result<f64, SchemaError> + 'a>;

fn column_value<'a>(table: &Table, column: &'a str) -> Result<ValueFn<'a>, SchemaError> {
    let idx = table.locate(column)?;
    Ok(Box::new(move |row, cells: &[Cell]| {
        let cell = idx.and_then(|i| cells.get(i));
        cell.and_then(Cell::as_number)
            .ok_or_else(|| SchemaError::NotNumeric {
                column: column.to_string(),
                row,
            })
    }))
}

/// Sum `value` per distinct key, groups in first-seen order.
fn group_sum<F>(table: &Table, key_column: &str, value: F) -> Result<Vec<Group>, DataError>
where
    F: Fn(usize, &[Cell]) -> Result<f64, SchemaError>,
{
    let key_idx = match table.locate(key_column)? {
        Some(idx) => idx,
        None => return Ok(Vec::new()),
    };

    let mut groups: Vec<Group> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (row, cells) in table.rows().iter().enumerate() {
        let amount = value(row, cells.as_slice())?;
        let key = cells[key_idx].key();
        match index.get(&key) {
            Some(&i) => {
                groups[i].total += amount;
                groups[i].rows += 1;
            }
            None => {
                index.insert(key.clone(), groups.len());
                groups.push(Group { key, total: amount, rows: 1 });
            }
        }
    }

    Ok(groups)
}

fn calendar_rank(month_name: &str) -> u32 {
    month_order(month_name).unwrap_or(u32::MAX)
}

fn by_calendar(mut groups: Vec<Group>) -> Vec<Group> {
    groups.sort_by_key(|g| calendar_rank(&g.key));
    groups
}

// =============================================================================
// Roster Join
// =============================================================================

/// MemberID → Name. A headerless roster is empty; repeated IDs are an error.
fn roster(members: &Table) -> Result<HashMap<String, String>, SchemaError> {
    let Some(id_idx) = members.locate(MEMBER_ID)? else {
        return Ok(HashMap::new());
    };
    let name_idx = members.require_column(NAME)?;

    let mut names = HashMap::with_capacity(members.len());
    for cells in members.rows() {
        let id = cells[id_idx].key();
        if names.contains_key(&id) {
            return Err(SchemaError::DuplicateKey {
                column: MEMBER_ID.to_string(),
                value: id,
            });
        }
        names.insert(id, cells[name_idx].key());
    }
    Ok(names)
}

/// Inner join of grouped totals with the roster, applying `policy` to
/// MemberIDs the roster does not know.
fn join_roster(
    view: &str,
    mut groups: Vec<Group>,
    members: &Table,
    policy: JoinPolicy,
) -> Result<MemberView, DataError> {
    let names = roster(members)?;
    groups.sort_by(|a, b| a.key.cmp(&b.key));

    let mut result = MemberView::default();
    for g in groups {
        match names.get(&g.key) {
            Some(name) => result.rows.push(MemberAmount {
                member_id: g.key,
                name: name.clone(),
                amount: g.total,
            }),
            None => result.warnings.push(JoinIntegrityWarning {
                view: view.to_string(),
                member_id: g.key,
                rows: g.rows,
            }),
        }
    }

    if policy == JoinPolicy::Fail && !result.warnings.is_empty() {
        return Err(DataError::OrphanedMembers {
            view: view.to_string(),
            member_ids: result.warnings.into_iter().map(|w| w.member_id).collect(),
        });
    }
    Ok(result)
}
