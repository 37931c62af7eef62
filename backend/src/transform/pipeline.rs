//! One refresh cycle over a raw workbook.
//!
//! Combines all steps: build each sheet into a table, derive month columns,
//! coerce amounts, then compute every derived view.
//!
//! # Example
//!
//! ```rust
//! use savings_metrics::models::{RawWorkbook, SheetNames};
//! use savings_metrics::transform::pipeline::{run_pipeline, PipelineOptions};
//!
//! let names = SheetNames::default();
//! let mut raw = RawWorkbook::new();
//! raw.insert(&names.admin_costs, vec![
//!     vec!["Date".to_string(), "AmountSpent".to_string()],
//!     vec!["2024-01-09".to_string(), "30".to_string()],
//! ]);
//!
//! let report = run_pipeline(&raw, &names, &PipelineOptions::default()).unwrap();
//! assert_eq!(report.summary.total_admin_costs, 30.0);
//! assert_eq!(report.summary.net_position, -30.0);
//! ```

use serde::{Deserialize, Serialize};

use crate::api::logs::{log_error, log_info, log_success, log_warning};
use crate::error::{DataError, DataResult};
use crate::metrics;
use crate::models::columns::{
    ADMIN_FEE_PAID, AMOUNT_CONTRIBUTED, AMOUNT_DISBURSED, AMOUNT_SPENT, COMMITMENT_FEE_PAID, DATE,
};
use crate::models::{DashboardReport, JoinPolicy, RawWorkbook, SheetKind, SheetNames};
use crate::table::{build, Table};

use super::columns::{convert_to_float, extract_month};

/// Options for one refresh cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineOptions {
    /// Derive `MonthOrder` next to `Month`/`MonthName`.
    pub include_month_order: bool,

    /// What to do with detail rows whose MemberID is not in the roster.
    pub join_policy: JoinPolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            include_month_order: true,
            join_policy: JoinPolicy::Drop,
        }
    }
}

/// The four ledger tables after transformation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LedgerTables {
    pub members: Table,
    pub collections: Table,
    pub disbursements: Table,
    pub admin_costs: Table,
}

/// Amount columns coerced to numbers, per sheet.
fn numeric_columns(kind: SheetKind) -> &'static [&'static str] {
    match kind {
        SheetKind::Members => &[],
        SheetKind::MonthlyCollection => &[AMOUNT_CONTRIBUTED, COMMITMENT_FEE_PAID, ADMIN_FEE_PAID],
        SheetKind::Disbursement => &[AMOUNT_DISBURSED],
        SheetKind::AdministrativeCosts => &[AMOUNT_SPENT],
    }
}

/// Build and transform one sheet.
pub fn prepare_sheet(
    kind: SheetKind,
    rows: Vec<Vec<String>>,
    include_month_order: bool,
) -> DataResult<Table> {
    let table = build(rows)?;
    if kind == SheetKind::Members {
        return Ok(table);
    }
    let table = extract_month(table, DATE, include_month_order)?;
    convert_to_float(table, numeric_columns(kind))
}

/// Build and transform all four sheets. The first failure aborts.
pub fn prepare_tables(
    raw: &RawWorkbook,
    names: &SheetNames,
    include_month_order: bool,
) -> DataResult<LedgerTables> {
    let prepare = |kind: SheetKind| {
        prepare_sheet(kind, raw.rows(names.get(kind)).to_vec(), include_month_order)
    };

    Ok(LedgerTables {
        members: prepare(SheetKind::Members)?,
        collections: prepare(SheetKind::MonthlyCollection)?,
        disbursements: prepare(SheetKind::Disbursement)?,
        admin_costs: prepare(SheetKind::AdministrativeCosts)?,
    })
}

/// Compute every derived view from prepared tables.
///
/// Pure: no logging and no I/O. Join warnings from the two member views
/// are collected into the report; `policy` applies to those views only.
pub fn compute_report(tables: &LedgerTables, policy: JoinPolicy) -> DataResult<DashboardReport> {
    let LedgerTables {
        members,
        collections,
        disbursements,
        admin_costs,
    } = tables;

    let operational_cash_flow = metrics::operational_cash_flow(collections)?;
    let commitment = metrics::commitment_fee_analysis(collections, members, policy)?;
    let total = metrics::total_contribution_analysis(collections, members, policy)?;
    let admin_fee_analysis = metrics::admin_fee_analysis(collections, admin_costs)?;
    let disbursement_analysis = metrics::disbursement_analysis(disbursements)?;
    let disbursement_by_member = metrics::disbursement_by_member(disbursements, members)?;
    let summary = metrics::summary_metrics(collections, disbursements, admin_costs)?;
    let spotlight =
        metrics::spotlight_metrics(members, collections, &summary, &operational_cash_flow)?;

    let mut warnings = commitment.warnings;
    warnings.extend(total.warnings);

    Ok(DashboardReport {
        operational_cash_flow,
        commitment_fee_analysis: commitment.rows,
        total_contribution_analysis: total.rows,
        admin_fee_analysis,
        disbursement_analysis,
        disbursement_by_member,
        summary,
        spotlight,
        warnings,
    })
}

/// Run one full refresh cycle over a raw workbook, logging progress.
///
/// Any schema or parse error aborts before a derived table is produced.
pub fn run_pipeline(
    raw: &RawWorkbook,
    names: &SheetNames,
    options: &PipelineOptions,
) -> DataResult<DashboardReport> {
    log_info("📖 Building ledger tables...");
    for kind in SheetKind::ALL {
        let name = names.get(kind);
        let rows = raw.rows(name);
        if rows.is_empty() {
            log_warning(format!("Sheet '{}' is empty or missing", name));
        } else {
            log_info(format!("{}: {} data rows", name, rows.len() - 1));
        }
    }

    let tables = prepare_tables(raw, names, options.include_month_order).map_err(|e| {
        log_error(format!("Transform failed: {}", e));
        e
    })?;
    log_success("Dates parsed and amounts converted");

    log_info("📊 Computing metrics...");
    let report = compute_report(&tables, options.join_policy).map_err(|e| {
        log_error(format!("Aggregation failed: {}", e));
        e
    })?;

    report_warnings(&report);
    log_success(format!(
        "Net position {:.2} across {} month(s)",
        report.summary.net_position,
        report.operational_cash_flow.len()
    ));

    Ok(report)
}

fn report_warnings(report: &DashboardReport) {
    if report.warnings.is_empty() {
        return;
    }
    log_warning(format!(
        "{} member ID(s) not in roster were left out of member views",
        report.warnings.len()
    ));
    for w in report.warnings.iter().take(5) {
        log_warning(format!("• {}: {} ({} rows)", w.view, w.member_id, w.rows));
    }
}

/// True when `err` came from the join policy rather than malformed data.
pub fn is_join_failure(err: &DataError) -> bool {
    matches!(err, DataError::OrphanedMembers { .. })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SchemaError;

    fn row(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn workbook() -> (RawWorkbook, SheetNames) {
        let names = SheetNames::default();
        let mut raw = RawWorkbook::new();
        raw.insert(
            &names.members,
            vec![row(&["MemberID", "Name"]), row(&["M1", "Amina"]), row(&["M2", "Brian"])],
        );
        raw.insert(
            &names.monthly_collection,
            vec![
                row(&["MemberID", "Date", "AmountContributed", "CommitmentFeePaid", "AdminFeePaid"]),
                row(&["M1", "2024-02-01", "500", "50", "20"]),
                row(&["M2", "2024-01-03", "500", "50", "20"]),
                row(&["M9", "2024-01-04", "0", "50", "0"]),
            ],
        );
        raw.insert(
            &names.disbursement,
            vec![row(&["MemberID", "Date", "AmountDisbursed"]), row(&["M1", "2024-02-10", "400"])],
        );
        raw.insert(
            &names.admin_costs,
            vec![row(&["Date", "AmountSpent"]), row(&["2024-01-20", "100"])],
        );
        (raw, names)
    }

    #[test]
    fn test_default_options() {
        let opts = PipelineOptions::default();
        assert!(opts.include_month_order);
        assert_eq!(opts.join_policy, JoinPolicy::Drop);
    }

    #[test]
    fn test_run_pipeline_full_report() {
        let (raw, names) = workbook();
        let report = run_pipeline(&raw, &names, &PipelineOptions::default()).unwrap();

        assert_eq!(report.summary.total_contributions, 1000.0);
        assert_eq!(report.summary.total_disbursements, 400.0);
        assert_eq!(report.summary.total_admin_costs, 100.0);
        assert_eq!(report.summary.net_position, 500.0);

        let months: Vec<&str> = report
            .operational_cash_flow
            .iter()
            .map(|m| m.month_name.as_str())
            .collect();
        assert_eq!(months, ["January", "February"]);

        assert_eq!(report.commitment_fee_analysis.len(), 2);
        assert_eq!(report.disbursement_by_member[0].name.as_deref(), Some("Amina"));
        assert_eq!(report.spotlight.total_members, 2);
        assert_eq!(report.spotlight.active_contributors, 3);
        assert_eq!(report.spotlight.latest_month.as_deref(), Some("February"));
    }

    #[test]
    fn test_orphans_are_reported_per_view() {
        let (raw, names) = workbook();
        let report = run_pipeline(&raw, &names, &PipelineOptions::default()).unwrap();

        let views: Vec<&str> = report.warnings.iter().map(|w| w.view.as_str()).collect();
        assert_eq!(
            views,
            [metrics::COMMITMENT_FEE_VIEW, metrics::TOTAL_CONTRIBUTION_VIEW]
        );
        assert!(report.warnings.iter().all(|w| w.member_id == "M9" && w.rows == 1));
    }

    #[test]
    fn test_fail_policy_aborts() {
        let (raw, names) = workbook();
        let options = PipelineOptions {
            join_policy: JoinPolicy::Fail,
            ..PipelineOptions::default()
        };
        let err = run_pipeline(&raw, &names, &options).unwrap_err();
        assert!(is_join_failure(&err));
    }

    #[test]
    fn test_fail_policy_allows_external_beneficiaries() {
        let (mut raw, names) = workbook();
        raw.insert(
            &names.monthly_collection,
            vec![
                row(&["MemberID", "Date", "AmountContributed", "CommitmentFeePaid", "AdminFeePaid"]),
                row(&["M1", "2024-02-01", "500", "50", "20"]),
            ],
        );
        raw.insert(
            &names.disbursement,
            vec![
                row(&["MemberID", "Date", "AmountDisbursed"]),
                row(&["EXT-1", "2024-02-10", "400"]),
            ],
        );
        let options = PipelineOptions {
            join_policy: JoinPolicy::Fail,
            ..PipelineOptions::default()
        };

        let report = run_pipeline(&raw, &names, &options).unwrap();
        assert_eq!(report.disbursement_by_member.len(), 1);
        assert_eq!(report.disbursement_by_member[0].member_id, "EXT-1");
        assert_eq!(report.disbursement_by_member[0].name, None);
        assert_eq!(report.summary.total_disbursements, 400.0);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_ragged_row_aborts_cycle() {
        let (mut raw, names) = workbook();
        raw.insert(
            &names.admin_costs,
            vec![row(&["Date", "AmountSpent"]), row(&["2024-01-20"])],
        );
        let err = run_pipeline(&raw, &names, &PipelineOptions::default()).unwrap_err();
        assert_eq!(
            err,
            DataError::Schema(SchemaError::RowLength { row: 0, expected: 2, found: 1 })
        );
    }

    #[test]
    fn test_empty_workbook_gives_empty_report() {
        let report =
            run_pipeline(&RawWorkbook::new(), &SheetNames::default(), &PipelineOptions::default())
                .unwrap();
        assert_eq!(report, DashboardReport::default());
    }

    #[test]
    fn test_prepare_sheet_without_month_order() {
        let table = prepare_sheet(
            SheetKind::Disbursement,
            vec![row(&["MemberID", "Date", "AmountDisbursed"]), row(&["M1", "2024-05-02", "10"])],
            false,
        )
        .unwrap();
        assert!(table.column_index("MonthOrder").is_none());
        assert!(table.column_index("MonthName").is_some());
    }
}
