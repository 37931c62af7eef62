//! Domain models for the savings metrics pipeline.
//!
//! - [`RawWorkbook`] - raw rows per sheet, as handed over by a sheet source
//! - [`SheetKind`] / [`SheetNames`] - the four ledger sheets and their names
//! - month calendar helpers ([`month_name`], [`month_order`])
//! - derived view rows ([`CashFlowMonth`], [`MemberAmount`], [`BeneficiaryAmount`], [`AdminFeeMonth`], ...)
//! - [`DashboardReport`] - everything one refresh cycle produces
//!
//! Derived rows serialize with the column names the dashboard charts use
//! (`MonthName`, `AmountContributed`, `MemberID`, ...).

use chrono::Month;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

// =============================================================================
// Column Names
// =============================================================================

/// Column names shared by the ledger sheets and derived tables.
pub mod columns {
    pub const MEMBER_ID: &str = "MemberID";
    pub const NAME: &str = "Name";
    pub const DATE: &str = "Date";
    pub const AMOUNT_CONTRIBUTED: &str = "AmountContributed";
    pub const COMMITMENT_FEE_PAID: &str = "CommitmentFeePaid";
    pub const ADMIN_FEE_PAID: &str = "AdminFeePaid";
    pub const AMOUNT_DISBURSED: &str = "AmountDisbursed";
    pub const AMOUNT_SPENT: &str = "AmountSpent";
    pub const MONTH: &str = "Month";
    pub const MONTH_NAME: &str = "MonthName";
    pub const MONTH_ORDER: &str = "MonthOrder";
}

// =============================================================================
// Month Calendar
// =============================================================================

/// Canonical calendar order, January first.
pub const MONTHS: [Month; 12] = [
    Month::January,
    Month::February,
    Month::March,
    Month::April,
    Month::May,
    Month::June,
    Month::July,
    Month::August,
    Month::September,
    Month::October,
    Month::November,
    Month::December,
];

/// Full English month name for a 1-based month number.
pub fn month_name(number: u32) -> Option<&'static str> {
    let index = usize::try_from(number).ok()?.checked_sub(1)?;
    MONTHS.get(index).map(|m| m.name())
}

/// 0-based calendar position of a full English month name.
///
/// Built from [`MONTHS`] only, so the same name always maps to the same index.
pub fn month_order(name: &str) -> Option<u32> {
    MONTHS
        .iter()
        .position(|m| m.name() == name)
        .and_then(|i| u32::try_from(i).ok())
}

// =============================================================================
// Sheets
// =============================================================================

/// The four ledger sheets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SheetKind {
    Members,
    MonthlyCollection,
    Disbursement,
    AdministrativeCosts,
}

impl SheetKind {
    pub const ALL: [SheetKind; 4] = [
        SheetKind::Members,
        SheetKind::MonthlyCollection,
        SheetKind::Disbursement,
        SheetKind::AdministrativeCosts,
    ];

    /// URL/CLI slug.
    pub fn slug(&self) -> &'static str {
        match self {
            SheetKind::Members => "members",
            SheetKind::MonthlyCollection => "monthly-collection",
            SheetKind::Disbursement => "disbursement",
            SheetKind::AdministrativeCosts => "administrative-costs",
        }
    }
}

impl FromStr for SheetKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        SheetKind::ALL
            .into_iter()
            .find(|k| k.slug() == normalized)
            .ok_or_else(|| s.to_string())
    }
}

/// Sheet (tab) names inside the spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetNames {
    pub members: String,
    pub monthly_collection: String,
    pub disbursement: String,
    pub admin_costs: String,
}

impl SheetNames {
    pub fn get(&self, kind: SheetKind) -> &str {
        match kind {
            SheetKind::Members => &self.members,
            SheetKind::MonthlyCollection => &self.monthly_collection,
            SheetKind::Disbursement => &self.disbursement,
            SheetKind::AdministrativeCosts => &self.admin_costs,
        }
    }

    pub fn all(&self) -> [&str; 4] {
        SheetKind::ALL.map(|k| self.get(k))
    }
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            members: "01_Members".to_string(),
            monthly_collection: "02_MonthlyCollection".to_string(),
            disbursement: "03_Disbursement".to_string(),
            admin_costs: "04_AdministrativeCosts".to_string(),
        }
    }
}

/// Raw rows per sheet name; first row of each sheet is its header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawWorkbook {
    pub sheets: BTreeMap<String, Vec<Vec<String>>>,
}

impl RawWorkbook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, rows: Vec<Vec<String>>) {
        self.sheets.insert(name.into(), rows);
    }

    /// Rows of a sheet; absent sheets read as empty.
    pub fn rows(&self, name: &str) -> &[Vec<String>] {
        self.sheets.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Content hash of the snapshot, used as a memo key.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.sheets.hash(&mut hasher);
        hasher.finish()
    }
}

// =============================================================================
// Join Policy
// =============================================================================

/// What to do with detail rows whose MemberID is not in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinPolicy {
    /// Exclude the rows from the member view and report a warning.
    #[default]
    Drop,
    /// Abort the refresh cycle.
    Fail,
}

impl FromStr for JoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(JoinPolicy::Drop),
            "fail" => Ok(JoinPolicy::Fail),
            _ => Err(s.to_string()),
        }
    }
}

/// Detail rows excluded from a member view because their MemberID has no
/// roster entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinIntegrityWarning {
    /// View the rows were dropped from.
    pub view: String,
    pub member_id: String,
    /// Number of detail rows carrying this MemberID.
    pub rows: usize,
}

// =============================================================================
// Derived View Rows
// =============================================================================

/// Operational cash flow for one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CashFlowMonth {
    pub month_name: String,
    pub amount_contributed: f64,
}

/// Disbursements paid out in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DisbursementMonth {
    pub month_name: String,
    pub amount_disbursed: f64,
}

/// Admin fee collected vs spent in one month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AdminFeeMonth {
    pub month_name: String,
    pub admin_fee_paid: f64,
    pub amount_spent: f64,
    pub net_admin_fee: f64,
}

/// A per-member total joined with the member's display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberAmount {
    #[serde(rename = "MemberID")]
    pub member_id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Amount")]
    pub amount: f64,
}

/// Disbursed total per beneficiary. Beneficiaries outside the roster are
/// kept, with no name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeneficiaryAmount {
    #[serde(rename = "MemberID")]
    pub member_id: String,
    #[serde(rename = "Name")]
    pub name: Option<String>,
    #[serde(rename = "Amount")]
    pub amount: f64,
}

/// Result of a member-keyed view: joined rows plus what the join dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MemberView {
    pub rows: Vec<MemberAmount>,
    pub warnings: Vec<JoinIntegrityWarning>,
}

/// The four headline figures.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SummaryMetrics {
    #[serde(rename = "Total Contributions")]
    pub total_contributions: f64,
    #[serde(rename = "Total Disbursements")]
    pub total_disbursements: f64,
    #[serde(rename = "Total Admin Costs")]
    pub total_admin_costs: f64,
    #[serde(rename = "Net Position")]
    pub net_position: f64,
}

/// Rotating "spotlight" figures shown under the summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpotlightMetrics {
    pub total_members: usize,
    /// Total contributions per roster member; `None` for an empty roster.
    pub average_contribution: Option<f64>,
    /// Last month with contributions, in calendar order.
    pub latest_month: Option<String>,
    /// Distinct MemberIDs that appear in the collections.
    pub active_contributors: usize,
}

// =============================================================================
// Report
// =============================================================================

/// Everything one refresh cycle hands to the dashboard.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardReport {
    pub operational_cash_flow: Vec<CashFlowMonth>,
    pub commitment_fee_analysis: Vec<MemberAmount>,
    pub total_contribution_analysis: Vec<MemberAmount>,
    pub admin_fee_analysis: Vec<AdminFeeMonth>,
    pub disbursement_analysis: Vec<DisbursementMonth>,
    pub disbursement_by_member: Vec<BeneficiaryAmount>,
    pub summary: SummaryMetrics,
    pub spotlight: SpotlightMetrics,
    pub warnings: Vec<JoinIntegrityWarning>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_name_is_english_and_bounded() {
        assert_eq!(month_name(1), Some("January"));
        assert_eq!(month_name(9), Some("September"));
        assert_eq!(month_name(12), Some("December"));
        assert_eq!(month_name(0), None);
        assert_eq!(month_name(13), None);
    }

    #[test]
    fn test_month_order_is_a_bijection() {
        let orders: Vec<u32> = MONTHS
            .iter()
            .map(|m| month_order(m.name()).unwrap())
            .collect();
        assert_eq!(orders, (0..12).collect::<Vec<_>>());
        assert_eq!(month_order("Smarch"), None);
        assert_eq!(month_order("january"), None);
    }

    #[test]
    fn test_sheet_kind_slugs() {
        assert_eq!("monthly-collection".parse::<SheetKind>(), Ok(SheetKind::MonthlyCollection));
        assert_eq!("Administrative_Costs".parse::<SheetKind>(), Ok(SheetKind::AdministrativeCosts));
        assert!("ledger".parse::<SheetKind>().is_err());
    }

    #[test]
    fn test_default_sheet_names() {
        let names = SheetNames::default();
        assert_eq!(
            names.all(),
            ["01_Members", "02_MonthlyCollection", "03_Disbursement", "04_AdministrativeCosts"]
        );
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let mut a = RawWorkbook::new();
        a.insert("01_Members", vec![vec!["MemberID".into()], vec!["M1".into()]]);
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());

        b.insert("01_Members", vec![vec!["MemberID".into()], vec!["M2".into()]]);
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert!(a.rows("missing").is_empty());
    }

    #[test]
    fn test_summary_serializes_with_display_labels() {
        let summary = SummaryMetrics {
            total_contributions: 1000.0,
            total_disbursements: 400.0,
            total_admin_costs: 100.0,
            net_position: 500.0,
        };
        let json = serde_json::to_value(summary).unwrap();
        assert_eq!(json["Net Position"], 500.0);
        assert_eq!(json["Total Admin Costs"], 100.0);
    }
}
