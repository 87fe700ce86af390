//! Client-supplied ordering for sale listings.
//!
//! An order string such as `"customer asc, totalValue desc"` is split on
//! commas and every clause is checked against a fixed column allow-list.
//! Malformed clauses and unknown columns are dropped silently; when nothing
//! survives, listings fall back to newest-first.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static CLAUSE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(\w+)(?:\s+(asc|desc))?$").expect("order clause pattern is valid")
});

/// Columns a listing may be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SortColumn {
    Id,
    SaleNumber,
    Customer,
    TotalValue,
    Branch,
    CreatedAt,
    UpdatedAt,
    Cancelled,
}

impl SortColumn {
    pub const ALL: [SortColumn; 8] = [
        SortColumn::Id,
        SortColumn::SaleNumber,
        SortColumn::Customer,
        SortColumn::TotalValue,
        SortColumn::Branch,
        SortColumn::CreatedAt,
        SortColumn::UpdatedAt,
        SortColumn::Cancelled,
    ];

    /// Name accepted in order strings (matched case-insensitively).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::SaleNumber => "SaleNumber",
            Self::Customer => "Customer",
            Self::TotalValue => "TotalValue",
            Self::Branch => "Branch",
            Self::CreatedAt => "CreatedAt",
            Self::UpdatedAt => "UpdatedAt",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Column name in the `sales` table.
    pub fn sql_column(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::SaleNumber => "sale_number",
            Self::Customer => "customer",
            Self::TotalValue => "total_value",
            Self::Branch => "branch",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|column| column.as_str().eq_ignore_ascii_case(name))
    }
}

impl std::fmt::Display for SortColumn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// One validated `(column, direction)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct OrderClause {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl OrderClause {
    pub const fn new(column: SortColumn, direction: SortDirection) -> Self {
        Self { column, direction }
    }

    /// Newest sales first.
    pub const DEFAULT: OrderClause = OrderClause::new(SortColumn::CreatedAt, SortDirection::Desc);
}

/// Parse an order string into allow-listed clauses, primary key first.
pub fn parse_order(order: Option<&str>) -> Vec<OrderClause> {
    let Some(order) = order.map(str::trim).filter(|o| !o.is_empty()) else {
        return vec![OrderClause::DEFAULT];
    };

    let clauses: Vec<OrderClause> = order.split(',').filter_map(parse_clause).collect();

    if clauses.is_empty() {
        tracing::debug!(order = %order, "No usable order clauses, using default ordering");
        return vec![OrderClause::DEFAULT];
    }

    clauses
}

fn parse_clause(raw: &str) -> Option<OrderClause> {
    let captures = CLAUSE_PATTERN.captures(raw.trim())?;
    let column = SortColumn::from_name(captures.get(1)?.as_str())?;
    let direction = match captures.get(2) {
        Some(dir) if dir.as_str().eq_ignore_ascii_case("desc") => SortDirection::Desc,
        _ => SortDirection::Asc,
    };

    Some(OrderClause::new(column, direction))
}

/// Render clauses as an SQL `ORDER BY` body, with `id` as the final tie-breaker.
///
/// Only identifiers from [`SortColumn::sql_column`] are emitted.
pub fn to_sql_order_by(clauses: &[OrderClause]) -> String {
    let mut parts: Vec<String> = clauses
        .iter()
        .map(|c| format!("{} {}", c.column.sql_column(), c.direction.as_sql()))
        .collect();

    if !clauses.iter().any(|c| c.column == SortColumn::Id) {
        parts.push("id ASC".to_string());
    }

    parts.join(", ")
}
