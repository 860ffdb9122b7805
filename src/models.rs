use std::fmt;

use serde::Serialize;

/// A single spreadsheet cell after normalization. Empty cells are `None`.
pub type Cell = Option<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum CoordinatorStatus {
    #[serde(rename = "Has Coordinator")]
    HasCoordinator,
    #[serde(rename = "No Coordinator")]
    NoCoordinator,
}

impl CoordinatorStatus {
    pub fn from_flag(has_coordinator: bool) -> Self {
        if has_coordinator {
            CoordinatorStatus::HasCoordinator
        } else {
            CoordinatorStatus::NoCoordinator
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            CoordinatorStatus::HasCoordinator => "Has Coordinator",
            CoordinatorStatus::NoCoordinator => "No Coordinator",
        }
    }
}

impl fmt::Display for CoordinatorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorRecord {
    pub region: Cell,
    pub inep: Cell,
    pub school: Cell,
    pub network: Cell,
    pub hub: Cell,
    pub coordinator: Cell,
    pub has_coordinator: bool,
    pub status: CoordinatorStatus,
}

#[derive(Debug, Clone, Default)]
pub struct CoordinatorTable {
    pub has_inep: bool,
    pub records: Vec<CoordinatorRecord>,
}

#[derive(Debug, Clone)]
pub struct TotalsRecord {
    pub region: Cell,
    pub hub: Cell,
    pub school: Cell,
    pub inep: Cell,
    /// Every column of the source row, aligned with `TotalsTable::headers`.
    pub values: Vec<Cell>,
}

#[derive(Debug, Clone, Default)]
pub struct TotalsTable {
    pub headers: Vec<String>,
    pub has_region: bool,
    pub has_hub: bool,
    pub has_inep: bool,
    pub records: Vec<TotalsRecord>,
}

/// Coverage of one region or hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageRow {
    pub key: String,
    pub total_schools: usize,
    pub schools_with_coordinator: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusCount {
    pub status: CoordinatorStatus,
    pub records: usize,
    pub percentage: f64,
}

/// A totals record tagged with the coordinator status of its school.
#[derive(Debug, Clone)]
pub struct StatusRecord {
    pub record: TotalsRecord,
    pub has_coordinator: bool,
    pub status: CoordinatorStatus,
}

#[derive(Debug, Clone, Default)]
pub struct HubStatus {
    pub summary: Vec<StatusCount>,
    pub records: Vec<StatusRecord>,
}

impl HubStatus {
    pub fn total_records(&self) -> usize {
        self.summary.iter().map(|count| count.records).sum()
    }

    pub fn with_coordinator(&self) -> usize {
        self.summary
            .iter()
            .filter(|count| count.status == CoordinatorStatus::HasCoordinator)
            .map(|count| count.records)
            .sum()
    }

    pub fn without_coordinator(&self) -> usize {
        self.total_records() - self.with_coordinator()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DetailColumn {
    Region,
    Hub,
    School,
    Identifier,
    Coordinator,
    Status,
}

impl DetailColumn {
    pub fn header(self) -> &'static str {
        match self {
            DetailColumn::Region => "Region",
            DetailColumn::Hub => "Hub",
            DetailColumn::School => "School",
            DetailColumn::Identifier => "INEP",
            DetailColumn::Coordinator => "Coordinator",
            DetailColumn::Status => "Status",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    pub region: Cell,
    pub hub: Cell,
    pub school: Cell,
    pub identifier: Cell,
    pub network: Cell,
    pub coordinator: String,
    /// Status of the school's first coordinator row.
    pub status: CoordinatorStatus,
    /// Whether any coordinator row of the school has a coordinator.
    pub has_coordinator: bool,
}

impl DetailRow {
    pub fn value(&self, column: DetailColumn) -> String {
        let cell = |value: &Cell| value.clone().unwrap_or_default();
        match column {
            DetailColumn::Region => cell(&self.region),
            DetailColumn::Hub => cell(&self.hub),
            DetailColumn::School => cell(&self.school),
            DetailColumn::Identifier => cell(&self.identifier),
            DetailColumn::Coordinator => self.coordinator.clone(),
            DetailColumn::Status => self.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DetailTable {
    pub columns: Vec<DetailColumn>,
    pub rows: Vec<DetailRow>,
}
