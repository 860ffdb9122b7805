use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::models::{
    Cell, CoordinatorRecord, CoordinatorStatus, CoordinatorTable, TotalsRecord, TotalsTable,
};

pub const DEFAULT_COORDINATOR_SHEET: &str = "Planilha1";

/// Coordinator values that mean nobody has been assigned, compared after
/// trimming and lowercasing.
const NO_INFORMATION: [&str; 2] = ["sem informação", "no information"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Region,
    Inep,
    School,
    Network,
    Hub,
    Coordinator,
}

impl Field {
    fn name(self) -> &'static str {
        match self {
            Field::Region => "region",
            Field::Inep => "inep",
            Field::School => "school",
            Field::Network => "network",
            Field::Hub => "hub",
            Field::Coordinator => "coordinator",
        }
    }
}

/// Accepted coordinator sheet headers. Earlier variants win when a sheet
/// carries more than one for the same field.
const COORDINATOR_HEADERS: &[(&str, Field)] = &[
    ("GRE", Field::Region),
    ("INEP", Field::Inep),
    ("ESCOLA", Field::School),
    ("REDE", Field::Network),
    ("POLO", Field::Hub),
    ("NOME DO COORDENADOR", Field::Coordinator),
    ("COORDENADOR", Field::Coordinator),
];

const TOTALS_REGION: &str = "GRE";
const TOTALS_HUB: &str = "POLO";
const TOTALS_SCHOOL: &str = "ESCOLA";
const TOTALS_INEP: &str = "INEP";

/// Raw cell grid of one sheet, positioned from the top-left cell.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    pub rows: Vec<Vec<Cell>>,
}

impl Grid {
    fn padded(mut rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in rows.iter_mut() {
            row.resize(width, None);
        }
        Grid { rows }
    }
}

pub fn has_coordinator(value: Option<&str>) -> bool {
    let normalized = value.unwrap_or_default().trim().to_lowercase();
    !normalized.is_empty() && !NO_INFORMATION.contains(&normalized.as_str())
}

pub fn read_grid(path: &Path, sheet: Option<&str>) -> Result<Grid, LoadError> {
    let is_csv = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    let grid = if is_csv {
        if let Some(name) = sheet {
            warn!(path = %path.display(), sheet = name, "ignoring sheet name for CSV input");
        }
        read_csv(path)?
    } else {
        read_workbook(path, sheet)?
    };

    info!(path = %path.display(), rows = grid.rows.len(), "read sheet");
    Ok(grid)
}

fn read_csv(path: &Path) -> Result<Grid, LoadError> {
    let csv_error = |source: csv::Error| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .map_err(csv_error)?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        rows.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect(),
        );
    }

    Ok(Grid::padded(rows))
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<Grid, LoadError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|source| LoadError::Workbook {
        path: path.to_path_buf(),
        source,
    })?;

    let available = workbook.sheet_names().to_vec();
    let name = match sheet {
        Some(name) if available.iter().any(|candidate| candidate == name) => name.to_string(),
        Some(name) => {
            return Err(LoadError::SheetNotFound {
                path: path.to_path_buf(),
                sheet: name.to_string(),
                available,
            })
        }
        None => available
            .first()
            .cloned()
            .ok_or_else(|| LoadError::NoSheets(path.to_path_buf()))?,
    };

    let range = workbook
        .worksheet_range(&name)
        .map_err(|source| LoadError::Workbook {
            path: path.to_path_buf(),
            source,
        })?;

    // calamine starts the range at the first non-empty cell
    let (row_offset, col_offset) = range
        .start()
        .map(|(row, col)| (row as usize, col as usize))
        .unwrap_or((0, 0));

    let mut rows: Vec<Vec<Cell>> = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells: Vec<Cell> = vec![None; col_offset];
        cells.extend(row.iter().map(cell_text));
        rows.push(cells);
    }

    debug!(sheet = %name, "loaded workbook sheet");
    Ok(Grid::padded(rows))
}

fn cell_text(cell: &Data) -> Cell {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.clone(),
        // integral floats are usually identifiers typed as numbers
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Int(n) => n.to_string(),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

fn normalize_header(cell: &Cell, index: usize) -> String {
    match cell.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_uppercase(),
        _ => format!("UNNAMED: {index}"),
    }
}

fn value_at(row: &[Cell], index: Option<usize>) -> Cell {
    index.and_then(|index| row.get(index).cloned().flatten())
}

fn resolve_field(headers: &[String], field: Field) -> Option<usize> {
    COORDINATOR_HEADERS
        .iter()
        .filter(|(_, candidate)| *candidate == field)
        .find_map(|(variant, _)| headers.iter().position(|header| header == variant))
}

fn require_field(path: &Path, headers: &[String], field: Field) -> Result<usize, LoadError> {
    resolve_field(headers, field).ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        field: field.name(),
        accepted: COORDINATOR_HEADERS
            .iter()
            .filter(|(_, candidate)| *candidate == field)
            .map(|(variant, _)| *variant)
            .collect(),
    })
}

/// Builds the coordinator table from a sheet whose first row is a
/// placeholder and whose second row holds the real headers.
pub fn coordinators_from_grid(path: &Path, grid: Grid) -> Result<CoordinatorTable, LoadError> {
    let mut rows = grid.rows.into_iter().skip(1);
    let header_row = rows.next().ok_or_else(|| LoadError::MissingHeader {
        path: path.to_path_buf(),
        row: 2,
    })?;
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(index, cell)| normalize_header(cell, index))
        .collect();
    debug!(?headers, "coordinator headers");

    let region = require_field(path, &headers, Field::Region)?;
    let school = require_field(path, &headers, Field::School)?;
    let hub = require_field(path, &headers, Field::Hub)?;
    let coordinator = require_field(path, &headers, Field::Coordinator)?;
    let inep = resolve_field(&headers, Field::Inep);
    let network = resolve_field(&headers, Field::Network);

    let records = rows
        .map(|row| {
            let coordinator = value_at(&row, Some(coordinator));
            let has_coordinator = has_coordinator(coordinator.as_deref());
            CoordinatorRecord {
                region: value_at(&row, Some(region)),
                inep: value_at(&row, inep),
                school: value_at(&row, Some(school)),
                network: value_at(&row, network),
                hub: value_at(&row, Some(hub)),
                coordinator,
                has_coordinator,
                status: CoordinatorStatus::from_flag(has_coordinator),
            }
        })
        .collect();

    Ok(CoordinatorTable {
        has_inep: inep.is_some(),
        records,
    })
}

/// Builds the totals table. Leading blank rows are skipped and the first
/// remaining row holds the headers.
pub fn totals_from_grid(path: &Path, grid: Grid) -> Result<TotalsTable, LoadError> {
    let mut rows = grid
        .rows
        .into_iter()
        .skip_while(|row| row.iter().all(Option::is_none));
    let header_row = rows.next().ok_or_else(|| LoadError::MissingHeader {
        path: path.to_path_buf(),
        row: 1,
    })?;
    let headers: Vec<String> = header_row
        .iter()
        .enumerate()
        .map(|(index, cell)| normalize_header(cell, index))
        .collect();

    let position = |name: &str| headers.iter().position(|header| header == name);
    let region = position(TOTALS_REGION);
    let hub = position(TOTALS_HUB);
    let inep = position(TOTALS_INEP);
    let school = position(TOTALS_SCHOOL).ok_or_else(|| LoadError::MissingColumn {
        path: path.to_path_buf(),
        field: "school",
        accepted: vec![TOTALS_SCHOOL],
    })?;

    let records = rows
        .map(|row| TotalsRecord {
            region: value_at(&row, region),
            hub: value_at(&row, hub),
            school: value_at(&row, Some(school)),
            inep: value_at(&row, inep),
            values: row,
        })
        .collect();

    Ok(TotalsTable {
        headers,
        has_region: region.is_some(),
        has_hub: hub.is_some(),
        has_inep: inep.is_some(),
        records,
    })
}

pub fn load_coordinators(path: &Path, sheet: &str) -> Result<CoordinatorTable, LoadError> {
    let grid = read_grid(path, Some(sheet))?;
    coordinators_from_grid(path, grid)
}

pub fn load_totals(path: &Path) -> Result<TotalsTable, LoadError> {
    let grid = read_grid(path, None)?;
    totals_from_grid(path, grid)
}

/// Loaded tables shared for the lifetime of the process. Nothing is ever
/// evicted.
#[derive(Debug, Default)]
pub struct TableCache {
    coordinators: HashMap<(PathBuf, String), Rc<CoordinatorTable>>,
    totals: HashMap<PathBuf, Rc<TotalsTable>>,
}

impl TableCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn coordinators(
        &mut self,
        path: &Path,
        sheet: &str,
    ) -> Result<Rc<CoordinatorTable>, LoadError> {
        let key = (path.to_path_buf(), sheet.to_string());
        if let Some(table) = self.coordinators.get(&key) {
            debug!(path = %path.display(), sheet, "coordinator table cache hit");
            return Ok(Rc::clone(table));
        }

        debug!(path = %path.display(), sheet, "coordinator table cache miss");
        let table = Rc::new(load_coordinators(path, sheet)?);
        self.coordinators.insert(key, Rc::clone(&table));
        Ok(table)
    }

    pub fn totals(&mut self, path: &Path) -> Result<Rc<TotalsTable>, LoadError> {
        if let Some(table) = self.totals.get(path) {
            debug!(path = %path.display(), "totals table cache hit");
            return Ok(Rc::clone(table));
        }

        debug!(path = %path.display(), "totals table cache miss");
        let table = Rc::new(load_totals(path)?);
        self.totals.insert(path.to_path_buf(), Rc::clone(&table));
        Ok(table)
    }
}
