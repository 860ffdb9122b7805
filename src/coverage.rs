use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::QueryError;
use crate::models::{
    CoordinatorStatus, CoordinatorTable, CoverageRow, DetailColumn, DetailRow, DetailTable,
    HubStatus, StatusCount, StatusRecord, TotalsRecord, TotalsTable,
};

pub const NO_INFORMATION_LABEL: &str = "No information";

pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Share of distinct schools in the totals table that have a coordinator.
pub fn completion_percentage(coordinators: &CoordinatorTable, totals: &TotalsTable) -> f64 {
    let schools: HashSet<&str> = totals
        .records
        .iter()
        .filter_map(|record| record.school.as_deref())
        .collect();
    let covered: HashSet<&str> = coordinators
        .records
        .iter()
        .filter(|record| record.has_coordinator)
        .filter_map(|record| record.school.as_deref())
        .collect();

    percentage(covered.len(), schools.len())
}

pub fn summarize_regions(
    coordinators: &CoordinatorTable,
    totals: &TotalsTable,
) -> Result<Vec<CoverageRow>, QueryError> {
    require(totals.has_region, "GRE")?;

    let totals_by_region = distinct_schools(
        totals
            .records
            .iter()
            .map(|record| (record.region.as_deref(), record.school.as_deref())),
    );
    let covered_by_region = distinct_schools(
        coordinators
            .records
            .iter()
            .filter(|record| record.has_coordinator)
            .map(|record| (record.region.as_deref(), record.school.as_deref())),
    );

    Ok(coverage_rows(totals_by_region, &covered_by_region))
}

pub fn summarize_hubs(
    coordinators: &CoordinatorTable,
    totals: &TotalsTable,
    region: &str,
) -> Result<Vec<CoverageRow>, QueryError> {
    require(totals.has_region, "GRE")?;
    require(totals.has_hub, "POLO")?;

    let totals_by_hub = distinct_schools(
        totals
            .records
            .iter()
            .filter(|record| record.region.as_deref() == Some(region))
            .map(|record| (record.hub.as_deref(), record.school.as_deref())),
    );
    let covered_by_hub = distinct_schools(
        coordinators
            .records
            .iter()
            .filter(|record| record.has_coordinator && record.region.as_deref() == Some(region))
            .map(|record| (record.hub.as_deref(), record.school.as_deref())),
    );

    Ok(coverage_rows(totals_by_hub, &covered_by_hub))
}

/// Counts the hub's records (not distinct schools) by coordinator status.
pub fn hub_status(
    coordinators: &CoordinatorTable,
    totals: &TotalsTable,
    region: &str,
    hub: &str,
) -> Result<HubStatus, QueryError> {
    let slice = hub_records(totals, region, hub)?;

    let mut covered: HashMap<&str, bool> = HashMap::new();
    for record in &coordinators.records {
        if let Some(school) = record.school.as_deref() {
            *covered.entry(school).or_insert(false) |= record.has_coordinator;
        }
    }

    let records: Vec<StatusRecord> = slice
        .into_iter()
        .map(|record| {
            let has_coordinator = record
                .school
                .as_deref()
                .and_then(|school| covered.get(school).copied())
                .unwrap_or(false);
            StatusRecord {
                record: record.clone(),
                has_coordinator,
                status: CoordinatorStatus::from_flag(has_coordinator),
            }
        })
        .collect();

    let mut counts: BTreeMap<CoordinatorStatus, usize> = BTreeMap::new();
    for record in &records {
        *counts.entry(record.status).or_insert(0) += 1;
    }

    let total = records.len();
    let summary = counts
        .into_iter()
        .map(|(status, count)| StatusCount {
            status,
            records: count,
            percentage: percentage(count, total),
        })
        .collect();

    Ok(HubStatus { summary, records })
}

#[derive(Debug)]
struct SchoolInfo<'a> {
    inep: Option<&'a str>,
    network: Option<&'a str>,
    coordinator: Option<&'a str>,
    status: CoordinatorStatus,
}

/// One row per totals record of the hub, enriched with the school's
/// coordinator. Per school the first non-empty INEP, network and coordinator
/// name in sheet order are used, and the status of the school's first row.
/// Rows come from the records tagged by [`hub_status`].
pub fn school_details(
    coordinators: &CoordinatorTable,
    totals: &TotalsTable,
    region: &str,
    hub: &str,
) -> Result<DetailTable, QueryError> {
    let tagged = hub_status(coordinators, totals, region, hub)?;

    let mut schools: HashMap<&str, SchoolInfo<'_>> = HashMap::new();
    for record in &coordinators.records {
        let Some(school) = record.school.as_deref() else {
            continue;
        };
        let info = schools.entry(school).or_insert_with(|| SchoolInfo {
            inep: None,
            network: None,
            coordinator: None,
            status: record.status,
        });
        if info.inep.is_none() {
            info.inep = record.inep.as_deref();
        }
        if info.network.is_none() {
            info.network = record.network.as_deref();
        }
        if info.coordinator.is_none() {
            info.coordinator = record.coordinator.as_deref();
        }
    }

    let rows = tagged
        .records
        .into_iter()
        .map(|tagged| {
            let record = tagged.record;
            // exact name match, no normalization across the two sheets
            let info = record
                .school
                .as_deref()
                .and_then(|school| schools.get(school));
            DetailRow {
                identifier: record
                    .inep
                    .or_else(|| info.and_then(|info| info.inep).map(str::to_string)),
                network: info.and_then(|info| info.network).map(str::to_string),
                coordinator: info
                    .and_then(|info| info.coordinator)
                    .unwrap_or(NO_INFORMATION_LABEL)
                    .to_string(),
                status: info
                    .map(|info| info.status)
                    .unwrap_or(CoordinatorStatus::NoCoordinator),
                has_coordinator: tagged.has_coordinator,
                region: record.region,
                hub: record.hub,
                school: record.school,
            }
        })
        .collect();

    // a hub slice always has region and hub columns
    let mut columns = vec![DetailColumn::Region, DetailColumn::Hub, DetailColumn::School];
    if totals.has_inep || coordinators.has_inep {
        columns.push(DetailColumn::Identifier);
    }
    columns.push(DetailColumn::Coordinator);
    columns.push(DetailColumn::Status);

    Ok(DetailTable { columns, rows })
}

fn require(present: bool, column: &'static str) -> Result<(), QueryError> {
    if present {
        Ok(())
    } else {
        Err(QueryError::MissingColumn(column))
    }
}

fn hub_records<'a>(
    totals: &'a TotalsTable,
    region: &str,
    hub: &str,
) -> Result<Vec<&'a TotalsRecord>, QueryError> {
    require(totals.has_region, "GRE")?;
    require(totals.has_hub, "POLO")?;

    Ok(totals
        .records
        .iter()
        .filter(|record| {
            record.region.as_deref() == Some(region) && record.hub.as_deref() == Some(hub)
        })
        .collect())
}

/// Groups (key, school) pairs. Rows without a key are dropped; rows without
/// a school still open their group.
fn distinct_schools<'a>(
    pairs: impl Iterator<Item = (Option<&'a str>, Option<&'a str>)>,
) -> BTreeMap<&'a str, HashSet<&'a str>> {
    let mut groups: BTreeMap<&'a str, HashSet<&'a str>> = BTreeMap::new();
    for (key, school) in pairs {
        let Some(key) = key else {
            continue;
        };
        let schools = groups.entry(key).or_default();
        if let Some(school) = school {
            schools.insert(school);
        }
    }
    groups
}

fn coverage_rows(
    totals: BTreeMap<&str, HashSet<&str>>,
    covered: &BTreeMap<&str, HashSet<&str>>,
) -> Vec<CoverageRow> {
    let mut rows: Vec<CoverageRow> = totals
        .into_iter()
        .map(|(key, schools)| {
            let with_coordinator = covered.get(key).map_or(0, HashSet::len);
            CoverageRow {
                key: key.to_string(),
                total_schools: schools.len(),
                schools_with_coordinator: with_coordinator,
                percentage: percentage(with_coordinator, schools.len()),
            }
        })
        .collect();

    // stable, so ties stay in key order
    rows.sort_by(|a, b| b.percentage.partial_cmp(&a.percentage).unwrap_or(Ordering::Equal));
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CoordinatorRecord;

    fn cell(value: &str) -> Option<String> {
        (!value.is_empty()).then(|| value.to_string())
    }

    fn coordinator(region: &str, hub: &str, school: &str, inep: &str, name: &str) -> CoordinatorRecord {
        let has_coordinator = crate::loader::has_coordinator(Some(name));
        CoordinatorRecord {
            region: cell(region),
            inep: cell(inep),
            school: cell(school),
            network: cell("Estadual"),
            hub: cell(hub),
            coordinator: cell(name),
            has_coordinator,
            status: CoordinatorStatus::from_flag(has_coordinator),
        }
    }

    fn coordinators(records: Vec<CoordinatorRecord>) -> CoordinatorTable {
        CoordinatorTable {
            has_inep: true,
            records,
        }
    }

    fn totals(rows: &[(&str, &str, &str)]) -> TotalsTable {
        TotalsTable {
            headers: vec!["GRE".to_string(), "POLO".to_string(), "ESCOLA".to_string()],
            has_region: true,
            has_hub: true,
            has_inep: false,
            records: rows
                .iter()
                .map(|(region, hub, school)| TotalsRecord {
                    region: cell(region),
                    hub: cell(hub),
                    school: cell(school),
                    inep: None,
                    values: vec![cell(region), cell(hub), cell(school)],
                })
                .collect(),
        }
    }

    fn sample() -> (CoordinatorTable, TotalsTable) {
        let coord = coordinators(vec![
            coordinator("R1", "P1", "A", "1", "Sem informação"),
            coordinator("R1", "P1", "B", "2", "João"),
            coordinator("R2", "P3", "D", "4", "Ana"),
            coordinator("R2", "P3", "E", "5", "Rita"),
            coordinator("R2", "P4", "F", "6", "sem informação"),
        ]);
        let totals = totals(&[
            ("R1", "P1", "A"),
            ("R1", "P1", "B"),
            ("R1", "P2", "C"),
            ("R2", "P3", "D"),
            ("R2", "P3", "E"),
            ("R2", "P4", "F"),
            ("R3", "P5", "G"),
        ]);
        (coord, totals)
    }

    #[test]
    fn completion_counts_distinct_covered_schools() {
        let (coord, totals) = sample();
        let value = completion_percentage(&coord, &totals);
        assert!((value - 3.0 / 7.0 * 100.0).abs() < 0.001);
        assert!((0.0..=100.0).contains(&value));
    }

    #[test]
    fn completion_counts_covered_schools_missing_from_totals() {
        let coord = coordinators(vec![
            coordinator("R1", "P1", "A", "1", "Ana"),
            coordinator("R1", "P1", "Z", "9", "Bia"),
        ]);
        let totals = totals(&[("R1", "P1", "A")]);

        let value = completion_percentage(&coord, &totals);
        assert!((value - 200.0).abs() < 0.001);
    }

    #[test]
    fn completion_is_zero_without_schools() {
        let (coord, _) = sample();
        assert_eq!(completion_percentage(&coord, &totals(&[])), 0.0);
        assert_eq!(completion_percentage(&coord, &totals(&[("R1", "P1", "")])), 0.0);
    }

    #[test]
    fn region_scenario_matches_one_in_three() {
        let coord = coordinators(vec![
            coordinator("R1", "P1", "A", "", "Sem informação"),
            coordinator("R1", "P1", "B", "", "João"),
        ]);
        let totals = totals(&[("R1", "P1", "A"), ("R1", "P1", "B"), ("R1", "P1", "C")]);

        let rows = summarize_regions(&coord, &totals).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "R1");
        assert_eq!(rows[0].total_schools, 3);
        assert_eq!(rows[0].schools_with_coordinator, 1);
        assert_eq!(format!("{:.1}", rows[0].percentage), "33.3");
    }

    #[test]
    fn regions_are_anchored_on_totals_and_sorted() {
        let (mut coord, totals) = sample();
        coord.records.push(coordinator("R9", "P9", "Z", "9", "Bia"));

        let rows = summarize_regions(&coord, &totals).unwrap();
        let keys: Vec<&str> = rows.iter().map(|row| row.key.as_str()).collect();
        assert_eq!(keys, vec!["R2", "R1", "R3"]);
        assert_eq!(rows[2].schools_with_coordinator, 0);
        assert_eq!(rows[2].percentage, 0.0);
        for pair in rows.windows(2) {
            assert!(pair[0].percentage >= pair[1].percentage);
        }
        for row in &rows {
            assert!(row.total_schools >= row.schools_with_coordinator);
        }
    }

    #[test]
    fn regions_with_equal_percentage_keep_key_order() {
        let coord = coordinators(vec![]);
        let totals = totals(&[("R2", "P1", "A"), ("R1", "P1", "B")]);

        let rows = summarize_regions(&coord, &totals).unwrap();
        assert_eq!(rows[0].key, "R1");
        assert_eq!(rows[1].key, "R2");
    }

    #[test]
    fn schools_are_counted_once_per_region() {
        let coord = coordinators(vec![
            coordinator("R1", "P1", "A", "1", "Ana"),
            coordinator("R1", "P1", "A", "1", "Ana"),
        ]);
        let totals = totals(&[("R1", "P1", "A"), ("R1", "P1", "A"), ("R1", "P1", "B")]);

        let rows = summarize_regions(&coord, &totals).unwrap();
        assert_eq!(rows[0].total_schools, 2);
        assert_eq!(rows[0].schools_with_coordinator, 1);
        assert!((rows[0].percentage - 50.0).abs() < 0.001);
    }

    #[test]
    fn hubs_are_scoped_to_the_region() {
        let (coord, totals) = sample();

        let rows = summarize_hubs(&coord, &totals, "R2").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "P3");
        assert_eq!(rows[0].total_schools, 2);
        assert_eq!(rows[0].schools_with_coordinator, 2);
        assert!((rows[0].percentage - 100.0).abs() < 0.001);
        assert_eq!(rows[1].key, "P4");
        assert_eq!(rows[1].percentage, 0.0);

        assert!(summarize_hubs(&coord, &totals, "R404").unwrap().is_empty());
    }

    #[test]
    fn queries_fail_without_grouping_columns() {
        let (coord, mut totals) = sample();
        totals.has_hub = false;
        assert_eq!(
            summarize_hubs(&coord, &totals, "R1").unwrap_err(),
            QueryError::MissingColumn("POLO")
        );
        totals.has_region = false;
        assert_eq!(
            summarize_regions(&coord, &totals).unwrap_err(),
            QueryError::MissingColumn("GRE")
        );
    }

    #[test]
    fn hub_status_counts_records_not_schools() {
        let coord = coordinators(vec![
            coordinator("R1", "P1", "A", "1", "Sem informação"),
            coordinator("R1", "P1", "A", "1", "Ana"),
            coordinator("R1", "P1", "B", "2", "Sem informação"),
        ]);
        let totals = totals(&[
            ("R1", "P1", "A"),
            ("R1", "P1", "A"),
            ("R1", "P1", "A"),
            ("R1", "P1", "B"),
            ("R1", "P1", "C"),
            ("R1", "P2", "A"),
        ]);

        let status = hub_status(&coord, &totals, "R1", "P1").unwrap();
        assert_eq!(status.records.len(), 5);
        assert_eq!(status.summary.len(), 2);
        assert_eq!(status.summary[0].status, CoordinatorStatus::HasCoordinator);
        assert_eq!(status.summary[0].records, 3);
        assert!((status.summary[0].percentage - 60.0).abs() < 0.001);
        assert_eq!(status.summary[1].status, CoordinatorStatus::NoCoordinator);
        assert_eq!(status.summary[1].records, 2);

        assert_eq!(status.total_records(), 5);
        assert_eq!(status.with_coordinator(), 3);
        assert_eq!(status.without_coordinator(), 2);
        assert!(status.records[0].has_coordinator);
        assert!(!status.records[4].has_coordinator);
    }

    #[test]
    fn hub_status_uses_coordinators_from_any_region() {
        let coord = coordinators(vec![coordinator("R9", "P9", "A", "1", "Ana")]);
        let totals = totals(&[("R1", "P1", "A")]);

        let status = hub_status(&coord, &totals, "R1", "P1").unwrap();
        assert_eq!(status.with_coordinator(), 1);
    }

    #[test]
    fn empty_hub_has_empty_summary() {
        let (coord, totals) = sample();

        let status = hub_status(&coord, &totals, "R1", "missing").unwrap();
        assert!(status.summary.is_empty());
        assert!(status.records.is_empty());
        assert_eq!(status.total_records(), 0);
        assert_eq!(status.without_coordinator(), 0);
    }

    #[test]
    fn details_keep_every_totals_record() {
        let (coord, mut totals) = sample();
        totals.records.push(totals.records[0].clone());

        let table = school_details(&coord, &totals, "R1", "P1").unwrap();
        assert_eq!(table.rows.len(), 3);
        assert_eq!(
            table.columns,
            vec![
                DetailColumn::Region,
                DetailColumn::Hub,
                DetailColumn::School,
                DetailColumn::Identifier,
                DetailColumn::Coordinator,
                DetailColumn::Status,
            ]
        );

        let first = &table.rows[0];
        assert_eq!(first.school.as_deref(), Some("A"));
        assert_eq!(first.identifier.as_deref(), Some("1"));
        assert_eq!(first.coordinator, "Sem informação");
        assert_eq!(first.status, CoordinatorStatus::NoCoordinator);

        let second = &table.rows[1];
        assert_eq!(second.coordinator, "João");
        assert_eq!(second.status, CoordinatorStatus::HasCoordinator);
        assert_eq!(table.rows[2], table.rows[0]);
    }

    #[test]
    fn details_default_unmatched_schools() {
        let (coord, totals) = sample();

        let table = school_details(&coord, &totals, "R1", "P2").unwrap();
        assert_eq!(table.rows.len(), 1);
        let row = &table.rows[0];
        assert_eq!(row.identifier, None);
        assert_eq!(row.coordinator, NO_INFORMATION_LABEL);
        assert_eq!(row.status, CoordinatorStatus::NoCoordinator);
        assert_eq!(row.value(DetailColumn::Identifier), "");
    }

    #[test]
    fn details_take_first_values_in_sheet_order() {
        let coord = coordinators(vec![
            coordinator("R1", "P1", "A", "", "Sem informação"),
            coordinator("R1", "P1", "A", "77", "Ana"),
        ]);
        let totals = totals(&[("R1", "P1", "A")]);

        let row = &school_details(&coord, &totals, "R1", "P1").unwrap().rows[0];
        assert_eq!(row.identifier.as_deref(), Some("77"));
        assert_eq!(row.coordinator, "Sem informação");
        assert_eq!(row.status, CoordinatorStatus::NoCoordinator);
    }

    #[test]
    fn details_match_school_names_exactly() {
        let coord = coordinators(vec![coordinator("R1", "P1", "Escola A ", "1", "Ana")]);
        let totals = totals(&[("R1", "P1", "Escola A")]);

        let row = &school_details(&coord, &totals, "R1", "P1").unwrap().rows[0];
        assert_eq!(row.coordinator, NO_INFORMATION_LABEL);
    }

    #[test]
    fn details_prefer_the_totals_identifier() {
        let coord = coordinators(vec![coordinator("R1", "P1", "A", "1", "Ana")]);
        let mut totals = totals(&[("R1", "P1", "A")]);
        totals.has_inep = true;
        totals.records[0].inep = Some("99".to_string());

        let row = &school_details(&coord, &totals, "R1", "P1").unwrap().rows[0];
        assert_eq!(row.identifier.as_deref(), Some("99"));
    }

    #[test]
    fn details_omit_identifier_when_no_table_has_one() {
        let mut coord = coordinators(vec![coordinator("R1", "P1", "A", "", "Ana")]);
        coord.has_inep = false;
        let totals = totals(&[("R1", "P1", "A")]);

        let table = school_details(&coord, &totals, "R1", "P1").unwrap();
        assert!(!table.columns.contains(&DetailColumn::Identifier));
    }

    #[test]
    fn details_carry_network_and_any_row_flag() {
        let mut first = coordinator("R1", "P1", "A", "1", "Sem informação");
        first.network = None;
        let mut second = coordinator("R1", "P1", "A", "1", "Ana");
        second.network = cell("Municipal");
        let coord = coordinators(vec![first, second]);
        let totals = totals(&[("R1", "P1", "A"), ("R1", "P1", "B")]);

        let table = school_details(&coord, &totals, "R1", "P1").unwrap();
        let row = &table.rows[0];
        assert_eq!(row.status, CoordinatorStatus::NoCoordinator);
        assert!(row.has_coordinator);
        assert_eq!(row.network.as_deref(), Some("Municipal"));

        let unmatched = &table.rows[1];
        assert!(!unmatched.has_coordinator);
        assert_eq!(unmatched.network, None);
    }

    #[test]
    fn details_always_lead_with_region_and_hub() {
        let (coord, totals) = sample();
        let table = school_details(&coord, &totals, "R1", "P1").unwrap();
        assert_eq!(
            table.columns,
            vec![
                DetailColumn::Region,
                DetailColumn::Hub,
                DetailColumn::School,
                DetailColumn::Identifier,
                DetailColumn::Coordinator,
                DetailColumn::Status,
            ]
        );
        assert_eq!(table.rows[0].value(DetailColumn::Region), "R1");
        assert_eq!(table.rows[0].value(DetailColumn::Hub), "P1");
    }
}
