//! Locating the case-configuration and component-definition sections of a case file.
use crate::sheet::{Grid, Row, cell_at};
use anyhow::{Result, bail, ensure};

/// Sentinel keywords marking the case configuration section
const CASE_DATA: (&str, &str) = ("case_data", "end_case_data");

/// Sentinel keywords marking the component section. Older case files use `tech_data`.
const COMPONENT_DATA: [(&str, &str); 2] = [
    ("component_data", "end_component_data"),
    ("tech_data", "end_tech_data"),
];

/// The two sections of a case file
#[derive(Debug, PartialEq)]
pub struct Sections<'a> {
    /// Rows strictly between `CASE_DATA` and `END_CASE_DATA`
    pub case_data: &'a [Row],
    /// Rows strictly between `COMPONENT_DATA` and `END_COMPONENT_DATA`, header row first
    pub component_data: &'a [Row],
}

/// Find the index of the first row whose first cell matches `keyword`.
///
/// The comparison ignores case and surrounding whitespace, but otherwise the cell must equal the
/// keyword exactly. Returns `None` if no row matches.
pub fn find_keyword_row(rows: &[Row], keyword: &str) -> Option<usize> {
    rows.iter().position(|row| {
        cell_at(row, 0)
            .as_text()
            .is_some_and(|text| text.trim().eq_ignore_ascii_case(keyword))
    })
}

/// Get the rows strictly between the `begin` and `end` sentinels.
///
/// Returns `Ok(None)` if the `begin` sentinel is absent.
fn find_section<'a>(rows: &'a [Row], (begin, end): (&str, &str)) -> Result<Option<&'a [Row]>> {
    let Some(start) = find_keyword_row(rows, begin) else {
        return Ok(None);
    };
    let Some(len) = find_keyword_row(&rows[start + 1..], end) else {
        bail!(
            "Found {} row but no matching {} row after it",
            begin.to_uppercase(),
            end.to_uppercase()
        );
    };

    Ok(Some(&rows[start + 1..start + 1 + len]))
}

/// Split a case file into its configuration and component sections.
///
/// A missing sentinel is an error.
pub fn extract_sections(grid: &Grid) -> Result<Sections<'_>> {
    let rows = grid.rows();
    let Some(case_data) = find_section(rows, CASE_DATA)? else {
        bail!("Missing {} row", CASE_DATA.0.to_uppercase());
    };

    let mut component_data = None;
    for sentinels in COMPONENT_DATA {
        if let Some(section) = find_section(rows, sentinels)? {
            component_data = Some(section);
            break;
        }
    }
    let Some(component_data) = component_data else {
        bail!(
            "Missing {} (or {}) row",
            COMPONENT_DATA[0].0.to_uppercase(),
            COMPONENT_DATA[1].0.to_uppercase()
        );
    };
    ensure!(!case_data.is_empty(), "The case data section is empty");

    Ok(Sections {
        case_data,
        component_data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sheet::Cell;
    use rstest::rstest;

    fn text_row(values: &[&str]) -> Row {
        values.iter().map(|s| Cell::from_text(s)).collect()
    }

    fn grid(begin_case: &str, end_case: &str, begin_comp: &str, end_comp: &str) -> Grid {
        Grid::new(vec![
            text_row(&["a title"]),
            text_row(&[begin_case]),
            text_row(&["solver", "highs"]),
            text_row(&["delta_t", "1"]),
            text_row(&[end_case]),
            text_row(&[]),
            text_row(&[begin_comp]),
            text_row(&["component", "name", "bus"]),
            text_row(&["Bus", "electricity"]),
            text_row(&[end_comp]),
        ])
    }

    #[rstest]
    #[case("CASE_DATA", "END_CASE_DATA", "COMPONENT_DATA", "END_COMPONENT_DATA")]
    #[case("case_data", "end_case_data", "component_data", "end_component_data")]
    #[case(" Case_Data ", "End_Case_Data", "TECH_DATA", "end_TECH_data")]
    fn extract_sections_ignores_case(
        #[case] begin_case: &str,
        #[case] end_case: &str,
        #[case] begin_comp: &str,
        #[case] end_comp: &str,
    ) {
        let grid = grid(begin_case, end_case, begin_comp, end_comp);
        let rows = grid.rows();
        let sections = extract_sections(&grid).unwrap();
        assert_eq!(sections.case_data, &rows[2..4]);
        assert_eq!(sections.component_data, &rows[6..8]);
    }

    #[test]
    fn find_keyword_row_exact_match_only() {
        let rows = vec![
            text_row(&["old case_data marker"]),
            text_row(&["CASE_DATA"]),
        ];
        assert_eq!(find_keyword_row(&rows, "case_data"), Some(1));
        assert_eq!(find_keyword_row(&rows, "component_data"), None);
    }

    #[rstest]
    #[case("CASE_DATA", "END_CASE", "COMPONENT_DATA", "END_COMPONENT_DATA")]
    #[case("CASE", "END_CASE_DATA", "COMPONENT_DATA", "END_COMPONENT_DATA")]
    #[case("CASE_DATA", "END_CASE_DATA", "COMPONENTS", "END_COMPONENT_DATA")]
    #[case("CASE_DATA", "END_CASE_DATA", "COMPONENT_DATA", "END")]
    fn extract_sections_missing_sentinel(
        #[case] begin_case: &str,
        #[case] end_case: &str,
        #[case] begin_comp: &str,
        #[case] end_comp: &str,
    ) {
        assert!(extract_sections(&grid(begin_case, end_case, begin_comp, end_comp)).is_err());
    }
}
