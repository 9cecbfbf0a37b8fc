//! Facility directory: who manages each facility and how to reach them
//!
//! The directory workbook has one header row. Columns are recognised by the
//! words their titles contain, so both Arabic and English titles work.

use crate::cell::RawTable;
use crate::error::PipelineError;
use crate::header::single_row_header;
use serde::Serialize;

const FACILITY_WORDS: &[&str] = &["منشأة", "facility"];
const MANAGER_WORDS: &[&str] = &["مدير", "اسم", "manager", "name"];
const PHONE_WORDS: &[&str] = &["تليفون", "هاتف", "phone", "mobile"];
const KIND_WORDS: &[&str] = &["نوع", "type"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Facility {
    pub name: String,
    pub manager: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FacilityDirectory {
    pub facilities: Vec<Facility>,
}

/// First column whose title contains one of `words`, skipping `exclude`
fn find_column(header: &[String], words: &[&str], exclude: &[usize]) -> Option<usize> {
    header.iter().enumerate().position(|(j, title)| {
        let title = title.to_lowercase();
        !exclude.contains(&j) && words.iter().any(|w| title.contains(w))
    })
}

/// Phone numbers lose their leading zero when stored as numbers; put it back
pub fn normalize_phone(raw: &str) -> String {
    let phone = raw.trim();
    if phone.is_empty() || phone.starts_with('0') || phone.starts_with('+') {
        phone.to_string()
    } else {
        format!("0{}", phone)
    }
}

impl FacilityDirectory {
    pub fn from_raw(raw: &RawTable) -> Result<Self, PipelineError> {
        let header = single_row_header(raw.row(0));
        let missing = |what: &str| PipelineError::Malformed(format!("{}: no {} column", raw.name, what));

        let name_col = find_column(&header, FACILITY_WORDS, &[]).ok_or_else(|| missing("facility"))?;
        let manager_col = find_column(&header, MANAGER_WORDS, &[name_col]).ok_or_else(|| missing("manager"))?;
        let phone_col = find_column(&header, PHONE_WORDS, &[name_col, manager_col]).ok_or_else(|| missing("phone"))?;
        let kind_col = find_column(&header, KIND_WORDS, &[name_col, manager_col, phone_col]);

        let text = |row: &[crate::cell::Cell], j: usize| row.get(j).map(|c| c.as_text().trim().to_string()).unwrap_or_default();

        let facilities: Vec<Facility> = raw
            .rows
            .iter()
            .skip(1)
            .filter_map(|row| {
                let name = text(row, name_col);
                if name.is_empty() {
                    return None;
                }
                Some(Facility {
                    name,
                    manager: text(row, manager_col),
                    phone: normalize_phone(&text(row, phone_col)),
                    kind: kind_col.map(|j| text(row, j)).filter(|k| !k.is_empty()),
                })
            })
            .collect();

        tracing::debug!(sheet = %raw.name, facilities = facilities.len(), "facility directory loaded");
        Ok(Self { facilities })
    }

    /// Exact name first, then a case-insensitive substring match
    pub fn find(&self, name: &str) -> Option<&Facility> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        self.facilities.iter().find(|f| f.name == name).or_else(|| {
            let needle = name.to_lowercase();
            self.facilities.iter().find(|f| f.name.to_lowercase().contains(&needle))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.facilities.iter().map(|f| f.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::Cell;

    fn directory() -> RawTable {
        RawTable::new(
            "Facilities",
            vec![
                vec!["اسم المنشأة".into(), "مدير المنشأة".into(), "رقم التليفون".into(), "نوع المنشأة".into()],
                vec!["وحدة طب الأسرة بالقرية".into(), "د. سامي".into(), Cell::Number(1001234567.0), "وحدة".into()],
                vec![Cell::Empty, "nobody".into(), "0100".into(), Cell::Empty],
                vec!["North Clinic".into(), "Dr. Lee".into(), "0223456789".into(), Cell::Empty],
            ],
        )
    }

    #[test]
    fn test_columns_found_by_title_words() {
        let dir = FacilityDirectory::from_raw(&directory()).unwrap();
        assert_eq!(dir.names(), vec!["وحدة طب الأسرة بالقرية", "North Clinic"]);

        let unit = &dir.facilities[0];
        assert_eq!(unit.manager, "د. سامي");
        assert_eq!(unit.phone, "01001234567");
        assert_eq!(unit.kind.as_deref(), Some("وحدة"));
        assert_eq!(dir.facilities[1].kind, None);
    }

    #[test]
    fn test_missing_required_column() {
        let raw = RawTable::from_text_rows("Facilities", &[vec!["Facility", "Manager"], vec!["A", "B"]]);
        assert!(matches!(
            FacilityDirectory::from_raw(&raw),
            Err(PipelineError::Malformed(m)) if m.contains("phone")
        ));
    }

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone(" 1001234567 "), "01001234567");
        assert_eq!(normalize_phone("0223456789"), "0223456789");
        assert_eq!(normalize_phone("+20100"), "+20100");
        assert_eq!(normalize_phone(""), "");
    }

    #[test]
    fn test_find() {
        let dir = FacilityDirectory::from_raw(&directory()).unwrap();
        assert_eq!(dir.find("North Clinic").unwrap().manager, "Dr. Lee");
        assert_eq!(dir.find("north").unwrap().phone, "0223456789");
        assert_eq!(dir.find("بالقرية").unwrap().manager, "د. سامي");
        assert!(dir.find("South").is_none());
        assert!(dir.find("  ").is_none());
    }
}
