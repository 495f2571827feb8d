// Detailed delivery table: free-text search, column sort and pagination.
use crate::types::DeliveryRecord;
use std::cmp::Ordering;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Department,
    Code,
    Description,
    Status,
    Progress,
    StartDate,
    EndDate,
    Interlocutor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone)]
pub struct TableView {
    pub search: String,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
    pub page: usize,
    pub page_size: usize,
}

impl Default for TableView {
    fn default() -> Self {
        Self {
            search: String::new(),
            sort_field: SortField::Code,
            sort_direction: SortDirection::Asc,
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub struct Page<'a> {
    pub rows: Vec<&'a DeliveryRecord>,
    pub page: usize,
    pub total_pages: usize,
    pub total_rows: usize,
}

impl TableView {
    /// Choosing the active column again flips the direction; a new column
    /// starts ascending.
    pub fn sort_by(&mut self, field: SortField) {
        if self.sort_field == field {
            self.sort_direction = match self.sort_direction {
                SortDirection::Asc => SortDirection::Desc,
                SortDirection::Desc => SortDirection::Asc,
            };
        } else {
            self.sort_field = field;
            self.sort_direction = SortDirection::Asc;
        }
    }

    pub fn set_search(&mut self, term: &str) {
        self.search = term.trim().to_string();
        self.page = 1;
    }

    /// Matching rows in display order.
    pub fn rows<'a>(&self, records: &'a [DeliveryRecord]) -> Vec<&'a DeliveryRecord> {
        let needle = self.search.to_lowercase();
        let mut rows: Vec<&DeliveryRecord> = records
            .iter()
            .filter(|r| needle.is_empty() || matches_search(r, &needle))
            .collect();
        rows.sort_by(|a, b| {
            let ord = compare(a, b, self.sort_field);
            match self.sort_direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            }
        });
        rows
    }

    pub fn page<'a>(&self, records: &'a [DeliveryRecord]) -> Page<'a> {
        let rows = self.rows(records);
        let size = self.page_size.max(1);
        let total_rows = rows.len();
        let total_pages = total_rows.div_ceil(size);
        let page = self.page.clamp(1, total_pages.max(1));
        let rows = rows.into_iter().skip((page - 1) * size).take(size).collect();
        Page {
            rows,
            page,
            total_pages,
            total_rows,
        }
    }
}

fn matches_search(r: &DeliveryRecord, needle: &str) -> bool {
    [
        r.code.as_deref(),
        r.description.as_deref(),
        r.department_code(),
        r.interlocutor.as_deref(),
    ]
    .into_iter()
    .flatten()
    .any(|field| field.to_lowercase().contains(needle))
}

fn compare(a: &DeliveryRecord, b: &DeliveryRecord, field: SortField) -> Ordering {
    match field {
        SortField::Department => a
            .department_code()
            .unwrap_or("")
            .cmp(b.department_code().unwrap_or("")),
        SortField::Code => a.code.cmp(&b.code),
        SortField::Description => a.description.cmp(&b.description),
        SortField::Status => a.status.as_str().cmp(b.status.as_str()),
        SortField::Progress => a.pct().partial_cmp(&b.pct()).unwrap_or(Ordering::Equal),
        SortField::StartDate => a.start_date.cmp(&b.start_date),
        SortField::EndDate => a.end_date.cmp(&b.end_date),
        SortField::Interlocutor => a.interlocutor.cmp(&b.interlocutor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::record;
    use crate::status::Status;

    fn sample() -> Vec<DeliveryRecord> {
        let mut out = Vec::new();
        for (i, dept) in ["SESAU", "SEMED", "SESAU", "SISEP"].iter().enumerate() {
            let pct = Some(i as f64 * 10.0);
            let mut r = record(&format!("{i}"), Some(*dept), Status::InProgress, pct, 2025, 1);
            r.interlocutor = Some(if i == 3 { "Joana Prado".into() } else { "Carlos".into() });
            out.push(r);
        }
        out
    }

    #[test]
    fn search_is_case_insensitive_across_columns() {
        let records = sample();
        let mut view = TableView::default();
        view.set_search("sesau");
        assert_eq!(view.rows(&records).len(), 2);
        view.set_search("JOANA");
        assert_eq!(view.rows(&records)[0].id, "3");
        view.set_search("e-1");
        assert_eq!(view.rows(&records)[0].id, "1");
    }

    #[test]
    fn sorting_same_column_toggles_direction() {
        let records = sample();
        let mut view = TableView::default();
        view.sort_by(SortField::Progress);
        assert_eq!(view.sort_direction, SortDirection::Asc);
        assert_eq!(view.rows(&records)[0].id, "0");
        view.sort_by(SortField::Progress);
        assert_eq!(view.sort_direction, SortDirection::Desc);
        assert_eq!(view.rows(&records)[0].id, "3");
        view.sort_by(SortField::Department);
        assert_eq!(view.sort_direction, SortDirection::Asc);
        assert_eq!(view.rows(&records)[0].department_code(), Some("SEMED"));
    }

    #[test]
    fn pagination_clamps_page_index() {
        let records: Vec<DeliveryRecord> = (0..23)
            .map(|i| record(&format!("{i:02}"), Some("A"), Status::Completed, None, 2025, 1))
            .collect();
        let mut view = TableView::default();
        let first = view.page(&records);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.rows.len(), 10);

        view.page = 99;
        let last = view.page(&records);
        assert_eq!(last.page, 3);
        assert_eq!(last.rows.len(), 3);
        assert_eq!(last.total_rows, 23);
    }

    #[test]
    fn empty_table_has_one_empty_page() {
        let view = TableView::default();
        let page = view.page(&[]);
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 0);
        assert!(page.rows.is_empty());
    }
}
