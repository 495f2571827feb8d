// Filter selections and the query description sent to the data service.
//
// One filter model serves both the dashboard (membership sets) and the
// comparative report (start/end period). An empty selection set means
// "no filter" and produces no predicate at all.
use crate::error::{DashboardError, DashboardResult};
use crate::status::Status;
use crate::types::{DeliveryRecord, Period};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    DepartmentId,
    Status,
    Year,
    Month,
}

impl Field {
    pub fn column(self) -> &'static str {
        match self {
            Field::DepartmentId => "secretaria_id",
            Field::Status => "status",
            Field::Year => "ano_referencia",
            Field::Month => "mes_referencia",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq { field: Field, value: String },
    In { field: Field, values: Vec<String> },
    Gte { field: Field, value: String },
    Lte { field: Field, value: String },
}

impl Predicate {
    fn membership(field: Field, mut values: Vec<String>) -> Predicate {
        if values.len() == 1 {
            let value = values.remove(0);
            Predicate::Eq { field, value }
        } else {
            Predicate::In { field, values }
        }
    }

    pub fn field(&self) -> Field {
        match self {
            Predicate::Eq { field, .. }
            | Predicate::In { field, .. }
            | Predicate::Gte { field, .. }
            | Predicate::Lte { field, .. } => *field,
        }
    }

    /// PostgREST `column=operator.value` pair.
    ///
    /// Only `in.(...)` list items are quoted; a scalar operand is taken
    /// verbatim by the server, quotes included.
    fn to_pair(&self) -> (String, String) {
        let column = self.field().column().to_string();
        let value = match self {
            Predicate::Eq { value, .. } => format!("eq.{value}"),
            Predicate::In { values, .. } => {
                let list: Vec<String> = values.iter().map(|v| quote_value(v)).collect();
                format!("in.({})", list.join(","))
            }
            Predicate::Gte { value, .. } => format!("gte.{value}"),
            Predicate::Lte { value, .. } => format!("lte.{value}"),
        };
        (column, value)
    }
}

/// Quote a list item when it contains characters PostgREST treats as syntax.
fn quote_value(value: &str) -> String {
    let reserved = |c: char| matches!(c, ',' | '.' | ':' | '(' | ')' | '"' | '\\') || c.is_whitespace();
    if value.chars().any(reserved) {
        format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        value.to_string()
    }
}

/// Immutable description of a delivery query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliveryQuery {
    predicates: Vec<Predicate>,
}

impl DeliveryQuery {
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_unfiltered(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        self.predicates.iter().map(Predicate::to_pair).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRange {
    pub start: Period,
    pub end: Period,
}

impl PeriodRange {
    pub fn contains(&self, period: Period) -> bool {
        self.start <= period && period <= self.end
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    pub departments: BTreeSet<String>,
    pub statuses: BTreeSet<Status>,
    pub years: BTreeSet<i32>,
    pub months: BTreeSet<u32>,
    pub range: Option<PeriodRange>,
}

impl FilterState {
    /// The dashboard opens on the current year.
    pub fn for_year(year: i32) -> Self {
        let mut state = Self::default();
        state.years.insert(year);
        state
    }

    pub fn toggle_department(&mut self, id: &str) {
        toggle(&mut self.departments, id.to_string());
    }

    pub fn toggle_status(&mut self, status: Status) {
        toggle(&mut self.statuses, status);
    }

    pub fn toggle_year(&mut self, year: i32) {
        toggle(&mut self.years, year);
    }

    pub fn toggle_month(&mut self, month: u32) {
        toggle(&mut self.months, month);
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Build the query for the data service.
    ///
    /// The range is pushed down on the year column only; [`FilterState::matches`]
    /// applies it on the full (year, month) pair once rows are back.
    pub fn build_query(&self) -> DashboardResult<DeliveryQuery> {
        self.validate()?;

        let mut predicates = Vec::new();
        if !self.departments.is_empty() {
            predicates.push(Predicate::membership(
                Field::DepartmentId,
                self.departments.iter().cloned().collect(),
            ));
        }
        // Not-started also covers null and unrecognised labels, which no
        // server predicate can list; that selection is left to `matches`.
        if !self.statuses.is_empty() && !self.statuses.contains(&Status::NotStarted) {
            predicates.push(Predicate::membership(
                Field::Status,
                self.statuses
                    .iter()
                    .flat_map(|s| s.stored_labels().iter().map(|l| l.to_string()))
                    .collect(),
            ));
        }
        if !self.years.is_empty() {
            predicates.push(Predicate::membership(
                Field::Year,
                self.years.iter().map(i32::to_string).collect(),
            ));
        }
        if !self.months.is_empty() {
            predicates.push(Predicate::membership(
                Field::Month,
                self.months.iter().map(u32::to_string).collect(),
            ));
        }
        if let Some(range) = self.range {
            predicates.push(Predicate::Gte {
                field: Field::Year,
                value: range.start.year.to_string(),
            });
            predicates.push(Predicate::Lte {
                field: Field::Year,
                value: range.end.year.to_string(),
            });
        }
        Ok(DeliveryQuery { predicates })
    }

    /// Reject selections that could only ever match nothing.
    fn validate(&self) -> DashboardResult<()> {
        if let Some(bad) = self.months.iter().find(|m| !(1..=12).contains(*m)) {
            return Err(DashboardError::Validation(format!(
                "month {bad} is outside 1..=12"
            )));
        }
        let Some(range) = self.range else {
            return Ok(());
        };
        for p in [range.start, range.end] {
            if !(1..=12).contains(&p.month) {
                return Err(DashboardError::Validation(format!(
                    "period month {} is outside 1..=12",
                    p.month
                )));
            }
        }
        if range.start > range.end {
            return Err(DashboardError::Validation(format!(
                "period start {}/{} is after end {}/{}",
                range.start.month, range.start.year, range.end.month, range.end.year
            )));
        }
        if !self.years.is_empty()
            && !self
                .years
                .iter()
                .any(|y| (range.start.year..=range.end.year).contains(y))
        {
            return Err(DashboardError::Validation(
                "none of the selected years falls inside the period range".to_string(),
            ));
        }
        let years: Vec<i32> = if self.years.is_empty() {
            (range.start.year..=range.end.year).collect()
        } else {
            self.years.iter().copied().collect()
        };
        let months: Vec<u32> = if self.months.is_empty() {
            (1..=12).collect()
        } else {
            self.months.iter().copied().collect()
        };
        let reachable = years.iter().any(|&year| {
            months
                .iter()
                .any(|&month| range.contains(Period { year, month }))
        });
        if !reachable {
            return Err(DashboardError::Validation(
                "no selected year/month falls inside the period range".to_string(),
            ));
        }
        Ok(())
    }

    /// Apply the filters locally to a fetched record.
    pub fn matches(&self, record: &DeliveryRecord) -> bool {
        if !self.departments.is_empty()
            && !record
                .department_id
                .as_ref()
                .is_some_and(|id| self.departments.contains(id))
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&record.status) {
            return false;
        }
        if !self.years.is_empty() && !self.years.contains(&record.year) {
            return false;
        }
        if !self.months.is_empty() && !self.months.contains(&record.month) {
            return false;
        }
        match self.range {
            Some(range) => range.contains(record.period()),
            None => true,
        }
    }
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::tests::record;

    fn pairs(state: &FilterState) -> Vec<(String, String)> {
        state.build_query().unwrap().to_query_pairs()
    }

    #[test]
    fn empty_selection_produces_no_predicates() {
        let query = FilterState::default().build_query().unwrap();
        assert!(query.is_unfiltered());
    }

    #[test]
    fn single_value_becomes_equality() {
        let state = FilterState::for_year(2025);
        assert_eq!(
            pairs(&state),
            vec![("ano_referencia".to_string(), "eq.2025".to_string())]
        );
    }

    #[test]
    fn multiple_values_become_membership() {
        let mut state = FilterState::default();
        state.toggle_department("3");
        state.toggle_department("1");
        state.toggle_month(2);
        state.toggle_month(1);
        assert_eq!(
            pairs(&state),
            vec![
                ("secretaria_id".to_string(), "in.(1,3)".to_string()),
                ("mes_referencia".to_string(), "in.(1,2)".to_string()),
            ]
        );
    }

    #[test]
    fn status_labels_with_spaces_are_quoted_inside_lists() {
        let mut state = FilterState::default();
        state.toggle_status(Status::InProgress);
        state.toggle_status(Status::Delayed);
        assert_eq!(
            pairs(&state),
            vec![(
                "status".to_string(),
                "in.(\"EM ANDAMENTO\",ATRASADA)".to_string()
            )]
        );
    }

    #[test]
    fn single_status_with_space_is_sent_unquoted() {
        let mut state = FilterState::default();
        state.toggle_status(Status::InProgress);
        assert_eq!(
            pairs(&state),
            vec![("status".to_string(), "eq.EM ANDAMENTO".to_string())]
        );
    }

    #[test]
    fn completed_filter_includes_unaccented_label() {
        let mut state = FilterState::default();
        state.toggle_status(Status::Completed);
        assert_eq!(
            pairs(&state),
            vec![("status".to_string(), "in.(CONCLUÍDA,CONCLUIDA)".to_string())]
        );
    }

    #[test]
    fn not_started_selection_is_applied_locally() {
        let mut state = FilterState::default();
        state.toggle_status(Status::NotStarted);
        state.toggle_status(Status::Delayed);
        assert!(state.build_query().unwrap().is_unfiltered());

        let mut unknown = record("1", Some("A"), Status::NotStarted, None, 2025, 1);
        unknown.status = Status::parse("RASCUNHO");
        assert!(state.matches(&unknown));
        assert!(state.matches(&record("2", Some("A"), Status::Delayed, None, 2025, 1)));
        assert!(!state.matches(&record("3", Some("A"), Status::Completed, None, 2025, 1)));
    }

    #[test]
    fn toggling_twice_removes_the_value() {
        let mut state = FilterState::default();
        state.toggle_year(2024);
        state.toggle_year(2024);
        assert!(state.years.is_empty());
    }

    #[test]
    fn range_pushes_year_bounds() {
        let state = FilterState {
            range: Some(PeriodRange {
                start: Period { year: 2024, month: 11 },
                end: Period { year: 2025, month: 2 },
            }),
            ..FilterState::default()
        };
        assert_eq!(
            pairs(&state),
            vec![
                ("ano_referencia".to_string(), "gte.2024".to_string()),
                ("ano_referencia".to_string(), "lte.2025".to_string()),
            ]
        );
    }

    #[test]
    fn inverted_range_is_rejected() {
        let state = FilterState {
            range: Some(PeriodRange {
                start: Period { year: 2025, month: 5 },
                end: Period { year: 2025, month: 4 },
            }),
            ..FilterState::default()
        };
        assert!(matches!(state.build_query(), Err(DashboardError::Validation(_))));
    }

    #[test]
    fn invalid_month_is_rejected() {
        let mut state = FilterState::default();
        state.toggle_month(13);
        assert!(state.build_query().is_err());
    }

    #[test]
    fn disjoint_year_set_and_range_is_rejected() {
        let state = FilterState {
            years: [2023].into_iter().collect(),
            range: Some(PeriodRange {
                start: Period { year: 2024, month: 1 },
                end: Period { year: 2025, month: 12 },
            }),
            ..FilterState::default()
        };
        assert!(state.build_query().is_err());
    }

    #[test]
    fn month_set_outside_range_is_rejected() {
        let mut state = FilterState {
            range: Some(PeriodRange {
                start: Period { year: 2025, month: 2 },
                end: Period { year: 2025, month: 6 },
            }),
            ..FilterState::default()
        };
        state.toggle_month(9);
        assert!(matches!(state.build_query(), Err(DashboardError::Validation(_))));

        state.toggle_month(4);
        assert!(state.build_query().is_ok());
    }

    #[test]
    fn year_and_month_sets_must_meet_inside_range() {
        let mut state = FilterState {
            range: Some(PeriodRange {
                start: Period { year: 2024, month: 11 },
                end: Period { year: 2025, month: 2 },
            }),
            ..FilterState::default()
        };
        state.toggle_year(2024);
        state.toggle_month(3);
        assert!(state.build_query().is_err());

        state.toggle_month(12);
        assert!(state.build_query().is_ok());
    }

    #[test]
    fn matches_applies_range_on_year_and_month() {
        let state = FilterState {
            range: Some(PeriodRange {
                start: Period { year: 2024, month: 11 },
                end: Period { year: 2025, month: 2 },
            }),
            ..FilterState::default()
        };
        assert!(!state.matches(&record("1", Some("A"), Status::Completed, None, 2024, 10)));
        assert!(state.matches(&record("2", Some("A"), Status::Completed, None, 2024, 11)));
        assert!(state.matches(&record("3", Some("A"), Status::Completed, None, 2025, 2)));
        assert!(!state.matches(&record("4", Some("A"), Status::Completed, None, 2025, 3)));
    }

    #[test]
    fn matches_checks_membership_sets() {
        let mut state = FilterState::default();
        state.toggle_department("id-A");
        state.toggle_status(Status::Delayed);
        assert!(state.matches(&record("1", Some("A"), Status::Delayed, None, 2025, 1)));
        assert!(!state.matches(&record("2", Some("B"), Status::Delayed, None, 2025, 1)));
        assert!(!state.matches(&record("3", Some("A"), Status::Completed, None, 2025, 1)));
        assert!(!state.matches(&record("4", None, Status::Delayed, None, 2025, 1)));
    }

    #[test]
    fn quote_value_escapes_embedded_quotes() {
        assert_eq!(quote_value("plain"), "plain");
        assert_eq!(quote_value("a\"b"), "\"a\\\"b\"");
    }
}
