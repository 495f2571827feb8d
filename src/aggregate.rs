//! Client-side aggregation of delivery records.
//!
//! Every derived view the dashboard and the comparative report show comes
//! out of [`Aggregator::run`]: the overview cards, the status pie, the
//! per-department comparison, the monthly evolution and the ranking.
//! All functions here are pure.

use crate::status::Status;
use crate::types::{
    DeliveryRecord, DepartmentSummary, Overview, Period, PeriodSummary, RankingEntry, StatusSlice,
};
use crate::util::{mean, period_label, rate, round2};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

pub const COMPLETION_WEIGHT: f64 = 0.6;
pub const EXECUTION_WEIGHT: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DepartmentOrder {
    /// Order in which departments first appear in the record set.
    #[default]
    FirstSeen,
    /// Highest average execution percentage first (stable on ties).
    AverageDesc,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AggregateOptions {
    pub department_order: DepartmentOrder,
}

#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub overview: Overview,
    pub status_distribution: Vec<StatusSlice>,
    pub departments: Vec<DepartmentSummary>,
    pub periods: Vec<PeriodSummary>,
    pub ranking: Vec<RankingEntry>,
    /// Records left out of the period series because their month is not 1..=12.
    pub invalid_periods: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct Aggregator {
    options: AggregateOptions,
}

impl Aggregator {
    pub fn new(options: AggregateOptions) -> Self {
        Self { options }
    }

    pub fn run(&self, records: &[DeliveryRecord]) -> AggregateReport {
        let overview = overview(records);
        let status_distribution = status_distribution(&overview);
        let groups = group_by_department(records);
        let ranking = rank_groups(&groups);
        let departments = summarize_groups(&groups, self.options.department_order);
        let (periods, invalid_periods) = summarize_periods_counted(records);
        AggregateReport {
            overview,
            status_distribution,
            departments,
            periods,
            ranking,
            invalid_periods,
        }
    }
}

/// Running counts for one bucket of records.
#[derive(Debug, Clone, Copy, Default)]
struct Tally {
    total: usize,
    completed: usize,
    in_progress: usize,
    delayed: usize,
    not_started: usize,
    paused: usize,
    pct_sum: f64,
}

impl Tally {
    fn add(&mut self, record: &DeliveryRecord) {
        self.total += 1;
        self.pct_sum += record.pct();
        match record.status {
            Status::Completed => self.completed += 1,
            Status::InProgress => self.in_progress += 1,
            Status::Delayed => self.delayed += 1,
            Status::NotStarted => self.not_started += 1,
            Status::Paused => self.paused += 1,
        }
    }

    fn average_pct(&self) -> f64 {
        mean(self.pct_sum, self.total)
    }

    fn completion_rate(&self) -> f64 {
        rate(self.completed, self.total)
    }

    fn delay_rate(&self) -> f64 {
        rate(self.delayed, self.total)
    }

    fn score(&self) -> f64 {
        self.completion_rate() * COMPLETION_WEIGHT + self.average_pct() * EXECUTION_WEIGHT
    }
}

struct DepartmentGroup {
    code: String,
    name: String,
    color: Option<String>,
    tally: Tally,
}

/// Group by department code, keeping first-seen order. Records without a
/// resolvable code are skipped.
fn group_by_department(records: &[DeliveryRecord]) -> Vec<DepartmentGroup> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<DepartmentGroup> = Vec::new();
    for r in records {
        let Some(code) = r.department_code() else {
            continue;
        };
        let slot = *index.entry(code).or_insert_with(|| {
            let dept = r.department.as_ref();
            groups.push(DepartmentGroup {
                code: code.to_string(),
                name: dept.and_then(|d| d.name.clone()).unwrap_or_default(),
                color: dept.and_then(|d| d.primary_color.clone()),
                tally: Tally::default(),
            });
            groups.len() - 1
        });
        groups[slot].tally.add(r);
    }
    groups
}

fn summarize_groups(groups: &[DepartmentGroup], order: DepartmentOrder) -> Vec<DepartmentSummary> {
    let mut ordered: Vec<&DepartmentGroup> = groups.iter().collect();
    if order == DepartmentOrder::AverageDesc {
        ordered.sort_by(|a, b| desc(a.tally.average_pct(), b.tally.average_pct()));
    }
    ordered
        .into_iter()
        .map(|g| DepartmentSummary {
            code: g.code.clone(),
            name: g.name.clone(),
            color: g.color.clone(),
            total: g.tally.total,
            completed: g.tally.completed,
            delayed: g.tally.delayed,
            in_progress: g.tally.in_progress,
            not_started: g.tally.not_started,
            pct_sum: g.tally.pct_sum,
            average_pct: round2(g.tally.average_pct()),
            completion_rate: round2(g.tally.completion_rate()),
            delay_rate: round2(g.tally.delay_rate()),
        })
        .collect()
}

fn rank_groups(groups: &[DepartmentGroup]) -> Vec<RankingEntry> {
    let mut scored: Vec<(f64, RankingEntry)> = groups
        .iter()
        .map(|g| {
            let score = g.tally.score();
            let entry = RankingEntry {
                code: g.code.clone(),
                name: g.name.clone(),
                color: g.color.clone(),
                total: g.tally.total,
                completed: g.tally.completed,
                completion_rate: round2(g.tally.completion_rate()),
                average_pct: round2(g.tally.average_pct()),
                score: round2(score),
            };
            (score, entry)
        })
        .collect();
    // `sort_by` is stable: equal scores keep first-seen order.
    scored.sort_by(|a, b| desc(a.0, b.0));
    scored.into_iter().map(|(_, entry)| entry).collect()
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Dashboard cards over every record, department or not.
pub fn overview(records: &[DeliveryRecord]) -> Overview {
    let mut tally = Tally::default();
    for r in records {
        tally.add(r);
    }
    Overview {
        total: tally.total,
        completed: tally.completed,
        in_progress: tally.in_progress,
        delayed: tally.delayed,
        not_started: tally.not_started,
        paused: tally.paused,
        average_pct: round2(tally.average_pct()),
        completion_rate: round2(tally.completion_rate()),
    }
}

/// Status pie slices; zero-count statuses are left out.
pub fn status_distribution(overview: &Overview) -> Vec<StatusSlice> {
    [
        (Status::Completed, overview.completed),
        (Status::InProgress, overview.in_progress),
        (Status::Delayed, overview.delayed),
        (Status::NotStarted, overview.not_started),
    ]
    .into_iter()
    .filter(|(_, value)| *value > 0)
    .map(|(status, value)| {
        let style = status.style();
        StatusSlice {
            status,
            name: style.chart_label,
            value,
            color: style.color,
        }
    })
    .collect()
}

pub fn summarize_departments(
    records: &[DeliveryRecord],
    order: DepartmentOrder,
) -> Vec<DepartmentSummary> {
    summarize_groups(&group_by_department(records), order)
}

pub fn rank_departments(records: &[DeliveryRecord]) -> Vec<RankingEntry> {
    rank_groups(&group_by_department(records))
}

/// Monthly series, ascending by (year, month).
pub fn summarize_periods(records: &[DeliveryRecord]) -> Vec<PeriodSummary> {
    summarize_periods_counted(records).0
}

fn summarize_periods_counted(records: &[DeliveryRecord]) -> (Vec<PeriodSummary>, usize) {
    let mut buckets: BTreeMap<Period, Tally> = BTreeMap::new();
    let mut invalid = 0usize;
    for r in records {
        if !(1..=12).contains(&r.month) {
            invalid += 1;
            continue;
        }
        buckets.entry(r.period()).or_default().add(r);
    }
    if invalid > 0 {
        tracing::warn!(invalid, "records with a month outside 1..=12 left out of the period series");
    }

    let periods = buckets
        .into_iter()
        .filter_map(|(period, tally)| {
            let label = period_label(period.year, period.month).ok()?;
            Some(PeriodSummary {
                period,
                label,
                total: tally.total,
                completed: tally.completed,
                delayed: tally.delayed,
                in_progress: tally.in_progress,
                not_started: tally.not_started,
                pct_sum: tally.pct_sum,
                average_pct: round2(tally.average_pct()),
                completion_rate: round2(tally.completion_rate()),
                delay_rate: round2(tally.delay_rate()),
            })
        })
        .collect();
    (periods, invalid)
}
