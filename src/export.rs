// CSV/JSON export and console previews.
//
// Every CSV field is quoted, whatever its type, with embedded quotes doubled.
// Lines are separated by `\n` and the text has no trailing newline.
use crate::error::{DashboardError, DashboardResult};
use crate::types::{
    DeliveryRecord, DeliveryRow, DepartmentRow, DepartmentSummary, PeriodRow, PeriodSummary,
    RankingEntry, RankingRow,
};
use chrono::NaiveDate;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};

pub const CSV_CONTENT_TYPE: &str = "text/csv;charset=utf-8";

/// A typed row with a fixed column order.
pub trait ExportRow {
    fn headers() -> &'static [&'static str];
    fn fields(&self) -> Vec<String>;
}

pub fn to_csv<S: AsRef<str>>(headers: &[&str], rows: &[Vec<S>]) -> DashboardResult<String> {
    let mut wtr = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .flexible(true)
        .from_writer(Vec::new());
    wtr.write_record(headers)?;
    for row in rows {
        wtr.write_record(row.iter().map(|f| f.as_ref()))?;
    }
    wtr.flush()?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| DashboardError::Export(e.to_string()))?;
    let mut text = String::from_utf8(bytes).map_err(|e| DashboardError::Export(e.to_string()))?;
    if text.ends_with('\n') {
        text.pop();
    }
    Ok(text)
}

pub fn export_rows<T: ExportRow>(rows: &[T]) -> DashboardResult<String> {
    let fields: Vec<Vec<String>> = rows.iter().map(ExportRow::fields).collect();
    to_csv(T::headers(), &fields)
}

/// `<report-type>_<YYYY-MM-DD>.csv`
pub fn export_filename(report_type: &str, date: NaiveDate) -> String {
    format!("{}_{}.csv", report_type, date.format("%Y-%m-%d"))
}

pub fn write_export(
    dir: &Path,
    report_type: &str,
    date: NaiveDate,
    text: &str,
) -> DashboardResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(report_type, date));
    std::fs::write(&path, text)?;
    tracing::info!(path = %path.display(), bytes = text.len(), "export written");
    Ok(path)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> DashboardResult<()> {
    let s = serde_json::to_string_pretty(value).map_err(|e| DashboardError::Export(e.to_string()))?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().cloned().take(max_rows).collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

fn pct2(n: f64) -> String {
    format!("{:.2}", n)
}

pub fn delivery_rows<'a, I>(records: I) -> Vec<DeliveryRow>
where
    I: IntoIterator<Item = &'a DeliveryRecord>,
{
    records
        .into_iter()
        .map(|r| DeliveryRow {
            department: r.department_code().unwrap_or_default().to_string(),
            code: r.code.clone().unwrap_or_default(),
            description: r.description.clone().unwrap_or_default(),
            status: r.status.as_str().to_string(),
            progress: r.pct().to_string(),
            start_date: r.start_date.map(|d| d.to_string()).unwrap_or_default(),
            end_date: r.end_date.map(|d| d.to_string()).unwrap_or_default(),
            interlocutor: r.interlocutor.clone().unwrap_or_default(),
        })
        .collect()
}

pub fn ranking_rows(entries: &[RankingEntry]) -> Vec<RankingRow> {
    entries
        .iter()
        .enumerate()
        .map(|(idx, e)| RankingRow {
            rank: idx + 1,
            code: e.code.clone(),
            name: e.name.clone(),
            total: e.total,
            completed: e.completed,
            completion_rate: pct2(e.completion_rate),
            average_pct: pct2(e.average_pct),
            score: pct2(e.score),
        })
        .collect()
}

pub fn department_rows(summaries: &[DepartmentSummary]) -> Vec<DepartmentRow> {
    summaries
        .iter()
        .map(|s| DepartmentRow {
            code: s.code.clone(),
            total: s.total,
            completed: s.completed,
            delayed: s.delayed,
            in_progress: s.in_progress,
            average_pct: pct2(s.average_pct),
            completion_rate: pct2(s.completion_rate),
            delay_rate: pct2(s.delay_rate),
        })
        .collect()
}

pub fn period_rows(periods: &[PeriodSummary]) -> Vec<PeriodRow> {
    periods
        .iter()
        .map(|p| PeriodRow {
            label: p.label.clone(),
            total: p.total,
            completed: p.completed,
            average_pct: pct2(p.average_pct),
            completion_rate: pct2(p.completion_rate),
        })
        .collect()
}

impl ExportRow for DeliveryRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Secretaria",
            "Código",
            "Entrega",
            "Status",
            "Progresso (%)",
            "Data Início",
            "Data Término",
            "Interlocutor",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.department.clone(),
            self.code.clone(),
            self.description.clone(),
            self.status.clone(),
            self.progress.clone(),
            self.start_date.clone(),
            self.end_date.clone(),
            self.interlocutor.clone(),
        ]
    }
}

impl ExportRow for RankingRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Posição",
            "Secretaria",
            "Nome Completo",
            "Total Entregas",
            "Concluídas",
            "Taxa Conclusão (%)",
            "Percentual Médio (%)",
            "Pontuação",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.rank.to_string(),
            self.code.clone(),
            self.name.clone(),
            self.total.to_string(),
            self.completed.to_string(),
            self.completion_rate.clone(),
            self.average_pct.clone(),
            self.score.clone(),
        ]
    }
}

impl ExportRow for DepartmentRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Secretaria",
            "Total",
            "Concluídas",
            "Atrasadas",
            "Em Andamento",
            "Percentual Médio (%)",
            "Taxa Conclusão (%)",
            "Taxa Atraso (%)",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.code.clone(),
            self.total.to_string(),
            self.completed.to_string(),
            self.delayed.to_string(),
            self.in_progress.to_string(),
            self.average_pct.clone(),
            self.completion_rate.clone(),
            self.delay_rate.clone(),
        ]
    }
}

impl ExportRow for PeriodRow {
    fn headers() -> &'static [&'static str] {
        &[
            "Período",
            "Total",
            "Concluídas",
            "Percentual Médio (%)",
            "Taxa Conclusão (%)",
        ]
    }

    fn fields(&self) -> Vec<String> {
        vec![
            self.label.clone(),
            self.total.to_string(),
            self.completed.to_string(),
            self.average_pct.clone(),
            self.completion_rate.clone(),
        ]
    }
}
