// Entry point and interactive CLI flow.
//
// The binary is a console front end for the SEPPE delivery dashboard:
// - Option [1] loads departments and deliveries with the current filters.
// - Option [2] computes the aggregates, exports CSV files and a JSON summary
//   and prints previews of each report.
// - Options [3]-[5] edit filters, browse the delivery table and import
//   monthly spreadsheets.
use chrono::{Datelike, Local, NaiveDate};
use seppe_dashboard::aggregate::{AggregateOptions, Aggregator, DepartmentOrder};
use seppe_dashboard::client::{DataService, SupabaseClient};
use seppe_dashboard::config::AppConfig;
use seppe_dashboard::filters::{FilterState, PeriodRange};
use seppe_dashboard::import::{run_batch, HttpImportService, ImportService};
use seppe_dashboard::session::{DashboardSession, FetchOutcome};
use seppe_dashboard::status::{ProgressBand, Status};
use seppe_dashboard::table::{SortField, TableView};
use seppe_dashboard::types::{DashboardSummary, DeliveryRow, Period};
use seppe_dashboard::upload::{SelectedFile, UploadBatch, UploadStatus, CLEAR_DELAY};
use seppe_dashboard::util::{format_int, format_number, parse_i32_safe, MONTH_NAMES};
use seppe_dashboard::{export, logging};
use std::io::{self, Write};
use std::path::PathBuf;

/// Everything the menu handlers work on. The service handles are built once
/// in `main` and passed in here.
struct App {
    config: AppConfig,
    data: Box<dyn DataService>,
    importer: Box<dyn ImportService>,
    session: DashboardSession,
    table: TableView,
    uploads: UploadBatch,
}

fn prompt(label: &str) -> String {
    print!("{label}");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Read a single line of input after printing the common "Enter choice:" prompt.
fn read_choice() -> String {
    prompt("Enter choice: ")
}

/// Parse `MM/YYYY` into a period.
fn parse_period(s: &str) -> Option<Period> {
    let (m, y) = s.split_once('/')?;
    let month = parse_i32_safe(Some(m))?;
    let year = parse_i32_safe(Some(y))?;
    if !(1..=12).contains(&month) {
        return None;
    }
    Some(Period {
        year,
        month: month as u32,
    })
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

impl App {
    async fn handle_load(&mut self) {
        match self.session.refresh(self.data.as_ref()).await {
            FetchOutcome::Applied { records } => {
                println!(
                    "Loaded {} entregas across {} secretarias.\n",
                    format_int(records),
                    format_int(self.session.departments().len())
                );
            }
            FetchOutcome::Stale => println!("A newer load is in progress.\n"),
            FetchOutcome::Failed => {
                println!("Error: could not load data; showing the previous state (see log).\n")
            }
        }
    }

    fn handle_generate_reports(&self) {
        if !self.session.has_data() {
            println!("Error: No data loaded. Please load the deliveries first (option 1).\n");
            return;
        }
        let records = self.session.records();
        let report = Aggregator::new(AggregateOptions {
            department_order: DepartmentOrder::AverageDesc,
        })
        .run(records);
        let date = today();
        let dir = &self.config.export_dir;

        let ov = &report.overview;
        println!("Overview");
        println!(
            "  Total: {} | Concluídas: {} | Em Andamento: {} | Atrasadas: {} | Não Iniciadas: {}",
            format_int(ov.total),
            format_int(ov.completed),
            format_int(ov.in_progress),
            format_int(ov.delayed),
            format_int(ov.not_started)
        );
        println!(
            "  Percentual médio: {}% | Taxa de conclusão: {}%",
            format_number(ov.average_pct, 2),
            format_number(ov.completion_rate, 2)
        );
        for slice in &report.status_distribution {
            println!("  {:<14} {:>6}  {}", slice.name, slice.value, slice.color);
        }
        if report.invalid_periods > 0 {
            println!(
                "  Note: {} entregas have an invalid reference month.",
                format_int(report.invalid_periods)
            );
        }
        println!();

        let exports = [
            (
                "comparativo_secretarias",
                export::export_rows(&export::department_rows(&report.departments)),
            ),
            (
                "evolucao_mensal",
                export::export_rows(&export::period_rows(&report.periods)),
            ),
            (
                "relatorio_comparativo",
                export::export_rows(&export::ranking_rows(&report.ranking)),
            ),
            (
                "entregas_seppe",
                export::export_rows(&export::delivery_rows(records)),
            ),
        ];
        for (name, text) in exports {
            match text.and_then(|t| export::write_export(dir, name, date, &t)) {
                Ok(path) => println!("Exported {}", path.display()),
                Err(e) => eprintln!("Write error: {}", e),
            }
        }
        println!();

        println!("Report 1: Department Comparison");
        export::preview_table_rows(&export::department_rows(&report.departments), 5);
        println!("Report 2: Monthly Evolution");
        export::preview_table_rows(&export::period_rows(&report.periods), 12);
        println!("Report 3: Department Ranking (60% conclusão + 40% execução)");
        export::preview_table_rows(&export::ranking_rows(&report.ranking), 5);

        let summary = DashboardSummary {
            generated_on: date,
            overview: report.overview.clone(),
            departments: report.departments.len(),
            periods: report.periods.len(),
            leader: report.ranking.first().map(|r| r.code.clone()),
        };
        if let Err(e) = export::write_json(&dir.join("resumo.json"), &summary) {
            eprintln!("Write error: {}", e);
        }
    }

    fn print_filters(&self) {
        let f = self.session.filters();
        let codes: Vec<&str> = self
            .session
            .departments()
            .iter()
            .filter(|d| f.departments.contains(&d.id))
            .map(|d| d.code.as_str())
            .collect();
        let statuses: Vec<&str> = f.statuses.iter().map(|s| s.as_str()).collect();
        println!("Current filters:");
        println!("  Secretarias: {:?}", codes);
        println!("  Status: {:?}", statuses);
        println!("  Anos: {:?}", f.years);
        println!("  Meses: {:?}", f.months);
        match f.range {
            Some(r) => println!(
                "  Período: {:02}/{} - {:02}/{}",
                r.start.month, r.start.year, r.end.month, r.end.year
            ),
            None => println!("  Período: (todos)"),
        }
        println!();
    }

    async fn handle_filters(&mut self) {
        loop {
            self.print_filters();
            println!("[1] Toggle secretaria  [2] Toggle status  [3] Toggle year  [4] Toggle month");
            println!("[5] Set period range   [6] Clear range    [7] Clear all    [0] Apply and back\n");
            match read_choice().as_str() {
                "1" => {
                    let code = prompt("Secretaria code: ").to_uppercase();
                    let id = self
                        .session
                        .departments()
                        .iter()
                        .find(|d| d.code.eq_ignore_ascii_case(&code))
                        .map(|d| d.id.clone());
                    match id {
                        Some(id) => self.session.filters_mut().toggle_department(&id),
                        None => println!("Unknown secretaria {code}. Load data first (option 1)."),
                    }
                }
                "2" => {
                    for (i, s) in Status::ALL.iter().enumerate() {
                        println!("[{}] {}", i + 1, s);
                    }
                    match prompt("Status: ").parse::<usize>() {
                        Ok(n) if (1..=Status::ALL.len()).contains(&n) => {
                            self.session.filters_mut().toggle_status(Status::ALL[n - 1])
                        }
                        _ => println!("Invalid status."),
                    }
                }
                "3" => match parse_i32_safe(Some(&prompt("Year: "))) {
                    Some(y) => self.session.filters_mut().toggle_year(y),
                    None => println!("Invalid year."),
                },
                "4" => match parse_i32_safe(Some(&prompt("Month (1-12): "))) {
                    Some(m) if (1..=12).contains(&m) => {
                        self.session.filters_mut().toggle_month(m as u32)
                    }
                    _ => println!("Invalid month."),
                },
                "5" => {
                    let start = parse_period(&prompt("Start (MM/YYYY): "));
                    let end = parse_period(&prompt("End (MM/YYYY): "));
                    match (start, end) {
                        (Some(start), Some(end)) if start <= end => {
                            self.session.filters_mut().range = Some(PeriodRange { start, end })
                        }
                        _ => println!("Invalid period range."),
                    }
                }
                "6" => self.session.filters_mut().range = None,
                "7" => self.session.filters_mut().clear(),
                "0" => {
                    if let Err(e) = self.session.filters().build_query() {
                        println!("{e}\n");
                        continue;
                    }
                    self.handle_load().await;
                    return;
                }
                _ => println!("Invalid choice.\n"),
            }
        }
    }

    fn handle_table(&mut self) {
        if !self.session.has_data() {
            println!("Error: No data loaded. Please load the deliveries first (option 1).\n");
            return;
        }
        loop {
            let records = self.session.records();
            let page = self.table.page(records);
            let rows: Vec<DeliveryRow> = export::delivery_rows(page.rows.iter().copied());
            export::preview_table_rows(&rows, rows.len());
            let mut bands = [0usize; 4];
            for r in &page.rows {
                let slot = match ProgressBand::for_percentage(r.pct()) {
                    ProgressBand::High => 0,
                    ProgressBand::Medium => 1,
                    ProgressBand::Low => 2,
                    ProgressBand::Critical => 3,
                };
                bands[slot] += 1;
            }
            println!(
                "Progresso: >=80%: {} | 50-79%: {} | 30-49%: {} | <30%: {}",
                bands[0], bands[1], bands[2], bands[3]
            );
            println!(
                "Page {} of {} ({} registros)",
                page.page,
                page.total_pages.max(1),
                format_int(page.total_rows)
            );
            println!("[n] Next  [p] Previous  [s] Search  [o] Sort  [e] Export  [b] Back\n");
            match read_choice().to_lowercase().as_str() {
                "n" => self.table.page = (page.page + 1).min(page.total_pages.max(1)),
                "p" => self.table.page = page.page.saturating_sub(1).max(1),
                "s" => {
                    let term = prompt("Search: ");
                    self.table.set_search(&term);
                }
                "o" => {
                    println!("[1] Secretaria [2] Código [3] Entrega [4] Status [5] Progresso");
                    println!("[6] Data Início [7] Data Término [8] Interlocutor");
                    let field = match prompt("Column: ").as_str() {
                        "1" => SortField::Department,
                        "2" => SortField::Code,
                        "3" => SortField::Description,
                        "4" => SortField::Status,
                        "5" => SortField::Progress,
                        "6" => SortField::StartDate,
                        "7" => SortField::EndDate,
                        "8" => SortField::Interlocutor,
                        _ => {
                            println!("Invalid column.");
                            continue;
                        }
                    };
                    self.table.sort_by(field);
                }
                "e" => {
                    let rows = export::delivery_rows(self.table.rows(records));
                    match export::export_rows(&rows).and_then(|t| {
                        export::write_export(&self.config.export_dir, "entregas_seppe", today(), &t)
                    }) {
                        Ok(path) => println!("Exported {}\n", path.display()),
                        Err(e) => eprintln!("Write error: {}", e),
                    }
                }
                "b" => return,
                _ => println!("Invalid choice.\n"),
            }
        }
    }

    fn print_uploads(&self) {
        if self.uploads.jobs().is_empty() {
            println!("(no files selected)\n");
            return;
        }
        for job in self.uploads.jobs() {
            let dept = job
                .department_id
                .as_ref()
                .and_then(|id| self.session.departments().iter().find(|d| &d.id == id))
                .map(|d| d.code.as_str())
                .unwrap_or("-");
            let state = match &job.status {
                UploadStatus::Pending => "pendente".to_string(),
                UploadStatus::Processing { progress } => format!("processando {progress}%"),
                UploadStatus::Completed { inserted } => {
                    format!("✓ {} entregas importadas", format_int(*inserted))
                }
                UploadStatus::Error { message } => format!("erro: {message}"),
            };
            println!(
                "  #{} {} ({} KB) secretaria={} mês={} ano={} [{}]",
                job.id,
                job.file.name,
                format_number(job.file.size as f64 / 1024.0, 2),
                dept,
                MONTH_NAMES[(job.month.clamp(1, 12) - 1) as usize],
                job.year,
                state
            );
        }
        println!();
    }

    async fn handle_uploads(&mut self) {
        loop {
            self.print_uploads();
            println!("[1] Add files  [2] Set secretaria  [3] Set month  [4] Set year");
            println!("[5] Remove file  [6] Dismiss failed  [7] Start import  [0] Back\n");
            match read_choice().as_str() {
                "1" => {
                    let input = prompt("File paths (comma separated): ");
                    let mut files = Vec::new();
                    for p in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                        match SelectedFile::from_path(PathBuf::from(p)) {
                            Ok(f) => files.push(f),
                            Err(e) => println!("{e}"),
                        }
                    }
                    for rejection in self.uploads.add_files(files, self.session.departments()) {
                        println!("{rejection}");
                    }
                }
                "2" => {
                    let id = prompt("Job #: ").parse::<u64>().unwrap_or(0);
                    let code = prompt("Secretaria code: ");
                    let dept = self
                        .session
                        .departments()
                        .iter()
                        .find(|d| d.code.eq_ignore_ascii_case(&code))
                        .map(|d| d.id.clone());
                    if dept.is_none() {
                        println!("Unknown secretaria {code}.");
                        continue;
                    }
                    if let Err(e) = self.uploads.set_department(id, dept) {
                        println!("{e}");
                    }
                }
                "3" => {
                    let id = prompt("Job #: ").parse::<u64>().unwrap_or(0);
                    let month = prompt("Month (1-12): ").parse::<u32>().unwrap_or(0);
                    if let Err(e) = self.uploads.set_month(id, month) {
                        println!("{e}");
                    }
                }
                "4" => {
                    let id = prompt("Job #: ").parse::<u64>().unwrap_or(0);
                    match parse_i32_safe(Some(&prompt("Year: "))) {
                        Some(year) => {
                            if let Err(e) = self.uploads.set_year(id, year) {
                                println!("{e}");
                            }
                        }
                        None => println!("Invalid year."),
                    }
                }
                "5" => {
                    let id = prompt("Job #: ").parse::<u64>().unwrap_or(0);
                    if let Err(e) = self.uploads.remove(id) {
                        println!("{e}");
                    }
                }
                "6" => {
                    let id = prompt("Job #: ").parse::<u64>().unwrap_or(0);
                    if let Err(e) = self.uploads.dismiss(id) {
                        println!("{e}");
                    }
                }
                "7" => {
                    let summary = match run_batch(&mut self.uploads, self.importer.as_ref()).await {
                        Ok(summary) => summary,
                        Err(e) => {
                            println!("{e}\n");
                            continue;
                        }
                    };
                    self.print_uploads();
                    println!(
                        "Import finished: {} of {} files, {} entregas inserted.\n",
                        summary.completed,
                        summary.started,
                        format_int(summary.inserted)
                    );
                    tokio::time::sleep(CLEAR_DELAY).await;
                    self.uploads.prune_completed(std::time::Instant::now());
                    if summary.completed > 0 {
                        self.handle_load().await;
                    }
                }
                "0" => return,
                _ => println!("Invalid choice.\n"),
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            logging::init_tracing("info");
            tracing::error!(error = %e, "cannot start without data service configuration");
            std::process::exit(1);
        }
    };
    logging::init_tracing(&config.log_level);

    let data = match SupabaseClient::from_config(&config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to create data service client");
            std::process::exit(1);
        }
    };
    let importer = match HttpImportService::new(&config.import_url, config.http_timeout_secs) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, "failed to create import client");
            std::process::exit(1);
        }
    };
    tracing::info!(url = %config.supabase_url, "dashboard starting");

    let now = today();
    let mut app = App {
        session: DashboardSession::new(FilterState::for_year(now.year())),
        table: TableView::default(),
        uploads: UploadBatch::new(now.month(), now.year()),
        data: Box::new(data),
        importer: Box::new(importer),
        config,
    };

    loop {
        println!("SEPPE Dashboard");
        println!("[1] Load deliveries");
        println!("[2] Generate Reports");
        println!("[3] Edit Filters");
        println!("[4] Browse Deliveries");
        println!("[5] Import Spreadsheets");
        println!("[0] Exit\n");
        match read_choice().as_str() {
            "1" => app.handle_load().await,
            "2" => {
                println!();
                app.handle_generate_reports();
            }
            "3" => app.handle_filters().await,
            "4" => app.handle_table(),
            "5" => app.handle_uploads().await,
            "0" => {
                println!("Exiting the program.");
                break;
            }
            _ => println!("Invalid choice. Please enter 0-5.\n"),
        }
    }
}
