// Import service client and the batch runner that drives upload jobs.
use crate::error::{DashboardError, DashboardResult};
use crate::upload::{SelectedFile, UploadBatch, UploadJob};
use async_trait::async_trait;
use futures::future::join_all;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const CHUNK_SIZE: usize = 64 * 1024;
/// Share of the progress bar covered by the upload itself; the rest waits on
/// the server-side import.
const TRANSFER_SHARE: u64 = 90;

#[derive(Debug, Clone, PartialEq)]
pub struct ImportRequest {
    pub job_id: u64,
    pub file: SelectedFile,
    pub department_id: String,
    pub month: u32,
    pub year: i32,
}

impl ImportRequest {
    fn from_job(job: &UploadJob) -> Self {
        Self {
            job_id: job.id,
            file: job.file.clone(),
            department_id: job.department_id.clone().unwrap_or_default(),
            month: job.month,
            year: job.year,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Progress { job_id: u64, progress: u8 },
    Completed { job_id: u64, inserted: usize },
    Failed { job_id: u64, message: String },
}

/// Progress reporter handed to an import; one per job.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    job_id: u64,
    tx: mpsc::UnboundedSender<JobEvent>,
}

impl ProgressSink {
    pub fn new(job_id: u64, tx: mpsc::UnboundedSender<JobEvent>) -> Self {
        Self { job_id, tx }
    }

    pub fn report(&self, progress: u8) {
        let _ = self.tx.send(JobEvent::Progress {
            job_id: self.job_id,
            progress: progress.min(100),
        });
    }
}

#[async_trait]
pub trait ImportService: Send + Sync {
    /// Import one spreadsheet, returning the number of inserted deliveries.
    async fn import(&self, request: &ImportRequest, progress: &ProgressSink) -> DashboardResult<usize>;
}

#[derive(Debug, Deserialize)]
struct ImportResponse {
    entregas_inseridas: usize,
}

#[derive(Clone)]
pub struct HttpImportService {
    client: Client,
    url: String,
}

impl HttpImportService {
    pub fn new(url: &str, timeout_secs: u64) -> DashboardResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| DashboardError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

fn spreadsheet_mime(name: &str) -> &'static str {
    if name.to_lowercase().ends_with(".xls") {
        "application/vnd.ms-excel"
    } else {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    }
}

/// Stream `bytes` in chunks, reporting transfer progress as each chunk is taken.
fn progress_body(bytes: Vec<u8>, progress: ProgressSink) -> Body {
    let total = bytes.len().max(1) as u64;
    let chunks: Vec<Vec<u8>> = bytes.chunks(CHUNK_SIZE).map(<[u8]>::to_vec).collect();
    let mut sent = 0u64;
    let stream = futures::stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress.report((sent * TRANSFER_SHARE / total) as u8);
        Ok::<_, std::io::Error>(chunk)
    }));
    Body::wrap_stream(stream)
}

#[async_trait]
impl ImportService for HttpImportService {
    async fn import(&self, request: &ImportRequest, progress: &ProgressSink) -> DashboardResult<usize> {
        let bytes = tokio::fs::read(&request.file.path)
            .await
            .map_err(|e| DashboardError::Import(format!("{}: {e}", request.file.name)))?;
        let len = bytes.len() as u64;

        let part = Part::stream_with_length(progress_body(bytes, progress.clone()), len)
            .file_name(request.file.name.clone())
            .mime_str(spreadsheet_mime(&request.file.name))
            .map_err(|e| DashboardError::Import(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("secretaria_id", request.department_id.clone())
            .text("mes", request.month.to_string())
            .text("ano", request.year.to_string());

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DashboardError::Import(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DashboardError::Import(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        let parsed: ImportResponse = response
            .json()
            .await
            .map_err(|e| DashboardError::Import(format!("unexpected response: {e}")))?;
        progress.report(100);
        Ok(parsed.entregas_inseridas)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub started: usize,
    pub completed: usize,
    pub failed: usize,
    pub inserted: usize,
}

fn apply(batch: &mut UploadBatch, summary: &mut BatchSummary, event: JobEvent) {
    match event {
        JobEvent::Progress { job_id, progress } => batch.report_progress(job_id, progress),
        JobEvent::Completed { job_id, inserted } => {
            summary.completed += 1;
            summary.inserted += inserted;
            batch.complete(job_id, inserted);
        }
        JobEvent::Failed { job_id, message } => {
            summary.failed += 1;
            batch.fail(job_id, message);
        }
    }
}

/// Submit every pending job concurrently and fold the results back into
/// `batch`. A failed job does not stop its siblings, and nothing is retried.
pub async fn run_batch(
    batch: &mut UploadBatch,
    service: &dyn ImportService,
) -> DashboardResult<BatchSummary> {
    let started = batch.begin()?;
    let mut summary = BatchSummary {
        started: started.len(),
        ..BatchSummary::default()
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<JobEvent>();
    let work = started.iter().map(|job| {
        let request = ImportRequest::from_job(job);
        let tx = tx.clone();
        async move {
            let sink = ProgressSink::new(request.job_id, tx.clone());
            let event = match service.import(&request, &sink).await {
                Ok(inserted) => JobEvent::Completed {
                    job_id: request.job_id,
                    inserted,
                },
                Err(e) => JobEvent::Failed {
                    job_id: request.job_id,
                    message: e.to_string(),
                },
            };
            let _ = tx.send(event);
        }
    });
    let mut all = std::pin::pin!(join_all(work));

    loop {
        tokio::select! {
            Some(event) = rx.recv() => apply(batch, &mut summary, event),
            _ = &mut all => break,
        }
    }
    while let Ok(event) = rx.try_recv() {
        apply(batch, &mut summary, event);
    }

    batch.mark_settled(Instant::now());
    tracing::info!(
        completed = summary.completed,
        failed = summary.failed,
        inserted = summary.inserted,
        "import batch settled"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::tests::{departments, file};
    use crate::upload::UploadStatus;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Barrier;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Fails any file whose name contains "FAIL"; waits on a barrier so the
    /// test only finishes if jobs really run side by side.
    struct FakeImport {
        barrier: Barrier,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ImportService for FakeImport {
        async fn import(&self, request: &ImportRequest, progress: &ProgressSink) -> DashboardResult<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            progress.report(30);
            self.barrier.wait().await;
            progress.report(10);
            if request.file.name.contains("FAIL") {
                return Err(DashboardError::Import("HTTP 422: planilha inválida".into()));
            }
            progress.report(100);
            Ok(request.month as usize)
        }
    }

    #[tokio::test]
    async fn one_failure_does_not_cancel_siblings() {
        let mut batch = UploadBatch::new(4, 2025);
        batch.add_files(
            vec![file("SESAU_JUNHO.xlsx", 10), file("SEMED_FAIL.xlsx", 10)],
            &departments(),
        );
        let service = FakeImport {
            barrier: Barrier::new(2),
            calls: AtomicUsize::new(0),
        };

        let summary = run_batch(&mut batch, &service).await.unwrap();
        assert_eq!(
            summary,
            BatchSummary {
                started: 2,
                completed: 1,
                failed: 1,
                inserted: 6,
            }
        );
        assert_eq!(batch.job(1).unwrap().status, UploadStatus::Completed { inserted: 6 });
        assert!(matches!(
            &batch.job(2).unwrap().status,
            UploadStatus::Error { message } if message.contains("422")
        ));
        assert!(batch.is_settled());
    }

    #[tokio::test]
    async fn invalid_batch_never_reaches_the_service() {
        let mut batch = UploadBatch::new(4, 2025);
        batch.add_files(
            vec![file("SESAU.xlsx", 10), file("sem_dono.xlsx", 10)],
            &departments(),
        );
        let service = FakeImport {
            barrier: Barrier::new(1),
            calls: AtomicUsize::new(0),
        };

        assert!(run_batch(&mut batch, &service).await.is_err());
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
        assert!(batch.jobs().iter().all(|j| j.status == UploadStatus::Pending));
    }

    fn temp_sheet(name: &str, len: usize) -> SelectedFile {
        let path = std::env::temp_dir().join(format!("{}-{}", std::process::id(), name));
        std::fs::write(&path, vec![7u8; len]).unwrap();
        SelectedFile {
            name: name.to_string(),
            size: len as u64,
            path,
        }
    }

    fn request_for(file: SelectedFile) -> ImportRequest {
        ImportRequest {
            job_id: 1,
            file,
            department_id: "2".to_string(),
            month: 8,
            year: 2025,
        }
    }

    #[tokio::test]
    async fn http_import_posts_form_and_reports_progress() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/importar-planilha"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"entregas_inseridas": 7})),
            )
            .mount(&server)
            .await;

        let service =
            HttpImportService::new(&format!("{}/api/importar-planilha", server.uri()), 5).unwrap();
        let sheet = temp_sheet("SEMED_AGOSTO.xlsx", 3 * CHUNK_SIZE + 10);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ProgressSink::new(1, tx);

        let inserted = service.import(&request_for(sheet.clone()), &sink).await.unwrap();
        assert_eq!(inserted, 7);

        let mut seen = Vec::new();
        while let Ok(JobEvent::Progress { progress, .. }) = rx.try_recv() {
            seen.push(progress);
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "progress went backwards: {seen:?}");
        assert_eq!(seen.last(), Some(&100));

        let received = server.received_requests().await.unwrap();
        let body = String::from_utf8_lossy(&received[0].body);
        assert!(body.contains("name=\"secretaria_id\""));
        assert!(body.contains("name=\"mes\""));
        assert!(body.contains("name=\"ano\""));
        assert!(body.contains("filename=\"SEMED_AGOSTO.xlsx\""));

        std::fs::remove_file(&sheet.path).unwrap();
    }

    #[tokio::test]
    async fn http_import_error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/importar-planilha"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Erro ao processar arquivo"))
            .mount(&server)
            .await;

        let service =
            HttpImportService::new(&format!("{}/api/importar-planilha", server.uri()), 5).unwrap();
        let sheet = temp_sheet("SESAU_MAIO.xlsx", 128);
        let (tx, _rx) = mpsc::unbounded_channel();

        let err = service
            .import(&request_for(sheet.clone()), &ProgressSink::new(1, tx))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 500"));

        std::fs::remove_file(&sheet.path).unwrap();
    }
}
