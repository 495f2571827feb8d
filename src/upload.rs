//! Spreadsheet upload jobs.
//!
//! A job is created per admitted file, carries the department/month/year the
//! import service needs, and moves through
//! `Pending -> Processing -> Completed | Error`. The batch owns the jobs and
//! enforces the transition rules; the network side lives in `import`.

use crate::error::{DashboardError, DashboardResult};
use crate::types::Department;
use std::path::PathBuf;
use std::time::{Duration, Instant};

pub const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;
pub const ACCEPTED_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];
/// Completed jobs stay visible this long after the batch settles.
pub const CLEAR_DELAY: Duration = Duration::from_secs(3);

const MONTHS_BY_NAME: [(&str, u32); 13] = [
    ("JANEIRO", 1),
    ("FEVEREIRO", 2),
    ("MARÇO", 3),
    ("MARCO", 3),
    ("ABRIL", 4),
    ("MAIO", 5),
    ("JUNHO", 6),
    ("JULHO", 7),
    ("AGOSTO", 8),
    ("SETEMBRO", 9),
    ("OUTUBRO", 10),
    ("NOVEMBRO", 11),
    ("DEZEMBRO", 12),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
}

impl SelectedFile {
    pub fn from_path(path: PathBuf) -> DashboardResult<Self> {
        let size = std::fs::metadata(&path)
            .map_err(|e| DashboardError::Validation(format!("{}: {e}", path.display())))?
            .len();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self { name, size, path })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    NotSpreadsheet,
    TooLarge { size: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub file: String,
    pub reason: RejectReason,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.reason {
            RejectReason::NotSpreadsheet => write!(f, "{} is not an Excel spreadsheet", self.file),
            RejectReason::TooLarge { size } => write!(
                f,
                "{} is too large ({} bytes, maximum {})",
                self.file, size, MAX_FILE_BYTES
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadStatus {
    Pending,
    Processing { progress: u8 },
    Completed { inserted: usize },
    Error { message: String },
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadStatus::Completed { .. } | UploadStatus::Error { .. })
    }
}

#[derive(Debug, Clone)]
pub struct UploadJob {
    pub id: u64,
    pub file: SelectedFile,
    pub department_id: Option<String>,
    pub month: u32,
    pub year: i32,
    pub status: UploadStatus,
}

/// Reject anything that is not a small enough `.xlsx`/`.xls` file.
pub fn admit(file: &SelectedFile) -> Result<(), Rejection> {
    let lower = file.name.to_lowercase();
    if !ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext)) {
        return Err(Rejection {
            file: file.name.clone(),
            reason: RejectReason::NotSpreadsheet,
        });
    }
    if file.size > MAX_FILE_BYTES {
        return Err(Rejection {
            file: file.name.clone(),
            reason: RejectReason::TooLarge { size: file.size },
        });
    }
    Ok(())
}

/// First active department whose code appears in the file name.
pub fn detect_department(file_name: &str, departments: &[Department]) -> Option<String> {
    let upper = file_name.to_uppercase();
    departments
        .iter()
        .filter(|d| d.active && !d.code.trim().is_empty())
        .find(|d| upper.contains(&d.code.trim().to_uppercase()))
        .map(|d| d.id.clone())
}

/// Month from a Portuguese month name in the file name.
pub fn detect_month(file_name: &str) -> Option<u32> {
    let upper = file_name.to_uppercase();
    MONTHS_BY_NAME
        .iter()
        .find(|(name, _)| upper.contains(name))
        .map(|(_, month)| *month)
}

/// First `20dd` token in the file name.
pub fn detect_year(file_name: &str) -> Option<i32> {
    file_name
        .as_bytes()
        .windows(4)
        .find(|w| w[0] == b'2' && w[1] == b'0' && w[2].is_ascii_digit() && w[3].is_ascii_digit())
        .and_then(|w| std::str::from_utf8(w).ok())
        .and_then(|s| s.parse().ok())
}

#[derive(Debug)]
pub struct UploadBatch {
    jobs: Vec<UploadJob>,
    next_id: u64,
    default_month: u32,
    default_year: i32,
    settled_at: Option<Instant>,
}

impl UploadBatch {
    pub fn new(default_month: u32, default_year: i32) -> Self {
        Self {
            jobs: Vec::new(),
            next_id: 1,
            default_month,
            default_year,
            settled_at: None,
        }
    }

    pub fn jobs(&self) -> &[UploadJob] {
        &self.jobs
    }

    pub fn job(&self, id: u64) -> Option<&UploadJob> {
        self.jobs.iter().find(|j| j.id == id)
    }

    /// Turn admitted files into pending jobs with detected metadata.
    /// Returns the files that were turned away.
    pub fn add_files(
        &mut self,
        files: Vec<SelectedFile>,
        departments: &[Department],
    ) -> Vec<Rejection> {
        let mut rejected = Vec::new();
        for file in files {
            if let Err(rejection) = admit(&file) {
                tracing::warn!(file = %rejection.file, "file rejected: {rejection}");
                rejected.push(rejection);
                continue;
            }
            let job = UploadJob {
                id: self.next_id,
                department_id: detect_department(&file.name, departments),
                month: detect_month(&file.name).unwrap_or(self.default_month),
                year: detect_year(&file.name).unwrap_or(self.default_year),
                status: UploadStatus::Pending,
                file,
            };
            tracing::debug!(
                job = job.id,
                file = %job.file.name,
                department = ?job.department_id,
                month = job.month,
                year = job.year,
                "upload job created"
            );
            self.next_id += 1;
            self.jobs.push(job);
        }
        rejected
    }

    fn pending_mut(&mut self, id: u64) -> DashboardResult<&mut UploadJob> {
        let job = self
            .jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| DashboardError::Validation(format!("no upload job {id}")))?;
        if job.status != UploadStatus::Pending {
            return Err(DashboardError::Validation(format!(
                "upload job {id} can no longer be edited"
            )));
        }
        Ok(job)
    }

    pub fn set_department(&mut self, id: u64, department_id: Option<String>) -> DashboardResult<()> {
        let job = self.pending_mut(id)?;
        job.department_id = department_id.filter(|d| !d.trim().is_empty());
        Ok(())
    }

    pub fn set_month(&mut self, id: u64, month: u32) -> DashboardResult<()> {
        if !(1..=12).contains(&month) {
            return Err(DashboardError::Validation(format!(
                "month {month} is outside 1..=12"
            )));
        }
        self.pending_mut(id)?.month = month;
        Ok(())
    }

    pub fn set_year(&mut self, id: u64, year: i32) -> DashboardResult<()> {
        self.pending_mut(id)?.year = year;
        Ok(())
    }

    /// Drop a job that has not been submitted yet.
    pub fn remove(&mut self, id: u64) -> DashboardResult<()> {
        self.pending_mut(id)?;
        self.jobs.retain(|j| j.id != id);
        Ok(())
    }

    /// Clear a failed job from the list.
    pub fn dismiss(&mut self, id: u64) -> DashboardResult<()> {
        let idx = self
            .jobs
            .iter()
            .position(|j| j.id == id && matches!(j.status, UploadStatus::Error { .. }))
            .ok_or_else(|| DashboardError::Validation(format!("upload job {id} is not failed")))?;
        self.jobs.remove(idx);
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == UploadStatus::Pending)
            .count()
    }

    /// Move every pending job to `Processing`, or none of them.
    ///
    /// The batch is refused when there is nothing pending or when any
    /// pending job lacks a department.
    pub fn begin(&mut self) -> DashboardResult<Vec<UploadJob>> {
        if self.pending_count() == 0 {
            return Err(DashboardError::Validation(
                "add at least one file before importing".to_string(),
            ));
        }
        let missing: Vec<&str> = self
            .jobs
            .iter()
            .filter(|j| j.status == UploadStatus::Pending && j.department_id.is_none())
            .map(|j| j.file.name.as_str())
            .collect();
        if !missing.is_empty() {
            return Err(DashboardError::Validation(format!(
                "every file needs a department: {}",
                missing.join(", ")
            )));
        }

        self.settled_at = None;
        let mut started = Vec::new();
        for job in self.jobs.iter_mut().filter(|j| j.status == UploadStatus::Pending) {
            job.status = UploadStatus::Processing { progress: 0 };
            started.push(job.clone());
        }
        tracing::info!(jobs = started.len(), "import batch started");
        Ok(started)
    }

    fn processing_mut(&mut self, id: u64) -> Option<&mut UploadJob> {
        self.jobs
            .iter_mut()
            .find(|j| j.id == id && matches!(j.status, UploadStatus::Processing { .. }))
    }

    /// Raise a processing job's progress. Lower values are ignored.
    pub fn report_progress(&mut self, id: u64, progress: u8) {
        if let Some(job) = self.processing_mut(id) {
            if let UploadStatus::Processing { progress: current } = &mut job.status {
                *current = (*current).max(progress.min(100));
            }
        }
    }

    pub fn complete(&mut self, id: u64, inserted: usize) {
        if let Some(job) = self.processing_mut(id) {
            tracing::info!(job = id, file = %job.file.name, inserted, "import completed");
            job.status = UploadStatus::Completed { inserted };
        }
    }

    pub fn fail(&mut self, id: u64, message: impl Into<String>) {
        if let Some(job) = self.processing_mut(id) {
            let message = message.into();
            tracing::warn!(job = id, file = %job.file.name, error = %message, "import failed");
            job.status = UploadStatus::Error { message };
        }
    }

    pub fn is_settled(&self) -> bool {
        !self
            .jobs
            .iter()
            .any(|j| matches!(j.status, UploadStatus::Processing { .. }))
    }

    /// Record when the last job of the batch settled; starts the clear delay.
    pub fn mark_settled(&mut self, now: Instant) {
        if self.is_settled() {
            self.settled_at = Some(now);
        }
    }

    /// Remove completed jobs once [`CLEAR_DELAY`] has passed since the batch
    /// settled. Failed jobs stay until dismissed.
    pub fn prune_completed(&mut self, now: Instant) -> usize {
        let Some(settled) = self.settled_at else {
            return 0;
        };
        if now.duration_since(settled) < CLEAR_DELAY {
            return 0;
        }
        let before = self.jobs.len();
        self.jobs
            .retain(|j| !matches!(j.status, UploadStatus::Completed { .. }));
        self.settled_at = None;
        before - self.jobs.len()
    }
}
