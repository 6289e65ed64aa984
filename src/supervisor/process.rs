//! Spawns, pauses, resumes, and kills worker processes, and keeps the
//! in-memory worker-record store the HTTP surface reads from.
//!
//! Grounded on `crawler_server.py`'s `ProcessManager`: one OS process per
//! job, SIGSTOP/SIGCONT for pause/resume, a bounded stdout ring buffer per
//! worker, and periodic GC of finished records.

use crate::error::SupervisorError;
use crate::model::{Job, JobStatus, WorkerRecord, WORKER_RECORD_GC_KEEP};
use dashmap::DashMap;
use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::Arc;
use tokio::sync::Mutex;

pub struct ProcessManager {
    worker_binary: std::path::PathBuf,
    api_url: String,
    api_key: Option<String>,
    records: DashMap<String, Arc<Mutex<WorkerRecord>>>,
}

impl ProcessManager {
    #[must_use]
    pub fn new(worker_binary: std::path::PathBuf, api_url: String, api_key: Option<String>) -> Self {
        Self { worker_binary, api_url, api_key, records: DashMap::new() }
    }

    pub fn spawn(&self, job: &Job) -> Result<(), SupervisorError> {
        if self.records.contains_key(&job.id) {
            return Err(SupervisorError::AlreadyTracked(job.id.clone()));
        }

        let mut command = Command::new(&self.worker_binary);
        command
            .arg("--job-id").arg(&job.id)
            .arg("--api-url").arg(&self.api_url)
            .arg("--project-id").arg(&job.project_id)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(key) = &self.api_key {
            command.arg("--api-key").arg(key);
        }

        let mut child = command.spawn().map_err(|e| SupervisorError::SpawnFailed(e.to_string()))?;
        let pid = child.id();
        let record = Arc::new(Mutex::new(WorkerRecord::new(job.id.clone(), pid)));
        self.records.insert(job.id.clone(), record.clone());

        // The log reader and wait threads are plain OS threads, not tokio
        // worker threads, so `Handle::current()` must be captured here (spawn
        // is always called from inside the supervisor's async runtime) and
        // carried in rather than looked up from thread-local context later.
        let handle = tokio::runtime::Handle::current();

        if let Some(stdout) = child.stdout.take() {
            spawn_log_reader(record.clone(), stdout, handle.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_log_reader(record.clone(), stderr, handle.clone());
        }

        let record_for_wait = record.clone();
        std::thread::spawn(move || {
            let status = child.wait();
            let exit_code = status.ok().and_then(|s| s.code());
            let final_status = match exit_code {
                Some(0) => JobStatus::Completed,
                _ => JobStatus::Failed,
            };
            handle.block_on(async move {
                let mut record = record_for_wait.lock().await;
                record.status = final_status;
                record.exit_code = exit_code;
                record.finished_at = Some(chrono::Utc::now());
            });
        });

        Ok(())
    }

    pub async fn pause(&self, job_id: &str) -> Result<(), SupervisorError> {
        let record = self.records.get(job_id).ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?;
        let mut record = record.lock().await;
        if record.status != JobStatus::Running {
            return Err(SupervisorError::NotRunning(job_id.to_string()));
        }
        send_signal(record.os_pid, Signal::Stop)?;
        record.status = JobStatus::Paused;
        record.paused_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub async fn resume(&self, job_id: &str) -> Result<(), SupervisorError> {
        let record = self.records.get(job_id).ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?;
        let mut record = record.lock().await;
        if record.status != JobStatus::Paused {
            return Err(SupervisorError::NotPaused(job_id.to_string()));
        }
        send_signal(record.os_pid, Signal::Cont)?;
        record.status = JobStatus::Running;
        record.paused_at = None;
        Ok(())
    }

    pub async fn kill(&self, job_id: &str) -> Result<(), SupervisorError> {
        let record = self.records.get(job_id).ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?;
        let mut record = record.lock().await;
        if record.is_terminal() {
            return Err(SupervisorError::AlreadyTerminal(job_id.to_string()));
        }
        send_signal(record.os_pid, Signal::Term)?;
        record.status = JobStatus::Killed;
        record.finished_at = Some(chrono::Utc::now());
        Ok(())
    }

    pub async fn status(&self, job_id: &str) -> Result<(WorkerRecord, Vec<String>), SupervisorError> {
        let record = self.records.get(job_id).ok_or_else(|| SupervisorError::NotFound(job_id.to_string()))?;
        let record = record.lock().await;
        let tail = record.tail(crate::model::WORKER_LOG_STATUS_TAIL);
        Ok((record.clone(), tail))
    }

    pub async fn list(&self) -> Vec<WorkerRecord> {
        let mut out = Vec::with_capacity(self.records.len());
        for entry in self.records.iter() {
            out.push(entry.value().lock().await.clone());
        }
        out
    }

    /// Keep only the newest `WORKER_RECORD_GC_KEEP` finished records;
    /// running/paused jobs are never collected.
    pub async fn gc(&self) {
        let mut finished: Vec<(String, chrono::DateTime<chrono::Utc>)> = Vec::new();
        for entry in self.records.iter() {
            let record = entry.value().lock().await;
            if let Some(finished_at) = record.finished_at {
                finished.push((entry.key().clone(), finished_at));
            }
        }
        if finished.len() <= WORKER_RECORD_GC_KEEP {
            return;
        }
        finished.sort_by_key(|(_, at)| *at);
        let to_drop = finished.len() - WORKER_RECORD_GC_KEEP;
        for (job_id, _) in finished.into_iter().take(to_drop) {
            self.records.remove(&job_id);
        }
    }
}

fn spawn_log_reader(record: Arc<Mutex<WorkerRecord>>, pipe: impl std::io::Read + Send + 'static, handle: tokio::runtime::Handle) {
    std::thread::spawn(move || {
        let reader = BufReader::new(pipe);
        for line in reader.lines().map_while(Result::ok) {
            let record = record.clone();
            handle.block_on(async move {
                record.lock().await.push_log_line(line);
            });
        }
    });
}

enum Signal {
    Stop,
    Cont,
    Term,
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: Signal) -> Result<(), SupervisorError> {
    let sig = match signal {
        Signal::Stop => libc::SIGSTOP,
        Signal::Cont => libc::SIGCONT,
        Signal::Term => libc::SIGTERM,
    };
    // SAFETY: pid came from `Child::id()` for a process this supervisor spawned;
    // kill(2) on a valid pid with a standard signal cannot corrupt memory.
    let result = unsafe { libc::kill(pid as i32, sig) };
    if result != 0 {
        return Err(SupervisorError::SpawnFailed(format!("kill({pid}, {sig}) failed: {}", std::io::Error::last_os_error())));
    }
    Ok(())
}

#[cfg(not(unix))]
fn send_signal(_pid: u32, _signal: Signal) -> Result<(), SupervisorError> {
    Err(SupervisorError::SpawnFailed("process signalling is only supported on unix".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pause_on_unknown_job_returns_not_found() {
        let manager = ProcessManager::new("/bin/true".into(), "https://api.example.com".into(), None);
        let err = manager.pause("missing-job").await.unwrap_err();
        assert!(matches!(err, SupervisorError::NotFound(_)));
    }
}
