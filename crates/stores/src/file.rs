//! FileOutput - directory-backed output mechanism with attempt-private staging
//!
//! Writers append newline-terminated records to
//! `<output>/_temporary/<attempt>/part-<m|r>-<partition>`; [`FileCommitter`]
//! promotes them into `<output>` on task commit.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use contracts::staging::{self, SUCCESS_MARKER};
use contracts::{
    ConfigScope, Configuration, ContractError, JobContext, OutputCommitter, OutputMechanism,
    RecordWriter, TaskAttemptContext, OUTPUT_DIR_KEY,
};
use tracing::{debug, error, info, instrument};

/// Record the output directory of a file-backed store
pub fn bind_output_dir(location: &str, scope: &mut ConfigScope<'_>) -> Result<(), ContractError> {
    if location.trim().is_empty() {
        return Err(ContractError::output_spec(location, "output directory is empty"));
    }
    scope.set(OUTPUT_DIR_KEY, location);
    Ok(())
}

/// Output directory bound into `conf`
pub fn output_dir(conf: &Configuration) -> Result<PathBuf, ContractError> {
    let dir = conf
        .get(OUTPUT_DIR_KEY)
        .ok_or_else(|| ContractError::missing_config(OUTPUT_DIR_KEY))?;
    if dir.trim().is_empty() {
        return Err(ContractError::output_spec(dir, "output directory is empty"));
    }
    Ok(PathBuf::from(dir))
}

/// Output mechanism shared by the file-backed stores
#[derive(Debug)]
pub struct FileOutput {
    kind: &'static str,
}

impl FileOutput {
    pub fn new(kind: &'static str) -> Arc<Self> {
        Arc::new(Self { kind })
    }
}

impl OutputMechanism for FileOutput {
    fn name(&self) -> &str {
        self.kind
    }

    fn check_output_specs(&self, job: &JobContext) -> Result<(), ContractError> {
        let dir = output_dir(job.conf())?;
        if dir.exists() {
            return Err(ContractError::output_spec(
                dir.display().to_string(),
                "output directory already exists",
            ));
        }
        Ok(())
    }

    #[instrument(
        name = "file_output_record_writer",
        skip(self, ctx),
        fields(kind = self.kind, attempt = %ctx.attempt())
    )]
    fn record_writer(
        &self,
        ctx: &TaskAttemptContext,
    ) -> Result<Box<dyn RecordWriter>, ContractError> {
        let dir = output_dir(ctx.conf())?;
        let work_dir = staging::work_dir(&dir, ctx.attempt());
        fs::create_dir_all(&work_dir)?;
        let path = work_dir.join(staging::part_file_name(&ctx.attempt().task));
        let file = File::create(&path)?;
        debug!(path = %path.display(), "Staging file created");
        Ok(Box::new(FileWriter {
            path,
            writer: Some(BufWriter::new(file)),
            records: 0,
        }))
    }

    fn output_committer(
        &self,
        ctx: &TaskAttemptContext,
    ) -> Result<Box<dyn OutputCommitter>, ContractError> {
        let output_dir = output_dir(ctx.conf())?;
        let work_dir = staging::work_dir(&output_dir, ctx.attempt());
        Ok(Box::new(FileCommitter {
            output_dir,
            work_dir,
        }))
    }
}

/// Newline-delimited writer over one staged part file
struct FileWriter {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    records: u64,
}

impl FileWriter {
    fn write_err(&self, e: impl std::fmt::Display) -> ContractError {
        error!(path = %self.path.display(), error = %e, "Write failed");
        ContractError::store_write(self.path.display().to_string(), e.to_string())
    }
}

impl RecordWriter for FileWriter {
    fn write(&mut self, _key: Option<Bytes>, value: Bytes) -> Result<(), ContractError> {
        let Some(writer) = self.writer.as_mut() else {
            return Err(self.write_err("writer already closed"));
        };
        let result = writer
            .write_all(&value)
            .and_then(|()| writer.write_all(b"\n"));
        result.map_err(|e| self.write_err(e))?;
        self.records += 1;
        Ok(())
    }

    fn close(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush().map_err(|e| self.write_err(e))?;
            debug!(path = %self.path.display(), records = self.records, "Staging file closed");
        }
        Ok(())
    }
}

/// Commit protocol of a file-backed store
#[derive(Debug)]
pub struct FileCommitter {
    output_dir: PathBuf,
    work_dir: PathBuf,
}

impl FileCommitter {
    fn commit_err(&self, e: impl std::fmt::Display) -> ContractError {
        ContractError::commit(self.output_dir.display().to_string(), e.to_string())
    }

    fn remove_if_exists(path: &Path) -> std::io::Result<()> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

impl OutputCommitter for FileCommitter {
    fn setup_job(&mut self, _job: &JobContext) -> Result<(), ContractError> {
        fs::create_dir_all(staging::job_staging_dir(&self.output_dir))
            .map_err(|e| self.commit_err(e))
    }

    fn commit_job(&mut self, _job: &JobContext) -> Result<(), ContractError> {
        Self::remove_if_exists(&staging::job_staging_dir(&self.output_dir))
            .map_err(|e| self.commit_err(e))?;
        fs::create_dir_all(&self.output_dir).map_err(|e| self.commit_err(e))?;
        File::create(self.output_dir.join(SUCCESS_MARKER)).map_err(|e| self.commit_err(e))?;
        info!(output = %self.output_dir.display(), "Job output committed");
        Ok(())
    }

    fn abort_job(&mut self, _job: &JobContext) -> Result<(), ContractError> {
        Self::remove_if_exists(&staging::job_staging_dir(&self.output_dir))
            .map_err(|e| self.commit_err(e))
    }

    fn setup_task(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        // staging dir is created lazily by the writer
        Ok(())
    }

    fn needs_task_commit(&self, _ctx: &TaskAttemptContext) -> Result<bool, ContractError> {
        Ok(self.work_dir.is_dir())
    }

    #[instrument(name = "file_commit_task", skip_all, fields(attempt = %ctx.attempt()))]
    fn commit_task(&mut self, ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        if !self.work_dir.is_dir() {
            debug!("Nothing staged");
            return Ok(());
        }
        fs::create_dir_all(&self.output_dir).map_err(|e| self.commit_err(e))?;
        let entries = fs::read_dir(&self.work_dir).map_err(|e| self.commit_err(e))?;
        for entry in entries {
            let entry = entry.map_err(|e| self.commit_err(e))?;
            let target = self.output_dir.join(entry.file_name());
            if target.exists() {
                return Err(self.commit_err(format!(
                    "{} already committed by another attempt",
                    target.display()
                )));
            }
            fs::rename(entry.path(), &target).map_err(|e| self.commit_err(e))?;
            debug!(file = %target.display(), "Promoted");
        }
        Self::remove_if_exists(&self.work_dir).map_err(|e| self.commit_err(e))
    }

    fn abort_task(&mut self, _ctx: &TaskAttemptContext) -> Result<(), ContractError> {
        Self::remove_if_exists(&self.work_dir).map_err(|e| self.commit_err(e))
    }
}
