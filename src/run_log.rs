//! # Run Log
//!
//! Per-run accumulator for diagnostic text and alerts. A report run (one HTTP
//! request, one cron invocation) owns exactly one `RunLog`; nothing here is
//! shared between runs.
//!
//! Finishing a run appends an end marker and, when an alert recipient is
//! configured, mails one summary of every pending alert. The log can also be
//! written to `logs/` and tabular output to `csv/` under an output directory.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use tracing::{error, info, warn};

use crate::error::{ReportError, ReportResult};
use crate::mail::{Attachment, DynMailer, EmailMessage};

pub const LOG_DIR: &str = "logs";
pub const CSV_DIR: &str = "csv";

/// Alert lines containing this marker point at the log file and are not counted.
const LOG_LINK_MARKER: &str = "view log file";

/// Where alert summaries go.
#[derive(Clone)]
pub struct AlertTarget {
    pub mailer: DynMailer,
    pub recipient: String,
}

/// A log written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub file_name: String,
}

/// A CSV written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvFile {
    pub dir: PathBuf,
    pub file_name: String,
}

impl CsvFile {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

#[derive(Default)]
pub struct RunLog {
    buffer: String,
    alerts: Vec<String>,
    alert_target: Option<AlertTarget>,
}

impl RunLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alerts(mut self, target: Option<AlertTarget>) -> Self {
        self.alert_target = target;
        self
    }

    /// Append a line to the log.
    pub fn log(&mut self, message: impl AsRef<str>) {
        self.buffer.push_str(message.as_ref());
        self.buffer.push('\n');
    }

    /// Queue an alert for the end-of-run mail. Empty messages are ignored.
    pub fn alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !message.is_empty() {
            self.alerts.push(message);
        }
    }

    pub fn log_and_alert(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        self.log(&message);
        self.alert(message);
    }

    /// Log and also report to the system error log.
    pub fn log_and_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        error!("{}", message);
        self.log(&message);
    }

    pub fn log_alert_and_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        self.log_and_error(message.clone());
        self.alert(message);
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn alerts(&self) -> &[String] {
        &self.alerts
    }

    /// Pending alerts, not counting the log-file link.
    pub fn alert_count(&self) -> usize {
        self.alerts
            .iter()
            .filter(|alert| !alert.to_lowercase().contains(LOG_LINK_MARKER))
            .count()
    }

    /// The summary mail for all pending alerts.
    pub fn alert_message(
        &self,
        recipient: &str,
        prefix: &str,
        subject: &str,
        at: NaiveDateTime,
    ) -> EmailMessage {
        let body = if self.alerts.is_empty() {
            "No alerts to report.".to_string()
        } else {
            self.alerts.join("\n")
        };

        let subject = format!(
            "[{}] {} {} - {}",
            prefix,
            self.alert_count(),
            subject,
            at.format("%Y-%m-%d %-H:%M:%S")
        );

        EmailMessage::text(recipient, subject, body)
    }

    /// Mail the alert summary. A failed send is logged, never retried.
    pub async fn mail_alerts(&mut self, prefix: &str) {
        let Some(target) = self.alert_target.clone() else {
            return;
        };

        let message = self.alert_message(
            &target.recipient,
            prefix,
            "alerts",
            Local::now().naive_local(),
        );

        if let Err(e) = target.mailer.send(message).await {
            self.log_and_error(format!("Could not mail alerts: {}", e));
        }
    }

    /// End the run: append the end marker, mail alerts, and return the log text.
    pub async fn finish(&mut self, name: &str) -> String {
        self.log(format!("[END] {} script.", name));
        self.mail_alerts(name).await;
        self.buffer.clone()
    }

    /// Finish the run and stop the process. Only binaries call this.
    pub async fn finish_and_halt(mut self, name: &str) -> ! {
        let text = self.finish(name).await;
        print!("{}", text);
        error!("Stopped script execution");
        std::process::exit(1);
    }

    /// Write the whole log to `{output_dir}/logs/{identifier}_log_{YYYYMMDDHHmm}.txt`.
    pub fn write_log(&mut self, output_dir: &Path, identifier: &str) -> ReportResult<LogFile> {
        self.write_log_at(output_dir, identifier, Local::now().naive_local())
    }

    fn write_log_at(
        &mut self,
        output_dir: &Path,
        identifier: &str,
        at: NaiveDateTime,
    ) -> ReportResult<LogFile> {
        let dir = self.ensure_dir(&output_dir.join(LOG_DIR))?;
        let file_name = log_file_name(identifier, at);
        let path = dir.join(&file_name);

        self.log("Wrote log.");
        fs::write(&path, &self.buffer)?;
        info!("Run log written to {}", path.display());

        Ok(LogFile { path, file_name })
    }

    /// Write `records` as RFC 4180 CSV to `{output_dir}/csv/{file_name}`.
    ///
    /// A CSV file or folder that cannot be created is alerted and returned as
    /// `ReportError::FileCreate`; callers that cannot continue without the CSV
    /// should `finish_and_halt`.
    pub fn write_csv<R, F>(
        &mut self,
        output_dir: &Path,
        file_name: &str,
        records: R,
    ) -> ReportResult<CsvFile>
    where
        R: IntoIterator<Item = F>,
        F: IntoIterator,
        F::Item: AsRef<[u8]>,
    {
        let dir = output_dir.join(CSV_DIR);
        let path = dir.join(file_name);

        let created = self
            .create_dir(&dir)
            .and_then(|()| File::create(&path));
        let file = match created {
            Ok(file) => file,
            Err(source) => {
                self.log_and_alert(format!("Could not create CSV: {}", path.display()));
                return Err(ReportError::FileCreate { path, source });
            }
        };

        let mut writer = csv::Writer::from_writer(file);
        for record in records {
            writer.write_record(record)?;
        }
        writer.flush()?;
        self.log("Wrote the CSV");

        Ok(CsvFile {
            dir,
            file_name: file_name.to_string(),
        })
    }

    /// Mail CSV files as attachments.
    pub async fn mail_csv(
        &mut self,
        mailer: &DynMailer,
        files: &[CsvFile],
        to: &str,
        subject: &str,
    ) -> ReportResult<()> {
        let mut message = EmailMessage::text(to, subject, "See attached CSVs");

        for file in files {
            let content = fs::read(file.path())?;
            message.attachments.push(Attachment {
                file_name: file.file_name.clone(),
                content_type: "text/csv".to_string(),
                content,
            });
        }

        match mailer.send(message).await {
            Ok(()) => {
                self.log(format!("Mailed {} CSV file(s) to {}", files.len(), to));
                Ok(())
            }
            Err(e) => {
                self.log_and_alert(format!("Could not mail CSVs to {}: {}", to, e));
                Err(e)
            }
        }
    }

    fn ensure_dir(&mut self, dir: &Path) -> ReportResult<PathBuf> {
        self.create_dir(dir)?;
        Ok(dir.to_path_buf())
    }

    fn create_dir(&mut self, dir: &Path) -> std::io::Result<()> {
        if !dir.is_dir() {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!("Failed to create directory {}: {}", dir.display(), e);
                return Err(e);
            }
            self.log(format!("Folder available: {}", dir.display()));
        }
        Ok(())
    }
}

/// `{identifier}_log_{YYYYMMDDHHmm}.txt`, identifier lower-cased.
pub fn log_file_name(identifier: &str, at: NaiveDateTime) -> String {
    format!(
        "{}_log_{}.txt",
        identifier.to_lowercase(),
        at.format("%Y%m%d%H%M")
    )
}
