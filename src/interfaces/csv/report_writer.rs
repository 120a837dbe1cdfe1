use crate::domain::notification::Notification;
use crate::domain::transaction::{PurchaseResult, ResultCode};
use crate::error::{PurchaseError, Result};
use serde::Serialize;
use std::io::Write;

#[derive(Debug, Serialize, PartialEq)]
pub struct ReportRow {
    pub source: String,
    pub success: bool,
    pub code: ResultCode,
    pub data: String,
    pub error: String,
}

impl ReportRow {
    pub fn from_result(source: &str, result: &PurchaseResult) -> Self {
        Self {
            source: source.to_string(),
            success: result.success,
            code: result.code,
            data: result.data.clone(),
            error: result
                .error
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }

    pub fn from_restore(outcome: &std::result::Result<(), PurchaseError>) -> Self {
        let (success, code, error) = match outcome {
            Ok(()) => (true, ResultCode::Success, String::new()),
            Err(err) => (false, ResultCode::Fail, err.to_string()),
        };
        Self {
            source: "restore".to_string(),
            success,
            code,
            data: String::new(),
            error,
        }
    }

    pub fn from_notification(notification: &Notification) -> Self {
        let source = format!("notification:{}", notification.name());
        match notification {
            Notification::InitSuccess(products) => {
                let ids: Vec<&str> = products.iter().map(|p| p.product_id.as_str()).collect();
                Self {
                    source,
                    success: true,
                    code: ResultCode::Success,
                    data: ids.join(" "),
                    error: String::new(),
                }
            }
            Notification::InitFailed(reason) => Self {
                source,
                success: false,
                code: ResultCode::Fail,
                data: String::new(),
                error: reason.clone(),
            },
            Notification::LostPayment(tx) => Self {
                source,
                success: true,
                code: ResultCode::Success,
                data: serde_json::to_string(tx).unwrap_or_default(),
                error: String::new(),
            },
        }
    }
}

/// Writes report rows as CSV with the header `source,success,code,data,error`.
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_row(&mut self, row: &ReportRow) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> Result<W> {
        self.writer
            .into_inner()
            .map_err(|e| crate::error::CoordinatorError::IoError(e.into_error()))
    }
}
