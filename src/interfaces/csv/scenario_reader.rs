use crate::error::{CoordinatorError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Start,
    Initialize,
    InitSuccess,
    InitFailed,
    Pay,
    PurchaseSuccess,
    PurchaseFailed,
    Tick,
    Complete,
    Restore,
    Subscribe,
    Dispose,
}

#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct ScenarioRow {
    pub action: Action,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

/// One step of a scenario: either an application call or a storefront event.
#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Start,
    Initialize,
    InitSuccess,
    InitFailed {
        reason: String,
    },
    Pay {
        product_id: String,
        metadata: Option<String>,
    },
    PurchaseSuccess {
        product_id: String,
        transaction_id: Option<String>,
        receipt: String,
    },
    PurchaseFailed {
        product_id: String,
        reason: String,
    },
    Tick,
    Complete {
        transaction_id: String,
    },
    Restore,
    Subscribe,
    Dispose,
}

fn required(value: Option<String>, action: Action, field: &str) -> Result<String> {
    value.ok_or_else(|| CoordinatorError::ScenarioError(format!("{action:?} requires `{field}`")))
}

impl TryFrom<ScenarioRow> for Command {
    type Error = CoordinatorError;

    fn try_from(row: ScenarioRow) -> Result<Self> {
        let action = row.action;
        let command = match action {
            Action::Start => Self::Start,
            Action::Initialize => Self::Initialize,
            Action::InitSuccess => Self::InitSuccess,
            Action::InitFailed => Self::InitFailed {
                reason: row.detail.unwrap_or_default(),
            },
            Action::Pay => Self::Pay {
                product_id: required(row.product, action, "product")?,
                metadata: row.detail,
            },
            Action::PurchaseSuccess => Self::PurchaseSuccess {
                product_id: required(row.product, action, "product")?,
                transaction_id: row.transaction,
                receipt: row.detail.unwrap_or_default(),
            },
            Action::PurchaseFailed => Self::PurchaseFailed {
                product_id: required(row.product, action, "product")?,
                reason: row.detail.unwrap_or_default(),
            },
            Action::Tick => Self::Tick,
            Action::Complete => Self::Complete {
                transaction_id: required(row.transaction, action, "transaction")?,
            },
            Action::Restore => Self::Restore,
            Action::Subscribe => Self::Subscribe,
            Action::Dispose => Self::Dispose,
        };
        Ok(command)
    }
}

/// Reads scenario commands from a CSV source with the header
/// `action, product, transaction, detail`.
///
/// Whitespace is trimmed and rows may omit trailing empty columns.
pub struct ScenarioReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScenarioReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and converts rows; a bad row yields an error and reading continues.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize().map(|row| {
            let row: ScenarioRow = row?;
            Command::try_from(row)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_valid_stream() {
        let data = "action, product, transaction, detail\n\
                    start\n\
                    pay, gems, , level=3\n\
                    purchase_success, gems, GPA.1, raw\n\
                    tick";
        let commands: Vec<Result<Command>> = ScenarioReader::new(data.as_bytes()).commands().collect();

        assert_eq!(commands.len(), 4);
        assert_eq!(commands[0].as_ref().unwrap(), &Command::Start);
        assert_eq!(
            commands[1].as_ref().unwrap(),
            &Command::Pay {
                product_id: "gems".to_string(),
                metadata: Some("level=3".to_string()),
            }
        );
        assert_eq!(
            commands[2].as_ref().unwrap(),
            &Command::PurchaseSuccess {
                product_id: "gems".to_string(),
                transaction_id: Some("GPA.1".to_string()),
                receipt: "raw".to_string(),
            }
        );
        assert_eq!(commands[3].as_ref().unwrap(), &Command::Tick);
    }

    #[test]
    fn test_reader_reports_bad_rows_and_continues() {
        let data = "action, product, transaction, detail\n\
                    refund, gems, ,\n\
                    pay, , ,\n\
                    complete, , t1,";
        let commands: Vec<Result<Command>> = ScenarioReader::new(data.as_bytes()).commands().collect();

        assert!(matches!(commands[0], Err(CoordinatorError::CsvError(_))));
        assert!(matches!(commands[1], Err(CoordinatorError::ScenarioError(_))));
        assert_eq!(
            commands[2].as_ref().unwrap(),
            &Command::Complete {
                transaction_id: "t1".to_string()
            }
        );
    }
}
