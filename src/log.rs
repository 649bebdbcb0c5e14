use crate::err::Error;
use serde::Serialize;
use std::fmt;
use std::io::{BufWriter, Write};

#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct Logs {
    logs: Option<Vec<Log>>,
}

impl Logs {
    pub(crate) fn add<T: ToString>(&mut self, code: LogCode, text: &T) {
        self.add_internal(Log {
            code,
            text: text.to_string(),
        });
    }

    fn add_internal(&mut self, warning: Log) {
        match &mut self.logs {
            Some(logs) => logs.push(warning),
            None => self.logs = Some(vec![warning]),
        }
    }

    pub fn get(&self) -> Option<&Vec<Log>> {
        self.logs.as_ref()
    }

    pub fn write<W: Write>(&self, output: W) -> Result<(), Error> {
        let mut writer = BufWriter::new(output);
        if let Some(logs) = &self.logs {
            for log in logs {
                writeln!(&mut writer, "{:?} {}", log.code, log.text)?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Logs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.logs)
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum LogCode {
    WarningOther,
    WarningNom,
    WarningConversion,
    WarningContent,
    WarningUser,
    Info,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Log {
    pub code: LogCode,
    pub text: String,
}
