use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;
use std::{
    fmt,
    io::{self, Write},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    #[default]
    Json,
    Csv,
}

/// A flat output record.
pub trait Record: Serialize {
    /// CSV header line, without newline.
    const HEADER: &'static str;

    fn write_csv(&self, out: &mut dyn Write) -> io::Result<()>;
}

/// A continuous sample or a mask flag. NaN prints as `null` in JSON
/// and `NaN` in CSV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Flag(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(v) => write!(f, "{v}"),
            Self::Flag(v) => write!(f, "{}", u8::from(*v)),
        }
    }
}

pub fn print<R: Record>(format: Format, records: &[R]) -> Result<()> {
    let mut stdout = io::stdout().lock();
    match format {
        Format::Json => {
            serde_json::to_writer_pretty(&mut stdout, records)?;
            writeln!(stdout)?;
        }
        Format::Csv => {
            writeln!(stdout, "{}", R::HEADER)?;
            for record in records {
                record.write_csv(&mut stdout)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{Record, Value};
    use serde::Serialize;
    use std::io::{self, Write};

    #[derive(Serialize)]
    struct Row {
        year: u16,
        value: Value,
    }

    impl Record for Row {
        const HEADER: &'static str = "year,value";

        fn write_csv(&self, out: &mut dyn Write) -> io::Result<()> {
            writeln!(out, "{},{}", self.year, self.value)
        }
    }

    #[test]
    fn test_value_encoding() {
        let rows = [
            Row {
                year: 0,
                value: Value::Number(f64::NAN),
            },
            Row {
                year: 2018,
                value: Value::Flag(true),
            },
        ];
        assert_eq!(
            serde_json::to_string(&rows).unwrap(),
            r#"[{"year":0,"value":null},{"year":2018,"value":true}]"#
        );
        let mut csv = Vec::new();
        for row in &rows {
            row.write_csv(&mut csv).unwrap();
        }
        assert_eq!(String::from_utf8(csv).unwrap(), "0,NaN\n2018,1\n");
    }
}
