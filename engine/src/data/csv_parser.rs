use anyhow::{anyhow, Result};
use csv::{ReaderBuilder, StringRecord};
use shared::models::Candle;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// Timestamp and number parsing for candle files
pub mod candle_format {
    use anyhow::{anyhow, Result};
    use chrono::{DateTime, NaiveDateTime};
    use std::str::FromStr;

    /// Unix seconds, RFC 3339, or `YYYY-MM-DD HH:MM:SS` taken as UTC.
    pub fn parse_timestamp(s: &str) -> Result<i64> {
        let s = s.trim();
        if let Ok(secs) = i64::from_str(s) {
            return Ok(secs);
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Ok(dt.timestamp());
        }
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
            .map(|dt| dt.and_utc().timestamp())
            .map_err(|e| anyhow!("Failed to parse timestamp '{}': {}", s, e))
    }

    pub fn parse_price(s: &str) -> Result<f64> {
        let value = f64::from_str(s.trim()).map_err(|e| anyhow!("Failed to parse price '{}': {}", s, e))?;
        if !value.is_finite() {
            return Err(anyhow!("Price '{}' is not finite", s));
        }
        Ok(value)
    }

    // Volumes are whole units; a trailing ".0" from spreadsheet exports is accepted.
    pub fn parse_volume(s: &str) -> Result<u64> {
        let trimmed = s.trim();
        let whole = trimmed.strip_suffix(".0").unwrap_or(trimmed);
        u64::from_str(whole).map_err(|e| anyhow!("Failed to parse volume '{}': {}", s, e))
    }

}

pub struct CsvCandleLoader {
    delimiter: u8,
}

impl Default for CsvCandleLoader {
    fn default() -> Self {
        CsvCandleLoader { delimiter: b',' }
    }
}

impl CsvCandleLoader {
    pub fn new(delimiter: char) -> Result<Self> {
        let delimiter = u8::try_from(delimiter).map_err(|_| anyhow!("Delimiter '{}' is not a single byte", delimiter))?;
        Ok(CsvCandleLoader { delimiter })
    }

    // CSV Header: time,open,high,low,close,volume (any column order)
    // Example Row: 1704067200,187.15,187.90,186.80,187.44,1200
    pub fn load_candles_from_csv(&self, file_path: &Path) -> Result<Vec<Candle>> {
        let file = File::open(file_path)
            .map_err(|e| anyhow!("Failed to open CSV file '{}': {}", file_path.display(), e))?;
        let mut rdr = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(BufReader::new(file));

        let headers = rdr.headers()?.clone();
        let mut candles = Vec::new();

        for (idx, result) in rdr.records().enumerate() {
            let line = idx + 2;
            let record = result.map_err(|e| anyhow!("Error reading CSV record at line {}: {}", line, e))?;

            let time = candle_format::parse_timestamp(Self::required(&record, &headers, "time", line)?)
                .map_err(|e| anyhow!("Error parsing 'time' at line {}: {}", line, e))?;
            let open = Self::price(&record, &headers, "open", line)?;
            let high = Self::price(&record, &headers, "high", line)?;
            let low = Self::price(&record, &headers, "low", line)?;
            let close = Self::price(&record, &headers, "close", line)?;
            let volume = candle_format::parse_volume(Self::required(&record, &headers, "volume", line)?)
                .map_err(|e| anyhow!("Error parsing 'volume' at line {}: {}", line, e))?;

            if high < low {
                return Err(anyhow!("High below low at line {}", line));
            }
            candles.push(Candle::new(time, open, high, low, close, volume));
        }

        tracing::debug!(path = %file_path.display(), candles = candles.len(), "Candles loaded from CSV");
        Ok(candles)
    }

    fn required<'a>(record: &'a StringRecord, headers: &StringRecord, name: &str, line: usize) -> Result<&'a str> {
        Self::get_field(record, headers, name)
            .ok_or_else(|| anyhow!("Missing '{}' field in CSV record at line {}", name, line))
    }

    fn price(record: &StringRecord, headers: &StringRecord, name: &str, line: usize) -> Result<f64> {
        candle_format::parse_price(Self::required(record, headers, name, line)?)
            .map_err(|e| anyhow!("Error parsing '{}' at line {}: {}", name, line, e))
    }

    // Header lookup is case-insensitive so exports with "Time,Open,..." load as well.
    fn get_field<'a>(record: &'a StringRecord, headers: &StringRecord, name: &str) -> Option<&'a str> {
        headers
            .iter()
            .position(|header| header.eq_ignore_ascii_case(name))
            .and_then(|pos| record.get(pos))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_load_candles_from_csv_valid_data() {
        let csv_content = "\
time,open,high,low,close,volume
1704067200,187.15,187.90,186.80,187.44,1200
2024-01-01T00:05:00Z,187.44,188.10,187.30,188.00,950";
        let tmp_file = create_test_csv(csv_content);
        let candles = CsvCandleLoader::default().load_candles_from_csv(tmp_file.path()).unwrap();

        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0], Candle::new(1_704_067_200, 187.15, 187.90, 186.80, 187.44, 1200));
        assert_eq!(candles[1].time, 1_704_067_500);
        assert_eq!(candles[1].volume, 950);
    }

    #[test]
    fn test_load_candles_with_semicolons_and_reordered_columns() {
        let csv_content = "\
Volume;Close;Low;High;Open;Time
10;2.5;1.0;3.0;2.0;1704067200";
        let tmp_file = create_test_csv(csv_content);
        let candles = CsvCandleLoader::new(';').unwrap().load_candles_from_csv(tmp_file.path()).unwrap();
        assert_eq!(candles, vec![Candle::new(1_704_067_200, 2.0, 3.0, 1.0, 2.5, 10)]);
    }

    #[test]
    fn test_load_candles_from_csv_empty_file() {
        let tmp_file = create_test_csv("time,open,high,low,close,volume");
        let candles = CsvCandleLoader::default().load_candles_from_csv(tmp_file.path()).unwrap();
        assert!(candles.is_empty());
    }

    #[test]
    fn test_load_candles_from_csv_missing_field() {
        let csv_content = "\
time,open,high,low,close
1704067200,1,2,0.5,1.5";
        let tmp_file = create_test_csv(csv_content);
        let result = CsvCandleLoader::default().load_candles_from_csv(tmp_file.path());
        assert!(result.unwrap_err().to_string().contains("Missing 'volume' field"));
    }

    #[test]
    fn test_load_candles_from_csv_invalid_data_format() {
        let csv_content = "\
time,open,high,low,close,volume
1704067200,invalid,2,0.5,1.5,10";
        let tmp_file = create_test_csv(csv_content);
        let result = CsvCandleLoader::default().load_candles_from_csv(tmp_file.path());
        assert!(result.unwrap_err().to_string().contains("Error parsing 'open' at line 2"));
    }

    #[test]
    fn test_wide_delimiter_rejected() {
        assert!(CsvCandleLoader::new('→').is_err());
    }
}
