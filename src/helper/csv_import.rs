use crate::helper::sanitization_helpers::clean_optional;
use crate::models::NewPost;
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CsvImportError {
    #[error("CSV is empty or invalid")]
    Empty,
    #[error("No row has enough data to create a post")]
    NoUsableRows,
    #[error("CSV payload is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),
    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

pub type CsvRow = HashMap<String, String>;

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

fn fold(input: &str) -> String {
    input.trim().to_lowercase().chars().map(fold_diacritic).collect()
}

/// `" Tema/Pauta "` -> `tema_pauta`, `Horário` -> `horario`.
pub fn normalize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut pending_sep = false;
    for c in fold(key).chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(c);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Splits one line on commas outside quotes; `""` inside quotes is a literal quote.
pub fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    fields.push(current);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

/// Header row keys are normalised; short rows yield empty strings.
pub fn parse_csv(text: &str) -> Vec<CsvRow> {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(header_line) = lines.next() else {
        return Vec::new();
    };
    let header: Vec<String> = split_csv_line(header_line).iter().map(|h| normalize_key(h)).collect();
    lines
        .map(|line| {
            let cols = split_csv_line(line);
            header
                .iter()
                .enumerate()
                .map(|(idx, key)| (key.clone(), cols.get(idx).cloned().unwrap_or_default()))
                .collect()
        })
        .collect()
}

fn weekday_index(name: &str) -> Option<u32> {
    let base = name.strip_suffix("-feira").unwrap_or(name);
    match base {
        "domingo" => Some(0),
        "segunda" => Some(1),
        "terca" => Some(2),
        "quarta" => Some(3),
        "quinta" => Some(4),
        "sexta" => Some(5),
        "sabado" => Some(6),
        _ => None,
    }
}

/// Schedule parser for the `data` and `horario` columns.
pub struct ScheduleParser {
    date_re: Regex,
    time_re: Regex,
}

impl ScheduleParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(ScheduleParser {
            date_re: Regex::new(r"^(\d{1,2})[/-](\d{1,2})(?:[/-](\d{2,4}))?")?,
            time_re: Regex::new(r"(\d{1,2}):(\d{2})")?,
        })
    }

    /// `dd/mm[/yy|yyyy]` or a weekday name (next occurrence, today included).
    /// Time defaults to 12:00. Anything unparseable is unscheduled.
    pub fn parse(&self, date: Option<&str>, time: Option<&str>, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let raw_date = date.map(str::trim).filter(|d| !d.is_empty())?;
        let (hour, minute) = time
            .and_then(|t| self.time_re.captures(t.trim()))
            .and_then(|caps| Some((caps[1].parse::<u32>().ok()?, caps[2].parse::<u32>().ok()?)))
            .unwrap_or((12, 0));

        let day = if let Some(caps) = self.date_re.captures(raw_date) {
            let day: u32 = caps[1].parse().ok()?;
            let month: u32 = caps[2].parse().ok()?;
            let year: i32 = match caps.get(3).map(|m| m.as_str()) {
                Some(y) if y.len() == 2 => 2000 + y.parse::<i32>().ok()?,
                Some(y) => y.parse().ok()?,
                None => now.year(),
            };
            NaiveDate::from_ymd_opt(year, month, day)?
        } else {
            let target = weekday_index(&fold(raw_date))?;
            let today = now.date_naive();
            let current = today.weekday().num_days_from_sunday();
            today + Duration::days(i64::from((target + 7 - current) % 7))
        };

        let naive = day.and_hms_opt(hour, minute, 0)?;
        Some(Utc.from_utc_datetime(&naive))
    }
}

fn first_present<'a>(row: &'a CsvRow, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| row.get(*k))
        .map(|v| v.trim())
        .find(|v| !v.is_empty())
}

/// Maps parsed rows to draft posts for `organization_id`.
pub fn rows_to_posts(
    rows: &[CsvRow],
    organization_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<NewPost>, CsvImportError> {
    if rows.is_empty() {
        return Err(CsvImportError::Empty);
    }
    let parser = ScheduleParser::new()?;

    let posts: Vec<NewPost> = rows
        .iter()
        .filter_map(|row| {
            let date = first_present(row, &["data", "data_da_publicacao"]);
            let time = first_present(row, &["horario", "hora"]);
            let channel = clean_optional(first_present(row, &["canal", "plataforma"]));
            let topic = clean_optional(first_present(row, &["tema_pauta", "tema", "pauta"]));
            let format = clean_optional(first_present(row, &["formato"]));
            let pillar = clean_optional(first_present(row, &["pilar_de_conteudo", "pilar"]));
            let objective = clean_optional(first_present(row, &["objetivo"]));
            let scheduled_at = parser.parse(date, time, now);

            if topic.is_none() && channel.is_none() && scheduled_at.is_none() {
                return None;
            }

            let notes: Vec<String> = [("Formato", format), ("Pilar", pillar), ("Objetivo", objective)]
                .into_iter()
                .filter_map(|(label, value)| value.map(|v| format!("{label}: {v}")))
                .collect();

            Some(NewPost {
                title: topic.clone().or_else(|| channel.clone()).unwrap_or_else(|| "Post".to_string()),
                channel,
                scheduled_at,
                topic,
                script: None,
                notes: (!notes.is_empty()).then(|| notes.join(" | ")),
                organization_id: organization_id.map(str::to_string),
            })
        })
        .collect();

    if posts.is_empty() {
        return Err(CsvImportError::NoUsableRows);
    }
    Ok(posts)
}

/// Full pipeline from an uploaded body to posts ready for insertion.
pub fn import_csv(
    body: &[u8],
    organization_id: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Vec<NewPost>, CsvImportError> {
    let text = String::from_utf8(body.to_vec())?;
    let text = text.trim_start_matches('\u{feff}');
    rows_to_posts(&parse_csv(text), organization_id, now)
}
