use rust_xlsxwriter::Workbook;

use crate::models::AttendanceRecord;
use crate::Error;

const COLUMNS: [&str; 9] = [
    "id",
    "student_id",
    "student_name",
    "major",
    "stage",
    "study",
    "study_group",
    "teacher_id",
    "timestamp",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    /// `None` means CSV.
    pub fn parse(raw: Option<&str>) -> Result<Self, Error> {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            None | Some("csv") => Ok(ExportFormat::Csv),
            Some("xlsx") => Ok(ExportFormat::Xlsx),
            Some(other) => Err(Error::validation(format!(
                "Unsupported export format `{}`",
                other
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }

    pub fn file_name(&self, millis: i64) -> String {
        format!("attendance_export_{}.{}", millis, self.extension())
    }

    pub fn render(&self, records: &[AttendanceRecord]) -> Result<Vec<u8>, Error> {
        match self {
            ExportFormat::Csv => to_csv(records),
            ExportFormat::Xlsx => to_xlsx(records),
        }
    }
}

fn row(record: &AttendanceRecord) -> [String; 9] {
    let opt = |value: &Option<String>| value.clone().unwrap_or_default();
    [
        record.id.to_string(),
        record.student_id.clone(),
        record.student_name.clone(),
        opt(&record.major),
        opt(&record.stage),
        opt(&record.study),
        opt(&record.study_group),
        record.teacher_id.to_string(),
        record.timestamp.to_rfc3339(),
    ]
}

fn to_csv(records: &[AttendanceRecord]) -> Result<Vec<u8>, Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(COLUMNS)?;
    for record in records {
        writer.write_record(row(record))?;
    }
    writer
        .into_inner()
        .map_err(|err| Error::internal("SerializationError", err.to_string()))
}

fn to_xlsx(records: &[AttendanceRecord]) -> Result<Vec<u8>, Error> {
    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Attendance")?;
        for (col, title) in COLUMNS.iter().enumerate() {
            sheet.write_string(0, col as u16, *title)?;
        }
        for (index, record) in records.iter().enumerate() {
            let line = index as u32 + 1;
            for (col, value) in row(record).iter().enumerate() {
                match col {
                    0 => sheet.write_number(line, 0, record.id as f64)?,
                    7 => sheet.write_number(line, 7, record.teacher_id as f64)?,
                    _ if value.is_empty() => continue,
                    _ => sheet.write_string(line, col as u16, value.as_str())?,
                };
            }
        }
    }
    Ok(workbook.save_to_buffer()?)
}
