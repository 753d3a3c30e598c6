use polars::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument, trace, warn};
use tracing_error::SpanTrace;

use crate::domain::{Company, DirError};

const BUNDLED_COMPANIES: &str = include_str!("../data/companies.json");

// Columns read from tabular files, in this order.
const COLUMNS: [&str; 4] = ["id", "name", "location", "industry"];

#[derive(Debug)]
enum FileType {
    JSON,
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Where the directory comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSource {
    Bundled,
    File(PathBuf),
    Http(String),
}

impl DataSource {
    pub fn describe(&self) -> String {
        match self {
            DataSource::Bundled => "bundled directory".to_string(),
            DataSource::File(path) => path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("???")
                .to_string(),
            DataSource::Http(url) => url.clone(),
        }
    }
}

#[derive(Debug)]
pub enum LoadOutcome {
    Loaded {
        companies: Vec<Company>,
        elapsed: Duration,
    },
    Failed(String),
}

/// Handle on a running background load. Delivers exactly one [`LoadOutcome`].
pub struct LoadTask {
    receiver: Receiver<LoadOutcome>,
    done: bool,
}

impl LoadTask {
    /// Non-blocking. Returns the outcome once, `None` before and after.
    pub fn poll(&mut self) -> Option<LoadOutcome> {
        if self.done {
            return None;
        }
        let outcome = match self.receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Disconnected) => {
                LoadOutcome::Failed("loader stopped without a result".to_string())
            }
        };
        self.done = true;
        Some(outcome)
    }

    /// Blocks until the outcome arrives.
    pub fn wait(self) -> LoadOutcome {
        self.receiver
            .recv()
            .unwrap_or_else(|_| LoadOutcome::Failed("loader stopped without a result".into()))
    }
}

/// Start loading `source` on a background thread.
///
/// `delay` is slept before loading starts, it simulates a slow backend.
pub fn spawn_load(source: DataSource, delay: Duration) -> Result<LoadTask, DirError> {
    let (sender, receiver) = mpsc::channel();
    thread::Builder::new()
        .name("loader".to_string())
        .spawn(move || {
            if !delay.is_zero() {
                trace!("Delaying load by {}ms", delay.as_millis());
                thread::sleep(delay);
            }
            let start_time = Instant::now();
            let outcome = match load(&source) {
                Ok(companies) => LoadOutcome::Loaded {
                    companies,
                    elapsed: start_time.elapsed(),
                },
                Err(e) => {
                    error!(error = %e, span_trace = %SpanTrace::capture(), "Loading {} failed", source.describe());
                    LoadOutcome::Failed(e.to_string())
                }
            };
            // The receiver is gone when the app quit while loading.
            if sender.send(outcome).is_err() {
                debug!("Load result dropped, nobody is waiting for it");
            }
        })?;
    Ok(LoadTask {
        receiver,
        done: false,
    })
}

/// Load the full directory from `source`, blocking.
#[instrument(skip_all, fields(source = %source.describe()))]
pub fn load(source: &DataSource) -> Result<Vec<Company>, DirError> {
    let companies = match source {
        DataSource::Bundled => parse_companies(BUNDLED_COMPANIES)?,
        DataSource::File(path) => load_file(path)?,
        DataSource::Http(url) => fetch_companies(url)?,
    };
    warn_duplicate_ids(&companies);
    info!("Loaded {} companies", companies.len());
    Ok(companies)
}

pub fn parse_companies(json: &str) -> Result<Vec<Company>, DirError> {
    Ok(serde_json::from_str(json)?)
}

/// `GET url`, expecting a JSON array of companies.
pub fn fetch_companies(url: &str) -> Result<Vec<Company>, DirError> {
    debug!("Requesting {url}");
    let response = reqwest::blocking::get(url)?;
    let status = response.status();
    if !status.is_success() {
        return Err(DirError::HttpStatus(status.as_u16()));
    }
    Ok(response.json()?)
}

/// Expand `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, DirError> {
    let expanded = shellexpand::full(raw)
        .map_err(|e| DirError::LoadingFailed(format!("cannot expand {raw}: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

pub fn load_file(path: &Path) -> Result<Vec<Company>, DirError> {
    let file_info = get_file_info(path)?;
    info!(
        "Loading {} as {:?} ({} bytes)",
        file_info.path.display(),
        file_info.file_type,
        file_info.file_size
    );
    let frame = match file_info.file_type {
        FileType::JSON => return parse_companies(&fs::read_to_string(&file_info.path)?),
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };
    let df = frame.collect()?;
    companies_from_frame(&df)
}

fn companies_from_frame(df: &DataFrame) -> Result<Vec<Company>, DirError> {
    // Each column is converted in its own thread.
    let c_: Result<Vec<Option<Vec<Option<String>>>>, PolarsError> =
        COLUMNS.par_iter().map(|name| load_column(df, name)).collect();
    let mut columns = c_?.into_iter();

    let (Some(ids), Some(names), Some(locations), Some(industries)) =
        (columns.next(), columns.next(), columns.next(), columns.next())
    else {
        return Err(DirError::LoadingFailed("column conversion incomplete".into()));
    };
    let Some(names) = names else {
        return Err(DirError::LoadingFailed("missing \"name\" column".into()));
    };

    let companies = names
        .into_iter()
        .enumerate()
        .map(|(row, name)| Company {
            id: cell(&ids, row).unwrap_or_else(|| (row + 1).to_string()),
            name: name.unwrap_or_default(),
            location: cell(&locations, row),
            industry: cell(&industries, row),
        })
        .collect();
    Ok(companies)
}

fn cell(column: &Option<Vec<Option<String>>>, row: usize) -> Option<String> {
    column.as_ref().and_then(|data| data.get(row).cloned().flatten())
}

// `None` when the frame has no such column.
fn load_column(df: &DataFrame, col_name: &str) -> Result<Option<Vec<Option<String>>>, PolarsError> {
    let Ok(column) = df.column(col_name) else {
        trace!("Column {col_name} not present");
        return Ok(None);
    };
    let col = column.cast(&DataType::String)?;
    let series = col.str()?;
    let data = series
        .into_iter()
        .map(|value| value.map(|s| s.trim().to_string()))
        .collect();
    Ok(Some(data))
}

fn warn_duplicate_ids(companies: &[Company]) {
    let mut seen = HashSet::new();
    for company in companies {
        if !seen.insert(company.id.as_str()) {
            warn!("Duplicate company id {}", company.id);
        }
    }
}

fn detect_file_type(path: &Path) -> Result<FileType, DirError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("JSON") => Ok(FileType::JSON),
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(DirError::UnknownFileType),
    }
}

fn get_file_info(path: &Path) -> Result<FileInfo, DirError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => DirError::FileNotFound,
        ErrorKind::PermissionDenied => DirError::PermissionDenied,
        _ => DirError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(DirError::LoadingFailed("Not a file!".into()));
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        file_size: metadata.len(),
        file_type: detect_file_type(path)?,
    })
}

fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyCsvReader::new(PlPath::Local(path.into()))
        .with_has_header(true)
        .finish()
}

fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
}

fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
    LazyFrame::scan_ipc(
        PlPath::Local(path.into()),
        polars::io::ipc::IpcScanOptions,
        UnifiedScanArgs::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn bundled_directory_parses() {
        let companies = load(&DataSource::Bundled).unwrap();
        assert!(companies.len() > 10);
        assert_eq!(companies[0].id, "1");
        assert!(companies.iter().all(|c| c.location.is_some() && c.industry.is_some()));
    }

    #[test]
    fn detects_file_types_case_insensitive() {
        assert!(matches!(detect_file_type(Path::new("a.CSV")), Ok(FileType::CSV)));
        assert!(matches!(detect_file_type(Path::new("a.pq")), Ok(FileType::PARQUET)));
        assert!(matches!(detect_file_type(Path::new("a.feather")), Ok(FileType::ARROW)));
        assert!(matches!(detect_file_type(Path::new("a.json")), Ok(FileType::JSON)));
        assert!(matches!(
            detect_file_type(Path::new("a.xlsx")),
            Err(DirError::UnknownFileType)
        ));
        assert!(matches!(
            detect_file_type(Path::new("noext")),
            Err(DirError::UnknownFileType)
        ));
    }

    #[test]
    fn missing_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_file(&dir.path().join("gone.csv")).unwrap_err();
        assert!(matches!(err, DirError::FileNotFound));

        let err = load_file(dir.path()).unwrap_err();
        assert!(matches!(err, DirError::LoadingFailed(_)));
    }

    #[test]
    fn loads_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "companies.json",
            r#"[{"id": 1, "name": "Acme", "location": "NY", "industry": "Tech"}]"#,
        );
        let companies = load_file(&path).unwrap();
        assert_eq!(companies, vec![Company::new("1", "Acme", "NY", "Tech")]);
    }

    #[test]
    fn broken_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "companies.json", r#"{"id": 1}"#);
        assert!(matches!(load_file(&path), Err(DirError::JsonError(_))));
    }

    #[test]
    fn loads_csv_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "companies.csv",
            "id,name,location,industry\n1,Acme,NY,Tech\n2,Bolt,SF,Tech\n3,Cove,,Retail\n",
        );
        let companies = load_file(&path).unwrap();
        assert_eq!(companies.len(), 3);
        assert_eq!(companies[1], Company::new("2", "Bolt", "SF", "Tech"));
        assert_eq!(companies[2].location, None);
    }

    #[test]
    fn csv_without_optional_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "companies.csv", "name,location\nAcme,NY\nBolt,SF\n");
        let companies = load_file(&path).unwrap();
        assert_eq!(companies[0].id, "1");
        assert_eq!(companies[1].id, "2");
        assert_eq!(companies[1].industry, None);
    }

    #[test]
    fn csv_without_name_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "companies.csv", "id,location\n1,NY\n");
        assert!(matches!(load_file(&path), Err(DirError::LoadingFailed(_))));
    }

    #[test]
    fn background_load_delivers_once() {
        let mut task = spawn_load(DataSource::Bundled, Duration::ZERO).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        let outcome = loop {
            if let Some(outcome) = task.poll() {
                break outcome;
            }
            assert!(Instant::now() < deadline, "loader never finished");
            thread::sleep(Duration::from_millis(5));
        };
        assert!(matches!(outcome, LoadOutcome::Loaded { ref companies, .. } if !companies.is_empty()));
        assert!(task.poll().is_none());
    }

    #[test]
    fn background_load_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        let source = DataSource::File(dir.path().join("missing.json"));
        match spawn_load(source, Duration::ZERO).unwrap().wait() {
            LoadOutcome::Failed(message) => assert!(message.contains("not found")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn expands_home() {
        let expanded = expand_path("plain/path.csv").unwrap();
        assert_eq!(expanded, PathBuf::from("plain/path.csv"));
    }

    #[test]
    fn describes_sources() {
        assert_eq!(DataSource::File("/tmp/x/companies.csv".into()).describe(), "companies.csv");
        assert_eq!(DataSource::Bundled.describe(), "bundled directory");
    }
}
