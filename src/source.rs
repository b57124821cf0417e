use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, error, info, info_span, instrument, warn};

use crate::domain::{CompassError, Role};
use crate::entities::{Entity, kind_for};
use crate::gate::Session;
use crate::row::{Row, RowKind, Value};

pub const COLLECTIONS: [&str; 3] = ["patients", "hospitals", "users"];

const EXTENSIONS: [&str; 6] = ["csv", "parquet", "pq", "arrow", "ipc", "feather"];

#[derive(Debug)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// Who is signing in. An explicit role wins over looking the user up.
#[derive(Debug, Clone, Default)]
pub struct SessionRequest {
    pub role: Option<Role>,
    pub user: Option<String>,
}

#[derive(Debug)]
pub enum LoadEvent {
    Collection { name: &'static str, rows: Vec<Row> },
    Session(Session),
    Done,
    Failed(CompassError),
}

/// Loads all collections on a background thread. Events arrive in order:
/// one `Collection` per collection, then `Session`, then `Done`, or a
/// `Failed` that ends the stream.
pub fn spawn_loader(data_dir: PathBuf, request: SessionRequest) -> Receiver<LoadEvent> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let _span = info_span!("loader", data_dir = %data_dir.display()).entered();
        run_loader(&data_dir, &request, &tx);
    });
    rx
}

fn run_loader(data_dir: &Path, request: &SessionRequest, tx: &Sender<LoadEvent>) {
    let mut users = Vec::new();
    for name in COLLECTIONS {
        let rows = match locate(data_dir, name) {
            Some(path) => match load_collection(&path, name) {
                Ok(rows) => rows,
                Err(e) => {
                    error!("Loading {} failed: {}", name, e);
                    let _ = tx.send(LoadEvent::Failed(e));
                    return;
                }
            },
            None => {
                warn!("No {} collection in {}", name, data_dir.display());
                Vec::new()
            }
        };
        if name == "users" {
            users = rows.clone();
        }
        if tx.send(LoadEvent::Collection { name, rows }).is_err() {
            debug!("Receiver gone, stopping loader");
            return;
        }
    }
    let session = resolve_session(request, &users);
    info!("Session resolved to role {:?}", session.role);
    let _ = tx.send(LoadEvent::Session(session));
    let _ = tx.send(LoadEvent::Done);
}

pub fn resolve_session(request: &SessionRequest, users: &[Row]) -> Session {
    if request.role.is_some() {
        return Session::resolved(request.role);
    }
    let role = request
        .user
        .as_deref()
        .and_then(|email| {
            users.iter().find(|u| {
                u.get("email")
                    .is_some_and(|v| v.to_string().eq_ignore_ascii_case(email))
            })
        })
        .and_then(|u| match u.kind() {
            RowKind::User(role) => role,
            _ => None,
        });
    Session::resolved(role)
}

/// First file in `data_dir` named after the collection with a known extension.
pub fn locate(data_dir: &Path, collection: &str) -> Option<PathBuf> {
    EXTENSIONS
        .iter()
        .map(|ext| data_dir.join(format!("{collection}.{ext}")))
        .find(|p| p.is_file())
}

#[instrument(skip_all, fields(path = %path.display(), collection = %collection))]
pub fn load_collection(path: &Path, collection: &str) -> Result<Vec<Row>, CompassError> {
    // Fail on unknown collections before touching the file.
    kind_for(collection, None)?;

    let file_info = get_file_info(path.to_path_buf())?;
    let frame = match file_info.file_type {
        FileType::CSV => load_csv(&file_info.path)?,
        FileType::PARQUET => load_parquet(&file_info.path)?,
        FileType::ARROW => load_arrow(&file_info.path)?,
    };

    // Each column is converted on its own rayon worker.
    let start_time = Instant::now();
    let df = frame.collect()?;
    let columns: Result<Vec<(String, Vec<Value>)>, PolarsError> = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    let rows = assemble_rows(collection, columns?, df.height())?;

    info!(
        "Loaded {} {} rows ({} bytes) in {}ms",
        rows.len(),
        collection,
        file_info.file_size,
        start_time.elapsed().as_millis()
    );
    Ok(rows)
}

fn assemble_rows(
    collection: &str,
    columns: Vec<(String, Vec<Value>)>,
    height: usize,
) -> Result<Vec<Row>, CompassError> {
    let list_fields: Vec<&str> = Entity::ALL
        .iter()
        .filter(|e| e.collection() == collection)
        .flat_map(|e| e.list_fields().iter().copied())
        .collect();
    let ids = columns.iter().find(|(n, _)| n == "id").map(|(_, v)| v);
    let roles = columns.iter().find(|(n, _)| n == "role").map(|(_, v)| v);

    let mut rows = Vec::with_capacity(height);
    for idx in 0..height {
        let id = ids
            .map(|v| v[idx].to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("{collection}-{}", idx + 1));
        let role = roles.map(|v| v[idx].to_string());
        let mut row = Row::new(id, kind_for(collection, role.as_deref())?);
        for (name, values) in columns.iter().filter(|(n, _)| n != "id") {
            let value = match &values[idx] {
                Value::Text(s) if list_fields.contains(&name.as_str()) => split_list(s),
                other => other.clone(),
            };
            row.set(name.clone(), value);
        }
        rows.push(row);
    }
    Ok(rows)
}

fn split_list(s: &str) -> Value {
    Value::List(
        s.split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(Value::from)
            .collect(),
    )
}

fn clean_text(s: &str) -> String {
    s.replace("\r\n", " ↵ ").replace('\n', " ↵ ")
}

fn is_numeric_type(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int32
            | DataType::Int64
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<Value>), PolarsError> {
    let series = df.column(col_name)?.as_materialized_series();
    let values: Vec<Value> = match series.dtype() {
        DataType::Boolean => series
            .bool()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Bool))
            .collect(),
        DataType::List(_) => series
            .list()?
            .into_iter()
            .map(|item| item.map_or(Ok(Value::Null), |inner| list_value(&inner)))
            .collect::<Result<Vec<Value>, PolarsError>>()?,
        dtype if is_numeric_type(dtype) => series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, Value::Number))
            .collect(),
        _ => series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| v.map_or(Value::Null, |s| Value::Text(clean_text(s))))
            .collect(),
    };
    Ok((col_name.to_string(), values))
}

fn list_value(inner: &Series) -> Result<Value, PolarsError> {
    let items = inner
        .cast(&DataType::String)?
        .str()?
        .into_iter()
        .map(|v| v.map_or(Value::Null, |s| Value::Text(clean_text(s))))
        .collect();
    Ok(Value::List(items))
}

fn detect_file_type(path: &Path) -> Result<FileType, CompassError> {
    match path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_uppercase())
        .as_deref()
    {
        Some("CSV") => Ok(FileType::CSV),
        Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
        Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
        _ => Err(CompassError::UnknownFileType(path.to_path_buf())),
    }
}

fn get_file_info(path: PathBuf) -> Result<FileInfo, CompassError> {
    let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CompassError::FileNotFound(path.clone()),
        ErrorKind::PermissionDenied => CompassError::PermissionDenied(path.clone()),
        _ => CompassError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(CompassError::loading_failed(format!(
            "{} is not a file",
            path.display()
        )));
    }

    let file_type = detect_file_type(&path)?;

    Ok(FileInfo {
        file_size: metadata.len(),
        path,
        file_type,
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
