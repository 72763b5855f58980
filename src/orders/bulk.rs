//! Bulk order operations and the JSON entry points of the `orderlog` binary.
//!
//! Bulk edits validate each item on its own. Invalid items are reported in
//! the outcome and skipped; the valid ones are applied as a single undoable
//! step. A batch never aborts part way.
//!
//! # Usage
//!
//! ```bash
//! echo '{"query": "acme"}' | orderlog list
//! echo '{}' | orderlog lanes
//! echo '{"items": [...]}' | orderlog import
//! echo '{}' | orderlog export
//! echo '{"ids": ["..."], "status": "in progress"}' | orderlog set-status
//! echo '{"ids": ["..."], "color": "#FFCC00"}' | orderlog set-color
//! echo '{"ids": ["..."], "field": "vendor_name", "value": "Acme"}' | orderlog edit
//! ```
//!
//! # JSON Format for `list`
//!
//! ```json
//! {
//!   "query": "acme",
//!   "statuses": ["NotReady", "InProgress"],
//!   "date_from": "2024-01-01",
//!   "sort_by_status": true
//! }
//! ```
//!
//! Filter and display fields share one object. All fields are optional.

use crate::config::OrderLogConfig;
use crate::error::{Error, Result};
use crate::orders::filter::FilterCriteria;
use crate::orders::grouping::{DisplayOptions, OrderItemGroup, StatusLanes};
use crate::orders::id::OrderId;
use crate::orders::linking::expand_to_full_linked_groups;
use crate::orders::models::{normalize_color, EditableField, OrderItem, OrderStatus};
use crate::orders::service::OrderLog;
use crate::orders::store::{OrderRepository, SqliteOrderStore};
use crate::orders::undo::{
    BatchAction, ColorChangeAction, FieldEditAction, StatusChangeAction, UndoableAction,
};
use crate::paths;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// One item a bulk operation could not apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkItemError {
    /// The id as supplied.
    pub id: String,
    /// Why it was skipped.
    pub message: String,
}

/// Result of a bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// Items changed.
    pub succeeded: usize,
    /// Items skipped.
    pub failed: usize,
    /// One entry per skipped item.
    pub errors: Vec<BulkItemError>,
}

impl BulkOutcome {
    fn fail(&mut self, id: impl Into<String>, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(BulkItemError { id: id.into(), message: message.into() });
    }
}

/// Resolve id strings to known items, recording failures in `outcome`.
fn resolve_ids<R: OrderRepository>(
    log: &OrderLog<R>,
    ids: &[String],
    outcome: &mut BulkOutcome,
) -> Vec<OrderItem> {
    let mut resolved = Vec::new();
    for raw in ids {
        match raw.parse::<OrderId>() {
            Ok(id) => match log.collections().find(&id) {
                Some(item) => resolved.push(item),
                None => outcome.fail(raw.as_str(), "item not found"),
            },
            Err(_) => outcome.fail(raw.as_str(), "not a valid id"),
        }
    }
    resolved
}

/// Set one field on many items.
///
/// Items whose note type lacks the field are skipped.
pub fn bulk_edit_field<R: OrderRepository>(
    log: &mut OrderLog<R>,
    ids: &[String],
    field: EditableField,
    value: &str,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    let mut actions: Vec<Box<dyn UndoableAction>> = Vec::new();

    for item in resolve_ids(log, ids, &mut outcome) {
        if field.applies_to(item.note_type) {
            actions.push(Box::new(FieldEditAction::new(*item.id(), field, value)));
        } else {
            let message = format!("field does not apply to {}", item.note_type.as_str());
            outcome.fail(item.id().to_string(), message);
        }
    }

    outcome.succeeded = actions.len();
    if !actions.is_empty() {
        log.execute(Box::new(BatchAction::new(format!("Edit {} items", actions.len()), actions)));
    }
    outcome
}

/// Set the status of many items (and their linked groups).
pub fn bulk_set_status<R: OrderRepository>(
    log: &mut OrderLog<R>,
    ids: &[String],
    status: OrderStatus,
    now: NaiveDateTime,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    let resolved: Vec<OrderId> =
        resolve_ids(log, ids, &mut outcome).iter().map(|item| *item.id()).collect();
    if resolved.is_empty() {
        return outcome;
    }

    let expanded =
        log.collections().with_all(|active, _| expand_to_full_linked_groups(&resolved, active));
    outcome.succeeded = expanded.len();
    let accrual = log.accrual();
    log.execute(Box::new(StatusChangeAction::with_accrual(expanded, status, now, accrual)));
    outcome
}

/// Recolor many items. An invalid color fails every item.
pub fn bulk_set_color<R: OrderRepository>(
    log: &mut OrderLog<R>,
    ids: &[String],
    color_hex: &str,
) -> BulkOutcome {
    let mut outcome = BulkOutcome::default();
    let normalized = normalize_color(color_hex);
    if normalized.len() != 6 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
        for id in ids {
            outcome.fail(id.as_str(), format!("invalid color: {color_hex}"));
        }
        return outcome;
    }

    let resolved: Vec<OrderId> =
        resolve_ids(log, ids, &mut outcome).iter().map(|item| *item.id()).collect();
    outcome.succeeded = resolved.len();
    if !resolved.is_empty() {
        log.execute(Box::new(ColorChangeAction::new(resolved, format!("#{normalized}"))));
    }
    outcome
}

/// Input for `list`: filters and display options in one object.
#[derive(Debug, Default, Deserialize)]
pub struct ListInput {
    /// Filters.
    #[serde(flatten)]
    pub criteria: FilterCriteria,
    /// Sorting.
    #[serde(flatten)]
    pub options: DisplayOptions,
}

/// Output of `list`.
#[derive(Debug, Serialize)]
pub struct ListOutput {
    /// Number of groups.
    pub count: usize,
    /// Display groups in order.
    pub groups: Vec<OrderItemGroup>,
}

/// Input for `lanes`.
#[derive(Debug, Default, Deserialize)]
pub struct LanesInput {
    /// Filters.
    #[serde(flatten)]
    pub criteria: FilterCriteria,
}

/// Input for `import`.
#[derive(Debug, Deserialize)]
pub struct ImportInput {
    /// Items to add, archived ones included.
    pub items: Vec<OrderItem>,
}

/// Output of `import`.
#[derive(Debug, Default, Serialize)]
pub struct ImportOutput {
    /// Items added.
    pub imported: usize,
    /// Items skipped (duplicate ids or empty placeholders).
    pub skipped: usize,
    /// Whether the result was written to storage.
    pub saved: bool,
}

/// Output of `export`.
#[derive(Debug, Serialize)]
pub struct ExportOutput {
    /// Number of items.
    pub count: usize,
    /// Every item, active first.
    pub items: Vec<OrderItem>,
}

/// Input for `set-status`.
#[derive(Debug, Deserialize)]
pub struct SetStatusInput {
    /// Ids to change.
    pub ids: Vec<String>,
    /// Target status, e.g. `"in progress"`.
    pub status: String,
}

/// Input for `set-color`.
#[derive(Debug, Deserialize)]
pub struct SetColorInput {
    /// Ids to change.
    pub ids: Vec<String>,
    /// New color, with or without `#`.
    pub color: String,
}

/// Input for `edit`.
#[derive(Debug, Deserialize)]
pub struct EditInput {
    /// Ids to change.
    pub ids: Vec<String>,
    /// Field to set.
    pub field: EditableField,
    /// New value.
    pub value: String,
}

fn parse_input<T: serde::de::DeserializeOwned + Default>(input: &str) -> Result<T> {
    if input.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(input)?)
}

/// List display groups from JSON input.
///
/// # Errors
///
/// Returns an error if the JSON input is invalid.
pub fn list_from_json<R: OrderRepository>(log: &OrderLog<R>, input: &str) -> Result<ListOutput> {
    let input: ListInput = parse_input(input)?;
    let groups = log.display(&input.criteria, &input.options);
    Ok(ListOutput { count: groups.len(), groups })
}

/// Status lanes from JSON input.
///
/// # Errors
///
/// Returns an error if the JSON input is invalid.
pub fn lanes_from_json<R: OrderRepository>(log: &OrderLog<R>, input: &str) -> Result<StatusLanes> {
    let input: LanesInput = parse_input(input)?;
    Ok(log.status_lanes(&input.criteria))
}

/// Import items from JSON input and save.
///
/// # Errors
///
/// Returns an error if the JSON input is invalid.
pub fn import_from_json<R: OrderRepository>(
    log: &OrderLog<R>,
    input: &str,
) -> Result<ImportOutput> {
    let input: ImportInput = serde_json::from_str(input)?;
    let mut output = ImportOutput::default();

    for item in input.items {
        if item.is_practically_empty() {
            output.skipped += 1;
            continue;
        }
        let added = if item.is_archived {
            log.collections().add_to_archived(item)
        } else {
            log.collections().add_to_items(item)
        };
        if added {
            output.imported += 1;
        } else {
            output.skipped += 1;
        }
    }

    output.saved = log.save();
    Ok(output)
}

/// Every item, active then archived.
pub fn export<R: OrderRepository>(log: &OrderLog<R>) -> ExportOutput {
    let items = log.collections().snapshot_all();
    ExportOutput { count: items.len(), items }
}

/// Bulk status change from JSON input.
///
/// # Errors
///
/// Returns an error if the JSON input is invalid or names an unknown status.
pub fn set_status_from_json<R: OrderRepository>(
    log: &mut OrderLog<R>,
    input: &str,
    now: NaiveDateTime,
) -> Result<BulkOutcome> {
    let input: SetStatusInput = serde_json::from_str(input)?;
    let status =
        OrderStatus::from_str(&input.status).map_err(|e| Error::InvalidInput(e.to_string()))?;
    Ok(bulk_set_status(log, &input.ids, status, now))
}

/// Bulk recolor from JSON input.
///
/// # Errors
///
/// Returns an error if the JSON input is invalid.
pub fn set_color_from_json<R: OrderRepository>(
    log: &mut OrderLog<R>,
    input: &str,
) -> Result<BulkOutcome> {
    let input: SetColorInput = serde_json::from_str(input)?;
    Ok(bulk_set_color(log, &input.ids, &input.color))
}

/// Bulk field edit from JSON input.
///
/// # Errors
///
/// Returns an error if the JSON input is invalid.
pub fn edit_from_json<R: OrderRepository>(
    log: &mut OrderLog<R>,
    input: &str,
) -> Result<BulkOutcome> {
    let input: EditInput = serde_json::from_str(input)?;
    Ok(bulk_edit_field(log, &input.ids, input.field, &input.value))
}

/// Resolve the order database path.
///
/// `ORDERLOG_DB_PATH` wins, then the configured path, then `~/.soup/`.
///
/// # Errors
///
/// Returns an error if no location can be determined.
pub fn default_db_path(config: &OrderLogConfig) -> Result<PathBuf> {
    if let Ok(path) = env::var("ORDERLOG_DB_PATH") {
        return Ok(PathBuf::from(path));
    }
    config
        .database_path
        .clone()
        .or_else(paths::database_path)
        .ok_or_else(|| Error::Config("cannot determine the home directory".to_string()))
}

/// Open and load the OrderLog at the default location.
///
/// # Errors
///
/// Returns an error if the config cannot be read or the database cannot be
/// opened.
pub fn open_default_log() -> Result<OrderLog<SqliteOrderStore>> {
    let config = OrderLogConfig::load()?.unwrap_or_default();
    let store = SqliteOrderStore::new(default_db_path(&config)?)?;
    let mut log = OrderLog::new(store, config);
    log.load();
    Ok(log)
}

/// Print usage information for the orderlog CLI.
pub fn print_usage() {
    eprintln!(
        r##"Usage: orderlog <command>

Commands:
  list        Grouped, filtered, sorted active items (stdin)
  lanes       Active order groups bucketed by status (stdin)
  import      Add items from JSON input and save (stdin)
  export      Dump every stored item
  set-status  Change the status of items and their groups (stdin)
  set-color   Recolor items (stdin)
  edit        Set one text field on items (stdin)

JSON format for 'list':
  {{"query": "acme", "statuses": ["InProgress"], "sort_by_status": true}}
  All fields optional. Empty object {{}} lists everything.

JSON format for 'import':
  {{"items": [{{"id": "...", "vendor_name": "...", "created_at": "...", ...}}]}}

JSON format for 'set-status':
  {{"ids": ["..."], "status": "on deck"}}

JSON format for 'set-color':
  {{"ids": ["..."], "color": "#FFCC00"}}

JSON format for 'edit':
  {{"ids": ["..."], "field": "transfer_numbers", "value": "T-1001"}}

The database defaults to ~/.soup/orderlog.sqlite3; set ORDERLOG_DB_PATH to override.
"##
    );
}
