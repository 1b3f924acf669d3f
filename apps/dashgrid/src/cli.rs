//! # CLI Commands
//!
//! One function per subcommand. `main.rs` parses arguments and dispatches
//! here; tests call these functions directly.
//!
//! Editing commands work on the local store only. `dashgrid sync` brings the
//! local copy and the remote copy together.

use crate::api;
use crate::config::{Backend, Config};
use crate::error::{AppError, AppResult};
use crate::now;
use crate::remote::HttpRemote;
use crate::storage::{BoxedStore, FileStore, open_store};
use crate::sync::{FlushOutcome, SaveOutcome, SyncedStorage};
use dashgrid_core::formats::{self, MAGIC, checksum, decode_binary, encode_binary, from_json};
use dashgrid_core::{
    DashboardService, DashboardState, Position, RedbStore, SessionInfo, Size, WidgetId, WidgetKind,
};
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

// =============================================================================
// LOAD / SAVE HELPERS
// =============================================================================

/// Open the local store and load its dashboard, creating an empty one if
/// nothing was saved yet.
pub fn load_or_create(config: &Config) -> AppResult<(BoxedStore, DashboardService)> {
    let store = open_store(config)?;
    let service = match store.load()? {
        Some(state) => DashboardService::from_state(state)?,
        None => DashboardService::new(config.columns)?,
    };
    Ok((store, service))
}

/// Open the local store and load its dashboard, failing if there is none.
pub fn load_existing(config: &Config) -> AppResult<(BoxedStore, DashboardService)> {
    let store = open_store(config)?;
    let state = store.load()?.ok_or(AppError::NotInitialized)?;
    Ok((store, DashboardService::from_state(state)?))
}

/// Stamp the session and write the dashboard back.
pub fn save_dashboard(
    store: &mut BoxedStore,
    service: &mut DashboardService,
    config: &Config,
) -> AppResult<()> {
    service.attach_session(new_session(config));
    store.save(service.state())?;
    debug!(
        store = %store.describe(),
        revision = service.state().revision,
        "dashboard saved"
    );
    Ok(())
}

fn new_session(config: &Config) -> SessionInfo {
    SessionInfo::new(uuid::Uuid::new_v4().to_string(), &config.device, now())
}

// =============================================================================
// RENDERING
// =============================================================================

/// Draw the layout as text, one character per cell.
///
/// Each widget is drawn with the last base-36 digit of its id; free cells
/// are `.`. Rows below the lowest widget are not drawn.
pub fn render_grid(state: &DashboardState) -> String {
    let columns = state.columns as usize;
    let height = state.height() as usize;
    let mut cells = vec!['.'; columns * height];

    for widget in &state.widgets {
        let r = widget.rect;
        let glyph = id_glyph(widget.id);
        for y in r.y as usize..r.bottom() as usize {
            let row = y * columns;
            if let Some(span) = cells.get_mut(row + r.x as usize..row + r.right() as usize) {
                span.fill(glyph);
            }
        }
    }

    let mut out = String::with_capacity(height * (columns + 1));
    for row in cells.chunks(columns.max(1)) {
        out.extend(row);
        out.push('\n');
    }
    out
}

fn id_glyph(id: WidgetId) -> char {
    char::from_digit((id.0 % 36) as u32, 36).unwrap_or('?')
}

fn print_summary(state: &DashboardState) {
    println!(
        "{} widget(s), {} columns, {} rows, revision {}",
        state.widget_count(),
        state.columns,
        state.height(),
        state.revision
    );
}

// =============================================================================
// COMMANDS
// =============================================================================

/// Create an empty dashboard. Refuses to overwrite unless `force` is set.
///
/// Forcing over an existing dashboard resets that document, so its id
/// counter and revision keep counting and the reset wins over older copies
/// when synced.
pub fn cmd_init(config: &Config, columns: u32, force: bool) -> AppResult<()> {
    let mut store = open_store(config)?;
    let mut service = match store.load()? {
        Some(_) if !force => return Err(AppError::AlreadyExists(config.db_path.clone())),
        Some(existing) => DashboardService::from_state(existing)?,
        None => DashboardService::new(columns)?,
    };

    service.reset(columns, now())?;
    save_dashboard(&mut store, &mut service, config)?;

    info!(dashboard = %config.dashboard, columns, "dashboard initialized");
    println!(
        "Initialized dashboard '{}' ({} columns) at {}",
        config.dashboard,
        columns,
        store.describe()
    );
    Ok(())
}

/// Print the layout.
pub fn cmd_show(config: &Config, json: bool) -> AppResult<()> {
    let (_, service) = load_existing(config)?;
    let state = service.state();

    if json {
        println!("{}", formats::to_json_string(state)?);
        return Ok(());
    }

    print_summary(state);
    print!("{}", render_grid(state));
    for widget in &state.widgets {
        let r = widget.rect;
        println!(
            "  [{}] {:<13} {:<24} at ({}, {}) size {}x{}",
            id_glyph(widget.id),
            widget.kind,
            widget.title,
            r.x,
            r.y,
            r.w,
            r.h
        );
    }
    Ok(())
}

/// Print document metadata.
pub fn cmd_status(config: &Config, json: bool) -> AppResult<()> {
    let (store, service) = load_existing(config)?;
    let state = service.state();

    if json {
        let status = json!({
            "store": store.describe(),
            "dashboard": config.dashboard,
            "schema_version": state.schema_version,
            "columns": state.columns,
            "widgets": state.widget_count(),
            "rows": state.height(),
            "revision": state.revision,
            "updated_at": state.updated_at.millis(),
            "session": state.session,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("Store:      {}", store.describe());
        println!("Dashboard:  {}", config.dashboard);
        print_summary(state);
        println!("Updated at: {} ms", state.updated_at.millis());
        if let Some(session) = &state.session {
            println!("Last write: {} ({})", session.device, session.session_id);
        }
    }
    Ok(())
}

/// Add a widget at the first free position and return its id.
pub fn cmd_add(
    config: &Config,
    kind: &str,
    title: Option<&str>,
    w: Option<u32>,
    h: Option<u32>,
) -> AppResult<WidgetId> {
    let kind: WidgetKind = kind.parse()?;
    let (mut store, mut service) = load_or_create(config)?;

    let size = match (w, h) {
        (None, None) => None,
        (w, h) => {
            let default = kind.default_size();
            Some(Size::new(w.unwrap_or(default.w), h.unwrap_or(default.h)))
        }
    };
    let id = service.add_widget(kind, title, size, now())?;
    save_dashboard(&mut store, &mut service, config)?;

    if let Some(widget) = service.state().widget(id) {
        let r = widget.rect;
        println!(
            "Added {} widget {} at ({}, {}) size {}x{}",
            kind, id, r.x, r.y, r.w, r.h
        );
    }
    Ok(id)
}

pub fn cmd_remove(config: &Config, id: u64) -> AppResult<()> {
    let (mut store, mut service) = load_existing(config)?;
    let widget = service.remove_widget(WidgetId(id), now())?;
    save_dashboard(&mut store, &mut service, config)?;
    println!("Removed {} widget {}", widget.kind, widget.id);
    Ok(())
}

pub fn cmd_move(config: &Config, id: u64, x: u32, y: u32) -> AppResult<()> {
    let (mut store, mut service) = load_existing(config)?;
    service.move_widget(WidgetId(id), Position::new(x, y), now())?;
    save_dashboard(&mut store, &mut service, config)?;
    println!("Moved widget {} to ({}, {})", id, x, y);
    Ok(())
}

pub fn cmd_resize(config: &Config, id: u64, w: u32, h: u32) -> AppResult<()> {
    let (mut store, mut service) = load_existing(config)?;
    let applied = service.resize_widget(WidgetId(id), Size::new(w, h), now())?;
    save_dashboard(&mut store, &mut service, config)?;
    println!("Resized widget {} to {}x{}", id, applied.w, applied.h);
    Ok(())
}

/// Rename a widget and/or replace its settings (`key=value` pairs).
pub fn cmd_update(
    config: &Config,
    id: u64,
    title: Option<&str>,
    settings: &[String],
) -> AppResult<()> {
    let settings = if settings.is_empty() {
        None
    } else {
        let mut map = BTreeMap::new();
        for pair in settings {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                AppError::Config(format!("setting '{pair}' must look like key=value"))
            })?;
            map.insert(key.trim().to_string(), value.trim().to_string());
        }
        Some(map)
    };

    let (mut store, mut service) = load_existing(config)?;
    service.update_widget(WidgetId(id), title, settings, now())?;
    save_dashboard(&mut store, &mut service, config)?;
    println!("Updated widget {}", id);
    Ok(())
}

/// Change the grid width and reflow.
pub fn cmd_columns(config: &Config, columns: u32) -> AppResult<()> {
    let (mut store, mut service) = load_existing(config)?;
    let moved = service.set_columns(columns, now())?;
    save_dashboard(&mut store, &mut service, config)?;
    println!("Grid is now {} columns; {} widget(s) re-placed", columns, moved);
    Ok(())
}

pub fn cmd_compact(config: &Config) -> AppResult<()> {
    let (mut store, mut service) = load_existing(config)?;
    let moved = service.compact(now());
    if moved > 0 {
        save_dashboard(&mut store, &mut service, config)?;
    }
    println!("Compacted: {} widget(s) moved", moved);
    Ok(())
}

/// Write the dashboard to `output` as `json` or `binary`.
pub fn cmd_export(config: &Config, output: &Path, format: &str) -> AppResult<()> {
    let (_, service) = load_existing(config)?;
    let bytes = match format {
        "json" => formats::to_json(service.state())?,
        "binary" | "dgrd" => encode_binary(service.state())?,
        other => {
            return Err(AppError::Config(format!(
                "unknown export format '{other}' (expected 'json' or 'binary')"
            )));
        }
    };

    std::fs::write(output, &bytes)?;
    println!(
        "Exported {} bytes to {} (checksum {})",
        bytes.len(),
        output.display(),
        checksum(&bytes)
    );
    Ok(())
}

/// Replace the local dashboard with an export. The format is detected from
/// the file contents.
///
/// The import counts as a fresh write: it is stamped with the current time
/// and its revision is bumped, so the next sync pushes it instead of
/// adopting whatever the remote held.
pub fn cmd_import(config: &Config, input: &Path) -> AppResult<()> {
    let bytes = std::fs::read(input)?;
    let state = if bytes.starts_with(&MAGIC) {
        decode_binary(&bytes)?
    } else {
        from_json(&bytes)?
    };

    let mut store = open_store(config)?;
    let mut service = DashboardService::from_state(state)?;
    service.touch(now());
    save_dashboard(&mut store, &mut service, config)?;
    println!(
        "Imported {} widget(s) into {}",
        service.state().widget_count(),
        store.describe()
    );
    Ok(())
}

/// List the dashboards held by the local store.
pub fn cmd_dashboards(config: &Config) -> AppResult<Vec<String>> {
    let names = match config.backend {
        Backend::Redb => RedbStore::open(&config.db_path, &config.dashboard)?.list_dashboards()?,
        Backend::File => FileStore::list_dashboards(&config.db_path)?,
    };
    for name in &names {
        println!("{}", name);
    }
    Ok(names)
}

/// Reconcile the local copy with the remote once, or keep doing so every
/// `watch` seconds.
///
/// In watch mode local edits made by other commands are picked up and pushed;
/// while the remote is down they wait in the offline queue.
pub async fn cmd_sync(config: &Config, watch: Option<u64>, json: bool) -> AppResult<()> {
    let url = config.remote_url.as_deref().ok_or(AppError::NoRemote)?;
    let remote = HttpRemote::new(url, config.api_key.as_deref())?;
    let mut synced = SyncedStorage::new(open_store(config)?, remote);

    let mut last_seen = synced.load().await?;
    report_sync(&synced, last_seen.as_ref(), json)?;

    let Some(secs) = watch else {
        return Ok(());
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("sync watch stopped");
                return Ok(());
            }
        }

        let local = synced.local().load()?;
        let changed = match (&local, &last_seen) {
            (Some(local), Some(seen)) => local.is_newer_than(seen),
            (Some(_), None) => true,
            _ => false,
        };

        if let (true, Some(state)) = (changed, local.as_ref()) {
            match synced.save(state).await? {
                SaveOutcome::Superseded(remote) => last_seen = Some(remote),
                SaveOutcome::Synced | SaveOutcome::Queued => last_seen = local.clone(),
            }
        } else {
            match synced.flush().await? {
                FlushOutcome::Idle => last_seen = synced.load().await?,
                FlushOutcome::Delivered | FlushOutcome::Discarded | FlushOutcome::StillOffline => {}
            }
        }
        report_sync(&synced, last_seen.as_ref(), json)?;
    }
}

fn report_sync<S: dashgrid_core::DashboardStore>(
    synced: &SyncedStorage<S>,
    state: Option<&DashboardState>,
    json: bool,
) -> AppResult<()> {
    let status = synced.status();
    if json {
        println!("{}", serde_json::to_string(&status)?);
        return Ok(());
    }

    let mode = if status.online { "online" } else { "offline" };
    match state {
        Some(state) => println!(
            "[{}] revision {} ({} widget(s)); {} pending",
            mode,
            state.revision,
            state.widget_count(),
            status.pending
        ),
        None => println!("[{}] no dashboard on either side", mode),
    }
    Ok(())
}

/// Serve the local dashboard over HTTP.
pub async fn cmd_serve(config: &Config) -> AppResult<()> {
    let store = open_store(config)?;
    api::serve(config, store).await
}
