use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use freightbook_core::config::AppConfig;
use freightbook_core::domain::{ItemField, RowKey, format_total};
use freightbook_core::error::{FreightError, Result};
use freightbook_core::{
    AuthService, Backend, CalendarLister, DayKey, DocumentStore, MonthView, Role, Session,
    ShipRegistration, ShipmentEditor, open_store, register_ship,
};
use tracing::{debug, warn};

#[cfg(unix)]
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

/// Everything a command needs: configuration, the opened store and the auth service.
pub struct AppContext {
    config: AppConfig,
    store: Arc<dyn DocumentStore>,
    auth: AuthService,
}

impl AppContext {
    pub fn open(store_override: Option<PathBuf>) -> Result<Self> {
        let mut config = AppConfig::from_env()?;
        if let Some(path) = store_override {
            config.store_path = path;
        }
        Self::with_config(config)
    }

    pub fn with_config(config: AppConfig) -> Result<Self> {
        if config.dev_secret {
            warn!("FREIGHTBOOK_JWT_SECRET is not set; using the development secret");
        }
        let store = open_store(Backend::Fs(config.store_path.clone()))?;
        let auth = AuthService::new(store.clone(), config.tokens.clone());
        Ok(Self {
            config,
            store,
            auth,
        })
    }

    /// Resume the remembered session, if any. A stale token is forgotten.
    fn session(&self) -> Result<Option<Session>> {
        let token = match fs::read_to_string(&self.config.session_file) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match self.auth.resume(&token) {
            Ok(session) => Ok(Some(session)),
            Err(FreightError::AuthFailure(reason)) => {
                debug!(%reason, "dropping stale session token");
                remove_if_present(&self.config.session_file)?;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn remember(&self, session: &Session) -> Result<()> {
        let token = self.auth.issue_token(session)?;
        write_private(&self.config.session_file, &token)
    }
}

/// Write a file only the owner can read.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(0o600);
    let mut f = opts.open(path)?;
    // `mode` only applies on creation; tighten a file left by an older run too.
    #[cfg(unix)]
    f.set_permissions(fs::Permissions::from_mode(0o600))?;
    f.write_all(contents.as_bytes())?;
    f.sync_all()?;
    Ok(())
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn describe(session: &Session) -> String {
    let name = if session.profile.display_name.is_empty() {
        String::new()
    } else {
        format!(" ({})", session.profile.display_name)
    };
    format!(
        "{}{} [{}] uid={}",
        session.profile.email,
        name,
        session.role(),
        session.uid
    )
}

pub fn handle_sign_up(ctx: &AppContext, email: String, password: String, name: String) -> Result<()> {
    let session = ctx.auth.sign_up(&email, &password, &name)?;
    ctx.remember(&session)?;
    println!("signed up as {}", describe(&session));
    Ok(())
}

pub fn handle_sign_in(ctx: &AppContext, email: String, password: String) -> Result<()> {
    let session = ctx.auth.sign_in(&email, &password)?;
    ctx.remember(&session)?;
    println!("signed in as {}", describe(&session));
    Ok(())
}

pub fn handle_sign_out(ctx: &AppContext) -> Result<()> {
    ctx.auth.sign_out();
    remove_if_present(&ctx.config.session_file)?;
    println!("signed out");
    Ok(())
}

pub fn handle_whoami(ctx: &AppContext) -> Result<()> {
    match ctx.session()? {
        Some(session) => println!("{}", describe(&session)),
        None => println!("not signed in"),
    }
    Ok(())
}

pub fn handle_bootstrap_admin(ctx: &AppContext, email: String, password: String) -> Result<()> {
    if ctx.auth.bootstrap_admin(&email, &password)? {
        println!("admin account ready for {}", email.trim());
    } else {
        println!("an admin already exists; nothing changed");
    }
    Ok(())
}

pub fn handle_set_role(ctx: &AppContext, uid: String, role: String) -> Result<()> {
    let role: Role = role.parse()?;
    let caller = ctx.session()?;
    ctx.auth.set_role(caller.as_ref(), &uid, role)?;
    println!("{} is now {}", uid.trim(), role);
    Ok(())
}

pub fn handle_calendar(ctx: &AppContext, month: Option<String>) -> Result<()> {
    let month = match month {
        Some(m) => m.parse::<MonthView>()?,
        None => MonthView::current(),
    };
    let cal = CalendarLister::open(ctx.store.clone(), month)?;
    println!("{}", cal.month());
    if cal.entries().is_empty() {
        println!("  no sailings");
    }
    for entry in cal.entries() {
        println!("  {}  {}", entry.date, entry.ship_id);
    }
    Ok(())
}

pub fn handle_ship_register(ctx: &AppContext, req: ShipRegistration) -> Result<()> {
    let session = ctx.session()?;
    let (date, ship) = register_ship(ctx.store.as_ref(), session.as_ref(), &req)?;
    println!("registered {ship} on {date}");
    Ok(())
}

fn open_editor(ctx: &AppContext, date: &str, ship: &str) -> Result<ShipmentEditor> {
    let date: DayKey = date.parse()?;
    ShipmentEditor::load(ctx.store.clone(), date, ship.trim())
}

/// Accept a stored row id or a 1-based position as printed by `detail show`.
fn resolve_row(editor: &ShipmentEditor, raw: &str) -> Result<RowKey> {
    let raw = raw.trim();
    if let Some(row) = editor
        .items()
        .iter()
        .find(|r| r.key.persisted_id() == Some(raw))
    {
        return Ok(row.key.clone());
    }
    raw.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| editor.items().get(i))
        .map(|r| r.key.clone())
        .ok_or_else(|| FreightError::NotFound(format!("row {raw}")))
}

fn parse_cell(raw: &str) -> Result<(ItemField, String)> {
    let (field, value) = raw.split_once('=').ok_or_else(|| {
        FreightError::ValidationFailure(format!("`{raw}` must be written as FIELD=VALUE"))
    })?;
    Ok((field.parse()?, value.to_string()))
}

fn print_editor(editor: &ShipmentEditor) {
    let h = editor.header();
    println!("{} {}", editor.date(), editor.ship_id());
    println!(
        "  carrier={} voy={} etd={} eta={} kgs={} cbm={} pkg={}",
        h.carrier_line, h.voy, h.etd, h.eta, h.kgs, h.cbm, h.total_pkg
    );
    let headings: Vec<&str> = ItemField::ALL.iter().map(|f| f.column()).collect();
    println!("  #  ID  {}", headings.join(" | "));
    for (i, row) in editor.items().iter().enumerate() {
        let cells: Vec<&str> = ItemField::ALL.iter().map(|f| row.value.get(*f)).collect();
        println!("  {}  {}  {}", i + 1, row.key, cells.join(" | "));
    }
    let t = editor.totals();
    println!(
        "  total kgs={} cbm={} pkg={}",
        format_total(t.kgs),
        format_total(t.cbm),
        format_total(t.pkg)
    );
    if !editor.comments().is_empty() {
        println!("  comments:");
        for c in editor.comments() {
            println!("    [{}] {}: {}", c.value.created_at, c.value.user, c.value.comment);
        }
    }
}

pub fn handle_detail_show(ctx: &AppContext, date: String, ship: String) -> Result<()> {
    let editor = open_editor(ctx, &date, &ship)?;
    print_editor(&editor);
    Ok(())
}

pub fn handle_detail_set(
    ctx: &AppContext,
    date: String,
    ship: String,
    row: String,
    cells: Vec<String>,
) -> Result<()> {
    let session = ctx.session()?;
    let mut editor = open_editor(ctx, &date, &ship)?;
    let key = resolve_row(&editor, &row)?;
    for raw in &cells {
        let (field, value) = parse_cell(raw)?;
        editor.edit_cell(&key, field, &value)?;
    }
    let summary = editor.save(session.as_ref())?;
    println!("saved: {} row(s) updated", summary.updated);
    Ok(())
}

pub fn handle_detail_add_row(
    ctx: &AppContext,
    date: String,
    ship: String,
    cells: Vec<String>,
) -> Result<()> {
    let session = ctx.session()?;
    let mut editor = open_editor(ctx, &date, &ship)?;
    let parsed = cells
        .iter()
        .map(|raw| parse_cell(raw))
        .collect::<Result<Vec<_>>>()?;
    let key = editor.add_row();
    for (field, value) in parsed {
        editor.edit_cell(&key, field, &value)?;
    }
    let summary = editor.save(session.as_ref())?;
    println!("saved: {} row(s) added", summary.inserted);
    Ok(())
}

pub fn handle_detail_rm(
    ctx: &AppContext,
    date: String,
    ship: String,
    rows: Vec<String>,
    all: bool,
) -> Result<()> {
    let session = ctx.session()?;
    let mut editor = open_editor(ctx, &date, &ship)?;
    if all {
        editor.toggle_select_all();
    } else {
        let keys = rows
            .iter()
            .map(|r| resolve_row(&editor, r))
            .collect::<Result<Vec<_>>>()?;
        for key in keys {
            if !editor.selected().contains(&key) {
                editor.toggle_select(&key)?;
            }
        }
    }
    editor.delete_selected();
    let summary = editor.save(session.as_ref())?;
    println!("saved: {} row(s) deleted", summary.deleted);
    Ok(())
}

pub fn handle_detail_comment(ctx: &AppContext, date: String, ship: String, text: String) -> Result<()> {
    let session = ctx.session()?;
    let mut editor = open_editor(ctx, &date, &ship)?;
    match editor.add_comment(session.as_ref(), &text)? {
        Some(_) => println!("comment posted"),
        None if text.trim().is_empty() => println!("empty comment ignored"),
        None => println!("comment not posted: sign in with an editing role"),
    }
    Ok(())
}

pub fn handle_detail_totals(ctx: &AppContext, date: String, ship: String, write: bool) -> Result<()> {
    let mut editor = open_editor(ctx, &date, &ship)?;
    let t = editor.totals();
    println!(
        "kgs={} cbm={} pkg={}",
        format_total(t.kgs),
        format_total(t.cbm),
        format_total(t.pkg)
    );
    if write {
        let session = ctx.session()?;
        editor.write_header_totals(session.as_ref())?;
        println!("header totals updated");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use freightbook_core::WriteBatch;
    use freightbook_core::config::{ENV_JWT_SECRET, ENV_SESSION_FILE, ENV_STORE, TokenConfig};
    use freightbook_core::domain::{LineItem, ShipDetails};
    use freightbook_core::paths;
    use std::collections::HashMap;

    const SECRET: &str = "handler-test-secret-value";

    fn context(dir: &Path) -> AppContext {
        let env: HashMap<&str, String> = HashMap::from([
            (ENV_STORE, dir.join("fb.log").display().to_string()),
            (ENV_SESSION_FILE, dir.join("session").display().to_string()),
            (ENV_JWT_SECRET, SECRET.to_string()),
        ]);
        let config = AppConfig::from_lookup(|k| env.get(k).cloned()).unwrap();
        AppContext::with_config(config).unwrap()
    }

    #[test]
    fn remembered_session_resumes_and_stale_tokens_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let session_file = dir.path().join("session");

        assert_eq!(ctx.session().unwrap(), None);

        let me = ctx.auth.sign_up("clerk@example.com", "secret1", "").unwrap();
        ctx.remember(&me).unwrap();
        assert_eq!(ctx.session().unwrap().map(|s| s.uid), Some(me.uid.clone()));

        let foreign = AuthService::new(
            open_store(Backend::Mem).unwrap(),
            TokenConfig::with_secret("some-other-secret-value"),
        );
        fs::write(&session_file, foreign.issue_token(&me).unwrap()).unwrap();
        assert_eq!(ctx.session().unwrap(), None);
        assert!(!session_file.exists());

        fs::write(&session_file, "not a token").unwrap();
        assert_eq!(ctx.session().unwrap(), None);
        assert!(!session_file.exists());
    }

    #[cfg(unix)]
    #[test]
    fn session_file_is_owner_only() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path());
        let session_file = dir.path().join("session");
        fs::write(&session_file, "old").unwrap();
        fs::set_permissions(&session_file, fs::Permissions::from_mode(0o644)).unwrap();

        let me = ctx.auth.sign_up("clerk@example.com", "secret1", "").unwrap();
        ctx.remember(&me).unwrap();
        let mode = fs::metadata(&session_file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn cells_are_field_value_pairs() {
        let (field, value) = parse_cell("kgs=1,200").unwrap();
        assert_eq!(field, ItemField::Kgs);
        assert_eq!(value, "1,200");
        let (_, empty) = parse_cell("REMARK=").unwrap();
        assert_eq!(empty, "");
        assert!(matches!(parse_cell("KGS"), Err(FreightError::ValidationFailure(_))));
        assert!(parse_cell("WEIGHT=3").is_err());
    }

    #[test]
    fn rows_resolve_by_id_or_position() {
        let store = open_store(Backend::Mem).unwrap();
        let date: DayKey = "2024-03-05".parse().unwrap();
        let mut batch = WriteBatch::new();
        batch.insert(paths::ship(&date, "GA1").unwrap(), &ShipDetails::default()).unwrap();
        batch
            .insert(paths::item(&date, "GA1", "row-a").unwrap(), &LineItem::default())
            .unwrap();
        batch
            .insert(paths::item(&date, "GA1", "row-b").unwrap(), &LineItem::default())
            .unwrap();
        store.commit(batch).unwrap();

        let editor = ShipmentEditor::load(store, date, "GA1").unwrap();
        assert_eq!(
            resolve_row(&editor, "row-b").unwrap(),
            RowKey::Persisted("row-b".into())
        );
        assert_eq!(
            resolve_row(&editor, "1").unwrap(),
            RowKey::Persisted("row-a".into())
        );
        assert!(matches!(resolve_row(&editor, "0"), Err(FreightError::NotFound(_))));
        assert!(matches!(resolve_row(&editor, "3"), Err(FreightError::NotFound(_))));
    }
}
