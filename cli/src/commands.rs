use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, TimeZone};
use taprule_core::clock::now_ms;
use taprule_core::engine::Evaluator;
use taprule_core::node::{NodeId, NodeTree, RawNode};
use taprule_core::selector::{Selector, SelectorSyntaxError, query_selector, query_selector_all};
use taprule_core::subscription::{AppRawExt, parse_group_raw, parse_subscription};
use taprule_core::{ActionKind, SettingsExt, SnapshotSource, TopActivity};
use tokio::sync::mpsc;

use crate::CliContext;

fn read_text(path: &str) -> Result<String, String> {
    std::fs::read_to_string(path).map_err(|e| format!("cannot read {path}: {e}"))
}

fn current_tree(ctx: &CliContext) -> Result<NodeTree, String> {
    ctx.snapshot
        .snapshot()
        .ok_or_else(|| "no window loaded, use `tree <file>` first".to_string())
}

fn describe(tree: &NodeTree, node: NodeId) -> String {
    let attrs = tree.attrs(node);
    let b = attrs.bounds;
    format!(
        "{:?} {} text={:?} id={:?} [{},{},{},{}]",
        tree.path(node),
        attrs.name.as_deref().unwrap_or("?"),
        attrs.text.as_deref().unwrap_or(""),
        attrs.id.as_deref().unwrap_or(""),
        b.left,
        b.top,
        b.right,
        b.bottom
    )
}

fn format_ms(ms: i64) -> String {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ms.to_string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Documents
// ─────────────────────────────────────────────────────────────────────────────

/// Validate a subscription file without importing it
pub fn check(path: &str) -> Result<(), String> {
    let doc = parse_subscription(&read_text(path)?).map_err(|e| e.to_string())?;
    println!("{} (id {}, version {})", doc.label(), doc.id, doc.version);

    let mut invalid_total = 0;
    for app in &doc.apps {
        let invalid = app.invalid_groups();
        invalid_total += invalid.len();
        println!("  {}: {} groups", app.id, app.groups.len());
        for (key, error) in invalid {
            let detail = std::error::Error::source(&error)
                .map(|s| format!(": {s}"))
                .unwrap_or_default();
            println!("    group {key} invalid: {error}{detail}");
        }
    }

    if invalid_total > 0 {
        println!("{invalid_total} invalid groups will be skipped");
    }
    Ok(())
}

pub async fn list(ctx: &CliContext) -> Result<(), String> {
    let subscriptions = ctx.engine.subscriptions().await;
    if subscriptions.is_empty() {
        println!("No subscriptions");
        return Ok(());
    }

    let counts = ctx.engine.click_counts().map_err(|e| e.to_string())?;
    println!(
        "{:<8} {:<8} {:<8} {:<8} {:<30} Updated",
        "Id", "Version", "Enabled", "Clicks", "Name"
    );
    println!("{}", "-".repeat(88));
    for s in subscriptions {
        println!(
            "{:<8} {:<8} {:<8} {:<8} {:<30} {}",
            s.item.id,
            s.doc.version,
            s.item.enable,
            counts.get(&s.item.id).copied().unwrap_or(0),
            s.doc.label(),
            format_ms(s.item.mtime)
        );
    }
    Ok(())
}

pub async fn import(ctx: &CliContext, path: &str, url: Option<String>) -> Result<(), String> {
    let id = ctx
        .engine
        .import_text(&read_text(path)?, url)
        .await
        .map_err(|e| e.to_string())?;
    println!("Imported subscription {id}");
    Ok(())
}

pub async fn new_local(ctx: &CliContext, name: &str) -> Result<(), String> {
    let id = ctx.engine.create_local(name).await.map_err(|e| e.to_string())?;
    println!("Created local subscription {id}");
    Ok(())
}

pub async fn add_group(ctx: &CliContext, subs: i64, app: &str, path: &str) -> Result<(), String> {
    ctx.engine
        .add_from_source(subs, app, &read_text(path)?)
        .await
        .map_err(|e| e.to_string())?;
    println!("Added to {app} in subscription {subs}");
    Ok(())
}

pub async fn edit_group(
    ctx: &CliContext,
    subs: i64,
    app: &str,
    key: i32,
    path: &str,
) -> Result<(), String> {
    let group = parse_group_raw(&read_text(path)?).map_err(|e| e.to_string())?;
    ctx.engine
        .edit_group(subs, app, key, group)
        .await
        .map_err(|e| e.to_string())?;
    println!("Updated group {key}");
    Ok(())
}

pub async fn delete_group(ctx: &CliContext, subs: i64, app: &str, key: i32) -> Result<(), String> {
    ctx.engine
        .delete_group(subs, app, key)
        .await
        .map_err(|e| e.to_string())?;
    println!("Deleted group {key}");
    Ok(())
}

/// `state` is `on`, `off` or `default`
pub async fn set_group(
    ctx: &CliContext,
    subs: i64,
    app: &str,
    key: i32,
    state: &str,
) -> Result<(), String> {
    let result = match state {
        "on" => ctx.engine.set_group_enabled(subs, app, key, true).await,
        "off" => ctx.engine.set_group_enabled(subs, app, key, false).await,
        "default" => ctx.engine.clear_group_override(subs, app, key).await,
        other => return Err(format!("expected on, off or default, got '{other}'")),
    };
    result.map_err(|e| e.to_string())
}

pub async fn set_app(ctx: &CliContext, subs: i64, app: &str, enable: bool) -> Result<(), String> {
    ctx.engine
        .set_app_enabled(subs, app, enable)
        .await
        .map_err(|e| e.to_string())
}

pub async fn set_subscription(ctx: &CliContext, subs: i64, enable: bool) -> Result<(), String> {
    ctx.engine
        .set_subscription_enabled(subs, enable)
        .await
        .map_err(|e| e.to_string())
}

pub async fn remove(ctx: &CliContext, subs: i64) -> Result<(), String> {
    ctx.engine
        .remove_subscription(subs)
        .await
        .map_err(|e| e.to_string())
}

pub async fn refresh(ctx: &CliContext) -> Result<(), String> {
    let summary = ctx.engine.refresh_now().await;
    println!(
        "updated {:?}, {} up to date, {} failed",
        summary.updated, summary.unchanged, summary.failed
    );
    Ok(())
}

pub async fn reload(ctx: &CliContext) -> Result<(), String> {
    let changed = ctx.engine.reload().await;
    println!("{changed} subscriptions changed on disk");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Windows & Matching
// ─────────────────────────────────────────────────────────────────────────────

/// Load a window snapshot (JSON `RawNode`) as the current window
pub fn load_tree(ctx: &CliContext, path: &Path) -> Result<(), String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let raw: RawNode = serde_json::from_str(&text).map_err(|e| e.to_string())?;
    let tree = NodeTree::from_raw(&raw);
    let package = tree.attrs(tree.root()).package.clone();
    println!(
        "Loaded {} nodes, {} levels, package {}",
        tree.len(),
        tree.height(),
        package.as_deref().unwrap_or("?")
    );
    if let Some(package) = package {
        ctx.engine.window_state_changed(&package, None);
    }
    ctx.snapshot.set_tree(Some(tree));
    Ok(())
}

pub fn query(ctx: &CliContext, source: &str, all: bool) -> Result<(), String> {
    let selector: Selector = source.parse().map_err(|e: SelectorSyntaxError| e.to_string())?;
    let tree = current_tree(ctx)?;

    let matches = if all {
        query_selector_all(&tree, tree.root(), &selector)
    } else {
        query_selector(&tree, tree.root(), &selector)
            .into_iter()
            .collect()
    };

    if matches.is_empty() {
        println!("No match for {selector}");
    }
    for node in matches {
        println!("{}", describe(&tree, node));
    }
    Ok(())
}

pub fn exec(ctx: &CliContext, source: &str, action: ActionKind) -> Result<(), String> {
    match ctx
        .engine
        .exec_click_action(source, action)
        .map_err(|e| e.to_string())?
    {
        Some(path) => println!("{} on {:?}", action.as_str(), path),
        None => println!("No match"),
    }
    Ok(())
}

/// Save a capture of the screen as PNG
pub async fn screenshot(ctx: &CliContext, path: &Path) -> Result<(), String> {
    let shot = ctx
        .engine
        .capture_screenshot()
        .await
        .map_err(|e| format!("no screenshot: {e}"))?;
    std::fs::write(path, &shot.png).map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    println!("{}x{} saved to {}", shot.width, shot.height, path.display());
    Ok(())
}

/// One evaluation pass of the current window with fresh rule state
pub async fn simulate(ctx: &CliContext) -> Result<(), String> {
    let tree = current_tree(ctx)?;
    let app_id = tree
        .attrs(tree.root())
        .package
        .clone()
        .ok_or("window root has no package")?;

    let rules = Arc::new(ctx.engine.rules_for(&app_id).await);
    println!("{} active rules for {app_id}", rules.len());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut evaluator = Evaluator::new(ctx.executor.clone(), tx);
    let foreground = TopActivity::new(app_id, None);
    let report = evaluator.run_pass(&rules, &tree, &foreground, now_ms(), || true);

    while let Ok(log) = rx.try_recv() {
        println!(
            "fired subs {} group {} rule {} (index {})",
            log.subs_id, log.group_key, log.rule_key, log.rule_index
        );
    }
    println!(
        "{} fired, {} armed (delayed), {} failed",
        report.fired, report.armed, report.failed
    );
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Service
// ─────────────────────────────────────────────────────────────────────────────

pub async fn start(ctx: &CliContext) -> Result<(), String> {
    if ctx.start_engine().await {
        println!("Engine started");
        Ok(())
    } else {
        Err("engine already started".to_string())
    }
}

/// Run the engine against the current window for `seconds`
pub async fn run(ctx: &CliContext, seconds: u64) -> Result<(), String> {
    current_tree(ctx)?;
    if !ctx.start_engine().await {
        return Err("engine already started".to_string());
    }
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {}
        _ = tokio::signal::ctrl_c() => {}
    }
    ctx.engine.stop().await;
    println!("{} actions performed", ctx.executor.performed().len());
    Ok(())
}

pub async fn stop(ctx: &CliContext) -> Result<(), String> {
    ctx.engine.stop().await;
    println!("Engine stopped");
    Ok(())
}

pub async fn set_service(ctx: &CliContext, enable: bool) -> Result<(), String> {
    ctx.engine.set_service_enabled(enable).await;
    let mut settings = ctx.settings.write().await;
    settings.enable_service = enable;
    settings.save().map_err(|e| e.to_string())
}

pub async fn show_settings(ctx: &CliContext) -> Result<(), String> {
    let settings = ctx.settings.read().await;
    if let Ok(path) = taprule_core::EngineSettings::config_path() {
        println!("config: {}", path.display());
    }
    println!("data:   {}", ctx.data_dir().display());
    println!("{settings:#?}");
    println!(
        "service {}, foreground {:?}",
        if ctx.engine.is_service_enabled() { "on" } else { "off" },
        ctx.engine.foreground()
    );
    match ctx.engine.last_refresh_ms().await {
        Some(ms) => println!("last refresh {}", format_ms(ms)),
        None => println!("no refresh yet"),
    }
    Ok(())
}

pub fn logs(ctx: &CliContext, limit: usize) -> Result<(), String> {
    let logs = ctx
        .engine
        .recent_click_logs(limit)
        .map_err(|e| e.to_string())?;
    let total: u64 = ctx
        .engine
        .click_counts()
        .map_err(|e| e.to_string())?
        .values()
        .fold(0, |acc, n| acc.saturating_add(*n));
    println!("{total} clicks recorded");
    if logs.is_empty() {
        println!("No click logs");
    }
    for log in logs {
        println!(
            "{}  {:<30} subs {} group {} rule {}",
            format_ms(log.timestamp),
            log.app_id.as_deref().unwrap_or("?"),
            log.subs_id,
            log.group_key,
            log.rule_key
        );
    }
    Ok(())
}

pub fn exit() {
    write!(std::io::stdout(), "quitting...").ok();
    std::io::stdout().flush().ok();
}
