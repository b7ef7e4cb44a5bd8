use std::rc::Rc;

use anyhow::{anyhow, Context, Result};
use playmode_core::{LocationKind, ModeManifest, PlayMode, LAST_RUN_FORMAT};
use playmode_engine::{
    clear_runtime_cache, garbage_collect, is_available_offline, GameLayout, GcReport, HttpFetcher,
    InstallState, LocationOutcome, MigrationReport, ModeEngine, ModeSwitch, RetryingFetcher,
    SwitchReport,
};

use tracing::debug;

use crate::config::{
    load_config, resolve_config, resolve_config_location, ConfigOverrides, ResolvedConfig,
    CONFIG_ENV,
};
use crate::metadata::{find_mode, load_manifest};
use crate::render::{render_status_line, OutputStyle, TerminalRenderer};
use crate::{Cli, Commands};

pub(crate) fn run_cli(cli: Cli) -> Result<()> {
    let location = resolve_config_location(cli.config.as_deref(), std::env::var_os(CONFIG_ENV))?;
    debug!(path = %location.path.display(), explicit = location.explicit, "loading config");
    let file = load_config(&location)?;
    let config = resolve_config(
        file,
        ConfigOverrides {
            game_root: cli.game_root,
            documents_root: cli.documents_root,
            manifest: cli.manifest,
        },
        &location,
    )?;
    let renderer = TerminalRenderer::current();

    match cli.command {
        Commands::List { offline } => {
            let manifest = load_configured_manifest(&config)?;
            let state = InstallState::read(&config.layout);
            let lines = format_mode_lines(
                &manifest,
                state.last_used_mode(),
                |mode| is_available_offline(&config.layout, mode),
                offline,
                renderer.style(),
            );
            if lines.is_empty() {
                println!("No play modes available offline");
            } else {
                renderer.print_lines(&lines);
            }
        }
        Commands::Status => {
            let state = InstallState::read(&config.layout);
            renderer.print_lines(&format_status_lines(&config.layout, &state));
        }
        Commands::Switch { mode, offline } => {
            let manifest = load_configured_manifest(&config)?;
            run_switch_command(&config, &manifest, &mode, offline, renderer)?;
        }
        Commands::ClearCache => {
            let flush = clear_runtime_cache(&config.layout)?;
            let status = if flush.failed == 0 { "ok" } else { "warn" };
            renderer.print_status(
                status,
                &format!(
                    "cleared runtime cache (removed={}, failed={})",
                    flush.removed, flush.failed
                ),
            );
        }
        Commands::Gc => {
            let manifest = load_configured_manifest(&config)?;
            let report = garbage_collect(&config.layout, &manifest.play_modes)?;
            renderer.print_lines(&format_gc_lines(&report, renderer.style()));
        }
    }

    Ok(())
}

fn load_configured_manifest(config: &ResolvedConfig) -> Result<ModeManifest> {
    load_manifest(config.manifest_source()?)
}

fn run_switch_command(
    config: &ResolvedConfig,
    manifest: &ModeManifest,
    mode_name: &str,
    offline: bool,
    renderer: TerminalRenderer,
) -> Result<()> {
    let selected = find_mode(manifest, mode_name)?;
    let layout = &config.layout;
    layout
        .ensure_roots_exist()
        .context("cannot switch play mode")?;
    if offline && !is_available_offline(layout, selected) {
        return Err(anyhow!(
            "play mode '{}' is not available offline; run without --offline to download it",
            selected.name
        ));
    }

    let progress = renderer.download_progress().map(Rc::new);
    let mut fetcher = HttpFetcher::new()?;
    if let Some(progress) = &progress {
        let progress = Rc::clone(progress);
        fetcher = fetcher.with_progress(move |url, downloaded, total| {
            progress.update(url, downloaded, total)
        });
    }
    let engine = ModeEngine::new(
        layout.clone(),
        RetryingFetcher::new(fetcher, config.fetch_policy),
    );

    renderer.print_section(&format!("Switching to {}", selected.name));
    let outcome = engine.switch_with_user_data(selected, manifest);
    if let Some(progress) = &progress {
        progress.finish();
    }
    let ModeSwitch {
        previous,
        migration,
        report,
        rollback,
    } = outcome?;
    debug!(previous = ?previous, selected = %selected.name, "resolved mode transition");

    renderer.print_lines(&format_migration_lines(
        &migration,
        previous.as_deref(),
        &selected.name,
        renderer.style(),
    ));
    renderer.print_lines(&format_switch_report_lines(&report, renderer.style()));
    if let Some(rollback) = &rollback {
        renderer.print_lines(&format_rollback_lines(
            rollback,
            previous.as_deref().unwrap_or("none"),
            renderer.style(),
        ));
    }
    if !report.is_success() {
        let failed = report
            .failures()
            .map(|(location, _)| location.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(anyhow!(
            "switch to '{}' did not complete; failed location(s): {failed}",
            report.mode
        ));
    }
    Ok(())
}

pub(crate) fn format_mode_lines(
    manifest: &ModeManifest,
    installed: Option<&str>,
    available_offline: impl Fn(&PlayMode) -> bool,
    offline_only: bool,
    style: OutputStyle,
) -> Vec<String> {
    manifest
        .play_modes
        .iter()
        .filter_map(|mode| {
            let offline = available_offline(mode);
            if offline_only && !offline {
                return None;
            }
            let is_installed = installed == Some(mode.name.as_str());
            let mut line = format!(
                "{} (multiplayer={}, offline={})",
                mode.name,
                yes_no(mode.multiplayer_compatible),
                yes_no(offline)
            );
            if is_installed {
                line.push_str(" [installed]");
            }
            let status = if is_installed { "ok" } else { "step" };
            Some(render_status_line(style, status, &line))
        })
        .collect()
}

pub(crate) fn format_status_lines(layout: &GameLayout, state: &InstallState) -> Vec<String> {
    let mut lines = vec![
        format!("game root: {}", layout.game_root().display()),
        format!("documents root: {}", layout.documents_root().display()),
    ];
    lines.extend(
        LocationKind::ALL
            .into_iter()
            .map(|location| match state.record(location) {
                Some(record) => format!(
                    "{location}: {} {} (last run {})",
                    record.mode,
                    record.version,
                    record.last_run.format(LAST_RUN_FORMAT)
                ),
                None => format!("{location}: not installed"),
            }),
    );
    lines.push(format!(
        "last used mode: {}",
        state.last_used_mode().unwrap_or("none")
    ));
    lines
}

pub(crate) fn format_migration_lines(
    report: &MigrationReport,
    previous: Option<&str>,
    current: &str,
    style: OutputStyle,
) -> Vec<String> {
    if report.backed_up == 0 && report.restored == 0 && report.is_clean() {
        return Vec::new();
    }

    let mut lines = vec![render_status_line(
        style,
        if report.is_clean() { "ok" } else { "warn" },
        &format!(
            "user data: backed up {} file(s) for {}, restored {} file(s) for {current}",
            report.backed_up,
            previous.unwrap_or("none"),
            report.restored
        ),
    )];
    for path in &report.failed {
        lines.push(render_status_line(
            style,
            "warn",
            &format!("user data: could not migrate {}", path.display()),
        ));
    }
    lines
}

pub(crate) fn format_rollback_lines(
    report: &MigrationReport,
    previous: &str,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = vec![render_status_line(
        style,
        if report.is_clean() { "warn" } else { "err" },
        &format!(
            "user data: restored {} file(s) for {previous} after the incomplete switch",
            report.restored
        ),
    )];
    for path in &report.failed {
        lines.push(render_status_line(
            style,
            "err",
            &format!("user data: could not move back {}", path.display()),
        ));
    }
    lines
}

pub(crate) fn format_switch_report_lines(report: &SwitchReport, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    for location in &report.locations {
        let (status, message) = match &location.outcome {
            LocationOutcome::UpToDate => (
                "step",
                format!("{}: up-to-date (version={})", location.location, location.version),
            ),
            LocationOutcome::Installed {
                artifact,
                from_cache,
            } => (
                "ok",
                format!(
                    "{}: installed {} ({}, artifact={})",
                    location.location,
                    location.version,
                    if *from_cache { "cache" } else { "downloaded" },
                    artifact.display()
                ),
            ),
            LocationOutcome::RecordedWithoutContent => (
                "ok",
                format!(
                    "{}: recorded {} (no content)",
                    location.location, location.version
                ),
            ),
            LocationOutcome::Failed { reason } => (
                "err",
                format!("{}: failed (reason={reason})", location.location),
            ),
        };
        lines.push(render_status_line(style, status, &message));

        if let Some(cleanup) = &location.cleanup {
            if !cleanup.removed.is_empty() {
                lines.push(render_status_line(
                    style,
                    "ok",
                    &format!(
                        "{}: removed {} path(s) owned by other modes",
                        location.location,
                        cleanup.removed.len()
                    ),
                ));
            }
            for path in &cleanup.failed {
                lines.push(render_status_line(
                    style,
                    "warn",
                    &format!("{}: could not remove {}", location.location, path.display()),
                ));
            }
        }
    }

    if let Some(gc) = &report.gc {
        if !gc.is_empty() {
            lines.extend(format_gc_lines(gc, style));
        }
    }
    if report.runtime_cache_flushed {
        lines.push(render_status_line(style, "ok", "runtime cache cleared"));
    }
    let status = if report.is_success() { "ok" } else { "err" };
    let summary = if report.is_success() {
        format!("switched to {}", report.mode)
    } else {
        format!("switch to {} incomplete", report.mode)
    };
    lines.push(render_status_line(style, status, &summary));
    lines
}

pub(crate) fn format_gc_lines(report: &GcReport, style: OutputStyle) -> Vec<String> {
    let mut lines = vec![render_status_line(
        style,
        if report.failed.is_empty() { "ok" } else { "warn" },
        &format!(
            "cache: removed {} retired mode(s), {} superseded version(s)",
            report.removed_modes.len(),
            report.removed_versions.len()
        ),
    )];
    for path in &report.failed {
        lines.push(render_status_line(
            style,
            "warn",
            &format!("cache: could not remove {}", path.display()),
        ));
    }
    lines
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

