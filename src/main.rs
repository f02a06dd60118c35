// This file is an example of how a host drives the `adaptive_accent` library.
// The library entry point is `src/lib.rs`.
//
// Usage: adaptive_accent <icon-path | #hex> [settings.toml]
//
// The argument is treated as a declared theme color when it starts with `#`, and as
// an icon file otherwise. The palette is resolved twice: once directly, and once
// through the debounced path, as a host would after a burst of change events.

use adaptive_accent::core_modules::snapshot::{ContentSnapshot, SnapshotSource, StaticSnapshot};
use adaptive_accent::error::{ProbeError, ProbeResult};
use adaptive_accent::logging::init_logging;
use adaptive_accent::{ContentKey, Coordinator, Palette, Settings};
use anyhow::{Context, bail};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Re-reads the argument on every snapshot, so edits to the icon are picked up.
struct ArgumentSource {
    argument: String,
}

impl ArgumentSource {
    async fn load(&self) -> ProbeResult<StaticSnapshot> {
        if self.argument.starts_with('#') {
            return Ok(StaticSnapshot::new().with_theme_hint("theme-color", &self.argument));
        }
        let path = PathBuf::from(&self.argument);
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|error| ProbeError::SourceUnavailable(format!("{}: {error}", path.display())))?;
        Ok(StaticSnapshot::new().with_icon(bytes))
    }
}

impl SnapshotSource for ArgumentSource {
    fn snapshot<'a>(
        &'a self,
        _key: &'a ContentKey,
    ) -> BoxFuture<'a, ProbeResult<Arc<dyn ContentSnapshot>>> {
        async move {
            let snapshot: Arc<dyn ContentSnapshot> = Arc::new(self.load().await?);
            Ok::<_, ProbeError>(snapshot)
        }
        .boxed()
    }
}

fn print_palette(label: &str, palette: &Palette) {
    println!("{label}:");
    for (name, value) in palette.css_variables() {
        println!("  {name}: {value};");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging()?;

    let mut args = env::args().skip(1);
    let Some(argument) = args.next() else {
        bail!("usage: adaptive_accent <icon-path | #hex> [settings.toml]");
    };
    let settings = match args.next() {
        Some(path) => Settings::from_toml_file(&path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => Settings::default(),
    };

    let source = Arc::new(ArgumentSource {
        argument: argument.clone(),
    });
    let coordinator = Coordinator::new(source.clone());
    coordinator.configure(settings)?;
    let key = ContentKey::new(argument.as_str());

    let snapshot = source.load().await?;
    match coordinator.resolve(&key, &snapshot).await {
        Some(palette) => print_palette("direct", &palette),
        None => {
            info!(%key, "key is excluded or coloring is disabled");
            return Ok(());
        }
    }

    let mut updates = coordinator.subscribe();
    for _ in 0..3 {
        coordinator.notify_changed(&key);
    }
    let update = updates.recv().await?;
    print_palette("debounced", &update.palette);
    if let Some(provenance) = update.provenance {
        info!(%provenance, "color source");
    }
    Ok(())
}
