//! CLI command implementations

use crate::output::{self, OutputFormat};
use avplayer_core::sim::{SimEngineFactory, SimMedia, SimSurfaceRegistry, SimTiming};
use avplayer_core::{Command, EngineProfile, MethodCall, MethodChannel, PlayerEvent, PlayerRegistry, RuntimeConfig};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Options for [`play`]
#[derive(Debug, Clone)]
pub struct PlayOptions {
    pub duration_ms: u64,
    pub live: bool,
    pub loops: u32,
    pub speed: f32,
    pub seek_ms: Option<i64>,
    pub timeout_ms: u64,
}

/// Load the runtime configuration, or the defaults without a file
pub fn load_config(path: Option<&Path>) -> anyhow::Result<RuntimeConfig> {
    match path {
        Some(path) => {
            let config = RuntimeConfig::from_json_file(path)
                .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
            info!(path = %path.display(), "Loaded runtime configuration");
            Ok(config)
        }
        None => Ok(RuntimeConfig::default()),
    }
}

fn simulated_registry(media: SimMedia, config: RuntimeConfig) -> (Arc<PlayerRegistry>, Arc<SimEngineFactory>) {
    let factory = Arc::new(SimEngineFactory::timed(media, SimTiming::default()));
    let surfaces = Arc::new(SimSurfaceRegistry::new());
    let registry = PlayerRegistry::new(config, factory.clone(), surfaces);
    (Arc::new(registry), factory)
}

/// Play one source until it finishes, fails or times out
pub async fn play(
    source: &str,
    options: PlayOptions,
    config: RuntimeConfig,
    format: &str,
) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    let media = if options.live {
        SimMedia::live()
    } else {
        SimMedia::finite(Duration::from_millis(options.duration_ms))
    };
    let (registry, factory) = simulated_registry(media, config);

    let id = registry.create()?.id;
    let mut events = registry.listen(id).await?;
    registry.command(id, Command::SetSpeed(options.speed));
    registry.command(id, Command::SetLooping(options.loops > 0));
    registry.open(id, source);

    let deadline = tokio::time::sleep(Duration::from_millis(options.timeout_ms));
    tokio::pin!(deadline);
    let mut timed_out = false;
    let mut cycles = 0;

    loop {
        tokio::select! {
            event = events.next() => {
                let Some(event) = event else {
                    break;
                };
                output::print_event(id, &event, format);
                match event {
                    PlayerEvent::MediaInfo { .. } => {
                        if let Some(millis) = options.seek_ms {
                            registry.seek_to(id, millis);
                        }
                        registry.play(id);
                    }
                    PlayerEvent::Finished => {
                        cycles += 1;
                        if options.live || cycles > options.loops {
                            break;
                        }
                    }
                    PlayerEvent::Error { .. } => break,
                    _ => {}
                }
            }
            _ = &mut deadline, if !timed_out => {
                timed_out = true;
                if options.live {
                    info!("Ending simulated broadcast");
                    if let Some(controller) = factory.last_controller() {
                        controller.finish();
                    }
                } else {
                    warn!(timeout_ms = options.timeout_ms, "Playback timed out");
                    break;
                }
            }
        }
    }

    let snapshot = registry.snapshot(id).await?;
    output::print_summary(&snapshot, format);
    registry.dispose(Some(id)).await?;
    Ok(())
}

/// One entry of a script file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptStep {
    #[serde(flatten)]
    call: MethodCall,
    /// Pause after the call
    #[serde(default)]
    wait_ms: u64,
}

/// Replay method-channel calls, printing replies and every created player's events
pub async fn script(
    file: &Path,
    duration_ms: u64,
    fail_fast: bool,
    config: RuntimeConfig,
    format: &str,
) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    let text = std::fs::read_to_string(file)?;
    let steps: Vec<ScriptStep> = serde_json::from_str(&text)?;
    info!(steps = steps.len(), file = %file.display(), "Replaying script");

    let (registry, _factory) = simulated_registry(SimMedia::finite(Duration::from_millis(duration_ms)), config);
    let channel = MethodChannel::new(registry.clone());
    let mut printers: Vec<JoinHandle<()>> = Vec::new();
    let mut failures = 0;

    for (i, step) in steps.into_iter().enumerate() {
        let method = step.call.method.clone();
        match channel.handle(step.call).await {
            Ok(reply) => {
                if format == OutputFormat::Text {
                    println!("{:>3}. {method} -> {reply}", i + 1);
                }
                if method == "create" {
                    if let Some(id) = reply.get("id").and_then(|v| v.as_i64()) {
                        let mut events = registry.listen(id).await?;
                        printers.push(tokio::spawn(async move {
                            while let Some(event) = events.next().await {
                                output::print_event(id, &event, format);
                            }
                        }));
                    }
                }
            }
            Err(e) => {
                failures += 1;
                eprintln!("{:>3}. {method} failed: {e}", i + 1);
                if fail_fast {
                    break;
                }
            }
        }
        if step.wait_ms > 0 {
            tokio::time::sleep(Duration::from_millis(step.wait_ms)).await;
        }
    }

    // Tear down whatever the script left behind; ends every event stream
    channel.handle(MethodCall::new("dispose", serde_json::Value::Null)).await?;
    for printer in printers {
        printer.await?;
    }

    if failures > 0 {
        anyhow::bail!("{failures} call(s) failed");
    }
    Ok(())
}

/// Print the effective runtime configuration
pub fn show_config(config: &RuntimeConfig, format: &str) -> anyhow::Result<()> {
    let format = OutputFormat::from(format);
    println!("{}", output::format_output(config, format)?);
    if format == OutputFormat::Text {
        println!("\nEffective intervals:");
        println!("  Position (rich): {:?}", config.position_poll_interval(EngineProfile::Rich));
        println!("  Position (legacy): {:?}", config.position_poll_interval(EngineProfile::Legacy));
        println!("  Buffer: {:?}", config.buffer_poll_interval());
        println!("  Display: {:?}", config.display_refresh_interval());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_step_shape() {
        let steps: Vec<ScriptStep> = serde_json::from_str(
            r#"[
                {"method": "create"},
                {"method": "open", "args": {"id": 1, "value": "file:///a.mp4"}, "waitMs": 250}
            ]"#,
        )
        .unwrap();
        assert_eq!(steps.len(), 2);
        assert!(steps[0].call.args.is_null());
        assert_eq!(steps[1].call.method, "open");
        assert_eq!(steps[1].wait_ms, 250);
    }

    #[test]
    fn test_default_config_without_file() {
        assert_eq!(load_config(None).unwrap(), RuntimeConfig::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_finite_source() {
        let options = PlayOptions {
            duration_ms: 200,
            live: false,
            loops: 1,
            speed: 2.0,
            seek_ms: Some(50),
            timeout_ms: 5_000,
        };
        play("file:///a.mp4", options, RuntimeConfig::default(), "json").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_live_source_ends_at_timeout() {
        let options = PlayOptions {
            duration_ms: 0,
            live: true,
            loops: 0,
            speed: 1.0,
            seek_ms: None,
            timeout_ms: 300,
        };
        play("https://live.example.com/index.m3u8", options, RuntimeConfig::default(), "text")
            .await
            .unwrap();
    }
}
