//! Method-channel dispatch
//!
//! Decodes host method calls (`{"method": "seekTo", "args": {"id": 1, "value": 5000}}`)
//! into registry operations. Argument shapes:
//!
//! | method                            | args                              |
//! |-----------------------------------|-----------------------------------|
//! | `create`                          | none; replies `{id[, subId]}`     |
//! | `dispose`                         | id, or none for all players       |
//! | `close`, `play`, `pause`          | id                                |
//! | `open`                            | `{id, value: source}`             |
//! | `seekTo`                          | `{id, value: millis}`             |
//! | `setVolume`, `setSpeed`           | `{id, value: number}`             |
//! | `setLooping`, `setShowSubtitle`   | `{id, value: bool}`               |
//! | `setMaxResolution`                | `{id, width, height}`             |
//! | `setMaxBitrate`                   | `{id, value}`                     |
//! | `setPreferred*Language`           | `{id, value: string}`             |
//! | `overrideTrack`                   | `{id, groupId, trackId, value}`   |

use crate::actor::Command;
use crate::registry::PlayerRegistry;
use crate::types::PlayerId;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

/// One host method call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, args: Value) -> Self {
        Self {
            method: method.into(),
            args,
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdValue<T> {
    id: PlayerId,
    value: T,
}

#[derive(Debug, Deserialize)]
struct MaxResolutionArgs {
    id: PlayerId,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverrideTrackArgs {
    id: PlayerId,
    group_id: usize,
    track_id: usize,
    value: bool,
}

fn parse<T: DeserializeOwned>(method: &str, args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| Error::invalid_argument(method, e.to_string()))
}

/// Routes method calls to a [`PlayerRegistry`]
#[derive(Debug, Clone)]
pub struct MethodChannel {
    registry: Arc<PlayerRegistry>,
}

impl MethodChannel {
    pub fn new(registry: Arc<PlayerRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    /// Handle one call; the reply is `null` except for `create`
    #[instrument(skip(self, call), fields(method = %call.method))]
    pub async fn handle(&self, call: MethodCall) -> Result<Value> {
        let MethodCall { method, args } = call;
        let registry = &self.registry;
        let (id, command) = match method.as_str() {
            "create" => {
                let created = registry.create()?;
                return Ok(serde_json::to_value(created)?);
            }
            "dispose" => {
                let id = if args.is_null() {
                    None
                } else {
                    Some(parse::<PlayerId>(&method, args)?)
                };
                registry.dispose(id).await?;
                return Ok(Value::Null);
            }
            "close" => (parse(&method, args)?, Command::Close),
            "play" => (parse(&method, args)?, Command::Play),
            "pause" => (parse(&method, args)?, Command::Pause),
            "open" => {
                let a: IdValue<String> = parse(&method, args)?;
                (a.id, Command::Open(a.value))
            }
            "seekTo" => {
                let a: IdValue<i64> = parse(&method, args)?;
                (a.id, Command::SeekTo(a.value))
            }
            "setVolume" => {
                let a: IdValue<f64> = parse(&method, args)?;
                (a.id, Command::SetVolume(a.value as f32))
            }
            "setSpeed" => {
                let a: IdValue<f64> = parse(&method, args)?;
                (a.id, Command::SetSpeed(a.value as f32))
            }
            "setLooping" => {
                let a: IdValue<bool> = parse(&method, args)?;
                (a.id, Command::SetLooping(a.value))
            }
            "setMaxResolution" => {
                let a: MaxResolutionArgs = parse(&method, args)?;
                (a.id, Command::SetMaxResolution { width: a.width, height: a.height })
            }
            "setMaxBitrate" => {
                let a: IdValue<u64> = parse(&method, args)?;
                (a.id, Command::SetMaxBitrate(a.value))
            }
            "setPreferredAudioLanguage" => {
                let a: IdValue<String> = parse(&method, args)?;
                (a.id, Command::SetPreferredAudioLanguage(a.value))
            }
            "setPreferredSubtitleLanguage" => {
                let a: IdValue<String> = parse(&method, args)?;
                (a.id, Command::SetPreferredSubtitleLanguage(a.value))
            }
            "setShowSubtitle" => {
                let a: IdValue<bool> = parse(&method, args)?;
                (a.id, Command::SetShowSubtitle(a.value))
            }
            "overrideTrack" => {
                let a: OverrideTrackArgs = parse(&method, args)?;
                (
                    a.id,
                    Command::OverrideTrack {
                        group: a.group_id,
                        option: a.track_id,
                        enabled: a.value,
                    },
                )
            }
            _ => {
                debug!("Unknown method");
                return Err(Error::NotImplemented(method));
            }
        };
        registry.command(id, command);
        Ok(Value::Null)
    }
}
