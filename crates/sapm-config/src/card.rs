//! Card table file format and bring-up.

use std::path::Path;
use std::time::Duration;

use sapm_core::{
    CardEngine, ComponentDescriptor, ComponentKind, ControlDescriptor, Device, DeviceKind,
    EnumControl, IdleConfig, MixerControl, RegisterCtrl, Route,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::validation::{ValidationError, validate_card};

/// Declarative description of one audio card.
///
/// Card tables are stored as TOML files: the widgets of the codec, the routes
/// between them, and the plain (non power-managed) controls.
///
/// # TOML Format
///
/// ```toml
/// name = "demo"
///
/// [idle]
/// poll_ms = 10000
/// sleep_ms = 180000
///
/// [[components]]
/// kind = "dac"
/// name = "DACL"
/// reg = 0x14
/// shift = 11
///
/// [[components]]
/// kind = "spk"
/// name = "SPKL"
/// [[components.controls]]
/// name = "Dacl enable"
/// reg = 0x30
/// shift = 27
///
/// [[routes]]
/// sink = "SPKL"
/// control = "Dacl enable"
/// source = "DACL"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CardConfig {
    /// Card name.
    pub name: String,

    /// Optional description of the card.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Idle collapse timing.
    #[serde(default)]
    pub idle: IdleSettings,

    /// Widgets, in creation order.
    #[serde(default)]
    pub components: Vec<ComponentConfig>,

    /// Routes, in binding order.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,

    /// Controls not owned by any component.
    #[serde(default)]
    pub controls: Vec<ControlConfig>,
}

/// `[idle]` table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdleSettings {
    /// Poll period in milliseconds.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    /// Inactivity threshold in milliseconds.
    #[serde(default = "default_sleep_ms")]
    pub sleep_ms: u64,
    /// Start the idle timer at bring-up.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_poll_ms() -> u64 {
    sapm_core::DEFAULT_POLL_INTERVAL.as_millis() as u64
}

fn default_sleep_ms() -> u64 {
    sapm_core::DEFAULT_SLEEP_THRESHOLD.as_millis() as u64
}

fn default_true() -> bool {
    true
}

fn default_mask() -> u32 {
    1
}

fn default_max() -> u32 {
    1
}

fn default_device() -> String {
    DeviceKind::Codec.as_str().to_string()
}

fn is_default_device(device: &str) -> bool {
    device == DeviceKind::Codec.as_str()
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

fn is_one(value: &u32) -> bool {
    *value == 1
}

impl Default for IdleSettings {
    fn default() -> Self {
        Self {
            poll_ms: default_poll_ms(),
            sleep_ms: default_sleep_ms(),
            enabled: true,
        }
    }
}

impl From<IdleSettings> for IdleConfig {
    fn from(settings: IdleSettings) -> Self {
        IdleConfig {
            poll_interval: Duration::from_millis(settings.poll_ms),
            sleep_threshold: Duration::from_millis(settings.sleep_ms),
            enabled: settings.enabled,
        }
    }
}

/// `[[components]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentConfig {
    /// Kind name (`"dac"`, `"pga"`, `"spk"`, ...).
    pub kind: String,
    /// Component name.
    pub name: String,
    /// Power register; absent for components without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reg: Option<u32>,
    /// Power field bit offset.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub shift: u32,
    /// Power field mask.
    #[serde(default = "default_mask", skip_serializing_if = "is_one")]
    pub mask: u32,
    /// Power field is active-low.
    #[serde(default, skip_serializing_if = "is_false")]
    pub invert: bool,
    /// `"codec"` or `"accessory"`.
    #[serde(default = "default_device", skip_serializing_if = "is_default_device")]
    pub device: String,
    /// Stream name for DAC/ADC/AIF endpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<String>,
    /// Owned controls.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<ControlConfig>,
}

impl ComponentConfig {
    /// A component of `kind` without a power register.
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            reg: None,
            shift: 0,
            mask: 1,
            invert: false,
            device: default_device(),
            stream: None,
            controls: Vec::new(),
        }
    }

    /// Sets a single-bit power register.
    pub fn with_register(mut self, reg: u32, shift: u32) -> Self {
        self.reg = Some(reg);
        self.shift = shift;
        self
    }

    /// Marks the power bit active-low.
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Adds an owned control.
    pub fn with_control(mut self, control: ControlConfig) -> Self {
        self.controls.push(control);
        self
    }

    /// Converts to an engine descriptor.
    pub fn to_descriptor(&self) -> Result<ComponentDescriptor, ValidationError> {
        let kind: ComponentKind = self
            .kind
            .parse()
            .map_err(|_| ValidationError::UnknownKind(self.kind.clone()))?;
        let device = parse_device(&self.device)?;

        let mut desc = ComponentDescriptor::new(kind, self.name.clone());
        desc.device = device;
        desc.stream = self.stream.clone();
        if let Some(reg) = self.reg {
            desc = desc.with_register_ctrl(RegisterCtrl {
                reg,
                shift: self.shift,
                mask: self.mask,
                invert: self.invert,
            });
        }
        for control in &self.controls {
            desc = desc.with_control(control.to_descriptor()?);
        }
        Ok(desc)
    }
}

/// Control payload type.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ControlConfigKind {
    /// Integer or switch field.
    #[default]
    Mixer,
    /// Enumerated selector.
    Enum,
}

/// `[[controls]]` / `[[components.controls]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControlConfig {
    /// Control name.
    pub name: String,
    /// Payload type, `"mixer"` when omitted.
    #[serde(rename = "type", default)]
    pub kind: ControlConfigKind,
    /// Register (left channel for stereo mixers).
    pub reg: u32,
    /// Field bit offset.
    #[serde(default, skip_serializing_if = "is_zero")]
    pub shift: u32,
    /// Right channel register of a stereo mixer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rreg: Option<u32>,
    /// Right channel bit offset of a stereo mixer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rshift: Option<u32>,
    /// Field mask.
    #[serde(default = "default_mask", skip_serializing_if = "is_one")]
    pub mask: u32,
    /// Lowest accepted value (mixer).
    #[serde(default, skip_serializing_if = "is_zero")]
    pub min: u32,
    /// Highest accepted value (mixer).
    #[serde(default = "default_max", skip_serializing_if = "is_one")]
    pub max: u32,
    /// Register holds `max - value` (mixer).
    #[serde(default, skip_serializing_if = "is_false")]
    pub invert: bool,
    /// Item names (enum).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub texts: Vec<String>,
    /// Register value per item (value mux).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<u32>>,
    /// Backend of a free-standing control.
    #[serde(default = "default_device", skip_serializing_if = "is_default_device")]
    pub device: String,
}

impl ControlConfig {
    /// A single-bit switch.
    pub fn switch(name: impl Into<String>, reg: u32, shift: u32) -> Self {
        Self {
            name: name.into(),
            kind: ControlConfigKind::Mixer,
            reg,
            shift,
            rreg: None,
            rshift: None,
            mask: 1,
            min: 0,
            max: 1,
            invert: false,
            texts: Vec::new(),
            values: None,
            device: default_device(),
        }
    }

    /// An integer field with range `min..=max`.
    pub fn mixer(name: impl Into<String>, reg: u32, shift: u32, mask: u32, min: u32, max: u32) -> Self {
        Self {
            mask,
            min,
            max,
            ..Self::switch(name, reg, shift)
        }
    }

    /// An enumerated selector.
    pub fn enumerated<S: Into<String>>(
        name: impl Into<String>,
        reg: u32,
        shift: u32,
        mask: u32,
        texts: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            kind: ControlConfigKind::Enum,
            mask,
            texts: texts.into_iter().map(Into::into).collect(),
            ..Self::switch(name, reg, shift)
        }
    }

    /// Stores `max - value` in the register.
    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }

    /// Converts to an engine descriptor.
    pub fn to_descriptor(&self) -> Result<ControlDescriptor, ValidationError> {
        let mut desc = match self.kind {
            ControlConfigKind::Mixer => {
                let mut mixer =
                    MixerControl::new(self.reg, self.shift, self.mask, self.max).with_min(self.min);
                if self.invert {
                    mixer = mixer.inverted();
                }
                if self.rreg.is_some() || self.rshift.is_some() {
                    mixer = mixer.stereo(
                        self.rreg.unwrap_or(self.reg),
                        self.rshift.unwrap_or(self.shift),
                    );
                }
                ControlDescriptor::mixer(self.name.clone(), mixer)
            }
            ControlConfigKind::Enum => {
                let mut en = EnumControl::new(self.reg, self.shift, self.mask, self.texts.iter().cloned());
                if let Some(values) = &self.values {
                    en = en.with_values(values.iter().copied());
                }
                ControlDescriptor::enumerated(self.name.clone(), en)
            }
        };
        desc.device = parse_device(&self.device)?;
        Ok(desc)
    }
}

/// `[[routes]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteConfig {
    /// Sink component.
    pub sink: String,
    /// Gating switch or mux item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
    /// Source component.
    pub source: String,
}

impl RouteConfig {
    /// A route with an optional gating control.
    pub fn new(sink: impl Into<String>, control: Option<&str>, source: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            control: control.map(str::to_string),
            source: source.into(),
        }
    }
}

impl From<&RouteConfig> for Route {
    fn from(route: &RouteConfig) -> Self {
        Route::new(route.sink.clone(), route.control.as_deref(), route.source.clone())
    }
}

fn parse_device(device: &str) -> Result<DeviceKind, ValidationError> {
    device
        .parse()
        .map_err(|_| ValidationError::UnknownDevice(device.to_string()))
}

impl CardConfig {
    /// Create an empty card table.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            idle: IdleSettings::default(),
            components: Vec::new(),
            routes: Vec::new(),
            controls: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a component.
    pub fn with_component(mut self, component: ComponentConfig) -> Self {
        self.components.push(component);
        self
    }

    /// Adds a route.
    pub fn with_route(mut self, sink: &str, control: Option<&str>, source: &str) -> Self {
        self.routes.push(RouteConfig::new(sink, control, source));
        self
    }

    /// Adds a free-standing control.
    pub fn with_control(mut self, control: ControlConfig) -> Self {
        self.controls.push(control);
        self
    }

    /// Load a card table from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
        let card: CardConfig = toml::from_str(&content)?;
        debug!(path = %path.display(), card = %card.name, "card table loaded");
        Ok(card)
    }

    /// Load a card table from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the card table to a TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))?;
        Ok(())
    }

    /// Convert the card table to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Every control name the table declares, owned ones first.
    pub fn control_names(&self) -> Vec<&str> {
        self.components
            .iter()
            .flat_map(|c| c.controls.iter())
            .chain(self.controls.iter())
            .map(|c| c.name.as_str())
            .collect()
    }

    /// Validates the table and brings up a card on the given backends:
    /// components, routes, free-standing controls, then the initial power
    /// pass. The idle timer is configured from the `[idle]` table.
    pub fn instantiate(&self, codec: Option<Device>, accessory: Option<Device>) -> Result<CardEngine, ConfigError> {
        validate_card(self)?;

        let components = self
            .components
            .iter()
            .map(ComponentConfig::to_descriptor)
            .collect::<Result<Vec<_>, _>>()?;
        let controls = self
            .controls
            .iter()
            .map(ControlConfig::to_descriptor)
            .collect::<Result<Vec<_>, _>>()?;
        let routes: Vec<Route> = self.routes.iter().map(Route::from).collect();

        let card = CardEngine::new(self.name.clone(), codec, accessory).with_idle_config(self.idle.into());
        card.new_components(&components)?;
        card.add_routes(&routes)?;
        card.add_controls(&controls)?;
        let report = card.new_controls()?;
        info!(
            card = %self.name,
            components = components.len(),
            routes = routes.len(),
            powered = report.powered_up.len(),
            "card instantiated"
        );
        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demo() -> CardConfig {
        CardConfig::new("demo")
            .with_component(ComponentConfig::new("dac", "DACL").with_register(0x14, 11))
            .with_component(
                ComponentConfig::new("spk", "SPKL").with_control(ControlConfig::switch("Dacl enable", 0x30, 27)),
            )
            .with_route("SPKL", Some("Dacl enable"), "DACL")
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let card = CardConfig::from_toml(
            r#"
name = "tiny"

[[components]]
kind = "mic"
name = "MIC"
"#,
        )
        .unwrap();
        assert_eq!(card.idle, IdleSettings::default());
        assert_eq!(card.components[0].device, "codec");
        assert_eq!(card.components[0].mask, 1);
        assert!(card.routes.is_empty());
    }

    #[test]
    fn toml_round_trip() {
        let card = demo().with_description("one speaker");
        let text = card.to_toml().unwrap();
        assert!(text.contains("Dacl enable"));
        assert_eq!(CardConfig::from_toml(&text).unwrap(), card);
    }

    #[test]
    fn descriptor_conversion() {
        let spk = &demo().components[1];
        let desc = spk.to_descriptor().unwrap();
        assert_eq!(desc.kind, ComponentKind::Speaker);
        assert!(desc.register.is_none());
        assert_eq!(desc.controls.len(), 1);

        let stereo = ControlConfig {
            rshift: Some(8),
            ..ControlConfig::mixer("HP Volume", 0x50, 0, 0x3F, 0, 0x3F)
        };
        match stereo.to_descriptor().unwrap().kind {
            sapm_core::ControlKind::Mixer(m) => {
                assert!(m.is_stereo());
                assert_eq!((m.rreg, m.rshift), (0x50, 8));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn unknown_kind_is_reported() {
        let err = ComponentConfig::new("woofer", "W").to_descriptor().unwrap_err();
        assert_eq!(err, ValidationError::UnknownKind("woofer".into()));
    }

    #[test]
    fn idle_settings_convert() {
        let cfg: IdleConfig = IdleSettings {
            poll_ms: 50,
            sleep_ms: 2000,
            enabled: false,
        }
        .into();
        assert_eq!(cfg.poll_interval, Duration::from_millis(50));
        assert_eq!(cfg.sleep_threshold, Duration::from_secs(2));
        assert!(!cfg.enabled);
    }
}
