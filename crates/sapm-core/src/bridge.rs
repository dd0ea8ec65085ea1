//! Control bridge: control info/get/set and card bring-up.
//!
//! Setting a control owned by a component is a power-management event. The
//! new value is range-checked before any bus access, the current register
//! field is compared with the requested one, and only when they differ (or
//! the card is sleeping) are the gated paths updated, the sequencer run, and
//! the register written. Controls not owned by any component are plain
//! register writes.

use std::time::Instant;

use tracing::{debug, info};

use crate::card::CardState;
use crate::control::{ControlInfo, ControlKind, EnumControl, MixerControl};
use crate::error::{Result, SapmError};
use crate::graph::{ComponentId, PathId};
use crate::kind::ComponentKind;
use crate::sequencer::PowerReport;

impl CardState {
    pub(crate) fn control_info(&self, name: &str) -> Result<ControlInfo> {
        let idx = self.controls.resolve(name)?;
        Ok(self.controls.get(idx).info())
    }

    pub(crate) fn control_get(&self, name: &str) -> Result<Vec<u32>> {
        let idx = self.controls.resolve(name)?;
        let kcontrol = self.controls.get(idx);
        match &kcontrol.kind {
            ControlKind::Mixer(mixer) => {
                let device = self.devices.get(kcontrol.device)?;
                (0..mixer.channels())
                    .map(|ch| {
                        let (reg, shift) = mixer.channel(ch);
                        mixer.decode((device.read(reg)? >> shift) & mixer.mask)
                    })
                    .collect()
            }
            ControlKind::Enum(en) => {
                if self.is_virtual(idx) {
                    return Ok(vec![kcontrol.selection as u32]);
                }
                let device = self.devices.get(kcontrol.device)?;
                let field = (device.read(en.reg)? >> en.shift) & en.mask;
                let item = en.item_for_field(field).ok_or_else(|| {
                    SapmError::InvalidParam(format!("register field {field} matches no item of '{name}'"))
                })?;
                Ok(vec![item as u32])
            }
        }
    }

    pub(crate) fn control_set(&mut self, name: &str, values: &[u32], now: Instant) -> Result<PowerReport> {
        let idx = self.controls.resolve(name)?;
        if values.is_empty() {
            return Err(SapmError::InvalidParam(format!("no value given for '{name}'")));
        }
        let managed = self.controls.get(idx).is_power_managed();
        let report = match self.controls.get(idx).kind.clone() {
            ControlKind::Mixer(mixer) if managed => self.set_switch(idx, &mixer, values)?,
            ControlKind::Mixer(mixer) => {
                self.set_plain(idx, &mixer, values)?;
                PowerReport::default()
            }
            ControlKind::Enum(en) => self.set_selector(idx, &en, values[0])?,
        };
        self.idle.refresh(now);
        Ok(report)
    }

    /// Mixer switch gating one or more paths.
    fn set_switch(&mut self, idx: usize, mixer: &MixerControl, values: &[u32]) -> Result<PowerReport> {
        let raw = encode_channels(mixer, values)?;
        let device = self.devices.get(self.controls.get(idx).device)?;
        let sleeping = self.idle.sleeping;

        let mut changed = sleeping;
        for (ch, want) in raw.iter().enumerate() {
            let (reg, shift) = mixer.channel(ch);
            let current = (device.read(reg)? >> shift) & mixer.mask;
            changed |= current != (want & mixer.mask);
        }
        if !changed {
            return Ok(PowerReport::default());
        }

        // Path status follows the register field, not the user value.
        let connect = raw[0] != 0;
        let name = self.controls.get(idx).name.clone();
        let paths = self.controls.get(idx).paths.clone();
        let previous = self.reconnect(&paths, |_| connect);
        debug!(control = %name, connect, sleeping, "switch changed");

        let result = self.recompute_power().and_then(|report| {
            for (ch, want) in raw.iter().enumerate() {
                let (reg, shift) = mixer.channel(ch);
                device.update_bits(reg, mixer.mask, shift, *want, sleeping)?;
            }
            Ok(report)
        });
        if result.is_err() {
            self.restore_paths(&previous);
        }
        result
    }

    /// Sets the status of `paths` and dirties their endpoints. Returns the
    /// previous status of each path.
    fn reconnect(
        &mut self,
        paths: &[PathId],
        status: impl Fn(Option<&str>) -> bool,
    ) -> Vec<(PathId, bool)> {
        paths
            .iter()
            .map(|&path_id| {
                let path = self.graph.path_mut(path_id);
                let was = path.connect;
                path.connect = status(path.name.as_deref());
                let (source, sink) = (path.source, path.sink);
                self.dirty.insert(source);
                self.dirty.insert(sink);
                (path_id, was)
            })
            .collect()
    }

    /// Puts path status back after a failed control write so it matches the
    /// unchanged control register. Endpoints stay dirty for the next pass.
    fn restore_paths(&mut self, previous: &[(PathId, bool)]) {
        for &(path_id, was) in previous {
            let path = self.graph.path_mut(path_id);
            path.connect = was;
            let (source, sink) = (path.source, path.sink);
            self.dirty.insert(source);
            self.dirty.insert(sink);
        }
    }

    /// Volume, mute and other controls with no graph effect.
    fn set_plain(&mut self, idx: usize, mixer: &MixerControl, values: &[u32]) -> Result<()> {
        let raw = encode_channels(mixer, values)?;
        let device = self.devices.get(self.controls.get(idx).device)?;
        for (ch, want) in raw.iter().enumerate() {
            let (reg, shift) = mixer.channel(ch);
            device.update_bits(reg, mixer.mask, shift, *want, false)?;
        }
        Ok(())
    }

    /// Enumerated selector; for muxes, reconnects the selected input path.
    fn set_selector(&mut self, idx: usize, en: &EnumControl, value: u32) -> Result<PowerReport> {
        let item = value as usize;
        if item >= en.item_count() {
            return Err(SapmError::InvalidParam(format!(
                "item {item} outside 0..{}",
                en.item_count()
            )));
        }
        let sleeping = self.idle.sleeping;
        let is_virtual = self.is_virtual(idx);
        let field = en.field_for_item(item);
        let device = if is_virtual {
            None
        } else {
            Some(self.devices.get(self.controls.get(idx).device)?)
        };

        let changed = match &device {
            None => self.controls.get(idx).selection != item,
            Some(device) => ((device.read(en.reg)? >> en.shift) & en.mask) != (field & en.mask),
        };
        if !changed && !sleeping {
            return Ok(PowerReport::default());
        }

        let mut report = PowerReport::default();
        let mut previous = Vec::new();
        if self.controls.get(idx).is_power_managed() {
            let text = en.texts[item].as_str();
            let paths = self.controls.get(idx).paths.clone();
            previous = self.reconnect(&paths, |name| name == Some(text));
            debug!(control = %self.controls.get(idx).name, item = text, sleeping, "mux selection changed");
            match self.recompute_power() {
                Ok(r) => report = r,
                Err(err) => {
                    self.restore_paths(&previous);
                    return Err(err);
                }
            }
        }

        if let Some(device) = device
            && let Err(err) = device.update_bits(en.reg, en.mask, en.shift, field, sleeping)
        {
            self.restore_paths(&previous);
            return Err(err);
        }
        self.controls.get_mut(idx).selection = item;
        Ok(report)
    }

    /// Text of the item an enum control currently selects.
    pub(crate) fn selected_item(&self, idx: usize) -> Result<Option<String>> {
        let kcontrol = self.controls.get(idx);
        let ControlKind::Enum(en) = &kcontrol.kind else {
            return Ok(None);
        };
        let item = if self.is_virtual(idx) {
            Some(kcontrol.selection)
        } else {
            let device = self.devices.get(kcontrol.device)?;
            en.item_for_field((device.read(en.reg)? >> en.shift) & en.mask)
        };
        Ok(item.and_then(|i| en.texts.get(i).cloned()))
    }

    /// Bring-up: initial power from hardware, mux path state, first
    /// sequencer pass.
    pub(crate) fn new_controls(&mut self, now: Instant) -> Result<PowerReport> {
        let powered: Vec<(ComponentId, crate::graph::RegisterCtrl, crate::device::DeviceKind)> = self
            .graph
            .components()
            .filter_map(|c| c.register.map(|reg| (c.id, reg, c.device)))
            .collect();
        for (id, reg, device) in powered {
            let value = self.devices.get(device)?.read(reg.reg)?;
            self.graph.component_mut(id).power = reg.decode(value);
        }

        for idx in 0..self.controls.len() {
            let kcontrol = self.controls.get(idx);
            if !matches!(kcontrol.kind, ControlKind::Enum(_)) || kcontrol.paths.is_empty() {
                continue;
            }
            let paths = kcontrol.paths.clone();
            let selected = self.selected_item(idx)?;
            for path_id in paths {
                let path = self.graph.path_mut(path_id);
                path.connect = path.name.is_some() && path.name == selected;
            }
        }

        self.mark_all_dirty();
        let report = self.recompute_power()?;
        self.live = true;
        self.idle.refresh(now);
        info!(card = %self.name, components = self.graph.component_count(), paths = self.graph.path_count(), "card controls initialised");
        Ok(report)
    }

    /// Whether an enum control belongs to a virtual mux (no register).
    fn is_virtual(&self, idx: usize) -> bool {
        self.controls
            .get(idx)
            .owners
            .iter()
            .any(|id| self.graph.component(*id).kind == ComponentKind::VirtMux)
    }
}

/// Range-checks and encodes one value per channel. A single value on a
/// stereo control is applied to both channels.
fn encode_channels(mixer: &MixerControl, values: &[u32]) -> Result<Vec<u32>> {
    (0..mixer.channels())
        .map(|ch| {
            let value = values.get(ch).or(values.first()).copied().unwrap_or(0);
            mixer.encode(value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::ControlDescriptor;
    use crate::graph::ComponentDescriptor;
    use crate::memory::MemoryRegisters;
    use crate::{CardEngine, Device, Route};

    fn plain_card(regs: &MemoryRegisters) -> CardEngine {
        let card = CardEngine::new("plain", Some(Device::codec(regs.clone())), None);
        card.add_controls(&[
            ControlDescriptor::mixer(
                "Output Volume",
                MixerControl::new(0x2004, 8, 0x7F, 0x7F).with_min(0x28),
            ),
            ControlDescriptor::mixer("Input Volume", MixerControl::new(0x3c, 24, 0x7F, 0x57).inverted()),
            ControlDescriptor::mixer(
                "Headphone Volume",
                MixerControl::new(0x50, 0, 0x3F, 0x3F).stereo(0x50, 8),
            ),
        ])
        .unwrap();
        card
    }

    #[test]
    fn plain_volume_round_trip() {
        let regs = MemoryRegisters::new();
        let card = plain_card(&regs);
        card.control_set("Output Volume", &[0x60]).unwrap();
        assert_eq!(regs.value(0x2004), 0x60 << 8);
        assert_eq!(card.control_get("Output Volume").unwrap(), vec![0x60]);
    }

    #[test]
    fn inverted_volume_is_stored_inverted() {
        let regs = MemoryRegisters::new();
        let card = plain_card(&regs);
        card.control_set("Input Volume", &[0x50]).unwrap();
        assert_eq!((regs.value(0x3c) >> 24) & 0x7F, 0x57 - 0x50);
        assert_eq!(card.control_get("Input Volume").unwrap(), vec![0x50]);
    }

    #[test]
    fn out_of_range_set_touches_nothing() {
        let regs = MemoryRegisters::new();
        let card = plain_card(&regs);
        assert!(matches!(
            card.control_set("Output Volume", &[0x10]),
            Err(SapmError::InvalidParam(_))
        ));
        assert!(regs.writes().is_empty());
        assert_eq!(regs.read_count(), 0);
    }

    #[test]
    fn stereo_get_and_set() {
        let regs = MemoryRegisters::new();
        let card = plain_card(&regs);
        let info = card.control_info("Headphone Volume").unwrap();
        assert_eq!(info.count, 2);
        card.control_set("Headphone Volume", &[0x10, 0x20]).unwrap();
        assert_eq!(card.control_get("Headphone Volume").unwrap(), vec![0x10, 0x20]);
        card.control_set("Headphone Volume", &[0x05]).unwrap();
        assert_eq!(card.control_get("Headphone Volume").unwrap(), vec![0x05, 0x05]);
    }

    #[test]
    fn unknown_control() {
        let regs = MemoryRegisters::new();
        let card = plain_card(&regs);
        assert!(matches!(card.control_get("Bass"), Err(SapmError::NotFound(_))));
        assert!(matches!(card.control_set("Output Volume", &[]), Err(SapmError::InvalidParam(_))));
    }

    fn mux_card(regs: &MemoryRegisters, kind: ComponentKind, control: EnumControl) -> CardEngine {
        let card = CardEngine::new("mux", Some(Device::codec(regs.clone())), None);
        card.new_components(&[
            ComponentDescriptor::new(ComponentKind::Mic, "MIC"),
            ComponentDescriptor::new(ComponentKind::Line, "LINE"),
            ComponentDescriptor::new(kind, "Capture Mux")
                .with_control(ControlDescriptor::enumerated("Capture Source", control)),
            ComponentDescriptor::new(ComponentKind::Adc, "ADC").with_register(0x60, 0),
        ])
        .unwrap();
        card.add_routes(&[
            Route::gated("Capture Mux", "Mic", "MIC"),
            Route::gated("Capture Mux", "Line", "LINE"),
            Route::direct("ADC", "Capture Mux"),
        ])
        .unwrap();
        card
    }

    fn connected(card: &CardEngine) -> Vec<(String, bool)> {
        card.paths()
            .into_iter()
            .filter(|p| p.name.is_some())
            .map(|p| (p.source, p.connect))
            .collect()
    }

    #[test]
    fn mux_paths_follow_selection() {
        let regs = MemoryRegisters::with_values([(0x40, 1 << 2)]);
        let card = mux_card(&regs, ComponentKind::Mux, EnumControl::new(0x40, 2, 0x3, ["Off", "Mic", "Line"]));
        card.new_controls().unwrap();
        assert_eq!(connected(&card), vec![("MIC".into(), true), ("LINE".into(), false)]);
        assert_eq!(card.control_get("Capture Source").unwrap(), vec![1]);
        assert!(card.component("ADC").unwrap().power.is_up());

        card.control_set("Capture Source", &[2]).unwrap();
        assert_eq!(connected(&card), vec![("MIC".into(), false), ("LINE".into(), true)]);
        assert_eq!((regs.value(0x40) >> 2) & 0x3, 2);

        card.control_set("Capture Source", &[0]).unwrap();
        assert!(!card.component("ADC").unwrap().power.is_up());
        assert!(matches!(
            card.control_set("Capture Source", &[3]),
            Err(SapmError::InvalidParam(_))
        ));
    }

    #[test]
    fn value_mux_writes_mapped_value() {
        let regs = MemoryRegisters::new();
        let card = mux_card(
            &regs,
            ComponentKind::ValueMux,
            EnumControl::new(0x40, 0, 0xF, ["Off", "Mic", "Line"]).with_values([0, 5, 9]),
        );
        card.new_controls().unwrap();
        card.control_set("Capture Source", &[2]).unwrap();
        assert_eq!(regs.value(0x40) & 0xF, 9);
        assert_eq!(card.control_get("Capture Source").unwrap(), vec![2]);
        assert_eq!(connected(&card), vec![("MIC".into(), false), ("LINE".into(), true)]);
    }

    #[test]
    fn virtual_mux_keeps_selection_in_memory() {
        let regs = MemoryRegisters::new();
        let card = mux_card(&regs, ComponentKind::VirtMux, EnumControl::new(0, 0, 0, ["Mic", "Line"]));
        card.new_controls().unwrap();
        assert_eq!(connected(&card), vec![("MIC".into(), true), ("LINE".into(), false)]);

        regs.clear_log();
        card.control_set("Capture Source", &[1]).unwrap();
        assert_eq!(card.control_get("Capture Source").unwrap(), vec![1]);
        assert_eq!(connected(&card), vec![("MIC".into(), false), ("LINE".into(), true)]);
        // ADC stays powered through LINE.
        assert!(regs.writes().is_empty());
    }
}
