//! Route binder.
//!
//! A route names a sink, an optional gating control and a source. Binding
//! resolves both names and creates one path:
//!
//! - no control: a direct wire, always connected;
//! - mux-family sink: a path named after the mux item, connected when that
//!   item is selected;
//! - mixer-family sink: a path gated by the sink's switch of that name,
//!   connected from the switch's current register value;
//! - any other sink: the control name is ignored and a direct wire is made.

use std::time::Instant;

use tracing::{debug, warn};

use crate::card::CardState;
use crate::control::ControlKind;
use crate::error::{Result, SapmError};
use crate::graph::{ComponentId, Path, PathId};
use crate::kind::{ComponentKind, ControlFamily};

/// Declarative route table entry.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    /// Sink component name.
    pub sink: String,
    /// Gating control (mixer) or mux item name.
    pub control: Option<String>,
    /// Source component name.
    pub source: String,
}

impl Route {
    /// A route with an optional gating control.
    pub fn new(sink: impl Into<String>, control: Option<&str>, source: impl Into<String>) -> Self {
        Self {
            sink: sink.into(),
            control: control.map(str::to_string),
            source: source.into(),
        }
    }

    /// An always-connected wire.
    pub fn direct(sink: impl Into<String>, source: impl Into<String>) -> Self {
        Self::new(sink, None, source)
    }

    /// A control-gated route.
    pub fn gated(sink: impl Into<String>, control: &str, source: impl Into<String>) -> Self {
        Self::new(sink, Some(control), source)
    }
}

impl CardState {
    pub(crate) fn add_routes(&mut self, routes: &[Route], now: Instant) -> Result<usize> {
        for (bound, route) in routes.iter().enumerate() {
            if let Err(err) = self.add_route(route, now) {
                warn!(
                    sink = %route.sink,
                    source = %route.source,
                    bound,
                    error = %err,
                    "route binding aborted"
                );
                return Err(err);
            }
        }
        Ok(routes.len())
    }

    pub(crate) fn add_route(&mut self, route: &Route, now: Instant) -> Result<PathId> {
        let source = self.graph.resolve(&route.source)?;
        let sink = self.graph.resolve(&route.sink)?;
        if source == sink || self.graph.can_reach(sink, source) {
            return Err(SapmError::CycleDetected {
                source_name: route.source.clone(),
                sink: route.sink.clone(),
            });
        }
        self.graph.reserve_paths(1)?;

        let sink_kind = self.graph.component(sink).kind;
        let path = match (route.control.as_deref(), sink_kind.control_family()) {
            (None, _) => Path::direct(source, sink),
            (Some(item), ControlFamily::Mux) => self.mux_path(source, sink, item)?,
            (Some(name), ControlFamily::Mixer) => self.mixer_path(source, sink, name)?,
            (Some(name), ControlFamily::Plain) => {
                warn!(
                    sink = %route.sink,
                    control = name,
                    kind = %sink_kind,
                    "sink kind has no gating controls, binding as a direct wire"
                );
                Path::direct(source, sink)
            }
        };

        self.mark_external(source, sink);
        let control = path.control;
        let connect = path.connect;
        let id = self.graph.link(path);
        if let Some(idx) = control {
            self.controls.get_mut(idx).paths.push(id);
        }
        debug!(
            source = %route.source,
            sink = %route.sink,
            control = route.control.as_deref().unwrap_or("-"),
            connect,
            "route bound"
        );

        if self.live {
            self.dirty.insert(source);
            self.dirty.insert(sink);
        }
        self.idle.refresh(now);
        Ok(id)
    }

    fn mux_path(&mut self, source: ComponentId, sink: ComponentId, item: &str) -> Result<Path> {
        let comp = self.graph.component(sink);
        let idx = *comp
            .controls
            .first()
            .ok_or_else(|| SapmError::InvalidObject(format!("mux '{}' has no control", comp.name)))?;
        let mut path = Path::gated(source, sink, item, idx);
        if self.live {
            path.connect = self.selected_item(idx)?.as_deref() == Some(item);
        }
        Ok(path)
    }

    fn mixer_path(&mut self, source: ComponentId, sink: ComponentId, name: &str) -> Result<Path> {
        let comp = self.graph.component(sink);
        let idx = comp
            .controls
            .iter()
            .copied()
            .find(|idx| self.controls.get(*idx).name == name)
            .ok_or_else(|| SapmError::control_not_found(name))?;
        let kcontrol = self.controls.get(idx);
        let ControlKind::Mixer(mixer) = &kcontrol.kind else {
            return Err(SapmError::InvalidObject(format!("control '{name}' is not a switch")));
        };
        let device = self.devices.get(kcontrol.device)?;
        let field = (device.read(mixer.reg)? >> mixer.shift) & mixer.mask;
        let value = if mixer.invert {
            mixer.max.saturating_sub(field)
        } else {
            field
        };
        let mut path = Path::gated(source, sink, name, idx);
        path.connect = value != 0;
        Ok(path)
    }

    /// Flags components that face an off-chip pin.
    fn mark_external(&mut self, source: ComponentId, sink: ComponentId) {
        let source_kind = self.graph.component(source).kind;
        let sink_kind = self.graph.component(sink).kind;
        if sink_kind == ComponentKind::Input
            && matches!(
                source_kind,
                ComponentKind::MicBias | ComponentKind::Mic | ComponentKind::Line | ComponentKind::Output
            )
        {
            self.graph.component_mut(sink).external = true;
        }
        if source_kind == ComponentKind::Output
            && matches!(
                sink_kind,
                ComponentKind::Speaker | ComponentKind::Hp | ComponentKind::Line | ComponentKind::Input
            )
        {
            self.graph.component_mut(source).external = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlDescriptor, MixerControl};
    use crate::graph::ComponentDescriptor;
    use crate::memory::MemoryRegisters;
    use crate::{CardEngine, Device};

    fn card_with(regs: &MemoryRegisters, descs: &[ComponentDescriptor]) -> CardEngine {
        let card = CardEngine::new("test", Some(Device::codec(regs.clone())), None);
        card.new_components(descs).unwrap();
        card
    }

    #[test]
    fn unknown_component_leaves_paths_untouched() {
        let regs = MemoryRegisters::new();
        let card = card_with(&regs, &[ComponentDescriptor::new(ComponentKind::Dac, "DACL")]);
        let err = card.add_route(&Route::direct("SPKL", "DACL")).unwrap_err();
        assert!(matches!(err, SapmError::NotFound(_)));
        assert_eq!(card.path_count(), 0);
    }

    #[test]
    fn mixer_route_reads_switch_state() {
        let regs = MemoryRegisters::with_values([(0x30, 1 << 27)]);
        let card = card_with(
            &regs,
            &[
                ComponentDescriptor::new(ComponentKind::Dac, "DACL"),
                ComponentDescriptor::new(ComponentKind::Speaker, "SPKL")
                    .with_control(ControlDescriptor::mixer("Dacl enable", MixerControl::switch(0x30, 27))),
            ],
        );
        card.add_route(&Route::gated("SPKL", "Dacl enable", "DACL")).unwrap();
        let paths = card.paths();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].connect);
        assert_eq!(paths[0].name.as_deref(), Some("Dacl enable"));
    }

    #[test]
    fn inverted_switch_connects_when_field_clear() {
        let regs = MemoryRegisters::new();
        let card = card_with(
            &regs,
            &[
                ComponentDescriptor::new(ComponentKind::Mic, "MIC"),
                ComponentDescriptor::new(ComponentKind::Pga, "LPGA")
                    .with_control(ControlDescriptor::mixer("Mute", MixerControl::switch(0x20, 3).inverted())),
            ],
        );
        card.add_route(&Route::gated("LPGA", "Mute", "MIC")).unwrap();
        assert!(card.paths()[0].connect);
    }

    #[test]
    fn mixer_route_with_unknown_control() {
        let regs = MemoryRegisters::new();
        let card = card_with(
            &regs,
            &[
                ComponentDescriptor::new(ComponentKind::Dac, "DACL"),
                ComponentDescriptor::new(ComponentKind::Mixer, "MIX"),
            ],
        );
        let err = card.add_route(&Route::gated("MIX", "Nope", "DACL")).unwrap_err();
        assert!(matches!(err, SapmError::NotFound(_)));
        assert_eq!(card.path_count(), 0);
    }

    #[test]
    fn named_control_on_plain_sink_becomes_direct_wire() {
        let regs = MemoryRegisters::new();
        let card = card_with(
            &regs,
            &[
                ComponentDescriptor::new(ComponentKind::Mixer, "MIX"),
                ComponentDescriptor::new(ComponentKind::Hp, "HPL"),
            ],
        );
        card.add_route(&Route::gated("HPL", "Headphone Switch", "MIX")).unwrap();
        let path = &card.paths()[0];
        assert!(path.connect);
        assert_eq!(path.name, None);
    }

    #[test]
    fn cycles_are_rejected() {
        let regs = MemoryRegisters::new();
        let card = card_with(
            &regs,
            &[
                ComponentDescriptor::new(ComponentKind::Pga, "A"),
                ComponentDescriptor::new(ComponentKind::Pga, "B"),
            ],
        );
        card.add_route(&Route::direct("B", "A")).unwrap();
        let err = card.add_route(&Route::direct("A", "B")).unwrap_err();
        assert!(matches!(err, SapmError::CycleDetected { .. }));
        assert!(matches!(
            card.add_route(&Route::direct("A", "A")),
            Err(SapmError::CycleDetected { .. })
        ));
        assert_eq!(card.path_count(), 1);
    }

    #[test]
    fn add_routes_stops_at_first_failure() {
        let regs = MemoryRegisters::new();
        let card = card_with(
            &regs,
            &[
                ComponentDescriptor::new(ComponentKind::Dac, "DAC"),
                ComponentDescriptor::new(ComponentKind::Mixer, "MIX"),
                ComponentDescriptor::new(ComponentKind::Hp, "HP"),
            ],
        );
        let err = card
            .add_routes(&[
                Route::direct("MIX", "DAC"),
                Route::direct("HP", "GHOST"),
                Route::direct("HP", "MIX"),
            ])
            .unwrap_err();
        assert!(matches!(err, SapmError::NotFound(_)));
        assert_eq!(card.path_count(), 1);
    }

    #[test]
    fn output_pin_feeding_speaker_is_external() {
        let regs = MemoryRegisters::new();
        let card = card_with(
            &regs,
            &[
                ComponentDescriptor::new(ComponentKind::Output, "LOUT"),
                ComponentDescriptor::new(ComponentKind::Speaker, "Ext Spk"),
            ],
        );
        card.add_route(&Route::direct("Ext Spk", "LOUT")).unwrap();
        assert!(card.component("LOUT").unwrap().external);
        assert!(!card.component("Ext Spk").unwrap().external);
    }
}
