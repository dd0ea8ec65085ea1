//! Component kinds and the fixed per-kind tables.
//!
//! Everything the engine needs to know about a widget type is resolved here by
//! exhaustive `match`: power-check policy, power-up/power-down phase, whether
//! the kind terminates an input or output walk, and which control family it
//! owns. Adding a kind without updating these tables is a compile error.

use core::fmt;
use core::str::FromStr;

use crate::error::SapmError;

/// The functional role of a component in the audio routing graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    /// Codec input pin.
    Input,
    /// Codec output pin.
    Output,
    /// Selects one analog signal out of many (register-backed selector).
    Mux,
    /// Selector with no register behind it.
    VirtMux,
    /// Selector whose items map to arbitrary register values.
    ValueMux,
    /// Mixes several signals together.
    Mixer,
    /// Mixer whose inputs are named by their controls.
    MixerNamedCtrl,
    /// Programmable gain / attenuation stage.
    Pga,
    /// Output driver.
    OutDrv,
    /// Analog to digital converter.
    Adc,
    /// Digital to analog converter.
    Dac,
    /// Microphone bias supply.
    MicBias,
    /// Microphone.
    Mic,
    /// Headphone.
    Hp,
    /// Speaker.
    Speaker,
    /// Line input/output.
    Line,
    /// Analog switch.
    AnalogSwitch,
    /// Codec bias / VMID.
    Vmid,
    /// Machine-specific component executed first.
    Pre,
    /// Machine-specific component executed last.
    Post,
    /// Power or clock supply.
    Supply,
    /// External regulator.
    RegulatorSupply,
    /// External clock.
    ClockSupply,
    /// Audio interface input (playback stream enters the codec).
    AifIn,
    /// Audio interface output (capture stream leaves the codec).
    AifOut,
    /// Signal generator.
    SigGen,
    /// Generic sink.
    Sink,
}

/// Power-check policy bound to a component at creation time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PowerCheck {
    /// Powered iff the component has both a connected input and output.
    Generic,
    /// Capture endpoint: an active stream only needs a connected input.
    Adc,
    /// Playback endpoint: an active stream only needs a connected output.
    Dac,
}

/// Control family a component kind owns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlFamily {
    /// Mixer-style switches gating individual input paths.
    Mixer,
    /// A single enumerated selector.
    Mux,
    /// The kind owns no gating controls.
    Plain,
}

/// Every kind, in declaration order.
pub const ALL_KINDS: [ComponentKind; 27] = [
    ComponentKind::Input,
    ComponentKind::Output,
    ComponentKind::Mux,
    ComponentKind::VirtMux,
    ComponentKind::ValueMux,
    ComponentKind::Mixer,
    ComponentKind::MixerNamedCtrl,
    ComponentKind::Pga,
    ComponentKind::OutDrv,
    ComponentKind::Adc,
    ComponentKind::Dac,
    ComponentKind::MicBias,
    ComponentKind::Mic,
    ComponentKind::Hp,
    ComponentKind::Speaker,
    ComponentKind::Line,
    ComponentKind::AnalogSwitch,
    ComponentKind::Vmid,
    ComponentKind::Pre,
    ComponentKind::Post,
    ComponentKind::Supply,
    ComponentKind::RegulatorSupply,
    ComponentKind::ClockSupply,
    ComponentKind::AifIn,
    ComponentKind::AifOut,
    ComponentKind::SigGen,
    ComponentKind::Sink,
];

impl ComponentKind {
    /// Canonical lowercase name, as used in card tables.
    pub const fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Input => "input",
            ComponentKind::Output => "output",
            ComponentKind::Mux => "mux",
            ComponentKind::VirtMux => "virt_mux",
            ComponentKind::ValueMux => "value_mux",
            ComponentKind::Mixer => "mixer",
            ComponentKind::MixerNamedCtrl => "mixer_named_ctrl",
            ComponentKind::Pga => "pga",
            ComponentKind::OutDrv => "out_drv",
            ComponentKind::Adc => "adc",
            ComponentKind::Dac => "dac",
            ComponentKind::MicBias => "mic_bias",
            ComponentKind::Mic => "mic",
            ComponentKind::Hp => "hp",
            ComponentKind::Speaker => "spk",
            ComponentKind::Line => "line",
            ComponentKind::AnalogSwitch => "analog_switch",
            ComponentKind::Vmid => "vmid",
            ComponentKind::Pre => "pre",
            ComponentKind::Post => "post",
            ComponentKind::Supply => "supply",
            ComponentKind::RegulatorSupply => "regulator_supply",
            ComponentKind::ClockSupply => "clock_supply",
            ComponentKind::AifIn => "aif_in",
            ComponentKind::AifOut => "aif_out",
            ComponentKind::SigGen => "siggen",
            ComponentKind::Sink => "sink",
        }
    }

    /// Power-check policy for this kind.
    pub const fn power_check(self) -> PowerCheck {
        match self {
            ComponentKind::Adc | ComponentKind::AifOut => PowerCheck::Adc,
            ComponentKind::Dac | ComponentKind::AifIn => PowerCheck::Dac,
            _ => PowerCheck::Generic,
        }
    }

    /// Position in the power-up sequence (lower runs first).
    pub const fn power_up_phase(self) -> u8 {
        match self {
            ComponentKind::Pre => 0,
            ComponentKind::Supply
            | ComponentKind::RegulatorSupply
            | ComponentKind::ClockSupply
            | ComponentKind::Vmid => 1,
            ComponentKind::MicBias => 2,
            ComponentKind::AifIn | ComponentKind::AifOut => 3,
            ComponentKind::Mic => 4,
            ComponentKind::Mux | ComponentKind::VirtMux | ComponentKind::ValueMux => 5,
            ComponentKind::Dac => 6,
            ComponentKind::Mixer | ComponentKind::MixerNamedCtrl | ComponentKind::AnalogSwitch => 7,
            ComponentKind::Pga => 8,
            ComponentKind::Adc => 9,
            ComponentKind::OutDrv | ComponentKind::Hp | ComponentKind::Speaker => 10,
            ComponentKind::Post => 11,
            ComponentKind::Input
            | ComponentKind::Output
            | ComponentKind::Line
            | ComponentKind::SigGen
            | ComponentKind::Sink => 0,
        }
    }

    /// Position in the power-down sequence (lower runs first).
    pub const fn power_down_phase(self) -> u8 {
        match self {
            ComponentKind::Pre => 0,
            ComponentKind::Adc => 1,
            ComponentKind::Hp | ComponentKind::Speaker | ComponentKind::OutDrv => 2,
            ComponentKind::Pga => 4,
            ComponentKind::Mixer | ComponentKind::MixerNamedCtrl | ComponentKind::AnalogSwitch => 5,
            ComponentKind::Dac => 6,
            ComponentKind::Mic => 7,
            ComponentKind::MicBias => 8,
            ComponentKind::Mux | ComponentKind::VirtMux | ComponentKind::ValueMux => 9,
            ComponentKind::AifIn | ComponentKind::AifOut => 10,
            ComponentKind::Supply
            | ComponentKind::RegulatorSupply
            | ComponentKind::ClockSupply
            | ComponentKind::Vmid => 11,
            ComponentKind::Post => 12,
            ComponentKind::Input
            | ComponentKind::Output
            | ComponentKind::Line
            | ComponentKind::SigGen
            | ComponentKind::Sink => 0,
        }
    }

    /// Whether an input-side walk stops here (the component is a signal source).
    pub const fn is_input_terminal(self) -> bool {
        matches!(
            self,
            ComponentKind::Dac
                | ComponentKind::AifIn
                | ComponentKind::Input
                | ComponentKind::Mic
                | ComponentKind::Line
        )
    }

    /// Whether an output-side walk stops here (the component is a signal sink).
    pub const fn is_output_terminal(self) -> bool {
        matches!(
            self,
            ComponentKind::Adc
                | ComponentKind::AifOut
                | ComponentKind::Output
                | ComponentKind::Hp
                | ComponentKind::Speaker
                | ComponentKind::Line
        )
    }

    /// Control family owned by this kind.
    pub const fn control_family(self) -> ControlFamily {
        match self {
            ComponentKind::Mixer
            | ComponentKind::MixerNamedCtrl
            | ComponentKind::AnalogSwitch
            | ComponentKind::Pga
            | ComponentKind::Speaker => ControlFamily::Mixer,
            ComponentKind::Mux | ComponentKind::VirtMux | ComponentKind::ValueMux => {
                ControlFamily::Mux
            }
            _ => ControlFamily::Plain,
        }
    }

    /// Whether `active` stream state is meaningful for this kind.
    pub const fn is_stream_endpoint(self) -> bool {
        matches!(
            self,
            ComponentKind::Dac | ComponentKind::Adc | ComponentKind::AifIn | ComponentKind::AifOut
        )
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentKind {
    type Err = SapmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let alias = match normalized.as_str() {
            "speaker" => "spk",
            "headphone" => "hp",
            "micbias" => "mic_bias",
            "virtmux" => "virt_mux",
            "valuemux" => "value_mux",
            "outdrv" => "out_drv",
            other => other,
        };
        ALL_KINDS
            .iter()
            .copied()
            .find(|k| k.as_str() == alias)
            .ok_or_else(|| SapmError::InvalidParam(format!("unknown component kind '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_round_trips_through_its_name() {
        for kind in ALL_KINDS {
            assert_eq!(kind.as_str().parse::<ComponentKind>().unwrap(), kind);
        }
    }

    #[test]
    fn aliases_parse() {
        assert_eq!("Speaker".parse::<ComponentKind>().unwrap(), ComponentKind::Speaker);
        assert_eq!("MICBIAS".parse::<ComponentKind>().unwrap(), ComponentKind::MicBias);
        assert_eq!("aif-in".parse::<ComponentKind>().unwrap(), ComponentKind::AifIn);
        assert!("flux_capacitor".parse::<ComponentKind>().is_err());
    }

    #[test]
    fn supplies_power_up_before_converters_and_down_after() {
        let supply = ComponentKind::Supply;
        let dac = ComponentKind::Dac;
        assert!(supply.power_up_phase() < dac.power_up_phase());
        assert!(supply.power_down_phase() > dac.power_down_phase());
    }

    #[test]
    fn playback_chain_phases_are_mirrored() {
        let chain = [
            ComponentKind::Dac,
            ComponentKind::Mixer,
            ComponentKind::Pga,
            ComponentKind::Speaker,
        ];
        for pair in chain.windows(2) {
            assert!(pair[0].power_up_phase() < pair[1].power_up_phase());
            assert!(pair[0].power_down_phase() > pair[1].power_down_phase());
        }
    }

    #[test]
    fn line_terminates_both_walks() {
        assert!(ComponentKind::Line.is_input_terminal());
        assert!(ComponentKind::Line.is_output_terminal());
        assert!(!ComponentKind::Mixer.is_input_terminal());
        assert!(!ComponentKind::Mixer.is_output_terminal());
    }

    #[test]
    fn policies_follow_stream_direction() {
        assert_eq!(ComponentKind::Adc.power_check(), PowerCheck::Adc);
        assert_eq!(ComponentKind::AifOut.power_check(), PowerCheck::Adc);
        assert_eq!(ComponentKind::Dac.power_check(), PowerCheck::Dac);
        assert_eq!(ComponentKind::AifIn.power_check(), PowerCheck::Dac);
        assert_eq!(ComponentKind::Speaker.power_check(), PowerCheck::Generic);
    }
}
