// src/status/mod.rs - Canonical status model with hash-based diffing
pub mod hash;
pub mod sections;

use std::collections::HashMap;

use serde_json::{Map, Value};

pub use hash::structural_hash;
pub use sections::*;

/// Names of every status section, fixed for the model's lifetime.
pub const SECTION_NAMES: &[&str] = &[
    "webhooks",
    "print_stats",
    "heater_bed",
    "extruder",
    "heaters",
    "display_status",
    "idle_timeout",
    "toolhead",
    "motion_report",
    "configfile",
    "mcu",
    "stepper_enable",
    "gcode_move",
    "exclude_object",
    "virtual_sdcard",
    "bed_mesh",
    "system_stats",
];

/// The canonical device state mirrored to clients.
///
/// Sections are mutated freely by the translator; `status_update` reports
/// exactly the sections whose serialized form changed since the last
/// baseline and rearms the baseline.
#[derive(Debug)]
pub struct StatusModel {
    pub webhooks: Webhooks,
    pub print_stats: PrintStats,
    pub heater_bed: HeaterBed,
    pub extruder: Extruder,
    pub heaters: Heaters,
    pub display_status: DisplayStatus,
    pub idle_timeout: IdleTimeout,
    pub toolhead: Toolhead,
    pub motion_report: MotionReport,
    pub configfile: Configfile,
    pub mcu: Mcu,
    pub stepper_enable: StepperEnable,
    pub gcode_move: GcodeMove,
    pub exclude_object: ExcludeObject,
    pub virtual_sdcard: VirtualSdcard,
    pub bed_mesh: BedMesh,
    pub system_stats: SystemStats,
    baseline: HashMap<&'static str, u64>,
}

impl StatusModel {
    pub fn new() -> Self {
        let mut model = Self {
            webhooks: Webhooks::default(),
            print_stats: PrintStats::default(),
            heater_bed: HeaterBed::default(),
            extruder: Extruder::default(),
            heaters: Heaters::default(),
            display_status: DisplayStatus::default(),
            idle_timeout: IdleTimeout::default(),
            toolhead: Toolhead::default(),
            motion_report: MotionReport::default(),
            configfile: Configfile::default(),
            mcu: Mcu::default(),
            stepper_enable: StepperEnable::default(),
            gcode_move: GcodeMove::default(),
            exclude_object: ExcludeObject::default(),
            virtual_sdcard: VirtualSdcard::default(),
            bed_mesh: BedMesh::default(),
            system_stats: SystemStats::default(),
            baseline: HashMap::new(),
        };
        model.snapshot();
        model
    }

    /// Serialized view of one section. Unknown names are a bug in the
    /// caller, not device input; panic rather than guess.
    pub fn section_value(&self, name: &str) -> Value {
        let serialized = match name {
            "webhooks" => serde_json::to_value(&self.webhooks),
            "print_stats" => serde_json::to_value(&self.print_stats),
            "heater_bed" => serde_json::to_value(&self.heater_bed),
            "extruder" => serde_json::to_value(&self.extruder),
            "heaters" => serde_json::to_value(&self.heaters),
            "display_status" => serde_json::to_value(&self.display_status),
            "idle_timeout" => serde_json::to_value(&self.idle_timeout),
            "toolhead" => serde_json::to_value(&self.toolhead),
            "motion_report" => serde_json::to_value(&self.motion_report),
            "configfile" => serde_json::to_value(&self.configfile),
            "mcu" => serde_json::to_value(&self.mcu),
            "stepper_enable" => serde_json::to_value(&self.stepper_enable),
            "gcode_move" => serde_json::to_value(&self.gcode_move),
            "exclude_object" => serde_json::to_value(&self.exclude_object),
            "virtual_sdcard" => serde_json::to_value(&self.virtual_sdcard),
            "bed_mesh" => serde_json::to_value(&self.bed_mesh),
            "system_stats" => serde_json::to_value(&self.system_stats),
            other => panic!("unknown status section: {other}"),
        };
        serialized.expect("status sections serialize to JSON")
    }

    /// Rebase change detection on the current contents.
    pub fn snapshot(&mut self) {
        for name in SECTION_NAMES {
            let hash = structural_hash(&self.section_value(name));
            self.baseline.insert(*name, hash);
        }
    }

    /// Section names whose content differs from the baseline. Pure.
    pub fn changed_sections(&self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        for name in SECTION_NAMES {
            let hash = structural_hash(&self.section_value(name));
            if self.baseline.get(name) != Some(&hash) {
                changed.push(*name);
            }
        }
        changed
    }

    /// Changed sections in serialized form; rearms the baseline. An empty
    /// map means nothing changed and no notification is due.
    pub fn status_update(&mut self) -> Map<String, Value> {
        let mut update = Map::new();
        for name in self.changed_sections() {
            update.insert(name.to_string(), self.section_value(name));
        }
        self.snapshot();
        update
    }

    /// Every section in serialized form, for first contact or resync.
    pub fn status_full(&self) -> Map<String, Value> {
        SECTION_NAMES
            .iter()
            .map(|name| (name.to_string(), self.section_value(name)))
            .collect()
    }
}

impl Default for StatusModel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_reports_exactly_the_changed_sections() {
        let mut model = StatusModel::new();
        model.heater_bed.temperature = 60.0;
        model.print_stats.state = "printing".to_string();

        // Reported in declaration order.
        assert_eq!(model.changed_sections(), vec!["print_stats", "heater_bed"]);

        let update = model.status_update();
        assert_eq!(update.len(), 2);
        assert!(update.contains_key("heater_bed"));
        assert!(update.contains_key("print_stats"));
    }

    #[test]
    fn test_repeated_update_is_empty() {
        let mut model = StatusModel::new();
        model.extruder.target = 210.0;
        assert!(!model.status_update().is_empty());
        assert!(model.status_update().is_empty());
    }

    #[test]
    fn test_no_mutation_no_update() {
        let mut model = StatusModel::new();
        assert!(model.status_update().is_empty());
    }

    #[test]
    fn test_changed_sections_is_pure() {
        let mut model = StatusModel::new();
        model.toolhead.homed_axes = "xyz".to_string();
        assert_eq!(model.changed_sections(), vec!["toolhead"]);
        // Still pending until status_update rearms the baseline.
        assert_eq!(model.changed_sections(), vec!["toolhead"]);
    }

    #[test]
    fn test_full_always_returns_every_section() {
        let mut model = StatusModel::new();
        assert_eq!(model.status_full().len(), SECTION_NAMES.len());
        model.status_update();
        assert_eq!(model.status_full().len(), SECTION_NAMES.len());
    }

    #[test]
    fn test_revert_before_update_reports_nothing() {
        let mut model = StatusModel::new();
        let original = model.heater_bed.temperature;
        model.heater_bed.temperature = 55.0;
        model.heater_bed.temperature = original;
        assert!(model.status_update().is_empty());
    }

    #[test]
    #[should_panic(expected = "unknown status section")]
    fn test_unknown_section_panics() {
        StatusModel::new().section_value("no_such_section");
    }
}
