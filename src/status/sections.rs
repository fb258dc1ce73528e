// src/status/sections.rs - Klipper-style status objects mirrored to clients
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct Webhooks {
    pub state: String,
    pub state_message: String,
}

impl Default for Webhooks {
    fn default() -> Self {
        Self {
            state: "ready".to_string(),
            state_message: "Printer is ready".to_string(),
        }
    }
}

/// Aggregate print progress and lifecycle state.
#[derive(Debug, Clone, Serialize)]
pub struct PrintStats {
    pub filename: Option<String>,
    pub total_duration: f64,
    pub print_duration: f64,
    pub filament_used: f64,
    pub state: String,
    pub message: String,
}

impl Default for PrintStats {
    fn default() -> Self {
        Self {
            filename: None,
            total_duration: 0.0,
            print_duration: 0.0,
            filament_used: 0.0,
            state: "standby".to_string(),
            message: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct HeaterBed {
    pub temperature: f64,
    pub target: f64,
    pub power: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Extruder {
    pub temperature: f64,
    pub target: f64,
    pub power: f64,
    pub can_extrude: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Heaters {
    pub available_heaters: Vec<String>,
    pub available_sensors: Vec<String>,
}

impl Default for Heaters {
    fn default() -> Self {
        Self {
            available_heaters: vec!["extruder".to_string(), "heater_bed".to_string()],
            available_sensors: vec!["extruder".to_string(), "heater_bed".to_string()],
        }
    }
}

/// Front-panel style message and progress fraction.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DisplayStatus {
    pub message: Option<String>,
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IdleTimeout {
    pub state: String,
    pub printing_time: f64,
}

impl Default for IdleTimeout {
    fn default() -> Self {
        Self {
            state: "Idle".to_string(),
            printing_time: 0.0,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Toolhead {
    pub homed_axes: String,
    pub position: [f64; 4],
    pub max_velocity: f64,
    pub max_accel: f64,
}

impl Default for Toolhead {
    fn default() -> Self {
        Self {
            homed_axes: String::new(),
            position: [0.0; 4],
            max_velocity: 500.0,
            max_accel: 5000.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MotionReport {
    pub live_position: [f64; 4],
    pub live_velocity: f64,
    pub live_extruder_velocity: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Configfile {
    pub config: BTreeMap<String, Value>,
    pub settings: BTreeMap<String, Value>,
    pub save_config_pending: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Mcu {
    pub mcu_version: String,
    pub last_stats: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepperEnable {
    pub steppers: BTreeMap<String, bool>,
}

impl Default for StepperEnable {
    fn default() -> Self {
        let steppers = ["stepper_x", "stepper_y", "stepper_z", "extruder"]
            .into_iter()
            .map(|name| (name.to_string(), false))
            .collect();
        Self { steppers }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GcodeMove {
    pub speed_factor: f64,
    pub speed: f64,
    pub extrude_factor: f64,
    pub absolute_coordinates: bool,
    pub absolute_extrude: bool,
    pub homing_origin: [f64; 4],
    pub position: [f64; 4],
    pub gcode_position: [f64; 4],
}

impl Default for GcodeMove {
    fn default() -> Self {
        Self {
            speed_factor: 1.0,
            speed: 0.0,
            extrude_factor: 1.0,
            absolute_coordinates: true,
            absolute_extrude: true,
            homing_origin: [0.0; 4],
            position: [0.0; 4],
            gcode_position: [0.0; 4],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExcludeObject {
    pub objects: Vec<Value>,
    pub excluded_objects: Vec<String>,
    pub current_object: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct VirtualSdcard {
    pub progress: Option<f64>,
    pub file_position: Option<u64>,
    pub is_active: bool,
}

/// Probed mesh state; filled in when the device reports a leveling grid.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BedMesh {
    pub profile_name: String,
    pub probed_matrix: Vec<Vec<f64>>,
    pub mesh_matrix: Vec<Vec<f64>>,
    pub profiles: BTreeMap<String, BedMeshProfile>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BedMeshProfile {
    pub points: Vec<Vec<f64>>,
    pub mesh_params: BedMeshParams,
}

#[derive(Debug, Clone, Serialize)]
pub struct BedMeshParams {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub x_count: u32,
    pub y_count: u32,
    pub algo: String,
}

impl Default for BedMeshParams {
    fn default() -> Self {
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 235.0,
            max_y: 235.0,
            x_count: 7,
            y_count: 7,
            algo: "bicubic".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SystemStats {
    pub sysload: f64,
    pub cputime: f64,
    pub memavail: u64,
}
