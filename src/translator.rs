// src/translator.rs - Telemetry-to-status state machine
use std::sync::LazyLock;

use regex::Regex;

use crate::rpc::Notification;
use crate::status::{BedMeshProfile, StatusModel};
use crate::telemetry::{as_f64, CommandType, FaultEvent, PrintEvent, TelemetryRecord};

/// Debug noise the firmware interleaves with real command output,
/// stripped per line before anything else looks at the text.
static GCODE_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\+ringbuf:\d+,512,\d+$|^pack dissymm$").expect("noise pattern compiles")
});

const LEVELING_GRID_HEADER: &str = "Bilinear Leveling Grid:";
const MESH_PROFILE_NAME: &str = "anker-builtin";

// The device reports remaining time against a fixed schedule length.
const SCHEDULE_TOTAL: f64 = 670.0;

/// Current nozzle/bed readings, decoupled from the published model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HeaterReading {
    pub current: f64,
    pub target: f64,
}

impl HeaterReading {
    /// Temps arrive in centidegrees, as numbers or numeric strings.
    pub fn from_record(record: &TelemetryRecord) -> Self {
        Self {
            current: as_f64(&record.current_temp).unwrap_or(0.0) / 100.0,
            target: as_f64(&record.target_temp).unwrap_or(0.0) / 100.0,
        }
    }

    /// Approximate "actively heating" signal; the device exposes no real
    /// relay state, so target above current has to stand in for it.
    pub fn power(&self) -> f64 {
        (self.target > self.current) as i64 as f64
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PrinterState {
    pub nozzle: HeaterReading,
    pub hotbed: HeaterReading,
}

/// Parse the firmware's bed leveling grid report.
///
/// Returns the 7 probed rows, or `None` for anything that is not a
/// well-formed grid report. Absence is a normal branch for callers,
/// never an error.
pub fn parse_leveling_grid(data: &str) -> Option<Vec<Vec<f64>>> {
    let lines: Vec<&str> = data.lines().collect();

    if !lines.first()?.starts_with(LEVELING_GRID_HEADER) {
        return None;
    }
    if lines.get(1)?.split_whitespace().next()? != "0" {
        return None;
    }
    if lines.get(2)?.split_whitespace().next()? != "0" {
        return None;
    }

    let mut rows = Vec::with_capacity(7);
    for line in lines.get(2..9)? {
        let row = line
            .split_whitespace()
            .skip(1)
            .map(|token| token.parse().ok())
            .collect::<Option<Vec<f64>>>()?;
        rows.push(row);
    }

    if rows.iter().any(|row| row.is_empty() || row.len() != rows[0].len()) {
        return None;
    }

    Some(rows)
}

/// Maps raw telemetry onto the status model and ephemeral printer state.
///
/// `dispatch` never fails on device input: unrecognized codes and
/// malformed shapes are ignored, and the only direct output is the
/// occasional response-style notification to forward verbatim.
#[derive(Debug, Default)]
pub struct EventTranslator {
    pub model: StatusModel,
    pub printer: PrinterState,
}

impl EventTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dispatch(&mut self, record: &TelemetryRecord) -> Option<Notification> {
        match record.command() {
            CommandType::NozzleTemp => {
                self.printer.nozzle = HeaterReading::from_record(record);
                let nozzle = self.printer.nozzle;
                self.model.extruder.temperature = nozzle.current;
                self.model.extruder.target = nozzle.target;
                self.model.extruder.power = nozzle.power();
                None
            }
            CommandType::HotbedTemp => {
                self.printer.hotbed = HeaterReading::from_record(record);
                let hotbed = self.printer.hotbed;
                self.model.heater_bed.temperature = hotbed.current;
                self.model.heater_bed.target = hotbed.target;
                self.model.heater_bed.power = hotbed.power();
                None
            }
            CommandType::AutoLeveling => {
                self.on_auto_leveling(record.value_i64());
                None
            }
            CommandType::PrintSchedule => {
                let elapsed = SCHEDULE_TOTAL - record.time_f64();
                self.model.print_stats.total_duration = elapsed;
                self.model.print_stats.print_duration = elapsed;
                None
            }
            CommandType::MotorLock => {
                let locked = record.value_i64() != 0;
                self.model.toolhead.homed_axes = if locked { "xyz" } else { "" }.to_string();
                None
            }
            CommandType::GcodeCommand => self.on_gcode_response(record.res_data.as_deref()?),
            CommandType::EventNotify => {
                match record.sub_type {
                    Some(1) => self.on_print_event(record.value_i64()),
                    Some(2) => self.on_fault_event(record.value_i64()),
                    _ => {}
                }
                None
            }
            CommandType::ModelLayer => {
                self.on_model_layer(record);
                None
            }
            _ => None,
        }
    }

    /// Leveling progress arrives as a probe index. The device reports no
    /// real print progress while leveling, so placeholder counters keep
    /// clients rendering a live job.
    fn on_auto_leveling(&mut self, index: i64) {
        if index < 50 {
            let progress = index as f64 / 49.0;
            self.model.display_status.message = Some("Bed leveling in progress..".to_string());
            self.model.display_status.progress = Some(progress);

            self.model.virtual_sdcard.progress = Some(progress);
            self.model.virtual_sdcard.file_position = None;

            self.model.print_stats.total_duration = 1.0;
            self.model.print_stats.print_duration = 1.0;
            self.model.print_stats.filament_used = 1.0;
            self.model.print_stats.filename = None;
            self.model.print_stats.state = "printing".to_string();
        } else {
            self.model.display_status.message = None;
            self.model.display_status.progress = None;
        }
    }

    fn on_gcode_response(&mut self, raw: &str) -> Option<Notification> {
        let cleaned = GCODE_NOISE.replace_all(raw, "");
        let cleaned = cleaned.trim_end();

        if cleaned.starts_with(LEVELING_GRID_HEADER) {
            let matrix = parse_leveling_grid(cleaned)?;
            tracing::debug!(rows = matrix.len(), "installing probed bed mesh");
            self.model.bed_mesh.profile_name = MESH_PROFILE_NAME.to_string();
            self.model.bed_mesh.probed_matrix = matrix.clone();
            self.model.bed_mesh.profiles.clear();
            self.model.bed_mesh.profiles.insert(
                MESH_PROFILE_NAME.to_string(),
                BedMeshProfile {
                    points: matrix,
                    mesh_params: Default::default(),
                },
            );
            None
        } else {
            Some(Notification::gcode_response(cleaned))
        }
    }

    fn on_print_event(&mut self, code: i64) {
        let Some(event) = PrintEvent::from_code(code) else {
            tracing::debug!(code, "unmapped print event");
            return;
        };

        // The device emits leveling events mid-print; switching state away
        // from "printing" would flap every observer.
        if event == PrintEvent::Leveling && self.model.print_stats.state == "printing" {
            return;
        }

        self.model.display_status.message = Some(event.message().to_string());
        self.model.print_stats.state = event.state().to_string();
    }

    /// Faults always win: state goes to "error" even when the fault code
    /// itself is unmapped, and regardless of any lifecycle event seen
    /// earlier in the same batch.
    fn on_fault_event(&mut self, code: i64) {
        self.model.print_stats.state = "error".to_string();
        if let Some(fault) = FaultEvent::from_code(code) {
            self.model.display_status.message = Some(fault.message().to_string());
        } else {
            tracing::debug!(code, "unmapped fault event");
        }
    }

    fn on_model_layer(&mut self, record: &TelemetryRecord) {
        let real = as_f64(&record.real_print_layer).unwrap_or(0.0);
        let total = match as_f64(&record.total_layer) {
            Some(t) if t > 0.0 => t,
            _ => 1.0,
        };
        let progress = real / total;

        self.model.display_status.message = Some("Printing".to_string());
        self.model.display_status.progress = Some(progress);
        self.model.virtual_sdcard.progress = Some(progress);
    }
}
