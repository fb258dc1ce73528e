// src/telemetry.rs - Decoded device messages and their code taxonomy
use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

/// One decoded inbound device message.
///
/// The device schema is loose: only `commandType` is guaranteed, numeric
/// fields sometimes arrive as strings, and unknown fields must never make
/// a record undecodable. Everything unrecognized lands in `extra`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryRecord {
    #[serde(rename = "commandType", default)]
    pub command_type: i64,
    #[serde(rename = "subType", default)]
    pub sub_type: Option<i64>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub time: Option<Value>,
    #[serde(rename = "resData", default)]
    pub res_data: Option<String>,
    #[serde(rename = "currentTemp", default)]
    pub current_temp: Option<Value>,
    #[serde(rename = "targetTemp", default)]
    pub target_temp: Option<Value>,
    #[serde(rename = "real_print_layer", default)]
    pub real_print_layer: Option<Value>,
    #[serde(rename = "total_layer", default)]
    pub total_layer: Option<Value>,
    #[serde(default)]
    pub img: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Best-effort numeric read: accepts numbers and numeric strings,
/// anything else counts as absent.
pub fn as_f64(value: &Option<Value>) -> Option<f64> {
    match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

impl TelemetryRecord {
    pub fn command(&self) -> CommandType {
        CommandType::from_code(self.command_type)
    }

    pub fn value_f64(&self) -> f64 {
        as_f64(&self.value).unwrap_or(0.0)
    }

    pub fn value_i64(&self) -> i64 {
        self.value_f64() as i64
    }

    pub fn time_f64(&self) -> f64 {
        as_f64(&self.time).unwrap_or(0.0)
    }
}

/// Closed enumeration of device command codes.
///
/// The wire protocol reserves the 1000 block for printer telemetry;
/// anything outside the mapped set decodes to `Unknown` and is ignored
/// downstream rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandType {
    EventNotify,
    PrintSchedule,
    FirmwareVersion,
    NozzleTemp,
    HotbedTemp,
    FanSpeed,
    PrintSpeed,
    AutoLeveling,
    PrintControl,
    FileListRequest,
    GcodeCommand,
    PreviewImageUrl,
    MotorLock,
    ModelLayer,
    Unknown(i64),
}

impl CommandType {
    pub fn from_code(code: i64) -> Self {
        match code {
            1000 => Self::EventNotify,
            1001 => Self::PrintSchedule,
            1002 => Self::FirmwareVersion,
            1003 => Self::NozzleTemp,
            1004 => Self::HotbedTemp,
            1005 => Self::FanSpeed,
            1006 => Self::PrintSpeed,
            1007 => Self::AutoLeveling,
            1008 => Self::PrintControl,
            1009 => Self::FileListRequest,
            1010 => Self::GcodeCommand,
            1011 => Self::PreviewImageUrl,
            1012 => Self::MotorLock,
            1013 => Self::ModelLayer,
            other => Self::Unknown(other),
        }
    }
}

/// Print-lifecycle event codes (`EventNotify`, subType 1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintEvent {
    Idle,
    Printing,
    Paused,
    Stopped,
    Completed,
    Leveling,
    Downloading,
    LevelHeating,
    Heating,
    Preheat,
    PrintDownloading,
}

impl PrintEvent {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::Printing),
            2 => Some(Self::Paused),
            3 => Some(Self::Stopped),
            4 => Some(Self::Completed),
            5 => Some(Self::Leveling),
            6 => Some(Self::Downloading),
            7 => Some(Self::LevelHeating),
            8 => Some(Self::Heating),
            9 => Some(Self::Preheat),
            10 => Some(Self::PrintDownloading),
            _ => None,
        }
    }

    /// Lifecycle state token mirrored into `print_stats.state`.
    pub fn state(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Printing => "printing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Completed => "completed",
            Self::Leveling => "leveling",
            Self::Downloading => "downloading",
            Self::LevelHeating => "level-heating",
            Self::Heating => "heating",
            Self::Preheat => "preheat",
            Self::PrintDownloading => "print-downloading",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Printing => "Printing",
            Self::Paused => "Print paused",
            Self::Stopped => "Print stopped",
            Self::Completed => "Print completed",
            Self::Leveling => "Leveling..",
            Self::Downloading => "Downloading..",
            Self::LevelHeating => "Level heating",
            Self::Heating => "Heating..",
            Self::Preheat => "Preheating..",
            Self::PrintDownloading => "Print download..",
        }
    }
}

/// Controller fault codes (`EventNotify`, subType 2), numbered in the
/// device's published alert order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultEvent {
    AlertHalted,
    AlertOffline,
    AlertNozzleHeat,
    AlertPanelHeat,
    AlertPrint,
    AlertBlanking,
    AlertBlocking,
    AlertLeveling,
    MarlinCommError,
    LevelBoardCommError,
    NozzleHighTemp,
    HeatbedHighTemp,
    HeatbedMos1,
    LevelFailed,
    HeatbedMos2,
    NozzleLowTemp,
    AutoPause,
    PrintDownloadFailed,
}

impl FaultEvent {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::AlertHalted),
            2 => Some(Self::AlertOffline),
            3 => Some(Self::AlertNozzleHeat),
            4 => Some(Self::AlertPanelHeat),
            5 => Some(Self::AlertPrint),
            6 => Some(Self::AlertBlanking),
            7 => Some(Self::AlertBlocking),
            8 => Some(Self::AlertLeveling),
            9 => Some(Self::MarlinCommError),
            10 => Some(Self::LevelBoardCommError),
            11 => Some(Self::NozzleHighTemp),
            12 => Some(Self::HeatbedHighTemp),
            13 => Some(Self::HeatbedMos1),
            14 => Some(Self::LevelFailed),
            15 => Some(Self::HeatbedMos2),
            16 => Some(Self::NozzleLowTemp),
            17 => Some(Self::AutoPause),
            18 => Some(Self::PrintDownloadFailed),
            _ => None,
        }
    }

    /// Fixed message token surfaced on the display status.
    pub fn message(self) -> &'static str {
        match self {
            Self::AlertHalted => "marlin_alert_halted",
            Self::AlertOffline => "marlin_alert_offline",
            Self::AlertNozzleHeat => "marlin_alert_nozzle_heat",
            Self::AlertPanelHeat => "marlin_alert_panel_heat",
            Self::AlertPrint => "marlin_alert_print",
            Self::AlertBlanking => "marlin_alert_blanking",
            Self::AlertBlocking => "marlin_alert_blocking",
            Self::AlertLeveling => "marlin_alert_leveling",
            Self::MarlinCommError => "marlin_comm_err",
            Self::LevelBoardCommError => "lboard_comm_err",
            Self::NozzleHighTemp => "nozzle_high_temp",
            Self::HeatbedHighTemp => "heatbed_high_temp",
            Self::HeatbedMos1 => "heatbed_mos1",
            Self::LevelFailed => "level_failed",
            Self::HeatbedMos2 => "heatbed_mos2",
            Self::NozzleLowTemp => "nozzle_low_temp",
            Self::AutoPause => "marlin_auto_pause",
            Self::PrintDownloadFailed => "print_dl_failed",
        }
    }
}
