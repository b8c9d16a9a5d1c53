//! Wire-shaped state snapshots.
//!
//! The push surface emits one `pcrdata` message per second with the full
//! controller state.  These structs pin the JSON field names the frontend
//! binds to; quantities are plain floats, enum states travel as their
//! names.

use serde::{Deserialize, Serialize};

use crate::boxes::power::PowerBoxSensorState;
use crate::boxes::reactor::ReactorBoxSensorState;
use crate::control::controller::ControllerState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactorBoxWsData {
    pub thermocouple_temp: f64,
    pub ambient_light: f64,
    pub ambient_temperature: f64,
    pub lane_1_ir_temp: f64,
    pub lane_2_ir_temp: f64,
    pub lane_3_ir_temp: f64,
    pub uv_index: f64,
    pub lane_1_sample_taken: bool,
    pub lane_2_sample_taken: bool,
    pub lane_3_sample_taken: bool,
    pub maintenance_mode: bool,
    pub cable_control: bool,
}

impl ReactorBoxWsData {
    pub fn from_state(s: &ReactorBoxSensorState) -> Self {
        Self {
            thermocouple_temp: s.thermocouple_temp.celsius(),
            ambient_light: s.ambient_light.lux(),
            ambient_temperature: s.ambient_temperature.celsius(),
            lane_1_ir_temp: s.lane_ir_temp[0].celsius(),
            lane_2_ir_temp: s.lane_ir_temp[1].celsius(),
            lane_3_ir_temp: s.lane_ir_temp[2].celsius(),
            uv_index: s.uv_index.uvi(),
            lane_1_sample_taken: s.lane_sample_taken[0],
            lane_2_sample_taken: s.lane_sample_taken[1],
            lane_3_sample_taken: s.lane_sample_taken[2],
            maintenance_mode: s.maintenance_mode,
            cable_control: s.cable_control,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PowerBoxWsData {
    pub ambient_temperature: f64,
    pub voltage_total: f64,
    pub current_total: f64,
    pub voltage_lane_1_front: f64,
    pub voltage_lane_1_back: f64,
    pub voltage_lane_2_front: f64,
    pub voltage_lane_2_back: f64,
    pub voltage_lane_3_front: f64,
    pub voltage_lane_3_back: f64,
    pub current_lane_1_front: f64,
    pub current_lane_1_back: f64,
    pub current_lane_2_front: f64,
    pub current_lane_2_back: f64,
    pub current_lane_3_front: f64,
    pub current_lane_3_back: f64,
    pub powerbox_lid: String,
    pub reactorbox_lid: String,
    pub led_in_lane_1_front_and_vial: bool,
    pub led_in_lane_1_back: bool,
    pub led_in_lane_2_front_and_vial: bool,
    pub led_in_lane_2_back: bool,
    pub led_in_lane_3_front_and_vial: bool,
    pub led_in_lane_3_back: bool,
    pub water_detected: bool,
    pub cable_control: bool,
}

impl PowerBoxWsData {
    pub fn from_state(s: &PowerBoxSensorState) -> Self {
        Self {
            ambient_temperature: s.ambient_temperature.celsius(),
            voltage_total: s.voltage_total.volts(),
            current_total: s.current_total.amps(),
            voltage_lane_1_front: s.lane_voltage[0][0].volts(),
            voltage_lane_1_back: s.lane_voltage[0][1].volts(),
            voltage_lane_2_front: s.lane_voltage[1][0].volts(),
            voltage_lane_2_back: s.lane_voltage[1][1].volts(),
            voltage_lane_3_front: s.lane_voltage[2][0].volts(),
            voltage_lane_3_back: s.lane_voltage[2][1].volts(),
            current_lane_1_front: s.lane_current[0][0].amps(),
            current_lane_1_back: s.lane_current[0][1].amps(),
            current_lane_2_front: s.lane_current[1][0].amps(),
            current_lane_2_back: s.lane_current[1][1].amps(),
            current_lane_3_front: s.lane_current[2][0].amps(),
            current_lane_3_back: s.lane_current[2][1].amps(),
            powerbox_lid: s.powerbox_lid.name().to_string(),
            reactorbox_lid: s.reactorbox_lid.name().to_string(),
            led_in_lane_1_front_and_vial: s.led_installed[0][0],
            led_in_lane_1_back: s.led_installed[0][1],
            led_in_lane_2_front_and_vial: s.led_installed[1][0],
            led_in_lane_2_back: s.led_installed[1][1],
            led_in_lane_3_front_and_vial: s.led_installed[2][0],
            led_in_lane_3_back: s.led_installed[2][1],
            water_detected: s.water_detected,
            cable_control: s.cable_control,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStateWsData {
    pub reactor_box_connected: bool,
    pub power_box_connected: bool,
    pub sample_lane_1: bool,
    pub sample_lane_2: bool,
    pub sample_lane_3: bool,
    pub exp_running_lane_1: bool,
    pub exp_running_lane_2: bool,
    pub exp_running_lane_3: bool,
    pub uv_installed: bool,
    pub ambient_temp_status: String,
    #[serde(rename = "IR_temp_1_threshold_status")]
    pub ir_temp_1_threshold_status: String,
    #[serde(rename = "IR_temp_2_threshold_status")]
    pub ir_temp_2_threshold_status: String,
    #[serde(rename = "IR_temp_3_threshold_status")]
    pub ir_temp_3_threshold_status: String,
    pub thermocouple_threshold_status: String,
    pub reactor_box_state: ReactorBoxWsData,
    pub power_box_state: PowerBoxWsData,
}

impl ControllerStateWsData {
    pub fn from_state(s: &ControllerState) -> Self {
        Self {
            reactor_box_connected: s.reactor_box_connected,
            power_box_connected: s.power_box_connected,
            sample_lane_1: s.sample_lane[0],
            sample_lane_2: s.sample_lane[1],
            sample_lane_3: s.sample_lane[2],
            exp_running_lane_1: s.exp_running[0],
            exp_running_lane_2: s.exp_running[1],
            exp_running_lane_3: s.exp_running[2],
            uv_installed: s.uv_installed,
            ambient_temp_status: s.ambient_temp_status.name().to_string(),
            ir_temp_1_threshold_status: s.ir_temp_status[0].name().to_string(),
            ir_temp_2_threshold_status: s.ir_temp_status[1].name().to_string(),
            ir_temp_3_threshold_status: s.ir_temp_status[2].name().to_string(),
            thermocouple_threshold_status: s.thermocouple_status.name().to_string(),
            reactor_box_state: ReactorBoxWsData::from_state(&s.reactor_box_state),
            power_box_state: PowerBoxWsData::from_state(&s.power_box_state),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::thresholds::ThresholdStatus;

    #[test]
    fn snapshot_serializes_with_wire_names() {
        let state = ControllerState {
            reactor_box_connected: true,
            power_box_connected: false,
            sample_lane: [true, false, false],
            exp_running: [false, true, false],
            uv_installed: true,
            ambient_temp_status: ThresholdStatus::Ok,
            ir_temp_status: [
                ThresholdStatus::Ok,
                ThresholdStatus::Exceeded,
                ThresholdStatus::OkAgain,
            ],
            thermocouple_status: ThresholdStatus::Ok,
            reactor_box_state: ReactorBoxSensorState::default(),
            power_box_state: PowerBoxSensorState::default(),
        };

        let value: serde_json::Value =
            serde_json::to_value(ControllerStateWsData::from_state(&state)).unwrap();
        assert_eq!(value["IR_temp_2_threshold_status"], "EXCEEDED");
        assert_eq!(value["sample_lane_1"], true);
        assert_eq!(value["exp_running_lane_2"], true);
        assert_eq!(value["power_box_state"]["powerbox_lid"], "OPEN");
    }

    #[test]
    fn ws_round_trip_is_identity() {
        let data = ReactorBoxWsData::from_state(&ReactorBoxSensorState::default());
        let json = serde_json::to_string(&data).unwrap();
        let back: ReactorBoxWsData = serde_json::from_str(&json).unwrap();
        assert_eq!(data, back);
    }
}
