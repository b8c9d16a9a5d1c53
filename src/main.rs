//! Photoreactor control daemon — entry point.
//!
//! Reads the box endpoints from the environment, boots the controller,
//! and streams the one-second state snapshot.  Without configured
//! endpoints (or with `REACTOR_BOX=sim`) it runs against the in-process
//! simulated rig, which is the standalone smoke mode; attaching the real
//! rig happens through the companion transport service.

use std::env;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Result};
use log::info;

use photoreactor::adapters::sim::SimFactory;
use photoreactor::boxes::power::PowerPanel;
use photoreactor::boxes::reactor::ReactorPanel;
use photoreactor::config::ControllerConfig;
use photoreactor::config_folder::ConfigManager;
use photoreactor::control::controller::Controller;
use photoreactor::device::ports::Endpoint;
use photoreactor::snapshots::ControllerStateWsData;

fn endpoint_from_env(host_var: &str, port_var: &str) -> Result<Option<Endpoint>> {
    let Ok(host) = env::var(host_var) else {
        return Ok(None);
    };
    if host.is_empty() || host == "sim" {
        return Ok(None);
    }
    let port = match env::var(port_var) {
        Ok(port) => port.parse()?,
        Err(_) => Endpoint::DEFAULT_PORT,
    };
    Ok(Some(Endpoint::new(host, port)))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("photoreactor control core v{}", env!("CARGO_PKG_VERSION"));

    let reactor_endpoint = endpoint_from_env("REACTOR_BOX", "REACTOR_BOX_PORT")?;
    let power_endpoint = endpoint_from_env("POWER_BOX", "POWER_BOX_PORT")?;
    if let Some(endpoint) = reactor_endpoint.as_ref().or(power_endpoint.as_ref()) {
        bail!(
            "net-attached rig ({}:{}) needs the vendor transport service; \
             unset REACTOR_BOX/POWER_BOX to run the simulated rig",
            endpoint.host,
            endpoint.port
        );
    }

    info!("no box endpoints configured, booting the simulated rig");

    let reactor_factory = SimFactory::new();
    let power_factory = SimFactory::new();

    // Idle wiring: lids closed, water sensor dry (active-low), buttons
    // released (active-low).
    let reactor_io = reactor_factory.sim_io16(
        photoreactor::device::manifold::ReactorBoxBricklets::UID_IO,
    );
    for channel in ReactorPanel::INPUT_SAMPLE_LANE {
        reactor_io.preset_input(channel, true);
    }
    let power_io =
        power_factory.sim_io16(photoreactor::device::manifold::PowerBoxBricklets::UID_IO);
    power_io.preset_input(PowerPanel::INPUT_WATER_DETECTED, true);

    let records = ConfigManager::new("./photoreactor-data")?;
    let controller = Controller::new(
        &reactor_factory,
        &power_factory,
        ControllerConfig::default(),
        Box::new(move |lane, record| {
            info!("{lane}: experiment {} finished, persisting record", record.uid);
            if let Err(e) = records.experiments.add(&record) {
                log::error!("persisting record failed: {e}");
            }
        }),
    );

    controller.connect()?;
    controller.initialize();

    loop {
        reactor_io.tick_monoflops();
        power_io.tick_monoflops();
        let snapshot = ControllerStateWsData::from_state(&controller.state_snapshot());
        println!("{}", snapshot.to_json()?);
        thread::sleep(Duration::from_secs(1));
    }
}
