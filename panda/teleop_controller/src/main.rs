use dora_node_api::{
    arrow::array::{Array, BinaryArray},
    dora_core::config::DataId,
    DoraNode, Event,
};
use eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use teleop_lib::{
    init_tracing, HapticPosition, JointState, KinematicChain, LinearRampTrajectory, TcpPosition,
    TeleopConfig, TeleopFusionLoop, TeleopParams, TeleopState,
};
use tracing::{debug, error, info, warn};

fn build_loop(config: &TeleopConfig) -> Result<TeleopFusionLoop> {
    config
        .validate()
        .map_err(|e| eyre::eyre!("Invalid teleop config: {}", e))?;

    let chain = KinematicChain::from_config(&config.kinematics)?;
    info!(
        "Kinematic chain {} -> {} with {} segments",
        chain.base_frame(),
        chain.tip_frame(),
        chain.segments().len()
    );

    let params = TeleopParams::from_config(config)?;
    info!(
        "Fusion at {} Hz, ramp over {} ticks, latency factor {}",
        params.rate_hz, params.ramp_ticks, params.latency
    );

    let teleop = TeleopFusionLoop::new(
        params,
        Arc::new(chain),
        Arc::new(config.joint_limits()?),
        LinearRampTrajectory::default(),
    )?;
    Ok(teleop)
}

fn decode_json<T: DeserializeOwned>(input: &str, array: Option<&BinaryArray>) -> Option<T> {
    let array = array.filter(|a| a.len() > 0)?;
    match serde_json::from_slice(array.value(0)) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Failed to parse {}: {}", input, e);
            None
        }
    }
}

fn send_json<T: Serialize>(node: &mut DoraNode, output_id: &DataId, value: &T) -> Result<()> {
    let serialized = serde_json::to_vec(value)?;
    let arrow_data = BinaryArray::from_vec(vec![serialized.as_slice()]);
    node.send_output(output_id.clone(), Default::default(), arrow_data)?;
    Ok(())
}

fn main() -> Result<()> {
    let _guard = init_tracing();

    info!("Starting teleop controller node");

    let (mut node, mut events) = DoraNode::init_from_env()?;
    let trajectory_output = DataId::from("joint_trajectory".to_owned());
    let tcp_output = DataId::from("tcp_position".to_owned());

    let config_path = std::env::var("TELEOP_CONFIG")
        .unwrap_or_else(|_| "config/teleop_controller.toml".to_string());

    let config = TeleopConfig::load_from_file(&config_path)
        .map_err(|e| eyre::eyre!("Failed to load teleop config from {}: {}", config_path, e))?;

    info!(
        "Loaded teleop configuration for {}: fusion {} Hz, telemetry {} Hz",
        config.name, config.control.rate_hz, config.control.telemetry_rate_hz
    );

    let mut teleop = build_loop(&config)?;

    info!("Waiting for the first joint state");

    let mut tick_count: u64 = 0;

    while let Some(event) = events.recv() {
        match event {
            Event::Input {
                id,
                metadata: _,
                data,
            } => match id.as_str() {
                "joint_states" => {
                    if let Some(state) =
                        decode_json::<JointState>("joint_states", data.as_any().downcast_ref())
                    {
                        if let Err(e) = teleop.on_joint_state(&state.positions) {
                            warn!("Rejected joint state: {}", e);
                        }
                    }
                }

                "haptic_position" => {
                    if let Some(position) = decode_json::<HapticPosition>(
                        "haptic_position",
                        data.as_any().downcast_ref(),
                    ) {
                        teleop.on_haptic(&position);
                    }
                }

                "tick" => match teleop.tick() {
                    Ok(Some(tick)) => {
                        tick_count += 1;
                        if let Err(e) =
                            send_json(&mut node, &trajectory_output, &tick.setpoint.to_message())
                        {
                            warn!("Failed to send joint trajectory: {}", e);
                        }

                        if tick_count % 20 == 0 {
                            info!(
                                "Tick {}: weight {:.3}, IK {} iterations (residual {:.2e})",
                                tick_count, tick.weight, tick.ik.iterations, tick.ik.residual
                            );
                        }
                    }
                    Ok(None) => {
                        debug!("Idle, no joint state yet");
                    }
                    Err(violation) => {
                        error!("Safety limits violated: {}", violation);
                        return Err(eyre::eyre!("Safety violation, stopping teleop: {}", violation));
                    }
                },

                "telemetry_tick" => {
                    if teleop.state() == TeleopState::Active {
                        let tcp = TcpPosition::from_vector(&teleop.cartesian_target());
                        if let Err(e) = send_json(&mut node, &tcp_output, &tcp) {
                            warn!("Failed to send tcp position: {}", e);
                        }
                    }
                }

                other => {
                    debug!("Unknown input id: {}", other);
                }
            },

            Event::Stop(_) => {
                info!("Stop event received");
                break;
            }

            _ => {}
        }
    }

    info!("Teleop controller shutting down after {} ticks", tick_count);
    Ok(())
}
