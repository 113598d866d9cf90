use dora_node_api::{
    arrow::array::{Array, BinaryArray},
    dora_core::config::DataId,
    DoraNode, Event,
};
use eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::time::Instant;
use teleop_lib::{
    init_tracing, latest_channel, ActuatorInterface, ControlError, JointState,
    JointTorqueCommand, JointVector, TorqueConfig, TorqueControlLoop, TorqueLoopState,
};
use tracing::{debug, info, warn};

/// Latest robot state from the driver, and the torque command produced for it.
struct DriverBridge {
    positions: JointVector,
    velocities: JointVector,
    command: Option<JointVector>,
}

impl DriverBridge {
    fn new() -> Self {
        Self {
            positions: JointVector::zeros(),
            velocities: JointVector::zeros(),
            command: None,
        }
    }

    fn update(&mut self, state: &JointState) -> Result<(), ControlError> {
        let positions = state.position_vector()?;
        let velocities = state.velocity_vector()?;
        self.positions = positions;
        self.velocities = velocities;
        Ok(())
    }
}

impl ActuatorInterface for DriverBridge {
    fn joint_positions(&self) -> JointVector {
        self.positions
    }

    fn joint_velocities(&self) -> JointVector {
        self.velocities
    }

    fn command_torques(&mut self, torques: &JointVector) {
        self.command = Some(*torques);
    }
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

    info!("Starting torque controller node");

    let (mut node, mut events) = DoraNode::init_from_env()?;
    let torque_output = DataId::from("joint_torques".to_owned());

    let config_path = std::env::var("TORQUE_CONFIG")
        .unwrap_or_else(|_| "config/torque_controller.toml".to_string());

    let config = TorqueConfig::load_from_file(&config_path)
        .map_err(|e| eyre::eyre!("Failed to load torque config from {}: {}", config_path, e))?;

    info!(
        "Loaded torque configuration for {}: {} Hz, poll timeout {} ms",
        config.arm_id, config.rate_hz, config.poll_timeout_ms
    );

    let (goal_tx, goal_rx) = latest_channel();
    let mut controller = TorqueControlLoop::new(&config, goal_rx)
        .map_err(|e| eyre::eyre!("Invalid torque config: {}", e))?;

    // Desired joint values go straight to the bounded-poll channel, every other
    // event to the control loop
    let (event_tx, event_rx) = flume::unbounded();

    std::thread::spawn(move || {
        let _guard = init_tracing();

        while let Some(event) = events.recv() {
            if let Event::Input { id, data, .. } = &event {
                if id.as_str() == "desired_joint_vals" {
                    if let Some(state) = decode_json::<JointState>(
                        "desired_joint_vals",
                        data.as_any().downcast_ref(),
                    ) {
                        match state.position_vector() {
                            Ok(goal) => {
                                if goal_tx.send(goal).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!("Rejected desired joint values: {}", e),
                        }
                    }
                    continue;
                }
            }

            if event_tx.send(event).is_err() {
                break;
            }
        }
    });

    let mut arm = DriverBridge::new();
    let mut tick_count: u64 = 0;

    info!("Waiting for the first robot state");

    while let Ok(event) = event_rx.recv() {
        match event {
            Event::Input {
                id,
                metadata: _,
                data,
            } => match id.as_str() {
                "robot_state" => {
                    let Some(state) =
                        decode_json::<JointState>("robot_state", data.as_any().downcast_ref())
                    else {
                        continue;
                    };

                    if let Err(e) = arm.update(&state) {
                        warn!("Rejected robot state: {}", e);
                        continue;
                    }

                    if controller.state() == TorqueLoopState::Initializing {
                        controller.activate(&arm, Instant::now())?;
                    }
                }

                "tick" => {
                    if controller.state() == TorqueLoopState::Initializing {
                        debug!("Not activated yet, no robot state");
                        continue;
                    }

                    let report = controller.tick(&mut arm, Instant::now())?;
                    tick_count += 1;

                    if let Some(torques) = arm.command.take() {
                        let command = JointTorqueCommand::new(&torques);
                        if let Err(e) = send_json(&mut node, &torque_output, &command) {
                            warn!("Failed to send joint torques: {}", e);
                        }
                    }

                    if tick_count % 250 == 0 {
                        info!(
                            "Tick {}: {:?}, torques {:?}",
                            tick_count,
                            report.state,
                            report.torques.as_slice()
                        );
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

    info!("Torque controller shutting down after {} ticks", tick_count);
    Ok(())
}
