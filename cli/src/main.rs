use clap::Parser;
use enduro::core::handle_race::{handle_race, Autopilot, ChannelResponder, DecisionResponder};
use enduro::decision::Decision;
use enduro::interfaces::race_messages::{RaceEvent, RaceMessage};
use enduro::pre::read_sim_pars::read_race_config;
use enduro::pre::sim_opts::SimOpts;
use log::{info, warn};
use std::io::BufRead;
use std::thread;
use std::time::Instant;

fn print_decision(decision: &Decision) {
    println!();
    println!(
        "DECISION {}: {} (lap {}, P{}, {:.0}s to answer)",
        decision.id,
        decision.title,
        decision.context.lap,
        decision.context.position,
        decision.time_limit_s
    );
    for (i, option) in decision.options.iter().enumerate() {
        println!(
            "  [{}] {} ({:?} risk): {}",
            i + 1,
            option.label,
            option.risk,
            option.description
        );
    }
    println!("Enter the number of your choice:");
}

/// print_message shows what happens in the race.
fn print_message(msg: RaceMessage, player_id: &str, interactive: bool) {
    match msg {
        RaceMessage::Event(RaceEvent::DecisionRequired(decision)) => {
            if interactive {
                print_decision(&decision)
            } else {
                info!("Decision {} required: {}", decision.id, decision.title)
            }
        }
        RaceMessage::Event(RaceEvent::LapCompleted {
            driver_id,
            lap,
            lap_time,
            ..
        }) if driver_id == player_id && lap % 10 == 0 => {
            info!("Lap {} completed in {:.3}s", lap, lap_time)
        }
        RaceMessage::Event(RaceEvent::PitStop { driver_id, lap, .. }) if driver_id == player_id => {
            info!("Pit stop after lap {}", lap)
        }
        RaceMessage::Outcome(outcome) => println!("OUTCOME: {}", outcome.summary),
        RaceMessage::Finished(_) => info!("Race finished"),
        _ => {}
    }
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    let default_filter = if sim_opts.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    // get race configuration
    info!("Reading race parameters from {:?}", sim_opts.parfile_path);
    let mut config = read_race_config(&sim_opts.parfile_path)?;
    if let Some(seed) = sim_opts.seed {
        config.sim.seed = seed;
    }
    let player_id = config
        .drivers
        .iter()
        .find(|d| d.is_player)
        .map(|d| d.id.to_owned())
        .unwrap_or_default();

    info!(
        "Simulating {} laps at {} with a time step size of {:.3}s",
        config.track.tot_no_laps, config.track.name, sim_opts.timestep_size
    );

    // EXECUTION -----------------------------------------------------------------------------------
    let t_start = Instant::now();
    let (tx, rx) = flume::unbounded::<RaceMessage>();

    let mut responder: Box<dyn DecisionResponder + Send> = if sim_opts.interactive {
        let (answer_tx, answer_rx) = flume::unbounded::<String>();
        thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) => {
                        if answer_tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Could not read from stdin: {}", e);
                        break;
                    }
                }
            }
        });
        Box::new(ChannelResponder::new(answer_rx))
    } else {
        Box::new(Autopilot)
    };

    let realtime_factor = if sim_opts.realtime {
        Some(sim_opts.realtime_factor)
    } else {
        None
    };
    let timestep_size = sim_opts.timestep_size;
    let sim_thread = thread::spawn(move || {
        handle_race(
            &config,
            timestep_size,
            responder.as_mut(),
            Some(&tx),
            realtime_factor,
        )
    });

    for msg in rx.iter() {
        print_message(msg, &player_id, sim_opts.interactive);
    }

    let race_result = match sim_thread.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("Simulation thread panicked!"),
    };

    info!("Execution time: {}ms", t_start.elapsed().as_millis());

    // POST-PROCESSING -----------------------------------------------------------------------------
    race_result.print_classification();
    race_result.print_lap_and_race_times();

    if let Some(path) = &sim_opts.output_path {
        race_result.write_lap_and_race_times_to_file(path)?;
        info!("Lap and race times written to {:?}", path);
    }
    if let Some(path) = &sim_opts.csv_path {
        race_result.write_csv(path)?;
        info!("Lap times exported to {:?}", path);
    }

    Ok(())
}
