//! Stdin/stdout mining frontend.
//!
//! Reads work messages as JSON lines on stdin, mines them one session at
//! a time and prints solutions as JSON lines on stdout. New work aborts
//! the running session; an unfinished preempted job is echoed back so
//! the feeder can reassign it. With no feeder attached the miner grinds
//! recreational jobs so it can double as a benchmark.

use std::collections::VecDeque;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use log::{info, warn};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

use moto_engine::constants::{FRAME_RATE, WORK_SIZE};
use moto_engine::{
    MineOutcome, Session, Work, check, parse_work, solution_line, work_line,
};

#[derive(Debug, Parser)]
#[command(name = "moto-miner", version)]
#[command(about = "Mines motorbike proofs-of-work fed as JSON lines on stdin")]
struct Args {
    /// Seed for the search RNG; random when omitted
    #[arg(long)]
    seed: Option<u64>,

    /// Frame target for recreational jobs mined while no work is pending
    #[arg(long, default_value_t = FRAME_RATE * 60)]
    fun_frames: i32,

    /// Stop after this many worlds; 0 means run forever
    #[arg(long, default_value_t = 0)]
    max_worlds: u64,

    /// Solver iterations to spend per world before moving to the next;
    /// 0 uses the engine's own search budget
    #[arg(long, default_value_t = 0)]
    iterations: u32,

    /// Exit when stdin closes instead of mining recreational jobs
    #[arg(long)]
    require_work: bool,
}

/// Inbound lines, shared between the reader thread and the mining loop.
struct InputQueue {
    lines: Mutex<VecDeque<String>>,
    open: AtomicBool,
}

impl InputQueue {
    fn new() -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            open: AtomicBool::new(true),
        }
    }

    fn has_pending(&self) -> bool {
        self.lines.lock().map(|l| !l.is_empty()).unwrap_or(false)
    }
}

/// Feeds stdin into the queue; marks it closed at end of input so the
/// mining loop can tell "no work yet" from "no more work ever".
fn spawn_reader(queue: Arc<InputQueue>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if let Ok(mut lines) = queue.lines.lock() {
                lines.push_back(line);
            }
        }
        queue.open.store(false, Ordering::Release);
    });
}

/// Drain every buffered line into the work queue. A work message flagged
/// new replaces everything still pending.
fn drain_input(queue: &InputQueue, pending: &mut VecDeque<Work>) {
    let drained: Vec<String> = match queue.lines.lock() {
        Ok(mut lines) => lines.drain(..).collect(),
        Err(_) => return,
    };
    for line in drained {
        if let Some(work) = parse_work(&line) {
            if work.is_new {
                pending.clear();
            }
            pending.push_back(work);
        }
    }
}

fn recreational_job(rng: &mut ChaCha20Rng, fun_frames: i32) -> Work {
    let mut block = [0u8; WORK_SIZE];
    rng.fill_bytes(&mut block);
    Work {
        block,
        target_frames: fun_frames,
        msg: "recreational".to_string(),
        is_new: true,
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.fun_frames <= 0 {
        bail!("--fun-frames must be positive");
    }

    let mut rng = match args.seed {
        Some(seed) => ChaCha20Rng::seed_from_u64(seed),
        None => ChaCha20Rng::seed_from_u64(rand::thread_rng().next_u64()),
    };

    let queue = Arc::new(InputQueue::new());
    spawn_reader(Arc::clone(&queue));
    let mut pending: VecDeque<Work> = VecDeque::new();
    let mut current: Option<Work> = None;
    let mut worlds: u64 = 0;

    loop {
        drain_input(&queue, &mut pending);
        if let Some(next) = pending.pop_front() {
            if let Some(old) = current.take() {
                // Hand the unfinished job back to the feeder.
                println!("{}", work_line(&old));
            }
            eprintln!("{} {}", "work:".cyan(), next.msg);
            current = Some(next);
        }

        let work = match &current {
            Some(work) => work.clone(),
            None if args.require_work => {
                if !queue.open.load(Ordering::Acquire) {
                    info!("stdin closed, exiting");
                    return Ok(());
                }
                thread::sleep(Duration::from_millis(25));
                continue;
            }
            None => recreational_job(&mut rng, args.fun_frames),
        };

        if args.max_worlds > 0 && worlds >= args.max_worlds {
            info!("world budget reached after {worlds} worlds");
            return Ok(());
        }
        worlds += 1;

        let mut session = Session::create(work.clone(), &mut rng)
            .context("no playable world within the nonce budget")?;
        let mut polls: u32 = 0;
        let mut capped = false;
        let outcome = session.mine(|| {
            polls += 1;
            if args.iterations > 0 && polls > args.iterations {
                capped = true;
                return true;
            }
            queue.has_pending()
        });

        match outcome {
            MineOutcome::Solved(pow) => {
                if !check(&work, &pow) {
                    // A solution the validator rejects means the engine
                    // disagrees with itself; never print it.
                    warn!("self-check failed on a mined proof, discarding");
                    eprintln!("{}", "self-check failed, proof discarded".red());
                    continue;
                }
                eprintln!(
                    "{} {} frames on nonce {}",
                    "solved:".green(),
                    pow.num_frames,
                    pow.nonce
                );
                println!("{}", solution_line(&work, &pow));
                if current.take().is_none() {
                    info!("recreational solve in {} frames", pow.num_frames);
                }
            }
            MineOutcome::Exhausted => {
                eprintln!("{} trying another world", "exhausted:".yellow());
            }
            MineOutcome::Aborted if capped => {
                eprintln!("{} iteration cap hit, next world", "capped:".yellow());
            }
            MineOutcome::Aborted => {
                // New work is waiting; the next loop turn picks it up.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_accept_the_full_flag_set() {
        let args = Args::try_parse_from([
            "moto-miner",
            "--seed",
            "7",
            "--iterations",
            "500",
            "--max-worlds",
            "3",
            "--require-work",
        ])
        .expect("flags must parse");
        assert_eq!(args.seed, Some(7));
        assert_eq!(args.iterations, 500);
        assert_eq!(args.max_worlds, 3);
        assert!(args.require_work);

        let defaults = Args::try_parse_from(["moto-miner"]).expect("defaults must parse");
        assert_eq!(defaults.iterations, 0);
        assert_eq!(defaults.fun_frames, FRAME_RATE * 60);
        assert!(!defaults.require_work);
    }

    #[test]
    fn drain_skips_garbage_and_honors_is_new() {
        let queue = InputQueue::new();
        let hex = "ab".repeat(WORK_SIZE);
        {
            let mut lines = queue.lines.lock().unwrap();
            lines.push_back("not a message".to_string());
            lines.push_back(format!(
                r#"{{"kind":"work","block":"{hex}","target_frames":250,"is_new":false}}"#
            ));
            // Default is_new=true: replaces everything still pending.
            lines.push_back(format!(
                r#"{{"kind":"work","block":"{hex}","target_frames":500}}"#
            ));
        }
        let mut pending = VecDeque::new();
        drain_input(&queue, &mut pending);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].target_frames, 500);
        assert!(!queue.has_pending(), "drain must empty the line buffer");
    }
}
